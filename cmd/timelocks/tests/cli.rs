use std::{fs, path::Path, process::Command};

const BENEFICIARY: &str = "0xb1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1";
const TIMELOCK: &str = "0x1111111111111111111111111111111111111111";

fn timelocks() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_timelocks"));
    for var in [
        "ETH_RPC_URL",
        "PRIVATE_KEY",
        "SALT",
        "SUBMIT",
        "FUND_ON_DEPLOY",
        "CHAIN_ID",
        "DEPLOYMENTS_DIR",
    ] {
        command.env_remove(var);
    }
    command
}

fn write_record(dir: &Path) {
    let network_dir = dir.join("goerli");
    fs::create_dir_all(&network_dir).unwrap();
    let name = format!("Timelock-{BENEFICIARY}-1000");
    let record = serde_json::json!({
        "name": name,
        "address": TIMELOCK,
        "transactionHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
        "args": {
            "token": "0x7070707070707070707070707070707070707070",
            "beneficiary": BENEFICIARY,
            "admin": "0xadadadadadadadadadadadadadadadadadadadad",
            "cliffDuration": 0,
            "startTime": 1000,
            "duration": 31536000,
            "amount": "100",
            "fundingAmount": "0"
        }
    });
    fs::write(
        network_dir.join(format!("{name}.json")),
        serde_json::to_string_pretty(&record).unwrap(),
    )
    .unwrap();
}

#[test]
fn help_lists_subcommands() {
    let output = timelocks().arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    for subcommand in ["deploy-factory", "deploy-timelocks", "export", "verify"] {
        assert!(stdout.contains(subcommand), "missing {subcommand} in:\n{stdout}");
    }
}

#[test]
fn deploy_timelocks_requires_rpc_url() {
    let output = timelocks().arg("deploy-timelocks").output().unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("--eth-rpc-url"), "{stderr}");
}

#[test]
fn deploy_factory_rejects_malformed_salt() {
    let output = timelocks()
        .args([
            "deploy-factory",
            "--eth-rpc-url",
            "http://127.0.0.1:1",
            "--salt",
            "0xnothex",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr).unwrap().contains("--salt"));
}

#[test]
fn submit_accepts_environment_style_booleans() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("missing.json");

    for submit in ["1", "yes", "0", ""] {
        let output = timelocks()
            .env("SUBMIT", submit)
            .args([
                "deploy-factory",
                "--eth-rpc-url",
                "http://127.0.0.1:1",
                "--salt",
                "0x01",
                "--artifact",
            ])
            .arg(&artifact)
            .output()
            .unwrap();
        assert!(!output.status.success());

        // Arguments parsed, the command got as far as loading the artifact.
        let stderr = String::from_utf8(output.stderr).unwrap();
        assert!(stderr.contains("Failed to load"), "SUBMIT={submit:?}: {stderr}");
    }
}

#[test]
fn export_writes_recorded_deployments() {
    let dir = tempfile::tempdir().unwrap();
    let deployments = dir.path().join("deployments");
    write_record(&deployments);
    let exported = dir.path().join("deployments.json");

    let output = timelocks()
        .args(["export", "--chain-id", "5", "--deployments-dir"])
        .arg(&deployments)
        .arg("--output")
        .arg(&exported)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(exported).unwrap()).unwrap();
    assert_eq!(json["chainId"], 5);
    assert_eq!(json["name"], "goerli");
    let contract = &json["contracts"][format!("Timelock-{BENEFICIARY}-1000")];
    assert_eq!(contract["address"], TIMELOCK);
}

#[test]
fn verify_dry_run_prints_forge_commands() {
    let dir = tempfile::tempdir().unwrap();
    write_record(dir.path());

    let output = timelocks()
        .args(["verify", "--chain-id", "5", "--dry-run", "--deployments-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let line = stdout.lines().next().unwrap();
    assert!(line.starts_with("forge verify-contract --chain-id 5 --constructor-args 0x"));
    assert!(line.ends_with(&format!(
        "{TIMELOCK} src/timelocks/TimelockedDelegator.sol:TimelockedDelegator"
    )));
}
