use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use clap::{Parser, Subcommand, builder::FalseyValueParser};
use eyre::{OptionExt, WrapErr};
use secp256k1::SecretKey;
use timelocks_common::{Address, H256, utils::parse_h256_padded};
use timelocks_deployer::{
    DeployerError, DeploymentMode, DeploymentOrchestrator, OrchestratorSettings, RunReport,
    beneficiaries::read_beneficiaries,
    chain::{SigningClient, TransactionSender},
    config::{DeployConfig, network_name},
    contracts::DEFAULT_TIMELOCK_CONTRACT,
    export::{export_deployments, run_verification, verification_jobs},
    factory::{FactoryArtifact, deploy_factory, resolve_factory},
    registrar::{DeploymentRegistrar, FileRegistrar},
    sink::{BatchRecorder, DirectBroadcaster, SinkReport},
};
use timelocks_rpc::{
    EthClient,
    signer::{LocalSigner, parse_private_key},
};
use tracing::{Level, debug, info};
use url::Url;

#[allow(clippy::upper_case_acronyms)]
#[derive(Parser)]
#[command(
    name = "timelocks",
    author = "Lambdaclass",
    about = "Deterministic, re-runnable deployment of beneficiary timelocks"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "log.level",
        global = true,
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "TIMELOCKS_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error",
        help_heading = "Log options"
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        global = true,
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        long_help = "Possible values: auto, always, never",
        help_heading = "Log options",
        env = "TIMELOCKS_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl Display for LogColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogColor::Auto => write!(f, "auto"),
            LogColor::Always => write!(f, "always"),
            LogColor::Never => write!(f, "never"),
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            _ => Err(format!(
                "Invalid log color '{s}'. Expected: auto, always, or never"
            )),
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct EthOptions {
    #[arg(
        long = "eth-rpc-url",
        value_name = "RPC_URL",
        env = "ETH_RPC_URL",
        help_heading = "Eth options"
    )]
    pub rpc_url: Url,
    #[arg(
        long,
        value_name = "UINT64",
        env = "MAXIMUM_ALLOWED_MAX_FEE_PER_GAS",
        help_heading = "Eth options",
        help = "Refuse to broadcast when the max fee per gas would exceed this many wei."
    )]
    pub maximum_allowed_max_fee_per_gas: Option<u64>,
    #[arg(
        long,
        default_value = "60",
        value_name = "UINT64",
        env = "RECEIPT_RETRIES",
        help_heading = "Eth options"
    )]
    pub receipt_retries: u64,
    #[arg(
        long,
        default_value = "2000",
        value_name = "MILLISECONDS",
        env = "RECEIPT_INTERVAL_MS",
        help_heading = "Eth options"
    )]
    pub receipt_interval_ms: u64,
}

impl EthOptions {
    fn client(&self) -> eyre::Result<EthClient> {
        Ok(EthClient::new_with_config(
            self.rpc_url.clone(),
            self.maximum_allowed_max_fee_per_gas,
        )?)
    }

    fn signing_client(
        &self,
        client: EthClient,
        private_key: Option<SecretKey>,
        chain_id: u64,
    ) -> Result<SigningClient, DeployerError> {
        let private_key = private_key.ok_or(DeployerError::MissingSigner)?;
        Ok(
            SigningClient::new(client, LocalSigner::new(private_key), chain_id)
                .with_receipt_polling(
                    self.receipt_retries,
                    Duration::from_millis(self.receipt_interval_ms),
                ),
        )
    }
}

#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    #[arg(
        long,
        default_value = "deployments",
        value_name = "DIRECTORY",
        env = "DEPLOYMENTS_DIR",
        help_heading = "Output options",
        help = "Deployment records are stored under <DIRECTORY>/<network>/."
    )]
    pub deployments_dir: PathBuf,
    #[arg(
        long,
        default_value = "batches",
        value_name = "DIRECTORY",
        env = "OUT_DIR",
        help_heading = "Output options",
        help = "Unsigned transaction batches are written under <DIRECTORY>/<network>/."
    )]
    pub out_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Deploy the timelock factory through the deterministic deployment proxy")]
    DeployFactory {
        #[command(flatten)]
        eth: EthOptions,
        #[command(flatten)]
        output: OutputOptions,
        #[arg(
            long,
            value_name = "PRIVATE_KEY",
            value_parser = parse_private_key,
            env = "PRIVATE_KEY",
            help_heading = "Deployer options"
        )]
        private_key: Option<SecretKey>,
        #[arg(
            long,
            value_name = "HEX",
            value_parser = parse_h256_padded,
            env = "SALT",
            help_heading = "Deployer options",
            help = "CREATE2 salt, left padded to 32 bytes."
        )]
        salt: H256,
        #[arg(
            long,
            default_value = "out/TimelockFactory.sol/TimelockFactory.json",
            value_name = "PATH",
            env = "FACTORY_ARTIFACT",
            help_heading = "Deployer options"
        )]
        artifact: PathBuf,
        #[arg(
            long,
            env = "SUBMIT",
            value_parser = FalseyValueParser::new(),
            help_heading = "Deployer options",
            help = "Broadcast right away instead of writing a batch for offline signing."
        )]
        submit: bool,
    },
    #[command(about = "Deploy a timelock for every beneficiary that does not have one yet")]
    DeployTimelocks {
        #[command(flatten)]
        eth: EthOptions,
        #[command(flatten)]
        output: OutputOptions,
        #[arg(
            long,
            default_value = "deploy-config.json",
            value_name = "PATH",
            env = "DEPLOY_CONFIG",
            help_heading = "Deployer options"
        )]
        config: PathBuf,
        #[arg(
            long,
            value_name = "PATH",
            env = "BENEFICIARIES",
            help_heading = "Deployer options",
            help = "Overrides the beneficiary file of the chain configuration."
        )]
        beneficiaries: Option<PathBuf>,
        #[arg(
            long,
            value_name = "PRIVATE_KEY",
            value_parser = parse_private_key,
            env = "PRIVATE_KEY",
            help_heading = "Deployer options"
        )]
        private_key: Option<SecretKey>,
        #[arg(
            long,
            value_name = "ADDRESS",
            env = "DEPLOYER_ADDRESS",
            help_heading = "Deployer options",
            help = "Account that will send the batch, usually a multisig. Defaults to the private key's address."
        )]
        deployer_address: Option<Address>,
        #[arg(
            long,
            value_name = "ADDRESS",
            env = "FACTORY_ADDRESS",
            help_heading = "Deployer options",
            help = "Factory to deploy through. Defaults to the recorded TimelockFactory."
        )]
        factory: Option<Address>,
        #[arg(
            long,
            env = "SUBMIT",
            value_parser = FalseyValueParser::new(),
            help_heading = "Deployer options"
        )]
        submit: bool,
        #[arg(
            long,
            env = "FUND_ON_DEPLOY",
            value_parser = FalseyValueParser::new(),
            help_heading = "Deployer options",
            help = "Have the factory pull each timelock's amount from the deployer on deployment."
        )]
        fund_on_deploy: bool,
    },
    #[command(about = "Export the recorded deployments of a network into one JSON file")]
    Export {
        #[arg(long, value_name = "CHAIN_ID", env = "CHAIN_ID")]
        chain_id: u64,
        #[arg(long, value_name = "NAME", help = "Defaults to the well-known name of the chain.")]
        network: Option<String>,
        #[arg(
            long,
            default_value = "deployments",
            value_name = "DIRECTORY",
            env = "DEPLOYMENTS_DIR"
        )]
        deployments_dir: PathBuf,
        #[arg(long, default_value = "deployments.json", value_name = "PATH")]
        output: PathBuf,
    },
    #[command(about = "Verify the source of every recorded timelock with forge")]
    Verify {
        #[arg(long, value_name = "CHAIN_ID", env = "CHAIN_ID")]
        chain_id: u64,
        #[arg(long, value_name = "NAME")]
        network: Option<String>,
        #[arg(
            long,
            default_value = "deployments",
            value_name = "DIRECTORY",
            env = "DEPLOYMENTS_DIR"
        )]
        deployments_dir: PathBuf,
        #[arg(long, default_value = DEFAULT_TIMELOCK_CONTRACT, value_name = "PATH:CONTRACT")]
        contract: String,
        #[arg(long, help = "Print the forge invocations instead of running them.")]
        dry_run: bool,
    },
}

impl Command {
    pub async fn run(self) -> eyre::Result<()> {
        match self {
            Command::DeployFactory {
                eth,
                output,
                private_key,
                salt,
                artifact,
                submit,
            } => {
                let artifact = FactoryArtifact::load(&artifact)
                    .wrap_err_with(|| format!("Failed to load {}", artifact.display()))?;
                let client = eth.client()?;
                let chain_id = chain_id(&client).await?;
                let network = network_name(chain_id);
                let registrar = FileRegistrar::new(&output.deployments_dir, &network);
                info!(chain_id, %network, "Deploying timelock factory");

                let deployment = match DeploymentMode::from_submit_flag(submit) {
                    DeploymentMode::DirectBroadcast => {
                        let signing = eth.signing_client(client, private_key, chain_id)?;
                        let sink = DirectBroadcaster::new(&signing, &registrar);
                        deploy_factory(&signing, &registrar, sink, salt, &artifact).await?
                    }
                    DeploymentMode::OfflineBatch => {
                        let sink = BatchRecorder::new(output.out_dir.join(&network));
                        deploy_factory(&client, &registrar, sink, salt, &artifact).await?
                    }
                };
                info!(address = %format!("{:#x}", deployment.address), "Timelock factory ready");
                log_sink_report(&deployment.sink);
                Ok(())
            }
            Command::DeployTimelocks {
                eth,
                output,
                config,
                beneficiaries,
                private_key,
                deployer_address,
                factory,
                submit,
                fund_on_deploy,
            } => {
                let client = eth.client()?;
                let chain_id = chain_id(&client).await?;
                let config = DeployConfig::load(&config)?;
                debug!(chain_ids = ?config.chain_ids(), "Loaded chain configuration");
                let chain = config.resolve(chain_id)?;
                let beneficiary_file = beneficiaries.unwrap_or_else(|| chain.beneficiary_file.clone());
                let records = read_beneficiaries(&beneficiary_file).map_err(DeployerError::from)?;
                let registrar = FileRegistrar::new(&output.deployments_dir, &chain.network);
                info!(
                    chain_id,
                    network = %chain.network,
                    beneficiaries = records.len(),
                    file = %beneficiary_file.display(),
                    "Loaded beneficiaries"
                );

                let report = match DeploymentMode::from_submit_flag(submit) {
                    DeploymentMode::DirectBroadcast => {
                        let signing = eth.signing_client(client, private_key, chain_id)?;
                        let factory = resolve_factory(&signing, &registrar, factory, chain_id).await?;
                        let settings = OrchestratorSettings {
                            deployer: signing.address(),
                            factory,
                            token: chain.token,
                            admin: chain.admin,
                            fund_on_deploy,
                        };
                        DeploymentOrchestrator::new(&signing, settings)
                            .run(&records, DirectBroadcaster::new(&signing, &registrar))
                            .await?
                    }
                    DeploymentMode::OfflineBatch => {
                        let deployer = deployer_address
                            .or_else(|| private_key.as_ref().map(|key| LocalSigner::new(*key).address))
                            .ok_or_eyre("Batch mode needs --deployer-address (or --private-key)")?;
                        let factory = resolve_factory(&client, &registrar, factory, chain_id).await?;
                        let settings = OrchestratorSettings {
                            deployer,
                            factory,
                            token: chain.token,
                            admin: chain.admin,
                            fund_on_deploy,
                        };
                        DeploymentOrchestrator::new(&client, settings)
                            .run(&records, BatchRecorder::new(output.out_dir.join(&chain.network)))
                            .await?
                    }
                };
                log_run_report(&report);
                Ok(())
            }
            Command::Export {
                chain_id,
                network,
                deployments_dir,
                output,
            } => {
                let network = network.unwrap_or_else(|| network_name(chain_id));
                let registrar = FileRegistrar::new(&deployments_dir, &network);
                export_deployments(&registrar, chain_id, &network, &output)?;
                Ok(())
            }
            Command::Verify {
                chain_id,
                network,
                deployments_dir,
                contract,
                dry_run,
            } => {
                let network = network.unwrap_or_else(|| network_name(chain_id));
                let registrar = FileRegistrar::new(&deployments_dir, &network);
                let jobs = verification_jobs(&registrar.all()?);
                info!(chain_id, %network, timelocks = jobs.len(), "Verifying timelocks");
                for line in run_verification(&jobs, chain_id, &contract, dry_run)? {
                    if dry_run {
                        println!("{line}");
                    }
                }
                Ok(())
            }
        }
    }
}

async fn chain_id(client: &EthClient) -> eyre::Result<u64> {
    let chain_id = client.get_chain_id().await?;
    u64::try_from(chain_id).map_err(|_| eyre::eyre!("Chain id {chain_id} does not fit in a u64"))
}

fn log_sink_report(report: &SinkReport) {
    match report {
        SinkReport::Batch {
            files,
            transactions,
        } => info!(
            transactions,
            latest = %files.latest.display(),
            "Batch ready for signing"
        ),
        SinkReport::Direct { confirmed } => info!(confirmed, "Broadcast finished"),
    }
}

fn log_run_report(report: &RunReport) {
    info!(
        total = report.total,
        skipped = report.skipped.len(),
        deployments = report.deployments(),
        approval = report.approval.is_some(),
        "Timelock run finished"
    );
    log_sink_report(&report.sink);
}
