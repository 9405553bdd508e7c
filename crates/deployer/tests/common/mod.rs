#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
    sync::Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use timelocks_common::{
    Address, H256, U256,
    calldata::{compute_function_selector, decode_address, decode_uint, event_topic},
    utils::{create2_address, keccak},
};
use timelocks_deployer::{
    BeneficiaryRecord, OrchestratorSettings, TransactionRecord,
    sink::batch::LATEST_BATCH_FILE,
    chain::{ChainReader, TransactionSender},
    contracts::{
        ALLOWANCE_SIGNATURE, APPROVE_SIGNATURE, COMPUTE_TIMELOCK_ADDRESS_SIGNATURE,
        CREATE2_DEPLOYER_ADDRESS, DEPLOY_TIMELOCK_SIGNATURE, TIMELOCK_DEPLOYED_EVENT,
    },
};
use timelocks_rpc::{
    EthClientError,
    clients::RpcRequestError,
    types::receipt::{RpcLog, RpcReceipt},
};

pub const FACTORY: Address = Address::repeat_byte(0xfa);
pub const TOKEN: Address = Address::repeat_byte(0x70);
pub const ADMIN: Address = Address::repeat_byte(0xad);
pub const SENDER: Address = Address::repeat_byte(0xde);
pub const MULTISIG: Address = Address::repeat_byte(0x5a);
pub const B1: Address = Address::repeat_byte(0xb1);
pub const B2: Address = Address::repeat_byte(0xb2);
pub const B3: Address = Address::repeat_byte(0xb3);

const RUNTIME_CODE: &[u8] = &[0x60, 0x80, 0x60, 0x40];

#[derive(Default)]
pub struct State {
    pub code: HashMap<Address, Bytes>,
    pub allowance: U256,
    pub sent: Vec<TransactionRecord>,
    pub receipts: HashMap<H256, RpcReceipt>,
    pub calls: usize,
    /// Beneficiaries the factory refuses to derive an address for.
    pub failing_derivations: HashSet<Address>,
    pub drop_receipts: bool,
    pub revert: bool,
    pub omit_event: bool,
    /// Deploy timelocks somewhere other than the derived address.
    pub misplace_deployments: bool,
}

/// In-memory chain with a factory, a token and the deployment proxy.
pub struct MockChain {
    pub state: Mutex<State>,
}

impl MockChain {
    pub fn new() -> Self {
        let chain = Self {
            state: Mutex::new(State::default()),
        };
        chain.set_code(FACTORY);
        chain.set_code(TOKEN);
        chain.set_code(CREATE2_DEPLOYER_ADDRESS);
        chain
    }

    pub fn with_allowance(self, allowance: u64) -> Self {
        self.state.lock().unwrap().allowance = U256::from(allowance);
        self
    }

    pub fn set_code(&self, address: Address) {
        self.state
            .lock()
            .unwrap()
            .code
            .insert(address, Bytes::from_static(RUNTIME_CODE));
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.state.lock().unwrap().code.contains_key(&address)
    }

    pub fn sent(&self) -> Vec<TransactionRecord> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn allowance(&self) -> U256 {
        self.state.lock().unwrap().allowance
    }

    /// Marks the timelock of `record` as deployed by `deployer`.
    pub fn deploy(&self, deployer: Address, record: &BeneficiaryRecord) -> Address {
        let address = timelock_address(deployer, TOKEN, record.beneficiary, record.start_time, record.amount);
        self.set_code(address);
        address
    }

    fn receipt(&self, tx_hash: H256, to: Address, logs: Vec<RpcLog>, status: bool) -> RpcReceipt {
        RpcReceipt {
            transaction_hash: tx_hash,
            transaction_index: 0,
            block_hash: keccak(tx_hash),
            block_number: 1,
            from: SENDER,
            to: Some(to),
            cumulative_gas_used: 21_000,
            gas_used: 21_000,
            effective_gas_price: U256::from(1_000_000_000u64),
            contract_address: None,
            logs,
            status,
        }
    }
}

/// Address the mock factory assigns, a pure function of the derivation inputs.
pub fn timelock_address(
    deployer: Address,
    token: Address,
    beneficiary: Address,
    start_time: u64,
    amount: U256,
) -> Address {
    let mut preimage = Vec::new();
    preimage.extend_from_slice(deployer.as_bytes());
    preimage.extend_from_slice(token.as_bytes());
    preimage.extend_from_slice(beneficiary.as_bytes());
    preimage.extend_from_slice(&U256::from(start_time).to_big_endian());
    preimage.extend_from_slice(&amount.to_big_endian());
    Address::from_slice(&keccak(preimage).as_bytes()[12..])
}

fn word(address: Address) -> Bytes {
    Bytes::copy_from_slice(H256::from(address).as_bytes())
}

fn reverted(method: &str) -> EthClientError {
    RpcRequestError::RPCError {
        method: method.to_owned(),
        code: 3,
        message: "execution reverted".to_owned(),
    }
    .into()
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, EthClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let (selector, args) = calldata.split_at(4);

        if to == FACTORY && selector == compute_function_selector(COMPUTE_TIMELOCK_ADDRESS_SIGNATURE) {
            let beneficiary = decode_address(args, 2).unwrap();
            if state.failing_derivations.contains(&beneficiary) {
                return Err(reverted("eth_call"));
            }
            return Ok(word(timelock_address(
                decode_address(args, 0).unwrap(),
                decode_address(args, 1).unwrap(),
                beneficiary,
                decode_uint(args, 3).unwrap().as_u64(),
                decode_uint(args, 4).unwrap(),
            )));
        }
        if to == TOKEN && selector == compute_function_selector(ALLOWANCE_SIGNATURE) {
            return Ok(Bytes::copy_from_slice(&state.allowance.to_big_endian()));
        }
        Err(reverted("eth_call"))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, EthClientError> {
        let state = self.state.lock().unwrap();
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TransactionSender for MockChain {
    fn address(&self) -> Address {
        SENDER
    }

    async fn send_transaction(&self, tx: &TransactionRecord) -> Result<H256, EthClientError> {
        let tx_hash = {
            let state = self.state.lock().unwrap();
            keccak((state.sent.len() as u64 + 1).to_be_bytes())
        };
        let mut logs = Vec::new();
        let mut status = !self.state.lock().unwrap().revert;

        let deploys_timelock =
            tx.to == FACTORY && tx.data[..4] == compute_function_selector(DEPLOY_TIMELOCK_SIGNATURE);
        if status && deploys_timelock {
            // The factory pulls the funding amount through the deployer's allowance.
            let funding = decode_uint(&tx.data[4..], 7).unwrap();
            let mut state = self.state.lock().unwrap();
            match state.allowance.checked_sub(funding) {
                Some(left) => state.allowance = left,
                None => status = false,
            }
        }
        if status && deploys_timelock {
            let args = &tx.data[4..];
            let mut deployed = timelock_address(
                SENDER,
                decode_address(args, 0).unwrap(),
                decode_address(args, 1).unwrap(),
                decode_uint(args, 4).unwrap().as_u64(),
                decode_uint(args, 6).unwrap(),
            );
            let (misplace, omit_event) = {
                let state = self.state.lock().unwrap();
                (state.misplace_deployments, state.omit_event)
            };
            if misplace {
                deployed = Address::from_slice(&keccak(deployed).as_bytes()[12..]);
            }
            self.set_code(deployed);
            if !omit_event {
                logs.push(RpcLog {
                    address: FACTORY,
                    topics: vec![
                        event_topic(TIMELOCK_DEPLOYED_EVENT),
                        H256::from(deployed),
                        H256::from(decode_address(args, 1).unwrap()),
                    ],
                    data: Bytes::from(vec![0u8; 64]),
                    block_number: Some(1),
                    transaction_hash: Some(tx_hash),
                    log_index: Some(0),
                    removed: false,
                });
            }
        }
        if status && tx.to == TOKEN && tx.data[..4] == compute_function_selector(APPROVE_SIGNATURE) {
            let amount = decode_uint(&tx.data[4..], 1).unwrap();
            self.state.lock().unwrap().allowance = amount;
        }
        if status && tx.to == CREATE2_DEPLOYER_ADDRESS {
            let (salt, init_code) = tx.data.split_at(32);
            self.set_code(create2_address(
                CREATE2_DEPLOYER_ADDRESS,
                H256::from_slice(salt),
                keccak(init_code),
            ));
        }

        let receipt = self.receipt(tx_hash, tx.to, logs, status);
        let mut state = self.state.lock().unwrap();
        state.sent.push(tx.clone());
        if !state.drop_receipts {
            state.receipts.insert(tx_hash, receipt);
        }
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<Option<RpcReceipt>, EthClientError> {
        Ok(self.state.lock().unwrap().receipts.get(&tx_hash).cloned())
    }
}

pub fn record(beneficiary: Address, start_time: u64, amount: u64) -> BeneficiaryRecord {
    BeneficiaryRecord {
        beneficiary,
        cliff_duration: 0,
        start_time,
        duration: 31_536_000,
        amount: U256::from(amount),
    }
}

pub fn settings(deployer: Address, fund_on_deploy: bool) -> OrchestratorSettings {
    OrchestratorSettings {
        deployer,
        factory: FACTORY,
        token: TOKEN,
        admin: ADMIN,
        fund_on_deploy,
    }
}

/// Beneficiary argument of a queued `deployTimelock` call.
pub fn deployed_beneficiary(tx: &TransactionRecord) -> Option<Address> {
    (tx.to == FACTORY && tx.data[..4] == compute_function_selector(DEPLOY_TIMELOCK_SIGNATURE))
        .then(|| decode_address(&tx.data[4..], 1))
        .flatten()
}

/// Transactions of the latest batch written under `dir`.
pub fn latest_batch(dir: &Path) -> Vec<TransactionRecord> {
    let raw = fs::read_to_string(dir.join(LATEST_BATCH_FILE)).unwrap();
    serde_json::from_str(&raw).unwrap()
}
