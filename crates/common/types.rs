use bytes::{BufMut, Bytes};
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    rlp::{Encoder, RLP_EMPTY_LIST, RLP_NULL, RLPEncode},
    utils::keccak,
};

/// EIP-2718 type byte of dynamic fee transactions.
pub const EIP1559_TX_TYPE: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            Self::Call(address) => address.encode(buf),
            Self::Create => buf.put_u8(RLP_NULL),
        }
    }
}

/// Dynamic fee transaction without access list entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EIP1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

impl EIP1559Transaction {
    fn encode_unsigned_fields<'a>(&self, encoder: Encoder<'a>) -> Encoder<'a> {
        encoder
            .encode_field(&self.chain_id)
            .encode_field(&self.nonce)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.gas_limit)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_raw(&[RLP_EMPTY_LIST])
    }

    /// Digest the sender signs: `keccak256(0x02 || rlp([chain_id, ..., access_list]))`.
    pub fn signing_hash(&self) -> H256 {
        let mut buf = vec![EIP1559_TX_TYPE];
        self.encode_unsigned_fields(Encoder::new(&mut buf)).finish();
        keccak(buf)
    }

    /// `0x02 || rlp(fields)`, the payload accepted by `eth_sendRawTransaction`.
    pub fn encode_canonical_to_vec(&self) -> Vec<u8> {
        let mut buf = vec![EIP1559_TX_TYPE];
        self.encode_unsigned_fields(Encoder::new(&mut buf))
            .encode_field(&self.signature_y_parity)
            .encode_field(&self.signature_r)
            .encode_field(&self.signature_s)
            .finish();
        buf
    }

    pub fn hash(&self) -> H256 {
        keccak(self.encode_canonical_to_vec())
    }
}
