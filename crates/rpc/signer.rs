use secp256k1::{Message, PublicKey, SECP256K1, SecretKey};
use timelocks_common::{
    Address, H256, U256,
    types::EIP1559Transaction,
    utils::{keccak, parse_h256_padded},
};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid private key hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("Invalid private key: {0}")]
    InvalidKey(#[from] secp256k1::Error),
}

/// Signs with a private key held in memory.
#[derive(Clone, Debug)]
pub struct LocalSigner {
    private_key: SecretKey,
    pub address: Address,
}

impl LocalSigner {
    pub fn new(private_key: SecretKey) -> Self {
        let address = get_address_from_secret_key(&private_key);
        Self {
            private_key,
            address,
        }
    }

    /// Returns `(y_parity, r, s)` of the recoverable signature over `hash`.
    pub fn sign_hash(&self, hash: H256) -> (bool, U256, U256) {
        let msg = Message::from_digest(hash.to_fixed_bytes());
        let (recovery_id, signature) = SECP256K1
            .sign_ecdsa_recoverable(&msg, &self.private_key)
            .serialize_compact();

        let r = U256::from_big_endian(&signature[..32]);
        let s = U256::from_big_endian(&signature[32..64]);
        (Into::<i32>::into(recovery_id) != 0, r, s)
    }

    pub fn sign_transaction(&self, tx: &mut EIP1559Transaction) {
        let (y_parity, r, s) = self.sign_hash(tx.signing_hash());
        tx.signature_y_parity = y_parity;
        tx.signature_r = r;
        tx.signature_s = s;
    }
}

pub fn get_address_from_secret_key(secret_key: &SecretKey) -> Address {
    let public_key = PublicKey::from_secret_key(SECP256K1, secret_key).serialize_uncompressed();
    // Skip the 0x04 prefix of the uncompressed encoding.
    Address::from_slice(&keccak(&public_key[1..]).as_bytes()[12..])
}

pub fn parse_private_key(s: &str) -> Result<SecretKey, SignerError> {
    let word = parse_h256_padded(s)?;
    Ok(SecretKey::from_slice(word.as_bytes())?)
}
