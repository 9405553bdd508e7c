use ethereum_types::{Address, H256};
use sha3::{Digest, Keccak256};

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(&Keccak256::digest(data.as_ref()))
}

/// Address of a contract created through `CREATE2` (EIP-1014):
/// `keccak256(0xff ++ deployer ++ salt ++ keccak256(init_code))[12..]`.
pub fn create2_address(deployer: Address, salt: H256, init_code_hash: H256) -> Address {
    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(deployer.as_bytes());
    preimage.extend_from_slice(salt.as_bytes());
    preimage.extend_from_slice(init_code_hash.as_bytes());
    Address::from_slice(&keccak(preimage).as_bytes()[12..])
}

/// Parses a 0x-prefixed (or bare) hex string into a 32 byte word, left padding with zeros.
pub fn parse_h256_padded(s: &str) -> Result<H256, hex::FromHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = if s.len() % 2 == 1 {
        format!("0{s}")
    } else {
        s.to_owned()
    };
    let bytes = hex::decode(s)?;
    if bytes.len() > 32 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(H256(word))
}
