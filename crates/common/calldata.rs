//! ABI encoding of function calls over the address and integer words the deployment
//! contracts take.

use ethereum_types::{Address, H256, U256};

use crate::utils::keccak;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Uint(U256),
}

impl Value {
    fn matches_type(&self, ty: &str) -> bool {
        match self {
            Value::Address(_) => ty == "address",
            Value::Uint(_) => ty.starts_with("uint"),
        }
    }

    fn to_word(self) -> [u8; 32] {
        match self {
            Value::Address(address) => H256::from(address).0,
            Value::Uint(uint) => uint.to_big_endian(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CalldataEncodeError {
    #[error("Failed to parse function signature: {0}")]
    ParseError(String),
    #[error("Wrong number of arguments provided for calldata: expected {expected}, got {got}")]
    WrongArgumentLength { expected: usize, got: usize },
    #[error("Argument {index} does not match parameter type {expected}")]
    TypeMismatch { index: usize, expected: String },
}

/// Strips whitespace so that `f(address, uint256)` and `f(address,uint256)` hash alike.
fn normalize_signature(signature: &str) -> String {
    signature.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Splits `name(type1,type2)` into its name and parameter types.
fn parse_signature(signature: &str) -> Result<(String, Vec<String>), CalldataEncodeError> {
    let signature = normalize_signature(signature);
    let (name, rest) = signature
        .split_once('(')
        .ok_or_else(|| CalldataEncodeError::ParseError(signature.clone()))?;
    let params = rest
        .strip_suffix(')')
        .ok_or_else(|| CalldataEncodeError::ParseError(signature.clone()))?;
    if name.is_empty() || params.contains('(') {
        return Err(CalldataEncodeError::ParseError(signature.clone()));
    }
    let params = if params.is_empty() {
        Vec::new()
    } else {
        params.split(',').map(str::to_owned).collect()
    };
    Ok((name.to_owned(), params))
}

pub fn compute_function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak(normalize_signature(signature));
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.as_bytes()[..4]);
    selector
}

/// Topic 0 of a log emitted for the given event signature.
pub fn event_topic(signature: &str) -> H256 {
    keccak(normalize_signature(signature))
}

pub fn encode_calldata(signature: &str, values: &[Value]) -> Result<Vec<u8>, CalldataEncodeError> {
    let (_, params) = parse_signature(signature)?;
    if params.len() != values.len() {
        return Err(CalldataEncodeError::WrongArgumentLength {
            expected: params.len(),
            got: values.len(),
        });
    }
    for (index, (param, value)) in params.iter().zip(values).enumerate() {
        if !value.matches_type(param) {
            return Err(CalldataEncodeError::TypeMismatch {
                index,
                expected: param.clone(),
            });
        }
    }

    let mut calldata = compute_function_selector(signature).to_vec();
    calldata.extend(encode_tuple(values));
    Ok(calldata)
}

/// Encodes a parameter list of static words, as used for calldata and constructor arguments.
pub fn encode_tuple(values: &[Value]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_word()).collect()
}

fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    let start = index.checked_mul(32)?;
    data.get(start..start.checked_add(32)?)
}

/// Reads the `index`-th 32 byte word of ABI data as an address.
pub fn decode_address(data: &[u8], index: usize) -> Option<Address> {
    word(data, index).map(|word| Address::from_slice(&word[12..]))
}

/// Reads the `index`-th 32 byte word of ABI data as an unsigned integer.
pub fn decode_uint(data: &[u8], index: usize) -> Option<U256> {
    word(data, index).map(U256::from_big_endian)
}
