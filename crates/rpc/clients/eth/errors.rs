#[derive(Debug, thiserror::Error)]
pub enum EthClientError {
    #[error("Error sending request {0:?}")]
    RequestError(#[from] reqwest::Error),
    #[error("{0}")]
    RpcRequestError(#[from] RpcRequestError),
    #[error("Failed to serialize/deserialize: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("Failed to decode hex value: {0}")]
    HexError(#[from] hex::FromHexError),
    #[error("Max fee per gas {max_fee_per_gas} exceeds the maximum allowed {maximum_allowed}")]
    GasPriceAboveCap {
        max_fee_per_gas: u64,
        maximum_allowed: u64,
    },
    #[error("Internal Error. This is most probably a bug: {0}")]
    InternalError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RpcRequestError {
    #[error("{method} request failed: {message} (code {code})")]
    RPCError {
        method: String,
        code: i64,
        message: String,
    },
    #[error("Unexpected {method} response: {value}")]
    UnexpectedResponse { method: String, value: String },
}
