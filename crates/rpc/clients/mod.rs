pub mod eth;

pub use eth::{
    EthClient, Overrides,
    errors::{EthClientError, RpcRequestError},
};
