pub mod clients;
pub mod signer;
pub mod types;

pub use clients::{EthClient, EthClientError};
