use timelocks_common::{
    Address, U256,
    calldata::{Value, decode_address, encode_calldata},
};
use tracing::debug;

use crate::{
    chain::ChainReader, contracts::COMPUTE_TIMELOCK_ADDRESS_SIGNATURE, error::DeployerError,
};

/// Asks the factory where a timelock will land before deploying it.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicAddressOracle {
    pub factory: Address,
}

impl DeterministicAddressOracle {
    pub fn new(factory: Address) -> Self {
        Self { factory }
    }

    /// Any failure is reported as [`DeployerError::AddressDerivation`]; a partial or empty
    /// answer is never turned into a default address.
    pub async fn compute_expected_address(
        &self,
        reader: &dyn ChainReader,
        deployer: Address,
        token: Address,
        beneficiary: Address,
        start_time: u64,
        amount: U256,
    ) -> Result<Address, DeployerError> {
        let derivation_error = |reason: String| DeployerError::AddressDerivation {
            beneficiary,
            reason,
        };

        let calldata = encode_calldata(
            COMPUTE_TIMELOCK_ADDRESS_SIGNATURE,
            &[
                Value::Address(deployer),
                Value::Address(token),
                Value::Address(beneficiary),
                Value::Uint(U256::from(start_time)),
                Value::Uint(amount),
            ],
        )?;
        let output = reader
            .call(self.factory, calldata.into())
            .await
            .map_err(|err| derivation_error(err.to_string()))?;

        let address = decode_address(&output, 0).ok_or_else(|| {
            derivation_error(format!(
                "factory returned {} bytes, expected an abi-encoded address",
                output.len()
            ))
        })?;
        debug!(
            beneficiary = %format!("{beneficiary:#x}"),
            expected = %format!("{address:#x}"),
            "Derived timelock address"
        );
        Ok(address)
    }
}
