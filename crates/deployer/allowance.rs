use timelocks_common::{
    Address, U256,
    calldata::{Value, decode_uint, encode_calldata},
};
use timelocks_rpc::{EthClientError, clients::RpcRequestError};
use tracing::{debug, info};

use crate::{
    chain::ChainReader,
    contracts::{ALLOWANCE_SIGNATURE, APPROVE_SIGNATURE},
    error::DeployerError,
    types::{DeploymentIntent, TransactionRecord},
};

/// Requests an approval for exactly what the pending deployments lack.
///
/// ERC-20 `approve` replaces the allowance instead of adding to it, so when an allowance is
/// already in place the approved deficit alone does not cover every pending deployment.
#[derive(Debug, Clone, Copy)]
pub struct AllowanceBootstrapper {
    pub token: Address,
}

impl AllowanceBootstrapper {
    pub fn new(token: Address) -> Self {
        Self { token }
    }

    pub async fn allowance(
        &self,
        reader: &dyn ChainReader,
        owner: Address,
        spender: Address,
    ) -> Result<U256, DeployerError> {
        let calldata = encode_calldata(
            ALLOWANCE_SIGNATURE,
            &[Value::Address(owner), Value::Address(spender)],
        )?;
        let output = reader.call(self.token, calldata.into()).await?;
        decode_uint(&output, 0).ok_or_else(|| {
            EthClientError::from(RpcRequestError::UnexpectedResponse {
                method: "allowance".to_owned(),
                value: format!("0x{}", hex::encode(&output)),
            })
            .into()
        })
    }

    /// Returns the approved amount with the approval to send, or `None` when the current
    /// allowance already covers `required`.
    pub async fn ensure_allowance(
        &self,
        reader: &dyn ChainReader,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> Result<Option<(U256, TransactionRecord)>, DeployerError> {
        if required.is_zero() {
            return Ok(None);
        }
        let current = self.allowance(reader, owner, spender).await?;
        if current >= required {
            debug!(%current, %required, "Allowance already covers the pending funding");
            return Ok(None);
        }

        let deficit = required - current;
        info!(%current, %required, %deficit, "Approving the factory for the funding deficit");
        let calldata = encode_calldata(
            APPROVE_SIGNATURE,
            &[Value::Address(spender), Value::Uint(deficit)],
        )?;
        Ok(Some((deficit, TransactionRecord::call(self.token, calldata))))
    }
}

/// Sum of the funding amounts still to be pulled by the factory in this run.
pub fn required_funding<'a>(
    intents: impl IntoIterator<Item = &'a DeploymentIntent>,
) -> Result<U256, DeployerError> {
    intents
        .into_iter()
        .try_fold(U256::zero(), |sum, intent| {
            sum.checked_add(intent.funding_amount())
        })
        .ok_or(DeployerError::FundingOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use timelocks_common::calldata::compute_function_selector;

    use crate::types::{BeneficiaryRecord, ConstructorArgs};

    struct Token {
        allowance: U256,
        calls: AtomicUsize,
    }

    impl Token {
        fn with_allowance(allowance: u64) -> Self {
            Self {
                allowance: U256::from(allowance),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainReader for Token {
        async fn call(&self, _to: Address, calldata: Bytes) -> Result<Bytes, EthClientError> {
            assert_eq!(calldata[..4], compute_function_selector(ALLOWANCE_SIGNATURE));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(self.allowance.to_big_endian().to_vec()))
        }

        async fn get_code(&self, _address: Address) -> Result<Bytes, EthClientError> {
            Ok(Bytes::new())
        }
    }

    const TOKEN: Address = Address::repeat_byte(0x70);
    const OWNER: Address = Address::repeat_byte(0xde);
    const FACTORY: Address = Address::repeat_byte(0xfa);

    #[tokio::test]
    async fn approves_only_the_deficit() {
        let token = Token::with_allowance(30);
        let (amount, tx) = AllowanceBootstrapper::new(TOKEN)
            .ensure_allowance(&token, OWNER, FACTORY, U256::from(150))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(amount, U256::from(120));

        let expected = encode_calldata(
            APPROVE_SIGNATURE,
            &[Value::Address(FACTORY), Value::Uint(U256::from(120))],
        )
        .unwrap();
        assert_eq!(tx.to, TOKEN);
        assert_eq!(tx.value, U256::zero());
        assert_eq!(tx.data.as_ref(), expected.as_slice());
    }

    #[tokio::test]
    async fn no_approval_when_allowance_suffices() {
        for allowance in [150, 500] {
            let token = Token::with_allowance(allowance);
            let tx = AllowanceBootstrapper::new(TOKEN)
                .ensure_allowance(&token, OWNER, FACTORY, U256::from(150))
                .await
                .unwrap();
            assert!(tx.is_none());
        }
    }

    #[tokio::test]
    async fn nothing_required_skips_the_read() {
        let token = Token::with_allowance(0);
        let tx = AllowanceBootstrapper::new(TOKEN)
            .ensure_allowance(&token, OWNER, FACTORY, U256::zero())
            .await
            .unwrap();
        assert!(tx.is_none());
        assert_eq!(token.calls.load(Ordering::SeqCst), 0);
    }

    fn intent(funding: U256) -> DeploymentIntent {
        let record = BeneficiaryRecord {
            beneficiary: Address::repeat_byte(0xb1),
            cliff_duration: 0,
            start_time: 1000,
            duration: 10,
            amount: funding,
        };
        DeploymentIntent {
            args: ConstructorArgs {
                token: TOKEN,
                beneficiary: record.beneficiary,
                admin: OWNER,
                cliff_duration: 0,
                start_time: 1000,
                duration: 10,
                amount: funding,
                funding_amount: funding,
            },
            record,
            expected_address: Address::repeat_byte(0x11),
        }
    }

    #[test]
    fn sums_funding_and_detects_overflow() {
        let intents = [intent(U256::from(100)), intent(U256::from(50))];
        assert_eq!(required_funding(&intents).unwrap(), U256::from(150));

        let intents = [intent(U256::MAX), intent(U256::one())];
        assert!(matches!(
            required_funding(&intents),
            Err(DeployerError::FundingOverflow)
        ));
    }
}
