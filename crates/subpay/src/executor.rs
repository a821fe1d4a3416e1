//! Submission of redemption calls.

use std::future::Future;

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::Provider;

use crate::SubpayError;

/// Whether `address` has contract code on the provider's chain.
pub async fn has_code<P: Provider>(provider: &P, address: Address) -> Result<bool, SubpayError> {
    let request = provider.get_code_at(address);

    #[cfg(feature = "full")]
    let code = tokio::time::timeout(std::time::Duration::from_secs(30), request)
        .await
        .map_err(|_| SubpayError::ChainError("getCode timed out after 30s".to_string()))?;
    #[cfg(not(feature = "full"))]
    let code = request.await;

    let code = code.map_err(|e| SubpayError::ChainError(format!("getCode failed: {e}")))?;
    Ok(!code.is_empty())
}

/// Sends a call to the chain and waits for it to be mined.
pub trait Executor: Send + Sync {
    /// Whether `account` has code deployed. Redemption executes through the
    /// delegator's account, so it must be a deployed contract.
    fn is_deployed(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<bool, SubpayError>> + Send;

    /// Submit `data` to `to`. Returns the transaction hash once mined successfully.
    fn submit(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<TxHash, SubpayError>> + Send;
}

/// Executor sending transactions from a wallet-enabled alloy provider
/// (the delegate's account).
#[cfg(feature = "full")]
pub struct ProviderExecutor<P> {
    provider: P,
}

#[cfg(feature = "full")]
impl<P> ProviderExecutor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[cfg(feature = "full")]
impl<P: Provider + Send + Sync> Executor for ProviderExecutor<P> {
    async fn is_deployed(&self, account: Address) -> Result<bool, SubpayError> {
        has_code(&self.provider, account).await
    }

    async fn submit(&self, to: Address, data: Bytes) -> Result<TxHash, SubpayError> {
        use alloy::network::TransactionBuilder;
        use alloy::rpc::types::TransactionRequest;
        use std::time::Duration;

        let tx = TransactionRequest::default().with_to(to).with_input(data);

        // An unresponsive RPC would otherwise hang the payment flow.
        let pending = tokio::time::timeout(
            Duration::from_secs(30),
            self.provider.send_transaction(tx),
        )
        .await
        .map_err(|_| SubpayError::ChainError("redeem send timed out after 30s".to_string()))?
        .map_err(|e| SubpayError::ChainError(format!("redeem send failed: {e}")))?;

        let tx_hash = *pending.tx_hash();
        tracing::info!(tx = %tx_hash, to = %to, "redeem transaction sent");

        let receipt = tokio::time::timeout(Duration::from_secs(60), pending.get_receipt())
            .await
            .map_err(|_| {
                SubpayError::ChainError("redeem receipt timed out after 60s".to_string())
            })?
            .map_err(|e| SubpayError::ChainError(format!("redeem receipt failed: {e}")))?;

        if !receipt.status() {
            return Err(SubpayError::ChainError(format!(
                "redeem transaction {tx_hash} reverted"
            )));
        }

        Ok(receipt.transaction_hash)
    }
}
