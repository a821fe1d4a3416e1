//! Connected-wallet state and network preconditions.

use std::future::Future;

use alloy::primitives::Address;

use crate::{ChainConfig, SubpayError};

/// Asks the user's wallet to change chains.
pub trait NetworkSwitcher: Send + Sync {
    fn switch_chain(&self, chain_id: u64) -> impl Future<Output = Result<(), SubpayError>> + Send;
}

/// The wallet the user connected, if any, and the chain it is on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSession {
    address: Option<Address>,
    chain_id: u64,
}

impl WalletSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, address: Address, chain_id: u64) {
        tracing::info!(address = %address, chain_id, "wallet connected");
        self.address = Some(address);
        self.chain_id = chain_id;
    }

    pub fn disconnect(&mut self) {
        if let Some(address) = self.address.take() {
            tracing::info!(address = %address, "wallet disconnected");
        }
        self.chain_id = 0;
    }

    /// Record a chain change reported by the wallet.
    pub fn set_chain(&mut self, chain_id: u64) {
        self.chain_id = chain_id;
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    pub fn is_correct_network(&self, target: &ChainConfig) -> bool {
        self.is_connected() && self.chain_id == target.chain_id
    }

    pub fn require_connected(&self) -> Result<Address, SubpayError> {
        self.address
            .ok_or_else(|| SubpayError::Precondition("Wallet not connected".to_string()))
    }

    /// Connected address, provided the wallet is on `target`'s chain.
    pub fn require_network(&self, target: &ChainConfig) -> Result<Address, SubpayError> {
        let address = self.require_connected()?;
        if self.chain_id != target.chain_id {
            return Err(SubpayError::Precondition(format!(
                "Please switch to the {} network (Chain ID: {})",
                target.chain_name, target.chain_id
            )));
        }
        Ok(address)
    }

    /// Ask the wallet to move to `target`'s chain. The session chain only
    /// changes when the switch succeeded.
    pub async fn switch_network<N: NetworkSwitcher>(
        &mut self,
        switcher: &N,
        target: &ChainConfig,
    ) -> Result<(), SubpayError> {
        self.require_connected()?;
        if self.chain_id == target.chain_id {
            return Ok(());
        }
        match switcher.switch_chain(target.chain_id).await {
            Ok(()) => {
                tracing::info!(from = self.chain_id, to = target.chain_id, "switched network");
                self.chain_id = target.chain_id;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(chain_id = target.chain_id, error = %e, "network switch failed");
                Err(SubpayError::Precondition(format!(
                    "Failed to switch to {}: {}",
                    target.chain_name,
                    switch_failure_reason(&e)
                )))
            }
        }
    }
}

fn switch_failure_reason(err: &SubpayError) -> String {
    match err {
        SubpayError::Precondition(msg) | SubpayError::ChainError(msg) => msg.clone(),
        other => other.to_string(),
    }
}
