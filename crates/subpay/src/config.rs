use std::env;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::account::{parse_signer, LocalAccount};
use crate::{ChainConfig, SubpayError, SEPOLIA_CHAIN_ID};

const DEFAULT_DB_PATH: &str = "./subpay.db";

/// Runtime configuration of the `subpay` binary.
#[derive(Clone)]
pub struct SubpayConfig {
    pub chain: ChainConfig,
    /// SQLite database holding signed delegations
    pub db_path: String,
    /// Subscriber key (signs delegations)
    pub delegator_private_key: Option<String>,
    /// Delegate key (redeems delegations, pays gas)
    pub delegate_private_key: Option<String>,
    /// Recipient of subscription payments
    pub merchant_address: Option<Address>,
}

impl std::fmt::Debug for SubpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubpayConfig")
            .field("chain_id", &self.chain.chain_id)
            .field("rpc_url", &self.chain.rpc_url)
            .field("db_path", &self.db_path)
            .field(
                "delegator_private_key",
                &self.delegator_private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "delegate_private_key",
                &self.delegate_private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("merchant_address", &self.merchant_address)
            .finish()
    }
}

impl SubpayConfig {
    pub fn from_env() -> Result<Self, SubpayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SubpayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let mut chain = ChainConfig::default();
        if let Some(rpc_url) = var("SUBPAY_RPC_URL") {
            chain.rpc_url = rpc_url;
        }
        if let Some(raw) = var("SUBPAY_CHAIN_ID") {
            chain.chain_id = raw.trim().parse().map_err(|_| {
                SubpayError::ConfigError(format!("invalid SUBPAY_CHAIN_ID: {raw}"))
            })?;
            if chain.chain_id != SEPOLIA_CHAIN_ID {
                chain.chain_name = format!("Chain {}", chain.chain_id);
            }
        }

        let db_path = var("SUBPAY_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let merchant_address = match var("MERCHANT_ADDRESS") {
            Some(raw) => Some(raw.trim().parse::<Address>().map_err(|_| {
                SubpayError::ConfigError(format!("invalid MERCHANT_ADDRESS: {raw}"))
            })?),
            None => None,
        };

        Ok(Self {
            chain,
            db_path,
            delegator_private_key: var("DELEGATOR_PRIVATE_KEY"),
            delegate_private_key: var("DELEGATE_PRIVATE_KEY"),
            merchant_address,
        })
    }

    pub fn delegator_account(&self) -> Result<LocalAccount, SubpayError> {
        let key = self.delegator_private_key.as_deref().ok_or_else(|| {
            SubpayError::ConfigError("DELEGATOR_PRIVATE_KEY is required".to_string())
        })?;
        LocalAccount::from_key(key, self.chain.clone())
    }

    pub fn delegate_signer(&self) -> Result<PrivateKeySigner, SubpayError> {
        let key = self.delegate_private_key.as_deref().ok_or_else(|| {
            SubpayError::ConfigError("DELEGATE_PRIVATE_KEY is required".to_string())
        })?;
        parse_signer(key)
    }

    pub fn merchant(&self) -> Result<Address, SubpayError> {
        self.merchant_address
            .ok_or_else(|| SubpayError::ConfigError("MERCHANT_ADDRESS is required".to_string()))
    }
}
