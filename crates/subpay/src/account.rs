//! Accounts that act as delegators and delegates.
//!
//! [`SmartAccount`] is the signing capability the rest of the crate depends
//! on. Contract-account implementations (counterfactual deployment, ERC-1271
//! signatures) live outside this crate; [`LocalAccount`] covers key-backed
//! accounts and tests.

use std::future::Future;

use alloy::primitives::Address;
use alloy::providers::DynProvider;
use alloy::signers::local::PrivateKeySigner;

use crate::delegation::{Delegation, SignedDelegation};
use crate::eip712;
use crate::executor::has_code;
use crate::{ChainConfig, SubpayError};

/// An account able to sign delegations on one chain.
pub trait SmartAccount: Send + Sync {
    fn address(&self) -> Address;

    /// Chain the account is bound to.
    fn chain_config(&self) -> &ChainConfig;

    /// Whether the account's code is deployed on-chain.
    fn is_deployed(&self) -> impl Future<Output = Result<bool, SubpayError>> + Send;

    /// Sign `delegation`, which must name this account as delegator.
    fn sign_delegation(
        &self,
        delegation: Delegation,
    ) -> impl Future<Output = Result<SignedDelegation, SubpayError>> + Send;
}

/// Builds accounts for a signer on the configured chain.
pub trait AccountFactory {
    type Account: SmartAccount;

    /// `signer_chain_id` is the chain the signer is currently connected to.
    fn create(
        &self,
        signer: PrivateKeySigner,
        signer_chain_id: u64,
    ) -> Result<Self::Account, SubpayError>;
}

/// Key-backed account. Its address is the signer address.
///
/// Deployment is read from the chain through the attached provider. Without
/// one the account is reported as not deployed.
#[derive(Clone)]
pub struct LocalAccount {
    signer: PrivateKeySigner,
    config: ChainConfig,
    provider: Option<DynProvider>,
}

impl LocalAccount {
    pub fn new(signer: PrivateKeySigner, config: ChainConfig) -> Self {
        Self {
            signer,
            config,
            provider: None,
        }
    }

    /// Attach a provider used to look up the account's code.
    pub fn with_provider(mut self, provider: DynProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Create from a hex-encoded private key (with or without 0x prefix).
    pub fn from_key(private_key: &str, config: ChainConfig) -> Result<Self, SubpayError> {
        Ok(Self::new(parse_signer(private_key)?, config))
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl std::fmt::Debug for LocalAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAccount")
            .field("address", &self.address())
            .field("chain_id", &self.config.chain_id)
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

impl SmartAccount for LocalAccount {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    async fn is_deployed(&self) -> Result<bool, SubpayError> {
        match &self.provider {
            Some(provider) => has_code(provider, self.address()).await,
            None => Ok(false),
        }
    }

    async fn sign_delegation(
        &self,
        delegation: Delegation,
    ) -> Result<SignedDelegation, SubpayError> {
        if delegation.delegator != self.address() {
            return Err(SubpayError::InvalidDelegation(format!(
                "delegator {} is not this account ({})",
                delegation.delegator,
                self.address()
            )));
        }
        let signature = eip712::sign_delegation(&self.signer, &delegation, &self.config)?;
        tracing::debug!(delegator = %delegation.delegator, delegate = %delegation.delegate, "signed delegation");
        SignedDelegation::new(delegation, signature, None)
    }
}

/// Factory for [`LocalAccount`]s bound to `config`'s chain.
#[derive(Debug, Clone, Default)]
pub struct LocalAccountFactory {
    config: ChainConfig,
}

impl LocalAccountFactory {
    pub fn new(config: ChainConfig) -> Self {
        Self { config }
    }
}

impl AccountFactory for LocalAccountFactory {
    type Account = LocalAccount;

    fn create(
        &self,
        signer: PrivateKeySigner,
        signer_chain_id: u64,
    ) -> Result<LocalAccount, SubpayError> {
        if signer_chain_id != self.config.chain_id {
            tracing::info!(
                expected = self.config.chain_id,
                got = signer_chain_id,
                "chain ID mismatch, not creating account"
            );
            return Err(SubpayError::Precondition(format!(
                "Please switch to the {} network (Chain ID: {})",
                self.config.chain_name, self.config.chain_id
            )));
        }
        Ok(LocalAccount::new(signer, self.config.clone()))
    }
}

/// Parse a hex-encoded private key (with or without 0x prefix).
pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner, SubpayError> {
    let key = private_key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    key.parse::<PrivateKeySigner>()
        .map_err(|e| SubpayError::ConfigError(format!("invalid private key: {e}")))
}

/// Generate a random private key for a fresh delegate account, as a 0x-prefixed hex string.
pub fn generate_delegate_key() -> String {
    PrivateKeySigner::random().to_bytes().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{prepare_root_delegation, DelegationParams};

    #[tokio::test]
    async fn test_local_account_signs_own_delegations() {
        let account = LocalAccount::new(PrivateKeySigner::random(), ChainConfig::default());
        let delegation = prepare_root_delegation(
            &account.chain_config().environment,
            account.address(),
            Address::repeat_byte(0x44),
            &DelegationParams::default(),
        );

        let signed = account.sign_delegation(delegation.clone()).await.unwrap();
        assert_eq!(signed.delegation(), &delegation);

        let recovered = eip712::verify_delegation_signature(
            &delegation,
            signed.signature(),
            account.chain_config(),
        )
        .unwrap();
        assert_eq!(recovered, account.address());
    }

    #[tokio::test]
    async fn test_not_deployed_without_provider() {
        let account = LocalAccount::new(PrivateKeySigner::random(), ChainConfig::default());
        assert!(!account.is_deployed().await.unwrap());
    }

    #[tokio::test]
    async fn test_refuses_foreign_delegator() {
        let account = LocalAccount::new(PrivateKeySigner::random(), ChainConfig::default());
        let delegation = prepare_root_delegation(
            &account.chain_config().environment,
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x44),
            &DelegationParams::default(),
        );
        assert!(account.sign_delegation(delegation).await.is_err());
    }

    #[test]
    fn test_factory_checks_chain() {
        let factory = LocalAccountFactory::default();
        let err = factory.create(PrivateKeySigner::random(), 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please switch to the Sepolia network (Chain ID: 11155111)"
        );
        assert!(factory
            .create(PrivateKeySigner::random(), crate::SEPOLIA_CHAIN_ID)
            .is_ok());
    }

    #[test]
    fn test_generated_key_parses() {
        let key = generate_delegate_key();
        assert!(key.starts_with("0x"));
        assert_eq!(key.len(), 66);
        let signer = parse_signer(&key).unwrap();
        assert_eq!(parse_signer(&key[2..]).unwrap().address(), signer.address());
        assert!(parse_signer("not-a-key").is_err());
    }
}
