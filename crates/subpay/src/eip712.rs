//! EIP-712 typed-data hashing, signing and signature verification for delegations.
//!
//! Provides functions for:
//! - Building the DelegationManager domain ([`delegation_domain`])
//! - Computing signing hashes ([`signing_hash`])
//! - Signing with a local key ([`sign_delegation`])
//! - Verifying signatures with EIP-2 malleability protection ([`verify_delegation_signature`])
//!
//! `args` of each caveat are excluded from the signed struct; they are supplied
//! at redemption time.

use alloy::primitives::{Address, Bytes, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol_types::SolStruct;

use crate::delegation::Delegation;
use crate::{ChainConfig, SubpayError};

mod typed {
    alloy::sol! {
        struct Caveat {
            address enforcer;
            bytes terms;
        }

        struct Delegation {
            address delegate;
            address delegator;
            bytes32 authority;
            Caveat[] caveats;
            uint256 salt;
        }
    }
}

fn typed_delegation(delegation: &Delegation) -> typed::Delegation {
    typed::Delegation {
        delegate: delegation.delegate,
        delegator: delegation.delegator,
        authority: delegation.authority,
        caveats: delegation
            .caveats
            .iter()
            .map(|c| typed::Caveat {
                enforcer: c.enforcer,
                terms: c.terms.clone(),
            })
            .collect(),
        salt: delegation.salt,
    }
}

/// The EIP-712 domain of the DelegationManager on the configured chain.
pub fn delegation_domain(config: &ChainConfig) -> alloy::sol_types::Eip712Domain {
    alloy::sol_types::Eip712Domain {
        name: Some(std::borrow::Cow::Owned(config.eip712_domain_name.clone())),
        version: Some(std::borrow::Cow::Owned(
            config.eip712_domain_version.clone(),
        )),
        chain_id: Some(U256::from(config.chain_id)),
        verifying_contract: Some(config.environment.delegation_manager),
        salt: None,
    }
}

/// Compute the EIP-712 signing hash of a delegation.
pub fn signing_hash(delegation: &Delegation, config: &ChainConfig) -> B256 {
    typed_delegation(delegation).eip712_signing_hash(&delegation_domain(config))
}

/// Sign a delegation with a local key. Returns the 65-byte signature.
pub fn sign_delegation(
    signer: &PrivateKeySigner,
    delegation: &Delegation,
    config: &ChainConfig,
) -> Result<Bytes, SubpayError> {
    let hash = signing_hash(delegation, config);
    let sig = signer
        .sign_hash_sync(&hash)
        .map_err(|e| SubpayError::SignatureError(format!("signing failed: {e}")))?;
    Ok(Bytes::from(sig.as_bytes().to_vec()))
}

/// secp256k1 curve order N / 2: signatures with s > this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Recover the signer of a delegation signature.
/// Rejects high-s signatures to prevent malleability (EIP-2).
pub fn verify_delegation_signature(
    delegation: &Delegation,
    signature_bytes: &[u8],
    config: &ChainConfig,
) -> Result<Address, SubpayError> {
    if signature_bytes.len() != 65 {
        return Err(SubpayError::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| SubpayError::SignatureError(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(SubpayError::SignatureError(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let hash = signing_hash(delegation, config);
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| SubpayError::SignatureError(format!("recovery failed: {e}")))
}
