//! Delegation data model.
//!
//! A [`Delegation`] is the unsigned descriptor produced by the builder. Once
//! signed it becomes a [`SignedDelegation`], which is the only form that can be
//! stored or redeemed. The signed form exposes its delegation read-only; the
//! renewal counter in its metadata is the single mutable field.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::abi;
use crate::constants::ROOT_AUTHORITY;
use crate::error::SubpayError;

/// A restriction attached to a delegation, enforced on-chain by `enforcer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caveat {
    pub enforcer: Address,
    pub terms: Bytes,
    /// Redemption-time arguments. Not covered by the delegator's signature.
    #[serde(default)]
    pub args: Bytes,
}

impl Caveat {
    pub fn new(enforcer: Address, terms: impl Into<Bytes>) -> Self {
        Self {
            enforcer,
            terms: terms.into(),
            args: Bytes::new(),
        }
    }
}

/// Unsigned delegation: `delegator` allows `delegate` to act on its behalf
/// within the limits of `caveats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegation {
    pub delegate: Address,
    pub delegator: Address,
    pub authority: B256,
    pub caveats: Vec<Caveat>,
    #[serde(with = "decimal_u256")]
    pub salt: U256,
}

impl Delegation {
    /// Root delegation (no parent authority) with salt zero.
    pub fn new(delegator: Address, delegate: Address, caveats: Vec<Caveat>) -> Self {
        Self {
            delegate,
            delegator,
            authority: ROOT_AUTHORITY,
            caveats,
            salt: U256::ZERO,
        }
    }

    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = salt;
        self
    }

    pub fn is_root(&self) -> bool {
        self.authority == ROOT_AUTHORITY
    }

    /// ABI form with the given signature, as passed to the DelegationManager.
    pub fn to_abi(&self, signature: Bytes) -> abi::Delegation {
        abi::Delegation {
            delegate: self.delegate,
            delegator: self.delegator,
            authority: self.authority,
            caveats: self
                .caveats
                .iter()
                .map(|c| abi::Caveat {
                    enforcer: c.enforcer,
                    terms: c.terms.clone(),
                    args: c.args.clone(),
                })
                .collect(),
            salt: self.salt,
            signature,
        }
    }
}

impl From<&abi::Delegation> for Delegation {
    fn from(d: &abi::Delegation) -> Self {
        Self {
            delegate: d.delegate,
            delegator: d.delegator,
            authority: d.authority,
            caveats: d
                .caveats
                .iter()
                .map(|c| Caveat {
                    enforcer: c.enforcer,
                    terms: c.terms.clone(),
                    args: c.args.clone(),
                })
                .collect(),
            salt: d.salt,
        }
    }
}

/// Subscription bookkeeping stored beside a signed delegation.
/// Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationMetadata {
    pub is_subscription: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<u32>,
    pub period_secs: u64,
    pub max_renewals: u64,
    #[serde(default)]
    pub current_renewals: u64,
    pub created_at: u64,
}

const SIGNATURE_LEN: usize = 65;

/// A delegation together with the delegator's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSignedDelegation")]
pub struct SignedDelegation {
    #[serde(flatten)]
    delegation: Delegation,
    signature: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<DelegationMetadata>,
}

impl SignedDelegation {
    /// Attach a signature. Rejects anything but a 65-byte `r ‖ s ‖ v` signature.
    pub fn new(
        delegation: Delegation,
        signature: Bytes,
        metadata: Option<DelegationMetadata>,
    ) -> Result<Self, SubpayError> {
        if signature.is_empty() {
            return Err(SubpayError::InvalidDelegation(
                "delegation is not signed".to_string(),
            ));
        }
        if signature.len() != SIGNATURE_LEN {
            return Err(SubpayError::InvalidDelegation(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                signature.len()
            )));
        }
        Ok(Self {
            delegation,
            signature,
            metadata,
        })
    }

    pub fn delegation(&self) -> &Delegation {
        &self.delegation
    }

    pub fn delegate(&self) -> Address {
        self.delegation.delegate
    }

    pub fn delegator(&self) -> Address {
        self.delegation.delegator
    }

    pub fn caveats(&self) -> &[Caveat] {
        &self.delegation.caveats
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn metadata(&self) -> Option<&DelegationMetadata> {
        self.metadata.as_ref()
    }

    /// Replace the metadata. The signed delegation itself is untouched.
    pub fn with_metadata(mut self, metadata: DelegationMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Increment the renewal counter after a successful redemption.
    /// Returns the new count.
    pub fn record_renewal(&mut self) -> Result<u64, SubpayError> {
        let meta = self.metadata.as_mut().ok_or_else(|| {
            SubpayError::InvalidDelegation("delegation has no subscription metadata".to_string())
        })?;
        meta.current_renewals = meta.current_renewals.saturating_add(1);
        Ok(meta.current_renewals)
    }

    pub fn to_abi(&self) -> abi::Delegation {
        self.delegation.to_abi(self.signature.clone())
    }
}

#[derive(Deserialize)]
struct RawSignedDelegation {
    #[serde(flatten)]
    delegation: Delegation,
    #[serde(default)]
    signature: Bytes,
    #[serde(default)]
    metadata: Option<DelegationMetadata>,
}

impl TryFrom<RawSignedDelegation> for SignedDelegation {
    type Error = SubpayError;

    fn try_from(raw: RawSignedDelegation) -> Result<Self, Self::Error> {
        SignedDelegation::new(raw.delegation, raw.signature, raw.metadata)
    }
}

/// Serializes a `U256` as a decimal string so that large values survive any
/// JSON consumer without precision loss. Accepts decimal or `0x` hex on input.
pub(crate) mod decimal_u256 {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<U256>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Delegation {
        Delegation::new(
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            vec![Caveat::new(Address::repeat_byte(0x33), vec![0u8; 32])],
        )
    }

    #[test]
    fn test_new_is_root_with_zero_salt() {
        let d = sample();
        assert!(d.is_root());
        assert_eq!(d.salt, U256::ZERO);
    }

    #[test]
    fn test_unsigned_rejected() {
        let err = SignedDelegation::new(sample(), Bytes::new(), None).unwrap_err();
        assert!(matches!(err, SubpayError::InvalidDelegation(_)));
    }

    #[test]
    fn test_short_signature_rejected() {
        for len in [1usize, 64, 66] {
            let err = SignedDelegation::new(sample(), Bytes::from(vec![1u8; len]), None).unwrap_err();
            assert!(matches!(err, SubpayError::InvalidDelegation(_)));
        }
        let mut json = serde_json::to_value(sample()).unwrap();
        json["signature"] = serde_json::Value::String("0x01".to_string());
        assert!(serde_json::from_value::<SignedDelegation>(json).is_err());
    }

    #[test]
    fn test_deserialize_without_signature_fails() {
        let json = serde_json::to_value(sample()).unwrap();
        let parsed: Result<SignedDelegation, _> = serde_json::from_value(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_salt_serialized_as_decimal_string() {
        let d = sample().with_salt(U256::MAX);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["salt"], U256::MAX.to_string());
        let back: Delegation = serde_json::from_value(json).unwrap();
        assert_eq!(back.salt, U256::MAX);
    }

    #[test]
    fn test_record_renewal_requires_metadata() {
        let mut signed = SignedDelegation::new(sample(), Bytes::from(vec![1u8; 65]), None).unwrap();
        assert!(signed.record_renewal().is_err());

        let mut signed = signed.with_metadata(DelegationMetadata {
            is_subscription: true,
            plan_id: Some(1),
            period_secs: 60,
            max_renewals: 3,
            current_renewals: 0,
            created_at: 0,
        });
        assert_eq!(signed.record_renewal().unwrap(), 1);
        assert_eq!(signed.record_renewal().unwrap(), 2);
        assert_eq!(signed.metadata().unwrap().current_renewals, 2);
    }

    #[test]
    fn test_abi_conversion_preserves_fields() {
        let d = sample().with_salt(U256::from(7u64));
        let abi = d.to_abi(Bytes::from(vec![9u8; 65]));
        assert_eq!(abi.signature.len(), 65);
        assert_eq!(Delegation::from(&abi), d);
    }
}
