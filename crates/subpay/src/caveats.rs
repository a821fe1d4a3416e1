//! Caveat construction for the framework's built-in enforcers.
//!
//! Terms layouts (all big-endian, packed):
//! - limited calls: `uint256 limit`
//! - timestamp: `uint128 afterThreshold ‖ uint128 beforeThreshold`
//! - native token transfer amount: `uint256 allowance`

use alloy::primitives::{U128, U256};

use crate::constants::DelegationEnvironment;
use crate::delegation::Caveat;
use crate::error::SubpayError;

/// Accumulates caveats bound to one chain's enforcer deployments.
pub struct CaveatBuilder<'a> {
    environment: &'a DelegationEnvironment,
    caveats: Vec<Caveat>,
}

impl<'a> CaveatBuilder<'a> {
    pub fn new(environment: &'a DelegationEnvironment) -> Self {
        Self {
            environment,
            caveats: Vec::new(),
        }
    }

    /// Allow at most `limit` redemptions.
    pub fn limited_calls(mut self, limit: u64) -> Self {
        self.caveats.push(Caveat::new(
            self.environment.limited_calls_enforcer,
            U256::from(limit).to_be_bytes_vec(),
        ));
        self
    }

    /// Allow redemption only strictly after `after` and strictly before
    /// `before` (Unix seconds). Zero disables the respective bound.
    pub fn timestamp(mut self, after: u64, before: u64) -> Self {
        let mut terms = Vec::with_capacity(32);
        terms.extend_from_slice(&U128::from(after).to_be_bytes::<16>());
        terms.extend_from_slice(&U128::from(before).to_be_bytes::<16>());
        self.caveats
            .push(Caveat::new(self.environment.timestamp_enforcer, terms));
        self
    }

    /// Cap the total native value moved through the delegation.
    pub fn native_token_transfer_amount(mut self, allowance: U256) -> Self {
        self.caveats.push(Caveat::new(
            self.environment.native_token_transfer_amount_enforcer,
            allowance.to_be_bytes_vec(),
        ));
        self
    }

    pub fn build(self) -> Vec<Caveat> {
        self.caveats
    }
}

fn word(caveat: &Caveat, what: &str) -> Result<[u8; 32], SubpayError> {
    <[u8; 32]>::try_from(caveat.terms.as_ref()).map_err(|_| {
        SubpayError::InvalidDelegation(format!(
            "{what} terms must be 32 bytes, got {}",
            caveat.terms.len()
        ))
    })
}

/// Read the call-count limit back from a limited-calls caveat.
pub fn decode_limited_calls(caveat: &Caveat) -> Result<U256, SubpayError> {
    Ok(U256::from_be_bytes(word(caveat, "limited calls")?))
}

/// Read `(after, before)` back from a timestamp caveat.
pub fn decode_timestamp(caveat: &Caveat) -> Result<(u128, u128), SubpayError> {
    let bytes = word(caveat, "timestamp")?;
    let mut after = [0u8; 16];
    let mut before = [0u8; 16];
    after.copy_from_slice(&bytes[..16]);
    before.copy_from_slice(&bytes[16..]);
    Ok((u128::from_be_bytes(after), u128::from_be_bytes(before)))
}

/// Find the call-count limit among `caveats`, if a limited-calls caveat is present.
pub fn find_call_limit(
    environment: &DelegationEnvironment,
    caveats: &[Caveat],
) -> Result<Option<U256>, SubpayError> {
    caveats
        .iter()
        .find(|c| c.enforcer == environment.limited_calls_enforcer)
        .map(decode_limited_calls)
        .transpose()
}
