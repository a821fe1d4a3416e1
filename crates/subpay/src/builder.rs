//! Delegation descriptors for plain and subscription delegations.

use alloy::primitives::{Address, U256};

use crate::caveats::CaveatBuilder;
use crate::constants::{DelegationEnvironment, DEFAULT_MAX_RENEWALS};
use crate::delegation::{Delegation, DelegationMetadata};
use crate::lifecycle;
use crate::plans::MONTHLY;

/// Inputs to [`prepare_root_delegation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationParams {
    pub is_subscription: bool,
    pub period_secs: u64,
    pub max_renewals: u64,
    pub plan_id: Option<u32>,
    /// When set, a timestamp caveat restricting redemption to
    /// `[from, from + period * max_renewals)` is attached. Off by default.
    pub time_bound_from: Option<u64>,
    pub salt: U256,
}

impl Default for DelegationParams {
    /// A one-shot (non-subscription) delegation.
    fn default() -> Self {
        Self {
            is_subscription: false,
            period_secs: MONTHLY,
            max_renewals: DEFAULT_MAX_RENEWALS,
            plan_id: None,
            time_bound_from: None,
            salt: U256::ZERO,
        }
    }
}

impl DelegationParams {
    pub fn subscription(period_secs: u64, max_renewals: u64) -> Self {
        Self {
            is_subscription: true,
            period_secs,
            max_renewals,
            ..Self::default()
        }
    }

    pub fn with_plan(mut self, plan_id: u32) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    pub fn with_time_bound(mut self, from: u64) -> Self {
        self.time_bound_from = Some(from);
        self
    }

    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = salt;
        self
    }
}

/// Build an unsigned root delegation from `delegator` to `delegate`.
///
/// Non-subscription delegations carry a call limit of exactly 1; subscription
/// delegations a call limit of exactly `max_renewals`. Period and renewal
/// counts are not range-checked: zero produces a delegation that can never
/// be redeemed (or is expired from the start).
pub fn prepare_root_delegation(
    environment: &DelegationEnvironment,
    delegator: Address,
    delegate: Address,
    params: &DelegationParams,
) -> Delegation {
    let mut caveats = CaveatBuilder::new(environment);

    if !params.is_subscription {
        caveats = caveats.limited_calls(1);
    } else {
        if params.max_renewals == 0 || params.period_secs == 0 {
            tracing::warn!(
                period_secs = params.period_secs,
                max_renewals = params.max_renewals,
                "building degenerate subscription delegation"
            );
        }
        caveats = caveats.limited_calls(params.max_renewals);

        if let Some(from) = params.time_bound_from {
            let until =
                lifecycle::expires_at(from, params.period_secs, params.max_renewals);
            // The enforcer's lower bound is exclusive.
            caveats = caveats.timestamp(from.saturating_sub(1), until);
        }
    }

    let delegation =
        Delegation::new(delegator, delegate, caveats.build()).with_salt(params.salt);

    tracing::debug!(
        delegator = %delegator,
        delegate = %delegate,
        subscription = params.is_subscription,
        caveats = delegation.caveats.len(),
        "prepared root delegation"
    );

    delegation
}

/// Metadata to store beside a subscription delegation signed at `created_at`.
pub fn subscription_metadata(params: &DelegationParams, created_at: u64) -> DelegationMetadata {
    DelegationMetadata {
        is_subscription: params.is_subscription,
        plan_id: params.plan_id,
        period_secs: params.period_secs,
        max_renewals: params.max_renewals,
        current_renewals: 0,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caveats::{decode_limited_calls, decode_timestamp, find_call_limit};

    fn addrs() -> (Address, Address) {
        (Address::repeat_byte(0xaa), Address::repeat_byte(0xbb))
    }

    #[test]
    fn test_plain_delegation_limits_to_one_call() {
        let env = DelegationEnvironment::default();
        let (from, to) = addrs();
        // period and renewals are ignored for plain delegations
        let params = DelegationParams {
            max_renewals: 40,
            ..DelegationParams::default()
        };
        let d = prepare_root_delegation(&env, from, to, &params);
        assert_eq!(d.delegator, from);
        assert_eq!(d.delegate, to);
        assert!(d.is_root());
        assert_eq!(d.caveats.len(), 1);
        assert_eq!(decode_limited_calls(&d.caveats[0]).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_subscription_limit_equals_max_renewals() {
        let env = DelegationEnvironment::default();
        let (from, to) = addrs();
        for n in [1u64, 12, 365] {
            let d = prepare_root_delegation(
                &env,
                from,
                to,
                &DelegationParams::subscription(MONTHLY, n),
            );
            assert_eq!(d.caveats.len(), 1);
            assert_eq!(find_call_limit(&env, &d.caveats).unwrap(), Some(U256::from(n)));
        }
    }

    #[test]
    fn test_degenerate_inputs_accepted() {
        let env = DelegationEnvironment::default();
        let (from, to) = addrs();
        let d = prepare_root_delegation(&env, from, to, &DelegationParams::subscription(0, 0));
        assert_eq!(decode_limited_calls(&d.caveats[0]).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_time_bound_is_opt_in() {
        let env = DelegationEnvironment::default();
        let (from, to) = addrs();
        let params = DelegationParams::subscription(100, 3).with_time_bound(1_000);
        let d = prepare_root_delegation(&env, from, to, &params);
        assert_eq!(d.caveats.len(), 2);
        assert_eq!(d.caveats[1].enforcer, env.timestamp_enforcer);
        assert_eq!(decode_timestamp(&d.caveats[1]).unwrap(), (999, 1_300));
    }

    #[test]
    fn test_salt_and_metadata() {
        let env = DelegationEnvironment::default();
        let (from, to) = addrs();
        let params = DelegationParams::subscription(MONTHLY, 12)
            .with_plan(2)
            .with_salt(U256::from(99u64));
        let d = prepare_root_delegation(&env, from, to, &params);
        assert_eq!(d.salt, U256::from(99u64));

        let meta = subscription_metadata(&params, 1_700_000_000);
        assert!(meta.is_subscription);
        assert_eq!(meta.plan_id, Some(2));
        assert_eq!(meta.max_renewals, 12);
        assert_eq!(meta.current_renewals, 0);
        assert_eq!(meta.created_at, 1_700_000_000);
    }
}
