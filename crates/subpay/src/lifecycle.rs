//! Subscription lifecycle arithmetic.
//!
//! All functions are pure over Unix seconds and saturate instead of
//! overflowing, so they are total over their inputs.

use serde::{Deserialize, Serialize};

use crate::delegation::SignedDelegation;
use crate::error::SubpayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => f.write_str("Active"),
            SubscriptionStatus::Expired => f.write_str("Expired"),
        }
    }
}

/// `start + period * (completed + 1)`.
pub fn next_payment_date(start: u64, period: u64, completed: u64) -> u64 {
    start.saturating_add(period.saturating_mul(completed.saturating_add(1)))
}

/// End of the subscription: `start + period * max_renewals`.
pub fn expires_at(start: u64, period: u64, max_renewals: u64) -> u64 {
    start.saturating_add(period.saturating_mul(max_renewals))
}

/// Active while `now` is before [`expires_at`]. The completed count does not
/// affect the result.
pub fn status(
    now: u64,
    start: u64,
    period: u64,
    max_renewals: u64,
    _completed: u64,
) -> SubscriptionStatus {
    if now < expires_at(start, period, max_renewals) {
        SubscriptionStatus::Active
    } else {
        SubscriptionStatus::Expired
    }
}

pub fn remaining_renewals(max_renewals: u64, completed: u64) -> u64 {
    max_renewals.saturating_sub(completed)
}

/// A subscription instance derived from a signed delegation's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub plan_id: Option<u32>,
    pub start: u64,
    pub period_secs: u64,
    pub max_renewals: u64,
    pub current_renewals: u64,
}

/// Point-in-time view of a subscription, as shown to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub plan_id: Option<u32>,
    pub start_date: u64,
    pub next_payment_date: u64,
    pub expires_at: u64,
    pub period_secs: u64,
    pub max_renewals: u64,
    pub current_renewals: u64,
    pub status: SubscriptionStatus,
}

impl Subscription {
    /// Fails for delegations without subscription metadata.
    pub fn from_signed(signed: &SignedDelegation) -> Result<Self, SubpayError> {
        let meta = signed
            .metadata()
            .filter(|m| m.is_subscription)
            .ok_or_else(|| {
                SubpayError::NotFound("delegation carries no subscription".to_string())
            })?;
        Ok(Self {
            plan_id: meta.plan_id,
            start: meta.created_at,
            period_secs: meta.period_secs,
            max_renewals: meta.max_renewals,
            current_renewals: meta.current_renewals,
        })
    }

    pub fn next_payment_date(&self) -> u64 {
        next_payment_date(self.start, self.period_secs, self.current_renewals)
    }

    pub fn expires_at(&self) -> u64 {
        expires_at(self.start, self.period_secs, self.max_renewals)
    }

    pub fn status(&self, now: u64) -> SubscriptionStatus {
        status(
            now,
            self.start,
            self.period_secs,
            self.max_renewals,
            self.current_renewals,
        )
    }

    pub fn remaining_renewals(&self) -> u64 {
        remaining_renewals(self.max_renewals, self.current_renewals)
    }

    /// Whether another payment may be collected at `now`.
    pub fn can_renew(&self, now: u64) -> bool {
        self.status(now) == SubscriptionStatus::Active && self.remaining_renewals() > 0
    }

    pub fn details(&self, now: u64) -> SubscriptionDetails {
        SubscriptionDetails {
            plan_id: self.plan_id,
            start_date: self.start,
            next_payment_date: self.next_payment_date(),
            expires_at: self.expires_at(),
            period_secs: self.period_secs,
            max_renewals: self.max_renewals,
            current_renewals: self.current_renewals,
            status: self.status(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::MONTHLY;

    #[test]
    fn test_first_payment_is_one_period_after_start() {
        assert_eq!(next_payment_date(1_000, 60, 0), 1_060);
        assert_eq!(next_payment_date(1_000, 60, 4), 1_300);
    }

    #[test]
    fn test_active_for_every_completed_below_max() {
        let (start, period, max) = (10_000, 500, 6);
        for completed in 0..max {
            let due = next_payment_date(start, period, completed);
            assert_eq!(
                status(due - 1, start, period, max, completed),
                SubscriptionStatus::Active
            );
        }
        for completed in max..max + 3 {
            let now = expires_at(start, period, max);
            assert_eq!(
                status(now, start, period, max, completed),
                SubscriptionStatus::Expired
            );
        }
    }

    #[test]
    fn test_twelve_month_boundary() {
        let t = 1_700_000_000;
        let end = t + MONTHLY * 12;
        assert_eq!(status(end - 1, t, MONTHLY, 12, 0), SubscriptionStatus::Active);
        assert_eq!(status(end, t, MONTHLY, 12, 0), SubscriptionStatus::Expired);
    }

    #[test]
    fn test_degenerate_inputs() {
        // zero renewals: expired immediately
        assert_eq!(status(5, 5, 60, 0, 0), SubscriptionStatus::Expired);
        // zero period: expired immediately regardless of renewals
        assert_eq!(status(5, 5, 0, 12, 0), SubscriptionStatus::Expired);
        assert_eq!(next_payment_date(5, 0, 3), 5);
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        assert_eq!(next_payment_date(u64::MAX - 1, u64::MAX, 2), u64::MAX);
        assert_eq!(expires_at(1, u64::MAX, u64::MAX), u64::MAX);
        assert_eq!(
            status(u64::MAX - 1, 1, u64::MAX, 2, 0),
            SubscriptionStatus::Active
        );
    }

    #[test]
    fn test_remaining_and_can_renew() {
        let sub = Subscription {
            plan_id: Some(1),
            start: 0,
            period_secs: 100,
            max_renewals: 2,
            current_renewals: 2,
        };
        assert_eq!(sub.remaining_renewals(), 0);
        assert!(!sub.can_renew(50));

        let sub = Subscription {
            current_renewals: 1,
            ..sub
        };
        assert!(sub.can_renew(50));
        assert!(!sub.can_renew(200));

        let details = sub.details(50);
        assert_eq!(details.next_payment_date, 200);
        assert_eq!(details.expires_at, 200);
        assert_eq!(details.status, SubscriptionStatus::Active);
    }
}
