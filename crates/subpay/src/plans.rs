//! Static subscription plan catalog and amount/period formatting.

use alloy::primitives::U256;

use crate::error::SubpayError;

/// One day in seconds.
pub const DAILY: u64 = 60 * 60 * 24;
/// One week in seconds.
pub const WEEKLY: u64 = DAILY * 7;
/// Thirty days in seconds.
pub const MONTHLY: u64 = DAILY * 30;
/// 365 days in seconds.
pub const YEARLY: u64 = DAILY * 365;

/// A purchasable plan. Prices are in wei.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPlan {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub price: U256,
    pub period_secs: u64,
    pub features: &'static [&'static str],
}

// 10^16 wei = 0.01 ETH
const CENTI_ETH: u64 = 10_000_000_000_000_000;

/// Process-wide plan catalog.
pub static SUBSCRIPTION_PLANS: [SubscriptionPlan; 3] = [
    SubscriptionPlan {
        id: 1,
        name: "Basic",
        description: "Access to basic content and features",
        price: U256::from_limbs([CENTI_ETH, 0, 0, 0]),
        period_secs: MONTHLY,
        features: &["Basic content access", "Standard support", "Single device"],
    },
    SubscriptionPlan {
        id: 2,
        name: "Premium",
        description: "Access to premium content plus extras",
        price: U256::from_limbs([5 * CENTI_ETH, 0, 0, 0]),
        period_secs: MONTHLY,
        features: &[
            "Premium content access",
            "Priority support",
            "Multiple devices",
            "No ads",
        ],
    },
    SubscriptionPlan {
        id: 3,
        name: "Annual",
        description: "Full access with annual savings",
        price: U256::from_limbs([50 * CENTI_ETH, 0, 0, 0]),
        period_secs: YEARLY,
        features: &[
            "All premium features",
            "VIP support",
            "Unlimited devices",
            "Offline access",
            "20% discount",
        ],
    },
];

pub fn plan_by_id(id: u32) -> Option<&'static SubscriptionPlan> {
    SUBSCRIPTION_PLANS.iter().find(|p| p.id == id)
}

/// Map a period label to seconds. Unknown labels fall back to monthly.
pub fn period_from_label(label: &str) -> u64 {
    match label.trim().to_ascii_lowercase().as_str() {
        "daily" => DAILY,
        "weekly" => WEEKLY,
        "monthly" => MONTHLY,
        "yearly" => YEARLY,
        _ => MONTHLY,
    }
}

/// Lowercase name of a known period, `"regular"` otherwise.
pub fn period_name(period_secs: u64) -> &'static str {
    match period_secs {
        DAILY => "daily",
        WEEKLY => "weekly",
        MONTHLY => "monthly",
        YEARLY => "yearly",
        _ => "regular",
    }
}

/// Capitalised billing-cycle label for display.
pub fn format_subscription_period(period_secs: u64) -> String {
    match period_secs {
        DAILY => "Daily".to_string(),
        WEEKLY => "Weekly".to_string(),
        MONTHLY => "Monthly".to_string(),
        YEARLY => "Yearly".to_string(),
        secs if secs % DAILY == 0 && secs > 0 => format!("Every {} days", secs / DAILY),
        secs => format!("Every {secs} seconds"),
    }
}

/// Parse a decimal amount such as `"0.01 ETH"` into base units with `decimals`
/// fractional digits. An optional leading `$` and a trailing symbol are
/// allowed; signs, exponents and any other characters are rejected. Excess
/// fractional digits are truncated. No floating point is involved.
pub fn parse_native_amount(amount: &str, decimals: u32) -> Result<U256, SubpayError> {
    let trimmed = amount.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let cleaned = trimmed
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim_end();

    if cleaned.is_empty() {
        return Err(SubpayError::InvalidDelegation(format!(
            "invalid amount '{amount}': no numeric content"
        )));
    }
    if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
        return Err(SubpayError::InvalidDelegation(format!(
            "invalid amount '{amount}': unexpected character '{bad}'"
        )));
    }

    let (integer_part, fractional_part) = cleaned.split_once('.').unwrap_or((cleaned, ""));
    if fractional_part.contains('.') {
        return Err(SubpayError::InvalidDelegation(format!(
            "invalid amount '{amount}': more than one decimal point"
        )));
    }

    let digits = decimals as usize;
    let mut frac = fractional_part[..fractional_part.len().min(digits)].to_string();
    while frac.len() < digits {
        frac.push('0');
    }

    let integer = if integer_part.is_empty() {
        U256::ZERO
    } else {
        integer_part.parse::<U256>().map_err(|e| {
            SubpayError::InvalidDelegation(format!("invalid amount '{amount}': integer part: {e}"))
        })?
    };
    let fractional = if frac.is_empty() {
        U256::ZERO
    } else {
        frac.parse::<U256>().map_err(|e| {
            SubpayError::InvalidDelegation(format!(
                "invalid amount '{amount}': fractional part: {e}"
            ))
        })?
    };

    let multiplier = U256::from(10u64).pow(U256::from(decimals));
    integer
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(fractional))
        .ok_or_else(|| SubpayError::InvalidDelegation(format!("invalid amount '{amount}': overflow")))
}

/// Render base units as a decimal string with trailing zeros removed,
/// e.g. `10^16` with 18 decimals and symbol `ETH` → `"0.01 ETH"`.
pub fn format_native_amount(amount: U256, decimals: u32, symbol: &str) -> String {
    let multiplier = U256::from(10u64).pow(U256::from(decimals));
    let integer = amount / multiplier;
    let fractional = amount % multiplier;

    if fractional.is_zero() {
        return format!("{integer} {symbol}");
    }

    let frac = format!("{:0>width$}", fractional.to_string(), width = decimals as usize);
    format!("{integer}.{} {symbol}", frac.trim_end_matches('0'))
}

/// Explorer link for a transaction hash.
pub fn transaction_url(explorer_base: &str, tx_hash: &str) -> String {
    format!("{}/tx/{tx_hash}", explorer_base.trim_end_matches('/'))
}

/// Format a Unix timestamp as a calendar date (UTC).
pub fn format_date(unix_secs: u64) -> String {
    i64::try_from(unix_secs)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}
