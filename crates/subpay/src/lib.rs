//! Recurring payments authorised by signed delegations.
//!
//! A subscriber (the delegator) signs a delegation allowing a merchant-side
//! delegate account to redeem it a bounded number of times. Each redemption
//! pays one period's price to the merchant. On-chain enforcement (signature
//! checks, caveat enforcers) belongs to the delegation framework contracts;
//! this crate builds, signs, stores, encodes and submits.
//!
//! # Pieces
//!
//! - [`builder::prepare_root_delegation`]: delegation descriptor with caveats
//! - [`account::SmartAccount`]: signing capability ([`account::LocalAccount`] in-crate)
//! - [`store::DelegationStore`]: signed delegations keyed by delegate address
//! - [`redeem::prepare_redeem_delegation_data`]: `redeemDelegations` calldata
//! - [`lifecycle`]: next payment date and active/expired status
//! - [`service::SubscriptionService`]: subscribe and process-payment flows
//! - [`steps::Wizard`]: the linear setup flow as an explicit state value
//!
//! # Quick example
//!
//! ```no_run
//! use subpay::builder::{prepare_root_delegation, DelegationParams};
//! use subpay::lifecycle::{status, SubscriptionStatus};
//! use alloy::primitives::Address;
//!
//! let env = subpay::DelegationEnvironment::default();
//! let delegation = prepare_root_delegation(
//!     &env,
//!     Address::repeat_byte(1),
//!     Address::repeat_byte(2),
//!     &DelegationParams::subscription(subpay::plans::MONTHLY, 12),
//! );
//! assert_eq!(delegation.caveats.len(), 1);
//! assert_eq!(status(100, 0, 60, 12, 0), SubscriptionStatus::Active);
//! ```

pub mod constants;
pub mod error;

pub mod caveats;
pub mod delegation;
pub mod eip712;
pub mod lifecycle;
pub mod plans;
pub mod redeem;

pub mod account;
pub mod builder;
pub mod executor;
pub mod service;
pub mod steps;
pub mod store;
pub mod wallet;

#[cfg(feature = "full")]
pub mod config;

/// ABI types of the delegation framework contracts.
pub mod abi {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        struct Caveat {
            address enforcer;
            bytes terms;
            bytes args;
        }

        #[derive(Debug, PartialEq, Eq)]
        struct Delegation {
            address delegate;
            address delegator;
            bytes32 authority;
            Caveat[] caveats;
            uint256 salt;
            bytes signature;
        }

        interface IDelegationManager {
            function redeemDelegations(
                bytes[] calldata permissionContexts,
                bytes32[] calldata modes,
                bytes[] calldata executionCallDatas
            ) external;
        }
    }
}

// Re-exports
pub use constants::*;
pub use delegation::{Caveat, Delegation, DelegationMetadata, SignedDelegation};
pub use error::SubpayError;
