use alloy::primitives::{address, Address, B256};

/// Sepolia chain ID.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Human-readable name of the default chain, used in user-facing messages.
pub const SEPOLIA_NAME: &str = "Sepolia";

/// Default RPC endpoint for Sepolia.
pub const RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// Block explorer base URL.
pub const EXPLORER_BASE: &str = "https://sepolia.etherscan.io";

/// Native token (ETH) has 18 decimal places.
pub const NATIVE_DECIMALS: u32 = 18;

/// Native token symbol.
pub const NATIVE_SYMBOL: &str = "ETH";

/// Authority value marking a delegation as a root delegation (no parent).
pub const ROOT_AUTHORITY: B256 = B256::repeat_byte(0xff);

/// Execution mode for a single call with default (revert on failure) semantics.
pub const SINGLE_DEFAULT_MODE: B256 = B256::ZERO;

/// Default number of renewals a subscription delegation allows.
pub const DEFAULT_MAX_RENEWALS: u64 = 12;

/// DelegationManager deployment shared by all supported chains.
pub const DELEGATION_MANAGER: Address = address!("db9b1e94b5b69df7e401ddbede43491141047db3");

/// ERC-4337 EntryPoint v0.7.
pub const ENTRY_POINT: Address = address!("0000000071727de22e5e9d8baf0edac6f37da032");

/// Caveat enforcer limiting the number of redemptions.
pub const LIMITED_CALLS_ENFORCER: Address = address!("04658b29f6b82ed55274221a06fc97d318e25416");

/// Caveat enforcer restricting redemption to a time window.
pub const TIMESTAMP_ENFORCER: Address = address!("1046bb45c8d673d4ea75321280db34899413c069");

/// Caveat enforcer capping the total native value transferred.
pub const NATIVE_TOKEN_TRANSFER_AMOUNT_ENFORCER: Address =
    address!("f71af580b9c3078fbc2bbf16fbb8eed82b330320");

/// Contract addresses of the delegation framework on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegationEnvironment {
    pub delegation_manager: Address,
    pub entry_point: Address,
    pub limited_calls_enforcer: Address,
    pub timestamp_enforcer: Address,
    pub native_token_transfer_amount_enforcer: Address,
}

impl Default for DelegationEnvironment {
    fn default() -> Self {
        Self {
            delegation_manager: DELEGATION_MANAGER,
            entry_point: ENTRY_POINT,
            limited_calls_enforcer: LIMITED_CALLS_ENFORCER,
            timestamp_enforcer: TIMESTAMP_ENFORCER,
            native_token_transfer_amount_enforcer: NATIVE_TOKEN_TRANSFER_AMOUNT_ENFORCER,
        }
    }
}

/// Runtime chain configuration. Keeps delegation building, signing and
/// redemption independent of compile-time constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_url: String,
    pub explorer_base: String,
    pub native_decimals: u32,
    pub native_symbol: String,
    pub environment: DelegationEnvironment,
    pub eip712_domain_name: String,
    pub eip712_domain_version: String,
}

impl Default for ChainConfig {
    /// Defaults to Sepolia.
    fn default() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            chain_name: SEPOLIA_NAME.to_string(),
            rpc_url: RPC_URL.to_string(),
            explorer_base: EXPLORER_BASE.to_string(),
            native_decimals: NATIVE_DECIMALS,
            native_symbol: NATIVE_SYMBOL.to_string(),
            environment: DelegationEnvironment::default(),
            eip712_domain_name: "DelegationManager".to_string(),
            eip712_domain_version: "1".to_string(),
        }
    }
}
