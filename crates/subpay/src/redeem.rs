//! Calldata for `DelegationManager.redeemDelegations`.
//!
//! One redemption carries one delegation chain, one execution mode and one
//! execution. Executions use the ERC-7579 single-call packing
//! `target (20) ‖ value (32) ‖ callData`.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};

use crate::abi::{self, IDelegationManager};
use crate::constants::SINGLE_DEFAULT_MODE;
use crate::delegation::{Delegation, SignedDelegation};
use crate::error::SubpayError;

/// A call the delegator's account performs when the delegation is redeemed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub target: Address,
    pub value: U256,
    pub call_data: Bytes,
}

impl Execution {
    /// Zero-value call to the zero address. Moves no funds.
    pub fn empty() -> Self {
        Self {
            target: Address::ZERO,
            value: U256::ZERO,
            call_data: Bytes::new(),
        }
    }

    /// Plain native-value transfer of `amount` to `recipient`.
    pub fn payment(recipient: Address, amount: U256) -> Self {
        Self {
            target: recipient,
            value: amount,
            call_data: Bytes::new(),
        }
    }

    pub fn is_value_transfer(&self) -> bool {
        self.call_data.is_empty() && !self.value.is_zero()
    }
}

/// Pack an execution in ERC-7579 single-call format.
pub fn encode_single_execution(execution: &Execution) -> Bytes {
    let mut out = Vec::with_capacity(52 + execution.call_data.len());
    out.extend_from_slice(execution.target.as_slice());
    out.extend_from_slice(&execution.value.to_be_bytes::<32>());
    out.extend_from_slice(&execution.call_data);
    Bytes::from(out)
}

/// Inverse of [`encode_single_execution`].
pub fn decode_single_execution(data: &[u8]) -> Result<Execution, SubpayError> {
    if data.len() < 52 {
        return Err(SubpayError::InvalidDelegation(format!(
            "execution must be at least 52 bytes, got {}",
            data.len()
        )));
    }
    let mut value = [0u8; 32];
    value.copy_from_slice(&data[20..52]);
    Ok(Execution {
        target: Address::from_slice(&data[..20]),
        value: U256::from_be_bytes(value),
        call_data: Bytes::copy_from_slice(&data[52..]),
    })
}

/// Encode a redemption of `chain` (leaf first) performing `execution`.
pub fn encode_redeem_delegations(
    chain: &[&SignedDelegation],
    mode: B256,
    execution: &Execution,
) -> Bytes {
    let permission_context: Vec<abi::Delegation> =
        chain.iter().map(|signed| signed.to_abi()).collect();

    let call = IDelegationManager::redeemDelegationsCall {
        permissionContexts: vec![Bytes::from(permission_context.abi_encode())],
        modes: vec![mode],
        executionCallDatas: vec![encode_single_execution(execution)],
    };
    Bytes::from(call.abi_encode())
}

/// Calldata redeeming `delegation` once.
///
/// Without a payment, or with a zero amount, this is the empty execution;
/// otherwise it is exactly one execution transferring `amount` to `recipient`.
pub fn prepare_redeem_delegation_data(
    delegation: &SignedDelegation,
    payment: Option<(Address, U256)>,
) -> Bytes {
    let execution = match payment {
        Some((recipient, amount)) if !amount.is_zero() => Execution::payment(recipient, amount),
        _ => Execution::empty(),
    };
    encode_redeem_delegations(&[delegation], SINGLE_DEFAULT_MODE, &execution)
}

/// A decoded redemption call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    /// One delegation chain per redemption, each with its signature.
    pub chains: Vec<Vec<(Delegation, Bytes)>>,
    pub modes: Vec<B256>,
    pub executions: Vec<Execution>,
}

/// Decode `redeemDelegations` calldata for inspection.
pub fn decode_redeem_delegation_data(data: &[u8]) -> Result<Redemption, SubpayError> {
    let call = IDelegationManager::redeemDelegationsCall::abi_decode(data).map_err(|e| {
        SubpayError::InvalidDelegation(format!("not a redeemDelegations call: {e}"))
    })?;

    let chains: Vec<Vec<(Delegation, Bytes)>> = call
        .permissionContexts
        .iter()
        .map(|ctx| {
            let decoded = Vec::<abi::Delegation>::abi_decode(ctx).map_err(|e| {
                SubpayError::InvalidDelegation(format!("bad permission context: {e}"))
            })?;
            Ok(decoded
                .iter()
                .map(|d| (Delegation::from(d), d.signature.clone()))
                .collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, SubpayError>>()?;

    let executions = call
        .executionCallDatas
        .iter()
        .map(|e| decode_single_execution(e))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Redemption {
        chains,
        modes: call.modes,
        executions,
    })
}
