//! Subscribe and collect-payment flows.
//!
//! [`SubscriptionService`] ties the pieces together: the subscriber's account
//! signs a subscription delegation to the delegate, the delegation is stored
//! under the delegate's address, and each payment redeems it once through an
//! [`Executor`].

use std::collections::HashMap;

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::account::SmartAccount;
use crate::builder::{prepare_root_delegation, subscription_metadata, DelegationParams};
use crate::delegation::SignedDelegation;
use crate::executor::Executor;
use crate::lifecycle::{Subscription, SubscriptionDetails, SubscriptionStatus};
use crate::plans::plan_by_id;
use crate::redeem::prepare_redeem_delegation_data;
use crate::store::{DelegationStore, KeyValueStore};
use crate::{ChainConfig, SubpayError};

/// A collected payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub paid_at: u64,
    #[serde(with = "crate::delegation::decimal_u256")]
    pub amount: U256,
    pub tx_hash: TxHash,
}

pub struct SubscriptionService<S, E> {
    config: ChainConfig,
    store: DelegationStore<S>,
    executor: E,
    history: HashMap<Address, Vec<PaymentRecord>>,
}

impl<S: KeyValueStore, E: Executor> SubscriptionService<S, E> {
    pub fn new(config: ChainConfig, store: DelegationStore<S>, executor: E) -> Self {
        Self {
            config,
            store,
            executor,
            history: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn store(&self) -> &DelegationStore<S> {
        &self.store
    }

    /// Have `account` sign a subscription to `plan_id` for `delegate` and
    /// store it. Replaces any subscription previously stored for `delegate`.
    pub async fn subscribe<A: SmartAccount>(
        &mut self,
        account: &A,
        delegate: Address,
        plan_id: u32,
        max_renewals: u64,
        now: u64,
    ) -> Result<SignedDelegation, SubpayError> {
        let plan = plan_by_id(plan_id)
            .ok_or_else(|| SubpayError::Precondition("Selected plan not found".to_string()))?;

        let account_chain = account.chain_config();
        if account_chain.chain_id != self.config.chain_id {
            return Err(SubpayError::Precondition(format!(
                "Please switch to the {} network (Chain ID: {})",
                self.config.chain_name, self.config.chain_id
            )));
        }

        let params = DelegationParams::subscription(plan.period_secs, max_renewals)
            .with_plan(plan.id)
            .with_salt(U256::from(now));
        let delegation = prepare_root_delegation(
            &self.config.environment,
            account.address(),
            delegate,
            &params,
        );

        let signed = account
            .sign_delegation(delegation)
            .await?
            .with_metadata(subscription_metadata(&params, now));
        self.store.store(&signed)?;

        tracing::info!(
            delegator = %signed.delegator(),
            delegate = %delegate,
            plan = plan.name,
            max_renewals,
            "subscription created"
        );
        Ok(signed)
    }

    /// Redeem `delegate`'s subscription once, paying one period's price to
    /// `merchant`. The renewal counter is only advanced after the
    /// transaction succeeded.
    ///
    /// A payment that was mined but could not be persisted is still kept in
    /// the history, and the returned error carries its transaction hash.
    pub async fn process_payment(
        &mut self,
        delegate: Address,
        merchant: Address,
        now: u64,
    ) -> Result<PaymentRecord, SubpayError> {
        let no_subscription =
            || SubpayError::Precondition("No active subscription found".to_string());

        let signed = self.store.get(delegate)?.ok_or_else(no_subscription)?;
        let subscription = Subscription::from_signed(&signed).map_err(|_| no_subscription())?;
        let plan = subscription
            .plan_id
            .and_then(plan_by_id)
            .ok_or_else(|| SubpayError::Precondition("Subscription plan not found".to_string()))?;

        if subscription.status(now) == SubscriptionStatus::Expired {
            return Err(SubpayError::Precondition(
                "Subscription has expired".to_string(),
            ));
        }
        if subscription.remaining_renewals() == 0 {
            return Err(SubpayError::Precondition(
                "All renewals have been used".to_string(),
            ));
        }
        if !self.executor.is_deployed(signed.delegator()).await? {
            return Err(SubpayError::Precondition(
                "Delegator account is not deployed".to_string(),
            ));
        }

        let data = prepare_redeem_delegation_data(&signed, Some((merchant, plan.price)));
        let tx_hash = self
            .executor
            .submit(self.config.environment.delegation_manager, data)
            .await?;

        let record = PaymentRecord {
            paid_at: now,
            amount: plan.price,
            tx_hash,
        };
        self.history.entry(delegate).or_default().push(record.clone());

        let updated = match self.store.record_renewal(delegate) {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(
                    delegate = %delegate,
                    tx = %tx_hash,
                    error = %e,
                    "payment sent but renewal not recorded"
                );
                return Err(SubpayError::ChainError(format!(
                    "payment {tx_hash} sent but renewal not recorded: {e}"
                )));
            }
        };

        tracing::info!(
            delegate = %delegate,
            merchant = %merchant,
            amount = %plan.price,
            tx = %tx_hash,
            renewals = updated.metadata().map(|m| m.current_renewals).unwrap_or_default(),
            "subscription payment processed"
        );
        Ok(record)
    }

    /// Current view of `delegate`'s subscription, if one is stored.
    pub fn details(
        &self,
        delegate: Address,
        now: u64,
    ) -> Result<Option<SubscriptionDetails>, SubpayError> {
        Ok(self
            .store
            .get(delegate)?
            .and_then(|signed| Subscription::from_signed(&signed).ok())
            .map(|sub| sub.details(now)))
    }

    /// Payments collected by this service instance, oldest first.
    pub fn payment_history(&self, delegate: Address) -> &[PaymentRecord] {
        self.history
            .get(&delegate)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(all(test, feature = "full"))]
mod tests {
    use super::*;
    use crate::account::LocalAccount;
    use crate::plans::MONTHLY;
    use crate::redeem::decode_redeem_delegation_data;
    use crate::store::InMemoryStore;
    use alloy::primitives::Bytes;
    use alloy::signers::local::PrivateKeySigner;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockExecutor {
        fail: bool,
        undeployed: bool,
        calls: Mutex<Vec<(Address, Bytes)>>,
    }

    impl Executor for MockExecutor {
        async fn is_deployed(&self, _account: Address) -> Result<bool, SubpayError> {
            Ok(!self.undeployed)
        }

        async fn submit(&self, to: Address, data: Bytes) -> Result<TxHash, SubpayError> {
            if self.fail {
                return Err(SubpayError::ChainError("execution reverted".to_string()));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((to, data));
            Ok(TxHash::repeat_byte(calls.len() as u8))
        }
    }

    /// Accepts a fixed number of writes, then fails every later one.
    struct LimitedWrites {
        inner: InMemoryStore,
        writes_left: AtomicUsize,
    }

    impl KeyValueStore for LimitedWrites {
        fn get(&self, key: &str) -> Result<Option<String>, SubpayError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), SubpayError> {
            let left = self.writes_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(SubpayError::StorageError("disk full".to_string()));
            }
            self.writes_left.store(left - 1, Ordering::SeqCst);
            self.inner.set(key, value)
        }
    }

    const T0: u64 = 1_700_000_000;
    const MERCHANT: Address = Address::repeat_byte(0x77);

    fn setup(fail: bool) -> (SubscriptionService<InMemoryStore, MockExecutor>, LocalAccount) {
        let config = ChainConfig::default();
        let service = SubscriptionService::new(
            config.clone(),
            DelegationStore::new(InMemoryStore::new()),
            MockExecutor {
                fail,
                ..MockExecutor::default()
            },
        );
        (service, LocalAccount::new(PrivateKeySigner::random(), config))
    }

    #[tokio::test]
    async fn test_subscribe_stores_signed_delegation() {
        let (mut service, account) = setup(false);
        let delegate = Address::repeat_byte(0x22);

        let signed = service.subscribe(&account, delegate, 1, 12, T0).await.unwrap();
        assert_eq!(signed.delegator(), account.address());
        let meta = signed.metadata().unwrap();
        assert_eq!(meta.plan_id, Some(1));
        assert_eq!(meta.period_secs, MONTHLY);
        assert_eq!(meta.created_at, T0);

        assert_eq!(service.store().get(delegate).unwrap(), Some(signed));
        let details = service.details(delegate, T0).unwrap().unwrap();
        assert_eq!(details.next_payment_date, T0 + MONTHLY);
        assert_eq!(details.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_plan() {
        let (mut service, account) = setup(false);
        let err = service
            .subscribe(&account, Address::repeat_byte(0x22), 99, 12, T0)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Selected plan not found");
        assert!(service.store().get(Address::repeat_byte(0x22)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_payment_pays_plan_price() {
        let (mut service, account) = setup(false);
        let delegate = Address::repeat_byte(0x22);
        service.subscribe(&account, delegate, 2, 12, T0).await.unwrap();

        let record = service
            .process_payment(delegate, MERCHANT, T0 + MONTHLY)
            .await
            .unwrap();
        let price = plan_by_id(2).unwrap().price;
        assert_eq!(record.amount, price);
        assert_eq!(service.payment_history(delegate), &[record]);

        let calls = service.executor.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, service.config().environment.delegation_manager);
        let redemption = decode_redeem_delegation_data(&calls[0].1).unwrap();
        assert_eq!(redemption.executions[0].target, MERCHANT);
        assert_eq!(redemption.executions[0].value, price);

        let details = service.details(delegate, T0 + MONTHLY).unwrap().unwrap();
        assert_eq!(details.current_renewals, 1);
        assert_eq!(details.next_payment_date, T0 + 2 * MONTHLY);
    }

    #[tokio::test]
    async fn test_process_payment_without_subscription() {
        let (mut service, _) = setup(false);
        let err = service
            .process_payment(Address::repeat_byte(0x22), MERCHANT, T0)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No active subscription found");
    }

    #[tokio::test]
    async fn test_renewals_exhausted() {
        let (mut service, account) = setup(false);
        let delegate = Address::repeat_byte(0x22);
        service.subscribe(&account, delegate, 1, 2, T0).await.unwrap();

        service.process_payment(delegate, MERCHANT, T0 + 1).await.unwrap();
        service.process_payment(delegate, MERCHANT, T0 + 2).await.unwrap();
        let err = service
            .process_payment(delegate, MERCHANT, T0 + 3)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "All renewals have been used");
        assert_eq!(service.payment_history(delegate).len(), 2);
    }

    #[tokio::test]
    async fn test_expired_subscription_is_not_charged() {
        let (mut service, account) = setup(false);
        let delegate = Address::repeat_byte(0x22);
        service.subscribe(&account, delegate, 1, 12, T0).await.unwrap();

        let err = service
            .process_payment(delegate, MERCHANT, T0 + 12 * MONTHLY)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Subscription has expired");
        assert!(service.executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_counter() {
        let (mut service, account) = setup(true);
        let delegate = Address::repeat_byte(0x22);
        service.subscribe(&account, delegate, 1, 12, T0).await.unwrap();

        let err = service
            .process_payment(delegate, MERCHANT, T0 + MONTHLY)
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message("process payment"),
            "Failed to process payment: chain error: execution reverted"
        );
        let details = service.details(delegate, T0 + MONTHLY).unwrap().unwrap();
        assert_eq!(details.current_renewals, 0);
        assert!(service.payment_history(delegate).is_empty());
    }

    #[tokio::test]
    async fn test_undeployed_delegator_is_not_charged() {
        let config = ChainConfig::default();
        let mut service = SubscriptionService::new(
            config.clone(),
            DelegationStore::new(InMemoryStore::new()),
            MockExecutor {
                undeployed: true,
                ..MockExecutor::default()
            },
        );
        let account = LocalAccount::new(PrivateKeySigner::random(), config);
        let delegate = Address::repeat_byte(0x22);
        service.subscribe(&account, delegate, 1, 12, T0).await.unwrap();

        let err = service
            .process_payment(delegate, MERCHANT, T0 + MONTHLY)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Delegator account is not deployed");
        assert!(service.executor.calls.lock().unwrap().is_empty());
        let details = service.details(delegate, T0 + MONTHLY).unwrap().unwrap();
        assert_eq!(details.current_renewals, 0);
    }

    #[tokio::test]
    async fn test_renewal_write_failure_keeps_tx_hash() {
        let config = ChainConfig::default();
        let store = LimitedWrites {
            inner: InMemoryStore::new(),
            writes_left: AtomicUsize::new(1),
        };
        let mut service = SubscriptionService::new(
            config.clone(),
            DelegationStore::new(store),
            MockExecutor::default(),
        );
        let account = LocalAccount::new(PrivateKeySigner::random(), config);
        let delegate = Address::repeat_byte(0x22);
        service.subscribe(&account, delegate, 1, 12, T0).await.unwrap();

        let err = service
            .process_payment(delegate, MERCHANT, T0 + MONTHLY)
            .await
            .unwrap_err();
        let tx_hash = TxHash::repeat_byte(1);
        assert!(matches!(err, SubpayError::ChainError(_)));
        let expected = format!(
            "chain error: payment {tx_hash} sent but renewal not recorded: storage error: disk full"
        );
        assert_eq!(err.to_string(), expected);

        assert_eq!(service.executor.calls.lock().unwrap().len(), 1);
        let history = service.payment_history(delegate);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_hash, tx_hash);
        assert_eq!(history[0].amount, plan_by_id(1).unwrap().price);
    }
}
