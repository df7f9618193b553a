use crate::domain::entitlement::{Consumption, Settlement, UserRecord};
use crate::domain::payment::{OrderId, PendingPayment};
use crate::domain::ports::EntitlementRepositoryBox;
use crate::domain::service::Service;
use crate::domain::user::UserId;
use crate::error::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Owner of every `UserRecord`.
///
/// Read-modify-write sequences on one user run under that user's lock, and the
/// updated record is written through before the lock is released. A record is
/// stored as one value, so the pending payment and the payment history can
/// never be persisted out of step with each other.
pub struct EntitlementStore {
    repository: EntitlementRepositoryBox,
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl EntitlementStore {
    /// Creates a new `EntitlementStore` on top of a repository.
    pub fn new(repository: EntitlementRepositoryBox) -> Self {
        Self {
            repository,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock(&self, user: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(user.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops the user's lock entry once nobody holds or waits on it.
    async fn release(&self, user: &UserId, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut locks = self.locks.lock().await;
        if locks
            .get(user)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user);
        }
    }

    async fn load(&self, user: &UserId) -> Result<UserRecord> {
        Ok(self
            .repository
            .get(user)
            .await?
            .unwrap_or_else(|| UserRecord::new(user.clone())))
    }

    /// Applies `change` to the user's record under the user's lock. Nothing is
    /// written when `change` fails.
    async fn update<T, F>(&self, user: &UserId, change: F) -> Result<T>
    where
        F: FnOnce(&mut UserRecord) -> Result<T> + Send,
        T: Send,
    {
        let guard = self.lock(user).await;
        let outcome = self.apply(user, change).await;
        self.release(user, guard).await;
        outcome
    }

    async fn apply<T, F>(&self, user: &UserId, change: F) -> Result<T>
    where
        F: FnOnce(&mut UserRecord) -> Result<T> + Send,
        T: Send,
    {
        let mut record = self.load(user).await?;
        let outcome = change(&mut record)?;
        self.repository.store(record).await?;
        Ok(outcome)
    }

    /// Snapshot of the user's record; unknown users get a fresh one.
    pub async fn record(&self, user: &UserId) -> Result<UserRecord> {
        self.load(user).await
    }

    pub async fn all(&self) -> Result<Vec<UserRecord>> {
        self.repository.get_all().await
    }

    pub async fn remaining_trials(&self, user: &UserId) -> Result<u32> {
        Ok(self.load(user).await?.remaining_trials())
    }

    pub async fn has_trial_available(&self, user: &UserId) -> Result<bool> {
        Ok(self.load(user).await?.has_trial_available())
    }

    pub async fn has_quota(&self, user: &UserId) -> Result<bool> {
        Ok(self.load(user).await?.has_quota(Utc::now()))
    }

    pub async fn has_feature(&self, user: &UserId, service: Service) -> Result<bool> {
        Ok(self.load(user).await?.has_feature(service))
    }

    pub async fn pending_payment(&self, user: &UserId) -> Result<Option<PendingPayment>> {
        Ok(self.load(user).await?.pending_payment)
    }

    /// Returns the trials left after this one.
    pub async fn consume_trial(&self, user: &UserId) -> Result<u32> {
        self.update(user, |record| record.consume_trial()).await
    }

    /// Returns the quota left after this one.
    pub async fn consume_quota(&self, user: &UserId) -> Result<u32> {
        self.update(user, |record| record.consume_quota(Utc::now()))
            .await
    }

    /// Charges a job for `service` against a trial or the package quota.
    pub async fn consume_for(&self, user: &UserId, service: Service) -> Result<Consumption> {
        let consumption = self
            .update(user, |record| record.consume_for(service, Utc::now()))
            .await?;
        debug!(%user, %service, ?consumption, "allowance consumed");
        Ok(consumption)
    }

    /// Gives back an allowance charged for a job the queue did not accept.
    pub async fn restore_allowance(&self, user: &UserId, consumption: Consumption) -> Result<()> {
        self.update(user, |record| {
            record.restore(consumption);
            Ok(())
        })
        .await?;
        info!(%user, ?consumption, "allowance restored");
        Ok(())
    }

    pub async fn set_pending_payment(&self, user: &UserId, pending: PendingPayment) -> Result<()> {
        let order_id = pending.order_id.clone();
        self.update(user, |record| record.set_pending_payment(pending))
            .await?;
        info!(%user, %order_id, "pending payment recorded");
        Ok(())
    }

    pub async fn settle_payment_success(&self, user: &UserId, order_id: &OrderId) -> Result<Settlement> {
        let settlement = self
            .update(user, |record| record.settle_success(order_id, Utc::now()))
            .await?;
        match &settlement {
            Settlement::Applied(payment) => {
                info!(%user, %order_id, package = %payment.package, "payment settled")
            }
            Settlement::Replayed(_) => debug!(%user, %order_id, "payment already settled"),
        }
        Ok(settlement)
    }

    /// Returns whether a matching pending payment was cleared.
    pub async fn settle_payment_failure(&self, user: &UserId, order_id: &OrderId) -> Result<bool> {
        let cleared = self
            .update(user, |record| Ok(record.settle_failure(order_id)))
            .await?;
        if cleared {
            info!(%user, %order_id, "pending payment cleared after failure");
        }
        Ok(cleared)
    }
}
