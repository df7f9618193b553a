use super::package::Package;
use super::payment::{OrderId, PendingPayment, SettledPayment};
use super::service::Service;
use super::user::UserId;
use crate::error::{GateError, Result};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Free transformations every user gets before paying.
pub const TRIAL_LIMIT: u32 = 2;

/// Which allowance an accepted job was charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Trial,
    Quota,
}

/// Outcome of applying a successful payment.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The package was granted by this call.
    Applied(SettledPayment),
    /// The order had already been applied; nothing changed.
    Replayed(SettledPayment),
}

impl Settlement {
    pub fn payment(&self) -> &SettledPayment {
        match self {
            Settlement::Applied(payment) | Settlement::Replayed(payment) => payment,
        }
    }
}

/// Per-user entitlement state.
///
/// Tracks trial usage, the active package with its quota and expiry, the single
/// outstanding payment request and the history of applied payments.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct UserRecord {
    pub user: UserId,
    /// Trials consumed so far, never above `TRIAL_LIMIT`.
    pub trial_count: u32,
    pub package: Option<Package>,
    /// Images left in the current package period.
    pub quota: u32,
    pub package_expiry: Option<DateTime<Utc>>,
    pub pending_payment: Option<PendingPayment>,
    #[serde(default)]
    pub payment_history: Vec<SettledPayment>,
}

impl UserRecord {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            trial_count: 0,
            package: None,
            quota: 0,
            package_expiry: None,
            pending_payment: None,
            payment_history: Vec::new(),
        }
    }

    pub fn remaining_trials(&self) -> u32 {
        TRIAL_LIMIT.saturating_sub(self.trial_count)
    }

    pub fn has_trial_available(&self) -> bool {
        self.remaining_trials() > 0
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.package_expiry.is_some_and(|expiry| now > expiry)
    }

    /// Usable quota: zero once the package has expired.
    pub fn effective_quota(&self, now: DateTime<Utc>) -> u32 {
        if self.is_expired(now) { 0 } else { self.quota }
    }

    pub fn has_quota(&self, now: DateTime<Utc>) -> bool {
        self.effective_quota(now) > 0
    }

    /// Every feature is open while trials remain.
    pub fn has_feature(&self, service: Service) -> bool {
        if self.has_trial_available() {
            return true;
        }
        self.package.is_some_and(|package| package.includes(service))
    }

    /// Decides which allowance a job for `service` would consume, without
    /// consuming it.
    pub fn allowance_for(&self, service: Service, now: DateTime<Utc>) -> Result<Consumption> {
        if self.has_trial_available() {
            return Ok(Consumption::Trial);
        }
        if !self.has_quota(now) {
            return Err(GateError::QuotaExceeded);
        }
        if !self.has_feature(service) {
            return Err(GateError::FeatureNotInPackage(service));
        }
        Ok(Consumption::Quota)
    }

    pub fn consume_trial(&mut self) -> Result<u32> {
        if !self.has_trial_available() {
            return Err(GateError::QuotaExceeded);
        }
        self.trial_count += 1;
        Ok(self.remaining_trials())
    }

    pub fn consume_quota(&mut self, now: DateTime<Utc>) -> Result<u32> {
        if !self.has_quota(now) {
            return Err(GateError::QuotaExceeded);
        }
        self.quota -= 1;
        Ok(self.quota)
    }

    /// Checks and consumes the allowance for `service` in one step.
    pub fn consume_for(&mut self, service: Service, now: DateTime<Utc>) -> Result<Consumption> {
        let consumption = self.allowance_for(service, now)?;
        match consumption {
            Consumption::Trial => self.consume_trial()?,
            Consumption::Quota => self.consume_quota(now)?,
        };
        Ok(consumption)
    }

    /// Gives back an allowance for a job that was never accepted.
    pub fn restore(&mut self, consumption: Consumption) {
        match consumption {
            Consumption::Trial => self.trial_count = self.trial_count.saturating_sub(1),
            Consumption::Quota => self.quota += 1,
        }
    }

    /// Replaces the current package and starts a new one-month period.
    pub fn grant_package(&mut self, package: Package, now: DateTime<Utc>) {
        self.package = Some(package);
        self.quota = package.quota();
        self.package_expiry = now.checked_add_months(Months::new(1));
    }

    /// Records a payment request. An earlier one blocks it until the provider
    /// settles or declines that order, however old it is.
    pub fn set_pending_payment(&mut self, pending: PendingPayment) -> Result<()> {
        if let Some(existing) = &self.pending_payment {
            return Err(GateError::PaymentAlreadyPending(existing.order_id.clone()));
        }
        self.pending_payment = Some(pending);
        Ok(())
    }

    pub fn settled_payment(&self, order_id: &OrderId) -> Option<&SettledPayment> {
        self.payment_history
            .iter()
            .find(|payment| &payment.order_id == order_id)
    }

    /// Applies a successful payment exactly once per order id.
    pub fn settle_success(&mut self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Settlement> {
        if let Some(previous) = self.settled_payment(order_id) {
            return Ok(Settlement::Replayed(previous.clone()));
        }
        let pending = match self.pending_payment.take() {
            Some(pending) if &pending.order_id == order_id => pending,
            other => {
                self.pending_payment = other;
                return Err(GateError::NoPendingPayment(order_id.clone()));
            }
        };
        self.grant_package(pending.package, now);
        let settled = SettledPayment {
            order_id: pending.order_id,
            package: pending.package,
            amount: pending.amount,
            settled_at: now,
        };
        self.payment_history.push(settled.clone());
        Ok(Settlement::Applied(settled))
    }

    /// Clears the pending payment if it belongs to `order_id`.
    pub fn settle_failure(&mut self, order_id: &OrderId) -> bool {
        if self
            .pending_payment
            .as_ref()
            .is_some_and(|pending| &pending.order_id == order_id)
        {
            self.pending_payment = None;
            true
        } else {
            false
        }
    }
}
