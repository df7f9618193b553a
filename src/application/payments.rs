use super::entitlements::EntitlementStore;
use crate::domain::entitlement::Settlement;
use crate::domain::package::Package;
use crate::domain::payment::{OrderId, PaymentNotification};
use crate::domain::ports::SignatureVerifier;
use crate::domain::user::UserId;
use crate::error::{GateError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// A resolved payment event the user has to be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentNotice {
    Succeeded {
        user: UserId,
        package: Package,
        order_id: OrderId,
    },
    Failed {
        user: UserId,
        order_id: OrderId,
    },
}

impl PaymentNotice {
    pub fn user(&self) -> &UserId {
        match self {
            PaymentNotice::Succeeded { user, .. } | PaymentNotice::Failed { user, .. } => user,
        }
    }
}

/// What a payment event did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    /// A package was granted.
    Settled,
    /// The order had been settled before; nothing changed.
    Replayed,
    /// A failed or expired payment cleared the pending request.
    Declined,
    /// No pending payment matched, or the order id could not be decoded.
    Discarded,
    /// The status is neither a success nor a failure.
    Ignored,
}

impl fmt::Display for CorrelationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrelationOutcome::Settled => "settled",
            CorrelationOutcome::Replayed => "already settled",
            CorrelationOutcome::Declined => "declined",
            CorrelationOutcome::Discarded => "no matching pending payment",
            CorrelationOutcome::Ignored => "ignored",
        };
        f.write_str(name)
    }
}

/// Maps payment-provider callbacks back to users and applies them to the
/// entitlement ledger exactly once per order.
pub struct PaymentCorrelator {
    entitlements: Arc<EntitlementStore>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
    notices: UnboundedSender<PaymentNotice>,
}

impl PaymentCorrelator {
    /// Without a verifier every webhook is rejected.
    pub fn new(
        entitlements: Arc<EntitlementStore>,
        verifier: Option<Arc<dyn SignatureVerifier>>,
        notices: UnboundedSender<PaymentNotice>,
    ) -> Self {
        Self {
            entitlements,
            verifier,
            notices,
        }
    }

    /// Verifies and applies a raw webhook delivery.
    pub async fn handle_webhook(&self, body: &[u8], signature: &str) -> Result<CorrelationOutcome> {
        let Some(verifier) = &self.verifier else {
            warn!("webhook received but no signing secret is configured");
            return Err(GateError::SignatureInvalid);
        };
        if let Err(e) = verifier.verify(body, signature) {
            warn!(error = %e, "webhook rejected");
            return Err(e);
        }
        let notification = PaymentNotification::from_webhook_body(body)?;
        self.received(notification).await
    }

    /// Applies a notification whose authenticity has been established.
    pub async fn received(&self, notification: PaymentNotification) -> Result<CorrelationOutcome> {
        let PaymentNotification { order_id, status } = notification;
        if !status.is_success() && !status.is_failure() {
            info!(%order_id, ?status, "payment status ignored");
            return Ok(CorrelationOutcome::Ignored);
        }

        let user = match order_id.user_id() {
            Ok(user) => user,
            Err(e) => {
                warn!(%order_id, error = %e, "payment discarded");
                return Ok(CorrelationOutcome::Discarded);
            }
        };

        if status.is_success() {
            self.settle(&user, &order_id).await
        } else {
            let cleared = self
                .entitlements
                .settle_payment_failure(&user, &order_id)
                .await?;
            if !cleared {
                info!(%user, %order_id, "failure for unknown or settled order discarded");
                return Ok(CorrelationOutcome::Discarded);
            }
            self.notify(PaymentNotice::Failed { user, order_id });
            Ok(CorrelationOutcome::Declined)
        }
    }

    /// Settles the user's current pending payment without a provider callback.
    pub async fn approve_pending(&self, user: &UserId) -> Result<CorrelationOutcome> {
        let Some(pending) = self.entitlements.pending_payment(user).await? else {
            info!(%user, "nothing to approve");
            return Ok(CorrelationOutcome::Discarded);
        };
        info!(%user, order_id = %pending.order_id, "manual approval");
        self.settle(user, &pending.order_id).await
    }

    async fn settle(&self, user: &UserId, order_id: &OrderId) -> Result<CorrelationOutcome> {
        match self.entitlements.settle_payment_success(user, order_id).await {
            Ok(Settlement::Applied(payment)) => {
                self.notify(PaymentNotice::Succeeded {
                    user: user.clone(),
                    package: payment.package,
                    order_id: payment.order_id,
                });
                Ok(CorrelationOutcome::Settled)
            }
            Ok(Settlement::Replayed(_)) => Ok(CorrelationOutcome::Replayed),
            Err(GateError::NoPendingPayment(_)) => {
                info!(%user, %order_id, "success for unknown order discarded");
                Ok(CorrelationOutcome::Discarded)
            }
            Err(e) => Err(e),
        }
    }

    fn notify(&self, notice: PaymentNotice) {
        if self.notices.send(notice).is_err() {
            warn!("payment notice dropped, no listener");
        }
    }
}
