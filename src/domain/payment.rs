use super::package::Package;
use super::user::UserId;
use crate::error::{GateError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

const ORDER_PREFIX: &str = "ORDER";

/// How long a payment link stays payable at the provider.
pub const PAYMENT_WINDOW_MINUTES: i64 = 60;

/// Represents a positive amount charged for a package.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(GateError::Validation("Amount must be positive".to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = GateError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Payment order reference shared with the payment provider.
///
/// Layout: `ORDER_<unix millis>_<phone>`. The phone segment is the only link
/// from a provider callback back to a user; it is positional and carries no
/// cryptographic binding to the user or the package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn generate(user: &UserId, at: DateTime<Utc>) -> Result<Self> {
        let phone = user.phone();
        if !is_digits(phone) {
            return Err(GateError::InvalidUserId(user.to_string()));
        }
        Ok(Self(format!(
            "{ORDER_PREFIX}_{}_{phone}",
            at.timestamp_millis()
        )))
    }

    /// Wraps an order id received from outside without validating it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the user this order was created for.
    pub fn user_id(&self) -> Result<UserId> {
        let mut segments = self.0.split('_');
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(ORDER_PREFIX), Some(millis), Some(phone), None)
                if is_digits(millis) && is_digits(phone) =>
            {
                Ok(UserId::from_phone(phone))
            }
            _ => Err(GateError::MalformedOrderId(self.0.clone())),
        }
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// An outstanding payment request for a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub order_id: OrderId,
    pub package: Package,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl PendingPayment {
    pub fn new(order_id: OrderId, package: Package, amount: Amount, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            package,
            amount,
            created_at,
        }
    }
}

/// A payment that has been applied to a user's entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledPayment {
    pub order_id: OrderId,
    pub package: Package,
    pub amount: Amount,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Success,
    Paid,
    Failed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn is_success(self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Paid)
    }

    pub fn is_failure(self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Expired)
    }
}

/// A verified payment-provider callback.
#[derive(Debug, PartialEq, Clone)]
pub struct PaymentNotification {
    pub order_id: OrderId,
    pub status: PaymentStatus,
}

#[derive(Deserialize)]
struct WebhookBody {
    order: WebhookOrder,
    transaction: WebhookTransaction,
}

#[derive(Deserialize)]
struct WebhookOrder {
    invoice_number: String,
}

#[derive(Deserialize)]
struct WebhookTransaction {
    status: PaymentStatus,
}

impl PaymentNotification {
    /// Parses `{"order": {"invoice_number": ..}, "transaction": {"status": ..}}`.
    pub fn from_webhook_body(body: &[u8]) -> Result<Self> {
        let body: WebhookBody = serde_json::from_slice(body)
            .map_err(|e| GateError::MalformedWebhook(e.to_string()))?;
        Ok(Self {
            order_id: OrderId::from_raw(body.order.invoice_number),
            status: body.transaction.status,
        })
    }
}

/// Customer details the payment provider asks for when creating a link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Customer {
    pub fn for_user(user: &UserId) -> Self {
        let phone = user.phone().to_string();
        Self {
            name: user.to_string(),
            email: format!("{phone}@whatsapp.user"),
            phone,
        }
    }
}
