use crate::domain::payment::OrderId;
use crate::domain::service::Service;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    #[error("Quota exceeded")]
    QuotaExceeded,
    #[error("Service {0} is not included in the current package")]
    FeatureNotInPackage(Service),
    #[error("Payment {0} is already pending")]
    PaymentAlreadyPending(OrderId),
    #[error("No pending payment matches order {0}")]
    NoPendingPayment(OrderId),
    #[error("Payment provider error: {0}")]
    PaymentProvider(String),
    #[error("Transformation provider error: {0}")]
    Transform(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Webhook signature is invalid")]
    SignatureInvalid,
    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),
    #[error("Malformed order id: {0}")]
    MalformedOrderId(String),
    #[error("User id {0} has no phone segment")]
    InvalidUserId(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Job queue is closed")]
    QueueClosed,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl GateError {
    /// Errors the user can act on directly, answered with a specific message.
    pub fn is_entitlement_denial(&self) -> bool {
        matches!(self, Self::QuotaExceeded | Self::FeatureNotInPackage(_))
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
