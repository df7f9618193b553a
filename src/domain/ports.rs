use super::entitlement::UserRecord;
use super::job::{Job, JobRecord};
use super::payment::{Amount, Customer, OrderId};
use super::service::Service;
use super::user::UserId;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Persisted `UserId -> UserRecord` table. A `store` replaces the whole record.
#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    async fn store(&self, record: UserRecord) -> Result<()>;
    async fn get(&self, user: &UserId) -> Result<Option<UserRecord>>;
    async fn get_all(&self) -> Result<Vec<UserRecord>>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn store(&self, record: JobRecord) -> Result<()>;
    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>>;
    async fn remove(&self, job_id: Uuid) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<JobRecord>>;
}

/// Accepts jobs for asynchronous execution.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn submit(&self, job: Job) -> Result<()>;
}

/// Outbound side of the message transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, user: &UserId, text: &str) -> Result<()>;
    async fn send_image(&self, user: &UserId, image: &[u8], caption: &str) -> Result<()>;
}

/// The external image-transformation provider.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(
        &self,
        service: Service,
        primary: &[u8],
        secondary: Option<&[u8]>,
        description: Option<&str>,
    ) -> Result<Vec<u8>>;
}

/// The external payment provider's link creation call.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(
        &self,
        order_id: &OrderId,
        amount: &Amount,
        customer: &Customer,
    ) -> Result<String>;
}

/// Checks a webhook body against the provider's signature header.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, body: &[u8], signature: &str) -> Result<()>;
}

/// Marks trial results as such.
pub trait Watermarker: Send + Sync {
    fn apply(&self, image: &[u8]) -> Result<Vec<u8>>;
}

pub type EntitlementRepositoryBox = Box<dyn EntitlementRepository>;
pub type JobStoreRef = Arc<dyn JobStore>;
pub type JobQueueRef = Arc<dyn JobQueue>;
pub type TransportRef = Arc<dyn Transport>;
pub type TransformerRef = Arc<dyn Transformer>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type WatermarkerRef = Arc<dyn Watermarker>;
