use crate::domain::entitlement::UserRecord;
use crate::domain::job::JobRecord;
use crate::domain::ports::{EntitlementRepository, JobStore};
use crate::domain::user::UserId;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory table of user records.
///
/// Uses `Arc<RwLock<HashMap<UserId, UserRecord>>>` so clones share the same data.
/// Everything is lost when the process exits.
#[derive(Default, Clone)]
pub struct InMemoryEntitlementRepository {
    records: Arc<RwLock<HashMap<UserId, UserRecord>>>,
}

impl InMemoryEntitlementRepository {
    /// Creates a new, empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntitlementRepository for InMemoryEntitlementRepository {
    async fn store(&self, record: UserRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.user.clone(), record);
        Ok(())
    }

    async fn get(&self, user: &UserId) -> Result<Option<UserRecord>> {
        let records = self.records.read().await;
        Ok(records.get(user).cloned())
    }

    async fn get_all(&self) -> Result<Vec<UserRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<UserRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.user.cmp(&b.user));
        Ok(all)
    }
}

/// A thread-safe in-memory job store.
#[derive(Default, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl InMemoryJobStore {
    /// Creates a new, empty job store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn store(&self, record: JobRecord) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(record.job.job_id, record);
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&job_id).cloned())
    }

    async fn remove(&self, job_id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(&job_id);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<JobRecord>> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<JobRecord> = jobs.values().cloned().collect();
        all.sort_by_key(|record| record.job.submitted_at);
        Ok(all)
    }
}
