use crate::domain::entitlement::UserRecord;
use crate::domain::job::JobRecord;
use crate::domain::ports::{EntitlementRepository, JobStore};
use crate::domain::user::UserId;
use crate::error::{GateError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column Family for user records, keyed by the user id.
pub const CF_USERS: &str = "users";
/// Column Family for job records, keyed by the job id bytes.
pub const CF_JOBS: &str = "jobs";

/// A persistent store implementation using RocksDB.
///
/// Keeps `UserRecord` and `JobRecord` entities in separate Column Families,
/// serialized as JSON. A user record is written with a single `put`, so its
/// pending payment and payment history always change together.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("users" and "jobs") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_users = ColumnFamilyDescriptor::new(CF_USERS, Options::default());
        let cf_jobs = ColumnFamilyDescriptor::new(CF_JOBS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_users, cf_jobs])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| GateError::Persistence(format!("{name} column family not found")))
    }

    fn put<T: Serialize>(&self, name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(name)?;
        let value = serde_json::to_vec(value)
            .map_err(|e| GateError::Persistence(format!("Serialization error: {e}")))?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        match self.db.get_pinned_cf(&cf, key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| GateError::Persistence(format!("Deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let value = serde_json::from_slice(&value)
                .map_err(|e| GateError::Persistence(format!("Failed to deserialize {name} entry: {e}")))?;
            values.push(value);
        }
        Ok(values)
    }
}

#[async_trait]
impl EntitlementRepository for RocksDBStore {
    async fn store(&self, record: UserRecord) -> Result<()> {
        self.put(CF_USERS, record.user.as_str().as_bytes(), &record)
    }

    async fn get(&self, user: &UserId) -> Result<Option<UserRecord>> {
        self.read(CF_USERS, user.as_str().as_bytes())
    }

    async fn get_all(&self) -> Result<Vec<UserRecord>> {
        self.scan(CF_USERS)
    }
}

#[async_trait]
impl JobStore for RocksDBStore {
    async fn store(&self, record: JobRecord) -> Result<()> {
        self.put(CF_JOBS, record.job.job_id.as_bytes(), &record)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        self.read(CF_JOBS, job_id.as_bytes())
    }

    async fn remove(&self, job_id: Uuid) -> Result<()> {
        let cf = self.cf(CF_JOBS)?;
        self.db.delete_cf(&cf, job_id.as_bytes())?;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<JobRecord>> {
        let mut jobs: Vec<JobRecord> = self.scan(CF_JOBS)?;
        jobs.sort_by_key(|record| record.job.submitted_at);
        Ok(jobs)
    }
}
