use super::service::Service;
use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ImageBytes = Vec<u8>;

/// One transformation request accepted from a user.
///
/// The allowance for it has already been consumed by the time it exists, so
/// running it again after a crash never charges the user twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub user: UserId,
    pub service: Service,
    #[serde(with = "base64_image")]
    pub primary_image: ImageBytes,
    #[serde(default, with = "base64_image_opt")]
    pub secondary_image: Option<ImageBytes>,
    pub description: Option<String>,
    /// Trial results are watermarked before delivery.
    pub is_trial: bool,
    /// Shown to the user when the job fails so support can find it in the logs.
    pub correlation_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        user: UserId,
        service: Service,
        primary_image: ImageBytes,
        secondary_image: Option<ImageBytes>,
        description: Option<String>,
        is_trial: bool,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            user,
            service,
            primary_image,
            secondary_image,
            description,
            is_trial,
            correlation_id: Uuid::new_v4(),
            submitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Failed,
}

/// A job as tracked by the job store. Successful jobs are removed, failed
/// ones are kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job: Job,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(job: Job) -> Self {
        Self {
            job,
            status: JobStatus::Queued,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn start_attempt(&mut self) {
        self.status = JobStatus::Active;
        self.attempts += 1;
        self.updated_at = Utc::now();
    }

    pub fn record_error(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self) {
        self.status = JobStatus::Failed;
        self.updated_at = Utc::now();
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, JobStatus::Queued | JobStatus::Active)
    }
}

mod base64_image {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod base64_image_opt {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
