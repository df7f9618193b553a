use super::messages;
use crate::config::DispatcherConfig;
use crate::domain::job::{Job, JobRecord, JobStatus};
use crate::domain::ports::{JobQueue, JobStoreRef, TransformerRef, TransportRef, WatermarkerRef};
use crate::error::{GateError, Result};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Performs a single attempt of a job: transform, watermark trial results,
/// deliver.
pub struct JobExecutor {
    transformer: TransformerRef,
    watermarker: WatermarkerRef,
    transport: TransportRef,
    reset_keyword: String,
}

impl JobExecutor {
    pub fn new(
        transformer: TransformerRef,
        watermarker: WatermarkerRef,
        transport: TransportRef,
        reset_keyword: impl Into<String>,
    ) -> Self {
        Self {
            transformer,
            watermarker,
            transport,
            reset_keyword: reset_keyword.into(),
        }
    }

    async fn execute(&self, job: &Job) -> Result<()> {
        let result = self
            .transformer
            .transform(
                job.service,
                &job.primary_image,
                job.secondary_image.as_deref(),
                job.description.as_deref(),
            )
            .await?;

        let image = if job.is_trial {
            self.watermark(job, result).await?
        } else {
            result
        };

        let caption = messages::result_caption(job.service, &self.reset_keyword);
        self.transport.send_image(&job.user, &image, &caption).await
    }

    /// Falls back to the unmarked image when watermarking fails.
    async fn watermark(&self, job: &Job, image: Vec<u8>) -> Result<Vec<u8>> {
        let watermarker = self.watermarker.clone();
        let (image, marked) = tokio::task::spawn_blocking(move || {
            let marked = watermarker.apply(&image);
            (image, marked)
        })
        .await
        .map_err(|e| GateError::Transform(format!("watermark task failed: {e}")))?;

        Ok(marked.unwrap_or_else(|e| {
            warn!(job_id = %job.job_id, error = %e, "watermark failed, delivering unmarked result");
            image
        }))
    }
}

struct Worker {
    config: DispatcherConfig,
    store: JobStoreRef,
    executor: JobExecutor,
}

impl Worker {
    async fn run(&self, mut record: JobRecord) {
        let job_id = record.job.job_id;
        let correlation_id = record.job.correlation_id;
        let user = record.job.user.clone();

        while record.attempts < self.config.max_attempts {
            record.start_attempt();
            self.persist(&record).await;

            match self.executor.execute(&record.job).await {
                Ok(()) => {
                    if let Err(e) = self.store.remove(job_id).await {
                        warn!(%job_id, error = %e, "completed job could not be removed");
                    }
                    info!(%user, %job_id, attempt = record.attempts, "job completed");
                    return;
                }
                Err(e) => {
                    warn!(%user, %job_id, %correlation_id, attempt = record.attempts, error = %e, "job attempt failed");
                    record.record_error(&e);
                    if record.attempts < self.config.max_attempts {
                        self.persist(&record).await;
                        tokio::time::sleep(self.config.backoff_after(record.attempts)).await;
                    }
                }
            }
        }

        record.fail();
        self.persist(&record).await;
        error!(
            %user,
            %job_id,
            %correlation_id,
            attempts = record.attempts,
            last_error = record.last_error.as_deref().unwrap_or_default(),
            "job failed permanently"
        );
        if let Err(e) = self
            .executor
            .transport
            .send_text(&user, &messages::job_failed(correlation_id))
            .await
        {
            warn!(%user, %job_id, error = %e, "failure notice not delivered");
        }
    }

    async fn persist(&self, record: &JobRecord) {
        if let Err(e) = self.store.store(record.clone()).await {
            warn!(job_id = %record.job.job_id, error = %e, "job state not persisted");
        }
    }
}

/// Durable transformation queue drained by a pool of tokio workers.
///
/// Jobs are written to the job store as queued before they are handed to a
/// worker. Each job gets up to `max_attempts` attempts with exponential backoff
/// in between. Completed jobs are removed from the store; failed ones stay
/// until purged.
pub struct JobDispatcher {
    sender: Mutex<Option<mpsc::Sender<JobRecord>>>,
    store: JobStoreRef,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobDispatcher {
    /// Spawns the worker pool. Must be called inside a tokio runtime.
    pub fn start(config: DispatcherConfig, store: JobStoreRef, executor: JobExecutor) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let worker_count = config.workers.max(1);
        let worker = Arc::new(Worker {
            config,
            store: store.clone(),
            executor,
        });

        let workers = (0..worker_count)
            .map(|id| {
                let worker = worker.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(record) = next else {
                            break;
                        };
                        worker.run(record).await;
                    }
                    info!(worker = id, "job worker stopped");
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            store,
            workers: Mutex::new(workers),
        }
    }

    async fn enqueue(&self, record: JobRecord) -> Result<()> {
        let sender = self.sender.lock().await.clone();
        let Some(sender) = sender else {
            return Err(GateError::QueueClosed);
        };
        sender.send(record).await.map_err(|_| GateError::QueueClosed)
    }

    /// Re-enqueues jobs left queued or active by a previous run. Returns how
    /// many were picked up.
    pub async fn recover(&self) -> Result<usize> {
        let mut recovered = 0;
        for mut record in self.store.get_all().await? {
            if !record.is_pending() {
                continue;
            }
            record.status = JobStatus::Queued;
            info!(job_id = %record.job.job_id, attempts = record.attempts, "recovering job");
            self.enqueue(record).await?;
            recovered += 1;
        }
        Ok(recovered)
    }

    /// `None` once a job has completed.
    pub async fn status(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        self.store.get(job_id).await
    }

    pub async fn failed_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|record| record.status == JobStatus::Failed)
            .collect())
    }

    /// Removes failed jobs whose last update is older than `older_than`.
    pub async fn purge_failed(&self, older_than: TimeDelta) -> Result<usize> {
        let cutoff = Utc::now() - older_than;
        let mut purged = 0;
        for record in self.failed_jobs().await? {
            if record.updated_at < cutoff {
                self.store.remove(record.job.job_id).await?;
                purged += 1;
            }
        }
        if purged > 0 {
            info!(purged, "old failed jobs purged");
        }
        Ok(purged)
    }

    /// Stops accepting jobs and waits until the workers have drained the queue.
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "job worker panicked");
            }
        }
    }
}

#[async_trait]
impl JobQueue for JobDispatcher {
    async fn submit(&self, job: Job) -> Result<()> {
        let record = JobRecord::queued(job);
        let job_id = record.job.job_id;
        self.store.store(record.clone()).await?;
        if let Err(e) = self.enqueue(record).await {
            if let Err(remove_error) = self.store.remove(job_id).await {
                warn!(%job_id, error = %remove_error, "refused job left in store");
            }
            return Err(e);
        }
        Ok(())
    }
}
