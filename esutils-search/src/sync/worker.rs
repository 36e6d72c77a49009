//! Worker executing index jobs.

use super::job::{INDEX_OBJECTS, IndexJob, Job, UNINDEX_OBJECTS};
use super::runner::ChannelTaskRunner;
use crate::error::{Result, SearchError};
use async_trait::async_trait;
use esutils_log::{debug, error, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Something index jobs can run against, registered per document type.
#[async_trait]
pub trait IndexTarget: Send + Sync {
    fn document_type(&self) -> &str;

    fn id_field(&self) -> &str;

    /// Re-derive and upsert documents. Returns how many were written.
    async fn index_objects(&self, ids: &[String]) -> Result<usize>;

    /// Remove documents. Returns how many existed.
    async fn unindex_objects(&self, ids: &[String]) -> Result<usize>;
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Upper bound of the delay before a failed job is retried
    pub max_backoff: Duration,

    /// Whether to log job execution
    pub log_execution: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_backoff: Duration::from_secs(3600),
            log_execution: true,
        }
    }
}

/// Job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub retried: usize,
    pub dead: usize,
}

enum Outcome {
    Done,
    Retry(Job),
}

/// Consumes jobs submitted through a [`ChannelTaskRunner`].
pub struct IndexWorker {
    receiver: mpsc::UnboundedReceiver<Job>,
    requeue: mpsc::WeakUnboundedSender<Job>,
    targets: HashMap<String, Arc<dyn IndexTarget>>,
    config: WorkerConfig,
    stats: WorkerStats,
    dead_jobs: Vec<Job>,
}

impl IndexWorker {
    /// Create a worker for the jobs of `runner`.
    pub fn new(runner: &ChannelTaskRunner, receiver: mpsc::UnboundedReceiver<Job>) -> Self {
        Self::with_config(runner, receiver, WorkerConfig::default())
    }

    /// Create a worker with custom configuration.
    pub fn with_config(
        runner: &ChannelTaskRunner,
        receiver: mpsc::UnboundedReceiver<Job>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            receiver,
            requeue: runner.downgrade(),
            targets: HashMap::new(),
            config,
            stats: WorkerStats::default(),
            dead_jobs: Vec::new(),
        }
    }

    /// Register a target under its document type, replacing any previous one.
    pub fn register(&mut self, target: Arc<dyn IndexTarget>) {
        self.targets
            .insert(target.document_type().to_string(), target);
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Jobs that failed permanently.
    pub fn dead_jobs(&self) -> &[Job] {
        &self.dead_jobs
    }

    /// Run every queued job, including retries, until the queue is empty.
    ///
    /// Retries run immediately instead of after their backoff.
    pub async fn run_until_idle(&mut self) -> WorkerStats {
        let mut retries = VecDeque::new();

        loop {
            let job = match retries.pop_front() {
                Some(job) => job,
                None => match self.receiver.try_recv() {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            if let Outcome::Retry(job) = self.process(job).await {
                retries.push_back(job);
            }
        }

        self.stats
    }

    /// Run jobs until every runner handle is dropped.
    ///
    /// Failed jobs are resubmitted after their backoff delay.
    pub async fn run(mut self) -> WorkerStats {
        while let Some(job) = self.receiver.recv().await {
            if let Outcome::Retry(job) = self.process(job).await {
                self.schedule_retry(job);
            }
        }

        debug!("Index worker stopped: {:?}", self.stats);
        self.stats
    }

    /// Run the worker on the current runtime.
    pub fn spawn(self) -> JoinHandle<WorkerStats> {
        tokio::spawn(self.run())
    }

    fn schedule_retry(&self, job: Job) {
        let Some(sender) = self.requeue.upgrade() else {
            warn!("Dropping retry of job {}: task channel is closed", job.id);
            return;
        };

        let delay = job.backoff_delay(self.config.max_backoff);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(job).is_err() {
                warn!("Dropping retry: task channel is closed");
            }
        });
    }

    async fn process(&mut self, mut job: Job) -> Outcome {
        job.start_processing();
        if self.config.log_execution {
            debug!(
                "Processing job {} (type: {}, attempt {})",
                job.id, job.job_type, job.attempts
            );
        }

        match self.execute(&job).await {
            Ok(count) => {
                job.complete();
                self.stats.completed += 1;
                if self.config.log_execution {
                    debug!("Job {} completed ({} documents)", job.id, count);
                }
                Outcome::Done
            }
            Err(e) if e.is_transient() && job.can_retry() => {
                warn!("Job {} failed, will retry: {}", job.id, e);
                job.fail(e.to_string());
                self.stats.retried += 1;
                Outcome::Retry(job)
            }
            Err(e) => {
                error!("Job {} failed permanently: {}", job.id, e);
                job.bury(e.to_string());
                self.stats.dead += 1;
                self.dead_jobs.push(job);
                Outcome::Done
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<usize> {
        let payload = IndexJob::from_job(job)?;
        let target = self.targets.get(&payload.document_type).ok_or_else(|| {
            SearchError::Configuration(format!(
                "No index target registered for document type {}",
                payload.document_type
            ))
        })?;

        match job.job_type.as_str() {
            INDEX_OBJECTS => {
                if let Some(id_field) = payload.id_field.as_deref() {
                    if id_field != target.id_field() {
                        return Err(SearchError::Configuration(format!(
                            "Job ids were read from {} but {} is keyed by {}",
                            id_field,
                            payload.document_type,
                            target.id_field()
                        )));
                    }
                }
                target.index_objects(&payload.ids).await
            }
            UNINDEX_OBJECTS => target.unindex_objects(&payload.ids).await,
            other => Err(SearchError::Configuration(format!(
                "Unknown job type: {}",
                other
            ))),
        }
    }
}
