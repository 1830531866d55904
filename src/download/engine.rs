//! Worker pool that drains a [`Job`] with one connector per worker.
//!
//! # Overview
//!
//! [`WorkerPool::run`] spawns `workers` Tokio tasks. Each task opens its own
//! connector through the selected [`ConnectorFactory`], then repeatedly claims
//! the first pending item, downloads it outside the job lock and marks it done
//! or returns it to pending. A worker whose connector cannot be built logs the
//! failure and exits; the others carry on. Alongside the workers an autosave
//! task writes the job file every `autosave_interval`. Once every worker has
//! finished the autosave task is stopped and the job is saved one final time.
//!
//! Failed items are requeued without limit and without delay, so an item that
//! can never succeed keeps its worker busy until the process is interrupted.
//! Each requeue is logged at `warn`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dljob_core::download::{PoolOptions, WorkerPool};
//! use dljob_core::connector::ConnectorFactory;
//! use dljob_core::{Credential, Job};
//!
//! # async fn example(job: Arc<Job>, factory: Arc<dyn ConnectorFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let pool = WorkerPool::new(PoolOptions::default())?;
//! let credential = Credential::new("anonymous", b"guest".to_vec());
//! let stats = pool.run(job, factory, &credential).await?;
//! println!("completed {}, requeued {}", stats.completed(), stats.requeued());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use super::constants::AUTOSAVE_INTERVAL;
use crate::connector::ConnectorFactory;
use crate::credential::Credential;
use crate::job::{Job, JobError};

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 64;

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Error type for worker pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Autosave interval of zero.
    #[error("invalid autosave interval: must be greater than zero")]
    InvalidAutosaveInterval,

    /// The job file could not be written after the workers finished.
    #[error("final job save failed: {0}")]
    FinalSave(#[source] JobError),

    /// The final save task panicked.
    #[error("final job save task failed: {0}")]
    SaveTask(#[source] tokio::task::JoinError),
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of concurrent workers (1-64).
    pub workers: usize,
    /// Delay between periodic job-file saves.
    pub autosave_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            autosave_interval: AUTOSAVE_INTERVAL,
        }
    }
}

/// Counters from one pool run.
///
/// Atomic so every worker and the autosave task can update them concurrently.
#[derive(Debug, Default)]
pub struct PoolStats {
    completed: AtomicUsize,
    requeued: AtomicUsize,
    connect_failures: AtomicUsize,
    autosaves: AtomicUsize,
    outstanding: AtomicUsize,
}

impl PoolStats {
    /// Creates a stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items downloaded and marked done.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Failed downloads that were returned to pending.
    #[must_use]
    pub fn requeued(&self) -> usize {
        self.requeued.load(Ordering::SeqCst)
    }

    /// Workers that exited because their connector could not be built.
    #[must_use]
    pub fn connect_failures(&self) -> usize {
        self.connect_failures.load(Ordering::SeqCst)
    }

    /// Successful periodic saves.
    #[must_use]
    pub fn autosaves(&self) -> usize {
        self.autosaves.load(Ordering::SeqCst)
    }

    /// Items not done when the pool stopped.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn copy(&self) -> Self {
        Self {
            completed: AtomicUsize::new(self.completed()),
            requeued: AtomicUsize::new(self.requeued()),
            connect_failures: AtomicUsize::new(self.connect_failures()),
            autosaves: AtomicUsize::new(self.autosaves()),
            outstanding: AtomicUsize::new(self.outstanding()),
        }
    }
}

/// Fixed-size pool of download workers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    options: PoolOptions,
}

impl WorkerPool {
    /// Creates a pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidWorkers`] if `workers` is outside 1-64 and
    /// [`PoolError::InvalidAutosaveInterval`] for a zero interval.
    #[instrument(level = "debug")]
    pub fn new(options: PoolOptions) -> Result<Self, PoolError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&options.workers) {
            return Err(PoolError::InvalidWorkers {
                value: options.workers,
            });
        }
        if options.autosave_interval.is_zero() {
            return Err(PoolError::InvalidAutosaveInterval);
        }
        Ok(Self { options })
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.options.workers
    }

    /// Drains `job` until no item is pending, then saves it.
    ///
    /// Each worker receives its own copy of `credential` for its connector.
    /// Individual download failures never fail the run; they are requeued.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::FinalSave`] if the closing save fails.
    #[instrument(skip_all, fields(workers = self.options.workers, job_file = %job.job_file().display()))]
    pub async fn run(
        &self,
        job: Arc<Job>,
        factory: Arc<dyn ConnectorFactory>,
        credential: &Credential,
    ) -> Result<PoolStats, PoolError> {
        let stats = Arc::new(PoolStats::new());
        info!(items = job.len(), scheme = factory.scheme(), "starting workers");

        let (cancel_autosave, cancelled) = oneshot::channel();
        let autosave = tokio::spawn(autosave_loop(
            Arc::clone(&job),
            self.options.autosave_interval,
            cancelled,
            Arc::clone(&stats),
        ));

        let handles: Vec<_> = (0..self.options.workers)
            .map(|index| {
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(&job),
                    Arc::clone(&factory),
                    credential.clone(),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        for handle in handles {
            // A panicked worker leaves its claimed item in progress; it is
            // written as not-done and picked up by the next run.
            if let Err(error) = handle.await {
                warn!(error = %error, "worker task panicked");
            }
        }

        let _ = cancel_autosave.send(());
        if let Err(error) = autosave.await {
            warn!(error = %error, "autosave task panicked");
        }

        let saver = Arc::clone(&job);
        tokio::task::spawn_blocking(move || saver.save())
            .await
            .map_err(PoolError::SaveTask)?
            .map_err(PoolError::FinalSave)?;

        let counts = job.counts();
        stats.outstanding.store(counts.outstanding(), Ordering::SeqCst);
        info!(
            completed = stats.completed(),
            requeued = stats.requeued(),
            connect_failures = stats.connect_failures(),
            done = counts.done,
            outstanding = counts.outstanding(),
            "workers finished"
        );

        Ok(Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.copy()))
    }
}

/// One worker: connect, drain, close.
async fn run_worker(
    index: usize,
    job: Arc<Job>,
    factory: Arc<dyn ConnectorFactory>,
    credential: Credential,
    stats: Arc<PoolStats>,
) {
    let mut connector = match factory.create(job.source_url(), &credential).await {
        Ok(connector) => connector,
        Err(error) => {
            warn!(worker = index, error = %error, "worker could not connect; exiting");
            PoolStats::increment(&stats.connect_failures);
            return;
        }
    };
    drop(credential);
    debug!(worker = index, connector = connector.name(), "worker connected");

    let target_dir = job.target_dir().to_path_buf();
    let base_path = job.base_path();

    while let Some(claim) = job.claim_next_pending() {
        trace!(worker = index, path = claim.path(), "claimed item");
        match connector
            .download_file(claim.path(), &target_dir, &base_path)
            .await
        {
            Ok(saved) => {
                job.mark_done(&claim);
                PoolStats::increment(&stats.completed);
                debug!(
                    worker = index,
                    path = claim.path(),
                    local = %saved.path.display(),
                    bytes = saved.bytes,
                    "item done"
                );
            }
            Err(error) => {
                job.mark_pending(&claim);
                PoolStats::increment(&stats.requeued);
                warn!(
                    worker = index,
                    path = claim.path(),
                    error = %error,
                    "download failed; item returned to pending"
                );
            }
        }
    }

    if let Err(error) = connector.close().await {
        warn!(worker = index, error = %error, "failed to close connector");
    }
    debug!(worker = index, "worker finished");
}

/// Saves `job` every `interval` until `cancelled` fires.
async fn autosave_loop(
    job: Arc<Job>,
    interval: Duration,
    mut cancelled: oneshot::Receiver<()>,
    stats: Arc<PoolStats>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut cancelled => break,
            _ = ticker.tick() => {
                let saver = Arc::clone(&job);
                match tokio::task::spawn_blocking(move || saver.save()).await {
                    Ok(Ok(())) => {
                        PoolStats::increment(&stats.autosaves);
                        trace!("job autosaved");
                    }
                    Ok(Err(error)) => warn!(error = %error, "autosave failed"),
                    Err(error) => warn!(error = %error, "autosave task failed"),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use url::Url;

    use super::*;
    use crate::connector::{Connector, ConnectorError};
    use crate::download::{SavedFile, save_remote_file};

    /// Shared behaviour of every connector an [`EchoFactory`] builds.
    struct EchoState {
        fail_first: AtomicUsize,
        connect: bool,
        delay: Duration,
    }

    impl Default for EchoState {
        fn default() -> Self {
            Self {
                fail_first: AtomicUsize::new(0),
                connect: true,
                delay: Duration::ZERO,
            }
        }
    }

    /// Writes the remote path as file content; fails the first `fail_first`
    /// attempts across all workers.
    struct EchoFactory {
        state: Arc<EchoState>,
    }

    impl EchoFactory {
        fn shared(state: EchoState) -> Arc<dyn ConnectorFactory> {
            Arc::new(Self {
                state: Arc::new(state),
            })
        }
    }

    struct EchoConnector {
        state: Arc<EchoState>,
    }

    #[async_trait]
    impl ConnectorFactory for EchoFactory {
        fn scheme(&self) -> &'static str {
            "ftp"
        }

        async fn create(
            &self,
            url: &Url,
            _credential: &Credential,
        ) -> Result<Box<dyn Connector>, ConnectorError> {
            if !self.state.connect {
                return Err(ConnectorError::connect(
                    url.as_str(),
                    std::io::ErrorKind::ConnectionRefused.into(),
                ));
            }
            Ok(Box::new(EchoConnector {
                state: Arc::clone(&self.state),
            }))
        }
    }

    #[async_trait]
    impl Connector for EchoConnector {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn list_files_recursively(&mut self, _base: &str) -> Result<Vec<String>, ConnectorError> {
            Ok(Vec::new())
        }

        async fn download_file(
            &mut self,
            remote_path: &str,
            target_dir: &Path,
            base_path: &str,
        ) -> Result<SavedFile, ConnectorError> {
            if !self.state.delay.is_zero() {
                tokio::time::sleep(self.state.delay).await;
            }
            let should_fail = self
                .state
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(ConnectorError::protocol(remote_path, "injected failure"));
            }
            let mut reader = Cursor::new(remote_path.as_bytes().to_vec());
            Ok(save_remote_file(remote_path, target_dir, base_path, &mut reader)?)
        }

        async fn close(&mut self) -> Result<(), ConnectorError> {
            Ok(())
        }
    }

    fn job_in(dir: &TempDir, paths: &[&str]) -> Arc<Job> {
        Arc::new(Job::with_paths(
            Url::parse("ftp://user@example.org/data").unwrap(),
            dir.path().join("mirror"),
            dir.path().join("test.dljob"),
            paths.iter().copied(),
        ))
    }

    fn credential() -> Credential {
        Credential::new("user", b"secret".to_vec())
    }

    #[test]
    fn test_new_rejects_out_of_range_workers() {
        for workers in [0, 65] {
            let result = WorkerPool::new(PoolOptions {
                workers,
                ..PoolOptions::default()
            });
            assert!(matches!(result, Err(PoolError::InvalidWorkers { .. })));
        }
        assert_eq!(
            WorkerPool::new(PoolOptions {
                workers: 64,
                ..PoolOptions::default()
            })
            .unwrap()
            .workers(),
            64
        );
    }

    #[test]
    fn test_new_rejects_zero_autosave_interval() {
        let result = WorkerPool::new(PoolOptions {
            workers: 1,
            autosave_interval: Duration::ZERO,
        });
        assert!(matches!(result, Err(PoolError::InvalidAutosaveInterval)));
    }

    #[tokio::test]
    async fn test_run_downloads_everything_and_saves() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, &["/data/a.txt", "/data/sub/b.txt", "/data/c.txt"]);
        let pool = WorkerPool::new(PoolOptions::default()).unwrap();

        let stats = pool
            .run(Arc::clone(&job), EchoFactory::shared(EchoState::default()), &credential())
            .await
            .unwrap();

        assert_eq!(stats.completed(), 3);
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mirror/sub/b.txt")).unwrap(),
            "/data/sub/b.txt"
        );
        let saved = std::fs::read_to_string(dir.path().join("test.dljob")).unwrap();
        assert_eq!(saved.lines().filter(|line| line.starts_with("1:")).count(), 3);
    }

    #[tokio::test]
    async fn test_failed_items_are_requeued_until_done() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, &["/data/a", "/data/b"]);
        let factory = EchoFactory::shared(EchoState {
            fail_first: AtomicUsize::new(3),
            ..EchoState::default()
        });
        let pool = WorkerPool::new(PoolOptions {
            workers: 2,
            ..PoolOptions::default()
        })
        .unwrap();

        let stats = pool
            .run(Arc::clone(&job), factory, &credential())
            .await
            .unwrap();

        assert_eq!(stats.requeued(), 3);
        assert_eq!(stats.completed(), 2);
        assert_eq!(job.counts().done, 2);
    }

    #[tokio::test]
    async fn test_connect_failures_leave_items_pending() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, &["/data/a", "/data/b"]);
        let factory = EchoFactory::shared(EchoState {
            connect: false,
            ..EchoState::default()
        });
        let pool = WorkerPool::new(PoolOptions {
            workers: 3,
            ..PoolOptions::default()
        })
        .unwrap();

        let stats = pool
            .run(Arc::clone(&job), factory, &credential())
            .await
            .unwrap();

        assert_eq!(stats.connect_failures(), 3);
        assert_eq!(stats.completed(), 0);
        assert_eq!(stats.outstanding(), 2);
        let saved = std::fs::read_to_string(dir.path().join("test.dljob")).unwrap();
        assert!(saved.lines().skip(2).all(|line| line.starts_with("0:")));
    }

    #[tokio::test]
    async fn test_final_save_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let job = Arc::new(Job::with_paths(
            Url::parse("ftp://example.org/data").unwrap(),
            dir.path().join("mirror"),
            dir.path().join("missing-dir").join("job.dljob"),
            ["/data/a"],
        ));
        let pool = WorkerPool::new(PoolOptions::default()).unwrap();

        let result = pool
            .run(job, EchoFactory::shared(EchoState::default()), &credential())
            .await;

        assert!(matches!(result, Err(PoolError::FinalSave(_))));
    }

    #[tokio::test]
    async fn test_autosave_runs_while_workers_are_busy() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, &["/data/slow"]);
        let factory = EchoFactory::shared(EchoState {
            delay: Duration::from_millis(300),
            ..EchoState::default()
        });
        let pool = WorkerPool::new(PoolOptions {
            workers: 1,
            autosave_interval: Duration::from_millis(50),
        })
        .unwrap();

        let stats = pool
            .run(job, factory, &credential())
            .await
            .unwrap();

        assert!(stats.autosaves() >= 1, "autosaves: {}", stats.autosaves());
    }

    #[tokio::test]
    async fn test_empty_job_finishes_immediately() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, &[]);
        let pool = WorkerPool::new(PoolOptions::default()).unwrap();

        let stats = pool
            .run(Arc::clone(&job), EchoFactory::shared(EchoState::default()), &credential())
            .await
            .unwrap();

        assert_eq!(stats.completed(), 0);
        assert!(dir.path().join("test.dljob").exists());
    }
}
