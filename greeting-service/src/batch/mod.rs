//! Scheduled greeting jobs.
//!
//! Each job reads the whole greeting store and logs its size. Jobs run on their own
//! tokio tasks outside any request, so they never see a request principal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::services::metrics::BATCH_JOB_INVOCATIONS;
use crate::services::{GreetingService, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchJob {
    FixedRate,
    FixedRateWithInitialDelay,
    FixedDelay,
    FixedDelayWithInitialDelay,
}

impl BatchJob {
    pub const ALL: [BatchJob; 4] = [
        BatchJob::FixedRate,
        BatchJob::FixedRateWithInitialDelay,
        BatchJob::FixedDelay,
        BatchJob::FixedDelayWithInitialDelay,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BatchJob::FixedRate => "fixed_rate",
            BatchJob::FixedRateWithInitialDelay => "fixed_rate_with_initial_delay",
            BatchJob::FixedDelay => "fixed_delay",
            BatchJob::FixedDelayWithInitialDelay => "fixed_delay_with_initial_delay",
        }
    }
}

#[derive(Clone)]
pub struct GreetingBatch {
    greetings: GreetingService,
    config: BatchConfig,
    completed: Arc<AtomicU64>,
}

impl GreetingBatch {
    pub fn new(greetings: GreetingService, config: BatchConfig) -> Self {
        Self {
            greetings,
            config,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of job runs that finished without error, across all jobs.
    pub fn completed_runs(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Run `job` once and return the number of greetings it saw.
    pub async fn run_job(&self, job: BatchJob) -> Result<usize, ServiceError> {
        metrics::counter!(BATCH_JOB_INVOCATIONS, "job" => job.name()).increment(1);
        tracing::debug!(job = job.name(), "Batch job started");

        let greetings = self.greetings.find_all().await?;
        let count = greetings.len();
        tracing::info!(job = job.name(), count, "There are {} greetings in the data store.", count);

        self.completed.fetch_add(1, Ordering::Relaxed);
        Ok(count)
    }

    /// Spawn every job. Each task exits once `shutdown` is cancelled.
    pub fn start(self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("Batch jobs disabled by configuration");
            return Vec::new();
        }

        let initial_delay = Duration::from_millis(self.config.initial_delay_ms);
        let rate = period(self.config.fixed_rate_ms);
        let delay = period(self.config.fixed_delay_ms);

        tracing::info!(
            fixed_rate_ms = self.config.fixed_rate_ms,
            fixed_delay_ms = self.config.fixed_delay_ms,
            initial_delay_ms = self.config.initial_delay_ms,
            "Starting batch jobs"
        );

        BatchJob::ALL
            .into_iter()
            .map(|job| {
                let batch = self.clone();
                let shutdown = shutdown.clone();
                match job {
                    BatchJob::FixedRate => {
                        tokio::spawn(batch.fixed_rate(job, Duration::ZERO, rate, shutdown))
                    }
                    BatchJob::FixedRateWithInitialDelay => {
                        tokio::spawn(batch.fixed_rate(job, initial_delay, rate, shutdown))
                    }
                    BatchJob::FixedDelay => {
                        tokio::spawn(batch.fixed_delay(job, Duration::ZERO, delay, shutdown))
                    }
                    BatchJob::FixedDelayWithInitialDelay => {
                        tokio::spawn(batch.fixed_delay(job, initial_delay, delay, shutdown))
                    }
                }
            })
            .collect()
    }

    /// Starts are `period` apart regardless of run time. Overrunning ticks are skipped.
    async fn fixed_rate(
        self,
        job: BatchJob,
        initial_delay: Duration,
        period: Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = interval_at(Instant::now() + initial_delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.run_logged(job).await,
            }
        }
        tracing::info!(job = job.name(), "Batch job stopped");
    }

    /// Waits `delay` after each run completes before starting the next.
    async fn fixed_delay(
        self,
        job: BatchJob,
        initial_delay: Duration,
        delay: Duration,
        shutdown: CancellationToken,
    ) {
        let mut wait = initial_delay;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(wait) => {}
            }
            self.run_logged(job).await;
            wait = delay;
        }
        tracing::info!(job = job.name(), "Batch job stopped");
    }

    async fn run_logged(&self, job: BatchJob) {
        if let Err(e) = self.run_job(job).await {
            tracing::error!(job = job.name(), error = %e, "Batch job failed");
        }
    }
}

/// Zero would spin the job in a tight loop; the shortest period is one millisecond.
fn period(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::models::Greeting;
    use crate::services::InMemoryGreetingRepository;

    fn batch(config: BatchConfig) -> (GreetingBatch, GreetingService) {
        let greetings = GreetingService::new(Arc::new(InMemoryGreetingRepository::new()));
        (GreetingBatch::new(greetings.clone(), config), greetings)
    }

    #[tokio::test]
    async fn run_job_counts_greetings_without_a_principal() {
        let (batch, greetings) = batch(BatchConfig::default());
        for text in ["Hello", "Hola"] {
            RequestContext::scope_as("alice", greetings.create(Greeting::new(text)))
                .await
                .unwrap();
        }

        assert_eq!(RequestContext::username(), None);
        assert_eq!(batch.run_job(BatchJob::FixedRate).await.unwrap(), 2);
        assert_eq!(batch.completed_runs(), 1);
    }

    #[test]
    fn zero_periods_are_clamped() {
        assert_eq!(period(0), Duration::from_millis(1));
        assert_eq!(period(250), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn disabled_batch_spawns_nothing() {
        let (batch, _) = batch(BatchConfig::default());
        assert!(batch.start(CancellationToken::new()).is_empty());
    }

    #[tokio::test]
    async fn jobs_repeat_until_cancelled() {
        let (batch, _) = batch(BatchConfig {
            enabled: true,
            fixed_rate_ms: 10,
            fixed_delay_ms: 10,
            initial_delay_ms: 5,
        });
        let shutdown = CancellationToken::new();

        let handles = batch.clone().start(shutdown.clone());
        assert_eq!(handles.len(), BatchJob::ALL.len());

        sleep(Duration::from_millis(120)).await;
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        let runs = batch.completed_runs();
        assert!(runs >= 8, "expected every job to run repeatedly, got {}", runs);

        sleep(Duration::from_millis(30)).await;
        assert_eq!(batch.completed_runs(), runs);
    }
}
