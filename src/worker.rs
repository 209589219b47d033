//! Queue-driven worker: pulls jobs, runs isolated job runners concurrently
//! and reports each outcome.

use std::future::Future;
use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{error, info, warn};

use crate::engine::EngineFactory;
use crate::queue::{JobSink, JobSource};
use crate::runner::JobRunner;
use crate::{Job, JobFailure, RenderConfig, Result};

type JobOutcome = std::result::Result<Job, JobFailure>;

/// Totals for one [`Worker::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
}

pub struct Worker<F: EngineFactory> {
    factory: Arc<F>,
    config: RenderConfig,
}

impl<F: EngineFactory> Worker<F> {
    pub fn new(factory: F, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory: Arc::new(factory),
            config,
        })
    }

    /// Process jobs until `source` is exhausted or `shutdown` resolves.
    ///
    /// At most `concurrency` jobs are in flight; each gets its own runner,
    /// proxy and browser. After shutdown no new job is pulled, but jobs
    /// already running are finished and reported before this returns.
    /// An error reading the source or writing the sink stops the worker.
    pub async fn run<S, K>(&self, source: &mut S, sink: &mut K, shutdown: impl Future<Output = ()>) -> Result<WorkerStats>
    where
        S: JobSource + ?Sized,
        K: JobSink + ?Sized,
    {
        let mut stats = WorkerStats::default();
        let mut in_flight: FuturesUnordered<LocalBoxFuture<'static, JobOutcome>> = FuturesUnordered::new();
        let mut accepting = true;
        let mut failure = None;
        tokio::pin!(shutdown);

        loop {
            if !accepting && in_flight.is_empty() {
                break;
            }

            let has_capacity = in_flight.len() < self.config.concurrency;

            // Shutdown first, then finished jobs, then new work.
            tokio::select! {
                biased;

                _ = &mut shutdown, if accepting => {
                    info!("(worker) shutdown requested, draining {} job(s)", in_flight.len());
                    accepting = false;
                }
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    let reported = match outcome {
                        Ok(job) => {
                            stats.completed += 1;
                            sink.submit(job).await
                        }
                        Err(failed) => {
                            stats.failed += 1;
                            sink.fail(failed.job, &failed.error).await
                        }
                    };
                    if let Err(e) = reported {
                        error!("(worker) failed to report job outcome: {}", e);
                        if failure.is_none() {
                            failure = Some(e);
                        }
                        accepting = false;
                    }
                }
                next = source.next_job(), if accepting && has_capacity => {
                    match next {
                        Ok(Some(job)) => {
                            let runner = JobRunner::new(job, self.factory.clone(), self.config.clone());
                            in_flight.push(runner.run().boxed_local());
                        }
                        Ok(None) => {
                            info!("(worker) job source exhausted");
                            accepting = false;
                        }
                        Err(e) => {
                            error!("(worker) failed to fetch next job: {}", e);
                            accepting = false;
                            failure = Some(e);
                        }
                    }
                }
            }
        }

        if let Some(e) = failure {
            warn!("(worker) stopped after {} completed / {} failed job(s)", stats.completed, stats.failed);
            return Err(e);
        }

        info!("(worker) finished: {} completed, {} failed", stats.completed, stats.failed);
        Ok(stats)
    }
}
