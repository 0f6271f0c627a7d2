use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::GenerationApi;
use crate::config::PollConfig;
use crate::error::GenError;
use crate::resolver::ResultResolver;
use crate::types::{GenerationOutcome, JobStatus};

/// The polling state machine for one submitted job.
///
/// A poller owns the fixed-interval re-check loop between submission and
/// a terminal outcome. Each tick performs exactly one status check:
///
/// - `completed` with an asset reference stops the loop and resolves the
///   asset through [`ResultResolver`];
/// - `failed` stops the loop with the service-supplied message;
/// - `pending`/`processing` counts one attempt and keeps polling, as do
///   transient poll errors, which are treated the same as "not done
///   yet";
/// - reaching the attempt ceiling stops the loop with
///   [`GenerationOutcome::TimedOutChecking`], which is a client-side
///   give-up, never a failure: the job may still finish on the service.
///
/// Ticks are strictly sequential; a tick never starts before the
/// previous tick's network call has resolved.
pub struct JobPoller<A> {
    api: Arc<A>,
    resolver: Arc<ResultResolver<A>>,
    config: PollConfig,
}

impl<A: GenerationApi> JobPoller<A> {
    pub fn new(api: Arc<A>, resolver: Arc<ResultResolver<A>>, config: PollConfig) -> Self {
        Self {
            api,
            resolver,
            config,
        }
    }

    /// Poll the job until it settles or the attempt ceiling is reached.
    ///
    /// `on_attempt` is invoked with the attempt number after each
    /// non-terminal poll, so owners can surface per-job progress.
    pub async fn run<F>(&self, job_id: &str, mut on_attempt: F) -> GenerationOutcome
    where
        F: FnMut(u32) + Send,
    {
        for attempt in 1..=self.config.max_attempts {
            tokio::time::sleep(self.config.interval).await;

            match self.api.poll(job_id).await {
                Ok(poll) => match poll.status {
                    JobStatus::Completed => {
                        let asset_id = match poll.asset_id {
                            Some(id) if !id.is_empty() => id,
                            _ => {
                                return GenerationOutcome::Failed {
                                    error: "job completed without an asset reference".into(),
                                }
                            }
                        };
                        return match self.resolver.resolve(&asset_id).await {
                            Ok(asset) => GenerationOutcome::Completed { asset },
                            Err(e) => GenerationOutcome::ResolutionFailed {
                                asset_id,
                                error: e.to_string(),
                            },
                        };
                    }
                    JobStatus::Failed => {
                        return GenerationOutcome::Failed {
                            error: poll
                                .error
                                .unwrap_or_else(|| "generation failed".to_string()),
                        }
                    }
                    JobStatus::Pending | JobStatus::Processing => on_attempt(attempt),
                },
                // A rejected credential will not fix itself on the next tick.
                Err(e @ GenError::Auth(_)) => {
                    return GenerationOutcome::Failed {
                        error: e.to_string(),
                    }
                }
                // Transient poll failure: same as "not done yet".
                Err(_) => on_attempt(attempt),
            }
        }

        GenerationOutcome::TimedOutChecking
    }

    /// Run the poller as a background task.
    ///
    /// `on_settled` receives the outcome exactly once. If the handle is
    /// stopped first it is never called, even when a network call was
    /// already in flight at stop time.
    pub fn spawn<F, G>(self, job_id: String, on_attempt: F, on_settled: G) -> PollerHandle
    where
        A: 'static,
        F: FnMut(u32) + Send + 'static,
        G: FnOnce(GenerationOutcome) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task_job_id = job_id.clone();

        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = self.run(&task_job_id, on_attempt) => outcome,
                _ = stop_rx.changed() => return,
            };
            // A stop that lands between the final poll resolving and
            // this point still wins.
            if *stop_rx.borrow() {
                return;
            }
            on_settled(outcome);
        });

        PollerHandle {
            job_id,
            stop: stop_tx,
            task,
        }
    }
}

/// Handle to a spawned poller task.
///
/// Stopping (or dropping) the handle cancels the task and guarantees no
/// further state mutation from it. An in-flight status check cannot be
/// aborted mid-request; its result is discarded instead.
#[derive(Debug)]
pub struct PollerHandle {
    job_id: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// The job this poller is watching.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Cancel the poll loop. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
        self.task.abort();
    }

    /// Whether the task has exited (settled or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
