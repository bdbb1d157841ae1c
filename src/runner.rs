//! The driver loop.
//!
//! A [`Loop`] pairs a resolved policy with nothing else; binding a step to
//! it yields a [`Controller`], and each [`Controller::start`] call performs
//! one complete run: fresh context, fresh statistics, fresh listener
//! registry. The driver owns all iteration bookkeeping; the step only
//! produces outcomes.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::policy::RunPolicy;
use crate::stats::RunStats;
use crate::step::{Step, StepOutcome};

/// An iteration loop with a resolved policy.
///
/// Cheap to construct and to clone; holds no run state. Usually obtained
/// through [`create`](crate::create), [`create_pausable`](crate::create_pausable)
/// or [`create_retrying`](crate::create_retrying).
#[derive(Debug, Clone)]
pub struct Loop {
    policy: RunPolicy,
}

impl Loop {
    /// Creates a loop from an already resolved policy.
    pub fn new(policy: RunPolicy) -> Self {
        Self { policy }
    }

    /// The policy governing every run started from this loop.
    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// Binds a step to this loop, producing a controller that can start
    /// runs.
    pub fn controller<T, S>(&self, step: S) -> Controller<T, S> {
        Controller {
            policy: self.policy.clone(),
            step,
            seed: None,
            pending: None,
        }
    }
}

/// A step bound to a policy, ready to start runs.
///
/// `T` is the work value carried across iterations; `S` the step
/// implementation. One controller can start any number of runs, strictly
/// one at a time; each run gets its own context, and
/// [`context`](Controller::context) hands out the next run's handle ahead
/// of [`start`](Controller::start) so listeners can be in place for the
/// very first events.
#[derive(Debug)]
pub struct Controller<T, S> {
    policy: RunPolicy,
    step: S,
    seed: Option<T>,
    pending: Option<RunContext<T>>,
}

impl<T, S> Controller<T, S>
where
    T: Clone + Send + 'static,
{
    /// Sets the initial bridge value every run starts from.
    ///
    /// Without a seed the bridge reads `None` until the first successful
    /// iteration. Discards a context already handed out by
    /// [`context`](Controller::context), which was created without the
    /// seed.
    pub fn with_seed(mut self, seed: T) -> Self {
        self.seed = Some(seed);
        self.pending = None;
        self
    }

    /// The context of the next run.
    ///
    /// Created on first call and consumed by the next
    /// [`start`](Controller::start); repeated calls return clones of the
    /// same handle. Use it to register listeners before the run begins or
    /// to pre-arm a pause so the run parks before its first iteration.
    pub fn context(&mut self) -> RunContext<T> {
        let seed = &self.seed;
        self.pending
            .get_or_insert_with(|| RunContext::new(seed.clone()))
            .clone()
    }

    /// Performs one run to completion.
    ///
    /// The step receives a clone of `args` on every invocation. The call
    /// resolves when the iteration limit is reached, the step returns
    /// [`StepOutcome::Stop`], or an error propagates. On the error path
    /// the failed iteration's slot is consumed and the final stats keep
    /// `is_running = true` with no completion timestamp; only the success
    /// path performs termination bookkeeping.
    ///
    /// The run uses the context prepared by
    /// [`context`](Controller::context) when one exists, so listeners
    /// registered there observe the full event sequence from `start`
    /// onward; otherwise a fresh context is created on entry.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] wrapping the step error that exhausted its
    /// attempts, tagged with the consumed iteration number and the number
    /// of attempts made.
    pub async fn start<A, E>(&mut self, args: A) -> Result<RunSummary<T>, RunError<E>>
    where
        S: Step<T, A, E>,
        A: Clone + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        let policy = self.policy.clone();
        let ctx: RunContext<T> = self
            .pending
            .take()
            .unwrap_or_else(|| RunContext::new(self.seed.clone()));

        ctx.mark_started();
        info!(
            "Starting run (limit: {:?}, retry_on_error: {})",
            policy.limit, policy.retry_on_error
        );

        'run: while policy.limit.map_or(true, |limit| ctx.iteration_count() < limit) {
            ctx.wait_if_paused().await;

            let mut attempt: u32 = 1;
            loop {
                let invoked = Instant::now();
                let result = self.step.execute(ctx.clone(), args.clone()).await;
                let elapsed = invoked.elapsed();

                match result {
                    Ok(StepOutcome::Stop) => {
                        debug!(
                            "Stop requested after {} completed iterations",
                            ctx.iteration_count()
                        );
                        break 'run;
                    }
                    Ok(StepOutcome::Continue(value)) => {
                        let completed = ctx.complete_iteration(value, elapsed);
                        debug!("Iteration {} completed in {:?}", completed, elapsed);

                        if policy.interval > Duration::ZERO {
                            sleep(policy.interval).await;
                        }
                        break;
                    }
                    Err(error) => {
                        let message = error.to_string();
                        ctx.record_error(attempt, message.clone());
                        warn!("Step attempt {} failed: {}", attempt, message);

                        if policy.retry_on_error && attempt <= policy.max_retries {
                            attempt += 1;
                            ctx.record_retry(attempt, policy.retry_delay, message);
                            warn!(
                                "Retrying (attempt {}) after {:?}",
                                attempt, policy.retry_delay
                            );

                            if policy.retry_delay > Duration::ZERO {
                                sleep(policy.retry_delay).await;
                            }
                            continue;
                        }

                        // The failed iteration consumes its slot; the run
                        // aborts without termination bookkeeping.
                        let iteration = ctx.consume_iteration();
                        warn!(
                            "Run aborted at iteration {} after {} attempt(s)",
                            iteration, attempt
                        );
                        return Err(RunError {
                            iteration,
                            attempts: attempt,
                            source: error,
                        });
                    }
                }
            }
        }

        ctx.mark_stopped();
        info!("Run complete: {} iterations", ctx.iteration_count());

        Ok(RunSummary {
            value: ctx.bridge(),
            stats: ctx.stats(),
        })
    }
}

/// Final observation of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary<T> {
    /// Statistics snapshot taken at termination.
    pub stats: RunStats,
    /// The final bridge value: the last successful result, or the seed if
    /// no iteration completed, or `None`.
    pub value: Option<T>,
}

/// A run aborted by a step error.
///
/// Carries the step's own error as the source plus the position the run
/// failed at. `iteration` counts the consumed slot of the failed
/// iteration; `attempts` counts invocations of that iteration, retries
/// included.
#[derive(Debug, Error)]
#[error("run aborted at iteration {iteration} after {attempts} attempt(s): {source}")]
pub struct RunError<E>
where
    E: std::error::Error + 'static,
{
    /// 1-based number of the iteration that failed.
    pub iteration: u64,
    /// Number of step invocations the failed iteration made.
    pub attempts: u32,
    /// The step error that exhausted its attempts.
    #[source]
    pub source: E,
}
