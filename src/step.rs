//! The step contract.
//!
//! A step is the unit of work a controller drives: anything implementing
//! [`Step`], most commonly a closure taking the run context and the run's
//! call arguments. Each invocation resolves to a [`StepResult`]: a value to
//! carry forward, a [`StepOutcome::Stop`] request, or an error.

use std::future::Future;

use async_trait::async_trait;

use crate::context::RunContext;

/// Outcome of one step invocation on the success path.
///
/// `Stop` is the stop sentinel: returning it from a step is the only
/// in-band way to end a run early, and the run still terminates on the
/// success path (final stats recorded, `stop` emitted). Being a distinct
/// variant rather than a magic value, it cannot collide with any `T` the
/// step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome<T> {
    /// The iteration produced a value; the run continues with it as the
    /// new bridge value.
    Continue(T),
    /// Request early, successful termination of the current run. The
    /// terminal invocation does not count as a completed iteration.
    Stop,
}

impl<T> StepOutcome<T> {
    /// Returns true if this outcome requests termination.
    pub fn is_stop(&self) -> bool {
        matches!(self, StepOutcome::Stop)
    }

    /// Returns true if this outcome carries a value to continue with.
    pub fn is_continue(&self) -> bool {
        matches!(self, StepOutcome::Continue(_))
    }
}

/// Result of one step invocation: an outcome, or the step's error.
pub type StepResult<T, E> = Result<StepOutcome<T>, E>;

/// A unit of work driven by a controller.
///
/// Implement this for step types that carry their own state. Closures of
/// shape `FnMut(RunContext<T>, A) -> impl Future<Output = StepResult<T, E>>`
/// get a blanket implementation, so most callers never name this trait.
///
/// Each invocation receives a fresh clone of the run's context handle and a
/// clone of the arguments `start` was called with. Invocations are strictly
/// sequential: the driver awaits each before considering the next.
#[async_trait]
pub trait Step<T, A, E>: Send {
    /// Executes one attempt of one iteration.
    async fn execute(&mut self, ctx: RunContext<T>, args: A) -> StepResult<T, E>;
}

#[async_trait]
impl<T, A, E, F, Fut> Step<T, A, E> for F
where
    T: Send + 'static,
    A: Send + 'static,
    E: Send + 'static,
    F: FnMut(RunContext<T>, A) -> Fut + Send,
    Fut: Future<Output = StepResult<T, E>> + Send + 'static,
{
    async fn execute(&mut self, ctx: RunContext<T>, args: A) -> StepResult<T, E> {
        (self)(ctx, args).await
    }
}
