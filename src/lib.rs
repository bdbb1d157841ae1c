//! steploop - a reusable async iteration controller.
//!
//! The crate drives a caller-supplied async step function repeatedly under
//! an explicit [`RunPolicy`]: an optional iteration limit, an interval
//! between iterations, and a retry ladder for step failures. Every run
//! exposes a [`RunContext`] handle carrying pause/resume control,
//! lifecycle event subscriptions, a single-slot value bridge between
//! iterations, and live statistics.
//!
//! Runs are cooperative and strictly sequential: one step invocation at a
//! time, suspension only at the step's own awaits, the configured delays,
//! and the pause gate.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//! use steploop::{create, PolicyOverrides, RunContext, StepOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lp = create(
//!         PolicyOverrides::new()
//!             .with_limit(5)
//!             .with_interval(Duration::from_millis(10)),
//!     );
//!
//!     let mut controller = lp
//!         .controller(|ctx: RunContext<u64>, _: ()| async move {
//!             let count = ctx.bridge().unwrap_or(0);
//!             println!("tick {count}");
//!             Ok::<_, std::io::Error>(StepOutcome::Continue(count + 1))
//!         })
//!         .with_seed(0);
//!
//!     let summary = controller.start(()).await?;
//!     println!("ran {} iterations", summary.stats.executions);
//!     Ok(())
//! }
//! ```
//!
//! Returning [`StepOutcome::Stop`] from the step ends a run early on the
//! success path; returning an error either aborts the run or, with
//! [`create_retrying`], re-attempts the iteration up to the policy's
//! retry budget.

pub mod context;
pub mod event;
pub mod logging;
pub mod policy;
pub mod runner;
pub mod stats;
pub mod step;

mod pause;

pub use context::RunContext;
pub use event::{Event, EventKind, ListenerId};
pub use policy::{PolicyFileError, PolicyOverrides, RunPolicy};
pub use runner::{Controller, Loop, RunError, RunSummary};
pub use stats::RunStats;
pub use step::{Step, StepOutcome, StepResult};

/// Creates a [`Loop`] by resolving the given overrides against the
/// documented defaults.
pub fn create(overrides: PolicyOverrides) -> Loop {
    Loop::new(overrides.resolve())
}

/// Creates a [`Loop`] with pause/resume control.
///
/// Pause support is built into every loop, so this is [`create`] under a
/// name that states the intent.
pub fn create_pausable(overrides: PolicyOverrides) -> Loop {
    create(overrides)
}

/// Creates a [`Loop`] that retries failed iterations.
///
/// Defaults `retry_on_error` to `true` when the override leaves it unset;
/// an explicit override wins either way.
pub fn create_retrying(mut overrides: PolicyOverrides) -> Loop {
    if overrides.retry_on_error.is_none() {
        overrides.retry_on_error = Some(true);
    }
    Loop::new(overrides.resolve())
}
