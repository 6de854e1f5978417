//! Platform-independent data model for the schedsim simulator: [`Task`],
//! its state machine and timestamps, and the [`ProcessHandle`] trait the
//! scheduler dispatches through without knowing how a task's child process
//! is actually spawned or signalled.
//!
//! Concrete process control lives in `schedsim_host`; scheduling policy
//! lives in `schedsim_kernel`. This crate only knows about the shapes both
//! sides agree on.

mod clock;
mod process;
mod task;
mod usage;

pub use clock::{Clock, SystemClock};
pub use process::{ProcessError, ProcessHandle, ProcessOutcome};
pub use task::{Task, TaskError, TaskId, TaskKind, TaskState};
pub use usage::ResourceUsage;
