use crate::{ResourceUsage, TaskId, TaskKind};
use thiserror::Error;

/// What a blocking wait on a child observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The child was stopped by the stop signal the host sent it. Carries
    /// the usage sample taken at the same time.
    Stopped(ResourceUsage),
    /// The child ran to completion (`exit(0)`). Carries the final usage
    /// sample.
    Exited(ResourceUsage),
}

/// Everything that can go wrong controlling a task's child process.
///
/// All of these are fatal to the simulation: a corrupted or
/// unexpectedly-behaving child means the run no longer reflects the
/// workload it was supposed to measure, so there is no safe way to
/// continue with a mixed/partial dataset.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("task {task}: failed to spawn child process: {source}")]
    Spawn {
        task: TaskId,
        #[source]
        source: std::io::Error,
    },

    #[error("task {task}: failed to signal child process: {source}")]
    Signal {
        task: TaskId,
        #[source]
        source: std::io::Error,
    },

    #[error("task {task}: wait on child process returned no status change")]
    NoStatusChange { task: TaskId },

    #[error("task {task}: child process terminated by its own stop signal instead of stopping")]
    KilledByStopSignal { task: TaskId },

    #[error("task {task}: child process stopped by an unexpected signal (expected our stop signal)")]
    UnexpectedStopSignal { task: TaskId },

    #[error("task {task}: child process exited with a nonzero status")]
    NonZeroExit { task: TaskId, code: i32 },

    #[error("task {task}: waiting for child process failed: {source}")]
    Wait {
        task: TaskId,
        #[source]
        source: std::io::Error,
    },
}

/// Abstracts "the operating-system process that embodies a task's
/// workload" so that `schedsim_kernel` can dispatch tasks without knowing
/// how they're actually spawned and signalled.
///
/// `schedsim_host` provides the only production implementation, using real
/// child processes and POSIX job-control signals. Tests may provide a
/// fake.
pub trait ProcessHandle: Sized + Send {
    /// Spawn the child process that executes `kind`'s leaf workload.
    fn spawn(task: TaskId, kind: TaskKind) -> Result<Self, ProcessError>;

    /// Send the host's continue signal. Valid only for a previously
    /// suspended child.
    fn resume(&mut self) -> Result<(), ProcessError>;

    /// Send the host's stop signal and block until the child reports a
    /// stopped or exited status, returning the usage sample taken at that
    /// point.
    fn suspend(&mut self) -> Result<ProcessOutcome, ProcessError>;

    /// Unconditionally terminate the child. Used when a task is dropped
    /// before reaching [`crate::TaskState::Finished`] (graceful drain does
    /// not call this; immediate shutdown does).
    fn terminate(&mut self);

    /// Block until the child exits on its own, without ever sending it a
    /// stop signal. Used only by the non-preemptive SJF scheduler, whose
    /// tasks run start-to-finish in a single dispatch.
    fn run_to_completion(&mut self) -> Result<ResourceUsage, ProcessError>;
}
