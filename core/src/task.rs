use crate::{ProcessError, ProcessHandle, ProcessOutcome, ResourceUsage};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A stable, monotonically increasing task identifier, assigned in
/// construction order by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocate the next identifier. Shared across every scheduler variant
    /// so that ids stay unique and increasing within a single process run,
    /// regardless of which scheduler constructed the task.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which leaf workload a task spawns. The two variants differ only in
/// which leaf executable they run; no other part of the Core inspects the
/// kind except the Metrics Aggregator's per-variant breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Spawns `cpu_task`: a fixed-iteration 16x16 matrix-multiply loop.
    Cpu,
    /// Spawns `mem_task`: fixed-iteration random-access string-vector
    /// reads.
    Mem,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Cpu => "cpu",
            TaskKind::Mem => "mem",
        })
    }
}

/// A task's position in its state machine: RUNNABLE before first dispatch,
/// RUNNING while its child executes, STOPPED between timeslices, FINISHED
/// once the child has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Runnable,
    Running,
    Stopped,
    Finished,
}

/// Errors a caller of [`Task`]'s dispatch operations can observe.
///
/// Preconditions on the state machine (e.g. calling `resume` on a task that
/// was never spawned) are programming bugs in the scheduler core, not
/// runtime conditions a caller can meaningfully recover from; those are
/// `assert!`ed, not returned here.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// A scheduled unit: identity, a controlled child process, a state, and
/// the five timestamps the Metrics Aggregator needs.
///
/// `Task` owns its child process handle exclusively. Dropping a `Task`
/// that has not reached [`TaskState::Finished`] terminates its child (see
/// `Drop` below) so that an aborted or halted run never leaks workload
/// processes.
pub struct Task<P: ProcessHandle> {
    id: TaskId,
    kind: TaskKind,
    child: Option<P>,
    state: TaskState,
    usage: ResourceUsage,
    t_start: Instant,
    t_firstrun: Option<Instant>,
    t_completion: Option<Instant>,
    t_laststop: Option<Instant>,
    t_waiting: Duration,
}

impl<P: ProcessHandle> Task<P> {
    /// Construct a new task in [`TaskState::Runnable`]. `now` is the
    /// caller's clock reading at construction time and becomes `t_start`.
    pub fn new(kind: TaskKind, now: Instant) -> Self {
        Self {
            id: TaskId::next(),
            kind,
            child: None,
            state: TaskState::Runnable,
            usage: ResourceUsage::ZERO,
            t_start: now,
            t_firstrun: None,
            t_completion: None,
            t_laststop: None,
            t_waiting: Duration::ZERO,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn usage(&self) -> ResourceUsage {
        self.usage
    }

    pub fn t_start(&self) -> Instant {
        self.t_start
    }

    pub fn t_firstrun(&self) -> Option<Instant> {
        self.t_firstrun
    }

    pub fn t_completion(&self) -> Option<Instant> {
        self.t_completion
    }

    pub fn t_laststop(&self) -> Option<Instant> {
        self.t_laststop
    }

    pub fn t_waiting(&self) -> Duration {
        self.t_waiting
    }

    /// CPU-time difference, in milliseconds, between a previously saved
    /// usage sample and the task's current usage.
    pub fn usage_delta(&self, prev: ResourceUsage) -> u64 {
        self.usage.delta_ms(prev)
    }

    /// RUNNABLE -> RUNNING. Spawns the child process. Sets `t_firstrun` on
    /// the first call only; later calls (there are none in a well-formed
    /// dispatch loop, since this is only reached from RUNNABLE once) would
    /// otherwise clobber the response-time measurement.
    pub fn spawn(&mut self, now: Instant) -> Result<(), TaskError> {
        assert_eq!(
            self.state,
            TaskState::Runnable,
            "task {}: spawn() called outside RUNNABLE",
            self.id
        );
        assert!(self.child.is_none());

        let child = P::spawn(self.id, self.kind)?;
        self.child = Some(child);
        if self.t_firstrun.is_none() {
            self.t_firstrun = Some(now);
        }
        self.state = TaskState::Running;
        log::debug!("task {} ({}) spawned", self.id, self.kind);
        Ok(())
    }

    /// STOPPED -> RUNNING. Sends the continue signal and folds the elapsed
    /// stopped interval into `t_waiting` before transitioning.
    pub fn resume(&mut self, now: Instant) -> Result<(), TaskError> {
        assert_eq!(
            self.state,
            TaskState::Stopped,
            "task {}: resume() called outside STOPPED",
            self.id
        );
        let laststop = self
            .t_laststop
            .expect("STOPPED task must have a t_laststop");

        self.child
            .as_mut()
            .expect("STOPPED task must have a child")
            .resume()?;

        self.t_waiting += now.saturating_duration_since(laststop);
        self.state = TaskState::Running;
        log::trace!("task {} resumed", self.id);
        Ok(())
    }

    /// RUNNING -> STOPPED (or -> FINISHED if the child is observed to have
    /// exited). Blocks until the host reports a status change, then
    /// updates `usage` and the relevant timestamp.
    pub fn suspend(&mut self, now: Instant) -> Result<(), TaskError> {
        assert_eq!(
            self.state,
            TaskState::Running,
            "task {}: suspend() called outside RUNNING",
            self.id
        );

        let outcome = self
            .child
            .as_mut()
            .expect("RUNNING task must have a child")
            .suspend()?;

        match outcome {
            ProcessOutcome::Stopped(usage) => {
                self.usage = usage;
                self.t_laststop = Some(now);
                self.state = TaskState::Stopped;
                log::trace!("task {} stopped, usage={:?}", self.id, self.usage);
            }
            ProcessOutcome::Exited(usage) => {
                self.usage = usage;
                self.t_completion = Some(now);
                self.state = TaskState::Finished;
                log::debug!("task {} finished", self.id);
            }
        }
        Ok(())
    }

    /// RUNNABLE -> FINISHED in one step: spawns the child and blocks until
    /// it exits, never stopping it in between. Used only by the SJF
    /// scheduler, which never preempts a running task.
    /// Takes a clock rather than a single `Instant` because `t_firstrun`
    /// and `t_completion` straddle the blocking call to the child.
    pub fn run_to_completion(&mut self, clock: &dyn crate::Clock) -> Result<(), TaskError> {
        assert_eq!(
            self.state,
            TaskState::Runnable,
            "task {}: run_to_completion() called outside RUNNABLE",
            self.id
        );
        assert!(self.child.is_none());

        self.t_firstrun = Some(clock.now());
        let mut child = P::spawn(self.id, self.kind)?;
        self.state = TaskState::Running;
        log::debug!("task {} ({}) spawned (run-to-completion)", self.id, self.kind);

        let usage = child.run_to_completion()?;
        self.child = Some(child);
        self.usage = usage;
        self.t_completion = Some(clock.now());
        self.state = TaskState::Finished;
        log::debug!("task {} finished (run-to-completion)", self.id);
        Ok(())
    }
}

impl<P: ProcessHandle> Drop for Task<P> {
    fn drop(&mut self) {
        if self.state != TaskState::Finished {
            if let Some(child) = self.child.as_mut() {
                log::debug!(
                    "task {} dropped in state {:?}, terminating child",
                    self.id,
                    self.state
                );
                child.terminate();
            }
        }
    }
}

impl<P: ProcessHandle> fmt::Debug for Task<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("usage", &self.usage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeProcessInner {
        resumed: u32,
        suspended: u32,
        terminated: bool,
        next_outcomes: Vec<ProcessOutcome>,
    }

    struct FakeProcess(Arc<Mutex<FakeProcessInner>>);

    impl ProcessHandle for FakeProcess {
        fn spawn(_task: TaskId, _kind: TaskKind) -> Result<Self, ProcessError> {
            Ok(FakeProcess(Arc::new(Mutex::new(FakeProcessInner {
                next_outcomes: vec![ProcessOutcome::Exited(ResourceUsage::from_user_system_ms(
                    5, 0,
                ))],
                ..Default::default()
            }))))
        }

        fn resume(&mut self) -> Result<(), ProcessError> {
            self.0.lock().unwrap().resumed += 1;
            Ok(())
        }

        fn suspend(&mut self) -> Result<ProcessOutcome, ProcessError> {
            let mut inner = self.0.lock().unwrap();
            inner.suspended += 1;
            Ok(inner.next_outcomes.remove(0))
        }

        fn terminate(&mut self) {
            self.0.lock().unwrap().terminated = true;
        }

        fn run_to_completion(&mut self) -> Result<ResourceUsage, ProcessError> {
            let mut inner = self.0.lock().unwrap();
            match inner.next_outcomes.remove(0) {
                ProcessOutcome::Exited(usage) => Ok(usage),
                ProcessOutcome::Stopped(_) => panic!("fake configured to stop, not exit"),
            }
        }
    }

    #[test]
    fn first_spawn_sets_firstrun_once() {
        let t0 = Instant::now();
        let mut task: Task<FakeProcess> = Task::new(TaskKind::Cpu, t0);
        assert_eq!(task.state(), TaskState::Runnable);

        let t1 = t0 + Duration::from_millis(10);
        task.spawn(t1).unwrap();
        assert_eq!(task.t_firstrun(), Some(t1));
        assert_eq!(task.state(), TaskState::Running);
    }

    #[test]
    fn suspend_on_exit_finishes_task() {
        let t0 = Instant::now();
        let mut task: Task<FakeProcess> = Task::new(TaskKind::Mem, t0);
        task.spawn(t0).unwrap();

        let t1 = t0 + Duration::from_millis(24);
        task.suspend(t1).unwrap();
        assert_eq!(task.state(), TaskState::Finished);
        assert_eq!(task.t_completion(), Some(t1));
        assert_eq!(task.usage().total_ms(), 5);
    }

    #[test]
    #[should_panic(expected = "outside RUNNABLE")]
    fn spawn_from_wrong_state_panics() {
        let t0 = Instant::now();
        let mut task: Task<FakeProcess> = Task::new(TaskKind::Cpu, t0);
        task.spawn(t0).unwrap();
        task.spawn(t0).unwrap();
    }
}
