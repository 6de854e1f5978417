use schedsim_core::{Clock, ProcessHandle, SystemClock, Task};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Condvar, Mutex};
use std::thread::Scope;
use std::time::Duration;

/// A task paired with the estimated runtime it was enqueued with.
///
/// Estimated runtime is metadata the harness supplies when it hands a task
/// to the SJF scheduler, not a field on [`Task`] itself: the task data
/// model is shared across every scheduler variant, and "how long will this
/// take" is a scheduling hint specific to SJF, not part of a task's
/// identity or state (see DESIGN.md).
struct Ranked<'t, P: ProcessHandle> {
    estimate: Duration,
    seq: u64,
    task: &'t mut Task<P>,
}

impl<'t, P: ProcessHandle> PartialEq for Ranked<'t, P> {
    fn eq(&self, other: &Self) -> bool {
        self.estimate == other.estimate && self.seq == other.seq
    }
}
impl<'t, P: ProcessHandle> Eq for Ranked<'t, P> {}

impl<'t, P: ProcessHandle> Ord for Ranked<'t, P> {
    /// `BinaryHeap` is a max-heap; SJF wants the *shortest* estimate out
    /// first, so the ordering is reversed. Ties break on enqueue order
    /// (earlier `seq` wins) to keep the ready set FIFO-stable among
    /// equally-estimated tasks.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl<'t, P: ProcessHandle> PartialOrd for Ranked<'t, P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct ReadySet<'t, P: ProcessHandle> {
    heap: Mutex<BinaryHeap<Ranked<'t, P>>>,
    cond: Condvar,
}

/// The non-preemptive Shortest-Job-First scheduler core.
///
/// Unlike [`crate::mlfq::Mlfq`], there is a single shared ready set instead
/// of N priority levels, no demotion, and no priority-boost coordinator:
/// once a worker picks a task it runs it straight through to
/// [`schedsim_core::TaskState::Finished`] in one dispatch.
pub struct Sjf<'t, P: ProcessHandle + 'static> {
    ready: ReadySet<'t, P>,
    ncpus: usize,
    stop: AtomicBool,
    next_seq: AtomicU64,
    clock: Box<dyn Clock>,
}

impl<'t, P: ProcessHandle + 'static> Sjf<'t, P> {
    pub fn new(ncpus: usize) -> Self {
        Self::with_clock(ncpus, Box::new(SystemClock))
    }

    pub fn with_clock(ncpus: usize, clock: Box<dyn Clock>) -> Self {
        Self {
            ready: ReadySet {
                heap: Mutex::new(BinaryHeap::new()),
                cond: Condvar::new(),
            },
            ncpus: std::cmp::max(1, ncpus),
            stop: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            clock,
        }
    }

    /// Enqueue a task with its declared/estimated total runtime.
    pub fn enqueue(&self, task: &'t mut Task<P>, estimate: Duration) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        {
            let mut heap = self.ready.heap.lock().unwrap();
            heap.push(Ranked { estimate, seq, task });
        }
        self.ready.cond.notify_one();
    }

    pub fn spawn<'scope>(&'scope self, scope: &'scope Scope<'scope, '_>)
    where
        't: 'scope,
    {
        for _ in 0..self.ncpus {
            scope.spawn(move || self.worker_loop());
        }
    }

    /// Graceful shutdown: stop pulling new work once the ready set drains.
    /// There is no HALT-equivalent for SJF because a dispatch is already
    /// non-preemptive and runs to completion; "immediate" shutdown would
    /// mean killing a task mid-run, which this scheduler never does.
    pub fn shutdown(&self) {
        self.stop.store(true, AtomicOrdering::Release);
        self.ready.cond.notify_all();
    }

    fn worker_loop(&self) {
        loop {
            let mut guard = self
                .ready
                .cond
                .wait_while(self.ready.heap.lock().unwrap(), |heap| {
                    heap.is_empty() && !self.stop.load(AtomicOrdering::Acquire)
                })
                .unwrap();
            let ranked = match guard.pop() {
                Some(r) => r,
                None => return,
            };
            drop(guard);
            self.dispatch(ranked);
        }
    }

    fn dispatch(&self, ranked: Ranked<'t, P>) {
        let id = ranked.task.id();
        ranked
            .task
            .run_to_completion(&*self.clock)
            .unwrap_or_else(|e| panic!("task {id}: fatal scheduling error: {e}"));
    }
}

impl<'t, P: ProcessHandle + 'static> Drop for Sjf<'t, P> {
    /// Mirrors `Mlfq`'s destructor: draining is the only shutdown mode, so
    /// destruction always requests it (see `shutdown`'s doc comment for why
    /// there is no immediate/HALT equivalent here).
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedsim_core::{ProcessError, ProcessOutcome, ResourceUsage, TaskKind};
    use std::time::{Duration as StdDuration, Instant};

    struct NoopProcess;
    impl ProcessHandle for NoopProcess {
        fn spawn(_task: schedsim_core::TaskId, _kind: TaskKind) -> Result<Self, ProcessError> {
            Ok(NoopProcess)
        }
        fn resume(&mut self) -> Result<(), ProcessError> {
            Ok(())
        }
        fn suspend(&mut self) -> Result<ProcessOutcome, ProcessError> {
            Ok(ProcessOutcome::Exited(ResourceUsage::ZERO))
        }
        fn terminate(&mut self) {}
        fn run_to_completion(&mut self) -> Result<ResourceUsage, ProcessError> {
            Ok(ResourceUsage::ZERO)
        }
    }

    #[test]
    fn heap_pops_shortest_estimate_first() {
        let mut t1 = Task::<NoopProcess>::new(TaskKind::Cpu, Instant::now());
        let mut t2 = Task::<NoopProcess>::new(TaskKind::Cpu, Instant::now());
        let mut t3 = Task::<NoopProcess>::new(TaskKind::Cpu, Instant::now());

        let mut heap = BinaryHeap::new();
        heap.push(Ranked { estimate: StdDuration::from_millis(30), seq: 0, task: &mut t1 });
        heap.push(Ranked { estimate: StdDuration::from_millis(10), seq: 1, task: &mut t2 });
        heap.push(Ranked { estimate: StdDuration::from_millis(20), seq: 2, task: &mut t3 });

        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).map(|r| r.estimate).collect();
        assert_eq!(
            order,
            vec![
                StdDuration::from_millis(10),
                StdDuration::from_millis(20),
                StdDuration::from_millis(30),
            ]
        );
    }

    #[test]
    fn ties_break_on_enqueue_order() {
        let mut t1 = Task::<NoopProcess>::new(TaskKind::Cpu, Instant::now());
        let mut t2 = Task::<NoopProcess>::new(TaskKind::Cpu, Instant::now());

        let mut heap = BinaryHeap::new();
        heap.push(Ranked { estimate: StdDuration::from_millis(10), seq: 5, task: &mut t1 });
        heap.push(Ranked { estimate: StdDuration::from_millis(10), seq: 2, task: &mut t2 });

        assert_eq!(heap.pop().unwrap().seq, 2);
    }
}
