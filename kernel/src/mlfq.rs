use crate::flags::Flags;
use crate::queue::{Dequeued, ReadyQueueBank};
use schedsim_core::{Clock, ProcessHandle, SystemClock, Task, TaskId, TaskState};
use std::thread::{self, Scope};
use std::time::Duration;

/// Tunables for the Multi-Level Feedback Queue scheduler core.
///
/// Round Robin is the degenerate case `nlevels == 1, boost_period ==
/// None`: with one level, demotion's `level > 0` guard is always false, so
/// tasks simply cycle through the single queue, and there is no boost
/// coordinator thread to escalate anything.
#[derive(Debug, Clone)]
pub struct MlfqConfig {
    pub ncpus: usize,
    pub nlevels: usize,
    pub timeslice: Duration,
    /// `None` disables the priority-boost coordinator entirely (the
    /// Round-Robin variant).
    pub boost_period: Option<Duration>,
}

impl MlfqConfig {
    pub fn round_robin(ncpus: usize, timeslice: Duration) -> Self {
        Self {
            ncpus,
            nlevels: 1,
            timeslice,
            boost_period: None,
        }
    }
}

/// The scheduler core: owns the ready-queue bank, the worker pool, the
/// priority-boost coordinator, the shutdown flag set, and the timeslice.
///
/// `'t` is the lifetime of the `Task<P>` values the harness owns; workers
/// and the boost coordinator are spawned into a `std::thread::Scope` whose
/// lifetime is bounded by `'t`, so the borrow checker enforces that no
/// task reference escapes the scope the scheduler lives in.
pub struct Mlfq<'t, P: ProcessHandle + 'static> {
    bank: ReadyQueueBank<'t, P>,
    flags: Flags,
    ncpus: usize,
    timeslice: Duration,
    boost_period: Option<Duration>,
    clock: Box<dyn Clock>,
}

impl<'t, P: ProcessHandle + 'static> Mlfq<'t, P> {
    pub fn new(config: MlfqConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: MlfqConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            bank: ReadyQueueBank::new(config.nlevels),
            flags: Flags::new(),
            ncpus: std::cmp::max(1, config.ncpus),
            timeslice: config.timeslice,
            boost_period: config.boost_period,
            clock,
        }
    }

    /// Enqueue a freshly constructed task at level 0, the entry point for
    /// every newly arrived task.
    pub fn enqueue(&self, task: &'t mut Task<P>) {
        self.bank.enqueue(0, task);
    }

    /// Spawn the worker pool (and, if configured, the boost coordinator)
    /// into `scope`. Workers and the coordinator borrow only `&self`, so
    /// callers may keep enqueuing tasks on the calling thread after this
    /// returns.
    pub fn spawn<'scope>(&'scope self, scope: &'scope Scope<'scope, '_>)
    where
        't: 'scope,
    {
        for _ in 0..self.ncpus {
            scope.spawn(move || self.worker_loop());
        }
        if let Some(period) = self.boost_period {
            scope.spawn(move || self.boost_loop(period));
        }
    }

    /// Graceful shutdown: set STOP, broadcast every level. Workers keep
    /// dispatching until every level drains, then exit; the boost
    /// coordinator exits at its next wake.
    ///
    /// Idempotent: calling this after HALT (or after a previous STOP) is
    /// a no-op beyond re-broadcasting.
    pub fn shutdown_graceful(&self) {
        self.flags.set_stop();
        self.bank.broadcast_all();
    }

    /// Immediate shutdown: set HALT, broadcast every level. Workers exit
    /// at the next predicate check without completing
    /// the in-flight dispatch's re-enqueue path; the task they were
    /// running is abandoned to its `Task`'s `Drop` impl, which terminates
    /// the child.
    pub fn shutdown_immediate(&self) {
        self.flags.set_halt();
        self.bank.broadcast_all();
    }

    fn worker_loop(&self) {
        loop {
            match self.bank.dequeue_any(&self.flags) {
                Dequeued::Stop => return,
                Dequeued::Task(task, level) => {
                    if self.flags.boost() {
                        log::trace!("task {} caught by boost, re-enqueued at level 0", task.id());
                        self.bank.enqueue(0, task);
                        continue;
                    }
                    self.dispatch(task, level);
                }
            }
        }
    }

    /// One timeslice on one worker: spawn-or-resume, sleep, suspend, then
    /// demote-or-hold based on accrued CPU time.
    fn dispatch(&self, task: &'t mut Task<P>, level: usize) {
        let id = task.id();
        let prev_usage = task.usage();

        let was_runnable = task.state() == TaskState::Runnable;
        let now = self.clock.now();
        let result = if was_runnable {
            task.spawn(now)
        } else {
            assert_eq!(
                task.state(),
                TaskState::Stopped,
                "task {id}: dispatch precondition violated (state was {:?})",
                task.state()
            );
            task.resume(now)
        };
        expect_ok(id, result);

        thread::sleep(self.timeslice);

        let now = self.clock.now();
        expect_ok(id, task.suspend(now));

        match task.state() {
            TaskState::Finished => {
                log::info!("task {id} finished");
            }
            TaskState::Stopped => {
                if self.flags.halt() {
                    // HALT truncates the run: leave this task abandoned
                    // rather than completing the re-enqueue path. It is
                    // not re-observed by any worker and is cleaned up by
                    // `Task`'s own drop glue once the harness's task list
                    // is dropped.
                    log::info!("task {id} abandoned by immediate shutdown");
                    return;
                }
                let delta_ms = task.usage_delta(prev_usage);
                let next_level = demoted_level(level, delta_ms, self.timeslice.as_millis() as u64);
                log::trace!(
                    "task {id}: consumed {delta_ms}ms of {}ms slice, level {level} -> {next_level}",
                    self.timeslice.as_millis()
                );
                self.bank.enqueue(next_level, task);
            }
            other => unreachable!("task {id}: suspend() postcondition violated: {other:?}"),
        }
    }

    fn boost_loop(&self, period: Duration) {
        loop {
            if self.flags.halt() || self.flags.stop() {
                return;
            }
            self.bank.wait_for_boost_tick(&self.flags, period);
            if self.flags.halt() || self.flags.stop() {
                return;
            }
            self.flags.set_boost();
            for level in 1..self.bank.nlevels() {
                if self.bank.level_nonempty(level) {
                    self.bank.broadcast(level);
                }
            }
            self.flags.clear_boost();
        }
    }
}

fn expect_ok<T>(id: TaskId, result: Result<T, schedsim_core::TaskError>) -> T {
    result.unwrap_or_else(|e| panic!("task {id}: fatal scheduling error: {e}"))
}

/// The demotion rule: demote by exactly one level when the task consumed a
/// full timeslice of CPU time, clamped at level 0.
fn demoted_level(level: usize, delta_ms: u64, timeslice_ms: u64) -> usize {
    if delta_ms >= timeslice_ms && level > 0 {
        level - 1
    } else {
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn demotion_never_exceeds_one_level(level: usize, delta_ms: u64, timeslice_ms: u64) -> bool {
        let level = level % 16;
        let next = demoted_level(level, delta_ms, timeslice_ms);
        next <= level && level.saturating_sub(next) <= 1
    }

    #[quickcheck]
    fn demotion_only_happens_on_full_slice_consumption(level: usize, timeslice_ms: u64) -> bool {
        let level = level % 16;
        if timeslice_ms == 0 {
            return true;
        }
        demoted_level(level, timeslice_ms - 1, timeslice_ms) == level
    }

    #[test]
    fn demotion_clamps_at_level_zero() {
        assert_eq!(demoted_level(0, 1000, 10), 0);
    }

    #[test]
    fn round_robin_config_has_no_boost_coordinator() {
        let config = MlfqConfig::round_robin(2, Duration::from_millis(20));
        assert_eq!(config.nlevels, 1);
        assert!(config.boost_period.is_none());
    }
}

impl<'t, P: ProcessHandle + 'static> Drop for Mlfq<'t, P> {
    /// Destruction triggers graceful shutdown unless HALT was already
    /// set. The actual thread join happens implicitly:
    /// callers always construct a `Mlfq` inside a `std::thread::scope`
    /// closure, and `thread::scope` blocks until every spawned thread
    /// finishes before returning, so by the time this drop glue runs and
    /// the enclosing scope exits, every worker and the boost coordinator
    /// have already observed the broadcast and are on their way out.
    fn drop(&mut self) {
        if !self.flags.halt() {
            self.shutdown_graceful();
        }
    }
}
