use crate::flags::Flags;
use schedsim_core::{ProcessHandle, Task};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// What a worker's pickup loop found.
pub enum Dequeued<'t, P: ProcessHandle> {
    /// A task pulled from `.1`, the highest-priority nonempty level found.
    Task(&'t mut Task<P>, usize),
    /// HALT is set, or STOP is set and every level is empty: the worker
    /// should exit.
    Stop,
}

/// N first-in-first-out queues of borrowed tasks, one per priority level,
/// all guarded by a single mutex and condition variable.
///
/// A per-level mutex/condvar pair was the first design tried, but it
/// doesn't compose with strict-priority scanning: a worker parked waiting
/// on an empty level 0 never wakes when a task lands on level 2, because
/// `enqueue` only notifies the level it pushed to. Sharing one condvar
/// across all levels means any enqueue (or flag change) wakes every idle
/// worker, which then re-scans from level 0 — the scan itself is what
/// enforces priority order, not which condvar happened to fire.
///
/// Tasks are held by `&'t mut Task<P>` rather than by an owned or
/// reference-counted handle: the harness is the sole owner of every
/// `Task<P>` for the run, and the bank's
/// lifetime `'t` is bounded by the `std::thread::scope` the harness drives
/// workers from, so the borrow checker enforces "appears on at most one
/// level at any instant, absent from all queues while a worker dispatches
/// it" for free — a task reference is moved out of its queue to dispatch
/// it and moved back in (possibly to a different level) to hand it off
/// again. No unsafe code and no weak references are needed because there
/// is no cycle: the queue->task edge is the only edge.
pub struct ReadyQueueBank<'t, P: ProcessHandle> {
    levels: Mutex<Vec<VecDeque<&'t mut Task<P>>>>,
    cond: Condvar,
    nlevels: usize,
}

impl<'t, P: ProcessHandle> ReadyQueueBank<'t, P> {
    pub fn new(nlevels: usize) -> Self {
        assert!(nlevels >= 1, "a ready-queue bank needs at least one level");
        Self {
            levels: Mutex::new((0..nlevels).map(|_| VecDeque::new()).collect()),
            cond: Condvar::new(),
            nlevels,
        }
    }

    pub fn nlevels(&self) -> usize {
        self.nlevels
    }

    /// Append `task` to the back of `level`'s queue and wake every waiter,
    /// since any idle worker might be the one whose priority scan should
    /// now stop at this level.
    pub fn enqueue(&self, level: usize, task: &'t mut Task<P>) {
        {
            let mut levels = self.levels.lock().unwrap();
            levels[level].push_back(task);
        }
        self.cond.notify_all();
    }

    /// Wake every waiter unconditionally. `level` is accepted for call-site
    /// clarity (the boost coordinator broadcasts one level at a time) even
    /// though the underlying condvar is shared.
    pub fn broadcast(&self, _level: usize) {
        self.cond.notify_all();
    }

    pub fn broadcast_all(&self) {
        self.cond.notify_all();
    }

    /// True if `level`'s queue currently holds at least one task. Used by
    /// the boost coordinator to decide which levels are worth waking.
    pub fn level_nonempty(&self, level: usize) -> bool {
        !self.levels.lock().unwrap()[level].is_empty()
    }

    /// Block the boost coordinator for up to `period`, waking early if
    /// `flags` picks up STOP or HALT, or any enqueue/broadcast fires,
    /// mid-wait.
    pub fn wait_for_boost_tick(&self, flags: &Flags, period: Duration) {
        let guard = self.levels.lock().unwrap();
        let _ = self
            .cond
            .wait_timeout_while(guard, period, |_| !flags.any_shutdown());
    }

    /// A worker's pickup loop: scan levels 0..N-1 in strict priority
    /// order; block until `flags` says to stop or some level is nonempty,
    /// then take the front task of the first nonempty level found.
    /// Terminates with `Stop` if HALT is set, or if STOP is set and every
    /// level is empty.
    pub fn dequeue_any(&self, flags: &Flags) -> Dequeued<'t, P> {
        let mut levels = self.levels.lock().unwrap();
        loop {
            levels = self
                .cond
                .wait_while(levels, |levels| {
                    let any_ready = levels.iter().any(|q| !q.is_empty());
                    !(flags.halt() || flags.boost() || any_ready || flags.stop())
                })
                .unwrap();

            if flags.halt() {
                return Dequeued::Stop;
            }

            for (i, q) in levels.iter_mut().enumerate() {
                if let Some(task) = q.pop_front() {
                    return Dequeued::Task(task, i);
                }
            }

            // Every level was empty by the time we held the lock. If STOP
            // is set, nothing more will ever arrive: exit. Otherwise this
            // wakeup was BOOST (or a task another worker already claimed)
            // with nothing left for us here; loop back and wait again
            // rather than assuming STOP caused the wakeup.
            if flags.stop() {
                return Dequeued::Stop;
            }
        }
    }
}
