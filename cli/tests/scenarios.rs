//! End-to-end scheduler runs against real child processes, driven through
//! `schedsim_host::ChildProcess`. These are slow (each test spends real
//! wall-clock seconds sleeping through timeslices) and require the
//! `cpu_task`/`mem_task` leaf binaries to have been built alongside this
//! test binary in the same workspace target directory.

#![cfg(unix)]

use schedsim_core::{Task, TaskKind, TaskState};
use schedsim_host::ChildProcess;
use schedsim_kernel::{aggregate, Mlfq, MlfqConfig, Sjf};
use std::time::{Duration, Instant};
use typed_arena::Arena;

fn one_cpu_task(arena: &Arena<Task<ChildProcess>>) -> &mut Task<ChildProcess> {
    arena.alloc(Task::new(TaskKind::Cpu, Instant::now()))
}

/// Single CPU, single level, one CPU-bound task: it should reach FINISHED
/// with a response time bounded by one timeslice and near-zero waiting.
#[test]
fn single_cpu_round_robin_one_task_finishes_with_low_response() {
    let arena: Arena<Task<ChildProcess>> = Arena::new();
    let run_start = Instant::now();

    std::thread::scope(|scope| {
        let sched: Mlfq<ChildProcess> = Mlfq::new(MlfqConfig::round_robin(1, Duration::from_millis(20)));
        sched.spawn(scope);
        let task = one_cpu_task(&arena);
        sched.enqueue(task);
        std::thread::sleep(Duration::from_secs(3));
    });

    let wall_time = run_start.elapsed();
    let tasks = arena.into_vec();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].state(), TaskState::Finished);

    let response = tasks[0]
        .t_firstrun()
        .unwrap()
        .saturating_duration_since(tasks[0].t_start());
    assert!(response < Duration::from_millis(100), "response was {response:?}");

    let report = aggregate(&tasks, wall_time, 1);
    assert_eq!(report.num_finished, 1);
    assert!(report.avg_waiting_ms < 50.0, "waiting was {}", report.avg_waiting_ms);
}

/// Two CPU-bound tasks sharing a single CPU under a two-level MLFQ: both
/// consume a full slice on their first dispatch and should demote to
/// level 1, then split running time roughly evenly.
#[test]
fn two_tasks_single_cpu_mlfq_demote_and_share_fairly() {
    let arena: Arena<Task<ChildProcess>> = Arena::new();
    let run_start = Instant::now();

    std::thread::scope(|scope| {
        let sched: Mlfq<ChildProcess> = Mlfq::new(MlfqConfig {
            ncpus: 1,
            nlevels: 2,
            timeslice: Duration::from_millis(20),
            boost_period: Some(Duration::from_millis(250)),
        });
        sched.spawn(scope);
        let t1 = one_cpu_task(&arena);
        let t2 = one_cpu_task(&arena);
        sched.enqueue(t1);
        sched.enqueue(t2);
        std::thread::sleep(Duration::from_secs(4));
    });

    let wall_time = run_start.elapsed();
    let tasks = arena.into_vec();
    let report = aggregate(&tasks, wall_time, 1);
    assert!(report.num_finished >= 1);
}

/// A task that voluntarily exits partway through its first slice should
/// never be demoted: `delta_ms < timeslice_ms` at its only suspend.
#[test]
fn short_lived_task_completes_within_first_slice_without_demotion() {
    let arena: Arena<Task<ChildProcess>> = Arena::new();
    let run_start = Instant::now();

    std::thread::scope(|scope| {
        // mem_task finishes in well under a 5-second timeslice, so the
        // worker observes Finished on its first suspend, never reaching
        // the demotion branch at all.
        let sched: Mlfq<ChildProcess> = Mlfq::new(MlfqConfig {
            ncpus: 1,
            nlevels: 3,
            timeslice: Duration::from_secs(5),
            boost_period: None,
        });
        sched.spawn(scope);
        let task = arena.alloc(Task::new(TaskKind::Mem, Instant::now()));
        sched.enqueue(task);
        std::thread::sleep(Duration::from_secs(6));
    });

    let tasks = arena.into_vec();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].state(), TaskState::Finished);
    let _ = run_start.elapsed();
}

/// Graceful shutdown drains every enqueued task before the scheduler
/// core's worker threads exit.
#[test]
fn graceful_shutdown_drains_all_enqueued_tasks() {
    let arena: Arena<Task<ChildProcess>> = Arena::new();
    let run_start = Instant::now();

    std::thread::scope(|scope| {
        let sched: Mlfq<ChildProcess> = Mlfq::new(MlfqConfig::round_robin(2, Duration::from_millis(20)));
        sched.spawn(scope);
        for _ in 0..10 {
            let task = arena.alloc(Task::new(TaskKind::Mem, Instant::now()));
            sched.enqueue(task);
        }
        // `sched` drops here, calling shutdown_graceful(); thread::scope
        // then blocks until every worker has drained and exited.
    });

    let wall_time = run_start.elapsed();
    let tasks = arena.into_vec();
    assert_eq!(tasks.len(), 10);
    assert!(tasks.iter().all(|t| t.state() == TaskState::Finished));
    let report = aggregate(&tasks, wall_time, 2);
    assert_eq!(report.num_finished, 10);
}

/// Immediate shutdown truncates a long-running task: the worker exits
/// promptly and the task is left unfinished, its child terminated by
/// `Task`'s own drop glue.
#[test]
fn halt_truncates_in_flight_task() {
    let arena: Arena<Task<ChildProcess>> = Arena::new();

    std::thread::scope(|scope| {
        let sched: Mlfq<ChildProcess> = Mlfq::new(MlfqConfig::round_robin(1, Duration::from_millis(500)));
        sched.spawn(scope);
        let task = one_cpu_task(&arena);
        sched.enqueue(task);
        std::thread::sleep(Duration::from_millis(250));
        sched.shutdown_immediate();
    });

    let tasks = arena.into_vec();
    assert_eq!(tasks.len(), 1);
    assert_ne!(tasks[0].state(), TaskState::Finished);
    assert!(tasks[0].t_completion().is_none());
}

/// SJF dispatches the shorter-estimated task before the longer one even
/// though both are enqueued before any worker picks either up.
#[test]
fn sjf_runs_shorter_estimate_first() {
    let arena: Arena<Task<ChildProcess>> = Arena::new();

    std::thread::scope(|scope| {
        let sched: Sjf<ChildProcess> = Sjf::new(1);
        sched.spawn(scope);
        let long = arena.alloc(Task::new(TaskKind::Cpu, Instant::now()));
        let short = arena.alloc(Task::new(TaskKind::Mem, Instant::now()));
        sched.enqueue(long, Duration::from_secs(10));
        sched.enqueue(short, Duration::from_millis(1));
        std::thread::sleep(Duration::from_secs(2));
    });

    let tasks = arena.into_vec();
    assert_eq!(tasks.len(), 2);
    // Both get dispatched eventually on a single worker with sequential
    // enqueue order broken by estimate; the mem task (shorter estimate)
    // should finish, while the still-running cpu task may or may not have
    // finished depending on host speed, so only assert the one strong
    // guarantee: the mem task was dispatched first.
    let mem_task = tasks.iter().find(|t| t.kind() == TaskKind::Mem).unwrap();
    let cpu_task = tasks.iter().find(|t| t.kind() == TaskKind::Cpu).unwrap();
    assert!(mem_task.t_firstrun().unwrap() <= cpu_task.t_firstrun().unwrap());
}
