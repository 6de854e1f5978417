use crate::args::{Config, SchedulerKind};
use rand::Rng;
use schedsim_core::{Task, TaskKind};
use schedsim_host::ChildProcess;
use schedsim_kernel::{aggregate, Mlfq, MlfqConfig, Report, Sjf};
use std::time::{Duration, Instant};
use typed_arena::Arena;

const MIN_INTERARRIVAL: Duration = Duration::from_millis(50);
const MAX_INTERARRIVAL: Duration = Duration::from_millis(400);

/// The harness: constructs the chosen scheduler core, repeatedly
/// constructs tasks and enqueues them at level 0 while waiting random
/// intervals, triggers shutdown once the runtime budget elapses, and
/// returns the aggregated report.
pub fn run(config: Config) -> Report {
    match config.scheduler {
        SchedulerKind::RoundRobin => {
            run_mlfq_family(&config, MlfqConfig::round_robin(config.ncpus, config.timeslice))
        }
        SchedulerKind::Mlfq => run_mlfq_family(
            &config,
            MlfqConfig {
                ncpus: config.ncpus,
                nlevels: config.nlevels,
                timeslice: config.timeslice,
                boost_period: Some(config.boost_period),
            },
        ),
        SchedulerKind::Sjf => run_sjf(&config),
    }
}

fn random_kind(rng: &mut impl Rng) -> TaskKind {
    if rng.gen_bool(0.5) {
        TaskKind::Cpu
    } else {
        TaskKind::Mem
    }
}

/// Sleep the smaller of a randomly sampled inter-arrival delay and
/// whatever is left of the runtime budget, so the loop below never
/// overshoots `config.runtime` by a full delay.
fn interarrival_sleep(rng: &mut impl Rng, remaining: Duration) {
    let delay = rng.gen_range(MIN_INTERARRIVAL..MAX_INTERARRIVAL).min(remaining);
    std::thread::sleep(delay);
}

/// Shared arrival loop for Round-Robin and MLFQ: both take an `Mlfq` core,
/// differing only in its configuration.
fn run_mlfq_family(config: &Config, mlfq_config: MlfqConfig) -> Report {
    let arena: Arena<Task<ChildProcess>> = Arena::new();
    let mut rng = rand::thread_rng();
    let run_start = Instant::now();

    std::thread::scope(|scope| {
        let sched: Mlfq<ChildProcess> = Mlfq::new(mlfq_config);
        sched.spawn(scope);

        loop {
            let remaining = config.runtime.saturating_sub(run_start.elapsed());
            if remaining.is_zero() {
                break;
            }
            let kind = random_kind(&mut rng);
            let task = arena.alloc(Task::new(kind, Instant::now()));
            log::info!("task {} ({}) arrived", task.id(), task.kind());
            sched.enqueue(task);
            interarrival_sleep(&mut rng, remaining);
        }
        // `sched` is dropped here, at the end of the scope's closure body,
        // which triggers graceful shutdown (see `Mlfq`'s `Drop` impl).
    });

    let wall_time = run_start.elapsed();
    let tasks = arena.into_vec();
    aggregate(&tasks, wall_time, config.ncpus)
}

fn run_sjf(config: &Config) -> Report {
    let arena: Arena<Task<ChildProcess>> = Arena::new();
    let mut rng = rand::thread_rng();
    let run_start = Instant::now();

    std::thread::scope(|scope| {
        let sched: Sjf<ChildProcess> = Sjf::new(config.ncpus);
        sched.spawn(scope);

        loop {
            let remaining = config.runtime.saturating_sub(run_start.elapsed());
            if remaining.is_zero() {
                break;
            }
            let kind = random_kind(&mut rng);
            let task = arena.alloc(Task::new(kind, Instant::now()));
            let estimate = estimate_runtime(&mut rng, kind);
            log::info!(
                "task {} ({}) arrived, estimate={}ms",
                task.id(),
                task.kind(),
                estimate.as_millis()
            );
            sched.enqueue(task, estimate);
            interarrival_sleep(&mut rng, remaining);
        }
    });

    let wall_time = run_start.elapsed();
    let tasks = arena.into_vec();
    aggregate(&tasks, wall_time, config.ncpus)
}

/// SJF orders tasks by a declared total runtime that `schedsim_core`'s
/// frozen data model deliberately does not carry on `Task` itself (see
/// DESIGN.md, "SJF's declared runtime"). The harness is the stand-in for
/// whatever would supply that estimate in a real workload descriptor; here
/// it is sampled per kind, which is enough to exercise shortest-first
/// ordering deterministically by kind mix without inventing a workload
/// description language out of scope for this simulator.
fn estimate_runtime(rng: &mut impl Rng, kind: TaskKind) -> Duration {
    match kind {
        TaskKind::Cpu => Duration::from_millis(rng.gen_range(200..800)),
        TaskKind::Mem => Duration::from_millis(rng.gen_range(50..300)),
    }
}
