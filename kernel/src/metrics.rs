use schedsim_core::{ProcessHandle, Task, TaskKind, TaskState};
use std::fmt;
use std::time::Duration;

/// The metrics aggregator's output: fairness and throughput statistics,
/// plus the raw counts and total uptime a per-kind breakdown needs
/// alongside them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Report {
    pub wall_time: Duration,
    pub num_tasks: usize,
    pub num_finished: usize,
    pub num_cpu_tasks: usize,
    pub num_mem_tasks: usize,

    pub avg_turnaround_ms: f64,
    pub avg_response_ms: f64,
    pub avg_waiting_ms: f64,
    pub avg_running_ms: f64,
    pub cpu_utilization_pct: f64,
    pub throughput_per_sec: f64,

    pub avg_running_all_ms: f64,
    pub avg_running_cpu_ms: f64,
    pub avg_running_mem_ms: f64,
}

/// Walks the harness's task list and the simulation's start-of-run
/// wall-clock budget to produce aggregate fairness and throughput metrics.
///
/// Tasks that never left `RUNNABLE` (never dispatched at all, e.g. because
/// an immediate shutdown truncated the run before a worker reached them)
/// are excluded from every mean that presumes a first run.
pub fn aggregate<P: ProcessHandle>(tasks: &[Task<P>], wall_time: Duration, cpu_count: usize) -> Report {
    let mut report = Report {
        wall_time,
        num_tasks: tasks.len(),
        ..Default::default()
    };

    let ran: Vec<&Task<P>> = tasks
        .iter()
        .filter(|t| t.t_firstrun().is_some())
        .collect();
    let finished: Vec<&Task<P>> = tasks
        .iter()
        .filter(|t| t.state() == TaskState::Finished)
        .collect();

    report.num_finished = finished.len();
    report.num_cpu_tasks = tasks.iter().filter(|t| t.kind() == TaskKind::Cpu).count();
    report.num_mem_tasks = tasks.iter().filter(|t| t.kind() == TaskKind::Mem).count();

    if !finished.is_empty() {
        let n = finished.len() as f64;
        let mut turnaround_sum = 0.0;
        let mut running_sum = 0.0;
        let mut cpu_time_sum = 0.0;

        let mut cpu_running_sum = 0.0;
        let mut mem_running_sum = 0.0;

        for t in &finished {
            let turnaround = t
                .t_completion()
                .unwrap()
                .saturating_duration_since(t.t_start());
            let response = t
                .t_firstrun()
                .unwrap()
                .saturating_duration_since(t.t_start());
            let waiting = t.t_waiting();
            let running = turnaround
                .saturating_sub(waiting)
                .saturating_sub(response);

            turnaround_sum += turnaround.as_secs_f64() * 1000.0;
            running_sum += running.as_secs_f64() * 1000.0;
            cpu_time_sum += t.usage().total_ms() as f64;

            match t.kind() {
                TaskKind::Cpu => cpu_running_sum += running.as_secs_f64() * 1000.0,
                TaskKind::Mem => mem_running_sum += running.as_secs_f64() * 1000.0,
            }
        }

        report.avg_turnaround_ms = turnaround_sum / n;
        report.avg_running_ms = running_sum / n;
        report.avg_running_all_ms = running_sum / n;
        if report.num_cpu_tasks > 0 {
            report.avg_running_cpu_ms = cpu_running_sum / report.num_cpu_tasks as f64;
        }
        if report.num_mem_tasks > 0 {
            report.avg_running_mem_ms = mem_running_sum / report.num_mem_tasks as f64;
        }

        let wall_ms = wall_time.as_secs_f64() * 1000.0;
        if wall_ms > 0.0 && cpu_count > 0 {
            report.cpu_utilization_pct = 100.0 * cpu_time_sum / (wall_ms * cpu_count as f64);
        }
    }

    if !ran.is_empty() {
        let n = ran.len() as f64;
        let mut response_sum = 0.0;
        let mut waiting_sum = 0.0;
        for t in &ran {
            let response = t
                .t_firstrun()
                .unwrap()
                .saturating_duration_since(t.t_start());
            response_sum += response.as_secs_f64() * 1000.0;
            waiting_sum += t.t_waiting().as_secs_f64() * 1000.0;
        }
        report.avg_response_ms = response_sum / n;
        report.avg_waiting_ms = waiting_sum / n;
    }

    let wall_secs = wall_time.as_secs_f64();
    if wall_secs > 0.0 {
        report.throughput_per_sec = report.num_finished as f64 / wall_secs;
    }

    report
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Scheduler Uptime:\t\t\t{:.3}s", self.wall_time.as_secs_f64())?;
        writeln!(f, "Total Tasks:\t\t\t\t{}", self.num_tasks)?;
        writeln!(f, "Total Finished Tasks:\t\t\t{}", self.num_finished)?;
        writeln!(f, "Total CPU Bound Tasks:\t\t\t{}", self.num_cpu_tasks)?;
        writeln!(f, "Total Memory Bound Tasks:\t\t{}", self.num_mem_tasks)?;
        writeln!(f, "Average Turnaround Time:\t\t{:.3}ms", self.avg_turnaround_ms)?;
        writeln!(f, "Average Response Time:\t\t\t{:.3}ms", self.avg_response_ms)?;
        writeln!(f, "Average Waiting Time:\t\t\t{:.3}ms", self.avg_waiting_ms)?;
        writeln!(f, "Average Running Time:\t\t\t{:.3}ms", self.avg_running_ms)?;
        writeln!(f, "CPU Utilization:\t\t\t{:.2}%", self.cpu_utilization_pct)?;
        writeln!(f, "Throughput:\t\t\t\t{:.3} tasks/sec", self.throughput_per_sec)?;
        writeln!(f, "Average Runtime (All Tasks):\t\t{:.3}ms", self.avg_running_all_ms)?;
        writeln!(f, "Average Runtime (CPU Bound Tasks):\t{:.3}ms", self.avg_running_cpu_ms)?;
        write!(f, "Average Runtime (Memory Bound Tasks):\t{:.3}ms", self.avg_running_mem_ms)
    }
}
