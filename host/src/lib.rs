//! The only production [`schedsim_core::ProcessHandle`]: real child
//! processes, controlled with POSIX job-control signals and reaped with
//! `wait4`, grounded directly in the scheduler's original `mlfq.cpp`
//! dispatch loop (fork, `SIGCONT`/`SIGSTOP`, `wait4(..., WUNTRACED, ...)`).
//!
//! Unix-only, mirroring the host-port split in the scheduler's own
//! ecosystem: there is no Windows job-control equivalent to `SIGSTOP`, so
//! this crate simply does not build there.

#![cfg(unix)]

use schedsim_core::{ProcessError, ProcessHandle, ProcessOutcome, ResourceUsage, TaskId, TaskKind};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command};

/// The leaf binaries a [`ChildProcess`] spawns, found as siblings of the
/// harness's own executable (`cpu_task`, `mem_task` — see
/// `schedsim_workloads`).
///
/// A plain binary's executable lives directly in `target/<profile>/`,
/// alongside the workload binaries built from the same workspace. A test
/// binary lives one level deeper, in `target/<profile>/deps/`; if the
/// immediate sibling isn't there, fall back to the parent directory to
/// cover that case too.
fn leaf_binary_path(kind: TaskKind) -> PathBuf {
    let name: OsString = match kind {
        TaskKind::Cpu => "cpu_task".into(),
        TaskKind::Mem => "mem_task".into(),
    };
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let sibling = exe_dir.join(&name);
    if sibling.is_file() {
        return sibling;
    }
    if let Some(parent) = exe_dir.parent() {
        let cousin = parent.join(&name);
        if cousin.is_file() {
            return cousin;
        }
    }
    sibling
}

/// A controlled child process plus the bookkeeping `ProcessHandle`'s
/// dispatch sequence needs between calls.
pub struct ChildProcess {
    task: TaskId,
    child: Child,
    pid: libc::pid_t,
    reaped: bool,
}

impl ProcessHandle for ChildProcess {
    fn spawn(task: TaskId, kind: TaskKind) -> Result<Self, ProcessError> {
        let path = leaf_binary_path(kind);
        let child = Command::new(&path)
            .spawn()
            .map_err(|source| ProcessError::Spawn { task, source })?;
        let pid = child.id() as libc::pid_t;
        log::debug!("task {task}: spawned {} as pid {pid}", path.display());
        Ok(ChildProcess {
            task,
            child,
            pid,
            reaped: false,
        })
    }

    fn resume(&mut self) -> Result<(), ProcessError> {
        send_signal(self.task, self.pid, libc::SIGCONT)
    }

    fn suspend(&mut self) -> Result<ProcessOutcome, ProcessError> {
        send_signal(self.task, self.pid, libc::SIGSTOP)?;
        let (status, usage) = wait4(self.task, self.pid, libc::WUNTRACED)?;
        self.interpret_stop_or_exit(status, usage)
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        unsafe {
            libc::kill(self.pid, libc::SIGKILL);
        }
        let _ = self.child.wait();
        self.reaped = true;
        log::debug!("task {}: terminated pid {}", self.task, self.pid);
    }

    fn run_to_completion(&mut self) -> Result<ResourceUsage, ProcessError> {
        let (status, usage) = wait4(self.task, self.pid, 0)?;
        self.reaped = true;
        if libc::WIFEXITED(status) {
            let code = libc::WEXITSTATUS(status);
            if code != 0 {
                return Err(ProcessError::NonZeroExit { task: self.task, code });
            }
            Ok(usage)
        } else {
            Err(ProcessError::UnexpectedStopSignal { task: self.task })
        }
    }
}

impl ChildProcess {
    fn interpret_stop_or_exit(
        &mut self,
        status: libc::c_int,
        usage: ResourceUsage,
    ) -> Result<ProcessOutcome, ProcessError> {
        if libc::WIFEXITED(status) {
            self.reaped = true;
            let code = libc::WEXITSTATUS(status);
            if code != 0 {
                return Err(ProcessError::NonZeroExit { task: self.task, code });
            }
            Ok(ProcessOutcome::Exited(usage))
        } else if libc::WIFSTOPPED(status) && libc::WSTOPSIG(status) == libc::SIGSTOP {
            Ok(ProcessOutcome::Stopped(usage))
        } else if libc::WIFSIGNALED(status) && libc::WTERMSIG(status) == libc::SIGSTOP {
            self.reaped = true;
            Err(ProcessError::KilledByStopSignal { task: self.task })
        } else {
            Err(ProcessError::UnexpectedStopSignal { task: self.task })
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if !self.reaped {
            self.terminate();
        }
    }
}

fn send_signal(task: TaskId, pid: libc::pid_t, sig: libc::c_int) -> Result<(), ProcessError> {
    let rc = unsafe { libc::kill(pid, sig) };
    if rc != 0 {
        return Err(ProcessError::Signal {
            task,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

fn wait4(
    task: TaskId,
    pid: libc::pid_t,
    options: libc::c_int,
) -> Result<(libc::c_int, ResourceUsage), ProcessError> {
    let mut status: libc::c_int = 0;
    let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::wait4(pid, &mut status, options, &mut rusage) };
    if rc < 0 {
        return Err(ProcessError::Wait {
            task,
            source: io::Error::last_os_error(),
        });
    }
    if rc == 0 {
        return Err(ProcessError::NoStatusChange { task });
    }
    Ok((status, rusage_to_resource_usage(&rusage)))
}

fn rusage_to_resource_usage(ru: &libc::rusage) -> ResourceUsage {
    let user_ms = ru.ru_utime.tv_sec as u64 * 1000 + ru.ru_utime.tv_usec as u64 / 1000;
    let system_ms = ru.ru_stime.tv_sec as u64 * 1000 + ru.ru_stime.tv_usec as u64 / 1000;
    ResourceUsage::from_user_system_ms(user_ms, system_ms)
}
