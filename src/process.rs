//! Spawns rule scripts and reaps finished children.
//!
//! Scripts run under `/bin/sh -e` so the shell stops at the first failing
//! command.  The concrete targets become the script's positional parameters.
//! Children are reaped with `waitpid(-1, WNOHANG)` from the event loop rather
//! than per-child waits, so only the pid is kept.

use crate::parse::Rule;
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub(crate) fn check_posix(func: &str, ret: libc::c_int) -> anyhow::Result<()> {
    if ret < 0 {
        anyhow::bail!("{}: {}", func, std::io::Error::last_os_error());
    }
    Ok(())
}

/// Spawn the script of `rule` for job `job_id`, returning the child pid.
/// The child inherits the parent's stdout/stderr and finds the request
/// socket and its own job id in the environment.
pub fn spawn_script(job_id: i32, rule: &Rule, socket_path: &Path) -> std::io::Result<i32> {
    debug!("starting script for job {}", job_id);
    let child = Command::new("/bin/sh")
        .arg("-e")
        .arg("-c")
        .arg(&rule.script)
        .arg("remake-shell")
        .args(&rule.targets)
        .env("REMAKE_JOB_ID", job_id.to_string())
        .env("REMAKE_SOCKET", socket_path)
        .spawn()?;
    Ok(child.id() as i32)
}

/// Reap every child that has exited, returning `(pid, success)` pairs.
/// Success is a normal exit with status 0.
pub fn reap() -> Vec<(i32, bool)> {
    let mut reaped = Vec::new();
    loop {
        let mut status: libc::c_int = 0;
        // Safety: waitpid with WNOHANG only inspects our own children.
        let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
        if pid <= 0 {
            break;
        }
        let success = libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0;
        debug!("reaped pid {} success={}", pid, success);
        reaped.push((pid, success));
    }
    reaped
}
