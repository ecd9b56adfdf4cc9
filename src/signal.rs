//! Unix signal handling (SIGCHLD).
//!
//! SIGCHLD is blocked everywhere except inside the server's `pselect`, so the
//! handler can only interrupt the event wait.  The handler sets a flag; the
//! event loop reaps children between wakeups with the signal blocked again.

use std::sync::atomic::{AtomicBool, Ordering};

static GOT_SIGCHLD: AtomicBool = AtomicBool::new(false);

extern "C" fn sigchld_handler(_sig: libc::c_int) {
    GOT_SIGCHLD.store(true, Ordering::Relaxed);
}

/// Install the SIGCHLD handler and block the signal for normal execution.
pub fn install_sigchld() -> anyhow::Result<()> {
    // Safety: registering a signal handler and adjusting the mask is libc
    // unsafe code.
    unsafe {
        let mut mask: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut mask);
        libc::sigaddset(&mut mask, libc::SIGCHLD);
        crate::process::check_posix(
            "sigprocmask",
            libc::sigprocmask(libc::SIG_BLOCK, &mask, std::ptr::null_mut()),
        )?;
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigchld_handler as libc::sighandler_t;
        libc::sigemptyset(&mut sa.sa_mask);
        crate::process::check_posix(
            "sigaction",
            libc::sigaction(libc::SIGCHLD, &sa, std::ptr::null_mut()),
        )?;
    }
    Ok(())
}

/// Consume the SIGCHLD flag, returning whether it was set.
pub fn take_sigchld() -> bool {
    GOT_SIGCHLD.swap(false, Ordering::Relaxed)
}
