// src/probe/process.rs
// Platform specific handling for script probes and everything they spawn.
use tokio::process::{Child, Command};

/// Place the child in its own process group so the whole tree can be
/// signalled at once.
#[cfg(unix)]
pub fn isolate(command: &mut Command) {
    command.process_group(0);
}

#[cfg(not(unix))]
pub fn isolate(_command: &mut Command) {}

/// Forcibly terminate a probe process and its descendants.
///
/// `pgid` must be the pid captured right after spawn: once the child has
/// been reaped `Child::id` returns `None`, but descendants still holding the
/// group id may be alive.
#[cfg(unix)]
pub fn terminate_tree(child: &mut Child, pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        // SAFETY: killpg has no memory-safety preconditions.
        let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                tracing::warn!(pgid, error = %err, "failed to kill probe process group");
            }
        }
    }
    let _ = child.start_kill();
}

// TODO: assign script probes to a job object so grandchildren die with the leader on Windows.
#[cfg(not(unix))]
pub fn terminate_tree(child: &mut Child, _pgid: Option<u32>) {
    let _ = child.start_kill();
}
