//! Process-group termination with signal escalation.
//!
//! Commands are spawned as process-group leaders, so one signal reaches
//! every descendant that stayed in the group. SIGTERM goes first; anything
//! still alive after the grace period gets SIGKILL.

use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, warn};

/// PIDs that must never be signalled.
const PROTECTED_PIDS: [u32; 2] = [0, 1];

/// Terminate `child` and its process group, then reap it.
pub async fn terminate(child: &mut Child, grace: Duration) {
    let Some(pid) = child.id() else {
        // Already reaped.
        return;
    };
    if PROTECTED_PIDS.contains(&pid) {
        warn!(pid, "refusing to signal protected pid");
        return;
    }

    signal_group(pid, GroupSignal::Term);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => {
            debug!(pid, "child exited after SIGTERM");
            // Stragglers in the group still get the hard stop.
            signal_group(pid, GroupSignal::Kill);
        }
        Err(_) => {
            debug!(pid, "child ignored SIGTERM, escalating");
            signal_group(pid, GroupSignal::Kill);
            if let Err(e) = child.kill().await {
                debug!(pid, error = %e, "kill after group SIGKILL");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, sig: GroupSignal) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    let signal = match sig {
        GroupSignal::Term => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, ?signal, error = %e, "failed to signal process group"),
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _sig: GroupSignal) {
    // No process groups here; `terminate` falls back to `Child::kill`.
}
