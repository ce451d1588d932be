//! The monitor task: loops on a low-level wait primitive until a terminal
//! status is observed.
//!
//! A platform wait call can return for stop/continue/ptrace-stop events,
//! not just true termination, and must be retried until one of those
//! terminal outcomes appears. `nix::sys::wait::waitpid` with `WUNTRACED |
//! WCONTINUED` implements that loop; `tokio::process::Child::wait` is
//! deliberately not used here because tokio's own reaper already filters
//! those non-terminal statuses out, which would make this loop pointless.

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::Error;
use crate::process::handle::RunningCommand;

/// Outcome of a single blocking wait attempt.
enum WaitOutcome {
    /// A terminal status was observed; the loop should stop.
    Terminal { exit_code: i32 },
    /// A non-terminal status (stop/continue/ptrace) was observed; retry.
    Retry,
    /// The wait call itself failed in a way we cannot classify.
    Error(Error),
}

fn wait_once(pid: Pid) -> WaitOutcome {
    let flags = WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    match waitpid(pid, Some(flags)) {
        Ok(WaitStatus::Exited(_, code)) => WaitOutcome::Terminal { exit_code: code },
        Ok(WaitStatus::Signaled(_, signal, _)) => WaitOutcome::Terminal {
            // Bash's 128+signal convention for signal-terminated processes.
            exit_code: 128 + signal as i32,
        },
        Ok(WaitStatus::Stopped(_, signal)) => {
            tracing::trace!(?signal, "process stopped; not a terminal exit");
            WaitOutcome::Retry
        }
        Ok(WaitStatus::Continued(_)) => {
            tracing::trace!("process continued; not a terminal exit");
            WaitOutcome::Retry
        }
        Ok(other) => {
            tracing::trace!(?other, "non-terminal wait status; retrying");
            WaitOutcome::Retry
        }
        Err(cause) => WaitOutcome::Error(Error::MonitorError {
            cause: anyhow::Error::new(cause)
                .context("waitpid returned an unclassifiable error"),
        }),
    }
}

/// Runs the wait loop for `pid` to completion, on a blocking thread (the
/// underlying syscall is blocking), then commits the outcome onto `cmd`.
///
/// This is the command handle's single dedicated monitor task; `cmd` is
/// held alive by this task for as long as the process runs, so the handle
/// retains ownership of its I/O adapters until the process finishes (the
/// I/O-bridging task handles themselves are held by the spawn guard
/// installed in `mark_running`, not here).
pub(crate) async fn run(cmd: RunningCommand, pid: Pid) {
    let outcome = tokio::task::spawn_blocking(move || loop {
        match wait_once(pid) {
            WaitOutcome::Terminal { exit_code } => break Ok(exit_code),
            WaitOutcome::Retry => continue,
            WaitOutcome::Error(err) => break Err(err),
        }
    })
    .await;

    match outcome {
        Ok(Ok(exit_code)) => {
            // A final cleanup wait to let the platform release any
            // descriptor bookkeeping tied to the first full wait. On Linux
            // the child is already reaped by the loop above, so this call
            // is expected to report "no such child" and is discarded.
            let _ = waitpid(pid, Some(WaitPidFlag::WNOHANG));
            cmd.mark_finished(exit_code);
        }
        Ok(Err(err)) => cmd.mark_monitor_failed(err),
        Err(join_err) => cmd.mark_monitor_failed(Error::MonitorError {
            cause: anyhow::Error::new(join_err).context("monitor task panicked"),
        }),
    }
}
