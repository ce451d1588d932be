//! Integration coverage for the lifecycle engine, each test spawning a
//! real `/bin/sh`/`bash`/`sleep`/`cat` process rather than a mock.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use shexec::{sh, CommandOptions, InputSource, OutputSink};

/// `echo hi` with stdout bound to a buffer exits 0 and captures exactly
/// `"hi\n"`.
#[tokio::test]
async fn echo_captures_stdout_to_buffer() {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let cmd = sh("echo")
        .bake_args(["hi"])
        .bake_opts(CommandOptions::new().stdout(OutputSink::Buffer(Arc::clone(&buf))))
        .start()
        .await
        .unwrap();

    let code = cmd.get_exit_code().await;
    assert_eq!(code, 0);
    assert_eq!(&*buf.lock().unwrap(), b"hi\n");
}

/// `bash -c "exit 22"` reports exit code 22 via `get_exit_code`.
#[tokio::test]
async fn explicit_exit_code_is_observed() {
    let cmd = sh("bash")
        .bake_args(["-c", "exit 22"])
        .start()
        .await
        .unwrap();
    assert_eq!(cmd.get_exit_code().await, 22);
}

/// A process killed by SIGKILL reports exit code 137 (128 + 9) and
/// reaches `Finished`, not `Panicked`.
#[tokio::test]
async fn sigkill_maps_to_128_plus_signal() {
    let cmd = sh("sleep").bake_args(["3"]).start().await.unwrap();
    let pid = cmd.pid();
    assert!(pid > 0);

    kill(Pid::from_raw(pid), Signal::SIGKILL).unwrap();

    assert_eq!(cmd.get_exit_code().await, 137);
    assert!(cmd.is_finished_gracefully());
}

/// A non-fatal signal that the child traps and survives must not be
/// mistaken for signal-termination; the child's own `exit 22` wins.
#[tokio::test]
async fn trapped_signal_does_not_override_explicit_exit() {
    let cmd = sh("bash")
        .bake_args(["-c", "trap 'true' INT; sleep 0.5; exit 22"])
        .start()
        .await
        .unwrap();
    let pid = cmd.pid();

    tokio::time::sleep(Duration::from_millis(200)).await;
    kill(Pid::from_raw(pid), Signal::SIGINT).unwrap();

    assert_eq!(cmd.get_exit_code().await, 22);
}

/// SIGSTOP/SIGCONT must not be mistaken for process termination by the
/// monitor's wait loop.
#[tokio::test]
async fn stop_and_continue_are_not_mistaken_for_exit() {
    let cmd = sh("bash")
        .bake_args(["-c", "sleep 1; exit 4"])
        .start()
        .await
        .unwrap();
    let pid = cmd.pid();

    kill(Pid::from_raw(pid), Signal::SIGSTOP).unwrap();
    let finished_early = cmd.wait_for(Duration::from_millis(1500)).await;
    assert!(!finished_early, "stopped process must not appear finished");

    kill(Pid::from_raw(pid), Signal::SIGCONT).unwrap();
    assert_eq!(cmd.get_exit_code().await, 4);
}

/// An ok-exit override lets `run()` accept a code that would otherwise
/// raise `UnexpectedExitCode`.
#[tokio::test]
async fn ok_exit_override_suppresses_unexpected_exit_code() {
    let ok = sh("bash")
        .bake_args(["-c", "exit 14"])
        .bake_opts(CommandOptions::new().ok_exit_codes([14]))
        .run()
        .await;
    assert!(ok.is_ok());

    let default_err = sh("bash").bake_args(["-c", "exit 14"]).run().await;
    match default_err {
        Err(shexec::Error::UnexpectedExitCode { name, code }) => {
            assert_eq!(name, "bash");
            assert_eq!(code, 14);
        }
        other => panic!("expected UnexpectedExitCode, got {other:?}"),
    }
}

/// Streaming input/output queues round-trip through `cat -`, preserving
/// order; closing the input queue ends the process with code 0.
#[tokio::test]
async fn streaming_queues_round_trip_through_cat() {
    let (in_tx, in_rx) = tokio::sync::mpsc::channel::<String>(4);
    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<String>(4);

    let cmd = sh("cat")
        .bake_args(["-"])
        .bake_opts(
            CommandOptions::new()
                .stdin(InputSource::TextQueue(in_rx))
                .stdout(OutputSink::TextQueue(out_tx)),
        )
        .start()
        .await
        .unwrap();

    in_tx.send("bees\n".to_string()).await.unwrap();
    in_tx.send("knees\n".to_string()).await.unwrap();
    drop(in_tx);

    let first = out_rx.recv().await.unwrap();
    let second = out_rx.recv().await.unwrap();
    assert_eq!(first, "bees\n");
    assert_eq!(second, "knees\n");

    assert_eq!(cmd.get_exit_code().await, 0);
}

/// Once terminal, repeated exit-code reads are stable and `get_exit_code`
/// returns without blocking.
#[tokio::test]
async fn invariant_terminal_exit_code_is_stable_and_non_blocking() {
    let cmd = sh("bash").bake_args(["-c", "exit 5"]).start().await.unwrap();
    cmd.wait().await;
    assert_eq!(cmd.get_exit_code().await, 5);
    assert_eq!(cmd.get_exit_code().await, 5);
}

/// Listeners registered before and after the terminal transition are
/// each invoked exactly once.
#[tokio::test]
async fn invariant_listeners_run_exactly_once_before_and_after_terminal() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let cmd = sh("bash").bake_args(["-c", "exit 0"]).start().await.unwrap();

    let before = Arc::new(AtomicUsize::new(0));
    let before_clone = Arc::clone(&before);
    cmd.add_exit_listener(move |_| {
        before_clone.fetch_add(1, Ordering::SeqCst);
    });

    cmd.wait().await;
    assert_eq!(before.load(Ordering::SeqCst), 1);

    let after = Arc::new(AtomicUsize::new(0));
    let after_clone = Arc::clone(&after);
    cmd.add_exit_listener(move |_| {
        after_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

/// Spawn failure (unknown executable) transitions straight to Panicked and
/// is surfaced to the `start()` caller.
#[tokio::test]
async fn start_failure_on_missing_executable_is_panicked() {
    let err = sh("this-executable-does-not-exist-anywhere")
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, shexec::Error::StartError { .. }));
}

/// `output()` captures stdout as text and leaves stderr inherited.
#[tokio::test]
async fn output_returns_stdout_as_text() {
    let text = sh("printf").bake_args(["%s", "hello"]).output().await.unwrap();
    assert_eq!(text, "hello");
}

/// `wait_for` on a command that finishes before the deadline reports
/// `true`; on one that does not, `false`.
#[tokio::test]
async fn wait_for_respects_the_deadline() {
    let quick = sh("true").start().await.unwrap();
    assert!(quick.wait_for(Duration::from_secs(2)).await);

    let slow = sh("sleep").bake_args(["2"]).start().await.unwrap();
    assert!(!slow.wait_for(Duration::from_millis(50)).await);
    // let it finish so the test process doesn't leave an orphaned sleep
    slow.wait().await;
}
