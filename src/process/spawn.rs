//! Builds the OS command from a template, spawns it, and wires up I/O
//! bridging and the monitor task.

use std::io::{Read, Write};
use std::process::{Command as StdCommand, Stdio};

use nix::unistd::Pid;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::process::handle::RunningCommand;
use crate::process::monitor;
use crate::template::CommandTemplate;

/// Spawns the process described by `template` and returns its lifecycle
/// handle, already transitioned to Running with a monitor task detached.
///
/// Uses `std::process::Command` rather than `tokio::process::Command`: the
/// monitor task needs raw, repeated `waitpid` control over every wait
/// status (including stop/continue), which tokio's own child reaper does
/// not expose. The blocking stdio pipes this yields are bridged to the
/// resolved async I/O adapters via `spawn_blocking`, the standard
/// reader/writer-task split for feeding a blocking pipe into async
/// channels.
pub(crate) async fn spawn(template: &CommandTemplate) -> Result<RunningCommand> {
    let stdin_source = template.take_stdin();
    let stdout_sink = template.take_stdout();
    let stderr_sink = template.take_stderr();

    let mut os_cmd = StdCommand::new(&template.name);
    os_cmd.args(&template.args);
    if let Some(map) = template.env.as_explicit() {
        os_cmd.env_clear();
        os_cmd.envs(map);
    }
    if let Some(cwd) = &template.cwd {
        os_cmd.current_dir(cwd);
    }

    // Unset stdin defaults to the null device; unset stdout/stderr inherit
    // from the host process.
    os_cmd.stdin(if stdin_source.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    os_cmd.stdout(if stdout_sink.is_some() {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });
    os_cmd.stderr(if stderr_sink.is_some() {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });

    let mut child = os_cmd.spawn().map_err(|cause| {
        tracing::warn!(name = %template.name, %cause, "failed to start command");
        Error::StartError { cause }
    })?;

    let pid = child.id() as i32;
    tracing::debug!(name = %template.name, pid, "command started");

    let mut bridges: Vec<JoinHandle<()>> = Vec::new();

    if let Some(source) = stdin_source {
        if let Some(stdin_pipe) = child.stdin.take() {
            let (reader, writer) = bridge_input(source.into_reader(), stdin_pipe);
            bridges.push(reader);
            bridges.push(writer);
        }
    }
    if let Some(sink) = stdout_sink {
        if let Some(stdout_pipe) = child.stdout.take() {
            let (reader, writer) = bridge_output(stdout_pipe, sink.into_writer());
            bridges.push(reader);
            bridges.push(writer);
        }
    }
    if let Some(sink) = stderr_sink {
        if let Some(stderr_pipe) = child.stderr.take() {
            let (reader, writer) = bridge_output(stderr_pipe, sink.into_writer());
            bridges.push(reader);
            bridges.push(writer);
        }
    }

    // Exclusive reaping now passes to the monitor task's own `waitpid`
    // loop; dropping `child` here does not reap it, since `Child::drop`
    // performs no implicit wait.
    drop(child);

    let handle = RunningCommand::new(template.name.clone());
    handle.mark_running(pid, Box::new(bridges));

    let monitor_cmd = handle.clone();
    tokio::spawn(monitor::run(monitor_cmd, Pid::from_raw(pid)));

    Ok(handle)
}

/// Pumps bytes from an async reader into a child's (blocking) stdin pipe.
/// Closing the pipe once the source reports end-of-stream lets the child
/// observe EOF on its own reads (e.g. `cat -` exiting once its stdin closes).
fn bridge_input(
    mut reader: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
    pipe: impl Write + Send + 'static,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<u8>>(16);

    let reader_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(cause) => {
                    tracing::trace!(%cause, "stdin source read failed");
                    break;
                }
            }
        }
    });

    let writer_task = tokio::task::spawn_blocking(move || {
        let mut pipe = pipe;
        while let Some(chunk) = rx.blocking_recv() {
            if pipe.write_all(&chunk).is_err() {
                break;
            }
        }
        // `pipe` drops here, closing the child's stdin.
    });

    (reader_task, writer_task)
}

/// Pumps bytes from a child's (blocking) stdout/stderr pipe into a resolved
/// async output sink.
fn bridge_output(
    pipe: impl Read + Send + 'static,
    mut sink: Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<u8>>(16);

    let reader_task = tokio::task::spawn_blocking(move || {
        let mut pipe = pipe;
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(cause) if cause.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });

    let writer_task = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if sink.write_all(&chunk).await.is_err() {
                break;
            }
        }
        let _ = sink.flush().await;
    });

    (reader_task, writer_task)
}
