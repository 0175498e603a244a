//! Helpers for running external collaborator programs with a deadline.
use std::{
    io::Read,
    os::unix::process::CommandExt,
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use nix::{
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use tracing::{debug, warn};

use crate::{constants::CHILD_POLL_INTERVAL, error::CollaboratorError};

/// Wait for a child process with a timeout, returning `Ok(None)` on timeout.
pub fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(CHILD_POLL_INTERVAL);
            }
        }
    }
}

/// Runs `program` with `args`, returning its stdout when it exits successfully.
///
/// The program runs in its own process group. Once `timeout` elapses the whole
/// group is killed. Stdout is collected only until the same deadline, so a
/// background process that inherited the pipe cannot hold the caller.
pub fn run_program<S: AsRef<str>>(
    program: &str,
    args: &[S],
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<String, CollaboratorError> {
    let deadline = Instant::now() + timeout;

    let mut cmd = Command::new(program);
    for arg in args {
        cmd.arg(arg.as_ref());
    }
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .process_group(0);

    debug!("Running collaborator `{}`", program);

    let mut child = cmd.spawn().map_err(|source| CollaboratorError::Spawn {
        program: program.to_string(),
        source,
    })?;

    // Stream stdout in chunks so whatever arrived before the deadline is kept.
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    if let Some(mut stdout) = child.stdout.take() {
        thread::spawn(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match stdout.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(chunk[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    let status = match wait_with_timeout(&mut child, timeout)? {
        Some(status) => status,
        None => {
            warn!("`{}` timed out after {:?}; killing it", program, timeout);
            kill_group(&child);
            let _ = child.kill();
            let _ = child.wait();
            return Err(CollaboratorError::TimedOut {
                program: program.to_string(),
                timeout,
            });
        }
    };

    let output = collect_until(&rx, deadline, program);

    if status.success() {
        Ok(output)
    } else {
        Err(CollaboratorError::Failed {
            program: program.to_string(),
            status: status.code(),
        })
    }
}

/// Drains `rx` until the writer side closes or `deadline` passes.
fn collect_until(rx: &mpsc::Receiver<Vec<u8>>, deadline: Instant, program: &str) -> String {
    let mut buffer = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => buffer.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "`{}` left a background process holding its output; not waiting for it",
                    program
                );
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn kill_group(child: &Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(err) = killpg(pgid, Signal::SIGKILL) {
        debug!("Failed to kill process group {}: {}", pgid, err);
    }
}
