//! Deadline-bounded execution of external alignment tools
//!
//! The tool runs in its own process group. stdin is fed and stdout/stderr are
//! drained on helper threads, and the deadline covers both the wait for exit
//! and the capture of output. On expiry the whole group is killed, so helper
//! processes a wrapper script leaves behind do not outlive the request.

use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use command_group::{CommandGroup, GroupChild};

use super::{AlignError, AlignResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured output of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Turn a non-zero exit into an error carrying the tool's diagnostics
    pub fn check_success(&self, program: &str) -> AlignResult<()> {
        if self.status.success() {
            return Ok(());
        }
        let stderr = self.stderr_text();
        Err(AlignError::ExitStatus {
            program: program.to_string(),
            code: self.status.code(),
            stderr: if stderr.is_empty() {
                format!("{} exited with code {:?}", program, self.status.code())
            } else {
                stderr
            },
        })
    }
}

/// Run `command` to completion, feeding `stdin_payload`, within `timeout`
pub fn run_with_deadline(
    command: &mut Command,
    stdin_payload: Option<&[u8]>,
    timeout: Duration,
) -> AlignResult<ProcessOutput> {
    let program = command.get_program().to_string_lossy().into_owned();
    let deadline = Instant::now() + timeout;

    command
        .stdin(if stdin_payload.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    log::debug!("Spawning {} (timeout {}s)", program, timeout.as_secs());
    let mut child = command.group_spawn().map_err(|source| AlignError::Spawn {
        program: program.clone(),
        source,
    })?;

    if let (Some(mut stdin), Some(payload)) = (child.inner().stdin.take(), stdin_payload) {
        let payload = payload.to_vec();
        // A write error means the child exited early; its exit status and
        // stderr describe why. The thread is not joined: a grandchild that
        // holds stdin open must not stall the caller.
        thread::spawn(move || {
            let _ = stdin.write_all(&payload);
        });
    }
    let stdout_rx = spawn_reader(child.inner().stdout.take());
    let stderr_rx = spawn_reader(child.inner().stderr.take());

    let outcome = wait_until(&mut child, deadline).and_then(|status| {
        let stdout = receive_before(&stdout_rx, deadline, "stdout")?;
        let stderr = receive_before(&stderr_rx, deadline, "stderr")?;
        Ok(ProcessOutput { status, stdout, stderr })
    });

    // Reap anything still running in the group, on success and failure alike
    terminate_group(&mut child);

    outcome.map_err(|e| match e {
        Expiry::Deadline => {
            log::warn!("{} exceeded {}s, terminated", program, timeout.as_secs());
            AlignError::Timeout {
                program,
                seconds: timeout.as_secs(),
            }
        }
        Expiry::Failed(err) => err,
    })
}

enum Expiry {
    Deadline,
    Failed(AlignError),
}

impl From<io::Error> for Expiry {
    fn from(err: io::Error) -> Self {
        Expiry::Failed(AlignError::Io(err))
    }
}

fn wait_until(child: &mut GroupChild, deadline: Instant) -> Result<ExitStatus, Expiry> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            return Err(Expiry::Deadline);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match source {
            Some(mut source) => source.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(result);
    });
    rx
}

fn receive_before(
    rx: &Receiver<io::Result<Vec<u8>>>,
    deadline: Instant,
    stream: &str,
) -> Result<Vec<u8>, Expiry> {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(result) => Ok(result?),
        Err(RecvTimeoutError::Timeout) => Err(Expiry::Deadline),
        Err(RecvTimeoutError::Disconnected) => Err(Expiry::Failed(AlignError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("{} reader exited without a result", stream),
        )))),
    }
}

fn terminate_group(child: &mut GroupChild) {
    // Both calls fail once every member is gone, which is the normal case
    let _ = child.kill();
    let _ = child.wait();
}
