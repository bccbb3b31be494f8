// src/exec/process.rs

//! Single unit process runner.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long to keep draining pipes after the child is gone. Grandchildren
/// that inherited stdout/stderr can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Everything needed to start one run of a unit.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub unit_id: String,
    pub run_id: u64,
    /// Interpreter program, looked up on `PATH`.
    pub interpreter: String,
    pub source_path: PathBuf,
}

/// How the process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited on its own; `-1` when terminated by a signal.
    Exited(i32),
    /// Killed because the run was cancelled.
    Killed,
    /// Never started.
    SpawnFailed(String),
}

/// Captured output plus outcome.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub outcome: ProcessOutcome,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.outcome == ProcessOutcome::Exited(0)
    }
}

/// Run `<interpreter> <source_path>` to completion or cancellation.
///
/// stdout and stderr are captured into separate buffers. If `cancel_rx`
/// fires, the child (and its process group on unix) is killed and whatever
/// was captured up to that point is still returned.
pub async fn run_process(
    req: &ProcessRequest,
    mut cancel_rx: oneshot::Receiver<()>,
) -> ProcessOutput {
    info!(
        unit = %req.unit_id,
        run_id = req.run_id,
        interpreter = %req.interpreter,
        source = ?req.source_path,
        "starting unit process"
    );

    let mut cmd = Command::new(&req.interpreter);
    cmd.arg(&req.source_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = req.source_path.parent() {
        cmd.current_dir(dir);
    }

    // Own process group, so a stop also reaches anything the script forks.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(unit = %req.unit_id, run_id = req.run_id, error = %e, "failed to spawn unit process");
            return ProcessOutput {
                stdout: String::new(),
                stderr: String::new(),
                outcome: ProcessOutcome::SpawnFailed(format!(
                    "failed to spawn '{}' for {:?}: {e}",
                    req.interpreter, req.source_path
                )),
            };
        }
    };

    let stdout = Capture::spawn(child.stdout.take());
    let stderr = Capture::spawn(child.stderr.take());

    // Either the process exits on its own, or stop() fires the cancel
    // channel and we kill it.
    let outcome = tokio::select! {
        status_res = child.wait() => exit_outcome(req, status_res),

        cancel = &mut cancel_rx => match cancel {
            Ok(()) => {
                info!(
                    unit = %req.unit_id,
                    run_id = req.run_id,
                    "cancellation requested; killing unit process"
                );
                kill_child(req, &mut child).await;
                ProcessOutcome::Killed
            }
            Err(_) => {
                debug!(
                    unit = %req.unit_id,
                    run_id = req.run_id,
                    "cancel channel closed without explicit cancellation"
                );
                exit_outcome(req, child.wait().await)
            }
        },
    };

    ProcessOutput {
        stdout: stdout.finish().await,
        stderr: stderr.finish().await,
        outcome,
    }
}

fn exit_outcome(
    req: &ProcessRequest,
    status_res: std::io::Result<std::process::ExitStatus>,
) -> ProcessOutcome {
    match status_res {
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            info!(
                unit = %req.unit_id,
                run_id = req.run_id,
                exit_code = code,
                success = status.success(),
                "unit process exited"
            );
            ProcessOutcome::Exited(code)
        }
        Err(e) => {
            warn!(unit = %req.unit_id, run_id = req.run_id, error = %e, "waiting for unit process failed");
            ProcessOutcome::Exited(-1)
        }
    }
}

async fn kill_child(req: &ProcessRequest, child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!(unit = %req.unit_id, error = %e, "killpg failed; falling back to kill");
            }
        }
    }

    if let Err(e) = child.kill().await {
        // Already reaped after the group kill is the common case here.
        debug!(
            unit = %req.unit_id,
            run_id = req.run_id,
            error = %e,
            "kill after cancellation reported an error"
        );
    }
}

/// Output collected from one pipe, readable even if the reader never
/// reaches end of stream.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl Capture {
    fn spawn<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let reader = stream.map(|mut stream| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buf, reader }
    }

    async fn finish(mut self) -> String {
        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
                debug!("pipe still open after process exit; keeping partial output");
                reader.abort();
            }
        }
        let bytes = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
