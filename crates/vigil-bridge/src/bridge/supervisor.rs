//! Process supervisor: the full lifecycle of one child per call.
//!
//! Spawned -> Writing -> AwaitingOutput -> {Completed, TimedOut, Crashed}.
//! The one true suspension point in the pipeline is the bounded read of
//! the child's output; deadline expiry interrupts it via
//! `tokio::time::timeout`, never a busy poll. On every exit path the child
//! is killed and reaped before the call returns; `kill_on_drop` backstops
//! panics and task cancellation.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use super::CallError;

/// How to launch the vigil-mcp server for one call.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Runtime that executes the server module.
    pub command: String,
    /// Path to the server module, the only argument passed.
    pub server_path: PathBuf,
    /// Deadline for the whole call: write + read-to-EOF + exit.
    pub timeout: Duration,
}

/// Owns the child process lifecycle for exactly one call.
pub struct ProcessSupervisor {
    config: McpServerConfig,
}

impl ProcessSupervisor {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }

    /// Run one call: spawn the child, transfer the frame, read both output
    /// streams to completion under the deadline, and classify the outcome.
    ///
    /// Returns the raw stdout on success; the caller demultiplexes it.
    /// The child has terminated by the time this returns, on every path.
    pub async fn run(&self, frame: &str) -> Result<String, CallError> {
        let mut child = Command::new(&self.config.command)
            .arg(&self.config.server_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.classify_spawn_error(e))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            CallError::Process("child stdin not captured".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            CallError::Process("child stdout not captured".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            CallError::Process("child stderr not captured".to_string())
        })?;

        let deadline = self.config.timeout;
        let outcome =
            tokio::time::timeout(deadline, drive(&mut child, stdin, stdout, stderr, frame)).await;

        match outcome {
            // Deadline elapsed: kill with no grace period, wait for the OS
            // to confirm, and discard any partial output.
            Err(_) => {
                kill_and_wait(&mut child).await;
                let secs = timeout_secs(deadline);
                tracing::warn!(timeout_secs = secs, "Tool call timed out, child killed");
                Err(CallError::Timeout(secs))
            }
            // A fault mid-read still reaps the child before propagating.
            Ok(Err(e)) => {
                kill_and_wait(&mut child).await;
                Err(CallError::Process(format!("I/O error: {e}")))
            }
            Ok(Ok((status, stdout, stderr))) => classify_exit(status, stdout, stderr),
        }
    }

    fn classify_spawn_error(&self, e: std::io::Error) -> CallError {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                CallError::ToolUnavailable {
                    path: self.config.server_path.display().to_string(),
                }
            }
            _ => CallError::Process(format!("failed to spawn MCP server: {e}")),
        }
    }
}

/// Write the frame, close stdin so the child sees EOF, and drain both
/// output streams while waiting for exit. The write runs concurrently
/// with the reads: a frame larger than the pipe buffer must not stall
/// behind a child that emits output before reading.
///
/// A child that closes (or never opens) its stdin breaks the pipe; that
/// is not a fault here - the exit status and stderr still classify it.
async fn drive(
    child: &mut Child,
    mut stdin: ChildStdin,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
    frame: &str,
) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let feed = async move {
        let written = async {
            stdin.write_all(frame.as_bytes()).await?;
            stdin.shutdown().await
        }
        .await;
        drop(stdin);
        match written {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        }
    };

    let mut out = Vec::new();
    let mut err = Vec::new();
    let (fed, read_out, read_err, status) = tokio::join!(
        feed,
        stdout.read_to_end(&mut out),
        stderr.read_to_end(&mut err),
        child.wait(),
    );
    fed?;
    read_out?;
    read_err?;
    Ok((status?, out, err))
}

/// Whole seconds for the timeout diagnostic, rounded up and never 0.
fn timeout_secs(deadline: Duration) -> u64 {
    deadline.as_secs_f64().ceil().max(1.0) as u64
}

/// Force-terminate and synchronously reap the child. `Child::kill` waits
/// for the OS to confirm termination, so no orphan survives this call.
async fn kill_and_wait(child: &mut Child) {
    if let Err(e) = child.kill().await {
        // Already-exited children land here; nothing left to reap.
        tracing::debug!(error = %e, "Child kill after failure returned error");
    }
}

fn classify_exit(
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
) -> Result<String, CallError> {
    if !status.success() {
        let diagnostic = String::from_utf8_lossy(&stderr).trim().to_string();
        let message = if diagnostic.is_empty() {
            "Unknown error".to_string()
        } else {
            diagnostic
        };
        tracing::warn!(code = ?status.code(), "MCP server exited non-zero");
        return Err(CallError::Process(message));
    }

    let output = String::from_utf8_lossy(&stdout).into_owned();
    if output.trim().is_empty() {
        return Err(CallError::EmptyResponse);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::time::Instant;

    /// Supervisor running a shell script in place of the node module; the
    /// script path takes the server-module argument slot.
    fn script_supervisor(script: &str, timeout: Duration) -> (ProcessSupervisor, tempfile::TempPath) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(script.as_bytes()).unwrap();
        let path = file.into_temp_path();
        let supervisor = ProcessSupervisor::new(McpServerConfig {
            command: "sh".to_string(),
            server_path: path.to_path_buf(),
            timeout,
        });
        (supervisor, path)
    }

    fn response_script(id: u64) -> String {
        format!(
            r#"cat > /dev/null
echo 'starting up'
echo '{{"jsonrpc":"2.0","id":{id},"result":{{"content":[{{"type":"text","text":"{{\"ok\":true}}"}}]}}}}'
"#
        )
    }

    #[tokio::test]
    async fn successful_child_returns_stdout() {
        let (supervisor, _path) =
            script_supervisor(&response_script(1), Duration::from_secs(5));

        let stdout = supervisor.run("{\"id\":1}\n").await.unwrap();
        assert!(stdout.contains("starting up"));
        assert!(stdout.contains("\"id\":1"));
    }

    #[tokio::test]
    async fn missing_binary_is_tool_unavailable() {
        let supervisor = ProcessSupervisor::new(McpServerConfig {
            command: "/nonexistent/vigil-bridge-test-runtime".to_string(),
            server_path: PathBuf::from("/nonexistent/index.js"),
            timeout: Duration::from_secs(1),
        });

        match supervisor.run("{}\n").await {
            Err(CallError::ToolUnavailable { path }) => {
                assert!(path.contains("index.js"));
            }
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }

    /// True while a process with this pid exists (zombies included, so a
    /// killed-but-unreaped child still counts as alive).
    fn process_exists(pid: &str) -> bool {
        std::path::Path::new(&format!("/proc/{pid}")).exists()
    }

    #[tokio::test]
    async fn slow_child_times_out_and_is_reaped() {
        let pid_file = tempfile::NamedTempFile::new().unwrap();
        let script = format!(
            "echo $$ > {}\ncat > /dev/null\nsleep 10\n",
            pid_file.path().display()
        );
        let (supervisor, _path) = script_supervisor(&script, Duration::from_millis(300));

        let started = Instant::now();
        let result = supervisor.run("{}\n").await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(CallError::Timeout(_))));
        // Deadline plus bounded overhead - nowhere near the child's sleep.
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");

        // The child recorded its pid before sleeping; by the time `run`
        // returns it must be killed and reaped, not merely abandoned.
        let pid = std::fs::read_to_string(pid_file.path()).unwrap().trim().to_string();
        assert!(!pid.is_empty());
        assert!(!process_exists(&pid), "child {pid} outlived its call");
    }

    #[tokio::test]
    async fn sub_second_deadline_reports_at_least_one_second() {
        let (supervisor, _path) =
            script_supervisor("cat > /dev/null\nsleep 10\n", Duration::from_millis(200));

        match supervisor.run("{}\n").await {
            Err(CallError::Timeout(secs)) => assert_eq!(secs, 1),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_discards_partial_output() {
        let (supervisor, _path) = script_supervisor(
            "cat > /dev/null\necho '{\"id\":1,\"result\":{\"content\":[]}}'\nsleep 10\n",
            Duration::from_millis(200),
        );

        // Partial output was already buffered, but the timeout path always
        // yields the fixed timeout failure.
        assert!(matches!(
            supervisor.run("{}\n").await,
            Err(CallError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn stderr_survives_child_that_never_reads_stdin() {
        // The child closes stdin immediately, so the frame write breaks
        // the pipe; the exit status and diagnostic must still win over
        // the write failure. The frame exceeds the pipe buffer so the
        // write is mid-flight when the pipe closes.
        let (supervisor, _path) = script_supervisor(
            "exec 0<&-\necho 'module load failed' >&2\nexit 3\n",
            Duration::from_secs(5),
        );

        let frame = format!("{{\"data\":\"{}\"}}\n", "x".repeat(256 * 1024));
        match supervisor.run(&frame).await {
            Err(CallError::Process(msg)) => assert!(msg.contains("module load failed")),
            other => panic!("expected Process, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let (supervisor, _path) = script_supervisor(
            "cat > /dev/null\necho 'module load failed' >&2\nexit 3\n",
            Duration::from_secs(5),
        );

        match supervisor.run("{}\n").await {
            Err(CallError::Process(msg)) => assert!(msg.contains("module load failed")),
            other => panic!("expected Process, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_without_stderr_is_generic() {
        let (supervisor, _path) =
            script_supervisor("cat > /dev/null\nexit 1\n", Duration::from_secs(5));

        match supervisor.run("{}\n").await {
            Err(CallError::Process(msg)) => assert_eq!(msg, "Unknown error"),
            other => panic!("expected Process, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_output_on_success_is_a_failure() {
        let (supervisor, _path) =
            script_supervisor("cat > /dev/null\nexit 0\n", Duration::from_secs(5));

        assert!(matches!(
            supervisor.run("{}\n").await,
            Err(CallError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn concurrent_timeouts_terminate_every_child() {
        // Each child records its own pid in the shared directory before
        // sleeping past the deadline.
        let pid_dir = tempfile::tempdir().unwrap();
        let script = format!(
            "echo $$ > {}/$$\ncat > /dev/null\nsleep 10\n",
            pid_dir.path().display()
        );
        let (supervisor, _path) = script_supervisor(&script, Duration::from_millis(300));
        let supervisor = std::sync::Arc::new(supervisor);

        let calls = 48;
        let started = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..calls {
            let supervisor = std::sync::Arc::clone(&supervisor);
            handles.push(tokio::spawn(async move {
                supervisor.run("{}\n").await
            }));
        }
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(CallError::Timeout(_))
            ));
        }
        assert!(started.elapsed() < Duration::from_secs(5));

        let mut seen = 0;
        for entry in std::fs::read_dir(pid_dir.path()).unwrap() {
            let pid = entry.unwrap().file_name().into_string().unwrap();
            assert!(!process_exists(&pid), "child {pid} outlived its call");
            seen += 1;
        }
        assert_eq!(seen, calls);
    }
}
