use async_trait::async_trait;
use serde_json::{json, Value};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{Tool, ToolResult};
use crate::errors::{ToolError, ToolOutcome};

const SENTINEL: &str = "<<exit>>";
const TIMEOUT: Duration = Duration::from_secs(120);

/// A long-lived bash process; state like the working directory and exported
/// variables carries over between commands
struct BashSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Lines<BufReader<ChildStderr>>,
    timed_out: bool,
}

impl BashSession {
    fn start() -> ToolOutcome<Self> {
        let mut child = Command::new("/bin/bash")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionError(format!("Failed to start bash: {}", e)))?;

        let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                return Err(ToolError::ExecutionError(
                    "bash started without piped stdio".into(),
                ))
            }
        };

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: BufReader::new(stderr).lines(),
            timed_out: false,
        })
    }

    async fn run(&mut self, command: &str) -> ToolOutcome<ToolResult> {
        if self.timed_out {
            return Err(ToolError::ExecutionError(format!(
                "timed out: bash has not returned in {} seconds and must be restarted",
                TIMEOUT.as_secs()
            )));
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            return Err(ToolError::ExecutionError(format!(
                "bash has exited with {}",
                status
            )));
        }

        let script = format!(
            "{}\necho '{}'\necho '{}' >&2\n",
            command, SENTINEL, SENTINEL
        );
        self.stdin
            .write_all(script.as_bytes())
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;

        let stdout = &mut self.stdout;
        let stderr = &mut self.stderr;
        let both = async { tokio::try_join!(read_until_sentinel(stdout), read_until_sentinel(stderr)) };

        let (output, error) = match tokio::time::timeout(TIMEOUT, both).await {
            Ok(result) => result.map_err(|e| ToolError::ExecutionError(e.to_string()))?,
            Err(_) => {
                self.timed_out = true;
                return Err(ToolError::ExecutionError(format!(
                    "timed out: bash has not returned in {} seconds and must be restarted",
                    TIMEOUT.as_secs()
                )));
            }
        };

        Ok(ToolResult {
            output: non_empty(output),
            error: non_empty(error),
            ..Default::default()
        })
    }
}

async fn read_until_sentinel<R>(lines: &mut Lines<R>) -> io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut collected = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if let Some(rest) = line.strip_suffix(SENTINEL) {
            // output without a trailing newline lands on the sentinel line
            if !rest.is_empty() {
                collected.push(rest.to_string());
            }
            return Ok(collected.join("\n"));
        }
        collected.push(line);
    }
    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "bash exited before the command finished",
    ))
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Runs commands in a persistent bash shell
pub struct BashTool {
    session: Mutex<Option<BashSession>>,
}

impl BashTool {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn definition(&self) -> Value {
        json!({
            "type": "bash_20241022",
            "name": "bash"
        })
    }

    async fn call(&self, input: Value) -> ToolOutcome<ToolResult> {
        let mut session = self.session.lock().await;

        if input.get("restart").and_then(|v| v.as_bool()).unwrap_or(false) {
            *session = Some(BashSession::start()?);
            return Ok(ToolResult::system("tool has been restarted."));
        }

        let command = input
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("no command provided.".into()))?;

        if session.is_none() {
            *session = Some(BashSession::start()?);
        }
        match session.as_mut() {
            Some(session) => session.run(command).await,
            None => Err(ToolError::ExecutionError("bash session unavailable".into())),
        }
    }
}
