//! The execution channel itself: one long-lived shell subprocess plus the
//! FIFO queue that serializes commands sent to it (spec section 4.5).
//!
//! `spawn`/`spawn_safe` each take the channel's internal mutex before
//! writing to the subprocess's stdin, which is exactly the "enqueue,
//! await dequeue signal, run, signal next waiter" protocol the spec
//! describes: `tokio::sync::Mutex` grants the lock to waiters in the
//! order they requested it, so the mutex *is* the FIFO queue rather than
//! an approximation of one.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use uuid::Uuid;

use codify_core::SpawnError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: bool,
    pub exit_code: Option<i32>,
    pub data: String,
}

struct Io {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// One interactive subprocess, bound to a single plan for its lifetime.
pub struct ExecutionChannel {
    id: Uuid,
    child: Mutex<Child>,
    io: Mutex<Io>,
    next_ticket: AtomicU64,
}

impl ExecutionChannel {
    /// Spawn the user's shell (`$SHELL`, falling back to `/bin/sh`) as a
    /// persistent interactive subprocess.
    pub fn spawn_shell() -> std::io::Result<Self> {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let mut child = Command::new(shell)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));

        Ok(Self {
            id: Uuid::new_v4(),
            child: Mutex::new(child),
            io: Mutex::new(Io { stdin, stdout }),
            next_ticket: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run `cmd`, returning an error if its exit code is non-zero.
    pub async fn spawn(&self, cmd: &str) -> Result<CommandOutput, SpawnError> {
        let output = self.run(cmd).await;
        if output.exit_code == Some(0) {
            Ok(output)
        } else {
            Err(SpawnError {
                cmd: cmd.to_string(),
                exit_code: output.exit_code,
                data: output.data,
            })
        }
    }

    /// Run `cmd`; never fails — the caller inspects `status`/`exit_code`.
    pub async fn spawn_safe(&self, cmd: &str) -> CommandOutput {
        self.run(cmd).await
    }

    /// Own ticket-taking, then the actual write/read cycle under the
    /// channel-wide `io` mutex — this is the queue.
    async fn run(&self, cmd: &str) -> CommandOutput {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let sentinel = format!("__codify_exec_{}_{ticket}__", self.id.simple());
        log::debug!("channel {}: enqueue ticket {ticket}: {cmd}", self.id);

        let mut io = self.io.lock().await;
        log::debug!("channel {}: running ticket {ticket}", self.id);

        let full_command = format!("{cmd}\necho \"{sentinel}:$?\"\n");
        if let Err(e) = io.stdin.write_all(full_command.as_bytes()).await {
            return CommandOutput {
                status: false,
                exit_code: None,
                data: format!("failed to write to channel: {e}"),
            };
        }
        if let Err(e) = io.stdin.flush().await {
            return CommandOutput {
                status: false,
                exit_code: None,
                data: format!("failed to flush channel: {e}"),
            };
        }

        let mut data = String::new();
        let mut exit_code = None;
        loop {
            let mut line = String::new();
            match io.stdout.read_line(&mut line).await {
                Ok(0) => break, // subprocess exited
                Ok(_) => {
                    let trimmed = line.trim_end_matches('\n');
                    if let Some(rest) = trimmed.strip_prefix(&format!("{sentinel}:")) {
                        exit_code = rest.trim().parse::<i32>().ok();
                        break;
                    }
                    data.push_str(&line);
                }
                Err(e) => {
                    data.push_str(&format!("channel read error: {e}"));
                    break;
                }
            }
        }

        CommandOutput {
            status: exit_code == Some(0),
            exit_code,
            data,
        }
    }

    /// Idempotent: killing an already-dead child is a no-op success.
    pub async fn kill(&self) -> CommandOutput {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
        match child.wait().await {
            Ok(status) => CommandOutput {
                status: true,
                exit_code: status.code(),
                data: String::new(),
            },
            Err(e) => CommandOutput {
                status: false,
                exit_code: None,
                data: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn spawn_returns_stdout_and_exit_code() {
        let channel = ExecutionChannel::spawn_shell().unwrap();
        let out = channel.spawn("echo hello").await.unwrap();
        assert!(out.data.contains("hello"));
        assert_eq!(out.exit_code, Some(0));
        channel.kill().await;
    }

    #[tokio::test]
    async fn spawn_fails_on_nonzero_exit() {
        let channel = ExecutionChannel::spawn_shell().unwrap();
        let err = channel.spawn("exit 7").await.unwrap_err();
        assert_eq!(err.exit_code, Some(7));
        channel.kill().await;
    }

    #[tokio::test]
    async fn spawn_safe_never_errors_on_nonzero_exit() {
        let channel = ExecutionChannel::spawn_shell().unwrap();
        let out = channel.spawn_safe("exit 3").await;
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.status);
        channel.kill().await;
    }

    #[tokio::test]
    async fn scenario_6_commands_complete_in_enqueue_order() {
        let channel = Arc::new(ExecutionChannel::spawn_shell().unwrap());
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for (label, sleep_secs) in [("A", 2), ("B", 0), ("C", 0)] {
            let channel = channel.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                channel
                    .spawn(&format!("sleep 0.0{sleep_secs}"))
                    .await
                    .unwrap();
                order.lock().await.push(label);
            }));
            // Stagger enqueue so A is first even though it sleeps longest.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec!["A", "B", "C"]);
        channel.kill().await;
    }

    #[tokio::test]
    async fn kill_is_idempotent() {
        let channel = ExecutionChannel::spawn_shell().unwrap();
        channel.kill().await;
        let second = channel.kill().await;
        assert!(second.status);
    }
}
