//! Module and external-command supervision.
//!
//! In-process module kinds are not run in-process at all: the agent
//! re-executes its own binary with `-m <order>` so a crashing or leaking
//! module can never take the runtime down, and the timeout is enforced with
//! an OS-level kill. The `shell` path runs a caller-specified program under
//! the same discipline.
//!
//! Per execution the supervisor guarantees exactly one terminal `Results`
//! publication: `succeeded` with the child's decoded stdout, `failed` for a
//! nonzero exit or undecodable output, or `timeout` when the deadline fires
//! (published before the child is killed and reaped).

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command as ChildCommand;
use tokio::sync::mpsc;

use vigil_core::{Command, LogRecord, Status};

use crate::error::Result;
use crate::logfanin::LogSender;

/// Arguments understood by the external-command path.
#[derive(Debug, Deserialize)]
struct ShellArgs {
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Drain the module queue, one transient supervision task per command so
/// executions overlap freely.
pub async fn run_modules(
    timeout: Duration,
    mut rx: mpsc::Receiver<Command>,
    results: mpsc::Sender<Command>,
    log: LogSender,
) -> Result<()> {
    while let Some(cmd) = rx.recv().await {
        let results = results.clone();
        let log = log.clone();
        tokio::spawn(async move {
            execute_module(cmd, timeout, results, log).await;
        });
    }
    Ok(())
}

/// Same shape as [`run_modules`], for the external-command queue.
pub async fn run_external(
    timeout: Duration,
    mut rx: mpsc::Receiver<Command>,
    results: mpsc::Sender<Command>,
    log: LogSender,
) -> Result<()> {
    while let Some(cmd) = rx.recv().await {
        let results = results.clone();
        let log = log.clone();
        tokio::spawn(async move {
            execute_external(cmd, timeout, results, log).await;
        });
    }
    Ok(())
}

async fn execute_module(
    cmd: Command,
    timeout: Duration,
    results: mpsc::Sender<Command>,
    log: LogSender,
) {
    log.send(
        LogRecord::new(format!("executing command '{}'", cmd.action.order))
            .command(cmd.id)
            .action(cmd.action.id)
            .debug(),
    );
    match module_child(&cmd) {
        Ok(child) => supervise(child, cmd, timeout, true, &results, &log).await,
        Err(e) => {
            publish_failed(
                cmd,
                format!("failed to prepare module execution: {e}"),
                &results,
                &log,
            )
            .await;
        }
    }
}

async fn execute_external(
    cmd: Command,
    timeout: Duration,
    results: mpsc::Sender<Command>,
    log: LogSender,
) {
    log.send(
        LogRecord::new("executing external command")
            .command(cmd.id)
            .action(cmd.action.id)
            .debug(),
    );
    match external_child(&cmd) {
        // External programs are not held to the module stdout protocol.
        Ok(child) => supervise(child, cmd, timeout, false, &results, &log).await,
        Err(e) => {
            publish_failed(
                cmd,
                format!("failed to prepare external execution: {e}"),
                &results,
                &log,
            )
            .await;
        }
    }
}

/// The agent's own binary in module mode. The JSON-serialized arguments
/// travel as one argv element; the module decodes that element as the whole
/// `Arguments` value.
fn module_child(cmd: &Command) -> Result<ChildCommand> {
    let args = serde_json::to_string(&cmd.action.arguments)?;
    let exe = std::env::current_exe()?;
    let mut child = ChildCommand::new(exe);
    child
        .arg("-m")
        .arg(cmd.action.order.to_lowercase())
        .arg(args);
    Ok(child)
}

fn external_child(cmd: &Command) -> Result<ChildCommand> {
    let spec: ShellArgs = serde_json::from_value(cmd.action.arguments.clone())?;
    let mut child = ChildCommand::new(spec.command);
    child.args(spec.args);
    Ok(child)
}

/// Run one child to completion or deadline and publish the single terminal
/// result for `cmd`.
///
/// Stdout is captured fully; stderr is discarded (modules report errors
/// through the result envelope). With `expect_json`, undecodable stdout
/// fails the command; without it, non-JSON output is wrapped as
/// `{"stdout": ...}`.
pub(crate) async fn supervise(
    mut child_cmd: ChildCommand,
    mut cmd: Command,
    timeout: Duration,
    expect_json: bool,
    results: &mpsc::Sender<Command>,
    log: &LogSender,
) {
    child_cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match child_cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            publish_failed(cmd, format!("failed to spawn child: {e}"), results, log).await;
            return;
        }
    };
    let mut stdout = child.stdout.take();

    tokio::select! {
        (status, output) = async {
            // Read to EOF before reaping so a chatty child can never
            // deadlock on a full pipe.
            let mut buf = Vec::new();
            if let Some(out) = stdout.as_mut() {
                let _ = out.read_to_end(&mut buf).await;
            }
            (child.wait().await, buf)
        } => {
            match status {
                Err(e) => {
                    publish_failed(cmd, format!("failed to collect child exit: {e}"), results, log)
                        .await;
                }
                Ok(status) if !status.success() => {
                    publish_failed(cmd, format!("command failed: {status}"), results, log).await;
                }
                Ok(_) => {
                    match decode_output(&output, expect_json) {
                        Ok(value) => {
                            log.send(
                                LogRecord::new("command succeeded")
                                    .command(cmd.id)
                                    .action(cmd.action.id),
                            );
                            cmd.status = Status::Succeeded;
                            cmd.results = value;
                            let _ = results.send(cmd).await;
                        }
                        Err(e) => {
                            publish_failed(
                                cmd,
                                format!("failed to decode module output: {e}"),
                                results,
                                log,
                            )
                            .await;
                        }
                    }
                }
            }
        }
        _ = tokio::time::sleep(timeout) => {
            log.send(
                LogRecord::new("command timed out, killing it")
                    .command(cmd.id)
                    .action(cmd.action.id)
                    .err(),
            );
            cmd.status = Status::Timeout;
            let _ = results.send(cmd).await;
            // Result first, then reclaim the child: the scheduler learns the
            // outcome even if the kill itself misbehaves.
            if let Err(e) = child.start_kill() {
                log.send(LogRecord::new(format!("failed to signal child: {e}")).err());
            }
            let _ = child.wait().await;
        }
    }
}

fn decode_output(output: &[u8], expect_json: bool) -> serde_json::Result<serde_json::Value> {
    match serde_json::from_slice(output) {
        Ok(value) => Ok(value),
        Err(e) if expect_json => Err(e),
        Err(_) => Ok(serde_json::json!({
            "stdout": String::from_utf8_lossy(output)
        })),
    }
}

async fn publish_failed(
    cmd: Command,
    desc: String,
    results: &mpsc::Sender<Command>,
    log: &LogSender,
) {
    let record = LogRecord::new(desc).command(cmd.id).action(cmd.action.id).err();
    log.send(record.clone());
    let _ = results.send(cmd.reject(&record)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> ChildCommand {
        let mut c = ChildCommand::new("sh");
        c.arg("-c").arg(script);
        c
    }

    fn envelope(order: &str, arguments: serde_json::Value) -> Command {
        serde_json::from_value(serde_json::json!({
            "ID": 42,
            "Action": {
                "ID": 7,
                "Name": "sweep",
                "Order": order,
                "Arguments": arguments,
                "ScheduledDate": "2020-01-01T00:00:00Z",
                "ExpirationDate": "2099-01-01T00:00:00Z"
            }
        }))
        .unwrap()
    }

    fn harness() -> (mpsc::Sender<Command>, mpsc::Receiver<Command>, LogSender) {
        let (tx, rx) = mpsc::channel(8);
        let (log_tx, mut log_rx) = crate::logfanin::channel();
        tokio::spawn(async move { while log_rx.recv().await.is_some() {} });
        (tx, rx, log_tx)
    }

    #[tokio::test]
    async fn json_stdout_and_clean_exit_succeed() {
        let (tx, mut rx, log) = harness();
        supervise(
            sh("printf '{\"ok\":true}'"),
            envelope("filechecker", serde_json::json!({})),
            Duration::from_secs(5),
            true,
            &tx,
            &log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.status, Status::Succeeded);
        assert_eq!(cmd.results["ok"], true);
    }

    #[tokio::test]
    async fn nonzero_exit_fails_regardless_of_stdout() {
        let (tx, mut rx, log) = harness();
        supervise(
            sh("printf '{\"ok\":true}'; exit 3"),
            envelope("filechecker", serde_json::json!({})),
            Duration::from_secs(5),
            true,
            &tx,
            &log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.status, Status::Failed);
        assert!(cmd.results["Desc"].as_str().unwrap().contains("failed"));
    }

    #[tokio::test]
    async fn undecodable_module_output_fails_the_command() {
        let (tx, mut rx, log) = harness();
        supervise(
            sh("echo this is not json"),
            envelope("filechecker", serde_json::json!({})),
            Duration::from_secs(5),
            true,
            &tx,
            &log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.status, Status::Failed);
        assert!(cmd.results["Desc"].as_str().unwrap().contains("decode"));
    }

    #[tokio::test]
    async fn deadline_publishes_timeout_and_reaps_the_child() {
        let (tx, mut rx, log) = harness();
        let start = Instant::now();
        supervise(
            sh("sleep 30"),
            envelope("filechecker", serde_json::json!({})),
            Duration::from_millis(200),
            true,
            &tx,
            &log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.status, Status::Timeout);
        // supervise only returns after the kill is delivered and the child
        // is reaped, so the whole exchange must be far under the sleep.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn external_output_is_wrapped_when_not_json() {
        let (tx, mut rx, log) = harness();
        supervise(
            sh("echo hello"),
            envelope("shell", serde_json::json!({})),
            Duration::from_secs(5),
            false,
            &tx,
            &log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.status, Status::Succeeded);
        assert!(cmd.results["stdout"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn external_json_output_passes_through() {
        let (tx, mut rx, log) = harness();
        supervise(
            sh("printf '{\"a\":1}'"),
            envelope("shell", serde_json::json!({})),
            Duration::from_secs(5),
            false,
            &tx,
            &log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.results["a"], 1);
    }

    #[tokio::test]
    async fn unspawnable_child_is_answered_with_failed() {
        let (tx, mut rx, log) = harness();
        supervise(
            ChildCommand::new("/no/such/binary/vigil"),
            envelope("filechecker", serde_json::json!({})),
            Duration::from_secs(5),
            true,
            &tx,
            &log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.status, Status::Failed);
        assert!(cmd.results["Desc"].as_str().unwrap().contains("spawn"));
    }

    #[test]
    fn module_child_passes_arguments_as_one_argv_element() {
        let cmd = envelope("FileChecker", serde_json::json!({"checks": []}));
        let child = module_child(&cmd).unwrap();
        let args: Vec<String> = child
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-m", "filechecker", "{\"checks\":[]}"]);
    }

    #[test]
    fn external_child_uses_the_caller_specified_program() {
        let cmd = envelope(
            "shell",
            serde_json::json!({"command": "echo", "args": ["hi", "there"]}),
        );
        let child = external_child(&cmd).unwrap();
        assert_eq!(child.as_std().get_program(), "echo");
        assert_eq!(child.as_std().get_args().count(), 2);
    }

    #[tokio::test]
    async fn malformed_shell_arguments_fail_before_any_spawn() {
        let (tx, mut rx, log) = harness();
        execute_external(
            envelope("shell", serde_json::json!({"not": "a command"})),
            Duration::from_secs(5),
            tx,
            log,
        )
        .await;
        let cmd = rx.recv().await.unwrap();
        assert_eq!(cmd.status, Status::Failed);
        assert!(cmd.results["Desc"].as_str().unwrap().contains("prepare"));
    }
}
