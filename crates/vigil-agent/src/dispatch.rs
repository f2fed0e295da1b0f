//! Validator / dispatcher: the only gate between the broker and any side
//! effect.
//!
//! Every raw body is decoded, authenticated, checked against its execution
//! window, and routed by order kind. Two failure regimes apply:
//!
//! - before a command id is known, failures are logged and the message is
//!   dropped silently, so unauthenticated senders learn nothing;
//! - after a decode with id > 0, every rejection is answered with a
//!   `failed` publication carrying a descriptive error record, so the
//!   scheduler observes a terminal state for each accepted command.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use vigil_core::{Command, LogRecord, Verifier};

use crate::error::{AgentError, Result};
use crate::logfanin::LogSender;

enum Route {
    /// An in-process module kind, re-executed through the agent binary.
    Module,
    /// A caller-specified external program.
    External,
    Terminate,
}

pub async fn run(
    verifier: Arc<dyn Verifier>,
    mut raw: mpsc::Receiver<Vec<u8>>,
    module: mpsc::Sender<Command>,
    external: mpsc::Sender<Command>,
    results: mpsc::Sender<Command>,
    terminate: mpsc::Sender<String>,
    log: LogSender,
) -> Result<()> {
    while let Some(body) = raw.recv().await {
        // No decode, no reply: the command id is unknown.
        let cmd: Command = match serde_json::from_slice(&body) {
            Ok(cmd) => cmd,
            Err(e) => {
                log.send(LogRecord::new(format!("discarding undecodable message: {e}")).err());
                continue;
            }
        };

        match route(verifier.clone(), &cmd).await {
            Ok(Route::Module) => {
                log.send(queued(&cmd));
                module.send(cmd).await.map_err(|_| AgentError::PipeClosed)?;
            }
            Ok(Route::External) => {
                log.send(queued(&cmd));
                external.send(cmd).await.map_err(|_| AgentError::PipeClosed)?;
            }
            Ok(Route::Terminate) => {
                // One terminate is enough; a full queue means one is already
                // pending and this duplicate can be dropped.
                let _ = terminate.try_send("terminate order received from scheduler".into());
            }
            Err(e) => {
                let record = LogRecord::new(e.to_string())
                    .command(cmd.id)
                    .action(cmd.action.id)
                    .err();
                log.send(record.clone());
                if cmd.id > 0 {
                    results
                        .send(cmd.reject(&record))
                        .await
                        .map_err(|_| AgentError::PipeClosed)?;
                }
            }
        }
    }
    Ok(())
}

fn queued(cmd: &Command) -> LogRecord {
    LogRecord::new("command queued for execution")
        .command(cmd.id)
        .action(cmd.action.id)
}

async fn route(verifier: Arc<dyn Verifier>, cmd: &Command) -> Result<Route> {
    let now = Utc::now();

    // Signature verification is CPU-bound; run it off the async executor so
    // a burst of deliveries cannot stall the other runtime tasks.
    let action = cmd.action.clone();
    tokio::task::spawn_blocking(move || action.validate(now, verifier.as_ref())).await??;

    // Validation covers expiry; the not-yet-due gate is ours. The scheduler
    // may re-deliver later, the agent does not queue future work.
    if now < cmd.action.scheduled_date {
        return Err(AgentError::NotYetDue(cmd.action.scheduled_date));
    }

    let order = cmd.action.order.to_lowercase();
    match order.as_str() {
        "shell" => Ok(Route::External),
        "terminate" => Ok(Route::Terminate),
        _ if vigil_modules::by_name(&order).is_some() => Ok(Route::Module),
        _ => Err(AgentError::OrderNotUnderstood(cmd.action.order.clone())),
    }
}
