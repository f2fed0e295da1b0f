//! Task fan-out and the shutdown controller.
//!
//! Seven cooperating tasks share the context and talk only through the
//! queues in [`Pipes`]. A failure inside any one task is logged and
//! contained; the process exits exclusively through the terminate queue.
//!
//! Teardown order matters: the broker session is closed first, which ends
//! the delivery stream, which lets each task drain and drop its senders
//! front to back (ingress → dispatcher → supervisors → publisher), and the
//! log fan-in drains last.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use vigil_core::LogRecord;

use crate::context::{Context, Pipes};
use crate::logfanin::{self, LogSender};
use crate::{dispatch, heartbeat, ingress, publisher, supervisor};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(ctx: Arc<Context>, pipes: Pipes) {
    let Pipes {
        consumer,
        new_command_tx,
        new_command_rx,
        module_tx,
        module_rx,
        external_tx,
        external_rx,
        results_tx,
        results_rx,
        terminate_tx,
        mut terminate_rx,
        log_tx,
        log_rx,
    } = pipes;

    let log_task = tokio::spawn(logfanin::run(log_rx));

    // Ingress. Once the delivery stream is gone the agent can do no further
    // work, so its end doubles as a shutdown trigger.
    let ingress_task = {
        let log = log_tx.clone();
        let term = terminate_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = ingress::run(consumer, new_command_tx, log.clone()).await {
                log.send(LogRecord::new(format!("ingress stopped: {e}")).err());
            }
            let _ = term.try_send("broker delivery channel closed".into());
        })
    };

    let dispatch_task = {
        let log = log_tx.clone();
        let keyring = ctx.keyring.clone();
        let results = results_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatch::run(
                keyring,
                new_command_rx,
                module_tx,
                external_tx,
                results,
                terminate_tx,
                log.clone(),
            )
            .await
            {
                log.send(LogRecord::new(format!("dispatcher stopped: {e}")).err());
            }
        })
    };

    let module_task = spawn_supervisor(
        "module supervisor",
        supervisor::run_modules(ctx.cfg.module_timeout, module_rx, results_tx.clone(), log_tx.clone()),
        log_tx.clone(),
    );
    let external_task = spawn_supervisor(
        "external supervisor",
        supervisor::run_external(ctx.cfg.module_timeout, external_rx, results_tx, log_tx.clone()),
        log_tx.clone(),
    );

    let publish_task = tokio::spawn(publisher::run(ctx.clone(), results_rx, log_tx.clone()));
    let heartbeat_task = tokio::spawn(heartbeat::run(ctx.clone(), log_tx.clone()));

    log_tx.send(LogRecord::new(format!(
        "vigil agent {} started as {}",
        ctx.agent.version, ctx.agent.queue_loc
    )));

    // Shutdown controller: nothing below runs until an authenticated
    // terminate order (or delivery-stream loss) lands here.
    let reason = terminate_rx
        .recv()
        .await
        .unwrap_or_else(|| "terminate queue closed".into());
    log_tx.send(LogRecord::new(format!("shutting down agent: '{reason}'")).emerg());

    heartbeat_task.abort();
    ctx.destroy().await;
    for task in [
        ingress_task,
        dispatch_task,
        module_task,
        external_task,
        publish_task,
    ] {
        let _ = timeout(DRAIN_TIMEOUT, task).await;
    }
    drop(log_tx);
    let _ = timeout(DRAIN_TIMEOUT, log_task).await;
}

fn spawn_supervisor(
    name: &'static str,
    task: impl std::future::Future<Output = crate::error::Result<()>> + Send + 'static,
    log: LogSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = task.await {
            log.send(LogRecord::new(format!("{name} stopped: {e}")).err());
        }
    })
}
