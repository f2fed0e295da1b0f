//! Result publisher: stamps results with the agent identity and sends them
//! to the scheduler's routing key. Publish failures are logged, never
//! retried; the scheduler reconciles through heartbeats and action expiry.

use std::sync::Arc;

use tokio::sync::mpsc;

use vigil_core::{Command, LogRecord};

use crate::broker;
use crate::context::Context;
use crate::logfanin::LogSender;

pub async fn run(ctx: Arc<Context>, mut rx: mpsc::Receiver<Command>, log: LogSender) {
    let routing_key = broker::sched_key(&ctx.agent.queue_loc);
    while let Some(mut cmd) = rx.recv().await {
        cmd.agent_queue_loc = ctx.agent.queue_loc.clone();
        log.send(
            LogRecord::new("sending command results")
                .command(cmd.id)
                .action(cmd.action.id),
        );
        let body = match serde_json::to_vec(&cmd) {
            Ok(body) => body,
            Err(e) => {
                log.send(
                    LogRecord::new(format!("failed to serialize results: {e}"))
                        .command(cmd.id)
                        .action(cmd.action.id)
                        .err(),
                );
                continue;
            }
        };
        if let Err(e) = ctx.broker.publish(&routing_key, &body).await {
            log.send(
                LogRecord::new(format!("failed to publish results: {e}"))
                    .command(cmd.id)
                    .action(cmd.action.id)
                    .err(),
            );
        }
    }
}
