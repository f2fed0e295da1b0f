//! Periodic keepalive publication. Runs until the shutdown controller
//! aborts it.

use std::sync::Arc;

use tokio::time::interval;

use vigil_core::LogRecord;

use crate::broker::KEEPALIVE_KEY;
use crate::context::Context;
use crate::logfanin::LogSender;

pub async fn run(ctx: Arc<Context>, log: LogSender) {
    let mut tick = interval(ctx.cfg.heartbeat_period);
    loop {
        tick.tick().await;
        let beat = ctx.keepalive();
        let body = match serde_json::to_vec(&beat) {
            Ok(body) => body,
            Err(e) => {
                // Skip this beat; the next tick rebuilds from scratch.
                log.send(LogRecord::new(format!("failed to serialize heartbeat: {e}")).err());
                continue;
            }
        };
        log.send(LogRecord::new(format!("heartbeat for {}", beat.queue_loc)).debug());
        if let Err(e) = ctx.broker.publish(KEEPALIVE_KEY, &body).await {
            log.send(LogRecord::new(format!("failed to publish heartbeat: {e}")).err());
        }
    }
}
