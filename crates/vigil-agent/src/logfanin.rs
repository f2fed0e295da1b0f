//! Log fan-in: every task reports through an unbounded record queue; one
//! consumer drains it into the tracing sink. Producers never block, and a
//! failed send (sink gone during teardown) is silently dropped.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use vigil_core::{LogRecord, Severity};

#[derive(Clone)]
pub struct LogSender(mpsc::UnboundedSender<LogRecord>);

impl LogSender {
    pub fn send(&self, record: LogRecord) {
        let _ = self.0.send(record);
    }
}

pub fn channel() -> (LogSender, mpsc::UnboundedReceiver<LogRecord>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LogSender(tx), rx)
}

/// Drain the queue until every sender is gone.
pub async fn run(mut rx: mpsc::UnboundedReceiver<LogRecord>) {
    while let Some(record) = rx.recv().await {
        emit(&record);
    }
}

fn emit(record: &LogRecord) {
    match record.severity {
        Severity::Debug => debug!(
            command_id = record.command_id,
            action_id = record.action_id,
            "{}",
            record.desc
        ),
        Severity::Info => info!(
            command_id = record.command_id,
            action_id = record.action_id,
            "{}",
            record.desc
        ),
        Severity::Err => error!(
            command_id = record.command_id,
            action_id = record.action_id,
            "{}",
            record.desc
        ),
        Severity::Emerg => error!(
            command_id = record.command_id,
            action_id = record.action_id,
            emergency = true,
            "{}",
            record.desc
        ),
    }
}
