//! Ingress consumer: drains broker deliveries onto the raw-message queue.

use futures::StreamExt;
use lapin::options::BasicAckOptions;
use lapin::Consumer;
use tokio::sync::mpsc;

use vigil_core::LogRecord;

use crate::error::{AgentError, Result};
use crate::logfanin::LogSender;

/// Consume deliveries until the stream closes. Each delivery is acked
/// before it is forwarded; a failed ack drops the delivery so the broker
/// can redeliver it elsewhere.
///
/// Returning (rather than reconnecting) on stream closure is deliberate:
/// the caller treats a dead delivery stream as a shutdown trigger.
pub async fn run(
    mut consumer: Consumer,
    new_command: mpsc::Sender<Vec<u8>>,
    log: LogSender,
) -> Result<()> {
    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                log.send(LogRecord::new(format!("delivery stream error: {e}")).err());
                break;
            }
        };

        if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
            log.send(
                LogRecord::new(format!(
                    "failed to acknowledge reception, message dropped: {e}"
                ))
                .err(),
            );
            continue;
        }

        if new_command.send(delivery.data).await.is_err() {
            return Err(AgentError::PipeClosed);
        }
        let depth = new_command.max_capacity() - new_command.capacity();
        log.send(LogRecord::new(format!("message received, queued in position {depth}")).debug());
    }
    Ok(())
}
