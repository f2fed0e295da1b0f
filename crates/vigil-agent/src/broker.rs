//! AMQP session: one connection, a delivery channel bound to the agent's
//! queue, and a publish channel shared by the result publisher and the
//! heartbeater.
//!
//! All traffic rides the topic exchange `mig`. The agent consumes from its
//! identity-derived queue and publishes to `mig.sched.<QueueLoc>` (results)
//! and `mig.keepalive` (heartbeats).

use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use tokio::sync::Mutex;

use crate::error::Result;

pub const EXCHANGE: &str = "mig";
pub const KEEPALIVE_KEY: &str = "mig.keepalive";

/// Routing key carrying this agent's results back to the scheduler.
pub fn sched_key(queue_loc: &str) -> String {
    format!("mig.sched.{queue_loc}")
}

pub struct Broker {
    conn: Connection,
    /// Publishes from concurrent tasks are serialized on this one channel.
    publish_chan: Mutex<Channel>,
}

impl Broker {
    /// Connect and wire the agent's side of the topology: declare the
    /// exchange, declare and bind the durable input queue, start consuming,
    /// and open a separate channel for publishes.
    pub async fn open(url: &str, queue_loc: &str) -> Result<(Self, Consumer)> {
        let conn = Connection::connect(url, ConnectionProperties::default()).await?;

        let consume_chan = conn.create_channel().await?;
        consume_chan
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let queue = format!("mig.agt.{queue_loc}");
        consume_chan
            .queue_declare(
                &queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        consume_chan
            .queue_bind(
                &queue,
                EXCHANGE,
                &queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        let consumer = consume_chan
            .basic_consume(
                &queue,
                "vigil-agent",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let publish_chan = conn.create_channel().await?;
        Ok((
            Self {
                conn,
                publish_chan: Mutex::new(publish_chan),
            },
            consumer,
        ))
    }

    /// Publish `body` on the exchange: persistent delivery, mandatory, not
    /// immediate, content type `text/plain`.
    pub async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        let chan = self.publish_chan.lock().await;
        chan.basic_publish(
            EXCHANGE,
            routing_key,
            BasicPublishOptions {
                mandatory: true,
                immediate: false,
            },
            body,
            BasicProperties::default()
                .with_delivery_mode(2)
                .with_content_type("text/plain".into()),
        )
        .await?
        .await?;
        Ok(())
    }

    /// Tear the session down. Closing the connection also ends the delivery
    /// stream, which lets the task pipeline drain front to back.
    pub async fn close(&self) {
        let _ = self.conn.close(0, "agent shutdown").await;
    }
}
