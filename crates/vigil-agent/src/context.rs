//! Process-wide context and bootstrap.
//!
//! [`Context::init`] builds everything the runtime tasks share: identity,
//! trusted keyring, broker session. After construction the context is
//! read-only and lives behind an `Arc`; the queue endpoints travel
//! separately in [`Pipes`] so each task can own its receiver.

use std::fs;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lapin::Consumer;
use tokio::sync::mpsc;
use tracing::info;

use vigil_core::{Command, KeepAlive, LogRecord, PgpKeyring, Verifier};

use crate::broker::Broker;
use crate::config::{
    AgentConfig, NEW_COMMAND_DEPTH, RESULTS_DEPTH, RUN_COMMAND_DEPTH, TERMINATE_DEPTH,
};
use crate::error::Result;
use crate::logfanin::{self, LogSender};

#[derive(Debug, Clone)]
pub struct AgentIdent {
    pub hostname: String,
    pub os: String,
    pub version: String,
    /// Identity string used as the broker routing-key suffix.
    pub queue_loc: String,
}

pub struct Context {
    pub agent: AgentIdent,
    pub cfg: AgentConfig,
    pub keyring: Arc<dyn Verifier>,
    pub broker: Broker,
    pub start_time: DateTime<Utc>,
}

/// The inter-task queues, plus the broker delivery stream. Senders are
/// cloned into producing tasks; each receiver is moved into its single
/// consumer.
pub struct Pipes {
    pub consumer: Consumer,
    pub new_command_tx: mpsc::Sender<Vec<u8>>,
    pub new_command_rx: mpsc::Receiver<Vec<u8>>,
    pub module_tx: mpsc::Sender<Command>,
    pub module_rx: mpsc::Receiver<Command>,
    pub external_tx: mpsc::Sender<Command>,
    pub external_rx: mpsc::Receiver<Command>,
    pub results_tx: mpsc::Sender<Command>,
    pub results_rx: mpsc::Receiver<Command>,
    pub terminate_tx: mpsc::Sender<String>,
    pub terminate_rx: mpsc::Receiver<String>,
    pub log_tx: LogSender,
    pub log_rx: mpsc::UnboundedReceiver<LogRecord>,
}

impl Context {
    /// Build a fully wired context or fail so the caller can retry.
    pub async fn init(cfg: &AgentConfig) -> Result<(Arc<Context>, Pipes)> {
        let hostname = hostname::get()?.to_string_lossy().into_owned();
        let os = std::env::consts::OS.to_string();
        let queue_loc = format!("{os}.{hostname}");
        let agent = AgentIdent {
            hostname,
            os,
            version: env!("CARGO_PKG_VERSION").to_string(),
            queue_loc,
        };

        let armor = fs::read_to_string(&cfg.keyring_path)?;
        let keyring = PgpKeyring::from_armored(&armor)?;
        info!(keys = keyring.len(), "trusted keyring loaded");
        let keyring: Arc<dyn Verifier> = Arc::new(keyring);

        let (broker, consumer) = Broker::open(&cfg.broker_url, &agent.queue_loc).await?;

        let (new_command_tx, new_command_rx) = mpsc::channel(NEW_COMMAND_DEPTH);
        let (module_tx, module_rx) = mpsc::channel(RUN_COMMAND_DEPTH);
        let (external_tx, external_rx) = mpsc::channel(RUN_COMMAND_DEPTH);
        let (results_tx, results_rx) = mpsc::channel(RESULTS_DEPTH);
        let (terminate_tx, terminate_rx) = mpsc::channel(TERMINATE_DEPTH);
        let (log_tx, log_rx) = logfanin::channel();

        let ctx = Arc::new(Context {
            agent,
            cfg: cfg.clone(),
            keyring,
            broker,
            start_time: Utc::now(),
        });
        let pipes = Pipes {
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
            terminate_rx,
            log_tx,
            log_rx,
        };
        Ok((ctx, pipes))
    }

    /// A fresh heartbeat snapshot.
    pub fn keepalive(&self) -> KeepAlive {
        KeepAlive {
            name: self.agent.hostname.clone(),
            os: self.agent.os.clone(),
            version: self.agent.version.clone(),
            queue_loc: self.agent.queue_loc.clone(),
            start_time: self.start_time,
            heartbeat_ts: Utc::now(),
        }
    }

    /// Release broker resources. Queue teardown follows from tasks dropping
    /// their senders once the delivery stream ends.
    pub async fn destroy(&self) {
        self.broker.close().await;
    }
}
