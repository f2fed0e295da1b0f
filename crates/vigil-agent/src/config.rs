//! Build-time defaults and the bootstrap configuration.
//!
//! Values the scheduler does not control: where the broker lives, where the
//! trusted keyring is provisioned, and the runtime's fixed periods. All of
//! them are compiled defaults overridable at bootstrap via flag or
//! environment; none change while the agent runs.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BROKER_URL: &str = "amqp://127.0.0.1:5672/%2f";
pub const DEFAULT_KEYRING_PATH: &str = "/etc/vigil/trusted_keys.asc";

/// Hard ceiling on a single module execution.
pub const MODULE_TIMEOUT: Duration = Duration::from_secs(300);
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);
pub const INIT_RETRY_DELAY: Duration = Duration::from_secs(60);

// Inter-task queue depths. The log queue is unbounded and not listed here.
pub const NEW_COMMAND_DEPTH: usize = 128;
pub const RUN_COMMAND_DEPTH: usize = 32;
pub const RESULTS_DEPTH: usize = 128;
pub const TERMINATE_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub broker_url: String,
    pub keyring_path: PathBuf,
    pub module_timeout: Duration,
    pub heartbeat_period: Duration,
    pub init_retry_delay: Duration,
}

impl AgentConfig {
    pub fn new(broker_url: String, keyring_path: PathBuf) -> Self {
        Self {
            broker_url,
            keyring_path,
            module_timeout: MODULE_TIMEOUT,
            heartbeat_period: HEARTBEAT_PERIOD,
            init_retry_delay: INIT_RETRY_DELAY,
        }
    }
}
