//! Heartbeat envelope published to the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent identity snapshot plus liveness timestamps. Rebuilt fresh on every
/// emission; only `HeartBeatTS` changes between beats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAlive {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "QueueLoc")]
    pub queue_loc: String,
    #[serde(rename = "StartTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "HeartBeatTS")]
    pub heartbeat_ts: DateTime<Utc>,
}
