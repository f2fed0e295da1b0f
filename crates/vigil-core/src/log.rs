//! Correlated log records.
//!
//! Every task reports through a record queue rather than writing to the sink
//! directly; a record also serves as the error descriptor placed in a failed
//! command's `Results`. Correlators, not arrival order, tie records to
//! commands.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Err,
    Emerg,
}

/// A single log line with optional command/action correlators.
///
/// Zero means "not correlated" and is omitted on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "CommandID", default, skip_serializing_if = "is_zero")]
    pub command_id: u64,
    #[serde(rename = "ActionID", default, skip_serializing_if = "is_zero")]
    pub action_id: u64,
    #[serde(rename = "Desc")]
    pub desc: String,
    #[serde(rename = "Severity", default)]
    pub severity: Severity,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl LogRecord {
    pub fn new(desc: impl Into<String>) -> Self {
        Self {
            command_id: 0,
            action_id: 0,
            desc: desc.into(),
            severity: Severity::Info,
        }
    }

    pub fn command(mut self, id: u64) -> Self {
        self.command_id = id;
        self
    }

    pub fn action(mut self, id: u64) -> Self {
        self.action_id = id;
        self
    }

    pub fn debug(mut self) -> Self {
        self.severity = Severity::Debug;
        self
    }

    pub fn err(mut self) -> Self {
        self.severity = Severity::Err;
        self
    }

    pub fn emerg(mut self) -> Self {
        self.severity = Severity::Emerg;
        self
    }

    /// The record as a JSON value, for embedding in a command's `Results`.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::Value::String(self.desc.clone()))
    }
}
