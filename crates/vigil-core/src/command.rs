//! Per-agent execution envelopes.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::log::LogRecord;

/// Lifecycle state of a command.
///
/// Transitions: `Pending → Failed | Timeout | Succeeded`, exactly once.
/// The terminal state is what the scheduler reconciles against, so every
/// decoded command must eventually be published with one of the three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Failed,
    Timeout,
    Succeeded,
}

/// One agent's execution of an [`Action`]: scheduler-assigned id in, terminal
/// status and module results out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Action")]
    pub action: Action,
    #[serde(rename = "Status", default)]
    pub status: Status,
    /// Module output on success; an error descriptor record on failure.
    #[serde(rename = "Results", default)]
    pub results: serde_json::Value,
    /// Stamped with the agent's identity just before publication.
    #[serde(rename = "AgentQueueLoc", default)]
    pub agent_queue_loc: String,
}

impl Command {
    /// Mark the command failed, carrying `record` as the result payload.
    pub fn reject(mut self, record: &LogRecord) -> Self {
        self.status = Status::Failed;
        self.results = record.to_value();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The literal envelope shape the scheduler sends.
    const HAPPY: &str = r#"{
        "ID": 42,
        "Action": {
            "ID": 7,
            "Name": "integrity sweep",
            "Order": "filechecker",
            "Arguments": {"checks": []},
            "ScheduledDate": "2020-01-01T00:00:00Z",
            "ExpirationDate": "2099-01-01T00:00:00Z",
            "PGPSignature": "<valid>",
            "PGPID": "ABCDEF0123456789"
        }
    }"#;

    #[test]
    fn decodes_the_scheduler_envelope() {
        let cmd: Command = serde_json::from_str(HAPPY).unwrap();
        assert_eq!(cmd.id, 42);
        assert_eq!(cmd.action.id, 7);
        assert_eq!(cmd.action.order, "filechecker");
        assert_eq!(cmd.status, Status::Pending);
        assert!(cmd.agent_queue_loc.is_empty());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let mut cmd: Command = serde_json::from_str(HAPPY).unwrap();
        cmd.status = Status::Succeeded;
        cmd.agent_queue_loc = "linux.agent1".into();
        let v: serde_json::Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["ID"], 42);
        assert_eq!(v["Status"], "succeeded");
        assert_eq!(v["AgentQueueLoc"], "linux.agent1");
        assert_eq!(v["Action"]["PGPID"], "ABCDEF0123456789");
        assert_eq!(v["Action"]["ScheduledDate"], "2020-01-01T00:00:00Z");
    }

    #[test]
    fn status_round_trips_lowercase() {
        for (status, wire) in [
            (Status::Pending, "\"pending\""),
            (Status::Failed, "\"failed\""),
            (Status::Timeout, "\"timeout\""),
            (Status::Succeeded, "\"succeeded\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), wire);
            assert_eq!(serde_json::from_str::<Status>(wire).unwrap(), status);
        }
    }

    #[test]
    fn reject_carries_the_error_record() {
        let cmd: Command = serde_json::from_str(HAPPY).unwrap();
        let record = LogRecord::new("action validation failed")
            .command(42)
            .action(7)
            .err();
        let rejected = cmd.reject(&record);
        assert_eq!(rejected.status, Status::Failed);
        assert_eq!(rejected.results["Desc"], "action validation failed");
        assert_eq!(rejected.results["CommandID"], 42);
    }
}
