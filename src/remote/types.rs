//! Wire types for the remote n8n REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paginated response envelope used by every n8n collection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// A workflow as returned by `GET /api/v1/workflows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, rename = "isArchived")]
    pub is_archived: bool,
    #[serde(default)]
    pub nodes: Vec<RemoteNode>,
    #[serde(default)]
    pub connections: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<RemoteTag>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteWorkflow {
    /// Number of nodes in the workflow graph.
    pub fn node_count(&self) -> i32 {
        self.nodes.len() as i32
    }

    /// Number of source nodes with outgoing connections.
    pub fn connection_count(&self) -> i32 {
        self.connections.len() as i32
    }

    /// Tag names, lowercased for heuristic matching.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.to_lowercase()).collect()
    }
}

/// A single node inside a workflow definition. Only the fields the sync
/// pipeline cares about are deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteNode {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub node_type: String,
}

/// A workflow tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: Option<String>,
    pub name: String,
}

/// An n8n instance user, from the optional `GET /api/v1/users` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteUser {
    pub id: Option<String>,
    pub email: Option<String>,
}

/// An instance variable, from the optional `GET /api/v1/variables` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteVariable {
    pub id: Option<String>,
    pub key: Option<String>,
}

/// An execution as returned by `GET /api/v1/executions`.
///
/// The `data` blob is only present when the listing is fetched with
/// `includeData=true`; it carries the run's result payload, including the
/// error detail for failed executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExecution {
    pub id: String,
    pub workflow_id: String,
    pub status: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub finished: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "retryOf")]
    pub retry_of: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Terminal and non-terminal execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Error,
    Canceled,
    Crashed,
    Waiting,
    Running,
    New,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Canceled => "canceled",
            ExecutionStatus::Crashed => "crashed",
            ExecutionStatus::Waiting => "waiting",
            ExecutionStatus::Running => "running",
            ExecutionStatus::New => "new",
        }
    }

    /// Whether the execution has reached a terminal state.
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success
                | ExecutionStatus::Error
                | ExecutionStatus::Canceled
                | ExecutionStatus::Crashed
        )
    }

    fn from_remote(value: &str) -> Option<Self> {
        match value {
            "success" => Some(ExecutionStatus::Success),
            "error" | "failed" => Some(ExecutionStatus::Error),
            "canceled" | "cancelled" => Some(ExecutionStatus::Canceled),
            "crashed" => Some(ExecutionStatus::Crashed),
            "waiting" => Some(ExecutionStatus::Waiting),
            "running" => Some(ExecutionStatus::Running),
            "new" => Some(ExecutionStatus::New),
            _ => None,
        }
    }
}

impl RemoteExecution {
    /// Resolve the effective status of this execution.
    ///
    /// Older n8n versions omit the `status` field, so it is inferred from the
    /// lifecycle flags when absent: an explicit status wins, then the
    /// `finished` flag, then a `stoppedAt` without success marks an error, a
    /// start without a stop means still running, and an execution that never
    /// started is new.
    pub fn effective_status(&self) -> ExecutionStatus {
        if let Some(status) = self.status.as_deref()
            && let Some(parsed) = ExecutionStatus::from_remote(status)
        {
            return parsed;
        }

        if self.finished {
            return ExecutionStatus::Success;
        }

        if self.stopped_at.is_some() {
            return ExecutionStatus::Error;
        }

        if self.started_at.is_some() {
            return ExecutionStatus::Running;
        }

        ExecutionStatus::New
    }

    /// Execution mode, defaulting to `trigger` when the field is absent.
    pub fn mode_str(&self) -> &str {
        self.mode.as_deref().unwrap_or("trigger")
    }

    /// Wall-clock duration in milliseconds, when both timestamps are present.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => {
                let ms = (stop - start).num_milliseconds();
                (ms >= 0).then_some(ms)
            }
            _ => None,
        }
    }

    /// The run's error message, buried in the result payload of failed
    /// executions.
    pub fn error_summary(&self) -> Option<&str> {
        self.data
            .as_ref()?
            .pointer("/resultData/error/message")?
            .as_str()
    }

    /// Serialized size of the result payload, when one was fetched.
    pub fn data_size_bytes(&self) -> Option<i64> {
        let data = self.data.as_ref()?;
        serde_json::to_vec(data).ok().map(|bytes| bytes.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn execution(
        status: Option<&str>,
        finished: bool,
        started: bool,
        stopped: bool,
    ) -> RemoteExecution {
        let start = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        RemoteExecution {
            id: "1".to_string(),
            workflow_id: "wf-1".to_string(),
            status: status.map(str::to_string),
            mode: Some("webhook".to_string()),
            finished,
            started_at: started.then_some(start),
            stopped_at: stopped.then_some(start + chrono::Duration::seconds(3)),
            retry_of: None,
            data: None,
        }
    }

    #[test]
    fn explicit_status_wins_over_flags() {
        let exec = execution(Some("canceled"), true, true, true);
        assert_eq!(exec.effective_status(), ExecutionStatus::Canceled);
    }

    #[test]
    fn finished_flag_implies_success() {
        let exec = execution(None, true, true, true);
        assert_eq!(exec.effective_status(), ExecutionStatus::Success);
    }

    #[test]
    fn stopped_without_finish_is_error() {
        let exec = execution(None, false, true, true);
        assert_eq!(exec.effective_status(), ExecutionStatus::Error);
    }

    #[test]
    fn started_without_stop_is_running() {
        let exec = execution(None, false, true, false);
        assert_eq!(exec.effective_status(), ExecutionStatus::Running);
        assert!(!exec.effective_status().is_completed());
    }

    #[test]
    fn never_started_is_new() {
        let exec = execution(None, false, false, false);
        assert_eq!(exec.effective_status(), ExecutionStatus::New);
    }

    #[test]
    fn unknown_status_falls_back_to_flags() {
        let exec = execution(Some("mystery"), true, true, true);
        assert_eq!(exec.effective_status(), ExecutionStatus::Success);
    }

    #[test]
    fn duration_requires_both_timestamps() {
        assert_eq!(execution(None, true, true, true).duration_ms(), Some(3_000));
        assert_eq!(execution(None, false, true, false).duration_ms(), None);
    }

    #[test]
    fn error_summary_comes_from_the_result_payload() {
        let mut exec = execution(Some("error"), false, true, true);
        assert_eq!(exec.error_summary(), None);
        assert_eq!(exec.data_size_bytes(), None);

        exec.data = Some(serde_json::json!({
            "resultData": {
                "error": {"message": "connection refused", "name": "NodeApiError"},
                "runData": {"HTTP": []}
            }
        }));
        assert_eq!(exec.error_summary(), Some("connection refused"));
        assert!(exec.data_size_bytes().unwrap() > 0);
    }

    #[test]
    fn workflow_counts_and_tags() {
        let json = serde_json::json!({
            "id": "wf-9",
            "name": "Order Pipeline",
            "active": true,
            "nodes": [
                {"name": "Webhook", "type": "n8n-nodes-base.webhook"},
                {"name": "Set", "type": "n8n-nodes-base.set"}
            ],
            "connections": {"Webhook": {}},
            "tags": [{"id": "t1", "name": "Production"}]
        });
        let wf: RemoteWorkflow = serde_json::from_value(json).unwrap();
        assert_eq!(wf.node_count(), 2);
        assert_eq!(wf.connection_count(), 1);
        assert_eq!(wf.tag_names(), vec!["production"]);
    }
}
