//! Typed events decoded from raw frames.
//!
//! Only two frame types matter: `status` (zero or more progress
//! notifications) and `result` (the terminal report). Anything else is
//! ignored, and a frame whose JSON does not parse is dropped without
//! ending the session.

use crate::error::DecodeError;
use crate::frame::RawRecord;
use crate::report::{nullable, BackgroundReport};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

pub const STATUS_EVENT: &str = "status";
pub const RESULT_EVENT: &str = "result";

/// A decoded event, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(StatusEvent),
    Result(Box<BackgroundReport>),
}

/// Progress notification, tagged by its `step` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Announces every search task up front.
    SearchStart {
        #[serde(default, deserialize_with = "nullable")]
        label: String,
        #[serde(default, deserialize_with = "nullable")]
        tasks: Vec<TaskSpec>,
        #[serde(default)]
        total: Option<u32>,
    },

    /// One search task finished, in whatever order the server saw it.
    TaskDone {
        task_id: String,
        #[serde(default, deserialize_with = "nullable")]
        label: String,
        #[serde(default, deserialize_with = "nullable")]
        state: StepState,
        #[serde(default, deserialize_with = "non_blank")]
        detail: Option<String>,
        #[serde(default)]
        completed: Option<u32>,
        #[serde(default)]
        total: Option<u32>,
    },

    ResumeParse(PhaseUpdate),

    PhotoUpload(PhaseUpdate),

    /// Server-side report synthesis began. It has no completion event.
    Analyzing {
        #[serde(default, deserialize_with = "nullable")]
        label: String,
    },

    #[serde(other)]
    Unrecognized,
}

/// Update for a pre-search phase (resume parsing, photo upload).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhaseUpdate {
    #[serde(default, deserialize_with = "nullable")]
    pub label: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: StepState,
    #[serde(default, deserialize_with = "non_blank")]
    pub detail: Option<String>,
}

/// A search task announced by `search_start`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub label: String,
}

/// Step state as sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    #[default]
    Running,
    Done,
    #[serde(alias = "error")]
    Failed,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Done | StepState::Failed)
    }
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Classify one raw record.
pub fn try_decode(record: &RawRecord) -> Result<StreamEvent, DecodeError> {
    let json_error = |source| DecodeError::Json {
        event_type: record.event_type.clone(),
        source,
    };
    match record.event_type.as_str() {
        STATUS_EVENT => serde_json::from_str(&record.data)
            .map(StreamEvent::Status)
            .map_err(json_error),
        RESULT_EVENT => serde_json::from_str(&record.data)
            .map(|report| StreamEvent::Result(Box::new(report)))
            .map_err(json_error),
        other => Err(DecodeError::UnknownType(other.to_string())),
    }
}

/// Fail-soft decode: problems are logged and the record is dropped.
pub fn decode(record: &RawRecord) -> Option<StreamEvent> {
    match try_decode(record) {
        Ok(event) => Some(event),
        Err(DecodeError::UnknownType(event_type)) => {
            debug!(event_type = %event_type, "Ignoring event");
            None
        }
        Err(err) => {
            warn!(error = %err, "Dropping malformed event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(data: &str) -> StatusEvent {
        match try_decode(&RawRecord::new("status", data)).unwrap() {
            StreamEvent::Status(event) => event,
            other => panic!("expected status event, got {:?}", other),
        }
    }

    #[test]
    fn test_search_start() {
        let event = status(
            r#"{"step":"search_start","label":"Launching 2 concurrent searches...","state":"running",
                "total":2,"completed":0,
                "tasks":[{"id":"gh:1","label":"GitHub","state":"running"},{"id":"li:1","label":"LinkedIn"}]}"#,
        );
        match event {
            StatusEvent::SearchStart { tasks, total, .. } => {
                assert_eq!(total, Some(2));
                assert_eq!(tasks.len(), 2);
                assert_eq!(tasks[0].id, "gh:1");
                assert_eq!(tasks[1].label, "LinkedIn");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_task_done_error_state_is_failed() {
        let event = status(
            r#"{"step":"task_done","task_id":"news:company:Acme","label":"News: Acme",
                "state":"error","detail":"","completed":3,"total":9}"#,
        );
        assert_eq!(
            event,
            StatusEvent::TaskDone {
                task_id: "news:company:Acme".to_string(),
                label: "News: Acme".to_string(),
                state: StepState::Failed,
                detail: None,
                completed: Some(3),
                total: Some(9),
            }
        );
    }

    #[test]
    fn test_phase_update() {
        let event = status(
            r#"{"step":"resume_parse","label":"Resume parsed","state":"done","detail":"12 skills, 3 roles extracted"}"#,
        );
        match event {
            StatusEvent::ResumeParse(update) => {
                assert_eq!(update.state, StepState::Done);
                assert_eq!(update.detail.as_deref(), Some("12 skills, 3 roles extracted"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_step_is_not_an_error() {
        assert_eq!(
            status(r#"{"step":"warming_up","label":"x"}"#),
            StatusEvent::Unrecognized
        );
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let event = status(r#"{"step":"analyzing","label":null,"state":null}"#);
        assert_eq!(
            event,
            StatusEvent::Analyzing {
                label: String::new()
            }
        );
    }

    #[test]
    fn test_malformed_json_is_dropped() {
        let record = RawRecord::new("status", "{\"step\": \"task_done\",");
        assert!(matches!(try_decode(&record), Err(DecodeError::Json { .. })));
        assert!(decode(&record).is_none());
    }

    #[test]
    fn test_task_done_without_id_is_dropped() {
        let record = RawRecord::new("status", r#"{"step":"task_done","state":"done"}"#);
        assert!(decode(&record).is_none());
    }

    #[test]
    fn test_other_types_ignored() {
        let record = RawRecord::new("message", "{}");
        assert!(matches!(
            try_decode(&record),
            Err(DecodeError::UnknownType(ref t)) if t == "message"
        ));
        assert!(decode(&record).is_none());
    }

    #[test]
    fn test_result_event() {
        let record = RawRecord::new("result", r#"{"name":"Jane Doe","verdict":{"rating":"caution","score":62}}"#);
        match decode(&record) {
            Some(StreamEvent::Result(report)) => {
                assert_eq!(report.name, "Jane Doe");
                assert!(report.verdict.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
