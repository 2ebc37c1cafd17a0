//! Task progress tracker.
//!
//! Keeps the registry of sub-tasks for one session and derives the
//! overall percentage. Search tasks are announced up front by
//! `search_start` and complete in any order. Pseudo-tasks (resume parsing,
//! photo upload, report synthesis) appear when their own step first shows
//! up.
//!
//! # Percent bands
//!
//! ```text
//! 0 ..= 90   search tasks, round(completed / total * 90)
//! 92         server-side synthesis running
//! 100        result received
//! ```
//!
//! The bar never reaches 100 before the result event, and never moves
//! backwards.

use crate::event::{PhaseUpdate, StatusEvent, StepState, TaskSpec};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Upper bound of the search band.
pub const SEARCH_BAND_PERCENT: u8 = 90;
/// Marker shown while the server synthesizes the report.
pub const ANALYSIS_PERCENT: u8 = 92;
pub const COMPLETE_PERCENT: u8 = 100;

pub const RESUME_PARSE_ID: &str = "resume_parse";
pub const PHOTO_UPLOAD_ID: &str = "photo_upload";
pub const ANALYSIS_ID: &str = "analyzing";

const READY_TEXT: &str = "Report ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }

    /// Whether moving to `next` goes forward along pending -> running -> done|failed.
    fn can_advance_to(self, next: TaskState) -> bool {
        match self {
            TaskState::Pending => next != TaskState::Pending,
            TaskState::Running => next.is_terminal(),
            TaskState::Done | TaskState::Failed => false,
        }
    }
}

impl From<StepState> for TaskState {
    fn from(state: StepState) -> Self {
        match state {
            StepState::Running => TaskState::Running,
            StepState::Done => TaskState::Done,
            StepState::Failed => TaskState::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Announced by `search_start`; counts toward the percentage.
    Search,
    /// Resume parsing or photo upload.
    Phase,
    /// Report synthesis; resolved only by the result event.
    Synthesis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEntry {
    pub id: String,
    pub label: String,
    pub state: TaskState,
    pub detail: Option<String>,
    pub kind: TaskKind,
}

impl TaskEntry {
    fn new(id: &str, label: &str, state: TaskState, kind: TaskKind) -> Self {
        let label = if label.is_empty() { id } else { label };
        Self {
            id: id.to_string(),
            label: label.to_string(),
            state,
            detail: None,
            kind,
        }
    }
}

/// Snapshot handed to sinks. Only the latest one matters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProgressState {
    pub percent: u8,
    pub status_text: String,
    pub tasks: Vec<TaskEntry>,
}

impl ProgressState {
    pub fn task(&self, id: &str) -> Option<&TaskEntry> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// Registry of task entries keyed by the server-provided id.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    entries: HashMap<String, TaskEntry>,
    /// Visible order: phases first, then search tasks, then synthesis.
    order: VecDeque<String>,
    percent: u8,
    status_text: String,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn entry(&self, id: &str) -> Option<&TaskEntry> {
        self.entries.get(id)
    }

    /// Apply one status event. Returns whether the visible state changed.
    pub fn apply(&mut self, event: &StatusEvent) -> bool {
        match event {
            StatusEvent::SearchStart { label, tasks, .. } => self.start_search(label, tasks),
            StatusEvent::TaskDone {
                task_id,
                label,
                state,
                detail,
                completed,
                total,
            } => self.complete_task(task_id, label, *state, detail.as_deref(), *completed, *total),
            StatusEvent::ResumeParse(update) => self.update_phase(RESUME_PARSE_ID, update),
            StatusEvent::PhotoUpload(update) => self.update_phase(PHOTO_UPLOAD_ID, update),
            StatusEvent::Analyzing { label } => self.start_analysis(label),
            StatusEvent::Unrecognized => {
                debug!("Ignoring unrecognized status step");
                false
            }
        }
    }

    /// Result arrived: resolve synthesis and fill the bar.
    pub fn finish(&mut self) -> ProgressState {
        for entry in self.entries.values_mut() {
            if entry.kind == TaskKind::Synthesis && !entry.state.is_terminal() {
                entry.state = TaskState::Done;
            }
        }
        self.percent = COMPLETE_PERCENT;
        self.status_text = READY_TEXT.to_string();
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressState {
        ProgressState {
            percent: self.percent,
            status_text: self.status_text.clone(),
            tasks: self
                .order
                .iter()
                .filter_map(|id| self.entries.get(id))
                .cloned()
                .collect(),
        }
    }

    fn start_search(&mut self, label: &str, tasks: &[TaskSpec]) -> bool {
        // A repeated announcement replaces the search registry; pseudo-tasks stay.
        self.entries.retain(|_, e| e.kind != TaskKind::Search);
        let entries = &self.entries;
        self.order.retain(|id| entries.contains_key(id));

        let synthesis_at = self
            .order
            .iter()
            .position(|id| self.entries.get(id).map(|e| e.kind) == Some(TaskKind::Synthesis))
            .unwrap_or(self.order.len());
        let mut insert_at = synthesis_at;

        for spec in tasks {
            if self.entries.contains_key(&spec.id) {
                debug!(task_id = %spec.id, "Skipping duplicate task id");
                continue;
            }
            let entry = TaskEntry::new(&spec.id, &spec.label, TaskState::Running, TaskKind::Search);
            self.entries.insert(spec.id.clone(), entry);
            self.order.insert(insert_at, spec.id.clone());
            insert_at += 1;
        }

        self.status_text = label.to_string();
        true
    }

    fn complete_task(
        &mut self,
        task_id: &str,
        label: &str,
        state: StepState,
        detail: Option<&str>,
        completed: Option<u32>,
        total: Option<u32>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(task_id) else {
            debug!(task_id, "Completion for unregistered task");
            return false;
        };
        let next = TaskState::from(state);
        if entry.kind != TaskKind::Search || !next.is_terminal() || !entry.state.can_advance_to(next) {
            debug!(task_id, ?next, current = ?entry.state, "Ignoring task update");
            return false;
        }

        entry.state = next;
        entry.detail = detail.map(str::to_string);
        if !label.is_empty() {
            entry.label = label.to_string();
        }

        let (finished, registered) = self.search_counts();
        let completed = completed.unwrap_or(finished);
        let total = total.unwrap_or(registered);
        if total > 0 {
            let ratio = f64::from(completed.min(total)) / f64::from(total);
            let derived = (ratio * f64::from(SEARCH_BAND_PERCENT)).round() as u8;
            self.percent = self.percent.max(derived.min(SEARCH_BAND_PERCENT));
            self.status_text = format!("{}/{} sources checked", completed.min(total), total);
        }
        true
    }

    fn update_phase(&mut self, id: &str, update: &PhaseUpdate) -> bool {
        let next = TaskState::from(update.state);
        match self.entries.get_mut(id) {
            Some(entry) => {
                if entry.state == next {
                    if update.label.is_empty() || entry.label == update.label {
                        return false;
                    }
                } else if !entry.state.can_advance_to(next) {
                    debug!(task_id = id, ?next, current = ?entry.state, "Ignoring phase regression");
                    return false;
                }
                entry.state = next;
                if !update.label.is_empty() {
                    entry.label = update.label.clone();
                }
                if update.detail.is_some() {
                    entry.detail = update.detail.clone();
                }
            }
            None => {
                let mut entry = TaskEntry::new(id, &update.label, next, TaskKind::Phase);
                entry.detail = update.detail.clone();
                self.entries.insert(id.to_string(), entry);
                self.order.push_front(id.to_string());
            }
        }
        if !update.label.is_empty() {
            self.status_text = update.label.clone();
        }
        true
    }

    fn start_analysis(&mut self, label: &str) -> bool {
        let mut changed = false;
        if !self.entries.contains_key(ANALYSIS_ID) {
            let entry = TaskEntry::new(ANALYSIS_ID, label, TaskState::Running, TaskKind::Synthesis);
            self.entries.insert(ANALYSIS_ID.to_string(), entry);
            self.order.push_back(ANALYSIS_ID.to_string());
            changed = true;
        }
        if self.percent < ANALYSIS_PERCENT {
            self.percent = ANALYSIS_PERCENT;
            changed = true;
        }
        if !label.is_empty() && self.status_text != label {
            self.status_text = label.to_string();
            changed = true;
        }
        changed
    }

    /// (finished, registered) over search tasks.
    fn search_counts(&self) -> (u32, u32) {
        self.entries
            .values()
            .filter(|e| e.kind == TaskKind::Search)
            .fold((0, 0), |(finished, registered), e| {
                (finished + u32::from(e.state.is_terminal()), registered + 1)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, label: &str) -> TaskSpec {
        TaskSpec {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    fn search_start(ids: &[(&str, &str)]) -> StatusEvent {
        StatusEvent::SearchStart {
            label: format!("Launching {} concurrent searches...", ids.len()),
            tasks: ids.iter().map(|(id, label)| spec(id, label)).collect(),
            total: Some(ids.len() as u32),
        }
    }

    fn task_done(id: &str, state: StepState, completed: Option<u32>, total: Option<u32>) -> StatusEvent {
        StatusEvent::TaskDone {
            task_id: id.to_string(),
            label: String::new(),
            state,
            detail: Some("3 results".to_string()),
            completed,
            total,
        }
    }

    fn phase(state: StepState, label: &str) -> PhaseUpdate {
        PhaseUpdate {
            label: label.to_string(),
            state,
            detail: None,
        }
    }

    #[test]
    fn test_search_start_registers_running_tasks() {
        let mut tracker = ProgressTracker::new();
        assert!(tracker.apply(&search_start(&[("gh:1", "GitHub"), ("li:1", "LinkedIn")])));

        let state = tracker.snapshot();
        assert_eq!(state.percent, 0);
        assert_eq!(state.status_text, "Launching 2 concurrent searches...");
        let ids: Vec<_> = state.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["gh:1", "li:1"]);
        assert!(state.tasks.iter().all(|t| t.state == TaskState::Running));
    }

    #[test]
    fn test_out_of_order_completion() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&search_start(&[("a", "A"), ("b", "B"), ("c", "C")]));

        tracker.apply(&task_done("c", StepState::Done, Some(1), Some(3)));
        assert_eq!(tracker.percent(), 30);
        tracker.apply(&task_done("a", StepState::Failed, Some(2), Some(3)));
        assert_eq!(tracker.percent(), 60);
        tracker.apply(&task_done("b", StepState::Done, Some(3), Some(3)));
        assert_eq!(tracker.percent(), 90);

        assert_eq!(tracker.entry("a").unwrap().state, TaskState::Failed);
        assert_eq!(tracker.entry("c").unwrap().detail.as_deref(), Some("3 results"));
        assert_eq!(tracker.snapshot().status_text, "3/3 sources checked");
    }

    #[test]
    fn test_duplicate_completion_is_noop() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&search_start(&[("a", "A"), ("b", "B")]));
        assert!(tracker.apply(&task_done("a", StepState::Done, Some(1), Some(2))));
        let before = tracker.snapshot();

        assert!(!tracker.apply(&task_done("a", StepState::Failed, Some(2), Some(2))));
        assert_eq!(tracker.snapshot(), before);
    }

    #[test]
    fn test_unknown_task_is_noop() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&search_start(&[("a", "A")]));
        assert!(!tracker.apply(&task_done("zzz", StepState::Done, Some(1), Some(1))));
        assert_eq!(tracker.percent(), 0);
    }

    #[test]
    fn test_missing_counts_derived_from_registry() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&search_start(&[("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")]));
        tracker.apply(&task_done("b", StepState::Done, None, None));
        assert_eq!(tracker.percent(), 23);
    }

    #[test]
    fn test_counts_never_push_past_search_band() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&search_start(&[("a", "A")]));
        tracker.apply(&task_done("a", StepState::Done, Some(5), Some(1)));
        assert_eq!(tracker.percent(), SEARCH_BAND_PERCENT);
    }

    #[test]
    fn test_percent_never_decreases() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&search_start(&[("a", "A"), ("b", "B")]));
        tracker.apply(&task_done("a", StepState::Done, Some(2), Some(2)));
        assert_eq!(tracker.percent(), 90);
        // Server miscounts on the second completion.
        tracker.apply(&task_done("b", StepState::Done, Some(1), Some(2)));
        assert_eq!(tracker.percent(), 90);
    }

    #[test]
    fn test_phases_are_prepended_and_updated_in_place() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&StatusEvent::ResumeParse(phase(StepState::Running, "Parsing resume...")));
        tracker.apply(&StatusEvent::PhotoUpload(phase(StepState::Running, "Uploading photo...")));
        tracker.apply(&search_start(&[("a", "A")]));
        tracker.apply(&StatusEvent::ResumeParse(PhaseUpdate {
            label: "Resume parsed".to_string(),
            state: StepState::Done,
            detail: Some("12 skills, 3 roles extracted".to_string()),
        }));

        let state = tracker.snapshot();
        let ids: Vec<_> = state.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, [PHOTO_UPLOAD_ID, RESUME_PARSE_ID, "a"]);
        let resume = state.task(RESUME_PARSE_ID).unwrap();
        assert_eq!(resume.state, TaskState::Done);
        assert_eq!(resume.label, "Resume parsed");
        assert_eq!(state.percent, 0);
    }

    #[test]
    fn test_phase_does_not_regress() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&StatusEvent::PhotoUpload(phase(StepState::Failed, "Photo upload failed")));
        assert!(!tracker.apply(&StatusEvent::PhotoUpload(phase(StepState::Running, "Uploading photo..."))));
        assert_eq!(tracker.entry(PHOTO_UPLOAD_ID).unwrap().state, TaskState::Failed);
    }

    #[test]
    fn test_search_restart_keeps_phases() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&StatusEvent::ResumeParse(phase(StepState::Done, "Resume parsed")));
        tracker.apply(&search_start(&[("a", "A"), ("b", "B")]));
        tracker.apply(&search_start(&[("c", "C")]));

        let ids: Vec<_> = tracker.snapshot().tasks.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, [RESUME_PARSE_ID, "c"]);
        assert!(tracker.entry("a").is_none());
    }

    #[test]
    fn test_analysis_and_finish() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&search_start(&[("a", "A")]));
        tracker.apply(&task_done("a", StepState::Done, Some(1), Some(1)));
        assert!(tracker.apply(&StatusEvent::Analyzing {
            label: "AI analyzing all data...".to_string()
        }));

        let state = tracker.snapshot();
        assert_eq!(state.percent, ANALYSIS_PERCENT);
        assert_eq!(state.tasks.last().unwrap().id, ANALYSIS_ID);
        assert_eq!(state.tasks.last().unwrap().state, TaskState::Running);

        let done = tracker.finish();
        assert_eq!(done.percent, 100);
        assert_eq!(done.status_text, "Report ready");
        assert_eq!(done.task(ANALYSIS_ID).unwrap().state, TaskState::Done);
    }

    #[test]
    fn test_unrecognized_step_ignored() {
        let mut tracker = ProgressTracker::new();
        assert!(!tracker.apply(&StatusEvent::Unrecognized));
        assert_eq!(tracker.snapshot(), ProgressState::default());
    }
}
