//! Terminal sink: drives an indicatif bar and keeps the final outcome.

use backgrounder_stream::{ProgressState, ReportSink, ReportViewModel, SessionError, TaskState};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;

const BAR_TEMPLATE: &str = "{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

pub struct TerminalSink {
    bar: ProgressBar,
    /// Tasks whose terminal state was already printed.
    announced: HashSet<String>,
    report: Option<ReportViewModel>,
    error: Option<SessionError>,
}

impl TerminalSink {
    /// Visible bar on stderr. `hidden` suppresses all drawing (JSON mode).
    pub fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            let style = ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            bar.set_style(style);
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar
        };
        Self {
            bar,
            announced: HashSet::new(),
            report: None,
            error: None,
        }
    }

    pub fn take_report(&mut self) -> Option<ReportViewModel> {
        self.report.take()
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Remove the bar, e.g. after cancellation.
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }

    fn announce_finished(&mut self, state: &ProgressState) {
        for task in &state.tasks {
            let mark = match task.state {
                TaskState::Done => "✓",
                TaskState::Failed => "✗",
                TaskState::Pending | TaskState::Running => continue,
            };
            if !self.announced.insert(task.id.clone()) {
                continue;
            }
            let line = match &task.detail {
                Some(detail) => format!("  {} {} ({})", mark, task.label, detail),
                None => format!("  {} {}", mark, task.label),
            };
            self.bar.println(line);
        }
    }
}

impl ReportSink for TerminalSink {
    fn on_progress(&mut self, state: &ProgressState) {
        self.announce_finished(state);
        self.bar.set_position(u64::from(state.percent));
        self.bar.set_message(state.status_text.clone());
    }

    fn on_report(&mut self, report: ReportViewModel) {
        self.bar.finish_and_clear();
        self.report = Some(report);
    }

    fn on_error(&mut self, error: &SessionError) {
        self.bar.abandon_with_message(error.user_message());
        self.error = Some(error.clone());
    }
}
