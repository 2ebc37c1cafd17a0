//! Background-Check Event Stream Client Core
//!
//! Consumes the server-pushed event stream of a background check and
//! materializes it into state a host can render.
//!
//! # Data flow
//!
//! ```text
//! bytes -> FrameParser -> RawRecord -> decode -> StreamEvent
//!            Status -> ProgressTracker  -> ProgressState   -> sink.on_progress
//!            Result -> materialize      -> ReportViewModel -> sink.on_report
//! ```
//!
//! The [`StreamSession`] owns every piece of mutable state for one check
//! request. Nothing here touches a presentation surface; hosts implement
//! [`ReportSink`].

pub mod cancel;
pub mod error;
pub mod event;
pub mod frame;
pub mod report;
pub mod session;
pub mod tracker;
pub mod view;

pub use cancel::CancellationToken;
pub use error::{DecodeError, SessionError};
pub use event::{decode, PhaseUpdate, StatusEvent, StepState, StreamEvent, TaskSpec};
pub use frame::{FrameParser, RawRecord};
pub use report::BackgroundReport;
pub use session::{ReportSink, SessionOutcome, StreamSession, TracingSink};
pub use tracker::{ProgressState, ProgressTracker, TaskEntry, TaskKind, TaskState};
pub use view::{materialize, ReportViewModel, Section, Tier};
