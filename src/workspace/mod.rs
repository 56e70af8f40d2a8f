//! The workspace session controller: which challenge is open, which service
//! is shown and whether it is up, and what happens to flags the user types
//! or copies.

mod clipboard;
mod controller;
mod error;
mod ledger;
mod lifecycle;
mod prober;
mod store;
mod submission;
mod timer;
mod url_sync;

pub use clipboard::{
    ClipboardError, ClipboardMonitor, ClipboardSource, DetectionMemory, MonitorPhase,
    SystemClipboard,
};
pub use controller::{Collaborators, WorkspaceController, WorkspaceStatus};
pub use error::WorkspaceError;
pub use ledger::{SolveLedger, SolveRecord};
pub use lifecycle::{ContainerLifecycle, NextOutcome};
pub use prober::{ReadinessProber, ReadinessState};
pub use store::{SessionState, SessionStore};
pub use submission::{FlagSubmission, SubmissionView, SubmitPhase};
pub use url_sync::{Route, UrlSynchronizer, WorkspaceTarget};

/// Broadcast to the rest of the app as things happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// A fresh solve, sent in the same step that shows the result
    Solved(SolveRecord),
    /// The workspace wants the app at `path`. `reload` asks for a full route
    /// transition; otherwise only the location changes.
    Navigate { path: String, reload: bool },
}
