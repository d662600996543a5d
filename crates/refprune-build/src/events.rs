//! Progress events and cancellation
//!
//! Events are delivered synchronously and in order: either a single
//! `BaselineFailed`, or for each reference kind a `Progress` message followed
//! by `ReferenceCount`, the per-entry outcomes and `GroupCompleted` for each
//! group, closed by `PackagesResolved` (package pruning only) and `Done`, or
//! by `Cancelled`.

use refprune_document::ReferenceKind;
use refprune_package::FolderRemoval;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Outcome of one trial removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Removing the entry broke the build; it was restored
    Kept,
    /// The project still builds without the entry
    Removed,
}

/// Notification emitted while pruning a project
#[derive(Debug, Clone, PartialEq)]
pub enum PruneEvent {
    /// The untouched project already fails to build (terminal)
    BaselineFailed { project: String, log_path: PathBuf },
    /// Human-readable progress message
    Progress(String),
    /// Number of entries in the group about to be processed
    ReferenceCount { kind: ReferenceKind, count: usize },
    /// One entry was tried
    EntryResolved {
        kind: ReferenceKind,
        name: String,
        decision: Decision,
    },
    /// Package folder handling after a confirmed removal
    PackageFolder(FolderRemoval),
    /// A reference group has been fully processed
    GroupCompleted { kind: ReferenceKind },
    /// The package manifest was synchronized
    PackagesResolved { rewritten: bool },
    /// The run finished
    Done { project: String },
    /// The run stopped on request; the project file holds the last verified state
    Cancelled { project: String },
}

/// Receiver of [`PruneEvent`]s
pub trait PruneObserver {
    fn on_event(&mut self, event: &PruneEvent);
}

impl<F> PruneObserver for F
where
    F: FnMut(&PruneEvent),
{
    fn on_event(&mut self, event: &PruneEvent) {
        self(event)
    }
}

impl PruneObserver for Vec<PruneEvent> {
    fn on_event(&mut self, event: &PruneEvent) {
        self.push(event.clone());
    }
}

impl PruneObserver for Sender<PruneEvent> {
    fn on_event(&mut self, event: &PruneEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PruneObserver for NoopObserver {
    fn on_event(&mut self, _event: &PruneEvent) {}
}

/// Cooperative cancellation flag, shareable across threads
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at its next checkpoint
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());

        std::thread::spawn(move || token.cancel()).join().unwrap();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_vec_observer_records_in_order() {
        let mut events: Vec<PruneEvent> = Vec::new();
        events.on_event(&PruneEvent::Progress("a".into()));
        events.on_event(&PruneEvent::GroupCompleted {
            kind: ReferenceKind::Reference,
        });
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], PruneEvent::Progress("a".into()));
    }

    #[test]
    fn test_sender_observer_survives_dropped_receiver() {
        let (mut tx, rx) = mpsc::channel();
        tx.on_event(&PruneEvent::Progress("first".into()));
        assert_eq!(rx.recv().unwrap(), PruneEvent::Progress("first".into()));
        drop(rx);
        tx.on_event(&PruneEvent::Progress("ignored".into()));
    }

    #[test]
    fn test_closure_observer() {
        let mut count = 0;
        let mut observer = |_: &PruneEvent| count += 1;
        observer.on_event(&PruneEvent::Progress("x".into()));
        observer.on_event(&PruneEvent::Progress("y".into()));
        assert_eq!(count, 2);
    }
}
