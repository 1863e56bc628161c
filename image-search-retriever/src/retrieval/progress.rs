//! Progress notifications emitted while indexing
//!
//! The indexer reports each file it touches through a [`ProgressSink`].
//! Sinks only observe: they cannot fail and cannot stop the run. Every event
//! renders as one human-readable line, which is what a UI log panel shows.

use std::fmt;
use tokio::sync::mpsc;

/// What happened to one candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Added { id: String },
    Duplicate,
    /// The provider rejected the file (not an image, or the model failed)
    Skipped { reason: String },
    Error { reason: String },
}

/// One line of indexing progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        folder: String,
        candidates: usize,
    },
    /// Records already in the collection, loaded for duplicate detection
    Existing {
        count: usize,
    },
    /// Existing records could not be read; duplicates will not be detected
    DedupDegraded {
        reason: String,
    },
    File {
        /// 1-based position among the candidates
        index: usize,
        total: usize,
        filename: String,
        outcome: Outcome,
    },
    Finished {
        message: String,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Started { folder, candidates } => {
                write!(f, "Found {candidates} image files in {folder}")
            }
            ProgressEvent::Existing { count } => {
                write!(f, "Found {count} existing images in database")
            }
            ProgressEvent::DedupDegraded { reason } => write!(
                f,
                "Warning: could not read existing images ({reason}); duplicates will not be detected"
            ),
            ProgressEvent::File {
                index,
                total,
                filename,
                outcome,
            } => {
                write!(f, "[{index}/{total}] {filename}: ")?;
                match outcome {
                    Outcome::Added { id } => write!(f, "added as {id}"),
                    Outcome::Duplicate => write!(f, "already indexed, skipped"),
                    Outcome::Skipped { reason } => write!(f, "skipped ({reason})"),
                    Outcome::Error { reason } => write!(f, "error ({reason})"),
                }
            }
            ProgressEvent::Finished { message } => f.write_str(message),
        }
    }
}

/// Receiver of indexing progress.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn notify(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn notify(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::DedupDegraded { .. }
            | ProgressEvent::File {
                outcome: Outcome::Error { .. },
                ..
            } => tracing::warn!("{event}"),
            ProgressEvent::File { .. } => tracing::debug!("{event}"),
            _ => tracing::info!("{event}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn notify(&self, _event: &ProgressEvent) {}
}

/// Forwards rendered lines to an unbounded channel, e.g. for streaming to a UI.
///
/// A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn notify(&self, event: &ProgressEvent) {
        let _ = self.sender.send(event.to_string());
    }
}
