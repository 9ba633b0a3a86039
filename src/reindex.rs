//!
//! Reindex notifier
//! ----------------
//! Fire-and-forget signalling to the search index after every mutating file
//! operation. Jobs are handed to a bounded in-process channel and forwarded
//! to the external task queue's "indexing" channel by a background task; the
//! triggering operation never waits on, retries, or inspects the outcome.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::clients::TaskQueue;

/// Queue channel the external consumer reads reindex jobs from.
pub const INDEXING_CHANNEL: &str = "indexing";

/// Task name understood by the external queue consumer.
pub const REINDEX_TASK: &str = "reindex_files";

/// A deferred index refresh for one node of the file tree.
/// `levels` bounds how many directory levels below `file_id` the refresh
/// traverses; `None` means just this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexJob {
    pub username: String,
    pub file_id: String,
    pub levels: Option<u32>,
}

/// Cheap cloneable handle used by adapters to enqueue reindex jobs.
#[derive(Clone)]
pub struct ReindexNotifier {
    tx: mpsc::Sender<ReindexJob>,
    username: String,
}

impl ReindexNotifier {
    /// Create a notifier whose jobs are forwarded to `queue` by a spawned
    /// background task. `username` is the service identity stamped onto
    /// every job.
    pub fn spawn(queue: Arc<dyn TaskQueue>, username: impl Into<String>, capacity: usize) -> Self {
        let (notifier, mut rx) = Self::channel(username, capacity);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let payload = json!({
                    "username": job.username,
                    "file_id": job.file_id,
                    "levels": job.levels,
                });
                match queue.submit(INDEXING_CHANNEL, REINDEX_TASK, &payload).await {
                    Ok(()) => debug!(file_id = %job.file_id, levels = ?job.levels, "reindex job submitted"),
                    // Reindex failures never affect the primary operation.
                    Err(e) => warn!(file_id = %job.file_id, "reindex submission failed: {}", e),
                }
            }
        });
        notifier
    }

    /// Channel-only constructor; the caller owns the receiving end. Used by
    /// tests to observe exactly which jobs an operation enqueued.
    pub fn channel(username: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<ReindexJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, username: username.into() }, rx)
    }

    /// Hand a job to the outbound channel. Returns immediately; a full or
    /// closed channel is logged and dropped, never surfaced to the caller.
    pub fn notify(&self, file_id: &str, levels: Option<u32>) {
        let job = ReindexJob { username: self.username.clone(), file_id: file_id.to_string(), levels };
        if let Err(e) = self.tx.try_send(job) {
            warn!(file_id = %file_id, "reindex job dropped: {}", e);
        }
    }

    /// Build the `{system}/{path}` file-id the index consumer expects.
    /// The root path yields `{system}/`.
    pub fn file_id(system: &str, path: &str) -> String {
        let norm = crate::paths::normalize(path);
        if norm == crate::paths::ROOT {
            format!("{}/", system)
        } else {
            format!("{}/{}", system, norm)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_normalizes_path_and_keeps_root_marker() {
        assert_eq!(ReindexNotifier::file_id("sys1", "/a/b/"), "sys1/a/b");
        assert_eq!(ReindexNotifier::file_id("sys1", "/"), "sys1/");
    }

    #[tokio::test]
    async fn notify_is_nonblocking_and_ordered() {
        let (notifier, mut rx) = ReindexNotifier::channel("depot_admin", 8);
        notifier.notify("sys1/a", Some(1));
        notifier.notify("sys1/b", None);
        let first = rx.try_recv().unwrap();
        assert_eq!(first.file_id, "sys1/a");
        assert_eq!(first.levels, Some(1));
        assert_eq!(first.username, "depot_admin");
        assert_eq!(rx.try_recv().unwrap().file_id, "sys1/b");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (notifier, mut rx) = ReindexNotifier::channel("depot_admin", 1);
        notifier.notify("sys1/a", None);
        notifier.notify("sys1/b", None);
        assert_eq!(rx.try_recv().unwrap().file_id, "sys1/a");
        assert!(rx.try_recv().is_err());
    }
}
