use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc::UnboundedSender;

use crate::{batch::BatchProgress, blocks::ContentId};

/// Notifications about compiled-cache changes, for outer layers that forward them (push
/// invalidation to clients, analytics, operator views).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEvent {
    /// Content id, number of blocks stored
    Compiled(ContentId, usize),
    /// The entry for this content id was removed
    Invalidated(ContentId),
    /// Snapshot after a batch transition
    BatchProgress(BatchProgress),
}

impl Display for CacheEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CacheEvent::Compiled(id, count) => write!(f, "Compiled({id}, {count} blocks)"),
            CacheEvent::Invalidated(id) => write!(f, "Invalidated({id})"),
            CacheEvent::BatchProgress(progress) => write!(
                f,
                "BatchProgress({}: {}/{})",
                progress.status, progress.compiled, progress.total
            ),
        }
    }
}

/// Sends on an optional channel. A dropped receiver is not an error for the sender's caller.
pub(crate) fn emit(tx: &Option<UnboundedSender<CacheEvent>>, event: CacheEvent) {
    if let Some(tx) = tx {
        if let Err(e) = tx.send(event) {
            tracing::warn!("[CacheEvent] receiver closed, dropping {}", e.0);
        }
    }
}
