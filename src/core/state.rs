//! Shared snapshot store between the sampling and rendering cadences

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::snapshot::Snapshot;

/// Holds the single current snapshot.
///
/// Publishing swaps an `Arc` under a write lock held only for the swap itself,
/// so readers never see a partially assembled snapshot and never wait on a
/// sampling call. Each published sequence number is broadcast to subscribers.
pub struct SnapshotStore {
    current: Arc<RwLock<Arc<Snapshot>>>,
    change_tx: broadcast::Sender<u64>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            current: Arc::new(RwLock::new(Arc::new(Snapshot::placeholder()))),
            change_tx,
        }
    }

    /// Subscribe to "snapshot updated" notifications carrying the new sequence number
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.change_tx.subscribe()
    }

    /// Replace the current snapshot.
    ///
    /// Returns `false` and keeps the current snapshot when `snapshot` is not
    /// newer, so readers never observe the sequence going backwards.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> bool {
        let sequence = snapshot.sequence;
        {
            let mut current = self.current.write();
            if sequence <= current.sequence {
                tracing::warn!(
                    sequence,
                    current = current.sequence,
                    "dropping out-of-order snapshot"
                );
                return false;
            }
            *current = snapshot;
        }
        // No subscribers is fine
        let _ = self.change_tx.send(sequence);
        true
    }

    /// Latest published snapshot, or the sequence 0 placeholder
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SnapshotStore {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            change_tx: self.change_tx.clone(),
        }
    }
}
