//! Pending-operations queue
//!
//! An ordered list of [`SyncItem`]s awaiting replay. Items are appended on
//! connectivity failures and removed one at a time as the server confirms
//! or refuses them. The engine persists the queue after every change as a
//! JSON array under [`keys::PENDING`].

use tracing::warn;

use phototag_core::domain::SyncItem;
use phototag_core::ports::{keys, ILocalStore};

/// FIFO of unconfirmed mutations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingQueue {
    items: Vec<SyncItem>,
}

impl PendingQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the queue from the store
    ///
    /// A missing key yields an empty queue. An unreadable value is logged
    /// and discarded rather than blocking startup.
    pub async fn load(store: &dyn ILocalStore) -> anyhow::Result<Self> {
        let Some(bytes) = store.get(keys::PENDING).await? else {
            return Ok(Self::new());
        };
        match serde_json::from_slice::<Vec<SyncItem>>(&bytes) {
            Ok(items) => Ok(Self { items }),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable pending queue");
                Ok(Self::new())
            }
        }
    }

    /// Writes the queue to the store
    pub async fn save(&self, store: &dyn ILocalStore) -> anyhow::Result<()> {
        store.put(keys::PENDING, &self.to_json()?).await
    }

    /// Serializes the queue to its JSON form
    pub fn to_json(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.items)?)
    }

    /// Appends an item
    pub fn push(&mut self, item: SyncItem) {
        self.items.push(item);
    }

    /// Removes the first item equal to `item`
    ///
    /// Later entries for the same slot are left in place. Returns true if
    /// an item was removed.
    pub fn remove_first(&mut self, item: &SyncItem) -> bool {
        match self.items.iter().position(|queued| queued == item) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the queued items in replay order
    pub fn snapshot(&self) -> Vec<SyncItem> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phototag_core::domain::SyncOperation;
    use phototag_store::MemoryLocalStore;

    #[test]
    fn test_remove_first_keeps_later_duplicates() {
        let mut queue = PendingQueue::new();
        queue.push(SyncItem::new(2, SyncOperation::Update));
        queue.push(SyncItem::new(0, SyncOperation::New));
        queue.push(SyncItem::new(2, SyncOperation::Update));

        assert!(queue.remove_first(&SyncItem::new(2, SyncOperation::Update)));
        assert_eq!(
            queue.snapshot(),
            vec![
                SyncItem::new(0, SyncOperation::New),
                SyncItem::new(2, SyncOperation::Update)
            ]
        );
        assert!(!queue.remove_first(&SyncItem::new(2, SyncOperation::New)));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryLocalStore::new();
        let mut queue = PendingQueue::new();
        queue.push(SyncItem::new(1, SyncOperation::UpdateTagsOrDelete));
        queue.save(&store).await.unwrap();

        let raw = store.get(keys::PENDING).await.unwrap().unwrap();
        assert_eq!(raw, br#"[{"id":1,"operation":"UPDATE_TAGS_OR_DELETE"}]"#);

        let loaded = PendingQueue::load(&store).await.unwrap();
        assert_eq!(loaded, queue);
    }

    #[tokio::test]
    async fn test_load_missing_or_garbage_is_empty() {
        let store = MemoryLocalStore::new();
        assert!(PendingQueue::load(&store).await.unwrap().is_empty());

        store.put(keys::PENDING, b"not json").await.unwrap();
        assert!(PendingQueue::load(&store).await.unwrap().is_empty());
    }
}
