//! In-memory arbitrated-set.

use crate::ArbitratedStore;
use oracle_types::Uid;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Process-local [`ArbitratedStore`]. Entries live as long as the store.
#[derive(Debug, Default)]
pub struct InMemoryArbitratedStore {
    arbitrated: Mutex<HashSet<Uid>>,
}

impl InMemoryArbitratedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded uids, in no particular order.
    pub fn uids(&self) -> Vec<Uid> {
        self.arbitrated.lock().iter().copied().collect()
    }
}

impl ArbitratedStore for InMemoryArbitratedStore {
    fn contains(&self, uid: &Uid) -> bool {
        self.arbitrated.lock().contains(uid)
    }

    fn insert(&self, uid: Uid) -> bool {
        self.arbitrated.lock().insert(uid)
    }

    fn len(&self) -> usize {
        self.arbitrated.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let store = InMemoryArbitratedStore::new();
        let uid = Uid::repeat_byte(1);

        assert!(store.is_empty());
        assert!(store.insert(uid));
        assert!(!store.insert(uid));
        assert!(store.contains(&uid));
        assert!(!store.contains(&Uid::repeat_byte(2)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.uids(), vec![uid]);
    }
}
