use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error as ThisError;

pub const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum StoreError {
    #[error("store is full; capacity of {capacity} keys reached")]
    CapacityExceeded { capacity: usize },
}

/// The Store maps keys to values and holds at most `capacity` distinct keys. It never resizes past
/// that and never evicts: a new key that does not fit is rejected.
///
/// The store is not synchronized. The server owns one instance on its event loop thread and every
/// command touches it for the duration of a single, non-yielding dispatch call.
#[derive(Debug)]
pub struct Store {
    entries: HashMap<Bytes, Bytes>,
    capacity: usize,
}

impl Store {
    pub fn new() -> Store {
        Store::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Store {
        Store {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// Inserts `key`, or overwrites its value if it is already present.
    pub fn set(&mut self, key: Bytes, value: Bytes) -> Result<(), StoreError> {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            return Err(StoreError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut store = Store::new();

        store
            .set(Bytes::from("key1"), Bytes::from("value1"))
            .unwrap();

        assert_eq!(store.get(b"key1"), Some(Bytes::from("value1")));
        assert_eq!(store.get(b"key2"), None);
        assert!(store.contains(b"key1"));
    }

    #[test]
    fn set_overwrites() {
        let mut store = Store::new();

        store.set(Bytes::from("key"), Bytes::from("v1")).unwrap();
        store.set(Bytes::from("key"), Bytes::from("v2")).unwrap();
        store.set(Bytes::from("key"), Bytes::from("v2")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(b"key"), Some(Bytes::from("v2")));
    }

    #[test]
    fn capacity_boundary() {
        let mut store = Store::with_capacity(3);

        for i in 0..3 {
            let key = Bytes::from(format!("key{}", i));
            assert_eq!(store.set(key, Bytes::from("value")), Ok(()));
        }

        assert_eq!(
            store.set(Bytes::from("key3"), Bytes::from("value")),
            Err(StoreError::CapacityExceeded { capacity: 3 })
        );
        assert!(!store.contains(b"key3"));

        assert_eq!(store.set(Bytes::from("key0"), Bytes::from("new")), Ok(()));
        assert_eq!(store.get(b"key0"), Some(Bytes::from("new")));
        assert_eq!(store.len(), store.capacity());
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut store = Store::with_capacity(0);

        assert!(store.set(Bytes::from("key"), Bytes::from("value")).is_err());
        assert!(store.is_empty());
    }
}
