//! Connection state of the three performance observers.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::entry::EntryType;

/// Tracks which entry types the monitor is still listening to.
///
/// All three observers start connected. Disconnecting is one-way and
/// idempotent.
#[derive(Debug)]
pub struct ObserverSet {
    navigation: AtomicBool,
    resource: AtomicBool,
    long_task: AtomicBool,
}

impl Default for ObserverSet {
    fn default() -> Self {
        Self::connected()
    }
}

impl ObserverSet {
    /// Create a set with every observer connected.
    pub fn connected() -> Self {
        Self {
            navigation: AtomicBool::new(true),
            resource: AtomicBool::new(true),
            long_task: AtomicBool::new(true),
        }
    }

    fn flag(&self, entry_type: EntryType) -> &AtomicBool {
        match entry_type {
            EntryType::Navigation => &self.navigation,
            EntryType::Resource => &self.resource,
            EntryType::LongTask => &self.long_task,
        }
    }

    /// Check if entries of this type are still being observed.
    pub fn is_connected(&self, entry_type: EntryType) -> bool {
        self.flag(entry_type).load(Ordering::Acquire)
    }

    /// Disconnect every observer. Returns how many were still connected.
    pub fn disconnect_all(&self) -> usize {
        EntryType::ALL
            .iter()
            .filter(|entry_type| self.flag(**entry_type).swap(false, Ordering::AcqRel))
            .count()
    }

    /// Number of observers still connected.
    pub fn active_count(&self) -> usize {
        EntryType::ALL
            .iter()
            .filter(|entry_type| self.is_connected(**entry_type))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_connected_initially() {
        let observers = ObserverSet::connected();
        assert_eq!(observers.active_count(), 3);
        for entry_type in EntryType::ALL {
            assert!(observers.is_connected(entry_type));
        }
    }

    #[test]
    fn test_disconnect_all_is_idempotent() {
        let observers = ObserverSet::default();
        assert_eq!(observers.disconnect_all(), 3);
        assert_eq!(observers.disconnect_all(), 0);
        assert_eq!(observers.active_count(), 0);
        assert!(!observers.is_connected(EntryType::Resource));
    }
}
