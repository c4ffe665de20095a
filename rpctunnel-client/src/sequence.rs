//! Call id sequence
//!
//! Every envelope a tunnel sends, over either transport, takes its id from
//! one generator. Ids are never reused within a tunnel, so a socket reply
//! can never be mistaken for the reply to an HTTP call.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of call ids
///
/// Implementations must be safe to call concurrently and must never return
/// the same id twice.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn next_id(&self) -> u64;
}

/// Monotonic counter, starting at 0 unless told otherwise
#[derive(Debug, Default)]
pub struct AtomicIdGenerator {
    next: AtomicU64,
}

impl AtomicIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter whose first id is `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for AtomicIdGenerator {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_zero() {
        let ids = AtomicIdGenerator::new();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }

    #[test]
    fn test_starting_at() {
        let ids = AtomicIdGenerator::starting_at(100);
        assert_eq!(ids.next_id(), 100);
        assert_eq!(ids.next_id(), 101);
    }

    #[tokio::test]
    async fn test_concurrent_ids_are_distinct() {
        let ids = Arc::new(AtomicIdGenerator::new());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                tokio::spawn(async move { (0..250).map(|_| ids.next_id()).collect::<Vec<_>>() })
            })
            .collect();

        let mut seen = HashSet::new();
        for task in tasks {
            for id in task.await.unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 2000);
    }
}
