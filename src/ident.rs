//! Identity newtypes for the telos engine.
//!
//! Every record in the system — agents, objectives, traits, recurring
//! templates — is addressed by a `NonZeroU64` newtype. The [`IdAllocator`]
//! provides thread-safe monotonic ID generation; since objective IDs are
//! allocated monotonically, ID order doubles as creation order.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{IdentError, TelosResult};

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        ///
        /// Uses `NonZeroU64` so that `Option<Self>` is the same size as `Self`
        /// (zero is the `None` niche).
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Create from a raw `u64`. Returns `None` if `raw` is zero.
            pub fn new(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map($name)
            }

            /// Create from an already-nonzero raw value.
            pub fn from_nonzero(raw: NonZeroU64) -> Self {
                $name(raw)
            }

            /// Get the underlying `u64` value.
            pub fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

id_newtype!(
    /// Identity of a character agent, owned by the surrounding simulation.
    AgentId,
    "agent"
);
id_newtype!(
    /// Identity of an objective node in a planning tree.
    ObjectiveId,
    "obj"
);
id_newtype!(
    /// Identity of a cognitive trait definition.
    TraitId,
    "trait"
);
id_newtype!(
    /// Identity of a recurring-objective template.
    TemplateId,
    "tmpl"
);

/// Thread-safe monotonic ID allocator.
///
/// Produces IDs starting from 1. Safe to share across threads via
/// `Arc<IdAllocator>`.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create a new allocator that starts from ID 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Create an allocator that resumes from a given ID.
    ///
    /// Used when restoring state from persistent storage.
    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    /// Allocate the next raw ID.
    ///
    /// Returns an error if the ID space is exhausted (after 2^64 - 1
    /// allocations).
    pub fn next_raw(&self) -> TelosResult<NonZeroU64> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        NonZeroU64::new(raw).ok_or_else(|| IdentError::AllocatorExhausted.into())
    }

    /// Return the next ID that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    /// Bump the allocator so it will never re-issue `seen` or anything below it.
    pub fn observe(&self, seen: u64) {
        self.next.fetch_max(seen + 1, Ordering::Relaxed);
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<ObjectiveId>>(),
            std::mem::size_of::<ObjectiveId>()
        );
    }

    #[test]
    fn zero_is_none() {
        assert!(ObjectiveId::new(0).is_none());
        assert!(AgentId::new(0).is_none());
        assert!(ObjectiveId::new(1).is_some());
    }

    #[test]
    fn display_prefixes() {
        assert_eq!(AgentId::new(7).unwrap().to_string(), "agent:7");
        assert_eq!(ObjectiveId::new(7).unwrap().to_string(), "obj:7");
        assert_eq!(TraitId::new(7).unwrap().to_string(), "trait:7");
        assert_eq!(TemplateId::new(7).unwrap().to_string(), "tmpl:7");
    }

    #[test]
    fn allocator_is_monotonic() {
        let alloc = IdAllocator::new();
        let a = alloc.next_raw().unwrap();
        let b = alloc.next_raw().unwrap();
        assert!(b > a);
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn allocator_resumes_past_restored_ids() {
        let alloc = IdAllocator::starting_from(10);
        assert_eq!(alloc.next_raw().unwrap().get(), 10);

        alloc.observe(50);
        assert_eq!(alloc.next_raw().unwrap().get(), 51);

        // Observing a lower ID never moves the allocator backwards.
        alloc.observe(3);
        assert_eq!(alloc.next_raw().unwrap().get(), 52);
    }

    #[test]
    fn allocator_concurrent_ids_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let alloc = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| alloc.next_raw().unwrap().get())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
