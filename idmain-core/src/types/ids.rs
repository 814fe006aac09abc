//! Strongly-typed identifiers for data-blocks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Handle to a data-block stored in a [`Main`](crate::Main).
///
/// Handles are generational: once the data-block is freed the handle never
/// resolves again, even after its arena slot is reused. A handle is only
/// meaningful for the Main that issued it; use [`SessionUid`] to identify a
/// data-block across databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdHandle {
    index: u32,
    generation: u32,
}

impl IdHandle {
    /// Create a handle from its raw parts.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for IdHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id_{}v{}", self.index, self.generation)
    }
}

/// Process-wide runtime identity of a data-block.
///
/// Assigned once when the data-block enters a database, stable across renames
/// and never reused while the generator lives. It is not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionUid(u32);

impl SessionUid {
    /// The "not yet assigned" value.
    pub const UNSET: Self = Self(0);

    /// Create a session UID from a raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether a value has been assigned.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0 != Self::UNSET.0
    }
}

impl Default for SessionUid {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for SessionUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid_{}", self.0)
    }
}

impl From<u32> for SessionUid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Atomic source of [`SessionUid`] values.
///
/// Share one generator (through an `Arc`) between every Main that may exchange
/// data-blocks, so UIDs stay unique across them.
#[derive(Debug, Default)]
pub struct SessionUidGenerator {
    counter: AtomicU32,
}

impl SessionUidGenerator {
    /// Create a generator whose first UID is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator that continues after `last_issued`.
    #[must_use]
    pub fn starting_after(last_issued: u32) -> Self {
        Self {
            counter: AtomicU32::new(last_issued),
        }
    }

    /// Allocate the next UID. Wraps around, skipping [`SessionUid::UNSET`].
    pub fn next_uid(&self) -> SessionUid {
        loop {
            let value = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if value != SessionUid::UNSET.0 {
                return SessionUid(value);
            }
        }
    }

    /// The most recently issued raw value.
    #[must_use]
    pub fn last_issued(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}
