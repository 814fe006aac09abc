//! Relation graph: who uses whom.
//!
//! The graph is a cache over the link walks of every listed data-block. It is
//! always rebuilt as a whole and dropped by any structural change. Loopback
//! references are not recorded; references found in embedded data are
//! attributed to the owner.

use crate::foreach_id::{LinkFlags, WalkControl, WalkFlags};
use crate::main::Main;
use crate::types::{IdHandle, flag_set};
use std::collections::HashMap;
use tracing::trace;

flag_set! {
    /// Per-entry markers for recursive algorithms over the graph.
    pub struct RelationTags(u32) {
        /// The entry was fully processed.
        const PROCESSED = 1 << 0;
        /// The entry is being processed (cycle guard).
        const INPROGRESS = 1 << 1;
    }
}

/// One edge endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationItem {
    /// The data-block at the other end.
    pub id: IdHandle,
    /// Usage flags of the reference field.
    pub usage: LinkFlags,
}

/// Edges of one data-block.
#[derive(Debug, Clone, Default)]
pub struct RelationsEntry {
    /// Data-blocks referencing this one.
    pub from_ids: Vec<RelationItem>,
    /// Data-blocks referenced by this one.
    pub to_ids: Vec<RelationItem>,
    /// Algorithm markers.
    pub tags: RelationTags,
}

/// Relation graph of a whole database.
#[derive(Debug, Clone, Default)]
pub struct MainIdRelations {
    entries: HashMap<IdHandle, RelationsEntry>,
}

impl MainIdRelations {
    /// Build the graph from every listed data-block, UI references included.
    #[must_use]
    pub fn build(main: &Main) -> Self {
        let mut entries: HashMap<IdHandle, RelationsEntry> = main
            .handles()
            .into_iter()
            .map(|handle| (handle, RelationsEntry::default()))
            .collect();
        let mut edges = 0usize;

        for (owner, _) in main.iter_all() {
            main.foreach_link(owner, WalkFlags::INCLUDE_UI, |link| {
                let Some(target) = link.target else {
                    return WalkControl::Continue;
                };
                if link.flags.contains(LinkFlags::LOOPBACK) || !entries.contains_key(&target) {
                    return WalkControl::Continue;
                }
                if let Some(entry) = entries.get_mut(&owner) {
                    entry.to_ids.push(RelationItem {
                        id: target,
                        usage: link.flags,
                    });
                }
                if let Some(entry) = entries.get_mut(&target) {
                    entry.from_ids.push(RelationItem {
                        id: owner,
                        usage: link.flags,
                    });
                }
                edges += 1;
                WalkControl::Continue
            });
        }
        trace!(ids = entries.len(), edges, "Relation graph built");
        Self { entries }
    }

    /// Edges of one data-block.
    #[must_use]
    pub fn get(&self, handle: IdHandle) -> Option<&RelationsEntry> {
        self.entries.get(&handle)
    }

    /// Mutable edges of one data-block, for tagging.
    pub fn get_mut(&mut self, handle: IdHandle) -> Option<&mut RelationsEntry> {
        self.entries.get_mut(&handle)
    }

    /// Data-blocks referencing `handle`.
    #[must_use]
    pub fn users_of(&self, handle: IdHandle) -> &[RelationItem] {
        self.entries
            .get(&handle)
            .map(|e| e.from_ids.as_slice())
            .unwrap_or_default()
    }

    /// Data-blocks referenced by `handle`.
    #[must_use]
    pub fn used_by(&self, handle: IdHandle) -> &[RelationItem] {
        self.entries
            .get(&handle)
            .map(|e| e.to_ids.as_slice())
            .unwrap_or_default()
    }

    /// Clear the tags of every entry.
    pub fn clear_tags(&mut self) {
        for entry in self.entries.values_mut() {
            entry.tags = RelationTags::empty();
        }
    }

    /// Number of data-blocks in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Main {
    /// Build the relation graph if it is not cached.
    pub fn relations_create(&mut self) -> &MainIdRelations {
        if self.relations.is_none() {
            self.relations = Some(MainIdRelations::build(self));
        }
        self.relations.get_or_insert_with(MainIdRelations::default)
    }

    /// The cached relation graph, if built.
    #[must_use]
    pub fn relations(&self) -> Option<&MainIdRelations> {
        self.relations.as_ref()
    }

    /// Drop the cached relation graph.
    pub fn relations_free(&mut self) {
        self.relations = None;
    }

    /// Whether `handle` is used by local data and by linked data, as
    /// `(is_local_user, is_lib_user)`.
    ///
    /// Loopback and embedded back references do not count as uses.
    #[must_use]
    pub fn test_usages(&self, handle: IdHandle) -> (bool, bool) {
        let mut is_local = false;
        let mut is_lib = false;
        for (owner, owner_block) in self.iter_all() {
            if owner == handle {
                continue;
            }
            let mut uses = false;
            self.foreach_link(owner, WalkFlags::INCLUDE_UI, |link| {
                if link.target == Some(handle)
                    && !link.flags.intersects(LinkFlags::LOOPBACK | LinkFlags::EMBEDDED_NOT_OWNING)
                {
                    uses = true;
                    return WalkControl::Stop;
                }
                WalkControl::Continue
            });
            if uses {
                if owner_block.is_linked() {
                    is_lib = true;
                } else {
                    is_local = true;
                }
                if is_local && is_lib {
                    break;
                }
            }
        }
        (is_local, is_lib)
    }

    /// Number of counted references to `handle` in the database.
    #[must_use]
    pub fn count_users(&self, handle: IdHandle) -> usize {
        let mut count = 0;
        for (owner, _) in self.iter_all() {
            self.foreach_link(owner, WalkFlags::empty(), |link| {
                if link.target == Some(handle) && link.flags.contains(LinkFlags::USER) {
                    count += 1;
                }
                WalkControl::Continue
            });
        }
        count
    }
}
