//! Lookup cache by name and by session UID.
//!
//! Finding a data-block by name or UID scans its typed list. For bulk lookups
//! the [`IdMap`] indexes every listed data-block once. The map is never
//! patched: any structural change drops it and it is rebuilt on the next
//! [`Main::id_map_ensure`].

use crate::main::Main;
use crate::types::{IdHandle, IdType, SessionUid};
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NameKey {
    id_type: IdType,
    library: Option<IdHandle>,
    name: String,
}

/// Hash indices over the listed data-blocks of a database.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    by_name: HashMap<NameKey, IdHandle>,
    by_uid: HashMap<SessionUid, IdHandle>,
}

impl IdMap {
    /// Index every listed data-block of `main`.
    #[must_use]
    pub fn build(main: &Main) -> Self {
        let mut map = Self::default();
        for (handle, block) in main.iter_all() {
            map.by_name.insert(
                NameKey {
                    id_type: block.id_type(),
                    library: block.library(),
                    name: block.name().to_string(),
                },
                handle,
            );
            if block.session_uid().is_set() {
                map.by_uid.insert(block.session_uid(), handle);
            }
        }
        trace!(ids = map.by_name.len(), "Id map built");
        map
    }

    /// The data-block of `id_type` named `name` in `library`.
    #[must_use]
    pub fn lookup_name(
        &self,
        id_type: IdType,
        name: &str,
        library: Option<IdHandle>,
    ) -> Option<IdHandle> {
        self.by_name
            .get(&NameKey {
                id_type,
                library,
                name: name.to_string(),
            })
            .copied()
    }

    /// The data-block with `session_uid`.
    #[must_use]
    pub fn lookup_uid(&self, session_uid: SessionUid) -> Option<IdHandle> {
        self.by_uid.get(&session_uid).copied()
    }

    /// Number of indexed data-blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Main {
    /// Build the lookup cache if it is not cached.
    pub fn id_map_ensure(&mut self) -> &IdMap {
        if self.id_map.is_none() {
            self.id_map = Some(IdMap::build(self));
        }
        self.id_map.get_or_insert_with(IdMap::default)
    }

    /// The cached lookup map, if built.
    #[must_use]
    pub fn id_map(&self) -> Option<&IdMap> {
        self.id_map.as_ref()
    }

    /// Drop the cached lookup map.
    pub fn id_map_free(&mut self) {
        self.id_map = None;
    }
}
