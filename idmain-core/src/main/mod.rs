//! The data-block database ("Main").
//!
//! A [`Main`] owns every data-block of a session in a generational arena and
//! keeps one ordered list per type: sorted by name (case-insensitive), local
//! data first, linked data grouped by library. It also owns the lazily built
//! caches (name maps, relation graph, lookup map), which structural edits
//! invalidate rather than patch.
//!
//! # Example
//!
//! ```
//! use idmain_core::prelude::*;
//!
//! let mut main = Main::standalone();
//! let mesh = main.new_id(IdType::Mesh, "Cube");
//! let object = main.new_id(IdType::Object, "Cube");
//! main.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(mesh);
//! main.refcount_recompute(false);
//! assert_eq!(main.get(mesh).unwrap().users(), 1);
//! ```

mod arena;
mod copy;
mod merge;
mod naming;
mod ordering;
mod query;
mod shared;

pub use copy::CopyFlags;
pub use merge::{MergeReport, merge_into};
pub use naming::{IdNewNameAction, IdNewNameMode, IdNewNameResult};
pub use ordering::compare_names;
pub use shared::SharedMain;

use crate::config::MainConfig;
use crate::error::{MainError, Result};
use crate::id::IdBlock;
use crate::id_map::IdMap;
use crate::idtype::id_type_info;
use crate::name_map::NameMaps;
use crate::notify::{ChangeCallback, ChangeNotifier, IdChange, IdChangeKind, SubscriberId};
use crate::relations::MainIdRelations;
use crate::types::{IdFlags, IdHandle, IdTags, IdType, SessionUid, SessionUidGenerator, flag_set};
use arena::IdArena;
use std::sync::Arc;
use tracing::{debug, warn};

flag_set! {
    /// Options for creating a data-block.
    pub struct AllocFlags(u32) {
        /// Start with zero users and stay out of user counting.
        const NO_USER_REFCOUNT = 1 << 0;
    }
}

/// The data-block database.
#[derive(Debug)]
pub struct Main {
    pub(crate) arena: IdArena,
    pub(crate) lists: Vec<Vec<IdHandle>>,
    pub(crate) name_maps: NameMaps,
    pub(crate) relations: Option<MainIdRelations>,
    pub(crate) id_map: Option<IdMap>,
    uid_generator: Arc<SessionUidGenerator>,
    notifier: Arc<ChangeNotifier>,
    config: MainConfig,
    is_dirty: bool,
}

impl Default for Main {
    fn default() -> Self {
        Self::standalone()
    }
}

impl Main {
    /// Create an empty database drawing session UIDs from `uid_generator`.
    #[must_use]
    pub fn new(uid_generator: Arc<SessionUidGenerator>) -> Self {
        Self::with_config(uid_generator, MainConfig::default())
    }

    /// Create an empty database with explicit configuration.
    #[must_use]
    pub fn with_config(uid_generator: Arc<SessionUidGenerator>, config: MainConfig) -> Self {
        Self {
            arena: IdArena::default(),
            lists: vec![Vec::new(); IdType::COUNT],
            name_maps: NameMaps::default(),
            relations: None,
            id_map: None,
            uid_generator,
            notifier: Arc::new(ChangeNotifier::new()),
            config,
            is_dirty: false,
        }
    }

    /// Create an empty database with its own UID generator.
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(Arc::new(SessionUidGenerator::new()))
    }

    /// Configuration of this database.
    pub fn config(&self) -> &MainConfig {
        &self.config
    }

    /// The shared session UID generator.
    pub fn uid_generator(&self) -> &Arc<SessionUidGenerator> {
        &self.uid_generator
    }

    /// Change notification hub.
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Register a change subscriber.
    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriberId {
        self.notifier.subscribe(callback)
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Resolve a handle.
    #[must_use]
    pub fn get(&self, handle: IdHandle) -> Option<&IdBlock> {
        self.arena.get(handle)
    }

    /// Resolve a handle for mutation.
    pub fn get_mut(&mut self, handle: IdHandle) -> Option<&mut IdBlock> {
        self.arena.get_mut(handle)
    }

    /// Resolve a handle or fail with [`MainError::StaleHandle`].
    pub fn block(&self, handle: IdHandle) -> Result<&IdBlock> {
        self.arena
            .get(handle)
            .ok_or(MainError::StaleHandle { handle })
    }

    /// Resolve a handle for mutation or fail with [`MainError::StaleHandle`].
    pub fn block_mut(&mut self, handle: IdHandle) -> Result<&mut IdBlock> {
        self.arena
            .get_mut(handle)
            .ok_or(MainError::StaleHandle { handle })
    }

    /// Whether the handle resolves to a data-block of this database.
    #[must_use]
    pub fn contains(&self, handle: IdHandle) -> bool {
        self.arena.get(handle).is_some_and(IdBlock::is_in_main)
    }

    /// Ordered handles of one type.
    #[must_use]
    pub fn list(&self, id_type: IdType) -> &[IdHandle] {
        &self.lists[id_type.index()]
    }

    /// Iterate over the data-blocks of one type, in list order.
    pub fn iter_type(&self, id_type: IdType) -> impl Iterator<Item = (IdHandle, &IdBlock)> {
        self.lists[id_type.index()]
            .iter()
            .filter_map(|handle| self.arena.get(*handle).map(|block| (*handle, block)))
    }

    /// Iterate over every listed data-block, type by type.
    pub fn iter_all(&self) -> impl Iterator<Item = (IdHandle, &IdBlock)> {
        self.lists
            .iter()
            .flatten()
            .filter_map(|handle| self.arena.get(*handle).map(|block| (*handle, block)))
    }

    /// Every listed handle, type by type.
    #[must_use]
    pub fn handles(&self) -> Vec<IdHandle> {
        self.lists.iter().flatten().copied().collect()
    }

    /// Number of listed data-blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Whether no data-block is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    /// Whether the database changed since the last [`Main::clear_dirty`].
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Mark the database as saved.
    pub fn clear_dirty(&mut self) {
        self.is_dirty = false;
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a local data-block with a default payload.
    ///
    /// The name is made unique in the local scope; `None` uses the type's
    /// default name. New data-blocks start with one user unless
    /// [`AllocFlags::NO_USER_REFCOUNT`] is given.
    pub fn alloc(&mut self, id_type: IdType, name: Option<&str>, flags: AllocFlags) -> IdHandle {
        let mut block = IdBlock::new(id_type, "");
        if flags.contains(AllocFlags::NO_USER_REFCOUNT) {
            block.tags.insert(IdTags::NO_USER_REFCOUNT);
        } else {
            block.users = 1;
        }
        self.link_block(block, name)
    }

    /// Create a data-block linked from `library` (`None` creates local data).
    ///
    /// Linked data-blocks start tagged `INDIRECT`; gaining a local user makes
    /// them `EXTERN`.
    pub fn alloc_in_lib(
        &mut self,
        library: Option<IdHandle>,
        id_type: IdType,
        name: Option<&str>,
        flags: AllocFlags,
    ) -> Result<IdHandle> {
        if let Some(library) = library {
            self.expect_type(library, IdType::Library)?;
        }
        let mut block = IdBlock::new(id_type, "");
        block.library = library;
        if library.is_some() {
            block.tags.insert(IdTags::INDIRECT);
        }
        if flags.contains(AllocFlags::NO_USER_REFCOUNT) {
            block.tags.insert(IdTags::NO_USER_REFCOUNT);
        } else {
            block.users = 1;
        }
        Ok(self.link_block(block, name))
    }

    /// Create a local data-block and fill it with its type defaults.
    pub fn new_id(&mut self, id_type: IdType, name: &str) -> IdHandle {
        let handle = self.alloc(id_type, Some(name), AllocFlags::empty());
        self.init_data(handle);
        handle
    }

    /// Create a data-block in `library` and fill it with its type defaults.
    pub fn new_id_in_lib(
        &mut self,
        library: Option<IdHandle>,
        id_type: IdType,
        name: &str,
    ) -> Result<IdHandle> {
        let handle = self.alloc_in_lib(library, id_type, Some(name), AllocFlags::empty())?;
        self.init_data(handle);
        Ok(handle)
    }

    /// Create a library data-block for `filepath`.
    pub fn new_library(&mut self, name: &str, filepath: &str) -> IdHandle {
        let handle = self.new_id(IdType::Library, name);
        if let Some(library) = self.get_mut(handle).and_then(|b| b.data.as_library_mut()) {
            library.filepath = filepath.to_string();
        }
        handle
    }

    /// Create a data-block outside of any database, with a session UID but no
    /// user counting.
    #[must_use]
    pub fn new_id_nomain(&self, id_type: IdType, name: &str) -> IdBlock {
        let mut block = IdBlock::new_nomain(id_type, crate::name_map::clean_name(name));
        block.session_uid = self.uid_generator.next_uid();
        block
    }

    fn init_data(&mut self, handle: IdHandle) {
        let Some(id_type) = self.get(handle).map(IdBlock::id_type) else {
            return;
        };
        if let Some(init) = id_type_info(id_type).init_data {
            init(self, handle);
        }
    }

    /// Create an embedded data-block of `id_type` inside `owner`.
    ///
    /// Returns `false` if the owner cannot hold one or already does.
    pub fn add_embedded(&mut self, owner: IdHandle, id_type: IdType) -> bool {
        let uid = self.uid_generator.next_uid();
        let Some(block) = self.arena.get_mut(owner) else {
            return false;
        };
        let library = block.library;
        let Some(slot) = block.data.embedded_slot_mut() else {
            return false;
        };
        if slot.is_some() {
            return false;
        }
        let mut embedded = IdBlock::new_embedded(id_type);
        embedded.library = library;
        embedded.session_uid = uid;
        embedded.data.set_embedded_owner(Some(owner));
        *slot = Some(Box::new(embedded));
        true
    }

    /// Add a free-standing data-block (tagged `NO_MAIN`) to this database.
    pub fn insert(&mut self, block: IdBlock) -> Result<IdHandle> {
        if block.is_embedded() {
            return Err(MainError::EmbeddedId { name: block.name });
        }
        if block.is_in_main() {
            return Err(MainError::AlreadyInMain { name: block.name });
        }
        if let Some(library) = block.library {
            self.expect_type(library, IdType::Library)?;
        }
        let name = block.name.clone();
        Ok(self.link_block(block, Some(&name)))
    }

    /// Take a data-block out of this database.
    ///
    /// The block is returned tagged `NO_MAIN`. References to it elsewhere are
    /// left untouched; use [`Main::delete`] to clear them.
    pub fn remove(&mut self, handle: IdHandle) -> Result<IdBlock> {
        let block = self.block(handle)?;
        if !block.is_in_main() {
            return Err(MainError::NotInMain {
                name: block.name.clone(),
            });
        }
        let (id_type, library, name) = (block.id_type, block.library, block.name.clone());
        self.name_maps.remove(id_type, library, &name);
        self.lists[id_type.index()].retain(|h| *h != handle);
        let mut block = self
            .arena
            .remove(handle)
            .ok_or(MainError::StaleHandle { handle })?;
        block.tags.insert(IdTags::NO_MAIN);
        self.structure_changed();
        Ok(block)
    }

    /// Put `block` into the arena, give it a UID and a unique name, and sort
    /// it into its list.
    pub(crate) fn link_block(&mut self, mut block: IdBlock, name: Option<&str>) -> IdHandle {
        block.tags.remove(IdTags::NO_MAIN);
        block.tags.insert(IdTags::NEED_PERSIST);
        let id_type = block.id_type;
        let current = std::mem::take(&mut block.name);
        let handle = self.arena.insert(block);
        self.session_uid_ensure(handle);
        self.attach_embedded(handle);

        let name = name.map_or(current, str::to_string);
        self.new_name_validate(handle, Some(&name), IdNewNameMode::RenameExistingNever, true);
        self.structure_changed();
        self.notify_change(handle, IdChangeKind::Created);
        debug!(id = %handle, id_type = %id_type, "Data-block added");
        handle
    }

    /// Point embedded data back at its owner and share the owner's library.
    pub(crate) fn attach_embedded(&mut self, owner: IdHandle) {
        let generator = Arc::clone(&self.uid_generator);
        let Some(block) = self.arena.get_mut(owner) else {
            return;
        };
        let library = block.library;
        if let Some(embedded) = block.data.embedded_mut() {
            embedded.library = library;
            embedded.data.set_embedded_owner(Some(owner));
            if !embedded.session_uid.is_set() {
                embedded.session_uid = generator.next_uid();
            }
        }
    }

    pub(crate) fn expect_type(&self, handle: IdHandle, expected: IdType) -> Result<()> {
        let found = self.block(handle)?.id_type;
        if found != expected {
            return Err(MainError::WrongIdType {
                handle,
                expected,
                found,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Assign a session UID if the data-block has none.
    pub fn session_uid_ensure(&mut self, handle: IdHandle) {
        let generator = Arc::clone(&self.uid_generator);
        if let Some(block) = self.arena.get_mut(handle)
            && !block.session_uid.is_set()
        {
            block.session_uid = generator.next_uid();
        }
    }

    /// Give the data-block (and its embedded data) fresh session UIDs.
    pub fn session_uid_renew(&mut self, handle: IdHandle) {
        let generator = Arc::clone(&self.uid_generator);
        if let Some(block) = self.arena.get_mut(handle) {
            block.session_uid = generator.next_uid();
            if let Some(embedded) = block.data.embedded_mut() {
                embedded.session_uid = generator.next_uid();
            }
        }
        self.id_map = None;
    }

    // =========================================================================
    // Bulk tags
    // =========================================================================

    /// Set or clear `tags` on every listed data-block.
    pub fn tag_all(&mut self, tags: IdTags, value: bool) {
        for handle in self.handles() {
            if let Some(block) = self.arena.get_mut(handle) {
                block.tags.set(tags, value);
            }
        }
    }

    /// Set or clear `tags` on every listed data-block of one type.
    pub fn tag_type(&mut self, id_type: IdType, tags: IdTags, value: bool) {
        for handle in self.lists[id_type.index()].clone() {
            if let Some(block) = self.arena.get_mut(handle) {
                block.tags.set(tags, value);
            }
        }
    }

    /// Set or clear persistent `flags` on every listed data-block.
    ///
    /// Use [`Main::fake_user_set`] for the fake user, which also counts it.
    pub fn flag_all(&mut self, flags: IdFlags, value: bool) {
        if flags.contains(IdFlags::FAKE_USER) {
            warn!("flag_all does not maintain user counts for FAKE_USER");
        }
        for handle in self.handles() {
            if let Some(block) = self.arena.get_mut(handle) {
                block.flags.set(flags, value);
            }
        }
        self.is_dirty = true;
    }

    /// Clear the copy/replacement links and the `NEW` tag everywhere.
    pub fn newptr_and_tag_clear(&mut self) {
        for handle in self.handles() {
            if let Some(block) = self.arena.get_mut(handle) {
                block.new_id = None;
                block.tags.remove(IdTags::NEW);
            }
        }
    }

    // =========================================================================
    // Caches and notification
    // =========================================================================

    /// Drop the relation graph and lookup map.
    pub fn invalidate_caches(&mut self) {
        self.relations = None;
        self.id_map = None;
    }

    /// Record a structural change: dirty flag plus cache invalidation.
    pub(crate) fn structure_changed(&mut self) {
        self.is_dirty = true;
        self.invalidate_caches();
    }

    pub(crate) fn notify_change(&self, handle: IdHandle, kind: IdChangeKind) {
        if !self.config.notify_changes() || self.notifier.is_empty() {
            return;
        }
        if let Some(block) = self.arena.get(handle) {
            self.notify_block(block.session_uid, block.id_type, kind);
        }
    }

    pub(crate) fn notify_block(&self, session_uid: SessionUid, id_type: IdType, kind: IdChangeKind) {
        if !self.config.notify_changes() {
            return;
        }
        self.notifier.notify(&IdChange {
            session_uid,
            id_type,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn alloc_assigns_name_uid_and_user() {
        let mut main = Main::standalone();
        let mesh = main.alloc(IdType::Mesh, Some("Cube"), AllocFlags::empty());
        let block = main.get(mesh).unwrap();
        assert_eq!(block.name(), "Cube");
        assert_eq!(block.users(), 1);
        assert!(block.session_uid().is_set());
        assert!(block.is_in_main());
        assert!(main.is_dirty());
        assert_eq!(main.list(IdType::Mesh), &[mesh]);
    }

    #[test]
    fn alloc_without_refcount() {
        let mut main = Main::standalone();
        let text = main.alloc(IdType::Text, None, AllocFlags::NO_USER_REFCOUNT);
        let block = main.get(text).unwrap();
        assert_eq!(block.name(), "Text");
        assert_eq!(block.users(), 0);
        assert!(block.tags().contains(IdTags::NO_USER_REFCOUNT));
    }

    #[test]
    fn alloc_makes_names_unique() {
        let mut main = Main::standalone();
        let first = main.new_id(IdType::Object, "Cube");
        let second = main.new_id(IdType::Object, "Cube");
        let third = main.new_id(IdType::Object, "Cube");
        assert_eq!(main.get(first).unwrap().name(), "Cube");
        assert_eq!(main.get(second).unwrap().name(), "Cube.001");
        assert_eq!(main.get(third).unwrap().name(), "Cube.002");
    }

    #[test]
    fn session_uids_are_shared_between_mains() {
        let generator = Arc::new(SessionUidGenerator::new());
        let mut first = Main::new(Arc::clone(&generator));
        let mut second = Main::new(generator);
        let a = first.new_id(IdType::Mesh, "A");
        let b = second.new_id(IdType::Mesh, "B");
        assert_ne!(
            first.get(a).unwrap().session_uid(),
            second.get(b).unwrap().session_uid()
        );
    }

    #[test]
    fn scene_gets_master_collection() {
        let mut main = Main::standalone();
        let scene = main.new_id(IdType::Scene, "Scene");
        let block = main.get(scene).unwrap();
        let master = block.data.embedded().unwrap();
        assert!(master.is_embedded());
        assert_eq!(master.data.embedded_owner(), Some(scene));
        assert!(master.session_uid().is_set());
        assert!(main.list(IdType::Collection).is_empty());
    }

    #[test]
    fn insert_and_remove_cross_the_boundary() {
        let mut main = Main::standalone();
        let block = main.new_id_nomain(IdType::Image, "Brick");
        assert!(!block.is_in_main());
        let uid = block.session_uid();

        let image = main.insert(block).unwrap();
        assert!(main.contains(image));
        assert_eq!(main.get(image).unwrap().session_uid(), uid);

        let removed = main.remove(image).unwrap();
        assert!(!removed.is_in_main());
        assert!(!main.contains(image));
        assert!(main.list(IdType::Image).is_empty());
        assert!(main.remove(image).unwrap_err().is_stale_handle());

        let again = main.insert(removed).unwrap();
        assert_eq!(main.get(again).unwrap().name(), "Brick");
    }

    #[test]
    fn insert_rejects_listed_blocks() {
        let mut main = Main::standalone();
        let mesh = main.new_id(IdType::Mesh, "Cube");
        let copy = main.get(mesh).unwrap().clone();
        assert_eq!(main.insert(copy).unwrap_err().code(), "E003");
    }

    #[test]
    fn alloc_in_lib_checks_library_type() {
        let mut main = Main::standalone();
        let mesh = main.new_id(IdType::Mesh, "Cube");
        let err = main
            .alloc_in_lib(Some(mesh), IdType::Object, None, AllocFlags::empty())
            .unwrap_err();
        assert_eq!(err.code(), "E005");

        let lib = main.new_library("lib", "//lib.blend");
        let linked = main
            .alloc_in_lib(Some(lib), IdType::Object, Some("Cube"), AllocFlags::empty())
            .unwrap();
        let block = main.get(linked).unwrap();
        assert!(block.is_linked());
        assert!(block.tags().contains(IdTags::INDIRECT));
    }

    #[test]
    fn created_events_are_published() {
        let mut main = Main::standalone();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        main.subscribe(Arc::new(move |change: &IdChange| {
            sink.lock().push(change.clone());
        }));

        main.new_id(IdType::Text, "Notes");
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, IdChangeKind::Created);
        assert_eq!(events[0].id_type, IdType::Text);
    }

    #[test]
    fn tag_helpers() {
        let mut main = Main::standalone();
        let a = main.new_id(IdType::Mesh, "A");
        let b = main.new_id(IdType::Object, "B");
        main.tag_all(IdTags::DOIT, true);
        assert!(main.get(a).unwrap().tags().contains(IdTags::DOIT));
        main.tag_type(IdType::Object, IdTags::DOIT, false);
        assert!(!main.get(b).unwrap().tags().contains(IdTags::DOIT));
        assert!(main.get(a).unwrap().tags().contains(IdTags::DOIT));

        main.get_mut(a).unwrap().new_id = Some(b);
        main.newptr_and_tag_clear();
        assert_eq!(main.get(a).unwrap().new_id(), None);
    }
}
