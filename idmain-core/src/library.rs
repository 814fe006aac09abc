//! Library hierarchy and conversion of linked data into local data.

use crate::foreach_id::{LinkFlags, WalkFlags};
use crate::idtype::id_type_info;
use crate::main::{CopyFlags, IdNewNameMode, Main};
use crate::notify::IdChangeKind;
use crate::relations::{MainIdRelations, RelationTags};
use crate::remap::RemapFlags;
use crate::types::{IdFlags, IdHandle, IdTags, IdType, flag_set};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, trace, warn};

flag_set! {
    /// Options for making linked data local.
    pub struct MakeLocalFlags(u32) {
        /// Also handle data that is only indirectly linked.
        const INDIRECT = 1 << 0;
        /// The whole library is made local: users in the library follow.
        const FULL_LIBRARY = 1 << 1;
        /// Always convert in place.
        const FORCE_LOCAL = 1 << 2;
        /// Always make a local copy.
        const FORCE_COPY = 1 << 3;
    }
}

impl Main {
    /// Recompute `parent` and `hierarchy_depth` of every library.
    ///
    /// Libraries with data used by local data, or with directly linked data,
    /// are roots. Every other library hangs under the closest library whose
    /// data uses its data. Libraries reachable from no root are roots too.
    pub fn rebuild_hierarchy(&mut self) {
        let libraries: Vec<IdHandle> = self.list(IdType::Library).to_vec();
        if libraries.is_empty() {
            return;
        }
        let mut relations = MainIdRelations::build(self);
        relations.clear_tags();

        // Library -> libraries whose data its data uses, in list order.
        let mut uses: HashMap<IdHandle, Vec<IdHandle>> = HashMap::new();
        let mut direct: HashSet<IdHandle> = HashSet::new();
        for (handle, block) in self.iter_all() {
            let Some(library) = block.library else {
                continue;
            };
            if block.tags.contains(IdTags::EXTERN) {
                direct.insert(library);
            }
            for user in relations.users_of(handle) {
                match self.get(user.id).map(|b| b.library) {
                    Some(None) => {
                        direct.insert(library);
                    }
                    Some(Some(user_library)) if user_library != library => {
                        let used = uses.entry(user_library).or_default();
                        if !used.contains(&library) {
                            used.push(library);
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut placement: HashMap<IdHandle, (Option<IdHandle>, u32)> = HashMap::new();
        let mut queue = VecDeque::new();
        for library in &libraries {
            if direct.contains(library) {
                mark_processed(&mut relations, *library);
                placement.insert(*library, (None, 0));
                queue.push_back(*library);
            }
        }
        while let Some(library) = queue.pop_front() {
            let depth = placement.get(&library).map_or(0, |(_, depth)| *depth);
            for used in uses.get(&library).into_iter().flatten() {
                if mark_processed(&mut relations, *used) {
                    placement.insert(*used, (Some(library), depth + 1));
                    queue.push_back(*used);
                }
            }
        }

        for library in &libraries {
            let (parent, depth) = placement.get(library).copied().unwrap_or((None, 0));
            if let Some(data) = self.get_mut(*library).and_then(|b| b.data.as_library_mut()) {
                data.parent = parent;
                data.hierarchy_depth = depth;
            }
        }
        trace!(
            libraries = libraries.len(),
            roots = direct.len(),
            "Library hierarchy rebuilt"
        );
    }

    /// Make a linked data-block local.
    ///
    /// Without forcing, data used only locally (or unused) is converted in
    /// place, data used both locally and by linked data is copied and the
    /// local users switch to the copy, and data used only by linked data is
    /// left alone. Returns whether anything was made local.
    pub fn make_local(&mut self, handle: IdHandle, flags: MakeLocalFlags) -> bool {
        let Some(block) = self.get(handle) else {
            return false;
        };
        if !block.is_linked() {
            return false;
        }
        if block.tags.contains(IdTags::INDIRECT)
            && !flags.intersects(MakeLocalFlags::INDIRECT | MakeLocalFlags::FULL_LIBRARY)
        {
            debug!(id = %handle, "Indirectly linked data-block left linked");
            return false;
        }
        let info = id_type_info(block.id_type);
        if let Some(make_local) = info.make_local {
            return make_local(self, handle, flags);
        }
        if !info.is_linkable() {
            return false;
        }

        let force_copy = flags.contains(MakeLocalFlags::FORCE_COPY);
        let force_local = !force_copy
            && flags.intersects(MakeLocalFlags::FORCE_LOCAL | MakeLocalFlags::FULL_LIBRARY);
        if force_local {
            self.clear_library_data(handle);
            return true;
        }
        if force_copy {
            return self.make_local_copy(handle);
        }
        match self.test_usages(handle) {
            (_, false) => {
                self.clear_library_data(handle);
                true
            }
            (true, true) => self.make_local_copy(handle),
            (false, true) => false,
        }
    }

    /// Make every data-block of `library` local. Returns how many were.
    pub fn make_local_library(&mut self, library: IdHandle, flags: MakeLocalFlags) -> usize {
        let linked: Vec<IdHandle> = self
            .iter_all()
            .filter(|(_, b)| b.library == Some(library))
            .map(|(h, _)| h)
            .collect();
        let made_local = linked
            .into_iter()
            .filter(|id| self.make_local(*id, flags | MakeLocalFlags::FULL_LIBRARY))
            .count();
        debug!(library = %library, made_local, "Library made local");
        made_local
    }

    /// Turn a linked data-block into a local one in place.
    ///
    /// The data-block gets a unique local name and a new session UID, and
    /// the linked data it references becomes directly used. Owned sub-data
    /// follows.
    pub fn clear_library_data(&mut self, handle: IdHandle) {
        let Some(block) = self.get(handle) else {
            return;
        };
        let Some(library) = block.library else {
            return;
        };
        let (id_type, old_name) = (block.id_type, block.name.clone());

        // The local scope must not see the data-block yet.
        self.ensure_name_scope(None);
        self.name_maps.remove(id_type, Some(library), &old_name);
        self.fake_user_clear(handle);
        if let Some(block) = self.get_mut(handle) {
            block.library = None;
            block.tags.remove(IdTags::EXTERN | IdTags::INDIRECT);
            block
                .flags
                .remove(IdFlags::INDIRECT_WEAK_LINK | IdFlags::LINKED_AND_PACKED);
        }
        let result = self.new_name_validate(handle, None, IdNewNameMode::RenameExistingNever, false);
        self.session_uid_renew(handle);
        self.attach_embedded(handle);
        self.structure_changed();

        let mut owned = Vec::new();
        for link in self.links(handle, WalkFlags::empty()) {
            let Some(target) = link.target else {
                continue;
            };
            if link.flags.contains(LinkFlags::LOOPBACK) {
                continue;
            }
            if self.id_owner(target) == Some(handle) {
                owned.push(target);
            } else {
                self.id_lib_extern(target);
            }
        }
        for sub_data in owned {
            self.clear_library_data(sub_data);
        }

        if result.is_renamed()
            && let Some(block) = self.get(handle)
        {
            let new_name = block.name.clone();
            self.notify_change(
                handle,
                IdChangeKind::Renamed {
                    old_name,
                    new_name,
                },
            );
        }
        debug!(id = %handle, "Linked data-block made local");
    }

    fn make_local_copy(&mut self, handle: IdHandle) -> bool {
        let Some(copy) = self.copy_in_lib(handle, None, CopyFlags::empty()) else {
            return false;
        };
        // Users come from the remapped local references only.
        self.id_us_min(copy);
        if let Err(err) = self.remap(handle, Some(copy), RemapFlags::SKIP_INDIRECT_USAGE) {
            warn!(id = %handle, error = %err, "Could not move local users to the local copy");
            return false;
        }
        debug!(id = %handle, copy = %copy, "Local copy replaces linked data-block");
        true
    }
}

/// Tag a library entry as placed. Returns `false` when it already was.
fn mark_processed(relations: &mut MainIdRelations, library: IdHandle) -> bool {
    match relations.get_mut(library) {
        Some(entry) if !entry.tags.contains(RelationTags::PROCESSED) => {
            entry.tags.insert(RelationTags::PROCESSED);
            true
        }
        _ => false,
    }
}
