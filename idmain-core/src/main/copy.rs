//! Data-block duplication.

use super::Main;
use crate::foreach_id::{LinkFlags, WalkControl, WalkFlags};
use crate::id::IdBlock;
use crate::idtype::id_type_info;
use crate::types::{IdFlags, IdHandle, IdTags, IdType, SessionUid, flag_set};
use tracing::debug;

flag_set! {
    /// Options for copying a data-block.
    pub struct CopyFlags(u32) {
        /// Leave user counts alone; the copy takes no part in user counting.
        const NO_USER_REFCOUNT = 1 << 0;
        /// The copy starts without users, as for a duplicate operator that
        /// assigns it afterwards.
        const FOR_DUPLICATE = 1 << 1;
    }
}

impl Main {
    /// Copy a data-block into its own library.
    ///
    /// Returns `None` for types that cannot be copied.
    pub fn copy(&mut self, handle: IdHandle, flags: CopyFlags) -> Option<IdHandle> {
        let library = self.get(handle)?.library;
        self.copy_in_lib(handle, library, flags)
    }

    /// Copy a data-block into `library` (`None` for a local copy).
    ///
    /// The payload is cloned deeply, embedded data included. References to
    /// the source are redirected to the copy, every counted target gains a
    /// user, and copying linked data into local data marks the linked targets
    /// as directly used.
    pub fn copy_in_lib(
        &mut self,
        handle: IdHandle,
        library: Option<IdHandle>,
        flags: CopyFlags,
    ) -> Option<IdHandle> {
        let src = self.get(handle)?;
        let id_type = src.id_type;
        let info = id_type_info(id_type);
        if !info.is_copyable() {
            debug!(id = %handle, id_type = %id_type, "Type cannot be copied");
            return None;
        }
        if let Some(library) = library
            && self.expect_type(library, IdType::Library).is_err()
        {
            return None;
        }
        let expand_local = src.is_linked() && library.is_none();

        let mut block = src.clone();
        reset_copied_header(&mut block);
        block.library = library;
        if library.is_some() {
            block.tags.insert(IdTags::INDIRECT);
        }
        if flags.contains(CopyFlags::NO_USER_REFCOUNT) {
            block.tags.insert(IdTags::NO_USER_REFCOUNT);
        } else {
            block.users = 1;
        }
        let name = block.name.clone();
        let new = self.link_block(block, Some(&name));

        if let Some(src) = self.get_mut(handle) {
            src.new_id = Some(new);
        }
        if let Some(copied) = self.get_mut(new) {
            copied.tags.insert(IdTags::NEW);
        }
        if let Some(copy_data) = info.copy_data {
            copy_data(self, handle, new, flags);
        }

        self.foreach_link_mut(new, WalkFlags::empty(), |slot, link| {
            if *slot == Some(handle) && !link.flags.contains(LinkFlags::LOOPBACK) {
                *slot = Some(new);
            }
            WalkControl::Continue
        });

        let counted = !flags.contains(CopyFlags::NO_USER_REFCOUNT);
        let new_is_linked = library.is_some();
        for link in self.links(new, WalkFlags::empty()) {
            let Some(target) = link.target else {
                continue;
            };
            if link.flags.contains(LinkFlags::LOOPBACK) {
                continue;
            }
            if counted && link.flags.contains(LinkFlags::USER) {
                if new_is_linked {
                    self.id_us_plus_no_lib(target);
                } else {
                    self.id_us_plus(target);
                }
            } else if expand_local {
                self.id_lib_extern(target);
            }
        }

        if flags.contains(CopyFlags::FOR_DUPLICATE) && counted {
            self.id_us_min(new);
        }
        debug!(src = %handle, copy = %new, id_type = %id_type, "Data-block copied");
        Some(new)
    }

    /// Copy a data-block out of the database.
    ///
    /// The copy is tagged `NO_MAIN`, takes no part in user counting and keeps
    /// references to the source as they are.
    #[must_use]
    pub fn copy_nomain(&self, handle: IdHandle) -> Option<IdBlock> {
        let src = self.get(handle)?;
        if !id_type_info(src.id_type).is_copyable() {
            return None;
        }
        let mut block = src.clone();
        reset_copied_header(&mut block);
        block.tags = IdTags::NO_MAIN | IdTags::NO_USER_REFCOUNT;
        block.session_uid = self.uid_generator().next_uid();
        if let Some(embedded) = block.data.embedded_mut() {
            embedded.session_uid = self.uid_generator().next_uid();
        }
        Some(block)
    }
}

fn reset_copied_header(block: &mut IdBlock) {
    block.flags.remove(IdFlags::FAKE_USER);
    block.tags = IdTags::NO_MAIN;
    block.users = 0;
    block.session_uid = SessionUid::UNSET;
    block.new_id = None;
    if let Some(embedded) = block.data.embedded_mut() {
        embedded.session_uid = SessionUid::UNSET;
    }
}
