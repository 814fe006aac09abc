//! User counting.
//!
//! A data-block's user count is the number of counted references to it, plus
//! one for a fake user. Two lazy mechanisms sit on top:
//!
//! - the *extra user* (`EXTRA_USER`): an owner that needs the data-block kept
//!   alive without holding a counted reference asks for one real user to
//!   exist. `EXTRA_USER_SET` records that a user was added for that purpose
//!   and is consumed by the next real increment.
//! - the *fake user* (`FAKE_USER`): keeps unused data-blocks from being
//!   purged; it raises the lowest valid count (the floor) to one.
//!
//! Decrementing at the floor is an invariant violation. It is logged and
//! clamped, never propagated.

use crate::foreach_id::{LinkFlags, WalkControl, WalkFlags};
use crate::main::Main;
use crate::types::{IdFlags, IdHandle, IdTags, IdType};
use tracing::{debug, error};

impl Main {
    /// Add a user and mark linked data as directly used.
    pub fn id_us_plus(&mut self, handle: IdHandle) {
        self.id_us_plus_no_lib(handle);
        self.id_lib_extern(handle);
    }

    /// Add a user without touching linkage tags.
    pub fn id_us_plus_no_lib(&mut self, handle: IdHandle) {
        let Some(block) = self.get_mut(handle) else {
            return;
        };
        if block.tags.contains(IdTags::EXTRA_USER | IdTags::EXTRA_USER_SET) {
            // The pending extra user becomes this real one.
            block.tags.remove(IdTags::EXTRA_USER_SET);
        } else {
            debug_assert!(block.users >= 0);
            block.users += 1;
        }
    }

    /// Remove a user, clamping at the floor.
    pub fn id_us_min(&mut self, handle: IdHandle) {
        let Some(block) = self.get_mut(handle) else {
            return;
        };
        let floor = block.fake_user_floor();
        if block.users <= floor {
            error!(
                id = %handle,
                name = %block.name,
                users = block.users,
                floor,
                "ID user decrement error"
            );
            block.users = floor;
        } else {
            block.users -= 1;
        }
        if block.users == floor && block.tags.contains(IdTags::EXTRA_USER) {
            self.id_us_ensure_real(handle);
        }
    }

    /// Make sure the data-block has one real user beyond its floor, recorded
    /// as the extra user.
    pub fn id_us_ensure_real(&mut self, handle: IdHandle) {
        let Some(block) = self.get_mut(handle) else {
            return;
        };
        let floor = block.fake_user_floor();
        block.tags.insert(IdTags::EXTRA_USER);
        if block.users <= floor {
            if block.users < floor
                || (block.users == floor && block.tags.contains(IdTags::EXTRA_USER_SET))
            {
                error!(id = %handle, name = %block.name, users = block.users, "ID user count error");
            }
            block.users = floor + 1;
            block.tags.insert(IdTags::EXTRA_USER_SET);
        }
    }

    /// Drop the extra user, removing the real user added for it if any.
    pub fn id_us_clear_real(&mut self, handle: IdHandle) {
        let Some(block) = self.get_mut(handle) else {
            return;
        };
        if !block.tags.contains(IdTags::EXTRA_USER) {
            return;
        }
        if block.tags.contains(IdTags::EXTRA_USER_SET) {
            block.users -= 1;
            debug_assert!(block.users >= block.fake_user_floor());
        }
        block.tags.remove(IdTags::EXTRA_USER | IdTags::EXTRA_USER_SET);
    }

    /// Set the fake user, which counts as one user.
    pub fn fake_user_set(&mut self, handle: IdHandle) {
        let Some(block) = self.get_mut(handle) else {
            return;
        };
        if !block.flags.contains(IdFlags::FAKE_USER) {
            // The fake user raises the floor; a pending extra user stays
            // pending on top of it.
            block.flags.insert(IdFlags::FAKE_USER);
            block.users += 1;
            self.id_lib_extern(handle);
        }
    }

    /// Clear the fake user and its user.
    pub fn fake_user_clear(&mut self, handle: IdHandle) {
        let Some(block) = self.get_mut(handle) else {
            return;
        };
        if block.flags.contains(IdFlags::FAKE_USER) {
            block.flags.remove(IdFlags::FAKE_USER);
            self.id_us_min(handle);
        }
    }

    /// Mark indirectly linked data as directly used (`INDIRECT` → `EXTERN`).
    ///
    /// The owning library loses its parent: it is now used directly.
    pub fn id_lib_extern(&mut self, handle: IdHandle) {
        let Some(block) = self.get_mut(handle) else {
            return;
        };
        let Some(library) = block.library else {
            return;
        };
        if !block.tags.contains(IdTags::INDIRECT) {
            return;
        }
        block.tags.remove(IdTags::INDIRECT);
        block.tags.insert(IdTags::EXTERN);
        block.flags.remove(IdFlags::INDIRECT_WEAK_LINK);
        if let Some(lib) = self.get_mut(library).and_then(|b| b.data.as_library_mut()) {
            lib.parent = None;
        }
    }

    /// Flag indirectly linked data as weakly linked: kept while loading,
    /// without becoming directly used.
    pub fn id_lib_indirect_weak_link(&mut self, handle: IdHandle) {
        if let Some(block) = self.get_mut(handle)
            && block.is_linked()
            && block.tags.contains(IdTags::INDIRECT)
        {
            block.flags.insert(IdFlags::INDIRECT_WEAK_LINK);
        }
    }

    /// Recompute every user count from the references in the database.
    ///
    /// With `linked_only`, only linked data-blocks are reset and counted.
    pub fn refcount_recompute(&mut self, linked_only: bool) {
        let handles = self.handles();
        for handle in &handles {
            let Some(block) = self.get_mut(*handle) else {
                continue;
            };
            if linked_only && !block.is_linked() {
                continue;
            }
            block.users = block.fake_user_floor();
            let extra_user = block.tags.contains(IdTags::EXTRA_USER);
            let virtual_user = matches!(block.id_type, IdType::Scene | IdType::Screen);
            if extra_user {
                block.tags.remove(IdTags::EXTRA_USER | IdTags::EXTRA_USER_SET);
                self.id_us_ensure_real(*handle);
            }
            if virtual_user {
                self.id_us_ensure_real(*handle);
            }
        }

        let mut users = Vec::new();
        let mut users_one = Vec::new();
        for handle in &handles {
            self.foreach_link(*handle, WalkFlags::INCLUDE_UI, |link| {
                if let Some(target) = link.target
                    && !link.flags.contains(LinkFlags::LOOPBACK)
                    && (!linked_only || self.get(target).is_some_and(|b| b.is_linked()))
                {
                    if link.flags.contains(LinkFlags::USER) {
                        users.push(target);
                    }
                    if link.flags.contains(LinkFlags::USER_ONE) {
                        users_one.push(target);
                    }
                }
                WalkControl::Continue
            });
        }
        // Pending extra users are consumed like incremental increments do.
        for target in users {
            self.id_us_plus_no_lib(target);
        }
        for target in users_one {
            self.id_us_ensure_real(target);
        }
        debug!(ids = handles.len(), linked_only, "User counts recomputed");
    }
}
