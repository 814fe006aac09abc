//! Single and batch deletion.
//!
//! Deletion grows the requested set to a fixed point before anything is
//! freed: data-blocks linked from a deleted library, sub-data owned by a
//! deleted data-block (shape keys) and, when cascading, data-blocks left with
//! a dangling never-null reference all join the set. References from the
//! survivors are then cleared through the remapper, references among the
//! deleted data-blocks are dropped, and only then are the blocks freed.

use crate::config::MainConfig;
use crate::id::IdBlock;
use crate::idtype::{IdTypeFlags, id_type_info};
use crate::main::Main;
use crate::notify::IdChangeKind;
use crate::remap::{IdRemapper, RelinkType, RemapFlags};
use crate::types::{IdHandle, IdTags, IdType};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Options of a batch deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Delete data-blocks whose never-null references would dangle, instead
    /// of clearing those references.
    pub cascade_never_null: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            cascade_never_null: true,
        }
    }
}

impl From<&MainConfig> for DeleteOptions {
    fn from(config: &MainConfig) -> Self {
        Self {
            cascade_never_null: config.cascade_never_null_on_delete(),
        }
    }
}

impl Main {
    /// Delete one data-block. Returns the number of data-blocks freed.
    pub fn delete(&mut self, id: IdHandle) -> usize {
        self.delete_multiple(&[id])
    }

    /// Delete data-blocks with the configured cascading behavior.
    pub fn delete_multiple(&mut self, ids: &[IdHandle]) -> usize {
        let options = DeleteOptions::from(self.config());
        self.delete_multiple_with(ids, options)
    }

    /// Delete data-blocks. Returns the number of data-blocks freed.
    pub fn delete_multiple_with(&mut self, ids: &[IdHandle], options: DeleteOptions) -> usize {
        let mut doomed: Vec<IdHandle> = Vec::new();
        let mut doomed_set: HashSet<IdHandle> = HashSet::new();
        for id in ids {
            if self.contains(*id) && doomed_set.insert(*id) {
                doomed.push(*id);
            }
        }
        if doomed.is_empty() {
            return 0;
        }

        let mut flags = RemapFlags::STORE_NEVER_NULL_USAGE | RemapFlags::FORCE_UI_POINTERS;
        if !options.cascade_never_null {
            flags |= RemapFlags::FORCE_NEVER_NULL_USAGE;
        }
        let mut remapper = IdRemapper::new();
        let mut unlisted = 0;
        let mut pass = 0;
        loop {
            self.expand_deletion_closure(&mut doomed, &mut doomed_set);
            if unlisted == doomed.len() {
                break;
            }
            pass += 1;
            let fresh = doomed[unlisted..].to_vec();
            unlisted = doomed.len();
            for id in &fresh {
                self.unlist_for_deletion(*id);
                remapper.insert(*id, None);
            }

            self.remap_multiple(&mut remapper, flags);
            if options.cascade_never_null {
                for user in remapper.never_null_users().clone() {
                    if doomed_set.insert(user) {
                        doomed.push(user);
                    }
                }
            }
            trace!(pass, added = fresh.len(), total = doomed.len(), "Deletion pass");
        }

        // Drop references among the deleted data-blocks; survivors lose the
        // users the deleted blocks held.
        self.relink_multiple(
            &doomed,
            RelinkType::Cleanup,
            &mut remapper,
            RemapFlags::DO_LOOPBACK_POINTERS | RemapFlags::SKIP_UPDATE_TAGGING,
        );

        let mut freed = 0;
        let mut freed_library = false;
        for id in &doomed {
            let Some(mut block) = self.arena.remove(*id) else {
                continue;
            };
            release_block(&mut block);
            freed_library |= block.id_type() == IdType::Library;
            self.notify_block(block.session_uid(), block.id_type(), IdChangeKind::Freed);
            freed += 1;
        }
        self.structure_changed();
        if freed_library {
            self.rebuild_hierarchy();
        }
        debug!(requested = ids.len(), freed, passes = pass, "Data-blocks deleted");
        freed
    }

    /// Delete every data-block without users, fake user or a type that is
    /// never considered unused. With `recursive`, repeat until no new orphan
    /// appears. Returns the number of data-blocks freed.
    pub fn purge_unused(&mut self, recursive: bool) -> usize {
        let mut total = 0;
        loop {
            let orphans: Vec<IdHandle> = self
                .iter_all()
                .filter(|(_, block)| is_orphan(block))
                .map(|(handle, _)| handle)
                .collect();
            if orphans.is_empty() {
                break;
            }
            for orphan in &orphans {
                if let Some(block) = self.get_mut(*orphan) {
                    block.tags.insert(IdTags::DOIT);
                }
            }
            let freed = self.delete_multiple(&orphans);
            total += freed;
            if !recursive || freed == 0 {
                break;
            }
        }
        debug!(freed = total, recursive, "Unused data-blocks purged");
        total
    }

    /// Grow the deletion set: data of deleted libraries and sub-data of
    /// deleted owners.
    fn expand_deletion_closure(
        &self,
        doomed: &mut Vec<IdHandle>,
        doomed_set: &mut HashSet<IdHandle>,
    ) {
        loop {
            let added: Vec<IdHandle> = self
                .iter_all()
                .filter(|(handle, block)| {
                    !doomed_set.contains(handle)
                        && (block.library().is_some_and(|lib| doomed_set.contains(&lib))
                            || self.id_owner(*handle).is_some_and(|o| doomed_set.contains(&o)))
                })
                .map(|(handle, _)| handle)
                .collect();
            if added.is_empty() {
                return;
            }
            for handle in added {
                doomed_set.insert(handle);
                doomed.push(handle);
            }
        }
    }

    /// Take a data-block out of its list and release its name, keeping it in
    /// the arena until it is freed.
    fn unlist_for_deletion(&mut self, id: IdHandle) {
        let Some(block) = self.get(id) else {
            return;
        };
        let (id_type, library, name) = (block.id_type(), block.library(), block.name().to_string());
        self.name_maps.remove(id_type, library, &name);
        self.lists[id_type.index()].retain(|h| *h != id);
    }
}

fn is_orphan(block: &IdBlock) -> bool {
    block.users() <= 0
        && !block.has_fake_user()
        && !id_type_info(block.id_type())
            .flags
            .contains(IdTypeFlags::NEVER_UNUSED)
}

fn release_block(block: &mut IdBlock) {
    block.users = block.fake_user_floor();
    block.tags.insert(IdTags::NO_MAIN);
    if let Some(free_data) = id_type_info(block.id_type()).free_data {
        free_data(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main::AllocFlags;
    use crate::notify::IdChange;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct ShapeKeyScene {
        main: Main,
        mesh: IdHandle,
        key: IdHandle,
        object: IdHandle,
    }

    fn shape_key_scene() -> ShapeKeyScene {
        let mut main = Main::standalone();
        let mesh = main.new_id(IdType::Mesh, "A");
        let key = main.new_id(IdType::Key, "Key");
        main.get_mut(key).unwrap().data.as_key_mut().unwrap().from = Some(mesh);
        main.get_mut(mesh).unwrap().data.as_mesh_mut().unwrap().key = Some(key);
        let object = main.new_id(IdType::Object, "B");
        main.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(mesh);
        main.refcount_recompute(false);
        ShapeKeyScene {
            main,
            mesh,
            key,
            object,
        }
    }

    #[test]
    fn cascading_delete_takes_never_null_users() {
        let ShapeKeyScene {
            mut main,
            mesh,
            key,
            object,
        } = shape_key_scene();
        let freed = main.delete_multiple_with(&[mesh], DeleteOptions::default());
        assert_eq!(freed, 3);
        for id in [mesh, key, object] {
            assert!(main.get(id).is_none());
        }
        assert!(main.is_empty());
    }

    #[test]
    fn non_cascading_delete_clears_never_null_fields() {
        let ShapeKeyScene {
            mut main,
            mesh,
            key,
            object,
        } = shape_key_scene();
        let options = DeleteOptions {
            cascade_never_null: false,
        };
        assert_eq!(main.delete_multiple_with(&[mesh], options), 2);
        assert!(main.get(key).is_none());
        let block = main.get(object).unwrap();
        assert_eq!(block.data.as_object().unwrap().data, None);
        assert_eq!(main.list(IdType::Mesh), &[] as &[IdHandle]);
    }

    #[test]
    fn delete_releases_users_of_survivors() {
        let mut main = Main::standalone();
        let material = main.new_id(IdType::Material, "Red");
        let object = main.new_id(IdType::Object, "Cube");
        main.get_mut(object)
            .unwrap()
            .data
            .as_object_mut()
            .unwrap()
            .materials
            .push(Some(material));
        main.refcount_recompute(false);
        assert_eq!(main.get(material).unwrap().users(), 1);

        assert_eq!(main.delete(object), 1);
        assert_eq!(main.get(material).unwrap().users(), 0);
        assert!(main.find_by_name(IdType::Object, "Cube").is_none());
        // The name is free again.
        let again = main.new_id(IdType::Object, "Cube");
        assert_eq!(main.get(again).unwrap().name(), "Cube");
    }

    #[test]
    fn deleting_a_library_deletes_its_data() {
        let mut main = Main::standalone();
        let lib = main.new_library("lib", "//lib.blend");
        let linked = main
            .alloc_in_lib(Some(lib), IdType::Material, None, AllocFlags::empty())
            .unwrap();
        let object = main.new_id(IdType::Object, "Cube");
        main.get_mut(object)
            .unwrap()
            .data
            .as_object_mut()
            .unwrap()
            .materials
            .push(Some(linked));

        assert_eq!(main.delete(lib), 2);
        assert!(main.get(linked).is_none());
        let materials = &main.get(object).unwrap().data.as_object().unwrap().materials;
        assert_eq!(materials, &vec![None]);
    }

    #[test]
    fn freed_events_are_published() {
        let ShapeKeyScene { mut main, mesh, .. } = shape_key_scene();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        main.subscribe(Arc::new(move |change: &IdChange| {
            sink.lock().push(change.kind.clone());
        }));
        main.delete(mesh);
        let events = events.lock();
        assert_eq!(
            events.iter().filter(|k| **k == IdChangeKind::Freed).count(),
            3
        );
    }

    #[test]
    fn stale_and_repeated_handles_are_ignored() {
        let mut main = Main::standalone();
        let text = main.new_id(IdType::Text, "Notes");
        assert_eq!(main.delete_multiple(&[text, text]), 1);
        assert_eq!(main.delete(text), 0);
    }

    #[test]
    fn purge_removes_orphans_recursively() {
        let mut main = Main::standalone();
        let image = main.new_id(IdType::Image, "Brick");
        let material = main.new_id(IdType::Material, "Wall");
        main.get_mut(material)
            .unwrap()
            .data
            .as_material_mut()
            .unwrap()
            .images
            .push(Some(image));
        let kept = main.new_id(IdType::Text, "Kept");
        main.fake_user_set(kept);
        let scene = main.new_id(IdType::Scene, "Scene");
        main.refcount_recompute(false);

        assert_eq!(main.purge_unused(false), 1);
        assert!(main.get(material).is_none());
        assert!(main.get(image).is_some());

        assert_eq!(main.purge_unused(true), 1);
        assert!(main.get(image).is_none());
        assert!(main.get(kept).is_some());
        assert!(main.get(scene).is_some());
    }
}
