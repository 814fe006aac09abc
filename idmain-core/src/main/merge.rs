//! Merging a scratch database into another one.

use super::{IdNewNameMode, Main};
use crate::foreach_id::{WalkControl, WalkFlags};
use crate::notify::IdChangeKind;
use crate::types::{IdHandle, IdType, SessionUid};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Outcome of [`Main::merge_from`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Data-blocks moved into the destination.
    pub moved: usize,
    /// Linked data-blocks already present in the destination, dropped.
    pub duplicates: usize,
    /// Moved data-blocks that had to change name.
    pub renamed: usize,
    /// Libraries matched to an existing library by file path.
    pub libraries_merged: usize,
}

/// Move every data-block of `src` into `dst`.
pub fn merge_into(dst: &mut Main, src: Main) -> MergeReport {
    dst.merge_from(src)
}

impl Main {
    /// Move every data-block of `src` into this database.
    ///
    /// Libraries are matched by file path. Linked data-blocks that already
    /// exist in the matched library are dropped and references to them point
    /// at the existing ones. Moved data-blocks get unique names, and session
    /// UIDs already used here are renewed. User counts and the library
    /// hierarchy are recomputed afterwards.
    pub fn merge_from(&mut self, mut src: Main) -> MergeReport {
        let mut report = MergeReport::default();
        let mut translate: HashMap<IdHandle, IdHandle> = HashMap::new();

        for src_lib in src.list(IdType::Library).to_vec() {
            let Some(filepath) = src
                .get(src_lib)
                .and_then(|b| b.data.as_library())
                .map(|lib| lib.filepath.clone())
            else {
                continue;
            };
            if let Some(dst_lib) = self.find_library_by_filepath(&filepath) {
                translate.insert(src_lib, dst_lib);
                report.libraries_merged += 1;
            }
        }

        let mut to_move = Vec::new();
        for (src_handle, block) in src.iter_all() {
            if translate.contains_key(&src_handle) {
                continue;
            }
            let existing = block
                .library
                .and_then(|lib| translate.get(&lib))
                .and_then(|dst_lib| {
                    self.find_by_name_and_library(block.id_type, &block.name, Some(*dst_lib))
                });
            match existing {
                Some(existing) => {
                    translate.insert(src_handle, existing);
                    report.duplicates += 1;
                }
                None => to_move.push(src_handle),
            }
        }

        let mut used_uids: HashSet<SessionUid> = self
            .iter_all()
            .map(|(_, block)| block.session_uid)
            .collect();
        let mut moved = Vec::with_capacity(to_move.len());
        for src_handle in to_move {
            let Some(block) = src.arena.remove(src_handle) else {
                continue;
            };
            let dst_handle = self.arena.insert(block);
            translate.insert(src_handle, dst_handle);
            moved.push(dst_handle);
        }

        for dst_handle in &moved {
            self.translate_handles(*dst_handle, &translate);
            // Kept and newly issued UIDs both count as taken for later blocks.
            while let Some(uid) = self.get(*dst_handle).map(|b| b.session_uid) {
                if uid.is_set() && used_uids.insert(uid) {
                    break;
                }
                self.session_uid_renew(*dst_handle);
            }
            self.attach_embedded(*dst_handle);
        }

        self.name_maps.clear();
        for dst_handle in &moved {
            let Some(block) = self.get(*dst_handle) else {
                continue;
            };
            let (id_type, library) = (block.id_type, block.library);
            self.ensure_name_scope(library);
            self.lists[id_type.index()].push(*dst_handle);
            let result =
                self.new_name_validate(*dst_handle, None, IdNewNameMode::RenameExistingNever, true);
            if result.is_renamed() {
                report.renamed += 1;
            }
            self.notify_change(*dst_handle, IdChangeKind::Created);
        }
        report.moved = moved.len();

        self.structure_changed();
        self.rebuild_hierarchy();
        self.refcount_recompute(false);
        debug!(
            moved = report.moved,
            duplicates = report.duplicates,
            renamed = report.renamed,
            libraries_merged = report.libraries_merged,
            "Databases merged"
        );
        report
    }

    /// Rewrite every handle held by a moved data-block from source handles to
    /// destination handles.
    fn translate_handles(&mut self, handle: IdHandle, translate: &HashMap<IdHandle, IdHandle>) {
        let Some(block) = self.arena.get_mut(handle) else {
            return;
        };
        if let Some(src_lib) = block.library {
            block.library = translate.get(&src_lib).copied();
            if block.library.is_none() {
                warn!(id = %handle, name = %block.name, "Library missing from merged database, data made local");
            }
        }
        block.new_id = block.new_id.and_then(|h| translate.get(&h).copied());
        if let Some(library) = block.data.as_library_mut() {
            library.parent = library.parent.and_then(|h| translate.get(&h).copied());
        }
        let walk = WalkFlags::INCLUDE_UI;
        block.foreach_link_mut(walk, &mut |slot, _| {
            *slot = slot.and_then(|h| translate.get(&h).copied());
            WalkControl::Continue
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main::AllocFlags;
    use crate::types::{IdTags, SessionUidGenerator};
    use std::sync::Arc;

    #[test]
    fn local_data_moves_with_unique_names() {
        let generator = Arc::new(SessionUidGenerator::new());
        let mut dst = Main::new(Arc::clone(&generator));
        dst.new_id(IdType::Mesh, "Cube");

        let mut src = Main::new(generator);
        let mesh = src.new_id(IdType::Mesh, "Cube");
        let object = src.new_id(IdType::Object, "Cube");
        src.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(mesh);

        let report = merge_into(&mut dst, src);
        assert_eq!(report.moved, 2);
        assert_eq!(report.renamed, 1);
        let object = dst.find_by_name(IdType::Object, "Cube").unwrap();
        let mesh = dst.find_by_name(IdType::Mesh, "Cube.001").unwrap();
        assert_eq!(dst.get(object).unwrap().data.as_object().unwrap().data, Some(mesh));
        assert_eq!(dst.get(mesh).unwrap().users(), 1);
        assert!(dst.namemap_validate());
    }

    #[test]
    fn linked_duplicates_resolve_to_existing_data() {
        let mut dst = Main::standalone();
        let lib = dst.new_library("lib", "//lib.blend");
        let rock = dst
            .alloc_in_lib(Some(lib), IdType::Mesh, Some("Rock"), AllocFlags::empty())
            .unwrap();

        let mut src = Main::standalone();
        let src_lib = src.new_library("lib", "//lib.blend");
        let src_rock = src
            .alloc_in_lib(Some(src_lib), IdType::Mesh, Some("Rock"), AllocFlags::empty())
            .unwrap();
        let object = src.new_id(IdType::Object, "Rock");
        src.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(src_rock);

        let report = dst.merge_from(src);
        assert_eq!(report.libraries_merged, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.moved, 1);
        assert_eq!(dst.count(IdType::Library), 1);
        assert_eq!(dst.count(IdType::Mesh), 1);
        let object = dst.find_by_name(IdType::Object, "Rock").unwrap();
        assert_eq!(dst.get(object).unwrap().data.as_object().unwrap().data, Some(rock));
        assert_eq!(dst.get(rock).unwrap().users(), 1);
    }

    #[test]
    fn new_libraries_come_along() {
        let mut dst = Main::standalone();
        let mut src = Main::standalone();
        let src_lib = src.new_library("props", "//props.blend");
        let chair = src
            .alloc_in_lib(Some(src_lib), IdType::Object, Some("Chair"), AllocFlags::empty())
            .unwrap();
        src.id_lib_extern(chair);

        let report = dst.merge_from(src);
        assert_eq!(report.moved, 2);
        let lib = dst.find_library_by_filepath("//props.blend").unwrap();
        let chair = dst
            .find_by_name_and_library(IdType::Object, "Chair", Some(lib))
            .unwrap();
        assert!(dst.get(chair).unwrap().tags().contains(IdTags::EXTERN));
        assert_eq!(dst.full_name(chair).as_deref(), Some("Chair [props]"));
    }

    #[test]
    fn colliding_session_uids_are_renewed() {
        let mut dst = Main::standalone();
        let existing = dst.new_id(IdType::Text, "A");
        let mut src = Main::standalone();
        src.new_id(IdType::Text, "B");

        dst.merge_from(src);
        let moved = dst.find_by_name(IdType::Text, "B").unwrap();
        assert_ne!(
            dst.get(moved).unwrap().session_uid(),
            dst.get(existing).unwrap().session_uid()
        );
        assert_eq!(dst.find_by_uid(dst.get(moved).unwrap().session_uid()), Some(moved));
    }

    #[test]
    fn embedded_data_follows_its_owner() {
        let mut dst = Main::standalone();
        let mut src = Main::standalone();
        src.new_id(IdType::Scene, "Scene");

        dst.merge_from(src);
        let scene = dst.find_by_name(IdType::Scene, "Scene").unwrap();
        let master = dst.get(scene).unwrap().data.embedded().unwrap();
        assert_eq!(master.data.embedded_owner(), Some(scene));
    }
}
