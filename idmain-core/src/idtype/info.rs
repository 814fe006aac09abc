//! Per-type capability table.

use crate::id::IdBlock;
use crate::library::MakeLocalFlags;
use crate::main::{CopyFlags, Main};
use crate::types::{IdHandle, IdType, flag_set};

flag_set! {
    /// Behavior flags of a data-block type.
    pub struct IdTypeFlags(u32) {
        /// Data-blocks of this type cannot be copied.
        const NO_COPY = 1 << 0;
        /// Data-blocks of this type cannot be linked from another file.
        const NO_LIBLINKING = 1 << 1;
        /// Never considered unused by orphan purging.
        const NEVER_UNUSED = 1 << 2;
    }
}

/// Fill a freshly created data-block with its type defaults.
pub type InitDataFn = fn(&mut Main, IdHandle);
/// Finish a copy from `src` into `dst` (sub-data the generic copy cannot see).
pub type CopyDataFn = fn(&mut Main, IdHandle, IdHandle, CopyFlags);
/// Release type-specific runtime data before the block is dropped.
pub type FreeDataFn = fn(&mut IdBlock);
/// Return the data-block owning this one.
pub type OwnerGetFn = fn(&IdBlock) -> Option<IdHandle>;
/// Type-specific replacement for the generic make-local.
pub type MakeLocalFn = fn(&mut Main, IdHandle, MakeLocalFlags) -> bool;

/// Static description of a data-block type.
pub struct IdTypeInfo {
    /// The described type.
    pub id_type: IdType,
    /// Singular user-facing name, also the default data-block name.
    pub name: &'static str,
    /// Plural user-facing name.
    pub name_plural: &'static str,
    /// Behavior flags.
    pub flags: IdTypeFlags,
    /// Default payload initialization.
    pub init_data: Option<InitDataFn>,
    /// Copy of sub-data.
    pub copy_data: Option<CopyDataFn>,
    /// Release of runtime data.
    pub free_data: Option<FreeDataFn>,
    /// Owner lookup for data-blocks that belong to another one.
    pub owner_get: Option<OwnerGetFn>,
    /// Custom make-local.
    pub make_local: Option<MakeLocalFn>,
}

impl std::fmt::Debug for IdTypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTypeInfo")
            .field("id_type", &self.id_type)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl IdTypeInfo {
    const fn plain(id_type: IdType, name: &'static str, name_plural: &'static str) -> Self {
        Self {
            id_type,
            name,
            name_plural,
            flags: IdTypeFlags::empty(),
            init_data: None,
            copy_data: None,
            free_data: None,
            owner_get: None,
            make_local: None,
        }
    }

    /// Whether data-blocks of this type can be copied.
    #[must_use]
    pub fn is_copyable(&self) -> bool {
        !self.flags.contains(IdTypeFlags::NO_COPY)
    }

    /// Whether data-blocks of this type can be linked from libraries.
    #[must_use]
    pub fn is_linkable(&self) -> bool {
        !self.flags.contains(IdTypeFlags::NO_LIBLINKING)
    }
}

static ID_TYPE_INFOS: [IdTypeInfo; IdType::COUNT] = [
    IdTypeInfo {
        flags: IdTypeFlags::NO_COPY
            .union(IdTypeFlags::NO_LIBLINKING)
            .union(IdTypeFlags::NEVER_UNUSED),
        ..IdTypeInfo::plain(IdType::Library, "Library", "libraries")
    },
    IdTypeInfo::plain(IdType::Object, "Object", "objects"),
    IdTypeInfo {
        copy_data: Some(mesh_copy_data),
        ..IdTypeInfo::plain(IdType::Mesh, "Mesh", "meshes")
    },
    IdTypeInfo {
        flags: IdTypeFlags::NO_LIBLINKING,
        owner_get: Some(key_owner_get),
        make_local: Some(key_make_local),
        ..IdTypeInfo::plain(IdType::Key, "Key", "shape_keys")
    },
    IdTypeInfo {
        free_data: Some(free_embedded),
        ..IdTypeInfo::plain(IdType::Material, "Material", "materials")
    },
    IdTypeInfo {
        owner_get: Some(embedded_owner_get),
        ..IdTypeInfo::plain(IdType::NodeTree, "NodeTree", "node_groups")
    },
    IdTypeInfo::plain(IdType::Image, "Image", "images"),
    IdTypeInfo {
        init_data: Some(camera_init_data),
        ..IdTypeInfo::plain(IdType::Camera, "Camera", "cameras")
    },
    IdTypeInfo {
        init_data: Some(light_init_data),
        free_data: Some(free_embedded),
        ..IdTypeInfo::plain(IdType::Light, "Light", "lights")
    },
    IdTypeInfo {
        free_data: Some(free_embedded),
        ..IdTypeInfo::plain(IdType::World, "World", "worlds")
    },
    IdTypeInfo {
        owner_get: Some(embedded_owner_get),
        ..IdTypeInfo::plain(IdType::Collection, "Collection", "collections")
    },
    IdTypeInfo {
        flags: IdTypeFlags::NEVER_UNUSED,
        init_data: Some(scene_init_data),
        free_data: Some(free_embedded),
        ..IdTypeInfo::plain(IdType::Scene, "Scene", "scenes")
    },
    IdTypeInfo {
        init_data: Some(action_init_data),
        ..IdTypeInfo::plain(IdType::Action, "Action", "actions")
    },
    IdTypeInfo::plain(IdType::Text, "Text", "texts"),
    IdTypeInfo {
        flags: IdTypeFlags::NO_COPY
            .union(IdTypeFlags::NO_LIBLINKING)
            .union(IdTypeFlags::NEVER_UNUSED),
        ..IdTypeInfo::plain(IdType::Screen, "Screen", "screens")
    },
];

/// Capability table entry for `id_type`.
#[must_use]
pub fn id_type_info(id_type: IdType) -> &'static IdTypeInfo {
    &ID_TYPE_INFOS[id_type.index()]
}

fn key_owner_get(block: &IdBlock) -> Option<IdHandle> {
    block.data.as_key().and_then(|key| key.from)
}

fn embedded_owner_get(block: &IdBlock) -> Option<IdHandle> {
    block.data.embedded_owner()
}

// Shape keys follow their owner geometry.
fn key_make_local(_main: &mut Main, key: IdHandle, _flags: MakeLocalFlags) -> bool {
    tracing::debug!(key = %key, "Shape keys are made local together with their owner");
    false
}

fn mesh_copy_data(main: &mut Main, src: IdHandle, dst: IdHandle, flags: CopyFlags) {
    let Some(key) = main
        .get(src)
        .and_then(|block| block.data.as_mesh())
        .and_then(|mesh| mesh.key)
    else {
        return;
    };
    let Some(key_copy) = main.copy(key, flags.difference(CopyFlags::FOR_DUPLICATE)) else {
        return;
    };
    if let Some(copied) = main.get_mut(key_copy)
        && let Some(key_data) = copied.data.as_key_mut()
    {
        key_data.from = Some(dst);
    }
    if let Some(mesh) = main.get_mut(dst).and_then(|block| block.data.as_mesh_mut()) {
        mesh.key = Some(key_copy);
    }
    // The generic copy pass counts the mesh as the key's user.
    if !flags.contains(CopyFlags::NO_USER_REFCOUNT) {
        main.id_us_min(key_copy);
    }
}

fn free_embedded(block: &mut IdBlock) {
    if let Some(slot) = block.data.embedded_slot_mut() {
        slot.take();
    }
}

fn scene_init_data(main: &mut Main, scene: IdHandle) {
    main.add_embedded(scene, IdType::Collection);
}

fn camera_init_data(main: &mut Main, camera: IdHandle) {
    if let Some(crate::idtype::IdData::Camera(data)) = main.get_mut(camera).map(|b| &mut b.data) {
        data.lens = 50.0;
    }
}

fn light_init_data(main: &mut Main, light: IdHandle) {
    if let Some(crate::idtype::IdData::Light(data)) = main.get_mut(light).map(|b| &mut b.data) {
        data.energy = 10.0;
    }
}

fn action_init_data(main: &mut Main, action: IdHandle) {
    if let Some(crate::idtype::IdData::Action(data)) = main.get_mut(action).map(|b| &mut b.data) {
        data.frame_start = 1.0;
        data.frame_end = 250.0;
    }
}
