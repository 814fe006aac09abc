//! Per-type payloads and their reference fields.

use crate::foreach_id::{LinkFlags, WalkControl};
use crate::id::IdBlock;
use crate::types::IdHandle;

/// Read-only reference visitor used by payload walks.
pub type LinkVisitor<'a> = dyn FnMut(Option<IdHandle>, LinkFlags) -> WalkControl + 'a;

/// Mutable reference visitor used by payload walks.
pub type LinkVisitorMut<'a> = dyn FnMut(&mut Option<IdHandle>, LinkFlags) -> WalkControl + 'a;

macro_rules! visit {
    ($visit:expr, $slot:expr, $flags:expr) => {
        if $visit($slot, $flags) == WalkControl::Stop {
            return WalkControl::Stop;
        }
    };
}

/// An external file data-blocks are linked from.
#[derive(Debug, Clone, Default)]
pub struct LibraryData {
    /// Path of the library file, used to match libraries between databases.
    pub filepath: String,
    /// The library that (indirectly) caused this one to be loaded.
    /// Maintained by the hierarchy builder, never walked.
    pub parent: Option<IdHandle>,
    /// Distance to the nearest directly used library.
    pub hierarchy_depth: u32,
}

/// Scene object.
#[derive(Debug, Clone, Default)]
pub struct ObjectData {
    /// Object data (mesh, camera, light).
    pub data: Option<IdHandle>,
    /// Parent object.
    pub parent: Option<IdHandle>,
    /// Material slots.
    pub materials: Vec<Option<IdHandle>>,
    /// Active animation action.
    pub action: Option<IdHandle>,
}

impl ObjectData {
    fn foreach_id(&self, visit: &mut LinkVisitor<'_>) -> WalkControl {
        visit!(visit, self.data, LinkFlags::USER | LinkFlags::NEVER_NULL);
        visit!(visit, self.parent, LinkFlags::NEVER_SELF);
        visit!(visit, self.action, LinkFlags::USER);
        for material in &self.materials {
            visit!(visit, *material, LinkFlags::USER);
        }
        WalkControl::Continue
    }

    fn foreach_id_mut(&mut self, visit: &mut LinkVisitorMut<'_>) -> WalkControl {
        visit!(visit, &mut self.data, LinkFlags::USER | LinkFlags::NEVER_NULL);
        visit!(visit, &mut self.parent, LinkFlags::NEVER_SELF);
        visit!(visit, &mut self.action, LinkFlags::USER);
        for material in &mut self.materials {
            visit!(visit, material, LinkFlags::USER);
        }
        WalkControl::Continue
    }
}

/// Polygon mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Shape keys deforming this mesh.
    pub key: Option<IdHandle>,
    /// Material slots.
    pub materials: Vec<Option<IdHandle>>,
}

impl MeshData {
    fn foreach_id(&self, visit: &mut LinkVisitor<'_>) -> WalkControl {
        visit!(visit, self.key, LinkFlags::USER);
        for material in &self.materials {
            visit!(visit, *material, LinkFlags::USER);
        }
        WalkControl::Continue
    }

    fn foreach_id_mut(&mut self, visit: &mut LinkVisitorMut<'_>) -> WalkControl {
        visit!(visit, &mut self.key, LinkFlags::USER);
        for material in &mut self.materials {
            visit!(visit, material, LinkFlags::USER);
        }
        WalkControl::Continue
    }
}

/// Shape keys. Owned by the geometry in `from`.
#[derive(Debug, Clone, Default)]
pub struct KeyData {
    /// The geometry this key set deforms.
    pub from: Option<IdHandle>,
}

/// Surface material.
#[derive(Debug, Clone, Default)]
pub struct MaterialData {
    /// Embedded shading node tree.
    pub nodetree: Option<Box<IdBlock>>,
    /// Images used by the material.
    pub images: Vec<Option<IdHandle>>,
}

impl MaterialData {
    fn foreach_id(&self, visit: &mut LinkVisitor<'_>) -> WalkControl {
        for image in &self.images {
            visit!(visit, *image, LinkFlags::USER);
        }
        WalkControl::Continue
    }

    fn foreach_id_mut(&mut self, visit: &mut LinkVisitorMut<'_>) -> WalkControl {
        for image in &mut self.images {
            visit!(visit, image, LinkFlags::USER);
        }
        WalkControl::Continue
    }
}

/// Node tree.
#[derive(Debug, Clone, Default)]
pub struct NodeTreeData {
    /// Owner when embedded.
    pub owner: Option<IdHandle>,
    /// Data-blocks referenced by nodes (images, groups, texts).
    pub node_refs: Vec<Option<IdHandle>>,
}

/// Image.
#[derive(Debug, Clone, Default)]
pub struct ImageData {
    /// Source path.
    pub filepath: String,
}

/// Camera object data.
#[derive(Debug, Clone, Default)]
pub struct CameraData {
    /// Focal length in millimeters.
    pub lens: f32,
}

/// Light object data.
#[derive(Debug, Clone, Default)]
pub struct LightData {
    /// Emitted power in watts.
    pub energy: f32,
    /// Embedded shading node tree.
    pub nodetree: Option<Box<IdBlock>>,
}

/// World environment.
#[derive(Debug, Clone, Default)]
pub struct WorldData {
    /// Embedded shading node tree.
    pub nodetree: Option<Box<IdBlock>>,
}

/// Collection of objects.
#[derive(Debug, Clone, Default)]
pub struct CollectionData {
    /// Owner scene when this is a scene master collection.
    pub owner: Option<IdHandle>,
    /// Objects in the collection.
    pub objects: Vec<Option<IdHandle>>,
    /// Child collections.
    pub children: Vec<Option<IdHandle>>,
}

/// Scene.
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    /// Active camera object.
    pub camera: Option<IdHandle>,
    /// World environment.
    pub world: Option<IdHandle>,
    /// Background scene.
    pub set: Option<IdHandle>,
    /// Embedded root collection.
    pub master_collection: Option<Box<IdBlock>>,
}

/// Animation action.
#[derive(Debug, Clone, Default)]
pub struct ActionData {
    /// First frame.
    pub frame_start: f32,
    /// Last frame.
    pub frame_end: f32,
}

/// Text buffer.
#[derive(Debug, Clone, Default)]
pub struct TextData {
    /// Contents.
    pub body: String,
}

/// Screen layout.
#[derive(Debug, Clone, Default)]
pub struct ScreenData {
    /// Data-blocks shown in the screen's editors.
    pub space_refs: Vec<Option<IdHandle>>,
}

/// Typed payload of a data-block.
#[derive(Debug, Clone)]
pub enum IdData {
    /// Library payload.
    Library(LibraryData),
    /// Object payload.
    Object(ObjectData),
    /// Mesh payload.
    Mesh(MeshData),
    /// Shape key payload.
    Key(KeyData),
    /// Material payload.
    Material(MaterialData),
    /// Node tree payload.
    NodeTree(NodeTreeData),
    /// Image payload.
    Image(ImageData),
    /// Camera payload.
    Camera(CameraData),
    /// Light payload.
    Light(LightData),
    /// World payload.
    World(WorldData),
    /// Collection payload.
    Collection(CollectionData),
    /// Scene payload.
    Scene(SceneData),
    /// Action payload.
    Action(ActionData),
    /// Text payload.
    Text(TextData),
    /// Screen payload.
    Screen(ScreenData),
}

impl IdData {
    /// Default payload for a type.
    #[must_use]
    pub fn new(id_type: crate::types::IdType) -> Self {
        use crate::types::IdType;
        match id_type {
            IdType::Library => Self::Library(LibraryData::default()),
            IdType::Object => Self::Object(ObjectData::default()),
            IdType::Mesh => Self::Mesh(MeshData::default()),
            IdType::Key => Self::Key(KeyData::default()),
            IdType::Material => Self::Material(MaterialData::default()),
            IdType::NodeTree => Self::NodeTree(NodeTreeData::default()),
            IdType::Image => Self::Image(ImageData::default()),
            IdType::Camera => Self::Camera(CameraData::default()),
            IdType::Light => Self::Light(LightData::default()),
            IdType::World => Self::World(WorldData::default()),
            IdType::Collection => Self::Collection(CollectionData::default()),
            IdType::Scene => Self::Scene(SceneData::default()),
            IdType::Action => Self::Action(ActionData::default()),
            IdType::Text => Self::Text(TextData::default()),
            IdType::Screen => Self::Screen(ScreenData::default()),
        }
    }

    /// Visit the reference fields of this payload, embedded data excluded.
    pub fn foreach_id(&self, visit: &mut LinkVisitor<'_>) -> WalkControl {
        match self {
            Self::Object(object) => object.foreach_id(visit),
            Self::Mesh(mesh) => mesh.foreach_id(visit),
            Self::Key(key) => {
                visit!(visit, key.from, LinkFlags::LOOPBACK);
                WalkControl::Continue
            }
            Self::Material(material) => material.foreach_id(visit),
            Self::NodeTree(tree) => {
                visit!(visit, tree.owner, LinkFlags::LOOPBACK | LinkFlags::EMBEDDED_NOT_OWNING);
                for node_ref in &tree.node_refs {
                    visit!(visit, *node_ref, LinkFlags::USER);
                }
                WalkControl::Continue
            }
            Self::Collection(collection) => {
                visit!(
                    visit,
                    collection.owner,
                    LinkFlags::LOOPBACK | LinkFlags::EMBEDDED_NOT_OWNING
                );
                for object in &collection.objects {
                    visit!(visit, *object, LinkFlags::USER);
                }
                for child in &collection.children {
                    visit!(visit, *child, LinkFlags::USER);
                }
                WalkControl::Continue
            }
            Self::Scene(scene) => {
                visit!(visit, scene.camera, LinkFlags::empty());
                visit!(visit, scene.world, LinkFlags::USER);
                visit!(visit, scene.set, LinkFlags::NEVER_SELF);
                WalkControl::Continue
            }
            Self::Screen(screen) => {
                for space_ref in &screen.space_refs {
                    visit!(visit, *space_ref, LinkFlags::UI | LinkFlags::USER_ONE);
                }
                WalkControl::Continue
            }
            Self::Library(_)
            | Self::Image(_)
            | Self::Camera(_)
            | Self::Light(_)
            | Self::World(_)
            | Self::Action(_)
            | Self::Text(_) => WalkControl::Continue,
        }
    }

    /// Mutable counterpart of [`IdData::foreach_id`], same visiting order.
    pub fn foreach_id_mut(&mut self, visit: &mut LinkVisitorMut<'_>) -> WalkControl {
        match self {
            Self::Object(object) => object.foreach_id_mut(visit),
            Self::Mesh(mesh) => mesh.foreach_id_mut(visit),
            Self::Key(key) => {
                visit!(visit, &mut key.from, LinkFlags::LOOPBACK);
                WalkControl::Continue
            }
            Self::Material(material) => material.foreach_id_mut(visit),
            Self::NodeTree(tree) => {
                visit!(
                    visit,
                    &mut tree.owner,
                    LinkFlags::LOOPBACK | LinkFlags::EMBEDDED_NOT_OWNING
                );
                for node_ref in &mut tree.node_refs {
                    visit!(visit, node_ref, LinkFlags::USER);
                }
                WalkControl::Continue
            }
            Self::Collection(collection) => {
                visit!(
                    visit,
                    &mut collection.owner,
                    LinkFlags::LOOPBACK | LinkFlags::EMBEDDED_NOT_OWNING
                );
                for object in &mut collection.objects {
                    visit!(visit, object, LinkFlags::USER);
                }
                for child in &mut collection.children {
                    visit!(visit, child, LinkFlags::USER);
                }
                WalkControl::Continue
            }
            Self::Scene(scene) => {
                visit!(visit, &mut scene.camera, LinkFlags::empty());
                visit!(visit, &mut scene.world, LinkFlags::USER);
                visit!(visit, &mut scene.set, LinkFlags::NEVER_SELF);
                WalkControl::Continue
            }
            Self::Screen(screen) => {
                for space_ref in &mut screen.space_refs {
                    visit!(visit, space_ref, LinkFlags::UI | LinkFlags::USER_ONE);
                }
                WalkControl::Continue
            }
            Self::Library(_)
            | Self::Image(_)
            | Self::Camera(_)
            | Self::Light(_)
            | Self::World(_)
            | Self::Action(_)
            | Self::Text(_) => WalkControl::Continue,
        }
    }

    /// The embedded data-block owned by this payload, if any.
    #[must_use]
    pub fn embedded(&self) -> Option<&IdBlock> {
        match self {
            Self::Material(MaterialData { nodetree, .. })
            | Self::Light(LightData { nodetree, .. })
            | Self::World(WorldData { nodetree }) => nodetree.as_deref(),
            Self::Scene(scene) => scene.master_collection.as_deref(),
            _ => None,
        }
    }

    /// Mutable access to the embedded data-block, if any.
    pub fn embedded_mut(&mut self) -> Option<&mut IdBlock> {
        self.embedded_slot_mut().and_then(|slot| slot.as_deref_mut())
    }

    /// The field holding the embedded data-block, for types that can own one.
    pub fn embedded_slot_mut(&mut self) -> Option<&mut Option<Box<IdBlock>>> {
        match self {
            Self::Material(MaterialData { nodetree, .. })
            | Self::Light(LightData { nodetree, .. })
            | Self::World(WorldData { nodetree }) => Some(nodetree),
            Self::Scene(scene) => Some(&mut scene.master_collection),
            _ => None,
        }
    }

    /// Back reference of an embedded payload to its owner.
    #[must_use]
    pub fn embedded_owner(&self) -> Option<IdHandle> {
        match self {
            Self::NodeTree(tree) => tree.owner,
            Self::Collection(collection) => collection.owner,
            _ => None,
        }
    }

    /// Point an embedded payload back at its owner.
    pub fn set_embedded_owner(&mut self, owner: Option<IdHandle>) {
        match self {
            Self::NodeTree(tree) => tree.owner = owner,
            Self::Collection(collection) => collection.owner = owner,
            _ => {}
        }
    }
}

macro_rules! payload_accessors {
    ($($variant:ident($data:ty) => $get:ident, $get_mut:ident;)*) => {
        impl IdData {
            $(
                #[doc = concat!("The payload as `", stringify!($data), "`.")]
                #[must_use]
                pub fn $get(&self) -> Option<&$data> {
                    match self {
                        Self::$variant(data) => Some(data),
                        _ => None,
                    }
                }

                #[doc = concat!("Mutable payload as `", stringify!($data), "`.")]
                pub fn $get_mut(&mut self) -> Option<&mut $data> {
                    match self {
                        Self::$variant(data) => Some(data),
                        _ => None,
                    }
                }
            )*
        }
    };
}

payload_accessors! {
    Library(LibraryData) => as_library, as_library_mut;
    Object(ObjectData) => as_object, as_object_mut;
    Mesh(MeshData) => as_mesh, as_mesh_mut;
    Key(KeyData) => as_key, as_key_mut;
    Material(MaterialData) => as_material, as_material_mut;
    NodeTree(NodeTreeData) => as_node_tree, as_node_tree_mut;
    Collection(CollectionData) => as_collection, as_collection_mut;
    Scene(SceneData) => as_scene, as_scene_mut;
    Screen(ScreenData) => as_screen, as_screen_mut;
}
