//! Data-block types: payloads and the capability table.
//!
//! The set of types is closed. Each payload enumerates its own reference
//! fields ([`IdData::foreach_id`]); type-specific behavior that generic code
//! cannot derive (default data, sub-data copies, ownership) lives in the
//! [`IdTypeInfo`] table, with absent capabilities expressed as `None`.

mod info;
mod payload;

pub use info::{
    CopyDataFn, FreeDataFn, IdTypeFlags, IdTypeInfo, InitDataFn, MakeLocalFn, OwnerGetFn,
    id_type_info,
};
pub use payload::{
    ActionData, CameraData, CollectionData, IdData, ImageData, KeyData, LibraryData, LightData,
    LinkVisitor, LinkVisitorMut, MaterialData, MeshData, NodeTreeData, ObjectData, SceneData,
    ScreenData, TextData, WorldData,
};
