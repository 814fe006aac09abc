//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types.
//!
//! # Example
//!
//! ```
//! use idmain_core::prelude::*;
//! ```

// Core types
pub use crate::types::{IdFlags, IdHandle, IdTags, IdType, SessionUid, SessionUidGenerator};

// Error handling
pub use crate::error::{MainError, Result, ResultExt};

// Data-blocks
pub use crate::id::IdBlock;
pub use crate::idtype::{IdData, IdTypeFlags, IdTypeInfo, id_type_info};

// Database
pub use crate::config::MainConfig;
pub use crate::main::{
    AllocFlags, CopyFlags, IdNewNameAction, IdNewNameMode, IdNewNameResult, Main, MergeReport,
    SharedMain,
};
pub use crate::name_map::{NameMap, UniqueName};

// Reference walking
pub use crate::foreach_id::{LinkFlags, LinkVisit, WalkControl, WalkFlags};

// Editing
pub use crate::delete::DeleteOptions;
pub use crate::library::MakeLocalFlags;
pub use crate::relations::{MainIdRelations, RelationItem, RelationTags, RelationsEntry};
pub use crate::remap::{IdRemapper, RelinkType, RemapFlags, RemapResult, RemapStatus};

// Notification
pub use crate::notify::{ChangeCallback, IdChange, IdChangeKind, SubscriberId};
