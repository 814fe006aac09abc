//! idmain Core Library
//!
//! An in-process database of named, typed, reference-counted data-blocks
//! ("IDs") that point at each other, as used by a 3D content application to
//! hold a whole scene file in memory.
//!
//! # Key Components
//!
//! - **Main**: The registry owning every data-block, one sorted list per type
//! - **NameMap**: Unique `Name.NNN` naming within a type and library
//! - **Refcount**: User counting, fake users, direct and indirect linkage
//! - **Relations**: Cached graph of who references whom
//! - **Remap**: Rewriting references from old to new data-blocks
//! - **Delete**: Fixed-point batch deletion
//! - **Library**: Library hierarchy and making linked data local
//!
//! # Example
//!
//! ```
//! use idmain_core::prelude::*;
//!
//! let mut main = Main::standalone();
//! let mesh = main.new_id(IdType::Mesh, "Cube");
//! let copy = main.copy(mesh, CopyFlags::empty()).unwrap();
//! assert_eq!(main.get(copy).unwrap().name(), "Cube.001");
//!
//! main.delete(mesh);
//! assert_eq!(main.count(IdType::Mesh), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod delete;
pub mod error;
pub mod foreach_id;
pub mod id;
pub mod id_map;
pub mod idtype;
pub mod library;
pub mod main;
pub mod name_map;
pub mod notify;
pub mod observability;
pub mod prelude;
pub mod refcount;
pub mod relations;
pub mod remap;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::MainConfig;
pub use delete::DeleteOptions;
pub use error::{MainError, Result};
pub use id::IdBlock;
pub use idtype::IdData;
pub use library::MakeLocalFlags;
pub use main::{CopyFlags, Main, MergeReport, SharedMain, merge_into};
pub use remap::{IdRemapper, RemapFlags};
pub use types::{IdFlags, IdHandle, IdTags, IdType, SessionUid, SessionUidGenerator};
