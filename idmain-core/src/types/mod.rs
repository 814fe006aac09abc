//! Core types for the data-block database.
//!
//! - `IdHandle`: generational handle to a data-block in a Main
//! - `SessionUid`: process-wide runtime identity of a data-block
//! - `IdType`: closed set of data-block types
//! - `IdFlags` / `IdTags`: persistent flags and runtime tags

mod flags;
mod id_type;
mod ids;

pub(crate) use flags::flag_set;
pub use flags::{IdFlags, IdTags};
pub use id_type::IdType;
pub use ids::{IdHandle, SessionUid, SessionUidGenerator};
