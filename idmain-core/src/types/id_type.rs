//! Closed set of data-block types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type code of a data-block.
///
/// The declaration order is the listing order of a [`Main`](crate::Main):
/// libraries first, screens last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdType {
    /// An external file other data-blocks are linked from.
    Library,
    /// Scene object instancing some object data.
    Object,
    /// Polygon mesh.
    Mesh,
    /// Shape key set, owned by the geometry it deforms.
    Key,
    /// Surface material.
    Material,
    /// Node tree, either standalone or embedded in its owner.
    NodeTree,
    /// Image.
    Image,
    /// Camera object data.
    Camera,
    /// Light object data.
    Light,
    /// World environment.
    World,
    /// Collection of objects.
    Collection,
    /// Scene.
    Scene,
    /// Animation action.
    Action,
    /// Text buffer.
    Text,
    /// Screen layout (interface data).
    Screen,
}

impl IdType {
    /// Number of data-block types.
    pub const COUNT: usize = 15;

    /// Every type, in listing order.
    pub const ALL: [IdType; Self::COUNT] = [
        IdType::Library,
        IdType::Object,
        IdType::Mesh,
        IdType::Key,
        IdType::Material,
        IdType::NodeTree,
        IdType::Image,
        IdType::Camera,
        IdType::Light,
        IdType::World,
        IdType::Collection,
        IdType::Scene,
        IdType::Action,
        IdType::Text,
        IdType::Screen,
    ];

    /// Position in [`IdType::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Two-letter type code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Library => "LI",
            Self::Object => "OB",
            Self::Mesh => "ME",
            Self::Key => "KE",
            Self::Material => "MA",
            Self::NodeTree => "NT",
            Self::Image => "IM",
            Self::Camera => "CA",
            Self::Light => "LA",
            Self::World => "WO",
            Self::Collection => "GR",
            Self::Scene => "SC",
            Self::Action => "AC",
            Self::Text => "TX",
            Self::Screen => "SR",
        }
    }

    /// Parse a two-letter type code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
