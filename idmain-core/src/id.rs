//! The data-block header shared by every ID type.

use crate::idtype::{IdData, id_type_info};
use crate::types::{IdFlags, IdHandle, IdTags, IdType, SessionUid};

/// A data-block: header fields plus the typed payload.
///
/// Blocks created with [`IdBlock::new`] live outside any database (tagged
/// `NO_MAIN`) until passed to [`Main::insert`](crate::Main::insert). Blocks
/// owned by a [`Main`](crate::Main) are reached through an [`IdHandle`].
#[derive(Debug, Clone)]
pub struct IdBlock {
    pub(crate) id_type: IdType,
    pub(crate) name: String,
    pub(crate) library: Option<IdHandle>,
    pub(crate) session_uid: SessionUid,
    pub(crate) users: i32,
    pub(crate) flags: IdFlags,
    pub(crate) tags: IdTags,
    pub(crate) new_id: Option<IdHandle>,
    /// Typed payload with the outgoing references.
    pub data: IdData,
}

impl IdBlock {
    /// Create a free-standing data-block with a default payload.
    #[must_use]
    pub fn new(id_type: IdType, name: impl Into<String>) -> Self {
        Self {
            id_type,
            name: name.into(),
            library: None,
            session_uid: SessionUid::UNSET,
            users: 0,
            flags: IdFlags::empty(),
            tags: IdTags::NO_MAIN,
            new_id: None,
            data: IdData::new(id_type),
        }
    }

    /// Create a free-standing data-block that does not take part in user
    /// counting (temporary copies, previews).
    #[must_use]
    pub fn new_nomain(id_type: IdType, name: impl Into<String>) -> Self {
        let mut block = Self::new(id_type, name);
        block.tags.insert(IdTags::NO_USER_REFCOUNT);
        block
    }

    /// Create an embedded data-block, owned by another data-block's payload.
    #[must_use]
    pub fn new_embedded(id_type: IdType) -> Self {
        let mut block = Self::new(id_type, id_type_info(id_type).name);
        block.tags = IdTags::NO_USER_REFCOUNT;
        block.flags.insert(IdFlags::EMBEDDED_DATA);
        block
    }

    /// Type of this data-block.
    #[must_use]
    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    /// Name, unique within its type and library.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The library this data-block is linked from, `None` when local.
    #[must_use]
    pub fn library(&self) -> Option<IdHandle> {
        self.library
    }

    /// Runtime identity.
    #[must_use]
    pub fn session_uid(&self) -> SessionUid {
        self.session_uid
    }

    /// Current user count.
    #[must_use]
    pub fn users(&self) -> i32 {
        self.users
    }

    /// Persistent flags.
    #[must_use]
    pub fn flags(&self) -> IdFlags {
        self.flags
    }

    /// Runtime tags.
    #[must_use]
    pub fn tags(&self) -> IdTags {
        self.tags
    }

    /// Mutable access to the runtime tags.
    pub fn tags_mut(&mut self) -> &mut IdTags {
        &mut self.tags
    }

    /// The copy or replacement recorded by the last copy operation.
    #[must_use]
    pub fn new_id(&self) -> Option<IdHandle> {
        self.new_id
    }

    /// Whether this data-block is linked from a library.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.library.is_some()
    }

    /// Whether this data-block is embedded in another one.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.flags.contains(IdFlags::EMBEDDED_DATA)
    }

    /// Whether the fake user flag is set.
    #[must_use]
    pub fn has_fake_user(&self) -> bool {
        self.flags.contains(IdFlags::FAKE_USER)
    }

    /// Lowest valid user count: one when a fake user is set, zero otherwise.
    #[must_use]
    pub fn fake_user_floor(&self) -> i32 {
        i32::from(self.has_fake_user())
    }

    /// Whether this data-block currently belongs to a database.
    #[must_use]
    pub fn is_in_main(&self) -> bool {
        !self.tags.contains(IdTags::NO_MAIN)
    }
}
