//! Lookups over the typed lists.

use super::Main;
use crate::idtype::id_type_info;
use crate::types::{IdHandle, IdType, SessionUid};

impl Main {
    /// Find a local data-block by name.
    #[must_use]
    pub fn find_by_name(&self, id_type: IdType, name: &str) -> Option<IdHandle> {
        self.find_by_name_and_library(id_type, name, None)
    }

    /// Find a data-block by name within one library (`None` for local data).
    #[must_use]
    pub fn find_by_name_and_library(
        &self,
        id_type: IdType,
        name: &str,
        library: Option<IdHandle>,
    ) -> Option<IdHandle> {
        self.iter_type(id_type)
            .find(|(_, b)| b.library == library && b.name == name)
            .map(|(h, _)| h)
    }

    /// Find a data-block by name within the library loaded from
    /// `library_filepath` (`None` for local data).
    #[must_use]
    pub fn find_by_name_and_library_filepath(
        &self,
        id_type: IdType,
        name: &str,
        library_filepath: Option<&str>,
    ) -> Option<IdHandle> {
        let library = match library_filepath {
            Some(filepath) => Some(self.find_library_by_filepath(filepath)?),
            None => None,
        };
        self.find_by_name_and_library(id_type, name, library)
    }

    /// Find a library data-block by file path.
    #[must_use]
    pub fn find_library_by_filepath(&self, filepath: &str) -> Option<IdHandle> {
        self.iter_type(IdType::Library)
            .find(|(_, b)| b.data.as_library().is_some_and(|lib| lib.filepath == filepath))
            .map(|(h, _)| h)
    }

    /// Find a data-block of any type by session UID.
    #[must_use]
    pub fn find_by_uid(&self, session_uid: SessionUid) -> Option<IdHandle> {
        if !session_uid.is_set() {
            return None;
        }
        self.iter_all()
            .find(|(_, b)| b.session_uid == session_uid)
            .map(|(h, _)| h)
    }

    /// Find a data-block of `id_type` by session UID.
    #[must_use]
    pub fn find_by_type_and_uid(&self, id_type: IdType, session_uid: SessionUid) -> Option<IdHandle> {
        self.iter_type(id_type)
            .find(|(_, b)| b.session_uid == session_uid)
            .map(|(h, _)| h)
    }

    /// Whether `handle` is listed in this database.
    #[must_use]
    pub fn is_in_main(&self, handle: IdHandle) -> bool {
        self.get(handle)
            .is_some_and(|b| self.list(b.id_type).contains(&handle))
    }

    /// Whether `from` may hold a reference to `to`.
    ///
    /// Linked data cannot use local data, and listed data cannot use data
    /// outside the database.
    #[must_use]
    pub fn can_use_id(&self, from: IdHandle, to: IdHandle) -> bool {
        let (Some(from_block), Some(to_block)) = (self.get(from), self.get(to)) else {
            return false;
        };
        if from_block.is_linked() && !to_block.is_linked() {
            return false;
        }
        from_block.is_in_main() == to_block.is_in_main() || !from_block.is_in_main()
    }

    /// The data-block owning `handle` (shape keys and similar sub-data).
    #[must_use]
    pub fn id_owner(&self, handle: IdHandle) -> Option<IdHandle> {
        let block = self.get(handle)?;
        id_type_info(block.id_type).owner_get.and_then(|owner_get| owner_get(block))
    }

    /// Number of listed data-blocks of one type.
    #[must_use]
    pub fn count(&self, id_type: IdType) -> usize {
        self.list(id_type).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main::AllocFlags;

    #[test]
    fn find_local_and_linked() {
        let mut main = Main::standalone();
        let lib = main.new_library("assets", "//assets.blend");
        let local = main.new_id(IdType::Mesh, "Rock");
        let linked = main
            .alloc_in_lib(Some(lib), IdType::Mesh, Some("Rock"), AllocFlags::empty())
            .unwrap();

        assert_eq!(main.find_by_name(IdType::Mesh, "Rock"), Some(local));
        assert_eq!(
            main.find_by_name_and_library(IdType::Mesh, "Rock", Some(lib)),
            Some(linked)
        );
        assert_eq!(
            main.find_by_name_and_library_filepath(IdType::Mesh, "Rock", Some("//assets.blend")),
            Some(linked)
        );
        assert_eq!(
            main.find_by_name_and_library_filepath(IdType::Mesh, "Rock", Some("//other.blend")),
            None
        );
        assert_eq!(main.find_by_name(IdType::Object, "Rock"), None);
    }

    #[test]
    fn find_by_uid() {
        let mut main = Main::standalone();
        let text = main.new_id(IdType::Text, "Notes");
        let uid = main.get(text).unwrap().session_uid();
        assert_eq!(main.find_by_uid(uid), Some(text));
        assert_eq!(main.find_by_type_and_uid(IdType::Text, uid), Some(text));
        assert_eq!(main.find_by_type_and_uid(IdType::Mesh, uid), None);
        assert_eq!(main.find_by_uid(SessionUid::UNSET), None);
    }

    #[test]
    fn linked_cannot_use_local() {
        let mut main = Main::standalone();
        let lib = main.new_library("lib", "//lib.blend");
        let local = main.new_id(IdType::Mesh, "Local");
        let linked = main
            .alloc_in_lib(Some(lib), IdType::Object, None, AllocFlags::empty())
            .unwrap();
        let linked_mesh = main
            .alloc_in_lib(Some(lib), IdType::Mesh, None, AllocFlags::empty())
            .unwrap();
        let object = main.new_id(IdType::Object, "Local");

        assert!(!main.can_use_id(linked, local));
        assert!(main.can_use_id(linked, linked_mesh));
        assert!(main.can_use_id(object, linked_mesh));
        assert!(main.can_use_id(object, local));
    }

    #[test]
    fn owner_of_shape_key() {
        let mut main = Main::standalone();
        let mesh = main.new_id(IdType::Mesh, "Cube");
        let key = main.new_id(IdType::Key, "Key");
        main.get_mut(key).unwrap().data.as_key_mut().unwrap().from = Some(mesh);
        assert_eq!(main.id_owner(key), Some(mesh));
        assert_eq!(main.id_owner(mesh), None);
        assert!(main.is_in_main(key));
    }
}
