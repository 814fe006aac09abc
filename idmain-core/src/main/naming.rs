//! Renaming and name-map upkeep.

use super::Main;
use crate::error::Result;
use crate::idtype::id_type_info;
use crate::name_map::{NameMap, UniqueName, clean_name, split_name_number};
use crate::notify::IdChangeKind;
use crate::types::{IdHandle, IdType};
use std::collections::HashSet;
use tracing::{debug, error, warn};

/// How a rename treats another data-block already using the requested name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdNewNameMode {
    /// Adjust the requested name with a numeric suffix.
    #[default]
    RenameExistingNever,
    /// Take the requested name and give the other data-block a new one.
    RenameExistingAlways,
    /// Take the requested name only if it shares its root with the current
    /// name (`Cube.004` → `Cube`); otherwise adjust it.
    RenameExistingSameRoot,
}

/// Outcome of a rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNewNameAction {
    /// The name did not change.
    Unchanged,
    /// The name did not change, although it first collided.
    UnchangedCollision,
    /// The requested name was free and is now used.
    RenamedNoCollision,
    /// The requested name was taken; an adjusted name is used.
    RenamedCollisionAdjusted,
    /// The requested name was taken from another data-block, which was
    /// renamed in turn.
    RenamedCollisionForced,
}

/// Result of [`Main::rename`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdNewNameResult {
    /// What happened.
    pub action: IdNewNameAction,
    /// The data-block that lost its name in a forced rename.
    pub other_id: Option<IdHandle>,
}

impl IdNewNameResult {
    const UNCHANGED: Self = Self {
        action: IdNewNameAction::Unchanged,
        other_id: None,
    };

    /// Whether the renamed data-block ended up with a different name.
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        matches!(
            self.action,
            IdNewNameAction::RenamedNoCollision
                | IdNewNameAction::RenamedCollisionAdjusted
                | IdNewNameAction::RenamedCollisionForced
        )
    }
}

impl Main {
    /// Rename a data-block.
    ///
    /// Linked data-blocks are not editable and keep their name. Renaming to
    /// the current name is a no-op.
    pub fn rename(
        &mut self,
        handle: IdHandle,
        name: &str,
        mode: IdNewNameMode,
    ) -> Result<IdNewNameResult> {
        let block = self.block(handle)?;
        if block.name == name {
            return Ok(IdNewNameResult::UNCHANGED);
        }
        if block.is_linked() {
            debug!(id = %handle, "Linked data-blocks keep their name");
            return Ok(IdNewNameResult::UNCHANGED);
        }
        let (id_type, library, old_name) = (block.id_type, block.library, block.name.clone());

        // The scope must exist before the old name is released, otherwise a
        // lazy build would register it again.
        self.ensure_name_scope(library);
        self.name_maps.remove(id_type, library, &old_name);

        let result = self.new_name_validate(handle, Some(name), mode, false);
        if result.is_renamed() {
            self.id_map = None;
            self.is_dirty = true;
            let new_name = self.get(handle).map(|b| b.name.clone()).unwrap_or_default();
            debug!(id = %handle, old = %old_name, new = %new_name, "Data-block renamed");
            self.notify_change(
                handle,
                IdChangeKind::Renamed {
                    old_name: old_name.clone(),
                    new_name,
                },
            );
        }
        if let Some(other) = result.other_id {
            let new_name = self.get(other).map(|b| b.name.clone()).unwrap_or_default();
            self.notify_change(
                other,
                IdChangeKind::Renamed {
                    old_name: clean_name(name),
                    new_name,
                },
            );
        }
        if self.config().validate_names_on_change() && !self.namemap_validate() {
            warn!(id = %handle, "Name maps out of sync after rename");
        }
        Ok(result)
    }

    /// Give `handle` a valid unique name derived from `new_name` (or its
    /// current name) and sort it into its list.
    ///
    /// The data-block's current name must not be registered in the name maps.
    /// Linked data-blocks are only re-sorted unless `do_linked` is set.
    pub(crate) fn new_name_validate(
        &mut self,
        handle: IdHandle,
        new_name: Option<&str>,
        mode: IdNewNameMode,
        do_linked: bool,
    ) -> IdNewNameResult {
        let Some(block) = self.get(handle) else {
            return IdNewNameResult::UNCHANGED;
        };
        let (id_type, library, current) = (block.id_type, block.library, block.name.clone());

        if library.is_some() && !do_linked {
            self.ensure_name_scope(library);
            if !self.name_maps.scope(library).is_some_and(|m| m.contains(id_type, &current)) {
                self.name_maps.add(id_type, library, &current);
            }
            self.sort_by_name(handle, None);
            return IdNewNameResult::UNCHANGED;
        }

        let mut requested = clean_name(new_name.unwrap_or(&current));
        if requested.is_empty() {
            requested = id_type_info(id_type).name.to_string();
        }
        let mut name = requested.clone();
        let collided = self.register_unique_name(id_type, library, &mut name);

        let forced = collided
            && match mode {
                IdNewNameMode::RenameExistingNever => false,
                IdNewNameMode::RenameExistingAlways => true,
                IdNewNameMode::RenameExistingSameRoot => {
                    split_name_number(&current).0 == split_name_number(&requested).0
                }
            };
        let other = if forced {
            self.find_listed_by_name(id_type, &requested, library, handle)
        } else {
            None
        };

        if let Some(other) = other {
            // The other data-block takes the adjusted name; both names stay
            // registered.
            if let Some(other_block) = self.get_mut(other) {
                other_block.name = name;
            }
            if let Some(block) = self.get_mut(handle) {
                block.name = requested;
            }
            self.sort_by_name(other, None);
            self.sort_by_name(handle, None);
            return IdNewNameResult {
                action: IdNewNameAction::RenamedCollisionForced,
                other_id: Some(other),
            };
        }

        let action = match (name == current, collided) {
            (true, false) => IdNewNameAction::Unchanged,
            (true, true) => IdNewNameAction::UnchangedCollision,
            (false, false) => IdNewNameAction::RenamedNoCollision,
            (false, true) => IdNewNameAction::RenamedCollisionAdjusted,
        };
        if let Some(block) = self.get_mut(handle) {
            block.name = name;
        }
        self.sort_by_name(handle, None);
        IdNewNameResult {
            action,
            other_id: None,
        }
    }

    fn find_listed_by_name(
        &self,
        id_type: IdType,
        name: &str,
        library: Option<IdHandle>,
        exclude: IdHandle,
    ) -> Option<IdHandle> {
        self.iter_type(id_type)
            .find(|(h, b)| *h != exclude && b.library == library && b.name == name)
            .map(|(h, _)| h)
    }

    /// Build the name map of `library` from the registry if needed.
    pub(crate) fn ensure_name_scope(&mut self, library: Option<IdHandle>) {
        if self.name_maps.has_scope(library) {
            return;
        }
        let map = NameMap::from_names(
            false,
            self.iter_all()
                .filter(|(_, b)| b.library == library)
                .map(|(_, b)| (b.id_type, b.name.as_str())),
        );
        self.name_maps.insert_scope(library, map);
    }

    fn register_unique_name(
        &mut self,
        id_type: IdType,
        library: Option<IdHandle>,
        name: &mut String,
    ) -> bool {
        self.ensure_name_scope(library);
        let collided = self.name_maps.scope_mut(library).get_unique_name(id_type, name);
        if let Some(global) = self.name_maps.global_mut() {
            global.add_name(id_type, name);
        }
        collided
    }

    /// Suggest a unique name for a new data-block of `id_type` in `library`
    /// without reserving it.
    pub fn suggest_unique_name(
        &mut self,
        id_type: IdType,
        library: Option<IdHandle>,
        proposed: &str,
    ) -> UniqueName {
        self.ensure_name_scope(library);
        match self.name_maps.scope(library) {
            Some(map) => map.suggest_unique_name(id_type, proposed),
            None => UniqueName {
                name: clean_name(proposed),
                collided: false,
            },
        }
    }

    /// The name map of one library scope (`None` for local data).
    pub fn name_map(&mut self, library: Option<IdHandle>) -> &NameMap {
        self.ensure_name_scope(library);
        self.name_maps.scope_mut(library)
    }

    /// The name map over all libraries, counting every use of a name.
    pub fn global_name_map(&mut self) -> &NameMap {
        if self.name_maps.global().is_none() {
            let map = NameMap::from_names(
                true,
                self.iter_all().map(|(_, b)| (b.id_type, b.name.as_str())),
            );
            self.name_maps.set_global(map);
        }
        self.name_maps.global_entry()
    }

    /// Drop every name map; they are rebuilt on next use.
    pub fn namemap_clear(&mut self) {
        self.name_maps.clear();
    }

    /// Check the registry for duplicate names and the built name maps for
    /// drift from the registry. Problems are logged.
    #[must_use]
    pub fn namemap_validate(&self) -> bool {
        let mut valid = true;
        let mut seen: HashSet<(IdType, Option<IdHandle>, &str)> = HashSet::new();
        for (handle, block) in self.iter_all() {
            if !seen.insert((block.id_type, block.library, block.name.as_str())) {
                error!(id = %handle, name = %block.name, "Duplicate data-block name");
                valid = false;
            }
        }

        for library in self.name_maps.built_scopes() {
            let fresh = NameMap::from_names(
                false,
                self.iter_all()
                    .filter(|(_, b)| b.library == library)
                    .map(|(_, b)| (b.id_type, b.name.as_str())),
            );
            if let Some(map) = self.name_maps.scope(library)
                && !map.same_names(&fresh)
            {
                error!(library = ?library, "Name map out of sync with registry");
                valid = false;
            }
        }

        if let Some(global) = self.name_maps.global() {
            let fresh = NameMap::from_names(
                true,
                self.iter_all().map(|(_, b)| (b.id_type, b.name.as_str())),
            );
            if !global.same_names(&fresh) {
                error!("Global name map out of sync with registry");
                valid = false;
            }
        }
        valid
    }

    /// Validate, and on failure rename duplicates and drop every name map.
    ///
    /// Returns whether the database was valid before fixing.
    pub fn namemap_validate_and_fix(&mut self) -> bool {
        let valid = self.namemap_validate();
        if !valid {
            let renamed: usize = IdType::ALL
                .iter()
                .map(|id_type| self.repair_duplicate_names(*id_type))
                .sum();
            self.name_maps.clear();
            warn!(renamed, "Repaired data-block names");
        }
        valid
    }

    /// Give every data-block of `id_type` sharing a name with an earlier one
    /// in the same library a unique name. Returns the number renamed.
    pub fn repair_duplicate_names(&mut self, id_type: IdType) -> usize {
        let mut seen: HashSet<(Option<IdHandle>, String)> = HashSet::new();
        let mut duplicates = Vec::new();
        for (handle, block) in self.iter_type(id_type) {
            if !seen.insert((block.library, block.name.clone())) {
                duplicates.push(handle);
            }
        }
        if duplicates.is_empty() {
            return 0;
        }

        self.name_maps.clear();
        for handle in &duplicates {
            let Some((library, mut name)) = self.get(*handle).map(|b| (b.library, b.name.clone()))
            else {
                continue;
            };
            self.ensure_name_scope(library);
            self.name_maps.scope_mut(library).get_unique_name(id_type, &mut name);
            debug!(id = %handle, name = %name, "Renamed duplicate");
            if let Some(block) = self.get_mut(*handle) {
                block.name = name;
            }
            self.sort_by_name(*handle, None);
        }
        // Counts for the duplicated names are stale.
        self.name_maps.clear();
        self.id_map = None;
        duplicates.len()
    }

    /// Name as shown to users: `Name [Library]` for linked data.
    #[must_use]
    pub fn full_name(&self, handle: IdHandle) -> Option<String> {
        let block = self.get(handle)?;
        Some(match block.library.and_then(|lib| self.get(lib)) {
            Some(library) => format!("{} [{}]", block.name, library.name),
            None => block.name.clone(),
        })
    }

    /// Key unique across the database: type code, name and library path.
    #[must_use]
    pub fn unique_string_key(&self, handle: IdHandle) -> Option<String> {
        let block = self.get(handle)?;
        let filepath = block
            .library
            .and_then(|lib| self.get(lib))
            .and_then(|lib| lib.data.as_library())
            .map_or("", |lib| lib.filepath.as_str());
        Some(format!("{}{}|{}", block.id_type.code(), block.name, filepath))
    }
}
