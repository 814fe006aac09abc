//! Remapping: rewriting every reference to a data-block.
//!
//! An [`IdRemapper`] holds a batch of `old → new` rules (`new` may be `None`
//! to clear references). Applying it walks each target data-block once and
//! looks up every visited reference in the rules, so the cost does not grow
//! with the number of rules.
//!
//! Each rewrite is classified by the usage flags of the field:
//!
//! | usage | default behavior |
//! |---|---|
//! | owner is linked data | rewritten, skipped with [`RemapFlags::SKIP_INDIRECT_USAGE`] |
//! | never-null field, rule clears it | left unchanged unless [`RemapFlags::FORCE_NEVER_NULL_USAGE`] |
//! | never-self field, rule points at the owner | cleared |
//! | loopback | left unchanged unless [`RemapFlags::DO_LOOPBACK_POINTERS`] |
//! | UI | only visited with [`RemapFlags::FORCE_UI_POINTERS`] |
//! | library pointer | only visited with [`RemapFlags::DO_LIBRARY_POINTERS`] |
//!
//! Counted fields move a user from the old to the new target.

use crate::error::{MainError, Result};
use crate::foreach_id::{LinkFlags, LinkVisit, WalkControl, WalkFlags};
use crate::idtype::IdData;
use crate::main::Main;
use crate::notify::IdChangeKind;
use crate::types::{IdHandle, IdTags, flag_set};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, error, trace};

flag_set! {
    /// Options for applying remap rules.
    pub struct RemapFlags(u32) {
        /// Leave references owned by linked data alone.
        const SKIP_INDIRECT_USAGE = 1 << 0;
        /// Leave every never-null field alone.
        const SKIP_NEVER_NULL_USAGE = 1 << 1;
        /// Clear never-null fields when a rule asks for it.
        const FORCE_NEVER_NULL_USAGE = 1 << 2;
        /// Record owners of never-null fields a rule could not clear in
        /// [`IdRemapper::never_null_users`].
        const STORE_NEVER_NULL_USAGE = 1 << 3;
        /// Also rewrite library pointers of data-block headers.
        const DO_LIBRARY_POINTERS = 1 << 4;
        /// Also rewrite interface references.
        const FORCE_UI_POINTERS = 1 << 5;
        /// Leave user counts alone.
        const SKIP_USER_REFCOUNT = 1 << 6;
        /// Do not publish change events.
        const SKIP_UPDATE_TAGGING = 1 << 7;
        /// Accept rules between data-blocks of different types.
        const ALLOW_TYPE_MISMATCH = 1 << 8;
        /// Also rewrite loopback references.
        const DO_LOOPBACK_POINTERS = 1 << 9;
    }
}

flag_set! {
    /// Summary flags of a rule application.
    pub struct RemapStatusFlags(u32) {
        /// Some reference owned by local data was rewritten.
        const IS_LINKED_DIRECT = 1 << 0;
        /// Some user-one reference was skipped.
        const IS_USER_ONE_SKIPPED = 1 << 1;
    }
}

/// What happened to the references of one old data-block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemapStatus {
    /// References owned by local data that were left unchanged.
    pub skipped_direct: u32,
    /// References owned by linked data that were left unchanged.
    pub skipped_indirect: u32,
    /// Counted references that were left unchanged.
    pub skipped_refcounted: u32,
    /// Summary flags.
    pub status: RemapStatusFlags,
}

/// Lookup result of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapResult {
    /// No rule for this data-block.
    Unavailable,
    /// References are cleared.
    Unassigned,
    /// References point at the given data-block.
    Remapped(IdHandle),
}

/// How [`Main::relink_multiple`] applies rules inside the given data-blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelinkType {
    /// Rewrite references to an old data-block into its new one.
    Direct,
    /// Rewrite references to a new data-block back into its old one.
    Reverse,
    /// Clear every reference; user counts of targets that are not rule keys
    /// are released.
    Cleanup,
}

/// A batch of remap rules.
#[derive(Debug, Clone, Default)]
pub struct IdRemapper {
    mappings: HashMap<IdHandle, Option<IdHandle>>,
    order: Vec<IdHandle>,
    statuses: HashMap<IdHandle, RemapStatus>,
    user_one_remapped: HashSet<IdHandle>,
    never_null_users: BTreeSet<IdHandle>,
}

impl IdRemapper {
    /// Create an empty remapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the rule `old → new`, both data-blocks of `main` and of the same
    /// type.
    pub fn add(&mut self, main: &Main, old: IdHandle, new: Option<IdHandle>) -> Result<()> {
        let old_type = main.block(old)?.id_type();
        if let Some(new) = new {
            let new_type = main.block(new)?.id_type();
            if new_type != old_type {
                return Err(MainError::RemapTypeMismatch {
                    old,
                    old_type,
                    new,
                    new_type,
                });
            }
        }
        self.insert(old, new);
        Ok(())
    }

    /// Add the rule `old → new` without the type check.
    pub fn add_allowing_type_mismatch(
        &mut self,
        main: &Main,
        old: IdHandle,
        new: Option<IdHandle>,
    ) -> Result<()> {
        main.block(old)?;
        if let Some(new) = new {
            main.block(new)?;
        }
        self.insert(old, new);
        Ok(())
    }

    pub(crate) fn insert(&mut self, old: IdHandle, new: Option<IdHandle>) {
        if self.mappings.insert(old, new).is_none() {
            self.order.push(old);
        }
    }

    /// Look up the rule for `old`.
    #[must_use]
    pub fn get(&self, old: IdHandle) -> RemapResult {
        match self.mappings.get(&old) {
            None => RemapResult::Unavailable,
            Some(None) => RemapResult::Unassigned,
            Some(Some(new)) => RemapResult::Remapped(*new),
        }
    }

    /// Whether a rule exists for `old`.
    #[must_use]
    pub fn contains(&self, old: IdHandle) -> bool {
        self.mappings.contains_key(&old)
    }

    /// Rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (IdHandle, Option<IdHandle>)> + '_ {
        self.order.iter().map(|old| (*old, self.mappings[old]))
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there is no rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop every rule and all recorded results.
    pub fn clear(&mut self) {
        self.mappings.clear();
        self.order.clear();
        self.reset_results();
        self.never_null_users.clear();
    }

    /// Owners of never-null fields that a rule could not clear.
    #[must_use]
    pub fn never_null_users(&self) -> &BTreeSet<IdHandle> {
        &self.never_null_users
    }

    /// Result of the last application for the rule of `old`.
    #[must_use]
    pub fn status(&self, old: IdHandle) -> RemapStatus {
        self.statuses.get(&old).copied().unwrap_or_default()
    }

    fn reset_results(&mut self) {
        self.statuses.clear();
        self.user_one_remapped.clear();
    }

    fn inverted(&self) -> Self {
        let mut inverted = Self::new();
        for (old, new) in self.iter() {
            if let Some(new) = new {
                inverted.insert(new, Some(old));
            }
        }
        inverted
    }
}

/// One pending rewrite of the read-only pass.
struct Rewrite {
    ordinal: usize,
    old: IdHandle,
    new: Option<IdHandle>,
    flags: LinkFlags,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Remap,
    Cleanup,
}

impl Main {
    /// Remap every reference to `old` into `new`.
    pub fn remap(
        &mut self,
        old: IdHandle,
        new: Option<IdHandle>,
        flags: RemapFlags,
    ) -> Result<RemapStatus> {
        let mut remapper = IdRemapper::new();
        if flags.contains(RemapFlags::ALLOW_TYPE_MISMATCH) {
            remapper.add_allowing_type_mismatch(self, old, new)?;
        } else {
            remapper.add(self, old, new)?;
        }
        self.remap_multiple(&mut remapper, flags);
        Ok(remapper.status(old))
    }

    /// Clear every reference to `id`, keeping never-null fields.
    pub fn unlink(&mut self, id: IdHandle) -> Result<RemapStatus> {
        self.remap(id, None, RemapFlags::empty())
    }

    /// Apply every rule to the whole database.
    ///
    /// Returns the number of rewritten references.
    pub fn remap_multiple(&mut self, remapper: &mut IdRemapper, flags: RemapFlags) -> usize {
        let owners = self.handles();
        let count = self.apply_rules(&owners, remapper, Pass::Remap, flags, false);
        self.postprocess_old_ids(remapper);
        debug!(rules = remapper.len(), rewritten = count, "Remap applied");
        count
    }

    /// Apply every rule to the whole database, only rewriting references.
    ///
    /// User counts, linkage tags and change events are left alone.
    pub fn remap_multiple_raw(&mut self, remapper: &mut IdRemapper, flags: RemapFlags) -> usize {
        let owners = self.handles();
        let flags = flags | RemapFlags::SKIP_USER_REFCOUNT | RemapFlags::SKIP_UPDATE_TAGGING;
        self.apply_rules(&owners, remapper, Pass::Remap, flags, true)
    }

    /// Apply rules only inside `ids`.
    pub fn relink_multiple(
        &mut self,
        ids: &[IdHandle],
        relink: RelinkType,
        remapper: &mut IdRemapper,
        flags: RemapFlags,
    ) -> usize {
        match relink {
            RelinkType::Direct => self.apply_rules(ids, remapper, Pass::Remap, flags, false),
            RelinkType::Reverse => {
                let mut inverted = remapper.inverted();
                let count = self.apply_rules(ids, &mut inverted, Pass::Remap, flags, false);
                remapper.never_null_users.extend(inverted.never_null_users);
                count
            }
            RelinkType::Cleanup => self.apply_rules(
                ids,
                remapper,
                Pass::Cleanup,
                flags | RemapFlags::FORCE_NEVER_NULL_USAGE,
                false,
            ),
        }
    }

    /// Exchange the payloads of two data-blocks of the same type.
    ///
    /// With `full`, names and persistent flags are exchanged too. With
    /// `self_remap`, references each payload held to its previous owner are
    /// redirected to the new one.
    pub fn swap(&mut self, a: IdHandle, b: IdHandle, full: bool, self_remap: bool) -> Result<()> {
        let first_type = self.block(a)?.id_type();
        let second_type = self.block(b)?.id_type();
        if first_type != second_type {
            return Err(MainError::SwapTypeMismatch {
                first_type,
                second_type,
            });
        }
        if a == b {
            return Ok(());
        }

        let placeholder = IdData::new(first_type);
        let mut data = self
            .get_mut(a)
            .map(|block| std::mem::replace(&mut block.data, placeholder))
            .ok_or(MainError::StaleHandle { handle: a })?;
        if let Some(block) = self.get_mut(b) {
            std::mem::swap(&mut data, &mut block.data);
        }
        if let Some(block) = self.get_mut(a) {
            block.data = data;
        }

        if full {
            let header_a = self.get(a).map(|x| (x.name.clone(), x.flags));
            let header_b = self.get(b).map(|x| (x.name.clone(), x.flags));
            if let (Some((name_a, flags_a)), Some((name_b, flags_b))) = (header_a, header_b) {
                if let Some(block) = self.get_mut(a) {
                    block.name = name_b;
                    block.flags = flags_b;
                }
                if let Some(block) = self.get_mut(b) {
                    block.name = name_a;
                    block.flags = flags_a;
                }
            }
            // Names may have moved between library scopes.
            self.name_maps.clear();
            self.sort_by_name(a, None);
            self.sort_by_name(b, None);
        }

        self.attach_embedded(a);
        self.attach_embedded(b);

        if self_remap {
            let mut remap_a = IdRemapper::new();
            remap_a.insert(b, Some(a));
            self.relink_multiple(&[a], RelinkType::Direct, &mut remap_a, RemapFlags::empty());
            let mut remap_b = IdRemapper::new();
            remap_b.insert(a, Some(b));
            self.relink_multiple(&[b], RelinkType::Direct, &mut remap_b, RemapFlags::empty());
            self.fix_loopbacks(a, b);
            self.fix_loopbacks(b, a);
        }
        self.structure_changed();
        debug!(a = %a, b = %b, full, "Data-blocks swapped");
        Ok(())
    }

    /// Point loopback references of data owned by `owner` back at `owner`
    /// instead of `previous`.
    fn fix_loopbacks(&mut self, owner: IdHandle, previous: IdHandle) {
        let targets: Vec<IdHandle> = self
            .links(owner, WalkFlags::IGNORE_EMBEDDED)
            .into_iter()
            .filter(|link| !link.flags.contains(LinkFlags::LOOPBACK))
            .filter_map(|link| link.target)
            .collect();
        for target in targets {
            self.foreach_link_mut(target, WalkFlags::IGNORE_EMBEDDED, |slot, link| {
                if link.flags.contains(LinkFlags::LOOPBACK) && *slot == Some(previous) {
                    *slot = Some(owner);
                }
                WalkControl::Continue
            });
        }
    }

    fn apply_rules(
        &mut self,
        owners: &[IdHandle],
        remapper: &mut IdRemapper,
        pass: Pass,
        flags: RemapFlags,
        raw: bool,
    ) -> usize {
        remapper.reset_results();
        let mut walk = WalkFlags::empty();
        if flags.contains(RemapFlags::FORCE_UI_POINTERS) || pass == Pass::Cleanup {
            walk.insert(WalkFlags::INCLUDE_UI);
        }
        if flags.contains(RemapFlags::DO_LIBRARY_POINTERS) {
            walk.insert(WalkFlags::DO_LIBRARY_POINTER);
        }

        let mut total = 0;
        let mut library_changed = false;
        for owner in owners {
            let owner = *owner;
            let Some(owner_block) = self.get(owner) else {
                continue;
            };
            let refcount = !raw
                && !flags.contains(RemapFlags::SKIP_USER_REFCOUNT)
                && !owner_block.tags.contains(IdTags::NO_USER_REFCOUNT);

            let rewrites = self.collect_rewrites(owner, remapper, pass, flags, walk);
            if rewrites.is_empty() {
                continue;
            }
            let by_ordinal: HashMap<usize, Option<IdHandle>> =
                rewrites.iter().map(|r| (r.ordinal, r.new)).collect();
            self.foreach_link_mut(owner, walk, |slot, link| {
                if let Some(new) = by_ordinal.get(&link.ordinal) {
                    *slot = *new;
                }
                WalkControl::Continue
            });

            for rewrite in &rewrites {
                let is_indirect = rewrite.flags.contains(LinkFlags::INDIRECT_USAGE);
                library_changed |= rewrite.flags.contains(LinkFlags::LIBRARY);
                if pass == Pass::Remap && !is_indirect {
                    remapper
                        .statuses
                        .entry(rewrite.old)
                        .or_default()
                        .status
                        .insert(RemapStatusFlags::IS_LINKED_DIRECT);
                }
                if rewrite.flags.contains(LinkFlags::USER_ONE) {
                    remapper.user_one_remapped.insert(rewrite.old);
                }
                if !refcount {
                    continue;
                }
                if rewrite.flags.contains(LinkFlags::USER)
                    && !(pass == Pass::Cleanup && remapper.contains(rewrite.old))
                {
                    self.id_us_min(rewrite.old);
                }
                if let Some(new) = rewrite.new {
                    if rewrite.flags.contains(LinkFlags::USER) {
                        if is_indirect {
                            self.id_us_plus_no_lib(new);
                        } else {
                            self.id_us_plus(new);
                        }
                    } else if rewrite.flags.contains(LinkFlags::USER_ONE) {
                        self.id_us_ensure_real(new);
                    }
                    if !is_indirect {
                        self.id_lib_extern(new);
                    }
                }
            }
            total += rewrites.len();
            trace!(owner = %owner, rewritten = rewrites.len(), "References rewritten");
            if !flags.contains(RemapFlags::SKIP_UPDATE_TAGGING) {
                self.notify_change(owner, IdChangeKind::Remapped);
            }
        }

        if total > 0 {
            self.structure_changed();
            if library_changed {
                self.name_maps.clear();
                for owner in owners {
                    self.sort_by_name(*owner, None);
                }
            }
        }
        total
    }

    /// Read-only pass over one owner: decide every rewrite and record skips.
    fn collect_rewrites(
        &self,
        owner: IdHandle,
        remapper: &mut IdRemapper,
        pass: Pass,
        flags: RemapFlags,
        walk: WalkFlags,
    ) -> Vec<Rewrite> {
        let mut rewrites = Vec::new();
        let mut never_null_violation = false;
        self.foreach_link(owner, walk, |link: &LinkVisit| {
            let Some(old) = link.target else {
                return WalkControl::Continue;
            };
            if link.flags.contains(LinkFlags::LOOPBACK)
                && !flags.contains(RemapFlags::DO_LOOPBACK_POINTERS)
            {
                return WalkControl::Continue;
            }
            let mut new = match pass {
                Pass::Cleanup => None,
                Pass::Remap => match remapper.get(old) {
                    RemapResult::Unavailable => return WalkControl::Continue,
                    RemapResult::Unassigned => None,
                    RemapResult::Remapped(new) => Some(new),
                },
            };
            if new == Some(old) {
                return WalkControl::Continue;
            }
            if link.flags.contains(LinkFlags::NEVER_SELF) && new == Some(owner) {
                new = None;
            }

            let is_indirect = link.flags.contains(LinkFlags::INDIRECT_USAGE);
            let is_never_null = link.flags.contains(LinkFlags::NEVER_NULL);
            let violates_never_null = is_never_null
                && new.is_none()
                && !flags.contains(RemapFlags::FORCE_NEVER_NULL_USAGE);
            let skip = (is_indirect && flags.contains(RemapFlags::SKIP_INDIRECT_USAGE))
                || (is_never_null && flags.contains(RemapFlags::SKIP_NEVER_NULL_USAGE))
                || violates_never_null;

            if skip {
                let status = remapper.statuses.entry(old).or_default();
                if is_indirect {
                    status.skipped_indirect += 1;
                } else {
                    status.skipped_direct += 1;
                }
                if link.flags.contains(LinkFlags::USER) {
                    status.skipped_refcounted += 1;
                } else if link.flags.contains(LinkFlags::USER_ONE) {
                    status.status.insert(RemapStatusFlags::IS_USER_ONE_SKIPPED);
                }
                never_null_violation |= violates_never_null;
                return WalkControl::Continue;
            }
            rewrites.push(Rewrite {
                ordinal: link.ordinal,
                old,
                new,
                flags: link.flags,
            });
            WalkControl::Continue
        });
        if never_null_violation && flags.contains(RemapFlags::STORE_NEVER_NULL_USAGE) {
            remapper.never_null_users.insert(owner);
        }
        rewrites
    }

    /// Linkage and extra-user upkeep of old data-blocks after a whole-database
    /// remap.
    fn postprocess_old_ids(&mut self, remapper: &IdRemapper) {
        for (old, _) in remapper.iter() {
            let status = remapper.status(old);
            if remapper.user_one_remapped.contains(&old)
                && !status.status.contains(RemapStatusFlags::IS_USER_ONE_SKIPPED)
                && self
                    .get(old)
                    .is_some_and(|b| b.tags.contains(IdTags::EXTRA_USER_SET))
            {
                self.id_us_clear_real(old);
            }
            let Some(block) = self.get_mut(old) else {
                continue;
            };
            if block.users - (status.skipped_refcounted as i32) < 0 {
                error!(
                    id = %old,
                    name = %block.name,
                    users = block.users,
                    skipped = status.skipped_refcounted,
                    "Remapping left more skipped users than the data-block has"
                );
            }
            if status.skipped_direct == 0 && block.is_linked() && block.tags.contains(IdTags::EXTERN)
            {
                block.tags.remove(IdTags::EXTERN);
                block.tags.insert(IdTags::INDIRECT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main::AllocFlags;
    use crate::types::IdType;

    struct Fixture {
        main: Main,
        mesh: IdHandle,
        other_mesh: IdHandle,
        object: IdHandle,
    }

    fn fixture() -> Fixture {
        let mut main = Main::standalone();
        let mesh = main.new_id(IdType::Mesh, "Cube");
        let other_mesh = main.new_id(IdType::Mesh, "Sphere");
        let object = main.new_id(IdType::Object, "Cube");
        main.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(mesh);
        main.refcount_recompute(false);
        Fixture {
            main,
            mesh,
            other_mesh,
            object,
        }
    }

    fn object_data(main: &Main, object: IdHandle) -> Option<IdHandle> {
        main.get(object).unwrap().data.as_object().unwrap().data
    }

    #[test]
    fn remap_moves_references_and_users() {
        let Fixture {
            mut main,
            mesh,
            other_mesh,
            object,
        } = fixture();
        let status = main.remap(mesh, Some(other_mesh), RemapFlags::empty()).unwrap();
        assert_eq!(object_data(&main, object), Some(other_mesh));
        assert_eq!(main.get(mesh).unwrap().users(), 0);
        assert_eq!(main.get(other_mesh).unwrap().users(), 1);
        assert!(status.status.contains(RemapStatusFlags::IS_LINKED_DIRECT));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let Fixture {
            mut main,
            mesh,
            object,
            ..
        } = fixture();
        let err = main.remap(mesh, Some(object), RemapFlags::empty()).unwrap_err();
        assert_eq!(err.code(), "E101");
        assert!(
            main.remap(mesh, Some(object), RemapFlags::ALLOW_TYPE_MISMATCH)
                .is_ok()
        );
    }

    #[test]
    fn never_null_field_is_kept_and_recorded() {
        let Fixture {
            mut main,
            mesh,
            object,
            ..
        } = fixture();
        let mut remapper = IdRemapper::new();
        remapper.add(&main, mesh, None).unwrap();
        main.remap_multiple(&mut remapper, RemapFlags::STORE_NEVER_NULL_USAGE);

        assert_eq!(object_data(&main, object), Some(mesh));
        assert!(remapper.never_null_users().contains(&object));
        assert_eq!(main.get(mesh).unwrap().users(), 1);
        let status = remapper.status(mesh);
        assert_eq!(status.skipped_direct, 1);
        assert_eq!(status.skipped_refcounted, 1);
    }

    #[test]
    fn forced_never_null_is_cleared() {
        let Fixture {
            mut main,
            mesh,
            object,
            ..
        } = fixture();
        let mut remapper = IdRemapper::new();
        remapper.add(&main, mesh, None).unwrap();
        main.remap_multiple(&mut remapper, RemapFlags::FORCE_NEVER_NULL_USAGE);
        assert_eq!(object_data(&main, object), None);
        assert!(remapper.never_null_users().is_empty());
        assert_eq!(main.get(mesh).unwrap().users(), 0);
    }

    #[test]
    fn unlink_clears_nullable_references() {
        let mut main = Main::standalone();
        let material = main.new_id(IdType::Material, "Red");
        let object = main.new_id(IdType::Object, "Cube");
        main.get_mut(object)
            .unwrap()
            .data
            .as_object_mut()
            .unwrap()
            .materials
            .extend([Some(material), Some(material)]);
        main.refcount_recompute(false);
        assert_eq!(main.get(material).unwrap().users(), 2);

        main.unlink(material).unwrap();
        let materials = &main.get(object).unwrap().data.as_object().unwrap().materials;
        assert_eq!(materials, &vec![None, None]);
        assert_eq!(main.get(material).unwrap().users(), 0);
    }

    #[test]
    fn never_self_rule_is_cleared() {
        let mut main = Main::standalone();
        let parent = main.new_id(IdType::Object, "Parent");
        let child = main.new_id(IdType::Object, "Child");
        main.get_mut(child).unwrap().data.as_object_mut().unwrap().parent = Some(parent);
        main.remap(parent, Some(child), RemapFlags::empty()).unwrap();
        assert_eq!(main.get(child).unwrap().data.as_object().unwrap().parent, None);
    }

    #[test]
    fn indirect_usage_can_be_skipped() {
        let mut main = Main::standalone();
        let lib = main.new_library("lib", "//lib.blend");
        let mesh = main.new_id(IdType::Mesh, "Cube");
        let other = main.new_id(IdType::Mesh, "Other");
        let linked_object = main
            .alloc_in_lib(Some(lib), IdType::Object, None, AllocFlags::empty())
            .unwrap();
        main.get_mut(linked_object).unwrap().data.as_object_mut().unwrap().data = Some(mesh);

        let status = main
            .remap(mesh, Some(other), RemapFlags::SKIP_INDIRECT_USAGE)
            .unwrap();
        assert_eq!(object_data(&main, linked_object), Some(mesh));
        assert_eq!(status.skipped_indirect, 1);
    }

    #[test]
    fn raw_remap_leaves_counts_and_events() {
        let Fixture {
            mut main,
            mesh,
            other_mesh,
            object,
        } = fixture();
        let events = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&events);
        main.subscribe(std::sync::Arc::new(move |_: &crate::notify::IdChange| {
            counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }));

        let mut remapper = IdRemapper::new();
        remapper.add(&main, mesh, Some(other_mesh)).unwrap();
        assert_eq!(main.remap_multiple_raw(&mut remapper, RemapFlags::empty()), 1);
        assert_eq!(object_data(&main, object), Some(other_mesh));
        assert_eq!(main.get(mesh).unwrap().users(), 1);
        assert_eq!(main.get(other_mesh).unwrap().users(), 0);
        assert_eq!(events.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[test]
    fn ui_references_need_force() {
        let mut main = Main::standalone();
        let image = main.new_id(IdType::Image, "A");
        let other = main.new_id(IdType::Image, "B");
        let screen = main.new_id(IdType::Screen, "Layout");
        main.get_mut(screen)
            .unwrap()
            .data
            .as_screen_mut()
            .unwrap()
            .space_refs
            .push(Some(image));
        main.refcount_recompute(false);

        main.remap(image, Some(other), RemapFlags::empty()).unwrap();
        let refs = |main: &Main| main.get(screen).unwrap().data.as_screen().unwrap().space_refs.clone();
        assert_eq!(refs(&main), vec![Some(image)]);

        main.remap(image, Some(other), RemapFlags::FORCE_UI_POINTERS).unwrap();
        assert_eq!(refs(&main), vec![Some(other)]);
        assert_eq!(main.get(other).unwrap().users(), 1);
        assert_eq!(main.get(image).unwrap().users(), 0);
    }

    #[test]
    fn relink_only_touches_given_ids() {
        let Fixture {
            mut main,
            mesh,
            other_mesh,
            object,
        } = fixture();
        let second = main.new_id(IdType::Object, "Second");
        main.get_mut(second).unwrap().data.as_object_mut().unwrap().data = Some(mesh);

        let mut remapper = IdRemapper::new();
        remapper.add(&main, mesh, Some(other_mesh)).unwrap();
        main.relink_multiple(&[second], RelinkType::Direct, &mut remapper, RemapFlags::empty());
        assert_eq!(object_data(&main, object), Some(mesh));
        assert_eq!(object_data(&main, second), Some(other_mesh));

        main.relink_multiple(&[second], RelinkType::Reverse, &mut remapper, RemapFlags::empty());
        assert_eq!(object_data(&main, second), Some(mesh));

        main.relink_multiple(&[object], RelinkType::Cleanup, &mut remapper, RemapFlags::empty());
        assert_eq!(object_data(&main, object), None);
    }

    #[test]
    fn old_linked_data_becomes_indirect_again() {
        let mut main = Main::standalone();
        let lib = main.new_library("lib", "//lib.blend");
        let linked = main
            .alloc_in_lib(Some(lib), IdType::Material, None, AllocFlags::empty())
            .unwrap();
        let local = main.new_id(IdType::Material, "Local");
        let object = main.new_id(IdType::Object, "Cube");
        main.get_mut(object)
            .unwrap()
            .data
            .as_object_mut()
            .unwrap()
            .materials
            .push(Some(linked));
        main.id_lib_extern(linked);
        assert!(main.get(linked).unwrap().tags().contains(IdTags::EXTERN));

        main.remap(linked, Some(local), RemapFlags::empty()).unwrap();
        let tags = main.get(linked).unwrap().tags();
        assert!(tags.contains(IdTags::INDIRECT));
        assert!(!tags.contains(IdTags::EXTERN));
    }

    #[test]
    fn swap_exchanges_payloads() {
        let mut main = Main::standalone();
        let image = main.new_id(IdType::Image, "Brick");
        let a = main.new_id(IdType::NodeTree, "A");
        let b = main.new_id(IdType::NodeTree, "B");
        let refs = |main: &Main, tree: IdHandle| {
            main.get(tree).unwrap().data.as_node_tree().unwrap().node_refs.clone()
        };
        main.get_mut(a).unwrap().data.as_node_tree_mut().unwrap().node_refs = vec![Some(image)];
        main.get_mut(b).unwrap().data.as_node_tree_mut().unwrap().node_refs = vec![Some(b)];

        main.swap(a, b, false, true).unwrap();
        assert_eq!(refs(&main, b), vec![Some(image)]);
        // The self reference follows the payload.
        assert_eq!(refs(&main, a), vec![Some(a)]);
        assert_eq!(main.get(a).unwrap().name(), "A");

        main.swap(a, b, true, false).unwrap();
        assert_eq!(main.get(a).unwrap().name(), "B");
        assert_eq!(main.get(b).unwrap().name(), "A");
        assert!(main.namemap_validate());

        let err = main.swap(a, image, false, false).unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn swap_fixes_embedded_owners() {
        let mut main = Main::standalone();
        let first = main.new_id(IdType::Scene, "First");
        let second = main.new_id(IdType::Scene, "Second");
        main.swap(first, second, false, true).unwrap();
        for scene in [first, second] {
            let master = main.get(scene).unwrap().data.embedded().unwrap();
            assert_eq!(master.data.embedded_owner(), Some(scene));
        }
    }
}
