//! Link-visitor protocol: enumeration of the outgoing references of a
//! data-block.
//!
//! Every payload reports its reference fields together with [`LinkFlags`]
//! describing how the reference is used. The walkers here add the header
//! (library pointer), recurse into embedded data-blocks and assign each
//! visited field an ordinal, so a read-only pass can record decisions that a
//! later mutable pass applies by ordinal.

use crate::id::IdBlock;
use crate::idtype::IdData;
use crate::main::Main;
use crate::types::{IdHandle, flag_set};

flag_set! {
    /// How a reference field is used by its owner.
    pub struct LinkFlags(u32) {
        /// The reference must never be null while the owner exists.
        const NEVER_NULL = 1 << 0;
        /// The reference must never point at its owner.
        const NEVER_SELF = 1 << 1;
        /// The owner is linked data; set by the walker, not by payloads.
        const INDIRECT_USAGE = 1 << 2;
        /// The reference was found inside an embedded data-block.
        const EMBEDDED = 1 << 3;
        /// Back reference from an embedded data-block to its owner.
        const EMBEDDED_NOT_OWNING = 1 << 4;
        /// Back reference to a data-block that owns this one.
        const LOOPBACK = 1 << 5;
        /// The reference counts as a user of its target.
        const USER = 1 << 8;
        /// The target needs at least one user, without counting each reference.
        const USER_ONE = 1 << 9;
        /// Interface reference, only visited on request.
        const UI = 1 << 10;
        /// The data-block header's library pointer.
        const LIBRARY = 1 << 11;
    }
}

flag_set! {
    /// Options for a link walk.
    pub struct WalkFlags(u32) {
        /// Also visit interface references.
        const INCLUDE_UI = 1 << 0;
        /// Also visit the library pointer of the header.
        const DO_LIBRARY_POINTER = 1 << 1;
        /// Do not recurse into embedded data-blocks.
        const IGNORE_EMBEDDED = 1 << 2;
    }
}

/// Whether a walk continues after a visited reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    /// Visit the next reference.
    Continue,
    /// Abort the walk.
    Stop,
}

/// One visited reference field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkVisit {
    /// Current value of the field.
    pub target: Option<IdHandle>,
    /// Usage flags of the field.
    pub flags: LinkFlags,
    /// Position of the field in the walk, stable for identical walk options.
    pub ordinal: usize,
}

impl LinkVisit {
    /// Whether the field points at something.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.target.is_some()
    }
}

impl IdBlock {
    /// Visit every outgoing reference of this data-block.
    ///
    /// Returns [`WalkControl::Stop`] when the visitor aborted the walk.
    pub fn foreach_link(
        &self,
        walk: WalkFlags,
        visit: &mut dyn FnMut(&LinkVisit) -> WalkControl,
    ) -> WalkControl {
        let indirect = self.indirect_usage();
        let mut ordinal = 0;
        if walk.contains(WalkFlags::DO_LIBRARY_POINTER) {
            let link = LinkVisit {
                target: self.library,
                flags: LinkFlags::LIBRARY | LinkFlags::NEVER_SELF | indirect,
                ordinal,
            };
            ordinal += 1;
            if visit(&link) == WalkControl::Stop {
                return WalkControl::Stop;
            }
        }
        walk_payload(&self.data, walk, indirect, &mut ordinal, visit)
    }

    /// Visit every outgoing reference of this data-block, allowing the
    /// visitor to rewrite it.
    ///
    /// Ordinals match those of [`IdBlock::foreach_link`] for the same flags.
    pub fn foreach_link_mut(
        &mut self,
        walk: WalkFlags,
        visit: &mut dyn FnMut(&mut Option<IdHandle>, &LinkVisit) -> WalkControl,
    ) -> WalkControl {
        let indirect = self.indirect_usage();
        let mut ordinal = 0;
        if walk.contains(WalkFlags::DO_LIBRARY_POINTER) {
            let link = LinkVisit {
                target: self.library,
                flags: LinkFlags::LIBRARY | LinkFlags::NEVER_SELF | indirect,
                ordinal,
            };
            ordinal += 1;
            if visit(&mut self.library, &link) == WalkControl::Stop {
                return WalkControl::Stop;
            }
        }
        walk_payload_mut(&mut self.data, walk, indirect, &mut ordinal, visit)
    }

    fn indirect_usage(&self) -> LinkFlags {
        if self.is_linked() {
            LinkFlags::INDIRECT_USAGE
        } else {
            LinkFlags::empty()
        }
    }
}

fn walk_payload(
    data: &IdData,
    walk: WalkFlags,
    extra: LinkFlags,
    ordinal: &mut usize,
    visit: &mut dyn FnMut(&LinkVisit) -> WalkControl,
) -> WalkControl {
    let control = data.foreach_id(&mut |target, flags| {
        if flags.contains(LinkFlags::UI) && !walk.contains(WalkFlags::INCLUDE_UI) {
            return WalkControl::Continue;
        }
        let link = LinkVisit {
            target,
            flags: flags | extra,
            ordinal: *ordinal,
        };
        *ordinal += 1;
        visit(&link)
    });
    if control == WalkControl::Stop {
        return WalkControl::Stop;
    }
    match data.embedded() {
        Some(embedded) if !walk.contains(WalkFlags::IGNORE_EMBEDDED) => walk_payload(
            &embedded.data,
            walk,
            extra | LinkFlags::EMBEDDED,
            ordinal,
            visit,
        ),
        _ => WalkControl::Continue,
    }
}

fn walk_payload_mut(
    data: &mut IdData,
    walk: WalkFlags,
    extra: LinkFlags,
    ordinal: &mut usize,
    visit: &mut dyn FnMut(&mut Option<IdHandle>, &LinkVisit) -> WalkControl,
) -> WalkControl {
    let control = data.foreach_id_mut(&mut |slot, flags| {
        if flags.contains(LinkFlags::UI) && !walk.contains(WalkFlags::INCLUDE_UI) {
            return WalkControl::Continue;
        }
        let link = LinkVisit {
            target: *slot,
            flags: flags | extra,
            ordinal: *ordinal,
        };
        *ordinal += 1;
        visit(slot, &link)
    });
    if control == WalkControl::Stop {
        return WalkControl::Stop;
    }
    match data.embedded_mut() {
        Some(embedded) if !walk.contains(WalkFlags::IGNORE_EMBEDDED) => walk_payload_mut(
            &mut embedded.data,
            walk,
            extra | LinkFlags::EMBEDDED,
            ordinal,
            visit,
        ),
        _ => WalkControl::Continue,
    }
}

impl Main {
    /// Visit every outgoing reference of `owner`.
    ///
    /// Returns `false` when the handle does not resolve.
    pub fn foreach_link(
        &self,
        owner: IdHandle,
        walk: WalkFlags,
        mut visit: impl FnMut(&LinkVisit) -> WalkControl,
    ) -> bool {
        match self.get(owner) {
            Some(block) => {
                block.foreach_link(walk, &mut visit);
                true
            }
            None => false,
        }
    }

    /// Visit every outgoing reference of `owner`, allowing rewrites.
    ///
    /// Rewrites bypass user counting and change notification; use the
    /// remapper for counted edits.
    pub fn foreach_link_mut(
        &mut self,
        owner: IdHandle,
        walk: WalkFlags,
        mut visit: impl FnMut(&mut Option<IdHandle>, &LinkVisit) -> WalkControl,
    ) -> bool {
        match self.get_mut(owner) {
            Some(block) => {
                block.foreach_link_mut(walk, &mut visit);
                true
            }
            None => false,
        }
    }

    /// Collect the outgoing references of `owner` in walk order.
    #[must_use]
    pub fn links(&self, owner: IdHandle, walk: WalkFlags) -> Vec<LinkVisit> {
        let mut links = Vec::new();
        self.foreach_link(owner, walk, |link| {
            links.push(*link);
            WalkControl::Continue
        });
        links
    }
}
