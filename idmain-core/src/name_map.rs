//! Unique-name bookkeeping.
//!
//! A [`NameMap`] tracks the names in use for one scope: a single library (or
//! the local data), or the whole database. For each type it keeps the set of
//! full names and, per base name (the name without its `.NNN` suffix), which
//! suffixes are taken. Unique names are then found with a bit scan instead of
//! probing names one by one.

use crate::types::{IdHandle, IdType};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Maximum length of a data-block name, in bytes.
pub const MAX_ID_NAME_LEN: usize = 255;

/// Largest numeric suffix.
pub const MAX_NAME_NUMBER: u32 = 999_999_999;

/// Suffixes below this value are tracked exactly.
const EXACT_NUMBER_RANGE: u32 = 1024;
const MASK_WORDS: usize = (EXACT_NUMBER_RANGE / 64) as usize;

/// Split `name` into its base and numeric suffix.
///
/// `"Cube.001"` gives `("Cube", 1)`; a name without a valid suffix gives
/// `(name, 0)`.
#[must_use]
pub fn split_name_number(name: &str) -> (&str, u32) {
    if let Some(dot) = name.rfind('.') {
        let digits = &name[dot + 1..];
        if !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && let Ok(number) = digits.parse::<u32>()
            && number <= MAX_NAME_NUMBER
        {
            return (&name[..dot], number);
        }
    }
    (name, 0)
}

/// Join a base name and a numeric suffix (`0` means no suffix).
#[must_use]
pub fn name_with_number(base: &str, number: u32) -> String {
    if number == 0 {
        base.to_string()
    } else {
        format!("{base}.{number:03}")
    }
}

/// Strip control characters and cut `name` to [`MAX_ID_NAME_LEN`] bytes on a
/// character boundary.
#[must_use]
pub fn clean_name(name: &str) -> String {
    let mut cleaned: String = name.chars().filter(|c| !c.is_control()).collect();
    truncate_to_boundary(&mut cleaned, MAX_ID_NAME_LEN);
    cleaned
}

fn truncate_to_boundary(name: &mut String, max_len: usize) {
    if name.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name.truncate(end);
}

/// Drop the last character of `base`.
fn shrink_base(base: &str) -> Option<&str> {
    let (last, _) = base.char_indices().next_back()?;
    (last > 0).then(|| &base[..last])
}

/// Taken suffixes of one base name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SuffixTracker {
    mask: [u64; MASK_WORDS],
    max_seen: u32,
}

impl SuffixTracker {
    fn mark(&mut self, number: u32) {
        if number < EXACT_NUMBER_RANGE {
            self.mask[(number / 64) as usize] |= 1 << (number % 64);
        } else {
            self.max_seen = self.max_seen.max(number);
        }
    }

    // Suffixes beyond the exact range are not tracked individually, so
    // `max_seen` is never lowered.
    fn unmark(&mut self, number: u32) {
        if number < EXACT_NUMBER_RANGE {
            self.mask[(number / 64) as usize] &= !(1 << (number % 64));
        }
    }

    fn is_empty(&self) -> bool {
        self.max_seen == 0 && self.mask.iter().all(|word| *word == 0)
    }

    /// First untracked suffix at or after `from` in the exact range.
    fn next_free(&self, from: u32) -> Option<u32> {
        let mut number = from;
        while number < EXACT_NUMBER_RANGE {
            let word_index = number / 64;
            let below = (1u64 << (number % 64)) - 1;
            let free = !(self.mask[word_index as usize] | below);
            if free != 0 {
                return Some(word_index * 64 + free.trailing_zeros());
            }
            number = (word_index + 1) * 64;
        }
        None
    }
}

#[derive(Debug, Clone, Default)]
struct TypeNames {
    full_names: HashMap<String, u32>,
    bases: HashMap<String, SuffixTracker>,
}

/// Result of a unique-name request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueName {
    /// The name to use.
    pub name: String,
    /// Whether the proposed name was already taken.
    pub collided: bool,
}

/// Name bookkeeping for one scope.
#[derive(Debug, Clone)]
pub struct NameMap {
    global: bool,
    types: Vec<TypeNames>,
}

impl NameMap {
    /// Create an empty map for a single library (or the local data).
    #[must_use]
    pub fn local() -> Self {
        Self::with_scope(false)
    }

    /// Create an empty map for a whole database, where identical names from
    /// different libraries coexist.
    #[must_use]
    pub fn global() -> Self {
        Self::with_scope(true)
    }

    fn with_scope(global: bool) -> Self {
        Self {
            global,
            types: vec![TypeNames::default(); IdType::COUNT],
        }
    }

    /// Build a map from existing names.
    pub fn from_names<'a>(global: bool, names: impl IntoIterator<Item = (IdType, &'a str)>) -> Self {
        let mut map = Self::with_scope(global);
        for (id_type, name) in names {
            map.add_name(id_type, name);
        }
        map
    }

    /// Whether this map covers a whole database.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Whether `name` is taken for `id_type`.
    #[must_use]
    pub fn contains(&self, id_type: IdType, name: &str) -> bool {
        self.types[id_type.index()].full_names.contains_key(name)
    }

    /// Number of data-blocks registered under `name`.
    #[must_use]
    pub fn multiplicity(&self, id_type: IdType, name: &str) -> u32 {
        self.types[id_type.index()]
            .full_names
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct names registered for `id_type`.
    #[must_use]
    pub fn len(&self, id_type: IdType) -> usize {
        self.types[id_type.index()].full_names.len()
    }

    /// Whether no name is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.iter().all(|names| names.full_names.is_empty())
    }

    /// Register `name` as taken.
    pub fn add_name(&mut self, id_type: IdType, name: &str) {
        let names = &mut self.types[id_type.index()];
        *names.full_names.entry(name.to_string()).or_insert(0) += 1;
        let (base, number) = split_name_number(name);
        names.bases.entry(base.to_string()).or_default().mark(number);
    }

    /// Release `name`. In a global map only the last release frees it.
    pub fn remove_name(&mut self, id_type: IdType, name: &str) {
        let names = &mut self.types[id_type.index()];
        let Some(count) = names.full_names.get_mut(name) else {
            return;
        };
        if self.global && *count > 1 {
            *count -= 1;
            return;
        }
        names.full_names.remove(name);

        let (base, number) = split_name_number(name);
        if let Some(tracker) = names.bases.get_mut(base) {
            tracker.unmark(number);
            if tracker.is_empty() {
                names.bases.remove(base);
            }
        }
    }

    /// Compute the name [`NameMap::get_unique_name`] would pick, without
    /// registering it.
    #[must_use]
    pub fn suggest_unique_name(&self, id_type: IdType, proposed: &str) -> UniqueName {
        let names = &self.types[id_type.index()];
        let proposed = clean_name(proposed);
        if !names.full_names.contains_key(&proposed) {
            return UniqueName {
                name: proposed,
                collided: false,
            };
        }

        let (base, _) = split_name_number(&proposed);
        let mut base = base;
        loop {
            if let Some(number) = next_number(names, base) {
                let candidate = name_with_number(base, number);
                if candidate.len() <= MAX_ID_NAME_LEN {
                    return UniqueName {
                        name: candidate,
                        collided: true,
                    };
                }
            }
            match shrink_base(base) {
                Some(shorter) => base = shorter,
                None => break,
            }
        }

        tracing::warn!(
            name = %proposed,
            "Numeric suffixes exhausted, falling back to additive suffix"
        );
        for counter in 1..=MAX_NAME_NUMBER {
            let candidate = format!("{base}_{counter:03}");
            if !names.full_names.contains_key(&candidate) {
                return UniqueName {
                    name: candidate,
                    collided: true,
                };
            }
        }

        // Best effort: retries until a free hash-derived name turns up.
        let mut attempt: u64 = 0;
        loop {
            let mut hasher = DefaultHasher::new();
            proposed.hash(&mut hasher);
            attempt.hash(&mut hasher);
            let candidate = format!("{base}_{:016x}", hasher.finish());
            if !names.full_names.contains_key(&candidate) {
                return UniqueName {
                    name: candidate,
                    collided: true,
                };
            }
            attempt = attempt.wrapping_add(1);
        }
    }

    /// Make `name` unique for `id_type` in this scope and register it.
    ///
    /// Returns `true` when the requested name was taken and `name` has been
    /// changed.
    pub fn get_unique_name(&mut self, id_type: IdType, name: &mut String) -> bool {
        let unique = self.suggest_unique_name(id_type, name);
        self.add_name(id_type, &unique.name);
        *name = unique.name;
        unique.collided
    }

    /// Compare the registered full names with another map.
    #[must_use]
    pub fn same_names(&self, other: &NameMap) -> bool {
        self.types
            .iter()
            .zip(&other.types)
            .all(|(a, b)| a.full_names == b.full_names)
    }
}

/// Smallest free suffix for `base`, checking full names as well so that
/// spellings like `Cube.01` and `Cube.001` cannot collide.
fn next_number(names: &TypeNames, base: &str) -> Option<u32> {
    let tracker = names.bases.get(base);
    let mut from = 1;
    loop {
        let free = match tracker {
            Some(tracker) => tracker.next_free(from),
            None => (from < EXACT_NUMBER_RANGE).then_some(from),
        };
        let Some(number) = free else {
            break;
        };
        if !names.full_names.contains_key(&name_with_number(base, number)) {
            return Some(number);
        }
        from = number + 1;
    }

    let mut number = tracker.map_or(EXACT_NUMBER_RANGE, |t| {
        t.max_seen.max(EXACT_NUMBER_RANGE - 1).saturating_add(1)
    });
    while number <= MAX_NAME_NUMBER {
        if !names.full_names.contains_key(&name_with_number(base, number)) {
            return Some(number);
        }
        number += 1;
    }
    None
}

/// Name maps of one database, built lazily per scope.
#[derive(Debug, Default)]
pub(crate) struct NameMaps {
    scopes: HashMap<Option<IdHandle>, NameMap>,
    global: Option<NameMap>,
}

impl NameMaps {
    pub(crate) fn clear(&mut self) {
        self.scopes.clear();
        self.global = None;
    }

    pub(crate) fn has_scope(&self, library: Option<IdHandle>) -> bool {
        self.scopes.contains_key(&library)
    }

    pub(crate) fn insert_scope(&mut self, library: Option<IdHandle>, map: NameMap) {
        self.scopes.insert(library, map);
    }

    pub(crate) fn scope(&self, library: Option<IdHandle>) -> Option<&NameMap> {
        self.scopes.get(&library)
    }

    pub(crate) fn scope_mut(&mut self, library: Option<IdHandle>) -> &mut NameMap {
        self.scopes.entry(library).or_insert_with(NameMap::local)
    }

    pub(crate) fn global(&self) -> Option<&NameMap> {
        self.global.as_ref()
    }

    pub(crate) fn set_global(&mut self, map: NameMap) {
        self.global = Some(map);
    }

    pub(crate) fn global_mut(&mut self) -> Option<&mut NameMap> {
        self.global.as_mut()
    }

    pub(crate) fn global_entry(&mut self) -> &NameMap {
        self.global.get_or_insert_with(NameMap::global)
    }

    pub(crate) fn built_scopes(&self) -> Vec<Option<IdHandle>> {
        self.scopes.keys().copied().collect()
    }

    /// Register a name in every built map covering `library`.
    pub(crate) fn add(&mut self, id_type: IdType, library: Option<IdHandle>, name: &str) {
        if let Some(map) = self.scopes.get_mut(&library) {
            map.add_name(id_type, name);
        }
        if let Some(global) = &mut self.global {
            global.add_name(id_type, name);
        }
    }

    /// Release a name in every built map covering `library`.
    pub(crate) fn remove(&mut self, id_type: IdType, library: Option<IdHandle>, name: &str) {
        if let Some(map) = self.scopes.get_mut(&library) {
            map.remove_name(id_type, name);
        }
        if let Some(global) = &mut self.global {
            global.remove_name(id_type, name);
        }
    }
}
