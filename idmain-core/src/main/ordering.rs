//! Sorted insertion into the per-type lists.
//!
//! Lists hold local data first, then linked data grouped by library. Within a
//! group, names are ordered case-insensitively with an exact tiebreak.

use super::Main;
use crate::types::IdHandle;
use std::cmp::Ordering;

/// Order names case-insensitively, falling back to byte order.
#[must_use]
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded_a = a.chars().flat_map(char::to_lowercase);
    let folded_b = b.chars().flat_map(char::to_lowercase);
    folded_a.cmp(folded_b).then_with(|| a.cmp(b))
}

impl Main {
    /// Move `handle` to its sorted position in its type list.
    ///
    /// `hint` is a data-block expected to precede it directly, as when
    /// inserting a run of already sorted names.
    pub fn sort_by_name(&mut self, handle: IdHandle, hint: Option<IdHandle>) {
        let Some(block) = self.get(handle) else {
            return;
        };
        let list_index = block.id_type.index();
        let library = block.library;
        let name = block.name.clone();

        let mut list = std::mem::take(&mut self.lists[list_index]);
        if list.last() == Some(&handle) {
            list.pop();
        } else if let Some(index) = list.iter().position(|h| *h == handle) {
            list.remove(index);
        }
        let position = self.insertion_index(&list, library, &name, hint);
        list.insert(position, handle);
        self.lists[list_index] = list;
    }

    fn insertion_index(
        &self,
        list: &[IdHandle],
        library: Option<IdHandle>,
        name: &str,
        hint: Option<IdHandle>,
    ) -> usize {
        let name_at = |index: usize| self.get(list[index]).map_or("", |b| b.name.as_str());
        let Some((start, end)) = self.group_range(list, library) else {
            // New group: local data leads, libraries append.
            return if library.is_none() { 0 } else { list.len() };
        };

        if let Some(hint) = hint
            && let Some(hint_block) = self.get(hint)
            && hint_block.library == library
        {
            let below_hint = |h: &IdHandle| {
                compare_names(self.get(*h).map_or("", |b| b.name.as_str()), &hint_block.name)
                    == Ordering::Less
            };
            let index = start + list[start..end].partition_point(below_hint);
            let after = index + 1;
            if index < end
                && list[index] == hint
                && compare_names(name_at(index), name) == Ordering::Less
                && (after == end || compare_names(name_at(after), name) == Ordering::Greater)
            {
                return after;
            }
        }

        // Scan backward by chunks for the first chunk starting below `name`,
        // then forward within it.
        let chunk = self.config().sort_chunk_size().max(1);
        let mut chunk_end = end;
        while chunk_end > start {
            let chunk_start = chunk_end.saturating_sub(chunk).max(start);
            if compare_names(name_at(chunk_start), name) == Ordering::Less {
                return (chunk_start + 1..chunk_end)
                    .find(|i| compare_names(name_at(*i), name) == Ordering::Greater)
                    .unwrap_or(chunk_end);
            }
            chunk_end = chunk_start;
        }
        start
    }

    /// Index range of the `library` group in a sorted list.
    ///
    /// Groups are contiguous, so once one member is known both boundaries
    /// are binary searches. Local data is a prefix. A linked group is found
    /// by walking chunk boundaries backward; only chunks spanning a group
    /// boundary are scanned.
    fn group_range(&self, list: &[IdHandle], library: Option<IdHandle>) -> Option<(usize, usize)> {
        let library_at = |index: usize| self.get(list[index]).and_then(|b| b.library);
        let in_group = |h: &IdHandle| self.get(*h).is_some_and(|b| b.library == library);

        let member = if library.is_none() {
            (!list.is_empty() && library_at(0).is_none()).then_some(0)
        } else {
            let chunk = self.config().sort_chunk_size().max(1);
            let mut found = None;
            let mut chunk_end = list.len();
            while chunk_end > 0 {
                let chunk_start = chunk_end.saturating_sub(chunk);
                let (first, last) = (library_at(chunk_start), library_at(chunk_end - 1));
                if last == library {
                    found = Some(chunk_end - 1);
                } else if first == library {
                    found = Some(chunk_start);
                } else if first != last {
                    found = (chunk_start + 1..chunk_end - 1).find(|i| library_at(*i) == library);
                }
                if found.is_some() {
                    break;
                }
                chunk_end = chunk_start;
            }
            found
        }?;

        let start = list[..=member].partition_point(|h| !in_group(h));
        let end = member + list[member..].partition_point(in_group);
        Some((start, end))
    }
}
