//! Generational storage for data-blocks.

use crate::id::IdBlock;
use crate::types::IdHandle;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    block: Option<IdBlock>,
}

/// Slot storage handing out [`IdHandle`]s.
///
/// Freed slots are reused with a bumped generation, so handles to freed
/// data-blocks never resolve to their successors.
#[derive(Debug, Default)]
pub(crate) struct IdArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl IdArena {
    pub(crate) fn insert(&mut self, block: IdBlock) -> IdHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.block = Some(block);
            return IdHandle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            block: Some(block),
        });
        IdHandle::new(index, 0)
    }

    pub(crate) fn get(&self, handle: IdHandle) -> Option<&IdBlock> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.block.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: IdHandle) -> Option<&mut IdBlock> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.block.as_mut())
    }

    pub(crate) fn contains(&self, handle: IdHandle) -> bool {
        self.get(handle).is_some()
    }

    pub(crate) fn remove(&mut self, handle: IdHandle) -> Option<IdBlock> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let block = slot.block.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.len -= 1;
        Some(block)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (IdHandle, &IdBlock)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.block
                .as_ref()
                .map(|block| (IdHandle::new(index as u32, slot.generation), block))
        })
    }
}
