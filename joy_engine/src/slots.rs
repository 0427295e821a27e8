//! Fixed-capacity handle tables for preloaded media.
//!
//! Handles arrive from Lua as plain integers, so every access goes through
//! [`SlotTable::index`] before storage is touched.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Number of slots in both the audio and the image table.
pub const SLOT_CAPACITY: usize = 16;

/// Script-facing identifier of a slot.
pub type Handle = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Audio,
    Image,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Audio => f.write_str("sample"),
            SlotKind::Image => f.write_str("image"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("{kind} handle {handle} is outside 0..{capacity}")]
    OutOfRange {
        kind: SlotKind,
        handle: Handle,
        capacity: usize,
    },
}

#[derive(Debug)]
pub struct SlotTable<T> {
    kind: SlotKind,
    slots: [Option<T>; SLOT_CAPACITY],
}

impl<T> SlotTable<T> {
    pub fn new(kind: SlotKind) -> Self {
        Self {
            kind,
            slots: std::array::from_fn(|_| None),
        }
    }

    /// The single bounds check shared by every handle-taking operation.
    pub fn index(&self, handle: Handle) -> Result<usize, SlotError> {
        usize::try_from(handle)
            .ok()
            .filter(|index| *index < SLOT_CAPACITY)
            .ok_or(SlotError::OutOfRange {
                kind: self.kind,
                handle,
                capacity: SLOT_CAPACITY,
            })
    }

    /// Stores `value` at `handle` and hands back the previous occupant so the
    /// caller can release it.
    pub fn store(&mut self, handle: Handle, value: T) -> Result<Option<T>, SlotError> {
        let index = self.index(handle)?;
        Ok(self.slots[index].replace(value))
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let index = self.index(handle).ok()?;
        self.slots[index].as_ref()
    }

    pub fn is_occupied(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    pub fn occupied(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every slot, returning how many were occupied.
    pub fn release_all(&mut self) -> usize {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.take())
            .count()
    }
}
