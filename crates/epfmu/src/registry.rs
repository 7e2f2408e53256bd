// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generational arena holding live instances.
//!
//! Slots are allocated in blocks of [`REGISTRY_BLOCK`]. Removing a value
//! empties its slot and bumps the slot generation, so an [`InstanceId`]
//! issued before the removal never resolves again, even once the slot is
//! reused.

use std::fmt;

use crate::config::REGISTRY_BLOCK;

/// Handle to a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of `Option<T>` slots with generation counters.
#[derive(Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    live: usize,
}

impl<T> Registry<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Store `value` in the first free slot, growing the arena when full.
    pub fn insert(&mut self, value: T) -> InstanceId {
        let index = match self.slots.iter().position(|s| s.value.is_none()) {
            Some(index) => index,
            None => {
                let first = self.slots.len();
                self.slots.reserve(REGISTRY_BLOCK);
                self.slots.extend((0..REGISTRY_BLOCK).map(|_| Slot {
                    generation: 0,
                    value: None,
                }));
                log::debug!("[epfmu] registry grown to {} slots", self.slots.len());
                first
            }
        };

        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.live += 1;
        InstanceId {
            index: index as u32,
            generation: slot.generation,
        }
    }

    fn slot(&self, id: InstanceId) -> Option<&Slot<T>> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
    }

    pub fn get(&self, id: InstanceId) -> Option<&T> {
        self.slot(id).and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// `true` when `id` still names a live value.
    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    /// Take the value out and retire `id`.
    pub fn remove(&mut self, id: InstanceId) -> Option<T> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        Some(value)
    }

    /// Live values with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    InstanceId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Allocated slots, live or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
