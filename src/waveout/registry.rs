//! Fixed-capacity wave source registry

use std::fmt;

use super::WaveSource;
use crate::error::{Result, SoundError};

/// Maximum number of simultaneously registered sources
pub const MAX_WAVE_SOURCES: usize = 3;

/// Opaque registration id, valid until unregistered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourceId(usize);

impl SourceId {
    /// Slot index backing this id
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An occupied slot: the source and its scratch buffer
pub(crate) struct Slot {
    pub(crate) source: Box<dyn WaveSource>,
    pub(crate) scratch: Vec<u8>,
}

/// Slot table for wave sources
pub struct SourceRegistry {
    slots: [Option<Slot>; MAX_WAVE_SOURCES],
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        SourceRegistry {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Place `source` in the lowest free slot
    pub fn register(&mut self, source: Box<dyn WaveSource>) -> Result<SourceId> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SoundError::NoFreeSlot(MAX_WAVE_SOURCES))?;
        self.slots[index] = Some(Slot {
            source,
            scratch: Vec::new(),
        });
        Ok(SourceId(index))
    }

    /// Empty a slot, returning whether it was occupied
    pub fn unregister(&mut self, id: SourceId) -> bool {
        self.slots
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    /// Whether `id` currently names a source
    pub fn is_registered(&self, id: SourceId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether every slot is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied slots, skipping empty ones
    pub(crate) fn occupied_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut().flatten()
    }
}
