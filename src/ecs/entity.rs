//! Entity handles and the world-internal record table.
//!
//! ## Purpose
//!
//! Entities are lightweight, opaque identifiers that reference rows in
//! archetype storage. This module is responsible for:
//!
//! - generating stable entity handles,
//! - tracking liveness via generations,
//! - mapping each live entity to its archetype and row,
//! - recycling indices through a free list.
//!
//! ## Entity model
//!
//! An [`Entity`] packs a 32-bit **index** and a 32-bit **generation** into a
//! single 64-bit value. The all-zero value is the null entity, and record
//! index 0 is permanently reserved for it, so no spawned entity ever has
//! index 0.
//!
//! ## Invariants
//!
//! - An entity is alive iff its record is marked alive *and* the handle's
//!   generation equals the record's generation.
//! - The generation is incremented when an index is issued by `spawn`, so a
//!   recycled index always produces a handle with a larger generation and
//!   every stale handle is rejected forever.
//! - While alive with components, `(archetype, row)` in the record reflects
//!   the entity's true storage location.

use bytemuck::{Pod, Zeroable};

use crate::ecs::types::{EntityIndex, Generation, Row, ENTITY_INDEX_BITS, ENTITY_INDEX_MASK, PLACEHOLDER_BIT};

/// Opaque, generation-checked identifier for a logical object.
///
/// Handles are plain values: cheap to copy, bitwise-comparable, hashable,
/// and grant neither ownership nor borrowing rights. They are `Pod`, so an
/// entity may itself appear inside a component (a `parent: Entity` field,
/// for instance) without the storage layer caring.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct Entity(pub u64);

impl Entity {
    /// The null entity: all-zero, never alive.
    pub const NULL: Entity = Entity(0);

    /// Packs an index/generation pair into a handle.
    #[inline]
    pub const fn new(index: EntityIndex, generation: Generation) -> Self {
        Entity(((generation as u64) << ENTITY_INDEX_BITS) | index as u64)
    }

    /// The record index encoded in this handle.
    #[inline]
    pub const fn index(self) -> EntityIndex {
        (self.0 & ENTITY_INDEX_MASK) as EntityIndex
    }

    /// The generation encoded in this handle.
    #[inline]
    pub const fn generation(self) -> Generation {
        (self.0 >> ENTITY_INDEX_BITS) as Generation
    }

    /// `true` for any handle other than [`Entity::NULL`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// `true` if this handle is a command-buffer placeholder awaiting
    /// resolution to a real entity.
    #[inline]
    pub const fn is_placeholder(self) -> bool {
        (self.index() & PLACEHOLDER_BIT) != 0
    }
}

/// Where a live entity's components are stored.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct EntityRecord {
    /// Current generation of this index.
    pub generation: Generation,
    /// Whether the index is currently issued.
    pub alive: bool,
    /// Index of the owning archetype in the world's registry, or `None`
    /// while the entity has zero components.
    pub archetype: Option<u32>,
    /// Row within the owning archetype.
    pub row: Row,
}

/// Entity allocator and record table.
///
/// Owned by the world; not synchronized. Index 0 is reserved at
/// construction and never enters the free list.
pub(crate) struct EntityRecords {
    records: Vec<EntityRecord>,
    free: Vec<EntityIndex>,
    alive_count: u32,
}

impl EntityRecords {
    pub fn new() -> Self {
        Self {
            // Index 0 is the null entity's slot, permanently dead.
            records: vec![EntityRecord::default()],
            free: Vec::new(),
            alive_count: 0,
        }
    }

    /// Issues a fresh handle, recycling a freed index when one is available.
    pub fn spawn(&mut self) -> Entity {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.records.len() as EntityIndex;
                assert!((index & PLACEHOLDER_BIT) == 0, "entity index space exhausted");
                self.records.push(EntityRecord::default());
                index
            }
        };
        let record = &mut self.records[index as usize];
        record.generation = record.generation.wrapping_add(1);
        record.alive = true;
        record.archetype = None;
        record.row = 0;
        self.alive_count += 1;
        Entity::new(index, record.generation)
    }

    /// `true` iff the handle refers to a currently-live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        match self.records.get(entity.index() as usize) {
            Some(record) => record.alive && record.generation == entity.generation(),
            None => false,
        }
    }

    /// Number of live entities.
    #[inline]
    pub fn alive_count(&self) -> u32 {
        self.alive_count
    }

    #[inline]
    pub fn record(&self, index: EntityIndex) -> &EntityRecord {
        &self.records[index as usize]
    }

    #[inline]
    pub fn record_mut(&mut self, index: EntityIndex) -> &mut EntityRecord {
        &mut self.records[index as usize]
    }

    /// Marks the index dead and returns it to the free list.
    ///
    /// The caller must already have detached the entity from its archetype.
    pub fn free_slot(&mut self, index: EntityIndex) {
        let record = &mut self.records[index as usize];
        debug_assert!(record.alive, "freeing an entity slot that is not alive");
        record.alive = false;
        record.archetype = None;
        record.row = 0;
        self.free.push(index);
        self.alive_count -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_entity_is_invalid_and_never_alive() {
        let records = EntityRecords::new();
        assert!(!Entity::NULL.is_valid());
        assert!(!records.is_alive(Entity::NULL));
    }

    #[test]
    fn reused_index_gets_next_generation() {
        let mut records = EntityRecords::new();
        let first = records.spawn();
        records.free_slot(first.index());
        let second = records.spawn();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(!records.is_alive(first));
        assert!(records.is_alive(second));
    }

    #[test]
    fn spawned_indices_start_at_one() {
        let mut records = EntityRecords::new();
        assert_eq!(records.spawn().index(), 1);
    }
}
