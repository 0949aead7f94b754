//! Archetype tables: SoA storage for one component composition.
//!
//! An archetype is the equivalence class of entities sharing the same
//! component type set. It owns one [`ColumnStore`] per component type plus
//! the row → entity vector, and its identity is the FNV-1a hash of its
//! sorted type-id sequence.
//!
//! ## Invariants
//!
//! - Component descriptors are sorted by type id; identical sets always map
//!   to the same archetype id.
//! - After every operation, all columns and the entity vector share the same
//!   count.
//! - For every row `r < count`, `entities[r]` is the live entity whose world
//!   record points back at `(this archetype, r)`; the world maintains that
//!   half of the invariant across swap-removes.

use std::collections::HashMap;

use crate::ecs::component::TypeInfo;
use crate::ecs::entity::Entity;
use crate::ecs::storage::ColumnStore;
use crate::ecs::types::{hash_type_ids, ArchetypeId, Row, TypeId64};

/// A set of parallel component columns keyed by an ordered type set.
pub struct Archetype {
    id: ArchetypeId,
    infos: Vec<TypeInfo>,
    index_map: HashMap<TypeId64, usize>,
    columns: Vec<ColumnStore>,
    entities: Vec<Entity>,
}

impl Archetype {
    /// Builds an archetype from a component descriptor list.
    ///
    /// The list is sorted by type id here, so callers may pass descriptors
    /// in any order; duplicates are a contract violation.
    pub fn new(mut infos: Vec<TypeInfo>) -> Self {
        infos.sort_by_key(|info| info.type_id);
        debug_assert!(
            infos.windows(2).all(|pair| pair[0].type_id != pair[1].type_id),
            "duplicate component type in archetype"
        );
        let id = hash_type_ids(infos.iter().map(|info| info.type_id));
        let mut index_map = HashMap::with_capacity(infos.len());
        let mut columns = Vec::with_capacity(infos.len());
        for (position, info) in infos.iter().enumerate() {
            index_map.insert(info.type_id, position);
            columns.push(ColumnStore::new(info.size, info.align));
        }
        Self { id, infos, index_map, columns, entities: Vec::new() }
    }

    /// Identity hash of the sorted type-id sequence.
    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Number of entities stored.
    #[inline]
    pub fn count(&self) -> u32 {
        self.entities.len() as u32
    }

    /// Row → entity mapping.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Sorted component descriptors of this archetype.
    #[inline]
    pub fn type_infos(&self) -> &[TypeInfo] {
        &self.infos
    }

    /// O(1) presence test for a component type.
    #[inline]
    pub fn has(&self, type_id: TypeId64) -> bool {
        self.index_map.contains_key(&type_id)
    }

    /// Appends `entity` with zero-initialized component data in every
    /// column. Returns the new row.
    pub fn add_entity(&mut self, entity: Entity) -> Row {
        let row = self.entities.len() as Row;
        self.entities.push(entity);
        for column in &mut self.columns {
            let pushed = column.push_zeroed();
            debug_assert_eq!(pushed, row);
        }
        row
    }

    /// Swap-removes `row` from the entity vector and every column.
    ///
    /// When `row` was not the last row, the previous last entity now lives
    /// at `row`; the caller (the world) must update that entity's record.
    pub fn remove_entity(&mut self, row: Row) {
        assert!((row as usize) < self.entities.len(), "archetype row {row} out of range");
        self.entities.swap_remove(row as usize);
        for column in &mut self.columns {
            column.swap_remove(row);
        }
    }

    /// Byte view of one component at `row`, or `None` if the type is not
    /// part of this archetype. Borrowed until the next structural change.
    pub fn get(&self, row: Row, type_id: TypeId64) -> Option<&[u8]> {
        Some(self.column(type_id)?.bytes_at(row))
    }

    /// Mutable byte view of one component at `row`, or `None` if the type
    /// is not part of this archetype.
    pub fn get_mut(&mut self, row: Row, type_id: TypeId64) -> Option<&mut [u8]> {
        let column = self.column_mut(type_id)?;
        let size = column.elem_size();
        let ptr = column.ptr_at_mut(row);
        Some(unsafe { std::slice::from_raw_parts_mut(ptr, size) })
    }

    /// Overwrites one component at `row`. Silent no-op if the type is not
    /// part of this archetype.
    pub fn set(&mut self, row: Row, type_id: TypeId64, bytes: &[u8]) {
        if let Some(column) = self.column_mut(type_id) {
            column.write(row, bytes);
        }
    }

    /// Direct column access for query iteration.
    pub fn column(&self, type_id: TypeId64) -> Option<&ColumnStore> {
        self.index_map.get(&type_id).map(|&position| &self.columns[position])
    }

    /// Mutable column access.
    pub fn column_mut(&mut self, type_id: TypeId64) -> Option<&mut ColumnStore> {
        match self.index_map.get(&type_id) {
            Some(&position) => Some(&mut self.columns[position]),
            None => None,
        }
    }

    /// Shrinks every column to its live count. Invalidates held pointers.
    pub fn compact(&mut self) {
        for column in &mut self.columns {
            column.compact();
        }
        self.entities.shrink_to_fit();
    }

    /// Debug check that all columns and the entity vector agree on count.
    pub(crate) fn check_counts(&self) {
        for column in &self.columns {
            debug_assert_eq!(column.count() as usize, self.entities.len());
        }
    }
}
