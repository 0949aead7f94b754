//! The world: entity allocator, archetype registry, and structural engine.
//!
//! ## Purpose
//!
//! The world owns every piece of ECS state: the entity record table, the
//! archetype registry, the command buffer, and the system scheduler. All
//! structural mutation — spawning, despawning, attaching and detaching
//! components — funnels through it so that entity records and archetype
//! rows never disagree.
//!
//! ## Structural mutation
//!
//! Adding or removing a component migrates the entity between archetypes:
//! the target archetype (current type set plus or minus one type) is looked
//! up or created, a zero row is appended there, every surviving component is
//! copied across byte-wise, and the source row is swap-removed. Swap-remove
//! relocates whichever entity occupied the last row, so every migration ends
//! by patching that entity's record.
//!
//! ## Error posture
//!
//! Operations on dead or stale handles are silent no-ops; missing components
//! read as `None`. Out-of-range rows and malformed descriptors are
//! programmer errors and panic. The world is not internally synchronized:
//! structural mutation requires `&mut World`, and parallel phases defer
//! their mutations through the command buffer instead.
//!
//! ## Invariants
//!
//! - For every archetype `A` and row `r < A.count()`, `A.entities()[r]` is
//!   live and its record points back at `(A, r)`.
//! - Two distinct archetypes never share a sorted type-id sequence.
//! - Record index 0 is reserved for the null entity.

use std::collections::HashMap;

use bytemuck::{bytes_of, from_bytes, from_bytes_mut};
use tracing::trace_span;

use crate::ecs::archetype::Archetype;
use crate::ecs::commands::{resolve_placeholder, Command, CommandBuffer, CommandKind};
use crate::ecs::component::{type_id_of, Component, TypeInfo};
use crate::ecs::entity::{Entity, EntityRecords};
use crate::ecs::query::QueryBuilder;
use crate::ecs::scheduler::{run_system_list, SystemScheduler};
use crate::ecs::systems::TriggerEvent;
use crate::ecs::types::{hash_type_ids, ArchetypeId, TypeId64};

/// An ECS world: one simulation's entities, components, and systems.
pub struct World {
    records: EntityRecords,
    archetypes: Vec<Archetype>,
    archetype_index: HashMap<ArchetypeId, u32>,
    commands: CommandBuffer,
    scheduler: SystemScheduler,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self {
            records: EntityRecords::new(),
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            commands: CommandBuffer::new(),
            scheduler: SystemScheduler::new(),
        }
    }

    // ── entity lifecycle ──────────────────────────────────────────────

    /// Creates a live entity with no components.
    pub fn spawn(&mut self) -> Entity {
        self.records.spawn()
    }

    /// Destroys `entity` and recycles its index.
    ///
    /// No-op when the handle is stale or already dead. All outstanding
    /// handles to the entity become permanently invalid.
    pub fn despawn(&mut self, entity: Entity) {
        if !self.is_alive(entity) {
            return;
        }
        let record = *self.records.record(entity.index());
        if let Some(archetype_index) = record.archetype {
            let archetype = &mut self.archetypes[archetype_index as usize];
            archetype.remove_entity(record.row);
            if (record.row as usize) < archetype.entities().len() {
                let swapped = archetype.entities()[record.row as usize];
                self.records.record_mut(swapped.index()).row = record.row;
            }
        }
        self.records.free_slot(entity.index());
    }

    /// `true` iff `entity` is live and the handle is not stale.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.records.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> u32 {
        self.records.alive_count()
    }

    /// Number of distinct archetypes created so far (empty ones included).
    pub fn archetype_count(&self) -> u32 {
        self.archetypes.len() as u32
    }

    // ── typed component operations ────────────────────────────────────

    /// Attaches `value` to `entity`, or overwrites in place if the entity
    /// already carries a `T`. No-op on dead handles.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.add_component_raw(entity, TypeInfo::of::<T>(), bytes_of(&value));
    }

    /// Detaches component `T` from `entity`. No-op when the handle is dead
    /// or the component is absent. An entity that loses its last component
    /// stays alive, archetype-less.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.remove_component_raw(entity, type_id_of::<T>());
    }

    /// Reads component `T` of `entity`, if present.
    ///
    /// The reference is borrowed from column storage: it lives until the
    /// next structural mutation of the world.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.get_component_raw(entity, type_id_of::<T>()).map(from_bytes)
    }

    /// Mutable access to component `T` of `entity`, if present.
    ///
    /// Writing through the returned reference is invisible to `OnChange`
    /// triggers; call [`notify_changed`](Self::notify_changed) afterwards if
    /// observers should run.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let type_id = type_id_of::<T>();
        if !self.is_alive(entity) {
            return None;
        }
        let record = *self.records.record(entity.index());
        let archetype_index = record.archetype?;
        self.archetypes[archetype_index as usize]
            .get_mut(record.row, type_id)
            .map(from_bytes_mut)
    }

    /// `true` iff `entity` is live and carries component `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.has_component_raw(entity, type_id_of::<T>())
    }

    /// Overwrites component `T` on `entity`. Unlike `add_component`, this
    /// never migrates: it is a silent no-op when the component (or the
    /// entity) is absent.
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) {
        if self.set_component_raw(entity, type_id_of::<T>(), bytes_of(&value)) {
            self.fire_trigger(TriggerEvent::OnChange, type_id_of::<T>(), entity);
        }
    }

    /// Fires `OnChange` triggers for component `T` on `entity`.
    ///
    /// In-place writes through raw pointers or `get_component_mut` cannot be
    /// intercepted; callers that want observers to run invoke this hook.
    /// No-op when the entity does not carry the component.
    pub fn notify_changed<T: Component>(&mut self, entity: Entity) {
        let type_id = type_id_of::<T>();
        if self.has_component_raw(entity, type_id) {
            self.fire_trigger(TriggerEvent::OnChange, type_id, entity);
        }
    }

    // ── raw byte operations (command buffer and script bridge) ────────

    /// Byte-level `add_component`. `bytes` must be exactly one element of
    /// the described type.
    pub fn add_component_raw(&mut self, entity: Entity, info: TypeInfo, bytes: &[u8]) {
        assert_eq!(
            bytes.len(),
            info.size,
            "component payload is {} bytes, descriptor says {}",
            bytes.len(),
            info.size
        );
        if !self.is_alive(entity) {
            return;
        }
        let record = *self.records.record(entity.index());

        // Already present: overwrite in place, no migration.
        if let Some(source_index) = record.archetype {
            if self.archetypes[source_index as usize].has(info.type_id) {
                self.archetypes[source_index as usize].set(record.row, info.type_id, bytes);
                self.fire_trigger(TriggerEvent::OnChange, info.type_id, entity);
                return;
            }
        }

        // Target composition: current set plus the new type.
        let mut target_infos = match record.archetype {
            Some(source_index) => self.archetypes[source_index as usize].type_infos().to_vec(),
            None => Vec::new(),
        };
        target_infos.push(info);
        let target_index = self.find_or_create_archetype(target_infos);

        let mut swap_fixup = None;
        let new_row = match record.archetype {
            Some(source_index) => {
                let (source, target) =
                    archetype_pair_mut(&mut self.archetypes, source_index, target_index);
                let new_row = target.add_entity(entity);
                for existing in source.type_infos() {
                    if let Some(data) = source.get(record.row, existing.type_id) {
                        target.set(new_row, existing.type_id, data);
                    }
                }
                target.set(new_row, info.type_id, bytes);
                source.remove_entity(record.row);
                if (record.row as usize) < source.entities().len() {
                    swap_fixup = Some((source.entities()[record.row as usize], record.row));
                }
                source.check_counts();
                target.check_counts();
                new_row
            }
            None => {
                let target = &mut self.archetypes[target_index as usize];
                let new_row = target.add_entity(entity);
                target.set(new_row, info.type_id, bytes);
                target.check_counts();
                new_row
            }
        };
        if let Some((swapped, row)) = swap_fixup {
            self.records.record_mut(swapped.index()).row = row;
        }

        let record = self.records.record_mut(entity.index());
        record.archetype = Some(target_index);
        record.row = new_row;

        self.fire_trigger(TriggerEvent::OnAdd, info.type_id, entity);
    }

    /// Byte-level `remove_component`.
    pub fn remove_component_raw(&mut self, entity: Entity, type_id: TypeId64) {
        if !self.is_alive(entity) {
            return;
        }
        let record = *self.records.record(entity.index());
        let Some(source_index) = record.archetype else {
            return;
        };
        if !self.archetypes[source_index as usize].has(type_id) {
            return;
        }

        let remaining: Vec<TypeInfo> = self.archetypes[source_index as usize]
            .type_infos()
            .iter()
            .filter(|existing| existing.type_id != type_id)
            .copied()
            .collect();

        if remaining.is_empty() {
            // Last component gone: the entity stays alive, archetype-less.
            let source = &mut self.archetypes[source_index as usize];
            source.remove_entity(record.row);
            let swap_fixup = if (record.row as usize) < source.entities().len() {
                Some((source.entities()[record.row as usize], record.row))
            } else {
                None
            };
            if let Some((swapped, row)) = swap_fixup {
                self.records.record_mut(swapped.index()).row = row;
            }
            let own = self.records.record_mut(entity.index());
            own.archetype = None;
            own.row = 0;
            self.fire_trigger(TriggerEvent::OnRemove, type_id, entity);
            return;
        }

        let target_index = self.find_or_create_archetype(remaining);
        let mut swap_fixup = None;
        let new_row = {
            let (source, target) =
                archetype_pair_mut(&mut self.archetypes, source_index, target_index);
            let new_row = target.add_entity(entity);
            for existing in source.type_infos() {
                if existing.type_id == type_id {
                    continue;
                }
                if let Some(data) = source.get(record.row, existing.type_id) {
                    target.set(new_row, existing.type_id, data);
                }
            }
            source.remove_entity(record.row);
            if (record.row as usize) < source.entities().len() {
                swap_fixup = Some((source.entities()[record.row as usize], record.row));
            }
            source.check_counts();
            target.check_counts();
            new_row
        };
        if let Some((swapped, row)) = swap_fixup {
            self.records.record_mut(swapped.index()).row = row;
        }

        let record = self.records.record_mut(entity.index());
        record.archetype = Some(target_index);
        record.row = new_row;

        self.fire_trigger(TriggerEvent::OnRemove, type_id, entity);
    }

    /// Byte view of a component, or `None` when the entity is dead or the
    /// component absent.
    pub fn get_component_raw(&self, entity: Entity, type_id: TypeId64) -> Option<&[u8]> {
        if !self.is_alive(entity) {
            return None;
        }
        let record = self.records.record(entity.index());
        let archetype_index = record.archetype?;
        self.archetypes[archetype_index as usize].get(record.row, type_id)
    }

    /// Byte-level presence test.
    pub fn has_component_raw(&self, entity: Entity, type_id: TypeId64) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let record = self.records.record(entity.index());
        match record.archetype {
            Some(archetype_index) => self.archetypes[archetype_index as usize].has(type_id),
            None => false,
        }
    }

    /// Byte-level overwrite. Returns whether anything was written; absent
    /// component or dead entity is a quiet `false`.
    pub fn set_component_raw(&mut self, entity: Entity, type_id: TypeId64, bytes: &[u8]) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let record = *self.records.record(entity.index());
        let Some(archetype_index) = record.archetype else {
            return false;
        };
        let archetype = &mut self.archetypes[archetype_index as usize];
        if !archetype.has(type_id) {
            return false;
        }
        archetype.set(record.row, type_id, bytes);
        true
    }

    // ── queries ───────────────────────────────────────────────────────

    /// Starts building a query over this world.
    pub fn query(&mut self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    /// Indices of archetypes carrying every `required` type, none of the
    /// `excluded` types, and at least one entity.
    pub(crate) fn matching_archetypes(
        &self,
        required: &[TypeId64],
        excluded: &[TypeId64],
    ) -> Vec<u32> {
        let mut matching = Vec::new();
        for (index, archetype) in self.archetypes.iter().enumerate() {
            if archetype.count() == 0 {
                continue;
            }
            if !required.iter().all(|&type_id| archetype.has(type_id)) {
                continue;
            }
            if excluded.iter().any(|&type_id| archetype.has(type_id)) {
                continue;
            }
            matching.push(index as u32);
        }
        matching
    }

    pub(crate) fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    // ── systems and triggers ──────────────────────────────────────────

    /// The scheduler, for registering systems and reactive triggers.
    pub fn scheduler(&mut self) -> &mut SystemScheduler {
        &mut self.scheduler
    }

    /// Runs every registered system once, in dependency order.
    pub fn run_systems(&mut self) {
        // Only the system list is checked out so systems can borrow the
        // world mutably; triggers stay on the scheduler and keep firing for
        // structural mutation performed by a running system.
        let mut systems = self.scheduler.take_systems();
        run_system_list(&mut systems, self);
        self.scheduler.restore_systems(systems);
    }

    fn fire_trigger(&mut self, event: TriggerEvent, type_id: TypeId64, entity: Entity) {
        if self.scheduler.triggers_mut().is_empty() {
            return;
        }
        // Check the trigger list out for dispatch: handlers may mutate the
        // world, and nested mutation must not re-enter the same handlers.
        let mut triggers = std::mem::take(self.scheduler.triggers_mut());
        for trigger in triggers.iter_mut() {
            if trigger.event == event && trigger.component == type_id {
                (trigger.handler)(self, entity);
            }
        }
        let registered_during = std::mem::take(self.scheduler.triggers_mut());
        *self.scheduler.triggers_mut() = triggers;
        self.scheduler.triggers_mut().extend(registered_during);
    }

    // ── deferred commands ─────────────────────────────────────────────

    /// The world's own command buffer. Recording is thread-safe; apply it
    /// with [`flush_commands`](Self::flush_commands).
    pub fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    /// Applies every command recorded in the world's buffer, in order.
    pub fn flush_commands(&mut self) {
        let pending = self.commands.take_pending();
        if !pending.is_empty() {
            self.apply_commands(pending);
        }
    }

    pub(crate) fn apply_commands(&mut self, commands: Vec<Command>) {
        let _span = trace_span!("apply_commands", count = commands.len()).entered();
        let mut placeholders: HashMap<u64, Entity> = HashMap::new();
        for command in commands {
            let entity = resolve_placeholder(&placeholders, command.entity);
            match command.kind {
                CommandKind::Spawn => {
                    let real = self.spawn();
                    placeholders.insert(command.entity.0, real);
                }
                CommandKind::Despawn => self.despawn(entity),
                CommandKind::AddComponent => {
                    let info = command.info.expect("add command without descriptor");
                    self.add_component_raw(entity, info, command.data.as_bytes());
                }
                CommandKind::RemoveComponent => {
                    let info = command.info.expect("remove command without descriptor");
                    self.remove_component_raw(entity, info.type_id);
                }
                CommandKind::SetComponent => {
                    let info = command.info.expect("set command without descriptor");
                    if self.set_component_raw(entity, info.type_id, command.data.as_bytes()) {
                        self.fire_trigger(TriggerEvent::OnChange, info.type_id, entity);
                    }
                }
            }
        }
    }

    // ── maintenance ───────────────────────────────────────────────────

    /// Shrinks every archetype's columns to their live counts.
    ///
    /// Never runs implicitly; invalidates all borrowed column pointers.
    pub fn compact(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.compact();
        }
    }

    fn find_or_create_archetype(&mut self, mut infos: Vec<TypeInfo>) -> u32 {
        infos.sort_by_key(|info| info.type_id);
        let id = hash_type_ids(infos.iter().map(|info| info.type_id));
        if let Some(&index) = self.archetype_index.get(&id) {
            return index;
        }
        let index = self.archetypes.len() as u32;
        self.archetypes.push(Archetype::new(infos));
        self.archetype_index.insert(id, index);
        index
    }
}

/// Disjoint mutable borrows of two distinct archetypes, for row migration.
fn archetype_pair_mut(
    archetypes: &mut [Archetype],
    a: u32,
    b: u32,
) -> (&mut Archetype, &mut Archetype) {
    assert!(a != b, "source and target archetype must differ");
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    let (head, tail) = archetypes.split_at_mut(high as usize);
    let low_ref = &mut head[low as usize];
    let high_ref = &mut tail[0];
    if a < b {
        (low_ref, high_ref)
    } else {
        (high_ref, low_ref)
    }
}
