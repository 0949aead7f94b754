//! Deferred structural mutation.
//!
//! ## Purpose
//!
//! Systems running in a parallel phase must not restructure the world
//! directly. A [`CommandBuffer`] records spawn/despawn/component operations
//! under a mutex and replays them against the world at a synchronization
//! point, in record order.
//!
//! ## Placeholder entities
//!
//! `spawn` cannot hand out a real entity without touching the world, so it
//! returns a **placeholder**: a handle whose index has the high bit set and
//! whose generation is zero. Later commands in the same buffer may target
//! the placeholder; `apply` resolves it to the real entity spawned at replay
//! time. Placeholders from one buffer mean nothing to another.
//!
//! ## Payload storage
//!
//! Component bytes up to 256 bytes are copied inline into the command.
//! Larger payloads spill to a heap allocation owned by the buffer and still
//! apply in record order. Payloads above the component size cap remain
//! contract violations.
//!
//! ## Ordering
//!
//! Commands take effect in record order per buffer. Multiple buffers applied
//! to one world are ordered only by their `apply` calls.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use bytemuck::bytes_of;
use tracing::trace;

use crate::ecs::component::{Component, TypeInfo};
use crate::ecs::entity::Entity;
use crate::ecs::types::PLACEHOLDER_BIT;
use crate::ecs::world::World;

/// Payloads at or below this size are stored inline in the command record.
pub const COMMAND_INLINE_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Spawn,
    Despawn,
    AddComponent,
    RemoveComponent,
    SetComponent,
}

pub(crate) enum CommandData {
    Empty,
    Inline { len: u16, bytes: [u8; COMMAND_INLINE_SIZE] },
    Spilled(Box<[u8]>),
}

impl CommandData {
    fn copy_from(payload: &[u8]) -> Self {
        if payload.len() <= COMMAND_INLINE_SIZE {
            let mut bytes = [0u8; COMMAND_INLINE_SIZE];
            bytes[..payload.len()].copy_from_slice(payload);
            CommandData::Inline { len: payload.len() as u16, bytes }
        } else {
            CommandData::Spilled(payload.into())
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            CommandData::Empty => &[],
            CommandData::Inline { len, bytes } => &bytes[..*len as usize],
            CommandData::Spilled(bytes) => bytes,
        }
    }
}

/// One recorded operation.
pub(crate) struct Command {
    pub kind: CommandKind,
    pub entity: Entity,
    pub info: Option<TypeInfo>,
    pub data: CommandData,
}

/// Thread-safe log of deferred structural operations.
pub struct CommandBuffer {
    commands: Mutex<Vec<Command>>,
    next_placeholder: AtomicU32,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            next_placeholder: AtomicU32::new(PLACEHOLDER_BIT),
        }
    }

    // Command payloads are plain bytes; a panic while holding the lock
    // cannot leave them in a torn state, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<Command>> {
        match self.commands.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push(&self, command: Command) {
        self.lock().push(command);
    }

    /// Reserves a placeholder entity, resolved to a real one at apply time.
    ///
    /// The placeholder may be used by subsequent commands in this buffer.
    pub fn spawn(&self) -> Entity {
        let index = self.next_placeholder.fetch_add(1, Ordering::Relaxed);
        let placeholder = Entity::new(index, 0);
        self.push(Command {
            kind: CommandKind::Spawn,
            entity: placeholder,
            info: None,
            data: CommandData::Empty,
        });
        placeholder
    }

    /// Records a despawn of `entity` (real or placeholder).
    pub fn despawn(&self, entity: Entity) {
        self.push(Command {
            kind: CommandKind::Despawn,
            entity,
            info: None,
            data: CommandData::Empty,
        });
    }

    /// Records attaching (or overwriting) component `value` on `entity`.
    pub fn add_component<T: Component>(&self, entity: Entity, value: T) {
        self.push(Command {
            kind: CommandKind::AddComponent,
            entity,
            info: Some(TypeInfo::of::<T>()),
            data: CommandData::copy_from(bytes_of(&value)),
        });
    }

    /// Records removing component `T` from `entity`.
    pub fn remove_component<T: Component>(&self, entity: Entity) {
        self.push(Command {
            kind: CommandKind::RemoveComponent,
            entity,
            info: Some(TypeInfo::of::<T>()),
            data: CommandData::Empty,
        });
    }

    /// Records overwriting component `T` on `entity`. At apply time this is
    /// a no-op if the entity does not carry the component.
    pub fn set_component<T: Component>(&self, entity: Entity, value: T) {
        self.push(Command {
            kind: CommandKind::SetComponent,
            entity,
            info: Some(TypeInfo::of::<T>()),
            data: CommandData::copy_from(bytes_of(&value)),
        });
    }

    /// Number of commands waiting to be applied.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Drops all pending commands without applying them.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Replays every pending command against `world`, in record order.
    ///
    /// The queue is drained under the buffer's lock first, so recorders on
    /// other threads observe either the full queue or an empty one; the
    /// world itself must be quiescent for the duration of the call.
    pub fn apply(&self, world: &mut World) {
        let pending = self.take_pending();
        if !pending.is_empty() {
            trace!(count = pending.len(), "applying command buffer");
            world.apply_commands(pending);
        }
    }

    pub(crate) fn take_pending(&self) -> Vec<Command> {
        std::mem::take(&mut *self.lock())
    }
}

/// Maps a recorded handle through the placeholder table populated by
/// `Spawn` commands during replay.
pub(crate) fn resolve_placeholder(
    map: &std::collections::HashMap<u64, Entity>,
    entity: Entity,
) -> Entity {
    match map.get(&entity.0) {
        Some(&real) => real,
        None => entity,
    }
}
