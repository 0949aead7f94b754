//! System and reactive-trigger declarations.
//!
//! ## Purpose
//!
//! A **system** is a named unit of logic run against the world each frame.
//! Systems declare which components they read and write and which systems
//! they must run after; the scheduler turns those declarations into an
//! execution order. A **reactive trigger** is a callback invoked by the
//! world when a component is added, removed, or changed on an entity.
//!
//! ## Scheduling model
//!
//! The read/write sets are advisory metadata: the baseline scheduler runs
//! systems serially in dependency order, and the sets exist so a future
//! parallel scheduler can detect conflicts without changing system code.
//! Only `run_after` edges affect the baseline order.
//!
//! ## Change detection
//!
//! `OnAdd` and `OnRemove` fire from structural mutation directly. `OnChange`
//! fires from API-level writes (`set_component`, overwriting through
//! `add_component`) and from the explicit [`World::notify_changed`] hook;
//! writes through raw column pointers cannot be intercepted, so callers that
//! mutate in place and want triggers must notify.
//!
//! [`World::notify_changed`]: crate::ecs::world::World::notify_changed

use crate::ecs::component::{type_id_of, Component};
use crate::ecs::entity::Entity;
use crate::ecs::types::TypeId64;
use crate::ecs::world::World;

/// Condition under which a [`ReactiveTrigger`] fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// A component was newly attached to an entity.
    OnAdd,
    /// A component value was overwritten through the API or the caller
    /// invoked the change-notification hook.
    OnChange,
    /// A component was removed from an entity.
    OnRemove,
}

/// Declaration of one system: identity, access metadata, ordering edges,
/// and the callable itself.
pub struct SystemDesc {
    /// Unique name, referenced by other systems' `run_after` lists.
    pub name: String,
    /// Component types this system reads. Advisory.
    pub reads: Vec<TypeId64>,
    /// Component types this system writes. Advisory.
    pub writes: Vec<TypeId64>,
    /// Names of systems that must complete before this one runs each frame.
    /// Names that match no registered system are ignored.
    pub run_after: Vec<String>,
    /// The system body.
    pub execute: Box<dyn FnMut(&mut World) + Send>,
}

impl SystemDesc {
    /// Creates a system with empty access sets and no ordering edges.
    pub fn new(name: impl Into<String>, execute: impl FnMut(&mut World) + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reads: Vec::new(),
            writes: Vec::new(),
            run_after: Vec::new(),
            execute: Box::new(execute),
        }
    }

    /// Declares a read dependency on component `T`.
    pub fn reads<T: Component>(mut self) -> Self {
        self.reads.push(type_id_of::<T>());
        self
    }

    /// Declares a write dependency on component `T`.
    pub fn writes<T: Component>(mut self) -> Self {
        self.writes.push(type_id_of::<T>());
        self
    }

    /// Orders this system after the named one.
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.run_after.push(name.into());
        self
    }
}

/// A callback fired by the world when `event` occurs for `component`.
///
/// Handlers receive the world mutably and may perform structural mutation;
/// triggers fired by such nested mutation are suppressed while a handler
/// runs (the trigger list is checked out for the duration of dispatch).
pub struct ReactiveTrigger {
    /// Diagnostic name.
    pub name: String,
    /// Component type this trigger watches.
    pub component: TypeId64,
    /// Condition under which the handler is invoked.
    pub event: TriggerEvent,
    /// The handler body.
    pub handler: Box<dyn FnMut(&mut World, Entity) + Send>,
}

impl ReactiveTrigger {
    /// Creates a trigger watching component `T`.
    pub fn new<T: Component>(
        name: impl Into<String>,
        event: TriggerEvent,
        handler: impl FnMut(&mut World, Entity) + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            component: type_id_of::<T>(),
            event,
            handler: Box::new(handler),
        }
    }
}
