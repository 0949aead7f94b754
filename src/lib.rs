//! # engine_core
//!
//! The load-bearing runtime of the engine: an archetype-based
//! Entity-Component-System world and a work-stealing job scheduler with a
//! task-graph front-end. Everything else in the engine — scene graph,
//! renderer, physics, audio, resources, input — is a consumer of these two
//! subsystems.
//!
//! ## Design goals
//! - Structure-of-Arrays component storage for cache efficiency
//! - Stable, generation-checked entity handles across relocations
//! - Deferred structural mutation so parallel systems stay safe
//! - Dependency-driven job execution on a fixed worker pool
//!
//! No global state: one [`World`] per simulation and one [`JobSystem`] per
//! application, created at startup and dropped at shutdown.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod ecs;
pub mod jobs;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use ecs::commands::CommandBuffer;
pub use ecs::component::{type_id_of, Component, TypeInfo};
pub use ecs::entity::Entity;
pub use ecs::query::{QueryBuilder, QueryMatch};
pub use ecs::scheduler::SystemScheduler;
pub use ecs::systems::{ReactiveTrigger, SystemDesc, TriggerEvent};
pub use ecs::world::World;

pub use jobs::graph::{JobId, TaskGraph};
pub use jobs::pool::{Job, JobSystem};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used engine-core types.
///
/// Import with:
/// ```rust
/// use engine_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CommandBuffer, Component, Entity, JobId, JobSystem, ReactiveTrigger, SystemDesc,
        TaskGraph, TriggerEvent, World,
    };
}
