//! Component contract and type descriptors.
//!
//! ## Purpose
//!
//! Components are plain-data payloads copied byte-wise between archetype
//! columns, so the storage layer never runs constructors or destructors on
//! them. This module pins that contract down with the [`Component`] bound and
//! produces the [`TypeInfo`] descriptors the byte-oriented storage consumes.
//!
//! ## Design
//!
//! There is no registration step and no global registry: a component type is
//! described on first use by [`TypeInfo::of`], and its 64-bit `type_id` is a
//! stable (per process) hash of the Rust `TypeId`. Worlds discover types
//! lazily as entities pick them up.
//!
//! ## Invariants
//!
//! - A component type is `1..=4096` bytes; violating either bound is a
//!   programmer error and panics at descriptor construction.
//! - `type_id` values are identical for identical Rust types within one
//!   process and have no meaning across processes.

use std::any::{type_name, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::mem::{align_of, size_of};

use bytemuck::Pod;

use crate::ecs::types::{TypeId64, MAX_COMPONENT_SIZE};

/// Marker bound for ECS component types.
///
/// Components must be memcpy-safe plain data: `Pod` (which implies `Copy` and
/// `Zeroable`), thread-portable, and `'static`. Any type satisfying the bound
/// is a component; there is nothing to implement by hand.
///
/// ```ignore
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position { x: f32, y: f32, z: f32 }
/// ```
pub trait Component: Pod + Send + Sync + 'static {}

impl<T: Pod + Send + Sync + 'static> Component for T {}

/// Returns the process-unique 64-bit type id for `T`.
#[inline]
pub fn type_id_of<T: 'static>() -> TypeId64 {
    let mut hasher = DefaultHasher::new();
    TypeId::of::<T>().hash(&mut hasher);
    hasher.finish()
}

/// Describes one component type: identity, layout, and a diagnostic name.
///
/// Descriptors are tiny `Copy` values; archetypes store one per column and
/// sort by `type_id` to define their identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeInfo {
    /// Process-unique identifier for the component type.
    pub type_id: TypeId64,
    /// Size of one element in bytes.
    pub size: usize,
    /// Alignment of one element in bytes.
    pub align: usize,
    /// Rust type name, for diagnostics only.
    pub name: &'static str,
}

impl TypeInfo {
    /// Builds the descriptor for component type `T`.
    ///
    /// ## Panics
    /// Panics if `T` is zero-sized or exceeds [`MAX_COMPONENT_SIZE`] bytes;
    /// both are contract violations, not recoverable conditions.
    #[inline]
    pub fn of<T: Component>() -> Self {
        let size = size_of::<T>();
        assert!(size > 0, "zero-sized type {} cannot be a component", type_name::<T>());
        assert!(
            size <= MAX_COMPONENT_SIZE,
            "component {} is {} bytes, over the {} byte cap",
            type_name::<T>(),
            size,
            MAX_COMPONENT_SIZE
        );
        Self {
            type_id: type_id_of::<T>(),
            size,
            align: align_of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Builds a descriptor from explicit layout metadata.
    ///
    /// Used by collaborators that only know a type's layout at run time
    /// (the script bridge records components this way).
    #[inline]
    pub fn from_raw(type_id: TypeId64, size: usize, align: usize, name: &'static str) -> Self {
        assert!(size > 0 && size <= MAX_COMPONENT_SIZE, "component size {size} out of range");
        assert!(align.is_power_of_two(), "component alignment {align} is not a power of two");
        Self { type_id, size, align, name }
    }
}
