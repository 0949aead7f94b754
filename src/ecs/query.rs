//! Query construction and iteration over matching archetypes.
//!
//! ## Design
//!
//! A query names the component types an entity must carry (`with`) and must
//! not carry (`without`), then either iterates matching archetypes with a
//! typed callback (`for_each*`) or materializes raw per-archetype views
//! (`matches`) for collaborators that walk columns themselves.
//!
//! Archetype matching is a linear scan over the registry; archetypes with
//! zero entities never match. Iteration order across archetypes is
//! unspecified; within an archetype it follows row order.
//!
//! The builder holds the world mutably for its whole lifetime, so a typed
//! callback can safely receive `&mut` component references: nothing else can
//! touch the world while the query runs, and the callback itself only sees
//! component data, never the world.

use crate::ecs::component::{Component, TypeInfo};
use crate::ecs::entity::Entity;
use crate::ecs::types::{ArchetypeId, TypeId64};
use crate::ecs::world::World;

/// One matching archetype, as a raw view.
///
/// `columns` holds the base pointer of each required column in the order the
/// types were requested. Pointers (and `entities`) are borrowed from the
/// archetype: they are invalidated by the next structural mutation of the
/// world and must not outlive it.
pub struct QueryMatch {
    /// Identity of the matched archetype.
    pub archetype: ArchetypeId,
    /// Number of rows in the view.
    pub count: u32,
    /// Base of the row → entity array.
    pub entities: *const Entity,
    /// Base pointer of each required column, in requested order.
    pub columns: Vec<*mut u8>,
}

/// Builder for archetype queries. Obtained from [`World::query`].
pub struct QueryBuilder<'w> {
    world: &'w mut World,
    required: Vec<TypeId64>,
    excluded: Vec<TypeId64>,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        Self { world, required: Vec::new(), excluded: Vec::new() }
    }

    /// Requires component `T` to be present.
    pub fn with<T: Component>(mut self) -> Self {
        self.required.push(TypeInfo::of::<T>().type_id);
        self
    }

    /// Requires component `T` to be absent.
    pub fn without<T: Component>(mut self) -> Self {
        self.excluded.push(TypeInfo::of::<T>().type_id);
        self
    }

    /// Resolves the query into raw per-archetype views.
    ///
    /// Columns appear in the order the `with` clauses were declared. The
    /// returned pointers follow the borrow rule documented on
    /// [`QueryMatch`].
    pub fn matches(self) -> Vec<QueryMatch> {
        let matching = self.world.matching_archetypes(&self.required, &self.excluded);
        let mut views = Vec::with_capacity(matching.len());
        for archetype_index in matching {
            let archetype = &mut self.world.archetypes_mut()[archetype_index as usize];
            let mut columns = Vec::with_capacity(self.required.len());
            for &type_id in &self.required {
                let column = archetype
                    .column_mut(type_id)
                    .expect("matched archetype missing required column");
                columns.push(column.raw_mut());
            }
            views.push(QueryMatch {
                archetype: archetype.id(),
                count: archetype.count(),
                entities: archetype.entities().as_ptr(),
                columns,
            });
        }
        views
    }

    /// Invokes `callback` for every matching entity with its `A` component.
    ///
    /// The callback component type is implicitly required; `with`/`without`
    /// clauses further narrow the match set.
    pub fn for_each<A: Component>(mut self, mut callback: impl FnMut(Entity, &mut A)) {
        let a = TypeInfo::of::<A>();
        self.require(a.type_id);
        for archetype_index in self.world.matching_archetypes(&self.required, &self.excluded) {
            let archetype = &mut self.world.archetypes_mut()[archetype_index as usize];
            let count = archetype.count();
            let a_base = column_base(archetype, a);
            let entities = archetype.entities().as_ptr();
            for row in 0..count as usize {
                unsafe {
                    callback(*entities.add(row), &mut *(a_base.add(row * a.size) as *mut A));
                }
            }
        }
    }

    /// Two-component variant of [`for_each`](Self::for_each).
    ///
    /// ## Panics
    /// Panics if `A` and `B` are the same type.
    pub fn for_each2<A: Component, B: Component>(
        mut self,
        mut callback: impl FnMut(Entity, &mut A, &mut B),
    ) {
        let a = TypeInfo::of::<A>();
        let b = TypeInfo::of::<B>();
        assert_ne!(a.type_id, b.type_id, "duplicate component type in query callback");
        self.require(a.type_id);
        self.require(b.type_id);
        for archetype_index in self.world.matching_archetypes(&self.required, &self.excluded) {
            let archetype = &mut self.world.archetypes_mut()[archetype_index as usize];
            let count = archetype.count();
            let a_base = column_base(archetype, a);
            let b_base = column_base(archetype, b);
            let entities = archetype.entities().as_ptr();
            for row in 0..count as usize {
                unsafe {
                    callback(
                        *entities.add(row),
                        &mut *(a_base.add(row * a.size) as *mut A),
                        &mut *(b_base.add(row * b.size) as *mut B),
                    );
                }
            }
        }
    }

    /// Three-component variant of [`for_each`](Self::for_each).
    ///
    /// ## Panics
    /// Panics if any two callback component types coincide.
    pub fn for_each3<A: Component, B: Component, C: Component>(
        mut self,
        mut callback: impl FnMut(Entity, &mut A, &mut B, &mut C),
    ) {
        let a = TypeInfo::of::<A>();
        let b = TypeInfo::of::<B>();
        let c = TypeInfo::of::<C>();
        assert!(
            a.type_id != b.type_id && a.type_id != c.type_id && b.type_id != c.type_id,
            "duplicate component type in query callback"
        );
        self.require(a.type_id);
        self.require(b.type_id);
        self.require(c.type_id);
        for archetype_index in self.world.matching_archetypes(&self.required, &self.excluded) {
            let archetype = &mut self.world.archetypes_mut()[archetype_index as usize];
            let count = archetype.count();
            let a_base = column_base(archetype, a);
            let b_base = column_base(archetype, b);
            let c_base = column_base(archetype, c);
            let entities = archetype.entities().as_ptr();
            for row in 0..count as usize {
                unsafe {
                    callback(
                        *entities.add(row),
                        &mut *(a_base.add(row * a.size) as *mut A),
                        &mut *(b_base.add(row * b.size) as *mut B),
                        &mut *(c_base.add(row * c.size) as *mut C),
                    );
                }
            }
        }
    }

    fn require(&mut self, type_id: TypeId64) {
        if !self.required.contains(&type_id) {
            self.required.push(type_id);
        }
    }
}

fn column_base(archetype: &mut crate::ecs::archetype::Archetype, info: TypeInfo) -> *mut u8 {
    archetype
        .column_mut(info.type_id)
        .expect("matched archetype missing required column")
        .raw_mut()
}
