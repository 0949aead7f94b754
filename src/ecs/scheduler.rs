//! Serial system scheduler.
//!
//! Owns the registered systems and reactive triggers, computes a topological
//! order over `run_after` edges with Kahn's algorithm, and executes systems
//! sequentially. Read/write sets are carried but not consulted; they are the
//! contract surface for a future parallel executor.
//!
//! Execution uses a check-out model: the world takes the system list out of
//! the scheduler for the duration of a run (so each system can borrow the
//! world mutably) while the scheduler itself — and with it the reactive
//! trigger list — stays attached to the world. Structural mutation performed
//! by a running system therefore fires triggers exactly as it would outside
//! a run.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, debug_span, warn};

use crate::ecs::systems::{ReactiveTrigger, SystemDesc};
use crate::ecs::world::World;

/// Registry for systems and reactive triggers, executed serially.
#[derive(Default)]
pub struct SystemScheduler {
    systems: Vec<SystemDesc>,
    triggers: Vec<ReactiveTrigger>,
}

impl SystemScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a system.
    pub fn add_system(&mut self, desc: SystemDesc) {
        debug!(system = %desc.name, "system registered");
        self.systems.push(desc);
    }

    /// Registers a reactive trigger.
    pub fn add_trigger(&mut self, trigger: ReactiveTrigger) {
        debug!(trigger = %trigger.name, component = trigger.component, "trigger registered");
        self.triggers.push(trigger);
    }

    /// Names of all registered systems, in registration order.
    pub fn system_names(&self) -> Vec<String> {
        self.systems.iter().map(|system| system.name.clone()).collect()
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// `true` if no systems are registered.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub(crate) fn triggers_mut(&mut self) -> &mut Vec<ReactiveTrigger> {
        &mut self.triggers
    }

    /// Checks the system list out for a run. Triggers stay behind.
    pub(crate) fn take_systems(&mut self) -> Vec<SystemDesc> {
        std::mem::take(&mut self.systems)
    }

    /// Returns a checked-out system list, keeping any systems registered
    /// while it was out (they follow the checked-out ones in order).
    pub(crate) fn restore_systems(&mut self, mut systems: Vec<SystemDesc>) {
        let registered_mid_run = std::mem::take(&mut self.systems);
        systems.extend(registered_mid_run);
        self.systems = systems;
    }
}

/// Runs a checked-out system list once, in `run_after` dependency order.
///
/// `run_after` names that match no system in the list are ignored. Systems
/// caught in a dependency cycle never reach in-degree zero; they are skipped
/// for the run and reported once.
pub(crate) fn run_system_list(systems: &mut [SystemDesc], world: &mut World) {
    let _span = debug_span!("run_systems", systems = systems.len()).entered();

    let mut name_to_index = HashMap::with_capacity(systems.len());
    for (index, system) in systems.iter().enumerate() {
        name_to_index.insert(system.name.as_str(), index);
    }

    let mut in_degree = vec![0u32; systems.len()];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); systems.len()];
    for (index, system) in systems.iter().enumerate() {
        for dependency in &system.run_after {
            if let Some(&before) = name_to_index.get(dependency.as_str()) {
                edges[before].push(index);
                in_degree[index] += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..systems.len())
        .filter(|&index| in_degree[index] == 0)
        .collect();
    let mut order = Vec::with_capacity(systems.len());
    while let Some(current) = ready.pop_front() {
        order.push(current);
        for &next in &edges[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() < systems.len() {
        let stranded: Vec<&str> = systems
            .iter()
            .enumerate()
            .filter(|(index, _)| in_degree[*index] > 0)
            .map(|(_, system)| system.name.as_str())
            .collect();
        warn!(?stranded, "systems skipped: run_after cycle");
    }

    for index in order {
        let system = &mut systems[index];
        let _span = debug_span!("system", name = %system.name).entered();
        (system.execute)(world);
    }
}
