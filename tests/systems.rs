use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use engine_core::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    vx: f32,
    vy: f32,
    vz: f32,
}

fn recording_system(name: &str, log: &Arc<Mutex<Vec<String>>>) -> SystemDesc {
    let log = Arc::clone(log);
    let owned = name.to_string();
    SystemDesc::new(name, move |_world: &mut World| {
        log.lock().unwrap().push(owned.clone());
    })
}

#[test]
fn systems_run_in_dependency_order() {
    let mut world = World::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    // Registered in reverse of the intended order.
    world
        .scheduler()
        .add_system(recording_system("integrate", &log).after("input"));
    world
        .scheduler()
        .add_system(recording_system("render", &log).after("integrate"));
    world.scheduler().add_system(recording_system("input", &log));

    world.run_systems();

    let order = log.lock().unwrap().clone();
    let position = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert_eq!(order.len(), 3);
    assert!(position("input") < position("integrate"));
    assert!(position("integrate") < position("render"));
}

#[test]
fn unknown_run_after_names_are_ignored() {
    let mut world = World::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    world
        .scheduler()
        .add_system(recording_system("only", &log).after("no_such_system"));
    world.run_systems();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn cycle_members_are_skipped_but_others_run() {
    let mut world = World::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    world.scheduler().add_system(recording_system("a", &log).after("b"));
    world.scheduler().add_system(recording_system("b", &log).after("a"));
    world.scheduler().add_system(recording_system("free", &log));
    world.run_systems();

    let order = log.lock().unwrap().clone();
    assert_eq!(order, vec!["free".to_string()]);
}

#[test]
fn systems_mutate_the_world() {
    let mut world = World::new();
    for i in 0..8 {
        let e = world.spawn();
        world.add_component(e, Position { x: i as f32, y: 0.0, z: 0.0 });
        world.add_component(e, Velocity { vx: 2.0, vy: 0.0, vz: 0.0 });
    }

    world.scheduler().add_system(
        SystemDesc::new("integrate", |world: &mut World| {
            world.query().for_each2::<Position, Velocity>(|_, p, v| p.x += v.vx);
        })
        .reads::<Velocity>()
        .writes::<Position>(),
    );

    world.run_systems();
    world.run_systems();

    let mut total = 0.0;
    world.query().for_each::<Position>(|_, p| total += p.x);
    // Each of 8 entities advanced by 2.0 twice.
    assert_eq!(total, (0..8).map(|i| i as f32 + 4.0).sum::<f32>());
}

#[test]
fn systems_defer_structural_changes_through_commands() {
    let mut world = World::new();
    for _ in 0..4 {
        let e = world.spawn();
        world.add_component(e, Position::default());
    }

    world.scheduler().add_system(SystemDesc::new("cull", |world: &mut World| {
        let mut doomed = Vec::new();
        world.query().for_each::<Position>(|entity, _| doomed.push(entity));
        for entity in doomed {
            world.commands().despawn(entity);
        }
    }));

    world.run_systems();
    assert_eq!(world.entity_count(), 4);
    world.flush_commands();
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn on_add_fires_once_per_new_attachment() {
    let mut world = World::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    world.scheduler().add_trigger(ReactiveTrigger::new::<Position>(
        "count_adds",
        TriggerEvent::OnAdd,
        move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        },
    ));

    let e = world.spawn();
    world.add_component(e, Position::default());
    // Overwrite: OnChange territory, not OnAdd.
    world.add_component(e, Position { x: 1.0, y: 0.0, z: 0.0 });
    // A different component type must not fire this trigger.
    world.add_component(e, Velocity::default());

    assert_eq!(fired.load(Ordering::Relaxed), 1);
}

#[test]
fn triggers_fire_for_mutation_inside_systems() {
    let mut world = World::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    world.scheduler().add_trigger(ReactiveTrigger::new::<Position>(
        "count_adds",
        TriggerEvent::OnAdd,
        move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        },
    ));

    // The serial baseline allows direct structural mutation from a system;
    // triggers must observe it exactly as they would outside a run.
    world.scheduler().add_system(
        SystemDesc::new("spawner", |world: &mut World| {
            let e = world.spawn();
            world.add_component(e, Position::default());
        })
        .writes::<Position>(),
    );

    world.run_systems();
    assert_eq!(fired.load(Ordering::Relaxed), 1);

    world.run_systems();
    assert_eq!(fired.load(Ordering::Relaxed), 2);
    assert_eq!(world.entity_count(), 2);
}

#[test]
fn on_remove_fires_for_explicit_removal_only() {
    let mut world = World::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    world.scheduler().add_trigger(ReactiveTrigger::new::<Position>(
        "count_removes",
        TriggerEvent::OnRemove,
        move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        },
    ));

    let e = world.spawn();
    world.add_component(e, Position::default());
    world.remove_component::<Position>(e);
    // Absent now: removing again is a quiet no-op.
    world.remove_component::<Position>(e);

    let f = world.spawn();
    world.add_component(f, Position::default());
    world.despawn(f);

    assert_eq!(fired.load(Ordering::Relaxed), 1);
}

#[test]
fn on_change_fires_for_api_writes_and_notify() {
    let mut world = World::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    world.scheduler().add_trigger(ReactiveTrigger::new::<Position>(
        "count_changes",
        TriggerEvent::OnChange,
        move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        },
    ));

    let e = world.spawn();
    world.add_component(e, Position::default());
    assert_eq!(fired.load(Ordering::Relaxed), 0);

    world.set_component(e, Position { x: 1.0, y: 0.0, z: 0.0 });
    assert_eq!(fired.load(Ordering::Relaxed), 1);

    world.add_component(e, Position { x: 2.0, y: 0.0, z: 0.0 });
    assert_eq!(fired.load(Ordering::Relaxed), 2);

    // Raw in-place writes are invisible until the writer notifies.
    world.get_component_mut::<Position>(e).unwrap().x = 3.0;
    assert_eq!(fired.load(Ordering::Relaxed), 2);
    world.notify_changed::<Position>(e);
    assert_eq!(fired.load(Ordering::Relaxed), 3);
}

#[test]
fn trigger_handlers_may_mutate_the_world() {
    let mut world = World::new();
    world.scheduler().add_trigger(ReactiveTrigger::new::<Position>(
        "attach_velocity",
        TriggerEvent::OnAdd,
        |world, entity| {
            world.add_component(entity, Velocity { vx: 1.0, vy: 1.0, vz: 1.0 });
        },
    ));

    let e = world.spawn();
    world.add_component(e, Position::default());

    assert!(world.has_component::<Velocity>(e));
    assert_eq!(world.get_component::<Velocity>(e).unwrap().vx, 1.0);
}

#[test]
fn triggers_fire_from_command_replay() {
    let mut world = World::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    world.scheduler().add_trigger(ReactiveTrigger::new::<Position>(
        "count_adds",
        TriggerEvent::OnAdd,
        move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        },
    ));

    let s = world.commands().spawn();
    world.commands().add_component(s, Position::default());
    world.flush_commands();

    assert_eq!(fired.load(Ordering::Relaxed), 1);
}

#[test]
fn system_names_are_listed_in_registration_order() {
    let mut world = World::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    world.scheduler().add_system(recording_system("one", &log));
    world.scheduler().add_system(recording_system("two", &log));
    assert_eq!(world.scheduler().system_names(), vec!["one".to_string(), "two".to_string()]);
}
