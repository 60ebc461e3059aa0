//! End-to-end scenarios over the assembled simulation core.

use emberwake::{
    Aabb, BodyKind, EntityKind, PathPriority, SeparationParams, SimEvent, Simulation,
    SimulationConfig, TriggerPhase, TriggerTag, Vec2,
};
use emberwake_pathfind::PathCache;
use emberwake_shared::{ResourceCategory, ResourceHandle, ResourceTemplate, TemplateRegistry};
use std::sync::{Arc, Mutex};

fn simulation() -> Simulation {
    Simulation::new(SimulationConfig {
        use_worker_pool: false,
        ..SimulationConfig::default()
    })
}

fn ore_templates(max_stack: u32) -> (TemplateRegistry, ResourceHandle) {
    let mut registry = TemplateRegistry::new(16);
    let mut template = ResourceTemplate::new("iron_ore", "Iron Ore", ResourceCategory::Material);
    template.set_max_stack_size(max_stack);
    let handle = registry.register(template).unwrap();
    (registry, handle)
}

#[test]
fn test_trigger_enter_exit_exactly_once() {
    let mut sim = simulation();

    sim.spawn_trigger_area(Vec2::new(100.0, 100.0), Vec2::new(50.0, 50.0), TriggerTag::Water)
        .unwrap();

    // A point-sized kinematic body marching through the volume.
    let walker = sim
        .store
        .create_npc(Vec2::new(0.0, 100.0), Vec2::ZERO, 10.0, 0, 2, "w")
        .unwrap();
    sim.collision.add_body(
        walker,
        Aabb::from_center(Vec2::new(0.0, 100.0), Vec2::ZERO),
        BodyKind::Kinematic,
    );
    let index = sim.store.get_index(walker).unwrap();
    sim.store.set_velocity(index, Vec2::new(50.0, 0.0));

    for _ in 0..5 {
        sim.tick(1.0);
        sim.store.set_velocity(index, Vec2::new(50.0, 0.0));
    }

    let events = sim.take_events();
    let trigger_events: Vec<(TriggerPhase, u8)> = events
        .iter()
        .filter_map(|e| match e {
            SimEvent::WorldTrigger { phase, tag, entity, .. } => {
                assert_eq!(*entity, walker.id);
                Some((*phase, *tag))
            }
            _ => None,
        })
        .collect();

    // Exactly one Enter and one Exit, tagged Water, no duplicates while
    // the overlap continued.
    assert_eq!(
        trigger_events,
        vec![
            (TriggerPhase::Enter, TriggerTag::Water as u8),
            (TriggerPhase::Exit, TriggerTag::Water as u8),
        ]
    );
}

#[test]
fn test_path_cache_hit_adjusts_endpoints() {
    let mut cache = PathCache::default();
    cache.cache_path(
        Vec2::new(0.0, 0.0),
        Vec2::new(100.0, 100.0),
        &[Vec2::new(0.0, 0.0), Vec2::new(50.0, 50.0), Vec2::new(100.0, 100.0)],
        0.0,
    );

    let hit = cache
        .find_similar(Vec2::new(10.0, 10.0), Vec2::new(105.0, 95.0), 1.0)
        .expect("endpoints within tolerance must hit");

    assert_eq!(
        hit,
        vec![Vec2::new(10.0, 10.0), Vec2::new(50.0, 50.0), Vec2::new(105.0, 95.0)]
    );
    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.queries, 1);
}

#[test]
fn test_inventory_overflow_keeps_totals() {
    let mut sim = simulation();
    let (templates, ore) = ore_templates(10);

    let npc = sim
        .spawn_npc(Vec2::ZERO, Vec2::new(8.0, 8.0), 10.0, 0, 2, "w")
        .unwrap();
    let inventory = sim.store.character(npc).unwrap().inventory_index;

    assert!(sim.store.add_to_inventory(inventory, ore, 10, &templates));
    assert!(sim.store.add_to_inventory(inventory, ore, 10, &templates));
    assert!(!sim.store.add_to_inventory(inventory, ore, 1, &templates));

    assert_eq!(sim.store.inventories().get(inventory).unwrap().quantity(ore), 20);
}

#[test]
fn test_destruction_cleans_every_index() {
    let mut sim = simulation();
    let (templates, ore) = ore_templates(50);
    sim.registry.create_world("W");
    sim.registry.set_active_world("W");

    let npc = sim
        .spawn_npc(Vec2::new(10.0, 10.0), Vec2::new(8.0, 8.0), 10.0, 0, 4, "W")
        .unwrap();
    let inventory = sim.store.character(npc).unwrap().inventory_index;
    assert!(sim.store.add_to_inventory(inventory, ore, 5, &templates));

    let node = sim
        .spawn_harvestable(Vec2::new(40.0, 10.0), Vec2::new(8.0, 8.0), ore, 1, 3, 30.0, "W")
        .unwrap();
    assert_eq!(sim.registry.harvestable_count("W"), 1);
    assert_eq!(sim.collision.body_count(), 1);
    assert_eq!(sim.store.inventories().live_count(), 1);

    sim.destroy(npc);
    sim.destroy(node);
    sim.tick(1.0 / 60.0);

    assert!(sim.store.get_index(npc).is_none());
    assert!(sim.store.get_index(node).is_none());
    assert_eq!(sim.registry.harvestable_count("W"), 0);
    assert_eq!(sim.registry.active_harvestable_count(), 0);
    assert_eq!(sim.collision.body_count(), 0);
    assert_eq!(sim.store.inventories().live_count(), 0);

    // The freed slot is reusable with a bumped generation.
    let reborn = sim
        .spawn_npc(Vec2::new(10.0, 10.0), Vec2::new(8.0, 8.0), 10.0, 0, 4, "W")
        .unwrap();
    assert_ne!(reborn, npc);
    assert_eq!(reborn.kind, EntityKind::Npc);
}

#[test]
fn test_obstacle_change_evicts_cached_path() {
    let mut sim = simulation();

    // Compute and cache a path passing through (200, 200).
    let npc = sim
        .spawn_npc(Vec2::new(16.0, 16.0), Vec2::new(4.0, 4.0), 10.0, 0, 2, "w")
        .unwrap();
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    sim.request_path(
        npc,
        Vec2::new(400.0, 400.0),
        PathPriority::High,
        Box::new(move |_, waypoints| sink.lock().unwrap().push(waypoints.to_vec())),
    );
    sim.tick(1.0 / 60.0);
    assert!(!delivered.lock().unwrap()[0].is_empty());
    assert_eq!(sim.scheduler.cache().stats().total_paths, 1);

    // A wall lands on the route: the obstacle event must evict the path.
    sim.spawn_static_obstacle(Vec2::new(200.0, 200.0), Vec2::new(32.0, 32.0))
        .unwrap();
    sim.tick(1.0 / 60.0);

    let saw_obstacle_event = sim
        .take_events()
        .iter()
        .any(|e| matches!(e, SimEvent::ObstacleChanged { position, .. } if *position == Vec2::new(200.0, 200.0)));
    assert!(saw_obstacle_event);
    assert_eq!(sim.scheduler.cache().stats().total_paths, 0);
}

#[test]
fn test_crowd_lateral_redirection_preserves_speed() {
    let mut sim = simulation();
    let mover = sim
        .spawn_npc(Vec2::new(0.0, 0.0), Vec2::new(8.0, 8.0), 10.0, 0, 2, "w")
        .unwrap();
    let _blocker = sim
        .spawn_npc(Vec2::new(20.0, 0.0), Vec2::new(8.0, 8.0), 10.0, 0, 2, "w")
        .unwrap();

    let out = sim.steer(
        mover,
        Vec2::new(100.0, 0.0),
        &SeparationParams {
            speed: 100.0,
            radius: 24.0,
            strength: 0.3,
            max_neighbors: 6,
        },
    );

    assert!(out.y.abs() > 0.0, "no perpendicular component: {out:?}");
    assert!((out.length() - 100.0).abs() < 0.5, "speed drifted: {out:?}");
    assert!(out.x > 0.0, "forward bias lost: {out:?}");

    // The blended velocity landed in the store as the entity's intent.
    let index = sim.store.get_index(mover).unwrap();
    assert_eq!(sim.store.hot(index).unwrap().transform.velocity, out);
}

#[test]
fn test_pickup_flow_closest_item() {
    let mut sim = simulation();
    let (templates, ore) = ore_templates(50);
    sim.registry.create_world("W");
    sim.registry.set_active_world("W");

    let near = sim
        .spawn_dropped_item(Vec2::new(30.0, 0.0), Vec2::new(8.0, 8.0), ore, 3, "W")
        .unwrap();
    sim.spawn_dropped_item(Vec2::new(90.0, 0.0), Vec2::new(8.0, 8.0), ore, 3, "W")
        .unwrap();

    let picker = sim
        .spawn_npc(Vec2::ZERO, Vec2::new(8.0, 8.0), 10.0, 0, 4, "W")
        .unwrap();
    let inventory = sim.store.character(picker).unwrap().inventory_index;

    let found = sim
        .registry
        .find_closest_dropped_item(Vec2::ZERO, 64.0, &sim.store)
        .expect("item within radius");
    assert_eq!(sim.store.handle_at(found), Some(near));

    // Pick it up: inventory gains the stack, the world entity goes away.
    let quantity = sim.store.item_at(found).unwrap().quantity;
    assert!(sim.store.add_to_inventory(inventory, ore, quantity, &templates));
    sim.destroy(near);
    sim.tick(1.0 / 60.0);

    assert_eq!(sim.registry.active_item_count(), 1);
    assert!(sim.registry.find_closest_dropped_item(Vec2::ZERO, 64.0, &sim.store).is_none());
    assert_eq!(sim.registry.query_inventory_total("W", ore, sim.store.inventories()), 3);
}

#[test]
fn test_world_events_drive_registry() {
    let mut sim = simulation();
    let sender = sim.event_sender();
    sender.publish(SimEvent::WorldLoaded { world: "cavern".into() });
    sim.tick(1.0 / 60.0);

    assert_eq!(sim.registry.active_world(), "cavern");
    assert!(sim.registry.has_world("cavern"));

    sender.publish(SimEvent::WorldUnloaded { world: "cavern".into() });
    sim.tick(1.0 / 60.0);
    assert_eq!(sim.registry.active_item_count(), 0);
}

#[test]
fn test_resource_change_events_published() {
    let mut sim = simulation();
    let (templates, ore) = ore_templates(10);
    let npc = sim
        .spawn_npc(Vec2::ZERO, Vec2::new(8.0, 8.0), 10.0, 0, 4, "w")
        .unwrap();
    let inventory = sim.store.character(npc).unwrap().inventory_index;

    assert!(sim.store.add_to_inventory(inventory, ore, 7, &templates));
    sim.tick(1.0 / 60.0);

    let change = sim.take_events().into_iter().find_map(|e| match e {
        SimEvent::ResourceChange { owner, old_quantity, new_quantity, .. } => {
            Some((owner, old_quantity, new_quantity))
        }
        _ => None,
    });
    assert_eq!(change, Some((npc, 0, 7)));
}
