//! Whole-world behaviour on the demo grid and on degenerate maps

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use traffic_convoy::simulation::{
    reachable_pairs, Command, Difficulty, DifficultySettings, GraphInput, SimSnapshot, SimWorld,
};

const DELTA: f32 = 16.0;

fn accounted_for(world: &SimWorld) -> bool {
    let stats = world.stats();
    stats.spawned == stats.arrived + stats.crashed + world.fleet().vehicle_count() as u64
}

#[test]
fn test_demo_world_runs_and_accounts_for_every_vehicle() {
    let mut world = SimWorld::create_demo_world_with_seed(Difficulty::Hard.settings(), 7).unwrap();
    assert_eq!(world.spawn_pairs().len(), 16);

    for tick in 0..3000 {
        world.tick(DELTA);
        if tick % 100 == 0 {
            world.fleet().check_membership().unwrap();
            assert!(accounted_for(&world));
        }
    }
    world.fleet().check_membership().unwrap();
    assert!(accounted_for(&world));

    let stats = world.stats();
    // one spawn every two seconds over 48 seconds
    assert!(stats.spawned >= 20, "only {} spawned", stats.spawned);
    assert!(stats.arrived + stats.crashed > 0);
    assert_eq!(world.tick_count(), 3000);
    assert!((world.elapsed_secs() - 48.0).abs() < 1e-6);
}

#[test]
fn test_every_convoy_is_non_empty_and_every_vehicle_is_placed_once() {
    let mut world =
        SimWorld::create_demo_world_with_seed(Difficulty::Hardcore.settings(), 99).unwrap();
    for _ in 0..2000 {
        world.tick(DELTA);
        let fleet = world.fleet();
        let listed: usize = fleet.convoys().map(|c| c.len()).sum();
        assert_eq!(listed, fleet.vehicle_count());
        assert!(fleet.convoys().all(|c| !c.is_empty()));
    }
}

#[test]
fn test_seeded_worlds_are_reproducible() {
    let settings = Difficulty::Medium.settings();
    let mut first = SimWorld::create_demo_world_with_seed(settings, 1234).unwrap();
    let mut second = SimWorld::create_demo_world_with_seed(settings, 1234).unwrap();

    let placed = |w: &SimWorld| w.signals().iter().map(|s| s.road).collect::<Vec<_>>();
    assert_eq!(placed(&first), placed(&second));

    for _ in 0..1500 {
        first.tick(DELTA);
        second.tick(DELTA);
    }
    assert_eq!(first.stats(), second.stats());
    assert_eq!(first.fleet().vehicle_count(), second.fleet().vehicle_count());
    assert_eq!(first.fleet().convoy_count(), second.fleet().convoy_count());
}

#[test]
fn test_map_without_reachable_exit_never_spawns() {
    // two junctions feeding each other: no source, no exit
    let input = GraphInput::new()
        .junction("A", 0.0, 0.0)
        .junction("B", 300.0, 0.0)
        .road("A", "B")
        .road("B", "A");
    let mut world = SimWorld::new(&input, Difficulty::Hardcore.settings()).unwrap();
    assert!(world.spawn_pairs().is_empty());
    assert_eq!(world.spawn_random_vehicle(), None);

    for _ in 0..1000 {
        world.tick(DELTA);
    }
    assert_eq!(world.stats().spawned, 0);
    assert_eq!(world.fleet().vehicle_count(), 0);
}

#[test]
fn test_reachable_pairs_skip_disconnected_exits() {
    let input = GraphInput::new()
        .junction("IN", 0.0, 0.0)
        .junction("OUT", 300.0, 0.0)
        .junction("IN2", 0.0, 300.0)
        .junction("OUT2", 300.0, 300.0)
        .road("IN", "OUT")
        .road("IN2", "OUT2");
    let world = SimWorld::new(&input, DifficultySettings::default()).unwrap();
    let pairs = reachable_pairs(world.topology(), world.routes());
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs, world.spawn_pairs());
}

#[test]
fn test_difficulty_presets() {
    let noob = Difficulty::Noob.settings();
    assert_eq!(noob.spawn_interval_ms, 6000.0);
    assert_eq!(noob.signal_fraction, 1.0);
    assert_eq!(noob.speed_multiplier, 1.0);

    let hardcore = Difficulty::Hardcore.settings();
    assert_eq!(hardcore.spawn_interval_ms, 1000.0);
    assert_eq!(hardcore.signal_fraction, 0.0);
    assert_eq!(hardcore.speed_multiplier, 3.0);

    assert_eq!(DifficultySettings::default(), Difficulty::Medium.settings());
    assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
    assert!("impossible".parse::<Difficulty>().is_err());

    for difficulty in Difficulty::ALL {
        difficulty.settings().validate().unwrap();
    }
}

#[test]
fn test_signal_share_follows_difficulty() {
    let all = SimWorld::create_demo_world_with_seed(Difficulty::Noob.settings(), 3).unwrap();
    let none = SimWorld::create_demo_world_with_seed(Difficulty::Hardcore.settings(), 3).unwrap();
    let half = SimWorld::create_demo_world_with_seed(Difficulty::Medium.settings(), 3).unwrap();

    assert!(!all.signals().is_empty());
    assert!(none.signals().is_empty());
    assert_eq!(half.signals().len(), (all.signals().len() as f32 * 0.5).ceil() as usize);
    assert!(all.signals().iter().all(|s| s.is_green()));

    // never on a road into an exit
    for signal in all.signals() {
        let road = all.topology().road(signal.road).unwrap();
        assert!(!all.topology().junction(road.end).unwrap().is_final());
    }
}

#[test]
fn test_invalid_settings_are_rejected() {
    let bad = [
        DifficultySettings {
            spawn_interval_ms: 0.0,
            ..DifficultySettings::default()
        },
        DifficultySettings {
            signal_fraction: 1.5,
            ..DifficultySettings::default()
        },
        DifficultySettings {
            speed_multiplier: -1.0,
            ..DifficultySettings::default()
        },
    ];
    for settings in bad {
        assert!(settings.validate().is_err());
        assert!(SimWorld::create_demo_world(settings).is_err());
    }
}

#[test]
fn test_observers_see_every_tick() {
    let mut world = SimWorld::create_demo_world_with_seed(Difficulty::Easy.settings(), 5).unwrap();
    let seen = Arc::new(AtomicU64::new(0));
    let last_tick = Arc::new(AtomicU64::new(0));

    let counter = Arc::clone(&seen);
    let latest = Arc::clone(&last_tick);
    world.subscribe(move |snapshot: &SimSnapshot| {
        counter.fetch_add(1, Ordering::SeqCst);
        latest.store(snapshot.tick, Ordering::SeqCst);
    });

    for _ in 0..25 {
        world.tick(DELTA);
    }
    assert_eq!(seen.load(Ordering::SeqCst), 25);
    assert_eq!(last_tick.load(Ordering::SeqCst), 25);
}

#[test]
fn test_snapshot_mirrors_the_world() {
    let mut world = SimWorld::create_demo_world_with_seed(Difficulty::Hard.settings(), 11).unwrap();
    for _ in 0..600 {
        world.tick(DELTA);
    }
    let snapshot = world.snapshot();
    assert_eq!(snapshot.tick, 600);
    assert_eq!(snapshot.vehicles.len(), world.fleet().vehicle_count());
    assert_eq!(snapshot.convoys.len(), world.fleet().convoy_count());
    assert_eq!(snapshot.signals.len(), world.signals().len());
    assert_eq!(snapshot.stats, world.stats());

    for view in &snapshot.convoys {
        for member in view.members.iter() {
            assert_eq!(snapshot.vehicle(*member).unwrap().convoy, view.id);
        }
    }

    // snapshots do not change as the world moves on
    let before = snapshot.vehicles.len();
    world.tick(DELTA);
    assert_eq!(snapshot.vehicles.len(), before);
    assert_eq!(snapshot.tick, 600);
}

#[test]
fn test_commands_reach_the_world() {
    let mut world = SimWorld::create_demo_world_with_seed(Difficulty::Noob.settings(), 2).unwrap();
    let signal = world.signals()[0].id;
    world.apply(Command::ToggleSignal(signal));
    assert!(!world.signals()[0].is_green());

    let v = world.spawn_random_vehicle().unwrap();
    world.apply(Command::Accelerate(v));
    assert_eq!(
        world.fleet().vehicle(v).unwrap().speed(),
        traffic_convoy::simulation::Speed::Fast
    );
    world.apply(Command::ForceQuit(v));
    assert!(world.fleet().vehicle(v).unwrap().is_force_quitting());
}

#[test]
fn test_save_and_restore_keep_the_session() {
    let mut world = SimWorld::create_demo_world_with_seed(Difficulty::Hard.settings(), 21).unwrap();
    for _ in 0..1200 {
        world.tick(DELTA);
    }

    let mut saved = Vec::new();
    world.save(&mut saved).unwrap();
    let mut restored = SimWorld::restore(saved.as_slice()).unwrap();

    assert_eq!(restored.stats(), world.stats());
    assert_eq!(restored.tick_count(), world.tick_count());
    assert_eq!(restored.fleet().vehicle_count(), world.fleet().vehicle_count());
    assert_eq!(restored.fleet().convoy_count(), world.fleet().convoy_count());
    assert_eq!(restored.signals().len(), world.signals().len());
    assert_eq!(restored.spawn_pairs(), world.spawn_pairs());
    restored.fleet().check_membership().unwrap();

    for vehicle in world.fleet().vehicles() {
        let copy = restored.fleet().vehicle(vehicle.id).unwrap();
        assert_eq!(copy.convoy, vehicle.convoy);
        assert!(copy.center().distance(&vehicle.center()) < 1e-3);
        assert!(copy.footprint().center().distance(&vehicle.center()) < 1e-3);
        assert_eq!(copy.is_crashing(), vehicle.is_crashing());
        assert_eq!(copy.speed(), vehicle.speed());
    }
    let subs = |w: &SimWorld| w.topology().sub_intersections().cloned().collect::<Vec<_>>();
    assert_eq!(subs(&restored), subs(&world));

    // the restored session keeps going
    for _ in 0..600 {
        restored.tick(DELTA);
    }
    restored.fleet().check_membership().unwrap();
    assert!(accounted_for(&restored));
}

#[test]
fn test_restore_rejects_garbage() {
    assert!(SimWorld::restore("{ \"fleet\": 3 }".as_bytes()).is_err());
    assert!(SimWorld::restore("not json".as_bytes()).is_err());
}

#[test]
fn test_restore_rejects_a_mismatched_route_table() {
    let input = GraphInput::new()
        .junction("IN", 0.0, 0.0)
        .junction("MID", 300.0, 0.0)
        .junction("OUT", 600.0, 0.0)
        .road("IN", "MID")
        .road("MID", "OUT");
    let world = SimWorld::new(&input, Difficulty::Easy.settings()).unwrap();
    let mut saved = Vec::new();
    world.save(&mut saved).unwrap();
    let session: serde_json::Value = serde_json::from_slice(&saved).unwrap();

    let restore_with = |edit: &dyn Fn(&mut serde_json::Value)| {
        let mut session = session.clone();
        edit(&mut session["routes"]);
        SimWorld::restore(serde_json::to_vec(&session).unwrap().as_slice())
    };

    assert!(restore_with(&|_| {}).is_ok());
    // truncated tables
    assert!(restore_with(&|routes| {
        routes["distances"] = serde_json::json!([0.0]);
        routes["via"] = serde_json::json!([null]);
    })
    .is_err());
    // a table for a different map
    assert!(restore_with(&|routes| routes["size"] = serde_json::json!(10)).is_err());
    assert!(restore_with(&|routes| routes["via"][1] = serde_json::json!(7)).is_err());
}

#[test]
fn test_save_to_file_round_trip() {
    let world = SimWorld::create_demo_world_with_seed(Difficulty::Easy.settings(), 8).unwrap();
    let path = std::env::temp_dir().join(format!("convoy-save-{}.json", std::process::id()));
    world.save_to_file(&path).unwrap();
    let restored = SimWorld::restore_from_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(restored.settings(), world.settings());
    assert_eq!(restored.topology().junctions().len(), world.topology().junctions().len());
}
