//! The simulation thread and its handle

use std::thread;
use std::time::Duration;

use traffic_convoy::simulation::{Command, Difficulty, RunState, SimWorld, SimulationLoop};

fn demo(difficulty: Difficulty) -> SimWorld {
    SimWorld::create_demo_world_with_seed(difficulty.settings(), 17).unwrap()
}

#[test]
fn test_loop_ticks_until_stopped() {
    let handle = SimulationLoop::spawn(demo(Difficulty::Hard)).unwrap();
    assert_eq!(handle.state(), RunState::Running);

    thread::sleep(Duration::from_millis(200));
    let snapshot = handle.snapshot();
    assert!(snapshot.tick > 0);

    let world = handle.stop().unwrap();
    assert!(world.tick_count() >= snapshot.tick);
    world.fleet().check_membership().unwrap();
}

#[test]
fn test_pause_freezes_the_published_state() {
    let handle = SimulationLoop::spawn(demo(Difficulty::Hard)).unwrap();
    thread::sleep(Duration::from_millis(100));

    handle.pause();
    assert_eq!(handle.state(), RunState::Paused);
    // let an in-flight tick land
    thread::sleep(Duration::from_millis(50));
    let frozen = handle.snapshot().tick;
    thread::sleep(Duration::from_millis(150));
    assert_eq!(handle.snapshot().tick, frozen);

    handle.resume();
    assert_eq!(handle.state(), RunState::Running);
    thread::sleep(Duration::from_millis(150));
    assert!(handle.snapshot().tick > frozen);

    let world = handle.stop().unwrap();
    assert!(world.tick_count() > frozen);
}

#[test]
fn test_commands_are_applied_between_ticks() {
    let world = demo(Difficulty::Noob);
    assert!(world.signals()[0].is_green());
    let handle = SimulationLoop::spawn(world).unwrap();

    handle.send(Command::ToggleSignal(traffic_convoy::simulation::SignalId(0))).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(!handle.snapshot().signals[0].green);

    // a click on the zone toggles it back
    let zone = handle.snapshot().signals[0].zone.center();
    assert_eq!(handle.click(zone).unwrap(), None);
    thread::sleep(Duration::from_millis(100));
    assert!(handle.snapshot().signals[0].green);

    let world = handle.stop().unwrap();
    assert!(world.signals()[0].is_green());
}

#[test]
fn test_commands_are_applied_while_paused() {
    let handle = SimulationLoop::spawn(demo(Difficulty::Noob)).unwrap();
    handle.pause();
    thread::sleep(Duration::from_millis(50));
    let frozen = handle.snapshot();
    assert!(frozen.signals[0].green);

    handle.send(Command::ToggleSignal(frozen.signals[0].id)).unwrap();
    thread::sleep(Duration::from_millis(100));
    let latest = handle.snapshot();
    assert!(!latest.signals[0].green);
    assert_eq!(latest.tick, frozen.tick);
    assert_eq!(handle.state(), RunState::Paused);

    let world = handle.stop().unwrap();
    assert!(!world.signals()[0].is_green());
    assert_eq!(world.tick_count(), frozen.tick);
}

#[test]
fn test_dropping_the_handle_stops_the_thread() {
    let handle = SimulationLoop::spawn(demo(Difficulty::Easy)).unwrap();
    thread::sleep(Duration::from_millis(50));
    drop(handle);
}
