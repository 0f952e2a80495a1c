//! Runs a [`SimWorld`] on its own thread
//!
//! The thread owns the world outright. Other threads steer it through a
//! [`SimulationHandle`]: the run state is an atomic, user commands go through
//! a channel and are applied between ticks, and the latest snapshot is
//! swapped into a shared slot after every tick.

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::snapshot::SimSnapshot;
use super::types::{Position, SignalId, VehicleId};
use super::world::SimWorld;

/// Lifecycle of the simulation thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Running = 0,
    Paused = 1,
    /// Terminal; the thread exits after the current tick
    Stopped = 2,
}

impl RunState {
    fn from_u8(value: u8) -> RunState {
        match value {
            0 => RunState::Running,
            1 => RunState::Paused,
            _ => RunState::Stopped,
        }
    }
}

/// A user action, applied at the next tick boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Accelerate(VehicleId),
    Decelerate(VehicleId),
    ForceQuit(VehicleId),
    ToggleSignal(SignalId),
    /// A click on the map; toggles the signal under the point, if any
    Click(Position),
}

#[derive(Debug)]
struct RunControl {
    state: AtomicU8,
}

impl RunControl {
    fn get(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: RunState) {
        // Stopped is terminal
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != RunState::Stopped as u8).then_some(state as u8)
            });
    }
}

/// How long a paused loop waits before looking at its state again
pub const TICK_PERIOD: Duration = Duration::from_millis(16);

type SnapshotSlot = Arc<RwLock<Arc<SimSnapshot>>>;

/// The simulation thread's side
pub struct SimulationLoop {
    world: SimWorld,
    control: Arc<RunControl>,
    commands: Receiver<Command>,
    latest: SnapshotSlot,
}

/// Everyone else's side
pub struct SimulationHandle {
    control: Arc<RunControl>,
    commands: Sender<Command>,
    latest: SnapshotSlot,
    thread: Option<JoinHandle<SimWorld>>,
}

impl SimulationLoop {
    /// Starts ticking `world` on a new thread.
    pub fn spawn(world: SimWorld) -> Result<SimulationHandle> {
        let control = Arc::new(RunControl {
            state: AtomicU8::new(RunState::Running as u8),
        });
        let (command_tx, command_rx) = unbounded();
        let latest = Arc::new(RwLock::new(Arc::new(world.snapshot())));

        let sim = SimulationLoop {
            world,
            control: Arc::clone(&control),
            commands: command_rx,
            latest: Arc::clone(&latest),
        };
        let thread = thread::Builder::new()
            .name("simulation".into())
            .spawn(move || sim.run())
            .map_err(|e| anyhow!("Failed to start simulation thread: {}", e))?;

        Ok(SimulationHandle {
            control,
            commands: command_tx,
            latest,
            thread: Some(thread),
        })
    }

    fn run(mut self) -> SimWorld {
        info!("Simulation thread started");
        let mut last = Instant::now();
        loop {
            match self.control.get() {
                RunState::Stopped => break,
                RunState::Paused => {
                    if self.apply_commands() {
                        self.publish();
                    }
                    thread::sleep(TICK_PERIOD);
                    last = Instant::now();
                    continue;
                }
                RunState::Running => {}
            }

            self.apply_commands();

            let now = Instant::now();
            let elapsed_ms = now.duration_since(last).as_secs_f32() * 1000.0;
            last = now;
            self.world.tick(elapsed_ms);
            self.publish();
        }
        info!(
            "Simulation thread stopped after {} ticks",
            self.world.tick_count()
        );
        self.world
    }

    /// Applies every queued command; true if there was any.
    fn apply_commands(&mut self) -> bool {
        let mut applied = false;
        for command in self.commands.try_iter() {
            self.world.apply(command);
            applied = true;
        }
        applied
    }

    fn publish(&self) {
        let snapshot = Arc::new(self.world.snapshot());
        match self.latest.write() {
            Ok(mut slot) => *slot = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl SimulationHandle {
    pub fn state(&self) -> RunState {
        self.control.get()
    }

    pub fn pause(&self) {
        debug!("Pausing simulation");
        self.control.set(RunState::Paused);
    }

    pub fn resume(&self) {
        debug!("Resuming simulation");
        self.control.set(RunState::Running);
    }

    /// Queues a command for the next tick. Fails once the thread is gone.
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("Simulation thread is no longer running"))
    }

    /// The most recently published snapshot
    pub fn snapshot(&self) -> Arc<SimSnapshot> {
        match self.latest.read() {
            Ok(slot) => Arc::clone(&slot),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Resolves a click against the latest snapshot: a signal under the
    /// point is toggled and `None` returned, otherwise the vehicle there.
    pub fn click(&self, point: Position) -> Result<Option<VehicleId>> {
        let snapshot = self.snapshot();
        if let Some(signal) = snapshot.signal_at(point) {
            self.send(Command::ToggleSignal(signal))?;
            return Ok(None);
        }
        Ok(snapshot.vehicle_at(point))
    }

    /// Stops the thread after its current tick and hands the world back.
    pub fn stop(mut self) -> Result<SimWorld> {
        self.control.set(RunState::Stopped);
        let thread = self
            .thread
            .take()
            .ok_or_else(|| anyhow!("Simulation thread already joined"))?;
        thread
            .join()
            .map_err(|_| anyhow!("Simulation thread panicked"))
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.control.set(RunState::Stopped);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
