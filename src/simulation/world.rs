//! Main simulation world that ties everything together
//!
//! Owns the map, the route table, the fleet and the signal posts, and
//! advances all of them one tick at a time. Single-threaded; see
//! `sim_loop` for running it on its own thread.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use super::collision::Surroundings;
use super::difficulty::DifficultySettings;
use super::fleet::Fleet;
use super::map::GraphInput;
use super::road_network::RoadNetwork;
use super::route_table::RouteTable;
use super::session::{SessionContext, SessionStats, SimObserver};
use super::signal::SignalPost;
use super::sim_loop::Command;
use super::snapshot::{ConvoyView, SignalView, SimSnapshot, VehicleView};
use super::topology::Topology;
use super::types::{JunctionId, Position, SignalId, VehicleId};

/// The main simulation world
pub struct SimWorld {
    topology: Arc<Topology>,
    routes: RouteTable,
    fleet: Fleet,
    signals: Vec<SignalPost>,
    settings: DifficultySettings,

    /// Reachable (source, final) pairs to draw spawns from
    spawn_pairs: Vec<(JunctionId, JunctionId)>,
    spawn_timer_ms: f32,

    tick_count: u64,
    /// Wall time fed to `tick`, in milliseconds
    time_ms: f64,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,

    session: SessionContext,
}

#[derive(Serialize)]
struct SavedWorldRef<'a> {
    topology: &'a Topology,
    routes: &'a RouteTable,
    fleet: &'a Fleet,
    signals: &'a [SignalPost],
    settings: DifficultySettings,
    stats: SessionStats,
    spawn_timer_ms: f32,
    tick_count: u64,
    time_ms: f64,
}

#[derive(Deserialize)]
struct SavedWorld {
    topology: Topology,
    routes: RouteTable,
    fleet: Fleet,
    signals: Vec<SignalPost>,
    settings: DifficultySettings,
    stats: SessionStats,
    spawn_timer_ms: f32,
    tick_count: u64,
    time_ms: f64,
}

impl SimWorld {
    fn new_internal(
        input: &GraphInput,
        settings: DifficultySettings,
        rng: Option<StdRng>,
    ) -> Result<Self> {
        settings.validate().context("Invalid difficulty settings")?;
        let topology = Topology::build(input).context("Failed to build road map")?;
        let network = RoadNetwork::from_topology(&topology);
        let routes = RouteTable::compute(&network);
        let spawn_pairs = reachable_pairs(&topology, &routes);
        if spawn_pairs.is_empty() {
            warn!("No final junction can be reached from any source, nothing will spawn");
        }

        let mut world = Self {
            topology: Arc::new(topology),
            routes,
            fleet: Fleet::new(),
            signals: Vec::new(),
            settings,
            spawn_pairs,
            spawn_timer_ms: 0.0,
            tick_count: 0,
            time_ms: 0.0,
            rng,
            session: SessionContext::default(),
        };
        world.place_signals();
        info!(
            "World ready: {} junctions, {} roads, {} signal posts, {} spawn routes",
            world.topology.junctions().len(),
            network.road_count(),
            world.signals.len(),
            world.spawn_pairs.len()
        );
        Ok(world)
    }

    pub fn new(input: &GraphInput, settings: DifficultySettings) -> Result<Self> {
        Self::new_internal(input, settings, None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(input: &GraphInput, settings: DifficultySettings, seed: u64) -> Result<Self> {
        Self::new_internal(input, settings, Some(StdRng::seed_from_u64(seed)))
    }

    /// The built-in grid map
    pub fn create_demo_world(settings: DifficultySettings) -> Result<Self> {
        Self::new(&GraphInput::demo(), settings)
    }

    /// The built-in grid map with a seeded RNG
    pub fn create_demo_world_with_seed(settings: DifficultySettings, seed: u64) -> Result<Self> {
        Self::new_with_seed(&GraphInput::demo(), settings, seed)
    }

    /// Random index below `len`, using seeded RNG if available
    fn random_index(&mut self, len: usize) -> usize {
        match &mut self.rng {
            Some(rng) => rng.random_range(0..len),
            None => rand::rng().random_range(0..len),
        }
    }

    /// Choose `amount` distinct elements from a slice, using seeded RNG if available
    fn choose_several<T: Clone>(&mut self, slice: &[T], amount: usize) -> Vec<T> {
        match &mut self.rng {
            Some(rng) => slice.choose_multiple(rng, amount).cloned().collect(),
            None => slice.choose_multiple(&mut rand::rng(), amount).cloned().collect(),
        }
    }

    /// Puts green lights on a share of the roads that end in front of a
    /// junction with somewhere to go.
    fn place_signals(&mut self) {
        let topology = Arc::clone(&self.topology);
        let candidates: Vec<usize> = topology
            .roads()
            .iter()
            .filter(|road| {
                let end_is_final = topology.junction(road.end).map_or(true, |j| j.is_final());
                let on_sub = topology
                    .sub_intersections()
                    .any(|s| s.point.same_bits(&road.end_point));
                !end_is_final && !on_sub
            })
            .map(|road| road.id.0)
            .collect();

        let amount = (self.settings.signal_fraction * candidates.len() as f32).ceil() as usize;
        let mut chosen = self.choose_several(&candidates, amount.min(candidates.len()));
        chosen.sort_unstable();

        self.signals = chosen
            .into_iter()
            .filter_map(|road| topology.roads().get(road))
            .enumerate()
            .map(|(i, road)| SignalPost::new(SignalId(i), road))
            .collect();
        debug!(
            "Placed {} signal posts on {} eligible roads",
            self.signals.len(),
            candidates.len()
        );
    }

    /// Advances the world by `elapsed_ms` of wall time.
    pub fn tick(&mut self, elapsed_ms: f32) {
        let elapsed_ms = elapsed_ms.max(0.0);
        self.time_ms += f64::from(elapsed_ms);

        self.spawn_timer_ms += elapsed_ms;
        let interval = self.settings.spawn_interval_ms;
        if self.spawn_timer_ms > interval {
            self.spawn_timer_ms %= interval;
            self.spawn_random_vehicle();
        }

        let scaled = elapsed_ms * self.settings.speed_multiplier;
        self.fleet
            .update(scaled, &self.topology, &self.routes, &mut self.session.stats);

        let surroundings = Surroundings {
            topology: &self.topology,
            routes: &self.routes,
            signals: &self.signals,
        };
        self.fleet
            .resolve_collisions(surroundings, &mut self.session.stats);

        self.tick_count += 1;
        if self.session.has_observers() {
            let snapshot = self.snapshot();
            self.session.notify(&snapshot);
        }
    }

    /// Spawns one vehicle on a random reachable (source, final) pair.
    pub fn spawn_random_vehicle(&mut self) -> Option<VehicleId> {
        if self.spawn_pairs.is_empty() {
            return None;
        }
        let index = self.random_index(self.spawn_pairs.len());
        let (start, destination) = self.spawn_pairs[index];
        match self.spawn_vehicle(start, destination) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Spawn skipped: {:#}", e);
                None
            }
        }
    }

    /// Spawns one vehicle at `start`, routed to `destination`.
    pub fn spawn_vehicle(&mut self, start: JunctionId, destination: JunctionId) -> Result<VehicleId> {
        let id = self
            .fleet
            .spawn(start, destination, &self.topology, &self.routes)
            .with_context(|| format!("No way from {:?} to {:?}", start, destination))?;
        self.session.stats.spawned += 1;
        Ok(id)
    }

    /// Applies one user command.
    pub fn apply(&mut self, command: Command) {
        let applied = match command {
            Command::Accelerate(id) => self.fleet.accelerate(id),
            Command::Decelerate(id) => self.fleet.decelerate(id),
            Command::ForceQuit(id) => self.fleet.force_quit(id),
            Command::ToggleSignal(id) => self.toggle_signal(id),
            Command::Click(point) => {
                self.click(point);
                true
            }
        };
        if !applied {
            debug!("Command {:?} had no effect", command);
        }
    }

    /// A click on the map: a signal under the point is toggled and `None`
    /// returned, otherwise the vehicle under the point, if any.
    pub fn click(&mut self, point: Position) -> Option<VehicleId> {
        if let Some(id) = self.signal_at(point) {
            self.toggle_signal(id);
            return None;
        }
        self.vehicle_at(point)
    }

    pub fn signal_at(&self, point: Position) -> Option<SignalId> {
        self.signals
            .iter()
            .find(|s| s.zone().contains(point))
            .map(|s| s.id)
    }

    pub fn vehicle_at(&self, point: Position) -> Option<VehicleId> {
        self.fleet
            .vehicles()
            .find(|v| v.footprint().contains(point))
            .map(|v| v.id)
    }

    pub fn toggle_signal(&mut self, id: SignalId) -> bool {
        match self.signals.get_mut(id.0) {
            Some(signal) => {
                signal.toggle();
                debug!("Signal {:?} is now {}", id, if signal.is_green() { "green" } else { "red" });
                true
            }
            None => false,
        }
    }

    pub fn accelerate(&mut self, id: VehicleId) -> bool {
        self.fleet.accelerate(id)
    }

    pub fn decelerate(&mut self, id: VehicleId) -> bool {
        self.fleet.decelerate(id)
    }

    pub fn force_quit(&mut self, id: VehicleId) -> bool {
        self.fleet.force_quit(id)
    }

    pub fn subscribe(&mut self, observer: impl SimObserver + 'static) {
        self.session.subscribe(Box::new(observer));
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            tick: self.tick_count,
            topology: Arc::clone(&self.topology),
            vehicles: self
                .fleet
                .vehicles()
                .map(|v| VehicleView {
                    id: v.id,
                    convoy: v.convoy,
                    footprint: *v.footprint(),
                    state: v.state(),
                    speed: v.speed(),
                    crash_frame: v.crash_frame(),
                    destination: v.destination(),
                })
                .collect(),
            convoys: self
                .fleet
                .convoys()
                .map(|c| ConvoyView {
                    id: c.id,
                    members: c.members(),
                })
                .collect(),
            signals: self
                .signals
                .iter()
                .map(|s| SignalView {
                    id: s.id,
                    road: s.road,
                    green: s.is_green(),
                    zone: *s.zone(),
                })
                .collect(),
            stats: self.session.stats,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn signals(&self) -> &[SignalPost] {
        &self.signals
    }

    pub fn settings(&self) -> DifficultySettings {
        self.settings
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats
    }

    pub fn spawn_pairs(&self) -> &[(JunctionId, JunctionId)] {
        &self.spawn_pairs
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Wall time fed to the world so far, in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.time_ms / 1000.0
    }

    /// Writes the whole session as JSON.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        let saved = SavedWorldRef {
            topology: &self.topology,
            routes: &self.routes,
            fleet: &self.fleet,
            signals: &self.signals,
            settings: self.settings,
            stats: self.session.stats,
            spawn_timer_ms: self.spawn_timer_ms,
            tick_count: self.tick_count,
            time_ms: self.time_ms,
        };
        serde_json::to_writer(writer, &saved).context("Failed to write saved session")
    }

    /// Reads a session written by [`SimWorld::save`].
    ///
    /// Sub-intersections, vehicle → convoy links and footprints are rebuilt
    /// rather than trusted.
    pub fn restore<R: Read>(reader: R) -> Result<Self> {
        let saved: SavedWorld =
            serde_json::from_reader(reader).context("Failed to read saved session")?;
        saved
            .settings
            .validate()
            .context("Saved session has invalid difficulty settings")?;

        let mut topology = saved.topology;
        topology.fix();
        saved
            .routes
            .check(topology.junctions().len())
            .context("Saved session has an inconsistent route table")?;
        let mut fleet = saved.fleet;
        fleet
            .relink()
            .context("Saved session has inconsistent convoys")?;
        for (i, signal) in saved.signals.iter().enumerate() {
            if signal.id != SignalId(i) || topology.road(signal.road).is_none() {
                bail!("Saved signal #{} does not match the road map", i);
            }
        }

        let spawn_pairs = reachable_pairs(&topology, &saved.routes);
        info!(
            "Restored session at tick {}: {} vehicles in {} convoys",
            saved.tick_count,
            fleet.vehicle_count(),
            fleet.convoy_count()
        );
        Ok(Self {
            topology: Arc::new(topology),
            routes: saved.routes,
            fleet,
            signals: saved.signals,
            settings: saved.settings,
            spawn_pairs,
            spawn_timer_ms: saved.spawn_timer_ms,
            tick_count: saved.tick_count,
            time_ms: saved.time_ms,
            rng: None,
            session: SessionContext::new(saved.stats),
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.save(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn restore_from_file(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::restore(BufReader::new(file)).with_context(|| format!("In {}", path.display()))
    }

    /// Log a summary of the world state
    pub fn log_summary(&self) {
        let stats = self.session.stats;
        info!("=== Convoy Simulation Summary ===");
        info!(
            "Time: {:.1}s over {} ticks",
            self.elapsed_secs(),
            self.tick_count
        );
        info!(
            "Total junctions: {}, Total roads: {}, Sub-intersections: {}, Signal posts: {}",
            self.topology.junctions().len(),
            self.topology.roads().len(),
            self.topology.sub_intersections().count(),
            self.signals.len()
        );
        info!("Total vehicles spawned: {}", stats.spawned);
        info!("Total vehicles arrived: {}", stats.arrived);
        info!("Total vehicles crashed: {}", stats.crashed);
        info!(
            "Active vehicles: {}, Active convoys: {}",
            self.fleet.vehicle_count(),
            self.fleet.convoy_count()
        );
        info!("Success rate: {:.1}%", stats.success_rate() * 100.0);
    }
}

/// Every (source, final) pair with a route between them
pub fn reachable_pairs(topology: &Topology, routes: &RouteTable) -> Vec<(JunctionId, JunctionId)> {
    let finals: Vec<JunctionId> = topology.finals().collect();
    topology
        .sources()
        .flat_map(|s| finals.iter().map(move |f| (s, *f)))
        .filter(|(s, f)| s != f && routes.is_reachable(*s, *f))
        .collect()
}
