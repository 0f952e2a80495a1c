//! Per-session counters and tick observers

use serde::{Deserialize, Serialize};
use std::fmt;

use super::snapshot::SimSnapshot;

/// Running totals for one play session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub spawned: u64,
    pub arrived: u64,
    pub crashed: u64,
}

impl SessionStats {
    /// Share of finished trips that ended at their destination
    pub fn success_rate(&self) -> f32 {
        let finished = self.arrived + self.crashed;
        if finished == 0 {
            0.0
        } else {
            self.arrived as f32 / finished as f32
        }
    }
}

/// Gets a look at the world once per tick
pub trait SimObserver: Send {
    fn on_tick(&mut self, snapshot: &SimSnapshot);
}

impl<F> SimObserver for F
where
    F: FnMut(&SimSnapshot) + Send,
{
    fn on_tick(&mut self, snapshot: &SimSnapshot) {
        self(snapshot)
    }
}

/// Counters plus the observers to notify after each tick
#[derive(Default)]
pub struct SessionContext {
    pub stats: SessionStats,
    observers: Vec<Box<dyn SimObserver>>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("stats", &self.stats)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SessionContext {
    pub fn new(stats: SessionStats) -> Self {
        Self {
            stats,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn SimObserver>) {
        self.observers.push(observer);
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub fn notify(&mut self, snapshot: &SimSnapshot) {
        for observer in &mut self.observers {
            observer.on_tick(snapshot);
        }
    }
}
