//! Convoy Traffic Simulation Library
//!
//! Vehicles routed over a junction graph, queueing into convoys that merge,
//! split and crash as they meet.

pub mod simulation;
