//! Standalone traffic signal simulation module
//!
//! This module contains the grid builder, signal controller, vehicle
//! motion engine and tick orchestrator. It has no rendering dependencies
//! and can be driven from the console or from tests.

mod config;
mod grid;
mod insight;
mod intersection;
mod signal;
mod spawner;
mod stats;
mod types;
mod vehicle;
mod world;

pub use config::SimConfig;
pub use grid::{build_grid, LocationConfig, ROAD_NAMES_POOL};
pub use insight::{
    HeuristicInsightService, Insight, InsightRequester, InsightService, InsightSnapshot,
    InsightStatus, IntersectionSummary,
};
pub use intersection::{RoadNames, SimIntersection};
pub use signal::{
    congested_axis, count_queues, fixed_time_phase, is_axis_paired, select_phase, ControlMode,
    SignalController,
};
pub use spawner::{edge_position, random_plate, spawn_vehicle, SpawnRequest};
pub use stats::{SimulationStats, StatsSample};
pub use types::{
    Axis, Direction, DirectionMap, IntersectionId, JunctionType, MovementState, Position,
    QueueLengths, SignalState, Signals, SimId, VehicleId, VehicleType,
};
pub use vehicle::{
    approach_speed, choose_exit, find_approach, follow_target, permitted_exits, stop_line_target,
    Approach, MotionContext, SimVehicle, VehicleStep,
};
pub use world::{ControlCommand, SimWorld, WorldSnapshot};
