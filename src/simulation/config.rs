//! Tunable constants for the simulation
//!
//! Distances are in plane units, speeds in units per tick, and times in
//! milliseconds unless the field name says otherwise.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::signal::ControlMode;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Width of the visible plane
    pub width: f32,
    /// Height of the visible plane
    pub height: f32,
    /// Intersections per row and per column
    pub grid_size: usize,
    /// Chance that a generated intersection is a T-junction
    pub t_junction_probability: f64,

    /// Control mode at start-up
    pub initial_mode: ControlMode,
    /// Length of one full fixed-time signal cycle
    pub cycle_ms: u64,
    /// Queue difference one axis needs over the other to preempt the cycle
    pub adaptive_margin: u32,
    /// Distance from intersection centre to the stop line
    pub stop_line_distance: f32,
    /// Length of the queue detection band behind the stop line
    pub detection_window: f32,

    /// Real-time period of one tick
    pub tick_interval_ms: u64,
    pub population_cap: usize,
    pub spawn_probability: f64,
    /// How far off-canvas vehicles appear
    pub spawn_offset: f32,
    /// How far off-canvas vehicles may travel before removal
    pub cull_margin: f32,

    /// Perpendicular distance from road centre line to lane centre
    pub lane_offset: f32,
    /// Tolerance used when deciding two vehicles share a lane
    pub lane_tolerance: f32,
    /// Lateral band in which an intersection counts as being on a vehicle's path
    pub lookup_tolerance: f32,
    /// Distance to centre at which the turn decision is taken
    pub turn_threshold: f32,
    pub straight_probability: f64,

    pub acceleration: f32,
    pub deceleration: f32,
    /// Below this speed a vehicle does not move
    pub movement_threshold: f32,
    /// Gap to the stop line under which the vehicle stops outright
    pub hard_stop_gap: f32,
    /// Gap to the stop line under which the vehicle brakes proportionally
    pub brake_band: f32,
    /// Fraction of base speed used when approaching a red light from afar
    pub cautious_factor: f32,

    /// Look-ahead distance for car-following
    pub safe_gap: f32,
    /// Fraction of the leader's speed a follower may reach
    pub follow_factor: f32,
    /// Capped follower targets below this become a full stop
    pub follow_stop_threshold: f32,

    /// Ticks between two stats history samples
    pub history_interval_ticks: u64,
    pub history_len: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            grid_size: 3,
            t_junction_probability: 0.4,

            initial_mode: ControlMode::Adaptive,
            cycle_ms: 30_000,
            adaptive_margin: 3,
            stop_line_distance: 115.0,
            detection_window: 150.0,

            tick_interval_ms: 50,
            population_cap: 52,
            spawn_probability: 0.2,
            spawn_offset: 50.0,
            cull_margin: 350.0,

            lane_offset: 32.0,
            lane_tolerance: 5.0,
            lookup_tolerance: 65.0,
            turn_threshold: 15.0,
            straight_probability: 0.7,

            acceleration: 0.2,
            deceleration: 0.5,
            movement_threshold: 0.1,
            hard_stop_gap: 3.0,
            brake_band: 60.0,
            cautious_factor: 0.7,

            safe_gap: 75.0,
            follow_factor: 0.9,
            follow_stop_threshold: 0.2,

            history_interval_ticks: 20,
            history_len: 30,
        }
    }
}

impl SimConfig {
    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            bail!("grid_size must be at least 1");
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            bail!("plane dimensions must be positive");
        }
        if self.cycle_ms == 0 {
            bail!("cycle_ms must be positive");
        }
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }
        for (name, p) in [
            ("t_junction_probability", self.t_junction_probability),
            ("spawn_probability", self.spawn_probability),
            ("straight_probability", self.straight_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                bail!("{} must be within [0, 1], got {}", name, p);
            }
        }
        if self.acceleration <= 0.0 || self.deceleration <= 0.0 {
            bail!("acceleration and deceleration must be positive");
        }
        if self.brake_band <= self.hard_stop_gap {
            bail!("brake_band must exceed hard_stop_gap");
        }
        if self.history_interval_ticks == 0 {
            bail!("history_interval_ticks must be positive");
        }
        Ok(())
    }

    /// Spacing between neighbouring intersections along x and y
    pub fn grid_spacing(&self) -> (f32, f32) {
        let cells = (self.grid_size + 1) as f32;
        (self.width / cells, self.height / cells)
    }
}
