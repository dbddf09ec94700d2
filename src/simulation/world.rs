//! Main simulation world that ties everything together
//!
//! `SimWorld` owns the intersections, the vehicles, the control mode and
//! the random source. One call to [`SimWorld::tick`] applies queued
//! operator commands, recomputes signals, moves every vehicle and does the
//! spawn/cull bookkeeping.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

use super::config::SimConfig;
use super::grid::{build_grid, LocationConfig};
use super::insight::{InsightSnapshot, IntersectionSummary};
use super::intersection::SimIntersection;
use super::signal::{ControlMode, SignalController};
use super::spawner::{random_plate, spawn_vehicle, SpawnRequest};
use super::stats::SimulationStats;
use super::types::{Axis, Direction, IntersectionId, Position, SignalState, SimId, VehicleId, VehicleType};
use super::vehicle::{MotionContext, SimVehicle, VehicleStep};

/// An operator or UI request, applied at the start of the next tick
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetMode(ControlMode),
    /// Hold `axis` green at one intersection until released
    SetManualSignal {
        intersection: IntersectionId,
        axis: Axis,
    },
    ReleaseManual(IntersectionId),
    /// automatic -> vertical -> horizontal -> automatic
    CycleManual(IntersectionId),
    Run,
    Pause,
    SelectLocation(LocationConfig),
    Spawn(SpawnRequest),
}

/// Read-only copy of the state a renderer needs
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub elapsed_ms: u64,
    pub mode: ControlMode,
    pub intersections: Vec<SimIntersection>,
    pub vehicles: Vec<SimVehicle>,
}

/// The main simulation world
pub struct SimWorld {
    config: SimConfig,

    /// All intersections, in row-major grid order
    pub intersections: BTreeMap<IntersectionId, SimIntersection>,

    /// All vehicles on or near the plane
    pub vehicles: BTreeMap<VehicleId, SimVehicle>,

    pub stats: SimulationStats,

    mode: ControlMode,
    running: bool,
    location: LocationConfig,

    /// Commands waiting for the next tick
    pending: VecDeque<ControlCommand>,

    /// Next ID to assign
    next_id: usize,

    tick_count: u64,

    /// Simulation clock driving the fixed-time cycle
    elapsed_ms: u64,

    rng: StdRng,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(config: SimConfig, rng: StdRng) -> Self {
        let mut world = Self {
            mode: config.initial_mode,
            config,
            intersections: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            stats: SimulationStats::default(),
            running: true,
            location: LocationConfig::default(),
            pending: VecDeque::new(),
            next_id: 0,
            tick_count: 0,
            elapsed_ms: 0,
            rng,
        };
        world.regenerate_grid();
        world
    }

    pub fn new() -> Self {
        Self::new_internal(SimConfig::default(), StdRng::from_os_rng())
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(SimConfig::default(), StdRng::seed_from_u64(seed))
    }

    /// Create a world from a custom config, optionally seeded
    pub fn with_config(config: SimConfig, seed: Option<u64>) -> Result<Self> {
        config.validate().context("Invalid simulation config")?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self::new_internal(config, rng))
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn location(&self) -> &LocationConfig {
        &self.location
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Replace every intersection with a freshly generated grid
    fn regenerate_grid(&mut self) {
        let next_id = &mut self.next_id;
        self.intersections = build_grid(&self.config, &mut self.rng, || {
            let id = SimId(*next_id);
            *next_id += 1;
            id
        });

        let t_junctions = self
            .intersections
            .values()
            .filter(|i| i.blocked_direction.is_some())
            .count();
        info!(
            "Generated {}x{} grid for {} ({} T-junctions)",
            self.config.grid_size, self.config.grid_size, self.location.name, t_junctions
        );
    }

    /// Look up an intersection by its grid label
    pub fn intersection_by_name(&self, name: &str) -> Option<&SimIntersection> {
        self.intersections.values().find(|i| i.name == name)
    }

    fn intersection_mut(&mut self, id: IntersectionId) -> Result<&mut SimIntersection> {
        self.intersections
            .get_mut(&id)
            .with_context(|| format!("Intersection {:?} not found", id))
    }

    /// Queue a command for the next tick
    pub fn submit(&mut self, command: ControlCommand) {
        self.pending.push_back(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    /// Apply one command immediately
    pub fn apply_command(&mut self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::SetMode(mode) => {
                if mode != self.mode {
                    info!("Control mode set to {}", mode);
                }
                self.mode = mode;
            }
            ControlCommand::SetManualSignal { intersection, axis } => {
                let node = self.intersection_mut(intersection)?;
                node.set_manual(axis);
                info!("{} held {:?} green", node.name, axis);
            }
            ControlCommand::ReleaseManual(intersection) => {
                let node = self.intersection_mut(intersection)?;
                node.release_manual();
                info!("{} returned to automatic control", node.name);
            }
            ControlCommand::CycleManual(intersection) => {
                let node = self.intersection_mut(intersection)?;
                node.cycle_manual();
                debug!(
                    "{} manual={} green={:?}",
                    node.name,
                    node.manual_override,
                    node.green_axis()
                );
            }
            ControlCommand::Run => self.running = true,
            ControlCommand::Pause => self.running = false,
            ControlCommand::SelectLocation(location) => {
                self.location = location;
                self.regenerate_grid();
            }
            ControlCommand::Spawn(request) => {
                if self.try_spawn_vehicle(request).is_none() {
                    debug!("Spawn request skipped: population cap reached");
                }
            }
        }
        Ok(())
    }

    /// Apply every queued command in order. Bad commands are logged and skipped.
    pub fn apply_pending_commands(&mut self) {
        while let Some(command) = self.pending.pop_front() {
            if let Err(e) = self.apply_command(command) {
                warn!("Ignoring control command: {:#}", e);
            }
        }
    }

    /// Spawn a vehicle at a grid edge unless the population cap is reached
    pub fn try_spawn_vehicle(&mut self, request: SpawnRequest) -> Option<VehicleId> {
        if self.vehicles.len() >= self.config.population_cap {
            return None;
        }
        let id = VehicleId(self.next_sim_id());
        let vehicle = spawn_vehicle(id, request, &self.config, &mut self.rng);
        debug!(
            "Spawned {:?} {} heading {}",
            vehicle.vehicle_type, vehicle.plate_number, vehicle.direction
        );
        self.vehicles.insert(id, vehicle);
        self.stats.vehicles_spawned += 1;
        Some(id)
    }

    /// Place a vehicle at an exact position, ignoring the population cap
    pub fn add_vehicle(
        &mut self,
        vehicle_type: VehicleType,
        position: Position,
        direction: Direction,
        base_speed: f32,
    ) -> VehicleId {
        let id = VehicleId(self.next_sim_id());
        let plate = random_plate(&mut self.rng);
        let vehicle = SimVehicle::new(
            id,
            vehicle_type,
            plate,
            position,
            direction,
            base_speed,
            self.config.lane_offset,
        );
        self.vehicles.insert(id, vehicle);
        self.stats.vehicles_spawned += 1;
        id
    }

    /// Plan every vehicle against the pre-tick snapshot, then commit all at once
    fn update_vehicles(&mut self) {
        let ctx = MotionContext {
            config: &self.config,
            intersections: &self.intersections,
            vehicles: &self.vehicles,
        };
        let rng = &mut self.rng;
        let steps: Vec<VehicleStep> = self
            .vehicles
            .values()
            .map(|vehicle| vehicle.plan_step(&ctx, rng))
            .collect();

        let mut next = BTreeMap::new();
        for step in steps {
            if let Some(cleared) = step.cleared {
                if let Some(intersection) = self.intersections.get_mut(&cleared) {
                    intersection.throughput += 1;
                }
                self.stats.total_throughput += 1;
            }
            next.insert(step.vehicle.id, step.vehicle);
        }
        self.vehicles = next;
    }

    /// Maybe spawn one vehicle, then drop the ones that left the plane
    fn spawn_and_cull(&mut self) {
        if self.vehicles.len() < self.config.population_cap
            && self.rng.random_bool(self.config.spawn_probability)
        {
            self.try_spawn_vehicle(SpawnRequest::default());
        }

        let config = &self.config;
        let before = self.vehicles.len();
        self.vehicles.retain(|_, v| !v.is_out_of_bounds(config));
        let removed = before - self.vehicles.len();
        if removed > 0 {
            debug!("Removed {} vehicles that left the plane", removed);
            self.stats.vehicles_removed += removed as u64;
        }
    }

    /// Main simulation tick
    pub fn tick(&mut self) {
        self.apply_pending_commands();
        if !self.running {
            return;
        }

        SignalController::new(&self.config).update(
            self.mode,
            self.elapsed_ms,
            &mut self.intersections,
            &self.vehicles,
        );
        self.update_vehicles();
        self.spawn_and_cull();

        self.tick_count += 1;
        self.elapsed_ms += self.config.tick_interval_ms;

        self.stats
            .refresh(self.vehicles.values(), self.config.tick_interval_ms);
        if self.tick_count % self.config.history_interval_ticks == 0 {
            self.stats
                .record_sample(self.elapsed_ms, self.config.history_len);
        }
    }

    /// State handed to a renderer
    pub fn render_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            elapsed_ms: self.elapsed_ms,
            mode: self.mode,
            intersections: self.intersections.values().cloned().collect(),
            vehicles: self.vehicles.values().cloned().collect(),
        }
    }

    /// State handed to an insight service
    pub fn insight_snapshot(&self) -> InsightSnapshot {
        InsightSnapshot {
            active_vehicle_count: self.vehicles.len(),
            congestion_level: self.stats.congestion_level,
            throughput: self.stats.total_throughput,
            intersections: self
                .intersections
                .values()
                .map(IntersectionSummary::from)
                .collect(),
            location: self.location.clone(),
        }
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Traffic Signal Summary ===");
        println!(
            "Location: {} | Mode: {} | {}",
            self.location.name,
            self.mode,
            if self.running { "running" } else { "paused" }
        );
        println!(
            "Time: {:.2}s (tick {})",
            self.elapsed_ms as f32 / 1000.0,
            self.tick_count
        );
        println!("{}", self.stats.summary());
        println!();

        println!("--- Intersections ---");
        for node in self.intersections.values() {
            let q = node.queue_lengths;
            println!(
                "  {} {:<12} N:{:?} S:{:?} E:{:?} W:{:?} queues={}/{}/{}/{} through={}{}",
                node.name,
                match node.blocked_direction {
                    Some(dir) => format!("T(no {})", dir),
                    None => "cross".to_string(),
                },
                node.signals.north,
                node.signals.south,
                node.signals.east,
                node.signals.west,
                q.north,
                q.south,
                q.east,
                q.west,
                node.throughput,
                if node.manual_override { " [manual]" } else { "" }
            );
        }
    }

    /// Draw a visual map of the world in the terminal
    pub fn draw_map(&self) {
        const SCALE: f32 = 1.0 / 20.0;
        let width = (self.config.width * SCALE).ceil() as usize + 1;
        let height = (self.config.height * SCALE).ceil() as usize + 1;
        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |pos: &Position| -> Option<(usize, usize)> {
            let col = (pos.x * SCALE).round();
            let row = (pos.y * SCALE).round();
            if col < 0.0 || row < 0.0 || col as usize >= width || row as usize >= height {
                return None;
            }
            Some((row as usize, col as usize))
        };

        // Roads
        for node in self.intersections.values() {
            if let Some((row, col)) = to_grid(&node.position) {
                for c in 0..width {
                    if grid[row][c] == ' ' {
                        grid[row][c] = '-';
                    }
                }
                for line in grid.iter_mut() {
                    if line[col] == ' ' {
                        line[col] = '|';
                    }
                }
            }
        }

        // Intersections, by which axis may go
        for node in self.intersections.values() {
            if let Some((row, col)) = to_grid(&node.position) {
                grid[row][col] = match node.green_axis() {
                    Some(Axis::Vertical) => 'V',
                    Some(Axis::Horizontal) => 'H',
                    None if node
                        .signals
                        .iter()
                        .any(|(_, s)| s == SignalState::Yellow) =>
                    {
                        'Y'
                    }
                    None => 'X',
                };
            }
        }

        // Vehicles
        for vehicle in self.vehicles.values() {
            if let Some((row, col)) = to_grid(&vehicle.position) {
                if matches!(grid[row][col], ' ' | '-' | '|') {
                    grid[row][col] = vehicle.vehicle_type.glyph();
                }
            }
        }

        println!("\n=== Grid Map ===");
        println!("Legend: V/H=vertical/horizontal green, Y=yellow, c=car b=bike a=auto B=bus E=ambulance P=police");
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}
