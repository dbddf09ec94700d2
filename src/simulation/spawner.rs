//! Vehicle spawning
//!
//! Vehicles enter just off-canvas on one of the four edges, in the lane
//! of a randomly chosen grid row or column, heading inward.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;

use super::config::SimConfig;
use super::types::{Direction, Position, VehicleId, VehicleType};
use super::vehicle::SimVehicle;

/// Optional constraints on a spawned vehicle. Unset fields are random.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SpawnRequest {
    pub vehicle_type: Option<VehicleType>,
    /// Edge of the plane the vehicle enters from
    pub side: Option<Direction>,
    /// Grid row (east/west edges) or column (north/south edges)
    pub lane_index: Option<usize>,
}

/// Random plate in the `TN-<district><series>-<number>` format
pub fn random_plate<R: Rng>(rng: &mut R) -> String {
    let district: u32 = rng.random_range(10..=98);
    let series = char::from(b'A' + rng.random_range(0..25u8));
    let number: u32 = rng.random_range(1000..=9998);
    format!("TN-{}{}-{}", district, series, number)
}

/// Entry point for a vehicle coming in from `side` along grid line `index`
pub fn edge_position(side: Direction, index: usize, config: &SimConfig) -> Position {
    let (spacing_x, spacing_y) = config.grid_spacing();
    let line_x = spacing_x * (index + 1) as f32;
    let line_y = spacing_y * (index + 1) as f32;
    let heading = side.opposite();

    let road_point = match side {
        Direction::North => Position::new(line_x, -config.spawn_offset),
        Direction::South => Position::new(line_x, config.height + config.spawn_offset),
        Direction::West => Position::new(-config.spawn_offset, line_y),
        Direction::East => Position::new(config.width + config.spawn_offset, line_y),
    };
    road_point.lane_centre(heading, config.lane_offset)
}

/// Build a new vehicle at a grid edge
pub fn spawn_vehicle<R: Rng>(
    id: VehicleId,
    request: SpawnRequest,
    config: &SimConfig,
    rng: &mut R,
) -> SimVehicle {
    let side = request
        .side
        .unwrap_or_else(|| *Direction::ALL.choose(rng).unwrap_or(&Direction::North));
    let index = request
        .lane_index
        .map(|i| i.min(config.grid_size.saturating_sub(1)))
        .unwrap_or_else(|| rng.random_range(0..config.grid_size.max(1)));
    let vehicle_type = request.vehicle_type.unwrap_or_else(|| {
        *VehicleType::SPAWN_POOL
            .choose(rng)
            .unwrap_or(&VehicleType::Car)
    });

    let (min_speed, max_speed) = vehicle_type.speed_range();
    let base_speed = rng.random_range(min_speed..max_speed);
    let plate_number = random_plate(rng);

    SimVehicle::new(
        id,
        vehicle_type,
        plate_number,
        edge_position(side, index, config),
        side.opposite(),
        base_speed,
        config.lane_offset,
    )
}
