//! Grid construction
//!
//! Lays out an N x N grid of intersections over the plane. Each one is
//! independently a cross or a T-junction with a random missing approach.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::SimConfig;
use super::intersection::{RoadNames, SimIntersection};
use super::types::{Direction, IntersectionId, Position, SimId};

/// Cosmetic street names; never consulted by simulation logic
pub const ROAD_NAMES_POOL: [&str; 17] = [
    "Anna Salai",
    "Mount Road",
    "GST Road",
    "OMR",
    "ECR",
    "Avinashi Road",
    "Race Course",
    "Vanjimalai",
    "Perur Main Road",
    "Netaji Road",
    "Kamrajar Salai",
    "Goripalayam Jct",
    "Theni Road",
    "Chatram Road",
    "Tanjore Road",
    "Karur Bypass",
    "Woraiyur",
];

/// A place the grid is modelled on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub description: String,
}

impl LocationConfig {
    pub fn new(name: &str, lat: f64, lng: f64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lng,
            description: description.to_string(),
        }
    }

    /// Built-in locations
    pub fn presets() -> Vec<LocationConfig> {
        vec![
            LocationConfig::new(
                "Chennai (Anna Salai)",
                13.0405,
                80.2337,
                "Major arterial road with extreme bus and corporate traffic.",
            ),
            LocationConfig::new(
                "Coimbatore (Gandhipuram)",
                11.0168,
                76.9558,
                "High shopping hub density with massive two-wheeler volume.",
            ),
            LocationConfig::new(
                "Madurai (Goripalayam)",
                9.9252,
                78.1198,
                "Dense temple city junctions with high pedestrian and auto-rickshaw flow.",
            ),
            LocationConfig::new(
                "Trichy (Chatram)",
                10.8214,
                78.6923,
                "Strategic river crossing bridge with mixed interstate heavy transit.",
            ),
        ]
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self::presets().swap_remove(0)
    }
}

fn random_road_name<R: Rng>(rng: &mut R) -> String {
    ROAD_NAMES_POOL
        .choose(rng)
        .copied()
        .unwrap_or("Unnamed Road")
        .to_string()
}

/// Build a fresh grid. Ids are drawn from `next_id` in row-major order.
pub fn build_grid<R: Rng>(
    config: &SimConfig,
    rng: &mut R,
    mut next_id: impl FnMut() -> SimId,
) -> BTreeMap<IntersectionId, SimIntersection> {
    let (spacing_x, spacing_y) = config.grid_spacing();
    let mut intersections = BTreeMap::new();

    for row in 0..config.grid_size {
        for col in 0..config.grid_size {
            let blocked = if rng.random_bool(config.t_junction_probability) {
                Direction::ALL.choose(rng).copied()
            } else {
                None
            };

            let road_names = RoadNames {
                horizontal: random_road_name(rng),
                vertical: random_road_name(rng),
            };

            let id = IntersectionId(next_id());
            let position = Position::new(spacing_x * (col + 1) as f32, spacing_y * (row + 1) as f32);
            let intersection = SimIntersection::new(
                id,
                format!("NODE_{}{}", row, col),
                position,
                blocked,
                road_names,
            );
            intersections.insert(id, intersection);
        }
    }

    intersections
}
