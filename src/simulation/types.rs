//! Core types for the traffic simulation
//!
//! Plain data shared by every component. Coordinates follow the canvas
//! convention: x grows to the east and y grows to the south.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimId(pub usize);

/// A wrapper type for intersection IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntersectionId(pub SimId);

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub SimId);

/// A 2D position on the simulation plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance from `self` to `target` measured along `heading`.
    /// Positive when the target lies ahead.
    pub fn forward_distance_to(&self, target: &Position, heading: Direction) -> f32 {
        match heading {
            Direction::North => self.y - target.y,
            Direction::South => target.y - self.y,
            Direction::East => target.x - self.x,
            Direction::West => self.x - target.x,
        }
    }

    /// Absolute offset between the two points across `heading`
    pub fn lateral_distance_to(&self, target: &Position, heading: Direction) -> f32 {
        match heading.axis() {
            Axis::Vertical => (self.x - target.x).abs(),
            Axis::Horizontal => (self.y - target.y).abs(),
        }
    }

    /// Move `distance` units along `heading`
    pub fn advanced(&self, heading: Direction, distance: f32) -> Position {
        let (dx, dy) = heading.unit();
        Position::new(self.x + dx * distance, self.y + dy * distance)
    }

    /// Centre of the lane used by traffic heading `heading` through `self`.
    /// Traffic keeps left.
    pub fn lane_centre(&self, heading: Direction, lane_offset: f32) -> Position {
        match heading {
            Direction::North => Position::new(self.x - lane_offset, self.y),
            Direction::South => Position::new(self.x + lane_offset, self.y),
            Direction::East => Position::new(self.x, self.y - lane_offset),
            Direction::West => Position::new(self.x, self.y + lane_offset),
        }
    }
}

/// One of the four cardinal directions.
///
/// Used both for a vehicle heading and for the side of an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::Vertical,
            Direction::East | Direction::West => Axis::Horizontal,
        }
    }

    /// Unit step in canvas coordinates
    pub fn unit(self) -> (f32, f32) {
        match self {
            Direction::North => (0.0, -1.0),
            Direction::South => (0.0, 1.0),
            Direction::East => (1.0, 0.0),
            Direction::West => (-1.0, 0.0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// A pair of opposing directions that always share a signal colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// North and south
    Vertical,
    /// East and west
    Horizontal,
}

impl Axis {
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Axis::Vertical => [Direction::North, Direction::South],
            Axis::Horizontal => [Direction::East, Direction::West],
        }
    }

    pub fn other(self) -> Axis {
        match self {
            Axis::Vertical => Axis::Horizontal,
            Axis::Horizontal => Axis::Vertical,
        }
    }
}

/// Colour shown by one signal head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Green,
    Yellow,
    Red,
}

/// A value for each of the four directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionMap<T> {
    pub north: T,
    pub south: T,
    pub east: T,
    pub west: T,
}

impl<T: Copy> DirectionMap<T> {
    pub fn splat(value: T) -> Self {
        Self {
            north: value,
            south: value,
            east: value,
            west: value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, T)> + '_ {
        Direction::ALL.into_iter().map(move |dir| (dir, self[dir]))
    }
}

impl<T> Index<Direction> for DirectionMap<T> {
    type Output = T;

    fn index(&self, dir: Direction) -> &T {
        match dir {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
        }
    }
}

impl<T> IndexMut<Direction> for DirectionMap<T> {
    fn index_mut(&mut self, dir: Direction) -> &mut T {
        match dir {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
            Direction::East => &mut self.east,
            Direction::West => &mut self.west,
        }
    }
}

/// Signal colour for every approach of an intersection
pub type Signals = DirectionMap<SignalState>;

/// Queued vehicle count for every approach of an intersection
pub type QueueLengths = DirectionMap<u32>;

impl Signals {
    /// Vertical pair shows `vertical`, horizontal pair shows `horizontal`
    pub fn by_axis(vertical: SignalState, horizontal: SignalState) -> Self {
        Self {
            north: vertical,
            south: vertical,
            east: horizontal,
            west: horizontal,
        }
    }

    /// `axis` green, the other axis red
    pub fn axis_green(axis: Axis) -> Self {
        match axis {
            Axis::Vertical => Self::by_axis(SignalState::Green, SignalState::Red),
            Axis::Horizontal => Self::by_axis(SignalState::Red, SignalState::Green),
        }
    }

    /// Force the signal on the missing approach of a T-junction to red
    pub fn with_blocked(mut self, blocked: Option<Direction>) -> Self {
        if let Some(dir) = blocked {
            self[dir] = SignalState::Red;
        }
        self
    }
}

impl QueueLengths {
    pub fn axis_total(&self, axis: Axis) -> u32 {
        axis.directions().iter().map(|dir| self[*dir]).sum()
    }
}

/// Type of vehicle in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Bike,
    Auto,
    Bus,
    Ambulance,
    Police,
}

impl VehicleType {
    /// Weighted pool used for random spawns. Emergency vehicles only
    /// enter through explicit spawn requests.
    pub const SPAWN_POOL: [VehicleType; 6] = [
        VehicleType::Car,
        VehicleType::Car,
        VehicleType::Bike,
        VehicleType::Bike,
        VehicleType::Auto,
        VehicleType::Bus,
    ];

    /// Free-flow cruising speed range in units per tick
    pub fn speed_range(self) -> (f32, f32) {
        match self {
            VehicleType::Bike => (4.0, 5.5),
            VehicleType::Car => (3.2, 4.5),
            VehicleType::Auto => (2.5, 3.8),
            VehicleType::Bus => (1.8, 2.8),
            VehicleType::Ambulance => (5.5, 7.0),
            VehicleType::Police => (6.0, 7.5),
        }
    }

    /// Single character used by the terminal map
    pub fn glyph(self) -> char {
        match self {
            VehicleType::Car => 'c',
            VehicleType::Bike => 'b',
            VehicleType::Auto => 'a',
            VehicleType::Bus => 'B',
            VehicleType::Ambulance => 'E',
            VehicleType::Police => 'P',
        }
    }
}

/// What a vehicle is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementState {
    Moving,
    /// Braking for, or held at, a stop line
    Waiting,
    /// Inert: skipped by the motion engine
    Crashed,
}

/// Physical layout of an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JunctionType {
    Cross,
    TJunction,
}
