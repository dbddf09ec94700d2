//! Vehicle movement logic for the traffic simulation
//!
//! Each tick a vehicle resolves a target speed from the signal ahead,
//! possibly turns, yields to the vehicle in front of it and then
//! integrates speed and position. Every vehicle plans against the same
//! pre-tick snapshot; the orchestrator commits all plans at once.

use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

use super::config::SimConfig;
use super::intersection::SimIntersection;
use super::types::{
    Direction, IntersectionId, MovementState, Position, SignalState, VehicleId, VehicleType,
};

/// A vehicle in the traffic simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub vehicle_type: VehicleType,
    pub plate_number: String,
    pub position: Position,
    /// Current heading
    pub direction: Direction,
    pub speed: f32,
    /// Free-flow cruising speed, fixed at spawn
    pub base_speed: f32,
    /// Perpendicular offset of the lane from the road centre line
    pub lane_offset: f32,
    pub movement_state: MovementState,
    /// Where the last turn decision was taken
    pub last_intersection_id: Option<IntersectionId>,
    /// Ticks spent in [`MovementState::Waiting`]
    pub waiting_ticks: u64,
}

/// Result of planning one tick for a vehicle
#[derive(Debug, Clone)]
pub struct VehicleStep {
    pub vehicle: SimVehicle,
    /// Intersection crossed or turned at during this tick
    pub cleared: Option<IntersectionId>,
}

/// Read-only view of the world used while planning a tick
pub struct MotionContext<'a> {
    pub config: &'a SimConfig,
    pub intersections: &'a BTreeMap<IntersectionId, SimIntersection>,
    pub vehicles: &'a BTreeMap<VehicleId, SimVehicle>,
}

/// The intersection a vehicle is heading into and how far away its centre is
#[derive(Debug, Clone, Copy)]
pub struct Approach<'a> {
    pub intersection: &'a SimIntersection,
    pub distance: f32,
}

/// Closest intersection strictly ahead of `position` along `heading`
/// within the lateral tolerance. Junctions whose missing approach equals
/// the heading are transparent.
pub fn find_approach<'a>(
    position: &Position,
    heading: Direction,
    intersections: impl IntoIterator<Item = &'a SimIntersection>,
    lateral_tolerance: f32,
) -> Option<Approach<'a>> {
    intersections
        .into_iter()
        .filter(|int| int.blocked_direction != Some(heading))
        .filter(|int| position.lateral_distance_to(&int.position, heading) < lateral_tolerance)
        .map(|int| Approach {
            intersection: int,
            distance: position.forward_distance_to(&int.position, heading),
        })
        .filter(|approach| approach.distance > 0.0)
        .min_by_key(|approach| OrderedFloat(approach.distance))
}

/// Target speed and state imposed by a signal `distance` units ahead
pub fn stop_line_target(
    signal: SignalState,
    distance: f32,
    base_speed: f32,
    config: &SimConfig,
) -> (f32, MovementState) {
    if signal == SignalState::Green || distance < config.stop_line_distance {
        // Green, or already over the line and committed to crossing
        return (base_speed, MovementState::Moving);
    }

    let gap = distance - config.stop_line_distance;
    if gap < config.hard_stop_gap {
        (0.0, MovementState::Waiting)
    } else if gap < config.brake_band {
        (base_speed * gap / config.brake_band, MovementState::Waiting)
    } else {
        (base_speed * config.cautious_factor, MovementState::Moving)
    }
}

/// Exits a vehicle heading `heading` may take: no U-turns and no turning
/// into the missing approach.
pub fn permitted_exits(heading: Direction, blocked: Option<Direction>) -> Vec<Direction> {
    Direction::ALL
        .into_iter()
        .filter(|dir| *dir != heading.opposite() && Some(*dir) != blocked)
        .collect()
}

/// Pick the exit heading. Keeps `heading` when nothing is permitted.
pub fn choose_exit<R: Rng>(
    heading: Direction,
    blocked: Option<Direction>,
    straight_probability: f64,
    rng: &mut R,
) -> Direction {
    let exits = permitted_exits(heading, blocked);
    if exits.is_empty() {
        return heading;
    }
    let roll: f64 = rng.random();
    if exits.contains(&heading) && roll < straight_probability {
        return heading;
    }
    exits.choose(rng).copied().unwrap_or(heading)
}

/// Speed after one tick of accelerating or braking toward `target`
pub fn approach_speed(speed: f32, target: f32, acceleration: f32, deceleration: f32) -> f32 {
    if speed < target {
        (speed + acceleration).min(target)
    } else if speed > target {
        (speed - deceleration).max(target)
    } else {
        speed
    }
}

/// Cap `target` so a follower does not close on a leader moving at `leader_speed`
pub fn follow_target(target: f32, leader_speed: f32, config: &SimConfig) -> f32 {
    let capped = target.min(leader_speed * config.follow_factor);
    if capped < config.follow_stop_threshold {
        0.0
    } else {
        capped
    }
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        vehicle_type: VehicleType,
        plate_number: String,
        position: Position,
        direction: Direction,
        base_speed: f32,
        lane_offset: f32,
    ) -> Self {
        Self {
            id,
            vehicle_type,
            plate_number,
            position,
            direction,
            speed: 0.0,
            base_speed,
            lane_offset,
            movement_state: MovementState::Moving,
            last_intersection_id: None,
            waiting_ticks: 0,
        }
    }

    pub fn is_crashed(&self) -> bool {
        self.movement_state == MovementState::Crashed
    }

    /// Whether `other` travels in the same lane of the same road
    pub fn shares_lane_with(&self, other: &SimVehicle, tolerance: f32) -> bool {
        other.direction == self.direction
            && (other.lane_offset - self.lane_offset).abs() <= tolerance
            && self.position.lateral_distance_to(&other.position, self.direction) <= tolerance
    }

    /// Closest vehicle ahead in the same lane within `safe_gap`
    pub fn find_leader<'a>(
        &self,
        vehicles: impl IntoIterator<Item = &'a SimVehicle>,
        config: &SimConfig,
    ) -> Option<&'a SimVehicle> {
        vehicles
            .into_iter()
            .filter(|other| other.id != self.id)
            .filter(|other| self.shares_lane_with(other, config.lane_tolerance))
            .map(|other| {
                let gap = self.position.forward_distance_to(&other.position, self.direction);
                (other, gap)
            })
            .filter(|(_, gap)| *gap > 0.0 && *gap < config.safe_gap)
            .min_by_key(|(_, gap)| OrderedFloat(*gap))
            .map(|(other, _)| other)
    }

    /// Plan this vehicle's next state from the pre-tick snapshot.
    ///
    /// Crashed vehicles are returned unchanged.
    pub fn plan_step<R: Rng>(&self, ctx: &MotionContext<'_>, rng: &mut R) -> VehicleStep {
        let mut next = self.clone();
        if self.is_crashed() {
            return VehicleStep {
                vehicle: next,
                cleared: None,
            };
        }

        let config = ctx.config;
        let mut target = self.base_speed;
        let mut state = MovementState::Moving;
        let mut cleared = None;
        let mut crossing: Option<Approach<'_>> = None;

        if let Some(approach) = find_approach(
            &self.position,
            self.direction,
            ctx.intersections.values(),
            config.lookup_tolerance,
        ) {
            let intersection = approach.intersection;
            (target, state) = stop_line_target(
                intersection.signal_for(self.direction),
                approach.distance,
                self.base_speed,
                config,
            );
            crossing = Some(approach);

            if approach.distance < config.turn_threshold
                && self.last_intersection_id != Some(intersection.id)
            {
                let exit = choose_exit(
                    self.direction,
                    intersection.blocked_direction,
                    config.straight_probability,
                    rng,
                );
                next.last_intersection_id = Some(intersection.id);
                if exit != self.direction {
                    next.direction = exit;
                    next.position = intersection.position.lane_centre(exit, config.lane_offset);
                    cleared = Some(intersection.id);
                    crossing = None;
                }
            }
        }

        if let Some(leader) = next.find_leader(ctx.vehicles.values(), config) {
            target = follow_target(target, leader.speed, config);
        }

        let target = target.clamp(0.0, self.base_speed);
        next.speed = approach_speed(self.speed, target, config.acceleration, config.deceleration)
            .clamp(0.0, self.base_speed);
        next.movement_state = state;
        if state == MovementState::Waiting {
            next.waiting_ticks += 1;
        }

        if next.speed > config.movement_threshold {
            next.position = next.position.advanced(next.direction, next.speed);
            if let Some(approach) = crossing {
                if next.speed >= approach.distance {
                    cleared = Some(approach.intersection.id);
                }
            }
        }

        VehicleStep {
            vehicle: next,
            cleared,
        }
    }

    /// Whether the vehicle has left the plane by more than `margin`
    pub fn is_out_of_bounds(&self, config: &SimConfig) -> bool {
        let margin = config.cull_margin;
        self.position.x < -margin
            || self.position.x > config.width + margin
            || self.position.y < -margin
            || self.position.y > config.height + margin
    }
}
