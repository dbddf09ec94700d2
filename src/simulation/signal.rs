//! Signal controller
//!
//! Every tick each intersection not under manual override gets fresh
//! queue counts and a fresh signal phase. All intersections read the same
//! pre-tick vehicle snapshot and results are committed together.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::config::SimConfig;
use super::intersection::SimIntersection;
use super::types::{
    Axis, Direction, IntersectionId, QueueLengths, SignalState, Signals, VehicleId,
};
use super::vehicle::SimVehicle;

/// How non-overridden intersections pick their phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Fixed-time rotation
    Static,
    /// Queue-driven preemption over the fixed-time rotation
    Adaptive,
    /// Signals only change on operator command
    Manual,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlMode::Static => "Static (Fixed Time)",
            ControlMode::Adaptive => "Adaptive",
            ControlMode::Manual => "Manual Override",
        };
        f.write_str(name)
    }
}

/// Fixed-time phase at simulation time `now_ms`.
///
/// Every intersection sharing a clock is in the same phase.
pub fn fixed_time_phase(now_ms: u64, cycle_ms: u64) -> Signals {
    let fraction = (now_ms % cycle_ms) as f64 / cycle_ms as f64;
    use SignalState::*;
    if fraction < 0.45 {
        Signals::by_axis(Red, Green)
    } else if fraction < 0.5 {
        Signals::by_axis(Red, Yellow)
    } else if fraction < 0.95 {
        Signals::by_axis(Green, Red)
    } else {
        Signals::by_axis(Yellow, Red)
    }
}

/// The axis whose queue beats the other by more than `margin`, if any
pub fn congested_axis(queues: &QueueLengths, margin: u32) -> Option<Axis> {
    let vertical = queues.axis_total(Axis::Vertical);
    let horizontal = queues.axis_total(Axis::Horizontal);
    if vertical > horizontal + margin {
        Some(Axis::Vertical)
    } else if horizontal > vertical + margin {
        Some(Axis::Horizontal)
    } else {
        None
    }
}

/// Axis-paired phase for `mode`, before the blocked-direction override.
/// Returns `None` in manual mode, where signals are left as they are.
pub fn select_phase(
    mode: ControlMode,
    queues: &QueueLengths,
    now_ms: u64,
    config: &SimConfig,
) -> Option<Signals> {
    match mode {
        ControlMode::Manual => None,
        ControlMode::Static => Some(fixed_time_phase(now_ms, config.cycle_ms)),
        // Preemption skips yellow and has no hysteresis
        ControlMode::Adaptive => Some(match congested_axis(queues, config.adaptive_margin) {
            Some(axis) => Signals::axis_green(axis),
            None => fixed_time_phase(now_ms, config.cycle_ms),
        }),
    }
}

/// Count vehicles inside the detection band of each approach.
///
/// The band for side `S` starts at the stop line and extends
/// `detection_window` units away from the centre; only vehicles heading
/// toward the intersection from `S` are counted.
pub fn count_queues<'a>(
    intersection: &SimIntersection,
    vehicles: impl IntoIterator<Item = &'a SimVehicle>,
    config: &SimConfig,
) -> QueueLengths {
    let near = config.stop_line_distance;
    let far = config.stop_line_distance + config.detection_window;
    let mut queues = QueueLengths::default();

    for vehicle in vehicles {
        let side = vehicle.direction.opposite();
        let distance = vehicle
            .position
            .forward_distance_to(&intersection.position, vehicle.direction);
        if distance > near && distance < far {
            queues[side] += 1;
        }
    }

    queues
}

/// Recomputes queues and signals for every automatic intersection
pub struct SignalController<'a> {
    config: &'a SimConfig,
}

impl<'a> SignalController<'a> {
    pub fn new(config: &'a SimConfig) -> Self {
        Self { config }
    }

    /// Queues and signals for a single intersection.
    /// `None` when the intersection is skipped this tick.
    pub fn evaluate<'v>(
        &self,
        intersection: &SimIntersection,
        mode: ControlMode,
        now_ms: u64,
        vehicles: impl IntoIterator<Item = &'v SimVehicle>,
    ) -> Option<(Signals, QueueLengths)> {
        if intersection.manual_override || mode == ControlMode::Manual {
            return None;
        }
        let queues = count_queues(intersection, vehicles, self.config);
        let signals = select_phase(mode, &queues, now_ms, self.config)?;
        Some((signals.with_blocked(intersection.blocked_direction), queues))
    }

    /// Evaluate every intersection against the same vehicle snapshot, then commit
    pub fn update(
        &self,
        mode: ControlMode,
        now_ms: u64,
        intersections: &mut BTreeMap<IntersectionId, SimIntersection>,
        vehicles: &BTreeMap<VehicleId, SimVehicle>,
    ) {
        let results: Vec<(IntersectionId, Signals, QueueLengths)> = intersections
            .values()
            .filter_map(|intersection| {
                self.evaluate(intersection, mode, now_ms, vehicles.values())
                    .map(|(signals, queues)| (intersection.id, signals, queues))
            })
            .collect();

        for (id, signals, queues) in results {
            if let Some(intersection) = intersections.get_mut(&id) {
                intersection.apply_phase(signals, queues);
            }
        }
    }
}

/// True when the vertical and horizontal pairs each share one colour and
/// exactly one of them is not red, ignoring `blocked`.
pub fn is_axis_paired(signals: &Signals, blocked: Option<Direction>) -> bool {
    let colour = |axis: Axis| -> Option<SignalState> {
        let mut heads = axis
            .directions()
            .into_iter()
            .filter(|dir| Some(*dir) != blocked)
            .map(|dir| signals[dir]);
        let first = heads.next()?;
        heads.all(|c| c == first).then_some(first)
    };

    let vertical = colour(Axis::Vertical);
    let horizontal = colour(Axis::Horizontal);
    let blocked_red = blocked.is_none_or(|dir| signals[dir] == SignalState::Red);

    match (vertical, horizontal) {
        (Some(v), Some(h)) => blocked_red && ((v == SignalState::Red) != (h == SignalState::Red)),
        _ => false,
    }
}
