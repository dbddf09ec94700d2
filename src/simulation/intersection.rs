//! Intersection state for the traffic simulation

use serde::Serialize;

use super::types::{
    Axis, Direction, IntersectionId, JunctionType, Position, QueueLengths, SignalState, Signals,
};

/// Cosmetic street names shown for the two roads crossing here
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoadNames {
    pub horizontal: String,
    pub vertical: String,
}

/// An intersection in the traffic simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimIntersection {
    pub id: IntersectionId,
    /// Grid label, `NODE_<row><col>`
    pub name: String,
    pub position: Position,
    pub junction_type: JunctionType,
    /// The approach with no road. Only set for T-junctions.
    pub blocked_direction: Option<Direction>,
    pub signals: Signals,
    /// Vehicles waiting on each approach as of the last tick
    pub queue_lengths: QueueLengths,
    /// Vehicles that have cleared this intersection
    pub throughput: u64,
    /// While set, the signal controller leaves this intersection alone
    pub manual_override: bool,
    pub road_names: RoadNames,
}

impl SimIntersection {
    pub fn new(
        id: IntersectionId,
        name: String,
        position: Position,
        blocked_direction: Option<Direction>,
        road_names: RoadNames,
    ) -> Self {
        let junction_type = if blocked_direction.is_some() {
            JunctionType::TJunction
        } else {
            JunctionType::Cross
        };

        Self {
            id,
            name,
            position,
            junction_type,
            blocked_direction,
            signals: Signals::axis_green(Axis::Horizontal).with_blocked(blocked_direction),
            queue_lengths: QueueLengths::default(),
            throughput: 0,
            manual_override: false,
            road_names,
        }
    }

    /// Put the intersection under operator control with `axis` green
    pub fn set_manual(&mut self, axis: Axis) {
        self.manual_override = true;
        self.signals = Signals::axis_green(axis).with_blocked(self.blocked_direction);
    }

    /// Hand the intersection back to the signal controller
    pub fn release_manual(&mut self) {
        self.manual_override = false;
    }

    /// Step through the operator click cycle:
    /// automatic -> vertical -> horizontal -> automatic
    pub fn cycle_manual(&mut self) {
        if !self.manual_override {
            self.set_manual(Axis::Vertical);
        } else if self.green_axis() == Some(Axis::Vertical) {
            self.set_manual(Axis::Horizontal);
        } else {
            self.release_manual();
        }
    }

    /// The axis currently showing green on at least one head, if any
    pub fn green_axis(&self) -> Option<Axis> {
        [Axis::Vertical, Axis::Horizontal].into_iter().find(|axis| {
            axis.directions()
                .iter()
                .any(|dir| self.signals[*dir] == SignalState::Green)
        })
    }

    pub fn signal_for(&self, heading: Direction) -> SignalState {
        self.signals[heading]
    }

    /// Commit the signal controller's result for this tick
    pub fn apply_phase(&mut self, signals: Signals, queue_lengths: QueueLengths) {
        self.signals = signals;
        self.queue_lengths = queue_lengths;
    }
}
