//! Running statistics for the traffic simulation

use serde::Serialize;
use std::collections::VecDeque;

use super::types::MovementState;
use super::vehicle::SimVehicle;

/// One point of the statistics history
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSample {
    pub elapsed_ms: u64,
    pub throughput: u64,
    pub average_wait_time: f32,
}

/// Aggregate statistics, refreshed at the end of every tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationStats {
    /// Mean seconds spent waiting by the active vehicles
    pub average_wait_time: f32,
    /// Intersection clearances since the start of the run
    pub total_throughput: u64,
    pub active_vehicles: usize,
    /// Fraction of active vehicles currently waiting
    pub congestion_level: f32,
    pub vehicles_spawned: u64,
    pub vehicles_removed: u64,
    pub history: VecDeque<StatsSample>,
}

impl SimulationStats {
    /// Recompute the per-tick figures from the committed vehicle set
    pub fn refresh<'a>(
        &mut self,
        vehicles: impl ExactSizeIterator<Item = &'a SimVehicle>,
        tick_interval_ms: u64,
    ) {
        let active = vehicles.len();
        let mut waiting = 0usize;
        let mut waiting_ticks = 0u64;
        for vehicle in vehicles {
            if vehicle.movement_state == MovementState::Waiting {
                waiting += 1;
            }
            waiting_ticks += vehicle.waiting_ticks;
        }

        self.active_vehicles = active;
        self.congestion_level = waiting as f32 / active.max(1) as f32;
        self.average_wait_time = if active == 0 {
            0.0
        } else {
            (waiting_ticks as f64 * tick_interval_ms as f64 / 1000.0 / active as f64) as f32
        };
    }

    /// Append a history sample, dropping the oldest beyond `max_len`
    pub fn record_sample(&mut self, elapsed_ms: u64, max_len: usize) {
        self.history.push_back(StatsSample {
            elapsed_ms,
            throughput: self.total_throughput,
            average_wait_time: self.average_wait_time,
        });
        while self.history.len() > max_len {
            self.history.pop_front();
        }
    }

    /// Fraction of spawned vehicles that have already left the plane
    pub fn completion_rate(&self) -> f32 {
        if self.vehicles_spawned == 0 {
            0.0
        } else {
            self.vehicles_removed as f32 / self.vehicles_spawned as f32
        }
    }

    /// Get a summary string for display
    pub fn summary(&self) -> String {
        format!(
            "Vehicles: {} | Congestion: {:.1}% | Throughput: {} | Avg wait: {:.1}s",
            self.active_vehicles,
            self.congestion_level * 100.0,
            self.total_throughput,
            self.average_wait_time
        )
    }
}
