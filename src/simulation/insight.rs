//! Advisory traffic insights
//!
//! The simulation hands a stats snapshot to an [`InsightService`] on a
//! background thread and polls for the answer. Nothing here feeds back
//! into simulation state, and a failed request only means there is no
//! insight to show.

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use super::grid::LocationConfig;
use super::intersection::SimIntersection;
use super::types::{Direction, IntersectionId, JunctionType, QueueLengths, Signals};

/// Per-intersection view included in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct IntersectionSummary {
    pub id: IntersectionId,
    pub name: String,
    pub junction_type: JunctionType,
    pub blocked_direction: Option<Direction>,
    pub signals: Signals,
    pub queue_lengths: QueueLengths,
    pub throughput: u64,
    pub manual_override: bool,
}

impl From<&SimIntersection> for IntersectionSummary {
    fn from(intersection: &SimIntersection) -> Self {
        Self {
            id: intersection.id,
            name: intersection.name.clone(),
            junction_type: intersection.junction_type,
            blocked_direction: intersection.blocked_direction,
            signals: intersection.signals,
            queue_lengths: intersection.queue_lengths,
            throughput: intersection.throughput,
            manual_override: intersection.manual_override,
        }
    }
}

impl IntersectionSummary {
    pub fn total_queue(&self) -> u32 {
        self.queue_lengths.iter().map(|(_, n)| n).sum()
    }
}

/// Everything an insight service gets to see
#[derive(Debug, Clone, Serialize)]
pub struct InsightSnapshot {
    pub active_vehicle_count: usize,
    /// Fraction of vehicles waiting
    pub congestion_level: f32,
    pub throughput: u64,
    pub intersections: Vec<IntersectionSummary>,
    pub location: LocationConfig,
}

impl InsightSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Free-text analysis returned by a service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub text: String,
    pub grounding_references: Vec<String>,
}

/// Produces advisory text from a snapshot. May be slow or fail.
pub trait InsightService: Send + Sync {
    fn analyze(&self, snapshot: &InsightSnapshot) -> Result<Insight>;
}

/// Where the current request stands
#[derive(Debug, Clone, PartialEq)]
pub enum InsightStatus {
    /// Nothing requested yet
    Idle,
    Pending,
    Ready(Insight),
    /// The last request failed
    Unavailable,
}

/// Runs at most one insight request at a time without blocking the caller
#[derive(Default)]
pub struct InsightRequester {
    pending: Option<Receiver<Option<Insight>>>,
    last: Option<Option<Insight>>,
}

impl InsightRequester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request. Returns false if one is still in flight.
    pub fn request(&mut self, service: Arc<dyn InsightService>, snapshot: InsightSnapshot) -> bool {
        if self.is_pending() {
            return false;
        }

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = match service.analyze(&snapshot) {
                Ok(insight) => Some(insight),
                Err(e) => {
                    warn!("{} analysis failed: {:#}", snapshot.location.name, e);
                    None
                }
            };
            // The requester may have been dropped; nobody is listening then
            let _ = tx.send(outcome);
        });

        debug!("Insight request started");
        self.pending = Some(rx);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Check for a finished request without waiting
    pub fn poll(&mut self) -> InsightStatus {
        if let Some(rx) = &self.pending {
            match rx.try_recv() {
                Ok(outcome) => {
                    self.last = Some(outcome);
                    self.pending = None;
                }
                Err(TryRecvError::Empty) => return InsightStatus::Pending,
                Err(TryRecvError::Disconnected) => {
                    warn!("Insight worker exited without a result");
                    self.last = Some(None);
                    self.pending = None;
                }
            }
        }

        match &self.last {
            None => InsightStatus::Idle,
            Some(Some(insight)) => InsightStatus::Ready(insight.clone()),
            Some(None) => InsightStatus::Unavailable,
        }
    }
}

/// Offline analyzer that derives advice from the snapshot alone
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicInsightService;

impl HeuristicInsightService {
    fn congestion_band(level: f32) -> &'static str {
        if level < 0.2 {
            "free-flowing"
        } else if level < 0.5 {
            "moderately congested"
        } else {
            "heavily congested"
        }
    }
}

impl InsightService for HeuristicInsightService {
    fn analyze(&self, snapshot: &InsightSnapshot) -> Result<Insight> {
        let mut lines = vec![format!(
            "{}: {} active vehicles, {} ({:.1}% waiting), {} intersection clearances.",
            snapshot.location.name,
            snapshot.active_vehicle_count,
            Self::congestion_band(snapshot.congestion_level),
            snapshot.congestion_level * 100.0,
            snapshot.throughput
        )];

        let busiest = snapshot
            .intersections
            .iter()
            .max_by_key(|s| s.total_queue());

        if let Some(busiest) = busiest.filter(|s| s.total_queue() > 0) {
            let vertical = busiest.queue_lengths.north + busiest.queue_lengths.south;
            let horizontal = busiest.queue_lengths.east + busiest.queue_lengths.west;
            let axis = if vertical >= horizontal {
                "north-south"
            } else {
                "east-west"
            };
            lines.push(format!(
                "Longest queue at {} ({} vehicles); extend {} green time there.",
                busiest.name,
                busiest.total_queue(),
                axis
            ));
        }

        let overridden: Vec<&str> = snapshot
            .intersections
            .iter()
            .filter(|s| s.manual_override)
            .map(|s| s.name.as_str())
            .collect();
        if !overridden.is_empty() {
            lines.push(format!(
                "Manual control active at {}; release when the queue clears.",
                overridden.join(", ")
            ));
        }

        if snapshot.congestion_level >= 0.5 {
            lines.push("Switch to adaptive control to let queues preempt the cycle.".to_string());
        }

        Ok(Insight {
            text: lines.join("\n"),
            grounding_references: vec![snapshot.location.description.clone()],
        })
    }
}
