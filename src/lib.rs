//! Traffic Signal Simulation Library
//!
//! A grid of signalised intersections with static, adaptive and manual
//! control, and vehicles that queue, brake, follow and turn.

pub mod simulation;
