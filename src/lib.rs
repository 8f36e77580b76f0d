// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! CarMon - Vehicle Telemetry Acquisition and Simulation Engine
//!
//! Keeps a live picture of a small remote vehicle:
//! - Battery, motor and temperature status with clamped, normalized fields
//! - Bounded, non-overlapping trip history
//! - Remote polling with per-field-group fallback when the vehicle is unreachable
//! - Scenario-driven simulator for running without a vehicle
//! - Threshold alerts with a critical channel
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CarMon Engine                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌─────────────┐   ┌─────────────────┐   │
//! │  │   Scenario   │   │ Acquisition │ ← │ Vehicle endpoint│   │
//! │  │   Engine     │   │ Coordinator │   │ (HTTP)          │   │
//! │  └──────────────┘   └─────────────┘   └─────────────────┘   │
//! │         ↓                  ↓                                │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │        Shared state (snapshot + trip history)       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │         ↓                  ↓                                │
//! │  ┌──────────────┐   ┌─────────────┐   ┌─────────────────┐   │
//! │  │    Alert     │ → │  Event Bus  │   │    Database     │   │
//! │  │  Evaluator   │   │             │   │                 │   │
//! │  └──────────────┘   └─────────────┘   └─────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![allow(dead_code)]

pub mod acquisition;
pub mod alerts;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod telemetry;

// Re-exports for convenience
pub use acquisition::{AcquisitionCoordinator, RefreshOutcome, VehicleEndpoint};
pub use alerts::{Alert, AlertEvaluator, AlertKind};
pub use config::Config;
pub use core::{Engine, Event, EventBus, EventPayload};
pub use db::Database;
pub use error::FetchError;
pub use telemetry::{Scenario, ScenarioEngine, SharedState, StatusSnapshot, TripRecord};

/// CarMon version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CarMon name
pub const NAME: &str = "CarMon";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
}
