// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Vehicle telemetry: the status model, trip history and the simulator

mod simulator;
mod state;
mod status;
mod trip;

pub use simulator::{
    seed_history, update_battery, update_motor, update_thermal, Scenario, ScenarioEngine,
    ScenarioState, TickReport, NOMINAL_VOLTAGE, OVERHEAT_CEILING,
};
pub use state::{SharedState, VehicleState};
pub use status::{
    BatteryHealth, BatteryState, MotorDirection, MotorState, MotorStatus, StatusSnapshot,
    TemperatureLevel, ThermalState, UnknownLiteral, CRITICAL_BATTERY_LEVEL, CRITICAL_TEMPERATURE,
    HIGH_TEMPERATURE, LOW_BATTERY_LEVEL,
};
pub use trip::{Efficiency, TripHistory, TripRecord, DEFAULT_HISTORY_CAPACITY, UNKNOWN_LOCATION};
