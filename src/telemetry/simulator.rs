// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Scenario-driven vehicle simulator for running without a reachable vehicle

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use parking_lot::Mutex;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    BatteryHealth, BatteryState, MotorDirection, MotorState, SharedState, ThermalState,
    TripHistory, TripRecord, UnknownLiteral,
};
use crate::alerts::{self, AlertEvaluator};
use crate::config::SimulationConfig;
use crate::core::EventBus;
use crate::db::Database;

const SEED_START_LOCATIONS: [&str; 6] = ["Home", "Garage", "Station A", "Point A", "Start Zone", "Base"];
const SEED_END_LOCATIONS: [&str; 7] = ["Work", "Mall", "Park", "School", "Station B", "Point B", "End Zone"];
const TRIP_START_LOCATIONS: [&str; 5] = ["Parking", "Home", "Station", "Point A", "Zone 1"];
const TRIP_END_LOCATIONS: [&str; 5] = ["Destination", "Target", "Point B", "Zone 2", "Finish"];

/// Ceiling of the overheating scenario in °C
pub const OVERHEAT_CEILING: f64 = 75.0;
/// Pack voltage of a fully rested battery
pub const NOMINAL_VOLTAGE: f64 = 12.4;

/// Named operating profile driving the simulated telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Normal,
    LowBattery,
    Overheating,
    LongTrip,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Normal,
        Scenario::LowBattery,
        Scenario::Overheating,
        Scenario::LongTrip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::LowBattery => "low_battery",
            Self::Overheating => "overheating",
            Self::LongTrip => "long_trip",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = UnknownLiteral;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "normal" => Ok(Self::Normal),
            "lowbattery" => Ok(Self::LowBattery),
            "overheating" => Ok(Self::Overheating),
            "longtrip" => Ok(Self::LongTrip),
            _ => Err(UnknownLiteral {
                kind: "scenario",
                value: s.to_string(),
            }),
        }
    }
}

/// Slow-moving simulation variables
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioState {
    pub scenario: Scenario,
    pub entered_at: DateTime<Utc>,
    /// How long the current scenario lasts before a switch is due.
    /// Drawn once when the scenario is entered and fixed until the next
    /// entry, so ticks never re-roll it.
    pub dwell: Duration,
    pub base_temperature: f64,
    pub base_battery_level: i32,
    pub moving: bool,
    pub last_trip_synthesis: Option<DateTime<Utc>>,
    /// Minimum wait after `last_trip_synthesis` before the next trip.
    /// Drawn once per synthesized trip, not on every tick.
    pub trip_interval: Duration,
}

impl ScenarioState {
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.entered_at
    }
}

/// What a single tick did
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub scenario_change: Option<(Scenario, Scenario)>,
    pub trip: Option<TripRecord>,
    pub alerts: Vec<alerts::Alert>,
}

// Per-field updates. Each takes the current group and returns the next one.

fn step_down(value: f64, step: f64, floor: f64) -> f64 {
    if value <= floor {
        value
    } else {
        (value - step).max(floor)
    }
}

fn step_up(value: f64, step: f64, ceiling: f64) -> f64 {
    if value >= ceiling {
        value
    } else {
        (value + step).min(ceiling)
    }
}

pub fn update_battery<R: Rng + ?Sized>(
    battery: BatteryState,
    scenario: Scenario,
    moving: bool,
    base_level: i32,
    rng: &mut R,
) -> BatteryState {
    let BatteryState {
        mut level,
        mut health,
        mut voltage,
    } = battery;

    match scenario {
        Scenario::LowBattery => {
            if level > 15 {
                level = (level - rng.gen_range(1..=2)).max(15);
                voltage = step_down(voltage, 0.05, 11.0);
            }
            health = if level < 20 {
                BatteryHealth::Poor
            } else {
                BatteryHealth::Fair
            };
        }
        Scenario::LongTrip => {
            if moving && level > 10 {
                level = (level - 1).max(10);
                voltage = step_down(voltage, 0.02, 11.2);
            }
        }
        Scenario::Normal | Scenario::Overheating => {
            if moving && level > 20 {
                if rng.gen_ratio(1, 5) {
                    level = (level - 1).max(20);
                    voltage = step_down(voltage, 0.01, 11.5);
                }
            } else if !moving && level < base_level && rng.gen_ratio(1, 10) {
                level = (level + 1).min(base_level);
                voltage = step_up(voltage, 0.02, NOMINAL_VOLTAGE);
            }
            health = BatteryHealth::from_level(level);
        }
    }

    BatteryState {
        level,
        health,
        voltage,
    }
}

/// Returns the next motor group and whether the vehicle is now moving
pub fn update_motor<R: Rng + ?Sized>(
    motor: MotorState,
    scenario: Scenario,
    moving: bool,
    rng: &mut R,
) -> (MotorState, bool) {
    match scenario {
        Scenario::LongTrip => (
            MotorState::running(60 + rng.gen_range(0..20), random_direction(rng)),
            true,
        ),
        _ => {
            if !rng.gen_ratio(1, 15) {
                (motor, moving)
            } else if moving {
                (MotorState::stopped(), false)
            } else {
                (
                    MotorState::running(30 + rng.gen_range(0..40), random_direction(rng)),
                    true,
                )
            }
        }
    }
}

pub fn update_thermal<R: Rng + ?Sized>(
    thermal: ThermalState,
    scenario: Scenario,
    moving: bool,
    base_temperature: f64,
    rng: &mut R,
) -> ThermalState {
    let mut system = thermal.system;

    match scenario {
        Scenario::Overheating => {
            if system < OVERHEAT_CEILING {
                system = (system + 1.0 + rng.gen::<f64>()).min(OVERHEAT_CEILING);
            }
        }
        Scenario::LongTrip => {
            let target = base_temperature + 15.0;
            if system < target {
                system = (system + 0.5).min(target);
            }
        }
        Scenario::Normal | Scenario::LowBattery => {
            let target = base_temperature + if moving { 10.0 } else { 0.0 };
            if (system - target).abs() > 0.5 {
                system = if system > target {
                    (system - 0.3).max(target)
                } else {
                    (system + 0.3).min(target)
                };
            }
            system += rng.gen_range(-0.5..0.5);
        }
    }

    ThermalState {
        system,
        ambient: system - 8.0 - rng.gen_range(0.0..2.0),
    }
}

fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> MotorDirection {
    *MotorDirection::MOVING
        .choose(rng)
        .unwrap_or(&MotorDirection::Forward)
}

fn pick<R: Rng + ?Sized>(rng: &mut R, labels: &[&str]) -> String {
    labels.choose(rng).copied().unwrap_or(super::UNKNOWN_LOCATION).to_string()
}

/// Uniform duration in `[min, max)` seconds; `min` when the range is empty
fn sample_secs<R: Rng + ?Sized>(rng: &mut R, min: u64, max: u64) -> Duration {
    let secs = if max > min { rng.gen_range(min..max) } else { min };
    Duration::seconds(secs as i64)
}

/// Any scenario except `current`, uniformly
fn pick_next_scenario<R: Rng + ?Sized>(rng: &mut R, current: Scenario) -> Scenario {
    let others: Vec<Scenario> = Scenario::ALL.into_iter().filter(|s| *s != current).collect();
    others.choose(rng).copied().unwrap_or(current)
}

/// Generate 6-8 past trips, walking backwards from `now` with a 5-35 minute
/// gap before each one, newest first. Trips cannot overlap by construction.
pub fn seed_history<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Vec<TripRecord> {
    let count = rng.gen_range(6..=8);
    let mut boundary = now;
    let mut trips = Vec::with_capacity(count);

    for _ in 0..count {
        let distance: f64 = rng.gen_range(0.05..1.0);
        let speed: f64 = rng.gen_range(1.5..4.0);
        let duration = ((distance / speed * 3600.0).round() as i64).max(60);

        let end = boundary - Duration::seconds(rng.gen_range(300..2100));
        let battery = (2 + (distance * f64::from(8 + rng.gen_range(0..5i32))) as i32
            + (duration / 600) as i32)
            .clamp(1, 25);

        let trip = TripRecord::observed(end, distance, duration, speed, battery).with_locations(
            pick(rng, &SEED_START_LOCATIONS),
            pick(rng, &SEED_END_LOCATIONS),
        );
        boundary = trip.start();
        trips.push(trip);
    }

    trips
}

struct Simulation {
    state: ScenarioState,
    rng: StdRng,
}

impl Simulation {
    fn enter(&mut self, scenario: Scenario, now: DateTime<Utc>, config: &SimulationConfig) {
        self.state.scenario = scenario;
        self.state.entered_at = now;
        self.state.dwell = sample_secs(
            &mut self.rng,
            config.min_scenario_secs,
            config.max_scenario_secs,
        );
    }

    fn maybe_switch(
        &mut self,
        now: DateTime<Utc>,
        config: &SimulationConfig,
    ) -> Option<(Scenario, Scenario)> {
        if self.state.elapsed(now) <= self.state.dwell {
            return None;
        }
        let from = self.state.scenario;
        let to = pick_next_scenario(&mut self.rng, from);
        self.enter(to, now, config);
        Some((from, to))
    }

    /// Build the next trip if one is due. The trip always ends at `now`; if
    /// its natural length would reach back past the previous trip's end it
    /// is shortened to fit.
    fn maybe_synthesize(
        &mut self,
        latest: Option<&TripRecord>,
        now: DateTime<Utc>,
        config: &SimulationConfig,
    ) -> Option<TripRecord> {
        // Trip ends are kept at the store's millisecond precision
        let now = now.trunc_subsecs(3);
        if let Some(last) = self.state.last_trip_synthesis {
            if now - last < self.state.trip_interval {
                return None;
            }
        }

        let room = match latest {
            Some(trip) => {
                let since_end = now - trip.end();
                if since_end < Duration::seconds(config.min_trip_gap_secs as i64) {
                    return None;
                }
                Some(since_end.num_seconds())
            }
            None => None,
        };

        let rng = &mut self.rng;
        let mut distance: f64 = rng.gen_range(0.03..0.70);
        let speed: f64 = rng.gen_range(1.8..4.0);
        let mut duration = ((distance / speed * 3600.0).round() as i64).max(45);

        if let Some(room) = room {
            if duration > room {
                duration = room;
                distance = speed * duration as f64 / 3600.0;
            }
        }

        let battery = (1 + (distance * f64::from(10 + rng.gen_range(0..6i32))) as i32
            + (duration / 300) as i32)
            .clamp(1, 20);

        let trip = TripRecord::observed(now, distance, duration, speed, battery).with_locations(
            pick(rng, &TRIP_START_LOCATIONS),
            pick(rng, &TRIP_END_LOCATIONS),
        );

        self.state.last_trip_synthesis = Some(now);
        self.state.trip_interval = sample_secs(
            &mut self.rng,
            config.min_trip_interval_secs,
            config.max_trip_interval_secs,
        );

        Some(trip)
    }
}

/// Timed scenario state machine that owns the vehicle state while the
/// engine runs in simulated mode
pub struct ScenarioEngine {
    config: SimulationConfig,
    state: SharedState,
    simulation: Mutex<Simulation>,
    evaluator: AlertEvaluator,
    event_bus: Arc<EventBus>,
    database: Option<Arc<Database>>,
}

impl ScenarioEngine {
    /// Reset the shared state to a parked, healthy vehicle and load
    /// `initial_trips`, or a generated seed history when there are none.
    pub fn new(
        config: SimulationConfig,
        state: SharedState,
        evaluator: AlertEvaluator,
        event_bus: Arc<EventBus>,
        database: Option<Arc<Database>>,
        initial_trips: Vec<TripRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let base_battery_level = i32::from(config.base_battery_level);
        let trips = if initial_trips.is_empty() {
            debug!("No trip history available, generating seed history");
            seed_history(now, &mut rng)
        } else {
            initial_trips
        };

        state.update(|vehicle| {
            vehicle.status.set_battery(BatteryState {
                level: base_battery_level,
                health: BatteryHealth::Good,
                voltage: NOMINAL_VOLTAGE,
            });
            vehicle.status.set_motor(MotorState::stopped());
            vehicle.status.set_thermal(ThermalState {
                system: config.base_temperature,
                ambient: config.base_temperature - 8.0,
            });
            vehicle.status.set_connected(true);
            vehicle.trips = TripHistory::from_records(trips, config.history_capacity);
        });

        let dwell = sample_secs(&mut rng, config.min_scenario_secs, config.max_scenario_secs);
        let trip_interval = sample_secs(
            &mut rng,
            config.min_trip_interval_secs,
            config.max_trip_interval_secs,
        );

        let scenario_state = ScenarioState {
            scenario: config.initial_scenario,
            entered_at: now,
            dwell,
            base_temperature: config.base_temperature,
            base_battery_level,
            moving: false,
            last_trip_synthesis: None,
            trip_interval,
        };

        Self {
            config,
            state,
            simulation: Mutex::new(Simulation {
                state: scenario_state,
                rng,
            }),
            evaluator,
            event_bus,
            database,
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.simulation.lock().state.scenario
    }

    pub fn scenario_state(&self) -> ScenarioState {
        self.simulation.lock().state.clone()
    }

    /// Switch to `scenario` now, restarting its dwell time
    pub fn force_scenario(&self, scenario: Scenario, now: DateTime<Utc>) {
        let mut simulation = self.simulation.lock();
        let previous = simulation.state.scenario;
        simulation.enter(scenario, now, &self.config);
        info!("Simulation scenario forced: {} -> {}", previous, scenario);
    }

    /// Advance the simulation by one step at time `now`
    pub fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        let candidate = {
            let mut simulation = self.simulation.lock();

            report.scenario_change = simulation.maybe_switch(now, &self.config);
            if let Some((from, to)) = report.scenario_change {
                info!("Simulation: switching scenario {} -> {}", from, to);
            }

            let Simulation { state: scenario, rng } = &mut *simulation;
            let latest = self.state.update(|vehicle| {
                let battery = update_battery(
                    vehicle.status.battery(),
                    scenario.scenario,
                    scenario.moving,
                    scenario.base_battery_level,
                    rng,
                );
                let (motor, moving) =
                    update_motor(vehicle.status.motor(), scenario.scenario, scenario.moving, rng);
                scenario.moving = moving;
                let thermal = update_thermal(
                    vehicle.status.thermal(),
                    scenario.scenario,
                    moving,
                    scenario.base_temperature,
                    rng,
                );

                vehicle.status.set_battery(battery);
                vehicle.status.set_motor(motor);
                vehicle.status.set_thermal(thermal);
                vehicle.trips.latest().cloned()
            });

            simulation.maybe_synthesize(latest.as_ref(), now, &self.config)
        };

        if let Some(trip) = candidate {
            let trip = self.persist_trip(trip);
            debug!(
                "Synthesized trip: {} in {} ending {}",
                trip.formatted_distance(),
                trip.formatted_duration(),
                trip.end()
            );
            self.state.update(|vehicle| vehicle.trips.push_latest(trip.clone()));
            report.trip = Some(trip);
        }

        let status = self.state.snapshot();
        report.alerts = self.evaluator.evaluate(&status);
        alerts::raise(&report.alerts, &self.event_bus, self.database.as_deref());

        self.event_bus.publish_status_changed();
        report
    }

    fn persist_trip(&self, trip: TripRecord) -> TripRecord {
        let Some(database) = &self.database else {
            return trip;
        };
        match database.store_trip(&trip) {
            Ok(id) => trip.with_id(id),
            Err(e) => {
                warn!("Failed to store synthesized trip: {}", e);
                trip
            }
        }
    }

    /// Tick on the configured cadence until shutdown
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Starting scenario engine in {} scenario (tick {:?})",
            self.scenario(),
            self.config.tick_interval()
        );

        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_at(Utc::now());
                }
                _ = shutdown.recv() => {
                    info!("Scenario engine shutting down...");
                    break;
                }
            }
        }
    }
}
