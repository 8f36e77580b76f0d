// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Vehicle status snapshot and its field groups

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Battery level at or below which the battery counts as low
pub const LOW_BATTERY_LEVEL: u8 = 20;
/// Battery level at or below which the battery counts as critical
pub const CRITICAL_BATTERY_LEVEL: u8 = 10;
/// System temperature (°C) from which the status reads "high"
pub const HIGH_TEMPERATURE: f64 = 60.0;
/// System temperature (°C) from which the status reads "critical"
pub const CRITICAL_TEMPERATURE: f64 = 70.0;

/// A remote literal that does not name any known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised {kind} literal: {value:?}")]
pub struct UnknownLiteral {
    pub kind: &'static str,
    pub value: String,
}

/// Battery health as reported by the vehicle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum BatteryHealth {
    #[default]
    Unknown,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl BatteryHealth {
    /// Parse a remote literal; anything unrecognised is `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "poor" => Self::Poor,
            "fair" => Self::Fair,
            "good" => Self::Good,
            "excellent" => Self::Excellent,
            _ => Self::Unknown,
        }
    }

    /// Health band derived from the charge level during normal operation
    pub fn from_level(level: i32) -> Self {
        if level > 60 {
            Self::Good
        } else if level > 30 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Poor => "Poor",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Excellent => "Excellent",
        }
    }
}

impl fmt::Display for BatteryHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Motor operating status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum MotorStatus {
    #[default]
    Stopped,
    Running,
    Error,
    Maintenance,
}

impl MotorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Running => "Running",
            Self::Error => "Error",
            Self::Maintenance => "Maintenance",
        }
    }
}

impl FromStr for MotorStatus {
    type Err = UnknownLiteral;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stopped" => Ok(Self::Stopped),
            "running" => Ok(Self::Running),
            "error" => Ok(Self::Error),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(UnknownLiteral {
                kind: "motor status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MotorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of travel while the motor runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum MotorDirection {
    #[default]
    None,
    Forward,
    Backward,
    Left,
    Right,
}

impl MotorDirection {
    /// Directions a running motor can take
    pub const MOVING: [MotorDirection; 4] = [
        MotorDirection::Forward,
        MotorDirection::Left,
        MotorDirection::Right,
        MotorDirection::Backward,
    ];

    /// Parse a remote literal; anything unrecognised is `None`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "forward" => Self::Forward,
            "backward" => Self::Backward,
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Forward => "Forward",
            Self::Backward => "Backward",
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }
}

impl fmt::Display for MotorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display band for the system temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemperatureLevel {
    Normal,
    Warm,
    High,
    Critical,
}

impl TemperatureLevel {
    pub fn from_celsius(celsius: f64) -> Self {
        if celsius >= CRITICAL_TEMPERATURE {
            Self::Critical
        } else if celsius >= HIGH_TEMPERATURE {
            Self::High
        } else if celsius >= 40.0 {
            Self::Warm
        } else {
            Self::Normal
        }
    }
}

/// Battery field group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryState {
    /// Charge in percent
    pub level: i32,
    pub health: BatteryHealth,
    /// Pack voltage in volts
    pub voltage: f64,
}

/// Motor field group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotorState {
    pub status: MotorStatus,
    /// Throttle in percent
    pub speed: i32,
    pub direction: MotorDirection,
}

impl MotorState {
    pub fn stopped() -> Self {
        Self {
            status: MotorStatus::Stopped,
            speed: 0,
            direction: MotorDirection::None,
        }
    }

    pub fn running(speed: i32, direction: MotorDirection) -> Self {
        Self {
            status: MotorStatus::Running,
            speed,
            direction,
        }
    }
}

/// Temperature field group, both in °C
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThermalState {
    pub system: f64,
    pub ambient: f64,
}

/// Current vehicle telemetry.
///
/// Every setter sanitizes its input before storing it and stamps
/// `last_update`. Nothing is ever rejected: out-of-range values are clamped,
/// and motor speed/direction are forced to `0`/`None` unless the motor runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    battery: BatteryState,
    motor: MotorState,
    thermal: ThermalState,
    connected: bool,
    last_update: DateTime<Utc>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            battery: BatteryState {
                level: 0,
                health: BatteryHealth::Unknown,
                voltage: 0.0,
            },
            motor: MotorState::stopped(),
            thermal: ThermalState {
                system: 0.0,
                ambient: 0.0,
            },
            connected: false,
            last_update: Utc::now(),
        }
    }
}

impl StatusSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    // Battery

    pub fn battery(&self) -> BatteryState {
        self.battery
    }

    pub fn battery_level(&self) -> u8 {
        self.battery.level as u8
    }

    pub fn battery_health(&self) -> BatteryHealth {
        self.battery.health
    }

    pub fn battery_voltage(&self) -> f64 {
        self.battery.voltage
    }

    pub fn set_battery_level(&mut self, level: i32) {
        self.battery.level = level.clamp(0, 100);
        self.touch();
    }

    pub fn set_battery_health(&mut self, health: BatteryHealth) {
        self.battery.health = health;
        self.touch();
    }

    pub fn set_battery_voltage(&mut self, voltage: f64) {
        self.battery.voltage = non_negative(voltage);
        self.touch();
    }

    /// Replace the whole battery group in one step
    pub fn set_battery(&mut self, battery: BatteryState) {
        self.battery = BatteryState {
            level: battery.level.clamp(0, 100),
            health: battery.health,
            voltage: non_negative(battery.voltage),
        };
        self.touch();
    }

    // Motor

    pub fn motor(&self) -> MotorState {
        self.motor
    }

    pub fn motor_status(&self) -> MotorStatus {
        self.motor.status
    }

    pub fn motor_speed(&self) -> u8 {
        self.motor.speed as u8
    }

    pub fn motor_direction(&self) -> MotorDirection {
        self.motor.direction
    }

    pub fn set_motor_status(&mut self, status: MotorStatus) {
        self.motor.status = status;
        self.normalize_motor();
        self.touch();
    }

    pub fn set_motor_speed(&mut self, speed: i32) {
        self.motor.speed = speed.clamp(0, 100);
        self.normalize_motor();
        self.touch();
    }

    pub fn set_motor_direction(&mut self, direction: MotorDirection) {
        self.motor.direction = direction;
        self.normalize_motor();
        self.touch();
    }

    /// Replace the whole motor group in one step
    pub fn set_motor(&mut self, motor: MotorState) {
        self.motor = MotorState {
            status: motor.status,
            speed: motor.speed.clamp(0, 100),
            direction: motor.direction,
        };
        self.normalize_motor();
        self.touch();
    }

    fn normalize_motor(&mut self) {
        if self.motor.status != MotorStatus::Running {
            self.motor.speed = 0;
            self.motor.direction = MotorDirection::None;
        }
    }

    // Temperature

    pub fn thermal(&self) -> ThermalState {
        self.thermal
    }

    pub fn system_temperature(&self) -> f64 {
        self.thermal.system
    }

    pub fn ambient_temperature(&self) -> f64 {
        self.thermal.ambient
    }

    pub fn set_system_temperature(&mut self, celsius: f64) {
        self.thermal.system = celsius;
        self.touch();
    }

    pub fn set_ambient_temperature(&mut self, celsius: f64) {
        self.thermal.ambient = celsius;
        self.touch();
    }

    /// Replace the whole temperature group in one step
    pub fn set_thermal(&mut self, thermal: ThermalState) {
        self.thermal = thermal;
        self.touch();
    }

    // Connectivity

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        self.touch();
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    fn touch(&mut self) {
        self.last_update = Utc::now();
    }

    // Classification

    pub fn is_battery_low(&self) -> bool {
        self.battery_level() <= LOW_BATTERY_LEVEL
    }

    pub fn is_battery_critical(&self) -> bool {
        self.battery_level() <= CRITICAL_BATTERY_LEVEL
    }

    pub fn is_temperature_high(&self) -> bool {
        self.thermal.system >= HIGH_TEMPERATURE
    }

    pub fn is_temperature_critical(&self) -> bool {
        self.thermal.system >= CRITICAL_TEMPERATURE
    }

    pub fn is_motor_running(&self) -> bool {
        self.motor.status == MotorStatus::Running
    }

    pub fn has_motor_error(&self) -> bool {
        self.motor.status == MotorStatus::Error
    }

    pub fn temperature_level(&self) -> TemperatureLevel {
        TemperatureLevel::from_celsius(self.thermal.system)
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_level_clamps() {
        let mut status = StatusSnapshot::new();
        status.set_battery_level(150);
        assert_eq!(status.battery_level(), 100);
        status.set_battery_level(-3);
        assert_eq!(status.battery_level(), 0);
        status.set_battery_level(42);
        assert_eq!(status.battery_level(), 42);
    }

    #[test]
    fn test_voltage_never_negative() {
        let mut status = StatusSnapshot::new();
        status.set_battery_voltage(-1.5);
        assert_eq!(status.battery_voltage(), 0.0);
        status.set_battery_voltage(f64::NAN);
        assert_eq!(status.battery_voltage(), 0.0);
    }

    #[test]
    fn test_motor_speed_forced_to_zero_unless_running() {
        let mut status = StatusSnapshot::new();
        status.set_motor_speed(55);
        status.set_motor_direction(MotorDirection::Left);
        assert_eq!(status.motor_speed(), 0);
        assert_eq!(status.motor_direction(), MotorDirection::None);

        status.set_motor(MotorState::running(250, MotorDirection::Forward));
        assert_eq!(status.motor_speed(), 100);
        assert_eq!(status.motor_direction(), MotorDirection::Forward);

        status.set_motor_status(MotorStatus::Maintenance);
        assert_eq!(status.motor_speed(), 0);
        assert_eq!(status.motor_direction(), MotorDirection::None);
    }

    #[test]
    fn test_group_setter_clamps_and_stamps() {
        let mut status = StatusSnapshot::new();
        let before = status.last_update();
        status.set_battery(BatteryState {
            level: -20,
            health: BatteryHealth::Poor,
            voltage: -4.0,
        });
        assert_eq!(status.battery_level(), 0);
        assert_eq!(status.battery_voltage(), 0.0);
        assert!(status.last_update() >= before);
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(BatteryHealth::parse_lenient("GOOD"), BatteryHealth::Good);
        assert_eq!(BatteryHealth::parse_lenient("meh"), BatteryHealth::Unknown);
        assert_eq!(MotorDirection::parse_lenient("left"), MotorDirection::Left);
        assert_eq!(MotorDirection::parse_lenient("up"), MotorDirection::None);
        assert_eq!("Running".parse::<MotorStatus>(), Ok(MotorStatus::Running));
        assert!("Flying".parse::<MotorStatus>().is_err());
    }

    #[test]
    fn test_classification() {
        let mut status = StatusSnapshot::new();
        status.set_battery_level(10);
        status.set_system_temperature(61.0);
        assert!(status.is_battery_low());
        assert!(status.is_battery_critical());
        assert!(status.is_temperature_high());
        assert!(!status.is_temperature_critical());
        assert_eq!(status.temperature_level(), TemperatureLevel::High);
        assert_eq!(BatteryHealth::from_level(61), BatteryHealth::Good);
        assert_eq!(BatteryHealth::from_level(31), BatteryHealth::Fair);
        assert_eq!(BatteryHealth::from_level(30), BatteryHealth::Poor);
    }
}
