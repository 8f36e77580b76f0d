//! Alert evaluation - threshold classification of a status snapshot

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::EventBus;
use crate::db::Database;
use crate::telemetry::{BatteryHealth, MotorStatus, StatusSnapshot};

/// Alert thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Battery percent at or below which `LowBattery` fires
    pub low_battery: u8,

    /// Battery percent at or below which `CriticalBattery` also fires
    pub critical_battery: u8,

    /// System °C at or above which `HighTemperature` fires
    pub high_temperature: f64,

    /// System °C at or above which `CriticalTemperature` also fires
    pub critical_temperature: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            low_battery: 20,
            critical_battery: 10,
            high_temperature: 65.0,
            critical_temperature: 70.0,
        }
    }
}

/// Severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    LowBattery,
    CriticalBattery,
    HighTemperature,
    CriticalTemperature,
    BatteryHealthDegraded,
    MotorError,
}

impl AlertKind {
    /// Short human title, also used as the stored alert type
    pub fn title(&self) -> &'static str {
        match self {
            Self::LowBattery => "Low Battery",
            Self::CriticalBattery => "Critical Battery",
            Self::HighTemperature => "High Temperature",
            Self::CriticalTemperature => "Critical Temperature",
            Self::BatteryHealthDegraded => "Battery Health",
            Self::MotorError => "Motor Error",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::BatteryHealthDegraded => Severity::Low,
            Self::LowBattery | Self::HighTemperature => Severity::Medium,
            Self::CriticalBattery | Self::CriticalTemperature | Self::MotorError => {
                Severity::Critical
            }
        }
    }

    /// Critical alerts go out on the high-priority channel as well
    pub fn is_critical(&self) -> bool {
        self.severity() == Severity::Critical
    }
}

/// A fired alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Stateless threshold evaluator.
///
/// Rules are independent, so a single snapshot can raise several alerts
/// (critical battery always comes with low battery). Nothing is
/// de-duplicated here: the result describes the snapshot as it is now.
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    config: AlertConfig,
}

impl AlertEvaluator {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn evaluate(&self, status: &StatusSnapshot) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let level = status.battery_level();
        let temperature = status.system_temperature();

        if level <= self.config.low_battery {
            alerts.push(Alert::new(
                AlertKind::LowBattery,
                format!("Battery level is {}%", level),
            ));
        }
        if level <= self.config.critical_battery {
            alerts.push(Alert::new(
                AlertKind::CriticalBattery,
                format!("Battery level critically low: {}%", level),
            ));
        }

        if temperature >= self.config.high_temperature {
            alerts.push(Alert::new(
                AlertKind::HighTemperature,
                format!("System temperature is {:.1}°C", temperature),
            ));
        }
        if temperature >= self.config.critical_temperature {
            alerts.push(Alert::new(
                AlertKind::CriticalTemperature,
                format!("System overheating: {:.1}°C", temperature),
            ));
        }

        if status.battery_health() == BatteryHealth::Poor {
            alerts.push(Alert::new(
                AlertKind::BatteryHealthDegraded,
                "Battery health is degrading",
            ));
        }

        if status.motor_status() == MotorStatus::Error {
            alerts.push(Alert::new(
                AlertKind::MotorError,
                "Critical motor system failure detected",
            ));
        }

        alerts
    }
}

/// Evaluate with the default thresholds
pub fn evaluate(status: &StatusSnapshot) -> Vec<Alert> {
    AlertEvaluator::default().evaluate(status)
}

/// Publish each alert on the bus and record it in the store when there is one
pub(crate) fn raise(alerts: &[Alert], event_bus: &EventBus, database: Option<&Database>) {
    for alert in alerts {
        info!("{}: {}", alert.kind.title(), alert.message);

        if let Some(db) = database {
            if let Err(e) = db.store_alert(alert) {
                warn!("Failed to store alert: {}", e);
            }
        }

        event_bus.publish_alert(alert.clone());
    }
}
