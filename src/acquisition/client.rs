// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! HTTP client for the vehicle's telemetry endpoint

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use crate::error::{FetchError, FetchResult};
use crate::telemetry::{
    BatteryHealth, BatteryState, MotorDirection, MotorState, ThermalState, TripRecord,
};

/// Source of live vehicle telemetry, one call per field group
#[async_trait]
pub trait VehicleEndpoint: Send + Sync {
    async fn fetch_battery(&self) -> FetchResult<BatteryState>;
    async fn fetch_motor(&self) -> FetchResult<MotorState>;
    async fn fetch_temperature(&self) -> FetchResult<ThermalState>;
    async fn fetch_trips(&self) -> FetchResult<Vec<TripRecord>>;
}

#[derive(Debug, Deserialize)]
struct BatteryReport {
    level: i32,
    health: String,
    voltage: f64,
}

impl From<BatteryReport> for BatteryState {
    fn from(report: BatteryReport) -> Self {
        Self {
            level: report.level,
            health: BatteryHealth::parse_lenient(&report.health),
            voltage: report.voltage,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MotorReport {
    status: String,
    speed: i32,
    direction: String,
}

impl TryFrom<MotorReport> for MotorState {
    type Error = FetchError;

    fn try_from(report: MotorReport) -> Result<Self, Self::Error> {
        Ok(Self {
            status: report.status.parse()?,
            speed: report.speed,
            direction: MotorDirection::parse_lenient(&report.direction),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TemperatureReport {
    cpu_temperature: f64,
    ambient_temperature: f64,
}

impl From<TemperatureReport> for ThermalState {
    fn from(report: TemperatureReport) -> Self {
        Self {
            system: report.cpu_temperature,
            ambient: report.ambient_temperature,
        }
    }
}

/// `timestamp` is the trip's end in epoch milliseconds, `duration` is seconds
#[derive(Debug, Deserialize)]
struct TripReport {
    timestamp: i64,
    distance: f64,
    duration: i64,
    avg_speed: f64,
    battery_consumed: i32,
}

impl TryFrom<TripReport> for TripRecord {
    type Error = FetchError;

    fn try_from(report: TripReport) -> Result<Self, Self::Error> {
        let end = DateTime::from_timestamp_millis(report.timestamp).ok_or_else(|| {
            FetchError::Malformed(format!("trip timestamp out of range: {}", report.timestamp))
        })?;
        let trip = TripRecord::observed(
            end,
            report.distance,
            report.duration,
            report.avg_speed,
            report.battery_consumed,
        );
        if trip.checked_start().is_none() {
            return Err(FetchError::Malformed(format!(
                "trip duration out of range: {}",
                report.duration
            )));
        }
        Ok(trip)
    }
}

/// [`VehicleEndpoint`] over plain HTTP GETs
pub struct HttpEndpoint {
    client: Client,
    base_url: String,
}

impl HttpEndpoint {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> FetchResult<T> {
        let url = format!("{}{}", self.base_url, path);
        trace!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VehicleEndpoint for HttpEndpoint {
    async fn fetch_battery(&self) -> FetchResult<BatteryState> {
        Ok(self.get::<BatteryReport>("/api/battery").await?.into())
    }

    async fn fetch_motor(&self) -> FetchResult<MotorState> {
        self.get::<MotorReport>("/api/motor").await?.try_into()
    }

    async fn fetch_temperature(&self) -> FetchResult<ThermalState> {
        Ok(self.get::<TemperatureReport>("/api/temperature").await?.into())
    }

    async fn fetch_trips(&self) -> FetchResult<Vec<TripRecord>> {
        self.get::<Vec<TripReport>>("/api/trips")
            .await?
            .into_iter()
            .map(TripRecord::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MotorStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per accepted connection
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_motor_report_rejects_unknown_status() {
        let report: MotorReport =
            serde_json::from_str(r#"{"status":"Cruising","speed":40,"direction":"Forward"}"#)
                .unwrap();
        assert!(matches!(
            MotorState::try_from(report),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_lenient_literals() {
        let battery: BatteryReport =
            serde_json::from_str(r#"{"level":64,"health":"Superb","voltage":12.1}"#).unwrap();
        assert_eq!(BatteryState::from(battery).health, BatteryHealth::Unknown);

        let motor: MotorReport =
            serde_json::from_str(r#"{"status":"Running","speed":40,"direction":"Sideways"}"#)
                .unwrap();
        let motor = MotorState::try_from(motor).unwrap();
        assert_eq!(motor.status, MotorStatus::Running);
        assert_eq!(motor.direction, MotorDirection::None);
    }

    #[test]
    fn test_trip_report_timestamp_is_end() {
        let report: TripReport = serde_json::from_str(
            r#"{"timestamp":1700000600000,"distance":0.4,"duration":576,"avg_speed":2.5,"battery_consumed":6}"#,
        )
        .unwrap();
        let trip = TripRecord::try_from(report).unwrap();
        assert_eq!(trip.end().timestamp(), 1_700_000_600);
        assert_eq!(trip.start().timestamp(), 1_700_000_024);
    }

    #[test]
    fn test_trip_report_rejects_unrepresentable_duration() {
        let report: TripReport = serde_json::from_str(
            r#"{"timestamp":1700000600000,"distance":0.4,"duration":10000000000000,"avg_speed":2.5,"battery_consumed":6}"#,
        )
        .unwrap();
        assert!(matches!(
            TripRecord::try_from(report),
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_absurd_trip_list_is_malformed() {
        let base = serve(
            "200 OK",
            r#"[{"timestamp":1700000600000,"distance":0.4,"duration":10000000000000,"avg_speed":2.5,"battery_consumed":6}]"#,
        )
        .await;
        let endpoint = HttpEndpoint::new(&base, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            endpoint.fetch_trips().await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_battery_over_http() {
        let base = serve("200 OK", r#"{"level":72,"health":"Good","voltage":12.2}"#).await;
        let endpoint = HttpEndpoint::new(&base, Duration::from_secs(2)).unwrap();
        let battery = endpoint.fetch_battery().await.unwrap();
        assert_eq!(battery.level, 72);
        assert_eq!(battery.health, BatteryHealth::Good);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let base = serve("503 Service Unavailable", "{}").await;
        let endpoint = HttpEndpoint::new(&base, Duration::from_secs(2)).unwrap();
        assert_eq!(
            endpoint.fetch_temperature().await.unwrap_err(),
            FetchError::Status(503)
        );
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let base = serve("200 OK", r#"{"cpu_temperature":"hot"}"#).await;
        let endpoint = HttpEndpoint::new(&base, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            endpoint.fetch_temperature().await,
            Err(FetchError::Malformed(_))
        ));
    }
}
