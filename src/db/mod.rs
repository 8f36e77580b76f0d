// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Database module for persistent trip, reading and alert records

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::alerts::Alert;
use crate::config::DatabaseConfig;
use crate::telemetry::{BatteryHealth, BatteryState, ThermalState, TripRecord};

/// Acknowledged alerts are kept this many days
pub const ACKNOWLEDGED_ALERT_RETENTION_DAYS: i64 = 7;

/// Database manager
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.path)?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// Throwaway database, used when nothing should touch the disk
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.create_tables()?;
        Ok(db)
    }

    /// Create database tables
    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                distance REAL NOT NULL,
                duration INTEGER NOT NULL,
                avg_speed REAL NOT NULL,
                battery_consumed INTEGER NOT NULL,
                start_location TEXT,
                end_location TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_trips_timestamp ON trips(timestamp);

            CREATE TABLE IF NOT EXISTS battery_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                battery_level INTEGER NOT NULL,
                battery_voltage REAL NOT NULL,
                battery_health TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_battery_timestamp ON battery_readings(timestamp);

            CREATE TABLE IF NOT EXISTS temperature_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                cpu_temperature REAL NOT NULL,
                ambient_temperature REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_temperature_timestamp ON temperature_readings(timestamp);

            -- is_read doubles as the acknowledgement flag
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                alert_type TEXT NOT NULL,
                alert_message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0
            );
        "#,
        )?;

        Ok(())
    }

    /// Store a trip and return the id the store assigned to it
    pub fn store_trip(&self, trip: &TripRecord) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            r#"INSERT INTO trips
               (timestamp, distance, duration, avg_speed, battery_consumed, start_location, end_location)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                trip.end().timestamp_millis(),
                trip.distance_km(),
                trip.duration_secs() as i64,
                trip.average_speed_kmh(),
                i64::from(trip.battery_consumed()),
                trip.start_location(),
                trip.end_location(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// All stored trips, newest first
    pub fn all_trips(&self) -> Result<Vec<TripRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, distance, duration, avg_speed, battery_consumed, start_location, end_location
             FROM trips ORDER BY timestamp DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(TripRecord::new(
                row.get(0)?,
                from_millis(row.get(1)?),
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?;

        let mut trips = Vec::new();
        for row in rows {
            trips.push(row?);
        }

        Ok(trips)
    }

    pub fn store_battery_reading(&self, battery: &BatteryState) -> Result<i64> {
        self.store_battery_reading_at(battery, Utc::now())
    }

    fn store_battery_reading_at(&self, battery: &BatteryState, at: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO battery_readings (timestamp, battery_level, battery_voltage, battery_health) VALUES (?1, ?2, ?3, ?4)",
            params![
                at.timestamp_millis(),
                battery.level,
                battery.voltage,
                battery.health.as_str()
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Battery readings taken at or after `since`, oldest first
    pub fn battery_history(&self, since: DateTime<Utc>) -> Result<Vec<StoredBatteryReading>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT timestamp, battery_level, battery_voltage, battery_health FROM battery_readings
             WHERE timestamp >= ?1 ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(params![since.timestamp_millis()], |row| {
            let health: String = row.get(3)?;
            Ok(StoredBatteryReading {
                timestamp: from_millis(row.get(0)?),
                level: row.get(1)?,
                voltage: row.get(2)?,
                health: BatteryHealth::parse_lenient(&health),
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }

    pub fn store_temperature_reading(&self, thermal: &ThermalState) -> Result<i64> {
        self.store_temperature_reading_at(thermal, Utc::now())
    }

    fn store_temperature_reading_at(&self, thermal: &ThermalState, at: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO temperature_readings (timestamp, cpu_temperature, ambient_temperature) VALUES (?1, ?2, ?3)",
            params![at.timestamp_millis(), thermal.system, thermal.ambient],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Temperature readings taken at or after `since`, oldest first
    pub fn temperature_history(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredTemperatureReading>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT timestamp, cpu_temperature, ambient_temperature FROM temperature_readings
             WHERE timestamp >= ?1 ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(params![since.timestamp_millis()], |row| {
            Ok(StoredTemperatureReading {
                timestamp: from_millis(row.get(0)?),
                cpu_temperature: row.get(1)?,
                ambient_temperature: row.get(2)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }

    pub fn store_alert(&self, alert: &Alert) -> Result<i64> {
        self.store_alert_at(alert, Utc::now())
    }

    fn store_alert_at(&self, alert: &Alert, at: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO alerts (timestamp, alert_type, alert_message, is_read) VALUES (?1, ?2, ?3, 0)",
            params![at.timestamp_millis(), alert.kind.title(), alert.message],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Alerts nobody has acknowledged yet, newest first
    pub fn unread_alerts(&self) -> Result<Vec<StoredAlert>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, alert_type, alert_message, is_read FROM alerts
             WHERE is_read = 0 ORDER BY timestamp DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredAlert {
                id: row.get(0)?,
                timestamp: from_millis(row.get(1)?),
                alert_type: row.get(2)?,
                message: row.get(3)?,
                acknowledged: row.get::<_, i64>(4)? == 1,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }

    /// Mark an alert as read. Returns false if no such alert exists.
    pub fn acknowledge_alert(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute("UPDATE alerts SET is_read = 1 WHERE id = ?1", params![id])?;
        Ok(updated > 0)
    }

    /// Purge readings older than `cutoff` and acknowledged alerts older than
    /// a week. Unacknowledged alerts are never purged.
    pub fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.cleanup_at(cutoff, Utc::now())
    }

    fn cleanup_at(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();

        let deleted_battery = conn.execute(
            "DELETE FROM battery_readings WHERE timestamp < ?1",
            params![cutoff.timestamp_millis()],
        )?;

        let deleted_temperature = conn.execute(
            "DELETE FROM temperature_readings WHERE timestamp < ?1",
            params![cutoff.timestamp_millis()],
        )?;

        let week_ago = now - Duration::days(ACKNOWLEDGED_ALERT_RETENTION_DAYS);
        let deleted_alerts = conn.execute(
            "DELETE FROM alerts WHERE timestamp < ?1 AND is_read = 1",
            params![week_ago.timestamp_millis()],
        )?;

        info!(
            "Cleaned up {} battery readings, {} temperature readings and {} alerts",
            deleted_battery, deleted_temperature, deleted_alerts
        );

        Ok(deleted_battery + deleted_temperature + deleted_alerts)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn.lock();

        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
            Ok(n as usize)
        };

        let stats = DatabaseStats {
            trip_count: count("trips")?,
            battery_reading_count: count("battery_readings")?,
            temperature_reading_count: count("temperature_readings")?,
            alert_count: count("alerts")?,
        };
        debug!("Database stats: {:?}", stats);
        Ok(stats)
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBatteryReading {
    pub timestamp: DateTime<Utc>,
    pub level: i32,
    pub voltage: f64,
    pub health: BatteryHealth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTemperatureReading {
    pub timestamp: DateTime<Utc>,
    pub cpu_temperature: f64,
    pub ambient_temperature: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAlert {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub alert_type: String,
    pub message: String,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub trip_count: usize,
    pub battery_reading_count: usize,
    pub temperature_reading_count: usize,
    pub alert_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_trips_round_trip_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let older = TripRecord::observed(at(0), 0.3, 400, 2.7, 4).with_locations("Home", "Park");
        let newer = TripRecord::observed(at(5000), 0.5, 600, 3.0, 6);

        let first_id = db.store_trip(&older).unwrap();
        let second_id = db.store_trip(&newer).unwrap();
        assert!(second_id > first_id);

        let trips = db.all_trips().unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].id(), Some(second_id));
        assert_eq!(trips[0].end(), at(5000));
        assert_eq!(trips[0].start_location(), "Unknown");
        assert_eq!(trips[1].start_location(), "Home");
        assert_eq!(trips[1].end_location(), "Park");
    }

    #[test]
    fn test_stored_trip_equals_original() {
        let db = Database::open_in_memory().unwrap();
        let end = DateTime::from_timestamp(1_700_000_020, 123_456_789).unwrap();
        let trip = TripRecord::observed(end, 0.4, 500, 2.9, 5);

        let id = db.store_trip(&trip).unwrap();
        let trip = trip.with_id(id);
        let trips = db.all_trips().unwrap();
        assert_eq!(trips[0].end(), trip.end());
        assert_eq!(trips[0], trip);
    }

    #[test]
    fn test_readings_since_are_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let battery = |level| BatteryState {
            level,
            health: BatteryHealth::Good,
            voltage: 12.1,
        };
        db.store_battery_reading_at(&battery(70), at(300)).unwrap();
        db.store_battery_reading_at(&battery(80), at(100)).unwrap();
        db.store_battery_reading_at(&battery(90), at(0)).unwrap();

        let history = db.battery_history(at(100)).unwrap();
        let levels: Vec<_> = history.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![80, 70]);
        assert_eq!(history[0].health, BatteryHealth::Good);

        let thermal = ThermalState { system: 41.0, ambient: 33.0 };
        db.store_temperature_reading_at(&thermal, at(50)).unwrap();
        assert_eq!(db.temperature_history(at(0)).unwrap().len(), 1);
        assert!(db.temperature_history(at(51)).unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_keeps_unacknowledged_alerts() {
        let db = Database::open_in_memory().unwrap();
        let now = at(30 * 86_400);
        let old = now - Duration::days(10);
        let alert = Alert::new(AlertKind::LowBattery, "Battery level is 18%");

        let acknowledged = db.store_alert_at(&alert, old).unwrap();
        let pending = db.store_alert_at(&alert, old).unwrap();
        let recent = db.store_alert_at(&alert, now - Duration::days(1)).unwrap();
        assert!(db.acknowledge_alert(acknowledged).unwrap());
        assert!(db.acknowledge_alert(recent).unwrap());
        assert!(!db.acknowledge_alert(9_999).unwrap());

        let thermal = ThermalState { system: 41.0, ambient: 33.0 };
        db.store_temperature_reading_at(&thermal, old).unwrap();
        db.store_temperature_reading_at(&thermal, now).unwrap();

        let deleted = db.cleanup_at(now - Duration::days(5), now).unwrap();
        assert_eq!(deleted, 2);

        let unread = db.unread_alerts().unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, pending);
        assert_eq!(unread[0].alert_type, "Low Battery");

        let stats = db.stats().unwrap();
        assert_eq!(stats.alert_count, 2);
        assert_eq!(stats.temperature_reading_count, 1);
    }
}
