// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Acquisition coordinator - refreshes the vehicle state from the remote
//! endpoint or hands through the simulator's state

mod client;
mod fallback;

pub use client::{HttpEndpoint, VehicleEndpoint};
pub use fallback::{illustrative_trips, FallbackGenerator};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alerts::{self, Alert, AlertEvaluator};
use crate::config::AcquisitionMode;
use crate::core::EventBus;
use crate::db::Database;
use crate::error::{FetchError, FetchResult};
use crate::telemetry::{SharedState, TripRecord};

/// The independently fetched parts of the vehicle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    Battery,
    Motor,
    Temperature,
    Trips,
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Battery => "battery",
            Self::Motor => "motor",
            Self::Temperature => "temperature",
            Self::Trips => "trips",
        };
        f.write_str(name)
    }
}

/// Result of one completed refresh
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub mode: AcquisitionMode,
    /// Field groups that were substituted locally
    pub fallbacks: Vec<FieldGroup>,
    pub alerts: Vec<Alert>,
    pub connected: bool,
}

/// Outcome of an on-demand refresh request
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// Another refresh was in flight and will publish shortly
    Coalesced,
}

/// Drives refreshes of the shared vehicle state.
///
/// At most one refresh runs at a time. Scheduled refreshes wait their turn;
/// on-demand requests that find one in flight are dropped.
pub struct AcquisitionCoordinator {
    mode: RwLock<AcquisitionMode>,
    endpoint: Arc<dyn VehicleEndpoint>,
    fetch_timeout: Duration,
    state: SharedState,
    evaluator: AlertEvaluator,
    event_bus: Arc<EventBus>,
    database: Option<Arc<Database>>,
    fallback: Mutex<FallbackGenerator>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl AcquisitionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: AcquisitionMode,
        endpoint: Arc<dyn VehicleEndpoint>,
        fetch_timeout: Duration,
        state: SharedState,
        evaluator: AlertEvaluator,
        event_bus: Arc<EventBus>,
        database: Option<Arc<Database>>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            mode: RwLock::new(mode),
            endpoint,
            fetch_timeout,
            state,
            evaluator,
            event_bus,
            database,
            fallback: Mutex::new(FallbackGenerator::new(seed)),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn mode(&self) -> AcquisitionMode {
        *self.mode.read()
    }

    /// Switch the telemetry source; takes effect on the next refresh
    pub fn set_mode(&self, mode: AcquisitionMode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            info!("Acquisition mode changed: {:?} -> {:?}", previous, mode);
        }
    }

    /// Refresh now, waiting for any in-flight refresh to finish first
    pub async fn refresh(&self) -> RefreshReport {
        let _guard = self.refresh_gate.lock().await;
        self.refresh_exclusive().await
    }

    /// Refresh now unless one is already running
    pub async fn request_refresh(&self) -> RefreshOutcome {
        match self.refresh_gate.try_lock() {
            Ok(_guard) => RefreshOutcome::Completed(self.refresh_exclusive().await),
            Err(_) => {
                debug!("Refresh already in flight, request coalesced");
                RefreshOutcome::Coalesced
            }
        }
    }

    async fn refresh_exclusive(&self) -> RefreshReport {
        match self.mode() {
            AcquisitionMode::Simulated => {
                self.event_bus.publish_status_changed();
                RefreshReport {
                    mode: AcquisitionMode::Simulated,
                    fallbacks: Vec::new(),
                    alerts: Vec::new(),
                    connected: self.state.snapshot().is_connected(),
                }
            }
            AcquisitionMode::Remote => self.refresh_remote().await,
        }
    }

    async fn bounded<T>(&self, fetch: impl Future<Output = FetchResult<T>>) -> FetchResult<T> {
        timeout(self.fetch_timeout, fetch)
            .await
            .unwrap_or(Err(FetchError::Timeout))
    }

    fn substitute<T>(
        &self,
        group: FieldGroup,
        fetched: &FetchResult<T>,
        fallbacks: &mut Vec<FieldGroup>,
        generate: impl FnOnce(&mut FallbackGenerator) -> T,
    ) -> T
    where
        T: Clone,
    {
        match fetched {
            Ok(value) => value.clone(),
            Err(e) => {
                debug!("{} fetch failed, using fallback: {}", group, e);
                fallbacks.push(group);
                generate(&mut self.fallback.lock())
            }
        }
    }

    /// Trips from the store when the vehicle could not deliver them
    fn stored_trips(&self) -> Option<Vec<TripRecord>> {
        let db = self.database.as_ref()?;
        match db.all_trips() {
            Ok(trips) if !trips.is_empty() => Some(trips),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to load stored trips: {}", e);
                None
            }
        }
    }

    async fn refresh_remote(&self) -> RefreshReport {
        let endpoint = &self.endpoint;
        let (battery, motor, thermal, trips) = tokio::join!(
            self.bounded(endpoint.fetch_battery()),
            self.bounded(endpoint.fetch_motor()),
            self.bounded(endpoint.fetch_temperature()),
            self.bounded(endpoint.fetch_trips()),
        );

        let connected = battery.is_ok() || motor.is_ok() || thermal.is_ok();
        let mut fallbacks = Vec::new();

        let battery_state = self.substitute(FieldGroup::Battery, &battery, &mut fallbacks, |g| {
            g.battery()
        });
        let motor_state = self.substitute(FieldGroup::Motor, &motor, &mut fallbacks, |g| g.motor());
        let thermal_state = self.substitute(FieldGroup::Temperature, &thermal, &mut fallbacks, |g| {
            g.temperature()
        });
        let trips = match trips {
            Ok(trips) => Some(trips),
            Err(e) => {
                debug!("trips fetch failed, using fallback: {}", e);
                fallbacks.push(FieldGroup::Trips);
                self.stored_trips()
            }
        };

        // Everything above may be abandoned at an await point; the state is
        // only touched here, in one write.
        let now = Utc::now();
        let overlapping = self.state.update(|vehicle| {
            vehicle.status.set_battery(battery_state);
            vehicle.status.set_motor(motor_state);
            vehicle.status.set_thermal(thermal_state);
            vehicle.status.set_connected(connected);

            match trips {
                Some(trips) => vehicle.trips.replace(trips),
                None if vehicle.trips.is_empty() => vehicle.trips.replace(illustrative_trips(now)),
                None => 0,
            }
        });
        if overlapping > 0 {
            debug!("Dropped {} overlapping trips from the history", overlapping);
        }

        if let Some(db) = &self.database {
            if let Ok(reading) = &battery {
                if let Err(e) = db.store_battery_reading(reading) {
                    warn!("Failed to store battery reading: {}", e);
                }
            }
            if let Ok(reading) = &thermal {
                if let Err(e) = db.store_temperature_reading(reading) {
                    warn!("Failed to store temperature reading: {}", e);
                }
            }
        }

        if !connected {
            debug!("Vehicle unreachable, snapshot is fully substituted");
        }

        let alerts = self.evaluator.evaluate(&self.state.snapshot());
        alerts::raise(&alerts, &self.event_bus, self.database.as_deref());
        self.event_bus.publish_status_changed();

        RefreshReport {
            mode: AcquisitionMode::Remote,
            fallbacks,
            alerts,
            connected,
        }
    }

    /// Refresh on a fixed period until shutdown
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Starting acquisition in {:?} mode (every {:?})",
            self.mode(),
            period
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.refresh().await;
                    if !report.fallbacks.is_empty() {
                        debug!("Refresh substituted {:?}", report.fallbacks);
                    }
                }
                _ = shutdown.recv() => {
                    info!("Acquisition shutting down...");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use crate::core::EventPayload;
    use crate::telemetry::{
        BatteryHealth, BatteryState, MotorDirection, MotorState, MotorStatus, ThermalState,
    };
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use chrono::SubsecRound;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Endpoint double returning canned results after an optional delay
    struct ScriptedEndpoint {
        battery: FetchResult<BatteryState>,
        motor: FetchResult<MotorState>,
        thermal: FetchResult<ThermalState>,
        trips: FetchResult<Vec<TripRecord>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedEndpoint {
        fn failing(error: FetchError) -> Self {
            Self {
                battery: Err(error.clone()),
                motor: Err(error.clone()),
                thermal: Err(error.clone()),
                trips: Err(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        async fn answer<T: Clone>(&self, result: &FetchResult<T>) -> FetchResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            result.clone()
        }
    }

    #[async_trait]
    impl VehicleEndpoint for ScriptedEndpoint {
        async fn fetch_battery(&self) -> FetchResult<BatteryState> {
            self.answer(&self.battery).await
        }
        async fn fetch_motor(&self) -> FetchResult<MotorState> {
            self.answer(&self.motor).await
        }
        async fn fetch_temperature(&self) -> FetchResult<ThermalState> {
            self.answer(&self.thermal).await
        }
        async fn fetch_trips(&self) -> FetchResult<Vec<TripRecord>> {
            self.answer(&self.trips).await
        }
    }

    fn coordinator(
        mode: AcquisitionMode,
        endpoint: ScriptedEndpoint,
        database: Option<Arc<Database>>,
    ) -> (Arc<AcquisitionCoordinator>, Arc<ScriptedEndpoint>, Arc<EventBus>) {
        let endpoint = Arc::new(endpoint);
        let bus = Arc::new(EventBus::new(64));
        let coordinator = AcquisitionCoordinator::new(
            mode,
            endpoint.clone(),
            Duration::from_millis(50),
            SharedState::new(10),
            AlertEvaluator::default(),
            bus.clone(),
            database,
            Some(17),
        );
        (Arc::new(coordinator), endpoint, bus)
    }

    #[tokio::test]
    async fn test_all_fetches_time_out() {
        let mut endpoint = ScriptedEndpoint::failing(FetchError::Status(500));
        endpoint.delay = Duration::from_secs(5);
        let (coordinator, _, bus) = coordinator(AcquisitionMode::Remote, endpoint, None);
        let mut events = bus.subscribe_events();

        let report = coordinator.refresh().await;
        assert!(!report.connected);
        assert_eq!(report.fallbacks.len(), 4);

        let status = coordinator.state.snapshot();
        assert!(!status.is_connected());
        assert!((45..85).contains(&status.battery_level()));
        assert_eq!(status.battery_health(), BatteryHealth::Good);
        assert!(status.battery_voltage() >= 3.7);
        assert!(status.system_temperature() >= 35.0);
        assert_eq!(coordinator.state.trips().len(), 4);

        let event = events.recv().await.unwrap();
        assert_eq!(event.payload, EventPayload::StatusChanged);
    }

    #[tokio::test]
    async fn test_partial_degradation() {
        let mut endpoint = ScriptedEndpoint::failing(FetchError::Transport("refused".into()));
        endpoint.battery = Ok(BatteryState {
            level: 67,
            health: BatteryHealth::Fair,
            voltage: 11.9,
        });
        let (coordinator, _, _) = coordinator(AcquisitionMode::Remote, endpoint, None);

        let report = coordinator.refresh().await;
        assert!(report.connected);
        assert_eq!(
            report.fallbacks,
            vec![FieldGroup::Motor, FieldGroup::Temperature, FieldGroup::Trips]
        );

        let status = coordinator.state.snapshot();
        assert_eq!(status.battery_level(), 67);
        assert_eq!(status.battery_health(), BatteryHealth::Fair);
        assert!(status.is_connected());
    }

    #[tokio::test]
    async fn test_remote_values_are_applied_and_recorded() {
        let trip = TripRecord::observed(Utc::now() - ChronoDuration::minutes(10), 0.3, 400, 2.7, 4);
        let endpoint = ScriptedEndpoint {
            battery: Ok(BatteryState {
                level: 8,
                health: BatteryHealth::Poor,
                voltage: 11.1,
            }),
            motor: Ok(MotorState::running(45, MotorDirection::Left)),
            thermal: Ok(ThermalState {
                system: 48.0,
                ambient: 30.0,
            }),
            trips: Ok(vec![trip.clone()]),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        };
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (coordinator, _, _) = coordinator(AcquisitionMode::Remote, endpoint, Some(db.clone()));

        let report = coordinator.refresh().await;
        assert!(report.fallbacks.is_empty());
        let kinds: Vec<AlertKind> = report.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AlertKind::LowBattery,
                AlertKind::CriticalBattery,
                AlertKind::BatteryHealthDegraded
            ]
        );

        let status = coordinator.state.snapshot();
        assert_eq!(status.motor_status(), MotorStatus::Running);
        assert_eq!(status.motor_direction(), MotorDirection::Left);
        assert_eq!(coordinator.state.trips()[0].end(), trip.end());

        let since = Utc::now() - ChronoDuration::minutes(1);
        assert_eq!(db.battery_history(since).unwrap().len(), 1);
        assert_eq!(db.temperature_history(since).unwrap().len(), 1);
        assert_eq!(db.unread_alerts().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_trip_fallback_prefers_store() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let stored = TripRecord::observed(Utc::now() - ChronoDuration::hours(3), 0.5, 700, 2.6, 5);
        db.store_trip(&stored).unwrap();

        let endpoint = ScriptedEndpoint::failing(FetchError::Timeout);
        let (coordinator, _, _) = coordinator(AcquisitionMode::Remote, endpoint, Some(db));
        coordinator.refresh().await;

        let trips = coordinator.state.trips();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].end(), stored.end());
        assert!(trips[0].id().is_some());
    }

    #[tokio::test]
    async fn test_overlapping_remote_trips_keep_history_chronological() {
        let now = Utc::now();
        let mut endpoint = ScriptedEndpoint::failing(FetchError::Timeout);
        endpoint.trips = Ok(vec![
            TripRecord::observed(now, 0.5, 600, 3.0, 6),
            TripRecord::observed(now - ChronoDuration::seconds(100), 0.5, 600, 3.0, 6),
        ]);
        let (coordinator, _, _) = coordinator(AcquisitionMode::Remote, endpoint, None);

        let report = coordinator.refresh().await;
        assert!(!report.fallbacks.contains(&FieldGroup::Trips));
        assert!(coordinator.state.read(|vehicle| vehicle.trips.is_chronological()));

        let trips = coordinator.state.trips();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].end(), now.trunc_subsecs(3));
    }

    #[tokio::test]
    async fn test_manual_refresh_coalesces_with_in_flight() {
        let mut endpoint = ScriptedEndpoint::failing(FetchError::Status(404));
        endpoint.delay = Duration::from_millis(30);
        let (coordinator, endpoint, _) = coordinator(AcquisitionMode::Remote, endpoint, None);

        let scheduled = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(
            coordinator.request_refresh().await,
            RefreshOutcome::Coalesced
        ));
        scheduled.await.unwrap();
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 4);

        assert!(matches!(
            coordinator.request_refresh().await,
            RefreshOutcome::Completed(_)
        ));
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_simulated_mode_skips_endpoint() {
        let endpoint = ScriptedEndpoint::failing(FetchError::Timeout);
        let (coordinator, endpoint, bus) =
            coordinator(AcquisitionMode::Simulated, endpoint, None);
        let mut events = bus.subscribe_events();

        let report = coordinator.refresh().await;
        assert_eq!(report.mode, AcquisitionMode::Simulated);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
        assert_eq!(events.recv().await.unwrap().payload, EventPayload::StatusChanged);

        coordinator.set_mode(AcquisitionMode::Remote);
        assert_eq!(coordinator.refresh().await.mode, AcquisitionMode::Remote);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 4);
    }
}
