//! Main engine - wires the state, simulator, coordinator and store together

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{Event, EventBus};
use crate::acquisition::{AcquisitionCoordinator, HttpEndpoint, RefreshOutcome};
use crate::alerts::{Alert, AlertEvaluator};
use crate::config::{AcquisitionMode, Config};
use crate::db::Database;
use crate::telemetry::{Scenario, ScenarioEngine, SharedState, StatusSnapshot, TripRecord};

/// Main CarMon engine
pub struct Engine {
    pub config: Arc<Config>,
    state: SharedState,
    event_bus: Arc<EventBus>,
    database: Option<Arc<Database>>,
    simulator: Option<Arc<ScenarioEngine>>,
    coordinator: Arc<AcquisitionCoordinator>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    start_time: Option<Instant>,
}

impl Engine {
    /// Build the engine, opening the store when it is enabled
    pub fn new(config: Config) -> Result<Self> {
        let database = if config.database.enabled {
            Some(Arc::new(Database::open(&config.database)?))
        } else {
            None
        };
        Self::with_database(config, database)
    }

    pub fn with_database(config: Config, database: Option<Arc<Database>>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let state = SharedState::new(config.simulation.history_capacity);
        let event_bus = Arc::new(EventBus::default());
        let evaluator = AlertEvaluator::new(config.alerts.clone());
        let mode = config.acquisition.mode;

        let stored_trips = match &database {
            Some(db) => db.all_trips().unwrap_or_else(|e| {
                warn!("Failed to load stored trips: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let simulator = match mode {
            AcquisitionMode::Simulated => Some(Arc::new(ScenarioEngine::new(
                config.simulation.clone(),
                state.clone(),
                evaluator.clone(),
                event_bus.clone(),
                database.clone(),
                stored_trips,
                Utc::now(),
            ))),
            AcquisitionMode::Remote => {
                state.update(|vehicle| vehicle.trips.replace(stored_trips));
                None
            }
        };

        let endpoint = Arc::new(HttpEndpoint::new(
            &config.acquisition.base_url,
            config.acquisition.fetch_timeout(),
        )?);
        let coordinator = Arc::new(AcquisitionCoordinator::new(
            mode,
            endpoint,
            config.acquisition.fetch_timeout(),
            state.clone(),
            evaluator,
            event_bus.clone(),
            database.clone(),
            config.simulation.seed,
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            state,
            event_bus,
            database,
            simulator,
            coordinator,
            shutdown_tx,
            tasks: Vec::new(),
            start_time: None,
        })
    }

    /// Apply retention and start the timer for the active mode
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            bail!("engine already running");
        }
        info!("Starting CarMon engine...");

        if let Some(db) = &self.database {
            let cutoff = Utc::now() - Duration::days(i64::from(self.config.database.retention_days));
            let removed = db.cleanup(cutoff)?;
            info!("Retention removed {} old records", removed);
        }

        match &self.simulator {
            Some(simulator) => {
                let task = simulator.clone().run(self.shutdown_tx.subscribe());
                self.tasks.push(tokio::spawn(task));
            }
            None => {
                let period = self.config.acquisition.refresh_interval();
                let task = self
                    .coordinator
                    .clone()
                    .run(period, self.shutdown_tx.subscribe());
                self.tasks.push(tokio::spawn(task));
            }
        }

        self.start_time = Some(Instant::now());
        info!("CarMon engine started in {:?} mode", self.coordinator.mode());
        Ok(())
    }

    /// Stop the timers and wait for them to finish
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping CarMon engine...");

        let _ = self.shutdown_tx.send(());
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Engine task ended abnormally: {}", e);
            }
        }
        self.start_time = None;

        info!("CarMon engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Manual refresh; coalesced when one is already in flight
    pub async fn refresh(&self) -> RefreshOutcome {
        self.coordinator.request_refresh().await
    }

    pub fn force_scenario(&self, scenario: Scenario) -> Result<()> {
        match &self.simulator {
            Some(simulator) => {
                simulator.force_scenario(scenario, Utc::now());
                Ok(())
            }
            None => bail!("scenarios can only be forced in simulated mode"),
        }
    }

    /// Active scenario, `None` when reading from the vehicle
    pub fn scenario(&self) -> Option<Scenario> {
        self.simulator.as_ref().map(|s| s.scenario())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    pub fn trips(&self) -> Vec<TripRecord> {
        self.state.trips()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe_events()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.event_bus.subscribe_alerts()
    }

    pub fn coordinator(&self) -> &Arc<AcquisitionCoordinator> {
        &self.coordinator
    }

    pub fn database(&self) -> Option<&Arc<Database>> {
        self.database.as_ref()
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }
}
