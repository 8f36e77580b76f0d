// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Event bus for status and alert notifications

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::alerts::{Alert, AlertKind};

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    StatusChanged,
    Alert,
    CriticalAlert,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Re-read the snapshot and trip history
    StatusChanged,
    AlertRaised { kind: AlertKind, message: String },
    CriticalAlertRaised { title: String, message: String },
}

/// Broadcast hub between the producers (simulator, coordinator) and
/// whoever renders or notifies. Publishing never waits on subscribers; a
/// receiver that falls behind loses the oldest events.
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    alert_tx: broadcast::Sender<Alert>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        let (alert_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            alert_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish_status_changed(&self) {
        self.publish_event(EventType::StatusChanged, EventPayload::StatusChanged);
    }

    /// Publish one alert; critical kinds also go out as a critical alert.
    pub fn publish_alert(&self, alert: Alert) {
        let _ = self.alert_tx.send(alert.clone());

        if alert.kind.is_critical() {
            self.publish_event(
                EventType::CriticalAlert,
                EventPayload::CriticalAlertRaised {
                    title: alert.kind.title().to_string(),
                    message: alert.message.clone(),
                },
            );
        }

        self.publish_event(
            EventType::Alert,
            EventPayload::AlertRaised {
                kind: alert.kind,
                message: alert.message,
            },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alert_tx.subscribe()
    }

    /// Number of events published so far
    pub fn published(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
