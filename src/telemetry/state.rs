// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Shared vehicle state handed to the simulator and the coordinator

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::{StatusSnapshot, TripHistory, TripRecord};

/// Snapshot plus trip history, always read and written together
#[derive(Debug, Clone, Serialize)]
pub struct VehicleState {
    pub status: StatusSnapshot,
    pub trips: TripHistory,
}

/// Owned handle to the single vehicle state instance.
///
/// Anyone may read; only the scenario engine and the acquisition
/// coordinator write, through the crate-private [`SharedState::update`].
/// Each update runs under one write lock, so readers never observe half of
/// a field group.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<RwLock<VehicleState>>,
}

impl SharedState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(VehicleState {
                status: StatusSnapshot::new(),
                trips: TripHistory::new(history_capacity),
            })),
        }
    }

    /// Copy of the current status
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().status.clone()
    }

    /// Copy of the trip history, newest first
    pub fn trips(&self) -> Vec<TripRecord> {
        self.inner.read().trips.to_vec()
    }

    pub fn read<R>(&self, f: impl FnOnce(&VehicleState) -> R) -> R {
        f(&self.inner.read())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut VehicleState) -> R) -> R {
        f(&mut self.inner.write())
    }
}
