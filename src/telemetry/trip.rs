// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Trip records and the bounded, newest-first trip history

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Local, SubsecRound, Utc};
use serde::Serialize;

/// Default number of trips kept in the history
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Location label used when none is known
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Battery-per-kilometre efficiency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Efficiency {
    Excellent,
    Good,
    Fair,
    Poor,
    /// No distance was covered, so no ratio exists
    NotAvailable,
}

impl Efficiency {
    /// Classify a consumption ratio in percent per kilometre
    pub fn from_ratio(percent_per_km: f64) -> Self {
        if percent_per_km <= 8.0 {
            Self::Excellent
        } else if percent_per_km <= 12.0 {
            Self::Good
        } else if percent_per_km <= 18.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for Efficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::NotAvailable => "N/A",
        };
        f.write_str(label)
    }
}

/// One completed trip.
///
/// `end` is the moment the trip finished, kept to millisecond precision;
/// the start is derived from it.
/// Two records are the same trip when their `(id, end)` pairs match, even if
/// the display fields differ.
#[derive(Debug, Clone, Serialize)]
pub struct TripRecord {
    id: Option<i64>,
    end: DateTime<Utc>,
    distance_km: f64,
    duration_secs: u64,
    average_speed_kmh: f64,
    battery_consumed: u8,
    start_location: String,
    end_location: String,
}

impl TripRecord {
    /// A trip as observed by the vehicle, before it has a store id
    pub fn observed(
        end: DateTime<Utc>,
        distance_km: f64,
        duration_secs: i64,
        average_speed_kmh: f64,
        battery_consumed: i32,
    ) -> Self {
        Self {
            id: None,
            end: end.trunc_subsecs(3),
            distance_km: non_negative(distance_km),
            duration_secs: duration_secs.max(0) as u64,
            average_speed_kmh: non_negative(average_speed_kmh),
            battery_consumed: battery_consumed.clamp(0, 100) as u8,
            start_location: UNKNOWN_LOCATION.to_string(),
            end_location: UNKNOWN_LOCATION.to_string(),
        }
    }

    /// A fully described trip, typically loaded back from the store
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        end: DateTime<Utc>,
        distance_km: f64,
        duration_secs: i64,
        average_speed_kmh: f64,
        battery_consumed: i32,
        start_location: Option<String>,
        end_location: Option<String>,
    ) -> Self {
        let mut trip = Self::observed(
            end,
            distance_km,
            duration_secs,
            average_speed_kmh,
            battery_consumed,
        );
        trip.id = Some(id);
        trip.start_location = start_location.unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        trip.end_location = end_location.unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        trip
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_locations(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_location = start.into();
        self.end_location = end.into();
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Saturates at the earliest representable instant for absurd durations
    pub fn start(&self) -> DateTime<Utc> {
        self.checked_start().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `None` when the start would fall outside the representable range
    pub fn checked_start(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|duration| self.end.checked_sub_signed(duration))
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn average_speed_kmh(&self) -> f64 {
        self.average_speed_kmh
    }

    pub fn battery_consumed(&self) -> u8 {
        self.battery_consumed
    }

    pub fn start_location(&self) -> &str {
        &self.start_location
    }

    pub fn end_location(&self) -> &str {
        &self.end_location
    }

    /// Battery percent used per kilometre, if any distance was covered
    pub fn consumption_per_km(&self) -> Option<f64> {
        (self.distance_km > 0.0).then(|| f64::from(self.battery_consumed) / self.distance_km)
    }

    pub fn efficiency(&self) -> Efficiency {
        self.consumption_per_km()
            .map(Efficiency::from_ratio)
            .unwrap_or(Efficiency::NotAvailable)
    }

    /// More than 800 m or more than half an hour
    pub fn is_long_trip(&self) -> bool {
        self.distance_km > 0.8 || self.duration_secs > 1800
    }

    pub fn is_efficient_trip(&self) -> bool {
        self.consumption_per_km().is_some_and(|ratio| ratio <= 12.0)
    }

    pub fn is_high_speed_trip(&self) -> bool {
        self.average_speed_kmh > 8.0
    }

    /// True when the two trips share any instant
    pub fn overlaps(&self, other: &TripRecord) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }

    pub fn formatted_date(&self) -> String {
        self.end.with_timezone(&Local).format("%b %d, %Y").to_string()
    }

    pub fn formatted_time(&self) -> String {
        self.end.with_timezone(&Local).format("%H:%M").to_string()
    }

    pub fn formatted_date_time(&self) -> String {
        self.end.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string()
    }

    pub fn formatted_time_range(&self) -> String {
        let start = match self.checked_start() {
            Some(start) => start.with_timezone(&Local).format("%H:%M").to_string(),
            None => "--:--".to_string(),
        };
        format!("{} - {}", start, self.formatted_time())
    }

    pub fn formatted_distance(&self) -> String {
        if self.distance_km < 1.0 {
            format!("{:.0} m", self.distance_km * 1000.0)
        } else {
            format!("{:.2} km", self.distance_km)
        }
    }

    pub fn formatted_duration(&self) -> String {
        let hours = self.duration_secs / 3600;
        let minutes = (self.duration_secs % 3600) / 60;
        let seconds = self.duration_secs % 60;

        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    pub fn formatted_average_speed(&self) -> String {
        format!("{:.1} km/h", self.average_speed_kmh)
    }
}

impl PartialEq for TripRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.end == other.end
    }
}

impl Eq for TripRecord {}

impl Hash for TripRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.end.hash(state);
    }
}

/// Trips ordered newest-first, bounded by a fixed capacity
#[derive(Debug, Clone, Serialize)]
pub struct TripHistory {
    trips: Vec<TripRecord>,
    capacity: usize,
}

impl TripHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            trips: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a history from records in any order, keeping the newest ones
    pub fn from_records(records: Vec<TripRecord>, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        history.replace(records);
        history
    }

    /// Replace the contents with `records` in any order. Newest trips win:
    /// a trip overlapping a newer kept one is dropped. Returns how many were
    /// dropped for overlapping.
    pub fn replace(&mut self, mut records: Vec<TripRecord>) -> usize {
        records.sort_by(|a, b| b.end().cmp(&a.end()));

        let mut kept: Vec<TripRecord> = Vec::with_capacity(self.capacity);
        let mut overlapping = 0;
        for trip in records {
            if kept.len() == self.capacity {
                break;
            }
            match kept.last() {
                Some(newer) if trip.end() > newer.start() => overlapping += 1,
                _ => kept.push(trip),
            }
        }

        self.trips = kept;
        overlapping
    }

    /// Insert the most recent trip at the head, evicting the oldest overflow.
    /// Returns how many trips were evicted.
    pub fn push_latest(&mut self, trip: TripRecord) -> usize {
        self.trips.insert(0, trip);
        let evicted = self.trips.len().saturating_sub(self.capacity);
        self.trips.truncate(self.capacity);
        evicted
    }

    pub fn latest(&self) -> Option<&TripRecord> {
        self.trips.first()
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &TripRecord> {
        self.trips.iter()
    }

    pub fn as_slice(&self) -> &[TripRecord] {
        &self.trips
    }

    pub fn to_vec(&self) -> Vec<TripRecord> {
        self.trips.clone()
    }

    /// Every trip starts no earlier than the end of the trip before it
    pub fn is_chronological(&self) -> bool {
        self.trips
            .windows(2)
            .all(|pair| pair[0].start() >= pair[1].end())
    }
}

impl Default for TripHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}
