// Copyright 2025 Seriesflow Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Clock and identifier generation capability.
//!
//! All timestamps, run ids and version stamps in the engine flow through
//! this trait so that tests stay deterministic.

use crate::ids::{RunId, VersionStamp};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Time and identifier source.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC time as an RFC 3339 string.
    fn now_iso(&self) -> String {
        self.now().to_rfc3339()
    }

    /// Fresh run identifier.
    fn new_run_id(&self) -> RunId;

    /// Fresh version stamp: ISO-derived, second precision, no colons.
    fn new_version_stamp(&self) -> VersionStamp {
        VersionStamp::new(self.now().format("%Y-%m-%dT%H-%M-%S").to_string())
    }
}

/// Production clock backed by the system time and UUIDv4.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn new_run_id(&self) -> RunId {
        RunId::new(Uuid::new_v4().to_string())
    }
}

/// Deterministic clock for tests.
///
/// Every `new_version_stamp` advances the base time by one second so that
/// consecutive stamps within a test remain strictly ordered.
pub struct ManualClock {
    base: DateTime<Utc>,
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            ticks: AtomicU64::new(0),
        }
    }

    /// Clock pinned at 2024-01-01T00:00:00Z.
    pub fn epoch_2024() -> Self {
        Self::new(
            DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .expect("valid timestamp")
                .with_timezone(&Utc),
        )
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ticks = self.ticks.load(Ordering::SeqCst);
        self.base + Duration::seconds(ticks as i64)
    }

    fn new_run_id(&self) -> RunId {
        let n = self.ticks.load(Ordering::SeqCst);
        RunId::new(format!("run-{n:04}"))
    }

    fn new_version_stamp(&self) -> VersionStamp {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        let at = self.base + Duration::seconds(n as i64);
        VersionStamp::new(at.format("%Y-%m-%dT%H-%M-%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_stamps_contain_no_colons() {
        let clock = SystemClock;
        let stamp = clock.new_version_stamp();
        assert!(!stamp.as_str().contains(':'));
    }

    #[test]
    fn manual_clock_stamps_are_monotonic() {
        let clock = ManualClock::epoch_2024();
        let a = clock.new_version_stamp();
        let b = clock.new_version_stamp();
        assert!(a < b);
        assert_eq!(a.as_str(), "2024-01-01T00-00-00");
        assert_eq!(b.as_str(), "2024-01-01T00-00-01");
    }
}
