// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {std::time::Duration, wlan_common::TimeUnit};

/// Counts how long the serving BSS has gone without a beacon. Used to decide when a station
/// declares the link lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostBssCounter {
    /// Beacon period advertised by the AP, used to convert beacon counts to time.
    beacon_period: Duration,

    /// Time without a single beacon after which the BSS is lost.
    full_timeout: Duration,

    /// Reset to zero as soon as a beacon is seen.
    time_since_last_beacon: Duration,
}

/// A full status check interval is added every time the check timer fires, even though a beacon
/// may have arrived during that interval. Call `should_deauthenticate()` before
/// `add_beacon_interval()` so that the over-count never triggers a premature teardown.
impl LostBssCounter {
    pub fn start(beacon_period: u16, full_timeout_beacon_count: u32) -> Self {
        let beacon_period = Duration::from(TimeUnit(beacon_period));
        Self {
            beacon_period,
            full_timeout: beacon_period * full_timeout_beacon_count,
            time_since_last_beacon: Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.time_since_last_beacon = Duration::ZERO;
    }

    pub fn should_deauthenticate(&self) -> bool {
        self.time_since_last_beacon >= self.full_timeout
    }

    pub fn add_beacon_interval(&mut self, beacon_intervals_since_last_timeout: u32) {
        self.time_since_last_beacon += self.beacon_period * beacon_intervals_since_last_timeout;
    }

    /// Records time shorter than a full status check interval, e.g. time spent off channel.
    pub fn add_time(&mut self, time: Duration) {
        self.time_since_last_beacon += time;
    }
}
