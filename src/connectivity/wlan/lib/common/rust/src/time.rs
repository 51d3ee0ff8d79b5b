// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::time::Duration;

/// IEEE Std 802.11-2016, 3.1: a time unit is 1024 microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeUnit(pub u16);

impl TimeUnit {
    pub const DEFAULT_BEACON_INTERVAL: Self = Self(100);

    pub fn into_micros(self) -> u64 {
        self.0 as u64 * 1024
    }
}

impl From<TimeUnit> for Duration {
    fn from(tu: TimeUnit) -> Duration {
        Duration::from_micros(tu.into_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_unit_to_duration() {
        assert_eq!(Duration::from(TimeUnit(1)), Duration::from_micros(1024));
        assert_eq!(
            Duration::from(TimeUnit::DEFAULT_BEACON_INTERVAL),
            Duration::from_micros(102_400)
        );
    }
}
