// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::energy::DecibelMilliWatt;

/// Exponentially weighted moving average of received signal strength.
///
/// The average is kept as an f64 so that a run of samples one dB away from an integer average
/// still moves it; rounding only happens when the average is read back as dBm.
#[derive(Clone, Debug, PartialEq)]
pub struct EwmaSignalStrength {
    current: f64,
    weighting_factor: f64,
}

impl EwmaSignalStrength {
    pub fn new(n: usize, initial_signal: DecibelMilliWatt) -> Self {
        Self { current: initial_signal.0.into(), weighting_factor: n as f64 }
    }

    pub fn dbm(&self) -> DecibelMilliWatt {
        DecibelMilliWatt(self.current.round() as i8)
    }

    pub fn update_average(&mut self, dbm: DecibelMilliWatt) {
        let weight = 2.0 / (1.0 + self.weighting_factor);
        self.current = weight * (dbm.0 as f64) + (1.0 - weight) * self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_towards_new_samples() {
        let mut ewma_signal = EwmaSignalStrength::new(10, DecibelMilliWatt(-50));
        assert_eq!(ewma_signal.dbm(), DecibelMilliWatt(-50));

        ewma_signal.update_average(DecibelMilliWatt(-60));
        assert_eq!(ewma_signal.dbm(), DecibelMilliWatt(-52));

        for _ in 0..15 {
            ewma_signal.update_average(DecibelMilliWatt(-60))
        }
        assert_eq!(ewma_signal.dbm(), DecibelMilliWatt(-60));
    }

    #[test]
    fn small_variations_accumulate() {
        let mut ewma_signal = EwmaSignalStrength::new(5, DecibelMilliWatt(-90));
        ewma_signal.update_average(DecibelMilliWatt(-91));
        assert_eq!(ewma_signal.dbm(), DecibelMilliWatt(-90));
        assert!(ewma_signal.current < -90.0);

        for _ in 0..5 {
            ewma_signal.update_average(DecibelMilliWatt(-91));
        }
        assert_eq!(ewma_signal.dbm(), DecibelMilliWatt(-91));
    }
}
