// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Received signal strength in dBm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DecibelMilliWatt(pub i8);

/// Signal strength at or below which quality is reported as 0%.
pub const SIGNAL_FLOOR_DBM: DecibelMilliWatt = DecibelMilliWatt(-100);
/// Signal strength at or above which quality is reported as 100%.
pub const SIGNAL_CEILING_DBM: DecibelMilliWatt = DecibelMilliWatt(-50);

/// Scales `value` against `full_scale` into a percentage, rounding to the nearest integer.
/// Values beyond `full_scale` saturate at 100 and a zero `full_scale` yields 0.
pub fn percent_of(value: u32, full_scale: u32) -> u8 {
    if full_scale == 0 {
        return 0;
    }
    let value = value.min(full_scale) as u64;
    let full_scale = full_scale as u64;
    ((value * 100 + full_scale / 2) / full_scale) as u8
}

/// Maps a signal strength onto 0..=100 between the signal floor and ceiling.
pub fn signal_quality_percent(dbm: DecibelMilliWatt) -> u8 {
    let floor = SIGNAL_FLOOR_DBM.0 as i32;
    let ceiling = SIGNAL_CEILING_DBM.0 as i32;
    let clamped = (dbm.0 as i32).clamp(floor, ceiling);
    percent_of((clamped - floor) as u32, (ceiling - floor) as u32)
}
