// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod rsne;

/// IEEE Std 802.11-2016, 9.4.2.25.2, Table 9-131: the 00-0F-AC OUI used by standard suites.
pub const OUI: [u8; 3] = [0x00, 0x0f, 0xac];

/// A cipher or AKM suite selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuiteSelector {
    pub oui: [u8; 3],
    pub suite_type: u8,
}

impl SuiteSelector {
    pub fn is_standard(&self) -> bool {
        self.oui == OUI
    }
}
