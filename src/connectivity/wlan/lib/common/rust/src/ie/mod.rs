// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use zerocopy::{AsBytes, FromBytes, Unaligned};

mod fields;
pub mod multi_link;
mod parsed;
mod reader;
pub mod rsn;

pub use {fields::*, parsed::*, reader::*};

#[repr(C, packed)]
#[derive(AsBytes, FromBytes, Unaligned, PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Id(pub u8);

// IEEE Std 802.11-2020, 9.4.2.1, Table 9-92
impl Id {
    pub const SSID: Self = Self(0);
    pub const SUPPORTED_RATES: Self = Self(1);
    pub const DSSS_PARAM_SET: Self = Self(3);
    pub const TIM: Self = Self(5);
    pub const COUNTRY: Self = Self(7);
    pub const EDCA_PARAM_SET: Self = Self(12);
    pub const CHALLENGE_TEXT: Self = Self(16);
    pub const CHANNEL_SWITCH_ANNOUNCEMENT: Self = Self(37);
    pub const QUIET: Self = Self(40);
    pub const HT_CAPABILITIES: Self = Self(45);
    pub const RSNE: Self = Self(48);
    pub const EXTENDED_SUPPORTED_RATES: Self = Self(50);
    pub const EXT_CHANNEL_SWITCH_ANNOUNCEMENT: Self = Self(60);
    pub const HT_OPERATION: Self = Self(61);
    pub const EXT_CAPABILITIES: Self = Self(127);
    pub const VHT_CAPABILITIES: Self = Self(191);
    pub const VHT_OPERATION: Self = Self(192);
    pub const WIDE_BANDWIDTH_CHANNEL_SWITCH: Self = Self(194);
    pub const CHANNEL_SWITCH_WRAPPER: Self = Self(196);
    pub const OPERATING_MODE_NOTIFICATION: Self = Self(199);
    pub const VENDOR_SPECIFIC: Self = Self(221);
    pub const EXTENSION: Self = Self(255);
}

/// Element ID Extension values. IEEE Std 802.11-2020, 9.4.2.1, Table 9-92 and
/// IEEE P802.11be/D3.0, Table 9-92.
pub struct ExtId;

impl ExtId {
    pub const HE_CAPABILITIES: u8 = 35;
    pub const HE_OPERATION: u8 = 36;
    pub const BSS_COLOR_CHANGE: u8 = 42;
    pub const MAX_CHANNEL_SWITCH_TIME: u8 = 52;
    pub const EHT_OPERATION: u8 = 106;
    pub const MULTI_LINK: u8 = 107;
    pub const EHT_CAPABILITIES: u8 = 108;
}

#[repr(C, packed)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy, Debug)]
pub struct Header {
    pub id: Id,
    pub body_len: u8,
}

/// How an element is identified: by its ID, by a vendor OUI prefix or by an extension ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IeType {
    Basic(Id),
    Vendor([u8; 6]),
    Extended(u8),
}

impl IeType {
    pub fn new_basic(id: Id) -> Self {
        IeType::Basic(id)
    }

    pub fn new_vendor(prefix: [u8; 6]) -> Self {
        IeType::Vendor(prefix)
    }

    pub fn new_extended(ext_id: u8) -> Self {
        IeType::Extended(ext_id)
    }

    /// Bytes at the start of the body that identify the element rather than carry its content.
    pub fn extra_len(&self) -> usize {
        match self {
            IeType::Basic(_) => 0,
            IeType::Vendor(_) => 6,
            IeType::Extended(_) => 1,
        }
    }
}

// Vendor prefix of the WPA1 element: Microsoft OUI, type 1.
pub const WPA1_VENDOR_PREFIX: [u8; 4] = [0x00, 0x50, 0xf2, 0x01];
