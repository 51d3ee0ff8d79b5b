// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {crate::error::FrameParseError, byteorder::{ByteOrder, LittleEndian}};

mod reason;
mod status;

pub use {reason::ReasonCode, status::StatusCode};

/// IEEE Std 802.11-2016, 9.4.1.1
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct AuthAlgorithmNumber(pub u16);

impl AuthAlgorithmNumber {
    pub const OPEN: Self = Self(0);
    pub const SHARED_KEY: Self = Self(1);
    pub const FAST_BSS_TRANSITION: Self = Self(2);
    pub const SAE: Self = Self(3);
}

/// Reads the reason code carried by a deauthentication or disassociation frame body.
/// IEEE Std 802.11-2016, 9.3.3.5 and 9.3.3.13
pub fn parse_reason_code(body: &[u8]) -> Result<ReasonCode, FrameParseError> {
    if body.len() < 2 {
        return Err(FrameParseError::TooShort { len: body.len(), min: 2 });
    }
    Ok(ReasonCode(LittleEndian::read_u16(&body[..2])))
}
