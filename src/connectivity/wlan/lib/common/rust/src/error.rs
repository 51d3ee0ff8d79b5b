// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

/// Failure to parse or validate a received frame or one of its elements.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FrameParseError {
    #[error("frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
    #[error("unexpected frame type {frame_type} subtype {subtype}")]
    UnexpectedFrameType { frame_type: u8, subtype: u8 },
    #[error("element {id} has invalid length {len}")]
    InvalidElementLength { id: u8, len: usize },
    #[error("malformed RSNE: {0}")]
    MalformedRsne(String),
    #[error("malformed multi-link element: {0}")]
    MalformedMultiLink(&'static str),
    #[error("malformed per-STA profile for link {link_id:?}: {reason}")]
    MalformedPerStaProfile { link_id: Option<u8>, reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            format!("{}", FrameParseError::TooShort { len: 3, min: 24 }),
            "frame too short: 3 bytes, need at least 24"
        );
        assert_eq!(
            format!(
                "{}",
                FrameParseError::MalformedPerStaProfile { link_id: Some(2), reason: "x" }
            ),
            "malformed per-STA profile for link Some(2): x"
        );
    }
}
