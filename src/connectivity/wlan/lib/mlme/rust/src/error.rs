// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        session::{SessionHandle, VdevId},
        state::{IllegalTransition, LinkStates, MlmState, SmeState},
    },
    thiserror::Error,
    wlan_common::{error::FrameParseError, mac::MacAddr},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no live session for {0:?}")]
    UnknownSession(SessionHandle),
    #[error("session for bssid {bssid:02x?} on vdev {vdev_id} already exists")]
    DuplicateSession { bssid: MacAddr, vdev_id: VdevId },
    #[error("vdev {0} already has a session")]
    VdevBusy(VdevId),
    #[error("session table full; capacity {0}")]
    TableFull(usize),
    #[error("peer table full")]
    PeerTableFull,
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    #[error("unexpected {msg} in SME state {sme:?}, MLM state {mlm:?}")]
    UnexpectedMessage { msg: &'static str, sme: SmeState, mlm: MlmState },
    #[error("error parsing frame: {0}")]
    ParsingFrame(#[from] FrameParseError),
    #[error("out of buffers; requested {0} bytes")]
    NoResources(usize),
    #[error("firmware request failed: {0}")]
    Firmware(anyhow::Error),
}

impl Error {
    pub fn unexpected(msg: &'static str, states: &LinkStates) -> Self {
        Error::UnexpectedMessage { msg, sme: states.sme(), mlm: states.mlm() }
    }

    /// A message that arrived in a state where it is not valid. The message is dropped and the
    /// session is left as it was.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedMessage { .. }
                | Error::IllegalTransition(_)
                | Error::UnknownSession(_)
        )
    }

    /// Errors that never leave the engine: protocol errors and malformed frames. Everything else
    /// is reported to the upper layer as a failed or torn-down session.
    pub fn is_contained(&self) -> bool {
        self.is_protocol_error() || matches!(self, Error::ParsingFrame(_))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, anyhow::format_err};

    #[test]
    fn classification() {
        let unexpected = Error::UnexpectedMessage {
            msg: "AuthCnf",
            sme: SmeState::Idle,
            mlm: MlmState::Idle,
        };
        assert!(unexpected.is_protocol_error());
        assert!(unexpected.is_contained());

        let parse = Error::from(FrameParseError::TooShort { len: 3, min: 24 });
        assert!(!parse.is_protocol_error());
        assert!(parse.is_contained());

        assert!(!Error::NoResources(2048).is_contained());
        assert!(!Error::Firmware(format_err!("queue full")).is_contained());
        assert!(!Error::TableFull(8).is_contained());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            format!("{}", Error::DuplicateSession { bssid: [1, 2, 3, 4, 5, 6], vdev_id: 2 }),
            "session for bssid [01, 02, 03, 04, 05, 06] on vdev 2 already exists"
        );
        assert_eq!(
            format!("{}", Error::Firmware(format_err!("queue full"))),
            "firmware request failed: queue full"
        );
    }
}
