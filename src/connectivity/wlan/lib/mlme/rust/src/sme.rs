// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The SME gate: which confirmations a session accepts in each of its SME states. A
//! confirmation that arrives in any other state is a protocol error and is dropped without
//! touching the session.

use crate::{error::Error, state::LinkStates, state::SmeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    AddBss,
    Auth,
    Assoc,
    AddSta,
    DelSta,
    DelBss,
    SetKey,
    SwitchChannel,
    DisconnectTx,
    SaQuery,
}

impl Confirm {
    fn name(self) -> &'static str {
        match self {
            Confirm::AddBss => "AddBssResponse",
            Confirm::Auth => "AuthConfirm",
            Confirm::Assoc => "AssocConfirm",
            Confirm::AddSta => "AddStaResponse",
            Confirm::DelSta => "DelStaResponse",
            Confirm::DelBss => "DelBssResponse",
            Confirm::SetKey => "SetKeyResponse",
            Confirm::SwitchChannel => "SwitchChannelResponse",
            Confirm::DisconnectTx => "DisconnectTxConfirm",
            Confirm::SaQuery => "SaQueryResponse",
        }
    }
}

pub fn accepts(confirm: Confirm, sme: SmeState) -> bool {
    use SmeState::*;
    // The link to the current AP stays up while a pre-authentication or reassociation runs.
    let link_up = matches!(sme, NormalLinkEstablished | WaitPreAuth | WaitReassoc);
    match confirm {
        Confirm::AddBss => matches!(sme, WaitJoin | WaitStart | WaitReassoc),
        Confirm::Auth => matches!(sme, WaitAuth | WaitPreAuth),
        Confirm::Assoc => matches!(sme, WaitAssoc | WaitReassoc),
        Confirm::AddSta => matches!(sme, NormalLinkEstablished | WaitReassoc),
        Confirm::DelSta => matches!(
            sme,
            NormalLinkEstablished | WaitReassoc | WaitDisassoc | WaitDeauth | JoinFailure | Offline
        ),
        Confirm::DelBss => {
            matches!(sme, WaitReassoc | WaitDisassoc | WaitDeauth | JoinFailure | Offline)
        }
        Confirm::SetKey | Confirm::SwitchChannel | Confirm::SaQuery => link_up,
        Confirm::DisconnectTx => matches!(sme, NormalLinkEstablished | WaitDisassoc | WaitDeauth),
    }
}

/// Fails with a protocol error unless `states` accept `confirm`.
pub fn check(confirm: Confirm, states: &LinkStates) -> Result<(), Error> {
    match accepts(confirm, states.sme()) {
        true => Ok(()),
        false => Err(Error::UnexpectedMessage {
            msg: confirm.name(),
            sme: states.sme(),
            mlm: states.mlm(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*, crate::state::MlmState, assert_matches::assert_matches, test_case::test_case,
    };

    #[test_case(Confirm::AddBss, SmeState::WaitJoin => true)]
    #[test_case(Confirm::AddBss, SmeState::NormalLinkEstablished => false)]
    #[test_case(Confirm::Auth, SmeState::WaitPreAuth => true)]
    #[test_case(Confirm::Auth, SmeState::WaitAssoc => false)]
    #[test_case(Confirm::Assoc, SmeState::WaitAuth => false)]
    #[test_case(Confirm::AddSta, SmeState::WaitReassoc => true)]
    #[test_case(Confirm::DelBss, SmeState::JoinFailure => true)]
    #[test_case(Confirm::DelBss, SmeState::NormalLinkEstablished => false)]
    #[test_case(Confirm::SetKey, SmeState::WaitAssoc => false)]
    #[test_case(Confirm::SetKey, SmeState::WaitReassoc => true)]
    #[test_case(Confirm::SaQuery, SmeState::NormalLinkEstablished => true)]
    #[test_case(Confirm::SaQuery, SmeState::WaitPreAuth => true)]
    #[test_case(Confirm::SaQuery, SmeState::WaitReassoc => true)]
    #[test_case(Confirm::SaQuery, SmeState::WaitDeauth => false)]
    #[test_case(Confirm::SwitchChannel, SmeState::WaitPreAuth => true)]
    #[test_case(Confirm::SwitchChannel, SmeState::WaitReassoc => true)]
    #[test_case(Confirm::SwitchChannel, SmeState::JoinFailure => false)]
    #[test_case(Confirm::AddBss, SmeState::WaitReassoc => true)]
    #[test_case(Confirm::DelSta, SmeState::WaitReassoc => true)]
    fn gate(confirm: Confirm, sme: SmeState) -> bool {
        accepts(confirm, sme)
    }

    #[test]
    fn check_reports_state() {
        let states = LinkStates::new();
        assert_matches!(
            check(Confirm::Auth, &states),
            Err(Error::UnexpectedMessage {
                msg: "AuthConfirm",
                sme: SmeState::Idle,
                mlm: MlmState::Idle
            })
        );
    }
}
