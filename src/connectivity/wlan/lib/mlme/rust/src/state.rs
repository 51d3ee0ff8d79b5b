// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The two layered state machines of a session. The MLM state follows the link-level handshake
//! step by step; the SME state is the coarser session lifecycle that gates which confirmations
//! are accepted. Only a fixed set of (SME, MLM) pairs is legal and `LinkStates` refuses any
//! transition that would leave that set.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MlmState {
    Idle,
    /// Waiting for the target's beacon or probe response.
    Joining,
    /// BSS context installed, authentication not yet started.
    Joined,
    Authenticating,
    WaitAssocResponse,
    WaitAddBssResponse,
    WaitAddStaResponse,
    LinkEstablished,
    /// AP role: the BSS is beaconing.
    BssStarted,
    /// A deauthentication or disassociation frame was handed to the transmitter.
    WaitDeauthDisassoc,
    WaitDelStaResponse,
    WaitDelBssResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmeState {
    Idle,
    WaitStart,
    WaitJoin,
    WaitAuth,
    WaitPreAuth,
    WaitAssoc,
    WaitReassoc,
    NormalLinkEstablished,
    WaitDisassoc,
    WaitDeauth,
    JoinFailure,
    Offline,
}

impl MlmState {
    /// Whether the link-level machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: MlmState) -> bool {
        use MlmState::*;
        match (self, next) {
            (current, next) if current == next => true,
            // Any failure unwinds to idle, and cleanup of a BSS context may begin anywhere.
            (_, Idle) | (_, WaitDelBssResponse) => true,
            (Idle, Joining)
            | (Idle, WaitAddBssResponse)
            | (Joining, WaitAddBssResponse)
            | (WaitAddBssResponse, Joined)
            | (WaitAddBssResponse, BssStarted)
            | (WaitAddBssResponse, WaitAddStaResponse)
            | (Joined, Authenticating)
            | (Authenticating, WaitAssocResponse)
            | (WaitAssocResponse, WaitAddStaResponse)
            | (WaitAssocResponse, LinkEstablished)
            | (WaitAssocResponse, WaitDelStaResponse)
            | (WaitAddStaResponse, LinkEstablished)
            | (WaitAddStaResponse, WaitDelStaResponse)
            | (LinkEstablished, WaitAssocResponse)
            | (LinkEstablished, WaitDeauthDisassoc)
            | (LinkEstablished, WaitDelStaResponse)
            | (BssStarted, WaitDelStaResponse)
            | (WaitDeauthDisassoc, LinkEstablished)
            | (WaitDeauthDisassoc, WaitDelStaResponse)
            | (WaitDelBssResponse, WaitAddBssResponse) => true,
            _ => false,
        }
    }
}

/// The MLM states that may accompany each SME state.
pub fn legal_mlm_states(sme: SmeState) -> &'static [MlmState] {
    use MlmState::*;
    match sme {
        SmeState::Idle => &[Idle],
        SmeState::WaitStart => &[WaitAddBssResponse],
        SmeState::WaitJoin => &[Joining, WaitAddBssResponse],
        SmeState::WaitAuth => &[Joined, Authenticating],
        SmeState::WaitPreAuth => &[LinkEstablished],
        SmeState::WaitAssoc => &[WaitAssocResponse],
        // The old AP's contexts are replaced by the new one's once it accepts.
        SmeState::WaitReassoc => &[
            LinkEstablished,
            WaitAssocResponse,
            WaitDelStaResponse,
            WaitDelBssResponse,
            WaitAddBssResponse,
            WaitAddStaResponse,
        ],
        SmeState::NormalLinkEstablished => &[WaitAddStaResponse, LinkEstablished, BssStarted],
        SmeState::WaitDisassoc | SmeState::WaitDeauth => {
            &[WaitDeauthDisassoc, WaitDelStaResponse, WaitDelBssResponse]
        }
        SmeState::JoinFailure => &[Idle, WaitDelStaResponse, WaitDelBssResponse],
        SmeState::Offline => &[Idle, WaitDelStaResponse, WaitDelBssResponse],
    }
}

pub fn is_legal_pair(sme: SmeState, mlm: MlmState) -> bool {
    legal_mlm_states(sme).contains(&mlm)
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal transition from ({from_sme:?}, {from_mlm:?}) to ({to_sme:?}, {to_mlm:?})")]
pub struct IllegalTransition {
    pub from_sme: SmeState,
    pub from_mlm: MlmState,
    pub to_sme: SmeState,
    pub to_mlm: MlmState,
}

/// Current and previous states of both machines. The previous values are what a failed step
/// unwinds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStates {
    sme: SmeState,
    mlm: MlmState,
    prev_sme: SmeState,
    prev_mlm: MlmState,
}

impl Default for LinkStates {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStates {
    pub fn new() -> Self {
        Self {
            sme: SmeState::Idle,
            mlm: MlmState::Idle,
            prev_sme: SmeState::Idle,
            prev_mlm: MlmState::Idle,
        }
    }

    pub fn sme(&self) -> SmeState {
        self.sme
    }

    pub fn mlm(&self) -> MlmState {
        self.mlm
    }

    pub fn prev_sme(&self) -> SmeState {
        self.prev_sme
    }

    pub fn prev_mlm(&self) -> MlmState {
        self.prev_mlm
    }

    /// Moves both machines at once. On error nothing changes.
    pub fn transition(&mut self, sme: SmeState, mlm: MlmState) -> Result<(), IllegalTransition> {
        if !is_legal_pair(sme, mlm) || !self.mlm.can_transition_to(mlm) {
            return Err(IllegalTransition {
                from_sme: self.sme,
                from_mlm: self.mlm,
                to_sme: sme,
                to_mlm: mlm,
            });
        }
        if sme != self.sme {
            self.prev_sme = self.sme;
            self.sme = sme;
        }
        if mlm != self.mlm {
            self.prev_mlm = self.mlm;
            self.mlm = mlm;
        }
        Ok(())
    }

    pub fn set_sme(&mut self, sme: SmeState) -> Result<(), IllegalTransition> {
        self.transition(sme, self.mlm)
    }

    pub fn set_mlm(&mut self, mlm: MlmState) -> Result<(), IllegalTransition> {
        self.transition(self.sme, mlm)
    }

    /// Returns the SME machine to the state it had before its last change.
    pub fn restore_sme(&mut self) -> Result<(), IllegalTransition> {
        self.transition(self.prev_sme, self.mlm)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches, test_case::test_case};

    const ALL_SME: [SmeState; 12] = [
        SmeState::Idle,
        SmeState::WaitStart,
        SmeState::WaitJoin,
        SmeState::WaitAuth,
        SmeState::WaitPreAuth,
        SmeState::WaitAssoc,
        SmeState::WaitReassoc,
        SmeState::NormalLinkEstablished,
        SmeState::WaitDisassoc,
        SmeState::WaitDeauth,
        SmeState::JoinFailure,
        SmeState::Offline,
    ];

    #[test]
    fn every_sme_state_has_a_legal_pair() {
        for sme in ALL_SME {
            assert!(!legal_mlm_states(sme).is_empty(), "{:?}", sme);
        }
    }

    #[test_case(SmeState::Idle, MlmState::Idle => true)]
    #[test_case(SmeState::Idle, MlmState::Joined => false; "joined needs a live session")]
    #[test_case(SmeState::WaitJoin, MlmState::WaitAddBssResponse => true)]
    #[test_case(SmeState::WaitAssoc, MlmState::Authenticating => false)]
    #[test_case(SmeState::NormalLinkEstablished, MlmState::LinkEstablished => true)]
    #[test_case(SmeState::JoinFailure, MlmState::LinkEstablished => false)]
    #[test_case(SmeState::Offline, MlmState::WaitDelBssResponse => true)]
    #[test_case(SmeState::WaitReassoc, MlmState::LinkEstablished => true)]
    #[test_case(SmeState::WaitReassoc, MlmState::BssStarted => false)]
    fn legal_pairs(sme: SmeState, mlm: MlmState) -> bool {
        is_legal_pair(sme, mlm)
    }

    #[test]
    fn join_sequence() {
        let mut states = LinkStates::new();
        states.transition(SmeState::WaitJoin, MlmState::WaitAddBssResponse).expect("add bss");
        states.transition(SmeState::WaitAuth, MlmState::Joined).expect("joined");
        states.set_mlm(MlmState::Authenticating).expect("auth");
        states.transition(SmeState::WaitAssoc, MlmState::WaitAssocResponse).expect("assoc");
        states
            .transition(SmeState::NormalLinkEstablished, MlmState::WaitAddStaResponse)
            .expect("add sta");
        states.set_mlm(MlmState::LinkEstablished).expect("established");
        assert_eq!(states.sme(), SmeState::NormalLinkEstablished);
        assert_eq!(states.mlm(), MlmState::LinkEstablished);
        assert_eq!(states.prev_mlm(), MlmState::WaitAddStaResponse);
        assert_eq!(states.prev_sme(), SmeState::WaitAssoc);
    }

    #[test]
    fn reassoc_replaces_bss() {
        let mut states = LinkStates::new();
        states.transition(SmeState::WaitJoin, MlmState::WaitAddBssResponse).expect("add bss");
        states.transition(SmeState::WaitAuth, MlmState::Joined).expect("joined");
        states.set_mlm(MlmState::Authenticating).expect("auth");
        states.transition(SmeState::WaitAssoc, MlmState::WaitAssocResponse).expect("assoc");
        states
            .transition(SmeState::NormalLinkEstablished, MlmState::LinkEstablished)
            .expect("established");
        states.set_sme(SmeState::WaitReassoc).expect("switching channel");
        states.set_mlm(MlmState::WaitAssocResponse).expect("reassoc");
        states.set_mlm(MlmState::WaitDelStaResponse).expect("del sta");
        states.set_mlm(MlmState::WaitDelBssResponse).expect("del bss");
        states.set_mlm(MlmState::WaitAddBssResponse).expect("add bss");
        states.set_mlm(MlmState::WaitAddStaResponse).expect("add sta");
        states
            .transition(SmeState::NormalLinkEstablished, MlmState::LinkEstablished)
            .expect("established");
    }

    #[test]
    fn illegal_transition_leaves_states_unchanged() {
        let mut states = LinkStates::new();
        states.transition(SmeState::WaitJoin, MlmState::Joining).expect("joining");
        let before = states;

        // Legal pair, but the link machine cannot skip the BSS context.
        assert_matches!(
            states.transition(SmeState::WaitAuth, MlmState::Authenticating),
            Err(IllegalTransition { from_mlm: MlmState::Joining, .. })
        );
        // Reachable link state, but not a legal pair.
        assert_matches!(states.set_sme(SmeState::Idle), Err(_));
        assert_eq!(states, before);
    }

    #[test]
    fn restore_sme_after_pre_auth() {
        let mut states = LinkStates::new();
        states.transition(SmeState::WaitJoin, MlmState::WaitAddBssResponse).expect("add bss");
        states.transition(SmeState::WaitAuth, MlmState::Joined).expect("joined");
        states.set_mlm(MlmState::Authenticating).expect("auth");
        states.transition(SmeState::WaitAssoc, MlmState::WaitAssocResponse).expect("assoc");
        states
            .transition(SmeState::NormalLinkEstablished, MlmState::LinkEstablished)
            .expect("established");
        states.set_sme(SmeState::WaitPreAuth).expect("pre-auth");
        states.restore_sme().expect("restore");
        assert_eq!(states.sme(), SmeState::NormalLinkEstablished);
        assert_eq!(states.mlm(), MlmState::LinkEstablished);
    }

    #[test]
    fn teardown_from_any_state_reaches_idle() {
        let mut states = LinkStates::new();
        states.transition(SmeState::WaitJoin, MlmState::Joining).expect("joining");
        states.transition(SmeState::JoinFailure, MlmState::Idle).expect("failure");
        states.transition(SmeState::Idle, MlmState::Idle).expect("idle");
    }
}
