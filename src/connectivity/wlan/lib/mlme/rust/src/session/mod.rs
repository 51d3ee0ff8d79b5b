// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-vdev association contexts and the table that owns them.

pub mod capabilities;
mod peer;
mod store;

pub use {peer::*, store::SessionStore};

use {
    crate::{
        client::lost_bss::LostBssCounter,
        context::TimerKind,
        device::{LinkSummary, UpperLayerEvent},
        mlo::MloLink,
        state::{LinkStates, SmeState},
        timer::EventId,
    },
    capabilities::NegotiatedCapabilities,
    std::collections::HashMap,
    wlan_common::{
        energy::signal_quality_percent,
        ewma_signal::EwmaSignalStrength,
        ie::{EdcaParamSet, ParsedIes},
        mac::{mgmt::AuthAlgorithmNumber, CapabilityInfo, MacAddr, ReasonCode},
    },
};

pub type VdevId = u8;

/// Dense index of a session in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u8);

/// A stable reference to a session. It stops resolving once the session is deleted, even if its
/// slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: SessionId,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Ap,
    Monitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    Deauth,
    Disassoc,
}

/// The beacon or probe response of record for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBeacon {
    pub frame: Vec<u8>,
    pub timestamp: u64,
    pub beacon_interval: u16,
    pub capabilities: CapabilityInfo,
    pub ies: ParsedIes,
}

/// An announced switch of the operating channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSwitch {
    pub channel: u8,
    pub operating_class: Option<u8>,
    pub mode: u8,
    pub count: u8,
}

impl ChannelSwitch {
    /// The switch announced by `ies`. An extended announcement takes precedence.
    pub fn from_ies(ies: &ParsedIes) -> Option<Self> {
        ies.ecsa
            .map(|ecsa| ChannelSwitch {
                channel: ecsa.new_channel_number,
                operating_class: Some(ecsa.new_operating_class),
                mode: ecsa.mode,
                count: ecsa.channel_switch_count,
            })
            .or_else(|| {
                ies.csa.map(|csa| ChannelSwitch {
                    channel: csa.new_channel_number,
                    operating_class: None,
                    mode: csa.mode,
                    count: csa.channel_switch_count,
                })
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinContext {
    pub auth_algorithm: AuthAlgorithmNumber,
    /// Open system may still be tried after shared key fails.
    pub auth_fallback: bool,
    pub listen_interval: u16,
}

impl Default for JoinContext {
    fn default() -> Self {
        Self { auth_algorithm: AuthAlgorithmNumber::OPEN, auth_fallback: false, listen_interval: 0 }
    }
}

/// A reassociation the new AP accepted. The old AP's firmware contexts go before the new BSS
/// and peer are installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassocMove {
    pub previous: MacAddr,
    pub aid: u16,
    pub assoc_rsp: Vec<u8>,
}

/// A deauthentication or disassociation requested by the upper layer, waiting for its frame to
/// be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDisconnect {
    pub kind: DisconnectKind,
    pub peer: MacAddr,
    pub reason: ReasonCode,
}

/// An SA query checking whether an unprotected deauth or disassoc really came from the AP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaQuery {
    pub transaction_id: u16,
    pub retries: u8,
    pub kind: DisconnectKind,
    pub reason: ReasonCode,
}

/// The cleanup plan of a session being torn down. Firmware contexts are removed first and
/// `notifications` go upward once they are gone.
#[derive(Debug, Clone, PartialEq)]
pub struct Teardown {
    pub trigger: CleanupTrigger,
    /// SME state the session is held in while firmware contexts are removed.
    pub sme: SmeState,
    pub notifications: Vec<UpperLayerEvent>,
}

pub struct Session {
    pub handle: SessionHandle,
    pub vdev_id: VdevId,
    pub bssid: MacAddr,
    pub self_addr: MacAddr,
    pub ssid: Vec<u8>,
    pub role: Role,
    pub states: LinkStates,
    pub channel: u8,
    pub beacon_interval: u16,
    pub bss_capabilities: CapabilityInfo,
    pub negotiated: Option<NegotiatedCapabilities>,
    pub beacon: Option<CachedBeacon>,
    pub assoc_rsp: Option<Vec<u8>>,
    pub peers: PeerTable,
    pub mlo: Option<MloLink>,
    pub timers: HashMap<TimerKind, EventId>,
    pub join: JoinContext,
    /// The BSS context exists in firmware.
    pub bss_added: bool,
    /// The AP deauthenticated or disassociated us while add-STA was outstanding.
    pub deauth_during_add_sta: bool,
    pub pending_disconnect: Option<PendingDisconnect>,
    pub pre_auth_target: Option<MacAddr>,
    pub reassoc_target: Option<MacAddr>,
    /// Beacon of the reassociation target, adopted once the reassociation succeeds.
    pub reassoc_beacon: Option<CachedBeacon>,
    /// Channel the radio moved to for a reassociation still in progress.
    pub reassoc_channel: Option<u8>,
    pub reassoc_move: Option<ReassocMove>,
    pub teardown: Option<Teardown>,
    /// A directed probe was sent to confirm a change of AP capabilities.
    pub caps_change_probe_pending: bool,
    pub edca: Option<EdcaParamSet>,
    pub edca_count: Option<u8>,
    pub pmf: bool,
    pub sa_query: Option<SaQuery>,
    pub lost_bss: Option<LostBssCounter>,
    pub signal: Option<EwmaSignalStrength>,
    pub channel_switch: Option<ChannelSwitch>,
    /// Cleanup is complete; the session is deleted once the current message is handled.
    pub finished: bool,
}

impl Session {
    pub fn new(
        handle: SessionHandle,
        vdev_id: VdevId,
        bssid: MacAddr,
        role: Role,
        peer_capacity: u16,
    ) -> Self {
        Self {
            handle,
            vdev_id,
            bssid,
            self_addr: [0; 6],
            ssid: vec![],
            role,
            states: LinkStates::new(),
            channel: 0,
            beacon_interval: 0,
            bss_capabilities: CapabilityInfo(0),
            negotiated: None,
            beacon: None,
            assoc_rsp: None,
            peers: PeerTable::new(peer_capacity),
            mlo: None,
            timers: HashMap::new(),
            join: JoinContext::default(),
            bss_added: false,
            deauth_during_add_sta: false,
            pending_disconnect: None,
            pre_auth_target: None,
            reassoc_target: None,
            reassoc_beacon: None,
            reassoc_channel: None,
            reassoc_move: None,
            teardown: None,
            caps_change_probe_pending: false,
            edca: None,
            edca_count: None,
            pmf: false,
            sa_query: None,
            lost_bss: None,
            signal: None,
            channel_switch: None,
            finished: false,
        }
    }

    /// What the upper layer learns about an established link.
    pub fn summary(&self) -> Option<LinkSummary> {
        let capabilities = self.negotiated.clone()?;
        let aid = self.peers.find_by_addr(&self.bssid).map_or(0, |peer| peer.aid);
        let rssi_dbm = self.signal.as_ref().map(|signal| signal.dbm());
        Some(LinkSummary {
            capabilities,
            aid,
            channel: self.channel,
            beacon_interval: self.beacon_interval,
            rssi_dbm: rssi_dbm.map(|dbm| dbm.0),
            signal_quality: rssi_dbm.map(signal_quality_percent),
            assoc_rsp_ies: self.assoc_rsp.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        wlan_common::{energy::DecibelMilliWatt, ie::ChannelSwitchAnnouncement},
    };

    #[test]
    fn extended_channel_switch_takes_precedence() {
        let mut ies = ParsedIes {
            csa: Some(ChannelSwitchAnnouncement {
                mode: 1,
                new_channel_number: 6,
                channel_switch_count: 3,
            }),
            ..Default::default()
        };
        assert_eq!(
            ChannelSwitch::from_ies(&ies),
            Some(ChannelSwitch { channel: 6, operating_class: None, mode: 1, count: 3 })
        );
        ies.ecsa = Some(wlan_common::ie::ExtendedChannelSwitchAnnouncement {
            mode: 0,
            new_operating_class: 115,
            new_channel_number: 40,
            channel_switch_count: 2,
        });
        assert_eq!(ChannelSwitch::from_ies(&ies).map(|switch| switch.channel), Some(40));
        assert_eq!(ChannelSwitch::from_ies(&ParsedIes::default()), None);
    }

    #[test]
    fn summary_needs_negotiated_capabilities() {
        let handle = SessionHandle { id: SessionId(0), generation: 0 };
        let mut session = Session::new(handle, 0, [1; 6], Role::Client, 1);
        assert!(session.summary().is_none());

        session.negotiated = Some(NegotiatedCapabilities {
            capability_info: CapabilityInfo(0),
            capabilities: capabilities::CapabilitySet::Legacy,
            nss: 1,
            bandwidth: capabilities::ChannelBandwidth::Cbw20,
            qos: false,
        });
        session.peers.insert_with_aid([1; 6], 7);
        session.signal = Some(EwmaSignalStrength::new(10, DecibelMilliWatt(-75)));
        let summary = session.summary().expect("summary");
        assert_eq!(summary.aid, 7);
        assert_eq!(summary.rssi_dbm, Some(-75));
        assert_eq!(summary.signal_quality, Some(50));
    }
}
