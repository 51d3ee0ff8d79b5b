// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Everything the engine reacts to arrives as a `Message` on its single serial queue.

use {
    crate::{
        device::{FwStatus, KeyDescriptor},
        mlo::MloLinkConfig,
        session::{ChannelSwitch, DisconnectKind, SessionHandle, VdevId},
        timer::EventId,
    },
    wlan_common::mac::{
        mgmt::AuthAlgorithmNumber, CapabilityInfo, MacAddr, ReasonCode, StatusCode,
    },
};

/// Receive metadata of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxInfo {
    pub rssi_dbm: i8,
    /// Local TSF when the frame was received.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub vdev_id: VdevId,
    pub bssid: MacAddr,
    pub self_addr: MacAddr,
    pub ssid: Vec<u8>,
    pub channel: u8,
    pub beacon_interval: u16,
    /// The target's beacon or probe response, if the upper layer already has one. Without it
    /// the session waits for one on the channel.
    pub bss_description: Option<Vec<u8>>,
    /// Protected management frames were negotiated for this link.
    pub pmf: bool,
    pub mlo: Option<MloLinkConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassocRequest {
    pub vdev_id: VdevId,
    pub new_bssid: MacAddr,
    /// Beacon or probe response of the new AP.
    pub bss_description: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartBssRequest {
    pub vdev_id: VdevId,
    pub bssid: MacAddr,
    pub ssid: Vec<u8>,
    pub channel: u8,
    pub beacon_interval: u16,
    pub capabilities: CapabilityInfo,
    pub mlo: Option<MloLinkConfig>,
}

/// A deauthentication or disassociation by a peer. Indications parsed from a received frame
/// name their session; ones reported by other sources are routed by peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectIndication {
    pub session: Option<SessionHandle>,
    pub peer: MacAddr,
    pub kind: DisconnectKind,
    pub reason: ReasonCode,
    /// The frame was protected, so it cannot have been spoofed.
    pub protected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // Upper-layer requests.
    Join(JoinRequest),
    Reassoc(ReassocRequest),
    PreAuth { vdev_id: VdevId, target: MacAddr },
    Disconnect { vdev_id: VdevId, peer: MacAddr, kind: DisconnectKind, reason: ReasonCode },
    StartBss(StartBssRequest),
    StopBss { vdev_id: VdevId },
    AssocIndConfirm { vdev_id: VdevId, peer: MacAddr, accept: bool },
    SetKeys { vdev_id: VdevId, keys: Vec<KeyDescriptor> },
    /// New elements for the beacon of an AP session.
    BeaconTemplateUpdate { vdev_id: VdevId, ies: Vec<u8> },
    DeleteSession { session: SessionHandle },

    // Received frames.
    MgmtFrame { vdev_id: VdevId, frame: Vec<u8>, rx_info: RxInfo },

    // Confirmations derived from received frames or transmit completions.
    AuthConfirm {
        session: SessionHandle,
        peer: MacAddr,
        algorithm: AuthAlgorithmNumber,
        status: StatusCode,
    },
    /// Second frame of shared key authentication.
    AuthChallenge { session: SessionHandle, peer: MacAddr, challenge: Vec<u8> },
    AssocConfirm {
        session: SessionHandle,
        peer: MacAddr,
        status: StatusCode,
        aid: u16,
        ies: Vec<u8>,
    },
    DisconnectIndication(DisconnectIndication),
    SaQueryResponse { session: SessionHandle, peer: MacAddr, transaction_id: u16 },
    DisconnectTxConfirm { vdev_id: VdevId, peer: MacAddr, status: FwStatus },

    // Firmware command completions.
    AddBssResponse { vdev_id: VdevId, status: FwStatus },
    AddStaResponse { vdev_id: VdevId, peer: MacAddr, status: FwStatus, fw_index: u16 },
    DelStaResponse { vdev_id: VdevId, peer: MacAddr, status: FwStatus },
    DelBssResponse { vdev_id: VdevId, status: FwStatus },
    SetKeyResponse { vdev_id: VdevId, peer: MacAddr, status: FwStatus },
    SwitchChannelResponse { vdev_id: VdevId, channel: u8, status: FwStatus },

    Timeout(EventId),

    // Multi-link coordination between the sessions of one MLD.
    PartnerChannelSwitch { vdev_id: VdevId, link_id: u8, switch: ChannelSwitch },
    PartnerTemplateRefresh { vdev_id: VdevId, link_id: u8, bss_params_change_count: u8 },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Join(_) => "Join",
            Message::Reassoc(_) => "Reassoc",
            Message::PreAuth { .. } => "PreAuth",
            Message::Disconnect { .. } => "Disconnect",
            Message::StartBss(_) => "StartBss",
            Message::StopBss { .. } => "StopBss",
            Message::AssocIndConfirm { .. } => "AssocIndConfirm",
            Message::SetKeys { .. } => "SetKeys",
            Message::BeaconTemplateUpdate { .. } => "BeaconTemplateUpdate",
            Message::DeleteSession { .. } => "DeleteSession",
            Message::MgmtFrame { .. } => "MgmtFrame",
            Message::AuthConfirm { .. } => "AuthConfirm",
            Message::AuthChallenge { .. } => "AuthChallenge",
            Message::AssocConfirm { .. } => "AssocConfirm",
            Message::DisconnectIndication(_) => "DisconnectIndication",
            Message::SaQueryResponse { .. } => "SaQueryResponse",
            Message::DisconnectTxConfirm { .. } => "DisconnectTxConfirm",
            Message::AddBssResponse { .. } => "AddBssResponse",
            Message::AddStaResponse { .. } => "AddStaResponse",
            Message::DelStaResponse { .. } => "DelStaResponse",
            Message::DelBssResponse { .. } => "DelBssResponse",
            Message::SetKeyResponse { .. } => "SetKeyResponse",
            Message::SwitchChannelResponse { .. } => "SwitchChannelResponse",
            Message::Timeout(_) => "Timeout",
            Message::PartnerChannelSwitch { .. } => "PartnerChannelSwitch",
            Message::PartnerTemplateRefresh { .. } => "PartnerTemplateRefresh",
        }
    }
}
