// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Builders for frames and elements used by tests across the WLAN management crates.

use crate::{
    ie::{multi_link::SUBELEMENT_PER_STA_PROFILE, ExtId, Id},
    mac::{
        self, mgmt::AuthAlgorithmNumber, CapabilityInfo, FrameControl, MacAddr, ReasonCode,
        StatusCode,
    },
};

pub const FAKE_CLIENT_ADDR: MacAddr = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];

#[rustfmt::skip]
pub const FAKE_WPA2_RSNE_BODY: [u8; 20] = [
    0x01, 0x00,
    0x00, 0x0f, 0xac, 0x04,
    0x01, 0x00, 0x00, 0x0f, 0xac, 0x04,
    0x01, 0x00, 0x00, 0x0f, 0xac, 0x02,
    0x00, 0x00,
];

/// Body of an EDCA Parameter Set element with the given update count. Voice optionally requires
/// admission control.
pub fn fake_edca_body(param_set_count: u8, voice_acm: bool) -> Vec<u8> {
    let voice_aci_aifsn = if voice_acm { 0x72 } else { 0x62 };
    #[rustfmt::skip]
    let body = vec![
        param_set_count & 0x0f, 0x00,
        0x03, 0xa4, 0x00, 0x00, // AC_BE
        0x27, 0xa4, 0x00, 0x00, // AC_BK
        0x42, 0x43, 0x5e, 0x00, // AC_VI
        voice_aci_aifsn, 0x32, 0x2f, 0x00, // AC_VO
    ];
    body
}

fn mgmt_header(
    subtype: u8,
    addr1: MacAddr,
    addr2: MacAddr,
    addr3: MacAddr,
    protected: bool,
) -> Vec<u8> {
    let mut fc = FrameControl::mgmt(subtype);
    fc.set_protected(protected);
    let mut frame = vec![];
    frame.extend_from_slice(&fc.0.to_le_bytes());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&addr1);
    frame.extend_from_slice(&addr2);
    frame.extend_from_slice(&addr3);
    frame.extend_from_slice(&[0x10, 0]);
    frame
}

/// Builds beacons and probe responses.
#[derive(Clone)]
pub struct BeaconBuilder {
    subtype: u8,
    bssid: MacAddr,
    timestamp: u64,
    beacon_interval: u16,
    capabilities: CapabilityInfo,
    ies: Vec<u8>,
}

impl BeaconBuilder {
    pub fn new(bssid: MacAddr) -> Self {
        let mut capabilities = CapabilityInfo(0);
        capabilities.set_ess(true);
        Self {
            subtype: mac::MGMT_SUBTYPE_BEACON,
            bssid,
            timestamp: 0,
            beacon_interval: 100,
            capabilities,
            ies: vec![],
        }
    }

    pub fn probe_response(mut self) -> Self {
        self.subtype = mac::MGMT_SUBTYPE_PROBE_RESP;
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn beacon_interval(mut self, beacon_interval: u16) -> Self {
        self.beacon_interval = beacon_interval;
        self
    }

    pub fn capabilities(mut self, capabilities: CapabilityInfo) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn ie(mut self, id: Id, body: &[u8]) -> Self {
        self.ies.push(id.0);
        self.ies.push(body.len() as u8);
        self.ies.extend_from_slice(body);
        self
    }

    pub fn ext_ie(mut self, ext_id: u8, body: &[u8]) -> Self {
        self.ies.push(Id::EXTENSION.0);
        self.ies.push(body.len() as u8 + 1);
        self.ies.push(ext_id);
        self.ies.extend_from_slice(body);
        self
    }

    pub fn raw_ies(mut self, bytes: &[u8]) -> Self {
        self.ies.extend_from_slice(bytes);
        self
    }

    pub fn ssid(self, ssid: &[u8]) -> Self {
        self.ie(Id::SSID, ssid)
    }

    pub fn channel(self, channel: u8) -> Self {
        self.ie(Id::DSSS_PARAM_SET, &[channel])
    }

    pub fn edca(self, param_set_count: u8, voice_acm: bool) -> Self {
        self.ie(Id::EDCA_PARAM_SET, &fake_edca_body(param_set_count, voice_acm)[..])
    }

    pub fn wpa2(self) -> Self {
        self.ie(Id::RSNE, &FAKE_WPA2_RSNE_BODY[..])
    }

    pub fn csa(self, mode: u8, new_channel: u8, count: u8) -> Self {
        self.ie(Id::CHANNEL_SWITCH_ANNOUNCEMENT, &[mode, new_channel, count])
    }

    pub fn multi_link(self, body: &[u8]) -> Self {
        self.ext_ie(ExtId::MULTI_LINK, body)
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = mgmt_header(self.subtype, mac::BCAST_ADDR, self.bssid, self.bssid, false);
        frame.extend_from_slice(&self.timestamp.to_le_bytes());
        frame.extend_from_slice(&self.beacon_interval.to_le_bytes());
        frame.extend_from_slice(&self.capabilities.0.to_le_bytes());
        frame.extend_from_slice(&self.ies[..]);
        frame
    }
}

pub fn fake_deauth_frame(
    sa: MacAddr,
    da: MacAddr,
    bssid: MacAddr,
    reason: ReasonCode,
    protected: bool,
) -> Vec<u8> {
    let mut frame = mgmt_header(mac::MGMT_SUBTYPE_DEAUTH, da, sa, bssid, protected);
    frame.extend_from_slice(&reason.0.to_le_bytes());
    frame
}

pub fn fake_disassoc_frame(
    sa: MacAddr,
    da: MacAddr,
    bssid: MacAddr,
    reason: ReasonCode,
    protected: bool,
) -> Vec<u8> {
    let mut frame = mgmt_header(mac::MGMT_SUBTYPE_DISASSOC, da, sa, bssid, protected);
    frame.extend_from_slice(&reason.0.to_le_bytes());
    frame
}

/// An authentication frame sent by `sa`.
pub fn fake_auth_frame(
    sa: MacAddr,
    da: MacAddr,
    algorithm: AuthAlgorithmNumber,
    seq: u16,
    status: StatusCode,
) -> Vec<u8> {
    let mut frame = mgmt_header(mac::MGMT_SUBTYPE_AUTH, da, sa, sa, false);
    frame.extend_from_slice(&algorithm.0.to_le_bytes());
    frame.extend_from_slice(&seq.to_le_bytes());
    frame.extend_from_slice(&status.0.to_le_bytes());
    frame
}

/// Second frame of shared key authentication, carrying the AP's `challenge` text.
pub fn fake_auth_challenge_frame(sa: MacAddr, da: MacAddr, challenge: &[u8]) -> Vec<u8> {
    let mut frame =
        fake_auth_frame(sa, da, AuthAlgorithmNumber::SHARED_KEY, 2, StatusCode::SUCCESS);
    frame.push(Id::CHALLENGE_TEXT.0);
    frame.push(challenge.len() as u8);
    frame.extend_from_slice(challenge);
    frame
}

pub fn fake_assoc_resp_frame(
    bssid: MacAddr,
    da: MacAddr,
    status: StatusCode,
    aid: u16,
    ies: &[u8],
) -> Vec<u8> {
    let mut frame = mgmt_header(mac::MGMT_SUBTYPE_ASSOC_RESP, da, bssid, bssid, false);
    let mut capabilities = CapabilityInfo(0);
    capabilities.set_ess(true);
    frame.extend_from_slice(&capabilities.0.to_le_bytes());
    frame.extend_from_slice(&status.0.to_le_bytes());
    frame.extend_from_slice(&aid.to_le_bytes());
    frame.extend_from_slice(ies);
    frame
}

/// An association request from `sa` to the AP at `bssid`.
pub fn fake_assoc_req_frame(
    sa: MacAddr,
    bssid: MacAddr,
    capabilities: CapabilityInfo,
    listen_interval: u16,
    ies: &[u8],
) -> Vec<u8> {
    let mut frame = mgmt_header(mac::MGMT_SUBTYPE_ASSOC_REQ, bssid, sa, bssid, false);
    frame.extend_from_slice(&capabilities.0.to_le_bytes());
    frame.extend_from_slice(&listen_interval.to_le_bytes());
    frame.extend_from_slice(ies);
    frame
}

/// An SA Query Response action frame, IEEE Std 802.11-2016, 9.6.10.
pub fn fake_sa_query_resp_frame(bssid: MacAddr, da: MacAddr, transaction_id: u16) -> Vec<u8> {
    let mut frame = mgmt_header(mac::MGMT_SUBTYPE_ACTION, da, bssid, bssid, true);
    frame.extend_from_slice(&[8, 1]);
    frame.extend_from_slice(&transaction_id.to_le_bytes());
    frame
}

/// Builds the body of a Basic Multi-Link element, Element ID Extension excluded.
pub struct MultiLinkBuilder {
    mld_addr: MacAddr,
    link_id: Option<u8>,
    bss_params_change_count: Option<u8>,
    link_info: Vec<u8>,
}

impl MultiLinkBuilder {
    pub fn new(mld_addr: MacAddr) -> Self {
        Self { mld_addr, link_id: None, bss_params_change_count: None, link_info: vec![] }
    }

    pub fn link_id(mut self, link_id: u8) -> Self {
        self.link_id = Some(link_id);
        self
    }

    pub fn bss_params_change_count(mut self, count: u8) -> Self {
        self.bss_params_change_count = Some(count);
        self
    }

    /// Adds a partial per-STA profile carrying only the given elements.
    pub fn partial_profile(
        mut self,
        link_id: u8,
        bss_params_change_count: Option<u8>,
        elements: &[u8],
    ) -> Self {
        let mut control: u16 = (link_id & 0x0f) as u16;
        let mut sta_info = vec![];
        if let Some(count) = bss_params_change_count {
            control |= 1 << 11;
            sta_info.push(count);
        }
        let mut profile = vec![];
        profile.extend_from_slice(&control.to_le_bytes());
        profile.push(sta_info.len() as u8 + 1);
        profile.extend_from_slice(&sta_info[..]);
        profile.extend_from_slice(elements);
        self.link_info.push(SUBELEMENT_PER_STA_PROFILE);
        self.link_info.push(profile.len() as u8);
        self.link_info.extend_from_slice(&profile[..]);
        self
    }

    /// Adds a complete per-STA profile with STA address and capabilities.
    pub fn complete_profile(
        mut self,
        link_id: u8,
        sta_addr: MacAddr,
        capabilities: CapabilityInfo,
        elements: &[u8],
    ) -> Self {
        let control: u16 = (link_id & 0x0f) as u16 | 1 << 4 | 1 << 5;
        let mut profile = vec![];
        profile.extend_from_slice(&control.to_le_bytes());
        profile.push(7);
        profile.extend_from_slice(&sta_addr);
        profile.extend_from_slice(&capabilities.0.to_le_bytes());
        profile.extend_from_slice(elements);
        self.link_info.push(SUBELEMENT_PER_STA_PROFILE);
        self.link_info.push(profile.len() as u8);
        self.link_info.extend_from_slice(&profile[..]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut control: u16 = 0;
        let mut common_info = vec![];
        common_info.extend_from_slice(&self.mld_addr);
        if let Some(link_id) = self.link_id {
            control |= 1 << 4;
            common_info.push(link_id & 0x0f);
        }
        if let Some(count) = self.bss_params_change_count {
            control |= 1 << 5;
            common_info.push(count);
        }
        let mut body = vec![];
        body.extend_from_slice(&control.to_le_bytes());
        body.push(common_info.len() as u8 + 1);
        body.extend_from_slice(&common_info[..]);
        body.extend_from_slice(&self.link_info[..]);
        body
    }
}
