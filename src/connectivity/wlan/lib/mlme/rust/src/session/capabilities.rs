// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::config::LocalCapabilities,
    byteorder::{ByteOrder, LittleEndian},
    serde_derive::{Deserialize, Serialize},
    wlan_common::{ie::ParsedIes, mac::CapabilityInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhyGeneration {
    Legacy,
    Ht,
    Vht,
    He,
    Eht,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelBandwidth {
    Cbw20,
    Cbw40,
    Cbw80,
    Cbw160,
    Cbw320,
}

/// Capability elements of a peer, by the highest PHY generation it supports. A generation only
/// carries the lower-generation elements it depends on, so an HE peer on 6 GHz may omit HT/VHT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilitySet {
    Legacy,
    Ht { ht_cap: Vec<u8> },
    Vht { ht_cap: Vec<u8>, vht_cap: Vec<u8> },
    He { ht_cap: Option<Vec<u8>>, vht_cap: Option<Vec<u8>>, he_cap: Vec<u8> },
    Eht { ht_cap: Option<Vec<u8>>, vht_cap: Option<Vec<u8>>, he_cap: Vec<u8>, eht_cap: Vec<u8> },
}

// Offsets into capability element bodies, Element ID Extension excluded.
const HT_CAP_INFO_SUPPORTED_CHANNEL_WIDTH: u16 = 1 << 1;
const HT_RX_MCS_BITMASK: std::ops::Range<usize> = 3..7;
const VHT_RX_MCS_MAP: std::ops::Range<usize> = 4..6;
const HE_PHY_CAPS_CHANNEL_WIDTH_SET: usize = 6;
const HE_RX_MCS_MAP_80: std::ops::Range<usize> = 17..19;
const EHT_PHY_CAPS_320MHZ: usize = 2;

/// Number of spatial streams in a VHT/HE MCS map: two bits per stream, 3 means unsupported.
fn mcs_map_nss(map: &[u8]) -> u8 {
    let map = LittleEndian::read_u16(map);
    (0..8).filter(|ss| (map >> (2 * ss)) & 0b11 != 0b11).count() as u8
}

impl CapabilitySet {
    pub fn from_ies(ies: &ParsedIes) -> Self {
        let ht_cap = ies.ht_cap.clone();
        let vht_cap = ies.vht_cap.clone();
        match (ies.he_cap.clone(), ies.eht_cap.clone()) {
            (Some(he_cap), Some(eht_cap)) => {
                CapabilitySet::Eht { ht_cap, vht_cap, he_cap, eht_cap }
            }
            (Some(he_cap), None) => CapabilitySet::He { ht_cap, vht_cap, he_cap },
            _ => match (ht_cap, vht_cap) {
                (Some(ht_cap), Some(vht_cap)) => CapabilitySet::Vht { ht_cap, vht_cap },
                (Some(ht_cap), None) => CapabilitySet::Ht { ht_cap },
                _ => CapabilitySet::Legacy,
            },
        }
    }

    pub fn generation(&self) -> PhyGeneration {
        match self {
            CapabilitySet::Legacy => PhyGeneration::Legacy,
            CapabilitySet::Ht { .. } => PhyGeneration::Ht,
            CapabilitySet::Vht { .. } => PhyGeneration::Vht,
            CapabilitySet::He { .. } => PhyGeneration::He,
            CapabilitySet::Eht { .. } => PhyGeneration::Eht,
        }
    }

    pub fn ht_cap(&self) -> Option<&[u8]> {
        match self {
            CapabilitySet::Legacy => None,
            CapabilitySet::Ht { ht_cap } | CapabilitySet::Vht { ht_cap, .. } => Some(&ht_cap[..]),
            CapabilitySet::He { ht_cap, .. } | CapabilitySet::Eht { ht_cap, .. } => {
                ht_cap.as_deref()
            }
        }
    }

    pub fn vht_cap(&self) -> Option<&[u8]> {
        match self {
            CapabilitySet::Legacy | CapabilitySet::Ht { .. } => None,
            CapabilitySet::Vht { vht_cap, .. } => Some(&vht_cap[..]),
            CapabilitySet::He { vht_cap, .. } | CapabilitySet::Eht { vht_cap, .. } => {
                vht_cap.as_deref()
            }
        }
    }

    pub fn he_cap(&self) -> Option<&[u8]> {
        match self {
            CapabilitySet::He { he_cap, .. } | CapabilitySet::Eht { he_cap, .. } => {
                Some(&he_cap[..])
            }
            _ => None,
        }
    }

    pub fn eht_cap(&self) -> Option<&[u8]> {
        match self {
            CapabilitySet::Eht { eht_cap, .. } => Some(&eht_cap[..]),
            _ => None,
        }
    }

    /// Drops the elements of every generation above `max`.
    pub fn limit_to(self, max: PhyGeneration) -> Self {
        if self.generation() <= max {
            return self;
        }
        let ht_cap = self.ht_cap().map(<[u8]>::to_vec);
        let vht_cap = self.vht_cap().map(<[u8]>::to_vec);
        let he_cap = self.he_cap().map(<[u8]>::to_vec);
        match (max, ht_cap, vht_cap, he_cap) {
            (PhyGeneration::He, ht_cap, vht_cap, Some(he_cap)) => {
                CapabilitySet::He { ht_cap, vht_cap, he_cap }
            }
            (PhyGeneration::Vht | PhyGeneration::He, Some(ht_cap), Some(vht_cap), _) => {
                CapabilitySet::Vht { ht_cap, vht_cap }
            }
            (PhyGeneration::Ht | PhyGeneration::Vht | PhyGeneration::He, Some(ht_cap), _, _) => {
                CapabilitySet::Ht { ht_cap }
            }
            _ => CapabilitySet::Legacy,
        }
    }

    /// Spatial streams the peer can receive.
    pub fn nss(&self) -> u8 {
        let nss = match self.generation() {
            PhyGeneration::He | PhyGeneration::Eht => {
                self.he_cap().and_then(|he| he.get(HE_RX_MCS_MAP_80)).map(mcs_map_nss)
            }
            PhyGeneration::Vht => {
                self.vht_cap().and_then(|vht| vht.get(VHT_RX_MCS_MAP)).map(mcs_map_nss)
            }
            PhyGeneration::Ht => self
                .ht_cap()
                .and_then(|ht| ht.get(HT_RX_MCS_BITMASK))
                .map(|mask| mask.iter().filter(|b| **b != 0).count() as u8),
            PhyGeneration::Legacy => None,
        };
        nss.unwrap_or(1).max(1)
    }

    pub fn bandwidth(&self) -> ChannelBandwidth {
        let ht_info = self.ht_cap().and_then(|ht| ht.get(0..2)).map(LittleEndian::read_u16);
        let ht_bw = || match ht_info {
            Some(info) if info & HT_CAP_INFO_SUPPORTED_CHANNEL_WIDTH != 0 => {
                ChannelBandwidth::Cbw40
            }
            _ => ChannelBandwidth::Cbw20,
        };
        let he_bw = || match self.he_cap().and_then(|he| he.get(HE_PHY_CAPS_CHANNEL_WIDTH_SET)) {
            Some(set) if set & 0x08 != 0 => ChannelBandwidth::Cbw160,
            Some(set) if set & 0x04 != 0 => ChannelBandwidth::Cbw80,
            Some(set) if set & 0x02 != 0 => ChannelBandwidth::Cbw40,
            _ => ChannelBandwidth::Cbw20,
        };
        match self {
            CapabilitySet::Legacy => ChannelBandwidth::Cbw20,
            CapabilitySet::Ht { .. } => ht_bw(),
            CapabilitySet::Vht { vht_cap, .. } => {
                match vht_cap.get(0..4).map(LittleEndian::read_u32) {
                    Some(info) if (info >> 2) & 0b11 != 0 => ChannelBandwidth::Cbw160,
                    _ => ChannelBandwidth::Cbw80,
                }
            }
            CapabilitySet::He { .. } => he_bw(),
            CapabilitySet::Eht { eht_cap, .. } => match eht_cap.get(EHT_PHY_CAPS_320MHZ) {
                Some(phy) if phy & 0x02 != 0 => ChannelBandwidth::Cbw320,
                _ => he_bw(),
            },
        }
    }
}

/// What was agreed with one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedCapabilities {
    pub capability_info: CapabilityInfo,
    pub capabilities: CapabilitySet,
    pub nss: u8,
    pub bandwidth: ChannelBandwidth,
    pub qos: bool,
}

/// Capability Information bits requested from a peer: each optional feature is kept only if both
/// sides support it.
pub fn intersect_capability_info(
    local: &LocalCapabilities,
    peer: CapabilityInfo,
) -> CapabilityInfo {
    let mut info = CapabilityInfo(0);
    info.set_ess(peer.ess());
    info.set_privacy(peer.privacy());
    info.set_short_preamble(local.short_preamble && peer.short_preamble());
    info.set_spectrum_mgmt(local.spectrum_mgmt && peer.spectrum_mgmt());
    info.set_qos(local.qos && peer.qos());
    info.set_short_slot_time(local.short_slot_time && peer.short_slot_time());
    info.set_radio_measurement(local.radio_measurement && peer.radio_measurement());
    info.set_immediate_block_ack(local.immediate_block_ack && peer.immediate_block_ack());
    info
}

pub fn negotiate(
    local: &LocalCapabilities,
    peer_info: CapabilityInfo,
    peer_ies: &ParsedIes,
) -> NegotiatedCapabilities {
    let capabilities = CapabilitySet::from_ies(peer_ies).limit_to(local.max_generation);
    let nss = capabilities.nss().min(local.max_nss).max(1);
    let bandwidth = capabilities.bandwidth().min(local.max_bandwidth);
    let qos = local.qos
        && (peer_info.qos()
            || peer_ies.edca.is_some()
            || capabilities.generation() > PhyGeneration::Legacy);
    NegotiatedCapabilities {
        capability_info: intersect_capability_info(local, peer_info),
        capabilities,
        nss,
        bandwidth,
        qos,
    }
}
