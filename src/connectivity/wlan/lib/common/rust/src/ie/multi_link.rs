// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Basic Multi-Link element, IEEE P802.11be/D3.0, 9.4.2.312.

use {
    super::Reader,
    crate::{
        buffer_reader::BufferReader,
        error::FrameParseError,
        mac::{CapabilityInfo, MacAddr},
    },
    bitfield::bitfield,
    std::convert::TryInto,
};

pub const TYPE_BASIC: u8 = 0;

// Subelement IDs in the Link Info field, Table 9-401c.
pub const SUBELEMENT_PER_STA_PROFILE: u8 = 0;

bitfield! {
    /// Multi-Link Control field, Figure 9-1002a, with the Basic variant presence bitmap.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct MultiLinkControl(u16);
    impl Debug;
    pub u8, ml_type, set_ml_type: 2, 0;
    bool;
    pub link_id_info_present, set_link_id_info_present: 4;
    pub bss_params_change_count_present, set_bss_params_change_count_present: 5;
    pub medium_sync_delay_present, set_medium_sync_delay_present: 6;
    pub eml_capabilities_present, set_eml_capabilities_present: 7;
    pub mld_capabilities_present, set_mld_capabilities_present: 8;
    pub ap_mld_id_present, set_ap_mld_id_present: 9;
    pub ext_mld_capabilities_present, set_ext_mld_capabilities_present: 10;
}

bitfield! {
    /// STA Control field of a Basic per-STA profile, Figure 9-1002s.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct StaControl(u16);
    impl Debug;
    pub u8, link_id, set_link_id: 3, 0;
    bool;
    pub complete_profile, set_complete_profile: 4;
    pub sta_mac_present, set_sta_mac_present: 5;
    pub beacon_interval_present, set_beacon_interval_present: 6;
    pub tsf_offset_present, set_tsf_offset_present: 7;
    pub dtim_info_present, set_dtim_info_present: 8;
    pub nstr_link_pair_present, set_nstr_link_pair_present: 9;
    pub nstr_bitmap_size, set_nstr_bitmap_size: 10;
    pub bss_params_change_count_present, set_bss_params_change_count_present: 11;
}

/// One per-STA profile, describing a partner link of the transmitting MLD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerStaProfile {
    pub link_id: u8,
    pub complete_profile: bool,
    pub sta_addr: Option<MacAddr>,
    pub beacon_interval: Option<u16>,
    pub bss_params_change_count: Option<u8>,
    /// Present only in complete profiles.
    pub capabilities: Option<CapabilityInfo>,
    /// Elements carried in the STA Profile field.
    pub elements: Vec<u8>,
}

/// A parsed Basic Multi-Link element. Per-STA profiles are validated one by one; a malformed
/// profile is kept as an error so that the caller can drop just that link's update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiLinkElement {
    pub mld_addr: MacAddr,
    pub link_id: Option<u8>,
    pub bss_params_change_count: Option<u8>,
    pub medium_sync_delay: Option<u16>,
    pub eml_capabilities: Option<u16>,
    pub mld_capabilities: Option<u16>,
    pub per_sta_profiles: Vec<Result<PerStaProfile, FrameParseError>>,
}

impl MultiLinkElement {
    pub fn profile(&self, link_id: u8) -> Option<&Result<PerStaProfile, FrameParseError>> {
        self.per_sta_profiles.iter().find(|profile| match profile {
            Ok(profile) => profile.link_id == link_id,
            Err(FrameParseError::MalformedPerStaProfile { link_id: Some(id), .. }) => {
                *id == link_id
            }
            Err(_) => false,
        })
    }
}

fn malformed(reason: &'static str) -> FrameParseError {
    FrameParseError::MalformedMultiLink(reason)
}

fn malformed_profile(link_id: Option<u8>, reason: &'static str) -> FrameParseError {
    FrameParseError::MalformedPerStaProfile { link_id, reason }
}

/// Parses the body of a Multi-Link element, excluding the Element ID Extension byte.
pub fn parse_multi_link(body: &[u8]) -> Result<MultiLinkElement, FrameParseError> {
    let mut reader = BufferReader::new(body);
    let control = MultiLinkControl(reader.read_u16_le().ok_or(malformed("missing control"))?);
    if control.ml_type() != TYPE_BASIC {
        return Err(malformed("not a basic multi-link element"));
    }

    let common_info_len = reader.read_byte().ok_or(malformed("missing common info"))? as usize;
    let mut expected_len = 1 + 6;
    if control.link_id_info_present() {
        expected_len += 1;
    }
    if control.bss_params_change_count_present() {
        expected_len += 1;
    }
    if control.medium_sync_delay_present() {
        expected_len += 2;
    }
    if control.eml_capabilities_present() {
        expected_len += 2;
    }
    if control.mld_capabilities_present() {
        expected_len += 2;
    }
    if control.ap_mld_id_present() {
        expected_len += 1;
    }
    if control.ext_mld_capabilities_present() {
        expected_len += 2;
    }
    if common_info_len < expected_len {
        return Err(malformed("common info shorter than its presence bitmap"));
    }
    let common = reader.read_bytes(common_info_len - 1).ok_or(malformed("truncated common info"))?;
    let mut common = BufferReader::new(common);

    let mld_addr: MacAddr = common
        .read_bytes(6)
        .and_then(|addr| addr.try_into().ok())
        .ok_or(malformed("missing MLD address"))?;
    let link_id = match control.link_id_info_present() {
        true => common.read_byte().map(|info| info & 0x0f),
        false => None,
    };
    let bss_params_change_count = match control.bss_params_change_count_present() {
        true => common.read_byte(),
        false => None,
    };
    let medium_sync_delay = match control.medium_sync_delay_present() {
        true => common.read_u16_le(),
        false => None,
    };
    let eml_capabilities = match control.eml_capabilities_present() {
        true => common.read_u16_le(),
        false => None,
    };
    let mld_capabilities = match control.mld_capabilities_present() {
        true => common.read_u16_le(),
        false => None,
    };

    let link_info = reader.into_remaining().unwrap_or(&[]);
    let mut subelements = Reader::new(link_info);
    let mut per_sta_profiles = vec![];
    // Fragment and vendor subelements carry nothing tracked here.
    for (id, body) in &mut subelements {
        if id.0 == SUBELEMENT_PER_STA_PROFILE {
            per_sta_profiles.push(parse_per_sta_profile(body));
        }
    }
    if subelements.bytes_remaining() > 0 {
        per_sta_profiles.push(Err(malformed_profile(
            link_info_trailing_link_id(link_info, subelements.bytes_remaining()),
            "subelement length exceeds link info",
        )));
    }

    Ok(MultiLinkElement {
        mld_addr,
        link_id,
        bss_params_change_count,
        medium_sync_delay,
        eml_capabilities,
        mld_capabilities,
        per_sta_profiles,
    })
}

// Best effort recovery of the link ID of a truncated trailing per-STA profile.
fn link_info_trailing_link_id(link_info: &[u8], remaining: usize) -> Option<u8> {
    let tail = &link_info[link_info.len() - remaining..];
    match tail {
        [SUBELEMENT_PER_STA_PROFILE, _len, control_lo, _control_hi, ..] => Some(control_lo & 0x0f),
        _ => None,
    }
}

fn parse_per_sta_profile(body: &[u8]) -> Result<PerStaProfile, FrameParseError> {
    let mut reader = BufferReader::new(body);
    let control =
        StaControl(reader.read_u16_le().ok_or(malformed_profile(None, "missing STA control"))?);
    let link_id = control.link_id();
    let err = |reason| malformed_profile(Some(link_id), reason);

    let sta_info_len = reader.read_byte().ok_or(err("missing STA info"))? as usize;
    let mut expected_len = 1;
    if control.sta_mac_present() {
        expected_len += 6;
    }
    if control.beacon_interval_present() {
        expected_len += 2;
    }
    if control.tsf_offset_present() {
        expected_len += 8;
    }
    if control.dtim_info_present() {
        expected_len += 2;
    }
    if control.complete_profile() && control.nstr_link_pair_present() {
        expected_len += if control.nstr_bitmap_size() { 2 } else { 1 };
    }
    if control.bss_params_change_count_present() {
        expected_len += 1;
    }
    if sta_info_len < expected_len {
        return Err(err("STA info shorter than its presence bits"));
    }
    let sta_info = reader.read_bytes(sta_info_len - 1).ok_or(err("truncated STA info"))?;
    let mut sta_info = BufferReader::new(sta_info);

    let sta_addr = match control.sta_mac_present() {
        true => sta_info.read_bytes(6).and_then(|addr| addr.try_into().ok()),
        false => None,
    };
    let beacon_interval = match control.beacon_interval_present() {
        true => sta_info.read_u16_le(),
        false => None,
    };
    if control.tsf_offset_present() {
        sta_info.read_bytes(8);
    }
    if control.dtim_info_present() {
        sta_info.read_bytes(2);
    }
    if control.complete_profile() && control.nstr_link_pair_present() {
        sta_info.read_bytes(if control.nstr_bitmap_size() { 2 } else { 1 });
    }
    let bss_params_change_count = match control.bss_params_change_count_present() {
        true => sta_info.read_byte(),
        false => None,
    };

    let capabilities = match control.complete_profile() {
        true => Some(CapabilityInfo(reader.read_u16_le().ok_or(err("missing capabilities"))?)),
        false => None,
    };
    let elements = reader.into_remaining().unwrap_or(&[]);
    let mut elements_reader = Reader::new(elements);
    for _ in &mut elements_reader {}
    if elements_reader.bytes_remaining() > 0 {
        return Err(err("truncated element in STA profile"));
    }

    Ok(PerStaProfile {
        link_id,
        complete_profile: control.complete_profile(),
        sta_addr,
        beacon_interval,
        bss_params_change_count,
        capabilities,
        elements: elements.to_vec(),
    })
}
