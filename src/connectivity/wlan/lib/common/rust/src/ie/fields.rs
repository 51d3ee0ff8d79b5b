// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::Id,
    crate::error::FrameParseError,
    bitfield::bitfield,
    byteorder::{ByteOrder, LittleEndian},
    zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned},
};

fn parse_fixed<T: FromBytes + Unaligned>(
    id: Id,
    body: &[u8],
) -> Result<LayoutVerified<&[u8], T>, FrameParseError> {
    LayoutVerified::new_unaligned(body)
        .ok_or(FrameParseError::InvalidElementLength { id: id.0, len: body.len() })
}

// IEEE Std 802.11-2016, 9.4.2.4
#[repr(C, packed)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DsssParamSet {
    pub current_chan: u8,
}

pub fn parse_dsss_param_set(body: &[u8]) -> Result<DsssParamSet, FrameParseError> {
    parse_fixed::<DsssParamSet>(Id::DSSS_PARAM_SET, body).map(|lv| *lv)
}

// IEEE Std 802.11-2016, 9.4.2.19
#[repr(C, packed)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSwitchAnnouncement {
    pub mode: u8,
    pub new_channel_number: u8,
    pub channel_switch_count: u8,
}

pub fn parse_channel_switch_announcement(
    body: &[u8],
) -> Result<ChannelSwitchAnnouncement, FrameParseError> {
    parse_fixed::<ChannelSwitchAnnouncement>(Id::CHANNEL_SWITCH_ANNOUNCEMENT, body).map(|lv| *lv)
}

// IEEE Std 802.11-2016, 9.4.2.53
#[repr(C, packed)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtendedChannelSwitchAnnouncement {
    pub mode: u8,
    pub new_operating_class: u8,
    pub new_channel_number: u8,
    pub channel_switch_count: u8,
}

pub fn parse_extended_channel_switch_announcement(
    body: &[u8],
) -> Result<ExtendedChannelSwitchAnnouncement, FrameParseError> {
    parse_fixed::<ExtendedChannelSwitchAnnouncement>(Id::EXT_CHANNEL_SWITCH_ANNOUNCEMENT, body)
        .map(|lv| *lv)
}

// IEEE Std 802.11-2016, 9.4.2.23
#[repr(C, packed)]
#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quiet {
    pub count: u8,
    pub period: u8,
    pub duration: [u8; 2],
    pub offset: [u8; 2],
}

impl Quiet {
    pub fn duration(&self) -> u16 {
        LittleEndian::read_u16(&self.duration)
    }
}

pub fn parse_quiet(body: &[u8]) -> Result<Quiet, FrameParseError> {
    parse_fixed::<Quiet>(Id::QUIET, body).map(|lv| *lv)
}

bitfield! {
    /// IEEE Std 802.11-2016, 9.4.1.17, QoS Info field as sent by an AP.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct ApQosInfo(u8);
    impl Debug;
    pub u8, edca_param_set_update_count, set_edca_param_set_update_count: 3, 0;
    bool;
    pub q_ack, set_q_ack: 4;
    pub queue_request, set_queue_request: 5;
    pub txop_request, set_txop_request: 6;
}

bitfield! {
    /// IEEE Std 802.11-2016, 9.4.2.29, ACI/AIFSN field.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct AciAifsn(u8);
    impl Debug;
    pub u8, aifsn, set_aifsn: 3, 0;
    pub u8, aci, set_aci: 6, 5;
    bool;
    pub acm, set_acm: 4;
}

bitfield! {
    /// IEEE Std 802.11-2016, 9.4.2.29, ECWmin/ECWmax field.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct EcwMinMax(u8);
    impl Debug;
    pub u8, ecw_min, set_ecw_min: 3, 0;
    pub u8, ecw_max, set_ecw_max: 7, 4;
}

// IEEE Std 802.11-2016, 9.4.2.29
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AcParams {
    pub aci_aifsn: AciAifsn,
    pub ecw: EcwMinMax,
    pub txop_limit: u16,
}

impl AcParams {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            aci_aifsn: AciAifsn(bytes[0]),
            ecw: EcwMinMax(bytes[1]),
            txop_limit: LittleEndian::read_u16(&bytes[2..4]),
        }
    }
}

/// Access categories in the order they appear in the EDCA Parameter Set element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessCategory {
    BestEffort,
    Background,
    Video,
    Voice,
}

// IEEE Std 802.11-2016, 9.4.2.28
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EdcaParamSet {
    pub qos_info: ApQosInfo,
    pub ac_be: AcParams,
    pub ac_bk: AcParams,
    pub ac_vi: AcParams,
    pub ac_vo: AcParams,
}

pub const EDCA_PARAM_SET_LEN: usize = 18;

impl EdcaParamSet {
    pub fn param_set_count(&self) -> u8 {
        self.qos_info.edca_param_set_update_count()
    }

    pub fn ac(&self, ac: AccessCategory) -> &AcParams {
        match ac {
            AccessCategory::BestEffort => &self.ac_be,
            AccessCategory::Background => &self.ac_bk,
            AccessCategory::Video => &self.ac_vi,
            AccessCategory::Voice => &self.ac_vo,
        }
    }
}

pub fn parse_edca_param_set(body: &[u8]) -> Result<EdcaParamSet, FrameParseError> {
    if body.len() != EDCA_PARAM_SET_LEN {
        return Err(FrameParseError::InvalidElementLength {
            id: Id::EDCA_PARAM_SET.0,
            len: body.len(),
        });
    }
    // Byte 1 is the reserved Update EDCA Info field.
    Ok(EdcaParamSet {
        qos_info: ApQosInfo(body[0]),
        ac_be: AcParams::from_bytes(&body[2..6]),
        ac_bk: AcParams::from_bytes(&body[6..10]),
        ac_vi: AcParams::from_bytes(&body[10..14]),
        ac_vo: AcParams::from_bytes(&body[14..18]),
    })
}
