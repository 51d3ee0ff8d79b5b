// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::error::FrameParseError,
    bitfield::bitfield,
    byteorder::{ByteOrder, LittleEndian},
    zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned},
};

pub mod mgmt;

pub use mgmt::{ReasonCode, StatusCode};

pub type MacAddr = [u8; 6];
pub const BCAST_ADDR: MacAddr = [0xff; 6];

pub trait MacFmt {
    fn to_mac_str(&self) -> String;
}

impl MacFmt for MacAddr {
    fn to_mac_str(&self) -> String {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5]
        )
    }
}

// IEEE Std 802.11-2016, 9.2.4.1.3
pub const FRAME_TYPE_MGMT: u8 = 0;

// IEEE Std 802.11-2016, 9.2.4.1.3, Table 9-1
pub const MGMT_SUBTYPE_ASSOC_REQ: u8 = 0x00;
pub const MGMT_SUBTYPE_ASSOC_RESP: u8 = 0x01;
pub const MGMT_SUBTYPE_REASSOC_REQ: u8 = 0x02;
pub const MGMT_SUBTYPE_REASSOC_RESP: u8 = 0x03;
pub const MGMT_SUBTYPE_PROBE_REQ: u8 = 0x04;
pub const MGMT_SUBTYPE_PROBE_RESP: u8 = 0x05;
pub const MGMT_SUBTYPE_BEACON: u8 = 0x08;
pub const MGMT_SUBTYPE_DISASSOC: u8 = 0x0A;
pub const MGMT_SUBTYPE_AUTH: u8 = 0x0B;
pub const MGMT_SUBTYPE_DEAUTH: u8 = 0x0C;
pub const MGMT_SUBTYPE_ACTION: u8 = 0x0D;

bitfield! {
    /// IEEE Std 802.11-2016, 9.2.4.1.1
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FrameControl(u16);
    impl Debug;
    pub u8, protocol_version, set_protocol_version: 1, 0;
    pub u8, frame_type, set_frame_type: 3, 2;
    pub u8, frame_subtype, set_frame_subtype: 7, 4;
    bool;
    pub to_ds, set_to_ds: 8;
    pub from_ds, set_from_ds: 9;
    pub more_frags, set_more_frags: 10;
    pub retry, set_retry: 11;
    pub pwr_mgmt, set_pwr_mgmt: 12;
    pub more_data, set_more_data: 13;
    pub protected, set_protected: 14;
    pub htc_order, set_htc_order: 15;
}

impl FrameControl {
    pub fn mgmt(subtype: u8) -> Self {
        let mut fc = FrameControl(0);
        fc.set_frame_type(FRAME_TYPE_MGMT);
        fc.set_frame_subtype(subtype);
        fc
    }

    pub fn is_mgmt_subtype(&self, subtype: u8) -> bool {
        self.frame_type() == FRAME_TYPE_MGMT && self.frame_subtype() == subtype
    }
}

bitfield! {
    /// IEEE Std 802.11-2016, 9.4.1.4
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct CapabilityInfo(u16);
    impl Debug;
    bool;
    pub ess, set_ess: 0;
    pub ibss, set_ibss: 1;
    pub cf_pollable, set_cf_pollable: 2;
    pub cf_poll_req, set_cf_poll_req: 3;
    pub privacy, set_privacy: 4;
    pub short_preamble, set_short_preamble: 5;
    // bit 6-7 reserved
    pub spectrum_mgmt, set_spectrum_mgmt: 8;
    pub qos, set_qos: 9;
    pub short_slot_time, set_short_slot_time: 10;
    pub apsd, set_apsd: 11;
    pub radio_measurement, set_radio_measurement: 12;
    // bit 13 reserved
    pub delayed_block_ack, set_delayed_block_ack: 14;
    pub immediate_block_ack, set_immediate_block_ack: 15;
}

impl CapabilityInfo {
    pub fn raw(&self) -> u16 {
        self.0
    }
}

// IEEE Std 802.11-2016, 9.3.3.2
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct MgmtHdr {
    pub frame_ctrl: [u8; 2],
    pub duration: [u8; 2],
    pub addr1: MacAddr,
    pub addr2: MacAddr,
    pub addr3: MacAddr,
    pub seq_ctrl: [u8; 2],
}

impl MgmtHdr {
    pub fn frame_ctrl(&self) -> FrameControl {
        FrameControl(LittleEndian::read_u16(&self.frame_ctrl))
    }

    /// Address of the transmitter.
    pub fn sa(&self) -> MacAddr {
        self.addr2
    }

    pub fn bssid(&self) -> MacAddr {
        self.addr3
    }
}

// IEEE Std 802.11-2016, 9.3.3.3 and 9.3.3.11: fixed fields shared by beacons and probe responses.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct BeaconHdr {
    pub timestamp: [u8; 8],
    pub beacon_interval: [u8; 2],
    pub capabilities: [u8; 2],
}

impl BeaconHdr {
    pub fn timestamp(&self) -> u64 {
        LittleEndian::read_u64(&self.timestamp)
    }

    pub fn beacon_interval(&self) -> u16 {
        LittleEndian::read_u16(&self.beacon_interval)
    }

    pub fn capabilities(&self) -> CapabilityInfo {
        CapabilityInfo(LittleEndian::read_u16(&self.capabilities))
    }
}

/// Splits a management frame into its header and body.
pub fn parse_mgmt_frame(
    bytes: &[u8],
) -> Result<(LayoutVerified<&[u8], MgmtHdr>, &[u8]), FrameParseError> {
    let (hdr, body) = LayoutVerified::<_, MgmtHdr>::new_unaligned_from_prefix(bytes).ok_or(
        FrameParseError::TooShort { len: bytes.len(), min: std::mem::size_of::<MgmtHdr>() },
    )?;
    let fc = hdr.frame_ctrl();
    if fc.frame_type() != FRAME_TYPE_MGMT {
        return Err(FrameParseError::UnexpectedFrameType {
            frame_type: fc.frame_type(),
            subtype: fc.frame_subtype(),
        });
    }
    Ok((hdr, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_control_bits() {
        let fc = FrameControl::mgmt(MGMT_SUBTYPE_BEACON);
        assert_eq!(fc.0, 0x0080);
        assert!(fc.is_mgmt_subtype(MGMT_SUBTYPE_BEACON));
        assert!(!fc.is_mgmt_subtype(MGMT_SUBTYPE_PROBE_RESP));

        let mut fc = FrameControl(0);
        fc.set_protected(true);
        assert_eq!(fc.0, 0x4000);
    }

    #[test]
    fn capability_info_bits() {
        let mut caps = CapabilityInfo(0);
        caps.set_ess(true);
        caps.set_privacy(true);
        caps.set_spectrum_mgmt(true);
        caps.set_immediate_block_ack(true);
        assert_eq!(caps.raw(), 0b1000_0001_0001_0001);
        assert!(!caps.qos());
    }

    #[test]
    fn parse_beacon_header() {
        #[rustfmt::skip]
        let frame = [
            0x80, 0x00, // frame control: beacon
            0x00, 0x00, // duration
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // addr1
            1, 2, 3, 4, 5, 6, // addr2
            1, 2, 3, 4, 5, 6, // addr3
            0x10, 0x00, // seq ctrl
            0xaa, 0xbb,
        ];
        let (hdr, body) = parse_mgmt_frame(&frame[..]).expect("valid frame");
        assert!(hdr.frame_ctrl().is_mgmt_subtype(MGMT_SUBTYPE_BEACON));
        assert_eq!(hdr.bssid(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(body, &[0xaa, 0xbb][..]);
    }

    #[test]
    fn parse_rejects_short_and_data_frames() {
        assert_eq!(
            parse_mgmt_frame(&[0x80, 0x00][..]).map(|_| ()),
            Err(FrameParseError::TooShort { len: 2, min: 24 })
        );
        let mut frame = [0u8; 24];
        frame[0] = 0x08; // data frame
        assert_eq!(
            parse_mgmt_frame(&frame[..]).map(|_| ()),
            Err(FrameParseError::UnexpectedFrameType { frame_type: 2, subtype: 0 })
        );
    }

    #[test]
    fn mac_fmt() {
        let addr: MacAddr = [0x0a, 0xb1, 0, 1, 2, 0xff];
        assert_eq!(addr.to_mac_str(), "0a:b1:00:01:02:ff");
    }
}
