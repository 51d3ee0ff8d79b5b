// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{
        multi_link::{parse_multi_link, MultiLinkElement},
        rsn::rsne::{self, Rsne},
        *,
    },
    crate::error::FrameParseError,
};

// Element body lengths checked on receipt. IEEE Std 802.11-2020, 9.4.2.
const HT_CAPABILITIES_LEN: usize = 26;
const HT_OPERATION_LEN: usize = 22;
const VHT_CAPABILITIES_LEN: usize = 12;
const VHT_OPERATION_LEN: usize = 5;
// Minimum lengths of the extension elements, Element ID Extension excluded.
const HE_CAPABILITIES_MIN_LEN: usize = 21;
const HE_OPERATION_MIN_LEN: usize = 6;
const EHT_CAPABILITIES_MIN_LEN: usize = 11;
const EHT_OPERATION_MIN_LEN: usize = 5;
const SSID_MAX_LEN: usize = 32;

/// The elements of a beacon, probe response or per-STA profile that the management engine
/// tracks. Operation and capability elements are kept as raw bodies: they are compared, not
/// interpreted, except where an accessor says otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIes {
    pub ssid: Option<Vec<u8>>,
    pub dsss: Option<DsssParamSet>,
    pub edca: Option<EdcaParamSet>,
    pub csa: Option<ChannelSwitchAnnouncement>,
    pub ecsa: Option<ExtendedChannelSwitchAnnouncement>,
    pub max_channel_switch_time: Option<Vec<u8>>,
    pub quiet: Option<Quiet>,
    pub ht_cap: Option<Vec<u8>>,
    pub ht_op: Option<Vec<u8>>,
    pub vht_cap: Option<Vec<u8>>,
    pub vht_op: Option<Vec<u8>>,
    pub he_cap: Option<Vec<u8>>,
    pub he_op: Option<Vec<u8>>,
    pub eht_cap: Option<Vec<u8>>,
    pub eht_op: Option<Vec<u8>>,
    pub rsne: Option<Rsne>,
    pub wpa1: bool,
    pub wide_bandwidth_channel_switch: bool,
    pub channel_switch_wrapper: bool,
    pub operating_mode_notification: bool,
    pub bss_color_change: bool,
    pub multi_link: Option<MultiLinkElement>,
}

fn check_len(id: u8, body: &[u8], valid: bool) -> Result<Vec<u8>, FrameParseError> {
    if valid {
        Ok(body.to_vec())
    } else {
        Err(FrameParseError::InvalidElementLength { id, len: body.len() })
    }
}

impl ParsedIes {
    /// Collects the tracked elements from an element chain. Untracked elements are skipped and a
    /// truncated trailing element ends the chain. A malformed tracked element fails the parse.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameParseError> {
        let mut ies = ParsedIes::default();
        for (ie_type, range) in IeSummaryIter::new(bytes) {
            let body = &bytes[range];
            match ie_type {
                IeType::Basic(Id::SSID) => {
                    ies.ssid = Some(check_len(Id::SSID.0, body, body.len() <= SSID_MAX_LEN)?)
                }
                IeType::Basic(Id::DSSS_PARAM_SET) => ies.dsss = Some(parse_dsss_param_set(body)?),
                IeType::Basic(Id::EDCA_PARAM_SET) => ies.edca = Some(parse_edca_param_set(body)?),
                IeType::Basic(Id::CHANNEL_SWITCH_ANNOUNCEMENT) => {
                    ies.csa = Some(parse_channel_switch_announcement(body)?)
                }
                IeType::Basic(Id::EXT_CHANNEL_SWITCH_ANNOUNCEMENT) => {
                    ies.ecsa = Some(parse_extended_channel_switch_announcement(body)?)
                }
                IeType::Basic(Id::QUIET) => ies.quiet = Some(parse_quiet(body)?),
                IeType::Basic(Id::HT_CAPABILITIES) => {
                    ies.ht_cap = Some(check_len(
                        Id::HT_CAPABILITIES.0,
                        body,
                        body.len() == HT_CAPABILITIES_LEN,
                    )?)
                }
                IeType::Basic(Id::HT_OPERATION) => {
                    ies.ht_op =
                        Some(check_len(Id::HT_OPERATION.0, body, body.len() == HT_OPERATION_LEN)?)
                }
                IeType::Basic(Id::VHT_CAPABILITIES) => {
                    ies.vht_cap = Some(check_len(
                        Id::VHT_CAPABILITIES.0,
                        body,
                        body.len() == VHT_CAPABILITIES_LEN,
                    )?)
                }
                IeType::Basic(Id::VHT_OPERATION) => {
                    ies.vht_op = Some(check_len(
                        Id::VHT_OPERATION.0,
                        body,
                        body.len() == VHT_OPERATION_LEN,
                    )?)
                }
                IeType::Basic(Id::RSNE) => {
                    let rsne = rsne::from_bytes(body)
                        .map_err(|e| FrameParseError::MalformedRsne(e.to_string()))?;
                    ies.rsne = Some(rsne);
                }
                IeType::Basic(Id::WIDE_BANDWIDTH_CHANNEL_SWITCH) => {
                    ies.wide_bandwidth_channel_switch = true
                }
                IeType::Basic(Id::CHANNEL_SWITCH_WRAPPER) => ies.channel_switch_wrapper = true,
                IeType::Basic(Id::OPERATING_MODE_NOTIFICATION) => {
                    ies.operating_mode_notification = true
                }
                IeType::Vendor(prefix) if prefix[..4] == WPA1_VENDOR_PREFIX[..] => ies.wpa1 = true,
                IeType::Extended(ExtId::HE_CAPABILITIES) => {
                    ies.he_cap = Some(check_len(
                        Id::EXTENSION.0,
                        body,
                        body.len() >= HE_CAPABILITIES_MIN_LEN,
                    )?)
                }
                IeType::Extended(ExtId::HE_OPERATION) => {
                    ies.he_op = Some(check_len(
                        Id::EXTENSION.0,
                        body,
                        body.len() >= HE_OPERATION_MIN_LEN,
                    )?)
                }
                IeType::Extended(ExtId::EHT_CAPABILITIES) => {
                    ies.eht_cap = Some(check_len(
                        Id::EXTENSION.0,
                        body,
                        body.len() >= EHT_CAPABILITIES_MIN_LEN,
                    )?)
                }
                IeType::Extended(ExtId::EHT_OPERATION) => {
                    ies.eht_op = Some(check_len(
                        Id::EXTENSION.0,
                        body,
                        body.len() >= EHT_OPERATION_MIN_LEN,
                    )?)
                }
                IeType::Extended(ExtId::MAX_CHANNEL_SWITCH_TIME) => {
                    ies.max_channel_switch_time = Some(body.to_vec())
                }
                IeType::Extended(ExtId::BSS_COLOR_CHANGE) => ies.bss_color_change = true,
                IeType::Extended(ExtId::MULTI_LINK) => {
                    ies.multi_link = Some(parse_multi_link(body)?)
                }
                _ => (),
            }
        }
        Ok(ies)
    }

    /// Current channel as advertised by the DSSS Parameter Set, or else by HT Operation.
    pub fn channel(&self) -> Option<u8> {
        self.dsss
            .map(|dsss| dsss.current_chan)
            .or_else(|| self.ht_op.as_ref().and_then(|ht_op| ht_op.first().copied()))
    }

    pub fn is_protected(&self) -> bool {
        self.rsne.is_some() || self.wpa1
    }

    /// True if an element announcing a scheduled change of operating parameters is present.
    pub fn has_critical_update_element(&self) -> bool {
        self.csa.is_some()
            || self.ecsa.is_some()
            || self.quiet.is_some()
            || self.wide_bandwidth_channel_switch
            || self.channel_switch_wrapper
            || self.operating_mode_notification
            || self.bss_color_change
    }
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    #[test]
    fn collects_tracked_elements() {
        #[rustfmt::skip]
        let bytes = [
            0, 3, b'f', b'o', b'o', // SSID
            1, 1, 0x82, // supported rates, untracked
            3, 1, 11, // DSSS channel 11
            37, 3, 1, 6, 10, // CSA
            48, 2, 1, 0, // RSNE, version only
            255, 2, 42, 0, // BSS color change
        ];
        let ies = ParsedIes::parse(&bytes[..]).expect("valid elements");
        assert_eq!(ies.ssid.as_deref(), Some(&b"foo"[..]));
        assert_eq!(ies.channel(), Some(11));
        assert_eq!(ies.csa.map(|csa| csa.new_channel_number), Some(6));
        assert!(ies.is_protected());
        assert!(ies.bss_color_change);
        assert!(ies.has_critical_update_element());
        assert_eq!(ies.edca, None);
    }

    #[test]
    fn channel_falls_back_to_ht_operation() {
        let mut bytes = vec![61, 22, 36];
        bytes.extend_from_slice(&[0; 21]);
        let ies = ParsedIes::parse(&bytes[..]).expect("valid elements");
        assert_eq!(ies.channel(), Some(36));
        assert!(!ies.has_critical_update_element());
    }

    #[test]
    fn malformed_rsne_fails_parse() {
        let bytes = [0, 1, b'a', 48, 3, 1, 0, 0];
        assert_matches!(ParsedIes::parse(&bytes[..]), Err(FrameParseError::MalformedRsne(_)));
    }

    #[test]
    fn bad_length_fails_parse() {
        assert_matches!(
            ParsedIes::parse(&[61, 2, 36, 0][..]),
            Err(FrameParseError::InvalidElementLength { id: 61, len: 2 })
        );
        assert_matches!(
            ParsedIes::parse(&[3, 0][..]),
            Err(FrameParseError::InvalidElementLength { id: 3, len: 0 })
        );
    }

    #[test]
    fn truncated_tail_is_ignored() {
        let ies = ParsedIes::parse(&[3, 1, 6, 0, 5, b'a'][..]).expect("valid elements");
        assert_eq!(ies.channel(), Some(6));
        assert_eq!(ies.ssid, None);
    }
}
