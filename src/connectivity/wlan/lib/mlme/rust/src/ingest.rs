// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Turns received management frames into validated data for the session they belong to.
//! Beacons and probe responses are handed to the session directly; frames that complete a step
//! of the link handshake become confirmation messages. Malformed frames are dropped with a
//! rate-limited log line and never reach a session.

use {
    crate::{
        ap,
        client,
        context::Context,
        error::Error,
        message::{DisconnectIndication, Message, RxInfo},
        session::{CachedBeacon, DisconnectKind, Role, SessionStore, VdevId},
    },
    byteorder::{ByteOrder, LittleEndian},
    log::{debug, warn},
    std::mem::size_of,
    wlan_common::{
        error::FrameParseError,
        ie::{self, ParsedIes},
        mac::{
            self,
            mgmt::{parse_reason_code, AuthAlgorithmNumber},
            BeaconHdr, CapabilityInfo, MacAddr, MgmtHdr, StatusCode,
        },
    },
    zerocopy::LayoutVerified,
};

const MIN_BEACON_LEN: usize = size_of::<MgmtHdr>() + size_of::<BeaconHdr>();

// IEEE Std 802.11-2016, 9.4.1.1 and 9.6.10
const ACTION_CATEGORY_SA_QUERY: u8 = 8;
const SA_QUERY_ACTION_RESPONSE: u8 = 1;

/// Logs the first dropped frame and then one line per `interval` drops.
#[derive(Debug)]
pub struct DropLogLimiter {
    interval: u64,
    dropped: u64,
}

impl DropLogLimiter {
    pub fn new(interval: u32) -> Self {
        Self { interval: interval.max(1) as u64, dropped: 0 }
    }

    /// Counts a dropped frame. Returns whether it was logged.
    pub fn record(&mut self, vdev_id: VdevId, e: &Error) -> bool {
        self.dropped += 1;
        if self.dropped == 1 || self.dropped % self.interval == 0 {
            warn!("dropping frame on vdev {}: {} ({} dropped so far)", vdev_id, e, self.dropped);
            true
        } else {
            false
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// A validated beacon or probe response.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedBeacon {
    pub bssid: MacAddr,
    pub probe_response: bool,
    pub beacon: CachedBeacon,
}

/// Validates a beacon or probe response. Frames longer than `max_len` cannot be cached.
pub fn parse_beacon(frame: &[u8], max_len: usize) -> Result<ReceivedBeacon, Error> {
    let (hdr, body) = mac::parse_mgmt_frame(frame)?;
    let fc = hdr.frame_ctrl();
    let probe_response = fc.is_mgmt_subtype(mac::MGMT_SUBTYPE_PROBE_RESP);
    if !probe_response && !fc.is_mgmt_subtype(mac::MGMT_SUBTYPE_BEACON) {
        return Err(FrameParseError::UnexpectedFrameType {
            frame_type: fc.frame_type(),
            subtype: fc.frame_subtype(),
        }
        .into());
    }
    let (fixed, ies) = LayoutVerified::<_, BeaconHdr>::new_unaligned_from_prefix(body)
        .ok_or(FrameParseError::TooShort { len: frame.len(), min: MIN_BEACON_LEN })?;
    let ies = ParsedIes::parse(ies)?;
    if frame.len() > max_len {
        return Err(Error::NoResources(frame.len()));
    }
    Ok(ReceivedBeacon {
        bssid: hdr.bssid(),
        probe_response,
        beacon: CachedBeacon {
            frame: frame.to_vec(),
            timestamp: fixed.timestamp(),
            beacon_interval: fixed.beacon_interval(),
            capabilities: fixed.capabilities(),
            ies,
        },
    })
}

fn fixed_fields(body: &[u8], min: usize) -> Result<&[u8], FrameParseError> {
    match body.len() >= min {
        true => Ok(body),
        false => Err(FrameParseError::TooShort { len: body.len(), min }),
    }
}

/// Challenge text of a shared key authentication frame. IEEE Std 802.11-2020, 12.3.3.3.3
fn challenge_text(ies: &[u8]) -> Result<Vec<u8>, FrameParseError> {
    let id = ie::Id::CHALLENGE_TEXT;
    match ie::Reader::new(ies).find(|(found, _)| *found == id) {
        Some((_, body)) if !body.is_empty() => Ok(body.to_vec()),
        _ => Err(FrameParseError::InvalidElementLength { id: id.0, len: 0 }),
    }
}

pub fn handle_mgmt_frame(
    ctx: &mut Context,
    sessions: &mut SessionStore,
    vdev_id: VdevId,
    frame: &[u8],
    rx_info: RxInfo,
) -> Result<(), Error> {
    match process_frame(ctx, sessions, vdev_id, frame, rx_info) {
        Err(e) if matches!(e, Error::ParsingFrame(_) | Error::NoResources(_)) => {
            if ctx.drop_log.record(vdev_id, &e) {
                debug!("dropped frame head: {}", hex::encode(&frame[..frame.len().min(32)]));
            }
            Ok(())
        }
        other => other,
    }
}

fn process_frame(
    ctx: &mut Context,
    sessions: &mut SessionStore,
    vdev_id: VdevId,
    frame: &[u8],
    rx_info: RxInfo,
) -> Result<(), Error> {
    let (hdr, body) = mac::parse_mgmt_frame(frame)?;
    let fc = hdr.frame_ctrl();
    let (sa, bssid) = (hdr.sa(), hdr.bssid());
    match fc.frame_subtype() {
        mac::MGMT_SUBTYPE_BEACON | mac::MGMT_SUBTYPE_PROBE_RESP => {
            let received = parse_beacon(frame, ctx.config.max_cached_frame_len)?;
            let session = match sessions.find(&received.bssid, vdev_id) {
                Some(session) if session.role == Role::Client => session.handle,
                // Frames outside any session only feed the scan cache.
                _ => return Ok(()),
            };
            let session = sessions.get_mut(session).ok_or(Error::UnknownSession(session))?;
            client::on_beacon_frame(ctx, session, received, rx_info)
        }
        mac::MGMT_SUBTYPE_AUTH => {
            let body = fixed_fields(body, 6)?;
            let algorithm = AuthAlgorithmNumber(LittleEndian::read_u16(&body[0..2]));
            let seq = LittleEndian::read_u16(&body[2..4]);
            let status = StatusCode(LittleEndian::read_u16(&body[4..6]));
            let is_final = match algorithm {
                AuthAlgorithmNumber::OPEN => seq == 2,
                AuthAlgorithmNumber::SHARED_KEY => seq == 4 || !status.is_success(),
                _ => !status.is_success(),
            };
            let challenge = algorithm == AuthAlgorithmNumber::SHARED_KEY && seq == 2 && !is_final;
            if !is_final && !challenge {
                debug!("ignoring auth frame seq {} from {:02x?}", seq, sa);
                return Ok(());
            }
            let session = match sessions.find_by_vdev(vdev_id) {
                Some(session)
                    if session.role == Role::Client
                        && (session.bssid == sa || session.pre_auth_target == Some(sa)) =>
                {
                    session.handle
                }
                _ => return Ok(()),
            };
            if challenge {
                let challenge = challenge_text(&body[6..])?;
                ctx.post(Message::AuthChallenge { session, peer: sa, challenge });
                return Ok(());
            }
            ctx.post(Message::AuthConfirm { session, peer: sa, algorithm, status });
            Ok(())
        }
        mac::MGMT_SUBTYPE_ASSOC_RESP | mac::MGMT_SUBTYPE_REASSOC_RESP => {
            let body = fixed_fields(body, 6)?;
            let status = StatusCode(LittleEndian::read_u16(&body[2..4]));
            // The two most significant bits of the AID field are reserved.
            let aid = LittleEndian::read_u16(&body[4..6]) & 0x3fff;
            let ies = body[6..].to_vec();
            let session = match sessions.find_by_vdev(vdev_id) {
                Some(session)
                    if session.role == Role::Client
                        && (session.bssid == sa || session.reassoc_target == Some(sa)) =>
                {
                    session.handle
                }
                _ => return Ok(()),
            };
            ctx.post(Message::AssocConfirm { session, peer: sa, status, aid, ies });
            Ok(())
        }
        subtype @ (mac::MGMT_SUBTYPE_ASSOC_REQ | mac::MGMT_SUBTYPE_REASSOC_REQ) => {
            let fixed_len = match subtype {
                mac::MGMT_SUBTYPE_REASSOC_REQ => 10,
                _ => 4,
            };
            let body = fixed_fields(body, fixed_len)?;
            let capabilities = CapabilityInfo(LittleEndian::read_u16(&body[0..2]));
            let listen_interval = LittleEndian::read_u16(&body[2..4]);
            let ies = &body[fixed_len..];
            let handle = match sessions.find(&bssid, vdev_id) {
                Some(session) if session.role == Role::Ap => session.handle,
                _ => return Ok(()),
            };
            let session = sessions.get_mut(handle).ok_or(Error::UnknownSession(handle))?;
            ap::on_assoc_request(ctx, session, sa, capabilities, listen_interval, ies)
        }
        subtype @ (mac::MGMT_SUBTYPE_DEAUTH | mac::MGMT_SUBTYPE_DISASSOC) => {
            let reason = parse_reason_code(body)?;
            let kind = match subtype {
                mac::MGMT_SUBTYPE_DEAUTH => DisconnectKind::Deauth,
                _ => DisconnectKind::Disassoc,
            };
            let session = sessions.find(&bssid, vdev_id).map(|session| session.handle);
            ctx.post(Message::DisconnectIndication(DisconnectIndication {
                session,
                peer: sa,
                kind,
                reason,
                protected: fc.protected(),
            }));
            Ok(())
        }
        mac::MGMT_SUBTYPE_ACTION => {
            match body {
                [ACTION_CATEGORY_SA_QUERY, SA_QUERY_ACTION_RESPONSE, id_lo, id_hi, ..] => {
                    let transaction_id = u16::from_le_bytes([*id_lo, *id_hi]);
                    if let Some(session) = sessions.find(&bssid, vdev_id) {
                        ctx.post(Message::SaQueryResponse {
                            session: session.handle,
                            peer: sa,
                            transaction_id,
                        });
                    }
                }
                _ => (),
            }
            Ok(())
        }
        subtype => {
            debug!("ignoring management frame subtype {:#x} on vdev {}", subtype, vdev_id);
            Ok(())
        }
    }
}
