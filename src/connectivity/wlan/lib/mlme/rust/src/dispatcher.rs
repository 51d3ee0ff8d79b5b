// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The serial message dispatcher. Each message is resolved to its session by handle, vdev or
//! peer address and handed to the role's handler. Messages whose session is gone are dropped:
//! firmware and radio events routinely race with local teardown.

use {
    crate::{
        ap, client,
        config::MlmeConfig,
        context::{Context, SessionTimeout},
        device::{
            Device, FirmwareCommand, FwStatus, KeyDescriptor, KeyType, ResultCode,
            UpperLayerEvent,
        },
        error::Error,
        ingest, mlo,
        message::{DisconnectIndication, Message},
        session::{Role, Session, SessionHandle, SessionStore, VdevId},
        sme::{self, Confirm},
        state::SmeState,
        teardown,
        timer::{EventId, Scheduler, Timer},
    },
    log::{debug, error, info, warn},
    wlan_common::mac::{MacAddr, MacFmt, StatusCode},
};

pub struct Mlme {
    ctx: Context,
    sessions: SessionStore,
}

fn on_vdev(sessions: &mut SessionStore, vdev_id: VdevId) -> Option<&mut Session> {
    let handle = sessions.find_by_vdev(vdev_id)?.handle;
    sessions.get_mut(handle)
}

fn on_peer<'a>(sessions: &'a mut SessionStore, peer: &MacAddr) -> Option<&'a mut Session> {
    let handle = sessions.find_by_peer(peer)?.handle;
    sessions.get_mut(handle)
}

impl Mlme {
    pub fn new(config: MlmeConfig, device: Device, scheduler: Box<dyn Scheduler>) -> Self {
        let sessions = SessionStore::new(config.max_sessions, config.max_peers_per_session);
        Self { ctx: Context::new(config, device, Timer::new(scheduler)), sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Malformed frames dropped since the engine started.
    pub fn dropped_frames(&self) -> u64 {
        self.ctx.drop_log.dropped()
    }

    /// Handles `msg` and every message it produces, in order.
    pub fn dispatch(&mut self, msg: Message) {
        let mut next = Some(msg);
        while let Some(msg) = next {
            let name = msg.name();
            if let Err(e) = self.handle(msg) {
                match e {
                    e if e.is_protocol_error() => warn!("dropping {}: {}", name, e),
                    Error::ParsingFrame(e) => debug!("dropping {}: {}", name, e),
                    e => error!("failed to handle {}: {}", name, e),
                }
            }
            self.reap_finished();
            next = self.ctx.take_followup();
        }
    }

    /// Deletes a session and cancels its timers. Deleting a session twice is a no-op.
    pub fn delete_session(&mut self, handle: SessionHandle) -> bool {
        delete_session(&mut self.ctx, &mut self.sessions, handle)
    }

    fn reap_finished(&mut self) {
        let finished: Vec<SessionHandle> = self
            .sessions
            .iter()
            .filter(|session| session.finished)
            .map(|session| session.handle)
            .collect();
        for handle in finished {
            self.delete_session(handle);
        }
    }

    fn handle(&mut self, msg: Message) -> Result<(), Error> {
        let name = msg.name();
        let ctx = &mut self.ctx;
        let sessions = &mut self.sessions;
        match msg {
            Message::Join(req) => {
                let handle = match sessions.create(req.bssid, req.vdev_id, Role::Client) {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!("rejecting join of {}: {}", req.bssid.to_mac_str(), e);
                        ctx.notify(UpperLayerEvent::JoinResponse {
                            vdev_id: req.vdev_id,
                            bssid: req.bssid,
                            result: creation_failure(&e),
                            status: StatusCode::REFUSED_REASON_UNSPECIFIED,
                            summary: None,
                        });
                        return Ok(());
                    }
                };
                let session = sessions.get_mut(handle).ok_or(Error::UnknownSession(handle))?;
                client::join(ctx, session, &req)
            }
            Message::StartBss(req) => {
                let handle = match sessions.create(req.bssid, req.vdev_id, Role::Ap) {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!("rejecting start of BSS {}: {}", req.bssid.to_mac_str(), e);
                        ctx.notify(UpperLayerEvent::StartBssResponse {
                            vdev_id: req.vdev_id,
                            bssid: req.bssid,
                            result: creation_failure(&e),
                        });
                        return Ok(());
                    }
                };
                let session = sessions.get_mut(handle).ok_or(Error::UnknownSession(handle))?;
                ap::start_bss(ctx, session, &req)
            }
            Message::Reassoc(req) => match on_vdev(sessions, req.vdev_id) {
                Some(session) if session.role == Role::Client => {
                    client::reassoc(ctx, session, &req)
                }
                _ => {
                    ctx.notify(UpperLayerEvent::ReassocResponse {
                        vdev_id: req.vdev_id,
                        bssid: req.new_bssid,
                        result: ResultCode::InvalidState,
                        status: StatusCode::REFUSED_REASON_UNSPECIFIED,
                        summary: None,
                    });
                    dropped(name, req.vdev_id)
                }
            },
            Message::PreAuth { vdev_id, target } => match on_vdev(sessions, vdev_id) {
                Some(session) if session.role == Role::Client => {
                    client::pre_auth(ctx, session, target)
                }
                _ => dropped(name, vdev_id),
            },
            Message::Disconnect { vdev_id, peer, kind, reason } => {
                match on_vdev(sessions, vdev_id) {
                    Some(session) if session.role == Role::Ap => {
                        ap::disconnect(ctx, session, peer, kind, reason)
                    }
                    Some(session) => client::disconnect(ctx, session, peer, kind, reason),
                    None => {
                        ctx.notify(UpperLayerEvent::DisconnectResponse {
                            vdev_id,
                            peer,
                            result: ResultCode::InvalidState,
                        });
                        dropped(name, vdev_id)
                    }
                }
            }
            Message::StopBss { vdev_id } => match on_vdev(sessions, vdev_id) {
                Some(session) if session.role == Role::Ap => ap::stop_bss(ctx, session),
                _ => dropped(name, vdev_id),
            },
            Message::AssocIndConfirm { vdev_id, peer, accept } => {
                match on_vdev(sessions, vdev_id) {
                    Some(session) if session.role == Role::Ap => {
                        ap::on_assoc_ind_confirm(ctx, session, peer, accept)
                    }
                    _ => dropped(name, vdev_id),
                }
            }
            Message::SetKeys { vdev_id, keys } => match on_vdev(sessions, vdev_id) {
                Some(session) => set_keys(ctx, session, keys),
                None => dropped(name, vdev_id),
            },
            Message::BeaconTemplateUpdate { vdev_id, ies } => match on_vdev(sessions, vdev_id) {
                Some(session) => mlo::handle_beacon_template_update(ctx, session, &ies[..]),
                None => dropped(name, vdev_id),
            },
            Message::DeleteSession { session } => {
                if !delete_session(ctx, sessions, session) {
                    debug!("session {:?} already deleted", session);
                }
                Ok(())
            }
            Message::MgmtFrame { vdev_id, frame, rx_info } => {
                ingest::handle_mgmt_frame(ctx, sessions, vdev_id, &frame[..], rx_info)
            }
            Message::AuthConfirm { session: handle, peer, status, .. } => {
                match sessions.get_mut(handle) {
                    Some(session) => client::on_auth_confirm(ctx, session, peer, status),
                    None => stale(name, handle),
                }
            }
            Message::AuthChallenge { session: handle, peer, challenge } => {
                match sessions.get_mut(handle) {
                    Some(session) => client::on_auth_challenge(ctx, session, peer, challenge),
                    None => stale(name, handle),
                }
            }
            Message::AssocConfirm { session: handle, peer, status, aid, ies } => {
                match sessions.get_mut(handle) {
                    Some(session) => {
                        client::on_assoc_confirm(ctx, session, peer, status, aid, ies)?;
                        // A reassociation moves the session to another BSSID.
                        sessions.update_bssid(handle)
                    }
                    None => stale(name, handle),
                }
            }
            Message::DisconnectIndication(ind) => on_disconnect_indication(ctx, sessions, ind),
            Message::SaQueryResponse { session: handle, peer, transaction_id } => {
                match sessions.get_mut(handle) {
                    Some(session) if session.role == Role::Client => {
                        client::on_sa_query_response(ctx, session, peer, transaction_id)
                    }
                    Some(_) => Ok(()),
                    None => stale(name, handle),
                }
            }
            Message::DisconnectTxConfirm { vdev_id, peer, status } => {
                match on_vdev(sessions, vdev_id) {
                    Some(session) if session.role == Role::Client => {
                        client::on_disconnect_tx_confirm(ctx, session, peer, status)
                    }
                    Some(_) => {
                        debug!("AP sent disconnect to {}", peer.to_mac_str());
                        Ok(())
                    }
                    None => dropped(name, vdev_id),
                }
            }
            Message::AddBssResponse { vdev_id, status } => match on_vdev(sessions, vdev_id) {
                Some(session) if session.role == Role::Ap => {
                    ap::on_add_bss_response(ctx, session, status)
                }
                Some(session) => client::on_add_bss_response(ctx, session, status),
                None => dropped(name, vdev_id),
            },
            Message::AddStaResponse { vdev_id, peer, status, fw_index } => {
                match on_vdev(sessions, vdev_id) {
                    Some(session) if session.teardown.is_some() => {
                        teardown::on_add_sta_response(ctx, session, peer, status, fw_index)
                    }
                    Some(session) if session.role == Role::Ap => {
                        ap::on_add_sta_response(ctx, session, peer, status, fw_index)
                    }
                    Some(session) => {
                        client::on_add_sta_response(ctx, session, peer, status, fw_index)
                    }
                    None => dropped(name, vdev_id),
                }
            }
            Message::DelStaResponse { vdev_id, peer, status } => match on_vdev(sessions, vdev_id) {
                Some(session) => {
                    sme::check(Confirm::DelSta, &session.states)?;
                    match client::replacing_bss(session) {
                        true => client::on_reassoc_del_sta_response(ctx, session, peer, status),
                        false => teardown::on_del_sta_response(ctx, session, peer, status),
                    }
                }
                None => dropped(name, vdev_id),
            },
            Message::DelBssResponse { vdev_id, status } => match on_vdev(sessions, vdev_id) {
                Some(session) => {
                    sme::check(Confirm::DelBss, &session.states)?;
                    match client::replacing_bss(session) {
                        true => client::on_reassoc_del_bss_response(ctx, session, status),
                        false => teardown::on_del_bss_response(ctx, session, status),
                    }
                }
                None => dropped(name, vdev_id),
            },
            Message::SetKeyResponse { vdev_id, peer, status } => match on_vdev(sessions, vdev_id) {
                Some(session) => {
                    sme::check(Confirm::SetKey, &session.states)?;
                    if !status.is_success() {
                        error!("firmware failed to install key for {}", peer.to_mac_str());
                    }
                    ctx.notify(UpperLayerEvent::SetKeysResponse {
                        vdev_id,
                        peer,
                        result: fw_result(status),
                    });
                    Ok(())
                }
                None => dropped(name, vdev_id),
            },
            Message::SwitchChannelResponse { vdev_id, channel, status } => {
                match on_vdev(sessions, vdev_id) {
                    Some(session) if session.role == Role::Client => {
                        client::on_switch_channel_response(ctx, session, channel, status)
                    }
                    _ => dropped(name, vdev_id),
                }
            }
            Message::Timeout(event_id) => on_timeout(ctx, sessions, event_id),
            Message::PartnerChannelSwitch { vdev_id, link_id, switch } => {
                match on_vdev(sessions, vdev_id) {
                    Some(session) if session.role == Role::Client => {
                        debug!("link {} announced a switch for vdev {}", link_id, vdev_id);
                        client::start_channel_switch(ctx, session, switch)
                    }
                    _ => dropped(name, vdev_id),
                }
            }
            Message::PartnerTemplateRefresh { vdev_id, link_id, bss_params_change_count } => {
                match on_vdev(sessions, vdev_id) {
                    Some(session) => mlo::handle_partner_template_refresh(
                        ctx,
                        session,
                        link_id,
                        bss_params_change_count,
                    ),
                    None => dropped(name, vdev_id),
                }
            }
        }
    }
}

fn delete_session(
    ctx: &mut Context,
    sessions: &mut SessionStore,
    handle: SessionHandle,
) -> bool {
    match sessions.get_mut(handle) {
        Some(session) => ctx.stop_all_timers(session),
        None => return false,
    }
    sessions.delete(handle).is_some()
}

fn dropped(name: &'static str, vdev_id: VdevId) -> Result<(), Error> {
    info!("dropping {}: no matching session on vdev {}", name, vdev_id);
    Ok(())
}

fn stale(name: &'static str, handle: SessionHandle) -> Result<(), Error> {
    info!("dropping {}: session {:?} is gone", name, handle);
    Ok(())
}

fn creation_failure(e: &Error) -> ResultCode {
    match e {
        Error::TableFull(_) => ResultCode::ResourcesUnavailable,
        _ => ResultCode::InvalidState,
    }
}

fn fw_result(status: FwStatus) -> ResultCode {
    match status {
        FwStatus::Success => ResultCode::Success,
        FwStatus::Failure => ResultCode::FirmwareFailure,
    }
}

fn on_disconnect_indication(
    ctx: &mut Context,
    sessions: &mut SessionStore,
    ind: DisconnectIndication,
) -> Result<(), Error> {
    let session = match ind.session {
        Some(handle) => sessions.get_mut(handle),
        None => on_peer(sessions, &ind.peer),
    };
    match session {
        Some(session) if session.role == Role::Ap => {
            ap::on_disconnect_indication(ctx, session, &ind)
        }
        Some(session) => client::on_disconnect_indication(ctx, session, &ind),
        None => {
            info!("dropping disconnect from {}: no matching session", ind.peer.to_mac_str());
            Ok(())
        }
    }
}

fn on_timeout(
    ctx: &mut Context,
    sessions: &mut SessionStore,
    event_id: EventId,
) -> Result<(), Error> {
    let SessionTimeout { session: handle, kind } = match ctx.timer.triggered(&event_id) {
        Some(timeout) => timeout,
        None => return Ok(()),
    };
    let session = match sessions.get_mut(handle) {
        Some(session) => session,
        None => return stale("Timeout", handle),
    };
    if session.timers.get(&kind) != Some(&event_id) {
        debug!("ignoring superseded {:?} timer of session {:?}", kind, handle);
        return Ok(());
    }
    session.timers.remove(&kind);
    match session.role {
        Role::Client => client::on_timeout(ctx, session, kind),
        _ => Ok(()),
    }
}

/// Installs keys on an established link. Each key is confirmed separately by the firmware.
fn set_keys(
    ctx: &mut Context,
    session: &mut Session,
    keys: Vec<KeyDescriptor>,
) -> Result<(), Error> {
    let vdev_id = session.vdev_id;
    if session.states.sme() != SmeState::NormalLinkEstablished {
        for key in keys {
            ctx.notify(UpperLayerEvent::SetKeysResponse {
                vdev_id,
                peer: key.address,
                result: ResultCode::InvalidState,
            });
        }
        return Err(Error::unexpected("SetKeys", &session.states));
    }
    for key in keys {
        let peer = key.address;
        let known_peer = match (session.role, key.key_type) {
            (Role::Ap, KeyType::Pairwise) => session.peers.find_by_addr(&peer).is_some(),
            _ => true,
        };
        if !known_peer {
            warn!("no peer {} for pairwise key", peer.to_mac_str());
            ctx.notify(UpperLayerEvent::SetKeysResponse {
                vdev_id,
                peer,
                result: ResultCode::InvalidParameters,
            });
            continue;
        }
        if let Err(e) = ctx.send_command(FirmwareCommand::SetKey { vdev_id, key }) {
            error!("failed to install key for {}: {}", peer.to_mac_str(), e);
            ctx.notify(UpperLayerEvent::SetKeysResponse {
                vdev_id,
                peer,
                result: ResultCode::FirmwareFailure,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            context::TimerKind,
            session::{ChannelSwitch, DisconnectKind},
            state::MlmState,
            test_utils::{MlmeHarness, BSSID, CHANNEL, VDEV},
        },
        wlan_common::{assert_variant, mac::ReasonCode},
    };

    fn fake_key(key_type: KeyType, address: MacAddr) -> KeyDescriptor {
        KeyDescriptor {
            key_type,
            address,
            key_id: 0,
            cipher_suite: [0x00, 0x0f, 0xac, 4],
            key: vec![0xaa; 16],
            rsc: 0,
        }
    }

    #[test]
    fn unresolvable_messages_are_dropped() {
        let mut h = MlmeHarness::new();
        h.mlme.dispatch(Message::AddBssResponse { vdev_id: 9, status: FwStatus::Success });
        h.mlme.dispatch(Message::DelStaResponse {
            vdev_id: 9,
            peer: BSSID,
            status: FwStatus::Success,
        });
        h.mlme.dispatch(Message::StopBss { vdev_id: 9 });
        assert!(h.mlme.sessions().is_empty());
        assert!(h.device.take_commands().is_empty());
        assert!(h.device.take_events().is_empty());
    }

    #[test]
    fn join_on_busy_vdev_is_rejected() {
        let mut h = MlmeHarness::new();
        h.establish();
        let req = h.join_request(Some(MlmeHarness::beacon()));
        h.mlme.dispatch(Message::Join(req));
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::JoinResponse { result: ResultCode::InvalidState, .. }]
        );
        assert_eq!(h.mlme.sessions().len(), 1);
        assert_eq!(h.states(), (SmeState::NormalLinkEstablished, MlmState::LinkEstablished));
    }

    #[test]
    fn join_with_full_table_is_refused() {
        let mut h = MlmeHarness::with_config(MlmeConfig { max_sessions: 1, ..Default::default() });
        h.establish();
        let req = crate::message::JoinRequest {
            vdev_id: VDEV + 1,
            bssid: [7; 6],
            ..h.join_request(None)
        };
        h.mlme.dispatch(Message::Join(req));
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::JoinResponse { result: ResultCode::ResourcesUnavailable, .. }]
        );
    }

    #[test]
    fn delete_session_is_idempotent() {
        let mut h = MlmeHarness::new();
        h.establish();
        let handle = h.handle();
        assert!(h.session().timers.contains_key(&TimerKind::StatusCheck));

        h.mlme.dispatch(Message::DeleteSession { session: handle });
        assert!(h.mlme.sessions().get(handle).is_none());
        assert!(h.scheduler.live_events().is_empty());

        h.mlme.dispatch(Message::DeleteSession { session: handle });
        assert!(h.mlme.sessions().is_empty());
        assert!(!h.mlme.delete_session(handle));
    }

    #[test]
    fn timer_of_deleted_session_is_ignored() {
        let mut h = MlmeHarness::new();
        h.establish();
        let handle = h.handle();
        let event_id = h.session().timers[&TimerKind::StatusCheck];
        h.mlme.dispatch(Message::DeleteSession { session: handle });

        // A new session reuses the slot; the old timer must not reach it.
        let req = h.join_request(None);
        h.mlme.dispatch(Message::Join(req));
        let states = h.states();
        h.mlme.dispatch(Message::Timeout(event_id));
        assert_eq!(h.states(), states);
        assert_ne!(h.handle(), handle);
    }

    #[test]
    fn confirmation_for_deleted_session_is_dropped() {
        let mut h = MlmeHarness::new();
        h.join_until_assoc();
        let handle = h.handle();
        h.mlme.dispatch(Message::DeleteSession { session: handle });
        h.mlme.dispatch(Message::AssocConfirm {
            session: handle,
            peer: BSSID,
            status: StatusCode::SUCCESS,
            aid: 1,
            ies: vec![],
        });
        assert!(h.mlme.sessions().is_empty());
        assert!(h.device.take_commands().is_empty());
    }

    #[test]
    fn protocol_error_leaves_session_unchanged() {
        let mut h = MlmeHarness::new();
        h.establish();
        h.mlme.dispatch(Message::AddBssResponse { vdev_id: VDEV, status: FwStatus::Success });
        h.mlme.dispatch(Message::DelBssResponse { vdev_id: VDEV, status: FwStatus::Success });
        assert_eq!(h.states(), (SmeState::NormalLinkEstablished, MlmState::LinkEstablished));
        assert!(h.device.take_commands().is_empty());
        assert!(h.device.take_events().is_empty());
    }

    #[test]
    fn set_keys_on_established_link() {
        let mut h = MlmeHarness::new();
        h.establish();
        let keys = vec![fake_key(KeyType::Pairwise, BSSID), fake_key(KeyType::Group, BSSID)];
        h.mlme.dispatch(Message::SetKeys { vdev_id: VDEV, keys });
        assert_variant!(
            &h.device.take_commands()[..],
            [FirmwareCommand::SetKey { .. }, FirmwareCommand::SetKey { .. }]
        );

        h.mlme.dispatch(Message::SetKeyResponse {
            vdev_id: VDEV,
            peer: BSSID,
            status: FwStatus::Failure,
        });
        assert_eq!(
            h.device.take_events(),
            vec![UpperLayerEvent::SetKeysResponse {
                vdev_id: VDEV,
                peer: BSSID,
                result: ResultCode::FirmwareFailure,
            }]
        );
    }

    #[test]
    fn set_keys_before_association_is_refused() {
        let mut h = MlmeHarness::new();
        h.join_until_assoc();
        let keys = vec![fake_key(KeyType::Pairwise, BSSID)];
        h.mlme.dispatch(Message::SetKeys { vdev_id: VDEV, keys });
        assert!(h.device.take_commands().is_empty());
        assert_eq!(
            h.device.take_events(),
            vec![UpperLayerEvent::SetKeysResponse {
                vdev_id: VDEV,
                peer: BSSID,
                result: ResultCode::InvalidState,
            }]
        );
    }

    #[test]
    fn disconnect_indication_is_routed_by_peer() {
        let mut h = MlmeHarness::new();
        h.establish();
        h.mlme.dispatch(Message::DisconnectIndication(DisconnectIndication {
            session: None,
            peer: BSSID,
            kind: DisconnectKind::Disassoc,
            reason: ReasonCode::UNSPECIFIED_REASON,
            protected: false,
        }));
        assert_eq!(h.states().1, MlmState::WaitDelStaResponse);
        h.complete_teardown();
        assert!(h.mlme.sessions().is_empty());
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::DisassocIndication { peer: BSSID, .. }]
        );
    }

    #[test]
    fn partner_channel_switch_reaches_partner_vdev() {
        let mut h = MlmeHarness::new();
        h.establish();
        let switch = ChannelSwitch { channel: 36, operating_class: Some(115), mode: 1, count: 3 };
        h.mlme.dispatch(Message::PartnerChannelSwitch { vdev_id: VDEV, link_id: 1, switch });
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::SwitchChannel { vdev_id: VDEV, switch }]
        );
        assert_eq!(h.session().channel, CHANNEL);
    }

    #[test]
    fn disconnect_without_session_is_answered() {
        let mut h = MlmeHarness::new();
        h.mlme.dispatch(Message::Disconnect {
            vdev_id: VDEV,
            peer: BSSID,
            kind: DisconnectKind::Deauth,
            reason: ReasonCode::LEAVING_NETWORK_DEAUTH,
        });
        assert_eq!(
            h.device.take_events(),
            vec![UpperLayerEvent::DisconnectResponse {
                vdev_id: VDEV,
                peer: BSSID,
                result: ResultCode::InvalidState,
            }]
        );
        assert!(h.device.take_frames().is_empty());
    }
}
