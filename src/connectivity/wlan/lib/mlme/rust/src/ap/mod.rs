// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access point role. The session itself stays in `BssStarted` while its BSS runs; every
//! associating station gets a peer entry with its own MLME sub-state.

use {
    crate::{
        context::Context,
        device::{FirmwareCommand, FwStatus, MgmtFrameRequest, ResultCode, UpperLayerEvent},
        error::Error,
        message::{DisconnectIndication, StartBssRequest},
        mlo::MloLink,
        session::{capabilities::negotiate, CleanupTrigger, DisconnectKind, Role, Session},
        sme::{self, Confirm},
        state::{MlmState, SmeState},
        teardown,
    },
    log::{debug, error, info, warn},
    wlan_common::{
        ie::ParsedIes,
        mac::{CapabilityInfo, MacAddr, MacFmt, ReasonCode, StatusCode},
    },
};

pub fn start_bss(
    ctx: &mut Context,
    session: &mut Session,
    req: &StartBssRequest,
) -> Result<(), Error> {
    session.ssid = req.ssid.clone();
    session.channel = req.channel;
    session.beacon_interval = req.beacon_interval;
    session.bss_capabilities = req.capabilities;
    session.mlo = req.mlo.as_ref().map(MloLink::new);
    session.states.transition(SmeState::WaitStart, MlmState::WaitAddBssResponse)?;
    info!("starting BSS {} on vdev {}", session.bssid.to_mac_str(), session.vdev_id);
    let command = FirmwareCommand::AddBss {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        role: Role::Ap,
        channel: session.channel,
        beacon_interval: session.beacon_interval,
        capabilities: session.bss_capabilities,
    };
    if let Err(e) = ctx.send_command(command) {
        error!("failed to start BSS: {}", e);
        return start_failed(ctx, session);
    }
    Ok(())
}

fn start_failed(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    let event = UpperLayerEvent::StartBssResponse {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        result: ResultCode::FirmwareFailure,
    };
    teardown::begin(ctx, session, CleanupTrigger::StartFailure, SmeState::Offline, vec![event])
}

pub fn on_add_bss_response(
    ctx: &mut Context,
    session: &mut Session,
    status: FwStatus,
) -> Result<(), Error> {
    sme::check(Confirm::AddBss, &session.states)?;
    if session.states.mlm() != MlmState::WaitAddBssResponse {
        return Err(Error::unexpected("AddBssResponse", &session.states));
    }
    if !status.is_success() {
        warn!("firmware could not start BSS {}", session.bssid.to_mac_str());
        return start_failed(ctx, session);
    }
    session.bss_added = true;
    session.states.transition(SmeState::NormalLinkEstablished, MlmState::BssStarted)?;
    ctx.notify(UpperLayerEvent::StartBssResponse {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        result: ResultCode::Success,
    });
    Ok(())
}

pub fn stop_bss(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    info!("stopping BSS {} with {} peers", session.bssid.to_mac_str(), session.peers.len());
    let event = UpperLayerEvent::StopBssResponse {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        result: ResultCode::Success,
    };
    teardown::begin(ctx, session, CleanupTrigger::HostRequested, SmeState::Offline, vec![event])
}

fn bss_running(session: &Session) -> bool {
    session.states.mlm() == MlmState::BssStarted && session.teardown.is_none()
}

fn send_assoc_resp(
    ctx: &mut Context,
    session: &Session,
    peer: MacAddr,
    status: StatusCode,
    aid: Option<u16>,
) {
    let frame = MgmtFrameRequest::AssocResp { vdev_id: session.vdev_id, peer, status, aid };
    if let Err(e) = ctx.send_frame(frame) {
        error!("failed to send association response to {}: {}", peer.to_mac_str(), e);
    }
}

/// An association or reassociation request from a station.
pub fn on_assoc_request(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    capabilities: CapabilityInfo,
    listen_interval: u16,
    ies: &[u8],
) -> Result<(), Error> {
    if !bss_running(session) {
        return Err(Error::unexpected("AssocRequest", &session.states));
    }
    if ies.len() > ctx.config.max_cached_frame_len {
        return Err(Error::NoResources(ies.len()));
    }
    let parsed = ParsedIes::parse(ies)?;
    if let Some(entry) = session.peers.find_by_addr(&peer) {
        if matches!(entry.mlm_state, MlmState::WaitAddStaResponse | MlmState::WaitDelStaResponse)
        {
            debug!("{} is busy in {:?}; ignoring its request", peer.to_mac_str(), entry.mlm_state);
            return Ok(());
        }
    }
    let aid = match session.peers.insert(peer) {
        Ok(aid) => aid,
        Err(Error::PeerTableFull) => {
            warn!("no room for {} on BSS {}", peer.to_mac_str(), session.bssid.to_mac_str());
            send_assoc_resp(ctx, session, peer, StatusCode::DENIED_NO_MORE_STAS, None);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let negotiated = negotiate(&ctx.config.local_capabilities, capabilities, &parsed);
    let vdev_id = session.vdev_id;
    let entry = match session.peers.get_mut(aid) {
        Some(entry) => entry,
        None => return Err(Error::unexpected("AssocRequest", &session.states)),
    };
    let update = entry.is_installed();
    entry.mlm_state = MlmState::WaitAddStaResponse;
    entry.capabilities = Some(negotiated.clone());
    entry.listen_interval = listen_interval;
    entry.assoc_req_ies = ies.to_vec();
    entry.cleanup_trigger = None;
    entry.pending_notification = None;
    info!("{} associating with aid {}", peer.to_mac_str(), aid);
    let command =
        FirmwareCommand::AddSta { vdev_id, peer, aid, capabilities: negotiated, update };
    if let Err(e) = ctx.send_command(command) {
        error!("failed to add peer {}: {}", peer.to_mac_str(), e);
        session.peers.remove(aid);
        send_assoc_resp(ctx, session, peer, StatusCode::REFUSED_REASON_UNSPECIFIED, None);
    }
    Ok(())
}

pub fn on_add_sta_response(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: FwStatus,
    fw_index: u16,
) -> Result<(), Error> {
    sme::check(Confirm::AddSta, &session.states)?;
    let entry = match session.peers.find_by_addr_mut(&peer) {
        Some(entry) if entry.mlm_state == MlmState::WaitAddStaResponse => entry,
        _ => return Err(Error::unexpected("AddStaResponse", &session.states)),
    };
    if !status.is_success() {
        warn!("firmware refused peer {}", peer.to_mac_str());
        let notification = entry.pending_notification.take();
        let departed = entry.cleanup_trigger.is_some();
        session.peers.remove_by_addr(&peer);
        match notification {
            Some(event) => ctx.notify(event),
            None if !departed => {
                let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
                send_assoc_resp(ctx, session, peer, status, None);
            }
            None => (),
        }
        return Ok(());
    }
    entry.fw_index = Some(fw_index);
    entry.mlm_state = MlmState::LinkEstablished;

    // The station left while its context was being installed.
    if let Some(trigger) = entry.cleanup_trigger {
        let notification = entry.pending_notification.take();
        return remove_peer(ctx, session, peer, trigger, notification);
    }
    let capabilities = match entry.capabilities.clone() {
        Some(capabilities) => capabilities,
        None => return Err(Error::unexpected("AddStaResponse", &session.states)),
    };
    let event = UpperLayerEvent::AssocIndication {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        peer,
        aid: entry.aid,
        capabilities,
        assoc_req_ies: entry.assoc_req_ies.clone(),
    };
    ctx.notify(event);
    Ok(())
}

/// The upper layer's verdict on an association indication.
pub fn on_assoc_ind_confirm(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    accept: bool,
) -> Result<(), Error> {
    if !bss_running(session) {
        return Err(Error::unexpected("AssocIndConfirm", &session.states));
    }
    let aid = match session.peers.find_by_addr(&peer) {
        Some(entry) if entry.mlm_state == MlmState::LinkEstablished => entry.aid,
        _ => return Err(Error::unexpected("AssocIndConfirm", &session.states)),
    };
    if accept {
        info!("{} associated with aid {}", peer.to_mac_str(), aid);
        send_assoc_resp(ctx, session, peer, StatusCode::SUCCESS, Some(aid));
        return Ok(());
    }
    info!("association of {} refused by policy", peer.to_mac_str());
    send_assoc_resp(ctx, session, peer, StatusCode::REFUSED_REASON_UNSPECIFIED, None);
    remove_peer(ctx, session, peer, CleanupTrigger::HostRequested, None)
}

/// Removes `peer` from firmware and the peer table. `notification` goes upward once the
/// peer's firmware context is gone.
fn remove_peer(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    trigger: CleanupTrigger,
    notification: Option<UpperLayerEvent>,
) -> Result<(), Error> {
    let vdev_id = session.vdev_id;
    let entry = match session.peers.find_by_addr_mut(&peer) {
        Some(entry) => entry,
        None => {
            if let Some(event) = notification {
                ctx.notify(event);
            }
            return Ok(());
        }
    };
    entry.cleanup_trigger = Some(trigger);
    if entry.mlm_state == MlmState::WaitAddStaResponse {
        // Removed once add-STA completes.
        entry.pending_notification = notification;
        return Ok(());
    }
    if !entry.is_installed() {
        session.peers.remove_by_addr(&peer);
        if let Some(event) = notification {
            ctx.notify(event);
        }
        return Ok(());
    }
    entry.mlm_state = MlmState::WaitDelStaResponse;
    entry.pending_notification = notification;
    let fw_index = entry.fw_index;
    if let Err(e) = ctx.send_command(FirmwareCommand::DelSta { vdev_id, peer, fw_index }) {
        error!("failed to remove peer {}: {}", peer.to_mac_str(), e);
        let removed = session.peers.remove_by_addr(&peer);
        if let Some(event) = removed.and_then(|entry| entry.pending_notification) {
            ctx.notify(event);
        }
    }
    Ok(())
}

/// Deauthenticates or disassociates one station at the upper layer's request.
pub fn disconnect(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    kind: DisconnectKind,
    reason: ReasonCode,
) -> Result<(), Error> {
    let vdev_id = session.vdev_id;
    let known = session
        .peers
        .find_by_addr(&peer)
        .map_or(false, |entry| entry.mlm_state != MlmState::WaitDelStaResponse);
    if !bss_running(session) || !known {
        let result = ResultCode::InvalidState;
        ctx.notify(UpperLayerEvent::DisconnectResponse { vdev_id, peer, result });
        return Err(Error::unexpected("Disconnect", &session.states));
    }
    let frame = match kind {
        DisconnectKind::Deauth => MgmtFrameRequest::Deauth { vdev_id, peer, reason },
        DisconnectKind::Disassoc => MgmtFrameRequest::Disassoc { vdev_id, peer, reason },
    };
    if let Err(e) = ctx.send_frame(frame) {
        error!("failed to send {:?} to {}: {}", kind, peer.to_mac_str(), e);
    }
    let event = UpperLayerEvent::DisconnectResponse { vdev_id, peer, result: ResultCode::Success };
    remove_peer(ctx, session, peer, CleanupTrigger::HostRequested, Some(event))
}

/// A station deauthenticated or disassociated from the BSS. The upper layer hears about it once
/// the station's firmware context is removed.
pub fn on_disconnect_indication(
    ctx: &mut Context,
    session: &mut Session,
    ind: &DisconnectIndication,
) -> Result<(), Error> {
    let busy = match session.peers.find_by_addr(&ind.peer) {
        Some(entry) => entry.mlm_state == MlmState::WaitDelStaResponse,
        None => {
            debug!("{:?} from unknown station {}", ind.kind, ind.peer.to_mac_str());
            return Ok(());
        }
    };
    if busy || session.teardown.is_some() {
        return Ok(());
    }
    let (vdev_id, bssid, peer, reason) = (session.vdev_id, session.bssid, ind.peer, ind.reason);
    info!("{} sent {:?}, reason {}", peer.to_mac_str(), ind.kind, reason.0);
    let (trigger, event) = match ind.kind {
        DisconnectKind::Deauth => {
            let trigger = CleanupTrigger::PeerDeauth;
            (trigger, UpperLayerEvent::DeauthIndication { vdev_id, bssid, peer, reason, trigger })
        }
        DisconnectKind::Disassoc => {
            let trigger = CleanupTrigger::PeerDisassoc;
            (trigger, UpperLayerEvent::DisassocIndication { vdev_id, bssid, peer, reason, trigger })
        }
    };
    remove_peer(ctx, session, peer, trigger, Some(event))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            config::MlmeConfig,
            message::Message,
            test_utils::MlmeHarness,
        },
        wlan_common::{
            assert_variant,
            test_utils::fake_frames::{fake_assoc_req_frame, fake_deauth_frame},
        },
    };

    const AP_VDEV: u8 = 2;
    const AP_BSSID: MacAddr = [0x0a; 6];
    const CLIENT: MacAddr = [0x0c; 6];
    const OTHER_CLIENT: MacAddr = [0x0d; 6];

    fn start_request() -> StartBssRequest {
        let mut capabilities = CapabilityInfo(0);
        capabilities.set_ess(true);
        StartBssRequest {
            vdev_id: AP_VDEV,
            bssid: AP_BSSID,
            ssid: b"guest".to_vec(),
            channel: 36,
            beacon_interval: 100,
            capabilities,
            mlo: None,
        }
    }

    fn states(h: &MlmeHarness) -> (SmeState, MlmState) {
        let states = &h.session_on(AP_VDEV).states;
        (states.sme(), states.mlm())
    }

    fn start(h: &mut MlmeHarness) {
        h.mlme.dispatch(Message::StartBss(start_request()));
        h.mlme.dispatch(Message::AddBssResponse { vdev_id: AP_VDEV, status: FwStatus::Success });
        h.device.take_commands();
        h.device.take_events();
    }

    fn rx_assoc_request(h: &mut MlmeHarness, client: MacAddr) {
        let mut capabilities = CapabilityInfo(0);
        capabilities.set_ess(true);
        h.rx_on(AP_VDEV, fake_assoc_req_frame(client, AP_BSSID, capabilities, 10, &[0, 0]));
    }

    fn add_sta_response(h: &mut MlmeHarness, peer: MacAddr, status: FwStatus) {
        h.mlme.dispatch(Message::AddStaResponse { vdev_id: AP_VDEV, peer, status, fw_index: 5 });
    }

    fn del_sta_response(h: &mut MlmeHarness, peer: MacAddr) {
        h.mlme.dispatch(Message::DelStaResponse {
            vdev_id: AP_VDEV,
            peer,
            status: FwStatus::Success,
        });
    }

    /// Leaves `CLIENT` associated and accepted.
    fn associate(h: &mut MlmeHarness) {
        rx_assoc_request(h, CLIENT);
        add_sta_response(h, CLIENT, FwStatus::Success);
        h.mlme.dispatch(Message::AssocIndConfirm { vdev_id: AP_VDEV, peer: CLIENT, accept: true });
        h.device.take_commands();
        h.device.take_frames();
        h.device.take_events();
    }

    #[test]
    fn start_and_stop_bss() {
        let mut h = MlmeHarness::new();
        h.mlme.dispatch(Message::StartBss(start_request()));
        assert_eq!(states(&h), (SmeState::WaitStart, MlmState::WaitAddBssResponse));
        assert_variant!(
            &h.device.take_commands()[..],
            [FirmwareCommand::AddBss { role: Role::Ap, channel: 36, .. }]
        );
        h.mlme.dispatch(Message::AddBssResponse { vdev_id: AP_VDEV, status: FwStatus::Success });
        assert_eq!(states(&h), (SmeState::NormalLinkEstablished, MlmState::BssStarted));
        assert_eq!(
            h.device.take_events(),
            vec![UpperLayerEvent::StartBssResponse {
                vdev_id: AP_VDEV,
                bssid: AP_BSSID,
                result: ResultCode::Success,
            }]
        );

        h.mlme.dispatch(Message::StopBss { vdev_id: AP_VDEV });
        assert_eq!(states(&h), (SmeState::Offline, MlmState::WaitDelBssResponse));
        h.mlme.dispatch(Message::DelBssResponse { vdev_id: AP_VDEV, status: FwStatus::Success });
        assert_eq!(
            h.device.take_events(),
            vec![UpperLayerEvent::StopBssResponse {
                vdev_id: AP_VDEV,
                bssid: AP_BSSID,
                result: ResultCode::Success,
            }]
        );
        assert!(h.mlme.sessions().is_empty());
    }

    #[test]
    fn start_failure() {
        let mut h = MlmeHarness::new();
        h.mlme.dispatch(Message::StartBss(start_request()));
        h.mlme.dispatch(Message::AddBssResponse { vdev_id: AP_VDEV, status: FwStatus::Failure });
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::StartBssResponse { result: ResultCode::FirmwareFailure, .. }]
        );
        assert!(h.mlme.sessions().is_empty());
    }

    #[test]
    fn station_association_is_confirmed_upward() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        rx_assoc_request(&mut h, CLIENT);
        assert_variant!(
            &h.device.take_commands()[..],
            [FirmwareCommand::AddSta { vdev_id: AP_VDEV, peer: CLIENT, aid: 1, update: false, .. }]
        );
        assert!(h.device.take_events().is_empty());

        add_sta_response(&mut h, CLIENT, FwStatus::Success);
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::AssocIndication { peer: CLIENT, aid: 1, assoc_req_ies, .. }] => {
                assert_eq!(assoc_req_ies, &vec![0, 0]);
            }
        );
        assert!(h.device.take_frames().is_empty());

        h.mlme.dispatch(Message::AssocIndConfirm { vdev_id: AP_VDEV, peer: CLIENT, accept: true });
        assert_eq!(
            h.device.take_frames(),
            vec![MgmtFrameRequest::AssocResp {
                vdev_id: AP_VDEV,
                peer: CLIENT,
                status: StatusCode::SUCCESS,
                aid: Some(1),
            }]
        );
        assert_eq!(states(&h), (SmeState::NormalLinkEstablished, MlmState::BssStarted));
    }

    #[test]
    fn policy_rejection_removes_peer() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        rx_assoc_request(&mut h, CLIENT);
        add_sta_response(&mut h, CLIENT, FwStatus::Success);
        h.device.take_commands();
        h.device.take_events();

        h.mlme.dispatch(Message::AssocIndConfirm {
            vdev_id: AP_VDEV,
            peer: CLIENT,
            accept: false,
        });
        assert_variant!(
            &h.device.take_frames()[..],
            [MgmtFrameRequest::AssocResp {
                status: StatusCode::REFUSED_REASON_UNSPECIFIED,
                aid: None,
                ..
            }]
        );
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::DelSta { vdev_id: AP_VDEV, peer: CLIENT, fw_index: Some(5) }]
        );
        del_sta_response(&mut h, CLIENT);
        assert!(h.session_on(AP_VDEV).peers.is_empty());
        assert!(h.device.take_events().is_empty());
    }

    #[test]
    fn full_peer_table_denies_association() {
        let mut h =
            MlmeHarness::with_config(MlmeConfig { max_peers_per_session: 1, ..Default::default() });
        start(&mut h);
        rx_assoc_request(&mut h, CLIENT);
        rx_assoc_request(&mut h, OTHER_CLIENT);
        assert_eq!(
            h.device.take_frames(),
            vec![MgmtFrameRequest::AssocResp {
                vdev_id: AP_VDEV,
                peer: OTHER_CLIENT,
                status: StatusCode::DENIED_NO_MORE_STAS,
                aid: None,
            }]
        );
        assert_eq!(h.session_on(AP_VDEV).peers.len(), 1);
    }

    #[test]
    fn add_sta_failure_refuses_station() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        rx_assoc_request(&mut h, CLIENT);
        add_sta_response(&mut h, CLIENT, FwStatus::Failure);
        assert_eq!(
            h.device.take_frames(),
            vec![MgmtFrameRequest::AssocResp {
                vdev_id: AP_VDEV,
                peer: CLIENT,
                status: StatusCode::REFUSED_REASON_UNSPECIFIED,
                aid: None,
            }]
        );
        assert!(h.session_on(AP_VDEV).peers.is_empty());
        assert!(h.device.take_events().is_empty());
    }

    #[test]
    fn peer_deauth_is_reported_after_removal() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        associate(&mut h);
        let reason = ReasonCode::LEAVING_NETWORK_DEAUTH;
        h.rx_on(AP_VDEV, fake_deauth_frame(CLIENT, AP_BSSID, AP_BSSID, reason, false));
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::DelSta { vdev_id: AP_VDEV, peer: CLIENT, fw_index: Some(5) }]
        );
        assert!(h.device.take_events().is_empty());

        del_sta_response(&mut h, CLIENT);
        assert_eq!(
            h.device.take_events(),
            vec![UpperLayerEvent::DeauthIndication {
                vdev_id: AP_VDEV,
                bssid: AP_BSSID,
                peer: CLIENT,
                reason,
                trigger: CleanupTrigger::PeerDeauth,
            }]
        );
        assert!(h.session_on(AP_VDEV).peers.is_empty());
        assert_eq!(states(&h), (SmeState::NormalLinkEstablished, MlmState::BssStarted));
    }

    #[test]
    fn deauth_during_add_sta_waits_for_context() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        rx_assoc_request(&mut h, CLIENT);
        h.device.take_commands();
        let reason = ReasonCode::LEAVING_NETWORK_DEAUTH;
        h.rx_on(AP_VDEV, fake_deauth_frame(CLIENT, AP_BSSID, AP_BSSID, reason, false));
        assert!(h.device.take_commands().is_empty());

        add_sta_response(&mut h, CLIENT, FwStatus::Success);
        assert_variant!(
            &h.device.take_commands()[..],
            [FirmwareCommand::DelSta { peer: CLIENT, .. }]
        );
        assert!(h.device.take_events().is_empty());
        del_sta_response(&mut h, CLIENT);
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::DeauthIndication { peer: CLIENT, .. }]
        );
    }

    #[test]
    fn host_disconnects_station() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        associate(&mut h);
        let reason = ReasonCode::UNSPECIFIED_REASON;
        h.mlme.dispatch(Message::Disconnect {
            vdev_id: AP_VDEV,
            peer: CLIENT,
            kind: DisconnectKind::Disassoc,
            reason,
        });
        assert_eq!(
            h.device.take_frames(),
            vec![MgmtFrameRequest::Disassoc { vdev_id: AP_VDEV, peer: CLIENT, reason }]
        );
        del_sta_response(&mut h, CLIENT);
        assert_eq!(
            h.device.take_events(),
            vec![UpperLayerEvent::DisconnectResponse {
                vdev_id: AP_VDEV,
                peer: CLIENT,
                result: ResultCode::Success,
            }]
        );
    }

    #[test]
    fn stop_bss_removes_peers_first() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        associate(&mut h);
        h.mlme.dispatch(Message::StopBss { vdev_id: AP_VDEV });
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::DelSta { vdev_id: AP_VDEV, peer: CLIENT, fw_index: Some(5) }]
        );
        del_sta_response(&mut h, CLIENT);
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::DelBss { vdev_id: AP_VDEV, bssid: AP_BSSID }]
        );
        assert!(h.device.take_events().is_empty());
        h.mlme.dispatch(Message::DelBssResponse { vdev_id: AP_VDEV, status: FwStatus::Success });
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::StopBssResponse { result: ResultCode::Success, .. }]
        );
        assert!(h.mlme.sessions().is_empty());
    }

    #[test]
    fn stop_bss_waits_for_pending_add_sta() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        rx_assoc_request(&mut h, CLIENT);
        h.device.take_commands();
        h.mlme.dispatch(Message::StopBss { vdev_id: AP_VDEV });
        assert!(h.device.take_commands().is_empty());

        // The late context is removed before the BSS.
        add_sta_response(&mut h, CLIENT, FwStatus::Success);
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::DelSta { vdev_id: AP_VDEV, peer: CLIENT, fw_index: Some(5) }]
        );
        assert_eq!(states(&h), (SmeState::Offline, MlmState::WaitDelStaResponse));
        del_sta_response(&mut h, CLIENT);
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::DelBss { vdev_id: AP_VDEV, bssid: AP_BSSID }]
        );
        assert!(h.device.take_events().is_empty());
        h.mlme.dispatch(Message::DelBssResponse { vdev_id: AP_VDEV, status: FwStatus::Success });
        assert_variant!(
            &h.device.take_events()[..],
            [UpperLayerEvent::StopBssResponse { result: ResultCode::Success, .. }]
        );
        assert!(h.mlme.sessions().is_empty());
    }

    #[test]
    fn stop_bss_after_refused_add_sta_removes_bss() {
        let mut h = MlmeHarness::new();
        start(&mut h);
        rx_assoc_request(&mut h, CLIENT);
        h.device.take_commands();
        h.mlme.dispatch(Message::StopBss { vdev_id: AP_VDEV });
        add_sta_response(&mut h, CLIENT, FwStatus::Failure);
        assert_eq!(
            h.device.take_commands(),
            vec![FirmwareCommand::DelBss { vdev_id: AP_VDEV, bssid: AP_BSSID }]
        );
    }

    #[test]
    fn assoc_request_before_start_is_dropped() {
        let mut h = MlmeHarness::new();
        h.mlme.dispatch(Message::StartBss(start_request()));
        h.device.take_commands();
        rx_assoc_request(&mut h, CLIENT);
        assert!(h.device.take_commands().is_empty());
        assert!(h.session_on(AP_VDEV).peers.is_empty());
    }
}
