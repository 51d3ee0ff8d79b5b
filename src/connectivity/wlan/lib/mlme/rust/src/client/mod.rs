// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Station role. A join walks the session through beacon acquisition, BSS install,
//! authentication, association and peer install before the link is reported up. An established
//! link is then watched through the AP's beacons until it is disconnected or lost.

pub mod lost_bss;

use {
    crate::{
        config::AuthPolicy,
        context::{Context, TimerKind},
        device::{FirmwareCommand, FwStatus, MgmtFrameRequest, ResultCode, UpperLayerEvent},
        error::Error,
        ingest::{self, ReceivedBeacon},
        message::{DisconnectIndication, JoinRequest, ReassocRequest, RxInfo},
        mlo::{self, MloLink},
        session::{
            capabilities::{intersect_capability_info, negotiate},
            CachedBeacon, ChannelSwitch, CleanupTrigger, DisconnectKind, PendingDisconnect,
            ReassocMove, Role, SaQuery, Session, VdevId,
        },
        sme::{self, Confirm},
        state::{MlmState, SmeState},
        teardown,
    },
    log::{debug, error, info, warn},
    lost_bss::LostBssCounter,
    std::time::Duration,
    wlan_common::{
        energy::DecibelMilliWatt,
        ewma_signal::EwmaSignalStrength,
        ie::{AcParams, EdcaParamSet, ParsedIes},
        mac::{mgmt::AuthAlgorithmNumber, MacAddr, MacFmt, ReasonCode, StatusCode},
        TimeUnit,
    },
};

/// Auth algorithm to start with, and whether open system may follow a shared key failure.
fn auth_algorithm(policy: AuthPolicy, beacon: &CachedBeacon) -> (AuthAlgorithmNumber, bool) {
    let wep_only = beacon.capabilities.privacy() && !beacon.ies.is_protected();
    match policy {
        AuthPolicy::OpenSystem => (AuthAlgorithmNumber::OPEN, false),
        AuthPolicy::SharedKey => (AuthAlgorithmNumber::SHARED_KEY, false),
        AuthPolicy::AutoSwitch if wep_only => (AuthAlgorithmNumber::SHARED_KEY, true),
        AuthPolicy::AutoSwitch => (AuthAlgorithmNumber::OPEN, false),
    }
}

fn result_for(e: &Error) -> ResultCode {
    match e {
        Error::NoResources(_) | Error::TableFull(_) | Error::PeerTableFull => {
            ResultCode::ResourcesUnavailable
        }
        Error::ParsingFrame(_) => ResultCode::InvalidParameters,
        _ => ResultCode::FirmwareFailure,
    }
}

/// Turns a failed step of link setup into a failed join. Protocol errors leave the session
/// untouched.
fn or_join_failure(
    ctx: &mut Context,
    session: &mut Session,
    result: Result<(), Error>,
) -> Result<(), Error> {
    match result {
        Err(e) if !e.is_protocol_error() => {
            error!("link setup with {} failed: {}", session.bssid.to_mac_str(), e);
            join_failure(ctx, session, result_for(&e), StatusCode::REFUSED_REASON_UNSPECIFIED)
        }
        other => other,
    }
}

/// Reports a failed join or reassociation once everything installed for it is removed again.
pub fn join_failure(
    ctx: &mut Context,
    session: &mut Session,
    result: ResultCode,
    status: StatusCode,
) -> Result<(), Error> {
    let (vdev_id, bssid) = (session.vdev_id, session.bssid);
    warn!("joining {} failed: {:?} (status {:?})", bssid.to_mac_str(), result, status);
    let (sme, event) = match session.reassoc_target.take() {
        Some(target) => {
            session.reassoc_beacon = None;
            let event = UpperLayerEvent::ReassocResponse {
                vdev_id,
                bssid: target,
                result,
                status,
                summary: None,
            };
            (SmeState::Offline, event)
        }
        None => {
            let event =
                UpperLayerEvent::JoinResponse { vdev_id, bssid, result, status, summary: None };
            (SmeState::JoinFailure, event)
        }
    };
    teardown::begin(ctx, session, CleanupTrigger::JoinFailure, sme, vec![event])
}

/// Failure reports for optional procedures still in flight on a departing link.
fn pending_aborts(session: &mut Session) -> Vec<UpperLayerEvent> {
    let vdev_id = session.vdev_id;
    let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
    let mut events = vec![];
    if let Some(target) = session.pre_auth_target.take() {
        events.push(UpperLayerEvent::PreAuthResponse {
            vdev_id,
            target,
            result: ResultCode::Aborted,
            status,
        });
    }
    if let Some(target) = session.reassoc_target.take() {
        session.reassoc_beacon = None;
        events.push(UpperLayerEvent::ReassocResponse {
            vdev_id,
            bssid: target,
            result: ResultCode::Aborted,
            status,
            summary: None,
        });
    }
    events
}

pub fn join(ctx: &mut Context, session: &mut Session, req: &JoinRequest) -> Result<(), Error> {
    session.self_addr = req.self_addr;
    session.ssid = req.ssid.clone();
    session.channel = req.channel;
    session.beacon_interval = req.beacon_interval;
    session.pmf = req.pmf;
    session.mlo = req.mlo.as_ref().map(MloLink::new);
    session.join.listen_interval = ctx.config.listen_interval;
    info!("joining {} on vdev {}", session.bssid.to_mac_str(), session.vdev_id);

    let timeout = ctx.config.join_failure_timeout();
    ctx.start_timer(session, TimerKind::JoinFailure, timeout);
    let result = match req.bss_description.as_ref() {
        Some(frame) => match ingest::parse_beacon(frame, ctx.config.max_cached_frame_len) {
            Ok(received) if received.bssid == session.bssid => {
                add_bss(ctx, session, received.beacon)
            }
            Ok(received) => {
                warn!("BSS description is for {}", received.bssid.to_mac_str());
                let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
                return join_failure(ctx, session, ResultCode::InvalidParameters, status);
            }
            Err(e) => Err(e),
        },
        None => probe_for_bss(ctx, session),
    };
    or_join_failure(ctx, session, result)
}

fn probe_for_bss(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    session.states.transition(SmeState::WaitJoin, MlmState::Joining)?;
    send_probe(ctx, session)?;
    let interval = ctx.config.join_probe_interval();
    ctx.start_timer(session, TimerKind::JoinProbe, interval);
    Ok(())
}

fn send_probe(ctx: &mut Context, session: &Session) -> Result<(), Error> {
    ctx.send_frame(MgmtFrameRequest::ProbeReq {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        ssid: session.ssid.clone(),
    })
}

/// Takes the operating parameters of the BSS from its beacon.
fn adopt_beacon(session: &mut Session, beacon: CachedBeacon) {
    if beacon.beacon_interval != 0 {
        session.beacon_interval = beacon.beacon_interval;
    }
    session.bss_capabilities = beacon.capabilities;
    if let Some(channel) = beacon.ies.channel() {
        session.channel = channel;
    }
    if let Some(edca) = beacon.ies.edca.as_ref() {
        session.edca_count = Some(edca.param_set_count());
        session.edca = Some(downgrade_edca(edca));
    }
    session.beacon = Some(beacon);
}

fn add_bss(ctx: &mut Context, session: &mut Session, beacon: CachedBeacon) -> Result<(), Error> {
    session.states.transition(SmeState::WaitJoin, MlmState::WaitAddBssResponse)?;
    ctx.stop_timer(session, TimerKind::JoinProbe);
    let (algorithm, fallback) = auth_algorithm(ctx.config.auth_policy, &beacon);
    session.join.auth_algorithm = algorithm;
    session.join.auth_fallback = fallback;
    adopt_beacon(session, beacon);
    ctx.send_command(FirmwareCommand::AddBss {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        role: Role::Client,
        channel: session.channel,
        beacon_interval: session.beacon_interval,
        capabilities: session.bss_capabilities,
    })
}

/// A beacon or probe response from the session's BSS.
pub fn on_beacon_frame(
    ctx: &mut Context,
    session: &mut Session,
    received: ReceivedBeacon,
    rx_info: RxInfo,
) -> Result<(), Error> {
    record_signal(ctx, session, rx_info);
    match (session.states.sme(), session.states.mlm()) {
        (SmeState::WaitJoin, MlmState::Joining) => {
            let result = add_bss(ctx, session, received.beacon);
            or_join_failure(ctx, session, result)
        }
        (SmeState::NormalLinkEstablished | SmeState::WaitPreAuth, MlmState::LinkEstablished) => {
            on_beacon(ctx, session, received)
        }
        (sme, mlm) => {
            debug!("ignoring beacon in {:?}/{:?}", sme, mlm);
            Ok(())
        }
    }
}

fn record_signal(ctx: &Context, session: &mut Session, rx_info: RxInfo) {
    // Zero means the radio did not measure the frame.
    if rx_info.rssi_dbm == 0 {
        return;
    }
    let dbm = DecibelMilliWatt(rx_info.rssi_dbm);
    match session.signal.as_mut() {
        Some(signal) => signal.update_average(dbm),
        None => session.signal = Some(EwmaSignalStrength::new(ctx.config.signal_ewma_weight, dbm)),
    }
}

fn on_beacon(
    ctx: &mut Context,
    session: &mut Session,
    received: ReceivedBeacon,
) -> Result<(), Error> {
    if let Some(counter) = session.lost_bss.as_mut() {
        counter.reset();
    }
    let ReceivedBeacon { probe_response, beacon, .. } = received;
    match capability_change(session, &beacon) {
        Some(what) if probe_response && session.caps_change_probe_pending => {
            warn!("{} confirmed a {} change", session.bssid.to_mac_str(), what);
            return leave_bss(
                ctx,
                session,
                CleanupTrigger::CapabilityMismatch,
                ReasonCode::UNSPECIFIED_REASON,
            );
        }
        Some(what) => {
            if !session.caps_change_probe_pending {
                info!("beacon of {} shows a {} change; probing", session.bssid.to_mac_str(), what);
                session.caps_change_probe_pending = true;
                send_probe(ctx, session)?;
            }
            return Ok(());
        }
        None if session.caps_change_probe_pending => {
            info!("capability change of {} not confirmed", session.bssid.to_mac_str());
            session.caps_change_probe_pending = false;
        }
        None => (),
    }

    if let Err(e) = update_edca(ctx, session, &beacon.ies) {
        error!("failed to update EDCA parameters: {}", e);
    }
    if let Some(switch) = ChannelSwitch::from_ies(&beacon.ies) {
        if switch.channel != session.channel {
            start_channel_switch(ctx, session, switch)?;
        }
    }
    mlo::handle_sta_beacon(ctx, session, &beacon.ies);
    session.beacon = Some(beacon);
    Ok(())
}

/// Names what changed between the cached beacon and `beacon`, if the change matters to the link.
fn capability_change(session: &Session, beacon: &CachedBeacon) -> Option<&'static str> {
    let cached = session.beacon.as_ref()?;
    if let Some(ssid) = beacon.ies.ssid.as_ref() {
        let hidden = ssid.iter().all(|b| *b == 0);
        if !hidden && !session.ssid.is_empty() && ssid != &session.ssid {
            return Some("SSID");
        }
    }
    let (old, new) = (cached.capabilities, beacon.capabilities);
    if old.ess() != new.ess() || old.privacy() != new.privacy() || old.qos() != new.qos() {
        return Some("capability");
    }
    if cached.ies.is_protected() != beacon.ies.is_protected() {
        return Some("security");
    }
    match beacon.ies.channel() {
        Some(channel) if channel != session.channel && session.channel_switch.is_none() => {
            Some("channel")
        }
        _ => None,
    }
}

/// EDCA parameters to use for `params`. An access category that requires admission control,
/// which is never requested, is served with the parameters of the next lower category.
pub fn downgrade_edca(params: &EdcaParamSet) -> EdcaParamSet {
    fn inherit(own: &AcParams, lower: &AcParams) -> AcParams {
        let mut aci_aifsn = own.aci_aifsn;
        aci_aifsn.set_aifsn(lower.aci_aifsn.aifsn());
        aci_aifsn.set_acm(lower.aci_aifsn.acm());
        AcParams { aci_aifsn, ecw: lower.ecw, txop_limit: lower.txop_limit }
    }

    let mut out = *params;
    if out.ac_be.aci_aifsn.acm() {
        out.ac_be = inherit(&out.ac_be, &out.ac_bk);
    }
    if out.ac_vi.aci_aifsn.acm() {
        out.ac_vi = inherit(&out.ac_vi, &out.ac_be);
    }
    if out.ac_vo.aci_aifsn.acm() {
        out.ac_vo = inherit(&out.ac_vo, &out.ac_vi);
    }
    out
}

fn update_edca(ctx: &mut Context, session: &mut Session, ies: &ParsedIes) -> Result<(), Error> {
    let edca = match ies.edca.as_ref() {
        Some(edca) => edca,
        None => return Ok(()),
    };
    let count = edca.param_set_count();
    if session.edca_count == Some(count) {
        return Ok(());
    }
    info!("EDCA parameters of {} changed, count {}", session.bssid.to_mac_str(), count);
    let params = downgrade_edca(edca);
    session.edca_count = Some(count);
    session.edca = Some(params);
    ctx.send_command(FirmwareCommand::SetEdcaParams { vdev_id: session.vdev_id, params })
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
    if session.states.sme() == SmeState::WaitReassoc {
        return on_reassoc_bss_added(ctx, session, status);
    }
    ctx.stop_timer(session, TimerKind::JoinFailure);
    if !status.is_success() {
        let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
        return join_failure(ctx, session, ResultCode::FirmwareFailure, status);
    }
    session.bss_added = true;
    let result = start_auth(ctx, session);
    or_join_failure(ctx, session, result)
}

fn start_auth(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    session.states.transition(SmeState::WaitAuth, MlmState::Joined)?;
    session.states.set_mlm(MlmState::Authenticating)?;
    send_auth(ctx, session)
}

fn send_auth(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    ctx.send_frame(MgmtFrameRequest::Auth {
        vdev_id: session.vdev_id,
        peer: session.bssid,
        algorithm: session.join.auth_algorithm,
    })?;
    let timeout = ctx.config.auth_failure_timeout();
    ctx.start_timer(session, TimerKind::AuthFailure, timeout);
    Ok(())
}

/// Retries with open system after shared key failed, if the policy allows it.
fn auth_fallback(ctx: &mut Context, session: &mut Session) -> Result<bool, Error> {
    if !session.join.auth_fallback {
        return Ok(false);
    }
    info!("shared key authentication with {} failed; trying open", session.bssid.to_mac_str());
    session.join.auth_algorithm = AuthAlgorithmNumber::OPEN;
    session.join.auth_fallback = false;
    send_auth(ctx, session).map(|()| true)
}

pub fn on_auth_confirm(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: StatusCode,
) -> Result<(), Error> {
    sme::check(Confirm::Auth, &session.states)?;
    if session.states.sme() == SmeState::WaitPreAuth {
        return on_pre_auth_confirm(ctx, session, peer, status);
    }
    if session.states.mlm() != MlmState::Authenticating || peer != session.bssid {
        return Err(Error::unexpected("AuthConfirm", &session.states));
    }
    ctx.stop_timer(session, TimerKind::AuthFailure);
    if status.is_success() {
        let result = send_assoc_request(ctx, session);
        return or_join_failure(ctx, session, result);
    }
    if status == StatusCode::UNSUPPORTED_AUTH_ALGORITHM {
        match auth_fallback(ctx, session) {
            Ok(true) => return Ok(()),
            Ok(false) => (),
            Err(e) => return or_join_failure(ctx, session, Err(e)),
        }
    }
    join_failure(ctx, session, ResultCode::AuthRejected, status)
}

/// The AP's challenge in shared key authentication. It goes back encrypted and the AP's verdict
/// arrives as the final frame.
pub fn on_auth_challenge(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    challenge: Vec<u8>,
) -> Result<(), Error> {
    sme::check(Confirm::Auth, &session.states)?;
    let shared_key = session.join.auth_algorithm == AuthAlgorithmNumber::SHARED_KEY;
    if session.states.mlm() != MlmState::Authenticating || peer != session.bssid || !shared_key {
        return Err(Error::unexpected("AuthChallenge", &session.states));
    }
    debug!("answering {}-byte challenge from {}", challenge.len(), peer.to_mac_str());
    let vdev_id = session.vdev_id;
    let result =
        ctx.send_frame(MgmtFrameRequest::AuthChallengeResponse { vdev_id, peer, challenge });
    or_join_failure(ctx, session, result)
}

fn send_assoc_request(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    session.states.transition(SmeState::WaitAssoc, MlmState::WaitAssocResponse)?;
    let capabilities =
        intersect_capability_info(&ctx.config.local_capabilities, session.bss_capabilities);
    ctx.send_frame(MgmtFrameRequest::AssocReq {
        vdev_id: session.vdev_id,
        peer: session.bssid,
        capabilities,
        listen_interval: session.join.listen_interval,
        ssid: session.ssid.clone(),
        current_ap: None,
    })?;
    let timeout = ctx.config.assoc_failure_timeout();
    ctx.start_timer(session, TimerKind::AssocFailure, timeout);
    Ok(())
}

pub fn on_assoc_confirm(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: StatusCode,
    aid: u16,
    ies: Vec<u8>,
) -> Result<(), Error> {
    sme::check(Confirm::Assoc, &session.states)?;
    if session.states.mlm() != MlmState::WaitAssocResponse {
        return Err(Error::unexpected("AssocConfirm", &session.states));
    }
    if session.states.sme() == SmeState::WaitReassoc {
        return on_reassoc_confirm(ctx, session, peer, status, aid, ies);
    }
    if peer != session.bssid {
        return Err(Error::unexpected("AssocConfirm", &session.states));
    }
    ctx.stop_timer(session, TimerKind::AssocFailure);
    if !status.is_success() {
        return join_failure(ctx, session, ResultCode::AssocRejected, status);
    }
    let result = add_sta(ctx, session, SmeState::NormalLinkEstablished, aid, ies);
    or_join_failure(ctx, session, result)
}

/// Installs the AP as the session's peer.
fn add_sta(
    ctx: &mut Context,
    session: &mut Session,
    sme: SmeState,
    aid: u16,
    ies: Vec<u8>,
) -> Result<(), Error> {
    if ies.len() > ctx.config.max_cached_frame_len {
        return Err(Error::NoResources(ies.len()));
    }
    session.states.transition(sme, MlmState::WaitAddStaResponse)?;
    let local = &ctx.config.local_capabilities;
    let negotiated = match session.beacon.as_ref() {
        Some(beacon) => negotiate(local, beacon.capabilities, &beacon.ies),
        None => negotiate(local, session.bss_capabilities, &ParsedIes::default()),
    };
    let (vdev_id, bssid) = (session.vdev_id, session.bssid);
    let listen_interval = session.join.listen_interval;
    let entry = session.peers.insert_with_aid(bssid, aid);
    entry.mlm_state = MlmState::WaitAddStaResponse;
    entry.capabilities = Some(negotiated.clone());
    entry.listen_interval = listen_interval;
    session.negotiated = Some(negotiated.clone());
    session.assoc_rsp = Some(ies);
    let command = FirmwareCommand::AddSta {
        vdev_id,
        peer: bssid,
        aid,
        capabilities: negotiated,
        update: false,
    };
    if let Err(e) = ctx.send_command(command) {
        if let Some(entry) = session.peers.find_by_addr_mut(&bssid) {
            entry.mlm_state = MlmState::Idle;
        }
        return Err(e);
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
    if session.states.mlm() != MlmState::WaitAddStaResponse {
        return Err(Error::unexpected("AddStaResponse", &session.states));
    }
    let entry = match session.peers.find_by_addr_mut(&peer) {
        Some(entry) if entry.mlm_state == MlmState::WaitAddStaResponse => entry,
        _ => return Err(Error::unexpected("AddStaResponse", &session.states)),
    };
    if status.is_success() {
        entry.fw_index = Some(fw_index);
        entry.mlm_state = MlmState::LinkEstablished;
    } else {
        entry.mlm_state = MlmState::Idle;
    }

    let refused = StatusCode::REFUSED_REASON_UNSPECIFIED;
    if session.deauth_during_add_sta {
        // Whatever was installed for the departed AP goes, its peer context first.
        return join_failure(ctx, session, ResultCode::DeauthDuringAddSta, refused);
    }
    if !status.is_success() {
        return join_failure(ctx, session, ResultCode::Refused, refused);
    }
    session.states.transition(SmeState::NormalLinkEstablished, MlmState::LinkEstablished)?;
    start_link_monitor(ctx, session);
    if let Some(params) = session.edca {
        let command = FirmwareCommand::SetEdcaParams { vdev_id: session.vdev_id, params };
        if let Err(e) = ctx.send_command(command) {
            error!("failed to set EDCA parameters: {}", e);
        }
    }

    info!("link with {} established", session.bssid.to_mac_str());
    let (vdev_id, bssid) = (session.vdev_id, session.bssid);
    let summary = session.summary();
    let status = StatusCode::SUCCESS;
    let result = ResultCode::Success;
    let event = match session.reassoc_target.take() {
        Some(_) => UpperLayerEvent::ReassocResponse { vdev_id, bssid, result, status, summary },
        None => UpperLayerEvent::JoinResponse { vdev_id, bssid, result, status, summary },
    };
    ctx.notify(event);
    Ok(())
}

fn beacon_period(session: &Session) -> TimeUnit {
    match session.beacon_interval {
        0 => TimeUnit::DEFAULT_BEACON_INTERVAL,
        beacon_interval => TimeUnit(beacon_interval),
    }
}

fn status_check_interval(ctx: &Context, session: &Session) -> Duration {
    Duration::from(beacon_period(session)) * ctx.config.status_check_beacon_count
}

fn start_link_monitor(ctx: &mut Context, session: &mut Session) {
    let counter = LostBssCounter::start(beacon_period(session).0, ctx.config.lost_bss_beacon_count);
    session.lost_bss = Some(counter);
    let interval = status_check_interval(ctx, session);
    ctx.start_timer(session, TimerKind::StatusCheck, interval);
}

fn on_status_check(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    if session.states.mlm() != MlmState::LinkEstablished {
        return Ok(());
    }
    let lost = match session.lost_bss.as_mut() {
        Some(counter) if counter.should_deauthenticate() => true,
        Some(counter) => {
            counter.add_beacon_interval(ctx.config.status_check_beacon_count);
            false
        }
        None => false,
    };
    if lost {
        warn!("no beacon from {} for too long", session.bssid.to_mac_str());
        return leave_bss(
            ctx,
            session,
            CleanupTrigger::LinkLoss,
            ReasonCode::LEAVING_NETWORK_DEAUTH,
        );
    }
    if session.caps_change_probe_pending {
        if let Err(e) = send_probe(ctx, session) {
            error!("failed to send probe request: {}", e);
        }
    }
    let interval = status_check_interval(ctx, session);
    ctx.start_timer(session, TimerKind::StatusCheck, interval);
    Ok(())
}

/// Deauthenticates from the AP on our own initiative and tears the link down.
fn leave_bss(
    ctx: &mut Context,
    session: &mut Session,
    trigger: CleanupTrigger,
    reason: ReasonCode,
) -> Result<(), Error> {
    let (vdev_id, bssid) = (session.vdev_id, session.bssid);
    if let Err(e) = ctx.send_frame(MgmtFrameRequest::Deauth { vdev_id, peer: bssid, reason }) {
        error!("failed to send deauth to {}: {}", bssid.to_mac_str(), e);
    }
    let mut events = pending_aborts(session);
    events.push(UpperLayerEvent::DeauthIndication { vdev_id, bssid, peer: bssid, reason, trigger });
    teardown::begin(ctx, session, trigger, SmeState::Offline, events)
}

pub fn disconnect(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    kind: DisconnectKind,
    reason: ReasonCode,
) -> Result<(), Error> {
    let (vdev_id, bssid) = (session.vdev_id, session.bssid);
    match (session.states.sme(), session.states.mlm()) {
        (SmeState::NormalLinkEstablished | SmeState::WaitPreAuth, MlmState::LinkEstablished)
            if peer == bssid =>
        {
            let (sme, frame) = match kind {
                DisconnectKind::Deauth => {
                    (SmeState::WaitDeauth, MgmtFrameRequest::Deauth { vdev_id, peer, reason })
                }
                DisconnectKind::Disassoc => {
                    (SmeState::WaitDisassoc, MgmtFrameRequest::Disassoc { vdev_id, peer, reason })
                }
            };
            session.states.transition(sme, MlmState::WaitDeauthDisassoc)?;
            session.pending_disconnect = Some(PendingDisconnect { kind, peer, reason });
            if let Err(e) = ctx.send_frame(frame) {
                error!("failed to send {:?} to {}: {}", kind, peer.to_mac_str(), e);
                return finish_disconnect(ctx, session);
            }
            Ok(())
        }
        (SmeState::WaitJoin | SmeState::WaitAuth | SmeState::WaitAssoc, _) => {
            info!("join with {} aborted", bssid.to_mac_str());
            let events = vec![
                UpperLayerEvent::JoinResponse {
                    vdev_id,
                    bssid,
                    result: ResultCode::Aborted,
                    status: StatusCode::REFUSED_REASON_UNSPECIFIED,
                    summary: None,
                },
                UpperLayerEvent::DisconnectResponse { vdev_id, peer, result: ResultCode::Success },
            ];
            let trigger = CleanupTrigger::HostRequested;
            teardown::begin(ctx, session, trigger, SmeState::JoinFailure, events)
        }
        _ => {
            let result = ResultCode::InvalidState;
            ctx.notify(UpperLayerEvent::DisconnectResponse { vdev_id, peer, result });
            Err(Error::unexpected("Disconnect", &session.states))
        }
    }
}

fn finish_disconnect(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    let peer = session.pending_disconnect.take().map_or(session.bssid, |pending| pending.peer);
    let vdev_id = session.vdev_id;
    let sme = session.states.sme();
    let mut events = pending_aborts(session);
    events.push(UpperLayerEvent::DisconnectResponse { vdev_id, peer, result: ResultCode::Success });
    teardown::begin(ctx, session, CleanupTrigger::HostRequested, sme, events)
}

/// The deauth or disassoc frame requested by the upper layer left the transmitter.
pub fn on_disconnect_tx_confirm(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: FwStatus,
) -> Result<(), Error> {
    sme::check(Confirm::DisconnectTx, &session.states)?;
    match session.pending_disconnect {
        Some(pending) if pending.peer == peer => (),
        _ => return Err(Error::unexpected("DisconnectTxConfirm", &session.states)),
    }
    if !status.is_success() {
        warn!("disconnect frame to {} was not sent", peer.to_mac_str());
    }
    finish_disconnect(ctx, session)
}

pub fn on_disconnect_indication(
    ctx: &mut Context,
    session: &mut Session,
    ind: &DisconnectIndication,
) -> Result<(), Error> {
    if ind.peer != session.bssid {
        debug!("ignoring {:?} from {}", ind.kind, ind.peer.to_mac_str());
        return Ok(());
    }
    if session.states.mlm() == MlmState::WaitAddStaResponse {
        info!("{:?} from {} while its peer context is installed", ind.kind, ind.peer.to_mac_str());
        session.deauth_during_add_sta = true;
        return Ok(());
    }
    match session.states.sme() {
        SmeState::NormalLinkEstablished | SmeState::WaitPreAuth | SmeState::WaitReassoc => {
            if session.pmf && !ind.protected {
                return start_sa_query(ctx, session, ind.kind, ind.reason);
            }
            peer_disconnected(ctx, session, ind.kind, ind.reason)
        }
        SmeState::WaitJoin | SmeState::WaitAuth | SmeState::WaitAssoc => {
            let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
            join_failure(ctx, session, ResultCode::DisconnectedDuringJoin, status)
        }
        SmeState::WaitDeauth | SmeState::WaitDisassoc if session.pending_disconnect.is_some() => {
            // Crossed our own frame; the AP is gone either way.
            finish_disconnect(ctx, session)
        }
        SmeState::WaitDeauth
        | SmeState::WaitDisassoc
        | SmeState::JoinFailure
        | SmeState::Offline => {
            debug!("{:?} from {} during teardown", ind.kind, ind.peer.to_mac_str());
            Ok(())
        }
        SmeState::Idle | SmeState::WaitStart => {
            Err(Error::unexpected("DisconnectIndication", &session.states))
        }
    }
}

fn peer_disconnected(
    ctx: &mut Context,
    session: &mut Session,
    kind: DisconnectKind,
    reason: ReasonCode,
) -> Result<(), Error> {
    let (vdev_id, bssid) = (session.vdev_id, session.bssid);
    info!("{} sent {:?}, reason {}", bssid.to_mac_str(), kind, reason.0);
    let (sme, trigger, event) = match kind {
        DisconnectKind::Deauth => {
            let trigger = CleanupTrigger::PeerDeauth;
            let event =
                UpperLayerEvent::DeauthIndication { vdev_id, bssid, peer: bssid, reason, trigger };
            (SmeState::WaitDeauth, trigger, event)
        }
        DisconnectKind::Disassoc => {
            let trigger = CleanupTrigger::PeerDisassoc;
            let event = UpperLayerEvent::DisassocIndication {
                vdev_id,
                bssid,
                peer: bssid,
                reason,
                trigger,
            };
            (SmeState::WaitDisassoc, trigger, event)
        }
    };
    let mut events = pending_aborts(session);
    events.push(event);
    teardown::begin(ctx, session, trigger, sme, events)
}

fn start_sa_query(
    ctx: &mut Context,
    session: &mut Session,
    kind: DisconnectKind,
    reason: ReasonCode,
) -> Result<(), Error> {
    if session.sa_query.is_some() {
        debug!("SA query with {} already running", session.bssid.to_mac_str());
        return Ok(());
    }
    info!("unprotected {:?} from {}; starting SA query", kind, session.bssid.to_mac_str());
    let transaction_id = ctx.next_sa_query_id();
    session.sa_query = Some(SaQuery { transaction_id, retries: 0, kind, reason });
    send_sa_query(ctx, session, transaction_id)
}

fn send_sa_query(
    ctx: &mut Context,
    session: &mut Session,
    transaction_id: u16,
) -> Result<(), Error> {
    let frame = MgmtFrameRequest::SaQueryReq {
        vdev_id: session.vdev_id,
        peer: session.bssid,
        transaction_id,
    };
    if let Err(e) = ctx.send_frame(frame) {
        error!("failed to send SA query: {}", e);
        return match session.sa_query.take() {
            Some(query) => peer_disconnected(ctx, session, query.kind, query.reason),
            None => Ok(()),
        };
    }
    let interval = ctx.config.sa_query_retry_interval();
    ctx.start_timer(session, TimerKind::SaQuery, interval);
    Ok(())
}

pub fn on_sa_query_response(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    transaction_id: u16,
) -> Result<(), Error> {
    sme::check(Confirm::SaQuery, &session.states)?;
    match session.sa_query {
        Some(query) if query.transaction_id == transaction_id && peer == session.bssid => (),
        _ => return Err(Error::unexpected("SaQueryResponse", &session.states)),
    }
    ctx.stop_timer(session, TimerKind::SaQuery);
    session.sa_query = None;
    info!("{} answered the SA query; keeping the link", peer.to_mac_str());
    Ok(())
}

fn on_sa_query_timeout(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    let query = match session.sa_query.as_mut() {
        Some(query) => query,
        None => return Ok(()),
    };
    query.retries += 1;
    if query.retries >= ctx.config.sa_query_max_retries {
        let (kind, reason) = (query.kind, query.reason);
        session.sa_query = None;
        warn!("no SA query response from {}", session.bssid.to_mac_str());
        return peer_disconnected(ctx, session, kind, reason);
    }
    let transaction_id = query.transaction_id;
    send_sa_query(ctx, session, transaction_id)
}

pub fn pre_auth(ctx: &mut Context, session: &mut Session, target: MacAddr) -> Result<(), Error> {
    let vdev_id = session.vdev_id;
    let established = session.states.sme() == SmeState::NormalLinkEstablished
        && session.states.mlm() == MlmState::LinkEstablished;
    if !established || target == session.bssid {
        ctx.notify(UpperLayerEvent::PreAuthResponse {
            vdev_id,
            target,
            result: ResultCode::InvalidState,
            status: StatusCode::REFUSED_REASON_UNSPECIFIED,
        });
        return Err(Error::unexpected("PreAuth", &session.states));
    }
    session.states.set_sme(SmeState::WaitPreAuth)?;
    session.pre_auth_target = Some(target);
    let algorithm = AuthAlgorithmNumber::OPEN;
    let frame = MgmtFrameRequest::Auth { vdev_id, peer: target, algorithm };
    if let Err(e) = ctx.send_frame(frame) {
        error!("failed to send auth to {}: {}", target.to_mac_str(), e);
        let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
        return finish_pre_auth(ctx, session, ResultCode::FirmwareFailure, status);
    }
    let timeout = ctx.config.auth_failure_timeout();
    ctx.start_timer(session, TimerKind::AuthFailure, timeout);
    Ok(())
}

fn on_pre_auth_confirm(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: StatusCode,
) -> Result<(), Error> {
    if session.pre_auth_target != Some(peer) {
        return Err(Error::unexpected("AuthConfirm", &session.states));
    }
    ctx.stop_timer(session, TimerKind::AuthFailure);
    let result = match status.is_success() {
        true => ResultCode::Success,
        false => ResultCode::AuthRejected,
    };
    finish_pre_auth(ctx, session, result, status)
}

fn finish_pre_auth(
    ctx: &mut Context,
    session: &mut Session,
    result: ResultCode,
    status: StatusCode,
) -> Result<(), Error> {
    let target = match session.pre_auth_target.take() {
        Some(target) => target,
        None => return Ok(()),
    };
    session.states.restore_sme()?;
    let vdev_id = session.vdev_id;
    ctx.notify(UpperLayerEvent::PreAuthResponse { vdev_id, target, result, status });
    Ok(())
}

fn reassoc_rejected(ctx: &mut Context, vdev_id: VdevId, bssid: MacAddr, result: ResultCode) {
    ctx.notify(UpperLayerEvent::ReassocResponse {
        vdev_id,
        bssid,
        result,
        status: StatusCode::REFUSED_REASON_UNSPECIFIED,
        summary: None,
    });
}

pub fn reassoc(
    ctx: &mut Context,
    session: &mut Session,
    req: &ReassocRequest,
) -> Result<(), Error> {
    let (vdev_id, target) = (session.vdev_id, req.new_bssid);
    let established = session.states.sme() == SmeState::NormalLinkEstablished
        && session.states.mlm() == MlmState::LinkEstablished
        && session.channel_switch.is_none();
    if !established || target == session.bssid {
        reassoc_rejected(ctx, vdev_id, target, ResultCode::InvalidState);
        return Err(Error::unexpected("Reassoc", &session.states));
    }
    let beacon = match req.bss_description.as_ref() {
        None => None,
        Some(frame) => match ingest::parse_beacon(frame, ctx.config.max_cached_frame_len) {
            Ok(received) if received.bssid == target => Some(received.beacon),
            Ok(_) | Err(_) => {
                warn!("unusable BSS description for {}", target.to_mac_str());
                reassoc_rejected(ctx, vdev_id, target, ResultCode::InvalidParameters);
                return Ok(());
            }
        },
    };
    let target_channel = beacon.as_ref().and_then(|beacon| beacon.ies.channel());
    session.states.set_sme(SmeState::WaitReassoc)?;
    session.reassoc_target = Some(target);
    session.reassoc_beacon = beacon;
    info!("reassociating from {} to {}", session.bssid.to_mac_str(), target.to_mac_str());
    let timeout = ctx.config.reassoc_failure_timeout();
    ctx.start_timer(session, TimerKind::ReassocFailure, timeout);

    // The request goes out on the target's channel.
    let result = match target_channel {
        Some(channel) if channel != session.channel => {
            let switch = ChannelSwitch { channel, operating_class: None, mode: 0, count: 0 };
            start_channel_switch(ctx, session, switch)
        }
        _ => send_reassoc_request(ctx, session),
    };
    if let Err(e) = result {
        error!("failed to start reassociation with {}: {}", target.to_mac_str(), e);
        let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
        return restore_link(ctx, session, ResultCode::FirmwareFailure, status);
    }
    Ok(())
}

fn send_reassoc_request(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    let target = match session.reassoc_target {
        Some(target) => target,
        None => return Err(Error::unexpected("Reassoc", &session.states)),
    };
    let target_capabilities =
        session.reassoc_beacon.as_ref().map_or(session.bss_capabilities, |b| b.capabilities);
    session.states.transition(SmeState::WaitReassoc, MlmState::WaitAssocResponse)?;
    let capabilities =
        intersect_capability_info(&ctx.config.local_capabilities, target_capabilities);
    ctx.send_frame(MgmtFrameRequest::AssocReq {
        vdev_id: session.vdev_id,
        peer: target,
        capabilities,
        listen_interval: session.join.listen_interval,
        ssid: session.ssid.clone(),
        current_ap: Some(session.bssid),
    })
}

/// Abandons a reassociation and stays with the current AP, on its channel.
fn restore_link(
    ctx: &mut Context,
    session: &mut Session,
    result: ResultCode,
    status: StatusCode,
) -> Result<(), Error> {
    ctx.stop_timer(session, TimerKind::ReassocFailure);
    let target = session.reassoc_target.take().unwrap_or(session.bssid);
    session.reassoc_beacon = None;
    let switched = session.reassoc_channel.take().is_some();
    let switching = session.channel_switch.take().is_some();
    session.states.transition(SmeState::NormalLinkEstablished, MlmState::LinkEstablished)?;
    ctx.notify(UpperLayerEvent::ReassocResponse {
        vdev_id: session.vdev_id,
        bssid: target,
        result,
        status,
        summary: None,
    });
    if switched || switching {
        let switch =
            ChannelSwitch { channel: session.channel, operating_class: None, mode: 0, count: 0 };
        if let Err(e) = start_channel_switch(ctx, session, switch) {
            error!("vdev {} cannot return to channel {}: {}", session.vdev_id, switch.channel, e);
        }
    }
    Ok(())
}

/// The radio reached the reassociation target's channel.
fn on_reassoc_channel_switched(
    ctx: &mut Context,
    session: &mut Session,
    channel: u8,
    status: FwStatus,
) -> Result<(), Error> {
    let failure = StatusCode::REFUSED_REASON_UNSPECIFIED;
    if !status.is_success() {
        error!("vdev {} failed to move to channel {}", session.vdev_id, channel);
        return restore_link(ctx, session, ResultCode::FirmwareFailure, failure);
    }
    session.reassoc_channel = Some(channel);
    if let Err(e) = send_reassoc_request(ctx, session) {
        error!("failed to send reassociation request: {}", e);
        return restore_link(ctx, session, ResultCode::FirmwareFailure, failure);
    }
    Ok(())
}

fn on_reassoc_confirm(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: StatusCode,
    aid: u16,
    ies: Vec<u8>,
) -> Result<(), Error> {
    if session.reassoc_target != Some(peer) {
        return Err(Error::unexpected("AssocConfirm", &session.states));
    }
    ctx.stop_timer(session, TimerKind::ReassocFailure);
    if !status.is_success() {
        return restore_link(ctx, session, ResultCode::ReassocRejected, status);
    }
    let previous = session.bssid;
    session.bssid = peer;
    session.reassoc_channel = None;
    session.reassoc_move = Some(ReassocMove { previous, aid, assoc_rsp: ies });
    session.lost_bss = None;
    ctx.stop_timer(session, TimerKind::StatusCheck);
    if let Some(beacon) = session.reassoc_beacon.take() {
        adopt_beacon(session, beacon);
    }
    info!("reassociated from {} to {}", previous.to_mac_str(), peer.to_mac_str());
    let result = remove_previous_sta(ctx, session, previous);
    or_join_failure(ctx, session, result)
}

/// Whether the session is swapping the old AP's firmware contexts for the new AP's.
pub fn replacing_bss(session: &Session) -> bool {
    session.reassoc_move.is_some() && session.teardown.is_none()
}

fn remove_previous_sta(
    ctx: &mut Context,
    session: &mut Session,
    previous: MacAddr,
) -> Result<(), Error> {
    let vdev_id = session.vdev_id;
    let fw_index = match session.peers.find_by_addr(&previous) {
        Some(entry) if entry.is_installed() => entry.fw_index,
        Some(_) | None => None,
    };
    if fw_index.is_none() {
        session.peers.remove_by_addr(&previous);
        return remove_previous_bss(ctx, session, previous);
    }
    ctx.send_command(FirmwareCommand::DelSta { vdev_id, peer: previous, fw_index })?;
    if let Some(entry) = session.peers.find_by_addr_mut(&previous) {
        entry.mlm_state = MlmState::WaitDelStaResponse;
    }
    session.states.transition(SmeState::WaitReassoc, MlmState::WaitDelStaResponse)?;
    Ok(())
}

fn remove_previous_bss(
    ctx: &mut Context,
    session: &mut Session,
    previous: MacAddr,
) -> Result<(), Error> {
    if !session.bss_added {
        return add_reassoc_bss(ctx, session);
    }
    ctx.send_command(FirmwareCommand::DelBss { vdev_id: session.vdev_id, bssid: previous })?;
    session.states.transition(SmeState::WaitReassoc, MlmState::WaitDelBssResponse)?;
    Ok(())
}

fn add_reassoc_bss(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    session.states.transition(SmeState::WaitReassoc, MlmState::WaitAddBssResponse)?;
    ctx.send_command(FirmwareCommand::AddBss {
        vdev_id: session.vdev_id,
        bssid: session.bssid,
        role: Role::Client,
        channel: session.channel,
        beacon_interval: session.beacon_interval,
        capabilities: session.bss_capabilities,
    })
}

pub fn on_reassoc_del_sta_response(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: FwStatus,
) -> Result<(), Error> {
    let previous = session.reassoc_move.as_ref().map(|moved| moved.previous);
    let pending = session
        .peers
        .find_by_addr(&peer)
        .map_or(false, |entry| entry.mlm_state == MlmState::WaitDelStaResponse);
    if previous != Some(peer) || !pending {
        return Err(Error::unexpected("DelStaResponse", &session.states));
    }
    if !status.is_success() {
        warn!("firmware failed to remove previous AP {}", peer.to_mac_str());
    }
    session.peers.remove_by_addr(&peer);
    let result = remove_previous_bss(ctx, session, peer);
    or_join_failure(ctx, session, result)
}

pub fn on_reassoc_del_bss_response(
    ctx: &mut Context,
    session: &mut Session,
    status: FwStatus,
) -> Result<(), Error> {
    if session.states.mlm() != MlmState::WaitDelBssResponse {
        return Err(Error::unexpected("DelBssResponse", &session.states));
    }
    if !status.is_success() {
        warn!("firmware failed to remove the previous BSS of vdev {}", session.vdev_id);
    }
    session.bss_added = false;
    let result = add_reassoc_bss(ctx, session);
    or_join_failure(ctx, session, result)
}

/// The new AP's BSS context is installed; its peer context follows.
fn on_reassoc_bss_added(
    ctx: &mut Context,
    session: &mut Session,
    status: FwStatus,
) -> Result<(), Error> {
    let moved = match session.reassoc_move.take() {
        Some(moved) => moved,
        None => return Err(Error::unexpected("AddBssResponse", &session.states)),
    };
    if !status.is_success() {
        let status = StatusCode::REFUSED_REASON_UNSPECIFIED;
        return join_failure(ctx, session, ResultCode::FirmwareFailure, status);
    }
    session.bss_added = true;
    let result = add_sta(ctx, session, SmeState::WaitReassoc, moved.aid, moved.assoc_rsp);
    or_join_failure(ctx, session, result)
}

/// Moves the vdev to the channel its AP announced.
pub fn start_channel_switch(
    ctx: &mut Context,
    session: &mut Session,
    switch: ChannelSwitch,
) -> Result<(), Error> {
    if session.states.mlm() != MlmState::LinkEstablished {
        debug!("no link on vdev {} to switch", session.vdev_id);
        return Ok(());
    }
    if session.channel_switch.map(|pending| pending.channel) == Some(switch.channel) {
        return Ok(());
    }
    info!("vdev {} switching to channel {}", session.vdev_id, switch.channel);
    session.channel_switch = Some(switch);
    ctx.send_command(FirmwareCommand::SwitchChannel { vdev_id: session.vdev_id, switch })
}

pub fn on_switch_channel_response(
    ctx: &mut Context,
    session: &mut Session,
    channel: u8,
    status: FwStatus,
) -> Result<(), Error> {
    sme::check(Confirm::SwitchChannel, &session.states)?;
    match session.channel_switch {
        Some(switch) if switch.channel == channel => session.channel_switch = None,
        _ => return Err(Error::unexpected("SwitchChannelResponse", &session.states)),
    }
    if session.states.sme() == SmeState::WaitReassoc {
        return on_reassoc_channel_switched(ctx, session, channel, status);
    }
    if !status.is_success() {
        error!("vdev {} failed to switch to channel {}", session.vdev_id, channel);
        return leave_bss(
            ctx,
            session,
            CleanupTrigger::ChannelSwitchFailure,
            ReasonCode::UNSPECIFIED_REASON,
        );
    }
    session.channel = channel;
    if let Some(counter) = session.lost_bss.as_mut() {
        counter.reset();
    }
    ctx.notify(UpperLayerEvent::ChannelSwitched { vdev_id: session.vdev_id, channel });
    Ok(())
}

pub fn on_timeout(ctx: &mut Context, session: &mut Session, kind: TimerKind) -> Result<(), Error> {
    let (sme, mlm) = (session.states.sme(), session.states.mlm());
    let timed_out = StatusCode::REJECTED_SEQUENCE_TIMEOUT;
    match kind {
        TimerKind::JoinFailure if sme == SmeState::WaitJoin => {
            join_failure(ctx, session, ResultCode::JoinTimeout, timed_out)
        }
        TimerKind::JoinProbe if mlm == MlmState::Joining => {
            if let Err(e) = send_probe(ctx, session) {
                error!("failed to send probe request: {}", e);
            }
            let interval = ctx.config.join_probe_interval();
            ctx.start_timer(session, TimerKind::JoinProbe, interval);
            Ok(())
        }
        TimerKind::AuthFailure if sme == SmeState::WaitPreAuth => {
            finish_pre_auth(ctx, session, ResultCode::AuthTimeout, timed_out)
        }
        TimerKind::AuthFailure if mlm == MlmState::Authenticating => {
            match auth_fallback(ctx, session) {
                Ok(true) => Ok(()),
                Ok(false) => join_failure(ctx, session, ResultCode::AuthTimeout, timed_out),
                Err(e) => or_join_failure(ctx, session, Err(e)),
            }
        }
        TimerKind::AssocFailure if sme == SmeState::WaitAssoc => {
            join_failure(ctx, session, ResultCode::AssocTimeout, timed_out)
        }
        TimerKind::ReassocFailure
            if sme == SmeState::WaitReassoc
                && matches!(mlm, MlmState::LinkEstablished | MlmState::WaitAssocResponse) =>
        {
            restore_link(ctx, session, ResultCode::ReassocTimeout, timed_out)
        }
        TimerKind::SaQuery => on_sa_query_timeout(ctx, session),
        TimerKind::StatusCheck => on_status_check(ctx, session),
        kind => {
            debug!("stale {:?} timeout in {:?}/{:?}", kind, sme, mlm);
            Ok(())
        }
    }
}
