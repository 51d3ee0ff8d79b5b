// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Session teardown. Firmware contexts go first, peers before the BSS, and the upper layer hears
//! about the teardown only once they are gone. The session is then marked finished and the
//! dispatcher deletes it.

use {
    crate::{
        context::Context,
        device::{FirmwareCommand, FwStatus, UpperLayerEvent},
        error::Error,
        session::{CleanupTrigger, Session, Teardown},
        state::{is_legal_pair, MlmState, SmeState},
    },
    log::{error, info, warn},
    wlan_common::mac::{MacAddr, MacFmt},
};

/// Starts tearing `session` down, or adds `notifications` to a teardown already in progress.
pub fn begin(
    ctx: &mut Context,
    session: &mut Session,
    trigger: CleanupTrigger,
    sme: SmeState,
    notifications: Vec<UpperLayerEvent>,
) -> Result<(), Error> {
    if let Some(teardown) = session.teardown.as_mut() {
        info!("session {:?} already tearing down ({:?})", session.handle, teardown.trigger);
        teardown.notifications.extend(notifications);
        return Ok(());
    }
    info!(
        "tearing down session on vdev {} with {} ({:?})",
        session.vdev_id,
        session.bssid.to_mac_str(),
        trigger
    );
    ctx.stop_all_timers(session);
    session.pending_disconnect = None;
    session.sa_query = None;
    session.teardown = Some(Teardown { trigger, sme, notifications });
    advance(ctx, session)
}

/// Issues the next cleanup step. Only one firmware removal is outstanding at a time, and a peer
/// context still being installed is removed once its add-STA completes.
fn advance(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    let (trigger, sme) = match session.teardown.as_ref() {
        Some(teardown) => (teardown.trigger, teardown.sme),
        None => return Ok(()),
    };
    loop {
        let busy = session.peers.iter().any(|peer| {
            matches!(peer.mlm_state, MlmState::WaitAddStaResponse | MlmState::WaitDelStaResponse)
        });
        if busy {
            return Ok(());
        }
        let vdev_id = session.vdev_id;
        let (peer, fw_index) = match session.peers.next_installed() {
            Some(peer) => {
                peer.mlm_state = MlmState::WaitDelStaResponse;
                peer.cleanup_trigger = Some(trigger);
                (peer.addr, peer.fw_index)
            }
            None => break,
        };
        session.states.transition(sme, MlmState::WaitDelStaResponse)?;
        match ctx.send_command(FirmwareCommand::DelSta { vdev_id, peer, fw_index }) {
            Ok(()) => return Ok(()),
            Err(e) => {
                // The peer context is unreachable now; carry on with the rest.
                error!("failed to remove peer {}: {}", peer.to_mac_str(), e);
                session.peers.remove_by_addr(&peer);
            }
        }
    }
    session.peers.clear();

    if session.states.mlm() == MlmState::WaitDelBssResponse {
        // A BSS removal is already on its way.
        session.states.transition(sme, MlmState::WaitDelBssResponse)?;
        return Ok(());
    }
    if session.bss_added {
        session.states.transition(sme, MlmState::WaitDelBssResponse)?;
        // A reassociation in progress may still hold the old AP's BSS context.
        let bssid = session.reassoc_move.take().map_or(session.bssid, |moved| moved.previous);
        let command = FirmwareCommand::DelBss { vdev_id: session.vdev_id, bssid };
        match ctx.send_command(command) {
            Ok(()) => return Ok(()),
            Err(e) => {
                error!("failed to remove BSS {}: {}", bssid.to_mac_str(), e);
                session.bss_added = false;
            }
        }
    }
    if is_legal_pair(sme, MlmState::Idle) {
        session.states.transition(sme, MlmState::Idle)?;
    }
    finish(ctx, session)
}

fn finish(ctx: &mut Context, session: &mut Session) -> Result<(), Error> {
    session.states.transition(SmeState::Idle, MlmState::Idle)?;
    if let Some(teardown) = session.teardown.take() {
        for event in teardown.notifications {
            ctx.notify(event);
        }
    }
    session.finished = true;
    Ok(())
}

/// A peer context is gone. Continues the teardown or, for a single AP peer, delivers the
/// notification that was waiting for it.
pub fn on_del_sta_response(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: FwStatus,
) -> Result<(), Error> {
    let entry = match session.peers.find_by_addr(&peer) {
        Some(entry) if entry.mlm_state == MlmState::WaitDelStaResponse => entry,
        _ => {
            return Err(Error::UnexpectedMessage {
                msg: "DelStaResponse",
                sme: session.states.sme(),
                mlm: session.states.mlm(),
            })
        }
    };
    if !status.is_success() {
        // Nothing more can be done for this peer; the BSS removal clears what is left.
        warn!("firmware failed to remove peer {}", peer.to_mac_str());
    }
    let notification = entry.pending_notification.clone();
    session.peers.remove_by_addr(&peer);

    if session.teardown.is_some() {
        return advance(ctx, session);
    }
    if let Some(event) = notification {
        ctx.notify(event);
    }
    Ok(())
}

/// A peer's add-STA completed after the teardown began. An installed context is removed again
/// before the BSS goes.
pub fn on_add_sta_response(
    ctx: &mut Context,
    session: &mut Session,
    peer: MacAddr,
    status: FwStatus,
    fw_index: u16,
) -> Result<(), Error> {
    let entry = match session.peers.find_by_addr_mut(&peer) {
        Some(entry) if entry.mlm_state == MlmState::WaitAddStaResponse => entry,
        _ => return Err(Error::unexpected("AddStaResponse", &session.states)),
    };
    if status.is_success() {
        entry.fw_index = Some(fw_index);
    } else {
        warn!("firmware refused peer {} during teardown", peer.to_mac_str());
    }
    entry.mlm_state = MlmState::Idle;
    advance(ctx, session)
}

pub fn on_del_bss_response(
    ctx: &mut Context,
    session: &mut Session,
    status: FwStatus,
) -> Result<(), Error> {
    if session.teardown.is_none() || session.states.mlm() != MlmState::WaitDelBssResponse {
        return Err(Error::UnexpectedMessage {
            msg: "DelBssResponse",
            sme: session.states.sme(),
            mlm: session.states.mlm(),
        });
    }
    if !status.is_success() {
        warn!("firmware failed to remove BSS {}", session.bssid.to_mac_str());
    }
    session.bss_added = false;
    finish(ctx, session)
}
