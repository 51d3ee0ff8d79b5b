// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This crate implements the IEEE Std 802.11 MLME session engine: per-link association contexts,
//! the SME and MLM state machines of station and AP links, and multi-link coordination between
//! the links of one MLD. Everything the engine reacts to arrives as a [`Message`] on one serial
//! queue, drained by [`Mlme::dispatch`]; firmware, frame transmission and the upper layer are
//! injected as trait objects. See the [`client`] and [`ap`] modules.
//!
//! [`Message`]: crate::message::Message
//! [`Mlme::dispatch`]: crate::dispatcher::Mlme::dispatch
//! [`ap`]: crate::ap
//! [`client`]: crate::client

pub mod ap;
pub mod client;
pub mod config;
pub mod context;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod ingest;
pub mod message;
pub mod mlo;
pub mod session;
pub mod sme;
pub mod state;
pub mod teardown;
pub mod timer;

#[cfg(test)]
mod test_utils;

pub use {dispatcher::Mlme, wlan_common as common};

use {
    anyhow::{bail, format_err, Error},
    futures::{channel::mpsc, StreamExt},
    log::{error, info},
    message::Message,
};

pub enum DriverEvent {
    // Indicates that the device is being removed and our main loop should exit.
    Stop,
    // A request, frame, firmware completion or timer expiry for the engine.
    Message(Message),
}

/// MlmeHandle is used by the embedder to feed the main loop. All events from the firmware, the
/// receive path and the upper layer are posted through a handle and handled serially. Copies of
/// the handle may be passed between threads.
#[derive(Clone)]
pub struct MlmeHandle {
    sink: mpsc::UnboundedSender<DriverEvent>,
}

impl MlmeHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DriverEvent>) {
        let (sink, stream) = mpsc::unbounded();
        (Self { sink }, stream)
    }

    pub fn post(&self, msg: Message) -> Result<(), Error> {
        let name = msg.name();
        self.sink
            .unbounded_send(DriverEvent::Message(msg))
            .map_err(|_| format_err!("cannot post {}: MLME event loop is gone", name))
    }

    pub fn stop(&self) {
        if let Err(e) = self.sink.unbounded_send(DriverEvent::Stop) {
            error!("Cannot signal MLME event loop thread: {}", e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }
}

/// Begin processing MLME events.
/// Does not return until iface destruction is requested via DriverEvent::Stop, unless every
/// handle is dropped first.
pub async fn mlme_main_loop(
    mlme: &mut Mlme,
    mut driver_event_stream: mpsc::UnboundedReceiver<DriverEvent>,
) -> Result<(), Error> {
    while let Some(event) = driver_event_stream.next().await {
        match event {
            // DriverEvent::Stop indicates a safe shutdown.
            DriverEvent::Stop => {
                info!("MLME event loop exited gracefully.");
                return Ok(());
            }
            DriverEvent::Message(msg) => mlme.dispatch(msg),
        }
    }
    bail!("Driver event stream terminated unexpectedly.")
}
