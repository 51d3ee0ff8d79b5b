// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        config::MlmeConfig,
        device::{Device, FirmwareCommand, MgmtFrameRequest, UpperLayerEvent},
        error::Error,
        ingest::DropLogLimiter,
        message::Message,
        session::{Session, SessionHandle},
        timer::Timer,
    },
    std::{collections::VecDeque, time::Duration},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    JoinFailure,
    JoinProbe,
    AuthFailure,
    AssocFailure,
    ReassocFailure,
    SaQuery,
    StatusCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeout {
    pub session: SessionHandle,
    pub kind: TimerKind,
}

/// State shared by every session handler: configuration, collaborators, timers and the queue of
/// messages produced while handling the current one.
pub struct Context {
    pub config: MlmeConfig,
    pub device: Device,
    pub timer: Timer<SessionTimeout>,
    pub drop_log: DropLogLimiter,
    followups: VecDeque<Message>,
    next_sa_query_id: u16,
}

impl Context {
    pub fn new(config: MlmeConfig, device: Device, timer: Timer<SessionTimeout>) -> Self {
        let drop_log = DropLogLimiter::new(config.drop_log_interval);
        Self { config, device, timer, drop_log, followups: VecDeque::new(), next_sa_query_id: 0 }
    }

    /// Queues a message to be dispatched once the current one is handled.
    pub fn post(&mut self, msg: Message) {
        self.followups.push_back(msg);
    }

    pub fn take_followup(&mut self) -> Option<Message> {
        self.followups.pop_front()
    }

    pub fn next_sa_query_id(&mut self) -> u16 {
        self.next_sa_query_id = self.next_sa_query_id.wrapping_add(1);
        self.next_sa_query_id
    }

    /// Arms `kind` for `session`, replacing a pending timer of the same kind.
    pub fn start_timer(&mut self, session: &mut Session, kind: TimerKind, after: Duration) {
        self.stop_timer(session, kind);
        let event_id =
            self.timer.schedule_after(after, SessionTimeout { session: session.handle, kind });
        session.timers.insert(kind, event_id);
    }

    pub fn stop_timer(&mut self, session: &mut Session, kind: TimerKind) {
        if let Some(event_id) = session.timers.remove(&kind) {
            self.timer.cancel_event(event_id);
        }
    }

    pub fn stop_all_timers(&mut self, session: &mut Session) {
        for (_, event_id) in session.timers.drain() {
            self.timer.cancel_event(event_id);
        }
        let handle = session.handle;
        self.timer.cancel_where(|timeout| timeout.session == handle);
    }

    pub fn send_command(&mut self, command: FirmwareCommand) -> Result<(), Error> {
        self.device.send_command(command)
    }

    pub fn send_frame(&mut self, frame: MgmtFrameRequest) -> Result<(), Error> {
        self.device.send_mgmt_frame(frame)
    }

    pub fn notify(&mut self, event: UpperLayerEvent) {
        self.device.notify(event)
    }
}
