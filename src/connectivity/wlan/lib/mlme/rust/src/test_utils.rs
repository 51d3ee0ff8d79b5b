// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! An engine wired to fake collaborators, with shortcuts through the station join sequence.

use {
    crate::{
        config::MlmeConfig,
        context::TimerKind,
        device::{FakeDevice, FwStatus},
        dispatcher::Mlme,
        message::{JoinRequest, Message, RxInfo},
        session::{Session, SessionHandle, VdevId},
        state::{MlmState, SmeState},
        timer::FakeScheduler,
    },
    wlan_common::{
        mac::{mgmt::AuthAlgorithmNumber, MacAddr, StatusCode},
        test_utils::fake_frames::{
            fake_assoc_resp_frame, fake_auth_frame, BeaconBuilder, FAKE_CLIENT_ADDR,
        },
    },
};

pub const VDEV: VdevId = 1;
pub const BSSID: MacAddr = [6; 6];
pub const SELF_ADDR: MacAddr = FAKE_CLIENT_ADDR;
pub const SSID: &[u8] = b"homenet";
pub const CHANNEL: u8 = 6;
pub const FW_INDEX: u16 = 1;

pub struct MlmeHarness {
    pub mlme: Mlme,
    pub device: FakeDevice,
    pub scheduler: FakeScheduler,
}

impl MlmeHarness {
    pub fn new() -> Self {
        Self::with_config(MlmeConfig::default())
    }

    pub fn with_config(config: MlmeConfig) -> Self {
        let device = FakeDevice::new();
        let scheduler = FakeScheduler::new();
        let mlme = Mlme::new(config, device.as_device(), Box::new(scheduler.clone()));
        Self { mlme, device, scheduler }
    }

    /// The beacon of the BSS every station test joins.
    pub fn beacon() -> Vec<u8> {
        BeaconBuilder::new(BSSID).ssid(SSID).channel(CHANNEL).build()
    }

    pub fn join_request(&self, bss_description: Option<Vec<u8>>) -> JoinRequest {
        JoinRequest {
            vdev_id: VDEV,
            bssid: BSSID,
            self_addr: SELF_ADDR,
            ssid: SSID.to_vec(),
            channel: CHANNEL,
            beacon_interval: 100,
            bss_description,
            pmf: false,
            mlo: None,
        }
    }

    pub fn session_on(&self, vdev_id: VdevId) -> &Session {
        self.mlme.sessions().find_by_vdev(vdev_id).expect("session on vdev")
    }

    pub fn session(&self) -> &Session {
        self.session_on(VDEV)
    }

    pub fn handle(&self) -> SessionHandle {
        self.session().handle
    }

    pub fn states(&self) -> (SmeState, MlmState) {
        let states = &self.session().states;
        (states.sme(), states.mlm())
    }

    /// Expires the pending timer of `kind` on the station session.
    pub fn fire_timer(&mut self, kind: TimerKind) {
        let event_id = *self.session().timers.get(&kind).expect("timer is armed");
        self.mlme.dispatch(Message::Timeout(event_id));
    }

    pub fn rx_on(&mut self, vdev_id: VdevId, frame: Vec<u8>) {
        let rx_info = RxInfo { rssi_dbm: -50, timestamp: 0 };
        self.mlme.dispatch(Message::MgmtFrame { vdev_id, frame, rx_info });
    }

    pub fn rx(&mut self, frame: Vec<u8>) {
        self.rx_on(VDEV, frame)
    }

    pub fn rx_auth_response(&mut self, status: StatusCode) {
        self.rx(fake_auth_frame(BSSID, SELF_ADDR, AuthAlgorithmNumber::OPEN, 2, status));
    }

    pub fn rx_assoc_response(&mut self, status: StatusCode, aid: u16) {
        self.rx(fake_assoc_resp_frame(BSSID, SELF_ADDR, status, aid, &[]));
    }

    pub fn add_sta_response(&mut self, status: FwStatus) {
        self.mlme.dispatch(Message::AddStaResponse {
            vdev_id: VDEV,
            peer: BSSID,
            status,
            fw_index: FW_INDEX,
        });
    }

    fn clear_device(&self) {
        self.device.take_commands();
        self.device.take_frames();
        self.device.take_events();
    }

    fn join_until_assoc_with(&mut self, req: JoinRequest) {
        self.mlme.dispatch(Message::Join(req));
        self.mlme.dispatch(Message::AddBssResponse { vdev_id: VDEV, status: FwStatus::Success });
        self.rx_auth_response(StatusCode::SUCCESS);
        assert_eq!(self.states(), (SmeState::WaitAssoc, MlmState::WaitAssocResponse));
        self.clear_device();
    }

    /// Leaves the station waiting for its association response.
    pub fn join_until_assoc(&mut self) {
        let req = self.join_request(Some(Self::beacon()));
        self.join_until_assoc_with(req);
    }

    /// Leaves the station waiting for its peer context to be installed.
    pub fn join_until_add_sta(&mut self) {
        self.join_until_assoc();
        self.rx_assoc_response(StatusCode::SUCCESS, 1);
        assert_eq!(self.states(), (SmeState::NormalLinkEstablished, MlmState::WaitAddStaResponse));
        self.clear_device();
    }

    fn establish_from(&mut self, req: JoinRequest) {
        self.join_until_assoc_with(req);
        self.rx_assoc_response(StatusCode::SUCCESS, 1);
        self.add_sta_response(FwStatus::Success);
        assert_eq!(self.states(), (SmeState::NormalLinkEstablished, MlmState::LinkEstablished));
        self.clear_device();
    }

    pub fn establish(&mut self) {
        let req = self.join_request(Some(Self::beacon()));
        self.establish_from(req);
    }

    pub fn establish_with_pmf(&mut self) {
        let req = JoinRequest { pmf: true, ..self.join_request(Some(Self::beacon())) };
        self.establish_from(req);
    }

    /// Completes the firmware removals of a station teardown.
    pub fn complete_teardown(&mut self) {
        let peer = self.session().bssid;
        self.mlme.dispatch(Message::DelStaResponse {
            vdev_id: VDEV,
            peer,
            status: FwStatus::Success,
        });
        self.mlme.dispatch(Message::DelBssResponse { vdev_id: VDEV, status: FwStatus::Success });
    }
}
