// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The engine's collaborators: the firmware command sink, the management frame transmitter and
//! the upper layer. All of them are fire-and-forget; results come back later as messages.

use {
    crate::{
        error::Error,
        session::{
            capabilities::NegotiatedCapabilities, Aid, ChannelSwitch, CleanupTrigger, Role,
            VdevId,
        },
    },
    log::error,
    wlan_common::{
        ie::EdcaParamSet,
        mac::{mgmt::AuthAlgorithmNumber, CapabilityInfo, MacAddr, ReasonCode, StatusCode},
    },
};

#[cfg(test)]
pub use test_utils::*;

/// Completion status of a firmware command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwStatus {
    Success,
    Failure,
}

impl FwStatus {
    pub fn is_success(&self) -> bool {
        *self == FwStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Pairwise,
    Group,
    Igtk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub key_type: KeyType,
    pub address: MacAddr,
    pub key_id: u16,
    pub cipher_suite: [u8; 4],
    pub key: Vec<u8>,
    pub rsc: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FirmwareCommand {
    AddBss {
        vdev_id: VdevId,
        bssid: MacAddr,
        role: Role,
        channel: u8,
        beacon_interval: u16,
        capabilities: CapabilityInfo,
    },
    AddSta {
        vdev_id: VdevId,
        peer: MacAddr,
        aid: Aid,
        capabilities: NegotiatedCapabilities,
        /// Refreshes an existing peer context instead of creating one.
        update: bool,
    },
    DelSta {
        vdev_id: VdevId,
        peer: MacAddr,
        fw_index: Option<u16>,
    },
    DelBss {
        vdev_id: VdevId,
        bssid: MacAddr,
    },
    SetKey {
        vdev_id: VdevId,
        key: KeyDescriptor,
    },
    SwitchChannel {
        vdev_id: VdevId,
        switch: ChannelSwitch,
    },
    SetEdcaParams {
        vdev_id: VdevId,
        params: EdcaParamSet,
    },
    /// Regenerates the beacon template of `vdev_id`. `partner_link_id` names the partner link
    /// whose profile changed, if the update is on behalf of a partner.
    UpdateBeaconTemplate {
        vdev_id: VdevId,
        bss_params_change_count: Option<u8>,
        critical_update: bool,
        partner_link_id: Option<u8>,
    },
}

/// A management frame for the frame builder and transmitter.
#[derive(Debug, Clone, PartialEq)]
pub enum MgmtFrameRequest {
    Auth {
        vdev_id: VdevId,
        peer: MacAddr,
        algorithm: AuthAlgorithmNumber,
    },
    /// Third frame of shared key authentication, echoing the AP's challenge text. The frame
    /// is sent protected and encrypted with the default WEP key.
    AuthChallengeResponse {
        vdev_id: VdevId,
        peer: MacAddr,
        challenge: Vec<u8>,
    },
    /// A reassociation request when `current_ap` is set.
    AssocReq {
        vdev_id: VdevId,
        peer: MacAddr,
        capabilities: CapabilityInfo,
        listen_interval: u16,
        ssid: Vec<u8>,
        current_ap: Option<MacAddr>,
    },
    AssocResp {
        vdev_id: VdevId,
        peer: MacAddr,
        status: StatusCode,
        aid: Option<Aid>,
    },
    ProbeReq {
        vdev_id: VdevId,
        bssid: MacAddr,
        ssid: Vec<u8>,
    },
    Deauth {
        vdev_id: VdevId,
        peer: MacAddr,
        reason: ReasonCode,
    },
    Disassoc {
        vdev_id: VdevId,
        peer: MacAddr,
        reason: ReasonCode,
    },
    SaQueryReq {
        vdev_id: VdevId,
        peer: MacAddr,
        transaction_id: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    /// The peer or the firmware refused the link.
    Refused,
    InvalidState,
    InvalidParameters,
    ResourcesUnavailable,
    JoinTimeout,
    AuthTimeout,
    AuthRejected,
    AssocTimeout,
    AssocRejected,
    ReassocTimeout,
    ReassocRejected,
    /// The AP deauthenticated or disassociated us while our peer context was being installed.
    DeauthDuringAddSta,
    DisconnectedDuringJoin,
    Aborted,
    FirmwareFailure,
}

/// What the upper layer learns about an established link.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSummary {
    pub capabilities: NegotiatedCapabilities,
    pub aid: Aid,
    pub channel: u8,
    pub beacon_interval: u16,
    pub rssi_dbm: Option<i8>,
    pub signal_quality: Option<u8>,
    pub assoc_rsp_ies: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpperLayerEvent {
    JoinResponse {
        vdev_id: VdevId,
        bssid: MacAddr,
        result: ResultCode,
        status: StatusCode,
        summary: Option<LinkSummary>,
    },
    ReassocResponse {
        vdev_id: VdevId,
        bssid: MacAddr,
        result: ResultCode,
        status: StatusCode,
        summary: Option<LinkSummary>,
    },
    PreAuthResponse {
        vdev_id: VdevId,
        target: MacAddr,
        result: ResultCode,
        status: StatusCode,
    },
    StartBssResponse {
        vdev_id: VdevId,
        bssid: MacAddr,
        result: ResultCode,
    },
    StopBssResponse {
        vdev_id: VdevId,
        bssid: MacAddr,
        result: ResultCode,
    },
    DisconnectResponse {
        vdev_id: VdevId,
        peer: MacAddr,
        result: ResultCode,
    },
    DeauthIndication {
        vdev_id: VdevId,
        bssid: MacAddr,
        peer: MacAddr,
        reason: ReasonCode,
        trigger: CleanupTrigger,
    },
    DisassocIndication {
        vdev_id: VdevId,
        bssid: MacAddr,
        peer: MacAddr,
        reason: ReasonCode,
        trigger: CleanupTrigger,
    },
    AssocIndication {
        vdev_id: VdevId,
        bssid: MacAddr,
        peer: MacAddr,
        aid: Aid,
        capabilities: NegotiatedCapabilities,
        assoc_req_ies: Vec<u8>,
    },
    SetKeysResponse {
        vdev_id: VdevId,
        peer: MacAddr,
        result: ResultCode,
    },
    ChannelSwitched {
        vdev_id: VdevId,
        channel: u8,
    },
}

pub trait FirmwareOps {
    fn send_command(&mut self, command: FirmwareCommand) -> Result<(), anyhow::Error>;
}

pub trait FrameTxOps {
    fn send_mgmt_frame(&mut self, frame: MgmtFrameRequest) -> Result<(), anyhow::Error>;
}

pub trait UpperLayerOps {
    fn send_event(&mut self, event: UpperLayerEvent) -> Result<(), anyhow::Error>;
}

/// A `Device` issues firmware commands, transmits management frames and reports to the upper
/// layer.
pub struct Device {
    firmware: Box<dyn FirmwareOps>,
    frames: Box<dyn FrameTxOps>,
    upper_layer: Box<dyn UpperLayerOps>,
}

impl Device {
    pub fn new(
        firmware: Box<dyn FirmwareOps>,
        frames: Box<dyn FrameTxOps>,
        upper_layer: Box<dyn UpperLayerOps>,
    ) -> Self {
        Self { firmware, frames, upper_layer }
    }

    pub fn send_command(&mut self, command: FirmwareCommand) -> Result<(), Error> {
        self.firmware.send_command(command).map_err(Error::Firmware)
    }

    pub fn send_mgmt_frame(&mut self, frame: MgmtFrameRequest) -> Result<(), Error> {
        self.frames.send_mgmt_frame(frame).map_err(Error::Firmware)
    }

    /// Upper-layer delivery failures are logged; the engine's own state is already final.
    pub fn notify(&mut self, event: UpperLayerEvent) {
        if let Err(e) = self.upper_layer.send_event(event) {
            error!("error sending upper layer event: {}", e);
        }
    }
}


#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    #[test]
    fn device_forwards_to_collaborators() {
        let fake_device = FakeDevice::new();
        let mut device = fake_device.as_device();
        device
            .send_command(FirmwareCommand::DelBss { vdev_id: 1, bssid: [1; 6] })
            .expect("command sent");
        device
            .send_mgmt_frame(MgmtFrameRequest::ProbeReq { vdev_id: 1, bssid: [1; 6], ssid: vec![] })
            .expect("frame sent");
        device.notify(UpperLayerEvent::ChannelSwitched { vdev_id: 1, channel: 6 });

        assert_eq!(
            fake_device.take_commands(),
            vec![FirmwareCommand::DelBss { vdev_id: 1, bssid: [1; 6] }]
        );
        assert_eq!(fake_device.take_frames().len(), 1);
        assert_eq!(
            fake_device.take_events(),
            vec![UpperLayerEvent::ChannelSwitched { vdev_id: 1, channel: 6 }]
        );
    }

    #[test]
    fn firmware_failure_is_typed() {
        let fake_device = FakeDevice::new();
        fake_device.state.lock().fail_commands = true;
        let mut device = fake_device.as_device();
        assert_matches!(
            device.send_command(FirmwareCommand::DelBss { vdev_id: 1, bssid: [1; 6] }),
            Err(Error::Firmware(_))
        );
        assert!(fake_device.take_commands().is_empty());
    }
}
