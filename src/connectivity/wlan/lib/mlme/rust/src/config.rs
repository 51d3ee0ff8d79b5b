// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::session::capabilities::{ChannelBandwidth, PhyGeneration},
    serde_derive::{Deserialize, Serialize},
    std::time::Duration,
};

/// Which authentication algorithm a station uses when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPolicy {
    OpenSystem,
    SharedKey,
    /// Shared key first on WEP networks, falling back to open system when the peer rejects the
    /// algorithm or does not answer.
    AutoSwitch,
}

/// What this device is able and willing to negotiate with a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalCapabilities {
    pub spectrum_mgmt: bool,
    pub radio_measurement: bool,
    pub short_preamble: bool,
    pub immediate_block_ack: bool,
    pub qos: bool,
    pub short_slot_time: bool,
    pub max_generation: PhyGeneration,
    pub max_nss: u8,
    pub max_bandwidth: ChannelBandwidth,
}

impl Default for LocalCapabilities {
    fn default() -> Self {
        Self {
            spectrum_mgmt: true,
            radio_measurement: true,
            short_preamble: true,
            immediate_block_ack: false,
            qos: true,
            short_slot_time: true,
            max_generation: PhyGeneration::Eht,
            max_nss: 2,
            max_bandwidth: ChannelBandwidth::Cbw160,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlmeConfig {
    /// Upper bound on concurrent sessions, normally the number of vdevs.
    pub max_sessions: usize,
    pub max_peers_per_session: u16,
    pub auth_policy: AuthPolicy,
    pub listen_interval: u16,
    pub join_failure_timeout_ms: u64,
    pub join_probe_interval_ms: u64,
    pub auth_failure_timeout_ms: u64,
    pub assoc_failure_timeout_ms: u64,
    pub reassoc_failure_timeout_ms: u64,
    pub sa_query_retry_interval_ms: u64,
    pub sa_query_max_retries: u8,
    /// Beacon periods without a beacon after which the BSS is declared lost.
    pub lost_bss_beacon_count: u32,
    /// Beacon periods between two association status checks.
    pub status_check_beacon_count: u32,
    /// Malformed frames dropped between two drop log lines.
    pub drop_log_interval: u32,
    pub max_cached_frame_len: usize,
    pub signal_ewma_weight: usize,
    pub local_capabilities: LocalCapabilities,
}

impl Default for MlmeConfig {
    fn default() -> Self {
        Self {
            max_sessions: 8,
            max_peers_per_session: 32,
            auth_policy: AuthPolicy::OpenSystem,
            listen_interval: 10,
            join_failure_timeout_ms: 1000,
            join_probe_interval_ms: 200,
            auth_failure_timeout_ms: 1000,
            assoc_failure_timeout_ms: 1000,
            reassoc_failure_timeout_ms: 1000,
            sa_query_retry_interval_ms: 201,
            sa_query_max_retries: 5,
            lost_bss_beacon_count: 100,
            status_check_beacon_count: 10,
            drop_log_interval: 100,
            max_cached_frame_len: 2048,
            signal_ewma_weight: 10,
            local_capabilities: LocalCapabilities::default(),
        }
    }
}

impl MlmeConfig {
    pub fn join_failure_timeout(&self) -> Duration {
        Duration::from_millis(self.join_failure_timeout_ms)
    }

    pub fn join_probe_interval(&self) -> Duration {
        Duration::from_millis(self.join_probe_interval_ms)
    }

    pub fn auth_failure_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_failure_timeout_ms)
    }

    pub fn assoc_failure_timeout(&self) -> Duration {
        Duration::from_millis(self.assoc_failure_timeout_ms)
    }

    pub fn reassoc_failure_timeout(&self) -> Duration {
        Duration::from_millis(self.reassoc_failure_timeout_ms)
    }

    pub fn sa_query_retry_interval(&self) -> Duration {
        Duration::from_millis(self.sa_query_retry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: MlmeConfig = serde_json::from_str(
            r#"{
                "max_sessions": 4,
                "auth_policy": "auto_switch",
                "local_capabilities": { "max_generation": "vht", "max_nss": 1 }
            }"#,
        )
        .expect("valid config");
        assert_eq!(config.max_sessions, 4);
        assert_eq!(config.auth_policy, AuthPolicy::AutoSwitch);
        assert_eq!(config.local_capabilities.max_generation, PhyGeneration::Vht);
        assert_eq!(config.local_capabilities.max_nss, 1);
        assert!(config.local_capabilities.qos);
        assert_eq!(config.sa_query_max_retries, 5);
        assert_eq!(config.join_failure_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn unknown_auth_policy_is_rejected() {
        assert!(serde_json::from_str::<MlmeConfig>(r#"{ "auth_policy": "wep" }"#).is_err());
    }
}
