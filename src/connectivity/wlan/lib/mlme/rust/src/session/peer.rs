// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::capabilities::NegotiatedCapabilities,
    crate::{device::UpperLayerEvent, error::Error, state::MlmState},
    std::collections::{btree_map::Entry, BTreeMap},
    wlan_common::mac::MacAddr,
};

/// Association ID.
pub type Aid = u16;

// IEEE Std 802.11-2016, 9.4.1.8
pub const MAX_AID: Aid = 2007;

/// What caused a peer or session to be torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupTrigger {
    /// The upper layer asked for it.
    HostRequested,
    PeerDeauth,
    PeerDisassoc,
    LinkLoss,
    JoinFailure,
    CapabilityMismatch,
    ChannelSwitchFailure,
    /// The BSS context of an AP session could not be created.
    StartFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerEntry {
    pub addr: MacAddr,
    pub aid: Aid,
    pub mlm_state: MlmState,
    /// Index of the peer context in firmware, known once add-STA completed.
    pub fw_index: Option<u16>,
    pub capabilities: Option<NegotiatedCapabilities>,
    pub listen_interval: u16,
    pub cleanup_trigger: Option<CleanupTrigger>,
    /// Elements of the peer's association request, for the upward indication.
    pub assoc_req_ies: Vec<u8>,
    /// Sent upward once the peer's firmware context is gone.
    pub pending_notification: Option<UpperLayerEvent>,
}

impl PeerEntry {
    fn new(addr: MacAddr, aid: Aid) -> Self {
        Self {
            addr,
            aid,
            mlm_state: MlmState::Idle,
            fw_index: None,
            capabilities: None,
            listen_interval: 0,
            cleanup_trigger: None,
            assoc_req_ies: vec![],
            pending_notification: None,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.fw_index.is_some()
    }
}

/// Peers of one session keyed by AID. A station session holds a single entry for its AP.
#[derive(Debug)]
pub struct PeerTable {
    entries: BTreeMap<Aid, PeerEntry>,
    capacity: u16,
}

impl PeerTable {
    pub fn new(capacity: u16) -> Self {
        Self { entries: BTreeMap::new(), capacity: capacity.min(MAX_AID) }
    }

    /// Returns the AID of `addr`, allocating the lowest free one for a new peer.
    pub fn insert(&mut self, addr: MacAddr) -> Result<Aid, Error> {
        if let Some(entry) = self.find_by_addr(&addr) {
            return Ok(entry.aid);
        }
        let aid = (1..=self.capacity)
            .find(|aid| !self.entries.contains_key(aid))
            .ok_or(Error::PeerTableFull)?;
        self.entries.insert(aid, PeerEntry::new(addr, aid));
        Ok(aid)
    }

    /// Inserts `addr` under an AID chosen by the peer, replacing any previous entry for `addr`.
    pub fn insert_with_aid(&mut self, addr: MacAddr, aid: Aid) -> &mut PeerEntry {
        self.remove_by_addr(&addr);
        match self.entries.entry(aid) {
            Entry::Occupied(mut entry) => {
                entry.insert(PeerEntry::new(addr, aid));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(PeerEntry::new(addr, aid)),
        }
    }

    pub fn get(&self, aid: Aid) -> Option<&PeerEntry> {
        self.entries.get(&aid)
    }

    pub fn get_mut(&mut self, aid: Aid) -> Option<&mut PeerEntry> {
        self.entries.get_mut(&aid)
    }

    pub fn find_by_addr(&self, addr: &MacAddr) -> Option<&PeerEntry> {
        self.entries.values().find(|entry| &entry.addr == addr)
    }

    pub fn find_by_addr_mut(&mut self, addr: &MacAddr) -> Option<&mut PeerEntry> {
        self.entries.values_mut().find(|entry| &entry.addr == addr)
    }

    pub fn remove(&mut self, aid: Aid) -> Option<PeerEntry> {
        self.entries.remove(&aid)
    }

    pub fn remove_by_addr(&mut self, addr: &MacAddr) -> Option<PeerEntry> {
        let aid = self.find_by_addr(addr)?.aid;
        self.entries.remove(&aid)
    }

    /// The next peer whose firmware context still has to be removed.
    pub fn next_installed(&mut self) -> Option<&mut PeerEntry> {
        self.entries
            .values_mut()
            .find(|entry| entry.is_installed() && entry.mlm_state != MlmState::WaitDelStaResponse)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }
}
