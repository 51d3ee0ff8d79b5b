// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{Role, Session, SessionHandle, SessionId, VdevId},
    crate::error::Error,
    log::debug,
    std::collections::{BTreeMap, HashMap},
    wlan_common::mac::{MacAddr, MacFmt},
};

struct Slot {
    generation: u32,
    session: Option<Session>,
}

/// A fixed-capacity arena of sessions. A slot's generation is bumped whenever its session is
/// deleted, so handles to a deleted session never resolve again even once the slot is reused.
/// Each vdev carries at most one session, which makes every (BSSID, vdev) pair unique.
pub struct SessionStore {
    slots: Vec<Slot>,
    peer_capacity: u16,
    by_vdev: HashMap<VdevId, SessionId>,
    by_bssid: BTreeMap<(MacAddr, VdevId), SessionId>,
}

impl SessionStore {
    pub fn new(capacity: usize, peer_capacity: u16) -> Self {
        let capacity = capacity.min(u8::MAX as usize + 1);
        Self {
            slots: (0..capacity).map(|_| Slot { generation: 0, session: None }).collect(),
            peer_capacity,
            by_vdev: HashMap::new(),
            by_bssid: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn create(
        &mut self,
        bssid: MacAddr,
        vdev_id: VdevId,
        role: Role,
    ) -> Result<SessionHandle, Error> {
        if self.by_bssid.contains_key(&(bssid, vdev_id)) {
            return Err(Error::DuplicateSession { bssid, vdev_id });
        }
        if self.by_vdev.contains_key(&vdev_id) {
            return Err(Error::VdevBusy(vdev_id));
        }
        let index = self
            .slots
            .iter()
            .position(|slot| slot.session.is_none())
            .ok_or(Error::TableFull(self.slots.len()))?;
        let id = SessionId(index as u8);
        let slot = &mut self.slots[index];
        let handle = SessionHandle { id, generation: slot.generation };
        slot.session = Some(Session::new(handle, vdev_id, bssid, role, self.peer_capacity));
        self.by_vdev.insert(vdev_id, id);
        self.by_bssid.insert((bssid, vdev_id), id);
        debug!("created session {:?} for {} on vdev {}", handle, bssid.to_mac_str(), vdev_id);
        Ok(handle)
    }

    fn session(&self, id: SessionId) -> Option<&Session> {
        self.slots.get(id.0 as usize).and_then(|slot| slot.session.as_ref())
    }

    /// Resolves a handle. Handles of deleted sessions resolve to `None`.
    pub fn get(&self, handle: SessionHandle) -> Option<&Session> {
        self.slots
            .get(handle.id.0 as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.session.as_ref())
    }

    pub fn get_mut(&mut self, handle: SessionHandle) -> Option<&mut Session> {
        self.slots
            .get_mut(handle.id.0 as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.session.as_mut())
    }

    /// The first session serving `bssid`, on any vdev.
    pub fn find_by_bssid(&self, bssid: &MacAddr) -> Option<&Session> {
        self.by_bssid
            .range((*bssid, VdevId::MIN)..=(*bssid, VdevId::MAX))
            .next()
            .and_then(|(_, id)| self.session(*id))
    }

    pub fn find(&self, bssid: &MacAddr, vdev_id: VdevId) -> Option<&Session> {
        self.by_bssid.get(&(*bssid, vdev_id)).and_then(|id| self.session(*id))
    }

    pub fn find_by_vdev(&self, vdev_id: VdevId) -> Option<&Session> {
        self.by_vdev.get(&vdev_id).and_then(|id| self.session(*id))
    }

    pub fn find_by_session_id(&self, id: SessionId) -> Option<&Session> {
        self.session(id)
    }

    /// The session `peer` talks to: a station session whose AP is `peer`, or an AP session with
    /// `peer` in its peer table.
    pub fn find_by_peer(&self, peer: &MacAddr) -> Option<&Session> {
        self.iter().find(|session| match session.role {
            Role::Client => &session.bssid == peer,
            Role::Ap => session.peers.find_by_addr(peer).is_some(),
            Role::Monitor => false,
        })
    }

    /// Re-indexes a session whose BSSID changed, e.g. after reassociating with another AP.
    pub fn update_bssid(&mut self, handle: SessionHandle) -> Result<(), Error> {
        let session = self.get(handle).ok_or(Error::UnknownSession(handle))?;
        let (vdev_id, bssid) = (session.vdev_id, session.bssid);
        self.by_bssid.retain(|_, id| *id != handle.id);
        self.by_bssid.insert((bssid, vdev_id), handle.id);
        Ok(())
    }

    /// Removes a session and returns it. Deleting a session that is already gone is a no-op.
    pub fn delete(&mut self, handle: SessionHandle) -> Option<Session> {
        let slot = self.slots.get_mut(handle.id.0 as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let session = slot.session.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.by_vdev.remove(&session.vdev_id);
        self.by_bssid.retain(|_, id| *id != handle.id);
        debug!("deleted session {:?}", handle);
        Some(session)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().filter_map(|slot| slot.session.as_ref())
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.iter().map(|session| session.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.by_vdev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_vdev.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    const BSSID_A: MacAddr = [0xa; 6];
    const BSSID_B: MacAddr = [0xb; 6];

    #[test]
    fn create_and_find() {
        let mut store = SessionStore::new(4, 8);
        let handle = store.create(BSSID_A, 1, Role::Client).expect("create");
        assert_eq!(store.find_by_bssid(&BSSID_A).map(|s| s.handle), Some(handle));
        assert_eq!(store.find_by_vdev(1).map(|s| s.handle), Some(handle));
        assert_eq!(store.find_by_session_id(handle.id).map(|s| s.handle), Some(handle));
        assert_eq!(store.find(&BSSID_A, 1).map(|s| s.handle), Some(handle));
        assert!(store.find(&BSSID_A, 2).is_none());
        assert!(store.find_by_bssid(&BSSID_B).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn bssid_and_vdev_pairs_are_unique() {
        let mut store = SessionStore::new(4, 8);
        store.create(BSSID_A, 1, Role::Client).expect("create");
        assert_matches!(
            store.create(BSSID_A, 1, Role::Client),
            Err(Error::DuplicateSession { vdev_id: 1, .. })
        );
        assert_matches!(store.create(BSSID_B, 1, Role::Client), Err(Error::VdevBusy(1)));
        store.create(BSSID_A, 2, Role::Client).expect("same bssid on another vdev");

        let mut pairs: Vec<_> = store.iter().map(|s| (s.bssid, s.vdev_id)).collect();
        let count = pairs.len();
        pairs.dedup();
        assert_eq!(pairs.len(), count);
    }

    #[test]
    fn table_full() {
        let mut store = SessionStore::new(2, 8);
        store.create(BSSID_A, 1, Role::Client).expect("create");
        store.create(BSSID_B, 2, Role::Ap).expect("create");
        assert_matches!(store.create([0xc; 6], 3, Role::Client), Err(Error::TableFull(2)));
    }

    #[test]
    fn delete_is_idempotent_and_invalidates_handles() {
        let mut store = SessionStore::new(1, 8);
        let handle = store.create(BSSID_A, 1, Role::Client).expect("create");
        assert!(store.delete(handle).is_some());
        assert!(store.delete(handle).is_none());
        assert!(store.get(handle).is_none());
        assert!(store.find_by_vdev(1).is_none());
        assert!(store.find_by_bssid(&BSSID_A).is_none());

        // The slot is reused under a new generation; the old handle stays dead.
        let new_handle = store.create(BSSID_B, 1, Role::Client).expect("create");
        assert_eq!(new_handle.id, handle.id);
        assert_ne!(new_handle.generation, handle.generation);
        assert!(store.get(handle).is_none());
        assert!(store.delete(handle).is_none());
        assert!(store.get(new_handle).is_some());
    }

    #[test]
    fn find_by_peer() {
        let mut store = SessionStore::new(4, 8);
        let client = store.create(BSSID_A, 1, Role::Client).expect("create");
        let ap = store.create(BSSID_B, 2, Role::Ap).expect("create");
        store.get_mut(ap).expect("ap").peers.insert([0x42; 6]).expect("aid");

        assert_eq!(store.find_by_peer(&BSSID_A).map(|s| s.handle), Some(client));
        assert_eq!(store.find_by_peer(&[0x42; 6]).map(|s| s.handle), Some(ap));
        assert!(store.find_by_peer(&[0x43; 6]).is_none());
    }

    #[test]
    fn update_bssid_reindexes() {
        let mut store = SessionStore::new(4, 8);
        let handle = store.create(BSSID_A, 1, Role::Client).expect("create");
        store.get_mut(handle).expect("session").bssid = BSSID_B;
        store.update_bssid(handle).expect("reindex");
        assert!(store.find_by_bssid(&BSSID_A).is_none());
        assert_eq!(store.find_by_bssid(&BSSID_B).map(|s| s.handle), Some(handle));
    }
}
