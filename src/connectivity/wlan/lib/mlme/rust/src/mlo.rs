// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Multi-link coordination. Each session of a multi-link device keeps an `MloLink` with the
//! change count it last saw and a baseline of every partner link's critical elements. Sessions
//! never touch each other's records: anything one link learns about another is posted to the
//! other link's session as a message.

use {
    crate::{
        context::Context,
        device::FirmwareCommand,
        error::Error,
        message::Message,
        session::{ChannelSwitch, Role, Session, VdevId},
        state::MlmState,
    },
    log::{debug, info, warn},
    std::collections::BTreeMap,
    wlan_common::{
        ie::{
            multi_link::{MultiLinkElement, PerStaProfile},
            ChannelSwitchAnnouncement, DsssParamSet, EdcaParamSet,
            ExtendedChannelSwitchAnnouncement, ParsedIes, Quiet,
        },
        mac::{MacAddr, MacFmt},
    },
};

/// How a received BSS Parameters Change Count relates to the last one seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCount {
    /// Nothing was seen before.
    Initial,
    Unchanged,
    Newer,
    /// Older than the last one seen, e.g. a delayed beacon.
    Stale,
}

/// Compares 8-bit change counts with serial number arithmetic, so the counter may wrap.
pub fn check_cu_happens(last: Option<u8>, new: u8) -> ChangeCount {
    let last = match last {
        Some(last) => last,
        None => return ChangeCount::Initial,
    };
    match new.wrapping_sub(last) {
        0 => ChangeCount::Unchanged,
        1..=127 => ChangeCount::Newer,
        _ => ChangeCount::Stale,
    }
}

/// The elements of one link whose change is a critical update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkIeSet {
    pub dsss: Option<DsssParamSet>,
    pub edca: Option<EdcaParamSet>,
    pub csa: Option<ChannelSwitchAnnouncement>,
    pub ecsa: Option<ExtendedChannelSwitchAnnouncement>,
    pub max_channel_switch_time: Option<Vec<u8>>,
    pub quiet: Option<Quiet>,
    pub ht_op: Option<Vec<u8>>,
    pub vht_op: Option<Vec<u8>>,
    pub he_op: Option<Vec<u8>>,
    pub eht_op: Option<Vec<u8>>,
}

impl LinkIeSet {
    pub fn from_parsed(ies: &ParsedIes) -> Self {
        Self {
            dsss: ies.dsss,
            edca: ies.edca,
            csa: ies.csa,
            ecsa: ies.ecsa,
            max_channel_switch_time: ies.max_channel_switch_time.clone(),
            quiet: ies.quiet,
            ht_op: ies.ht_op.clone(),
            vht_op: ies.vht_op.clone(),
            he_op: ies.he_op.clone(),
            eht_op: ies.eht_op.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartnerLinkConfig {
    pub link_id: u8,
    /// The local vdev serving this partner link, if any.
    pub vdev_id: Option<VdevId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MloLinkConfig {
    pub mld_addr: MacAddr,
    pub link_id: u8,
    pub partners: Vec<PartnerLinkConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartnerLink {
    pub link_id: u8,
    pub vdev_id: Option<VdevId>,
    pub bss_params_change_count: Option<u8>,
    pub ies: Option<LinkIeSet>,
    pub channel_switch: Option<ChannelSwitch>,
    pub quiet_scheduled: bool,
}

impl PartnerLink {
    fn new(link_id: u8, vdev_id: Option<VdevId>) -> Self {
        Self {
            link_id,
            vdev_id,
            bss_params_change_count: None,
            ies: None,
            channel_switch: None,
            quiet_scheduled: false,
        }
    }
}

/// A channel switch announced for a partner link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartnerSwitch {
    pub link_id: u8,
    pub vdev_id: Option<VdevId>,
    pub switch: ChannelSwitch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MloLink {
    pub mld_addr: MacAddr,
    pub link_id: u8,
    /// Station side: the count last seen from the AP. AP side: the count this link advertises.
    pub bss_params_change_count: Option<u8>,
    /// Set when the last beacon or template update carried a critical update.
    pub critical_update: bool,
    own_ies: Option<LinkIeSet>,
    partners: BTreeMap<u8, PartnerLink>,
}

impl MloLink {
    pub fn new(config: &MloLinkConfig) -> Self {
        let partners = config
            .partners
            .iter()
            .filter(|partner| partner.link_id != config.link_id)
            .map(|partner| (partner.link_id, PartnerLink::new(partner.link_id, partner.vdev_id)))
            .collect();
        Self {
            mld_addr: config.mld_addr,
            link_id: config.link_id,
            bss_params_change_count: None,
            critical_update: false,
            own_ies: None,
            partners,
        }
    }

    pub fn partner(&self, link_id: u8) -> Option<&PartnerLink> {
        self.partners.get(&link_id)
    }

    pub fn partners(&self) -> impl Iterator<Item = &PartnerLink> {
        self.partners.values()
    }

    /// Station side: processes the Multi-Link element of a beacon from the serving AP. Returns
    /// the channel switches newly announced for partner links.
    pub fn on_beacon(&mut self, ml: &MultiLinkElement) -> Vec<PartnerSwitch> {
        self.critical_update = false;
        if let Some(count) = ml.bss_params_change_count {
            match check_cu_happens(self.bss_params_change_count, count) {
                ChangeCount::Initial => self.bss_params_change_count = Some(count),
                ChangeCount::Newer => {
                    self.bss_params_change_count = Some(count);
                    self.critical_update = true;
                }
                ChangeCount::Unchanged => (),
                ChangeCount::Stale => {
                    debug!("ignoring stale change count {} for link {}", count, self.link_id);
                }
            }
        }

        let mut switches = vec![];
        for profile in &ml.per_sta_profiles {
            let profile = match profile {
                Ok(profile) if profile.link_id == self.link_id => continue,
                Ok(profile) => profile,
                Err(e) => {
                    warn!("dropping partner update of MLD {}: {}", self.mld_addr.to_mac_str(), e);
                    continue;
                }
            };
            match self.on_partner_profile(profile) {
                Ok(Some(switch)) => switches.push(switch),
                Ok(None) => (),
                Err(e) => warn!("dropping update of partner link {}: {}", profile.link_id, e),
            }
        }
        switches
    }

    fn on_partner_profile(
        &mut self,
        profile: &PerStaProfile,
    ) -> Result<Option<PartnerSwitch>, Error> {
        let last = self.partners.get(&profile.link_id).and_then(|p| p.bss_params_change_count);
        match profile.bss_params_change_count.map(|count| check_cu_happens(last, count)) {
            Some(ChangeCount::Unchanged) | Some(ChangeCount::Stale) => return Ok(None),
            Some(_) => (),
            // Without a per-link count, only a link-wide critical update refreshes the partner.
            None if !self.critical_update && last.is_some() => return Ok(None),
            None => (),
        }
        // The whole profile is parsed before anything about the partner is updated.
        let ies = ParsedIes::parse(&profile.elements[..])?;
        let switch = self.on_partner_beacon_update(profile.link_id, &ies);
        if let Some(partner) = self.partners.get_mut(&profile.link_id) {
            if profile.bss_params_change_count.is_some() {
                partner.bss_params_change_count = profile.bss_params_change_count;
            }
        }
        Ok(switch.map(|switch| PartnerSwitch {
            link_id: profile.link_id,
            vdev_id: self.partners.get(&profile.link_id).and_then(|p| p.vdev_id),
            switch,
        }))
    }

    /// Records the elements a partner link advertises. Returns the channel switch announced for
    /// it, unless the same switch was already recorded.
    pub fn on_partner_beacon_update(
        &mut self,
        link_id: u8,
        ies: &ParsedIes,
    ) -> Option<ChannelSwitch> {
        let partner =
            self.partners.entry(link_id).or_insert_with(|| PartnerLink::new(link_id, None));
        let fresh = LinkIeSet::from_parsed(ies);
        partner.quiet_scheduled = fresh.quiet.is_some();
        partner.ies = Some(fresh);

        let switch = ChannelSwitch::from_ies(ies);
        let is_new = switch.is_some() && switch != partner.channel_switch;
        partner.channel_switch = switch;
        match is_new {
            true => switch,
            false => None,
        }
    }

    /// Compares this link's own critical elements with `fresh`. The first call only records a
    /// baseline. A difference bumps the change count and returns true: the beacon template has
    /// to be regenerated.
    pub fn reconcile_critical_update(&mut self, fresh: &ParsedIes) -> bool {
        let fresh = LinkIeSet::from_parsed(fresh);
        match &self.own_ies {
            None => {
                self.own_ies = Some(fresh);
                self.bss_params_change_count.get_or_insert(0);
                self.critical_update = false;
                false
            }
            Some(cached) if *cached == fresh => {
                self.critical_update = false;
                false
            }
            Some(_) => {
                self.own_ies = Some(fresh);
                let count = self.bss_params_change_count.unwrap_or(0).wrapping_add(1);
                self.bss_params_change_count = Some(count);
                self.critical_update = true;
                true
            }
        }
    }

    /// Records a partner's new change count as announced by the partner's own session.
    pub fn record_partner_count(&mut self, link_id: u8, count: u8) {
        self.partners
            .entry(link_id)
            .or_insert_with(|| PartnerLink::new(link_id, None))
            .bss_params_change_count = Some(count);
    }
}

/// Station side: multi-link part of a beacon from the serving AP.
pub fn handle_sta_beacon(ctx: &mut Context, session: &mut Session, ies: &ParsedIes) {
    let (mlo, ml) = match (session.mlo.as_mut(), ies.multi_link.as_ref()) {
        (Some(mlo), Some(ml)) => (mlo, ml),
        _ => return,
    };
    for PartnerSwitch { link_id, vdev_id, switch } in mlo.on_beacon(ml) {
        info!("partner link {} announces a switch to channel {}", link_id, switch.channel);
        match vdev_id {
            Some(vdev_id) => ctx.post(Message::PartnerChannelSwitch { vdev_id, link_id, switch }),
            None => debug!("partner link {} has no local vdev", link_id),
        }
    }
}

/// AP side: the own beacon's elements changed. Regenerates the own template and those of all
/// partner links when the change is a critical update.
pub fn handle_beacon_template_update(
    ctx: &mut Context,
    session: &mut Session,
    ies: &[u8],
) -> Result<(), Error> {
    if session.role != Role::Ap || session.states.mlm() != MlmState::BssStarted {
        return Err(Error::UnexpectedMessage {
            msg: "BeaconTemplateUpdate",
            sme: session.states.sme(),
            mlm: session.states.mlm(),
        });
    }
    let ies = ParsedIes::parse(ies)?;
    let vdev_id = session.vdev_id;
    let mlo = match session.mlo.as_mut() {
        Some(mlo) => mlo,
        None => {
            return ctx.send_command(FirmwareCommand::UpdateBeaconTemplate {
                vdev_id,
                bss_params_change_count: None,
                critical_update: false,
                partner_link_id: None,
            });
        }
    };
    if !mlo.reconcile_critical_update(&ies) {
        return Ok(());
    }
    let count = mlo.bss_params_change_count.unwrap_or(0);
    info!("critical update on link {}; change count now {}", mlo.link_id, count);
    let link_id = mlo.link_id;
    let partner_vdevs: Vec<VdevId> = mlo.partners().filter_map(|p| p.vdev_id).collect();
    ctx.send_command(FirmwareCommand::UpdateBeaconTemplate {
        vdev_id,
        bss_params_change_count: Some(count),
        critical_update: true,
        partner_link_id: None,
    })?;
    for partner_vdev in partner_vdevs {
        ctx.post(Message::PartnerTemplateRefresh {
            vdev_id: partner_vdev,
            link_id,
            bss_params_change_count: count,
        });
    }
    Ok(())
}

/// AP side: a partner link had a critical update, so this link's beacon, which carries the
/// partner's profile, is regenerated too.
pub fn handle_partner_template_refresh(
    ctx: &mut Context,
    session: &mut Session,
    link_id: u8,
    bss_params_change_count: u8,
) -> Result<(), Error> {
    let mlo = match session.mlo.as_mut() {
        Some(mlo) if session.role == Role::Ap => mlo,
        _ => {
            debug!("vdev {} is not an AP multi-link session", session.vdev_id);
            return Ok(());
        }
    };
    mlo.record_partner_count(link_id, bss_params_change_count);
    let own_count = mlo.bss_params_change_count;
    ctx.send_command(FirmwareCommand::UpdateBeaconTemplate {
        vdev_id: session.vdev_id,
        bss_params_change_count: own_count,
        critical_update: true,
        partner_link_id: Some(link_id),
    })
}
