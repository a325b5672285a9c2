// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Whitelist filtering of service frames, grounded on
//! `original_source/hw/platform/ioc.c`'s `is_active` / whitelist-table scan
//! in `cbc_rx_chan_is_active`-adjacent code and on the spec's tie-break
//! rule (§4.4): a signal that belongs to a group is admitted only if both
//! its own id and its group's id are individually whitelisted, when both
//! are whitelistable; a signal with no enclosing group is admitted solely
//! on its own whitelist membership.

use crate::tables::CbcDirectionTables;
use crate::{GroupFrame, ServiceFrame, ServiceItem, SignalFrame};

/// A direction's whitelist, derived once from its `CbcDirectionTables` and
/// then queried per-frame. Keeping this as its own type (rather than
/// querying the `Vec<u16>`s directly) is what makes the tie-break rule
/// testable in isolation from the rest of the table.
///
/// `active_signals`/`active_groups` hold only the ids whose config-table
/// entry is `active: true` -- the whitelist's second gate (spec §4.4): an
/// inactive id is never emitted even when individually whitelisted.
#[derive(Debug, Clone)]
pub struct Whitelist {
    signals: Vec<u16>,
    groups: Vec<u16>,
    active_signals: Vec<u16>,
    active_groups: Vec<u16>,
}

/// Bundles a direction's tables with its derived whitelist so callers only
/// need to carry one value through the pipeline.
#[derive(Debug, Clone)]
pub struct DirectionConfig {
    pub tables: CbcDirectionTables,
    pub whitelist: Whitelist,
}

impl DirectionConfig {
    pub fn new(tables: CbcDirectionTables) -> Self {
        let whitelist = Whitelist::from_tables(&tables);
        Self { tables, whitelist }
    }

    /// Filters `frame` in place per spec §4.4, returning a new frame that
    /// contains only the admitted signals and groups. A group that is
    /// itself whitelisted but ends up with no admitted member signals is
    /// dropped entirely rather than forwarded empty.
    pub fn filter(&self, frame: &ServiceFrame) -> ServiceFrame {
        self.whitelist.filter_service_frame(frame)
    }
}

impl Whitelist {
    pub fn from_tables(tables: &CbcDirectionTables) -> Self {
        Self {
            signals: tables.wlist_signals.clone(),
            groups: tables.wlist_groups.clone(),
            active_signals: tables
                .signal_table
                .iter()
                .filter(|s| s.active)
                .map(|s| s.id)
                .collect(),
            active_groups: tables
                .group_table
                .iter()
                .filter(|g| g.active)
                .map(|g| g.id)
                .collect(),
        }
    }

    fn signal_whitelisted(&self, id: u16) -> bool {
        self.signals.contains(&id) && self.active_signals.contains(&id)
    }

    fn group_whitelisted(&self, id: u16) -> bool {
        self.groups.contains(&id) && self.active_groups.contains(&id)
    }

    /// Whether a standalone signal (no enclosing group) is admitted.
    pub fn signal_admitted(&self, id: u16) -> bool {
        self.signal_whitelisted(id)
    }

    /// Whether a signal that is a member of `group_id` is admitted: both
    /// its own id and the group's id must be whitelisted.
    pub fn group_member_admitted(&self, group_id: u16, signal_id: u16) -> bool {
        self.group_whitelisted(group_id) && self.signal_whitelisted(signal_id)
    }

    /// Applies the tie-break rule to a whole service frame.
    pub fn filter_service_frame(&self, frame: &ServiceFrame) -> ServiceFrame {
        let mut items = Vec::new();
        for item in &frame.items {
            match item {
                ServiceItem::Signal(s) => {
                    if self.signal_admitted(s.id) {
                        items.push(ServiceItem::Signal(s.clone()));
                    }
                }
                ServiceItem::Group(g) => {
                    if let Some(filtered) = self.filter_group(g) {
                        items.push(ServiceItem::Group(filtered));
                    }
                }
            }
        }
        ServiceFrame { items }
    }

    fn filter_group(&self, group: &GroupFrame) -> Option<GroupFrame> {
        if !self.group_whitelisted(group.id) {
            return None;
        }
        let signals: Vec<SignalFrame> = group
            .signals
            .iter()
            .filter(|s| self.signal_whitelisted(s.id))
            .cloned()
            .collect();
        if signals.is_empty() {
            None
        } else {
            Some(GroupFrame {
                id: group.id,
                signals,
            })
        }
    }
}
