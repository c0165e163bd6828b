// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use std::collections::BTreeMap;
use std::ops::Range;

use pox_core::stacking::DelegationEntry;
use pox_core::{BurnHeight, Error, PoxAddress, Principal, RewardCycle, Ustx};

type PartialKey = (PoxAddress, RewardCycle, Principal);

/// Delegations, delegated amounts awaiting aggregation, and the owners of
/// aggregated reward slots.
#[derive(Debug, Default, Clone)]
pub struct Delegations {
    delegations: BTreeMap<Principal, DelegationEntry>,
    partial: BTreeMap<PartialKey, Ustx>,
    committed: BTreeMap<(RewardCycle, u32), Principal>,
}

impl Delegations {
    pub const fn new() -> Self {
        Self {
            delegations: BTreeMap::new(),
            partial: BTreeMap::new(),
            committed: BTreeMap::new(),
        }
    }

    /// The delegation of `delegator` if it is in force at `burn_height`.
    pub fn active(
        &self,
        delegator: &Principal,
        burn_height: BurnHeight,
    ) -> Option<&DelegationEntry> {
        self.delegations
            .get(delegator)
            .filter(|entry| entry.is_active_at(burn_height))
    }

    /// The delegation allowing `delegate` to act for `delegator`.
    ///
    /// # Errors
    /// [`Error::NotDelegated`] if `delegator` has no delegation in force,
    /// [`Error::PermissionDenied`] if it names another delegate.
    pub fn authorized(
        &self,
        delegator: &Principal,
        delegate: &Principal,
        burn_height: BurnHeight,
    ) -> Result<&DelegationEntry, Error> {
        let entry = self
            .active(delegator, burn_height)
            .ok_or(Error::NotDelegated)?;
        if entry.delegated_to != *delegate {
            return Err(Error::PermissionDenied);
        }
        Ok(entry)
    }

    pub fn insert(&mut self, entry: DelegationEntry) {
        self.delegations.insert(entry.delegator, entry);
    }

    pub fn remove(&mut self, delegator: &Principal) -> Option<DelegationEntry> {
        self.delegations.remove(delegator)
    }

    /// Add `amount` to the partial stacked total of `delegate` for each
    /// cycle of `cycles`.
    pub fn add_partial(
        &mut self,
        pox_addr: &PoxAddress,
        cycles: Range<RewardCycle>,
        delegate: Principal,
        amount: Ustx,
    ) {
        for cycle in cycles {
            let total = self
                .partial
                .entry((pox_addr.clone(), cycle, delegate))
                .or_default();
            *total = total.saturating_add(amount);
        }
    }

    pub fn partial(
        &self,
        pox_addr: &PoxAddress,
        cycle: RewardCycle,
        delegate: &Principal,
    ) -> Option<Ustx> {
        self.partial
            .get(&(pox_addr.clone(), cycle, *delegate))
            .copied()
    }

    pub fn take_partial(
        &mut self,
        pox_addr: &PoxAddress,
        cycle: RewardCycle,
        delegate: &Principal,
    ) -> Option<Ustx> {
        self.partial.remove(&(pox_addr.clone(), cycle, *delegate))
    }

    pub fn record_commit(
        &mut self,
        cycle: RewardCycle,
        index: u32,
        delegate: Principal,
    ) {
        self.committed.insert((cycle, index), delegate);
    }

    /// The delegate that committed the given reward slot.
    pub fn committed_by(
        &self,
        cycle: RewardCycle,
        index: u32,
    ) -> Option<&Principal> {
        self.committed.get(&(cycle, index))
    }

    /// Drop the delegations that lapsed at `burn_height` and the partial
    /// totals of cycles before `current_cycle`, returning the dropped
    /// delegations.
    pub fn prune(
        &mut self,
        burn_height: BurnHeight,
        current_cycle: RewardCycle,
    ) -> Vec<DelegationEntry> {
        let lapsed: Vec<Principal> = self
            .delegations
            .values()
            .filter(|entry| !entry.is_active_at(burn_height))
            .map(|entry| entry.delegator)
            .collect();

        self.partial
            .retain(|(_, cycle, _), _| *cycle >= current_cycle);
        self.committed.retain(|(cycle, _), _| *cycle >= current_cycle);

        lapsed
            .iter()
            .filter_map(|delegator| self.delegations.remove(delegator))
            .collect()
    }
}
