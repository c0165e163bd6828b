// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use std::collections::BTreeMap;
use std::ops::Range;

use pox_core::stacking::{RewardSetEntry, StackingEntry};
use pox_core::{
    BurnHeight, Error, PoxAddress, PoxConstants, Principal, RewardCycle,
    SignerKey, Ustx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SignerBinding {
    owner: Principal,
    until_cycle: RewardCycle,
}

/// Stacking entries, reward sets and the principals bound to each signer
/// key.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    stackers: BTreeMap<Principal, StackingEntry>,
    reward_sets: BTreeMap<RewardCycle, Vec<RewardSetEntry>>,
    signer_bindings: BTreeMap<SignerKey, SignerBinding>,
}

impl Ledger {
    pub const fn new() -> Self {
        Self {
            stackers: BTreeMap::new(),
            reward_sets: BTreeMap::new(),
            signer_bindings: BTreeMap::new(),
        }
    }

    /// The entry of `who`, expired or not.
    pub fn get(&self, who: &Principal) -> Option<&StackingEntry> {
        self.stackers.get(who)
    }

    pub fn insert(&mut self, entry: StackingEntry) {
        self.stackers.insert(entry.stacker, entry);
    }

    pub fn remove(&mut self, who: &Principal) -> Option<StackingEntry> {
        self.stackers.remove(who)
    }

    /// Principals whose lock has elapsed at `burn_height`.
    pub fn expired(
        &self,
        consts: &PoxConstants,
        burn_height: BurnHeight,
    ) -> Vec<Principal> {
        self.stackers
            .values()
            .filter(|entry| !entry.is_locked_at(consts, burn_height))
            .map(|entry| entry.stacker)
            .collect()
    }

    pub fn reward_set(&self, cycle: RewardCycle) -> &[RewardSetEntry] {
        self.reward_sets.get(&cycle).map_or(&[], Vec::as_slice)
    }

    pub fn reward_slot(
        &self,
        cycle: RewardCycle,
        index: u32,
    ) -> Option<&RewardSetEntry> {
        self.reward_sets
            .get(&cycle)
            .and_then(|set| set.get(index as usize))
    }

    /// Add `amount` to a reward slot, returning the new slot total.
    pub fn increase_slot(
        &mut self,
        cycle: RewardCycle,
        index: u32,
        amount: Ustx,
    ) -> Option<Ustx> {
        let slot = self
            .reward_sets
            .get_mut(&cycle)
            .and_then(|set| set.get_mut(index as usize))?;
        slot.total_ustx = slot.total_ustx.saturating_add(amount);
        Some(slot.total_ustx)
    }

    /// Replace the signer backing a reward slot.
    pub fn set_slot_signer(
        &mut self,
        cycle: RewardCycle,
        index: u32,
        signer_key: SignerKey,
    ) {
        if let Some(slot) = self
            .reward_sets
            .get_mut(&cycle)
            .and_then(|set| set.get_mut(index as usize))
        {
            slot.signer_key = signer_key;
        }
    }

    /// Append a slot to the reward set of `cycle`, returning its index.
    pub fn push_slot(
        &mut self,
        cycle: RewardCycle,
        slot: RewardSetEntry,
    ) -> u32 {
        let set = self.reward_sets.entry(cycle).or_default();
        set.push(slot);
        u32::try_from(set.len() - 1).unwrap_or(u32::MAX)
    }

    /// Append one slot per cycle of `cycles` for a solo stacker, returning
    /// the indexes in cycle order.
    pub fn push_stacker_slots(
        &mut self,
        cycles: Range<RewardCycle>,
        stacker: Principal,
        pox_addr: &PoxAddress,
        amount: Ustx,
        signer_key: SignerKey,
    ) -> Vec<u32> {
        cycles
            .map(|cycle| {
                self.push_slot(
                    cycle,
                    RewardSetEntry {
                        pox_addr: pox_addr.clone(),
                        total_ustx: amount,
                        stacker: Some(stacker),
                        signer_key,
                    },
                )
            })
            .collect()
    }

    pub fn total_stacked(&self, cycle: RewardCycle) -> Ustx {
        self.reward_set(cycle)
            .iter()
            .fold(0, |acc: Ustx, slot| acc.saturating_add(slot.total_ustx))
    }

    /// Check `signer_key` parses and may be used by `owner` during
    /// `current_cycle`.
    ///
    /// # Errors
    /// [`Error::InvalidSignerKey`] or [`Error::ReusedSignerKey`].
    pub fn check_signer_key(
        &self,
        signer_key: &SignerKey,
        owner: &Principal,
        current_cycle: RewardCycle,
    ) -> Result<(), Error> {
        signer_key.verifying_key()?;
        match self.signer_bindings.get(signer_key) {
            Some(binding)
                if binding.owner != *owner
                    && binding.until_cycle > current_cycle =>
            {
                Err(Error::ReusedSignerKey)
            }
            _ => Ok(()),
        }
    }

    /// Bind `signer_key` to `owner` up to, excluding, `until_cycle`.
    pub fn bind_signer_key(
        &mut self,
        signer_key: SignerKey,
        owner: Principal,
        until_cycle: RewardCycle,
    ) {
        let binding = self
            .signer_bindings
            .entry(signer_key)
            .or_insert(SignerBinding { owner, until_cycle });
        if binding.owner == owner {
            binding.until_cycle = binding.until_cycle.max(until_cycle);
        } else {
            *binding = SignerBinding { owner, until_cycle };
        }
    }

    /// Drop the bindings that ended before `current_cycle`.
    pub fn release_signer_keys(&mut self, current_cycle: RewardCycle) {
        self.signer_bindings
            .retain(|_, binding| binding.until_cycle > current_cycle);
    }
}
