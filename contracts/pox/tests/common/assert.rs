// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use pox_contract::host::Balances;
use pox_contract::MemoryPoxState;
use pox_core::stacking::PoxEvent;
use pox_core::{Principal, RewardCycle, Ustx};

pub fn assert_stacker(
    state: &MemoryPoxState,
    stacker: &Principal,
    expected_locked: Ustx,
    expected_first_cycle: RewardCycle,
    expected_lock_period: u64,
) {
    let entry = state
        .get_stacker_info(stacker)
        .expect("There should be a stacking entry for the principal");

    assert_eq!(
        entry.locked_amount, expected_locked,
        "Locked amount incorrect"
    );
    assert_eq!(
        entry.first_reward_cycle, expected_first_cycle,
        "First reward cycle incorrect"
    );
    assert_eq!(
        entry.lock_period, expected_lock_period,
        "Lock period incorrect"
    );
}

pub fn assert_not_stacked(state: &MemoryPoxState, stacker: &Principal) {
    assert!(
        state.get_stacker_info(stacker).is_none(),
        "There should be no stacking entry for the principal"
    );
}

pub fn assert_balance(
    state: &MemoryPoxState,
    who: &Principal,
    expected_spendable: Ustx,
    expected_locked: Ustx,
) {
    let balances = state.balances();
    assert_eq!(
        balances.spendable_balance(who),
        Some(expected_spendable),
        "Spendable balance incorrect"
    );
    assert_eq!(
        balances.locked_balance(who),
        expected_locked,
        "Locked balance incorrect"
    );
}

/// Find the event matching `predicate`, panicking with `description`
/// otherwise.
pub fn assert_event<F>(events: &[PoxEvent], description: &str, predicate: F)
where
    F: Fn(&PoxEvent) -> bool,
{
    assert!(
        events.iter().any(predicate),
        "event: {description} should exist in the event list: {events:?}"
    );
}
