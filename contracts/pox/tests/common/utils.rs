// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use pox_core::pox_addr::ADDRESS_VERSION_P2PKH;
use pox_core::stacking::{DelegateStackStx, DelegateStx, StackStx};
use pox_core::{
    BurnHeight, PoxAddress, Principal, RewardCycle, SignerAuthorization,
    Topic, Ustx,
};

use super::init::{constants, Account, CHAIN_ID};

pub fn pox_addr(byte: u8) -> PoxAddress {
    PoxAddress::new(ADDRESS_VERSION_P2PKH, [byte; 20])
}

pub fn cycle_of(burn_height: BurnHeight) -> RewardCycle {
    constants()
        .block_height_to_reward_cycle(burn_height)
        .expect("Burn height should be after the first burn block")
}

#[allow(clippy::too_many_arguments)]
pub fn signed_auth(
    signer: &Account,
    pox_addr: &PoxAddress,
    reward_cycle: RewardCycle,
    topic: Topic,
    period: u64,
    max_amount: Ustx,
    auth_id: u128,
) -> SignerAuthorization {
    SignerAuthorization::signed(
        &signer.sk,
        CHAIN_ID,
        pox_addr.clone(),
        reward_cycle,
        topic,
        period,
        max_amount,
        auth_id,
    )
    .expect("Signing the authorization should succeed")
}

/// Fashion a `stack-stx` call authorized by `signer` for exactly `amount`.
pub fn stack_stx(
    signer: &Account,
    amount: Ustx,
    pox_addr: &PoxAddress,
    start_burn_height: BurnHeight,
    lock_period: u64,
    auth_id: u128,
) -> StackStx {
    let auth = signed_auth(
        signer,
        pox_addr,
        cycle_of(start_burn_height),
        Topic::StackStx,
        lock_period,
        amount,
        auth_id,
    );
    StackStx {
        amount,
        pox_addr: pox_addr.clone(),
        start_burn_height,
        lock_period,
        auth,
    }
}

pub fn delegate_stx(
    delegate_to: &Principal,
    amount: Ustx,
    until_burn_height: Option<BurnHeight>,
    pox_addr: Option<PoxAddress>,
) -> DelegateStx {
    DelegateStx {
        amount,
        delegate_to: *delegate_to,
        until_burn_height,
        pox_addr,
    }
}

pub fn delegate_stack_stx(
    stacker: &Principal,
    amount: Ustx,
    pox_addr: &PoxAddress,
    start_burn_height: BurnHeight,
    lock_period: u64,
) -> DelegateStackStx {
    DelegateStackStx {
        stacker: *stacker,
        amount,
        pox_addr: pox_addr.clone(),
        start_burn_height,
        lock_period,
    }
}
