// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use pox_contract::MemoryPoxState;
use pox_core::stacking::{PoxEvent, StackExtend, StackIncrease, StackStx};
use pox_core::{Error, SignerAuthorization, Topic, Ustx};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rkyv::{check_archived_root, Deserialize, Infallible};

pub mod common;
use crate::common::assert::{
    assert_balance, assert_event, assert_not_stacked, assert_stacker,
};
use crate::common::init::{instantiate, Account, GENESIS_VALUE, MIN_AMOUNT};
use crate::common::utils::*;

#[test]
fn stack_stx_then_read() {
    let rng = &mut StdRng::seed_from_u64(0xfeeb);

    let cases = [(MIN_AMOUNT, 1), (50_000, 6), (GENESIS_VALUE, 12)];
    let (mut state, accounts) = instantiate(rng, cases.len());

    for ((amount, lock_period), stacker) in cases.into_iter().zip(&accounts)
    {
        let addr = pox_addr(1);
        let call = stack_stx(stacker, amount, &addr, 300, lock_period, 1);

        let entry = state
            .stack_stx(&stacker.principal, call)
            .expect("Stacking should succeed");

        assert_eq!(entry.locked_amount, amount);
        assert_eq!(entry.first_reward_cycle, cycle_of(300));
        assert_eq!(entry.reward_set_indexes.len() as u64, lock_period);

        assert_stacker(
            &state,
            &stacker.principal,
            amount,
            cycle_of(300),
            lock_period,
        );
        assert_balance(
            &state,
            &stacker.principal,
            GENESIS_VALUE - amount,
            amount,
        );
    }

    assert_eq!(
        state.get_total_ustx_stacked(3),
        MIN_AMOUNT + 50_000 + GENESIS_VALUE
    );
    assert_eq!(state.get_total_ustx_stacked(9), GENESIS_VALUE);
    assert_eq!(state.get_reward_set(9).len(), 1);

    let events = state.drain_events();
    assert_eq!(events.len(), cases.len());
    assert!(state.drain_events().is_empty());
}

#[test]
fn stack_stx_from_archived_call() {
    let rng = &mut StdRng::seed_from_u64(0xfeec);
    let (mut state, accounts) = instantiate(rng, 1);
    let alice = &accounts[0];

    let call = stack_stx(alice, 10_000, &pox_addr(1), 300, 2, 1);
    let call_bytes = rkyv::to_bytes::<_, 1024>(&call)
        .expect("Should serialize StackStx correctly")
        .to_vec();

    let archived = check_archived_root::<StackStx>(call_bytes.as_slice())
        .expect("StackStx should deserialize correctly");
    let call: StackStx =
        archived.deserialize(&mut Infallible).expect("Infallible");

    state
        .stack_stx(&alice.principal, call)
        .expect("Stacking should succeed");
    assert_stacker(&state, &alice.principal, 10_000, 3, 2);
}

#[test]
fn stack_stx_preconditions() {
    let rng = &mut StdRng::seed_from_u64(0xfeed);
    let (mut state, accounts) = instantiate(rng, 2);
    let alice = &accounts[0];
    let addr = pox_addr(1);

    let fails = |state: &mut MemoryPoxState, call: StackStx, expected| {
        assert_eq!(state.stack_stx(&alice.principal, call), Err(expected));
        assert_not_stacked(state, &alice.principal);
        assert_balance(state, &alice.principal, GENESIS_VALUE, 0);
    };

    // start cycle in the past, or more than one cycle ahead
    fails(
        &mut state,
        stack_stx(alice, 10_000, &addr, 150, 2, 1),
        Error::InvalidStartBurnHeight,
    );
    fails(
        &mut state,
        stack_stx(alice, 10_000, &addr, 400, 2, 1),
        Error::InvalidStartBurnHeight,
    );

    fails(
        &mut state,
        stack_stx(alice, 0, &addr, 300, 2, 1),
        Error::InvalidAmount,
    );
    fails(
        &mut state,
        stack_stx(alice, 10_000, &addr, 300, 0, 1),
        Error::InvalidLockPeriod,
    );
    fails(
        &mut state,
        stack_stx(alice, 10_000, &addr, 300, 13, 1),
        Error::InvalidLockPeriod,
    );

    let mut bad_addr = addr.clone();
    bad_addr.hashbytes.push(0);
    fails(
        &mut state,
        stack_stx(alice, 10_000, &bad_addr, 300, 2, 1),
        Error::InvalidPoxAddress,
    );

    fails(
        &mut state,
        stack_stx(alice, MIN_AMOUNT - 1, &addr, 300, 2, 1),
        Error::ThresholdNotMet,
    );
    fails(
        &mut state,
        stack_stx(alice, GENESIS_VALUE + 1, &addr, 300, 2, 1),
        Error::InsufficientFunds,
    );

    // an account the host does not know about
    let stranger = Account::random(rng);
    let call = stack_stx(&stranger, 10_000, &addr, 300, 2, 1);
    assert_eq!(
        state.stack_stx(&stranger.principal, call),
        Err(Error::NoSuchPrincipal)
    );

    assert!(state.drain_events().is_empty());
}

#[test]
fn stack_stx_authorization_failures() {
    let rng = &mut StdRng::seed_from_u64(0xfeee);
    let (mut state, accounts) = instantiate(rng, 2);
    let (alice, signer) = (&accounts[0], &accounts[1]);
    let addr = pox_addr(1);

    let call_with = |auth: SignerAuthorization| StackStx {
        amount: 10_000,
        pox_addr: addr.clone(),
        start_burn_height: 300,
        lock_period: 2,
        auth,
    };

    let auth =
        signed_auth(signer, &addr, 3, Topic::StackIncrease, 2, 10_000, 1);
    assert_eq!(
        state.stack_stx(&alice.principal, call_with(auth)),
        Err(Error::WrongSignerTopic)
    );

    let auth = signed_auth(signer, &addr, 4, Topic::StackStx, 2, 10_000, 1);
    assert_eq!(
        state.stack_stx(&alice.principal, call_with(auth)),
        Err(Error::InvalidRewardCycle)
    );

    let auth = signed_auth(signer, &addr, 3, Topic::StackStx, 2, 9_999, 1);
    assert_eq!(
        state.stack_stx(&alice.principal, call_with(auth)),
        Err(Error::SignerAuthAmountTooHigh)
    );

    let auth =
        signed_auth(signer, &pox_addr(2), 3, Topic::StackStx, 2, 10_000, 1);
    assert_eq!(
        state.stack_stx(&alice.principal, call_with(auth)),
        Err(Error::SignerAuthMismatch)
    );

    // signed by one key, claimed by another
    let mut auth =
        signed_auth(signer, &addr, 3, Topic::StackStx, 2, 10_000, 1);
    auth.signer_key = alice.signer_key;
    assert_eq!(
        state.stack_stx(&alice.principal, call_with(auth)),
        Err(Error::InvalidSignaturePubkey)
    );

    // unsigned and never registered
    let mut auth =
        signed_auth(signer, &addr, 3, Topic::StackStx, 2, 10_000, 1);
    auth.signature = None;
    assert_eq!(
        state.stack_stx(&alice.principal, call_with(auth)),
        Err(Error::NotAllowed)
    );

    assert_not_stacked(&state, &alice.principal);
    assert_balance(&state, &alice.principal, GENESIS_VALUE, 0);
    assert!(!state.is_signer_auth_used(
        &signer.signer_key,
        1,
        Topic::StackStx,
        3
    ));
}

#[test]
fn stack_stx_conflicts() {
    let rng = &mut StdRng::seed_from_u64(0xfeef);
    let (mut state, accounts) = instantiate(rng, 3);
    let (alice, bob, carol) = (&accounts[0], &accounts[1], &accounts[2]);
    let addr = pox_addr(1);

    state
        .stack_stx(&alice.principal, stack_stx(alice, 10_000, &addr, 300, 2, 1))
        .expect("Stacking should succeed");

    assert_eq!(
        state.stack_stx(
            &alice.principal,
            stack_stx(alice, 10_000, &addr, 300, 2, 2)
        ),
        Err(Error::AlreadyStacked)
    );

    // alice's signer key is bound to her until her lock ends
    assert_eq!(
        state.stack_stx(
            &bob.principal,
            stack_stx(alice, 10_000, &addr, 300, 2, 3)
        ),
        Err(Error::ReusedSignerKey)
    );
    assert_not_stacked(&state, &bob.principal);

    state
        .delegate_stx(
            &carol.principal,
            delegate_stx(&bob.principal, 10_000, None, None),
        )
        .expect("Delegating should succeed");
    assert_eq!(
        state.stack_stx(
            &carol.principal,
            stack_stx(carol, 10_000, &addr, 300, 2, 1)
        ),
        Err(Error::AlreadyDelegated)
    );
}

#[test]
fn stack_extend_requires_entry() {
    let rng = &mut StdRng::seed_from_u64(0xff00);
    let (mut state, accounts) = instantiate(rng, 2);
    let (alice, bob) = (&accounts[0], &accounts[1]);
    let addr = pox_addr(1);

    state
        .stack_stx(&alice.principal, stack_stx(alice, 10_000, &addr, 300, 2, 1))
        .expect("Stacking should succeed");
    state.drain_events();

    let auth = signed_auth(bob, &addr, 2, Topic::StackExtend, 1, 10_000, 1);
    let extend = StackExtend {
        extend_count: 1,
        pox_addr: addr.clone(),
        auth,
    };

    assert_eq!(
        state.stack_extend(&bob.principal, extend),
        Err(Error::NotCurrentStacker)
    );

    assert_not_stacked(&state, &bob.principal);
    assert_stacker(&state, &alice.principal, 10_000, 3, 2);
    assert_eq!(state.get_total_ustx_stacked(5), 0);
    assert!(!state.is_signer_auth_used(
        &bob.signer_key,
        1,
        Topic::StackExtend,
        2
    ));
    assert!(state.drain_events().is_empty());
}

#[test]
fn stack_extend_and_reuse() {
    let rng = &mut StdRng::seed_from_u64(0xff01);
    let (mut state, accounts) = instantiate(rng, 1);
    let alice = &accounts[0];
    let addr = pox_addr(1);
    let new_addr = pox_addr(2);

    state
        .stack_stx(&alice.principal, stack_stx(alice, 10_000, &addr, 300, 2, 1))
        .expect("Stacking should succeed");

    let auth =
        signed_auth(alice, &new_addr, 2, Topic::StackExtend, 1, 10_000, 5);
    let extend = StackExtend {
        extend_count: 1,
        pox_addr: new_addr.clone(),
        auth,
    };

    let entry = state
        .stack_extend(&alice.principal, extend.clone())
        .expect("Extending should succeed");
    assert_eq!(entry.lock_period, 3);
    assert_eq!(entry.pox_addr, new_addr);
    assert_eq!(entry.reward_set_indexes.len(), 3);
    assert_eq!(state.get_reward_set(5)[0].pox_addr, new_addr);
    assert_eq!(state.get_reward_set(4)[0].pox_addr, addr);
    assert!(state.is_signer_auth_used(
        &alice.signer_key,
        5,
        Topic::StackExtend,
        2
    ));

    // the very same authorization cannot be used twice
    assert_eq!(
        state.stack_extend(&alice.principal, extend),
        Err(Error::SignerAuthUsed)
    );
    assert_stacker(&state, &alice.principal, 10_000, 3, 3);

    // cycles 3..=15 would exceed the maximum lock period
    let auth =
        signed_auth(alice, &new_addr, 2, Topic::StackExtend, 10, 10_000, 6);
    let extend = StackExtend {
        extend_count: 10,
        pox_addr: new_addr,
        auth,
    };
    assert_eq!(
        state.stack_extend(&alice.principal, extend),
        Err(Error::InvalidLockPeriod)
    );
}

#[test]
fn stack_increase_raises_future_slots() {
    let rng = &mut StdRng::seed_from_u64(0xff02);
    let (mut state, accounts) = instantiate(rng, 1);
    let alice = &accounts[0];
    let addr = pox_addr(1);

    state
        .stack_stx(&alice.principal, stack_stx(alice, 10_000, &addr, 300, 2, 1))
        .expect("Stacking should succeed");

    // the reward set of cycle 3 is fixed once the cycle started
    state.clock_mut().set_burn_height(350);

    let auth =
        signed_auth(alice, &addr, 3, Topic::StackIncrease, 2, 15_000, 2);
    let entry = state
        .stack_increase(
            &alice.principal,
            StackIncrease {
                increase_by: 5_000,
                auth: auth.clone(),
            },
        )
        .expect("Increasing should succeed");

    assert_eq!(entry.locked_amount, 15_000);
    assert_eq!(state.get_total_ustx_stacked(3), 10_000);
    assert_eq!(state.get_total_ustx_stacked(4), 15_000);
    assert_balance(&state, &alice.principal, GENESIS_VALUE - 15_000, 15_000);

    let events = state.drain_events();
    assert_event(&events, "stack-increase", |event| {
        matches!(
            event,
            PoxEvent::StackIncrease { stacker, total_locked }
                if *stacker == alice.principal && *total_locked == 15_000
        )
    });

    assert_eq!(
        state.stack_increase(
            &alice.principal,
            StackIncrease {
                increase_by: 0,
                auth: auth.clone(),
            },
        ),
        Err(Error::InvalidAmount)
    );
    assert_eq!(
        state.stack_increase(
            &alice.principal,
            StackIncrease {
                increase_by: GENESIS_VALUE,
                auth: auth.clone(),
            },
        ),
        Err(Error::InsufficientFunds)
    );
    assert_eq!(
        state.stack_increase(
            &alice.principal,
            StackIncrease {
                increase_by: Ustx::MAX,
                auth,
            },
        ),
        Err(Error::InvalidAmount)
    );
}

#[test]
fn stack_increase_moves_signer() {
    let rng = &mut StdRng::seed_from_u64(0xff05);
    let (mut state, accounts) = instantiate(rng, 2);
    let (alice, carol) = (&accounts[0], &accounts[1]);
    let addr = pox_addr(1);

    state
        .stack_stx(&alice.principal, stack_stx(alice, 10_000, &addr, 300, 3, 1))
        .expect("Stacking should succeed");
    state.clock_mut().set_burn_height(350);

    // carol signs for the raised cycles of alice's lock
    let auth =
        signed_auth(carol, &addr, 3, Topic::StackIncrease, 3, 15_000, 1);
    let entry = state
        .stack_increase(
            &alice.principal,
            StackIncrease {
                increase_by: 5_000,
                auth,
            },
        )
        .expect("Increasing should succeed");

    assert_eq!(entry.signer_key, Some(carol.signer_key));
    assert_eq!(state.get_reward_set(3)[0].signer_key, alice.signer_key);
    for cycle in 4..6 {
        let slot = &state.get_reward_set(cycle)[0];
        assert_eq!(slot.signer_key, carol.signer_key);
        assert_eq!(slot.total_ustx, 15_000);
    }

    // the key backs alice's slots until her lock ends
    assert_eq!(
        state.stack_stx(
            &carol.principal,
            stack_stx(carol, 10_000, &addr, 400, 1, 2)
        ),
        Err(Error::ReusedSignerKey)
    );

    state.clock_mut().set_burn_height(600);
    assert_eq!(state.process_unlocks(), vec![alice.principal]);
    state
        .stack_stx(&carol.principal, stack_stx(carol, 10_000, &addr, 700, 1, 3))
        .expect("Stacking with a released signer key should succeed");
}

#[test]
fn locks_elapse() {
    let rng = &mut StdRng::seed_from_u64(0xff03);
    let (mut state, accounts) = instantiate(rng, 2);
    let (alice, bob) = (&accounts[0], &accounts[1]);
    let addr = pox_addr(1);

    let increase = StackIncrease {
        increase_by: 1_000,
        auth: signed_auth(alice, &addr, 2, Topic::StackIncrease, 2, 11_000, 9),
    };
    assert_eq!(
        state.stack_increase(&alice.principal, increase.clone()),
        Err(Error::NotCurrentStacker)
    );

    state
        .stack_stx(&alice.principal, stack_stx(alice, 10_000, &addr, 300, 2, 1))
        .expect("Stacking should succeed");

    // still locked during the last cycle
    state.clock_mut().set_burn_height(499);
    assert!(state.process_unlocks().is_empty());
    assert_stacker(&state, &alice.principal, 10_000, 3, 2);

    state.clock_mut().set_burn_height(500);
    assert_not_stacked(&state, &alice.principal);

    let auth = signed_auth(alice, &addr, 5, Topic::StackExtend, 1, 10_000, 2);
    let extend = StackExtend {
        extend_count: 1,
        pox_addr: addr.clone(),
        auth,
    };
    assert_eq!(
        state.stack_extend(&alice.principal, extend),
        Err(Error::StackExtendNotLocked)
    );
    assert_eq!(
        state.stack_increase(&alice.principal, increase),
        Err(Error::StackIncreaseNotLocked)
    );

    assert_eq!(state.process_unlocks(), vec![alice.principal]);
    assert_balance(&state, &alice.principal, GENESIS_VALUE, 0);
    assert!(state.process_unlocks().is_empty());

    let events = state.drain_events();
    assert_event(&events, "unlock", |event| {
        matches!(
            event,
            PoxEvent::Unlock { stacker, amount }
                if *stacker == alice.principal && *amount == 10_000
        )
    });

    // the signer key binding ended with the lock
    state
        .stack_stx(&bob.principal, stack_stx(alice, 10_000, &addr, 500, 1, 3))
        .expect("Stacking with a released signer key should succeed");
}

#[test]
fn elapsed_lock_does_not_block_stacking() {
    let rng = &mut StdRng::seed_from_u64(0xff04);
    let (mut state, accounts) = instantiate(rng, 1);
    let alice = &accounts[0];
    let addr = pox_addr(1);

    state
        .stack_stx(&alice.principal, stack_stx(alice, 10_000, &addr, 300, 2, 1))
        .expect("Stacking should succeed");

    state.clock_mut().set_burn_height(510);

    // the whole balance is only available once the old lock is released
    state
        .stack_stx(
            &alice.principal,
            stack_stx(alice, GENESIS_VALUE, &addr, 510, 1, 2),
        )
        .expect("Stacking again should succeed");

    assert_stacker(&state, &alice.principal, GENESIS_VALUE, 5, 1);
    assert_balance(&state, &alice.principal, 0, GENESIS_VALUE);
}

#[test]
fn registered_authorization_is_single_use() {
    let rng = &mut StdRng::seed_from_u64(0xff05);
    let (mut state, accounts) = instantiate(rng, 3);
    let (alice, bob, signer) = (&accounts[0], &accounts[1], &accounts[2]);
    let addr = pox_addr(1);

    let auth = SignerAuthorization::new(
        signer.signer_key,
        addr.clone(),
        3,
        Topic::StackStx,
        2,
        10_000,
        9,
    );

    assert_eq!(
        state.set_signer_key_authorization(&alice.principal, &auth, true),
        Err(Error::NotAllowed)
    );

    let mut past = auth.clone();
    past.reward_cycle = 1;
    assert_eq!(
        state.set_signer_key_authorization(&signer.principal, &past, true),
        Err(Error::InvalidRewardCycle)
    );

    state
        .set_signer_key_authorization(&signer.principal, &auth, true)
        .expect("Registering should succeed");
    assert!(state.get_signer_key_authorization(&auth));

    let call = |auth: &SignerAuthorization| StackStx {
        amount: 10_000,
        pox_addr: addr.clone(),
        start_burn_height: 300,
        lock_period: 2,
        auth: auth.clone(),
    };

    state
        .stack_stx(&alice.principal, call(&auth))
        .expect("Stacking with a registered authorization should succeed");
    assert!(state.is_signer_auth_used(
        &signer.signer_key,
        9,
        Topic::StackStx,
        3
    ));

    // registering again does not reset the consumption
    state
        .set_signer_key_authorization(&signer.principal, &auth, true)
        .expect("Registering should succeed");
    assert!(state.is_signer_auth_used(
        &signer.signer_key,
        9,
        Topic::StackStx,
        3
    ));

    state
        .set_signer_key_authorization(&signer.principal, &auth, false)
        .expect("Disabling should succeed");
    assert!(!state.get_signer_key_authorization(&auth));

    // the signer now backs alice's reward slots
    assert_eq!(
        state.stack_stx(&bob.principal, call(&auth)),
        Err(Error::ReusedSignerKey)
    );
}

#[test]
fn pox_info() {
    let rng = &mut StdRng::seed_from_u64(0xff06);
    let (mut state, accounts) = instantiate(rng, 1);
    let alice = &accounts[0];

    state
        .stack_stx(
            &alice.principal,
            stack_stx(alice, 10_000, &pox_addr(1), 300, 2, 1),
        )
        .expect("Stacking should succeed");

    let info = state.get_pox_info().expect("Getting pox info should succeed");
    assert_eq!(info.current_burn_height, 250);
    assert_eq!(info.current_cycle.id, 2);
    assert_eq!(info.current_cycle.stacked_ustx, 0);
    assert_eq!(info.next_cycle.id, 3);
    assert_eq!(info.next_cycle.stacked_ustx, 10_000);
    assert_eq!(info.next_cycle.reward_slots, 1);
    assert_eq!(info.next_cycle.min_threshold_ustx, MIN_AMOUNT);
    assert_eq!(info.blocks_until_next_cycle, 50);
    assert!(!info.in_prepare_phase);
    assert_eq!(state.get_stacking_minimum(), MIN_AMOUNT);

    state.clock_mut().set_burn_height(295);
    let info = state.get_pox_info().expect("Getting pox info should succeed");
    assert!(info.in_prepare_phase);

    let json = serde_json::to_string(&state.drain_events())
        .expect("Events should serialize to json");
    assert!(json.contains("\"name\":\"stack-stx\""));
    assert!(json.contains("\"amount\":\"10000\""));
}

#[test]
fn events_carry_principals() {
    let rng = &mut StdRng::seed_from_u64(0xff07);
    let (mut state, accounts) = instantiate(rng, 1);
    let alice = &accounts[0];

    state
        .stack_stx(
            &alice.principal,
            stack_stx(alice, 10_000, &pox_addr(1), 300, 2, 1),
        )
        .expect("Stacking should succeed");

    let events = state.drain_events();
    assert_event(&events, "stack-stx", |event| {
        matches!(
            event,
            PoxEvent::StackStx {
                stacker,
                amount,
                first_reward_cycle: 3,
                lock_period: 2,
            } if *stacker == alice.principal && *amount == 10_000
        )
    });
    assert_eq!(events.len(), 1);
}
