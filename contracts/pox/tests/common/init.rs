// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use pox_contract::host::{ManualClock, MemoryBalances};
use pox_contract::MemoryPoxState;
use pox_core::keys::SigningKey;
use pox_core::{
    PoxConstants, Principal, SignerKey, Ustx, CHAIN_ID_TESTNET,
    MAX_POX_REWARD_CYCLES,
};
use rand::{CryptoRng, RngCore};

pub const CHAIN_ID: u32 = CHAIN_ID_TESTNET;
pub const REWARD_CYCLE_LENGTH: u64 = 100;
pub const PREPARE_CYCLE_LENGTH: u64 = 10;

/// Burn height the chain starts at, in the middle of cycle 2.
pub const GENESIS_HEIGHT: u64 = 250;
pub const GENESIS_VALUE: Ustx = 1_000_000;
pub const MIN_AMOUNT: Ustx = 1_000;

/// A funded account, also usable as a signer.
pub struct Account {
    pub sk: SigningKey,
    pub signer_key: SignerKey,
    pub principal: Principal,
}

impl Account {
    pub fn random<Rng: RngCore + CryptoRng>(rng: &mut Rng) -> Self {
        let sk = SigningKey::random(rng);
        let signer_key = SignerKey::from(&sk);
        let principal = Principal::from_public_key(&signer_key);
        Self {
            sk,
            signer_key,
            principal,
        }
    }
}

pub fn constants() -> PoxConstants {
    PoxConstants::new(
        0,
        REWARD_CYCLE_LENGTH,
        PREPARE_CYCLE_LENGTH,
        MAX_POX_REWARD_CYCLES,
        CHAIN_ID,
    )
    .expect("Test constants should be valid")
}

/// Instantiate the state at [`GENESIS_HEIGHT`] with `n` accounts, each
/// holding [`GENESIS_VALUE`].
pub fn instantiate<Rng: RngCore + CryptoRng>(
    rng: &mut Rng,
    n: usize,
) -> (MemoryPoxState, Vec<Account>) {
    let accounts: Vec<Account> = (0..n).map(|_| Account::random(rng)).collect();

    let mut balances = MemoryBalances::new();
    for account in &accounts {
        balances.deposit(account.principal, GENESIS_VALUE);
    }

    let clock = ManualClock::new(GENESIS_HEIGHT, MIN_AMOUNT);
    let state = MemoryPoxState::new(constants(), balances, clock);

    (state, accounts)
}
