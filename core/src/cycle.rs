// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Reward cycle arithmetic.

use bytecheck::CheckBytes;
use rkyv::{Archive, Deserialize, Serialize};

use crate::Error;

/// Burn chain height type alias
pub type BurnHeight = u64;

/// Reward cycle index type alias
pub type RewardCycle = u64;

/// Maximum number of cycles a stacker can lock for.
pub const MAX_POX_REWARD_CYCLES: u8 = 12;

/// Chain id of test networks.
pub const CHAIN_ID_TESTNET: u32 = 0x8000_0000;

/// Compute the reward cycle containing `burn_height`.
///
/// # Errors
/// [`Error::InvalidHeight`] if `burn_height` precedes
/// `first_burnchain_block_height`, [`Error::InvalidConstants`] if
/// `reward_cycle_length` is zero.
pub const fn cycle_of(
    burn_height: BurnHeight,
    first_burnchain_block_height: BurnHeight,
    reward_cycle_length: u64,
) -> Result<RewardCycle, Error> {
    if reward_cycle_length == 0 {
        return Err(Error::InvalidConstants);
    }
    if burn_height < first_burnchain_block_height {
        return Err(Error::InvalidHeight);
    }
    Ok((burn_height - first_burnchain_block_height) / reward_cycle_length)
}

/// Protocol-wide timing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoxConstants {
    first_burnchain_block_height: BurnHeight,
    reward_cycle_length: u64,
    prepare_cycle_length: u64,
    max_lock_period: u8,
    chain_id: u32,
}

impl Default for PoxConstants {
    fn default() -> Self {
        Self {
            first_burnchain_block_height: 0,
            reward_cycle_length: 20,
            prepare_cycle_length: 5,
            max_lock_period: MAX_POX_REWARD_CYCLES,
            chain_id: CHAIN_ID_TESTNET,
        }
    }
}

impl PoxConstants {
    /// Create a validated set of constants.
    ///
    /// # Errors
    /// [`Error::InvalidConstants`] if the cycle length is zero, the prepare
    /// phase is longer than a cycle or the maximum lock period is zero.
    pub const fn new(
        first_burnchain_block_height: BurnHeight,
        reward_cycle_length: u64,
        prepare_cycle_length: u64,
        max_lock_period: u8,
        chain_id: u32,
    ) -> Result<Self, Error> {
        if reward_cycle_length == 0
            || prepare_cycle_length > reward_cycle_length
            || max_lock_period == 0
        {
            return Err(Error::InvalidConstants);
        }
        Ok(Self {
            first_burnchain_block_height,
            reward_cycle_length,
            prepare_cycle_length,
            max_lock_period,
            chain_id,
        })
    }

    /// Height of the first burnchain block considered by PoX.
    #[must_use]
    pub const fn first_burnchain_block_height(&self) -> BurnHeight {
        self.first_burnchain_block_height
    }

    /// Number of burn blocks in a reward cycle.
    #[must_use]
    pub const fn reward_cycle_length(&self) -> u64 {
        self.reward_cycle_length
    }

    /// Number of burn blocks in the prepare phase closing each cycle.
    #[must_use]
    pub const fn prepare_cycle_length(&self) -> u64 {
        self.prepare_cycle_length
    }

    /// Maximum number of cycles a lock may span.
    #[must_use]
    pub const fn max_lock_period(&self) -> u8 {
        self.max_lock_period
    }

    /// Chain id mixed into signer authorization digests.
    #[must_use]
    pub const fn chain_id(&self) -> u32 {
        self.chain_id
    }

    /// Whether `lock_period` is an acceptable number of cycles.
    #[must_use]
    pub const fn is_valid_lock_period(&self, lock_period: u64) -> bool {
        lock_period >= 1 && lock_period <= self.max_lock_period as u64
    }

    /// The reward cycle containing `burn_height`.
    ///
    /// # Errors
    /// See [`cycle_of`].
    pub const fn block_height_to_reward_cycle(
        &self,
        burn_height: BurnHeight,
    ) -> Result<RewardCycle, Error> {
        cycle_of(
            burn_height,
            self.first_burnchain_block_height,
            self.reward_cycle_length,
        )
    }

    /// The first burn height of `cycle`.
    #[must_use]
    pub const fn reward_cycle_to_burn_height(
        &self,
        cycle: RewardCycle,
    ) -> BurnHeight {
        self.first_burnchain_block_height + cycle * self.reward_cycle_length
    }

    /// The first burn height of the prepare phase that selects the reward
    /// set of `cycle + 1`.
    #[must_use]
    pub const fn prepare_phase_start(&self, cycle: RewardCycle) -> BurnHeight {
        self.reward_cycle_to_burn_height(cycle + 1) - self.prepare_cycle_length
    }

    /// Whether `burn_height` falls in the prepare phase of its cycle.
    #[must_use]
    pub const fn is_in_prepare_phase(&self, burn_height: BurnHeight) -> bool {
        match self.block_height_to_reward_cycle(burn_height) {
            Ok(cycle) => burn_height >= self.prepare_phase_start(cycle),
            Err(_) => false,
        }
    }

    /// Number of burn blocks until the next reward cycle starts.
    #[must_use]
    pub const fn blocks_until_next_cycle(
        &self,
        burn_height: BurnHeight,
    ) -> u64 {
        match self.block_height_to_reward_cycle(burn_height) {
            Ok(cycle) => {
                self.reward_cycle_to_burn_height(cycle + 1) - burn_height
            }
            Err(_) => self.first_burnchain_block_height - burn_height,
        }
    }
}
