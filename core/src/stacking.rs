// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Types used by the stacking and delegation entry points.

use bytecheck::CheckBytes;
use rkyv::{Archive, Deserialize, Serialize};

use crate::{
    BurnHeight, PoxAddress, PoxConstants, Principal, RewardCycle,
    SignerAuthorization, SignerKey, Ustx,
};

/// The representation of a principal's locked STX.
///
/// The lock covers `lock_period` reward cycles starting at
/// `first_reward_cycle` and is released once the chain reaches the first
/// burn height of the cycle after the last one.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackingEntry {
    /// Owner of the locked funds.
    pub stacker: Principal,
    /// Amount locked.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub locked_amount: Ustx,
    /// First reward cycle the lock participates in.
    pub first_reward_cycle: RewardCycle,
    /// Number of cycles locked.
    pub lock_period: u64,
    /// Reward address.
    pub pox_addr: PoxAddress,
    /// Authorization id used for the latest signed action, if any.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<Option<serde_with::DisplayFromStr>>")
    )]
    pub auth_id: Option<u128>,
    /// Signer key backing the reward slots, for direct stacks.
    pub signer_key: Option<SignerKey>,
    /// Delegate that locked the funds, for delegated stacks.
    pub delegated_to: Option<Principal>,
    /// Reward set index of each locked cycle, for direct stacks.
    pub reward_set_indexes: Vec<u32>,
}

impl StackingEntry {
    /// The cycle following the last locked cycle.
    #[must_use]
    pub const fn unlock_cycle(&self) -> RewardCycle {
        self.first_reward_cycle + self.lock_period
    }

    /// The burn height at which the funds unlock.
    #[must_use]
    pub const fn unlock_height(&self, consts: &PoxConstants) -> BurnHeight {
        consts.reward_cycle_to_burn_height(self.unlock_cycle())
    }

    /// Whether the funds are still locked at `burn_height`.
    #[must_use]
    pub const fn is_locked_at(
        &self,
        consts: &PoxConstants,
        burn_height: BurnHeight,
    ) -> bool {
        burn_height < self.unlock_height(consts)
    }

    /// Whether the entry was created through a delegate.
    #[must_use]
    pub const fn is_delegated(&self) -> bool {
        self.delegated_to.is_some()
    }
}

/// A principal's permission for a delegate to stack on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelegationEntry {
    /// Owner of the funds.
    pub delegator: Principal,
    /// Operator allowed to lock the funds.
    pub delegated_to: Principal,
    /// Largest amount the operator may lock.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub amount_ustx: Ustx,
    /// Burn height at which the delegation lapses.
    pub until_burn_height: Option<BurnHeight>,
    /// Reward address the operator must use, if pinned.
    pub pox_addr: Option<PoxAddress>,
}

impl DelegationEntry {
    /// Whether the delegation is in force at `burn_height`.
    #[must_use]
    pub fn is_active_at(&self, burn_height: BurnHeight) -> bool {
        self.until_burn_height
            .map_or(true, |until| burn_height < until)
    }
}

/// One slot of a reward cycle's reward set.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardSetEntry {
    /// Reward address of the slot.
    pub pox_addr: PoxAddress,
    /// STX backing the slot.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub total_ustx: Ustx,
    /// Solo stacker owning the slot, `None` for aggregated delegations.
    pub stacker: Option<Principal>,
    /// Signer backing the slot.
    pub signer_key: SignerKey,
}

/// Arguments of `stack-stx`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackStx {
    /// Amount to lock.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub amount: Ustx,
    /// Reward address.
    pub pox_addr: PoxAddress,
    /// Burn height whose reward cycle is the first one locked.
    pub start_burn_height: BurnHeight,
    /// Number of cycles to lock.
    pub lock_period: u64,
    /// Signer authorization for the stack.
    pub auth: SignerAuthorization,
}

/// Arguments of `stack-extend`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackExtend {
    /// Number of cycles to add.
    pub extend_count: u64,
    /// Reward address for the added cycles.
    pub pox_addr: PoxAddress,
    /// Signer authorization for the extension.
    pub auth: SignerAuthorization,
}

/// Arguments of `stack-increase`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackIncrease {
    /// Amount to add to the lock.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub increase_by: Ustx,
    /// Signer authorization for the increase.
    pub auth: SignerAuthorization,
}

/// Arguments of `delegate-stx`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelegateStx {
    /// Largest amount the delegate may lock.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub amount: Ustx,
    /// The delegate.
    pub delegate_to: Principal,
    /// Burn height at which the delegation lapses.
    pub until_burn_height: Option<BurnHeight>,
    /// Reward address the delegate must use, if pinned.
    pub pox_addr: Option<PoxAddress>,
}

/// Arguments of `delegate-stack-stx`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelegateStackStx {
    /// Principal whose funds are locked.
    pub stacker: Principal,
    /// Amount to lock.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub amount: Ustx,
    /// Reward address.
    pub pox_addr: PoxAddress,
    /// Burn height whose reward cycle is the first one locked.
    pub start_burn_height: BurnHeight,
    /// Number of cycles to lock.
    pub lock_period: u64,
}

/// Arguments of `delegate-stack-extend`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelegateStackExtend {
    /// Principal whose lock is extended.
    pub stacker: Principal,
    /// Reward address for the added cycles.
    pub pox_addr: PoxAddress,
    /// Number of cycles to add.
    pub extend_count: u64,
}

/// Arguments of `delegate-stack-increase`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelegateStackIncrease {
    /// Principal whose lock is increased.
    pub stacker: Principal,
    /// Reward address of the lock.
    pub pox_addr: PoxAddress,
    /// Amount to add to the lock.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub increase_by: Ustx,
}

/// Arguments of `stack-aggregation-commit`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregationCommit {
    /// Reward address the delegated stacks were locked for.
    pub pox_addr: PoxAddress,
    /// Reward cycle to commit.
    pub reward_cycle: RewardCycle,
    /// Signer authorization for the commit.
    pub auth: SignerAuthorization,
}

/// Arguments of `stack-aggregation-increase`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregationIncrease {
    /// Reward address the delegated stacks were locked for.
    pub pox_addr: PoxAddress,
    /// Reward cycle of the slot.
    pub reward_cycle: RewardCycle,
    /// Index of the slot in the reward set.
    pub reward_index: u32,
    /// Signer authorization for the increase.
    pub auth: SignerAuthorization,
}

/// Summary of one reward cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleInfo {
    /// Cycle index.
    pub id: RewardCycle,
    /// Minimum amount a reward slot needs.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub min_threshold_ustx: Ustx,
    /// STX stacked in the cycle's reward set.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub stacked_ustx: Ustx,
    /// Number of reward slots.
    pub reward_slots: u32,
}

/// Read-only snapshot of the protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoxInfo {
    /// Protocol constants.
    pub constants: PoxConstants,
    /// Current burn chain height.
    pub current_burn_height: BurnHeight,
    /// Whether the current height is in a prepare phase.
    pub in_prepare_phase: bool,
    /// Blocks until the next cycle starts.
    pub blocks_until_next_cycle: u64,
    /// The current cycle.
    pub current_cycle: CycleInfo,
    /// The next cycle.
    pub next_cycle: CycleInfo,
}

/// Event emitted by every successful state transition.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "name", rename_all = "kebab-case")
)]
pub enum PoxEvent {
    /// Funds locked by a solo stacker.
    StackStx {
        /// The stacker.
        stacker: Principal,
        /// Amount locked.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        amount: Ustx,
        /// First locked cycle.
        first_reward_cycle: RewardCycle,
        /// Number of locked cycles.
        lock_period: u64,
    },
    /// Lock extended by a solo stacker.
    StackExtend {
        /// The stacker.
        stacker: Principal,
        /// New number of locked cycles.
        lock_period: u64,
    },
    /// Lock increased by a solo stacker.
    StackIncrease {
        /// The stacker.
        stacker: Principal,
        /// New locked total.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        total_locked: Ustx,
    },
    /// Delegation granted.
    DelegateStx {
        /// The delegator.
        delegator: Principal,
        /// The delegate.
        delegated_to: Principal,
        /// Delegated amount.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        amount: Ustx,
    },
    /// Delegation revoked.
    RevokeDelegateStx {
        /// The delegator.
        delegator: Principal,
        /// The former delegate.
        delegated_to: Principal,
    },
    /// Funds locked by a delegate.
    DelegateStackStx {
        /// The delegate.
        delegate: Principal,
        /// The stacker.
        stacker: Principal,
        /// Amount locked.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        amount: Ustx,
        /// First locked cycle.
        first_reward_cycle: RewardCycle,
        /// Number of locked cycles.
        lock_period: u64,
    },
    /// Lock extended by a delegate.
    DelegateStackExtend {
        /// The delegate.
        delegate: Principal,
        /// The stacker.
        stacker: Principal,
        /// New number of locked cycles.
        lock_period: u64,
    },
    /// Lock increased by a delegate.
    DelegateStackIncrease {
        /// The delegate.
        delegate: Principal,
        /// The stacker.
        stacker: Principal,
        /// New locked total.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        total_locked: Ustx,
    },
    /// Delegated stacks committed into a reward slot.
    AggregationCommit {
        /// The delegate.
        delegate: Principal,
        /// Committed cycle.
        reward_cycle: RewardCycle,
        /// Slot index.
        reward_index: u32,
        /// Committed amount.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        amount: Ustx,
    },
    /// Committed reward slot increased.
    AggregationIncrease {
        /// The delegate.
        delegate: Principal,
        /// Committed cycle.
        reward_cycle: RewardCycle,
        /// Slot index.
        reward_index: u32,
        /// New slot total.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        total_ustx: Ustx,
    },
    /// Signer pre-authorization changed.
    SetSignerKeyAuthorization {
        /// The signer.
        signer_key: SignerKey,
        /// Authorization id.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        auth_id: u128,
        /// Whether the authorization is now enabled.
        allowed: bool,
    },
    /// Funds released after the lock elapsed.
    Unlock {
        /// The stacker.
        stacker: Principal,
        /// Amount released.
        #[cfg_attr(
            feature = "serde",
            serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
        )]
        amount: Ustx,
    },
}
