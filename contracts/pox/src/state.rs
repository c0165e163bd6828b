// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use std::mem;

use pox_core::stacking::{
    AggregationCommit, AggregationIncrease, CycleInfo, DelegateStackExtend,
    DelegateStackIncrease, DelegateStackStx, DelegateStx, DelegationEntry,
    PoxEvent, PoxInfo, RewardSetEntry, StackExtend, StackIncrease, StackStx,
    StackingEntry,
};
use pox_core::{
    BurnHeight, Error, PoxAddress, PoxConstants, Principal, RewardCycle,
    SignerAuthorization, SignerKey, Topic, Ustx,
};
use tracing::{debug, warn};

use crate::auth::{Authorizations, Expected};
use crate::delegation::Delegations;
use crate::host::{Balances, ChainClock};
use crate::ledger::Ledger;

/// State machine keeping track of stacked and delegated STX.
///
/// A principal may lock STX for a number of reward cycles, either directly
/// with the authorization of a signer, or through a delegate it allowed to
/// do so. Delegates aggregate the STX locked on behalf of their delegators
/// and commit them into the reward set once they reach the stacking
/// minimum.
///
/// Every entry point validates all of its preconditions before touching any
/// state, so a failed call leaves the state unchanged.
#[derive(Debug, Clone)]
pub struct PoxState<B, C> {
    consts: PoxConstants,
    balances: B,
    clock: C,
    ledger: Ledger,
    delegations: Delegations,
    auths: Authorizations,
    events: Vec<PoxEvent>,
}

fn log_outcome<T>(
    operation: &str,
    caller: &Principal,
    result: &Result<T, Error>,
) {
    match result {
        Ok(_) => debug!(operation, %caller, "accepted"),
        Err(err) => {
            warn!(operation, %caller, code = err.code(), "rejected: {err}");
        }
    }
}

impl<B, C> PoxState<B, C>
where
    B: Balances,
    C: ChainClock,
{
    /// Create an empty state.
    pub fn new(consts: PoxConstants, balances: B, clock: C) -> Self {
        Self {
            consts,
            balances,
            clock,
            ledger: Ledger::new(),
            delegations: Delegations::new(),
            auths: Authorizations::new(consts.chain_id()),
            events: Vec::new(),
        }
    }

    /// Protocol constants.
    pub const fn constants(&self) -> &PoxConstants {
        &self.consts
    }

    /// Host balances.
    pub const fn balances(&self) -> &B {
        &self.balances
    }

    /// Mutable access to the host balances.
    pub fn balances_mut(&mut self) -> &mut B {
        &mut self.balances
    }

    /// Host clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable access to the host clock.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Lock `amount` STX of `caller` for `lock_period` cycles, starting with
    /// the cycle of `start_burn_height`.
    ///
    /// # Errors
    /// The first failing check, in order: [`Error::AlreadyStacked`],
    /// [`Error::AlreadyDelegated`], [`Error::InvalidStartBurnHeight`],
    /// [`Error::InvalidAmount`], [`Error::InvalidLockPeriod`],
    /// [`Error::InvalidPoxAddress`], [`Error::ThresholdNotMet`],
    /// [`Error::NoSuchPrincipal`], [`Error::InsufficientFunds`], signer key
    /// errors and authorization errors.
    pub fn stack_stx(
        &mut self,
        caller: &Principal,
        stack: StackStx,
    ) -> Result<StackingEntry, Error> {
        let result = self.try_stack_stx(caller, stack);
        log_outcome("stack-stx", caller, &result);
        result
    }

    fn try_stack_stx(
        &mut self,
        caller: &Principal,
        stack: StackStx,
    ) -> Result<StackingEntry, Error> {
        let burn_height = self.burn_height();

        if self.active_entry(caller).is_some() {
            return Err(Error::AlreadyStacked);
        }
        if self.delegations.active(caller, burn_height).is_some() {
            return Err(Error::AlreadyDelegated);
        }

        let first_reward_cycle = self.start_cycle(stack.start_burn_height)?;
        if stack.amount == 0 {
            return Err(Error::InvalidAmount);
        }
        if !self.consts.is_valid_lock_period(stack.lock_period) {
            return Err(Error::InvalidLockPeriod);
        }
        stack.pox_addr.validate()?;
        if stack.amount < self.clock.min_amount_ustx() {
            return Err(Error::ThresholdNotMet);
        }
        self.check_funds(caller, stack.amount)?;

        let current_cycle = self.current_cycle()?;
        let signer_key = stack.auth.signer_key;
        self.ledger
            .check_signer_key(&signer_key, caller, current_cycle)?;
        self.auths.check(
            &stack.auth,
            Expected {
                topic: Topic::StackStx,
                reward_cycle: first_reward_cycle,
                period: stack.lock_period,
                pox_addr: &stack.pox_addr,
            },
            stack.amount,
        )?;

        self.release_expired(caller);
        self.balances.lock(caller, stack.amount)?;
        self.auths.consume(&stack.auth);

        let unlock_cycle = first_reward_cycle + stack.lock_period;
        let reward_set_indexes = self.ledger.push_stacker_slots(
            first_reward_cycle..unlock_cycle,
            *caller,
            &stack.pox_addr,
            stack.amount,
            signer_key,
        );
        self.ledger
            .bind_signer_key(signer_key, *caller, unlock_cycle);

        let entry = StackingEntry {
            stacker: *caller,
            locked_amount: stack.amount,
            first_reward_cycle,
            lock_period: stack.lock_period,
            pox_addr: stack.pox_addr,
            auth_id: Some(stack.auth.auth_id),
            signer_key: Some(signer_key),
            delegated_to: None,
            reward_set_indexes,
        };
        self.ledger.insert(entry.clone());

        self.events.push(PoxEvent::StackStx {
            stacker: *caller,
            amount: entry.locked_amount,
            first_reward_cycle,
            lock_period: entry.lock_period,
        });

        Ok(entry)
    }

    /// Extend the lock of `caller` by `extend_count` cycles.
    ///
    /// # Errors
    /// [`Error::NotCurrentStacker`], [`Error::StackExtendNotLocked`],
    /// [`Error::StackingIsDelegated`], [`Error::InvalidLockPeriod`],
    /// [`Error::InvalidPoxAddress`], signer key errors and authorization
    /// errors.
    pub fn stack_extend(
        &mut self,
        caller: &Principal,
        extend: StackExtend,
    ) -> Result<StackingEntry, Error> {
        let result = self.try_stack_extend(caller, extend);
        log_outcome("stack-extend", caller, &result);
        result
    }

    fn try_stack_extend(
        &mut self,
        caller: &Principal,
        extend: StackExtend,
    ) -> Result<StackingEntry, Error> {
        let burn_height = self.burn_height();
        let current_cycle = self.current_cycle()?;

        let entry = self.ledger.get(caller).ok_or(Error::NotCurrentStacker)?;
        if !entry.is_locked_at(&self.consts, burn_height) {
            return Err(Error::StackExtendNotLocked);
        }
        if entry.is_delegated() {
            return Err(Error::StackingIsDelegated);
        }
        let new_unlock_cycle = self.extended_unlock_cycle(
            entry,
            current_cycle,
            extend.extend_count,
        )?;
        extend.pox_addr.validate()?;

        let signer_key = extend.auth.signer_key;
        self.ledger
            .check_signer_key(&signer_key, caller, current_cycle)?;
        self.auths.check(
            &extend.auth,
            Expected {
                topic: Topic::StackExtend,
                reward_cycle: current_cycle,
                period: extend.extend_count,
                pox_addr: &extend.pox_addr,
            },
            entry.locked_amount,
        )?;

        let mut entry =
            self.ledger.remove(caller).ok_or(Error::NotCurrentStacker)?;
        self.auths.consume(&extend.auth);

        let indexes = self.ledger.push_stacker_slots(
            entry.unlock_cycle()..new_unlock_cycle,
            *caller,
            &extend.pox_addr,
            entry.locked_amount,
            signer_key,
        );
        self.ledger
            .bind_signer_key(signer_key, *caller, new_unlock_cycle);

        entry.lock_period = new_unlock_cycle - entry.first_reward_cycle;
        entry.pox_addr = extend.pox_addr;
        entry.auth_id = Some(extend.auth.auth_id);
        entry.signer_key = Some(signer_key);
        entry.reward_set_indexes.extend(indexes);
        self.ledger.insert(entry.clone());

        self.events.push(PoxEvent::StackExtend {
            stacker: *caller,
            lock_period: entry.lock_period,
        });

        Ok(entry)
    }

    /// Lock `increase_by` more STX of `caller` for the remaining cycles of
    /// its lock. The authorizing signer backs the raised slots.
    ///
    /// # Errors
    /// [`Error::NotCurrentStacker`], [`Error::StackIncreaseNotLocked`],
    /// [`Error::StackingIsDelegated`], [`Error::InvalidAmount`],
    /// [`Error::NoSuchPrincipal`], [`Error::InsufficientFunds`], signer key
    /// errors and authorization errors.
    pub fn stack_increase(
        &mut self,
        caller: &Principal,
        increase: StackIncrease,
    ) -> Result<StackingEntry, Error> {
        let result = self.try_stack_increase(caller, increase);
        log_outcome("stack-increase", caller, &result);
        result
    }

    fn try_stack_increase(
        &mut self,
        caller: &Principal,
        increase: StackIncrease,
    ) -> Result<StackingEntry, Error> {
        let burn_height = self.burn_height();
        let current_cycle = self.current_cycle()?;

        let entry = self.ledger.get(caller).ok_or(Error::NotCurrentStacker)?;
        if !entry.is_locked_at(&self.consts, burn_height) {
            return Err(Error::StackIncreaseNotLocked);
        }
        if entry.is_delegated() {
            return Err(Error::StackingIsDelegated);
        }
        if increase.increase_by == 0 {
            return Err(Error::InvalidAmount);
        }
        let new_total = entry
            .locked_amount
            .checked_add(increase.increase_by)
            .ok_or(Error::InvalidAmount)?;
        self.check_funds(caller, increase.increase_by)?;

        let signer_key = increase.auth.signer_key;
        self.ledger
            .check_signer_key(&signer_key, caller, current_cycle)?;
        self.auths.check(
            &increase.auth,
            Expected {
                topic: Topic::StackIncrease,
                reward_cycle: current_cycle,
                period: entry.lock_period,
                pox_addr: &entry.pox_addr,
            },
            new_total,
        )?;

        self.balances.lock(caller, increase.increase_by)?;
        let mut entry =
            self.ledger.remove(caller).ok_or(Error::NotCurrentStacker)?;
        self.auths.consume(&increase.auth);

        let cycles = entry.first_reward_cycle..entry.unlock_cycle();
        for (cycle, index) in cycles.zip(entry.reward_set_indexes.iter()) {
            if cycle > current_cycle {
                self.ledger
                    .increase_slot(cycle, *index, increase.increase_by);
                self.ledger.set_slot_signer(cycle, *index, signer_key);
            }
        }
        self.ledger.bind_signer_key(
            signer_key,
            *caller,
            entry.unlock_cycle(),
        );

        entry.locked_amount = new_total;
        entry.signer_key = Some(signer_key);
        entry.auth_id = Some(increase.auth.auth_id);
        self.ledger.insert(entry.clone());

        self.events.push(PoxEvent::StackIncrease {
            stacker: *caller,
            total_locked: new_total,
        });

        Ok(entry)
    }

    /// Allow `delegate_to` to lock up to `amount` STX of `caller`.
    ///
    /// # Errors
    /// [`Error::AlreadyDelegated`], [`Error::AlreadyStacked`],
    /// [`Error::InvalidAmount`], [`Error::InvalidPoxAddress`] and
    /// [`Error::DelegationExpiresDuringLock`] if the delegation would have
    /// already lapsed.
    pub fn delegate_stx(
        &mut self,
        caller: &Principal,
        delegate: DelegateStx,
    ) -> Result<(), Error> {
        let result = self.try_delegate_stx(caller, delegate);
        log_outcome("delegate-stx", caller, &result);
        result
    }

    fn try_delegate_stx(
        &mut self,
        caller: &Principal,
        delegate: DelegateStx,
    ) -> Result<(), Error> {
        let burn_height = self.burn_height();

        if self.delegations.active(caller, burn_height).is_some() {
            return Err(Error::AlreadyDelegated);
        }
        let stacked_directly = self
            .active_entry(caller)
            .is_some_and(|entry| !entry.is_delegated());
        if stacked_directly {
            return Err(Error::AlreadyStacked);
        }
        if delegate.amount == 0 {
            return Err(Error::InvalidAmount);
        }
        if let Some(pox_addr) = &delegate.pox_addr {
            pox_addr.validate()?;
        }
        let lapsed = delegate
            .until_burn_height
            .is_some_and(|until| until <= burn_height);
        if lapsed {
            return Err(Error::DelegationExpiresDuringLock);
        }

        self.events.push(PoxEvent::DelegateStx {
            delegator: *caller,
            delegated_to: delegate.delegate_to,
            amount: delegate.amount,
        });
        self.delegations.insert(DelegationEntry {
            delegator: *caller,
            delegated_to: delegate.delegate_to,
            amount_ustx: delegate.amount,
            until_burn_height: delegate.until_burn_height,
            pox_addr: delegate.pox_addr,
        });

        Ok(())
    }

    /// Revoke the delegation of `caller`. Funds already locked stay locked.
    ///
    /// # Errors
    /// [`Error::DelegationAlreadyRevoked`] if there is no delegation in
    /// force.
    pub fn revoke_delegate_stx(
        &mut self,
        caller: &Principal,
    ) -> Result<DelegationEntry, Error> {
        let burn_height = self.burn_height();
        let result = if self.delegations.active(caller, burn_height).is_some()
        {
            self.delegations
                .remove(caller)
                .ok_or(Error::DelegationAlreadyRevoked)
        } else {
            Err(Error::DelegationAlreadyRevoked)
        };

        if let Ok(entry) = &result {
            self.events.push(PoxEvent::RevokeDelegateStx {
                delegator: *caller,
                delegated_to: entry.delegated_to,
            });
        }

        log_outcome("revoke-delegate-stx", caller, &result);
        result
    }

    /// Lock STX of a delegator on its behalf.
    ///
    /// # Errors
    /// The first failing check, in order:
    /// [`Error::InvalidStartBurnHeight`], [`Error::InvalidAmount`],
    /// [`Error::InvalidLockPeriod`], [`Error::InvalidPoxAddress`],
    /// [`Error::NotDelegated`], [`Error::PermissionDenied`],
    /// [`Error::DelegationTooMuchLocked`],
    /// [`Error::DelegationPoxAddrRequired`],
    /// [`Error::DelegationExpiresDuringLock`], [`Error::AlreadyStacked`],
    /// [`Error::NoSuchPrincipal`] and [`Error::InsufficientFunds`].
    pub fn delegate_stack_stx(
        &mut self,
        caller: &Principal,
        stack: DelegateStackStx,
    ) -> Result<StackingEntry, Error> {
        let result = self.try_delegate_stack_stx(caller, stack);
        log_outcome("delegate-stack-stx", caller, &result);
        result
    }

    fn try_delegate_stack_stx(
        &mut self,
        caller: &Principal,
        stack: DelegateStackStx,
    ) -> Result<StackingEntry, Error> {
        let burn_height = self.burn_height();

        let first_reward_cycle = self.start_cycle(stack.start_burn_height)?;
        if stack.amount == 0 {
            return Err(Error::InvalidAmount);
        }
        if !self.consts.is_valid_lock_period(stack.lock_period) {
            return Err(Error::InvalidLockPeriod);
        }
        stack.pox_addr.validate()?;

        let unlock_cycle = first_reward_cycle + stack.lock_period;
        let delegation =
            self.delegations
                .authorized(&stack.stacker, caller, burn_height)?;
        self.check_delegation_bounds(
            delegation,
            stack.amount,
            &stack.pox_addr,
            unlock_cycle,
        )?;

        if self.active_entry(&stack.stacker).is_some() {
            return Err(Error::AlreadyStacked);
        }
        self.check_funds(&stack.stacker, stack.amount)?;

        self.release_expired(&stack.stacker);
        self.balances.lock(&stack.stacker, stack.amount)?;
        self.delegations.add_partial(
            &stack.pox_addr,
            first_reward_cycle..unlock_cycle,
            *caller,
            stack.amount,
        );

        let entry = StackingEntry {
            stacker: stack.stacker,
            locked_amount: stack.amount,
            first_reward_cycle,
            lock_period: stack.lock_period,
            pox_addr: stack.pox_addr,
            auth_id: None,
            signer_key: None,
            delegated_to: Some(*caller),
            reward_set_indexes: Vec::new(),
        };
        self.ledger.insert(entry.clone());

        self.events.push(PoxEvent::DelegateStackStx {
            delegate: *caller,
            stacker: stack.stacker,
            amount: stack.amount,
            first_reward_cycle,
            lock_period: stack.lock_period,
        });

        Ok(entry)
    }

    /// Extend the delegated lock of a delegator by `extend_count` cycles.
    ///
    /// # Errors
    /// [`Error::InvalidPoxAddress`], [`Error::NotCurrentStacker`],
    /// [`Error::StackExtendNotLocked`], [`Error::StackingNotDelegated`],
    /// delegation errors and [`Error::InvalidLockPeriod`].
    pub fn delegate_stack_extend(
        &mut self,
        caller: &Principal,
        extend: DelegateStackExtend,
    ) -> Result<StackingEntry, Error> {
        let result = self.try_delegate_stack_extend(caller, extend);
        log_outcome("delegate-stack-extend", caller, &result);
        result
    }

    fn try_delegate_stack_extend(
        &mut self,
        caller: &Principal,
        extend: DelegateStackExtend,
    ) -> Result<StackingEntry, Error> {
        let burn_height = self.burn_height();
        let current_cycle = self.current_cycle()?;

        extend.pox_addr.validate()?;
        let entry = self
            .ledger
            .get(&extend.stacker)
            .ok_or(Error::NotCurrentStacker)?;
        if !entry.is_locked_at(&self.consts, burn_height) {
            return Err(Error::StackExtendNotLocked);
        }
        if !entry.is_delegated() {
            return Err(Error::StackingNotDelegated);
        }

        let delegation =
            self.delegations
                .authorized(&extend.stacker, caller, burn_height)?;
        let new_unlock_cycle = self.extended_unlock_cycle(
            entry,
            current_cycle,
            extend.extend_count,
        )?;
        self.check_delegation_bounds(
            delegation,
            entry.locked_amount,
            &extend.pox_addr,
            new_unlock_cycle,
        )?;

        let mut entry = self
            .ledger
            .remove(&extend.stacker)
            .ok_or(Error::NotCurrentStacker)?;
        self.delegations.add_partial(
            &extend.pox_addr,
            entry.unlock_cycle()..new_unlock_cycle,
            *caller,
            entry.locked_amount,
        );

        entry.lock_period = new_unlock_cycle - entry.first_reward_cycle;
        entry.pox_addr = extend.pox_addr;
        entry.delegated_to = Some(*caller);
        self.ledger.insert(entry.clone());

        self.events.push(PoxEvent::DelegateStackExtend {
            delegate: *caller,
            stacker: extend.stacker,
            lock_period: entry.lock_period,
        });

        Ok(entry)
    }

    /// Lock `increase_by` more STX of a delegator on its behalf.
    ///
    /// # Errors
    /// [`Error::InvalidPoxAddress`], [`Error::NotCurrentStacker`],
    /// [`Error::StackIncreaseNotLocked`], [`Error::StackingNotDelegated`],
    /// delegation errors, [`Error::InvalidAmount`],
    /// [`Error::NoSuchPrincipal`] and [`Error::InsufficientFunds`].
    pub fn delegate_stack_increase(
        &mut self,
        caller: &Principal,
        increase: DelegateStackIncrease,
    ) -> Result<StackingEntry, Error> {
        let result = self.try_delegate_stack_increase(caller, increase);
        log_outcome("delegate-stack-increase", caller, &result);
        result
    }

    fn try_delegate_stack_increase(
        &mut self,
        caller: &Principal,
        increase: DelegateStackIncrease,
    ) -> Result<StackingEntry, Error> {
        let burn_height = self.burn_height();
        let current_cycle = self.current_cycle()?;

        increase.pox_addr.validate()?;
        let entry = self
            .ledger
            .get(&increase.stacker)
            .ok_or(Error::NotCurrentStacker)?;
        if !entry.is_locked_at(&self.consts, burn_height) {
            return Err(Error::StackIncreaseNotLocked);
        }
        if !entry.is_delegated() {
            return Err(Error::StackingNotDelegated);
        }

        let delegation = self.delegations.authorized(
            &increase.stacker,
            caller,
            burn_height,
        )?;
        if increase.increase_by == 0 {
            return Err(Error::InvalidAmount);
        }
        let new_total = entry
            .locked_amount
            .checked_add(increase.increase_by)
            .ok_or(Error::InvalidAmount)?;
        self.check_delegation_bounds(
            delegation,
            new_total,
            &increase.pox_addr,
            entry.unlock_cycle(),
        )?;
        if entry.pox_addr != increase.pox_addr {
            return Err(Error::InvalidPoxAddress);
        }
        self.check_funds(&increase.stacker, increase.increase_by)?;

        self.balances.lock(&increase.stacker, increase.increase_by)?;
        let mut entry = self
            .ledger
            .remove(&increase.stacker)
            .ok_or(Error::NotCurrentStacker)?;
        let from_cycle = entry.first_reward_cycle.max(current_cycle + 1);
        self.delegations.add_partial(
            &increase.pox_addr,
            from_cycle..entry.unlock_cycle(),
            *caller,
            increase.increase_by,
        );

        entry.locked_amount = new_total;
        self.ledger.insert(entry.clone());

        self.events.push(PoxEvent::DelegateStackIncrease {
            delegate: *caller,
            stacker: increase.stacker,
            total_locked: new_total,
        });

        Ok(entry)
    }

    /// Commit the STX `caller` locked on behalf of its delegators for
    /// `reward_cycle` into a reward slot, returning the slot index.
    ///
    /// # Errors
    /// [`Error::InvalidRewardCycle`], [`Error::InvalidPoxAddress`],
    /// [`Error::NoSuchPrincipal`] if nothing was locked,
    /// [`Error::ThresholdNotMet`], signer key errors and authorization
    /// errors.
    pub fn stack_aggregation_commit(
        &mut self,
        caller: &Principal,
        commit: AggregationCommit,
    ) -> Result<u32, Error> {
        let result = self.try_stack_aggregation_commit(caller, commit);
        log_outcome("stack-aggregation-commit", caller, &result);
        result
    }

    fn try_stack_aggregation_commit(
        &mut self,
        caller: &Principal,
        commit: AggregationCommit,
    ) -> Result<u32, Error> {
        let current_cycle = self.current_cycle()?;

        if commit.reward_cycle < current_cycle {
            return Err(Error::InvalidRewardCycle);
        }
        commit.pox_addr.validate()?;
        let partial = self
            .delegations
            .partial(&commit.pox_addr, commit.reward_cycle, caller)
            .ok_or(Error::NoSuchPrincipal)?;
        if partial < self.clock.min_amount_ustx() {
            return Err(Error::ThresholdNotMet);
        }

        let signer_key = commit.auth.signer_key;
        self.ledger
            .check_signer_key(&signer_key, caller, current_cycle)?;
        self.auths.check(
            &commit.auth,
            Expected {
                topic: Topic::AggCommit,
                reward_cycle: commit.reward_cycle,
                period: 1,
                pox_addr: &commit.pox_addr,
            },
            partial,
        )?;

        self.auths.consume(&commit.auth);
        self.delegations.take_partial(
            &commit.pox_addr,
            commit.reward_cycle,
            caller,
        );
        let reward_index = self.ledger.push_slot(
            commit.reward_cycle,
            RewardSetEntry {
                pox_addr: commit.pox_addr,
                total_ustx: partial,
                stacker: None,
                signer_key,
            },
        );
        self.delegations
            .record_commit(commit.reward_cycle, reward_index, *caller);
        self.ledger.bind_signer_key(
            signer_key,
            *caller,
            commit.reward_cycle.saturating_add(1),
        );

        self.events.push(PoxEvent::AggregationCommit {
            delegate: *caller,
            reward_cycle: commit.reward_cycle,
            reward_index,
            amount: partial,
        });

        Ok(reward_index)
    }

    /// Add the STX `caller` locked since its last commit to an already
    /// committed reward slot, returning the new slot total.
    ///
    /// # Errors
    /// [`Error::InvalidRewardCycle`], [`Error::InvalidPoxAddress`],
    /// [`Error::DelegationNoRewardSlot`],
    /// [`Error::DelegationWrongRewardSlot`], [`Error::NoSuchPrincipal`],
    /// signer key errors and authorization errors.
    pub fn stack_aggregation_increase(
        &mut self,
        caller: &Principal,
        increase: AggregationIncrease,
    ) -> Result<Ustx, Error> {
        let result = self.try_stack_aggregation_increase(caller, increase);
        log_outcome("stack-aggregation-increase", caller, &result);
        result
    }

    fn try_stack_aggregation_increase(
        &mut self,
        caller: &Principal,
        increase: AggregationIncrease,
    ) -> Result<Ustx, Error> {
        let current_cycle = self.current_cycle()?;
        let (cycle, index) = (increase.reward_cycle, increase.reward_index);

        if cycle < current_cycle {
            return Err(Error::InvalidRewardCycle);
        }
        increase.pox_addr.validate()?;

        let slot = self
            .ledger
            .reward_slot(cycle, index)
            .ok_or(Error::DelegationNoRewardSlot)?;
        if slot.pox_addr != increase.pox_addr
            || slot.stacker.is_some()
            || self.delegations.committed_by(cycle, index) != Some(caller)
        {
            return Err(Error::DelegationWrongRewardSlot);
        }
        let partial = self
            .delegations
            .partial(&increase.pox_addr, cycle, caller)
            .ok_or(Error::NoSuchPrincipal)?;
        let new_total = slot.total_ustx.saturating_add(partial);

        let signer_key = increase.auth.signer_key;
        if slot.signer_key != signer_key {
            return Err(Error::InvalidSignerKey);
        }
        self.ledger
            .check_signer_key(&signer_key, caller, current_cycle)?;
        self.auths.check(
            &increase.auth,
            Expected {
                topic: Topic::AggIncrease,
                reward_cycle: cycle,
                period: 1,
                pox_addr: &increase.pox_addr,
            },
            new_total,
        )?;

        self.auths.consume(&increase.auth);
        self.delegations
            .take_partial(&increase.pox_addr, cycle, caller);
        self.ledger.increase_slot(cycle, index, partial);

        self.events.push(PoxEvent::AggregationIncrease {
            delegate: *caller,
            reward_cycle: cycle,
            reward_index: index,
            total_ustx: new_total,
        });

        Ok(new_total)
    }

    /// Enable or disable an authorization of the signer controlled by
    /// `caller`, so it may be used without a signature.
    ///
    /// # Errors
    /// [`Error::InvalidSignerKey`], [`Error::NotAllowed`] if `caller` does
    /// not control the signer key, [`Error::InvalidLockPeriod`] and
    /// [`Error::InvalidRewardCycle`] for past cycles.
    pub fn set_signer_key_authorization(
        &mut self,
        caller: &Principal,
        auth: &SignerAuthorization,
        allowed: bool,
    ) -> Result<(), Error> {
        let result =
            self.try_set_signer_key_authorization(caller, auth, allowed);
        log_outcome("set-signer-key-authorization", caller, &result);
        result
    }

    fn try_set_signer_key_authorization(
        &mut self,
        caller: &Principal,
        auth: &SignerAuthorization,
        allowed: bool,
    ) -> Result<(), Error> {
        auth.signer_key.verifying_key()?;
        if Principal::from_public_key(&auth.signer_key) != *caller {
            return Err(Error::NotAllowed);
        }
        if !self.consts.is_valid_lock_period(auth.period) {
            return Err(Error::InvalidLockPeriod);
        }
        if auth.reward_cycle < self.current_cycle()? {
            return Err(Error::InvalidRewardCycle);
        }

        self.auths.set_registered(auth, allowed);
        self.events.push(PoxEvent::SetSignerKeyAuthorization {
            signer_key: auth.signer_key,
            auth_id: auth.auth_id,
            allowed,
        });

        Ok(())
    }

    /// Release every lock that elapsed at the current height, returning the
    /// principals whose funds were unlocked.
    ///
    /// Also drops lapsed delegations, partial totals of past cycles and
    /// signer key bindings that ended.
    pub fn process_unlocks(&mut self) -> Vec<Principal> {
        let burn_height = self.burn_height();

        let unlocked: Vec<Principal> = self
            .ledger
            .expired(&self.consts, burn_height)
            .into_iter()
            .filter(|stacker| self.release_expired(stacker))
            .collect();

        if let Ok(current_cycle) = self.current_cycle() {
            self.ledger.release_signer_keys(current_cycle);
            for lapsed in self.delegations.prune(burn_height, current_cycle) {
                debug!(
                    delegator = %lapsed.delegator,
                    delegate = %lapsed.delegated_to,
                    "delegation lapsed"
                );
            }
        }

        unlocked
    }

    /// Snapshot of the protocol state.
    ///
    /// # Errors
    /// [`Error::InvalidHeight`] if the chain has not reached the first
    /// burnchain block yet.
    pub fn get_pox_info(&self) -> Result<PoxInfo, Error> {
        let burn_height = self.burn_height();
        let current_cycle = self.current_cycle()?;

        Ok(PoxInfo {
            constants: self.consts,
            current_burn_height: burn_height,
            in_prepare_phase: self.consts.is_in_prepare_phase(burn_height),
            blocks_until_next_cycle: self
                .consts
                .blocks_until_next_cycle(burn_height),
            current_cycle: self.cycle_info(current_cycle),
            next_cycle: self.cycle_info(current_cycle + 1),
        })
    }

    /// The minimum amount a reward slot needs.
    pub fn get_stacking_minimum(&self) -> Ustx {
        self.clock.min_amount_ustx()
    }

    /// The stacking entry of `who`, if its lock has not elapsed.
    pub fn get_stacker_info(&self, who: &Principal) -> Option<&StackingEntry> {
        self.active_entry(who)
    }

    /// The delegation of `who`, if it is in force.
    pub fn get_delegation_info(
        &self,
        who: &Principal,
    ) -> Option<&DelegationEntry> {
        self.delegations.active(who, self.burn_height())
    }

    /// The reward set of `cycle`.
    pub fn get_reward_set(&self, cycle: RewardCycle) -> &[RewardSetEntry] {
        self.ledger.reward_set(cycle)
    }

    /// The STX backing the reward set of `cycle`.
    pub fn get_total_ustx_stacked(&self, cycle: RewardCycle) -> Ustx {
        self.ledger.total_stacked(cycle)
    }

    /// The STX `delegate` locked for `pox_addr` in `cycle` and has not yet
    /// committed.
    pub fn get_partial_stacked(
        &self,
        pox_addr: &PoxAddress,
        cycle: RewardCycle,
        delegate: &Principal,
    ) -> Option<Ustx> {
        self.delegations.partial(pox_addr, cycle, delegate)
    }

    /// Whether the authorization tuple was already consumed.
    pub fn is_signer_auth_used(
        &self,
        signer_key: &SignerKey,
        auth_id: u128,
        topic: Topic,
        reward_cycle: RewardCycle,
    ) -> bool {
        self.auths
            .is_used(signer_key, auth_id, topic, reward_cycle)
    }

    /// Whether the signer registered an authorization with these fields.
    pub fn get_signer_key_authorization(
        &self,
        auth: &SignerAuthorization,
    ) -> bool {
        self.auths.is_registered(auth)
    }

    /// Take the events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<PoxEvent> {
        mem::take(&mut self.events)
    }

    fn burn_height(&self) -> BurnHeight {
        self.clock.burn_block_height()
    }

    fn current_cycle(&self) -> Result<RewardCycle, Error> {
        self.consts.block_height_to_reward_cycle(self.burn_height())
    }

    fn active_entry(&self, who: &Principal) -> Option<&StackingEntry> {
        let burn_height = self.burn_height();
        self.ledger
            .get(who)
            .filter(|entry| entry.is_locked_at(&self.consts, burn_height))
    }

    /// The cycle of `start_burn_height`, which must be the current or the
    /// next one.
    fn start_cycle(
        &self,
        start_burn_height: BurnHeight,
    ) -> Result<RewardCycle, Error> {
        let current_cycle = self.current_cycle()?;
        match self.consts.block_height_to_reward_cycle(start_burn_height) {
            Ok(cycle)
                if cycle == current_cycle || cycle == current_cycle + 1 =>
            {
                Ok(cycle)
            }
            _ => Err(Error::InvalidStartBurnHeight),
        }
    }

    /// The unlock cycle after extending `entry` by `extend_count` cycles.
    fn extended_unlock_cycle(
        &self,
        entry: &StackingEntry,
        current_cycle: RewardCycle,
        extend_count: u64,
    ) -> Result<RewardCycle, Error> {
        if extend_count == 0 {
            return Err(Error::InvalidLockPeriod);
        }
        let new_unlock_cycle = entry
            .unlock_cycle()
            .checked_add(extend_count)
            .ok_or(Error::InvalidLockPeriod)?;
        let from_cycle = entry.first_reward_cycle.max(current_cycle + 1);
        if !self
            .consts
            .is_valid_lock_period(new_unlock_cycle.saturating_sub(from_cycle))
        {
            return Err(Error::InvalidLockPeriod);
        }
        Ok(new_unlock_cycle)
    }

    fn check_delegation_bounds(
        &self,
        delegation: &DelegationEntry,
        amount: Ustx,
        pox_addr: &PoxAddress,
        unlock_cycle: RewardCycle,
    ) -> Result<(), Error> {
        if amount > delegation.amount_ustx {
            return Err(Error::DelegationTooMuchLocked);
        }
        let pinned_elsewhere = delegation
            .pox_addr
            .as_ref()
            .is_some_and(|required| required != pox_addr);
        if pinned_elsewhere {
            return Err(Error::DelegationPoxAddrRequired);
        }
        let unlock_height =
            self.consts.reward_cycle_to_burn_height(unlock_cycle);
        let expires = delegation
            .until_burn_height
            .is_some_and(|until| unlock_height > until);
        if expires {
            return Err(Error::DelegationExpiresDuringLock);
        }
        Ok(())
    }

    /// Check `who` can lock `amount`, counting the funds of an elapsed but
    /// unreleased lock as available.
    fn check_funds(&self, who: &Principal, amount: Ustx) -> Result<(), Error> {
        let spendable = self
            .balances
            .spendable_balance(who)
            .ok_or(Error::NoSuchPrincipal)?;
        let releasable = match self.ledger.get(who) {
            Some(entry) if self.active_entry(who).is_none() => {
                entry.locked_amount
            }
            _ => 0,
        };
        if spendable.saturating_add(releasable) < amount {
            return Err(Error::InsufficientFunds);
        }
        Ok(())
    }

    /// Release the lock of `who` if it elapsed.
    fn release_expired(&mut self, who: &Principal) -> bool {
        if self.ledger.get(who).is_none() || self.active_entry(who).is_some() {
            return false;
        }
        let Some(entry) = self.ledger.remove(who) else {
            return false;
        };

        self.balances.unlock(who, entry.locked_amount);
        debug!(
            stacker = %who,
            amount = %entry.locked_amount,
            "lock elapsed, funds released"
        );
        self.events.push(PoxEvent::Unlock {
            stacker: *who,
            amount: entry.locked_amount,
        });
        true
    }

    fn cycle_info(&self, cycle: RewardCycle) -> CycleInfo {
        CycleInfo {
            id: cycle,
            min_threshold_ustx: self.clock.min_amount_ustx(),
            stacked_ustx: self.ledger.total_stacked(cycle),
            reward_slots: u32::try_from(self.ledger.reward_set(cycle).len())
                .unwrap_or(u32::MAX),
        }
    }
}
