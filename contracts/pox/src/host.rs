// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Collaborators provided by the chain hosting the state machine.

use std::collections::BTreeMap;

use pox_core::{BurnHeight, Error, Principal, Ustx};

/// Account balances of the host chain.
pub trait Balances {
    /// The unlocked balance of `who`, or `None` if the account is unknown.
    fn spendable_balance(&self, who: &Principal) -> Option<Ustx>;

    /// Move `amount` of the spendable balance of `who` into its locked
    /// balance.
    ///
    /// # Errors
    /// [`Error::NoSuchPrincipal`] for unknown accounts and
    /// [`Error::InsufficientFunds`] if the spendable balance is too low.
    fn lock(&mut self, who: &Principal, amount: Ustx) -> Result<(), Error>;

    /// Release up to `amount` of the locked balance of `who`.
    fn unlock(&mut self, who: &Principal, amount: Ustx);

    /// The locked balance of `who`.
    fn locked_balance(&self, who: &Principal) -> Ustx;
}

/// View of the burn chain.
pub trait ChainClock {
    /// Height of the current burn block.
    fn burn_block_height(&self) -> BurnHeight;

    /// Minimum amount a single reward slot needs.
    fn min_amount_ustx(&self) -> Ustx;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Account {
    spendable: Ustx,
    locked: Ustx,
}

/// In-memory balances.
#[derive(Debug, Default, Clone)]
pub struct MemoryBalances {
    accounts: BTreeMap<Principal, Account>,
}

impl MemoryBalances {
    /// Create an empty set of balances.
    pub const fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
        }
    }

    /// Credit `amount` to the spendable balance of `who`, creating the
    /// account if needed.
    pub fn deposit(&mut self, who: Principal, amount: Ustx) {
        let account = self.accounts.entry(who).or_default();
        account.spendable = account.spendable.saturating_add(amount);
    }
}

impl Balances for MemoryBalances {
    fn spendable_balance(&self, who: &Principal) -> Option<Ustx> {
        self.accounts.get(who).map(|account| account.spendable)
    }

    fn lock(&mut self, who: &Principal, amount: Ustx) -> Result<(), Error> {
        let account =
            self.accounts.get_mut(who).ok_or(Error::NoSuchPrincipal)?;
        if account.spendable < amount {
            return Err(Error::InsufficientFunds);
        }
        account.spendable -= amount;
        account.locked = account.locked.saturating_add(amount);
        Ok(())
    }

    fn unlock(&mut self, who: &Principal, amount: Ustx) {
        if let Some(account) = self.accounts.get_mut(who) {
            let amount = amount.min(account.locked);
            account.locked -= amount;
            account.spendable = account.spendable.saturating_add(amount);
        }
    }

    fn locked_balance(&self, who: &Principal) -> Ustx {
        self.accounts.get(who).map_or(0, |account| account.locked)
    }
}

/// A clock whose height and stacking minimum are set by hand.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ManualClock {
    burn_height: BurnHeight,
    min_amount_ustx: Ustx,
}

impl ManualClock {
    /// Create a clock at `burn_height` with the given stacking minimum.
    pub const fn new(burn_height: BurnHeight, min_amount_ustx: Ustx) -> Self {
        Self {
            burn_height,
            min_amount_ustx,
        }
    }

    /// Move the clock to `burn_height`.
    pub fn set_burn_height(&mut self, burn_height: BurnHeight) {
        self.burn_height = burn_height;
    }

    /// Change the stacking minimum.
    pub fn set_min_amount_ustx(&mut self, min_amount_ustx: Ustx) {
        self.min_amount_ustx = min_amount_ustx;
    }
}

impl ChainClock for ManualClock {
    fn burn_block_height(&self) -> BurnHeight {
        self.burn_height
    }

    fn min_amount_ustx(&self) -> Ustx {
        self.min_amount_ustx
    }
}
