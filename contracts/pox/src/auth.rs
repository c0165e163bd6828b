// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Signer authorization bookkeeping.
//!
//! An authorization is accepted either because it carries a signature that
//! recovers to its signer key, or because the signer registered it
//! beforehand. Either way it may only be used once.

use std::collections::BTreeSet;

use pox_core::{
    Error, PoxAddress, RewardCycle, SignerAuthorization, SignerKey, Topic,
    Ustx,
};

/// What an operation expects an authorization to attest.
#[derive(Debug, Clone, Copy)]
pub struct Expected<'a> {
    /// Purpose of the operation.
    pub topic: Topic,
    /// Reward cycle the operation targets.
    pub reward_cycle: RewardCycle,
    /// Number of cycles the operation covers.
    pub period: u64,
    /// Reward address of the operation.
    pub pox_addr: &'a PoxAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Registered {
    signer_key: SignerKey,
    auth_id: u128,
    topic: Topic,
    reward_cycle: RewardCycle,
    period: u64,
    max_amount: Ustx,
    pox_addr: PoxAddress,
}

impl From<&SignerAuthorization> for Registered {
    fn from(auth: &SignerAuthorization) -> Self {
        Self {
            signer_key: auth.signer_key,
            auth_id: auth.auth_id,
            topic: auth.topic,
            reward_cycle: auth.reward_cycle,
            period: auth.period,
            max_amount: auth.max_amount,
            pox_addr: auth.pox_addr.clone(),
        }
    }
}

type UsedKey = (SignerKey, u128, Topic, RewardCycle);

const fn used_key(auth: &SignerAuthorization) -> UsedKey {
    (auth.signer_key, auth.auth_id, auth.topic, auth.reward_cycle)
}

/// Pre-registered and consumed signer authorizations.
#[derive(Debug, Default, Clone)]
pub struct Authorizations {
    chain_id: u32,
    registered: BTreeSet<Registered>,
    used: BTreeSet<UsedKey>,
}

impl Authorizations {
    /// Create an empty registry for signatures bound to `chain_id`.
    pub const fn new(chain_id: u32) -> Self {
        Self {
            chain_id,
            registered: BTreeSet::new(),
            used: BTreeSet::new(),
        }
    }

    /// Validate `auth` for an operation without consuming it.
    ///
    /// # Errors
    /// In order: signature errors (or [`Error::NotAllowed`] for unregistered
    /// unsigned authorizations), [`Error::WrongSignerTopic`],
    /// [`Error::InvalidRewardCycle`], [`Error::SignerAuthMismatch`],
    /// [`Error::SignerAuthAmountTooHigh`] and [`Error::SignerAuthUsed`].
    pub fn check(
        &self,
        auth: &SignerAuthorization,
        expected: Expected,
        requested_amount: Ustx,
    ) -> Result<(), Error> {
        if auth.signature.is_some() {
            auth.verify_signature(self.chain_id)?;
        } else if !self.registered.contains(&Registered::from(auth)) {
            return Err(Error::NotAllowed);
        }

        if auth.topic != expected.topic {
            return Err(Error::WrongSignerTopic);
        }
        if auth.reward_cycle != expected.reward_cycle {
            return Err(Error::InvalidRewardCycle);
        }
        if auth.period != expected.period || &auth.pox_addr != expected.pox_addr
        {
            return Err(Error::SignerAuthMismatch);
        }
        if requested_amount > auth.max_amount {
            return Err(Error::SignerAuthAmountTooHigh);
        }
        if self.used.contains(&used_key(auth)) {
            return Err(Error::SignerAuthUsed);
        }

        Ok(())
    }

    /// Mark `auth` as used. Only call after a successful [`Self::check`].
    pub fn consume(&mut self, auth: &SignerAuthorization) {
        self.used.insert(used_key(auth));
    }

    /// Validate `auth` and mark it as used.
    ///
    /// # Errors
    /// See [`Self::check`].
    pub fn verify_and_consume(
        &mut self,
        auth: &SignerAuthorization,
        expected: Expected,
        requested_amount: Ustx,
    ) -> Result<(), Error> {
        self.check(auth, expected, requested_amount)?;
        self.consume(auth);
        Ok(())
    }

    /// Enable or disable a pre-registered authorization.
    pub fn set_registered(
        &mut self,
        auth: &SignerAuthorization,
        allowed: bool,
    ) {
        let registered = Registered::from(auth);
        if allowed {
            self.registered.insert(registered);
        } else {
            self.registered.remove(&registered);
        }
    }

    /// Whether an authorization with these fields was pre-registered.
    pub fn is_registered(&self, auth: &SignerAuthorization) -> bool {
        self.registered.contains(&Registered::from(auth))
    }

    /// Whether the tuple was already consumed.
    pub fn is_used(
        &self,
        signer_key: &SignerKey,
        auth_id: u128,
        topic: Topic,
        reward_cycle: RewardCycle,
    ) -> bool {
        self.used
            .contains(&(*signer_key, auth_id, topic, reward_cycle))
    }
}
