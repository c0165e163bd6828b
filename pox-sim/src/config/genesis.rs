// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use anyhow::{anyhow, Context};
use pox_core::keys::SigningKey;
use pox_core::{BurnHeight, PoxConstants, Principal, SignerKey, Ustx};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, DisplayFromStr};

use crate::args::Args;

/// Divisor of the liquid supply giving the stacking minimum when none is
/// configured.
pub const DEFAULT_STACKING_THRESHOLD: u128 = 2_000;

/// Protocol constants. Unset fields take the library defaults.
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug)]
pub struct PoxConfig {
    first_burnchain_block_height: Option<BurnHeight>,
    reward_cycle_length: Option<u64>,
    prepare_cycle_length: Option<u64>,
    max_lock_period: Option<u8>,
    chain_id: Option<u32>,
}

impl PoxConfig {
    pub fn constants(&self) -> anyhow::Result<PoxConstants> {
        let defaults = PoxConstants::default();
        PoxConstants::new(
            self.first_burnchain_block_height
                .unwrap_or(defaults.first_burnchain_block_height()),
            self.reward_cycle_length
                .unwrap_or(defaults.reward_cycle_length()),
            self.prepare_cycle_length
                .unwrap_or(defaults.prepare_cycle_length()),
            self.max_lock_period.unwrap_or(defaults.max_lock_period()),
            self.chain_id.unwrap_or(defaults.chain_id()),
        )
        .context("invalid [pox] section")
    }
}

/// Starting point of the simulated burn chain.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug)]
pub struct ChainConfig {
    burn_height: Option<BurnHeight>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    min_amount_ustx: Option<Ustx>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    stacking_threshold: Option<u128>,
}

impl ChainConfig {
    /// The starting burn height, defaulting to the first burn block.
    pub fn burn_height(&self, consts: &PoxConstants) -> BurnHeight {
        self.burn_height
            .unwrap_or(consts.first_burnchain_block_height())
    }

    /// The stacking minimum, derived from `liquid_ustx` unless set.
    pub fn min_amount_ustx(&self, liquid_ustx: Ustx) -> Ustx {
        self.min_amount_ustx.unwrap_or_else(|| {
            let threshold = self
                .stacking_threshold
                .unwrap_or(DEFAULT_STACKING_THRESHOLD)
                .max(1);
            liquid_ustx / threshold
        })
    }

    pub(crate) fn merge(&mut self, args: &Args) {
        // Overwrite config burn-height
        if let Some(burn_height) = args.burn_height {
            self.burn_height = Some(burn_height);
        }
    }
}

/// A genesis account.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AccountConfig {
    pub name: String,
    #[serde_as(as = "Hex")]
    pub secret_key: [u8; 32],
    #[serde_as(as = "DisplayFromStr")]
    pub balance: Ustx,
}

impl AccountConfig {
    pub fn signing_key(&self) -> anyhow::Result<SigningKey> {
        SigningKey::from_slice(&self.secret_key).map_err(|_| {
            anyhow!("invalid secret key for account '{}'", self.name)
        })
    }

    pub fn signer_key(&self) -> anyhow::Result<SignerKey> {
        Ok(SignerKey::from(&self.signing_key()?))
    }

    pub fn principal(&self) -> anyhow::Result<Principal> {
        Ok(Principal::from_public_key(&self.signer_key()?))
    }
}
