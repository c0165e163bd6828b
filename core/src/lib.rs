// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Types used for interacting with the PoX stacking state machine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cycle;
pub mod pox_addr;
pub mod signer;
pub mod stacking;

mod error;
pub use error::Error;

mod principal;
pub use principal::Principal;

pub use cycle::{
    cycle_of, BurnHeight, PoxConstants, RewardCycle, CHAIN_ID_TESTNET,
    MAX_POX_REWARD_CYCLES,
};
pub use pox_addr::PoxAddress;
pub use signer::{SignerAuthorization, SignerKey, SignerSignature, Topic};

/// Secp256k1 keys used by signers.
pub mod keys {
    pub use k256::ecdsa::{SigningKey, VerifyingKey};
}

/// Micro-STX, the smallest unit of STX.
pub type Ustx = u128;
