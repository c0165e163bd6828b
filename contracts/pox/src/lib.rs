// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! The PoX stacking state machine.

mod auth;
mod delegation;
mod ledger;
mod state;

pub mod host;

pub use auth::{Authorizations, Expected};
pub use state::PoxState;

/// A [`PoxState`] backed by in-memory balances and a manual clock.
pub type MemoryPoxState = PoxState<host::MemoryBalances, host::ManualClock>;
