// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

mod args;
mod config;
mod log;
mod scenario;

use std::fs;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use pox_core::{PoxAddress, SignerAuthorization};
use serde::Serialize;
use tracing::info;

use crate::args::{Args, Command};
use crate::config::Config;
use crate::log::Log;
use crate::scenario::{Scenario, Simulation};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::try_from(&args)?;

    Log::new(config.log_level()?, config.log_filter(), config.log_type())
        .register()?;

    match args.command {
        Command::Run { scenario, output } => {
            let scenario = Scenario::load(&scenario)?;
            let mut sim = Simulation::from_config(&config)?;
            let report = sim.run(&scenario)?;
            emit(&report, output.as_deref())
        }
        Command::Info => {
            let sim = Simulation::from_config(&config)?;
            emit(&sim.report(Vec::new()), None)
        }
        Command::Sign {
            account,
            pox_version,
            pox_hashbytes,
            reward_cycle,
            topic,
            period,
            max_amount,
            auth_id,
        } => {
            let sk = config.account(&account)?.signing_key()?;
            let hashbytes = hex::decode(&pox_hashbytes)
                .context("reward address hash bytes are not hex")?;
            let pox_addr = PoxAddress::new(pox_version, hashbytes);
            pox_addr.validate()?;

            let auth = SignerAuthorization::signed(
                &sk,
                config.pox.constants()?.chain_id(),
                pox_addr,
                reward_cycle,
                topic,
                period,
                max_amount,
                auth_id,
            )?;
            info!(%topic, reward_cycle, %auth_id, "authorization signed");
            emit(&auth, None)
        }
    }
}

/// Print `value` as JSON to `output`, or to stdout.
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
