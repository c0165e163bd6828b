// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use std::path::PathBuf;

use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use pox_core::{BurnHeight, RewardCycle, Topic, Ustx};

#[derive(Parser, Debug)]
#[command(
    author = "Dusk Network B.V. All Rights Reserved.",
    version,
    about = "PoX stacking simulator"
)]
pub struct Args {
    /// Sets the configuration path
    #[clap(long, short, env = "POX_SIM_CONFIG_TOML", value_parser)]
    pub config: Option<PathBuf>,

    /// Output log level
    #[clap(long)]
    pub log_level: Option<tracing::Level>,

    // Change the log format accordingly
    #[clap(
        long,
        value_parser = PossibleValuesParser::new(["coloured", "plain", "json"])
    )]
    pub log_type: Option<String>,

    /// Add log filter(s)
    #[clap(long)]
    pub log_filter: Option<String>,

    /// Burn height the simulated chain starts at
    #[clap(long, env = "POX_SIM_BURN_HEIGHT")]
    pub burn_height: Option<BurnHeight>,

    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Replay a scenario and print the outcome of every step
    Run {
        /// Scenario file
        #[clap(value_parser)]
        scenario: PathBuf,

        /// Write the report to this file instead of stdout
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,
    },

    /// Print the protocol state and the configured accounts
    Info,

    /// Sign an authorization with the key of a configured account
    Sign {
        /// Name of the signing account
        #[clap(long)]
        account: String,

        /// Version byte of the reward address
        #[clap(long, default_value_t = 0)]
        pox_version: u8,

        /// Hash bytes of the reward address, in hex
        #[clap(long)]
        pox_hashbytes: String,

        #[clap(long)]
        reward_cycle: RewardCycle,

        #[clap(long)]
        topic: Topic,

        #[clap(long, default_value_t = 1)]
        period: u64,

        #[clap(long)]
        max_amount: Ustx,

        #[clap(long, default_value_t = 0)]
        auth_id: u128,
    },
}
