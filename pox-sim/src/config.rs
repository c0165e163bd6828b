// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

pub mod genesis;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::args::Args;

use self::genesis::{AccountConfig, ChainConfig, PoxConfig};

#[derive(Serialize, Deserialize, Clone, Default, Debug)]
pub(crate) struct Config {
    log_level: Option<String>,
    log_type: Option<String>,
    log_filter: Option<String>,

    #[serde(default = "PoxConfig::default")]
    pub(crate) pox: PoxConfig,

    #[serde(default = "ChainConfig::default")]
    pub(crate) chain: ChainConfig,

    #[serde(default, rename = "account")]
    pub(crate) accounts: Vec<AccountConfig>,
}

/// Default log_level.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log_type.
const DEFAULT_LOG_TYPE: &str = "coloured";

impl TryFrom<&Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        // Overwrite config log-level
        if let Some(log_level) = args.log_level {
            config.log_level = Some(log_level.to_string());
        }

        // Overwrite config log-type
        if let Some(log_type) = &args.log_type {
            config.log_type = Some(log_type.into());
        }

        // Overwrite config log-filter
        if let Some(log_filter) = &args.log_filter {
            config.log_filter = Some(log_filter.into());
        }

        config.chain.merge(args);

        Ok(config)
    }
}

impl Config {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let toml = fs::read_to_string(path).with_context(|| {
            format!("failed to read config {}", path.display())
        })?;
        toml::from_str(&toml).with_context(|| {
            format!("failed to parse config {}", path.display())
        })
    }

    pub(crate) fn log_type(&self) -> String {
        match &self.log_type {
            None => DEFAULT_LOG_TYPE.into(),
            Some(log_type) => log_type.into(),
        }
    }

    pub(crate) fn log_level(&self) -> anyhow::Result<tracing::Level> {
        let log_level = match &self.log_level {
            None => DEFAULT_LOG_LEVEL,
            Some(log_level) => log_level,
        };
        tracing::Level::from_str(log_level).map_err(|e| {
            anyhow!("Invalid log-level specified '{log_level}' - {e}")
        })
    }

    pub(crate) fn log_filter(&self) -> String {
        self.log_filter.clone().unwrap_or_default()
    }

    /// The configured account called `name`.
    pub(crate) fn account(&self, name: &str) -> anyhow::Result<&AccountConfig> {
        self.accounts
            .iter()
            .find(|account| account.name == name)
            .ok_or_else(|| anyhow!("no account named '{name}' in config"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use pox_core::Principal;

    use super::*;

    const CONFIG: &str = r#"
log_level = "debug"
log_type = "json"

[pox]
first_burnchain_block_height = 100
reward_cycle_length = 50
prepare_cycle_length = 5

[chain]
burn_height = 220
min_amount_ustx = "5000"

[[account]]
name = "alice"
secret_key = "0101010101010101010101010101010101010101010101010101010101010101"
balance = "1000000"

[[account]]
name = "bob"
secret_key = "0202020202020202020202020202020202020202020202020202020202020202"
balance = "340282366920938463463374607431768211455"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file =
            tempfile::NamedTempFile::new().expect("temp file should open");
        file.write_all(contents.as_bytes())
            .expect("config should be written");
        file
    }

    #[test]
    fn load_config_file() {
        let file = write_config(CONFIG);
        let config =
            Config::load(file.path()).expect("config should be parsed");

        assert_eq!(config.log_type(), "json");
        assert_eq!(
            config.log_level().expect("level should parse"),
            tracing::Level::DEBUG
        );
        assert_eq!(config.log_filter(), "");

        let consts = config.pox.constants().expect("constants are valid");
        assert_eq!(consts.first_burnchain_block_height(), 100);
        assert_eq!(consts.reward_cycle_length(), 50);
        assert_eq!(consts.prepare_cycle_length(), 5);

        assert_eq!(config.chain.burn_height(&consts), 220);
        assert_eq!(config.chain.min_amount_ustx(1_000_000), 5_000);

        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[1].balance, u128::MAX);
        let alice = config.account("alice").expect("alice is configured");
        let key = alice.signer_key().expect("secret key is valid");
        assert_eq!(
            alice.principal().expect("secret key is valid"),
            Principal::from_public_key(&key)
        );
        assert!(config.account("carol").is_err());
    }

    #[test]
    fn args_override_config() {
        let file = write_config(CONFIG);
        let path = file.path().to_string_lossy().into_owned();
        let args = Args::parse_from([
            "pox-sim",
            "--config",
            path.as_str(),
            "--log-level",
            "warn",
            "--log-type",
            "plain",
            "--burn-height",
            "310",
            "info",
        ]);

        let config = Config::try_from(&args).expect("config should load");
        assert_eq!(config.log_type(), "plain");
        assert_eq!(
            config.log_level().expect("level should parse"),
            tracing::Level::WARN
        );
        let consts = config.pox.constants().expect("constants are valid");
        assert_eq!(config.chain.burn_height(&consts), 310);
    }

    #[test]
    fn defaults_without_config() {
        let args = Args::parse_from(["pox-sim", "info"]);
        let config = Config::try_from(&args).expect("config should load");

        assert_eq!(config.log_type(), DEFAULT_LOG_TYPE);
        assert_eq!(
            config.log_level().expect("level should parse"),
            tracing::Level::INFO
        );
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn invalid_config_is_reported() {
        let file = write_config("[pox]\nreward_cycle_length = \"ten\"\n");
        assert!(Config::load(file.path()).is_err());

        let file = write_config("[pox]\nreward_cycle_length = 0\n");
        let config =
            Config::load(file.path()).expect("config should be parsed");
        assert!(config.pox.constants().is_err());

        let file = write_config("log_level = \"loud\"\n");
        let config =
            Config::load(file.path()).expect("config should be parsed");
        assert!(config.log_level().is_err());
    }
}
