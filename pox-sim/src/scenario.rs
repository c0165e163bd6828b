// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Scenarios replayed against an in-memory stacking state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use pox_contract::host::{Balances, ChainClock, ManualClock, MemoryBalances};
use pox_contract::MemoryPoxState;
use pox_core::keys::SigningKey;
use pox_core::stacking::{
    AggregationCommit, AggregationIncrease, DelegateStackExtend,
    DelegateStackIncrease, DelegateStackStx, DelegateStx, DelegationEntry,
    PoxEvent, PoxInfo, StackExtend, StackIncrease, StackStx, StackingEntry,
};
use pox_core::{
    BurnHeight, Error, PoxAddress, Principal, RewardCycle,
    SignerAuthorization, SignerKey, Topic, Ustx,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tracing::{info, warn};

use crate::config::Config;

/// A list of steps, applied in order.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Scenario {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let toml = fs::read_to_string(path).with_context(|| {
            format!("failed to read scenario {}", path.display())
        })?;
        toml::from_str(&toml).with_context(|| {
            format!("failed to parse scenario {}", path.display())
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Step {
    /// Burn height the clock is moved to before the step.
    #[serde(default)]
    pub at: Option<BurnHeight>,
    /// Name of the calling account.
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

/// How the authorization of a step is produced.
#[serde_as]
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AuthConfig {
    /// Signing account. The caller signs when unset.
    #[serde(default)]
    pub signer: Option<String>,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub id: u128,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub max_amount: Option<Ustx>,
    /// Rely on an authorization the signer registered instead of a
    /// signature.
    #[serde(default)]
    pub registered: bool,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Action {
    StackStx {
        #[serde_as(as = "DisplayFromStr")]
        amount: Ustx,
        pox_addr: PoxAddress,
        start_burn_height: BurnHeight,
        lock_period: u64,
        #[serde(default)]
        auth: AuthConfig,
    },
    StackExtend {
        extend_count: u64,
        pox_addr: PoxAddress,
        #[serde(default)]
        auth: AuthConfig,
    },
    StackIncrease {
        #[serde_as(as = "DisplayFromStr")]
        increase_by: Ustx,
        #[serde(default)]
        auth: AuthConfig,
    },
    DelegateStx {
        #[serde_as(as = "DisplayFromStr")]
        amount: Ustx,
        delegate_to: String,
        #[serde(default)]
        until_burn_height: Option<BurnHeight>,
        #[serde(default)]
        pox_addr: Option<PoxAddress>,
    },
    RevokeDelegateStx,
    DelegateStackStx {
        stacker: String,
        #[serde_as(as = "DisplayFromStr")]
        amount: Ustx,
        pox_addr: PoxAddress,
        start_burn_height: BurnHeight,
        lock_period: u64,
    },
    DelegateStackExtend {
        stacker: String,
        pox_addr: PoxAddress,
        extend_count: u64,
    },
    DelegateStackIncrease {
        stacker: String,
        pox_addr: PoxAddress,
        #[serde_as(as = "DisplayFromStr")]
        increase_by: Ustx,
    },
    AggregationCommit {
        pox_addr: PoxAddress,
        reward_cycle: RewardCycle,
        #[serde(default)]
        auth: AuthConfig,
    },
    AggregationIncrease {
        pox_addr: PoxAddress,
        reward_cycle: RewardCycle,
        reward_index: u32,
        #[serde(default)]
        auth: AuthConfig,
    },
    SetSignerKeyAuthorization {
        pox_addr: PoxAddress,
        reward_cycle: RewardCycle,
        topic: Topic,
        period: u64,
        #[serde_as(as = "DisplayFromStr")]
        max_amount: Ustx,
        #[serde_as(as = "DisplayFromStr")]
        #[serde(default)]
        auth_id: u128,
        allowed: bool,
    },
    ProcessUnlocks,
}

impl Action {
    pub const fn name(&self) -> &'static str {
        match self {
            Action::StackStx { .. } => "stack-stx",
            Action::StackExtend { .. } => "stack-extend",
            Action::StackIncrease { .. } => "stack-increase",
            Action::DelegateStx { .. } => "delegate-stx",
            Action::RevokeDelegateStx => "revoke-delegate-stx",
            Action::DelegateStackStx { .. } => "delegate-stack-stx",
            Action::DelegateStackExtend { .. } => "delegate-stack-extend",
            Action::DelegateStackIncrease { .. } => "delegate-stack-increase",
            Action::AggregationCommit { .. } => "stack-aggregation-commit",
            Action::AggregationIncrease { .. } => {
                "stack-aggregation-increase"
            }
            Action::SetSignerKeyAuthorization { .. } => {
                "set-signer-key-authorization"
            }
            Action::ProcessUnlocks => "process-unlocks",
        }
    }
}

/// Value returned by a successful step.
#[serde_as]
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Stacker(StackingEntry),
    Delegation(DelegationEntry),
    RewardIndex(u32),
    TotalUstx(#[serde_as(as = "DisplayFromStr")] Ustx),
    Unlocked(Vec<Principal>),
    Done,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StepError {
    pub code: u32,
    pub retryable: bool,
    pub message: String,
}

impl From<Error> for StepError {
    fn from(err: Error) -> Self {
        Self {
            code: err.code(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub caller: Option<Principal>,
    pub burn_height: BurnHeight,
    pub outcome: Option<Outcome>,
    pub error: Option<StepError>,
    pub events: Vec<PoxEvent>,
}

#[serde_as]
#[derive(Serialize, Debug, Clone)]
pub struct AccountReport {
    pub name: String,
    pub principal: Principal,
    pub signer_key: SignerKey,
    #[serde_as(as = "DisplayFromStr")]
    pub spendable: Ustx,
    #[serde_as(as = "DisplayFromStr")]
    pub locked: Ustx,
    pub stacker: Option<StackingEntry>,
    pub delegation: Option<DelegationEntry>,
}

/// Everything a replay produced, along with the final state.
#[derive(Serialize, Debug, Clone)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub accounts: Vec<AccountReport>,
    pub pox_info: Option<PoxInfo>,
}

#[derive(Debug, Clone)]
struct SimAccount {
    sk: SigningKey,
    principal: Principal,
}

fn required(caller: Option<&SimAccount>) -> anyhow::Result<&SimAccount> {
    caller.ok_or_else(|| anyhow!("missing caller"))
}

/// Fields the state machine expects an authorization to carry.
struct Authorizing<'a> {
    pox_addr: &'a PoxAddress,
    reward_cycle: RewardCycle,
    topic: Topic,
    period: u64,
    max_amount: Ustx,
}

/// In-memory stacking state seeded from a genesis configuration.
pub struct Simulation {
    state: MemoryPoxState,
    accounts: BTreeMap<String, SimAccount>,
}

impl Simulation {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let consts = config.pox.constants()?;

        let mut balances = MemoryBalances::new();
        let mut accounts = BTreeMap::new();
        let mut liquid_ustx: Ustx = 0;
        for account in &config.accounts {
            let sk = account.signing_key()?;
            let principal = account.principal()?;
            balances.deposit(principal, account.balance);
            liquid_ustx = liquid_ustx.saturating_add(account.balance);

            let sim_account = SimAccount { sk, principal };
            if accounts.insert(account.name.clone(), sim_account).is_some() {
                bail!("account '{}' is configured twice", account.name);
            }
        }

        let burn_height = config.chain.burn_height(&consts);
        let min_amount_ustx = config.chain.min_amount_ustx(liquid_ustx);
        info!(
            accounts = accounts.len(),
            burn_height,
            %min_amount_ustx,
            "genesis loaded"
        );

        let clock = ManualClock::new(burn_height, min_amount_ustx);
        Ok(Self {
            state: MemoryPoxState::new(consts, balances, clock),
            accounts,
        })
    }

    /// Apply every step of `scenario` and report on the resulting state.
    ///
    /// Rejected operations are part of the report. Malformed steps, such as
    /// steps naming unknown accounts, abort the replay.
    pub fn run(&mut self, scenario: &Scenario) -> anyhow::Result<Report> {
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            if let Some(at) = step.at {
                let now = self.state.clock().burn_block_height();
                if at < now {
                    bail!("step {index} moves the clock back to {at}");
                }
                self.state.clock_mut().set_burn_height(at);
            }

            let caller = match &step.caller {
                Some(name) => Some(self.account(name)?),
                None => None,
            };
            let result = self
                .apply(caller.as_ref(), &step.action)
                .with_context(|| format!("step {index} is malformed"))?;

            steps.push(StepReport {
                index,
                op: step.action.name(),
                caller: caller.map(|account| account.principal),
                burn_height: self.state.clock().burn_block_height(),
                outcome: result.as_ref().ok().cloned(),
                error: result.err().map(StepError::from),
                events: self.state.drain_events(),
            });
        }

        let rejected = steps.iter().filter(|step| step.error.is_some()).count();
        if rejected > 0 {
            warn!(steps = steps.len(), rejected, "scenario replayed");
        } else {
            info!(steps = steps.len(), "scenario replayed");
        }

        Ok(self.report(steps))
    }

    /// Snapshot of the accounts and the protocol state.
    pub fn report(&self, steps: Vec<StepReport>) -> Report {
        let accounts = self
            .accounts
            .iter()
            .map(|(name, account)| {
                let who = &account.principal;
                AccountReport {
                    name: name.clone(),
                    principal: *who,
                    signer_key: SignerKey::from(&account.sk),
                    spendable: self
                        .state
                        .balances()
                        .spendable_balance(who)
                        .unwrap_or_default(),
                    locked: self.state.balances().locked_balance(who),
                    stacker: self.state.get_stacker_info(who).cloned(),
                    delegation: self.state.get_delegation_info(who).cloned(),
                }
            })
            .collect();

        Report {
            steps,
            accounts,
            pox_info: self.state.get_pox_info().ok(),
        }
    }

    fn account(&self, name: &str) -> anyhow::Result<SimAccount> {
        self.accounts
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown account '{name}'"))
    }

    fn principal(&self, name: &str) -> anyhow::Result<Principal> {
        self.account(name).map(|account| account.principal)
    }

    fn current_cycle(&self) -> RewardCycle {
        self.cycle_at(self.state.clock().burn_block_height())
    }

    // Heights the state machine will reject map to cycle zero
    fn cycle_at(&self, burn_height: BurnHeight) -> RewardCycle {
        self.state
            .constants()
            .block_height_to_reward_cycle(burn_height)
            .unwrap_or_default()
    }

    fn authorize(
        &self,
        caller: &SimAccount,
        auth: &AuthConfig,
        expected: Authorizing<'_>,
    ) -> anyhow::Result<SignerAuthorization> {
        let signer = match &auth.signer {
            Some(name) => self.account(name)?,
            None => caller.clone(),
        };
        let max_amount = auth.max_amount.unwrap_or(expected.max_amount);

        if auth.registered {
            return Ok(SignerAuthorization::new(
                SignerKey::from(&signer.sk),
                expected.pox_addr.clone(),
                expected.reward_cycle,
                expected.topic,
                expected.period,
                max_amount,
                auth.id,
            ));
        }

        let auth = SignerAuthorization::signed(
            &signer.sk,
            self.state.constants().chain_id(),
            expected.pox_addr.clone(),
            expected.reward_cycle,
            expected.topic,
            expected.period,
            max_amount,
            auth.id,
        )?;
        Ok(auth)
    }

    #[allow(clippy::too_many_lines)]
    fn apply(
        &mut self,
        caller: Option<&SimAccount>,
        action: &Action,
    ) -> anyhow::Result<Result<Outcome, Error>> {
        let result = match action.clone() {
            Action::StackStx {
                amount,
                pox_addr,
                start_burn_height,
                lock_period,
                auth,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let auth = self.authorize(
                    caller,
                    &auth,
                    Authorizing {
                        pox_addr: &pox_addr,
                        reward_cycle: self.cycle_at(start_burn_height),
                        topic: Topic::StackStx,
                        period: lock_period,
                        max_amount: amount,
                    },
                )?;
                let call = StackStx {
                    amount,
                    pox_addr,
                    start_burn_height,
                    lock_period,
                    auth,
                };
                self.state.stack_stx(&who, call).map(Outcome::Stacker)
            }
            Action::StackExtend {
                extend_count,
                pox_addr,
                auth,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let locked = self
                    .state
                    .get_stacker_info(&who)
                    .map_or(0, |entry| entry.locked_amount);
                let auth = self.authorize(
                    caller,
                    &auth,
                    Authorizing {
                        pox_addr: &pox_addr,
                        reward_cycle: self.current_cycle(),
                        topic: Topic::StackExtend,
                        period: extend_count,
                        max_amount: locked,
                    },
                )?;
                let call = StackExtend {
                    extend_count,
                    pox_addr,
                    auth,
                };
                self.state.stack_extend(&who, call).map(Outcome::Stacker)
            }
            Action::StackIncrease { increase_by, auth } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let (pox_addr, period, locked) =
                    match self.state.get_stacker_info(&who) {
                        Some(entry) => (
                            entry.pox_addr.clone(),
                            entry.lock_period,
                            entry.locked_amount,
                        ),
                        None => (PoxAddress::new(0, [0; 20]), 1, 0),
                    };
                let auth = self.authorize(
                    caller,
                    &auth,
                    Authorizing {
                        pox_addr: &pox_addr,
                        reward_cycle: self.current_cycle(),
                        topic: Topic::StackIncrease,
                        period,
                        max_amount: locked.saturating_add(increase_by),
                    },
                )?;
                let call = StackIncrease { increase_by, auth };
                self.state.stack_increase(&who, call).map(Outcome::Stacker)
            }
            Action::DelegateStx {
                amount,
                delegate_to,
                until_burn_height,
                pox_addr,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let call = DelegateStx {
                    amount,
                    delegate_to: self.principal(&delegate_to)?,
                    until_burn_height,
                    pox_addr,
                };
                self.state.delegate_stx(&who, call).map(|()| Outcome::Done)
            }
            Action::RevokeDelegateStx => {
                let who = required(caller)?.principal;
                self.state
                    .revoke_delegate_stx(&who)
                    .map(Outcome::Delegation)
            }
            Action::DelegateStackStx {
                stacker,
                amount,
                pox_addr,
                start_burn_height,
                lock_period,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let call = DelegateStackStx {
                    stacker: self.principal(&stacker)?,
                    amount,
                    pox_addr,
                    start_burn_height,
                    lock_period,
                };
                self.state
                    .delegate_stack_stx(&who, call)
                    .map(Outcome::Stacker)
            }
            Action::DelegateStackExtend {
                stacker,
                pox_addr,
                extend_count,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let call = DelegateStackExtend {
                    stacker: self.principal(&stacker)?,
                    pox_addr,
                    extend_count,
                };
                self.state
                    .delegate_stack_extend(&who, call)
                    .map(Outcome::Stacker)
            }
            Action::DelegateStackIncrease {
                stacker,
                pox_addr,
                increase_by,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let call = DelegateStackIncrease {
                    stacker: self.principal(&stacker)?,
                    pox_addr,
                    increase_by,
                };
                self.state
                    .delegate_stack_increase(&who, call)
                    .map(Outcome::Stacker)
            }
            Action::AggregationCommit {
                pox_addr,
                reward_cycle,
                auth,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let auth = self.authorize(
                    caller,
                    &auth,
                    Authorizing {
                        pox_addr: &pox_addr,
                        reward_cycle,
                        topic: Topic::AggCommit,
                        period: 1,
                        max_amount: Ustx::MAX,
                    },
                )?;
                let call = AggregationCommit {
                    pox_addr,
                    reward_cycle,
                    auth,
                };
                self.state
                    .stack_aggregation_commit(&who, call)
                    .map(Outcome::RewardIndex)
            }
            Action::AggregationIncrease {
                pox_addr,
                reward_cycle,
                reward_index,
                auth,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let auth = self.authorize(
                    caller,
                    &auth,
                    Authorizing {
                        pox_addr: &pox_addr,
                        reward_cycle,
                        topic: Topic::AggIncrease,
                        period: 1,
                        max_amount: Ustx::MAX,
                    },
                )?;
                let call = AggregationIncrease {
                    pox_addr,
                    reward_cycle,
                    reward_index,
                    auth,
                };
                self.state
                    .stack_aggregation_increase(&who, call)
                    .map(Outcome::TotalUstx)
            }
            Action::SetSignerKeyAuthorization {
                pox_addr,
                reward_cycle,
                topic,
                period,
                max_amount,
                auth_id,
                allowed,
            } => {
                let caller = required(caller)?;
                let who = caller.principal;
                let auth = SignerAuthorization::new(
                    SignerKey::from(&caller.sk),
                    pox_addr,
                    reward_cycle,
                    topic,
                    period,
                    max_amount,
                    auth_id,
                );
                self.state
                    .set_signer_key_authorization(&who, &auth, allowed)
                    .map(|()| Outcome::Done)
            }
            Action::ProcessUnlocks => {
                Ok(Outcome::Unlocked(self.state.process_unlocks()))
            }
        };

        Ok(result)
    }
}
