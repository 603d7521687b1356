// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::Command;
use crate::protocol::runtime::resume_plan;
use crate::storage::{TradeRecord, TradeStore};
use crate::trade::state::{Phase, State};
use crate::{Config, Error, LogStyle};

#[derive(Serialize)]
struct TradeSummary {
    id: String,
    role: String,
    state: State,
    phase: Phase,
    failed: bool,
}

impl From<&TradeRecord> for TradeSummary {
    fn from(record: &TradeRecord) -> Self {
        TradeSummary {
            id: record.trade.id.clone(),
            role: record.trade.role.to_string(),
            state: record.trade.state(),
            phase: record.trade.phase(),
            failed: record.trade.has_failed(),
        }
    }
}

#[derive(Serialize)]
struct TradeList {
    open: Vec<TradeSummary>,
    closed: Vec<TradeSummary>,
}

impl Command {
    pub fn exec(self, config: &Config, store: &dyn TradeStore) -> Result<(), Error> {
        debug!("Performing {:?}: {}", self, self);
        match self {
            Command::Ls => {
                let records = store.load_all()?;
                let (closed, open): (Vec<_>, Vec<_>) =
                    records.iter().partition(|record| record.closed);
                let list = TradeList {
                    open: open.into_iter().map(TradeSummary::from).collect(),
                    closed: closed.into_iter().map(TradeSummary::from).collect(),
                };
                println!("{}", to_yaml(&list)?);
            }

            Command::Show { id } => {
                let record = load(store, &id)?;
                println!("{}", to_yaml(&record)?);
            }

            Command::ResumePlan { id } => {
                let record = load(store, &id)?;
                if record.closed {
                    println!("Trade {} is closed", id.trade_id());
                    return Ok(());
                }
                match resume_plan(&record.trade) {
                    Some(tasks) => {
                        println!(
                            "Trade {} in state {} resumes with:",
                            id.trade_id(),
                            record.trade.state().bright_blue_bold()
                        );
                        for task in tasks {
                            println!("  {}", task.label());
                        }
                    }
                    None => println!(
                        "Trade {} in state {} waits for the next event",
                        id.trade_id(),
                        record.trade.state().bright_blue_bold()
                    ),
                }
            }

            Command::Config => {
                println!("{}", toml::to_string(config)?);
            }
        }
        Ok(())
    }
}

fn load(store: &dyn TradeStore, id: &str) -> Result<TradeRecord, Error> {
    store
        .load(id)?
        .ok_or_else(|| Error::UnknownTrade(id.to_string()))
}

fn to_yaml<T: serde::Serialize>(value: &T) -> Result<String, Error> {
    serde_yaml::to_string(value).map_err(|err| Error::Output(err.to_string()))
}
