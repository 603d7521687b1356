// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Registry of the local trader's trades.
//!
//! Every open trade owns a [`TradeProtocol`] and a pipeline lock: events of one trade run one
//! after the other, events of different trades run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;

use crate::bus::DecryptedMessageWithPubKey;
use crate::config::ProtocolConfig;
use crate::event::TradeEvent;
use crate::protocol::process_model::ProcessModel;
use crate::protocol::{Provider, TaskContext, TaskInterceptor, TradeContext, TradeProtocol};
use crate::trade::state::Phase;
use crate::trade::Trade;
use crate::{Error, LogStyle};

struct TradeEntry {
    protocol: TradeProtocol,
    pipeline: Mutex<()>,
}

pub struct TradeManager {
    provider: Provider,
    config: ProtocolConfig,
    interceptor: Option<Arc<dyn TaskInterceptor>>,
    trades: RwLock<HashMap<String, Arc<TradeEntry>>>,
    closed_trades: RwLock<HashMap<String, Trade>>,
}

impl TradeManager {
    pub fn new(provider: Provider, config: ProtocolConfig) -> Self {
        TradeManager {
            provider,
            config,
            interceptor: None,
            trades: RwLock::new(HashMap::new()),
            closed_trades: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a hook called by every task of every trade registered afterwards
    pub fn with_interceptor(mut self, interceptor: Arc<dyn TaskInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Registers and persists a new trade
    pub fn add_trade(
        &self,
        trade: Trade,
        process_model: ProcessModel,
    ) -> Result<TaskContext, Error> {
        let trade_id = trade.id.clone();
        if self.trades().contains_key(&trade_id) || self.closed().contains_key(&trade_id) {
            return Err(Error::Protocol(format!(
                "trade {} is already registered",
                trade_id
            )));
        }
        let ctx = self.register(TradeContext::new(trade, process_model));
        ctx.request_persistence()?;
        info!(
            "{} | Added trade as {}",
            trade_id.trade_id(),
            ctx.lock().trade.role.bright_blue_bold()
        );
        Ok(ctx)
    }

    /// Loads every stored trade, returns the number of open trades
    pub fn restore(&self) -> Result<usize, Error> {
        let records = self.provider.store.load_all()?;
        let mut open = 0;
        for record in records {
            let trade_id = record.trade.id.clone();
            if self.trades().contains_key(&trade_id) {
                continue;
            }
            if record.closed {
                self.closed().insert(trade_id, record.trade);
            } else {
                debug!(
                    "{} | Restored trade in state {}",
                    trade_id.trade_id(),
                    record.trade.state().bright_blue_italic()
                );
                self.register(record.into());
                open += 1;
            }
        }
        info!(
            "Restored {} open and {} closed trades",
            open.bright_green_bold(),
            self.closed().len()
        );
        Ok(open)
    }

    /// Continues every open trade interrupted by a restart, returns the trades that failed
    pub async fn resume_all(&self) -> Vec<(String, Error)> {
        let mut failures = vec![];
        for trade_id in self.open_trade_ids() {
            if let Err(err) = self.handle_event(&trade_id, TradeEvent::Resume).await {
                error!(
                    "{} | Resuming trade failed: {}",
                    trade_id.trade_id(),
                    err.err()
                );
                failures.push((trade_id, err));
            }
        }
        failures
    }

    /// Routes an inbound message to its trade, messages of closed trades are dropped
    pub async fn on_message(&self, envelope: DecryptedMessageWithPubKey) -> Result<(), Error> {
        let trade_id = envelope.message.trade_id().to_string();
        if self.closed().contains_key(&trade_id) {
            debug!(
                "{} | Dropping {} for closed trade",
                trade_id.trade_id(),
                envelope.message.label()
            );
            return Ok(());
        }
        self.handle_event(&trade_id, TradeEvent::Message(envelope))
            .await
    }

    pub async fn on_deposit_confirmed(&self, trade_id: &str) -> Result<(), Error> {
        self.handle_event(trade_id, TradeEvent::DepositConfirmed)
            .await
    }

    /// Runs `event` once the trade's previous events are done
    pub async fn handle_event(&self, trade_id: &str, event: TradeEvent) -> Result<(), Error> {
        let entry = self
            .entry(trade_id)
            .ok_or_else(|| Error::UnknownTrade(trade_id.to_string()))?;
        let _pipeline = entry.pipeline.lock().await;
        entry.protocol.handle(event).await
    }

    /// Moves a paid out trade to the closed trades
    pub async fn close_trade(&self, trade_id: &str) -> Result<Trade, Error> {
        let entry = self
            .entry(trade_id)
            .ok_or_else(|| Error::UnknownTrade(trade_id.to_string()))?;
        let _pipeline = entry.pipeline.lock().await;
        let ctx = entry.protocol.context();
        let record = {
            let guard = ctx.lock();
            if guard.trade.phase() < Phase::PayoutPublished {
                return Err(Error::Protocol(format!(
                    "trade {} cannot be closed in phase {}",
                    trade_id,
                    guard.trade.phase()
                )));
            }
            if guard.trade.dispute_state().is_open() {
                warn!(
                    "{} | Closing trade with open dispute {}",
                    trade_id.trade_id(),
                    guard.trade.dispute_state().bright_yellow_bold()
                );
            }
            guard.to_record(true)
        };
        self.provider.store.save(&record)?;
        self.trades().remove(trade_id);
        self.closed()
            .insert(trade_id.to_string(), record.trade.clone());
        info!("{} | Trade closed", trade_id.trade_id());
        Ok(record.trade)
    }

    pub fn trade(&self, trade_id: &str) -> Option<Trade> {
        match self.entry(trade_id) {
            Some(entry) => Some(entry.protocol.context().trade()),
            None => self.closed_trades_read().get(trade_id).cloned(),
        }
    }

    /// Shared state of an open trade
    pub fn context(&self, trade_id: &str) -> Option<TaskContext> {
        self.entry(trade_id)
            .map(|entry| entry.protocol.context().clone())
    }

    pub fn open_trade_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.trades_read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn closed_trade_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.closed_trades_read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn register(&self, context: TradeContext) -> TaskContext {
        let trade_id = context.trade.id.clone();
        let ctx = TaskContext::new(context, self.provider.clone());
        let mut protocol = TradeProtocol::new(ctx.clone(), &self.config);
        if let Some(interceptor) = &self.interceptor {
            protocol = protocol.with_interceptor(interceptor.clone());
        }
        self.trades().insert(
            trade_id,
            Arc::new(TradeEntry {
                protocol,
                pipeline: Mutex::new(()),
            }),
        );
        ctx
    }

    fn entry(&self, trade_id: &str) -> Option<Arc<TradeEntry>> {
        self.trades_read().get(trade_id).cloned()
    }

    fn trades(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<TradeEntry>>> {
        self.trades
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn trades_read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<TradeEntry>>> {
        self.trades
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn closed(&self) -> RwLockWriteGuard<'_, HashMap<String, Trade>> {
        self.closed_trades
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn closed_trades_read(&self) -> RwLockReadGuard<'_, HashMap<String, Trade>> {
        self.closed_trades
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
