// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Trade protocol: task steps, the runner executing them and the collaborators they call.

use std::sync::{Arc, Mutex, MutexGuard};

pub mod account_age;
pub mod buyer;
pub mod dao;
pub mod mailbox;
pub mod process_model;
pub mod runtime;
pub mod seller;
pub mod statistics;
pub mod task;
pub mod task_runner;
pub mod tasks;
pub mod temporal_safety;
pub mod wallet;

use crate::storage::{TradeRecord, TradeStore};
use crate::trade::Trade;
use crate::Error;
use account_age::AccountAgeWitnessService;
use dao::DaoFacade;
use mailbox::MailboxService;
use process_model::ProcessModel;
use statistics::TradeStatisticsService;
use wallet::{BtcWalletService, TradeWalletService};

pub use runtime::TradeProtocol;
pub use task::{TaskHandle, TaskOutcome, TaskState};
pub use task_runner::{TaskInterceptor, TaskRunner};
pub use tasks::TradeTask;

/// Mutable state of one trade: the persisted trade and its protocol data
#[derive(Clone, Debug)]
pub struct TradeContext {
    pub trade: Trade,
    pub process_model: ProcessModel,
}

impl TradeContext {
    pub fn new(trade: Trade, process_model: ProcessModel) -> Self {
        TradeContext {
            trade,
            process_model,
        }
    }

    /// Adopts the sender of the validated message as the trade's peer address
    pub fn promote_peer_address(&mut self) {
        if let Some(address) = self.process_model.temp_trading_peer_node_address.clone() {
            self.trade.trading_peer_node_address = Some(address);
        }
    }

    pub fn to_record(&self, closed: bool) -> TradeRecord {
        TradeRecord {
            trade: self.trade.clone(),
            process_model: self.process_model.clone(),
            closed,
        }
    }
}

impl From<TradeRecord> for TradeContext {
    fn from(record: TradeRecord) -> Self {
        TradeContext::new(record.trade, record.process_model)
    }
}

/// Collaborators of the trade protocol
#[derive(Clone)]
pub struct Provider {
    pub trade_wallet: Arc<dyn TradeWalletService>,
    pub btc_wallet: Arc<dyn BtcWalletService>,
    pub mailbox: Arc<dyn MailboxService>,
    pub account_age: Arc<dyn AccountAgeWitnessService>,
    pub dao: Arc<dyn DaoFacade>,
    pub statistics: Arc<dyn TradeStatisticsService>,
    pub store: Arc<dyn TradeStore>,
}

/// Handle on one trade's state and collaborators, shared by the tasks of its pipeline and the
/// callbacks they register.
///
/// The context lock is only held for short synchronous sections, never across an await and
/// never while calling a collaborator.
#[derive(Clone)]
pub struct TaskContext {
    shared: Arc<Mutex<TradeContext>>,
    provider: Provider,
}

impl TaskContext {
    pub fn new(context: TradeContext, provider: Provider) -> Self {
        TaskContext {
            shared: Arc::new(Mutex::new(context)),
            provider,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, TradeContext> {
        // a panicking task is reported as a failure, its partial state stays visible
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn trade_id(&self) -> String {
        self.lock().trade.id.clone()
    }

    pub fn trade(&self) -> Trade {
        self.lock().trade.clone()
    }

    pub fn snapshot(&self) -> TradeContext {
        self.lock().clone()
    }

    /// Writes the trade and its process model to the store
    pub fn request_persistence(&self) -> Result<(), Error> {
        let record = self.lock().to_record(false);
        self.provider.store.save(&record)
    }
}
