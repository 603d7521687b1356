// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Trade persistence, one JSON record per trade id.

use std::collections::BTreeMap;
use std::sync::Mutex;

pub mod lmdb;

use crate::protocol::process_model::ProcessModel;
use crate::trade::Trade;
use crate::Error;

pub use self::lmdb::LmdbStore;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade: Trade,
    pub process_model: ProcessModel,
    /// Closed trades are kept for history and never resumed
    pub closed: bool,
}

impl TradeRecord {
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(Into::into)
    }
}

pub trait TradeStore: Send + Sync {
    fn save(&self, record: &TradeRecord) -> Result<(), Error>;

    fn load(&self, trade_id: &str) -> Result<Option<TradeRecord>, Error>;

    fn load_all(&self) -> Result<Vec<TradeRecord>, Error>;
}

/// Store keeping encoded records in memory, a restart is simulated by sharing it
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TradeStore for MemoryStore {
    fn save(&self, record: &TradeRecord) -> Result<(), Error> {
        let encoded = record.encode()?;
        self.records().insert(record.trade.id.clone(), encoded);
        Ok(())
    }

    fn load(&self, trade_id: &str) -> Result<Option<TradeRecord>, Error> {
        self.records()
            .get(trade_id)
            .map(|bytes| TradeRecord::decode(bytes))
            .transpose()
    }

    fn load_all(&self) -> Result<Vec<TradeRecord>, Error> {
        self.records()
            .values()
            .map(|bytes| TradeRecord::decode(bytes))
            .collect()
    }
}
