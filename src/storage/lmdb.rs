// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fs;
use std::path::Path;

use lmdb::{Cursor, Transaction as LMDBTransaction};

use super::{TradeRecord, TradeStore};
use crate::{Error, LogStyle};

/// Trade store in an LMDB environment, keyed by trade id
pub struct LmdbStore(lmdb::Environment);

impl LmdbStore {
    pub fn open(path: &Path) -> Result<LmdbStore, Error> {
        fs::create_dir_all(path)?;
        let env = lmdb::Environment::new().open(path)?;
        env.create_db(None, lmdb::DatabaseFlags::empty())?;
        debug!("Opened trade store at {}", path.display().to_string().label());
        Ok(LmdbStore(env))
    }

    fn put(&self, key: &str, val: &[u8]) -> Result<(), lmdb::Error> {
        let db = self.0.open_db(None)?;
        let mut tx = self.0.begin_rw_txn()?;
        if tx.get(db, &key).is_ok() {
            tx.del(db, &key, None)?;
        }
        tx.put(db, &key, &val, lmdb::WriteFlags::empty())?;
        tx.commit()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, lmdb::Error> {
        let db = self.0.open_db(None)?;
        let tx = self.0.begin_ro_txn()?;
        let val = match tx.get(db, &key) {
            Ok(val) => Some(val.to_vec()),
            Err(lmdb::Error::NotFound) => None,
            Err(err) => return Err(err),
        };
        tx.abort();
        Ok(val)
    }

    fn values(&self) -> Result<Vec<Vec<u8>>, lmdb::Error> {
        let db = self.0.open_db(None)?;
        let tx = self.0.begin_ro_txn()?;
        let mut cursor = tx.open_ro_cursor(db)?;
        let res = cursor.iter().map(|(_, value)| value.to_vec()).collect();
        drop(cursor);
        tx.abort();
        Ok(res)
    }
}

impl TradeStore for LmdbStore {
    fn save(&self, record: &TradeRecord) -> Result<(), Error> {
        trace!("{} | Persisting trade", record.trade.id.trade_id());
        self.put(&record.trade.id, &record.encode()?)?;
        Ok(())
    }

    fn load(&self, trade_id: &str) -> Result<Option<TradeRecord>, Error> {
        self.get(trade_id)?
            .map(|bytes| TradeRecord::decode(&bytes))
            .transpose()
    }

    fn load_all(&self) -> Result<Vec<TradeRecord>, Error> {
        self.values()?
            .iter()
            .map(|bytes| TradeRecord::decode(bytes))
            .collect()
    }
}
