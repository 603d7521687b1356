// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeMap;

use bitcoin::hashes::{ripemd160, Hash};

use super::offer::PaymentMethod;
use crate::Error;

/// Hash committing to a payment account payload inside the signed contract
pub type PaymentAccountPayloadHash = ripemd160::Hash;

/// Account details a trader reveals to its peer so the fiat leg can be settled
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAccountPayload {
    pub id: String,
    pub payment_method: PaymentMethod,
    pub holder_name: String,
    /// Method specific fields (IBAN, BIC, email, ...); ordered so the hash is stable
    pub fields: BTreeMap<String, String>,
    pub max_trade_period_secs: u64,
}

impl PaymentAccountPayload {
    /// Bytes committed to by [`PaymentAccountPayload::hash`]
    pub fn serialize_for_hash(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    pub fn hash(&self) -> Result<PaymentAccountPayloadHash, Error> {
        Ok(ripemd160::Hash::hash(&self.serialize_for_hash()?))
    }
}
