// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bitcoin::Amount;
use chrono::{DateTime, Utc};

use crate::trade::offer::PaymentMethod;
use crate::trade::Trade;
use crate::Error;

/// Anonymous market data of a completed deposit, published to the network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub currency_code: String,
    pub price: u64,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub date: DateTime<Utc>,
}

impl From<&Trade> for TradeStatistics {
    fn from(trade: &Trade) -> Self {
        TradeStatistics {
            currency_code: trade.offer.currency_code.clone(),
            price: trade.offer.price,
            amount: trade.amount,
            payment_method: trade.offer.payment_method,
            date: trade.take_offer_date,
        }
    }
}

pub trait TradeStatisticsService: Send + Sync {
    fn publish(&self, statistics: TradeStatistics) -> Result<(), Error>;
}
