// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bitcoin::Amount;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;

use crate::bus::{NodeAddress, PubKeyRing};

lazy_static! {
    /// Trades above this amount with a chargeback-prone payment method are subject to the
    /// account-age restriction
    pub static ref TOLERATED_SMALL_TRADE_AMOUNT: Amount = Amount::from_sat(1_000_000);
}

/// Active ISO 4217 codes of national currencies, sorted
const FIAT_CURRENCY_CODES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD", "CAD",
    "CDF", "CHF", "CLP", "CNY", "COP", "CRC", "CUP", "CVE", "CZK", "DJF", "DKK", "DOP", "DZD",
    "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP", "GEL", "GHS", "GIP", "GMD", "GNF", "GTQ",
    "GYD", "HKD", "HNL", "HTG", "HUF", "IDR", "ILS", "INR", "IQD", "IRR", "ISK", "JMD", "JOD",
    "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW", "KWD", "KYD", "KZT", "LAK", "LBP", "LKR",
    "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD", "MMK", "MNT", "MOP", "MRU", "MUR", "MVR",
    "MWK", "MXN", "MYR", "MZN", "NAD", "NGN", "NIO", "NOK", "NPR", "NZD", "OMR", "PAB", "PEN",
    "PGK", "PHP", "PKR", "PLN", "PYG", "QAR", "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR",
    "SDG", "SEK", "SGD", "SHP", "SLE", "SOS", "SRD", "SSP", "STN", "SVC", "SYP", "SZL", "THB",
    "TJS", "TMT", "TND", "TOP", "TRY", "TTD", "TWD", "TZS", "UAH", "UGX", "USD", "UYU", "UZS",
    "VES", "VND", "VUV", "WST", "XAF", "XCD", "XOF", "XPF", "YER", "ZAR", "ZMW", "ZWL",
];

pub fn is_fiat_currency(currency_code: &str) -> bool {
    FIAT_CURRENCY_CODES.binary_search(&currency_code).is_ok()
}

/// Every traded asset that is not a national currency is an altcoin
pub fn is_crypto_currency(currency_code: &str) -> bool {
    !is_fiat_currency(currency_code)
}

/// Maker's view of the trade: `Buy` means the maker buys bitcoin
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum OfferDirection {
    Buy,
    Sell,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(Debug)]
#[non_exhaustive]
pub enum PaymentMethod {
    Sepa,
    SepaInstant,
    FasterPayments,
    NationalBank,
    SameBank,
    SpecificBanks,
    InteracETransfer,
    Zelle,
    Revolut,
    CashDeposit,
    MoneyGram,
    WesternUnion,
    F2F,
    BlockChains,
    BlockChainsInstant,
}

impl PaymentMethod {
    /// Payment methods whose transfers the sender's bank can claw back after the trade closed
    pub fn has_chargeback_risk(self, currency_code: &str) -> bool {
        if !is_fiat_currency(currency_code) {
            return false;
        }
        matches!(
            self,
            PaymentMethod::Sepa
                | PaymentMethod::SepaInstant
                | PaymentMethod::FasterPayments
                | PaymentMethod::NationalBank
                | PaymentMethod::SameBank
                | PaymentMethod::SpecificBanks
                | PaymentMethod::InteracETransfer
                | PaymentMethod::Zelle
                | PaymentMethod::Revolut
        )
    }
}

/// Immutable terms of the offer a trade was created from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub direction: OfferDirection,
    pub currency_code: String,
    pub payment_method: PaymentMethod,
    /// Price in the smallest unit of the counter currency per bitcoin
    pub price: u64,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub min_amount: Amount,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub buyer_security_deposit: Amount,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub seller_security_deposit: Amount,
    pub maker_node_address: NodeAddress,
    pub maker_pub_key_ring: PubKeyRing,
    pub date: DateTime<Utc>,
}

impl Offer {
    pub fn is_crypto(&self) -> bool {
        is_crypto_currency(&self.currency_code)
    }
}

/// A trade is risky when a chargeback-prone fiat payment method carries more than
/// [`TOLERATED_SMALL_TRADE_AMOUNT`]
pub fn is_trade_risky(offer: &Offer, trade_amount: Amount) -> bool {
    offer
        .payment_method
        .has_chargeback_risk(&offer.currency_code)
        && trade_amount > *TOLERATED_SMALL_TRADE_AMOUNT
}
