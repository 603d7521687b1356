// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt;

use crate::bus::DecryptedMessageWithPubKey;

/// Trigger of a task sequence on one trade
#[derive(Clone, Debug)]
pub enum TradeEvent {
    /// Seller kicks off the protocol once the contract is agreed
    Start,
    /// Inbound message from the trading peer
    Message(DecryptedMessageWithPubKey),
    /// Buyer confirmed in the UI that the fiat transfer was started
    PaymentStarted,
    /// Seller confirmed in the UI that the fiat payment arrived
    PaymentReceived,
    /// Wallet saw the deposit transaction confirmed
    DepositConfirmed,
    /// Continue an interrupted sequence after a restart
    Resume,
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeEvent::Start => write!(f, "start"),
            TradeEvent::Message(envelope) => write!(f, "{} message", envelope.message),
            TradeEvent::PaymentStarted => write!(f, "payment started"),
            TradeEvent::PaymentReceived => write!(f, "payment received"),
            TradeEvent::DepositConfirmed => write!(f, "deposit confirmed"),
            TradeEvent::Resume => write!(f, "resume"),
        }
    }
}
