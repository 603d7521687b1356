// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::io;

use amplify::IoError;

use crate::protocol::tasks::TradeTask;
use crate::trade::state::State;

#[derive(Debug, Display, From, Error)]
#[display(doc_comments)]
#[non_exhaustive]
pub enum Error {
    /// Generic trade protocol errors
    #[display(inner)]
    Protocol(String),

    /// Node configuration errors, when parsing and manipulating `bisq-trade.toml` conf
    #[display("Configuration error: {0}")]
    #[from]
    Config(config::ConfigError),

    /// Generic I/O errors
    #[display(inner)]
    #[from(io::Error)]
    Io(IoError),

    /// A required value is missing: {0}
    Missing(String),

    /// Message belongs to trade {found} but was dispatched to trade {expected}
    TradeIdMismatch { expected: String, found: String },

    /// Message signature key does not match the trading peer's signature key
    InvalidSender,

    /// Message {message} is not expected while the trade is in phase {phase}
    UnexpectedMessage { message: String, phase: String },

    /// Hash of the peer's payment account payload does not match the hash in the contract
    PaymentAccountHashMismatch,

    /// Invalid state transition {from} -> {to}
    InvalidTransition { from: State, to: State },

    /// {0} is already set to a different transaction
    AlreadySet(String),

    /// Transaction validation failed: {0}
    Validation(String),

    /// Unknown trade {0}
    UnknownTrade(String),

    /// Unable to format output: {0}
    Output(String),

    /// Task {task} failed: {reason}
    TaskFailed { task: TradeTask, reason: String },

    /// Trade store errors
    #[display(inner)]
    #[from]
    Store(lmdb::Error),

    /// JSON (de)serialization errors
    #[display(inner)]
    #[from]
    Json(serde_json::Error),

    /// TOML serialization errors
    #[display(inner)]
    #[from]
    Toml(toml::ser::Error),

    /// Bitcoin key errors
    #[display(inner)]
    #[from]
    BitcoinKey(bitcoin::util::key::Error),

    /// Bitcoin secp256k1 curve errors
    #[display(inner)]
    #[from]
    BitcoinSecp256k1(bitcoin::secp256k1::Error),

    /// Bitcoin address errors
    #[display(inner)]
    #[from]
    BitcoinAddress(bitcoin::util::address::Error),

    /// Bitcoin consensus errors
    #[display(inner)]
    #[from]
    BitcoinConsensus(bitcoin::consensus::encode::Error),

    /// Bitcoin signature hash errors
    #[display(inner)]
    #[from]
    BitcoinSighash(bitcoin::util::sighash::Error),

    /// Bitcoin ECDSA signature errors
    #[display(inner)]
    #[from]
    BitcoinSignature(bitcoin::util::ecdsa::EcdsaSigError),

    /// Message identifiers errors
    #[display(inner)]
    #[from]
    Uuid(uuid::Error),
}

impl Error {
    /// Returns true for errors that signal a protocol bug or an adversarial peer
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Error::Missing(_)
                | Error::TradeIdMismatch { .. }
                | Error::InvalidSender
                | Error::PaymentAccountHashMismatch
                | Error::AlreadySet(_)
                | Error::Validation(_)
        )
    }
}
