// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Task sequences of the buyer.

use super::tasks::TradeTask::{self, *};
use crate::bus::TradeMessage;
use crate::trade::state::{Phase, State};
use crate::trade::Trade;

pub const DELAYED_PAYOUT_TX_SIGNATURE_REQUEST: &[TradeTask] = &[
    BuyerProcessDelayedPayoutTxSignatureRequest,
    BuyerVerifiesPreparedDelayedPayoutTx,
    BuyerSignsDelayedPayoutTx,
    BuyerSendsDelayedPayoutTxSignatureResponse,
];

pub const DEPOSIT_TX_AND_DELAYED_PAYOUT_TX: &[TradeTask] = &[
    BuyerProcessDepositTxAndDelayedPayoutTxMessage,
    BuyerVerifiesFinalDelayedPayoutTx,
    BuyerSendsShareBuyerPaymentAccountMessage,
];

pub const PAYMENT_STARTED: &[TradeTask] = &[
    BuyerConfirmedInUiFiatPaymentInitiated,
    BuyerSignPayoutTx,
    BuyerSendCounterCurrencyTransferStartedMessage,
];

pub const FIAT_RECEIVED: &[TradeTask] = &[BuyerProcessFiatReceivedMessage];

pub const PAYOUT_TX_PUBLISHED: &[TradeTask] = &[BuyerProcessPayoutTxPublishedMessage];

pub const SIGNED_WITNESS: &[TradeTask] = &[BuyerProcessSignedWitnessMessage];

pub const PAYMENT_STARTED_PHASES: &[Phase] = &[Phase::DepositConfirmed, Phase::FiatSent];

/// Task sequence triggered by `message`, with the phases it is expected in
pub fn message_plan(message: &TradeMessage) -> Option<(&'static [TradeTask], &'static [Phase])> {
    match message {
        TradeMessage::DelayedPayoutTxSignatureRequest(_) => Some((
            DELAYED_PAYOUT_TX_SIGNATURE_REQUEST,
            &[Phase::Init, Phase::TakerFeePublished],
        )),
        TradeMessage::DepositTxAndDelayedPayoutTx(_) => Some((
            DEPOSIT_TX_AND_DELAYED_PAYOUT_TX,
            &[Phase::Init, Phase::TakerFeePublished, Phase::DepositPublished],
        )),
        TradeMessage::FiatReceived(_) => {
            Some((FIAT_RECEIVED, &[Phase::FiatSent, Phase::FiatReceived]))
        }
        TradeMessage::PayoutTxPublished(_) => Some((
            PAYOUT_TX_PUBLISHED,
            &[Phase::FiatSent, Phase::FiatReceived, Phase::PayoutPublished],
        )),
        TradeMessage::SignedWitness(_) => Some((
            SIGNED_WITNESS,
            &[Phase::FiatReceived, Phase::PayoutPublished, Phase::Withdrawn],
        )),
        _ => None,
    }
}

/// Remaining tasks of a trade interrupted between two triggers
pub fn resume_plan(trade: &Trade) -> Option<&'static [TradeTask]> {
    match trade.state() {
        State::BuyerConfirmedInUiFiatPaymentInitiated
        | State::BuyerSendFailedFiatPaymentInitiatedMsg => Some(&PAYMENT_STARTED[1..]),
        _ => None,
    }
}
