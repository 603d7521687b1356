// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Task sequences of the seller.

use super::tasks::TradeTask::{self, *};
use crate::bus::TradeMessage;
use crate::trade::state::{Phase, State};
use crate::trade::Trade;

pub const START: &[TradeTask] = &[
    SellerVerifiesPeersAccountAge,
    SellerCreatesDelayedPayoutTx,
    SellerSignsDelayedPayoutTx,
    SellerSendDelayedPayoutTxSignatureRequest,
];

pub const DELAYED_PAYOUT_TX_SIGNATURE_RESPONSE: &[TradeTask] = &[
    SellerProcessDelayedPayoutTxSignatureResponse,
    SellerFinalizesDelayedPayoutTx,
    SellerSendsDepositTxAndDelayedPayoutTxMessage,
    SellerPublishesDepositTx,
    SellerPublishesTradeStatistics,
];

pub const SHARE_BUYER_PAYMENT_ACCOUNT: &[TradeTask] =
    &[SellerProcessShareBuyerPaymentAccountMessage];

pub const COUNTER_CURRENCY_TRANSFER_STARTED: &[TradeTask] =
    &[SellerProcessCounterCurrencyTransferStartedMessage];

pub const PAYMENT_RECEIVED: &[TradeTask] = &[
    SellerConfirmedInUiFiatPaymentReceipt,
    SellerSendFiatReceivedMessage,
    SellerSignAndFinalizePayoutTx,
    SellerBroadcastPayoutTx,
    SellerSendPayoutTxPublishedMessage,
    SellerMaybeSignWitnessAndSendWitnessMessage,
];

pub const START_PHASES: &[Phase] = &[Phase::Init, Phase::TakerFeePublished];

pub const PAYMENT_RECEIVED_PHASES: &[Phase] = &[Phase::FiatSent, Phase::FiatReceived];

/// Task sequence triggered by `message`, with the phases it is expected in
pub fn message_plan(message: &TradeMessage) -> Option<(&'static [TradeTask], &'static [Phase])> {
    match message {
        TradeMessage::DelayedPayoutTxSignatureResponse(_) => Some((
            DELAYED_PAYOUT_TX_SIGNATURE_RESPONSE,
            &[Phase::Init, Phase::TakerFeePublished],
        )),
        TradeMessage::ShareBuyerPaymentAccount(_) => Some((
            SHARE_BUYER_PAYMENT_ACCOUNT,
            &[Phase::DepositPublished, Phase::DepositConfirmed, Phase::FiatSent],
        )),
        TradeMessage::CounterCurrencyTransferStarted(_) => Some((
            COUNTER_CURRENCY_TRANSFER_STARTED,
            &[Phase::DepositPublished, Phase::DepositConfirmed, Phase::FiatSent],
        )),
        _ => None,
    }
}

/// Remaining tasks of a trade interrupted between two triggers
pub fn resume_plan(trade: &Trade) -> Option<&'static [TradeTask]> {
    use State::*;
    match trade.state() {
        Preparation | TakerPublishedTakerFeeTx if trade.delayed_payout_tx().is_some() => {
            Some(&DELAYED_PAYOUT_TX_SIGNATURE_RESPONSE[2..])
        }
        SellerSendFailedDepositTxPublishedMsg => Some(&DELAYED_PAYOUT_TX_SIGNATURE_RESPONSE[2..]),
        SellerSentDepositTxPublishedMsg
        | SellerSawArrivedDepositTxPublishedMsg
        | SellerStoredInMailboxDepositTxPublishedMsg => {
            Some(&DELAYED_PAYOUT_TX_SIGNATURE_RESPONSE[3..])
        }
        SellerConfirmedInUiFiatPaymentReceipt | SellerSendFailedFiatPaymentReceiptMsg => {
            Some(&PAYMENT_RECEIVED[1..])
        }
        SellerSentFiatPaymentReceiptMsg
        | SellerSawArrivedFiatPaymentReceiptMsg
        | SellerStoredInMailboxFiatPaymentReceiptMsg => Some(&PAYMENT_RECEIVED[2..]),
        SellerPublishedPayoutTx | SellerSendFailedPayoutTxPublishedMsg => {
            Some(&PAYMENT_RECEIVED[4..])
        }
        SellerSendFailedSignedWitnessMsg => Some(&PAYMENT_RECEIVED[5..]),
        _ => None,
    }
}
