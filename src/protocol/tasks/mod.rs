// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Protocol steps. Each step is a synchronous body that either settles its [`TaskHandle`]
//! before returning or registers a collaborator callback that settles it later. Returning an
//! error fails the step.

mod buyer;
mod common;
mod seller;

use super::{TaskContext, TaskHandle};
use crate::Error;

pub use common::RISK_RESTRICTIONS_VIOLATION;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(Debug)]
pub enum TradeTask {
    SellerVerifiesPeersAccountAge,
    SellerCreatesDelayedPayoutTx,
    SellerSignsDelayedPayoutTx,
    SellerSendDelayedPayoutTxSignatureRequest,
    SellerProcessDelayedPayoutTxSignatureResponse,
    SellerFinalizesDelayedPayoutTx,
    SellerSendsDepositTxAndDelayedPayoutTxMessage,
    SellerPublishesDepositTx,
    SellerPublishesTradeStatistics,
    SellerProcessShareBuyerPaymentAccountMessage,
    SellerProcessCounterCurrencyTransferStartedMessage,
    SellerConfirmedInUiFiatPaymentReceipt,
    SellerSendFiatReceivedMessage,
    SellerSignAndFinalizePayoutTx,
    SellerBroadcastPayoutTx,
    SellerSendPayoutTxPublishedMessage,
    SellerMaybeSignWitnessAndSendWitnessMessage,

    BuyerProcessDelayedPayoutTxSignatureRequest,
    BuyerVerifiesPreparedDelayedPayoutTx,
    BuyerSignsDelayedPayoutTx,
    BuyerSendsDelayedPayoutTxSignatureResponse,
    BuyerProcessDepositTxAndDelayedPayoutTxMessage,
    BuyerVerifiesFinalDelayedPayoutTx,
    BuyerSendsShareBuyerPaymentAccountMessage,
    BuyerConfirmedInUiFiatPaymentInitiated,
    BuyerSignPayoutTx,
    BuyerSendCounterCurrencyTransferStartedMessage,
    BuyerProcessFiatReceivedMessage,
    BuyerProcessPayoutTxPublishedMessage,
    BuyerProcessSignedWitnessMessage,
}

impl TradeTask {
    pub fn run(self, ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
        use TradeTask::*;
        match self {
            SellerVerifiesPeersAccountAge => seller::verifies_peers_account_age(ctx, handle),
            SellerCreatesDelayedPayoutTx => seller::creates_delayed_payout_tx(ctx, handle),
            SellerSignsDelayedPayoutTx => seller::signs_delayed_payout_tx(ctx, handle),
            SellerSendDelayedPayoutTxSignatureRequest => {
                seller::send_delayed_payout_tx_signature_request(ctx, handle)
            }
            SellerProcessDelayedPayoutTxSignatureResponse => {
                seller::process_delayed_payout_tx_signature_response(ctx, handle)
            }
            SellerFinalizesDelayedPayoutTx => seller::finalizes_delayed_payout_tx(ctx, handle),
            SellerSendsDepositTxAndDelayedPayoutTxMessage => {
                seller::sends_deposit_tx_and_delayed_payout_tx_message(ctx, handle)
            }
            SellerPublishesDepositTx => seller::publishes_deposit_tx(ctx, handle),
            SellerPublishesTradeStatistics => seller::publishes_trade_statistics(ctx, handle),
            SellerProcessShareBuyerPaymentAccountMessage => {
                seller::process_share_buyer_payment_account_message(ctx, handle)
            }
            SellerProcessCounterCurrencyTransferStartedMessage => {
                seller::process_counter_currency_transfer_started_message(ctx, handle)
            }
            SellerConfirmedInUiFiatPaymentReceipt => {
                seller::confirmed_in_ui_fiat_payment_receipt(ctx, handle)
            }
            SellerSendFiatReceivedMessage => seller::send_fiat_received_message(ctx, handle),
            SellerSignAndFinalizePayoutTx => seller::sign_and_finalize_payout_tx(ctx, handle),
            SellerBroadcastPayoutTx => seller::broadcast_payout_tx(ctx, handle),
            SellerSendPayoutTxPublishedMessage => {
                seller::send_payout_tx_published_message(ctx, handle)
            }
            SellerMaybeSignWitnessAndSendWitnessMessage => {
                seller::maybe_sign_witness_and_send_witness_message(ctx, handle)
            }

            BuyerProcessDelayedPayoutTxSignatureRequest => {
                buyer::process_delayed_payout_tx_signature_request(ctx, handle)
            }
            BuyerVerifiesPreparedDelayedPayoutTx => {
                buyer::verifies_prepared_delayed_payout_tx(ctx, handle)
            }
            BuyerSignsDelayedPayoutTx => buyer::signs_delayed_payout_tx(ctx, handle),
            BuyerSendsDelayedPayoutTxSignatureResponse => {
                buyer::sends_delayed_payout_tx_signature_response(ctx, handle)
            }
            BuyerProcessDepositTxAndDelayedPayoutTxMessage => {
                buyer::process_deposit_tx_and_delayed_payout_tx_message(ctx, handle)
            }
            BuyerVerifiesFinalDelayedPayoutTx => {
                buyer::verifies_final_delayed_payout_tx(ctx, handle)
            }
            BuyerSendsShareBuyerPaymentAccountMessage => {
                buyer::sends_share_buyer_payment_account_message(ctx, handle)
            }
            BuyerConfirmedInUiFiatPaymentInitiated => {
                buyer::confirmed_in_ui_fiat_payment_initiated(ctx, handle)
            }
            BuyerSignPayoutTx => buyer::sign_payout_tx(ctx, handle),
            BuyerSendCounterCurrencyTransferStartedMessage => {
                buyer::send_counter_currency_transfer_started_message(ctx, handle)
            }
            BuyerProcessFiatReceivedMessage => buyer::process_fiat_received_message(ctx, handle),
            BuyerProcessPayoutTxPublishedMessage => {
                buyer::process_payout_tx_published_message(ctx, handle)
            }
            BuyerProcessSignedWitnessMessage => {
                buyer::process_signed_witness_message(ctx, handle)
            }
        }
    }
}
