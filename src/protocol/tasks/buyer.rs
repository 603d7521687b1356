// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::str::FromStr;

use bitcoin::Address;
use uuid::Uuid;

use super::common::{
    dispatched_message, multisig_pub_keys, my_multisig_key, non_empty, payout_address,
    remove_mailbox_message, send_mailbox_message, unexpected_message, MessageStates,
};
use crate::bus::p2p::{
    CounterCurrencyTransferStartedMessage, DelayedPayoutTxSignatureResponse,
    ShareBuyerPaymentAccountMessage,
};
use crate::bus::TradeMessage;
use crate::protocol::temporal_safety::{validate_delayed_payout_tx, validate_payout_tx_input};
use crate::protocol::wallet::{AddressContext, PayoutTerms};
use crate::protocol::{TaskContext, TaskHandle};
use crate::trade::state::State;
use crate::{Error, LogStyle};

pub fn process_delayed_payout_tx_signature_request(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let uid = {
        let mut guard = ctx.lock();
        let request = match dispatched_message(&guard)? {
            TradeMessage::DelayedPayoutTxSignatureRequest(request) => request,
            other => return Err(unexpected_message(&guard, &other)),
        };
        let signature = non_empty(
            request.delayed_payout_tx_seller_signature,
            "seller's delayed payout tx signature",
        )?;
        if let Some(prepared) = &guard.process_model.prepared_delayed_payout_tx {
            if prepared.txid() != request.delayed_payout_tx.txid() {
                return Err(Error::AlreadySet("prepared delayed payout tx".to_string()));
            }
        }
        let model = &mut guard.process_model;
        model.prepared_delayed_payout_tx = Some(request.delayed_payout_tx);
        model.trading_peer.delayed_payout_tx_signature = Some(signature);
        guard.promote_peer_address();
        request.uid
    };
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}

pub fn verifies_prepared_delayed_payout_tx(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let (trade, prepared) = {
        let guard = ctx.lock();
        (
            guard.trade.clone(),
            guard.process_model.prepared_delayed_payout_tx.clone(),
        )
    };
    let tx = prepared.ok_or_else(|| Error::Missing("prepared delayed payout tx".to_string()))?;
    let deposit_tx = trade
        .deposit_tx()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    validate_delayed_payout_tx(&trade, &tx, &ctx.provider().dao.all_donation_addresses())?;
    validate_payout_tx_input(deposit_tx, &tx)?;
    handle.complete();
    Ok(())
}

pub fn signs_delayed_payout_tx(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let (trade, model, keys) = {
        let guard = ctx.lock();
        (
            guard.trade.clone(),
            guard.process_model.clone(),
            multisig_pub_keys(&guard)?,
        )
    };
    if model.delayed_payout_tx_signature.is_some() {
        handle.complete();
        return Ok(());
    }
    let tx = model
        .prepared_delayed_payout_tx
        .ok_or_else(|| Error::Missing("prepared delayed payout tx".to_string()))?;
    let deposit_tx = trade
        .deposit_tx()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    let (buyer_pub_key, seller_pub_key) = keys;
    let key = my_multisig_key(ctx, &trade.id, &buyer_pub_key)?;
    let signature = ctx.provider().trade_wallet.sign_delayed_payout_tx(
        &tx,
        deposit_tx,
        &key,
        &buyer_pub_key,
        &seller_pub_key,
    )?;
    ctx.lock().process_model.delayed_payout_tx_signature = Some(signature);
    handle.complete();
    Ok(())
}

pub fn sends_delayed_payout_tx_signature_response(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let message = {
        let guard = ctx.lock();
        TradeMessage::DelayedPayoutTxSignatureResponse(DelayedPayoutTxSignatureResponse {
            trade_id: guard.trade.id.clone(),
            uid: Uuid::new_v4(),
            sender_node_address: guard.process_model.my_node_address.clone(),
            delayed_payout_tx_buyer_signature: guard
                .process_model
                .delayed_payout_tx_signature
                .clone()
                .ok_or_else(|| Error::Missing("delayed payout tx signature".to_string()))?,
            deposit_tx: guard
                .trade
                .deposit_tx()
                .cloned()
                .ok_or_else(|| Error::Missing("deposit tx".to_string()))?,
        })
    };
    send_mailbox_message(ctx, handle, message, None)
}

pub fn process_deposit_tx_and_delayed_payout_tx_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let uid = {
        let mut guard = ctx.lock();
        let message = match dispatched_message(&guard)? {
            TradeMessage::DepositTxAndDelayedPayoutTx(message) => message,
            other => return Err(unexpected_message(&guard, &other)),
        };
        validate_payout_tx_input(&message.deposit_tx, &message.delayed_payout_tx)?;
        // applied on a copy so a rejected transaction leaves the trade untouched
        let mut trade = guard.trade.clone();
        trade.apply_deposit_tx(message.deposit_tx)?;
        trade.apply_delayed_payout_tx(message.delayed_payout_tx)?;
        trade.set_state(State::BuyerReceivedDepositTxPublishedMsg)?;
        guard.trade = trade;
        guard.promote_peer_address();
        message.uid
    };
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}

pub fn verifies_final_delayed_payout_tx(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let (trade, prepared) = {
        let guard = ctx.lock();
        (
            guard.trade.clone(),
            guard.process_model.prepared_delayed_payout_tx.clone(),
        )
    };
    let tx = trade
        .delayed_payout_tx()
        .ok_or_else(|| Error::Missing("delayed payout tx".to_string()))?;
    let deposit_tx = trade
        .deposit_tx()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    validate_delayed_payout_tx(&trade, tx, &ctx.provider().dao.all_donation_addresses())?;
    validate_payout_tx_input(deposit_tx, tx)?;
    // the witness is not part of the txid
    match prepared {
        Some(prepared) if prepared.txid() == tx.txid() => {}
        Some(prepared) => {
            return Err(Error::Validation(format!(
                "final delayed payout tx {} differs from the signed one {}",
                tx.txid(),
                prepared.txid()
            )))
        }
        None => return Err(Error::Missing("prepared delayed payout tx".to_string())),
    }
    handle.complete();
    Ok(())
}

pub fn sends_share_buyer_payment_account_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let message = {
        let guard = ctx.lock();
        TradeMessage::ShareBuyerPaymentAccount(ShareBuyerPaymentAccountMessage {
            trade_id: guard.trade.id.clone(),
            uid: Uuid::new_v4(),
            sender_node_address: guard.process_model.my_node_address.clone(),
            buyer_payment_account_payload: guard
                .process_model
                .payment_account_payload
                .clone()
                .ok_or_else(|| Error::Missing("my payment account payload".to_string()))?,
        })
    };
    send_mailbox_message(ctx, handle, message, None)
}

pub fn confirmed_in_ui_fiat_payment_initiated(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    handle.complete_with(|| {
        ctx.lock()
            .trade
            .set_state(State::BuyerConfirmedInUiFiatPaymentInitiated)?;
        Ok(())
    });
    Ok(())
}

pub fn sign_payout_tx(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let (trade, model, keys) = {
        let guard = ctx.lock();
        (
            guard.trade.clone(),
            guard.process_model.clone(),
            multisig_pub_keys(&guard)?,
        )
    };
    if model.payout_tx_signature.is_some() {
        handle.complete();
        return Ok(());
    }
    let deposit_tx = trade
        .deposit_tx()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    let contract = trade
        .contract()
        .ok_or_else(|| Error::Missing("contract".to_string()))?;
    let (buyer_pub_key, seller_pub_key) = keys;
    let (buyer_payout_amount, seller_payout_amount) = trade.payout_amounts();
    let terms = PayoutTerms {
        buyer_payout_amount,
        seller_payout_amount,
        buyer_payout_address: payout_address(ctx, &trade.id)?,
        seller_payout_address: Address::from_str(contract.seller_payout_address_string())?,
        buyer_multi_sig_pub_key: buyer_pub_key,
        seller_multi_sig_pub_key: seller_pub_key,
    };
    let key = my_multisig_key(ctx, &trade.id, &buyer_pub_key)?;
    let signature = ctx
        .provider()
        .trade_wallet
        .buyer_signs_payout_tx(deposit_tx, &terms, &key)?;
    ctx.lock().process_model.payout_tx_signature = Some(signature);
    handle.complete();
    Ok(())
}

pub fn send_counter_currency_transfer_started_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let trade_id = ctx.trade_id();
    let buyer_payout_address = payout_address(ctx, &trade_id)?;
    let message = {
        let guard = ctx.lock();
        TradeMessage::CounterCurrencyTransferStarted(CounterCurrencyTransferStartedMessage {
            trade_id,
            uid: Uuid::new_v4(),
            sender_node_address: guard.process_model.my_node_address.clone(),
            buyer_payout_address: buyer_payout_address.to_string(),
            buyer_signature: guard
                .process_model
                .payout_tx_signature
                .clone()
                .ok_or_else(|| Error::Missing("payout tx signature".to_string()))?,
            counter_currency_tx_id: guard.trade.counter_currency_tx_id.clone(),
            counter_currency_extra_data: guard.trade.counter_currency_extra_data.clone(),
        })
    };
    send_mailbox_message(
        ctx,
        handle,
        message,
        Some(MessageStates {
            sent: State::BuyerSentFiatPaymentInitiatedMsg,
            arrived: State::BuyerSawArrivedFiatPaymentInitiatedMsg,
            stored_in_mailbox: State::BuyerStoredInMailboxFiatPaymentInitiatedMsg,
            send_failed: State::BuyerSendFailedFiatPaymentInitiatedMsg,
        }),
    )
}

pub fn process_fiat_received_message(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let uid = {
        let mut guard = ctx.lock();
        let message = match dispatched_message(&guard)? {
            TradeMessage::FiatReceived(message) => message,
            other => return Err(unexpected_message(&guard, &other)),
        };
        guard.promote_peer_address();
        guard
            .trade
            .set_state(State::BuyerReceivedFiatPaymentReceiptMsg)?;
        message.uid
    };
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}

pub fn process_payout_tx_published_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let (trade_id, uid) = {
        let mut guard = ctx.lock();
        let message = match dispatched_message(&guard)? {
            TradeMessage::PayoutTxPublished(message) => message,
            other => return Err(unexpected_message(&guard, &other)),
        };
        let deposit_tx = guard
            .trade
            .deposit_tx()
            .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
        validate_payout_tx_input(deposit_tx, &message.payout_tx)?;
        let mut trade = guard.trade.clone();
        trade.apply_payout_tx(message.payout_tx)?;
        trade.set_state(State::BuyerReceivedPayoutTxPublishedMsg)?;
        guard.trade = trade;
        guard.promote_peer_address();
        (guard.trade.id.clone(), message.uid)
    };
    info!("{} | Payout tx published by the seller", trade_id.trade_id());
    ctx.provider()
        .btc_wallet
        .swap_trade_entry_to_available_entry(&trade_id, AddressContext::MultiSig);
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}

pub fn process_signed_witness_message(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let (uid, signed_witness) = {
        let guard = ctx.lock();
        match dispatched_message(&guard)? {
            TradeMessage::SignedWitness(message) => (message.uid, message.signed_witness),
            other => return Err(unexpected_message(&guard, &other)),
        }
    };
    ctx.provider()
        .account_age
        .publish_own_signed_witness(&signed_witness)?;
    ctx.lock().promote_peer_address();
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}
