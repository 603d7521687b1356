// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::str::FromStr;

use bitcoin::Address;
use chrono::Utc;
use uuid::Uuid;

use super::common::{
    broadcast_tx, dispatched_message, multisig_pub_keys, my_multisig_key, non_empty,
    payout_address, remove_mailbox_message, send_mailbox_message, unexpected_message,
    MessageStates, RISK_RESTRICTIONS_VIOLATION,
};
use crate::bus::p2p::{
    DelayedPayoutTxSignatureRequest, DepositTxAndDelayedPayoutTxMessage, FiatReceivedMessage,
    PayoutTxPublishedMessage, SignedWitnessMessage,
};
use crate::bus::TradeMessage;
use crate::protocol::dao::Param;
use crate::protocol::statistics::TradeStatistics;
use crate::protocol::temporal_safety::{validate_delayed_payout_tx, validate_payout_tx_input};
use crate::protocol::wallet::{AddressContext, PayoutTerms};
use crate::protocol::{TaskContext, TaskHandle};
use crate::trade::offer::is_trade_risky;
use crate::trade::state::State;
use crate::{Error, LogStyle};

pub fn verifies_peers_account_age(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let trade = ctx.trade();
    if !is_trade_risky(&trade.offer, trade.amount) {
        handle.complete();
        return Ok(());
    }
    if ctx
        .provider()
        .account_age
        .is_trade_peers_account_age_immature(&trade)
    {
        warn!(
            "{} | Peer's account is too young for a {} trade of {}",
            trade.id.trade_id(),
            trade.offer.payment_method,
            trade.amount
        );
        handle.failed(RISK_RESTRICTIONS_VIOLATION);
    } else {
        handle.complete();
    }
    Ok(())
}

pub fn creates_delayed_payout_tx(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let (trade, prepared) = {
        let guard = ctx.lock();
        (
            guard.trade.clone(),
            guard.process_model.prepared_delayed_payout_tx.is_some(),
        )
    };
    if prepared {
        debug!("{} | Delayed payout tx already created", trade.id.trade_id());
        handle.complete();
        return Ok(());
    }
    let deposit_tx = trade
        .deposit_tx()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    let dao = &ctx.provider().dao;
    let donation_address = dao
        .param_value(Param::RecipientBtcAddress)
        .ok_or_else(|| Error::Missing("donation address".to_string()))?;
    let tx = ctx.provider().trade_wallet.create_delayed_unsigned_payout_tx(
        deposit_tx,
        &Address::from_str(&donation_address)?,
        trade.trade_tx_fee,
        trade.lock_time,
    )?;
    validate_delayed_payout_tx(&trade, &tx, &dao.all_donation_addresses())?;
    debug!(
        "{} | Created delayed payout tx {}",
        trade.id.trade_id(),
        tx.txid().tx_hash()
    );
    ctx.lock().process_model.prepared_delayed_payout_tx = Some(tx);
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
    let key = my_multisig_key(ctx, &trade.id, &seller_pub_key)?;
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

pub fn send_delayed_payout_tx_signature_request(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let message = {
        let guard = ctx.lock();
        let model = &guard.process_model;
        TradeMessage::DelayedPayoutTxSignatureRequest(DelayedPayoutTxSignatureRequest {
            trade_id: guard.trade.id.clone(),
            uid: Uuid::new_v4(),
            sender_node_address: model.my_node_address.clone(),
            delayed_payout_tx: model
                .prepared_delayed_payout_tx
                .clone()
                .ok_or_else(|| Error::Missing("prepared delayed payout tx".to_string()))?,
            delayed_payout_tx_seller_signature: model
                .delayed_payout_tx_signature
                .clone()
                .ok_or_else(|| Error::Missing("delayed payout tx signature".to_string()))?,
        })
    };
    send_mailbox_message(ctx, handle, message, None)
}

pub fn process_delayed_payout_tx_signature_response(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let uid = {
        let mut guard = ctx.lock();
        let response = match dispatched_message(&guard)? {
            TradeMessage::DelayedPayoutTxSignatureResponse(response) => response,
            other => return Err(unexpected_message(&guard, &other)),
        };
        let signature = non_empty(
            response.delayed_payout_tx_buyer_signature,
            "buyer's delayed payout tx signature",
        )?;
        guard.trade.apply_deposit_tx(response.deposit_tx)?;
        guard.process_model.trading_peer.delayed_payout_tx_signature = Some(signature);
        guard.promote_peer_address();
        response.uid
    };
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}

pub fn finalizes_delayed_payout_tx(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let (trade, model, keys) = {
        let guard = ctx.lock();
        (
            guard.trade.clone(),
            guard.process_model.clone(),
            multisig_pub_keys(&guard)?,
        )
    };
    if trade.delayed_payout_tx().is_some() {
        handle.complete();
        return Ok(());
    }
    let (buyer_pub_key, seller_pub_key) = keys;
    let tx = model
        .prepared_delayed_payout_tx
        .ok_or_else(|| Error::Missing("prepared delayed payout tx".to_string()))?;
    let deposit_tx = trade
        .deposit_tx()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    let buyer_signature = model
        .trading_peer
        .delayed_payout_tx_signature
        .ok_or_else(|| Error::Missing("buyer's delayed payout tx signature".to_string()))?;
    let seller_signature = model
        .delayed_payout_tx_signature
        .ok_or_else(|| Error::Missing("delayed payout tx signature".to_string()))?;
    let tx = ctx.provider().trade_wallet.finalize_delayed_payout_tx(
        tx,
        deposit_tx,
        &buyer_pub_key,
        &seller_pub_key,
        &buyer_signature,
        &seller_signature,
    )?;
    validate_delayed_payout_tx(&trade, &tx, &ctx.provider().dao.all_donation_addresses())?;
    validate_payout_tx_input(deposit_tx, &tx)?;
    ctx.lock().trade.apply_delayed_payout_tx(tx)?;
    handle.complete();
    Ok(())
}

pub fn sends_deposit_tx_and_delayed_payout_tx_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let message = {
        let guard = ctx.lock();
        TradeMessage::DepositTxAndDelayedPayoutTx(DepositTxAndDelayedPayoutTxMessage {
            trade_id: guard.trade.id.clone(),
            uid: Uuid::new_v4(),
            sender_node_address: guard.process_model.my_node_address.clone(),
            deposit_tx: guard
                .trade
                .deposit_tx()
                .cloned()
                .ok_or_else(|| Error::Missing("deposit tx".to_string()))?,
            delayed_payout_tx: guard
                .trade
                .delayed_payout_tx()
                .cloned()
                .ok_or_else(|| Error::Missing("delayed payout tx".to_string()))?,
        })
    };
    send_mailbox_message(
        ctx,
        handle,
        message,
        Some(MessageStates {
            sent: State::SellerSentDepositTxPublishedMsg,
            arrived: State::SellerSawArrivedDepositTxPublishedMsg,
            stored_in_mailbox: State::SellerStoredInMailboxDepositTxPublishedMsg,
            send_failed: State::SellerSendFailedDepositTxPublishedMsg,
        }),
    )
}

pub fn publishes_deposit_tx(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let deposit_tx = ctx
        .lock()
        .trade
        .deposit_tx()
        .cloned()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    broadcast_tx(ctx, handle, deposit_tx, |ctx| {
        let trade_id = {
            let mut guard = ctx.lock();
            guard.trade.set_state(State::SellerPublishedDepositTx)?;
            guard.trade.id.clone()
        };
        ctx.provider()
            .btc_wallet
            .swap_trade_entry_to_available_entry(&trade_id, AddressContext::ReservedForTrade);
        Ok(())
    })
}

pub fn publishes_trade_statistics(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let trade = ctx.trade();
    if trade.deposit_tx().is_none() {
        return Err(Error::Missing("deposit tx".to_string()));
    }
    ctx.provider()
        .statistics
        .publish(TradeStatistics::from(&trade))?;
    handle.complete();
    Ok(())
}

pub fn process_share_buyer_payment_account_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let uid = {
        let mut guard = ctx.lock();
        let message = match dispatched_message(&guard)? {
            TradeMessage::ShareBuyerPaymentAccount(message) => message,
            other => return Err(unexpected_message(&guard, &other)),
        };
        let payload = message.buyer_payment_account_payload;
        let hash = payload.hash()?;
        let expected = guard
            .trade
            .contract()
            .ok_or_else(|| Error::Missing("contract".to_string()))?
            .hash_of_buyers_payment_account_payload();
        if hash != expected {
            error!(
                "{} | Buyer's payment account hash {} does not match {} of the contract",
                guard.trade.id.trade_id(),
                hash.err(),
                expected
            );
            return Err(Error::PaymentAccountHashMismatch);
        }
        let my_payload = guard
            .process_model
            .payment_account_payload
            .clone()
            .ok_or_else(|| Error::Missing("my payment account payload".to_string()))?;
        let is_maker = guard.trade.is_maker();
        if let Some(contract) = guard.trade.contract_mut() {
            contract.set_payment_account_payloads(payload.clone(), my_payload, is_maker);
        }
        let peer = &mut guard.process_model.trading_peer;
        peer.payment_account_payload = Some(payload);
        peer.hash_of_payment_account_payload = Some(hash);
        guard.promote_peer_address();
        message.uid
    };
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}

pub fn process_counter_currency_transfer_started_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let uid = {
        let mut guard = ctx.lock();
        let message = match dispatched_message(&guard)? {
            TradeMessage::CounterCurrencyTransferStarted(message) => message,
            other => return Err(unexpected_message(&guard, &other)),
        };
        let signature = non_empty(message.buyer_signature, "buyer's payout tx signature")?;
        if message.buyer_payout_address.is_empty() {
            return Err(Error::Missing("buyer payout address".to_string()));
        }
        Address::from_str(&message.buyer_payout_address)?;
        if let Some(contract) = guard.trade.contract() {
            if contract.buyer_payout_address_string() != message.buyer_payout_address {
                return Err(Error::Validation(format!(
                    "buyer payout address {} differs from {} of the contract",
                    message.buyer_payout_address,
                    contract.buyer_payout_address_string()
                )));
            }
        }

        let peer = &mut guard.process_model.trading_peer;
        peer.signature = Some(signature);
        peer.payout_address_string = Some(message.buyer_payout_address);
        guard.trade.counter_currency_tx_id =
            message.counter_currency_tx_id.filter(|id| !id.is_empty());
        guard.trade.counter_currency_extra_data = message
            .counter_currency_extra_data
            .filter(|data| !data.is_empty());
        guard.promote_peer_address();
        guard
            .trade
            .set_state(State::SellerReceivedFiatPaymentInitiatedMsg)?;
        message.uid
    };
    remove_mailbox_message(ctx, &uid);
    handle.complete();
    Ok(())
}

pub fn confirmed_in_ui_fiat_payment_receipt(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    handle.complete_with(|| {
        let mut guard = ctx.lock();
        if guard.trade.fiat_received_date.is_none() {
            guard.trade.fiat_received_date = Some(Utc::now());
        }
        guard
            .trade
            .set_state(State::SellerConfirmedInUiFiatPaymentReceipt)?;
        Ok(())
    });
    Ok(())
}

pub fn send_fiat_received_message(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let message = {
        let guard = ctx.lock();
        TradeMessage::FiatReceived(FiatReceivedMessage {
            trade_id: guard.trade.id.clone(),
            uid: Uuid::new_v4(),
            sender_node_address: guard.process_model.my_node_address.clone(),
        })
    };
    send_mailbox_message(
        ctx,
        handle,
        message,
        Some(MessageStates {
            sent: State::SellerSentFiatPaymentReceiptMsg,
            arrived: State::SellerSawArrivedFiatPaymentReceiptMsg,
            stored_in_mailbox: State::SellerStoredInMailboxFiatPaymentReceiptMsg,
            send_failed: State::SellerSendFailedFiatPaymentReceiptMsg,
        }),
    )
}

pub fn sign_and_finalize_payout_tx(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let (trade, model, keys) = {
        let guard = ctx.lock();
        (
            guard.trade.clone(),
            guard.process_model.clone(),
            multisig_pub_keys(&guard)?,
        )
    };
    if trade.payout_tx().is_some() {
        handle.complete();
        return Ok(());
    }
    let deposit_tx = trade
        .deposit_tx()
        .ok_or_else(|| Error::Missing("deposit tx".to_string()))?;
    let buyer_signature = model
        .trading_peer
        .signature
        .ok_or_else(|| Error::Missing("buyer's payout tx signature".to_string()))?;
    let buyer_payout_address = model
        .trading_peer
        .payout_address_string
        .ok_or_else(|| Error::Missing("buyer payout address".to_string()))?;
    let (buyer_pub_key, seller_pub_key) = keys;
    let (buyer_payout_amount, seller_payout_amount) = trade.payout_amounts();
    let terms = PayoutTerms {
        buyer_payout_amount,
        seller_payout_amount,
        buyer_payout_address: Address::from_str(&buyer_payout_address)?,
        seller_payout_address: payout_address(ctx, &trade.id)?,
        buyer_multi_sig_pub_key: buyer_pub_key,
        seller_multi_sig_pub_key: seller_pub_key,
    };
    let key = my_multisig_key(ctx, &trade.id, &seller_pub_key)?;
    let tx = ctx
        .provider()
        .trade_wallet
        .seller_signs_and_finalizes_payout_tx(deposit_tx, &buyer_signature, &terms, &key)?;
    validate_payout_tx_input(deposit_tx, &tx)?;
    ctx.lock().trade.apply_payout_tx(tx)?;
    handle.complete();
    Ok(())
}

pub fn broadcast_payout_tx(ctx: &TaskContext, handle: TaskHandle) -> Result<(), Error> {
    let payout_tx = ctx
        .lock()
        .trade
        .payout_tx()
        .cloned()
        .ok_or_else(|| Error::Missing("payout tx".to_string()))?;
    broadcast_tx(ctx, handle, payout_tx, |ctx| {
        let trade_id = {
            let mut guard = ctx.lock();
            guard.trade.set_state(State::SellerPublishedPayoutTx)?;
            guard.trade.id.clone()
        };
        ctx.provider()
            .btc_wallet
            .swap_trade_entry_to_available_entry(&trade_id, AddressContext::MultiSig);
        Ok(())
    })
}

pub fn send_payout_tx_published_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let message = {
        let guard = ctx.lock();
        TradeMessage::PayoutTxPublished(PayoutTxPublishedMessage {
            trade_id: guard.trade.id.clone(),
            uid: Uuid::new_v4(),
            sender_node_address: guard.process_model.my_node_address.clone(),
            payout_tx: guard
                .trade
                .payout_tx()
                .cloned()
                .ok_or_else(|| Error::Missing("payout tx".to_string()))?,
        })
    };
    send_mailbox_message(
        ctx,
        handle,
        message,
        Some(MessageStates {
            sent: State::SellerSentPayoutTxPublishedMsg,
            arrived: State::SellerSawArrivedPayoutTxPublishedMsg,
            stored_in_mailbox: State::SellerStoredInMailboxPayoutTxPublishedMsg,
            send_failed: State::SellerSendFailedPayoutTxPublishedMsg,
        }),
    )
}

/// Signs the buyer's account age witness when this trade qualifies; otherwise a no-op
pub fn maybe_sign_witness_and_send_witness_message(
    ctx: &TaskContext,
    handle: TaskHandle,
) -> Result<(), Error> {
    let trade = ctx.trade();
    let account_age = &ctx.provider().account_age;
    if !account_age.is_sign_witness_trade(&trade) {
        debug!("{} | Not a witness signing trade", trade.id.trade_id());
        handle.complete();
        return Ok(());
    }
    let signed_witness =
        match account_age.trader_sign_and_publish_peers_account_age_witness(&trade)? {
            Some(signed_witness) => signed_witness,
            None => {
                info!(
                    "{} | Buyer's account age witness unavailable, nothing to sign",
                    trade.id.trade_id()
                );
                handle.complete();
                return Ok(());
            }
        };
    let message = TradeMessage::SignedWitness(SignedWitnessMessage {
        trade_id: trade.id.clone(),
        uid: Uuid::new_v4(),
        sender_node_address: ctx.lock().process_model.my_node_address.clone(),
        signed_witness,
    });
    send_mailbox_message(
        ctx,
        handle,
        message,
        Some(MessageStates {
            sent: State::SellerSentSignedWitnessMsg,
            arrived: State::SellerSawArrivedSignedWitnessMsg,
            stored_in_mailbox: State::SellerStoredInMailboxSignedWitnessMsg,
            send_failed: State::SellerSendFailedSignedWitnessMsg,
        }),
    )
}
