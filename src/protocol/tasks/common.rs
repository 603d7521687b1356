// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bitcoin::{PrivateKey, PublicKey, Transaction};
use uuid::Uuid;

use crate::bus::{MessageState, TradeMessage};
use crate::protocol::mailbox::MailboxOutcome;
use crate::protocol::wallet::AddressContext;
use crate::protocol::{TaskContext, TaskHandle, TradeContext};
use crate::trade::state::State;
use crate::{Error, LogStyle};

pub const RISK_RESTRICTIONS_VIOLATION: &str = "Violation of security restrictions:\n  \
    - The peer's account was created after March 1st 2019\n  \
    - The trade amount exceeds 0.01 BTC\n  \
    - The payment method for that offer is considered risky for bank chargebacks\n";

/// Trade states recording the delivery of a mailbox message
#[derive(Clone, Copy, Debug)]
pub struct MessageStates {
    pub sent: State,
    pub arrived: State,
    pub stored_in_mailbox: State,
    pub send_failed: State,
}

/// Sends `message` to the trading peer. The task settles from the delivery callback: arrival
/// and mailbox storage complete it, a fault fails it. With `states` the delivery is also
/// recorded in the trade state.
pub fn send_mailbox_message(
    ctx: &TaskContext,
    handle: TaskHandle,
    message: TradeMessage,
    states: Option<MessageStates>,
) -> Result<(), Error> {
    let uid = message.uid();
    let class_name = message.class_name();
    let (trade_id, peer, pub_key_ring) = {
        let mut guard = ctx.lock();
        let peer = guard
            .trade
            .trading_peer_node_address
            .clone()
            .ok_or_else(|| Error::Missing("trading peer node address".to_string()))?;
        let pub_key_ring = guard
            .process_model
            .trading_peer
            .pub_key_ring
            .clone()
            .ok_or_else(|| Error::Missing("trading peer pub key ring".to_string()))?;
        if let Some(states) = states {
            guard.trade.set_state(states.sent)?;
        }
        guard
            .process_model
            .set_message_state(uid, class_name, MessageState::Sent);
        (guard.trade.id.clone(), peer, pub_key_ring)
    };
    info!(
        "{} | Send {} to peer {}. uid={}",
        trade_id.trade_id(),
        class_name.label(),
        peer.addr(),
        uid
    );

    let callback_ctx = ctx.clone();
    let callback_peer = peer.clone();
    ctx.provider().mailbox.send_encrypted_mailbox_message(
        &peer,
        &pub_key_ring,
        message,
        Box::new(move |outcome| {
            let record = |message_state: MessageState, state: Option<State>| -> Result<(), Error> {
                let mut guard = callback_ctx.lock();
                guard
                    .process_model
                    .set_message_state(uid, class_name, message_state);
                if let Some(state) = state {
                    guard.trade.set_state(state)?;
                }
                Ok(())
            };
            match outcome {
                MailboxOutcome::Arrived => {
                    handle.complete_with(|| {
                        info!(
                            "{} | {} arrived at peer {}. uid={}",
                            trade_id.trade_id(),
                            class_name.label(),
                            callback_peer.addr(),
                            uid
                        );
                        record(MessageState::Arrived, states.map(|s| s.arrived))
                    });
                }
                MailboxOutcome::StoredInMailbox => {
                    handle.complete_with(|| {
                        info!(
                            "{} | {} stored in mailbox of peer {}. uid={}",
                            trade_id.trade_id(),
                            class_name.label(),
                            callback_peer.addr(),
                            uid
                        );
                        record(
                            MessageState::StoredInMailbox,
                            states.map(|s| s.stored_in_mailbox),
                        )
                    });
                }
                MailboxOutcome::Fault(reason) => {
                    let reason = format!("Sending {} failed: {}", class_name, reason);
                    error!("{} | {}", trade_id.trade_id(), reason.err());
                    handle.failed_with(reason, || {
                        record(MessageState::Failed, states.map(|s| s.send_failed))
                    });
                }
            }
        }),
    );
    Ok(())
}

/// Broadcasts `tx` unless the wallet already sees it in the network. `on_published` runs once,
/// either right away or from the broadcast callback, and settles the task with its result.
pub fn broadcast_tx<F>(
    ctx: &TaskContext,
    handle: TaskHandle,
    tx: Transaction,
    on_published: F,
) -> Result<(), Error>
where
    F: FnOnce(&TaskContext) -> Result<(), Error> + Send + 'static,
{
    let trade_id = ctx.trade_id();
    let txid = tx.txid();
    let confidence = ctx.provider().trade_wallet.confidence(&txid);
    if confidence.is_published() {
        info!(
            "{} | Tx {} already in the network ({}), skipping broadcast",
            trade_id.trade_id(),
            txid.tx_hash(),
            confidence
        );
        handle.complete_with(|| on_published(ctx));
        return Ok(());
    }

    debug!(
        "{} | Broadcasting tx {}",
        trade_id.trade_id(),
        txid.tx_hash()
    );
    let callback_ctx = ctx.clone();
    ctx.provider().trade_wallet.broadcast_tx(
        tx,
        Box::new(move |result| match result {
            Ok(tx) => {
                handle.complete_with(|| {
                    info!(
                        "{} | Broadcast of tx {} completed",
                        trade_id.trade_id(),
                        tx.txid().tx_hash()
                    );
                    on_published(&callback_ctx)
                });
            }
            Err(err) => {
                handle.failed(format!("Broadcasting tx {} failed: {}", txid, err));
            }
        }),
    );
    Ok(())
}

/// Returns the message under processing after checking it was sent for this trade
pub fn dispatched_message(guard: &TradeContext) -> Result<TradeMessage, Error> {
    let message = guard.process_model.trade_message()?;
    if message.trade_id() != guard.trade.id {
        return Err(Error::TradeIdMismatch {
            expected: guard.trade.id.clone(),
            found: message.trade_id().to_string(),
        });
    }
    Ok(message.clone())
}

pub fn unexpected_message(guard: &TradeContext, message: &TradeMessage) -> Error {
    Error::UnexpectedMessage {
        message: message.to_string(),
        phase: guard.trade.phase().to_string(),
    }
}

pub fn non_empty(bytes: Vec<u8>, name: &str) -> Result<Vec<u8>, Error> {
    if bytes.is_empty() {
        Err(Error::Missing(name.to_string()))
    } else {
        Ok(bytes)
    }
}

pub fn remove_mailbox_message(ctx: &TaskContext, uid: &Uuid) {
    ctx.provider().mailbox.remove_mailbox_msg(uid);
}

/// Buyer and seller multisig keys, in the order of the redeem script
pub fn multisig_pub_keys(guard: &TradeContext) -> Result<(PublicKey, PublicKey), Error> {
    let mine = guard
        .process_model
        .my_multi_sig_pub_key
        .ok_or_else(|| Error::Missing("my multisig pub key".to_string()))?;
    let peers = guard
        .process_model
        .trading_peer
        .multi_sig_pub_key
        .ok_or_else(|| Error::Missing("trading peer multisig pub key".to_string()))?;
    if guard.trade.is_buyer() {
        Ok((mine, peers))
    } else {
        Ok((peers, mine))
    }
}

/// Private key of the local multisig key, which must be the key the wallet reserved for the
/// trade
pub fn my_multisig_key(
    ctx: &TaskContext,
    trade_id: &str,
    my_pub_key: &PublicKey,
) -> Result<PrivateKey, Error> {
    let btc_wallet = &ctx.provider().btc_wallet;
    let entry = btc_wallet
        .address_entry(trade_id, AddressContext::MultiSig)
        .ok_or_else(|| Error::Missing(format!("multisig address entry of trade {}", trade_id)))?;
    if entry.pub_key != *my_pub_key {
        return Err(Error::Validation(format!(
            "multisig pub key {} of the address entry does not match {} of trade {}",
            entry.pub_key, my_pub_key, trade_id
        )));
    }
    btc_wallet.multi_sig_key_pair(trade_id, my_pub_key)
}

pub fn payout_address(ctx: &TaskContext, trade_id: &str) -> Result<bitcoin::Address, Error> {
    ctx.provider()
        .btc_wallet
        .address_entry(trade_id, AddressContext::TradePayout)
        .map(|entry| entry.address)
        .ok_or_else(|| Error::Missing(format!("payout address entry of trade {}", trade_id)))
}
