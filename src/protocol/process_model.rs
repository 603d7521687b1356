// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeMap;

use bitcoin::{PublicKey, Transaction};
use uuid::Uuid;

use crate::bus::{MessageState, NodeAddress, PubKeyRing, TradeMessage};
use crate::trade::payment::{PaymentAccountPayload, PaymentAccountPayloadHash};
use crate::Error;

/// What the local trader knows about its counterparty
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPeer {
    pub pub_key_ring: Option<PubKeyRing>,
    pub multi_sig_pub_key: Option<PublicKey>,
    pub payout_address_string: Option<String>,
    /// Peer's signature of the cooperative payout
    pub signature: Option<Vec<u8>>,
    pub delayed_payout_tx_signature: Option<Vec<u8>>,
    pub payment_account_payload: Option<PaymentAccountPayload>,
    pub hash_of_payment_account_payload: Option<PaymentAccountPayloadHash>,
    pub account_id: Option<String>,
}

/// Delivery state of an outbound message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatus {
    pub class_name: String,
    pub state: MessageState,
}

/// Per-trade protocol data threaded through the task pipeline next to the [`crate::trade::Trade`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessModel {
    pub offer_id: String,
    pub my_node_address: NodeAddress,
    pub pub_key_ring: PubKeyRing,
    pub trading_peer: TradingPeer,
    /// Sender of the message being processed, promoted to the trade's peer address once the
    /// message is validated
    pub temp_trading_peer_node_address: Option<NodeAddress>,
    pub my_multi_sig_pub_key: Option<PublicKey>,
    pub payment_account_payload: Option<PaymentAccountPayload>,
    pub prepared_delayed_payout_tx: Option<Transaction>,
    /// Local signature of the delayed payout
    pub delayed_payout_tx_signature: Option<Vec<u8>>,
    /// Local signature of the cooperative payout
    pub payout_tx_signature: Option<Vec<u8>>,
    #[serde(default)]
    pub message_states: BTreeMap<Uuid, MessageStatus>,
    #[serde(skip)]
    pub trade_message: Option<TradeMessage>,
}

impl ProcessModel {
    pub fn new(offer_id: String, my_node_address: NodeAddress, pub_key_ring: PubKeyRing) -> Self {
        ProcessModel {
            offer_id,
            my_node_address,
            pub_key_ring,
            trading_peer: TradingPeer::default(),
            temp_trading_peer_node_address: None,
            my_multi_sig_pub_key: None,
            payment_account_payload: None,
            prepared_delayed_payout_tx: None,
            delayed_payout_tx_signature: None,
            payout_tx_signature: None,
            message_states: BTreeMap::new(),
            trade_message: None,
        }
    }

    /// The inbound message the running pipeline was triggered by
    pub fn trade_message(&self) -> Result<&TradeMessage, Error> {
        self.trade_message
            .as_ref()
            .ok_or_else(|| Error::Missing("trade message".to_string()))
    }

    pub fn message_state(&self, uid: &Uuid) -> MessageState {
        self.message_states
            .get(uid)
            .map(|status| status.state)
            .unwrap_or_default()
    }

    pub fn set_message_state(&mut self, uid: Uuid, class_name: &str, state: MessageState) {
        self.message_states.insert(
            uid,
            MessageStatus {
                class_name: class_name.to_string(),
                state,
            },
        );
    }

    /// Records the peer's ack, returns false for an unknown message uid
    pub fn acknowledge(&mut self, uid: &Uuid, success: bool) -> bool {
        match self.message_states.get_mut(uid) {
            Some(status) => {
                status.state = if success {
                    MessageState::Acknowledged
                } else {
                    MessageState::Failed
                };
                true
            }
            None => false,
        }
    }
}
