// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bitcoin::Transaction;
use uuid::Uuid;

use super::{AckMessage, NodeAddress};
use crate::protocol::account_age::SignedWitness;
use crate::trade::payment::PaymentAccountPayload;

#[derive(Clone, Debug, Display, Serialize, Deserialize)]
#[display(inner)]
#[non_exhaustive]
pub enum TradeMessage {
    #[display("delayed payout tx signature request")]
    DelayedPayoutTxSignatureRequest(DelayedPayoutTxSignatureRequest),

    #[display("delayed payout tx signature response")]
    DelayedPayoutTxSignatureResponse(DelayedPayoutTxSignatureResponse),

    #[display("deposit tx and delayed payout tx")]
    DepositTxAndDelayedPayoutTx(DepositTxAndDelayedPayoutTxMessage),

    #[display("share buyer payment account")]
    ShareBuyerPaymentAccount(ShareBuyerPaymentAccountMessage),

    #[display("counter currency transfer started")]
    CounterCurrencyTransferStarted(CounterCurrencyTransferStartedMessage),

    #[display("fiat received")]
    FiatReceived(FiatReceivedMessage),

    #[display("payout tx published")]
    PayoutTxPublished(PayoutTxPublishedMessage),

    #[display("signed witness")]
    SignedWitness(SignedWitnessMessage),

    #[display("ack")]
    Ack(AckMessage),
}

impl TradeMessage {
    pub fn trade_id(&self) -> &str {
        match self {
            TradeMessage::DelayedPayoutTxSignatureRequest(DelayedPayoutTxSignatureRequest {
                trade_id,
                ..
            })
            | TradeMessage::DelayedPayoutTxSignatureResponse(DelayedPayoutTxSignatureResponse {
                trade_id,
                ..
            })
            | TradeMessage::DepositTxAndDelayedPayoutTx(DepositTxAndDelayedPayoutTxMessage {
                trade_id,
                ..
            })
            | TradeMessage::ShareBuyerPaymentAccount(ShareBuyerPaymentAccountMessage {
                trade_id,
                ..
            })
            | TradeMessage::CounterCurrencyTransferStarted(
                CounterCurrencyTransferStartedMessage { trade_id, .. },
            )
            | TradeMessage::FiatReceived(FiatReceivedMessage { trade_id, .. })
            | TradeMessage::PayoutTxPublished(PayoutTxPublishedMessage { trade_id, .. })
            | TradeMessage::SignedWitness(SignedWitnessMessage { trade_id, .. })
            | TradeMessage::Ack(AckMessage { trade_id, .. }) => trade_id,
        }
    }

    pub fn uid(&self) -> Uuid {
        match self {
            TradeMessage::DelayedPayoutTxSignatureRequest(DelayedPayoutTxSignatureRequest {
                uid,
                ..
            })
            | TradeMessage::DelayedPayoutTxSignatureResponse(DelayedPayoutTxSignatureResponse {
                uid,
                ..
            })
            | TradeMessage::DepositTxAndDelayedPayoutTx(DepositTxAndDelayedPayoutTxMessage {
                uid,
                ..
            })
            | TradeMessage::ShareBuyerPaymentAccount(ShareBuyerPaymentAccountMessage {
                uid, ..
            })
            | TradeMessage::CounterCurrencyTransferStarted(
                CounterCurrencyTransferStartedMessage { uid, .. },
            )
            | TradeMessage::FiatReceived(FiatReceivedMessage { uid, .. })
            | TradeMessage::PayoutTxPublished(PayoutTxPublishedMessage { uid, .. })
            | TradeMessage::SignedWitness(SignedWitnessMessage { uid, .. })
            | TradeMessage::Ack(AckMessage { uid, .. }) => *uid,
        }
    }

    pub fn sender_node_address(&self) -> &NodeAddress {
        match self {
            TradeMessage::DelayedPayoutTxSignatureRequest(DelayedPayoutTxSignatureRequest {
                sender_node_address,
                ..
            })
            | TradeMessage::DelayedPayoutTxSignatureResponse(DelayedPayoutTxSignatureResponse {
                sender_node_address,
                ..
            })
            | TradeMessage::DepositTxAndDelayedPayoutTx(DepositTxAndDelayedPayoutTxMessage {
                sender_node_address,
                ..
            })
            | TradeMessage::ShareBuyerPaymentAccount(ShareBuyerPaymentAccountMessage {
                sender_node_address,
                ..
            })
            | TradeMessage::CounterCurrencyTransferStarted(
                CounterCurrencyTransferStartedMessage {
                    sender_node_address,
                    ..
                },
            )
            | TradeMessage::FiatReceived(FiatReceivedMessage {
                sender_node_address,
                ..
            })
            | TradeMessage::PayoutTxPublished(PayoutTxPublishedMessage {
                sender_node_address,
                ..
            })
            | TradeMessage::SignedWitness(SignedWitnessMessage {
                sender_node_address,
                ..
            })
            | TradeMessage::Ack(AckMessage {
                sender_node_address,
                ..
            }) => sender_node_address,
        }
    }

    /// Name identifying the message kind in acknowledgements
    pub fn class_name(&self) -> &'static str {
        match self {
            TradeMessage::DelayedPayoutTxSignatureRequest(_) => "DelayedPayoutTxSignatureRequest",
            TradeMessage::DelayedPayoutTxSignatureResponse(_) => {
                "DelayedPayoutTxSignatureResponse"
            }
            TradeMessage::DepositTxAndDelayedPayoutTx(_) => "DepositTxAndDelayedPayoutTxMessage",
            TradeMessage::ShareBuyerPaymentAccount(_) => "ShareBuyerPaymentAccountMessage",
            TradeMessage::CounterCurrencyTransferStarted(_) => {
                "CounterCurrencyTransferStartedMessage"
            }
            TradeMessage::FiatReceived(_) => "FiatReceivedMessage",
            TradeMessage::PayoutTxPublished(_) => "PayoutTxPublishedMessage",
            TradeMessage::SignedWitness(_) => "SignedWitnessMessage",
            TradeMessage::Ack(_) => "AckMessage",
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, TradeMessage::Ack(_))
    }
}

/// Seller asks the buyer to co-sign the delayed payout transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelayedPayoutTxSignatureRequest {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    pub delayed_payout_tx: Transaction,
    #[serde(with = "hex")]
    pub delayed_payout_tx_seller_signature: Vec<u8>,
}

/// Buyer's signature of the delayed payout transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelayedPayoutTxSignatureResponse {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    #[serde(with = "hex")]
    pub delayed_payout_tx_buyer_signature: Vec<u8>,
    pub deposit_tx: Transaction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositTxAndDelayedPayoutTxMessage {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    pub deposit_tx: Transaction,
    pub delayed_payout_tx: Transaction,
}

/// Buyer reveals its payment account once the deposit is locked, the seller checks it against
/// the hash committed in the contract
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShareBuyerPaymentAccountMessage {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    pub buyer_payment_account_payload: PaymentAccountPayload,
}

/// Buyer started the fiat transfer and hands over its payout signature
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CounterCurrencyTransferStartedMessage {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    pub buyer_payout_address: String,
    #[serde(with = "hex")]
    pub buyer_signature: Vec<u8>,
    pub counter_currency_tx_id: Option<String>,
    pub counter_currency_extra_data: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FiatReceivedMessage {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutTxPublishedMessage {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    pub payout_tx: Transaction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedWitnessMessage {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    pub signed_witness: SignedWitness,
}
