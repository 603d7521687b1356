// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bitcoin::{Amount, PublicKey};

use super::payment::{PaymentAccountPayload, PaymentAccountPayloadHash};
use crate::bus::{NodeAddress, PubKeyRing};
use crate::Error;

/// Trade contract both traders signed when the offer was taken.
///
/// Payment account payloads are not part of the signed data, only their hashes are. The payloads
/// are attached later, once the peer's one was checked against its committed hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub offer_id: String,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub trade_amount: Amount,
    pub trade_price: u64,
    pub taker_fee_tx_id: String,
    pub buyer_node_address: NodeAddress,
    pub seller_node_address: NodeAddress,
    pub is_buyer_maker_and_seller_taker: bool,
    pub maker_account_id: String,
    pub taker_account_id: String,
    pub hash_of_makers_payment_account_payload: PaymentAccountPayloadHash,
    pub hash_of_takers_payment_account_payload: PaymentAccountPayloadHash,
    pub maker_pub_key_ring: PubKeyRing,
    pub taker_pub_key_ring: PubKeyRing,
    pub maker_payout_address_string: String,
    pub taker_payout_address_string: String,
    pub maker_multi_sig_pub_key: PublicKey,
    pub taker_multi_sig_pub_key: PublicKey,
    pub lock_time: u32,
    /// Attached once verified, see [`Contract::set_payment_account_payloads`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maker_payment_account_payload: Option<PaymentAccountPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taker_payment_account_payload: Option<PaymentAccountPayload>,
}

impl Contract {
    /// JSON document the traders sign; payloads attached later are never part of it
    pub fn to_signed_json(&self) -> Result<String, Error> {
        let mut signed = self.clone();
        signed.maker_payment_account_payload = None;
        signed.taker_payment_account_payload = None;
        serde_json::to_string(&signed).map_err(Into::into)
    }

    pub fn buyer_pub_key_ring(&self) -> &PubKeyRing {
        if self.is_buyer_maker_and_seller_taker {
            &self.maker_pub_key_ring
        } else {
            &self.taker_pub_key_ring
        }
    }

    pub fn seller_pub_key_ring(&self) -> &PubKeyRing {
        if self.is_buyer_maker_and_seller_taker {
            &self.taker_pub_key_ring
        } else {
            &self.maker_pub_key_ring
        }
    }

    pub fn buyer_multi_sig_pub_key(&self) -> &PublicKey {
        if self.is_buyer_maker_and_seller_taker {
            &self.maker_multi_sig_pub_key
        } else {
            &self.taker_multi_sig_pub_key
        }
    }

    pub fn seller_multi_sig_pub_key(&self) -> &PublicKey {
        if self.is_buyer_maker_and_seller_taker {
            &self.taker_multi_sig_pub_key
        } else {
            &self.maker_multi_sig_pub_key
        }
    }

    pub fn buyer_payout_address_string(&self) -> &str {
        if self.is_buyer_maker_and_seller_taker {
            &self.maker_payout_address_string
        } else {
            &self.taker_payout_address_string
        }
    }

    pub fn seller_payout_address_string(&self) -> &str {
        if self.is_buyer_maker_and_seller_taker {
            &self.taker_payout_address_string
        } else {
            &self.maker_payout_address_string
        }
    }

    pub fn hash_of_buyers_payment_account_payload(&self) -> PaymentAccountPayloadHash {
        if self.is_buyer_maker_and_seller_taker {
            self.hash_of_makers_payment_account_payload
        } else {
            self.hash_of_takers_payment_account_payload
        }
    }

    pub fn hash_of_sellers_payment_account_payload(&self) -> PaymentAccountPayloadHash {
        if self.is_buyer_maker_and_seller_taker {
            self.hash_of_takers_payment_account_payload
        } else {
            self.hash_of_makers_payment_account_payload
        }
    }

    pub fn buyer_payment_account_payload(&self) -> Option<&PaymentAccountPayload> {
        if self.is_buyer_maker_and_seller_taker {
            self.maker_payment_account_payload.as_ref()
        } else {
            self.taker_payment_account_payload.as_ref()
        }
    }

    pub fn seller_payment_account_payload(&self) -> Option<&PaymentAccountPayload> {
        if self.is_buyer_maker_and_seller_taker {
            self.taker_payment_account_payload.as_ref()
        } else {
            self.maker_payment_account_payload.as_ref()
        }
    }

    /// Attaches both payment account payloads once the peer's one was verified
    pub fn set_payment_account_payloads(
        &mut self,
        peers_payload: PaymentAccountPayload,
        my_payload: PaymentAccountPayload,
        is_my_role_maker: bool,
    ) {
        if is_my_role_maker {
            self.maker_payment_account_payload = Some(my_payload);
            self.taker_payment_account_payload = Some(peers_payload);
        } else {
            self.maker_payment_account_payload = Some(peers_payload);
            self.taker_payment_account_payload = Some(my_payload);
        }
    }
}
