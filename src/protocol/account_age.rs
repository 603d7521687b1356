// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Account age witnesses: the reputation data gating trades with chargeback-prone payment
//! methods.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bitcoin::hashes::{ripemd160, sha256, Hash, HashEngine};
use bitcoin::secp256k1::{ecdsa, Message, Secp256k1};
use bitcoin::{Amount, PrivateKey, PublicKey};
use chrono::{DateTime, TimeZone, Utc};
use lazy_static::lazy_static;

use crate::bus::PubKeyRing;
use crate::trade::payment::PaymentAccountPayloadHash;
use crate::trade::Trade;
use crate::{Error, LogStyle};

lazy_static! {
    /// Accounts created after this date are immature
    pub static ref SAFE_ACCOUNT_AGE_DATE: DateTime<Utc> = Utc.ymd(2019, 3, 1).and_hms(0, 0, 0);
    /// Smaller trades do not sign the peer's witness
    pub static ref MINIMUM_TRADE_AMOUNT_FOR_SIGNING: Amount = Amount::from_sat(250_000);
}

pub type WitnessHash = ripemd160::Hash;

/// Hash identifying the witness of a payment account owned by `pub_key_ring`
pub fn witness_hash(
    payload_hash: &PaymentAccountPayloadHash,
    pub_key_ring: &PubKeyRing,
) -> WitnessHash {
    let mut engine = ripemd160::Hash::engine();
    engine.input(&payload_hash[..]);
    engine.input(&pub_key_ring.signature_pub_key.to_bytes());
    ripemd160::Hash::from_engine(engine)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAgeWitness {
    pub hash: WitnessHash,
    /// Creation date of the payment account
    pub date: DateTime<Utc>,
}

impl AccountAgeWitness {
    pub fn is_immature(&self) -> bool {
        self.date > *SAFE_ACCOUNT_AGE_DATE
    }
}

/// Signature of an account age witness by a trader who received a payment from its owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedWitness {
    pub account_age_witness_hash: WitnessHash,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
    pub signer_pub_key: PublicKey,
    pub witness_owner_pub_key: PublicKey,
    pub date: DateTime<Utc>,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub trade_amount: Amount,
}

fn witness_message(hash: &WitnessHash) -> Result<Message, Error> {
    Ok(Message::from_slice(&sha256::Hash::hash(&hash[..]).into_inner())?)
}

impl SignedWitness {
    pub fn verify(&self) -> Result<(), Error> {
        let message = witness_message(&self.account_age_witness_hash)?;
        let signature = ecdsa::Signature::from_der(&self.signature)?;
        Secp256k1::verification_only()
            .verify_ecdsa(&message, &signature, &self.signer_pub_key.inner)
            .map_err(|_| {
                Error::Validation(format!(
                    "invalid signature on witness {}",
                    self.account_age_witness_hash
                ))
            })
    }
}

pub trait AccountAgeWitnessService: Send + Sync {
    /// Returns true when the peer's payment account is younger than [`SAFE_ACCOUNT_AGE_DATE`] or
    /// its age cannot be established
    fn is_trade_peers_account_age_immature(&self, trade: &Trade) -> bool;

    /// Returns true when the local trader signs the peer's witness after this trade
    fn is_sign_witness_trade(&self, trade: &Trade) -> bool;

    /// Signs and publishes the peer's witness, `None` when the witness is not known
    fn trader_sign_and_publish_peers_account_age_witness(
        &self,
        trade: &Trade,
    ) -> Result<Option<SignedWitness>, Error>;

    /// Publishes a signature of the local trader's witness received from the peer
    fn publish_own_signed_witness(&self, signed_witness: &SignedWitness) -> Result<(), Error>;
}

#[derive(Default)]
struct WitnessStore {
    witnesses: HashMap<WitnessHash, AccountAgeWitness>,
    signed: HashMap<WitnessHash, Vec<SignedWitness>>,
}

/// Witness service over a local witness store
pub struct LocalAccountAgeWitnessService {
    store: Mutex<WitnessStore>,
    /// Key of a signer account, traders without one never sign peers
    signer_key: Option<PrivateKey>,
}

impl LocalAccountAgeWitnessService {
    pub fn new(signer_key: Option<PrivateKey>) -> Self {
        LocalAccountAgeWitnessService {
            store: Mutex::new(WitnessStore::default()),
            signer_key,
        }
    }

    fn store(&self) -> MutexGuard<'_, WitnessStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_witness(&self, witness: AccountAgeWitness) {
        self.store().witnesses.insert(witness.hash, witness);
    }

    pub fn witness(&self, hash: &WitnessHash) -> Option<AccountAgeWitness> {
        self.store().witnesses.get(hash).cloned()
    }

    pub fn signed_witnesses(&self, hash: &WitnessHash) -> Vec<SignedWitness> {
        self.store().signed.get(hash).cloned().unwrap_or_default()
    }

    fn peers_witness_hash(trade: &Trade) -> Option<(WitnessHash, PubKeyRing)> {
        let contract = trade.contract()?;
        let (payload_hash, pub_key_ring) = if trade.is_buyer() {
            (
                contract.hash_of_sellers_payment_account_payload(),
                contract.seller_pub_key_ring(),
            )
        } else {
            (
                contract.hash_of_buyers_payment_account_payload(),
                contract.buyer_pub_key_ring(),
            )
        };
        Some((witness_hash(&payload_hash, pub_key_ring), pub_key_ring.clone()))
    }

    fn peers_witness(&self, trade: &Trade) -> Option<(AccountAgeWitness, PubKeyRing)> {
        let (hash, pub_key_ring) = Self::peers_witness_hash(trade)?;
        self.witness(&hash).map(|witness| (witness, pub_key_ring))
    }

    fn record_signed_witness(&self, signed_witness: SignedWitness) {
        let mut store = self.store();
        let entries = store
            .signed
            .entry(signed_witness.account_age_witness_hash)
            .or_default();
        if !entries.contains(&signed_witness) {
            entries.push(signed_witness);
        }
    }
}

impl AccountAgeWitnessService for LocalAccountAgeWitnessService {
    fn is_trade_peers_account_age_immature(&self, trade: &Trade) -> bool {
        match self.peers_witness(trade) {
            Some((witness, _)) => witness.is_immature(),
            None => {
                warn!(
                    "{} | Peer's account age witness not found, treating it as immature",
                    trade.id.trade_id()
                );
                true
            }
        }
    }

    fn is_sign_witness_trade(&self, trade: &Trade) -> bool {
        if self.signer_key.is_none() || trade.amount < *MINIMUM_TRADE_AMOUNT_FOR_SIGNING {
            return false;
        }
        match self.peers_witness(trade) {
            Some((witness, _)) => self.signed_witnesses(&witness.hash).is_empty(),
            None => false,
        }
    }

    fn trader_sign_and_publish_peers_account_age_witness(
        &self,
        trade: &Trade,
    ) -> Result<Option<SignedWitness>, Error> {
        let signer_key = match &self.signer_key {
            Some(key) => key,
            None => return Ok(None),
        };
        let (witness, pub_key_ring) = match self.peers_witness(trade) {
            Some(found) => found,
            None => return Ok(None),
        };
        let secp = Secp256k1::new();
        let message = witness_message(&witness.hash)?;
        let signature = secp.sign_ecdsa(&message, &signer_key.inner);
        let signed_witness = SignedWitness {
            account_age_witness_hash: witness.hash,
            signature: signature.serialize_der().to_vec(),
            signer_pub_key: signer_key.public_key(&secp),
            witness_owner_pub_key: pub_key_ring.signature_pub_key,
            date: Utc::now(),
            trade_amount: trade.amount,
        };
        info!(
            "{} | Signed peer's account age witness {}",
            trade.id.trade_id(),
            witness.hash.label()
        );
        self.record_signed_witness(signed_witness.clone());
        Ok(Some(signed_witness))
    }

    fn publish_own_signed_witness(&self, signed_witness: &SignedWitness) -> Result<(), Error> {
        signed_witness.verify()?;
        self.record_signed_witness(signed_witness.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::secp256k1::SecretKey;
    use bitcoin::Network;

    use super::*;

    #[test]
    fn witnesses_after_the_cutoff_are_immature() {
        let hash = ripemd160::Hash::hash(b"account");
        let old = AccountAgeWitness {
            hash,
            date: Utc.ymd(2018, 6, 1).and_hms(0, 0, 0),
        };
        let young = AccountAgeWitness {
            hash,
            date: Utc.ymd(2019, 3, 2).and_hms(0, 0, 0),
        };
        assert!(!old.is_immature());
        assert!(young.is_immature());
    }

    #[test]
    fn forged_signed_witness_is_rejected() {
        let service = LocalAccountAgeWitnessService::new(None);
        let secp = Secp256k1::new();
        let key = PrivateKey::new(SecretKey::from_slice(&[7; 32]).unwrap(), Network::Regtest);
        let hash = ripemd160::Hash::hash(b"account");
        let signature = secp
            .sign_ecdsa(&witness_message(&hash).unwrap(), &key.inner)
            .serialize_der()
            .to_vec();
        let mut signed = SignedWitness {
            account_age_witness_hash: hash,
            signature,
            signer_pub_key: key.public_key(&secp),
            witness_owner_pub_key: key.public_key(&secp),
            date: Utc::now(),
            trade_amount: Amount::from_sat(1_000_000),
        };
        service.publish_own_signed_witness(&signed).unwrap();
        assert_eq!(service.signed_witnesses(&hash).len(), 1);

        signed.account_age_witness_hash = ripemd160::Hash::hash(b"other account");
        assert!(service.publish_own_signed_witness(&signed).is_err());
    }
}
