// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Wallet collaborators of the trade protocol and the 2-of-2 multisig transactions spending the
//! deposit.
//!
//! Both payouts spend output 0 of the deposit transaction, a P2WSH output locked by
//! `2 <buyer key> <seller key> 2 CHECKMULTISIG`. Witnesses list the buyer signature first.

use bitcoin::blockdata::opcodes;
use bitcoin::blockdata::script::{Builder, Script};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::util::ecdsa::EcdsaSig;
use bitcoin::util::sighash::SighashCache;
use bitcoin::{
    Address, Amount, EcdsaSighashType, OutPoint, PrivateKey, PublicKey, Transaction, TxIn, TxOut,
    Txid, Witness,
};

use super::temporal_safety::{DELAYED_PAYOUT_TX_SEQUENCE, FINAL_SEQUENCE};
use crate::Error;

/// Confidence of a transaction as seen by the wallet
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum ConfidenceType {
    Unknown,
    /// In the mempool
    Pending,
    /// Mined
    Building,
    Dead,
    InConflict,
}

impl ConfidenceType {
    /// The transaction reached the network, broadcasting it again is pointless
    pub fn is_published(self) -> bool {
        matches!(self, ConfidenceType::Pending | ConfidenceType::Building)
    }
}

/// Purpose of a wallet address reserved for a trade
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(Debug)]
pub enum AddressContext {
    Available,
    OfferFunding,
    ReservedForTrade,
    MultiSig,
    TradePayout,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub offer_id: Option<String>,
    pub context: AddressContext,
    pub address: Address,
    pub pub_key: PublicKey,
}

/// Amounts, destinations and multisig keys of the cooperative payout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutTerms {
    pub buyer_payout_amount: Amount,
    pub seller_payout_amount: Amount,
    pub buyer_payout_address: Address,
    pub seller_payout_address: Address,
    pub buyer_multi_sig_pub_key: PublicKey,
    pub seller_multi_sig_pub_key: PublicKey,
}

pub type BroadcastCallback = Box<dyn FnOnce(Result<Transaction, Error>) + Send + 'static>;

/// Builds, signs and broadcasts the trade transactions.
///
/// Construction and signing have default implementations over the functions of this module,
/// implementors usually only provide `broadcast_tx` and `confidence`.
pub trait TradeWalletService: Send + Sync {
    fn create_delayed_unsigned_payout_tx(
        &self,
        deposit_tx: &Transaction,
        donation_address: &Address,
        miner_fee: Amount,
        lock_time: u32,
    ) -> Result<Transaction, Error> {
        delayed_unsigned_payout_tx(deposit_tx, donation_address, miner_fee, lock_time)
    }

    /// Signs the single input of the delayed payout, returns the DER signature with its sighash
    /// byte
    fn sign_delayed_payout_tx(
        &self,
        tx: &Transaction,
        deposit_tx: &Transaction,
        my_key: &PrivateKey,
        buyer_pub_key: &PublicKey,
        seller_pub_key: &PublicKey,
    ) -> Result<Vec<u8>, Error> {
        sign_multisig_input(tx, deposit_tx, my_key, buyer_pub_key, seller_pub_key)
    }

    /// Verifies both signatures and adds the witness
    fn finalize_delayed_payout_tx(
        &self,
        tx: Transaction,
        deposit_tx: &Transaction,
        buyer_pub_key: &PublicKey,
        seller_pub_key: &PublicKey,
        buyer_signature: &[u8],
        seller_signature: &[u8],
    ) -> Result<Transaction, Error> {
        let signatures = [
            (buyer_signature, buyer_pub_key),
            (seller_signature, seller_pub_key),
        ];
        for (signature, signer) in signatures {
            verify_multisig_input(
                &tx,
                deposit_tx,
                signature,
                signer,
                buyer_pub_key,
                seller_pub_key,
            )?;
        }
        Ok(finalize_multisig_input(
            tx,
            buyer_signature,
            seller_signature,
            buyer_pub_key,
            seller_pub_key,
        ))
    }

    fn buyer_signs_payout_tx(
        &self,
        deposit_tx: &Transaction,
        terms: &PayoutTerms,
        my_key: &PrivateKey,
    ) -> Result<Vec<u8>, Error> {
        let tx = unsigned_payout_tx(deposit_tx, terms)?;
        sign_multisig_input(
            &tx,
            deposit_tx,
            my_key,
            &terms.buyer_multi_sig_pub_key,
            &terms.seller_multi_sig_pub_key,
        )
    }

    /// Rebuilds the payout the buyer signed, checks the buyer signature, then adds the seller one
    fn seller_signs_and_finalizes_payout_tx(
        &self,
        deposit_tx: &Transaction,
        buyer_signature: &[u8],
        terms: &PayoutTerms,
        my_key: &PrivateKey,
    ) -> Result<Transaction, Error> {
        let buyer_key = &terms.buyer_multi_sig_pub_key;
        let seller_key = &terms.seller_multi_sig_pub_key;
        let tx = unsigned_payout_tx(deposit_tx, terms)?;
        verify_multisig_input(&tx, deposit_tx, buyer_signature, buyer_key, buyer_key, seller_key)?;
        let seller_signature = sign_multisig_input(&tx, deposit_tx, my_key, buyer_key, seller_key)?;
        Ok(finalize_multisig_input(
            tx,
            buyer_signature,
            &seller_signature,
            buyer_key,
            seller_key,
        ))
    }

    /// Hands `tx` to the network, `callback` fires once with the outcome, possibly on another
    /// thread
    fn broadcast_tx(&self, tx: Transaction, callback: BroadcastCallback);

    fn confidence(&self, txid: &Txid) -> ConfidenceType;
}

/// Key and address bookkeeping of the bitcoin wallet
pub trait BtcWalletService: Send + Sync {
    /// Private key of the multisig key `pub_key` reserved for the trade
    fn multi_sig_key_pair(&self, trade_id: &str, pub_key: &PublicKey) -> Result<PrivateKey, Error>;

    fn address_entry(&self, trade_id: &str, context: AddressContext) -> Option<AddressEntry>;

    /// Releases the trade's address entry of `context` back to the available pool
    fn swap_trade_entry_to_available_entry(&self, trade_id: &str, context: AddressContext);
}

pub fn multisig_redeem_script(buyer_pub_key: &PublicKey, seller_pub_key: &PublicKey) -> Script {
    Builder::new()
        .push_int(2)
        .push_key(buyer_pub_key)
        .push_key(seller_pub_key)
        .push_int(2)
        .push_opcode(opcodes::all::OP_CHECKMULTISIG)
        .into_script()
}

/// Script pubkey of the deposit output 0
pub fn multisig_script_pubkey(buyer_pub_key: &PublicKey, seller_pub_key: &PublicKey) -> Script {
    multisig_redeem_script(buyer_pub_key, seller_pub_key).to_v0_p2wsh()
}

fn multisig_output(deposit_tx: &Transaction) -> Result<&TxOut, Error> {
    deposit_tx
        .output
        .first()
        .ok_or_else(|| Error::Validation(format!("deposit tx {} has no output", deposit_tx.txid())))
}

fn multisig_input(deposit_tx: &Transaction, sequence: u32) -> TxIn {
    TxIn {
        previous_output: OutPoint::new(deposit_tx.txid(), 0),
        script_sig: Script::new(),
        sequence,
        witness: Witness::default(),
    }
}

/// Delayed payout sending the whole multisig output, minus `miner_fee`, to the donation address
pub fn delayed_unsigned_payout_tx(
    deposit_tx: &Transaction,
    donation_address: &Address,
    miner_fee: Amount,
    lock_time: u32,
) -> Result<Transaction, Error> {
    let deposit = multisig_output(deposit_tx)?;
    let value = deposit.value.checked_sub(miner_fee.as_sat()).ok_or_else(|| {
        Error::Validation(format!(
            "miner fee {} sat exceeds the deposit of {} sat",
            miner_fee.as_sat(),
            deposit.value
        ))
    })?;
    Ok(Transaction {
        version: 1,
        lock_time,
        input: vec![multisig_input(deposit_tx, DELAYED_PAYOUT_TX_SEQUENCE)],
        output: vec![TxOut {
            value,
            script_pubkey: donation_address.script_pubkey(),
        }],
    })
}

/// Cooperative payout; an output is omitted when its amount is zero
pub fn unsigned_payout_tx(
    deposit_tx: &Transaction,
    terms: &PayoutTerms,
) -> Result<Transaction, Error> {
    let deposit = multisig_output(deposit_tx)?;
    let total = terms.buyer_payout_amount + terms.seller_payout_amount;
    if total.as_sat() > deposit.value {
        return Err(Error::Validation(format!(
            "payout of {} sat exceeds the deposit of {} sat",
            total.as_sat(),
            deposit.value
        )));
    }
    let output = [
        (terms.buyer_payout_amount, &terms.buyer_payout_address),
        (terms.seller_payout_amount, &terms.seller_payout_address),
    ]
    .iter()
    .filter(|(amount, _)| *amount > Amount::ZERO)
    .map(|(amount, address)| TxOut {
        value: amount.as_sat(),
        script_pubkey: address.script_pubkey(),
    })
    .collect();
    Ok(Transaction {
        version: 1,
        lock_time: 0,
        input: vec![multisig_input(deposit_tx, FINAL_SEQUENCE)],
        output,
    })
}

fn multisig_sighash(
    tx: &Transaction,
    deposit_tx: &Transaction,
    buyer_pub_key: &PublicKey,
    seller_pub_key: &PublicKey,
) -> Result<Message, Error> {
    let redeem_script = multisig_redeem_script(buyer_pub_key, seller_pub_key);
    let value = multisig_output(deposit_tx)?.value;
    let mut cache = SighashCache::new(tx);
    let sighash =
        cache.segwit_signature_hash(0, &redeem_script, value, EcdsaSighashType::All)?;
    Ok(Message::from_slice(&sighash.into_inner())?)
}

pub fn sign_multisig_input(
    tx: &Transaction,
    deposit_tx: &Transaction,
    key: &PrivateKey,
    buyer_pub_key: &PublicKey,
    seller_pub_key: &PublicKey,
) -> Result<Vec<u8>, Error> {
    let message = multisig_sighash(tx, deposit_tx, buyer_pub_key, seller_pub_key)?;
    let secp = Secp256k1::new();
    let sig = secp.sign_ecdsa(&message, &key.inner);
    Ok(EcdsaSig {
        sig,
        hash_ty: EcdsaSighashType::All,
    }
    .to_vec())
}

pub fn verify_multisig_input(
    tx: &Transaction,
    deposit_tx: &Transaction,
    signature: &[u8],
    signer: &PublicKey,
    buyer_pub_key: &PublicKey,
    seller_pub_key: &PublicKey,
) -> Result<(), Error> {
    let message = multisig_sighash(tx, deposit_tx, buyer_pub_key, seller_pub_key)?;
    let sig = EcdsaSig::from_slice(signature)?;
    Secp256k1::verification_only()
        .verify_ecdsa(&message, &sig.sig, &signer.inner)
        .map_err(|_| {
            Error::Validation(format!(
                "invalid signature of {} on tx {}",
                signer,
                tx.txid()
            ))
        })
}

/// Adds the multisig witness, the signatures are ordered like the keys of the redeem script
pub fn finalize_multisig_input(
    mut tx: Transaction,
    buyer_signature: &[u8],
    seller_signature: &[u8],
    buyer_pub_key: &PublicKey,
    seller_pub_key: &PublicKey,
) -> Transaction {
    let redeem_script = multisig_redeem_script(buyer_pub_key, seller_pub_key);
    if let Some(input) = tx.input.first_mut() {
        input.witness = Witness::from_vec(vec![
            vec![],
            buyer_signature.to_vec(),
            seller_signature.to_vec(),
            redeem_script.to_bytes(),
        ]);
    }
    tx
}

#[cfg(test)]
mod tests {
    use bitcoin::secp256k1::SecretKey;
    use bitcoin::Network;

    use super::*;

    fn key(byte: u8) -> PrivateKey {
        PrivateKey::new(SecretKey::from_slice(&[byte; 32]).unwrap(), Network::Regtest)
    }

    fn deposit(buyer: &PublicKey, seller: &PublicKey, value: u64) -> Transaction {
        Transaction {
            version: 2,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: Script::new(),
                sequence: FINAL_SEQUENCE,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value,
                script_pubkey: multisig_script_pubkey(buyer, seller),
            }],
        }
    }

    fn address(byte: u8) -> Address {
        let secp = Secp256k1::new();
        Address::p2wpkh(&key(byte).public_key(&secp), Network::Regtest).unwrap()
    }

    #[test]
    fn delayed_payout_spends_deposit_minus_fee() {
        let secp = Secp256k1::new();
        let (buyer, seller) = (key(1).public_key(&secp), key(2).public_key(&secp));
        let deposit_tx = deposit(&buyer, &seller, 100_000);
        let tx = delayed_unsigned_payout_tx(&deposit_tx, &address(3), Amount::from_sat(1_000), 800)
            .unwrap();
        assert_eq!(tx.lock_time, 800);
        assert_eq!(tx.input[0].sequence, DELAYED_PAYOUT_TX_SEQUENCE);
        assert_eq!(tx.input[0].previous_output, OutPoint::new(deposit_tx.txid(), 0));
        assert_eq!(tx.output[0].value, 99_000);
        assert!(
            delayed_unsigned_payout_tx(&deposit_tx, &address(3), Amount::from_sat(200_000), 800)
                .is_err()
        );
    }

    #[test]
    fn payout_signatures_are_checked_before_finalizing() {
        let secp = Secp256k1::new();
        let (buyer_key, seller_key) = (key(1), key(2));
        let terms = PayoutTerms {
            buyer_payout_amount: Amount::from_sat(60_000),
            seller_payout_amount: Amount::from_sat(39_000),
            buyer_payout_address: address(4),
            seller_payout_address: address(5),
            buyer_multi_sig_pub_key: buyer_key.public_key(&secp),
            seller_multi_sig_pub_key: seller_key.public_key(&secp),
        };
        let deposit_tx = deposit(
            &terms.buyer_multi_sig_pub_key,
            &terms.seller_multi_sig_pub_key,
            100_000,
        );

        struct Offline;
        impl TradeWalletService for Offline {
            fn broadcast_tx(&self, _: Transaction, _: BroadcastCallback) {}
            fn confidence(&self, _: &Txid) -> ConfidenceType {
                ConfidenceType::Unknown
            }
        }

        let buyer_sig = Offline
            .buyer_signs_payout_tx(&deposit_tx, &terms, &buyer_key)
            .unwrap();
        let payout = Offline
            .seller_signs_and_finalizes_payout_tx(&deposit_tx, &buyer_sig, &terms, &seller_key)
            .unwrap();
        assert_eq!(payout.output.len(), 2);
        assert_eq!(payout.input[0].witness.len(), 4);

        // a signature over different terms is refused
        let mut cheating = terms.clone();
        cheating.seller_payout_amount = Amount::from_sat(1_000);
        cheating.buyer_payout_amount = Amount::from_sat(98_000);
        assert!(Offline
            .seller_signs_and_finalizes_payout_tx(&deposit_tx, &buyer_sig, &cheating, &seller_key)
            .is_err());
    }
}
