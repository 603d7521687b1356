//! Two traders agreeing on one trade: keys, accounts, offer, contract and deposit.

use std::collections::BTreeMap;

use bitcoin::blockdata::script::Script;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{
    Address, Amount, Network, OutPoint, PrivateKey, PublicKey, Transaction, TxIn, TxOut, Witness,
};
use chrono::{TimeZone, Utc};
use rand::Rng;

use bisq_trade::bus::{DecryptedMessageWithPubKey, NodeAddress, PubKeyRing, TradeMessage};
use bisq_trade::protocol::account_age::{
    witness_hash, AccountAgeWitness, LocalAccountAgeWitnessService,
};
use bisq_trade::protocol::process_model::ProcessModel;
use bisq_trade::protocol::temporal_safety::{TemporalSafety, FINAL_SEQUENCE};
use bisq_trade::protocol::wallet::{multisig_script_pubkey, AddressContext, AddressEntry};
use bisq_trade::protocol::TradeContext;
use bisq_trade::trade::contract::Contract;
use bisq_trade::trade::offer::{Offer, OfferDirection, PaymentMethod};
use bisq_trade::trade::payment::PaymentAccountPayload;
use bisq_trade::trade::Trade;

use super::mocks::MockBtcWallet;

pub const TRADE_TX_FEE: u64 = 5_000;
pub const SECURITY_DEPOSIT: u64 = 300_000;
pub const BEST_HEIGHT: u32 = 700_000;

pub fn fresh_key() -> PrivateKey {
    let mut rng = rand::thread_rng();
    loop {
        let bytes: [u8; 32] = rng.gen();
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            return PrivateKey::new(secret, Network::Regtest);
        }
    }
}

pub fn pub_key(key: &PrivateKey) -> PublicKey {
    key.public_key(&Secp256k1::new())
}

pub fn p2wpkh(key: &PrivateKey) -> Address {
    Address::p2wpkh(&pub_key(key), Network::Regtest).expect("compressed key")
}

/// Keys and account of one trader
pub struct Trader {
    pub multisig_key: PrivateKey,
    pub signature_key: PrivateKey,
    pub payout_key: PrivateKey,
    pub node_address: NodeAddress,
    pub account: PaymentAccountPayload,
}

impl Trader {
    pub fn new(name: &str, port: u16) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("iban".to_string(), format!("DE89 3704 0044 {}", port));
        fields.insert("bic".to_string(), "COBADEFFXXX".to_string());
        Trader {
            multisig_key: fresh_key(),
            signature_key: fresh_key(),
            payout_key: fresh_key(),
            node_address: NodeAddress::new(format!("{}.onion", name), port),
            account: PaymentAccountPayload {
                id: format!("{}-account", name),
                payment_method: PaymentMethod::Sepa,
                holder_name: name.to_string(),
                fields,
                max_trade_period_secs: 6 * 24 * 3600,
            },
        }
    }

    pub fn pub_key_ring(&self) -> PubKeyRing {
        PubKeyRing {
            signature_pub_key: pub_key(&self.signature_key),
            encryption_pub_key: pub_key(&self.signature_key),
        }
    }

    pub fn multisig_pub_key(&self) -> PublicKey {
        pub_key(&self.multisig_key)
    }

    pub fn payout_address(&self) -> Address {
        p2wpkh(&self.payout_key)
    }

    /// Wallet holding the trade's multisig and payout entries of this trader
    pub fn wallet(&self, trade_id: &str) -> MockBtcWallet {
        let wallet = MockBtcWallet::new();
        wallet.add_entry(
            AddressEntry {
                offer_id: Some(trade_id.to_string()),
                context: AddressContext::MultiSig,
                address: p2wpkh(&self.multisig_key),
                pub_key: self.multisig_pub_key(),
            },
            Some(self.multisig_key),
        );
        wallet.add_entry(
            AddressEntry {
                offer_id: Some(trade_id.to_string()),
                context: AddressContext::TradePayout,
                address: self.payout_address(),
                pub_key: pub_key(&self.payout_key),
            },
            None,
        );
        wallet
    }

    /// Wraps `message` the way the network layer hands it over after decryption
    pub fn envelope(&self, message: TradeMessage) -> DecryptedMessageWithPubKey {
        DecryptedMessageWithPubKey::new(message, pub_key(&self.signature_key))
    }
}

/// A trade between a buyer acting as maker and a seller acting as taker, with the deposit
/// transaction already built
pub struct TradeSetup {
    pub buyer: Trader,
    pub seller: Trader,
    pub offer: Offer,
    pub amount: Amount,
    pub contract: Contract,
    pub deposit_tx: Transaction,
}

impl TradeSetup {
    pub fn new(amount: Amount) -> Self {
        Self::with_payment_method(amount, PaymentMethod::Sepa, "EUR")
    }

    pub fn with_payment_method(
        amount: Amount,
        payment_method: PaymentMethod,
        currency_code: &str,
    ) -> Self {
        let deposit = Amount::from_sat(SECURITY_DEPOSIT);
        Self::build(amount, payment_method, currency_code, deposit, deposit)
    }

    pub fn with_security_deposits(
        amount: Amount,
        buyer_security_deposit: Amount,
        seller_security_deposit: Amount,
    ) -> Self {
        Self::build(
            amount,
            PaymentMethod::Sepa,
            "EUR",
            buyer_security_deposit,
            seller_security_deposit,
        )
    }

    fn build(
        amount: Amount,
        payment_method: PaymentMethod,
        currency_code: &str,
        buyer_security_deposit: Amount,
        seller_security_deposit: Amount,
    ) -> Self {
        let buyer = Trader::new("buyer", 9998);
        let seller = Trader::new("seller", 9999);
        let offer = Offer {
            id: format!("offer-{}", uuid::Uuid::new_v4()),
            direction: OfferDirection::Buy,
            currency_code: currency_code.to_string(),
            payment_method,
            price: 25_000,
            amount,
            min_amount: amount,
            buyer_security_deposit,
            seller_security_deposit,
            maker_node_address: buyer.node_address.clone(),
            maker_pub_key_ring: buyer.pub_key_ring(),
            date: Utc::now(),
        };
        let lock_time = TemporalSafety::default().lock_time(BEST_HEIGHT, offer.is_crypto());
        let contract = Contract {
            offer_id: offer.id.clone(),
            trade_amount: amount,
            trade_price: offer.price,
            taker_fee_tx_id: "00".repeat(32),
            buyer_node_address: buyer.node_address.clone(),
            seller_node_address: seller.node_address.clone(),
            is_buyer_maker_and_seller_taker: true,
            maker_account_id: buyer.account.id.clone(),
            taker_account_id: seller.account.id.clone(),
            hash_of_makers_payment_account_payload: buyer.account.hash().expect("hash"),
            hash_of_takers_payment_account_payload: seller.account.hash().expect("hash"),
            maker_pub_key_ring: buyer.pub_key_ring(),
            taker_pub_key_ring: seller.pub_key_ring(),
            maker_payout_address_string: buyer.payout_address().to_string(),
            taker_payout_address_string: seller.payout_address().to_string(),
            maker_multi_sig_pub_key: buyer.multisig_pub_key(),
            taker_multi_sig_pub_key: seller.multisig_pub_key(),
            lock_time,
            maker_payment_account_payload: None,
            taker_payment_account_payload: None,
        };
        let deposit_value = buyer_security_deposit.as_sat()
            + seller_security_deposit.as_sat()
            + amount.as_sat()
            + TRADE_TX_FEE;
        let deposit_tx = Transaction {
            version: 1,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: Script::new(),
                sequence: FINAL_SEQUENCE,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value: deposit_value,
                script_pubkey: multisig_script_pubkey(
                    &buyer.multisig_pub_key(),
                    &seller.multisig_pub_key(),
                ),
            }],
        };
        TradeSetup {
            buyer,
            seller,
            offer,
            amount,
            contract,
            deposit_tx,
        }
    }

    pub fn trade_id(&self) -> String {
        self.offer.id.clone()
    }

    fn trade(&self, is_buyer: bool) -> Trade {
        // the buyer made the offer
        let mut trade = Trade::new(
            self.offer.clone(),
            is_buyer,
            self.amount,
            Amount::from_sat(TRADE_TX_FEE),
            self.contract.lock_time,
        );
        trade
            .apply_deposit_tx(self.deposit_tx.clone())
            .expect("fresh trade");
        trade
            .set_contract(self.contract.clone())
            .expect("serializable contract");
        trade
    }

    fn process_model(&self, me: &Trader, peer: &Trader) -> ProcessModel {
        let mut model = ProcessModel::new(
            self.offer.id.clone(),
            me.node_address.clone(),
            me.pub_key_ring(),
        );
        model.my_multi_sig_pub_key = Some(me.multisig_pub_key());
        model.payment_account_payload = Some(me.account.clone());
        model.trading_peer.pub_key_ring = Some(peer.pub_key_ring());
        model.trading_peer.multi_sig_pub_key = Some(peer.multisig_pub_key());
        model.trading_peer.account_id = Some(peer.account.id.clone());
        model
    }

    pub fn seller_parts(&self) -> (Trade, ProcessModel) {
        let mut trade = self.trade(false);
        trade.trading_peer_node_address = Some(self.buyer.node_address.clone());
        (trade, self.process_model(&self.seller, &self.buyer))
    }

    pub fn buyer_parts(&self) -> (Trade, ProcessModel) {
        let mut trade = self.trade(true);
        trade.trading_peer_node_address = Some(self.seller.node_address.clone());
        (trade, self.process_model(&self.buyer, &self.seller))
    }

    pub fn seller_context(&self) -> TradeContext {
        let (trade, model) = self.seller_parts();
        TradeContext::new(trade, model)
    }

    pub fn buyer_context(&self) -> TradeContext {
        let (trade, model) = self.buyer_parts();
        TradeContext::new(trade, model)
    }

    /// Witness service of the seller knowing the buyer's account, created on the given date
    pub fn seller_witnesses(
        &self,
        buyer_account_created: (i32, u32, u32),
        signer_key: Option<PrivateKey>,
    ) -> LocalAccountAgeWitnessService {
        let (year, month, day) = buyer_account_created;
        let service = LocalAccountAgeWitnessService::new(signer_key);
        service.add_witness(AccountAgeWitness {
            hash: witness_hash(
                &self.buyer.account.hash().expect("hash"),
                &self.buyer.pub_key_ring(),
            ),
            date: Utc.ymd(year, month, day).and_hms(0, 0, 0),
        });
        service
    }
}
