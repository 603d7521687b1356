//! In-process stand-ins for the wallet, mailbox, witness and statistics collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bitcoin::{PrivateKey, PublicKey, Transaction, Txid};
use uuid::Uuid;

use bisq_trade::bus::{NodeAddress, PubKeyRing, TradeMessage};
use bisq_trade::config::DaoConfig;
use bisq_trade::protocol::account_age::{
    AccountAgeWitnessService, LocalAccountAgeWitnessService, SignedWitness,
};
use bisq_trade::protocol::dao::ConfiguredDaoFacade;
use bisq_trade::protocol::mailbox::{MailboxListener, MailboxOutcome, MailboxService};
use bisq_trade::protocol::statistics::{TradeStatistics, TradeStatisticsService};
use bisq_trade::protocol::wallet::{
    AddressContext, AddressEntry, BroadcastCallback, BtcWalletService, ConfidenceType,
    TradeWalletService,
};
use bisq_trade::protocol::{Provider, TaskInterceptor, TaskContext, TradeTask};
use bisq_trade::storage::{MemoryStore, TradeStore};
use bisq_trade::trade::Trade;
use bisq_trade::Error;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcastMode {
    /// Callback fires right away with success
    Succeed,
    /// Callback fires right away with the error
    Fail(String),
    /// Callback is kept until `release_held` is called
    Hold,
}

pub struct MockTradeWallet {
    mode: Mutex<BroadcastMode>,
    confidence: Mutex<HashMap<Txid, ConfidenceType>>,
    broadcasts: Mutex<Vec<Transaction>>,
    held: Mutex<Vec<(Transaction, BroadcastCallback)>>,
}

impl MockTradeWallet {
    pub fn new() -> Self {
        MockTradeWallet {
            mode: Mutex::new(BroadcastMode::Succeed),
            confidence: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(vec![]),
            held: Mutex::new(vec![]),
        }
    }

    pub fn set_mode(&self, mode: BroadcastMode) {
        *locked(&self.mode) = mode;
    }

    pub fn set_confidence(&self, txid: Txid, confidence: ConfidenceType) {
        locked(&self.confidence).insert(txid, confidence);
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        locked(&self.broadcasts).clone()
    }

    /// Fires every held callback with success
    pub fn release_held(&self) {
        let held: Vec<_> = locked(&self.held).drain(..).collect();
        for (tx, callback) in held {
            callback(Ok(tx));
        }
    }
}

impl TradeWalletService for MockTradeWallet {
    fn broadcast_tx(&self, tx: Transaction, callback: BroadcastCallback) {
        let mode = locked(&self.mode).clone();
        match mode {
            BroadcastMode::Succeed => {
                locked(&self.broadcasts).push(tx.clone());
                self.set_confidence(tx.txid(), ConfidenceType::Pending);
                callback(Ok(tx));
            }
            BroadcastMode::Fail(reason) => callback(Err(Error::Protocol(reason))),
            BroadcastMode::Hold => {
                locked(&self.broadcasts).push(tx.clone());
                locked(&self.held).push((tx, callback));
            }
        }
    }

    fn confidence(&self, txid: &Txid) -> ConfidenceType {
        locked(&self.confidence)
            .get(txid)
            .copied()
            .unwrap_or(ConfidenceType::Unknown)
    }
}

#[derive(Default)]
pub struct MockBtcWallet {
    entries: Mutex<HashMap<(String, AddressContext), AddressEntry>>,
    keys: Mutex<HashMap<PublicKey, PrivateKey>>,
    swapped: Mutex<Vec<(String, AddressContext)>>,
}

impl MockBtcWallet {
    pub fn new() -> Self {
        MockBtcWallet::default()
    }

    pub fn add_entry(&self, entry: AddressEntry, key: Option<PrivateKey>) {
        if let Some(key) = key {
            locked(&self.keys).insert(entry.pub_key, key);
        }
        let trade_id = entry.offer_id.clone().unwrap_or_default();
        locked(&self.entries).insert((trade_id, entry.context), entry);
    }

    pub fn swapped(&self) -> Vec<(String, AddressContext)> {
        locked(&self.swapped).clone()
    }
}

impl BtcWalletService for MockBtcWallet {
    fn multi_sig_key_pair(&self, trade_id: &str, pub_key: &PublicKey) -> Result<PrivateKey, Error> {
        locked(&self.keys)
            .get(pub_key)
            .copied()
            .ok_or_else(|| Error::Missing(format!("multisig key of trade {}", trade_id)))
    }

    fn address_entry(&self, trade_id: &str, context: AddressContext) -> Option<AddressEntry> {
        locked(&self.entries)
            .get(&(trade_id.to_string(), context))
            .cloned()
    }

    fn swap_trade_entry_to_available_entry(&self, trade_id: &str, context: AddressContext) {
        locked(&self.swapped).push((trade_id.to_string(), context));
    }
}

/// Mailbox answering every send with a configurable outcome and recording the messages
pub struct RecordingMailbox {
    outcome: Mutex<MailboxOutcome>,
    sent: Mutex<Vec<(NodeAddress, TradeMessage)>>,
    removed: Mutex<Vec<Uuid>>,
}

impl RecordingMailbox {
    pub fn new() -> Self {
        RecordingMailbox {
            outcome: Mutex::new(MailboxOutcome::Arrived),
            sent: Mutex::new(vec![]),
            removed: Mutex::new(vec![]),
        }
    }

    pub fn set_outcome(&self, outcome: MailboxOutcome) {
        *locked(&self.outcome) = outcome;
    }

    pub fn sent(&self) -> Vec<TradeMessage> {
        locked(&self.sent)
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Hands the queued messages over for delivery
    pub fn take_sent(&self) -> Vec<(NodeAddress, TradeMessage)> {
        locked(&self.sent).drain(..).collect()
    }

    pub fn removed(&self) -> Vec<Uuid> {
        locked(&self.removed).clone()
    }
}

impl MailboxService for RecordingMailbox {
    fn send_encrypted_mailbox_message(
        &self,
        peer: &NodeAddress,
        _pub_key_ring: &PubKeyRing,
        message: TradeMessage,
        listener: MailboxListener,
    ) {
        locked(&self.sent).push((peer.clone(), message));
        let outcome = locked(&self.outcome).clone();
        listener(outcome);
    }

    fn remove_mailbox_msg(&self, uid: &Uuid) {
        locked(&self.removed).push(*uid);
    }
}

/// Witness service with fixed answers
pub struct StubWitnessService {
    pub immature: bool,
    pub sign_witness_trade: bool,
    pub signed_witness: Option<SignedWitness>,
}

impl AccountAgeWitnessService for StubWitnessService {
    fn is_trade_peers_account_age_immature(&self, _trade: &Trade) -> bool {
        self.immature
    }

    fn is_sign_witness_trade(&self, _trade: &Trade) -> bool {
        self.sign_witness_trade
    }

    fn trader_sign_and_publish_peers_account_age_witness(
        &self,
        _trade: &Trade,
    ) -> Result<Option<SignedWitness>, Error> {
        Ok(self.signed_witness.clone())
    }

    fn publish_own_signed_witness(&self, _signed_witness: &SignedWitness) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStatistics {
    published: Mutex<Vec<TradeStatistics>>,
}

impl RecordingStatistics {
    pub fn published(&self) -> Vec<TradeStatistics> {
        locked(&self.published).clone()
    }
}

impl TradeStatisticsService for RecordingStatistics {
    fn publish(&self, statistics: TradeStatistics) -> Result<(), Error> {
        locked(&self.published).push(statistics);
        Ok(())
    }
}

/// Fails the given task on entry
pub struct FailAt(pub TradeTask);

impl TaskInterceptor for FailAt {
    fn intercept(&self, task: TradeTask, _ctx: &TaskContext) -> Result<(), Error> {
        if task == self.0 {
            Err(Error::Protocol(format!("simulated crash before {}", task)))
        } else {
            Ok(())
        }
    }
}

/// Collaborators of one trader
pub struct Harness {
    pub wallet: Arc<MockTradeWallet>,
    pub btc_wallet: Arc<MockBtcWallet>,
    pub mailbox: Arc<RecordingMailbox>,
    pub witnesses: Arc<LocalAccountAgeWitnessService>,
    pub statistics: Arc<RecordingStatistics>,
    pub store: Arc<dyn TradeStore>,
}

impl Harness {
    pub fn new(btc_wallet: MockBtcWallet, witnesses: LocalAccountAgeWitnessService) -> Self {
        Harness {
            wallet: Arc::new(MockTradeWallet::new()),
            btc_wallet: Arc::new(btc_wallet),
            mailbox: Arc::new(RecordingMailbox::new()),
            witnesses: Arc::new(witnesses),
            statistics: Arc::new(RecordingStatistics::default()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Replaces the trade store, used to share one store across restarts
    pub fn with_store(mut self, store: Arc<dyn TradeStore>) -> Self {
        self.store = store;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider_with_witnesses(self.witnesses.clone())
    }

    pub fn provider_with_witnesses(
        &self,
        witnesses: Arc<dyn AccountAgeWitnessService>,
    ) -> Provider {
        Provider {
            trade_wallet: self.wallet.clone(),
            btc_wallet: self.btc_wallet.clone(),
            mailbox: self.mailbox.clone(),
            account_age: witnesses,
            dao: Arc::new(ConfiguredDaoFacade::from(DaoConfig::for_network(
                bitcoin::Network::Testnet,
            ))),
            statistics: self.statistics.clone(),
            store: self.store.clone(),
        }
    }
}
