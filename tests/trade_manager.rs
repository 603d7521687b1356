#[macro_use]
extern crate log;

use std::sync::Arc;

use bitcoin::Amount;
use ntest::timeout;
use uuid::Uuid;

use bisq_trade::bus::TradeMessage;
use bisq_trade::config::ProtocolConfig;
use bisq_trade::event::TradeEvent;
use bisq_trade::manager::TradeManager;
use bisq_trade::protocol::account_age::{witness_hash, LocalAccountAgeWitnessService};
use bisq_trade::protocol::mailbox::MailboxOutcome;
use bisq_trade::protocol::wallet::AddressContext;
use bisq_trade::protocol::TradeTask;
use bisq_trade::storage::lmdb::LmdbStore;
use bisq_trade::storage::{MemoryStore, TradeStore};
use bisq_trade::trade::state::{Phase, State};
use bisq_trade::Error;

use utils::fixtures::{fresh_key, Trader, TradeSetup};
use utils::mocks::{FailAt, Harness};

mod utils;

const AMOUNT: u64 = 2_000_000;

/// Both sides of one trade, each with its own collaborators and manager
struct Parties {
    setup: TradeSetup,
    seller: Harness,
    buyer: Harness,
    seller_manager: TradeManager,
    buyer_manager: TradeManager,
}

impl Parties {
    fn new(setup: TradeSetup) -> Self {
        let seller = Harness::new(
            setup.seller.wallet(&setup.trade_id()),
            setup.seller_witnesses((2018, 6, 1), Some(fresh_key())),
        );
        let buyer = Harness::new(
            setup.buyer.wallet(&setup.trade_id()),
            LocalAccountAgeWitnessService::new(None),
        );
        let seller_manager = TradeManager::new(seller.provider(), ProtocolConfig::default());
        let buyer_manager = TradeManager::new(buyer.provider(), ProtocolConfig::default());
        Parties {
            setup,
            seller,
            buyer,
            seller_manager,
            buyer_manager,
        }
    }

    fn add_trades(&self) {
        let (trade, model) = self.setup.seller_parts();
        self.seller_manager.add_trade(trade, model).unwrap();
        let (trade, model) = self.setup.buyer_parts();
        self.buyer_manager.add_trade(trade, model).unwrap();
    }

    fn trade_id(&self) -> String {
        self.setup.trade_id()
    }

    /// Delivers queued messages both ways until both mailboxes stay empty, returns the errors
    /// the receivers reported
    async fn pump(&self, seller_manager: &TradeManager) -> Vec<Error> {
        let mut errors = vec![];
        loop {
            let to_buyer = deliver(&self.seller, &self.setup.seller, &self.buyer_manager).await;
            let to_seller = deliver(&self.buyer, &self.setup.buyer, seller_manager).await;
            let delivered = to_buyer.0 + to_seller.0;
            errors.extend(to_buyer.1);
            errors.extend(to_seller.1);
            if delivered == 0 {
                return errors;
            }
        }
    }

    /// Runs the protocol until the deposit is confirmed on both sides
    async fn until_deposit_confirmed(&self) {
        self.add_trades();
        let trade_id = self.trade_id();
        self.seller_manager
            .handle_event(&trade_id, TradeEvent::Start)
            .await
            .unwrap();
        let errors = self.pump(&self.seller_manager).await;
        assert!(errors.is_empty(), "{:?}", errors);
        self.seller_manager
            .on_deposit_confirmed(&trade_id)
            .await
            .unwrap();
        self.buyer_manager
            .on_deposit_confirmed(&trade_id)
            .await
            .unwrap();
    }
}

async fn deliver(from: &Harness, sender: &Trader, to: &TradeManager) -> (usize, Vec<Error>) {
    let queued = from.mailbox.take_sent();
    let count = queued.len();
    let mut errors = vec![];
    for (peer, message) in queued {
        trace!("Delivering {} to {}", message, peer);
        if let Err(err) = to.on_message(sender.envelope(message)).await {
            errors.push(err);
        }
    }
    (count, errors)
}

#[tokio::test]
async fn trade_runs_to_completion() {
    utils::setup_logging(None);
    let parties = Parties::new(TradeSetup::new(Amount::from_sat(AMOUNT)));
    let trade_id = parties.trade_id();
    parties.until_deposit_confirmed().await;

    let seller = parties.seller_manager.trade(&trade_id).unwrap();
    let buyer = parties.buyer_manager.trade(&trade_id).unwrap();
    assert_eq!(seller.state(), State::DepositConfirmedInBlockChain);
    assert_eq!(buyer.state(), State::DepositConfirmedInBlockChain);
    assert_eq!(
        seller.delayed_payout_tx().map(|tx| tx.txid()),
        buyer.delayed_payout_tx().map(|tx| tx.txid())
    );
    assert_eq!(parties.seller.wallet.broadcasts().len(), 1);
    assert_eq!(parties.seller.statistics.published().len(), 1);
    let contract = seller.contract().unwrap();
    assert_eq!(
        contract.buyer_payment_account_payload(),
        Some(&parties.setup.buyer.account)
    );

    parties
        .buyer_manager
        .handle_event(&trade_id, TradeEvent::PaymentStarted)
        .await
        .unwrap();
    assert_eq!(
        parties.buyer_manager.trade(&trade_id).unwrap().state(),
        State::BuyerSawArrivedFiatPaymentInitiatedMsg
    );
    assert!(parties.pump(&parties.seller_manager).await.is_empty());
    assert_eq!(
        parties.seller_manager.trade(&trade_id).unwrap().state(),
        State::SellerReceivedFiatPaymentInitiatedMsg
    );

    parties
        .seller_manager
        .handle_event(&trade_id, TradeEvent::PaymentReceived)
        .await
        .unwrap();
    assert!(parties.pump(&parties.seller_manager).await.is_empty());

    let seller = parties.seller_manager.trade(&trade_id).unwrap();
    let buyer = parties.buyer_manager.trade(&trade_id).unwrap();
    assert_eq!(seller.state(), State::SellerSawArrivedSignedWitnessMsg);
    assert_eq!(buyer.state(), State::BuyerReceivedPayoutTxPublishedMsg);
    let payout_tx = seller.payout_tx().unwrap();
    assert_eq!(buyer.payout_tx().map(|tx| tx.txid()), Some(payout_tx.txid()));
    assert_eq!(parties.seller.wallet.broadcasts().len(), 2);
    let (buyer_payout, seller_payout) = seller.payout_amounts();
    assert_eq!(payout_tx.output[0].value, buyer_payout.as_sat());
    assert_eq!(payout_tx.output[1].value, seller_payout.as_sat());
    assert!(!seller.has_failed());
    assert!(!buyer.has_failed());

    let buyer_witness = witness_hash(
        &parties.setup.buyer.account.hash().unwrap(),
        &parties.setup.buyer.pub_key_ring(),
    );
    assert_eq!(parties.buyer.witnesses.signed_witnesses(&buyer_witness).len(), 1);
    assert!(parties
        .buyer
        .btc_wallet
        .swapped()
        .contains(&(trade_id.clone(), AddressContext::MultiSig)));

    // every message of both sides was acknowledged
    for ctx in [
        parties.seller_manager.context(&trade_id).unwrap(),
        parties.buyer_manager.context(&trade_id).unwrap(),
    ]
    .iter()
    {
        let guard = ctx.lock();
        assert!(guard
            .process_model
            .message_states
            .values()
            .all(|status| status.state == bisq_trade::bus::MessageState::Acknowledged));
    }

    parties.seller_manager.close_trade(&trade_id).await.unwrap();
    parties.buyer_manager.close_trade(&trade_id).await.unwrap();
    assert!(parties.seller_manager.open_trade_ids().is_empty());
    assert_eq!(parties.buyer_manager.closed_trade_ids(), vec![trade_id.clone()]);
    let record = parties.seller.store.load(&trade_id).unwrap().unwrap();
    assert!(record.closed);
    assert!(record.trade.phase() >= Phase::PayoutPublished);
}

#[tokio::test]
async fn seller_resumes_after_restart() {
    utils::setup_logging(None);
    let setup = TradeSetup::new(Amount::from_sat(AMOUNT));
    let store: Arc<dyn TradeStore> = Arc::new(MemoryStore::new());
    let mut parties = Parties::new(setup);
    parties.seller = parties.seller.with_store(store.clone());
    parties.seller_manager = TradeManager::new(parties.seller.provider(), ProtocolConfig::default())
        .with_interceptor(Arc::new(FailAt(TradeTask::SellerPublishesDepositTx)));
    parties.add_trades();
    let trade_id = parties.trade_id();

    parties
        .seller_manager
        .handle_event(&trade_id, TradeEvent::Start)
        .await
        .unwrap();
    let errors = parties.pump(&parties.seller_manager).await;
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        Error::TaskFailed {
            task: TradeTask::SellerPublishesDepositTx,
            ..
        }
    ));
    assert!(parties.seller.wallet.broadcasts().is_empty());
    let stored = store.load(&trade_id).unwrap().unwrap();
    assert_eq!(stored.trade.state(), State::SellerSawArrivedDepositTxPublishedMsg);
    assert!(stored.trade.error_message().unwrap().contains("simulated crash"));

    // restart with the same store and wallet
    let restarted = TradeManager::new(parties.seller.provider(), ProtocolConfig::default());
    assert_eq!(restarted.restore().unwrap(), 1);
    assert!(restarted.resume_all().await.is_empty());

    let trade = restarted.trade(&trade_id).unwrap();
    assert_eq!(trade.state(), State::SellerPublishedDepositTx);
    assert_eq!(parties.seller.wallet.broadcasts().len(), 1);
    assert_eq!(parties.seller.statistics.published().len(), 1);
    assert_eq!(
        store.load(&trade_id).unwrap().unwrap().trade.state(),
        State::SellerPublishedDepositTx
    );

    // a second resume has nothing left to do
    assert!(restarted.resume_all().await.is_empty());
    assert_eq!(parties.seller.wallet.broadcasts().len(), 1);
}

#[tokio::test]
async fn buyer_resends_after_mailbox_fault() {
    utils::setup_logging(None);
    let parties = Parties::new(TradeSetup::new(Amount::from_sat(AMOUNT)));
    let trade_id = parties.trade_id();
    parties.until_deposit_confirmed().await;

    parties
        .buyer
        .mailbox
        .set_outcome(MailboxOutcome::Fault("peer offline".to_string()));
    let result = parties
        .buyer_manager
        .handle_event(&trade_id, TradeEvent::PaymentStarted)
        .await;
    match result {
        Err(Error::TaskFailed { task, reason }) => {
            assert_eq!(task, TradeTask::BuyerSendCounterCurrencyTransferStartedMessage);
            assert!(reason.contains("peer offline"));
        }
        other => panic!("expected the send to fail, got {:?}", other),
    }
    let trade = parties.buyer_manager.trade(&trade_id).unwrap();
    assert_eq!(trade.state(), State::BuyerSendFailedFiatPaymentInitiatedMsg);
    // the failed message never reached the seller
    parties.buyer.mailbox.take_sent();

    parties.buyer.mailbox.set_outcome(MailboxOutcome::Arrived);
    assert!(parties.buyer_manager.resume_all().await.is_empty());
    assert_eq!(
        parties.buyer_manager.trade(&trade_id).unwrap().state(),
        State::BuyerSawArrivedFiatPaymentInitiatedMsg
    );
    let resent: Vec<_> = parties
        .buyer
        .mailbox
        .sent()
        .into_iter()
        .filter(|message| matches!(message, TradeMessage::CounterCurrencyTransferStarted(_)))
        .collect();
    assert_eq!(resent.len(), 1);

    assert!(parties.pump(&parties.seller_manager).await.is_empty());
    assert_eq!(
        parties.seller_manager.trade(&trade_id).unwrap().state(),
        State::SellerReceivedFiatPaymentInitiatedMsg
    );
}

#[tokio::test]
async fn events_out_of_order_are_refused() {
    utils::setup_logging(None);
    let parties = Parties::new(TradeSetup::new(Amount::from_sat(AMOUNT)));
    let trade_id = parties.trade_id();
    parties.add_trades();

    let result = parties
        .seller_manager
        .handle_event(&trade_id, TradeEvent::PaymentReceived)
        .await;
    assert!(matches!(result, Err(Error::UnexpectedMessage { .. })));
    let result = parties
        .buyer_manager
        .handle_event(&trade_id, TradeEvent::Start)
        .await;
    assert!(matches!(result, Err(Error::Protocol(_))));
    let result = parties
        .seller_manager
        .handle_event("unknown", TradeEvent::Start)
        .await;
    assert!(matches!(result, Err(Error::UnknownTrade(_))));
    let result = parties.seller_manager.close_trade(&trade_id).await;
    assert!(matches!(result, Err(Error::Protocol(_))));
    let (trade, model) = parties.setup.seller_parts();
    assert!(parties.seller_manager.add_trade(trade, model).is_err());

    assert_eq!(
        parties.seller_manager.trade(&trade_id).unwrap().state(),
        State::Preparation
    );
    assert!(parties.seller.mailbox.sent().is_empty());
}

#[test]
#[timeout(30000)]
fn trades_run_concurrently() {
    utils::setup_logging(None);
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let first = Parties::new(TradeSetup::new(Amount::from_sat(AMOUNT)));
        let second = Parties::new(TradeSetup::new(Amount::from_sat(3 * AMOUNT)));
        futures::join!(
            first.until_deposit_confirmed(),
            second.until_deposit_confirmed()
        );
        for parties in [&first, &second].iter() {
            let trade = parties.seller_manager.trade(&parties.trade_id()).unwrap();
            assert_eq!(trade.state(), State::DepositConfirmedInBlockChain);
            assert_eq!(trade.amount, parties.setup.amount);
        }
    });
}

#[test]
fn lmdb_store_keeps_records_across_reopen() {
    utils::setup_logging(None);
    let path = std::env::temp_dir().join(format!("bisq-trade-{}", Uuid::new_v4()));
    let setup = TradeSetup::new(Amount::from_sat(AMOUNT));
    let record = setup.seller_context().to_record(false);
    let trade_id = setup.trade_id();

    {
        let store = LmdbStore::open(&path).unwrap();
        assert!(store.load(&trade_id).unwrap().is_none());
        store.save(&record).unwrap();
        // a second save replaces the record
        store.save(&setup.seller_context().to_record(true)).unwrap();
    }

    let store = LmdbStore::open(&path).unwrap();
    let loaded = store.load(&trade_id).unwrap().unwrap();
    assert!(loaded.closed);
    assert_eq!(loaded.trade.id, trade_id);
    assert_eq!(loaded.trade.state(), State::Preparation);
    assert_eq!(
        loaded.trade.deposit_tx().map(|tx| tx.txid()),
        Some(setup.deposit_tx.txid())
    );
    assert_eq!(
        loaded.process_model.trading_peer,
        record.process_model.trading_peer
    );
    assert_eq!(store.load_all().unwrap().len(), 1);

    drop(store);
    let _ = std::fs::remove_dir_all(&path);
}
