// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistent record of one trade's lifecycle.

use std::fmt;

use bitcoin::{Amount, Transaction};
use chrono::{DateTime, Utc};

pub mod contract;
pub mod offer;
pub mod payment;
pub mod state;

use crate::bus::NodeAddress;
use crate::{Error, LogStyle};
use contract::Contract;
use offer::{Offer, OfferDirection};
use state::{check_transition, DisputeState, Phase, State, Transition};

/// Side a trader plays in a trade
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeRole {
    pub buyer: bool,
    pub maker: bool,
}

impl TradeRole {
    /// Role of the local trader given the maker's offer direction
    pub fn new(direction: OfferDirection, is_maker: bool) -> Self {
        TradeRole {
            buyer: (direction == OfferDirection::Buy) == is_maker,
            maker: is_maker,
        }
    }

    pub fn is_buyer(self) -> bool {
        self.buyer
    }

    pub fn is_maker(self) -> bool {
        self.maker
    }
}

impl fmt::Display for TradeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.buyer, self.maker) {
            (true, true) => f.write_str("buyer as maker"),
            (true, false) => f.write_str("buyer as taker"),
            (false, true) => f.write_str("seller as maker"),
            (false, false) => f.write_str("seller as taker"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    /// Trade identifier, the id of the taken offer
    pub id: String,
    pub offer: Offer,
    pub role: TradeRole,
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
    /// Miner fee of the deposit spending transactions, kept in the multisig output
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub trade_tx_fee: Amount,
    pub take_offer_date: DateTime<Utc>,
    /// Block height from which the delayed payout transaction may be mined
    pub lock_time: u32,
    state: State,
    dispute_state: DisputeState,
    deposit_tx: Option<Transaction>,
    delayed_payout_tx: Option<Transaction>,
    payout_tx: Option<Transaction>,
    /// Peer address, only updated from a validated incoming message
    pub trading_peer_node_address: Option<NodeAddress>,
    contract: Option<Contract>,
    contract_as_json: Option<String>,
    #[serde(default, with = "hex")]
    pub maker_contract_signature: Vec<u8>,
    #[serde(default, with = "hex")]
    pub taker_contract_signature: Vec<u8>,
    pub counter_currency_tx_id: Option<String>,
    pub counter_currency_extra_data: Option<String>,
    pub fiat_received_date: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl Trade {
    pub fn new(
        offer: Offer,
        is_maker: bool,
        amount: Amount,
        trade_tx_fee: Amount,
        lock_time: u32,
    ) -> Self {
        Trade {
            id: offer.id.clone(),
            role: TradeRole::new(offer.direction, is_maker),
            offer,
            amount,
            trade_tx_fee,
            take_offer_date: Utc::now(),
            lock_time,
            state: State::Preparation,
            dispute_state: DisputeState::NoDispute,
            deposit_tx: None,
            delayed_payout_tx: None,
            payout_tx: None,
            trading_peer_node_address: None,
            contract: None,
            contract_as_json: None,
            maker_contract_signature: vec![],
            taker_contract_signature: vec![],
            counter_currency_tx_id: None,
            counter_currency_extra_data: None,
            fiat_received_date: None,
            error_message: None,
        }
    }

    pub fn is_buyer(&self) -> bool {
        self.role.is_buyer()
    }

    pub fn is_maker(&self) -> bool {
        self.role.is_maker()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Moves the trade to `state` if the transition table allows it.
    ///
    /// A state of an earlier phase is ignored with a warning, so replayed steps never move the
    /// checkpoint backwards. A state the local role can never reach is an error.
    pub fn set_state(&mut self, state: State) -> Result<Transition, Error> {
        let from = self.state;
        let transition = check_transition(self.role, from, state)?;
        match transition {
            Transition::Applied => {
                info!(
                    "{} | Trade state transition {} -> {}",
                    self.id.trade_id(),
                    from.red_bold(),
                    state.bright_green_bold()
                );
                self.state = state;
            }
            Transition::Unchanged => {
                debug!(
                    "{} | Trade state self transition {}",
                    self.id.trade_id(),
                    state.bright_green_bold()
                );
            }
            Transition::Stale => {
                warn!(
                    "{} | Ignoring stale state transition {} -> {}",
                    self.id.trade_id(),
                    from,
                    state.err()
                );
            }
        }
        Ok(transition)
    }

    pub fn dispute_state(&self) -> DisputeState {
        self.dispute_state
    }

    pub fn set_dispute_state(&mut self, dispute_state: DisputeState) {
        self.dispute_state = dispute_state;
    }

    pub fn deposit_tx(&self) -> Option<&Transaction> {
        self.deposit_tx.as_ref()
    }

    pub fn delayed_payout_tx(&self) -> Option<&Transaction> {
        self.delayed_payout_tx.as_ref()
    }

    pub fn payout_tx(&self) -> Option<&Transaction> {
        self.payout_tx.as_ref()
    }

    pub fn apply_deposit_tx(&mut self, tx: Transaction) -> Result<(), Error> {
        set_once(&mut self.deposit_tx, tx, "deposit tx", &self.id)
    }

    pub fn apply_delayed_payout_tx(&mut self, tx: Transaction) -> Result<(), Error> {
        set_once(&mut self.delayed_payout_tx, tx, "delayed payout tx", &self.id)
    }

    pub fn apply_payout_tx(&mut self, tx: Transaction) -> Result<(), Error> {
        set_once(&mut self.payout_tx, tx, "payout tx", &self.id)
    }

    pub fn contract(&self) -> Option<&Contract> {
        self.contract.as_ref()
    }

    pub fn contract_mut(&mut self) -> Option<&mut Contract> {
        self.contract.as_mut()
    }

    pub fn contract_as_json(&self) -> Option<&str> {
        self.contract_as_json.as_deref()
    }

    /// Records the signed contract together with the JSON document the signatures cover
    pub fn set_contract(&mut self, contract: Contract) -> Result<(), Error> {
        self.contract_as_json = Some(contract.to_signed_json()?);
        self.contract = Some(contract);
        Ok(())
    }

    pub fn buyer_security_deposit(&self) -> Amount {
        self.offer.buyer_security_deposit
    }

    pub fn seller_security_deposit(&self) -> Amount {
        self.offer.seller_security_deposit
    }

    /// Payout amounts of the cooperative payout: the buyer receives its security deposit and the
    /// trade amount, the seller gets its security deposit back
    pub fn payout_amounts(&self) -> (Amount, Amount) {
        (
            self.buyer_security_deposit() + self.amount,
            self.seller_security_deposit(),
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Appends a diagnostic, earlier failures are kept
    pub fn append_error_message(&mut self, message: &str) {
        self.error_message = Some(match self.error_message.take() {
            Some(previous) if !previous.is_empty() => format!("{}\n{}", previous, message),
            _ => message.to_string(),
        });
    }

    /// A trade carrying an error message stopped on a failed task
    pub fn has_failed(&self) -> bool {
        self.error_message.is_some()
    }
}

fn set_once(
    slot: &mut Option<Transaction>,
    tx: Transaction,
    name: &str,
    trade_id: &str,
) -> Result<(), Error> {
    match slot {
        Some(existing) if existing.txid() == tx.txid() => {
            debug!(
                "{} | {} {} already applied",
                trade_id.trade_id(),
                name,
                tx.txid().tx_hash()
            );
            Ok(())
        }
        Some(_) => Err(Error::AlreadySet(name.to_string())),
        None => {
            debug!(
                "{} | Applying {} {}",
                trade_id.trade_id(),
                name.label(),
                tx.txid().tx_hash()
            );
            *slot = Some(tx);
            Ok(())
        }
    }
}
