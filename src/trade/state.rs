// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Trade checkpoint enumeration and the per-role transition table.
//!
//! The persisted [`State`] is the single source of truth for protocol progress. Every state
//! belongs to a [`Phase`]; phases only move forward, states within a phase may be visited in any
//! order because the seller sends the deposit transaction to the buyer before publishing it.

use super::TradeRole;
use crate::Error;

#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(Debug)]
pub enum Phase {
    Init,
    TakerFeePublished,
    DepositPublished,
    DepositConfirmed,
    FiatSent,
    FiatReceived,
    PayoutPublished,
    Withdrawn,
}

#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(Debug)]
pub enum State {
    // Phase Init
    Preparation,

    // Phase TakerFeePublished
    TakerPublishedTakerFeeTx,
    MakerSentPublishDepositTxRequest,
    MakerSawArrivedPublishDepositTxRequest,
    MakerStoredInMailboxPublishDepositTxRequest,
    MakerSendFailedPublishDepositTxRequest,
    TakerReceivedPublishDepositTxRequest,

    // Phase DepositPublished
    SellerPublishedDepositTx,
    SellerSentDepositTxPublishedMsg,
    SellerSawArrivedDepositTxPublishedMsg,
    SellerStoredInMailboxDepositTxPublishedMsg,
    SellerSendFailedDepositTxPublishedMsg,
    BuyerReceivedDepositTxPublishedMsg,
    BuyerSawDepositTxInNetwork,

    // Phase DepositConfirmed
    DepositConfirmedInBlockChain,

    // Phase FiatSent
    BuyerConfirmedInUiFiatPaymentInitiated,
    BuyerSentFiatPaymentInitiatedMsg,
    BuyerSawArrivedFiatPaymentInitiatedMsg,
    BuyerStoredInMailboxFiatPaymentInitiatedMsg,
    BuyerSendFailedFiatPaymentInitiatedMsg,
    SellerReceivedFiatPaymentInitiatedMsg,

    // Phase FiatReceived
    SellerConfirmedInUiFiatPaymentReceipt,
    SellerSentFiatPaymentReceiptMsg,
    SellerSawArrivedFiatPaymentReceiptMsg,
    SellerStoredInMailboxFiatPaymentReceiptMsg,
    SellerSendFailedFiatPaymentReceiptMsg,
    BuyerReceivedFiatPaymentReceiptMsg,

    // Phase PayoutPublished
    SellerPublishedPayoutTx,
    SellerSentPayoutTxPublishedMsg,
    SellerSawArrivedPayoutTxPublishedMsg,
    SellerStoredInMailboxPayoutTxPublishedMsg,
    SellerSendFailedPayoutTxPublishedMsg,
    BuyerReceivedPayoutTxPublishedMsg,
    BuyerSawPayoutTxInNetwork,
    SellerSentSignedWitnessMsg,
    SellerSawArrivedSignedWitnessMsg,
    SellerStoredInMailboxSignedWitnessMsg,
    SellerSendFailedSignedWitnessMsg,

    // Phase Withdrawn
    WithdrawCompleted,
}

/// Side of the trade a state is reserved to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Owner {
    Any,
    Buyer,
    Seller,
    Maker,
    Taker,
}

impl State {
    pub fn phase(self) -> Phase {
        use State::*;
        match self {
            Preparation => Phase::Init,
            TakerPublishedTakerFeeTx
            | MakerSentPublishDepositTxRequest
            | MakerSawArrivedPublishDepositTxRequest
            | MakerStoredInMailboxPublishDepositTxRequest
            | MakerSendFailedPublishDepositTxRequest
            | TakerReceivedPublishDepositTxRequest => Phase::TakerFeePublished,
            SellerPublishedDepositTx
            | SellerSentDepositTxPublishedMsg
            | SellerSawArrivedDepositTxPublishedMsg
            | SellerStoredInMailboxDepositTxPublishedMsg
            | SellerSendFailedDepositTxPublishedMsg
            | BuyerReceivedDepositTxPublishedMsg
            | BuyerSawDepositTxInNetwork => Phase::DepositPublished,
            DepositConfirmedInBlockChain => Phase::DepositConfirmed,
            BuyerConfirmedInUiFiatPaymentInitiated
            | BuyerSentFiatPaymentInitiatedMsg
            | BuyerSawArrivedFiatPaymentInitiatedMsg
            | BuyerStoredInMailboxFiatPaymentInitiatedMsg
            | BuyerSendFailedFiatPaymentInitiatedMsg
            | SellerReceivedFiatPaymentInitiatedMsg => Phase::FiatSent,
            SellerConfirmedInUiFiatPaymentReceipt
            | SellerSentFiatPaymentReceiptMsg
            | SellerSawArrivedFiatPaymentReceiptMsg
            | SellerStoredInMailboxFiatPaymentReceiptMsg
            | SellerSendFailedFiatPaymentReceiptMsg
            | BuyerReceivedFiatPaymentReceiptMsg => Phase::FiatReceived,
            SellerPublishedPayoutTx
            | SellerSentPayoutTxPublishedMsg
            | SellerSawArrivedPayoutTxPublishedMsg
            | SellerStoredInMailboxPayoutTxPublishedMsg
            | SellerSendFailedPayoutTxPublishedMsg
            | BuyerReceivedPayoutTxPublishedMsg
            | BuyerSawPayoutTxInNetwork
            | SellerSentSignedWitnessMsg
            | SellerSawArrivedSignedWitnessMsg
            | SellerStoredInMailboxSignedWitnessMsg
            | SellerSendFailedSignedWitnessMsg => Phase::PayoutPublished,
            WithdrawCompleted => Phase::Withdrawn,
        }
    }

    /// Fault states reached when a mailbox message could not be delivered
    pub fn is_send_failed(self) -> bool {
        use State::*;
        matches!(
            self,
            MakerSendFailedPublishDepositTxRequest
                | SellerSendFailedDepositTxPublishedMsg
                | BuyerSendFailedFiatPaymentInitiatedMsg
                | SellerSendFailedFiatPaymentReceiptMsg
                | SellerSendFailedPayoutTxPublishedMsg
                | SellerSendFailedSignedWitnessMsg
        )
    }

    fn owner(self) -> Owner {
        use State::*;
        match self {
            Preparation | DepositConfirmedInBlockChain | WithdrawCompleted => Owner::Any,
            TakerPublishedTakerFeeTx | TakerReceivedPublishDepositTxRequest => Owner::Taker,
            MakerSentPublishDepositTxRequest
            | MakerSawArrivedPublishDepositTxRequest
            | MakerStoredInMailboxPublishDepositTxRequest
            | MakerSendFailedPublishDepositTxRequest => Owner::Maker,
            BuyerReceivedDepositTxPublishedMsg
            | BuyerSawDepositTxInNetwork
            | BuyerConfirmedInUiFiatPaymentInitiated
            | BuyerSentFiatPaymentInitiatedMsg
            | BuyerSawArrivedFiatPaymentInitiatedMsg
            | BuyerStoredInMailboxFiatPaymentInitiatedMsg
            | BuyerSendFailedFiatPaymentInitiatedMsg
            | BuyerReceivedFiatPaymentReceiptMsg
            | BuyerReceivedPayoutTxPublishedMsg
            | BuyerSawPayoutTxInNetwork => Owner::Buyer,
            _ => Owner::Seller,
        }
    }

    /// Returns true if a trader in `role` may ever hold this state
    pub fn is_reachable_by(self, role: TradeRole) -> bool {
        match self.owner() {
            Owner::Any => true,
            Owner::Buyer => role.is_buyer(),
            Owner::Seller => !role.is_buyer(),
            Owner::Maker => role.is_maker(),
            Owner::Taker => !role.is_maker(),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::Preparation
    }
}

/// Result of checking a state change against the transition table
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display(Debug)]
pub enum Transition {
    /// The new state is recorded
    Applied,
    /// The trade already is in the requested state
    Unchanged,
    /// The requested state lies in an earlier phase, it is ignored; happens when a step is
    /// replayed after a restart
    Stale,
}

/// Checks `from -> to` for a trader in `role`.
///
/// States owned by the other side are rejected. The phase never moves backwards, a send-failed
/// state may only be left for a state of its own phase or a later one.
pub fn check_transition(role: TradeRole, from: State, to: State) -> Result<Transition, Error> {
    if !to.is_reachable_by(role) {
        return Err(Error::InvalidTransition { from, to });
    }
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if (from.is_send_failed() && to.phase() == from.phase()) || to.phase() >= from.phase() {
        Ok(Transition::Applied)
    } else {
        Ok(Transition::Stale)
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum DisputeState {
    NoDispute,
    DisputeRequested,
    DisputeStartedByPeer,
    DisputeClosed,
    MediationRequested,
    MediationStartedByPeer,
    MediationClosed,
    RefundRequested,
    RefundRequestStartedByPeer,
    RefundRequestClosed,
}

impl Default for DisputeState {
    fn default() -> Self {
        DisputeState::NoDispute
    }
}

impl DisputeState {
    pub fn is_open(self) -> bool {
        matches!(
            self,
            DisputeState::DisputeRequested
                | DisputeState::DisputeStartedByPeer
                | DisputeState::MediationRequested
                | DisputeState::MediationStartedByPeer
                | DisputeState::RefundRequested
                | DisputeState::RefundRequestStartedByPeer
        )
    }
}
