// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeSet;
use std::str::FromStr;

use bitcoin::{Address, Amount, OutPoint, Transaction};

use crate::trade::Trade;
use crate::Error;

/// Represent a blockchain height
pub type BlockHeight = u32;

/// Represent a block length or a block number
pub type BlockSpan = u32;

pub const BLOCKS_PER_DAY: BlockSpan = 144;

/// Sequence of the delayed payout input, enables the absolute lock time without opting in to RBF
pub const DELAYED_PAYOUT_TX_SEQUENCE: u32 = 0xFFFF_FFFE;

/// Sequence of the cooperative payout input
pub const FINAL_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Lock time parameters of the delayed payout transaction. The lock time must leave the traders
/// enough blocks to settle the trade cooperatively or through mediation before the arbitration
/// fallback becomes spendable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalSafety {
    /// Blocks until the delayed payout of a fiat trade can be mined
    pub fiat_lock_time: BlockSpan,
    /// Blocks until the delayed payout of an altcoin trade can be mined
    pub crypto_lock_time: BlockSpan,
    /// Lower bound for both lock times
    pub min_lock_time: BlockSpan,
}

impl Default for TemporalSafety {
    fn default() -> Self {
        TemporalSafety {
            fiat_lock_time: 20 * BLOCKS_PER_DAY,
            crypto_lock_time: 5 * BLOCKS_PER_DAY,
            min_lock_time: BLOCKS_PER_DAY,
        }
    }
}

impl TemporalSafety {
    /// check if lock time params are in correct order
    pub fn valid_params(&self) -> Result<(), Error> {
        if self.min_lock_time <= self.crypto_lock_time
            && self.crypto_lock_time <= self.fiat_lock_time
        {
            Ok(())
        } else {
            Err(Error::Validation(
                "unsafe and invalid lock time parameters".to_string(),
            ))
        }
    }

    pub fn lock_time_span(&self, is_crypto: bool) -> BlockSpan {
        if is_crypto {
            self.crypto_lock_time
        } else {
            self.fiat_lock_time
        }
    }

    /// Absolute lock time of a delayed payout created at `best_height`
    pub fn lock_time(&self, best_height: BlockHeight, is_crypto: bool) -> BlockHeight {
        best_height + self.lock_time_span(is_crypto)
    }
}

/// Checks the delayed payout transaction pays the whole escrow, minus the miner fee, to a DAO
/// donation address once `trade.lock_time` is reached.
pub fn validate_delayed_payout_tx(
    trade: &Trade,
    tx: &Transaction,
    donation_addresses: &BTreeSet<String>,
) -> Result<(), Error> {
    let fail = |reason: String| {
        Err(Error::Validation(format!(
            "delayed payout tx {} of trade {}: {}",
            tx.txid(),
            trade.id,
            reason
        )))
    };
    if tx.input.len() != 1 {
        return fail(format!("expected 1 input, found {}", tx.input.len()));
    }
    if tx.output.len() != 1 {
        return fail(format!("expected 1 output, found {}", tx.output.len()));
    }
    if tx.lock_time != trade.lock_time {
        return fail(format!(
            "lock time {} does not match {}",
            tx.lock_time, trade.lock_time
        ));
    }
    if tx.input[0].sequence != DELAYED_PAYOUT_TX_SEQUENCE {
        return fail(format!("invalid input sequence {:#x}", tx.input[0].sequence));
    }
    let expected = trade.buyer_security_deposit() + trade.seller_security_deposit() + trade.amount;
    let output = &tx.output[0];
    if Amount::from_sat(output.value) != expected {
        return fail(format!(
            "output value {} sat, expected {} sat",
            output.value,
            expected.as_sat()
        ));
    }
    let pays_donation_address = donation_addresses
        .iter()
        .filter_map(|address| Address::from_str(address).ok())
        .any(|address| address.script_pubkey() == output.script_pubkey);
    if !pays_donation_address {
        return fail("output does not pay a DAO donation address".to_string());
    }
    Ok(())
}

/// Checks `tx` spends the multisig output of the deposit transaction
pub fn validate_payout_tx_input(deposit_tx: &Transaction, tx: &Transaction) -> Result<(), Error> {
    let expected = OutPoint::new(deposit_tx.txid(), 0);
    match tx.input.as_slice() {
        [input] if input.previous_output == expected => Ok(()),
        [input] => Err(Error::Validation(format!(
            "tx {} spends {}, expected deposit output {}",
            tx.txid(),
            input.previous_output,
            expected
        ))),
        inputs => Err(Error::Validation(format!(
            "tx {} has {} inputs, expected 1",
            tx.txid(),
            inputs.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        let safety = TemporalSafety::default();
        assert!(safety.valid_params().is_ok());
        assert_eq!(safety.lock_time_span(false), 2880);
        assert_eq!(safety.lock_time_span(true), 720);
        assert_eq!(safety.lock_time(700_000, true), 700_720);
    }

    #[test]
    fn inverted_lock_times_are_rejected() {
        let safety = TemporalSafety {
            fiat_lock_time: 100,
            crypto_lock_time: 200,
            min_lock_time: 10,
        };
        assert!(safety.valid_params().is_err());
    }
}
