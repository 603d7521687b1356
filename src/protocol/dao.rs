// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeSet;

use crate::config::DaoConfig;

/// DAO voted parameters read by the trade protocol
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[display(Debug)]
pub enum Param {
    /// Receiver of delayed payouts
    RecipientBtcAddress,
}

pub trait DaoFacade: Send + Sync {
    fn param_value(&self, param: Param) -> Option<String>;

    /// Every donation address ever voted, a delayed payout may pay any of them
    fn all_donation_addresses(&self) -> BTreeSet<String>;
}

/// Parameters taken from the `[dao]` section of the configuration file
#[derive(Clone, Debug)]
pub struct ConfiguredDaoFacade {
    config: DaoConfig,
}

impl From<DaoConfig> for ConfiguredDaoFacade {
    fn from(config: DaoConfig) -> Self {
        ConfiguredDaoFacade { config }
    }
}

impl DaoFacade for ConfiguredDaoFacade {
    fn param_value(&self, param: Param) -> Option<String> {
        match param {
            Param::RecipientBtcAddress => Some(self.config.donation_address.clone()),
        }
    }

    fn all_donation_addresses(&self) -> BTreeSet<String> {
        self.config
            .historical_donation_addresses
            .iter()
            .chain(std::iter::once(&self.config.donation_address))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TESTNET_DONATION_ADDRESS;

    #[test]
    fn donation_addresses_include_history() {
        let mut config = DaoConfig::for_network(bitcoin::Network::Testnet);
        config
            .historical_donation_addresses
            .push("2MzBNKyJjx44BDJfwEevVzS3Q9Z5kSEYUZB".to_string());
        let dao = ConfiguredDaoFacade::from(config);
        assert_eq!(
            dao.param_value(Param::RecipientBtcAddress).as_deref(),
            Some(DEFAULT_TESTNET_DONATION_ADDRESS)
        );
        assert_eq!(dao.all_donation_addresses().len(), 2);
    }
}
