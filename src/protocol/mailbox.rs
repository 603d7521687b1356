// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use uuid::Uuid;

use crate::bus::{NodeAddress, PubKeyRing, TradeMessage};

/// Delivery result of a mailbox message
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(inner)]
pub enum MailboxOutcome {
    /// The peer was online and received the message
    #[display("arrived")]
    Arrived,
    /// The peer was offline, the message waits in its mailbox
    #[display("stored in mailbox")]
    StoredInMailbox,
    #[display("fault: {0}")]
    Fault(String),
}

pub type MailboxListener = Box<dyn FnOnce(MailboxOutcome) + Send + 'static>;

/// Encrypted store-and-forward channel to the trading peer
pub trait MailboxService: Send + Sync {
    /// Sends `message` encrypted to `pub_key_ring`, `listener` fires exactly once
    fn send_encrypted_mailbox_message(
        &self,
        peer: &NodeAddress,
        pub_key_ring: &PubKeyRing,
        message: TradeMessage,
        listener: MailboxListener,
    );

    /// Drops a processed message from the local mailbox backlog
    fn remove_mailbox_msg(&self, uid: &Uuid);
}
