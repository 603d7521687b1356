// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Envelopes exchanged with the trading peer. The payloads of the trade protocol live in
//! [`p2p`].

use std::fmt;
use std::str::FromStr;

use bitcoin::PublicKey;
use uuid::Uuid;

use crate::Error;

pub mod p2p;

pub use p2p::TradeMessage;

/// Network address of a peer, a hidden service host name and a port
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host_name: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host_name: impl Into<String>, port: u16) -> Self {
        NodeAddress {
            host_name: host_name.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_name, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host_name, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Protocol(format!("node address {} has no port", s)))?;
        if host_name.is_empty() {
            return Err(Error::Protocol(format!("node address {} has no host", s)));
        }
        let port = port
            .parse()
            .map_err(|_| Error::Protocol(format!("invalid port in node address {}", s)))?;
        Ok(NodeAddress::new(host_name, port))
    }
}

/// Public keys of a trader: the key authenticating its messages and the key messages to it are
/// encrypted to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyRing {
    pub signature_pub_key: PublicKey,
    pub encryption_pub_key: PublicKey,
}

/// A trade message after decryption, together with the key that signed it
#[derive(Clone, Debug)]
pub struct DecryptedMessageWithPubKey {
    pub message: TradeMessage,
    pub signature_pub_key: PublicKey,
}

impl DecryptedMessageWithPubKey {
    pub fn new(message: TradeMessage, signature_pub_key: PublicKey) -> Self {
        DecryptedMessageWithPubKey {
            message,
            signature_pub_key,
        }
    }
}

/// Delivery state of an outbound message, tracked per message uid
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum MessageState {
    Undefined,
    Sent,
    Arrived,
    StoredInMailbox,
    Acknowledged,
    Failed,
}

impl Default for MessageState {
    fn default() -> Self {
        MessageState::Undefined
    }
}

/// Acknowledgement of a processed trade message, `success` is false when the peer's task
/// pipeline failed on it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub trade_id: String,
    pub uid: Uuid,
    pub sender_node_address: NodeAddress,
    pub source_uid: Uuid,
    pub source_msg_class_name: String,
    pub success: bool,
    pub error_message: Option<String>,
}
