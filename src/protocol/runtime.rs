// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::mailbox::MailboxOutcome;
use super::tasks::TradeTask;
use super::{buyer, seller, TaskContext, TaskInterceptor, TaskRunner};
use crate::bus::{AckMessage, DecryptedMessageWithPubKey, TradeMessage};
use crate::config::ProtocolConfig;
use crate::event::TradeEvent;
use crate::trade::state::{Phase, State};
use crate::trade::Trade;
use crate::{Error, LogStyle};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display(Debug)]
pub enum ProtocolRole {
    Seller,
    Buyer,
}

impl ProtocolRole {
    pub fn of(trade: &Trade) -> Self {
        if trade.is_buyer() {
            ProtocolRole::Buyer
        } else {
            ProtocolRole::Seller
        }
    }
}

/// Remaining task sequence of an interrupted trade, derived from its persisted state
pub fn resume_plan(trade: &Trade) -> Option<&'static [TradeTask]> {
    match ProtocolRole::of(trade) {
        ProtocolRole::Seller => seller::resume_plan(trade),
        ProtocolRole::Buyer => buyer::resume_plan(trade),
    }
}

/// Protocol of one trade: maps events to task sequences of the local role and runs them
pub struct TradeProtocol {
    ctx: TaskContext,
    role: ProtocolRole,
    timeout: Option<Duration>,
    interceptor: Option<Arc<dyn TaskInterceptor>>,
}

impl TradeProtocol {
    pub fn new(ctx: TaskContext, config: &ProtocolConfig) -> Self {
        let role = ProtocolRole::of(&ctx.lock().trade);
        TradeProtocol {
            ctx,
            role,
            timeout: config.timeout(),
            interceptor: None,
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn TaskInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    pub fn role(&self) -> ProtocolRole {
        self.role
    }

    pub async fn handle(&self, event: TradeEvent) -> Result<(), Error> {
        let trade_id = self.ctx.trade_id();
        debug!(
            "{} | {} handles {}",
            trade_id.trade_id(),
            self.role,
            event.label()
        );
        match event {
            TradeEvent::Start => {
                self.expect_role(ProtocolRole::Seller, "start")?;
                self.expect_phase(seller::START_PHASES, "start")?;
                self.run(seller::START).await
            }
            TradeEvent::Message(envelope) => self.on_message(envelope).await,
            TradeEvent::PaymentStarted => {
                self.expect_role(ProtocolRole::Buyer, "payment started")?;
                self.expect_phase(buyer::PAYMENT_STARTED_PHASES, "payment started")?;
                self.run(buyer::PAYMENT_STARTED).await
            }
            TradeEvent::PaymentReceived => {
                self.expect_role(ProtocolRole::Seller, "payment received")?;
                self.expect_phase(seller::PAYMENT_RECEIVED_PHASES, "payment received")?;
                self.run(seller::PAYMENT_RECEIVED).await
            }
            TradeEvent::DepositConfirmed => {
                self.ctx
                    .lock()
                    .trade
                    .set_state(State::DepositConfirmedInBlockChain)?;
                self.ctx.request_persistence()
            }
            TradeEvent::Resume => {
                let plan = resume_plan(&self.ctx.lock().trade);
                match plan {
                    Some(tasks) => {
                        info!(
                            "{} | Resuming with {} remaining tasks",
                            trade_id.trade_id(),
                            tasks.len()
                        );
                        self.run(tasks).await
                    }
                    None => {
                        debug!("{} | Nothing to resume", trade_id.trade_id());
                        Ok(())
                    }
                }
            }
        }
    }

    async fn run(&self, tasks: &[TradeTask]) -> Result<(), Error> {
        TaskRunner::new(self.ctx.clone())
            .with_timeout(self.timeout)
            .with_interceptor(self.interceptor.clone())
            .run(tasks)
            .await
    }

    fn expect_role(&self, role: ProtocolRole, event: &str) -> Result<(), Error> {
        if self.role != role {
            return Err(Error::Protocol(format!(
                "{} is a {} event, the local trader is the {}",
                event, role, self.role
            )));
        }
        Ok(())
    }

    fn expect_phase(&self, phases: &[Phase], event: &str) -> Result<(), Error> {
        let phase = self.ctx.lock().trade.phase();
        if !phases.contains(&phase) {
            return Err(Error::UnexpectedMessage {
                message: event.to_string(),
                phase: phase.to_string(),
            });
        }
        Ok(())
    }

    async fn on_message(&self, envelope: DecryptedMessageWithPubKey) -> Result<(), Error> {
        let message = envelope.message;
        if let Err(err) = self.accept(&message, &envelope.signature_pub_key) {
            if err.is_precondition_violation() {
                error!(
                    "{} | Rejected {}: {}",
                    message.trade_id().trade_id(),
                    message.label(),
                    err.err()
                );
            } else {
                warn!(
                    "{} | Ignored {}: {}",
                    message.trade_id().trade_id(),
                    message.label(),
                    err
                );
            }
            return Err(err);
        }

        if let TradeMessage::Ack(ack) = &message {
            self.on_ack(ack);
            return self.ctx.request_persistence();
        }

        let plan = match self.role {
            ProtocolRole::Seller => seller::message_plan(&message),
            ProtocolRole::Buyer => buyer::message_plan(&message),
        };
        let tasks = {
            let mut guard = self.ctx.lock();
            let (tasks, phases) = plan.ok_or_else(|| Error::UnexpectedMessage {
                message: message.to_string(),
                phase: guard.trade.phase().to_string(),
            })?;
            if !phases.contains(&guard.trade.phase()) {
                return Err(Error::UnexpectedMessage {
                    message: message.to_string(),
                    phase: guard.trade.phase().to_string(),
                });
            }
            guard.process_model.temp_trading_peer_node_address =
                Some(message.sender_node_address().clone());
            guard.process_model.trade_message = Some(message.clone());
            tasks
        };

        let result = self.run(tasks).await;
        self.ctx.lock().process_model.trade_message = None;
        self.send_ack(&message, &result);
        result
    }

    /// Checks the message belongs to this trade and was signed by the trading peer
    fn accept(
        &self,
        message: &TradeMessage,
        signature_pub_key: &bitcoin::PublicKey,
    ) -> Result<(), Error> {
        let guard = self.ctx.lock();
        if message.trade_id() != guard.trade.id {
            return Err(Error::TradeIdMismatch {
                expected: guard.trade.id.clone(),
                found: message.trade_id().to_string(),
            });
        }
        match &guard.process_model.trading_peer.pub_key_ring {
            Some(ring) if ring.signature_pub_key != *signature_pub_key => {
                Err(Error::InvalidSender)
            }
            _ => Ok(()),
        }
    }

    fn on_ack(&self, ack: &AckMessage) {
        let known = self
            .ctx
            .lock()
            .process_model
            .acknowledge(&ack.source_uid, ack.success);
        if !known {
            debug!(
                "{} | Ack for unknown message {}",
                ack.trade_id.trade_id(),
                ack.source_uid
            );
        } else if ack.success {
            info!(
                "{} | Peer acknowledged {}",
                ack.trade_id.trade_id(),
                ack.source_msg_class_name.label()
            );
        } else {
            warn!(
                "{} | Peer failed to process {}: {}",
                ack.trade_id.trade_id(),
                ack.source_msg_class_name.label(),
                ack.error_message
                    .as_deref()
                    .unwrap_or("no error message")
                    .err_details()
            );
        }
    }

    fn send_ack(&self, message: &TradeMessage, result: &Result<(), Error>) {
        let (ack, pub_key_ring) = {
            let guard = self.ctx.lock();
            let ack = AckMessage {
                trade_id: guard.trade.id.clone(),
                uid: Uuid::new_v4(),
                sender_node_address: guard.process_model.my_node_address.clone(),
                source_uid: message.uid(),
                source_msg_class_name: message.class_name().to_string(),
                success: result.is_ok(),
                error_message: result.as_ref().err().map(ToString::to_string),
            };
            (ack, guard.process_model.trading_peer.pub_key_ring.clone())
        };
        let pub_key_ring = match pub_key_ring {
            Some(ring) => ring,
            None => {
                warn!(
                    "{} | No pub key ring of the peer, cannot ack {}",
                    ack.trade_id.trade_id(),
                    ack.source_msg_class_name
                );
                return;
            }
        };
        let peer = message.sender_node_address().clone();
        let trade_id = ack.trade_id.clone();
        let success = ack.success;
        let class_name = ack.source_msg_class_name.clone();
        self.ctx.provider().mailbox.send_encrypted_mailbox_message(
            &peer,
            &pub_key_ring,
            TradeMessage::Ack(ack),
            Box::new(move |outcome| match outcome {
                MailboxOutcome::Fault(reason) => error!(
                    "{} | Sending ack for {} failed: {}",
                    trade_id.trade_id(),
                    class_name,
                    reason.err()
                ),
                outcome => debug!(
                    "{} | {} for {} {}",
                    trade_id.trade_id(),
                    if success { "Ack" } else { "Nack" },
                    class_name,
                    outcome
                ),
            }),
        );
    }
}
