//! Ports to the host platform's chat and notification subsystems, and a
//! collecting implementation for embedders that forward effects themselves.

use contracts::{ChatCard, Notice, ReplicationMessage};

use crate::replication::Relay;

pub trait TableHost: Send {
    fn post_chat(&mut self, card: ChatCard);

    fn notify(&mut self, notice: Notice);
}

/// Collects every outbound effect in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    pub chat: Vec<ChatCard>,
    pub notices: Vec<Notice>,
    pub replicated: Vec<ReplicationMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Outbox {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        self.chat.is_empty() && self.notices.is_empty() && self.replicated.is_empty()
    }
}

impl TableHost for Outbox {
    fn post_chat(&mut self, card: ChatCard) {
        self.chat.push(card);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

impl Relay for Outbox {
    fn publish(&mut self, message: ReplicationMessage) {
        self.replicated.push(message);
    }
}
