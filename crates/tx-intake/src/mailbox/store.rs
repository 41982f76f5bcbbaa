//! Mail store abstraction used by the poller.
//!
//! A [`MailStore`] opens one [`MailSession`] per polling cycle. Sessions
//! must not change flags when reading; only [`MailSession::mark_seen`] does.

use async_trait::async_trait;

/// An unread message, reduced to what signal extraction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub uid: u32,
    /// Decoded subject, `None` when the message has no Subject header.
    pub subject: Option<String>,
}

#[async_trait]
pub trait MailStore: Send + Sync {
    /// Connect, authenticate, and select the configured folder.
    async fn open(&self) -> anyhow::Result<Box<dyn MailSession>>;
}

#[async_trait]
pub trait MailSession: Send {
    /// Unread messages, in ascending UID order.
    async fn fetch_unseen(&mut self) -> anyhow::Result<Vec<Envelope>>;

    /// Flag one message as read.
    async fn mark_seen(&mut self, uid: u32) -> anyhow::Result<()>;

    /// End the session.
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}
