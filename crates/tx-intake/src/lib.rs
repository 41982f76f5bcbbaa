//! # tx-intake
//!
//! Signal intake channels and the control API.
//!
//! - **Webhook** (`webhook`): `POST /webhook`, synchronous accept/reject
//! - **Mailbox** (`mailbox`): IMAP polling loop reading signals from subjects
//! - **Control** (`control`): JSON monitoring/control endpoints over `TradeDesk`
//!
//! Both intake channels feed the same [`SignalProcessor`](tx_signal::SignalProcessor)
//! and share nothing else but the exchange registry.

pub mod control;
pub mod mailbox;
pub mod webhook;
