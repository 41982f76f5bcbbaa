//! # tx-signal
//!
//! Signal handling and trading operations on top of an [`ExchangeRegistry`].
//!
//! ```text
//!  raw payload ──► SignalValidator ──► OrderIntent ──► executor::place_order ──► Exchange
//!                        (processor: validate → resolve → place)
//!
//!  TradeDesk ──► executor::{get_positions, get_pending_orders, close_*, cancel_order}
//!            └─► portfolio::summarize
//! ```
//!
//! | Module      | Contents                                                   |
//! |-------------|------------------------------------------------------------|
//! | `validator` | Payload checks, `OrderIntent`                              |
//! | `executor`  | Order placement, position close, cancel, read fan-out      |
//! | `portfolio` | Cross-exchange balance / PnL / margin aggregation          |
//! | `processor` | `SignalProcessor` pipeline shared by the intake channels   |
//! | `desk`      | `TradeDesk` monitoring and control facade                  |
//!
//! [`ExchangeRegistry`]: tx_exchange::ExchangeRegistry

pub mod desk;
pub mod executor;
pub mod portfolio;
pub mod processor;
pub mod validator;

pub use desk::TradeDesk;
pub use executor::{CloseAllReport, CloseOutcome, FanOut};
pub use processor::{SignalError, SignalProcessor};
pub use validator::{OrderIntent, SignalValidator};
