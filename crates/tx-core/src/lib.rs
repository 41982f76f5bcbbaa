//! # tx-core
//!
//! Core crate for the TradeX signal relay, providing:
//!
//! - **Types** (`types`): sides, order types, positions, pending orders, balances, portfolio summary
//! - **Configuration** (`config`): JSON config deserialization and validation
//! - **Error types** (`error`): `ValidationError`, `ExecError`, `ConfigurationError` via thiserror
//! - **Numeric helpers** (`numeric`): lenient string-or-number parsing of exchange and signal fields
//! - **Symbol helpers** (`symbol`): unified symbol comparison
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod numeric;
pub mod symbol;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
