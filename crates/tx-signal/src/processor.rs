//! Signal pipeline: validate → resolve exchange → place order.
//!
//! Shared by every intake channel. Each stage failure is logged here with
//! the payload's exchange/symbol context, so intake adapters only decide how
//! to acknowledge the signal.
//!
//! Execution runs on its own task: a panicking exchange client fails that one
//! signal with [`SignalError::Aborted`] instead of unwinding into the caller's
//! server or polling loop.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};
use tx_core::OrderAck;
use tx_core::error::{ConfigurationError, ExecError, ValidationError};
use tx_exchange::ExchangeRegistry;

use crate::executor;
use crate::validator::{OrderIntent, SignalValidator};

/// Why a signal did not result in an order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Unavailable(#[from] ConfigurationError),

    #[error(transparent)]
    Execution(#[from] ExecError),

    /// The execution task panicked or was cancelled.
    #[error("signal execution aborted: {0}")]
    Aborted(String),
}

impl SignalError {
    /// True when the payload itself was rejected (including PIN mismatch).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_pin_mismatch(&self) -> bool {
        matches!(self, Self::Validation(ValidationError::PinMismatch))
    }
}

/// Validator plus registry; cheap to clone into every intake task.
#[derive(Debug, Clone)]
pub struct SignalProcessor {
    validator: SignalValidator,
    registry: Arc<ExchangeRegistry>,
}

impl SignalProcessor {
    pub fn new(validator: SignalValidator, registry: Arc<ExchangeRegistry>) -> Self {
        Self { validator, registry }
    }

    /// Run one raw payload through the pipeline. `source` tags the log lines
    /// (`"webhook"`, `"mailbox"`).
    pub async fn process(&self, source: &'static str, raw: &Map<String, Value>) -> Result<OrderAck, SignalError> {
        let intent = self.validator.validate(raw).inspect_err(|e| {
            warn!("[{source}] signal rejected: {e}");
        })?;
        info!("[{source}] accepted {intent}");

        let this = self.clone();
        tokio::spawn(async move { this.execute(source, &intent).await })
            .await
            .unwrap_or_else(|e| {
                error!("[{source}] signal execution aborted: {e}");
                Err(SignalError::Aborted(e.to_string()))
            })
    }

    /// Resolve the intent's exchange and place the order.
    async fn execute(&self, source: &str, intent: &OrderIntent) -> Result<OrderAck, SignalError> {
        let exchange = self.registry.require(intent.exchange()).inspect_err(|e| {
            warn!("[{source}] {intent}: {e}");
        })?;

        info!("[{source}] executing {intent}");
        // place_order logs its own outcome.
        let ack = executor::place_order(exchange.as_ref(), intent).await?;
        Ok(ack)
    }
}
