//! Payment collaborator
//!
//! The engine never tokenizes cards or talks to a processor; it asks a
//! [`PaymentGateway`] to capture an amount against a reference and records
//! method, reference and amount on the reservation. A capture whose recording
//! fails is handed back through [`PaymentGateway::refund`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::PaymentMethod,
};

/// Proof of a successful capture
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub reference: String,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub captured_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Capture `amount`; fails with `PaymentFailed` when the processor declines
    async fn capture(&self, reference: &str, method: PaymentMethod, amount: Decimal) -> AppResult<PaymentReceipt>;

    /// Reverse a capture in full
    async fn refund(&self, receipt: &PaymentReceipt) -> AppResult<()>;
}

/// Gateway that accepts any non-empty reference and keeps what it captured.
///
/// Suitable for development and for deployments where payment is taken at
/// the counter and only recorded here.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    captured: Arc<Mutex<Vec<PaymentReceipt>>>,
    refunded: Arc<Mutex<Vec<PaymentReceipt>>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn captured(&self) -> Vec<PaymentReceipt> {
        self.captured.lock().await.clone()
    }

    pub async fn refunded(&self) -> Vec<PaymentReceipt> {
        self.refunded.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn capture(&self, reference: &str, method: PaymentMethod, amount: Decimal) -> AppResult<PaymentReceipt> {
        if reference.trim().is_empty() {
            return Err(AppError::PaymentFailed("Payment reference is required".to_string()));
        }
        if amount <= Decimal::ZERO {
            return Err(AppError::PaymentFailed(format!("Cannot capture {}", amount)));
        }

        let receipt = PaymentReceipt {
            reference: reference.to_string(),
            method,
            amount,
            captured_at: Utc::now(),
        };
        self.captured.lock().await.push(receipt.clone());
        tracing::info!(reference, %amount, method = method.as_str(), "Payment recorded");
        Ok(receipt)
    }

    async fn refund(&self, receipt: &PaymentReceipt) -> AppResult<()> {
        let captured = self.captured.lock().await;
        if !captured.contains(receipt) {
            return Err(AppError::PaymentFailed(format!(
                "No capture {} to refund",
                receipt.reference
            )));
        }
        drop(captured);

        self.refunded.lock().await.push(receipt.clone());
        tracing::info!(reference = %receipt.reference, amount = %receipt.amount, "Payment refunded");
        Ok(())
    }
}
