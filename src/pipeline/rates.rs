//! Exchange-rate collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{AppError, AppResult};

/// Round to 2 decimal places before storing on a payment record
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// External rate provider for currency pairs at a posting date
#[async_trait]
pub trait ExchangeRates: Send + Sync {
    async fn rate(&self, from: &str, to: &str, as_of: NaiveDate) -> AppResult<f64>;
}

/// Static rate table. Identical currencies always resolve to 1.0; any
/// other pair must be configured explicitly.
#[derive(Debug, Clone, Default)]
pub struct FixedRates {
    rates: HashMap<(String, String), f64>,
}

impl FixedRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.rates.insert((from.to_string(), to.to_string()), rate);
        self
    }
}

#[async_trait]
impl ExchangeRates for FixedRates {
    async fn rate(&self, from: &str, to: &str, _as_of: NaiveDate) -> AppResult<f64> {
        if from == to {
            return Ok(1.0);
        }
        self.rates
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .ok_or_else(|| {
                AppError::store(format!("no exchange rate configured for {from} -> {to}"))
            })
    }
}
