//! Pricing abstractions and core types

use crate::core::error::{PriceError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Date format used by callers for `from`/`till`.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// One normalized quotation: a symbol, its trading day and the per-unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRecord {
    pub commodity: String,
    pub date: NaiveDate,
    pub price: Decimal,
}

impl PriceRecord {
    pub fn new(commodity: impl Into<String>, date: NaiveDate, price: Decimal) -> Self {
        PriceRecord {
            commodity: commodity.into(),
            date,
            price,
        }
    }
}

/// Inclusive calendar-date bounds of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub till: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, till: NaiveDate) -> Result<Self> {
        if from > till {
            return Err(PriceError::InvalidDateInput {
                value: format!("{from}..{till}"),
                reason: "'from' must not be after 'till'".to_string(),
            });
        }
        Ok(DateRange { from, till })
    }

    /// Parses both bounds from `YYYY-MM-DD`.
    pub fn parse(from: &str, till: &str) -> Result<Self> {
        Self::new(parse_iso_date(from)?, parse_iso_date(till)?)
    }
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE_FORMAT).map_err(|e| {
        PriceError::InvalidDateInput {
            value: value.to_string(),
            reason: format!("{e}, expected YYYY-MM-DD"),
        }
    })
}

/// A provider that can turn a symbol and a date range into a price series.
///
/// Records come back in the order the upstream returned them, which is
/// chronologically non-decreasing for both supported providers.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn prices(&self, commodity: &str, range: &DateRange) -> Result<Vec<PriceRecord>>;
}
