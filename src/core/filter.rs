//! Post-processing of retrieved price series.

use crate::core::price::PriceRecord;
use anyhow::anyhow;
use chrono::Datelike;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    None,
    Monthly,
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Filter::None => "none",
                Filter::Monthly => "monthly",
            }
        )
    }
}

impl FromStr for Filter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Filter::None),
            "monthly" => Ok(Filter::Monthly),
            _ => Err(anyhow!("Invalid filter: {}", s)),
        }
    }
}

impl Filter {
    pub fn apply(self, prices: Vec<PriceRecord>) -> Vec<PriceRecord> {
        match self {
            Filter::None => prices,
            Filter::Monthly => monthly(&prices),
        }
    }
}

/// Keeps the last trading day of every calendar month.
///
/// The input is expected in the natural provider order. Duplicate or
/// out-of-order dates never move the running candidate backwards.
pub fn monthly(prices: &[PriceRecord]) -> Vec<PriceRecord> {
    let mut filtered = Vec::new();
    let Some(first) = prices.first() else {
        return filtered;
    };

    let mut last_trading_day = first;
    for price in prices {
        if month_of(price) != month_of(last_trading_day) {
            filtered.push(last_trading_day.clone());
        }
        if price.date > last_trading_day.date {
            last_trading_day = price;
        }
    }
    filtered.push(last_trading_day.clone());
    filtered
}

fn month_of(price: &PriceRecord) -> (i32, u32) {
    (price.date.year(), price.date.month())
}
