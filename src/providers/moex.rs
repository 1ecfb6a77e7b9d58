//! Moscow Exchange ISS historical data provider.

use crate::core::error::{PriceError, Result};
use crate::core::price::ISO_DATE_FORMAT;
use crate::core::{DateRange, PriceRecord, PriceSource};
use crate::providers::util::{fetch_document, http_client, parse_xml};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

/// Rows returned by the exchange per request; `start` advances by this much.
const PAGE_SIZE: usize = 100;

const HISTORY_BLOCK: &str = "history";
const CURSOR_BLOCK: &str = "history.cursor";

/// Market of the exchange's stock engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Market {
    #[default]
    Shares,
    Index,
    Bonds,
}

impl Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Market::Shares => "shares",
                Market::Index => "index",
                Market::Bonds => "bonds",
            }
        )
    }
}

impl FromStr for Market {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shares" => Ok(Market::Shares),
            "index" => Ok(Market::Index),
            "bonds" => Ok(Market::Bonds),
            _ => Err(anyhow!("Invalid market: {}", s)),
        }
    }
}

pub struct MoexClient {
    base_url: String,
    market: Market,
    board: Option<String>,
    client: reqwest::Client,
}

impl MoexClient {
    pub fn new(
        base_url: &str,
        market: Market,
        board: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(MoexClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            market,
            board: board.filter(|b| !b.trim().is_empty()),
            client: http_client(timeout)?,
        })
    }

    /// Builds the history URL; board and security are percent-encoded as
    /// single path segments.
    fn history_url(&self, commodity: &str) -> Result<String> {
        let invalid = |message: String| PriceError::InvalidUrl {
            url: self.base_url.clone(),
            message,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid("URL cannot be a base".to_string()))?;
            let market = self.market.to_string();
            let security = format!("{commodity}.xml");
            segments
                .pop_if_empty()
                .extend(["iss", "history", "engines", "stock", "markets", market.as_str()]);
            if let Some(board) = &self.board {
                segments.extend(["boards", board.as_str()]);
            }
            segments.extend(["securities", security.as_str()]);
        }
        Ok(url.to_string())
    }

    /// Fetches one page of history starting at row `start`.
    ///
    /// Returns the page's prices and the end-of-data signal from the cursor
    /// block, or `None` when the page carried no usable cursor.
    async fn page(
        &self,
        commodity: &str,
        range: &DateRange,
        start: usize,
    ) -> Result<(Vec<PriceRecord>, Option<bool>)> {
        let url = self.history_url(commodity)?;
        let query = [
            ("from", range.from.format(ISO_DATE_FORMAT).to_string()),
            ("till", range.till.format(ISO_DATE_FORMAT).to_string()),
            ("start", start.to_string()),
        ];
        let text = fetch_document(&self.client, "history page", &url, &query).await?;
        let document: Document = parse_xml("history page", &text)?;

        let mut prices = Vec::new();
        let mut eof = None;
        for block in document.data {
            match block.id.as_str() {
                HISTORY_BLOCK => {
                    for row in &block.rows.rows {
                        prices.push(row.to_price()?);
                    }
                }
                CURSOR_BLOCK => {
                    if let Some(row) = block.rows.rows.first() {
                        eof = Some(row.is_last_page()?);
                    }
                }
                _ => {}
            }
        }
        Ok((prices, eof))
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(rename = "data", default)]
    data: Vec<DataBlock>,
}

#[derive(Debug, Deserialize)]
struct DataBlock {
    #[serde(rename = "@id")]
    id: String,
    #[serde(default)]
    rows: Rows,
}

#[derive(Debug, Default, Deserialize)]
struct Rows {
    #[serde(rename = "row", default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "@SECID")]
    security_id: Option<String>,
    #[serde(rename = "@TRADEDATE")]
    trade_date: Option<String>,
    #[serde(rename = "@LEGALCLOSEPRICE")]
    legal_close_price: Option<String>,
    #[serde(rename = "@CLOSE")]
    close_price: Option<String>,
    #[serde(rename = "@INDEX")]
    index: Option<String>,
    #[serde(rename = "@PAGESIZE")]
    page_size: Option<String>,
    #[serde(rename = "@TOTAL")]
    total: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal> {
    let parsed = if value.contains(['e', 'E']) {
        Decimal::from_scientific(value)
    } else {
        Decimal::from_str(value)
    };
    parsed.map_err(|e| PriceError::field(field, value, e))
}

fn parse_cursor_field(field: &'static str, value: &Option<String>) -> Result<i64> {
    let value = non_empty(value).ok_or_else(|| PriceError::field(field, "", "missing value"))?;
    value.parse().map_err(|e| PriceError::field(field, value, e))
}

impl Row {
    fn to_price(&self) -> Result<PriceRecord> {
        let security_id = non_empty(&self.security_id)
            .ok_or_else(|| PriceError::decode("history page", "history row without SECID"))?;

        let trade_date = non_empty(&self.trade_date)
            .ok_or_else(|| PriceError::field("TRADEDATE", "", "missing value"))?;
        let date = NaiveDate::parse_from_str(trade_date, ISO_DATE_FORMAT)
            .map_err(|e| PriceError::field("TRADEDATE", trade_date, e))?;

        // Some trading days have no settlement price at all; those stay at zero.
        let price = match (
            non_empty(&self.legal_close_price),
            non_empty(&self.close_price),
        ) {
            (Some(legal_close), _) => parse_decimal("LEGALCLOSEPRICE", legal_close)?,
            (None, Some(close)) => parse_decimal("CLOSE", close)?,
            (None, None) => Decimal::ZERO,
        };

        Ok(PriceRecord::new(security_id, date, price))
    }

    fn is_last_page(&self) -> Result<bool> {
        let index = parse_cursor_field("INDEX", &self.index)?;
        let page_size = parse_cursor_field("PAGESIZE", &self.page_size)?;
        let total = parse_cursor_field("TOTAL", &self.total)?;
        debug!(index, page_size, total, "History cursor");
        let end = index.checked_add(page_size).ok_or_else(|| {
            PriceError::field("PAGESIZE", &page_size.to_string(), "cursor overflow")
        })?;
        Ok(end >= total)
    }
}

#[async_trait]
impl PriceSource for MoexClient {
    fn name(&self) -> &'static str {
        "moex"
    }

    #[instrument(
        name = "MoexPrices",
        skip(self, range),
        fields(commodity = %commodity, from = %range.from, till = %range.till)
    )]
    async fn prices(&self, commodity: &str, range: &DateRange) -> Result<Vec<PriceRecord>> {
        let mut prices = Vec::new();
        let mut start = 0;

        loop {
            let (page, eof) = self.page(commodity, range, start).await?;
            let page_len = page.len();
            prices.extend(page);

            match eof {
                Some(true) => break,
                Some(false) => {}
                // No cursor and nothing left to read.
                None if page_len == 0 => {
                    debug!(start, "Empty page without cursor, stopping");
                    break;
                }
                None => {}
            }
            start += PAGE_SIZE;
        }

        debug!(count = prices.len(), "Fetched exchange history");
        Ok(prices)
    }
}
