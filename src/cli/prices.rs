use super::format::{Format, render};
use super::ui;
use crate::core::config::AppConfig;
use crate::core::{DateRange, Filter, PriceRecord};
use crate::providers::{Market, SourceKind, build_source};
use anyhow::{Context, Result};
use std::io::Write;
use tracing::{debug, info};

/// Everything the `prices` command needs to know about a single query.
#[derive(Debug, Clone)]
pub struct PricesQuery {
    pub commodity: String,
    pub from: String,
    pub till: String,
    pub source: SourceKind,
    pub market: Market,
    pub board: Option<String>,
    pub filter: Filter,
    pub format: Format,
}

/// Retrieves the series for `query` and applies its filter.
pub async fn fetch(query: &PricesQuery, config: &AppConfig) -> Result<Vec<PriceRecord>> {
    let range = DateRange::parse(&query.from, &query.till)?;
    let board = query.board.clone().or_else(|| config.default_board.clone());

    let source = build_source(
        query.source,
        query.market,
        board,
        &config.providers,
        config.request_timeout(),
    )?;
    info!(
        source = source.name(),
        commodity = %query.commodity,
        from = %range.from,
        till = %range.till,
        "Fetching prices"
    );

    let pb = ui::new_spinner(format!("Fetching {} from {}", query.commodity, source.name()));
    let result = source.prices(&query.commodity, &range).await;
    pb.finish_and_clear();

    let prices = result.with_context(|| {
        format!(
            "Failed to fetch prices for {} from {}",
            query.commodity,
            source.name()
        )
    })?;
    debug!(count = prices.len(), "Fetched prices");

    let prices = query.filter.apply(prices);
    debug!(count = prices.len(), filter = %query.filter, "Applied filter");
    Ok(prices)
}

pub async fn run(query: &PricesQuery, config: &AppConfig) -> Result<()> {
    let prices = fetch(query, config).await?;
    if prices.is_empty() {
        eprintln!(
            "{}",
            ui::style_text(
                &format!(
                    "No prices for {} between {} and {}",
                    query.commodity, query.from, query.till
                ),
                ui::StyleType::Subtle,
            )
        );
    }
    let output = render(&prices, query.format, &config.ledger_currency)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .context("Failed to write prices to stdout")?;
    stdout.flush()?;
    Ok(())
}
