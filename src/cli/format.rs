//! Rendering of price series for stdout.

use super::ui;
use crate::core::PriceRecord;
use anyhow::{Context, Result, anyhow};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// `COMMODITY,DD.MM.YYYY,PRICE`
    #[default]
    Csv,
    /// Ledger price directives: `P YYYY/MM/DD COMMODITY PRICE CURRENCY`
    Ledger,
    Json,
    Table,
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Format::Csv => "csv",
                Format::Ledger => "ledger",
                Format::Json => "json",
                Format::Table => "table",
            }
        )
    }
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "ledger" => Ok(Format::Ledger),
            "json" => Ok(Format::Json),
            "table" => Ok(Format::Table),
            _ => Err(anyhow!("Unknown format: {}", s)),
        }
    }
}

fn csv_line(price: &PriceRecord) -> String {
    format!(
        "{},{},{}",
        price.commodity,
        price.date.format("%d.%m.%Y"),
        price.price
    )
}

fn ledger_line(price: &PriceRecord, currency: &str) -> String {
    format!(
        "P {} {} {} {}",
        price.date.format("%Y/%m/%d"),
        price.commodity,
        price.price,
        currency
    )
}

fn table(prices: &[PriceRecord]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Commodity"),
        ui::header_cell("Date"),
        ui::header_cell("Price"),
    ]);
    for price in prices {
        table.add_row(vec![
            comfy_table::Cell::new(&price.commodity),
            comfy_table::Cell::new(price.date.format("%Y-%m-%d")),
            ui::price_cell(price.price),
        ]);
    }
    table.to_string()
}

/// Renders `prices` as text terminated by a newline. Empty series render as
/// nothing for the line based formats.
pub fn render(prices: &[PriceRecord], format: Format, ledger_currency: &str) -> Result<String> {
    let mut output = match format {
        Format::Csv => prices.iter().map(csv_line).collect::<Vec<_>>().join("\n"),
        Format::Ledger => prices
            .iter()
            .map(|p| ledger_line(p, ledger_currency))
            .collect::<Vec<_>>()
            .join("\n"),
        Format::Json => {
            serde_json::to_string_pretty(prices).context("Failed to serialize prices to JSON")?
        }
        Format::Table => table(prices),
    };
    if !output.is_empty() {
        output.push('\n');
    }
    Ok(output)
}
