pub mod cbr;
pub mod moex;
pub mod util;

use crate::core::PriceSource;
use crate::core::config::ProvidersConfig;
use crate::core::error::Result;
use anyhow::anyhow;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub use cbr::CbrClient;
pub use moex::{Market, MoexClient};

/// Upstream providers a price series can be retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Central bank exchange rates.
    #[default]
    Cbr,
    /// Stock exchange trading history.
    Moex,
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SourceKind::Cbr => "cbr",
                SourceKind::Moex => "moex",
            }
        )
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cbr" => Ok(SourceKind::Cbr),
            "moex" => Ok(SourceKind::Moex),
            _ => Err(anyhow!("Invalid source: {}", s)),
        }
    }
}

/// Constructs the source selected by `kind`. `market` and `board` only apply
/// to the exchange.
pub fn build_source(
    kind: SourceKind,
    market: Market,
    board: Option<String>,
    providers: &ProvidersConfig,
    timeout: Duration,
) -> Result<Box<dyn PriceSource>> {
    let source: Box<dyn PriceSource> = match kind {
        SourceKind::Cbr => Box::new(CbrClient::new(providers.cbr_base_url(), timeout)?),
        SourceKind::Moex => Box::new(MoexClient::new(
            providers.moex_base_url(),
            market,
            board,
            timeout,
        )?),
    };
    Ok(source)
}
