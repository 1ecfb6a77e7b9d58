use clap::{CommandFactory, Parser, Subcommand};
use commodity_prices::cli::format::Format;
use commodity_prices::cli::prices::PricesQuery;
use commodity_prices::core::Filter;
use commodity_prices::core::log::init_logging;
use commodity_prices::providers::{Market, SourceKind};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Print historical prices of a commodity
    Prices {
        /// Currency ISO code or exchange security identifier
        #[arg(long, default_value = "USD")]
        commodity: String,
        /// First day of the range, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        from: Option<String>,
        /// Last day of the range, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        till: Option<String>,
        /// Price source: cbr|moex
        #[arg(long, default_value = "cbr")]
        source: SourceKind,
        /// Exchange market: shares|index|bonds
        #[arg(long, default_value = "shares")]
        market: Market,
        /// Exchange trading board, e.g. TQBR
        #[arg(long)]
        board: Option<String>,
        /// Filter dates: none|monthly
        #[arg(long, default_value = "none")]
        filter: Filter,
        /// Output format: csv|ledger|json|table
        #[arg(long, default_value = "csv")]
        format: Format,
    },
}

impl From<Commands> for commodity_prices::AppCommand {
    fn from(cmd: Commands) -> commodity_prices::AppCommand {
        match cmd {
            Commands::Prices {
                commodity,
                from,
                till,
                source,
                market,
                board,
                filter,
                format,
            } => {
                let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
                commodity_prices::AppCommand::Prices(PricesQuery {
                    commodity,
                    from: from.unwrap_or_else(|| today.clone()),
                    till: till.unwrap_or(today),
                    source,
                    market,
                    board,
                    filter,
                    format,
                })
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => commodity_prices::cli::setup::setup_at_path(path),
            None => commodity_prices::cli::setup::setup(),
        },
        Some(cmd) => commodity_prices::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
