//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    configured_symbols, load_rank_config, validate_rank_config, KNOWN_SECTIONS,
};
use crate::domain::error::RankError;
use crate::domain::interval::Period;
use crate::domain::signal::Position;
use crate::domain::strategy::{StrategyKind, StrategyProfile};
use crate::domain::universe::{parse_symbols, RankConfig, Ranker, RankingReport};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "stockrank", about = "Rank equities by technical score")]
pub struct Cli {
    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank a universe of symbols from CSV price files
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <SYMBOL>.csv files and an optional info.csv
        #[arg(short, long)]
        data: PathBuf,
        /// Strategy preset, replacing [ranking] strategy
        #[arg(short, long)]
        strategy: Option<String>,
        /// Comma-separated symbols, replacing [ranking] symbols
        #[arg(long)]
        symbols: Option<String>,
        #[arg(long)]
        top: Option<usize>,
        /// Portfolio value used for position sizing
        #[arg(long)]
        portfolio: Option<f64>,
        /// Held position as SYMBOL=ENTRY_PRICE; enables SELL signals
        #[arg(long = "position", value_parser = parse_position)]
        positions: Vec<(String, f64)>,
        /// Print factor scores and reasons for each ranked symbol
        #[arg(long)]
        details: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List strategy presets
    Presets,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Rank {
            config,
            data,
            strategy,
            symbols,
            top,
            portfolio,
            positions,
            details,
        } => {
            let options = RankOptions {
                strategy,
                symbols,
                top,
                portfolio,
                positions,
                details,
            };
            report_outcome(run_rank(&config, &data, &options))
        }
        Command::Validate { config } => report_outcome(run_validate(&config)),
        Command::Presets => {
            print!("{}", format_presets());
            ExitCode::SUCCESS
        }
    }
}

fn report_outcome(result: Result<(), RankError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Command-line overrides for a ranking run.
#[derive(Debug, Clone, Default)]
pub struct RankOptions {
    pub strategy: Option<String>,
    pub symbols: Option<String>,
    pub top: Option<usize>,
    pub portfolio: Option<f64>,
    pub positions: Vec<(String, f64)>,
    pub details: bool,
}

pub fn parse_position(arg: &str) -> Result<(String, f64), String> {
    let (symbol, price) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=PRICE, got '{}'", arg))?;
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(format!("missing symbol in '{}'", arg));
    }
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|e| format!("invalid price in '{}': {}", arg, e))?;
    if price <= 0.0 {
        return Err(format!("entry price must be positive in '{}'", arg));
    }
    Ok((symbol, price))
}

/// Merge file configuration with command-line overrides.
pub fn build_rank_config(
    config: &dyn ConfigPort,
    options: &RankOptions,
) -> Result<RankConfig, RankError> {
    let strategy = options
        .strategy
        .as_deref()
        .map(str::parse::<StrategyKind>)
        .transpose()?;
    let mut rank = load_rank_config(config, strategy)?;
    if options.top.is_some() {
        rank.top = options.top;
    }
    if options.portfolio.is_some() {
        rank.portfolio_value = options.portfolio;
    }
    validate_rank_config(&rank)?;
    Ok(rank)
}

/// Command line first, then `[ranking] symbols`, then every file in the
/// data directory.
pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
    data: &CsvAdapter,
) -> Result<Vec<String>, RankError> {
    if let Some(list) = symbol_override {
        return parse_symbols(list)
            .map_err(|e| RankError::config_invalid("ranking", "symbols", e.to_string()));
    }
    if let Some(symbols) = configured_symbols(config)? {
        return Ok(symbols);
    }
    let symbols = data.list_symbols()?;
    if symbols.is_empty() {
        return Err(RankError::ConfigMissing {
            section: "ranking".to_string(),
            key: "symbols".to_string(),
        });
    }
    Ok(symbols)
}

fn run_rank(config_path: &Path, data_dir: &Path, options: &RankOptions) -> Result<(), RankError> {
    info!(config = %config_path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let rank_config = build_rank_config(&adapter, options)?;

    let data = CsvAdapter::new(data_dir.to_path_buf());
    let symbols = resolve_symbols(options.symbols.as_deref(), &adapter, &data)?;
    let positions: HashMap<String, Position> = options
        .positions
        .iter()
        .map(|(symbol, entry_price)| {
            (
                symbol.clone(),
                Position {
                    entry_price: *entry_price,
                },
            )
        })
        .collect();

    let ranker = Ranker::new(rank_config);
    let report = ranker.rank(&data, &symbols, &positions)?;
    print!("{}", format_report(&report, options.details));
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), RankError> {
    info!(config = %config_path.display(), "validating config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    for section in adapter.sections() {
        if section != "default" && !KNOWN_SECTIONS.contains(&section.as_str()) {
            warn!(section = %section, "unknown section ignored");
        }
    }
    let rank = load_rank_config(&adapter, None)?;
    configured_symbols(&adapter)?;

    println!("Configuration OK");
    println!("  strategy:      {}", rank.profile.kind);
    println!("  interval:      {}", rank.interval);
    println!("  period:        {}", rank.period);
    println!("  minimum bars:  {}", minimum_bars_note(&rank));
    println!("  workers:       {}", rank.workers);
    println!(
        "  BUY/SELL:      > {} / < {}",
        rank.signal.buy_threshold, rank.signal.sell_threshold
    );
    Ok(())
}

fn minimum_bars_note(rank: &RankConfig) -> String {
    if rank.min_data_points.is_none() && rank.period == Period::YearToDate {
        format!(
            "{} (ytd: recounted per symbol from January 1 to its latest bar)",
            rank.minimum_bars()
        )
    } else {
        rank.minimum_bars().to_string()
    }
}

pub fn format_presets() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<15} {:>6} {:>9} {:>9} {:>13} {:>8} {:>7}  {}",
        "Strategy", "Entry", "MinCap", "MinVol", "Price", "RSI", "MaxVol", "Description"
    );
    for kind in StrategyKind::ALL {
        let p = StrategyProfile::preset(kind);
        let _ = writeln!(
            out,
            "{:<15} {:>6.3} {:>8.0}B {:>8.1}M {:>13} {:>8} {:>6.1}%  {}",
            kind.to_string(),
            p.entry_multiplier,
            p.min_market_cap / 1e9,
            p.min_volume / 1e6,
            format!("{}-{}", p.min_price, p.max_price),
            format!("{}-{}", p.min_rsi, p.max_rsi),
            p.max_volatility * 100.0,
            kind.description(),
        );
    }
    out
}

/// Plain-text ranking table, optionally followed by per-symbol details.
pub fn format_report(report: &RankingReport, details: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<8} {:>10} {:>6}  {:<6} {:>10}  {:<21} {:<6} {:<6}  {}",
        "Rank", "Symbol", "Price", "Score", "Signal", "Entry", "Range", "Conf", "Risk", "Horizon"
    );
    for (i, entry) in report.ranked.iter().enumerate() {
        let rec = &entry.recommendation;
        let flag = if entry.breakdown.is_partial() { "*" } else { "" };
        let _ = writeln!(
            out,
            "{:>4}  {:<8} {:>10.2} {:>5.1}{:<1}  {:<6} {:>10.2}  {:<21} {:<6} {:<6}  {}",
            i + 1,
            entry.symbol,
            entry.snapshot.close,
            entry.score(),
            flag,
            entry.signal.kind.to_string(),
            rec.entry_price,
            format!("{:.2} - {:.2}", rec.range.low, rec.range.high),
            rec.confidence.to_string(),
            rec.risk.to_string(),
            rec.horizon,
        );
    }

    if details {
        for entry in &report.ranked {
            let _ = writeln!(out, "\n{} ({:.1})", entry.symbol, entry.score());
            for factor in entry.breakdown.factors() {
                let _ = writeln!(
                    out,
                    "  {:<22} {:>5.1}/{:<3} {:?}{}",
                    factor.factor.to_string(),
                    factor.raw,
                    factor.max,
                    factor.status,
                    factor
                        .detail
                        .as_deref()
                        .map(|d| format!("  {}", d))
                        .unwrap_or_default(),
                );
            }
            for reason in &entry.signal.reasons {
                let _ = writeln!(out, "  - {}", reason);
            }
            let _ = writeln!(out, "  {}", entry.recommendation.rationale);
            if let Some(shares) = entry.recommendation.shares {
                let _ = writeln!(out, "  suggested position: {} shares", shares);
            }
            for warning in entry.breakdown.warnings() {
                let _ = writeln!(out, "  warning: {}", warning);
            }
        }
    }

    if !report.excluded.is_empty() {
        let _ = writeln!(out, "\nExcluded:");
        for exclusion in &report.excluded {
            let _ = writeln!(out, "  {:<8} {}", exclusion.symbol, exclusion.reason);
        }
    }

    if let Some(summary) = &report.summary {
        let _ = writeln!(
            out,
            "\nAverage score {:.1}, BUY {} of {} ({:.1}%), {} scoring 80+",
            summary.average_score,
            summary.buy_count,
            summary.count,
            100.0 * summary.buy_count as f64 / summary.count as f64,
            summary.exceptional_count,
        );
        if let Some((sector, n)) = &summary.dominant_sector {
            let _ = writeln!(out, "Dominant sector: {} ({})", sector, n);
        }
        let _ = writeln!(
            out,
            "High volatility: {:.1}% of qualified; sentiment {}",
            100.0 * summary.high_volatility_share,
            summary.sentiment,
        );
    }

    let _ = writeln!(
        out,
        "\nEvaluated {}, qualified {}{}",
        report.evaluated,
        report.qualified,
        if report.ranked.iter().any(|r| r.breakdown.is_partial()) {
            " (* partial indicator data)"
        } else {
            ""
        }
    );
    out
}
