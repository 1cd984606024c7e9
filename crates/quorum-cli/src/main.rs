//! Command-line run trigger for the quorum analysis committee

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use comfy_table::Table;
use quorum_data::{
    CachedAdapter, DataAdapter, FixtureAdapter, PORTFOLIO_KEY, PercentOfPortfolioLimits,
    PortfolioContext,
};
use quorum_engine::{EngineConfig, RunCoordinator, RunResult, RunSeed, RunStatus};
use quorum_personas::{metrics, standard_graph};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "quorum-cli")]
#[command(about = "Run the quorum analysis committee for one instrument", long_about = None)]
struct Args {
    /// Instrument to analyze
    #[arg(short, long, default_value = "ACME")]
    instrument: String,

    /// Analysis date (YYYY-MM-DD); defaults to now
    #[arg(long)]
    as_of: Option<String>,

    /// JSON fixture file shaped as { "<instrument>": { "<metric>": value } };
    /// a built-in demo dataset is used when omitted
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Portfolio cash to size positions against
    #[arg(long, default_value_t = 100_000.0)]
    cash: f64,

    /// Maximum position size as a fraction of portfolio value
    #[arg(long, default_value_t = 0.20)]
    position_cap: f64,

    /// Per-node evaluation timeout in seconds
    #[arg(long, default_value_t = 30)]
    node_timeout_secs: u64,

    /// Whole-run timeout in seconds
    #[arg(long)]
    run_timeout_secs: Option<u64>,

    /// Print the run result as JSON instead of tables
    #[arg(long)]
    json: bool,
}

/// Self-contained dataset so the binary runs without any provider wired up
fn demo_fixture(instrument: &str) -> FixtureAdapter {
    let closes: Vec<f64> = (0..60).map(|i| 30.0 + f64::from(i) * 0.2).collect();
    FixtureAdapter::new()
        .with(instrument, metrics::CURRENT_PRICE, serde_json::json!(42.0))
        .with(instrument, metrics::PRICE_HISTORY, serde_json::json!(closes))
        .with(instrument, metrics::MARKET_CAP, serde_json::json!(8.0e8))
        .with(instrument, metrics::RETURN_ON_EQUITY, serde_json::json!(0.22))
        .with(instrument, metrics::DEBT_TO_EQUITY, serde_json::json!(0.3))
        .with(instrument, metrics::OPERATING_MARGIN, serde_json::json!(0.25))
        .with(instrument, metrics::CURRENT_RATIO, serde_json::json!(2.0))
        .with(instrument, metrics::REVENUE_GROWTH, serde_json::json!(0.15))
        .with(instrument, metrics::EARNINGS_GROWTH, serde_json::json!(0.20))
        .with(instrument, metrics::PE_RATIO, serde_json::json!(15.0))
        .with(instrument, metrics::FREE_CASH_FLOW, serde_json::json!(1.2e8))
        .with(
            instrument,
            metrics::DEPRECIATION_AND_AMORTIZATION,
            serde_json::json!(3.0e7),
        )
        .with(instrument, metrics::NET_INCOME, serde_json::json!(1.0e8))
        .with(instrument, metrics::CAPITAL_EXPENDITURE, serde_json::json!(2.0e7))
        .with(instrument, metrics::WORKING_CAPITAL_CHANGE, serde_json::json!(5.0e6))
        .with(instrument, metrics::TOTAL_ASSETS, serde_json::json!(5.0e9))
        .with(instrument, metrics::TOTAL_LIABILITIES, serde_json::json!(2.0e9))
        .with(instrument, metrics::WEEK_52_HIGH, serde_json::json!(45.0))
        .with(instrument, metrics::INSIDER_BUY_VALUE, serde_json::json!(9.0e5))
        .with(instrument, metrics::INSIDER_SELL_VALUE, serde_json::json!(1.0e5))
        .with(instrument, metrics::NEWS_SENTIMENT, serde_json::json!(0.5))
}

fn parse_as_of(input: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match input {
        None => Ok(Utc::now()),
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("invalid --as-of date '{raw}', expected YYYY-MM-DD"))?;
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .context("invalid --as-of date")?;
            Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
        }
    }
}

fn render(result: &RunResult) {
    let mut signals = Table::new();
    signals.set_header(["node", "direction", "confidence", "rationale"]);
    for signal in &result.all_signals {
        signals.add_row([
            signal.source.clone(),
            signal.direction.to_string(),
            format!("{:.2}", signal.confidence),
            signal.rationale.clone(),
        ]);
    }
    println!("{signals}");

    if !result.node_failures.is_empty() {
        let mut failures = Table::new();
        failures.set_header(["node", "failure"]);
        for (node, failure) in &result.node_failures {
            failures.add_row([node.clone(), failure.to_string()]);
        }
        println!("{failures}");
    }

    match &result.decision {
        Some(decision) => {
            println!(
                "decision: {} (confidence {:.2}){}",
                decision.action,
                decision.confidence,
                decision
                    .size
                    .map(|size| format!(", size {size:.2}"))
                    .unwrap_or_default()
            );
            for constraint in &decision.constraints_applied {
                println!("constraint: {constraint}");
            }
        }
        None => println!("no recommendation (status: {:?})", result.status),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    quorum_utils::init_tracing();

    let args = Args::parse();
    let as_of = parse_as_of(args.as_of.as_deref())?;

    let fixture = match &args.fixture {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read fixture file {}", path.display()))?;
            let document: serde_json::Value =
                serde_json::from_str(&raw).context("fixture file is not valid JSON")?;
            FixtureAdapter::from_json(document).context("fixture file has the wrong shape")?
        }
        None => demo_fixture(&args.instrument),
    };
    let adapter: Arc<dyn DataAdapter> =
        Arc::new(CachedAdapter::new(fixture, Duration::from_secs(300)));

    let graph = standard_graph(
        adapter,
        Arc::new(PercentOfPortfolioLimits::new(args.position_cap)),
    )?;

    let config = EngineConfig::builder()
        .node_timeout(Duration::from_secs(args.node_timeout_secs))
        .build();
    let mut coordinator = RunCoordinator::new(config);
    if let Some(secs) = args.run_timeout_secs {
        coordinator = coordinator.with_run_timeout(Duration::from_secs(secs));
    }

    info!(instrument = %args.instrument, %as_of, "running analysis committee");
    let seed = RunSeed::new(&args.instrument, as_of)
        .with_value_typed(PORTFOLIO_KEY, &PortfolioContext::new(args.cash))?;
    let result = coordinator.execute(&graph, seed).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        render(&result);
    }

    if result.status == RunStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_as_of_date() {
        let parsed = parse_as_of(Some("2026-01-05")).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2026-01-05");
        assert!(parse_as_of(Some("garbage")).is_err());
        assert!(parse_as_of(None).is_ok());
    }

    #[test]
    fn test_demo_fixture_covers_standard_metrics() {
        let fixture = demo_fixture("ACME");
        let rt = tokio::runtime::Runtime::new().unwrap();
        for key in metrics::standard_set() {
            let value = rt
                .block_on(fixture.fetch("ACME", &key, Utc::now()))
                .unwrap();
            assert!(!value.is_null(), "demo fixture missing {key}");
        }
    }
}
