//! Timeline CLI - rolled-up timing and delivery status reports.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use timeline_core::date::{parse_date, parse_timestamp};
use timeline_core::{StrategySetting, TimingAssignment};
use timeline_progress::{Report, ReportBuilder, ReportConfig, ReportRow, ScopedStatus};
use timeline_storage::{read_json, ItemSource, JsonItemSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "timeline")]
#[command(about = "Timeline rollup and delivery status", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll up an item snapshot and report statuses
    Report {
        /// Item snapshot file or directory
        #[arg(long)]
        items: PathBuf,
        /// Report configuration file (JSON); flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Timing assignment, e.g. "Initiative:childrenOnly,Epic:widestRange"
        #[arg(long)]
        timing: Option<String>,
        /// Hierarchy types, outermost first
        #[arg(long, value_delimiter = ',')]
        hierarchy: Option<Vec<String>>,
        /// Reporting type
        #[arg(long = "type")]
        reporting_type: Option<String>,
        /// Trend comparison point (defaults to two weeks before --now)
        #[arg(long)]
        checkpoint: Option<String>,
        /// Date to judge statuses on (defaults to today)
        #[arg(long)]
        now: Option<String>,
        /// Days a due date may move before it counts
        #[arg(long)]
        wiggle: Option<i64>,
        /// Seed for estimate sampling
        #[arg(long)]
        seed: Option<u64>,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Normalise and check a timing assignment
    Timing {
        /// Assignment string
        assignment: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Table,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            items,
            config,
            timing,
            hierarchy,
            reporting_type,
            checkpoint,
            now,
            wiggle,
            seed,
            format,
        } => {
            let mut report_config = match config {
                Some(path) => read_json::<ReportConfig>(&path)
                    .await?
                    .ok_or_else(|| anyhow!("Config not found: {}", path.display()))?,
                None => ReportConfig::default(),
            };
            if let Some(timing) = timing {
                report_config.timing = timing.parse()?;
            }
            if let Some(hierarchy) = hierarchy {
                report_config.hierarchy = hierarchy;
            }
            if let Some(reporting_type) = reporting_type {
                report_config.reporting_type = reporting_type;
            }
            if let Some(wiggle) = wiggle {
                report_config.status.wiggle_days = wiggle;
            }
            if let Some(seed) = seed {
                report_config.estimation.seed = Some(seed);
            }
            for item_type in report_config.timing.unrecognized() {
                warn!("Unrecognized timing strategy for {}; falling back to parentOnly", item_type);
            }

            let now = match now {
                Some(raw) => parse_date(&raw).ok_or_else(|| anyhow!("Invalid --now date: {}", raw))?,
                None => Utc::now().date_naive(),
            };
            let checkpoint = match checkpoint {
                Some(raw) => parse_timestamp(&raw).ok_or_else(|| anyhow!("Invalid --checkpoint: {}", raw))?,
                None => midnight(now - Duration::days(14))?,
            };

            let source = JsonItemSource::new(&items);
            let loaded = source
                .load_items()
                .await
                .with_context(|| format!("Loading items from {}", items.display()))?;

            let report = ReportBuilder::new(report_config).build(loaded, checkpoint, now)?;
            info!("Checkpoint {}, now {}", report.checkpoint, report.now);

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                Format::Table => print_table(&report),
            }
        }
        Commands::Timing { assignment } => {
            let parsed: TimingAssignment = assignment.parse()?;
            println!("{}", parsed);
            for (item_type, setting) in parsed.entries() {
                match setting {
                    StrategySetting::Named(strategy) => println!("  {}: {}", item_type, strategy),
                    StrategySetting::Unrecognized(name) => println!(
                        "  {}: {} (unrecognized '{}')",
                        item_type,
                        setting.strategy(),
                        name
                    ),
                }
            }
        }
    }

    Ok(())
}

fn midnight(date: NaiveDate) -> Result<timeline_core::Time> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid date: {}", date))?;
    Ok(naive.and_utc())
}

fn print_table(report: &Report) {
    println!(
        "{} report ({} rows), now {}, checkpoint {}",
        report.reporting_type,
        report.rows.len(),
        report.now,
        report.checkpoint.date_naive()
    );
    println!("  Calendar: {} - {}", format_date(report.calendar.start), format_date(report.calendar.due));
    println!();
    println!(
        "  {:<24} {:<11} {:<10} {:<10} {:<12} {:<12} {:<12} {:<12} {:>6} {:>8} {:>8}",
        "KEY", "TYPE", "START", "DUE", "STATUS", "DEV", "QA", "UAT", "DONE%", "DAYS", "SAMPLED"
    );
    for row in &report.rows {
        print_row(row, 0);
    }
}

fn print_row(row: &ReportRow, indent: usize) {
    let key = format!("{}{}", "  ".repeat(indent), row.key);
    println!(
        "  {:<24} {:<11} {:<10} {:<10} {:<12} {:<12} {:<12} {:<12} {:>6.1} {:>8.1} {:>8.1}",
        key,
        row.item_type,
        format_date(row.rollup.window.start),
        format_date(row.rollup.window.due),
        format_status(&row.rollup),
        format_status(&row.dev),
        format_status(&row.qa),
        format_status(&row.uat),
        row.progress.percent_complete,
        row.progress.total_days,
        row.progress.sampled_days,
    );
    for child in &row.children {
        print_row(child, indent + 1);
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

fn format_status(scoped: &ScopedStatus) -> String {
    if scoped.result.warning {
        format!("{}!", scoped.result.status)
    } else {
        scoped.result.status.to_string()
    }
}
