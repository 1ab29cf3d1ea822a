use std::path::PathBuf;

use chrono::Utc;
use citywatch_logic::{Category, Position, ReportDraft, Severity};
use citywatch_test_shared::{ReportRequest, Scenario, drive, prelude::*};
use clap::{Parser, Subcommand, ValueEnum};
use log::{LevelFilter, debug};

#[derive(Parser)]
struct Cli {
    /// Path to a JSON scenario file, defaults are used when omitted
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CategoryValue {
    Traffic,
    RoadDamage,
    Construction,
    Weather,
    Emergency,
    Other,
}

impl From<CategoryValue> for Category {
    fn from(value: CategoryValue) -> Self {
        match value {
            CategoryValue::Traffic => Category::Traffic,
            CategoryValue::RoadDamage => Category::RoadDamage,
            CategoryValue::Construction => Category::Construction,
            CategoryValue::Weather => Category::Weather,
            CategoryValue::Emergency => Category::Emergency,
            CategoryValue::Other => Category::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SeverityValue {
    Low,
    Medium,
    High,
}

impl From<SeverityValue> for Severity {
    fn from(value: SeverityValue) -> Self {
        match value {
            SeverityValue::Low => Severity::Low,
            SeverityValue::Medium => Severity::Medium,
            SeverityValue::High => Severity::High,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render the scenario's incidents once the location resolves
    Render,
    /// Click the map and file a report at that spot
    Report {
        /// Type of issue being reported
        #[arg(long, value_enum)]
        category: CategoryValue,
        /// What's going on
        #[arg(long)]
        description: String,
        /// Latitude to click at
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude to click at
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, value_enum)]
        severity: Option<SeverityValue>,
    },
}

#[tokio::main]
async fn main() -> Result {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    colog::default_builder().filter_level(level).init();

    let scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    debug!("Scenario: {scenario:?}");

    let request = match cli.command {
        Commands::Render => None,
        Commands::Report {
            category,
            description,
            lat,
            lng,
            severity,
        } => Some(ReportRequest {
            draft: ReportDraft {
                category: Some(category.into()),
                description,
                location: None,
                severity: severity.map(Severity::from),
            },
            click: Position::new(lat, lng),
        }),
    };

    let output = drive(&scenario, Utc::now(), request).await?;

    let json = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
    println!("{json}");

    Ok(())
}
