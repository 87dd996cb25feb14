//! soma-runner: headless driver for the SOMA weekly summary pipeline.
//!
//! Usage:
//!   soma-runner backfill --start 2025-01-01 [--end 2025-06-30]
//!   soma-runner update [--today 2025-07-02]
//!   soma-runner refresh
//!   soma-runner validate
//!   soma-runner summary [--weeks 12] [--anchor 2022-06-01]
//!
//! Common flags: --config FILE (JSON), --data-dir DIR, --json.
//! Verbosity: RUST_LOG=info|debug.

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use soma_core::{
    analytics::TotalSeries,
    config::SomaConfig,
    pipeline::Pipeline,
    report::{RunReport, WeekOutcome},
    store::SomaStore,
    types::DATE_FORMAT,
    validate::ValidationReport,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        print_usage();
        bail!("missing command");
    };
    let json = args.iter().any(|a| a == "--json");

    let mut config = match flag(&args, "--config") {
        Some(path) => SomaConfig::load(path)?,
        None => SomaConfig::default(),
    };
    if let Some(dir) = flag(&args, "--data-dir") {
        config.data_dir = dir.into();
    }
    config.validate()?;
    log::info!("soma-runner {command}: data_dir={}", config.data_dir.display());

    let today = parse_date_arg(&args, "--today")?.unwrap_or_else(|| Local::now().date_naive());

    match command {
        "backfill" => {
            let start = parse_date_arg(&args, "--start")?.unwrap_or(config.backfill_start);
            let end = parse_date_arg(&args, "--end")?.unwrap_or(today);
            let pipeline = Pipeline::build(config)?;
            let report = pipeline.backfill(start, end)?;
            print_run(&report, json)?;
            let refresh = pipeline.refresh()?;
            if !json {
                println!("  long rows:      {}", refresh.long_rows);
                for path in &refresh.snapshots {
                    println!("  snapshot:       {}", path.display());
                }
            }
        }
        "update" => {
            let pipeline = Pipeline::build(config)?;
            let report = pipeline.update(today)?;
            print_run(&report, json)?;
            let refresh = pipeline.refresh()?;
            if !json {
                println!("  long rows:      {}", refresh.long_rows);
                for path in &refresh.snapshots {
                    println!("  snapshot:       {}", path.display());
                }
            }
        }
        "refresh" => {
            let pipeline = Pipeline::build(config)?;
            let refresh = pipeline.refresh()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&refresh)?);
            } else {
                println!("[ok] wide rows: {}  long rows: {}", refresh.wide_rows, refresh.long_rows);
                for path in &refresh.snapshots {
                    println!("[ok] snapshot: {}", path.display());
                }
            }
        }
        "validate" => {
            let pipeline = Pipeline::build(config)?;
            let (wide, long) = pipeline.validate()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&(wide, long))?);
            } else {
                print_validation(&wide);
                match &long {
                    Some(report) => print_validation(report),
                    None => println!("[skip] long table not present"),
                }
            }
        }
        "summary" => {
            let weeks = parse_arg(&args, "--weeks", 12usize);
            let anchor = parse_date_arg(&args, "--anchor")?.unwrap_or(config.cumulative_anchor);
            print_summary(&config, weeks, anchor)?;
        }
        "-h" | "--help" | "help" => print_usage(),
        other => {
            print_usage();
            bail!("unknown command: {other}");
        }
    }
    Ok(())
}

fn print_run(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", report.run_id);
    match &report.window {
        Some(w) => println!("  window:         {} ..= {} ({})", w.start, w.end, w.anchor),
        None => println!("  window:         (no new weeks)"),
    }
    println!("  appended:       {}", report.appended().len());
    println!("  skipped:        {}", report.skipped().len());
    for outcome in &report.outcomes {
        if let WeekOutcome::Skipped { as_of_date, reason } = outcome {
            println!("    [skip] {as_of_date}: {reason}");
        }
    }
    if let Some(d) = &report.dedupe {
        println!("  stored rows:    {}", d.rows_written);
        println!("  duplicates:     {}", d.duplicates_removed);
        println!("  columns:        {}", d.columns);
    }
    Ok(())
}

fn print_validation(report: &ValidationReport) {
    for w in &report.warnings {
        println!("[warn] {}: {w}", report.table);
    }
    match report.categories {
        Some(n) => println!("[OK] {}: rows={} categories={n}", report.table, report.rows),
        None => println!("[OK] {}: rows={} cols={:?}", report.table, report.rows, report.columns),
    }
}

fn print_summary(config: &SomaConfig, weeks: usize, anchor: NaiveDate) -> Result<()> {
    let store = SomaStore::from_config(config);
    let wide = store.load_wide()?;
    let series = TotalSeries::from_wide(&wide)?;
    if series.is_empty() {
        println!("(no stored weeks yet)");
        return Ok(());
    }

    let wow = series.week_over_week();
    let trend = series.rolling_mean(config.rolling_window);
    let (base, cumulative) = series.cumulative_since(anchor);

    println!("=== SOMA TOTAL (last {weeks} weeks) ===");
    println!("  {:<10} | {:>18} | {:>16} | {:>16}", "as_of", "total", "wow", "trend");
    let skip = series.len().saturating_sub(weeks);
    for ((point, (_, change)), (_, mean)) in series.points.iter().zip(&wow).zip(&trend).skip(skip) {
        println!(
            "  {:<10} | {:>18.0} | {:>16} | {:>16}",
            point.as_of_date.format(DATE_FORMAT),
            point.value,
            fmt_opt(*change),
            fmt_opt(*mean)
        );
    }
    if let (Some(base), Some(last)) = (base, cumulative.last()) {
        println!();
        println!("  cumulative change since {base}: {:.0}", last.value);
    }
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.0}")).unwrap_or_else(|| "-".into())
}

fn print_usage() {
    eprintln!(
        "Usage: soma-runner <backfill|update|refresh|validate|summary> \
         [--config FILE] [--data-dir DIR] [--start DATE] [--end DATE] \
         [--today DATE] [--weeks N] [--anchor DATE] [--json]"
    );
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == name).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], name: &str, default: T) -> T {
    flag(args, name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_date_arg(args: &[String], name: &str) -> Result<Option<NaiveDate>> {
    match flag(args, name) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{name} expects YYYY-MM-DD, got {raw:?}: {e}")),
    }
}
