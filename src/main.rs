//! Measurement harness for MAVO photometers
//!
//! Cycles the instrument through all manual ranges and prints a series of
//! readings per range, followed by summary statistics.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use mavo_daq::config::MavoConfig;
use mavo_daq::instrument::mavo::{MAX_RANGE, MIN_RANGE};
use mavo_daq::instrument::{ErrorAccount, InstrumentIdentity, Mavo, ReactionPolicy};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mavo_daq", version, about = "Range cycling measurements with a Gossen MAVO photometer")]
struct Args {
    /// Serial port, overrides the configured port
    port: Option<String>,

    /// Configuration file
    #[arg(long, default_value = mavo_daq::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Number of passes over all ranges
    #[arg(long, default_value_t = 500)]
    cycles: u32,

    /// Readings per range
    #[arg(long, default_value_t = 10)]
    samples: u32,

    /// Pause between readings and between ranges
    #[arg(long = "interval-ms", default_value_t = 500)]
    interval_ms: u64,

    /// Reaction to device errors (ignore, raise, log)
    #[arg(long)]
    reaction: Option<ReactionPolicy>,

    /// Print one JSON record per line instead of a text report
    #[arg(long)]
    json: bool,
}

/// Identity block in JSON output.
#[derive(Serialize)]
struct IdentityRecord<'a> {
    timestamp: DateTime<Utc>,
    identity: &'a InstrumentIdentity,
    instrument_id: String,
    command_interpreter: &'a str,
    operating_days: Option<i64>,
}

/// Per-range summary in JSON output.
#[derive(Serialize)]
struct RangeRecord<'a> {
    timestamp: DateTime<Utc>,
    cycle: u32,
    range: i32,
    reported_range: i32,
    unit: Option<&'a str>,
    samples: &'a [f64],
    count: u64,
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
    account: ErrorAccount,
}

/// Mean, spread and extremes of a series, updated one value at a time.
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Sample standard deviation, zero below two values.
    fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = MavoConfig::load_from(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(port) = args.port {
        config.instrument.port = port;
    }
    if let Some(reaction) = args.reaction {
        config.errors.reaction = reaction;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut mavo = Mavo::open(&config)
        .with_context(|| format!("Failed to open MAVO on {}", config.instrument.port))?;
    print_identity(&mut mavo, args.json)?;

    mavo.reset()?;
    let interval = Duration::from_millis(args.interval_ms);

    for cycle in 1..=args.cycles {
        info!("Cycle {} of {}", cycle, args.cycles);
        for range in MIN_RANGE..=MAX_RANGE {
            let summary = measure_range(&mut mavo, range, args.samples, interval, args.json)?;
            if args.json {
                let record = RangeRecord {
                    timestamp: Utc::now(),
                    cycle,
                    range,
                    reported_range: summary.reported_range,
                    unit: summary.unit,
                    samples: &summary.samples,
                    count: summary.stats.count,
                    mean: summary.stats.mean,
                    std_dev: summary.stats.std_dev(),
                    min: summary.stats.min,
                    max: summary.stats.max,
                    account: *mavo.error_account(),
                };
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }

    let account = mavo.error_account();
    info!(
        "Done: {} queries, {} device errors",
        account.total_queries, account.total_errors
    );
    Ok(())
}

fn print_identity(mavo: &mut Mavo, json: bool) -> Result<()> {
    let identity = mavo.identity().clone();
    let interpreter = mavo.command_interpreter_version()?;
    let days = mavo.get_operating_days()?;

    if json {
        let record = IdentityRecord {
            timestamp: Utc::now(),
            identity: &identity,
            instrument_id: mavo.instrument_id(),
            command_interpreter: &interpreter,
            operating_days: days,
        };
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    println!("Manufacturer:        {}", identity.manufacturer);
    println!("Type:                {}", identity.model);
    println!("Serial number:       {}", identity.serial_number);
    println!("Firmware:            {}", identity.firmware_version);
    println!("Hardware revision:   {}", identity.hardware_revision);
    println!("Command interpreter: {}", interpreter);
    match days {
        Some(days) => println!("Operating days:      {}", days),
        None => println!("Operating days:      unavailable"),
    }
    println!("Port:                {}", mavo.device_port());
    println!("Instrument ID:       {}", mavo.instrument_id());
    println!();
    Ok(())
}

struct RangeSummary {
    reported_range: i32,
    unit: Option<&'static str>,
    samples: Vec<f64>,
    stats: RunningStats,
}

fn measure_range(
    mavo: &mut Mavo,
    range: i32,
    samples: u32,
    interval: Duration,
    json: bool,
) -> Result<RangeSummary> {
    mavo.deselect_auto_range()?;
    mavo.set_range(range)?;
    let reported_range = mavo.get_range()?;
    if !json {
        println!("Range set to {}, instrument reports {}", range, reported_range);
    }
    thread::sleep(interval);

    // first reading after a range change is discarded
    mavo.get_photometric_value()?;

    let mut stats = RunningStats::default();
    let mut values = Vec::with_capacity(samples as usize);
    let mut unit = None;
    for sample in 1..=samples {
        let reading = mavo.get_photometric_reading()?;
        let value = reading.map_or(f64::NAN, |r| r.value_si);
        if let Some(reading) = reading {
            unit = Some(reading.source_unit.si_symbol());
        }
        stats.push(value);
        values.push(value);
        if !json {
            let account = mavo.error_account();
            println!(
                "{:4} {:>14.4} {:<5} [{} queries, {} errors]",
                sample,
                value,
                unit.unwrap_or("-"),
                account.total_queries,
                account.total_errors
            );
        }
        thread::sleep(interval);
    }

    let summary = RangeSummary {
        reported_range,
        unit,
        samples: values,
        stats,
    };
    if json {
        return Ok(summary);
    }

    println!(
        "Range {}: n = {}, mean = {:.4}, std = {:.4}, min = {:.4}, max = {:.4} {}",
        range,
        stats.count,
        stats.mean,
        stats.std_dev(),
        stats.min,
        stats.max,
        unit.unwrap_or("")
    );
    println!();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(value);
        }
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn test_running_stats_skips_nan() {
        let mut stats = RunningStats::default();
        stats.push(f64::NAN);
        stats.push(1.5);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.std_dev(), 0.0);
        assert_eq!(stats.min, 1.5);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "mavo_daq",
            "/dev/ttyUSB0",
            "--cycles",
            "2",
            "--reaction",
            "raise",
        ]);
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(args.cycles, 2);
        assert_eq!(args.samples, 10);
        assert_eq!(args.interval_ms, 500);
        assert_eq!(args.reaction, Some(ReactionPolicy::Raise));
        assert!(!args.json);
    }

    #[test]
    fn test_range_record_serializes_nan_as_null() {
        let record = RangeRecord {
            timestamp: Utc::now(),
            cycle: 1,
            range: 2,
            reported_range: 2,
            unit: Some("lx"),
            samples: &[1.0, f64::NAN],
            count: 1,
            mean: 1.0,
            std_dev: 0.0,
            min: 1.0,
            max: 1.0,
            account: ErrorAccount::default(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["range"], 2);
        assert_eq!(value["samples"][1], serde_json::Value::Null);
        assert_eq!(value["unit"], "lx");
        assert_eq!(value["account"]["total_errors"], 0);
    }
}
