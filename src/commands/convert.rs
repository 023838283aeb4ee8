use clap::{Args, ValueHint};
use rec2gpx::{
    BoundKind, Conversion, ConvertError, FilterConfig, Session, Threshold, last_days_range,
    parse_bound, read_log,
};
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

use super::resolve_offset;

#[derive(Args, Debug, Default)]
pub struct ConvertArgs {
    /// Recorder log to convert (`-` or omitted reads stdin)
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Output GPX path (`-` for stdout). Defaults to the input name with a .gpx extension
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// JSON filter configuration, overridden by the flags below
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub filters: Option<PathBuf>,

    /// Drop points whose horizontal accuracy is worse than this (meters)
    #[arg(long, value_name = "METERS")]
    pub max_accuracy: Option<f64>,

    /// Drop points reached faster than this from the previous point (km/h)
    #[arg(long, value_name = "KMH")]
    pub max_speed: Option<f64>,

    /// Drop points further than this from the previous point (meters)
    #[arg(long, value_name = "METERS")]
    pub max_jump: Option<f64>,

    /// Keep points at or after this local time (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
    #[arg(long, value_name = "TIME")]
    pub start: Option<String>,

    /// Keep points at or before this local time (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
    #[arg(long, value_name = "TIME")]
    pub end: Option<String>,

    /// Keep only the last N local days, today included
    #[arg(
        long,
        value_name = "DAYS",
        conflicts_with_all = ["start", "end"],
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub last_days: Option<u32>,

    /// UTC offset of local times, e.g. +08:00 (defaults to the system offset)
    #[arg(long, value_name = "OFFSET", allow_hyphen_values = true)]
    pub utc_offset: Option<String>,
}

pub fn convert_command(args: &ConvertArgs) -> Result<(), Box<dyn Error>> {
    let offset = resolve_offset(args.utc_offset.as_deref())?;
    let now = OffsetDateTime::now_utc().to_offset(offset);
    let config = resolve_config(args, offset, now)?;
    debug!(?config, "resolved filter config");

    let mut session = Session::new();
    session.load(read_log(args.input.as_deref())?);

    let conversion = session.convert(&config)?;
    print_summary(conversion);

    let gpx = session.gpx()?;
    match output_path(args)? {
        Some(path) => {
            fs::write(&path, gpx).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
            info!(path = %path.display(), "wrote GPX");
            eprintln!("Wrote {}", path.display());
        }
        None => io::stdout().write_all(gpx.as_bytes())?,
    }

    Ok(())
}

fn resolve_config(
    args: &ConvertArgs,
    offset: UtcOffset,
    now: OffsetDateTime,
) -> Result<FilterConfig, ConvertError> {
    let mut config = match &args.filters {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| ConvertError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text)?
        }
        None => FilterConfig::default(),
    };

    if let Some(max) = args.max_accuracy {
        config.accuracy = Threshold::at(max);
    }
    if let Some(max) = args.max_speed {
        config.speed = Threshold::at(max);
    }
    if let Some(max) = args.max_jump {
        config.jump = Threshold::at(max);
    }

    if let Some(days) = args.last_days {
        config.time_range = last_days_range(now, days);
    }
    if let Some(start) = &args.start {
        config.time_range.start_ms = Some(parse_bound(start, BoundKind::Start, offset)?);
    }
    if let Some(end) = &args.end {
        config.time_range.end_ms = Some(parse_bound(end, BoundKind::End, offset)?);
    }

    Ok(config)
}

/// `None` means stdout.
fn output_path(args: &ConvertArgs) -> Result<Option<PathBuf>, Box<dyn Error>> {
    if let Some(output) = &args.output {
        return Ok((output != Path::new("-")).then(|| output.clone()));
    }

    match &args.input {
        Some(input) if input != Path::new("-") => {
            let output = input.with_extension("gpx");
            if &output == input {
                return Err(format!(
                    "{} already has a .gpx extension, pass --output",
                    input.display()
                )
                .into());
            }
            Ok(Some(output))
        }
        _ => Ok(None),
    }
}

fn print_summary(conversion: &Conversion) {
    let stats = &conversion.stats;

    eprintln!("Converted recorder log:");
    eprintln!("  - original points: {}", conversion.original_count());
    eprintln!("  - kept points: {}", conversion.filtered_count());
    eprintln!("  - removed points: {}", conversion.removed_count());
    eprintln!("  - removed for:");
    eprintln!("      accuracy: {}", stats.removed_accuracy);
    eprintln!("      speed: {}", stats.removed_speed);
    eprintln!("      jumps: {}", stats.removed_jumps);
    eprintln!("      time range: {}", stats.removed_time);

    if conversion.parse_error_count > 0 {
        eprintln!(
            "Warning: {} lines could not be parsed",
            conversion.parse_error_count
        );
    }
}
