use clap::{Args, ValueHint};
use rec2gpx::{minute_time, parse_records, read_log};
use std::error::Error;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct InspectArgs {
    /// Recorder log to inspect (`-` or omitted reads stdin)
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,
}

pub fn inspect_command(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let parsed = read_log(args.input.as_deref()).map(|text| parse_records(&text))?;

    let first = parsed.points.first().and_then(|p| minute_time(p.timestamp_ms));
    let last = parsed.points.last().and_then(|p| minute_time(p.timestamp_ms));

    println!("points: {}", parsed.points.len());
    println!("parse errors: {}", parsed.parse_error_count);
    println!("first point (UTC): {}", first.as_deref().unwrap_or("-"));
    println!("last point (UTC): {}", last.as_deref().unwrap_or("-"));

    Ok(())
}
