use crate::filter::{FilterConfig, FilterStats, filter_points};
use crate::gpxxml::encode_gpx;
use crate::record::parse_records;
use crate::ConvertError;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Result of running a recorder log through parse, filter and encode.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub gpx: String,
    pub stats: FilterStats,
    pub parse_error_count: usize,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl Conversion {
    pub fn original_count(&self) -> usize {
        self.stats.total
    }

    pub fn filtered_count(&self) -> usize {
        self.stats.kept_count
    }

    pub fn removed_count(&self) -> usize {
        self.stats.total - self.stats.kept_count
    }
}

pub fn convert(text: &str, config: &FilterConfig) -> Result<Conversion, ConvertError> {
    let parsed = parse_records(text);
    let outcome = filter_points(&parsed.points, config);
    let gpx = encode_gpx(&outcome.filtered_points)?;

    Ok(Conversion {
        gpx,
        stats: outcome.stats,
        parse_error_count: parsed.parse_error_count,
        start_time: outcome.start_time,
        end_time: outcome.end_time,
    })
}

/// Holds one loaded log and the GPX produced from it.
///
/// Loading a new log discards the previous conversion, so `gpx` only ever
/// returns output that matches the current log.
#[derive(Debug, Default)]
pub struct Session {
    log: Option<String>,
    conversion: Option<Conversion>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, text: String) {
        self.log = Some(text);
        self.conversion = None;
    }

    pub fn convert(&mut self, config: &FilterConfig) -> Result<&Conversion, ConvertError> {
        let log = self.log.as_deref().ok_or(ConvertError::NoInput)?;
        let conversion = convert(log, config)?;
        Ok(self.conversion.insert(conversion))
    }

    pub fn gpx(&self) -> Result<&str, ConvertError> {
        self.conversion
            .as_ref()
            .map(|c| c.gpx.as_str())
            .ok_or(ConvertError::NothingToExport)
    }
}

/// Reads a whole recorder log from `path`, or from stdin when `path` is
/// `None` or `-`.
pub fn read_log(path: Option<&Path>) -> Result<String, ConvertError> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).map_err(|source| ConvertError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => {
            let mut text = String::new();
            io::stdin()
                .lock()
                .read_to_string(&mut text)
                .map_err(|source| ConvertError::Io {
                    path: PathBuf::from("<stdin>"),
                    source,
                })?;
            Ok(text)
        }
    }
}
