use crate::{LocationPoint, calculate_speed, haversine_distance, minute_time};
use serde::Deserialize;
use tracing::debug;

const KMH_PER_MPS: f64 = 3.6;

/// A filter that can be switched on with an upper limit.
///
/// In a filter file the limit is `max`, or `maxMeters` / `maxKmh` to name
/// the unit. Accuracy and jump limits are meters, the speed limit is km/h.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Threshold {
    pub enabled: bool,
    #[serde(alias = "maxMeters", alias = "maxKmh")]
    pub max: f64,
}

impl Threshold {
    pub fn at(max: f64) -> Self {
        Threshold { enabled: true, max }
    }

    fn rejects(&self, value: f64) -> bool {
        self.enabled && value > self.max
    }
}

/// Inclusive epoch millisecond bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeRange {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl TimeRange {
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms.is_none_or(|start| timestamp_ms >= start)
            && self.end_ms.is_none_or(|end| timestamp_ms <= end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    /// Maximum horizontal error in meters.
    pub accuracy: Threshold,
    /// Maximum speed in km/h.
    pub speed: Threshold,
    /// Maximum distance in meters from the previous point.
    pub jump: Threshold,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub kept_count: usize,
    pub removed_accuracy: usize,
    pub removed_speed: usize,
    pub removed_jumps: usize,
    pub removed_time: usize,
    pub total_removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub filtered_points: Vec<LocationPoint>,
    pub stats: FilterStats,
    /// First input point's time, truncated to the minute.
    pub start_time: Option<String>,
    /// Last input point's time, truncated to the minute.
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Time,
    Accuracy,
    Jump,
    Speed,
}

/// Applies the configured filters to time-sorted points.
///
/// Checks run in a fixed order (time range, accuracy, jump, speed) and a point
/// is charged to the first check it fails. Jump and speed compare each point
/// with its predecessor in `points`, whether or not that predecessor was kept.
pub fn filter_points(points: &[LocationPoint], config: &FilterConfig) -> FilterOutcome {
    let max_speed = Threshold {
        enabled: config.speed.enabled,
        max: config.speed.max / KMH_PER_MPS,
    };

    let mut filtered_points = Vec::new();
    let mut stats = FilterStats {
        total: points.len(),
        ..FilterStats::default()
    };

    for (i, point) in points.iter().enumerate() {
        let previous = i.checked_sub(1).map(|prev| &points[prev]);

        match check_point(point, previous, config, &max_speed) {
            None => filtered_points.push(point.clone()),
            Some(Rejection::Time) => stats.removed_time += 1,
            Some(Rejection::Accuracy) => stats.removed_accuracy += 1,
            Some(Rejection::Jump) => stats.removed_jumps += 1,
            Some(Rejection::Speed) => stats.removed_speed += 1,
        }
    }

    stats.kept_count = filtered_points.len();
    stats.total_removed =
        stats.removed_accuracy + stats.removed_speed + stats.removed_jumps + stats.removed_time;

    debug!(
        total = stats.total,
        kept = stats.kept_count,
        removed = stats.total_removed,
        "filtered points"
    );

    FilterOutcome {
        filtered_points,
        stats,
        start_time: points.first().and_then(|p| minute_time(p.timestamp_ms)),
        end_time: points.last().and_then(|p| minute_time(p.timestamp_ms)),
    }
}

fn check_point(
    point: &LocationPoint,
    previous: Option<&LocationPoint>,
    config: &FilterConfig,
    max_speed: &Threshold,
) -> Option<Rejection> {
    if !config.time_range.contains(point.timestamp_ms) {
        return Some(Rejection::Time);
    }

    if let Some(accuracy) = point.accuracy
        && config.accuracy.rejects(accuracy)
    {
        return Some(Rejection::Accuracy);
    }

    let prev = previous?;
    let distance = haversine_distance(point.lat, point.lon, prev.lat, prev.lon);

    if config.jump.rejects(distance) {
        return Some(Rejection::Jump);
    }

    let speed = calculate_speed(distance, prev.timestamp_ms, point.timestamp_ms);
    if max_speed.rejects(speed) {
        return Some(Rejection::Speed);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso_time;

    // Roughly 111m per 0.001 degree of latitude
    fn make_point(lat: f64, lon: f64, seconds: i64, accuracy: Option<f64>) -> LocationPoint {
        let timestamp_ms = 1_700_000_000_000 + seconds * 1000;
        LocationPoint {
            lat,
            lon,
            elevation: 0.0,
            timestamp_ms,
            iso_time: iso_time(timestamp_ms).unwrap(),
            accuracy,
            extras: Default::default(),
        }
    }

    fn assert_conserved(stats: &FilterStats) {
        assert_eq!(
            stats.kept_count
                + stats.removed_accuracy
                + stats.removed_speed
                + stats.removed_jumps
                + stats.removed_time,
            stats.total
        );
        assert_eq!(stats.total_removed, stats.total - stats.kept_count);
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        let points = vec![
            make_point(25.0, 121.0, 0, Some(500.0)),
            make_point(26.0, 121.0, 1, None),
        ];

        let outcome = filter_points(&points, &FilterConfig::default());
        assert_eq!(outcome.filtered_points, points);
        assert_eq!(outcome.stats.kept_count, 2);
        assert_eq!(outcome.stats.total_removed, 0);
    }

    #[test]
    fn test_empty_input() {
        let outcome = filter_points(&[], &FilterConfig::default());

        assert!(outcome.filtered_points.is_empty());
        assert_eq!(outcome.stats, FilterStats::default());
        assert_eq!(outcome.start_time, None);
        assert_eq!(outcome.end_time, None);
    }

    #[test]
    fn test_start_and_end_time_use_unfiltered_points() {
        let points = vec![
            make_point(25.0, 121.0, 0, None),
            make_point(25.0, 121.0, 125, Some(100.0)),
        ];
        let config = FilterConfig {
            accuracy: Threshold::at(10.0),
            ..FilterConfig::default()
        };

        let outcome = filter_points(&points, &config);
        assert_eq!(outcome.stats.kept_count, 1);
        assert_eq!(outcome.start_time.as_deref(), Some("2023-11-14T22:13"));
        assert_eq!(outcome.end_time.as_deref(), Some("2023-11-14T22:15"));
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let points = vec![
            make_point(25.0, 121.0, 0, None),
            make_point(25.0, 121.0, 10, None),
            make_point(25.0, 121.0, 20, None),
            make_point(25.0, 121.0, 30, None),
        ];
        let config = FilterConfig {
            time_range: TimeRange {
                start_ms: Some(points[1].timestamp_ms),
                end_ms: Some(points[2].timestamp_ms),
            },
            ..FilterConfig::default()
        };

        let outcome = filter_points(&points, &config);
        assert_eq!(outcome.filtered_points, points[1..3].to_vec());
        assert_eq!(outcome.stats.removed_time, 2);
        assert_conserved(&outcome.stats);
    }

    #[test]
    fn test_time_range_wins_over_accuracy() {
        let points = vec![make_point(25.0, 121.0, 0, Some(500.0))];
        let config = FilterConfig {
            accuracy: Threshold::at(10.0),
            time_range: TimeRange {
                start_ms: Some(points[0].timestamp_ms + 1),
                end_ms: None,
            },
            ..FilterConfig::default()
        };

        let outcome = filter_points(&points, &config);
        assert_eq!(outcome.stats.removed_time, 1);
        assert_eq!(outcome.stats.removed_accuracy, 0);
    }

    #[test]
    fn test_accuracy_filter() {
        let points = vec![
            make_point(25.0, 121.0, 0, Some(5.0)),
            make_point(25.0, 121.0, 10, Some(10.0)),
            make_point(25.0, 121.0, 20, Some(10.5)),
            make_point(25.0, 121.0, 30, None),
            make_point(25.0, 121.0, 40, Some(0.0)),
        ];

        let disabled = FilterConfig {
            accuracy: Threshold {
                enabled: false,
                max: 1.0,
            },
            ..FilterConfig::default()
        };
        assert_eq!(filter_points(&points, &disabled).stats.kept_count, 5);

        let config = FilterConfig {
            accuracy: Threshold::at(10.0),
            ..FilterConfig::default()
        };
        let outcome = filter_points(&points, &config);
        assert_eq!(outcome.stats.removed_accuracy, 1, "Only 10.5m exceeds 10m");
        assert_eq!(outcome.stats.kept_count, 4);
    }

    #[test]
    fn test_jump_filter_compares_with_original_predecessor() {
        // The outlier is removed, and the point after it is also far from it
        let points = vec![
            make_point(25.000, 121.0, 0, None),
            make_point(25.100, 121.0, 1000, None),
            make_point(25.001, 121.0, 2000, None),
            make_point(25.002, 121.0, 3000, None),
        ];
        let config = FilterConfig {
            jump: Threshold::at(1000.0),
            ..FilterConfig::default()
        };

        let outcome = filter_points(&points, &config);
        assert_eq!(outcome.stats.removed_jumps, 2);
        assert_eq!(
            outcome.filtered_points,
            vec![points[0].clone(), points[3].clone()]
        );
        assert_conserved(&outcome.stats);
    }

    #[test]
    fn test_jump_wins_over_speed() {
        // ~11km in 10 seconds breaks both limits
        let points = vec![
            make_point(25.0, 121.0, 0, None),
            make_point(25.1, 121.0, 10, None),
        ];
        let config = FilterConfig {
            speed: Threshold::at(100.0),
            jump: Threshold::at(500.0),
            ..FilterConfig::default()
        };

        let outcome = filter_points(&points, &config);
        assert_eq!(outcome.stats.removed_jumps, 1);
        assert_eq!(outcome.stats.removed_speed, 0);
        assert_conserved(&outcome.stats);
    }

    #[test]
    fn test_speed_filter_converts_kmh() {
        // ~111m in 10 seconds is ~40 km/h
        let points = vec![
            make_point(25.000, 121.0, 0, None),
            make_point(25.001, 121.0, 10, None),
        ];

        let slow = FilterConfig {
            speed: Threshold::at(30.0),
            ..FilterConfig::default()
        };
        assert_eq!(filter_points(&points, &slow).stats.removed_speed, 1);

        let fast = FilterConfig {
            speed: Threshold::at(50.0),
            ..FilterConfig::default()
        };
        assert_eq!(filter_points(&points, &fast).stats.removed_speed, 0);
    }

    #[test]
    fn test_speed_filter_ignores_zero_time_delta() {
        let points = vec![
            make_point(25.0, 121.0, 0, None),
            make_point(25.5, 121.0, 0, None),
        ];
        let config = FilterConfig {
            speed: Threshold::at(1.0),
            ..FilterConfig::default()
        };

        let outcome = filter_points(&points, &config);
        assert_eq!(outcome.stats.removed_speed, 0);
        assert_eq!(outcome.stats.kept_count, 2);
    }

    #[test]
    fn test_first_point_skips_jump_and_speed() {
        let points = vec![make_point(25.0, 121.0, 0, None)];
        let config = FilterConfig {
            speed: Threshold::at(0.0),
            jump: Threshold::at(0.0),
            ..FilterConfig::default()
        };

        assert_eq!(filter_points(&points, &config).stats.kept_count, 1);
    }

    #[test]
    fn test_accuracy_evaluated_before_jump() {
        let points = vec![
            make_point(25.0000, 121.0, 0, Some(5.0)),
            make_point(25.0090, 121.0, 10, Some(50.0)),
            make_point(25.0091, 121.0, 20, Some(5.0)),
        ];
        let config = FilterConfig {
            accuracy: Threshold::at(10.0),
            ..FilterConfig::default()
        };

        let outcome = filter_points(&points, &config);
        assert_eq!(
            outcome.filtered_points,
            vec![points[0].clone(), points[2].clone()]
        );
        assert_eq!(outcome.stats.removed_accuracy, 1);
        assert_eq!(outcome.stats.removed_jumps, 0);
    }

    #[test]
    fn test_filter_config_from_json() {
        let config: FilterConfig = serde_json::from_str(
            r#"{"accuracy":{"enabled":true,"max":25},"timeRange":{"endMs":1000}}"#,
        )
        .unwrap();

        assert_eq!(config.accuracy, Threshold::at(25.0));
        assert!(!config.speed.enabled);
        assert_eq!(config.time_range.start_ms, None);
        assert_eq!(config.time_range.end_ms, Some(1000));
    }

    #[test]
    fn test_filter_config_unit_keys() {
        let config: FilterConfig = serde_json::from_str(
            r#"{
                "accuracy": {"enabled": true, "maxMeters": 15},
                "speed": {"enabled": true, "maxKmh": 120},
                "jump": {"enabled": false, "maxMeters": 800}
            }"#,
        )
        .unwrap();

        assert_eq!(config.accuracy, Threshold::at(15.0));
        assert_eq!(config.speed, Threshold::at(120.0));
        assert_eq!(
            config.jump,
            Threshold {
                enabled: false,
                max: 800.0
            }
        );
    }
}
