//! Last-write-wins gauge store and Prometheus exposition rendering.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::classify::Metric;
use crate::handler::MetricPublisher;

/// A unique identifier for one gauge time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    /// Which gauge the series belongs to.
    pub metric: Metric,
    /// The `location` label value (a device's friendly name).
    pub location: String,
}

/// Store statistics, reported at shutdown and by the `/ready` endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Total samples published since startup.
    pub samples_published: u64,
}

impl StoreStats {
    /// Whether at least one sample has been published.
    pub fn ready(&self) -> bool {
        self.samples_published > 0
    }
}

/// Thread-safe store of the latest value per series.
///
/// Series are created lazily the first time a location is observed and
/// persist for the process lifetime; each `set` overwrites the previous
/// value. The registry holds only the gauges this exporter defines.
#[derive(Debug, Default)]
pub struct MetricStore {
    series: RwLock<HashMap<SeriesKey, f64>>,
    stats: RwLock<StoreStats>,
}

/// Shareable store handle.
pub type SharedStore = Arc<MetricStore>;

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of stored series.
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }

    /// Snapshot of the store statistics.
    pub fn stats(&self) -> StoreStats {
        *self.stats.read()
    }

    /// Current value of one series, if it has ever been published.
    pub fn value(&self, metric: Metric, location: &str) -> Option<f64> {
        self.series
            .read()
            .get(&SeriesKey {
                metric,
                location: location.to_string(),
            })
            .copied()
    }

    /// Render all series in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let series = self.series.read();
        let mut output = Vec::with_capacity(series.len() * 64 + 256);

        // Group by metric for HELP/TYPE comments, sorted for stable output.
        let mut keys: Vec<&SeriesKey> = series.keys().collect();
        keys.sort();

        let mut current: Option<Metric> = None;
        for key in keys {
            if current != Some(key.metric) {
                writeln!(output, "# HELP {} {}", key.metric.name(), key.metric.help()).ok();
                writeln!(output, "# TYPE {} gauge", key.metric.name()).ok();
                current = Some(key.metric);
            }

            writeln!(
                output,
                "{}{{location=\"{}\"}} {}",
                key.metric.name(),
                escape_label_value(&key.location),
                format_value(series[key])
            )
            .ok();
        }

        // Exporter self-metrics.
        let stats = self.stats.read();
        writeln!(output, "# TYPE zigbee_exporter_series gauge").ok();
        writeln!(output, "zigbee_exporter_series {}", series.len()).ok();
        writeln!(output, "# TYPE zigbee_exporter_samples_total counter").ok();
        writeln!(
            output,
            "zigbee_exporter_samples_total {}",
            stats.samples_published
        )
        .ok();

        String::from_utf8(output).unwrap_or_default()
    }
}

impl MetricPublisher for MetricStore {
    fn set(&self, metric: Metric, location: &str, value: f64) {
        let key = SeriesKey {
            metric,
            location: location.to_string(),
        };

        self.series.write().insert(key, value);
        self.stats.write().samples_published += 1;

        trace!(metric = %metric, location, value, "gauge updated");
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
