//! Named, typed family of samples keyed by rendered label set.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::buckets::HistogramBuckets;
use crate::error::{MetricsError, Result};
use crate::formatter::Formatter;
use crate::histogram_sample::HistogramSample;
use crate::map::ConcurrentMap;
use crate::sample::Sample;

/// Label keys owned by histogram and summary internals.
pub const RESERVED_LABEL_KEYS: [&str; 2] = ["le", "quantile"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricType {
    /// Spelling used on `# TYPE` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a metric stores per label set.
#[derive(Debug, Clone)]
pub enum SampleSlot {
    Scalar(Arc<Sample>),
    Histogram(Arc<HistogramSample>),
}

#[derive(Debug)]
pub struct Metric {
    kind: MetricType,
    name: String,
    help: String,
    label_keys: Vec<String>,
    samples: ConcurrentMap<SampleSlot>,
    buckets: Option<Arc<HistogramBuckets>>,
    /// Serializes l_value rendering and resolve-or-create.
    lock: Mutex<Formatter>,
}

impl Metric {
    /// New metric. Histograms get the default bucket layout.
    pub fn new(kind: MetricType, name: &str, help: &str, label_keys: &[&str]) -> Result<Self> {
        let buckets = (kind == MetricType::Histogram).then(HistogramBuckets::default);
        Self::build(kind, name, help, label_keys, buckets)
    }

    /// New histogram with explicit buckets.
    pub fn histogram(
        name: &str,
        help: &str,
        label_keys: &[&str],
        buckets: HistogramBuckets,
    ) -> Result<Self> {
        Self::build(MetricType::Histogram, name, help, label_keys, Some(buckets))
    }

    fn build(
        kind: MetricType,
        name: &str,
        help: &str,
        label_keys: &[&str],
        buckets: Option<HistogramBuckets>,
    ) -> Result<Self> {
        if !is_valid_metric_name(name) {
            return Err(rejected(name, format!("invalid metric name {name:?}")));
        }
        for (i, key) in label_keys.iter().enumerate() {
            if RESERVED_LABEL_KEYS.contains(key) {
                return Err(rejected(name, format!("label key {key:?} is reserved")));
            }
            if !is_valid_label_key(key) {
                return Err(rejected(name, format!("invalid label key {key:?}")));
            }
            if label_keys[..i].contains(key) {
                return Err(rejected(name, format!("duplicate label key {key:?}")));
            }
        }

        Ok(Self {
            kind,
            name: name.to_string(),
            help: help.to_string(),
            label_keys: label_keys.iter().map(|k| k.to_string()).collect(),
            samples: ConcurrentMap::new(),
            buckets: buckets.map(Arc::new),
            lock: Mutex::new(Formatter::new()),
        })
    }

    pub fn kind(&self) -> MetricType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    pub fn buckets(&self) -> Option<&Arc<HistogramBuckets>> {
        self.buckets.as_ref()
    }

    pub(crate) fn require_kind(&self, kind: MetricType) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(MetricsError::WrongMetricType {
                expected: kind.as_str(),
                found: self.kind.as_str(),
            })
        }
    }

    /// Scalar sample for `label_values`, created at zero on first use.
    pub fn sample_for(&self, label_values: &[&str]) -> Result<Arc<Sample>> {
        match self.slot_for(label_values)? {
            SampleSlot::Scalar(sample) => Ok(sample),
            SampleSlot::Histogram(_) => Err(MetricsError::WrongMetricType {
                expected: "counter, gauge or summary",
                found: self.kind.as_str(),
            }),
        }
    }

    /// Existing scalar sample for `label_values`; never creates one.
    pub fn find_sample(&self, label_values: &[&str]) -> Result<Arc<Sample>> {
        let l_value = {
            let mut formatter = self
                .lock
                .lock()
                .map_err(|_| MetricsError::poisoned("metric"))?;
            self.render_l_value(&mut formatter, label_values)?
        };
        match self.samples.get(&l_value)? {
            Some(SampleSlot::Scalar(sample)) => Ok(sample),
            Some(SampleSlot::Histogram(_)) => Err(MetricsError::WrongMetricType {
                expected: "counter, gauge or summary",
                found: self.kind.as_str(),
            }),
            None => Err(MetricsError::NotFound(format!("sample {l_value}"))),
        }
    }

    /// Histogram sample for `label_values`, created empty on first use.
    pub fn histogram_sample_for(&self, label_values: &[&str]) -> Result<Arc<HistogramSample>> {
        match self.slot_for(label_values)? {
            SampleSlot::Histogram(hist) => Ok(hist),
            SampleSlot::Scalar(_) => Err(MetricsError::WrongMetricType {
                expected: MetricType::Histogram.as_str(),
                found: self.kind.as_str(),
            }),
        }
    }

    fn slot_for(&self, label_values: &[&str]) -> Result<SampleSlot> {
        let mut formatter = self
            .lock
            .lock()
            .map_err(|_| MetricsError::poisoned("metric"))?;
        let l_value = self.render_l_value(&mut formatter, label_values)?;
        self.samples
            .get_or_insert_with(&l_value, || self.new_slot(&l_value, label_values))
    }

    fn render_l_value(&self, formatter: &mut Formatter, label_values: &[&str]) -> Result<String> {
        if let Err(e) = formatter.load_l_value(&self.name, &self.label_keys, label_values, None) {
            formatter.clear();
            return Err(e);
        }
        Ok(formatter.dump())
    }

    fn new_slot(&self, l_value: &str, label_values: &[&str]) -> Result<SampleSlot> {
        match &self.buckets {
            Some(buckets) => Ok(SampleSlot::Histogram(Arc::new(HistogramSample::new(
                &self.name,
                &self.label_keys,
                label_values,
                Arc::clone(buckets),
            )?))),
            None => Ok(SampleSlot::Scalar(Arc::new(Sample::new(self.kind, l_value)))),
        }
    }

    /// Drop the series for `label_values`.
    pub fn remove_sample(&self, label_values: &[&str]) -> Result<()> {
        let mut formatter = self
            .lock
            .lock()
            .map_err(|_| MetricsError::poisoned("metric"))?;
        let l_value = self.render_l_value(&mut formatter, label_values)?;
        if self.samples.delete(&l_value)? {
            Ok(())
        } else {
            Err(MetricsError::NotFound(format!("sample {l_value}")))
        }
    }

    /// Current series in key order.
    pub fn samples(&self) -> Result<Vec<SampleSlot>> {
        Ok(self
            .samples
            .entries()?
            .into_iter()
            .map(|(_, slot)| slot)
            .collect())
    }

    pub fn sample_count(&self) -> Result<usize> {
        self.samples.size()
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_valid_label_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn rejected(metric: &str, msg: String) -> MetricsError {
    warn!(metric = %metric, reason = %msg, "rejected metric definition");
    MetricsError::InvalidArgument(msg)
}
