//! Per-label-set histogram state: one sample per bound plus `+Inf`,
//! `count` and `sum`.
//!
//! Every `l_value` is rendered once here, at construction. Observation only
//! walks the cached bucket handles and runs CAS adds.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::buckets::HistogramBuckets;
use crate::error::{MetricsError, Result};
use crate::formatter::{format_value, render_l_value};
use crate::list::OrderedList;
use crate::map::ConcurrentMap;
use crate::metric::MetricType;
use crate::sample::Sample;

/// `l_values` key of the implicit top bucket.
pub const INF_KEY: &str = "+Inf";
/// `l_values` key of the observation count.
pub const COUNT_KEY: &str = "count";
/// `l_values` key of the observation sum.
pub const SUM_KEY: &str = "sum";

#[derive(Debug)]
pub struct HistogramSample {
    buckets: Arc<HistogramBuckets>,
    /// l_value -> sample.
    samples: ConcurrentMap<Arc<Sample>>,
    /// Render order of `samples`.
    order: OrderedList<String>,
    /// Bound text (`"0.500000"`, `"+Inf"`, `"count"`, `"sum"`) -> l_value.
    l_values: ConcurrentMap<String>,
    /// Distinct rendered bounds, ascending.
    bucket_samples: Vec<(f64, Arc<Sample>)>,
    inf: Arc<Sample>,
    count: Arc<Sample>,
    sum: Arc<Sample>,
    lock: Mutex<()>,
}

struct Builder {
    samples: ConcurrentMap<Arc<Sample>>,
    order: OrderedList<String>,
    l_values: ConcurrentMap<String>,
}

impl Builder {
    fn track(&mut self, key: &str, l_value: String) -> Result<Arc<Sample>> {
        let sample = Arc::new(Sample::new(MetricType::Histogram, l_value.clone()));
        self.samples.set(&l_value, Arc::clone(&sample))?;
        self.l_values.set(key, l_value.clone())?;
        self.order.append(l_value);
        Ok(sample)
    }
}

impl HistogramSample {
    /// Build every sample for the label set `keys = values` of histogram `name`.
    ///
    /// Bounds that render to the same six-decimal text share one bucket, which
    /// keeps the first text and counts up to the largest of those bounds. A
    /// `+Inf` bound folds into the implicit top bucket.
    pub fn new<K, V>(
        name: &str,
        keys: &[K],
        values: &[V],
        buckets: Arc<HistogramBuckets>,
    ) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut b = Builder {
            samples: ConcurrentMap::new(),
            order: OrderedList::new(),
            l_values: ConcurrentMap::new(),
        };
        let bucket_name = format!("{name}_bucket");

        let mut bucket_samples: Vec<(f64, Arc<Sample>)> = Vec::with_capacity(buckets.len());
        for &bound in buckets.bounds() {
            let le = format_value(bound);
            if bound == f64::INFINITY {
                debug!(histogram = %name, "infinite bound folded into +Inf");
                continue;
            }
            if b.l_values.contains(&le)? {
                // sorted input keeps same-text bounds adjacent
                if let Some(last) = bucket_samples.last_mut() {
                    last.0 = f64::max(last.0, bound);
                }
                debug!(histogram = %name, le = %le, "bucket bound folded into an existing bucket");
                continue;
            }
            let l_value = render_l_value(&bucket_name, keys, values, Some(("le", le.as_str())))?;
            bucket_samples.push((bound, b.track(&le, l_value)?));
        }

        let inf = b.track(
            INF_KEY,
            render_l_value(&bucket_name, keys, values, Some(("le", INF_KEY)))?,
        )?;
        let count = b.track(
            COUNT_KEY,
            render_l_value(&format!("{name}_count"), keys, values, None)?,
        )?;
        let sum = b.track(
            SUM_KEY,
            render_l_value(&format!("{name}_sum"), keys, values, None)?,
        )?;

        Ok(Self {
            buckets,
            samples: b.samples,
            order: b.order,
            l_values: b.l_values,
            bucket_samples,
            inf,
            count,
            sum,
            lock: Mutex::new(()),
        })
    }

    /// Record one observation: every bucket with bound >= `value`, `+Inf` and
    /// `count` go up by one and `sum` by `value`.
    pub fn observe(&self, value: f64) -> Result<()> {
        if value.is_nan() {
            return Err(MetricsError::InvalidArgument("cannot observe NaN".into()));
        }
        let _guard = self
            .lock
            .lock()
            .map_err(|_| MetricsError::poisoned("histogram sample"))?;

        for (bound, sample) in self.bucket_samples.iter().rev() {
            if value > *bound {
                break;
            }
            sample.apply(1.0);
        }
        self.inf.apply(1.0);
        self.count.apply(1.0);
        self.sum.apply(value);
        Ok(())
    }

    pub fn buckets(&self) -> &Arc<HistogramBuckets> {
        &self.buckets
    }

    /// Cached l_value for a bound text or one of the reserved keys.
    pub fn l_value_for(&self, key: &str) -> Result<Option<String>> {
        self.l_values.get(key)
    }

    /// Bucket sample whose bound renders like `bound`.
    pub fn bucket(&self, bound: f64) -> Result<Option<Arc<Sample>>> {
        match self.l_values.get(&format_value(bound))? {
            Some(l_value) => self.samples.get(&l_value),
            None => Ok(None),
        }
    }

    pub fn inf(&self) -> &Sample {
        &self.inf
    }

    pub fn count(&self) -> &Sample {
        &self.count
    }

    pub fn sum(&self) -> &Sample {
        &self.sum
    }

    /// All samples in render order: buckets ascending, `+Inf`, count, sum.
    pub fn samples(&self) -> Result<Vec<Arc<Sample>>> {
        let mut out = Vec::with_capacity(self.order.len());
        for l_value in self.order.iter() {
            let sample = self
                .samples
                .get(l_value)?
                .ok_or_else(|| MetricsError::NotFound(l_value.clone()))?;
            out.push(sample);
        }
        Ok(out)
    }
}
