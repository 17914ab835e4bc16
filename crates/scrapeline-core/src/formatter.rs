//! Text exposition renderer.
//!
//! A [`Formatter`] accumulates output in a [`GrowableBuffer`] through
//! `load_*` calls and hands it over with [`Formatter::dump`], which also
//! resets it for the next scrape. Block layout per metric:
//!
//! ```text
//! # HELP <name> <help>
//! # TYPE <name> <type>
//! <l_value> <value>
//! ...
//! <blank line>
//! ```

use std::sync::Arc;

use crate::buffer::GrowableBuffer;
use crate::collector::Collector;
use crate::error::{MetricsError, Result};
use crate::metric::{Metric, MetricType, SampleSlot};
use crate::sample::Sample;

/// Six-decimal fixed point, with exposition spellings for non-finite values.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{value:.6}")
    }
}

/// Render `name{k="v",...}` in a fresh buffer.
pub fn render_l_value<K, V>(
    name: &str,
    keys: &[K],
    values: &[V],
    extra: Option<(&str, &str)>,
) -> Result<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut f = Formatter::new();
    f.load_l_value(name, keys, values, extra)?;
    Ok(f.dump())
}

#[derive(Debug, Default)]
pub struct Formatter {
    buffer: GrowableBuffer,
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_help(&mut self, name: &str, help: &str) -> Result<()> {
        self.buffer.push_str("# HELP ")?;
        self.buffer.push_str(name)?;
        self.buffer.push(' ')?;
        for c in help.chars() {
            match c {
                '\\' => self.buffer.push_str("\\\\")?,
                '\n' => self.buffer.push_str("\\n")?,
                c => self.buffer.push(c)?,
            }
        }
        self.buffer.push('\n')
    }

    pub fn load_type(&mut self, name: &str, kind: MetricType) -> Result<()> {
        self.buffer.push_str("# TYPE ")?;
        self.buffer.push_str(name)?;
        self.buffer.push(' ')?;
        self.buffer.push_str(kind.as_str())?;
        self.buffer.push('\n')
    }

    /// Append an `l_value`. `extra` is a trailing reserved pair such as `le`.
    pub fn load_l_value<K, V>(
        &mut self,
        name: &str,
        keys: &[K],
        values: &[V],
        extra: Option<(&str, &str)>,
    ) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if keys.len() != values.len() {
            return Err(MetricsError::InvalidArgument(format!(
                "{name}: expected {} label values, got {}",
                keys.len(),
                values.len()
            )));
        }
        self.buffer.push_str(name)?;
        if keys.is_empty() && extra.is_none() {
            return Ok(());
        }

        self.buffer.push('{')?;
        let pairs = keys
            .iter()
            .map(|k| k.as_ref())
            .zip(values.iter().map(|v| v.as_ref()))
            .chain(extra);
        for (i, (key, value)) in pairs.enumerate() {
            if i > 0 {
                self.buffer.push(',')?;
            }
            self.buffer.push_str(key)?;
            self.buffer.push_str("=\"")?;
            self.load_label_value(value)?;
            self.buffer.push('"')?;
        }
        self.buffer.push('}')
    }

    fn load_label_value(&mut self, value: &str) -> Result<()> {
        for c in value.chars() {
            match c {
                '\\' => self.buffer.push_str("\\\\")?,
                '"' => self.buffer.push_str("\\\"")?,
                '\n' => self.buffer.push_str("\\n")?,
                c => self.buffer.push(c)?,
            }
        }
        Ok(())
    }

    /// `<l_value> <value>\n`, reading the value now.
    pub fn load_sample(&mut self, sample: &Sample) -> Result<()> {
        self.buffer.push_str(sample.l_value())?;
        self.buffer.push(' ')?;
        self.buffer.push_str(&format_value(sample.get()))?;
        self.buffer.push('\n')
    }

    /// Full block for one metric, trailing blank line included.
    pub fn load_metric(&mut self, metric: &Metric) -> Result<()> {
        self.load_help(metric.name(), metric.help())?;
        self.load_type(metric.name(), metric.kind())?;
        for slot in metric.samples()? {
            match slot {
                SampleSlot::Scalar(sample) => self.load_sample(&sample)?,
                SampleSlot::Histogram(hist) => {
                    for sample in hist.samples()? {
                        self.load_sample(&sample)?;
                    }
                }
            }
        }
        self.buffer.push('\n')
    }

    /// Run each collector's hook and render what it returns, in order.
    pub fn load_collectors(&mut self, collectors: &[Arc<Collector>]) -> Result<()> {
        for collector in collectors {
            for metric in collector.collect()? {
                self.load_metric(&metric)?;
            }
        }
        Ok(())
    }

    /// Take the rendered text and reset for reuse.
    pub fn dump(&mut self) -> String {
        self.buffer.dump()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
