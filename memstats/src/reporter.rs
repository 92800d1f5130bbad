//! Report capability
//!
//! The publisher never talks to a metrics SDK directly. It describes its
//! instruments once and then hands every observation to a [`Reporter`].

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::Result;

/// Key/value pair attached to every observation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub key: Cow<'static, str>,
    pub value: Cow<'static, str>,
}

impl Label {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Observed value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    /// Counters saturate at `i64::MAX`
    pub fn from_u64(v: u64) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Float,
}

/// How an instrument's value evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Current level, may go up and down
    Gauge,
    /// Monotonic total since process start
    Cumulative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Count,
    Nanoseconds,
    Milliseconds,
    Ratio,
}

impl Unit {
    /// UCUM code, as used by OpenTelemetry
    pub fn as_ucum(self) -> &'static str {
        match self {
            Unit::Bytes => "By",
            Unit::Count => "{count}",
            Unit::Nanoseconds => "ns",
            Unit::Milliseconds => "ms",
            Unit::Ratio => "1",
        }
    }

    fn as_metrics_unit(self) -> metrics::Unit {
        match self {
            Unit::Bytes => metrics::Unit::Bytes,
            Unit::Count | Unit::Ratio => metrics::Unit::Count,
            Unit::Nanoseconds => metrics::Unit::Nanoseconds,
            Unit::Milliseconds => metrics::Unit::Milliseconds,
        }
    }
}

/// Static description of one published instrument
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub name: String,
    pub description: &'static str,
    pub unit: Unit,
    pub kind: Kind,
    pub value_type: ValueType,
}

/// Sink for observations
pub trait Reporter: Send + Sync {
    /// Called once per instrument before the first observation.
    fn describe(&self, descriptor: &Descriptor) -> Result<()> {
        let _ = descriptor;
        Ok(())
    }

    fn report(&self, descriptor: &Descriptor, value: Value, labels: &[Label]);
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn describe(&self, descriptor: &Descriptor) -> Result<()> {
        (**self).describe(descriptor)
    }

    fn report(&self, descriptor: &Descriptor, value: Value, labels: &[Label]) {
        (**self).report(descriptor, value, labels)
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn describe(&self, descriptor: &Descriptor) -> Result<()> {
        (**self).describe(descriptor)
    }

    fn report(&self, descriptor: &Descriptor, value: Value, labels: &[Label]) {
        (**self).report(descriptor, value, labels)
    }
}

/// Forwards every call to each inner reporter in order
#[derive(Default)]
pub struct Fanout {
    reporters: Vec<Box<dyn Reporter>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl Reporter for Fanout {
    fn describe(&self, descriptor: &Descriptor) -> Result<()> {
        for reporter in &self.reporters {
            reporter.describe(descriptor)?;
        }
        Ok(())
    }

    fn report(&self, descriptor: &Descriptor, value: Value, labels: &[Label]) {
        for reporter in &self.reporters {
            reporter.report(descriptor, value, labels);
        }
    }
}

/// Reporter backed by the `metrics` facade
///
/// Gauges are set to the observed level; cumulative instruments become
/// counters driven with `absolute`, so the exporter sees a monotonic total.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsReporter;

impl Reporter for MetricsReporter {
    fn describe(&self, descriptor: &Descriptor) -> Result<()> {
        let unit = descriptor.unit.as_metrics_unit();
        match descriptor.kind {
            Kind::Gauge => {
                metrics::describe_gauge!(descriptor.name.clone(), unit, descriptor.description)
            }
            Kind::Cumulative => {
                metrics::describe_counter!(descriptor.name.clone(), unit, descriptor.description)
            }
        }
        Ok(())
    }

    fn report(&self, descriptor: &Descriptor, value: Value, labels: &[Label]) {
        let labels: Vec<metrics::Label> = labels
            .iter()
            .map(|l| metrics::Label::new(l.key.to_string(), l.value.to_string()))
            .collect();

        match (descriptor.kind, value) {
            (Kind::Cumulative, Value::Int(v)) => {
                metrics::counter!(descriptor.name.clone(), labels).absolute(v.max(0) as u64);
            }
            _ => {
                metrics::gauge!(descriptor.name.clone(), labels).set(value.as_f64());
            }
        }
    }
}
