//! OTLP push exporter
//!
//! Periodically pushes everything recorded through the OpenTelemetry meter
//! provider to a collector over gRPC.

use anyhow::{Context, Result};
use dashmap::DashMap;
use opentelemetry::metrics::{Gauge, Meter, MeterProvider as _};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use tracing::info;

use crate::config::OtlpConfig;
use memstats::{Descriptor, Label, Reporter, Value, ValueType};

/// Instrumentation scope of the runtime statistics instruments
pub const METER_NAME: &str = "otel-playground/runtime";

/// Build the OTLP meter provider and install it globally
///
/// Must be called from within a tokio runtime, which the gRPC channel
/// needs.
pub fn init(config: &OtlpConfig) -> Result<SdkMeterProvider> {
    let endpoint = config.effective_endpoint();

    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .with_timeout(config.timeout())
        .build()
        .context("Failed to create OTLP metric exporter")?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.export_interval())
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource(config))
        .with_reader(reader)
        .build();

    global::set_meter_provider(provider.clone());

    info!(
        endpoint = %endpoint,
        export_interval_secs = config.export_interval_secs,
        service_name = %config.service_name,
        "Exporting OTLP metrics"
    );
    Ok(provider)
}

/// Resource describing this process to the collector
pub fn resource(config: &OtlpConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes(
            config
                .resource_attributes
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
        )
        .build()
}

enum OtelGauge {
    Int(Gauge<i64>),
    Float(Gauge<f64>),
}

/// Runtime statistics reporter backed by OpenTelemetry gauges
///
/// Each instrument becomes a synchronous gauge holding the latest observed
/// value; the periodic reader exports whatever was last recorded.
pub struct OtelReporter {
    meter: Meter,
    gauges: DashMap<String, OtelGauge>,
}

impl OtelReporter {
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            gauges: DashMap::new(),
        }
    }

    pub fn from_provider(provider: &SdkMeterProvider) -> Self {
        Self::new(provider.meter(METER_NAME))
    }

    fn build_gauge(&self, descriptor: &Descriptor) -> OtelGauge {
        match descriptor.value_type {
            ValueType::Int => OtelGauge::Int(
                self.meter
                    .i64_gauge(descriptor.name.clone())
                    .with_description(descriptor.description)
                    .with_unit(descriptor.unit.as_ucum())
                    .build(),
            ),
            ValueType::Float => OtelGauge::Float(
                self.meter
                    .f64_gauge(descriptor.name.clone())
                    .with_description(descriptor.description)
                    .with_unit(descriptor.unit.as_ucum())
                    .build(),
            ),
        }
    }
}

impl Reporter for OtelReporter {
    fn describe(&self, descriptor: &Descriptor) -> memstats::Result<()> {
        self.gauges
            .entry(descriptor.name.clone())
            .or_insert_with(|| self.build_gauge(descriptor));
        Ok(())
    }

    fn report(&self, descriptor: &Descriptor, value: Value, labels: &[Label]) {
        let attributes: Vec<KeyValue> = labels
            .iter()
            .map(|l| KeyValue::new(l.key.to_string(), l.value.to_string()))
            .collect();

        let gauge = self
            .gauges
            .entry(descriptor.name.clone())
            .or_insert_with(|| self.build_gauge(descriptor));

        match (gauge.value(), value) {
            (OtelGauge::Int(g), Value::Int(v)) => g.record(v, &attributes),
            (OtelGauge::Int(g), Value::Float(v)) => g.record(v as i64, &attributes),
            (OtelGauge::Float(g), v) => g.record(v.as_f64(), &attributes),
        }
    }
}
