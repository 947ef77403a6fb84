use anyhow::Result;
use computer_use::providers::base::Usage;
use computer_use::tools::ToolResult;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Config, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::callbacks::non_empty;

pub const SERVICE_NAME: &str = "computer-use";

/// Counters describing one run of the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub model_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tool_calls: u64,
    pub tool_errors: u64,
    pub screenshots: u64,
}

/// Process-wide telemetry, built once in `main` and shared with the callbacks
///
/// Owns the root span every event of the run is recorded under, and a metrics
/// registry of its own whose counters are logged when the run ends.
pub struct Telemetry {
    span: Span,
    registry: Registry,
    model_calls: IntCounter,
    input_tokens: IntCounter,
    output_tokens: IntCounter,
    tool_calls: IntCounter,
    tool_errors: IntCounter,
    screenshots: IntCounter,
}

fn register_counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl Telemetry {
    pub fn new(model: &str) -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("computer_use".to_string()), None)?;
        Ok(Self {
            span: tracing::info_span!("computer_use", model = %model),
            model_calls: register_counter(&registry, "model_calls_total", "Model API calls")?,
            input_tokens: register_counter(&registry, "input_tokens_total", "Prompt tokens billed")?,
            output_tokens: register_counter(
                &registry,
                "output_tokens_total",
                "Completion tokens billed",
            )?,
            tool_calls: register_counter(&registry, "tool_calls_total", "Tool invocations")?,
            tool_errors: register_counter(
                &registry,
                "tool_errors_total",
                "Tool invocations that reported an error",
            )?,
            screenshots: register_counter(
                &registry,
                "screenshots_saved_total",
                "Screenshots written to disk",
            )?,
            registry,
        })
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn record_model_call(&self, usage: &Usage) {
        self.model_calls.inc();
        self.input_tokens.inc_by(usage.input_tokens.unwrap_or(0));
        self.output_tokens.inc_by(usage.output_tokens.unwrap_or(0));
    }

    pub fn record_tool_result(&self, result: &ToolResult) {
        self.tool_calls.inc();
        if non_empty(&result.error).is_some() {
            self.tool_errors.inc();
        }
    }

    pub fn record_screenshot(&self) {
        self.screenshots.inc();
    }

    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary {
            model_calls: self.model_calls.get(),
            input_tokens: self.input_tokens.get(),
            output_tokens: self.output_tokens.get(),
            tool_calls: self.tool_calls.get(),
            tool_errors: self.tool_errors.get(),
            screenshots: self.screenshots.get(),
        }
    }

    /// The registry in the prometheus text exposition format
    pub fn encode(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            parent: &self.span,
            model_calls = summary.model_calls,
            input_tokens = summary.input_tokens,
            output_tokens = summary.output_tokens,
            tool_calls = summary.tool_calls,
            tool_errors = summary.tool_errors,
            screenshots = summary.screenshots,
            "run finished"
        );
        match self.encode() {
            Ok(metrics) => tracing::debug!(parent: &self.span, "Metrics:\n{}", metrics),
            Err(e) => tracing::debug!(parent: &self.span, "Could not encode metrics: {}", e),
        }
    }
}

/// Keeps the span exporter alive until the run ends
pub struct TracingGuard {
    provider: Option<TracerProvider>,
}

impl TracingGuard {
    /// Flush pending spans to the collector
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                tracing::debug!("Failed to flush traces: {}", e);
            }
        }
    }
}

/// Signal specific path of an OTLP/HTTP collector endpoint
pub fn traces_endpoint(endpoint: &str) -> String {
    format!("{}/v1/traces", endpoint.trim_end_matches('/'))
}

fn otlp_tracer_provider(endpoint: &str) -> Result<TracerProvider> {
    let exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(traces_endpoint(endpoint));

    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            Config::default()
                .with_resource(Resource::new(vec![KeyValue::new("service.name", SERVICE_NAME)])),
        )
        .install_batch(runtime::TokioCurrentThread)?;
    Ok(provider)
}

/// Install the global subscriber: formatted logs, plus spans exported over
/// OTLP when `otlp_endpoint` is set
///
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init_tracing(log_level: &str, otlp_endpoint: Option<&str>) -> TracingGuard {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (provider, export_error) = match otlp_endpoint.map(otlp_tracer_provider) {
        Some(Ok(provider)) => (Some(provider), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let otel_layer = provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(otel_layer)
        .init();

    if let Some(e) = export_error {
        tracing::warn!("Trace export disabled: {:#}", e);
    }
    TracingGuard { provider }
}
