//! Logging setup for the casemon binary.
//!
//! Console output goes through a compact `fmt` layer. Built with the
//! `telemetry` feature and run with `--otel`, spans are also exported over
//! OTLP (`OTEL_EXPORTER_OTLP_ENDPOINT`, default `http://localhost:4317`;
//! `OTEL_SERVICE_NAME`, default `casemon`).
//!
//! `RUST_LOG` replaces the default filter entirely. Without it the filter is
//! `info` (`debug` with `--debug`) plus [`QUIET_DIRECTIVES`].

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Appended to the default level.
///
/// PostgreSQL answers the lease guard's pre-lease `ROLLBACK` on an idle
/// connection with notice 25P01, which sqlx forwards at `warn`.
const QUIET_DIRECTIVES: &[&str] = &["sqlx::postgres::notice=error"];

/// Transport crates that flood `--debug` output with frame-level events.
const DEBUG_TRANSPORT_DIRECTIVES: &[&str] = &["hyper=info", "h2=info", "tower=info"];

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    pub debug: bool,
    pub otel: bool,
}

/// Install the global subscriber.
pub fn init(config: &TracingConfig) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(config.debug)
        .compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt_layer);

    #[cfg(feature = "telemetry")]
    if config.otel {
        use opentelemetry::trace::TracerProvider as _;
        use opentelemetry::KeyValue;
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::trace::TracerProvider;

        let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4317".to_string());
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "casemon".to_string());

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .build()
            .map_err(|e| anyhow!("failed to create OTLP exporter: {e}"))?;
        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .with_resource(opentelemetry_sdk::Resource::new(vec![KeyValue::new(
                "service.name",
                service_name.clone(),
            )]))
            .build();
        let tracer = provider.tracer("casemon");
        // The global provider keeps the batch exporter alive.
        let _ = opentelemetry::global::set_tracer_provider(provider);

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()
            .map_err(|err| anyhow!(err))?;
        tracing::info!(endpoint = %endpoint, service = %service_name, "exporting spans over OTLP");
        return Ok(());
    }

    registry.try_init().map_err(|err| anyhow!(err))?;

    #[cfg(not(feature = "telemetry"))]
    if config.otel {
        tracing::warn!("--otel ignored: built without the telemetry feature");
    }
    Ok(())
}

/// Flush pending spans.
#[cfg(feature = "telemetry")]
pub fn shutdown_otel() {
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(not(feature = "telemetry"))]
pub fn shutdown_otel() {}

fn default_directives(debug: bool) -> String {
    let mut directives = vec![if debug { "debug" } else { "info" }];
    directives.extend_from_slice(QUIET_DIRECTIVES);
    if debug {
        directives.extend_from_slice(DEBUG_TRANSPORT_DIRECTIVES);
    }
    directives.join(",")
}

fn env_filter(config: &TracingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.debug)))
}
