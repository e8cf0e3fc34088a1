//! Initializes logging for the staked-celo tools, optionally exporting spans over OTLP.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable holding the OTLP collector endpoint.
pub const OTLP_URL_ENVVAR: &str = "STAKED_CELO_OTLP_URL";

/// Environment variable holding a label appended to the service name, useful when several
/// operators ship spans to the same collector.
pub const SVC_LABEL_ENVVAR: &str = "STAKED_CELO_SVC_LABEL";

/// Name under which spans are recorded by the OTLP tracer.
const TRACER_NAME: &str = "staked-celo";

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Identifies the service in logs and exported spans.
    whoami: String,

    /// OTLP collector endpoint. Spans are only exported when this is set.
    otel_url: Option<String>,
}

impl LoggerConfig {
    /// Creates a config with the given service name and no span export.
    pub const fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
        }
    }

    /// Creates a config whose service name is `base`, suffixed with the service label from the
    /// environment when present.
    pub fn with_base_name(base: &str) -> Self {
        Self::new(get_whoami_string(base))
    }

    /// Same as [`Self::with_base_name`], additionally picking up the OTLP endpoint from
    /// [`OTLP_URL_ENVVAR`].
    pub fn from_env(base: &str) -> Self {
        let mut config = Self::with_base_name(base);
        config.otel_url = get_otlp_url_from_env();
        config
    }

    /// Sets the OTLP collector endpoint.
    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }

    /// Returns the service name.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("staked-celo")
    }
}

/// Initializes the global subscriber.
///
/// Filtering follows `RUST_LOG`. Setting `LOG_FILE=1` or `LOG_LINE_NUM=1` adds the source file or
/// line to each event.
///
/// # Panics
///
/// Panics if the OTLP exporter cannot be built or a global subscriber is already installed.
pub fn init(config: LoggerConfig) {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    let log_file = env::var("LOG_FILE").is_ok_and(|v| v == "1");
    let log_line_num = env::var("LOG_LINE_NUM").is_ok_and(|v| v == "1");

    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(log_file)
                .with_line_number(log_line_num),
        )
        .with_filter(filt);

    if let Some(otel_url) = &config.otel_url {
        let resource = Resource::builder()
            .with_attribute(KeyValue::new("service.name", config.whoami.clone()))
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otel_url)
            .build()
            .expect("must be able to initialize exporter");

        let tp = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();

        let otel_sub = tracing_opentelemetry::layer().with_tracer(tp.tracer(TRACER_NAME));

        tracing_subscriber::registry()
            .with(stdout_sub)
            .with(otel_sub)
            .init();
    } else {
        tracing_subscriber::registry().with(stdout_sub).init();
    }

    info!(whoami = %config.whoami, otlp = config.otel_url.is_some(), "logging started");
}

/// Gets the OTLP URL from [`OTLP_URL_ENVVAR`].
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from [`SVC_LABEL_ENVVAR`].
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes the service name from `base` and the optional service label.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}
