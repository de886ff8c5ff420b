use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use sentry::types::ParseDsnError;
use shared::metrics_defs::describe_metrics;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(thiserror::Error, Debug)]
pub enum ObservabilityError {
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a metrics recorder is already installed")]
    RecorderAlreadySet,
    #[error("invalid sentry dsn: {0}")]
    InvalidDsn(#[from] ParseDsnError),
}

/// Installs the global tracing subscriber.
///
/// Sentry is only initialised when a DSN is configured; the returned guard
/// flushes pending events when dropped and must live until shutdown.
pub fn init_logging(
    logging: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, ObservabilityError> {
    let dsn = logging.map(LoggingConfig::dsn).transpose()?.flatten();
    let guard = dsn.map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            environment: logging
                .and_then(|config| config.environment.clone())
                .map(Into::into),
            ..Default::default()
        })
    });

    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    Ok(guard)
}

/// Exports metrics to statsd. Without a config no recorder is installed and
/// every metric call is a no-op.
pub fn init_metrics(metrics: Option<&MetricsConfig>) -> Result<(), ObservabilityError> {
    let Some(config) = metrics else {
        tracing::info!("statsd not configured, metrics disabled");
        return Ok(());
    };

    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(config.prefix.as_str()))?;
    metrics::set_global_recorder(recorder).map_err(|_| ObservabilityError::RecorderAlreadySet)?;

    describe_metrics(answer_relay::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "exporting metrics to statsd"
    );
    Ok(())
}
