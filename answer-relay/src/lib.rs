//! HTTP relay that fetches a bearer credential from one upstream and uses it
//! to query a second one.
//!
//! Two listeners are started: the relay API (`/magic-header`, `/final-answer`)
//! and an admin listener exposing `/health` and `/ready`.

pub mod api;
pub mod config;
pub mod metrics_defs;
pub mod upstream;

#[cfg(test)]
mod testutils;

use config::{Config, ValidationError};
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use upstream::UpstreamClient;

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ValidationError),
    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Runs the relay and admin listeners until either fails.
pub async fn run(config: Config) -> Result<(), RelayError> {
    config.validate()?;

    let client = UpstreamClient::new(&config.upstreams)?;

    // Flipped once the relay listener is bound.
    let ready = Arc::new(AtomicBool::new(false));
    let ready_probe = ready.clone();

    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, RelayError>::new(move || ready_probe.load(Ordering::Relaxed)),
    );

    let relay_task = async {
        let listener = TcpListener::bind(config.listener.addr()).await?;
        tracing::info!(
            addr = %config.listener.addr(),
            token_url = %config.upstreams.token_url,
            answer_url = %config.upstreams.answer_url,
            "relay listener bound"
        );
        ready.store(true, Ordering::Relaxed);

        api::serve(listener, client).await?;
        Ok::<(), RelayError>(())
    };

    tokio::try_join!(relay_task, admin_task)?;
    Ok(())
}
