use serde::Deserialize;
use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Relay and admin listeners cannot share {0}")]
    ListenerConflict(String),

    #[error("Timeout cannot be 0: {0}")]
    InvalidTimeout(&'static str),

    #[error("Unsupported scheme for upstream {name}: {scheme}")]
    UnsupportedScheme { name: &'static str, scheme: String },
}

/// Network listener configuration
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    fn relay_default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }

    fn admin_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }

    /// Whether both listeners would try to bind the same socket. A wildcard
    /// host (`0.0.0.0`, `::`) covers every address on its port.
    pub fn overlaps(&self, other: &Listener) -> bool {
        if self.port != other.port {
            return false;
        }

        self.host == other.host || self.is_wildcard() || other.is_wildcard()
    }

    fn is_wildcard(&self) -> bool {
        self.host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_unspecified())
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// The two services the relay calls on behalf of its clients.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Upstreams {
    /// Issues the bearer credential.
    pub token_url: Url,
    /// Answers requests authenticated with the credential.
    pub answer_url: Url,
    /// Total time allowed for one outbound request, body included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Upstreams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("timeout_secs"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("connect_timeout_secs"));
        }

        for (name, url) in [("token_url", &self.token_url), ("answer_url", &self.answer_url)] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ValidationError::UnsupportedScheme {
                    name,
                    scheme: url.scheme().to_string(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default = "Listener::relay_default")]
    pub listener: Listener,
    #[serde(default = "Listener::admin_default")]
    pub admin_listener: Listener,
    pub upstreams: Upstreams,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.listener.overlaps(&self.admin_listener) {
            return Err(ValidationError::ListenerConflict(self.listener.addr()));
        }

        self.upstreams.validate()
    }
}
