use crate::config::Upstreams;
use crate::metrics_defs::UPSTREAM_REQUEST_DURATION;
use reqwest::RequestBuilder;
use reqwest::header::ACCEPT;
use serde_json::Value;
use shared::histogram;
use std::error::Error;
use std::time::{Duration, Instant};
use url::Url;

/// Field of the token upstream's response holding the bearer credential.
pub const TOKEN_FIELD: &str = "useThisHeaderToAuthenticateTowardsTheFinalEndpoint";
/// Field of the answer upstream's response holding the answer.
pub const ANSWER_FIELD: &str = "finalAnswer";

#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("field `{0}` not found in upstream response")]
    MissingField(&'static str),
    #[error("request to {0} timed out")]
    Timeout(Url),
    #[error("{}", error_chain(.0))]
    Request(#[from] reqwest::Error),
}

/// Renders an error followed by each of its sources, separated by `: `.
///
/// reqwest's own `Display` stops at the top level, which hides causes such as
/// a refused connection.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

#[derive(Clone, Copy, Debug)]
enum Upstream {
    Token,
    Answer,
}

impl Upstream {
    fn as_str(&self) -> &'static str {
        match self {
            Upstream::Token => "token",
            Upstream::Answer => "answer",
        }
    }
}

/// Calls the token and answer upstreams.
///
/// Nothing is cached between calls: every `fetch_answer` fetches a new token.
/// Cloning is cheap and clones share the connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    token_url: Url,
    answer_url: Url,
}

impl UpstreamClient {
    pub fn new(config: &Upstreams) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(UpstreamClient {
            client,
            token_url: config.token_url.clone(),
            answer_url: config.answer_url.clone(),
        })
    }

    /// Fetches a fresh bearer credential from the token upstream.
    pub async fn fetch_token(&self) -> Result<Value, UpstreamError> {
        let request = self.client.get(self.token_url.clone());
        let body = self.send(Upstream::Token, &self.token_url, request).await?;

        extract_field(&body, TOKEN_FIELD)
    }

    /// Fetches a credential, then asks the answer upstream with it.
    ///
    /// Token failures are returned as is and the answer upstream is not called.
    pub async fn fetch_answer(&self) -> Result<Value, UpstreamError> {
        let token = self.fetch_token().await?;

        let request = self
            .client
            .get(self.answer_url.clone())
            .bearer_auth(credential_text(&token));
        let body = self.send(Upstream::Answer, &self.answer_url, request).await?;

        extract_field(&body, ANSWER_FIELD)
    }

    async fn send(
        &self,
        upstream: Upstream,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<Vec<u8>, UpstreamError> {
        tracing::debug!(upstream = upstream.as_str(), %url, "sending upstream request");
        let start = Instant::now();

        let result = async {
            let response = request
                .header(ACCEPT, "application/json")
                .send()
                .await?
                .error_for_status()?;
            response.bytes().await
        }
        .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) if e.is_timeout() => "timeout",
            Err(e) if e.is_status() => "status",
            Err(_) => "error",
        };
        histogram!(
            UPSTREAM_REQUEST_DURATION,
            "upstream" => upstream.as_str(),
            "outcome" => outcome
        )
        .record(start.elapsed().as_secs_f64());

        match result {
            Ok(body) => Ok(body.to_vec()),
            Err(e) if e.is_timeout() => Err(UpstreamError::Timeout(url.clone())),
            Err(e) => Err(UpstreamError::Request(e)),
        }
    }
}

/// Reads `field` from a JSON object body.
///
/// The field counts as missing when it is absent or falsy (`null`, `false`,
/// `0`, `""`), or when the body is not a JSON object. Any other value is
/// returned unchanged, whatever its type.
pub fn extract_field(body: &[u8], field: &'static str) -> Result<Value, UpstreamError> {
    let mut body = serde_json::from_slice::<Value>(body).ok();

    body.as_mut()
        .and_then(|value| value.as_object_mut())
        .and_then(|object| object.remove(field))
        .filter(is_truthy)
        .ok_or(UpstreamError::MissingField(field))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Header text for a credential: strings verbatim, anything else as JSON.
fn credential_text(token: &Value) -> String {
    match token {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
