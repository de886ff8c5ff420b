use crate::metrics_defs::{REQUEST_DURATION, REQUESTS};
use crate::upstream::{TOKEN_FIELD, UpstreamClient, UpstreamError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{counter, histogram};
use std::time::Instant;
use tokio::net::TcpListener;

pub const MAGIC_HEADER_ROUTE: &str = "/magic-header";
pub const FINAL_ANSWER_ROUTE: &str = "/final-answer";

pub fn router(client: UpstreamClient) -> Router {
    Router::new()
        .route(MAGIC_HEADER_ROUTE, get(magic_header))
        .route(FINAL_ANSWER_ROUTE, get(final_answer))
        .with_state(client)
}

pub async fn serve(listener: TcpListener, client: UpstreamClient) -> std::io::Result<()> {
    axum::serve(listener, router(client)).await
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct MagicHeaderResponse {
    #[serde(rename = "useThisHeaderToAuthenticateTowardsTheFinalEndpoint")]
    pub token: Value,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalAnswerResponse {
    pub final_answer: Value,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiErrorResponse {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_upstream(route: &'static str, err: UpstreamError) -> Self {
        match err {
            UpstreamError::MissingField(field) => {
                tracing::warn!(route, field, "upstream response is missing a required field");
                ApiError::BadRequest(missing_field_message(route, field).to_string())
            }
            err => {
                tracing::error!(route, error = %err, "upstream request failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

fn missing_field_message(route: &str, field: &str) -> &'static str {
    match (route, field) {
        (FINAL_ANSWER_ROUTE, TOKEN_FIELD) => "Authentication token not found",
        (FINAL_ANSWER_ROUTE, _) => "Final answer not found in response",
        _ => "Required field not found in response",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse {
            error: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}

fn record<T>(route: &'static str, start: Instant, result: &Result<T, ApiError>) {
    let status = match result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status(),
    };

    counter!(REQUESTS, "route" => route, "status" => status.as_str().to_owned()).increment(1);
    histogram!(REQUEST_DURATION, "route" => route).record(start.elapsed().as_secs_f64());
}

async fn magic_header(
    State(client): State<UpstreamClient>,
) -> Result<Json<MagicHeaderResponse>, ApiError> {
    let start = Instant::now();

    let result = client
        .fetch_token()
        .await
        .map(|token| Json(MagicHeaderResponse { token }))
        .map_err(|e| ApiError::from_upstream(MAGIC_HEADER_ROUTE, e));

    record(MAGIC_HEADER_ROUTE, start, &result);
    result
}

async fn final_answer(
    State(client): State<UpstreamClient>,
) -> Result<Json<FinalAnswerResponse>, ApiError> {
    let start = Instant::now();

    let result = client
        .fetch_answer()
        .await
        .map(|final_answer| Json(FinalAnswerResponse { final_answer }))
        .map_err(|e| ApiError::from_upstream(FINAL_ANSWER_ROUTE, e));

    record(FINAL_ANSWER_ROUTE, start, &result);
    result
}
