//! Replay client for the remote inventory API.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{ModificationProposal, MutationKind};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Failure modes of one replay attempt
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Remote unreachable (timeout, DNS, connection refused); retryable
    #[error("Network error: {0}")]
    Network(String),
    /// Remote refused the mutation; retryable under the general policy
    #[error("Remote rejected mutation: {0}")]
    Rejected(String),
    /// Remote reports the target changed independently (HTTP 409)
    #[error("Conflicting server change for {}", .0.entity_id)]
    Conflict(Box<ModificationProposal>),
}

pub type ReplayResult<T> = Result<T, ReplayError>;

/// Successful replay acknowledgement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayOutcome {
    /// Server's view of the entity after the mutation, when returned
    pub entity: Option<Value>,
}

/// Trait for replaying queued mutations against the remote API
#[allow(async_fn_in_trait)]
pub trait ReplayClient {
    /// Re-issue one queued mutation
    async fn replay(
        &self,
        method: MutationKind,
        target: &str,
        payload: &Value,
    ) -> ReplayResult<ReplayOutcome>;
}

/// HTTP implementation of `ReplayClient`
#[derive(Clone)]
pub struct HttpReplayClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReplayClient {
    /// Create a client for the given API base URL with a bounded timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ReplayResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ReplayError::Network(error.to_string()))?;
        Ok(Self { base_url, client })
    }

    /// Cheap reachability check against the API health endpoint
    pub async fn probe(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

impl ReplayClient for HttpReplayClient {
    async fn replay(
        &self,
        method: MutationKind,
        target: &str,
        payload: &Value,
    ) -> ReplayResult<ReplayOutcome> {
        let url = format!("{}/{target}", self.base_url);
        let request = match method {
            MutationKind::Create => self.client.post(&url).json(payload),
            MutationKind::Update => self.client.put(&url).json(payload),
            MutationKind::Patch => self.client.patch(&url).json(payload),
            MutationKind::Delete => self.client.delete(&url),
        };

        let response = request
            .send()
            .await
            .map_err(|error| ReplayError::Network(error.to_string()))?;
        let status = response.status();

        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_conflict(&body, status));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplayError::Rejected(parse_api_error(status, &body)));
        }

        let entity = response.json::<Value>().await.ok();
        Ok(ReplayOutcome { entity })
    }
}

#[derive(Debug, Deserialize)]
struct ConflictBody {
    server_change: Option<ModificationProposal>,
    #[serde(default)]
    message: Option<String>,
}

/// Decode a 409 body into the server's change; an undecodable body
/// degrades to an ordinary rejection rather than a fabricated conflict
fn parse_conflict(body: &str, status: StatusCode) -> ReplayError {
    if let Ok(payload) = serde_json::from_str::<ConflictBody>(body) {
        if let Some(server_change) = payload.server_change {
            return ReplayError::Conflict(Box::new(server_change));
        }
        if let Some(message) = payload.message {
            return ReplayError::Rejected(format!("{} ({})", message.trim(), status.as_u16()));
        }
    }
    ReplayError::Rejected(parse_api_error(status, body))
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> ReplayResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        ReplayError::Rejected("API base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(ReplayError::Rejected(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProposalKind;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://api.example.com/".to_string()).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        let body = r#"{"message": "rack is full", "error": "conflict"}"#;
        let parsed = parse_api_error(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(parsed, "rack is full (422)");
    }

    #[test]
    fn parse_api_error_falls_back_to_body_text() {
        let parsed = parse_api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(parsed, "upstream down (502)");

        let empty = parse_api_error(StatusCode::BAD_GATEWAY, "   ");
        assert_eq!(empty, "HTTP 502");
    }

    #[test]
    fn parse_conflict_extracts_server_change() {
        let body = r#"{
            "server_change": {
                "entity_id": "eq-1",
                "kind": "update",
                "new_data": {"ipAddress": "192.168.1.3"},
                "created_at": 100,
                "updated_at": 150
            }
        }"#;

        match parse_conflict(body, StatusCode::CONFLICT) {
            ReplayError::Conflict(change) => {
                assert_eq!(change.entity_id, "eq-1");
                assert_eq!(change.kind, ProposalKind::Update);
                assert_eq!(change.updated_at, 150);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn parse_conflict_without_server_change_degrades_to_rejection() {
        let parsed = parse_conflict(r#"{"message": "stale revision"}"#, StatusCode::CONFLICT);
        assert!(matches!(parsed, ReplayError::Rejected(message) if message.contains("409")));
    }
}
