//! Remote chain endpoint client

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::PollError;

/// Identifies this tool to the API operator
pub const API_COMMENT: &str = "ChainWatch";

/// Seconds subtracted from the remote `end` so the countdown reaches zero
/// on the last second the chain is still alive. Applied in exactly one place.
pub const END_OFFSET_SECONDS: i64 = 1;

/// Chain fields we care about from one successful poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    /// Epoch seconds as reported by the API, before the offset
    pub end: i64,
    /// Seconds until the chain times out, seeds the backup timer
    pub timeout: Option<u64>,
}

impl ChainSnapshot {
    /// End time the countdown should run towards
    pub fn adjusted_end(&self) -> i64 {
        self.end - END_OFFSET_SECONDS
    }
}

/// Anything that can report the current chain state
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch(&self, access_token: &str) -> Result<ChainSnapshot, PollError>;
}

#[derive(Deserialize)]
struct Envelope {
    chain: Option<ChainPayload>,
    error: Option<ApiErrorPayload>,
}

#[derive(Deserialize)]
struct ChainPayload {
    end: Option<i64>,
    timeout: Option<i64>,
}

#[derive(Deserialize)]
struct ApiErrorPayload {
    code: Option<i64>,
    error: Option<String>,
}

/// Parse a response body into a chain snapshot
pub fn parse_chain_response(body: &str) -> Result<ChainSnapshot, PollError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| PollError::Data(format!("invalid JSON: {}", e)))?;

    // The API reports bad keys and rate limits with a 200 and an error object
    if let Some(err) = envelope.error {
        return Err(PollError::Data(format!(
            "API error {}: {}",
            err.code.unwrap_or_default(),
            err.error.unwrap_or_else(|| "unknown".to_string())
        )));
    }

    let chain = envelope
        .chain
        .ok_or_else(|| PollError::Data("missing 'chain' object".to_string()))?;
    let end = chain
        .end
        .ok_or_else(|| PollError::Data("missing 'chain.end'".to_string()))?;

    Ok(ChainSnapshot {
        end,
        timeout: chain.timeout.map(|t| t.max(0) as u64),
    })
}

/// HTTP client for the faction chain endpoint
#[derive(Debug, Clone)]
pub struct TornApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl TornApiClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("chain-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ChainSource for TornApiClient {
    async fn fetch(&self, access_token: &str) -> Result<ChainSnapshot, PollError> {
        debug!("GET {} (selections=chain)", self.base_url);

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("selections", "chain"),
                ("key", access_token),
                ("comment", API_COMMENT),
            ])
            .send()
            .await
            .map_err(|e| PollError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Protocol(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PollError::Network(e.without_url().to_string()))?;
        parse_chain_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_end_and_timeout() {
        let body = r#"{"chain":{"current":120,"end":1700000300,"timeout":245}}"#;
        let snapshot = parse_chain_response(body).unwrap();
        assert_eq!(snapshot.end, 1_700_000_300);
        assert_eq!(snapshot.timeout, Some(245));
        assert_eq!(snapshot.adjusted_end(), 1_700_000_299);
    }

    #[test]
    fn timeout_is_optional_and_clamped() {
        let snapshot = parse_chain_response(r#"{"chain":{"end":10}}"#).unwrap();
        assert_eq!(snapshot.timeout, None);

        let snapshot = parse_chain_response(r#"{"chain":{"end":10,"timeout":-5}}"#).unwrap();
        assert_eq!(snapshot.timeout, Some(0));
    }

    #[test]
    fn api_error_object_is_a_data_error() {
        let body = r#"{"error":{"code":2,"error":"Incorrect key"}}"#;
        let err = parse_chain_response(body).unwrap_err();
        assert_eq!(err, PollError::Data("API error 2: Incorrect key".to_string()));
    }

    #[test]
    fn missing_fields_are_data_errors() {
        assert!(matches!(parse_chain_response(r#"{}"#), Err(PollError::Data(_))));
        assert!(matches!(
            parse_chain_response(r#"{"chain":{"timeout":3}}"#),
            Err(PollError::Data(_))
        ));
        assert!(matches!(parse_chain_response("<html>"), Err(PollError::Data(_))));
        assert!(matches!(
            parse_chain_response(r#"{"chain":{"end":"soon"}}"#),
            Err(PollError::Data(_))
        ));
    }
}
