//! Outbound HTTP to registered client instances.
//!
//! Every call carries its own timeout; nothing here retries.

use std::time::Duration;

use pokesync_engine::Timestamp;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors talking to a client instance.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid payload from {url}: {reason}")]
    Payload { url: String, reason: String },
}

/// Capture list body. Clients wrap it in `{"captures": [...]}`; a bare array
/// is accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CapturesPayload {
    Wrapped {
        #[serde(default)]
        captures: Vec<Value>,
    },
    Bare(Vec<Value>),
}

/// Body of the acknowledgement POST.
#[derive(Debug, Serialize)]
struct AcknowledgeRequest<'a> {
    capture_ids: &'a [String],
}

/// HTTP client for client instances. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RemoteClient {
    http: reqwest::Client,
}

impl RemoteClient {
    /// Create a client with a fresh connection pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// `GET {base_url}/health`; any 2xx within `timeout` is healthy.
    pub async fn probe_health(&self, base_url: &str, timeout: Duration) -> Result<(), RemoteError> {
        let url = endpoint(base_url, "health");
        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| RemoteError::Request {
                url: url.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteError::Status {
                url,
                status: response.status(),
            })
        }
    }

    /// `GET {base_url}/all-captures`, optionally restricted with `?since=`.
    pub async fn fetch_captures(
        &self,
        base_url: &str,
        since: Option<Timestamp>,
        timeout: Duration,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = endpoint(base_url, "all-captures");
        let mut request = self.http.get(&url).timeout(timeout);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        let response = request.send().await.map_err(|source| RemoteError::Request {
            url: url.clone(),
            source,
        })?;

        if response.status() != StatusCode::OK {
            return Err(RemoteError::Status {
                url,
                status: response.status(),
            });
        }

        let payload: CapturesPayload =
            response.json().await.map_err(|e| RemoteError::Payload {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(match payload {
            CapturesPayload::Wrapped { captures } => captures,
            CapturesPayload::Bare(captures) => captures,
        })
    }

    /// `POST {base_url}/acknowledge {capture_ids}`.
    pub async fn acknowledge(
        &self,
        base_url: &str,
        capture_ids: &[String],
        timeout: Duration,
    ) -> Result<(), RemoteError> {
        let url = endpoint(base_url, "acknowledge");
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&AcknowledgeRequest { capture_ids })
            .send()
            .await
            .map_err(|source| RemoteError::Request {
                url: url.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteError::Status {
                url,
                status: response.status(),
            })
        }
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("http://a:1", "health"), "http://a:1/health");
        assert_eq!(endpoint("http://a:1/", "health"), "http://a:1/health");
        assert_eq!(endpoint("http://a:1/api/", "all-captures"), "http://a:1/api/all-captures");
    }

    #[test]
    fn captures_payload_accepts_both_shapes() {
        let wrapped: CapturesPayload =
            serde_json::from_str(r#"{"captures": [{"pokemon_id": 1}], "total": 1}"#).unwrap();
        assert!(matches!(wrapped, CapturesPayload::Wrapped { captures } if captures.len() == 1));

        let bare: CapturesPayload = serde_json::from_str(r#"[{"pokemon_id": 1}, {}]"#).unwrap();
        assert!(matches!(bare, CapturesPayload::Bare(captures) if captures.len() == 2));
    }
}
