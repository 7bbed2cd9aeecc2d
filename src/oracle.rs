//! Hazard-analysis / routing service contract and its HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed oracle response: {0}")]
    Malformed(String),

    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),
}

/// Request body: the zone the user is standing in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub current_location: String,
}

/// Latest readings for one zone, keyed by zone name.
///
/// Missing (or null) readings count as zero / false. An item without a
/// `zoneId` matches no zone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisItem {
    #[serde(rename = "zoneId", default)]
    pub zone_id: String,
    #[serde(rename = "fireLevel", default)]
    pub fire_level: Option<f32>,
    #[serde(rename = "smokeLevel", default)]
    pub smoke_level: Option<f32>,
    #[serde(default)]
    pub knife: Option<bool>,
    #[serde(default, deserialize_with = "head_count")]
    pub people_cnt: Option<u32>,
}

/// Accepts any JSON number as a head count, rounded and floored at zero.
fn head_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let count = Option::<f64>::deserialize(deserializer)?;
    Ok(count.map(|n| n.round().max(0.0) as u32))
}

/// Parses analysis items one by one. An item that does not fit is skipped so
/// the rest of the response still applies.
fn lenient_analysis<'de, D>(deserializer: D) -> Result<Vec<AnalysisItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            warn!(analysis = %other, "analysis is not an array, ignoring it");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AnalysisItem>(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "skipping unreadable analysis item");
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EscapePath {
    /// Zone names from the current location to the exit. Anything other than an
    /// array of strings is treated as absent.
    #[serde(default, deserialize_with = "lenient_path")]
    pub path: Option<Vec<String>>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub total_distance: Option<f64>,
    #[serde(default)]
    pub is_safe: Option<bool>,
}

fn lenient_path<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OracleResponse {
    #[serde(default, deserialize_with = "lenient_analysis")]
    pub analysis: Vec<AnalysisItem>,
    #[serde(default)]
    pub escape_path: Option<EscapePath>,
}

impl OracleResponse {
    /// The route, if it has more than one stop. A single-entry path only restates
    /// the current position and carries no direction.
    pub fn usable_route(&self) -> Option<&[String]> {
        self.escape_path
            .as_ref()
            .and_then(|escape| escape.path.as_deref())
            .filter(|path| path.len() > 1)
    }
}

/// The remote hazard/route service.
#[async_trait]
pub trait HazardOracle: Send + Sync {
    async fn query(&self, current_location: &str) -> Result<OracleResponse, OracleError>;
}

/// JSON-over-HTTP oracle: `POST {url}` with `{"current_location": ...}`.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpOracle {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else {
            OracleError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl HazardOracle for HttpOracle {
    async fn query(&self, current_location: &str) -> Result<OracleResponse, OracleError> {
        let request = OracleRequest {
            current_location: current_location.to_string(),
        };
        debug!(url = %self.url, zone = %current_location, "querying oracle");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}
