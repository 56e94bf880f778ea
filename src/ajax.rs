//! Client for the plugin's `admin-ajax.php` pending-request check.
//!
//! The endpoint answers with the usual WordPress AJAX envelope
//! `{"success": bool, "data": ...}`. On success `data` carries `count`,
//! `timestamp`, and optionally `total_pending` and `requests`.

use core::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::config::EndpointConfig;
use crate::error::PollError;

/// One pending order request as returned when details are asked for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingRequest {
    #[serde(deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub patient_dob: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: String,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub order_id: Option<u64>,
}

/// Decoded `data` of a successful check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub count: u64,
    /// Server clock, unix seconds.
    pub timestamp: i64,
    pub total_pending: Option<u64>,
    pub requests: Vec<PendingRequest>,
}

#[async_trait]
pub trait PendingSource {
    /// Asks for requests newer than `last_check`. `details` is set when the
    /// caller renders the request list and needs the rows.
    async fn fetch(&self, last_check: i64, details: bool) -> Result<PendingSnapshot, PollError>;
}

pub type DynPendingSource = dyn PendingSource + Send + Sync;

pub struct AjaxClient {
    http: reqwest::Client,
    url: Url,
    action: String,
    nonce: String,
    cookie: Option<String>,
}

impl AjaxClient {
    pub fn new(config: &EndpointConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ne-mlp-notify/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            action: config.action.clone(),
            nonce: config.nonce.clone(),
            cookie: config.cookie.clone(),
        })
    }
}

#[async_trait]
impl PendingSource for AjaxClient {
    async fn fetch(&self, last_check: i64, details: bool) -> Result<PendingSnapshot, PollError> {
        let last_check = last_check.to_string();
        let background = if details { "false" } else { "true" };

        let mut request = self.http.post(self.url.clone()).form(&[
            ("action", self.action.as_str()),
            ("last_check", last_check.as_str()),
            ("nonce", self.nonce.as_str()),
            ("is_background_check", background),
        ]);

        if let Some(ref cookie) = self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CheckData {
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    total_pending: Option<u64>,
    #[serde(default)]
    requests: Option<serde_json::Value>,
}

pub fn parse_response(body: &str) -> Result<PendingSnapshot, PollError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| PollError::Decode(e.to_string()))?;

    if !envelope.success {
        let message = match envelope.data {
            Some(serde_json::Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => "no reason given".to_owned(),
        };
        return Err(PollError::Rejected(message));
    }

    let data = envelope.data.ok_or(PollError::Incomplete("data"))?;
    let data: CheckData =
        serde_json::from_value(data).map_err(|e| PollError::Decode(e.to_string()))?;

    Ok(PendingSnapshot {
        count: data.count.ok_or(PollError::Incomplete("count"))?,
        timestamp: data.timestamp.ok_or(PollError::Incomplete("timestamp"))?,
        total_pending: data.total_pending,
        requests: decode_rows(data.requests),
    })
}

/// Decodes rows one at a time. A row that fails is dropped on its own and
/// never takes the counts of the response down with it.
fn decode_rows(requests: Option<serde_json::Value>) -> Vec<PendingRequest> {
    let Some(serde_json::Value::Array(rows)) = requests else {
        return Vec::new();
    };

    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(row) => Some(row),
            Err(e) => {
                log::debug!("Skipping request row: {e}");
                None
            }
        })
        .collect()
}

// WordPress hands back numbers as JSON strings about as often as not.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Text(String),
}

impl Lenient {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Lenient>::deserialize(d)?.and_then(|v| v.as_i64()))
}

fn lenient_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(lenient_opt_i64(d)?.and_then(|v| u64::try_from(v).ok()))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    lenient_opt_u64(d)?.ok_or_else(|| serde::de::Error::custom("expected a non-negative id"))
}
