//! The remote report service: the narrow interface the toolbar drives, and its HTTP client.

use crate::{ParamValue, logger::LogRecord, statics};
use reqwest::blocking::{Client, Response, multipart};
use serde::{Deserialize, Deserializer};
use std::{fmt, path::Path, time::Duration};

/// A successful reply. `parameters` is `None` when absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceReply {
    #[serde(default)]
    pub parameters: Option<ParamValue>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub logs: Vec<LogRecord>,
}

/// A rejected call, or a reply that carried an `error` member.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceFailure {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<RemoteError>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub logs: Vec<LogRecord>,
}

impl ServiceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// `error.message`, then `message`, then a generic fallback.
    pub fn best_message(&self) -> &str {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .filter(|m| !m.is_empty())
            .or(self.message.as_deref().filter(|m| !m.is_empty()))
            .unwrap_or(statics::MSG_INTERNAL_ERROR)
    }

    /// Top-level logs when present, otherwise the ones attached to `error`.
    pub fn logs(&self) -> &[LogRecord] {
        if !self.logs.is_empty() {
            return &self.logs;
        }
        self.error.as_ref().map_or(&[], |e| e.logs.as_slice())
    }
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.best_message())
    }
}

impl std::error::Error for ServiceFailure {}

impl From<reqwest::Error> for ServiceFailure {
    fn from(err: reqwest::Error) -> Self {
        ServiceFailure::new(err.to_string())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<LogRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LogRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Calls are blocking; callers keep them off the UI thread.
pub trait ReportService {
    fn default_parameters(&self) -> Result<ParamValue, ServiceFailure>;
    fn run(&self, document: &ParamValue, run_option: &str) -> Result<ServiceReply, ServiceFailure>;
    fn reload(&self) -> Result<ServiceReply, ServiceFailure>;
    fn read_parameters_file(&self, path: &Path) -> Result<ServiceReply, ServiceFailure>;
    /// The document rendered as a parameters file.
    fn write_parameters(&self, document: &ParamValue) -> Result<Vec<u8>, ServiceFailure>;
}

#[derive(Debug, Clone)]
pub struct HttpReportService {
    client: Client,
    api_url: String,
}

impl HttpReportService {
    pub fn new(api_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.api_url)
    }

    /// Read a JSON reply, turning error statuses and `error` members into failures.
    fn reply(response: Response) -> Result<ServiceReply, ServiceFailure> {
        let body = Self::json_body(response)?;
        if body.value.is_null() {
            return Ok(ServiceReply::default());
        }
        serde_json::from_slice(&body.bytes)
            .map_err(|e| ServiceFailure::new(format!("malformed service reply: {e}")))
    }

    fn json_body(response: Response) -> Result<Body, ServiceFailure> {
        let status = response.status();
        let bytes = response.bytes()?.to_vec();
        let value = if bytes.iter().all(u8::is_ascii_whitespace) {
            ParamValue::Null
        } else {
            match serde_json::from_slice::<ParamValue>(&bytes) {
                Ok(value) => value,
                Err(_) if !status.is_success() => {
                    return Err(ServiceFailure::new(status.to_string()));
                }
                Err(e) => {
                    return Err(ServiceFailure::new(format!("malformed service reply: {e}")));
                }
            }
        };

        if !status.is_success() {
            tracing::warn!(%status, "report service returned an error status");
            if value.as_object().is_some() {
                return Err(decode_failure(&bytes));
            }
            return Err(ServiceFailure::new(status.to_string()));
        }
        if carries_error(&value) {
            tracing::warn!("report service answered with an error member");
            return Err(decode_failure(&bytes));
        }
        Ok(Body { bytes, value })
    }
}

/// A reply body kept both as received and as a value tree (`Null` when empty).
struct Body {
    bytes: Vec<u8>,
    value: ParamValue,
}

fn carries_error(value: &ParamValue) -> bool {
    value.get("error").is_some_and(|e| !e.is_null())
}

fn decode_failure(bytes: &[u8]) -> ServiceFailure {
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        tracing::warn!("undecodable error reply: {e}");
        ServiceFailure::default()
    })
}

impl ReportService for HttpReportService {
    fn default_parameters(&self) -> Result<ParamValue, ServiceFailure> {
        let response = self.client.get(self.url(statics::ROUTE_DEFAULT_PARAMETERS)).send()?;
        let body = Self::json_body(response)?;
        if body.value.as_object().is_none() {
            return Err(ServiceFailure::new(format!(
                "default parameters are not an object (got {})",
                body.value.type_name()
            )));
        }
        Ok(body.value)
    }

    fn run(&self, document: &ParamValue, run_option: &str) -> Result<ServiceReply, ServiceFailure> {
        let body = serde_json::json!({
            "parameters": document,
            "run_opt": run_option,
        });
        let response = self.client.post(self.url(statics::ROUTE_RUN)).json(&body).send()?;
        Self::reply(response)
    }

    fn reload(&self) -> Result<ServiceReply, ServiceFailure> {
        let response = self.client.post(self.url(statics::ROUTE_RELOAD)).send()?;
        Self::reply(response)
    }

    fn read_parameters_file(&self, path: &Path) -> Result<ServiceReply, ServiceFailure> {
        let form = multipart::Form::new()
            .file("file", path)
            .map_err(|e| ServiceFailure::new(format!("reading {path:?}: {e}")))?;
        let response = self
            .client
            .post(self.url(statics::ROUTE_READ_PARAMETERS))
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()?;
        Self::reply(response)
    }

    fn write_parameters(&self, document: &ParamValue) -> Result<Vec<u8>, ServiceFailure> {
        let response = self
            .client
            .post(self.url(statics::ROUTE_WRITE_PARAMETERS))
            .json(document)
            .send()?;
        if !response.status().is_success() {
            return Err(Self::json_body(response)
                .err()
                .unwrap_or_else(|| ServiceFailure::new(statics::MSG_INTERNAL_ERROR)));
        }
        let bytes = response.bytes()?.to_vec();
        // The rendered file is not JSON; a JSON object carrying `error` is a refusal.
        if serde_json::from_slice::<ParamValue>(&bytes).is_ok_and(|v| carries_error(&v)) {
            return Err(decode_failure(&bytes));
        }
        Ok(bytes)
    }
}
