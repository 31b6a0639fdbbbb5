// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use scraped_app::{Button, MessageId, Record, Reply};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const SEARCH_FALLBACK: &str = "Une erreur est survenue.";
pub const ACTIVATE_FALLBACK: &str = "Erreur lors du clic.";
pub const HEALTH_FALLBACK: &str = "Service indisponible.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Non-success status or transport failure. The message is meant for the
    /// user as-is.
    #[error("{0}")]
    RequestFailed(String),

    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl GatewayError {
    pub fn message(&self) -> String {
        match self {
            Self::RequestFailed(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        validate_base_url(&base_url)?;

        let mut builder = HttpClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|error| GatewayError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: format!("build HTTP client: {error}"),
        })?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn search(&self, query: &str) -> Result<Reply> {
        debug!(query_len = query.len(), "search request");
        self.post_reply("/search", &SearchRequest { query }, SEARCH_FALLBACK)
    }

    pub fn activate(&self, message_id: MessageId, label: &str) -> Result<Reply> {
        debug!(message_id = message_id.get(), label, "click request");
        self.post_reply(
            "/click",
            &ClickRequest {
                message_id: message_id.get(),
                button_text: label,
            },
            ACTIVATE_FALLBACK,
        )
    }

    pub fn health(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .map_err(|error| transport_error(error, HEALTH_FALLBACK))?;

        let response = ensure_success(response, HEALTH_FALLBACK)?;
        let parsed: HealthResponse = response
            .json()
            .map_err(|error| transport_error(error, HEALTH_FALLBACK))?;
        if parsed.status != "ok" {
            return Err(GatewayError::RequestFailed(format!(
                "unexpected health status {:?}",
                parsed.status
            )));
        }
        Ok(())
    }

    fn post_reply<B: Serialize>(&self, path: &str, body: &B, fallback: &str) -> Result<Reply> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .map_err(|error| transport_error(error, fallback))?;

        let response = ensure_success(response, fallback)?;
        let parsed: WireReply = response
            .json()
            .map_err(|error| transport_error(error, fallback))?;
        Ok(parsed.into_reply())
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let invalid = |reason: String| GatewayError::InvalidBaseUrl {
        url: base_url.to_owned(),
        reason,
    };

    if base_url.is_empty() {
        return Err(invalid("must not be empty".to_owned()));
    }
    let parsed = Url::parse(base_url).map_err(|error| invalid(error.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "scheme {:?} not supported; use http or https",
            parsed.scheme()
        )));
    }
    Ok(())
}

fn ensure_success(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(clean_error_response(status, &body, fallback))
}

fn clean_error_response(status: StatusCode, body: &str, fallback: &str) -> GatewayError {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|parsed| {
        parsed
            .get("detail")
            .and_then(Value::as_str)
            .filter(|detail| !detail.is_empty())
            .map(str::to_owned)
    });
    warn!(status = status.as_u16(), detail = detail.as_deref(), "request rejected");
    GatewayError::RequestFailed(detail.unwrap_or_else(|| fallback.to_owned()))
}

fn transport_error(error: reqwest::Error, fallback: &str) -> GatewayError {
    let message = error.to_string();
    warn!(error = %message, "request failed in transport");
    if message.is_empty() {
        GatewayError::RequestFailed(fallback.to_owned())
    } else {
        GatewayError::RequestFailed(message)
    }
}

/// Flattens one wire value into the record's string domain. Unmatched fields
/// arrive as `null` and stay absent.
fn field_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Serialize)]
struct ClickRequest<'a> {
    message_id: i64,
    button_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    data: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    buttons: Option<Vec<Button>>,
}

impl WireReply {
    fn into_reply(self) -> Reply {
        let mut record = Record::new();
        for (key, value) in self.data.unwrap_or_default() {
            record.insert(key, field_value(value));
        }
        Reply {
            record,
            buttons: self.buttons.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}
