// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use scraped_app::{Button, Record};
use serde_json::{Value, json};
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// First reply of a typical lookup: structured fields plus one follow-up.
pub fn sample_record() -> Record {
    [("E-mail", "alice@x.com"), ("Source", "Leak1")]
        .into_iter()
        .collect()
}

pub fn sample_buttons() -> Vec<Button> {
    vec![Button::new("More", 7), Button::new("Télécharger", 7)]
}

/// What the bot adds after "More": a password hash and an empty field that
/// must not erase anything.
pub fn follow_up_record() -> Record {
    let mut record: Record = [
        ("Mot de passe crypté", "$2y$10$abcdefghijklmnopqrstuv"),
        ("Téléphone", "+33600000000"),
    ]
    .into_iter()
    .collect();
    record.insert("Source", Some(String::new()));
    record
}

pub fn raw_only_record() -> Record {
    let mut record = Record::new();
    record.insert("raw", Some("Aucun résultat structuré\nligne 2".to_owned()));
    record.insert("email", None);
    record.insert("phone", None);
    record
}

/// JSON body of a successful `/search` or `/click` response.
pub fn reply_body(record: &Record, buttons: &[Button]) -> String {
    let data: serde_json::Map<String, Value> = record
        .iter()
        .map(|(key, value)| {
            let value = value.map_or(Value::Null, |value| Value::String(value.to_owned()));
            (key.to_owned(), value)
        })
        .collect();
    let buttons: Vec<Value> = buttons
        .iter()
        .map(|button| {
            let mut value = json!({ "text": button.label, "msg_id": button.message_id.get() });
            if let Some(url) = &button.url {
                value["url"] = Value::String(url.clone());
            }
            value
        })
        .collect();
    json!({ "status": "success", "data": data, "buttons": buttons }).to_string()
}

pub fn detail_body(detail: &str) -> String {
    json!({ "detail": detail }).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedResponse {
    pub status: u16,
    pub body: String,
}

impl ScriptedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).with_context(|| format!("decode body of {}", self.path))
    }
}

/// Local HTTP server answering with `script` in order, one response per
/// request, then shutting down.
pub struct MockBackend {
    base_url: String,
    handle: JoinHandle<Result<Vec<RecordedRequest>>>,
}

impl MockBackend {
    pub fn start(script: Vec<ScriptedResponse>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());

        let handle = thread::spawn(move || {
            let mut seen = Vec::with_capacity(script.len());
            for scripted in script {
                let mut request = server
                    .recv_timeout(RECV_TIMEOUT)
                    .context("receive mock request")?
                    .ok_or_else(|| anyhow!("mock backend timed out waiting for a request"))?;

                let mut body = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut body)
                    .context("read mock request body")?;
                seen.push(RecordedRequest {
                    method: request.method().to_string(),
                    path: request.url().to_owned(),
                    body,
                });

                let header = Header::from_bytes("Content-Type", "application/json")
                    .map_err(|()| anyhow!("build content type header"))?;
                let response = Response::from_string(scripted.body)
                    .with_status_code(scripted.status)
                    .with_header(header);
                request.respond(response).context("send mock response")?;
            }
            Ok(seen)
        });

        Ok(Self { base_url, handle })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for the script to drain and returns every request received.
    pub fn finish(self) -> Result<Vec<RecordedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock backend thread panicked"))?
    }
}
