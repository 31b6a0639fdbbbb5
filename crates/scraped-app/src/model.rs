// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::MessageId;
use crate::record::Record;

/// Labels that turn a bot button into a local export, matched as
/// case-insensitive substrings.
pub const EXPORT_TRIGGERS: [&str; 2] = ["télécharger", "download"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    #[serde(rename = "text")]
    pub label: String,
    #[serde(rename = "msg_id")]
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Button {
    pub fn new(label: impl Into<String>, message_id: impl Into<MessageId>) -> Self {
        Self {
            label: label.into(),
            message_id: message_id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Record and button set delivered together by one server response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub record: Record,
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Search,
    Activate,
}

impl RequestKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Activate => "activate",
        }
    }
}

/// A network operation the runtime must perform on behalf of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Search {
        query: String,
    },
    Activate {
        message_id: MessageId,
        label: String,
    },
}

impl Request {
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Search { .. } => RequestKind::Search,
            Self::Activate { .. } => RequestKind::Activate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonRoute {
    Export,
    External(String),
    Remote,
}

/// Classifies a button without side effects. Rules are checked in order:
/// export trigger label, then direct URL, then remote activation.
pub fn route_button(button: &Button) -> ButtonRoute {
    let label = button.label.to_lowercase();
    if EXPORT_TRIGGERS.iter().any(|word| label.contains(word)) {
        return ButtonRoute::Export;
    }

    if let Some(url) = button.url.as_deref()
        && !url.is_empty()
    {
        return ButtonRoute::External(url.to_owned());
    }

    ButtonRoute::Remote
}
