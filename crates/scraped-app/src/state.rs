// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    Button, ButtonRoute, Record, Reply, Request, RequestKind, changed_keys, merge, visible_fields,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading(RequestKind),
    Success,
    Error(String),
}

impl Phase {
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }
}

/// Owns the current record, the offered buttons and the request lifecycle.
/// Network effects are never performed here: `dispatch` returns
/// `SessionEvent::RequestStarted` and expects a matching completion later.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    phase: Phase,
    record: Option<Record>,
    buttons: Vec<Button>,
    pub status_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SubmitQuery(String),
    PressButton(Button),
    SearchCompleted(Result<Reply, String>),
    ActivateCompleted(Result<Reply, String>),
    DismissError,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    RecordReplaced { fields: usize },
    RecordMerged { changed: Vec<String> },
    ButtonsReplaced(usize),
    RequestStarted(Request),
    ExportRequested(Record),
    OpenUrl(String),
}

impl Session {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn dispatch(&mut self, command: SessionCommand) -> Vec<SessionEvent> {
        match command {
            SessionCommand::SubmitQuery(query) => self.submit_query(query),
            SessionCommand::PressButton(button) => self.press_button(button),
            SessionCommand::SearchCompleted(result) => self.complete_search(result),
            SessionCommand::ActivateCompleted(result) => self.complete_activate(result),
            SessionCommand::DismissError => {
                if self.error().is_none() {
                    return Vec::new();
                }
                let next = if self.record.is_some() {
                    Phase::Success
                } else {
                    Phase::Idle
                };
                vec![self.set_phase(next)]
            }
            SessionCommand::SetStatus(message) => {
                self.status_line = Some(message);
                Vec::new()
            }
            SessionCommand::ClearStatus => {
                self.status_line = None;
                Vec::new()
            }
        }
    }

    fn submit_query(&mut self, query: String) -> Vec<SessionEvent> {
        if query.trim().is_empty() || self.is_loading() {
            return Vec::new();
        }

        self.record = None;
        self.buttons.clear();
        vec![
            self.set_phase(Phase::Loading(RequestKind::Search)),
            SessionEvent::ButtonsReplaced(0),
            SessionEvent::RequestStarted(Request::Search { query }),
        ]
    }

    fn press_button(&mut self, button: Button) -> Vec<SessionEvent> {
        match crate::route_button(&button) {
            ButtonRoute::Export => match &self.record {
                Some(record) => vec![SessionEvent::ExportRequested(record.clone())],
                None => Vec::new(),
            },
            ButtonRoute::External(url) => vec![SessionEvent::OpenUrl(url)],
            ButtonRoute::Remote => {
                if self.is_loading() {
                    return Vec::new();
                }
                vec![
                    self.set_phase(Phase::Loading(RequestKind::Activate)),
                    SessionEvent::RequestStarted(Request::Activate {
                        message_id: button.message_id,
                        label: button.label,
                    }),
                ]
            }
        }
    }

    fn complete_search(&mut self, result: Result<Reply, String>) -> Vec<SessionEvent> {
        if self.phase != Phase::Loading(RequestKind::Search) {
            return Vec::new();
        }

        match result {
            Ok(reply) => {
                let fields = visible_fields(&reply.record).len();
                self.record = Some(reply.record);
                self.buttons = reply.buttons;
                vec![
                    SessionEvent::RecordReplaced { fields },
                    SessionEvent::ButtonsReplaced(self.buttons.len()),
                    self.set_phase(Phase::Success),
                ]
            }
            Err(message) => vec![self.set_phase(Phase::Error(message))],
        }
    }

    fn complete_activate(&mut self, result: Result<Reply, String>) -> Vec<SessionEvent> {
        if self.phase != Phase::Loading(RequestKind::Activate) {
            return Vec::new();
        }

        match result {
            Ok(reply) => {
                let base = self.record.take().unwrap_or_default();
                let changed = changed_keys(&base, &reply.record);
                self.record = Some(merge(&base, &reply.record));
                self.buttons = reply.buttons;
                vec![
                    SessionEvent::RecordMerged { changed },
                    SessionEvent::ButtonsReplaced(self.buttons.len()),
                    self.set_phase(Phase::Success),
                ]
            }
            Err(message) => vec![self.set_phase(Phase::Error(message))],
        }
    }

    fn set_phase(&mut self, phase: Phase) -> SessionEvent {
        self.phase = phase.clone();
        SessionEvent::PhaseChanged(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, Session, SessionCommand, SessionEvent};
    use crate::{Button, MessageId, Record, Reply, Request, RequestKind};

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn loaded_session(pairs: &[(&str, &str)], buttons: Vec<Button>) -> Session {
        let mut session = Session::default();
        session.dispatch(SessionCommand::SubmitQuery("alice@x.com".to_owned()));
        session.dispatch(SessionCommand::SearchCompleted(Ok(Reply {
            record: record(pairs),
            buttons,
        })));
        session
    }

    #[test]
    fn blank_queries_are_ignored() {
        let mut session = Session::default();
        assert!(session.dispatch(SessionCommand::SubmitQuery(String::new())).is_empty());
        assert!(session.dispatch(SessionCommand::SubmitQuery("   ".to_owned())).is_empty());
        assert_eq!(session.phase(), &Phase::Idle);
    }

    #[test]
    fn submit_enters_loading_and_requests_search() {
        let mut session = Session::default();
        let events = session.dispatch(SessionCommand::SubmitQuery("alice@x.com".to_owned()));
        assert_eq!(session.phase(), &Phase::Loading(RequestKind::Search));
        assert_eq!(
            events.last(),
            Some(&SessionEvent::RequestStarted(Request::Search {
                query: "alice@x.com".to_owned()
            }))
        );
    }

    #[test]
    fn submit_while_loading_is_a_no_op() {
        let mut session = Session::default();
        session.dispatch(SessionCommand::SubmitQuery("first".to_owned()));
        let events = session.dispatch(SessionCommand::SubmitQuery("second".to_owned()));
        assert!(events.is_empty());
        assert_eq!(session.phase(), &Phase::Loading(RequestKind::Search));
    }

    #[test]
    fn search_success_stores_record_and_buttons() {
        let session = loaded_session(
            &[("E-mail", "alice@x.com"), ("Source", "Leak1")],
            vec![Button::new("More", 7)],
        );
        assert_eq!(session.phase(), &Phase::Success);
        assert_eq!(session.record().and_then(|r| r.get("Source")), Some("Leak1"));
        assert_eq!(session.buttons(), &[Button::new("More", 7)]);
    }

    #[test]
    fn search_success_reports_visible_field_count() {
        let mut session = Session::default();
        session.dispatch(SessionCommand::SubmitQuery("alice".to_owned()));
        let events = session.dispatch(SessionCommand::SearchCompleted(Ok(Reply {
            record: record(&[("raw", "blob"), ("Nom", "Doe"), ("Ville", ""), ("email", "a@x.com")]),
            buttons: Vec::new(),
        })));
        assert_eq!(
            events,
            vec![
                SessionEvent::RecordReplaced { fields: 2 },
                SessionEvent::ButtonsReplaced(0),
                SessionEvent::PhaseChanged(Phase::Success),
            ]
        );
    }

    #[test]
    fn new_search_clears_previous_record_and_buttons() {
        let mut session = loaded_session(&[("Nom", "Doe")], vec![Button::new("More", 7)]);
        session.dispatch(SessionCommand::SubmitQuery("bob".to_owned()));
        assert!(session.record().is_none());
        assert!(session.buttons().is_empty());

        session.dispatch(SessionCommand::SearchCompleted(Ok(Reply {
            record: record(&[("Prénom", "Bob")]),
            buttons: Vec::new(),
        })));
        let current = session.record().expect("record after search");
        assert_eq!(current.get("Nom"), None);
        assert_eq!(current.get("Prénom"), Some("Bob"));
    }

    #[test]
    fn search_failure_sets_error_without_record() {
        let mut session = Session::default();
        session.dispatch(SessionCommand::SubmitQuery("q".to_owned()));
        session.dispatch(SessionCommand::SearchCompleted(Err("Timeout".to_owned())));
        assert_eq!(session.phase(), &Phase::Error("Timeout".to_owned()));
        assert_eq!(session.error(), Some("Timeout"));
        assert!(session.record().is_none());
    }

    #[test]
    fn remote_button_starts_activation() {
        let mut session = loaded_session(&[("Nom", "Doe")], vec![Button::new("More", 7)]);
        let events = session.dispatch(SessionCommand::PressButton(Button::new("More", 7)));
        assert_eq!(session.phase(), &Phase::Loading(RequestKind::Activate));
        assert_eq!(
            events.last(),
            Some(&SessionEvent::RequestStarted(Request::Activate {
                message_id: MessageId::new(7),
                label: "More".to_owned(),
            }))
        );
    }

    #[test]
    fn activation_merges_and_replaces_buttons() {
        let mut session = loaded_session(
            &[("Source", "Leak1"), ("E-mail", "alice@x.com")],
            vec![Button::new("More", 7)],
        );
        session.dispatch(SessionCommand::PressButton(Button::new("More", 7)));
        let events = session.dispatch(SessionCommand::ActivateCompleted(Ok(Reply {
            record: record(&[("Téléphone", "0600"), ("Source", "")]),
            buttons: Vec::new(),
        })));

        assert_eq!(session.phase(), &Phase::Success);
        let merged = session.record().expect("merged record");
        assert_eq!(merged.get("Source"), Some("Leak1"));
        assert_eq!(merged.get("Téléphone"), Some("0600"));
        assert!(session.buttons().is_empty());
        assert!(events.contains(&SessionEvent::RecordMerged {
            changed: vec!["Téléphone".to_owned()]
        }));
    }

    #[test]
    fn activation_without_prior_record_creates_one() {
        let mut session = Session::default();
        session.dispatch(SessionCommand::PressButton(Button::new("Start", 1)));
        session.dispatch(SessionCommand::ActivateCompleted(Ok(Reply {
            record: record(&[("Nom", "Doe")]),
            buttons: Vec::new(),
        })));
        assert_eq!(session.record().and_then(|r| r.get("Nom")), Some("Doe"));
    }

    #[test]
    fn activation_failure_preserves_record_and_buttons() {
        let mut session = loaded_session(&[("Nom", "Doe")], vec![Button::new("More", 7)]);
        let before = session.record().cloned();
        session.dispatch(SessionCommand::PressButton(Button::new("More", 7)));
        session.dispatch(SessionCommand::ActivateCompleted(Err("timeout".to_owned())));

        assert_eq!(session.phase(), &Phase::Error("timeout".to_owned()));
        assert_eq!(session.record().cloned(), before);
        assert_eq!(session.buttons(), &[Button::new("More", 7)]);
    }

    #[test]
    fn export_button_never_requests_network() {
        let mut session = loaded_session(&[("Nom", "Doe")], vec![Button::new("Télécharger", 7)]);
        let events = session.dispatch(SessionCommand::PressButton(Button::new("Télécharger", 7)));
        assert_eq!(events, vec![SessionEvent::ExportRequested(record(&[("Nom", "Doe")]))]);
        assert_eq!(session.phase(), &Phase::Success);
    }

    #[test]
    fn export_without_record_is_a_no_op() {
        let mut session = Session::default();
        let events = session.dispatch(SessionCommand::PressButton(Button::new("download", 7)));
        assert!(events.is_empty());
    }

    #[test]
    fn url_button_opens_without_state_change() {
        let mut session = loaded_session(&[("Nom", "Doe")], Vec::new());
        let events = session.dispatch(SessionCommand::PressButton(
            Button::new("Site", 2).with_url("https://example.com"),
        ));
        assert_eq!(events, vec![SessionEvent::OpenUrl("https://example.com".to_owned())]);
        assert_eq!(session.phase(), &Phase::Success);
    }

    #[test]
    fn remote_press_while_loading_is_a_no_op() {
        let mut session = Session::default();
        session.dispatch(SessionCommand::SubmitQuery("q".to_owned()));
        let events = session.dispatch(SessionCommand::PressButton(Button::new("More", 7)));
        assert!(events.is_empty());
        assert_eq!(session.phase(), &Phase::Loading(RequestKind::Search));
    }

    #[test]
    fn stale_completions_are_ignored() {
        let mut session = loaded_session(&[("Nom", "Doe")], Vec::new());
        let events = session.dispatch(SessionCommand::ActivateCompleted(Ok(Reply {
            record: record(&[("Nom", "Other")]),
            buttons: Vec::new(),
        })));
        assert!(events.is_empty());
        assert_eq!(session.record().and_then(|r| r.get("Nom")), Some("Doe"));
    }

    #[test]
    fn error_can_be_retried_and_dismissed() {
        let mut session = Session::default();
        session.dispatch(SessionCommand::SubmitQuery("q".to_owned()));
        session.dispatch(SessionCommand::SearchCompleted(Err("boom".to_owned())));

        session.dispatch(SessionCommand::DismissError);
        assert_eq!(session.phase(), &Phase::Idle);

        session.dispatch(SessionCommand::SubmitQuery("q".to_owned()));
        assert!(session.is_loading());
    }

    #[test]
    fn status_set_and_clear() {
        let mut session = Session::default();
        let events = session.dispatch(SessionCommand::SetStatus("export ok".to_owned()));
        assert_eq!(session.status_line.as_deref(), Some("export ok"));
        assert!(events.is_empty());

        session.dispatch(SessionCommand::ClearStatus);
        assert_eq!(session.status_line, None);
    }
}
