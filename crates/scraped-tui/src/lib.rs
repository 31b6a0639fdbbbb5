// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod export;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use scraped_app::{
    Button, MessageId, Phase, Record, Reply, Request, RequestKind, Session, SessionCommand,
    SessionEvent, is_raw_only, visible_fields,
};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub use export::{EXPORT_MIME, export_document, export_file_name};

const APP_TITLE: &str = "Scraped Cloud";
const SUBTITLE: &str = "L'intelligence en temps réel pour la sécurité de vos données.";
const INPUT_PLACEHOLDER: &str = "Entrez un email, un nom ou un pseudo...";
const SUBMIT_LABEL: &str = "Analyser";
const BUSY_LABEL: &str = "...";
const LOADING_TEXT: &str = "Cherchons les données...";
const RAW_PANEL_TITLE: &str = "Log Brut";
const CARD_WIDTH: u16 = 34;
const CARD_HEIGHT: u16 = 4;
const MAX_CARD_COLUMNS: u16 = 3;
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

/// Side effects the UI needs from its host: the two remote operations, the
/// export sink, and the external link opener.
pub trait AppRuntime {
    fn search(&mut self, query: &str) -> Result<Reply>;
    fn activate(&mut self, message_id: MessageId, label: &str) -> Result<Reply>;
    fn save_export(&mut self, file_name: &str, contents: &str) -> Result<PathBuf>;
    fn open_url(&mut self, url: &str) -> Result<()>;

    /// Runs `request` and reports its outcome on `tx`. The default runs it
    /// inline; hosts with a real network override this to use a worker.
    fn spawn_request(&mut self, request: Request, tx: Sender<InternalEvent>) -> Result<()> {
        let kind = request.kind();
        let result = match &request {
            Request::Search { query } => self.search(query),
            Request::Activate { message_id, label } => self.activate(*message_id, label),
        };
        tx.send(InternalEvent::RequestFinished {
            kind,
            result: result.map_err(|error| error.to_string()),
        })
        .map_err(|_| anyhow::anyhow!("request event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    RequestFinished {
        kind: RequestKind,
        result: Result<Reply, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Focus {
    #[default]
    Input,
    Buttons,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    query: String,
    focus: Focus,
    selected_button: usize,
    help_visible: bool,
    status_token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldAccent {
    Secret,
    Source,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldCard {
    label: String,
    value: String,
    accent: FieldAccent,
}

pub fn run_app<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    initial_query: Option<String>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Some(query) = initial_query {
        view_data.query = query;
        submit_query(session, runtime, &mut view_data, &internal_tx);
    }

    let mut result = Ok(());
    loop {
        process_internal_events(session, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, session, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(session, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                session.dispatch(SessionCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::RequestFinished { kind, result } => {
                let command = match kind {
                    RequestKind::Search => SessionCommand::SearchCompleted(result),
                    RequestKind::Activate => SessionCommand::ActivateCompleted(result),
                };
                let events = session.dispatch(command);
                apply_session_events(session, runtime, view_data, tx, events);
            }
        }
    }
}

/// Carries out what the session asked for. Any failure to even start a
/// request is fed back as a failed completion so `Loading` always resolves.
fn apply_session_events<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    events: Vec<SessionEvent>,
) {
    for event in events {
        match event {
            SessionEvent::PhaseChanged(phase) => match &phase {
                Phase::Error(message) => warn!(error = %message, "request failed"),
                phase => info!(?phase, "phase changed"),
            },
            SessionEvent::RequestStarted(request) => {
                let kind = request.kind();
                info!(kind = kind.label(), "request started");
                if let Err(error) = runtime.spawn_request(request, tx.clone()) {
                    let command = match kind {
                        RequestKind::Search => SessionCommand::SearchCompleted(Err(error.to_string())),
                        RequestKind::Activate => {
                            SessionCommand::ActivateCompleted(Err(error.to_string()))
                        }
                    };
                    let follow_up = session.dispatch(command);
                    apply_session_events(session, runtime, view_data, tx, follow_up);
                }
            }
            SessionEvent::ExportRequested(record) => {
                export_record(session, runtime, view_data, tx, &record);
            }
            SessionEvent::OpenUrl(url) => match runtime.open_url(&url) {
                Ok(()) => emit_status(session, view_data, tx, format!("ouvert: {url}")),
                Err(error) => {
                    warn!(%url, error = %error, "open url failed");
                    emit_status(session, view_data, tx, format!("ouverture impossible: {error}"));
                }
            },
            SessionEvent::ButtonsReplaced(count) => {
                if count == 0 {
                    view_data.focus = Focus::Input;
                    view_data.selected_button = 0;
                } else {
                    view_data.selected_button = view_data.selected_button.min(count - 1);
                }
            }
            SessionEvent::RecordMerged { changed } => {
                let message = match changed.len() {
                    0 => "aucun nouveau champ".to_owned(),
                    1 => "1 champ mis à jour".to_owned(),
                    count => format!("{count} champs mis à jour"),
                };
                emit_status(session, view_data, tx, message);
            }
            SessionEvent::RecordReplaced { fields } => {
                view_data.selected_button = 0;
                let message = match fields {
                    0 if session.record().is_some_and(is_raw_only) => {
                        "résultat brut uniquement".to_owned()
                    }
                    0 => "aucun champ trouvé".to_owned(),
                    1 => "1 champ trouvé".to_owned(),
                    count => format!("{count} champs trouvés"),
                };
                emit_status(session, view_data, tx, message);
            }
        }
    }
}

fn export_record<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    record: &Record,
) {
    let file_name = export_file_name(record);
    let contents = export_document(record);
    match runtime.save_export(&file_name, &contents) {
        Ok(path) => {
            info!(path = %path.display(), mime = EXPORT_MIME, "export written");
            emit_status(session, view_data, tx, format!("exporté: {}", path.display()));
        }
        Err(error) => {
            warn!(error = %error, "export failed");
            emit_status(session, view_data, tx, format!("export impossible: {error:#}"));
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    session: &mut Session,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    session.dispatch(SessionCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn submit_query<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let events = session.dispatch(SessionCommand::SubmitQuery(view_data.query.clone()));
    apply_session_events(session, runtime, view_data, tx, events);
}

fn press_selected_button<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let Some(button) = session.buttons().get(view_data.selected_button).cloned() else {
        return;
    };
    let events = session.dispatch(SessionCommand::PressButton(button));
    apply_session_events(session, runtime, view_data, tx, events);
}

fn handle_key_event<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') => return true,
            KeyCode::Char('s') => {
                match session.record().cloned() {
                    Some(record) => {
                        export_record(session, runtime, view_data, internal_tx, &record);
                    }
                    None => emit_status(session, view_data, internal_tx, "rien à exporter"),
                }
                return false;
            }
            _ => return false,
        }
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::F(1)) {
            view_data.help_visible = false;
        }
        return false;
    }

    match key.code {
        KeyCode::F(1) => {
            view_data.help_visible = true;
            return false;
        }
        KeyCode::Esc => {
            if session.error().is_some() {
                session.dispatch(SessionCommand::DismissError);
            } else {
                view_data.focus = Focus::Input;
            }
            return false;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            view_data.focus = match view_data.focus {
                Focus::Input if !session.buttons().is_empty() => Focus::Buttons,
                _ => Focus::Input,
            };
            return false;
        }
        _ => {}
    }

    match view_data.focus {
        Focus::Input => handle_input_key(session, runtime, view_data, internal_tx, key),
        Focus::Buttons => handle_button_row_key(session, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_input_key<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if session.is_loading() {
        return;
    }
    match key.code {
        KeyCode::Enter => submit_query(session, runtime, view_data, internal_tx),
        KeyCode::Backspace => {
            view_data.query.pop();
        }
        KeyCode::Char(ch) => view_data.query.push(ch),
        _ => {}
    }
}

fn handle_button_row_key<R: AppRuntime>(
    session: &mut Session,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let count = session.buttons().len();
    if count == 0 {
        view_data.focus = Focus::Input;
        return;
    }
    match key.code {
        KeyCode::Left | KeyCode::Char('h') => {
            view_data.selected_button = (view_data.selected_button + count - 1) % count;
        }
        KeyCode::Right | KeyCode::Char('l') => {
            view_data.selected_button = (view_data.selected_button + 1) % count;
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            press_selected_button(session, runtime, view_data, internal_tx);
        }
        _ => {}
    }
}

fn field_accent(key: &str) -> FieldAccent {
    if key.to_lowercase().contains("pass") {
        FieldAccent::Secret
    } else if key == "Source" {
        FieldAccent::Source
    } else {
        FieldAccent::Plain
    }
}

fn accent_style(accent: FieldAccent) -> Style {
    match accent {
        FieldAccent::Secret => Style::default()
            .fg(Color::LightRed)
            .add_modifier(Modifier::BOLD),
        FieldAccent::Source => Style::default().fg(Color::Cyan),
        FieldAccent::Plain => Style::default().fg(Color::White),
    }
}

fn field_cards(record: &Record) -> Vec<FieldCard> {
    visible_fields(record)
        .into_iter()
        .map(|(key, value)| FieldCard {
            label: key.to_owned(),
            value: value.to_owned(),
            accent: field_accent(key),
        })
        .collect()
}

fn submit_hint(session: &Session) -> &'static str {
    if session.is_loading() {
        BUSY_LABEL
    } else {
        SUBMIT_LABEL
    }
}

fn render(frame: &mut ratatui::Frame<'_>, session: &Session, view_data: &ViewData) {
    let mut constraints = vec![Constraint::Length(3), Constraint::Length(3)];
    let show_notice = session.is_loading() || session.error().is_some();
    if show_notice {
        constraints.push(Constraint::Length(3));
    }
    let show_buttons = !session.buttons().is_empty();
    if show_buttons {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(1));
    constraints.push(Constraint::Length(2));

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());
    let mut slot = 0;
    let mut next_area = || {
        let area = layout[slot];
        slot += 1;
        area
    };

    let header = Paragraph::new(SUBTITLE)
        .style(Style::default().fg(Color::Gray))
        .block(
            Block::default()
                .title(Span::styled(
                    APP_TITLE,
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        );
    frame.render_widget(header, next_area());

    frame.render_widget(render_input(session, view_data), next_area());

    if show_notice {
        let notice = match session.phase() {
            Phase::Error(message) => Paragraph::new(message.as_str())
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title("erreur"))
                .wrap(Wrap { trim: true }),
            _ => Paragraph::new(LOADING_TEXT)
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL)),
        };
        frame.render_widget(notice, next_area());
    }

    if show_buttons {
        frame.render_widget(render_button_row(session, view_data), next_area());
    }

    render_body(frame, next_area(), session);

    let status = Paragraph::new(status_text(session, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, next_area());

    if view_data.help_visible {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("aide").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_input<'a>(session: &Session, view_data: &'a ViewData) -> Paragraph<'a> {
    let loading = session.is_loading();
    let focused = view_data.focus == Focus::Input;
    let text = if view_data.query.is_empty() {
        Span::styled(INPUT_PLACEHOLDER, Style::default().fg(Color::DarkGray))
    } else {
        let style = if loading {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        };
        Span::styled(view_data.query.as_str(), style)
    };
    let mut spans = vec![text];
    if focused && !loading {
        spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
    }

    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title("recherche")
            .title_bottom(Line::from(format!("[Entrée] {}", submit_hint(session))).right_aligned()),
    )
}

fn render_button_row<'a>(session: &'a Session, view_data: &ViewData) -> Paragraph<'a> {
    let loading = session.is_loading();
    let mut spans = Vec::with_capacity(session.buttons().len() * 2);
    for (index, button) in session.buttons().iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            format!("[ {} ]", button.label),
            button_style(button, index, view_data, loading),
        ));
    }
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("actions")
            .border_style(if view_data.focus == Focus::Buttons {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            }),
    )
}

fn button_style(button: &Button, index: usize, view_data: &ViewData, loading: bool) -> Style {
    let base = if loading && scraped_app::route_button(button) == scraped_app::ButtonRoute::Remote {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };
    if view_data.focus == Focus::Buttons && index == view_data.selected_button {
        base.fg(Color::Black).bg(Color::Cyan)
    } else {
        base
    }
}

fn render_body(frame: &mut ratatui::Frame<'_>, area: Rect, session: &Session) {
    let Some(record) = session.record() else {
        return;
    };

    if is_raw_only(record) {
        let raw = Paragraph::new(record.raw().unwrap_or_default())
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(RAW_PANEL_TITLE));
        frame.render_widget(raw, area);
        return;
    }

    let cards = field_cards(record);
    for (card, card_area) in cards.iter().zip(card_areas(area, cards.len())) {
        let value = Paragraph::new(card.value.as_str())
            .style(accent_style(card.accent))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(
                        card.label.as_str(),
                        Style::default().fg(Color::Gray),
                    )),
            );
        frame.render_widget(value, card_area);
    }
}

/// Lays `count` cards out left-to-right, top-to-bottom, dropping whatever
/// does not fit vertically.
fn card_areas(area: Rect, count: usize) -> Vec<Rect> {
    if area.width == 0 || area.height < CARD_HEIGHT {
        return Vec::new();
    }
    let columns = (area.width / CARD_WIDTH).clamp(1, MAX_CARD_COLUMNS);
    let card_width = area.width / columns;
    let rows_that_fit = area.height / CARD_HEIGHT;

    (0..count)
        .map_while(|index| {
            let index = u16::try_from(index).ok()?;
            let row = index / columns;
            let column = index % columns;
            (row < rows_that_fit).then(|| Rect {
                x: area.x + column * card_width,
                y: area.y + row * CARD_HEIGHT,
                width: card_width,
                height: CARD_HEIGHT,
            })
        })
        .collect()
}

fn status_text(session: &Session, view_data: &ViewData) -> String {
    if let Some(status) = &session.status_line {
        return status.clone();
    }
    let focus = match view_data.focus {
        Focus::Input => "saisie",
        Focus::Buttons => "actions",
    };
    let fields = session
        .record()
        .map(|record| visible_fields(record).len())
        .unwrap_or(0);
    format!("{focus} | {fields} champ(s) | F1 aide | ctrl+s exporter | ctrl+q quitter")
}

fn help_overlay_text() -> &'static str {
    "Entrée     lancer la recherche / activer le bouton\n\
     Tab        basculer saisie / actions\n\
     ← →        choisir une action\n\
     Échap      fermer l'erreur\n\
     Ctrl+S     exporter les champs visibles\n\
     Ctrl+Q     quitter\n\
     F1         fermer cette aide"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
