// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ereg_app::{
    Account, AccountDraft, AccountField, AccountGrid, AccountId, AppCommand, AppEvent, AppMode,
    AppState, FetchOutcome, FetchQuery, FetchTicket, FieldKind, FieldValue, SortDirection,
    today_local,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::Date;
use tracing::{debug, info, warn};

const APP_TITLE: &str = "E-Reg Account Tracker";
const SORT_MARK_ASC: &str = "↓";
const SORT_MARK_DESC: &str = "↑";
const SORT_MARK_NONE: &str = "↕";
const FILTER_MARK_ACTIVE: &str = "▼";
const FILTER_MARK_AVAILABLE: &str = "▽";
const UNSAVED_MARK: &str = "*";

/// Side effects the UI needs from the outside world.
pub trait AppRuntime {
    fn fetch_accounts(&mut self, query: &FetchQuery) -> Result<Vec<Account>>;
    fn create_account(&mut self, draft: &AccountDraft) -> Result<()>;
    fn update_account(&mut self, id: AccountId, draft: &AccountDraft) -> Result<()>;
    fn delete_account(&mut self, id: AccountId) -> Result<()>;

    fn today(&mut self) -> Date {
        today_local()
    }

    /// Runs the fetch and reports back over `tx`. Implementations may do
    /// the work on another thread; results are matched by request id.
    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .fetch_accounts(&ticket.query)
            .map_err(|error| error.to_string());
        tx.send(InternalEvent::Fetched {
            request_id: ticket.request_id,
            result,
        })
        .map_err(|_| anyhow!("fetch event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Fetched {
        request_id: u64,
        result: Result<Vec<Account>, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    selected_row: usize,
    selected_col: usize,
    form_field: usize,
    help_visible: bool,
    loading: bool,
    status_token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellEdit {
    Push(char),
    Pop,
    Clear,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    start_fetch(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Fetched { request_id, result } => {
                handle_fetch_result(state, view_data, request_id, result);
            }
        }
    }
}

fn handle_fetch_result(
    state: &mut AppState,
    view_data: &mut ViewData,
    request_id: u64,
    result: Result<Vec<Account>, String>,
) {
    match state.grid.apply_fetch(request_id, result) {
        FetchOutcome::Applied { rows } => {
            view_data.loading = false;
            view_data.selected_row = view_data.selected_row.min(rows.saturating_sub(1));
            if rows == 0 && state.mode == AppMode::Edit {
                state.dispatch(AppCommand::ExitToNav);
            }
            debug!(request_id, rows, "account list applied");
        }
        FetchOutcome::Stale => {
            debug!(
                request_id,
                latest = state.grid.last_issued(),
                "stale account list discarded"
            );
        }
        FetchOutcome::Failed(message) => {
            view_data.loading = false;
            warn!(request_id, error = %message, "account list fetch failed");
            show_error(state, format!("load failed: {message}"));
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Errors stay on screen until dismissed.
fn show_error(state: &mut AppState, message: impl Into<String>) {
    state.dispatch(AppCommand::ShowError(message.into()));
}

fn start_fetch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let ticket = state.grid.begin_fetch();
    view_data.loading = true;
    debug!(
        request_id = ticket.request_id,
        sort = %ticket.query.sort_segment(),
        filter = ticket.query.filter_param(),
        "fetch accounts"
    );
    if let Err(error) = runtime.spawn_fetch(ticket, internal_tx.clone()) {
        view_data.loading = false;
        warn!(error = %error, "could not start account fetch");
        show_error(state, format!("load failed: {error}"));
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
            emit_status(state, view_data, internal_tx, "help hidden");
        }
        return false;
    }

    if state.error_banner.is_some() {
        let dismiss = match key.code {
            KeyCode::Esc => true,
            KeyCode::Char('x') => state.mode == AppMode::Nav,
            _ => false,
        };
        if dismiss {
            state.dispatch(AppCommand::DismissError);
            return false;
        }
    }

    match state.mode {
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Edit => handle_edit_key(state, runtime, view_data, internal_tx, key),
        AppMode::Form => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::ConfirmDelete => handle_confirm_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let row_count = state.grid.drafts().len();
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => move_row(view_data, row_count, 1),
        KeyCode::Char('k') | KeyCode::Up => move_row(view_data, row_count, -1),
        KeyCode::Char('h') | KeyCode::Left => move_col(view_data, -1),
        KeyCode::Char('l') | KeyCode::Right => move_col(view_data, 1),
        KeyCode::Char('g') | KeyCode::Home => view_data.selected_row = 0,
        KeyCode::Char('G') | KeyCode::End => {
            view_data.selected_row = row_count.saturating_sub(1);
        }
        KeyCode::Char('^') => view_data.selected_col = 0,
        KeyCode::Char('$') => view_data.selected_col = AccountField::ALL.len() - 1,
        KeyCode::Char('s') => {
            let field = selected_field(view_data);
            dispatch_and_apply(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::ToggleSort(field),
            );
        }
        KeyCode::Char('f') => {
            let field = selected_field(view_data);
            dispatch_and_apply(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::ToggleFilter(field),
            );
        }
        KeyCode::Char('i') | KeyCode::Char('e') => {
            if !selected_field(view_data).is_editable() {
                view_data.selected_col = 1;
            }
            dispatch_and_apply(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::EnterEditMode,
            );
        }
        KeyCode::Char('a') => {
            view_data.form_field = 0;
            dispatch_and_apply(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::OpenNewForm,
            );
        }
        KeyCode::Char('d') => match selected_account_id(state, view_data) {
            Some(id) => dispatch_and_apply(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::RequestDelete(id),
            ),
            None => emit_status(state, view_data, internal_tx, "no row selected"),
        },
        KeyCode::Char('r') => {
            dispatch_and_apply(state, runtime, view_data, internal_tx, AppCommand::Refresh);
        }
        KeyCode::Enter => submit_row(state, runtime, view_data, internal_tx),
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
}

fn handle_edit_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let row_count = state.grid.drafts().len();
    match key.code {
        KeyCode::Esc => {
            dispatch_and_apply(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
        }
        KeyCode::Enter => {
            dispatch_and_apply(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
            submit_row(state, runtime, view_data, internal_tx);
        }
        KeyCode::Up => move_row(view_data, row_count, -1),
        KeyCode::Down => move_row(view_data, row_count, 1),
        KeyCode::Tab | KeyCode::Right => move_editable_col(view_data, 1),
        KeyCode::BackTab | KeyCode::Left => move_editable_col(view_data, -1),
        KeyCode::Backspace => {
            edit_selected_row(state, runtime, view_data, internal_tx, CellEdit::Pop);
        }
        KeyCode::Delete => {
            edit_selected_row(state, runtime, view_data, internal_tx, CellEdit::Clear);
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            edit_selected_row(state, runtime, view_data, internal_tx, CellEdit::Push(ch));
        }
        _ => {}
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field_count = AccountField::EDITABLE.len();
    match key.code {
        KeyCode::Esc => {
            dispatch_and_apply(state, runtime, view_data, internal_tx, AppCommand::CancelForm);
            emit_status(state, view_data, internal_tx, "form hidden, draft kept");
        }
        KeyCode::Enter => submit_new_account(state, runtime, view_data, internal_tx),
        KeyCode::Tab | KeyCode::Down => {
            view_data.form_field = (view_data.form_field + 1) % field_count;
        }
        KeyCode::BackTab | KeyCode::Up => {
            view_data.form_field = (view_data.form_field + field_count - 1) % field_count;
        }
        KeyCode::Backspace => edit_form(state, runtime, view_data, internal_tx, CellEdit::Pop),
        KeyCode::Delete => edit_form(state, runtime, view_data, internal_tx, CellEdit::Clear),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            edit_form(state, runtime, view_data, internal_tx, CellEdit::Push(ch));
        }
        _ => {}
    }
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => dispatch_and_apply(
            state,
            runtime,
            view_data,
            internal_tx,
            AppCommand::ConfirmDelete,
        ),
        KeyCode::Char('n') | KeyCode::Esc => dispatch_and_apply(
            state,
            runtime,
            view_data,
            internal_tx,
            AppCommand::CancelDelete,
        ),
        _ => {}
    }
}

/// Dispatches a command and performs the network work its events ask for.
fn dispatch_and_apply<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    for event in &events {
        match event {
            AppEvent::FetchRequested => start_fetch(state, runtime, view_data, internal_tx),
            AppEvent::DeleteConfirmed(id) => {
                delete_then_fetch(state, runtime, view_data, internal_tx, *id);
            }
            _ => {}
        }
    }
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn delete_then_fetch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    id: AccountId,
) {
    match runtime.delete_account(id) {
        Ok(()) => {
            info!(%id, "account deleted");
            emit_status(state, view_data, internal_tx, format!("deleted record {id}"));
        }
        Err(error) => {
            warn!(%id, error = %error, "delete failed");
            show_error(state, format!("delete failed: {error}"));
        }
    }
    start_fetch(state, runtime, view_data, internal_tx);
}

fn submit_row<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(draft) = state.grid.drafts().get(view_data.selected_row).cloned() else {
        emit_status(state, view_data, internal_tx, "no row selected");
        return;
    };
    if let Some(id) = draft.id {
        match runtime.update_account(id, &draft) {
            Ok(()) => {
                info!(%id, "account updated");
                emit_status(state, view_data, internal_tx, format!("saved record {id}"));
            }
            Err(error) => {
                warn!(%id, error = %error, "update failed");
                show_error(state, format!("save failed: {error}"));
            }
        }
    }
    start_fetch(state, runtime, view_data, internal_tx);
}

fn submit_new_account<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let draft = match state.new_account.validated_draft() {
        Ok(draft) => draft,
        Err(error) => {
            show_error(state, error.to_string());
            return;
        }
    };

    match runtime.create_account(&draft) {
        Ok(()) => {
            info!(username = %draft.username, "account created");
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("added {}", draft.username),
            );
        }
        Err(error) => {
            warn!(username = %draft.username, error = %error, "create failed");
            show_error(state, format!("add failed: {error}"));
        }
    }

    state.new_account.reset();
    view_data.form_field = 0;
    dispatch_and_apply(state, runtime, view_data, internal_tx, AppCommand::CancelForm);
    start_fetch(state, runtime, view_data, internal_tx);
}

fn edit_selected_row<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    edit: CellEdit,
) {
    let index = view_data.selected_row;
    let field = selected_field(view_data);
    let Some(draft) = state.grid.drafts().get(index) else {
        return;
    };
    let Some(value) = cell_edit_value(draft, field, edit) else {
        emit_status(state, view_data, internal_tx, edit_hint(field));
        return;
    };
    let today = runtime.today();
    if let Err(error) = state.grid.edit_row(index, field, value, today) {
        emit_status(state, view_data, internal_tx, error.to_string());
    }
}

fn edit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    edit: CellEdit,
) {
    let field = selected_form_field(view_data);
    let Some(value) = cell_edit_value(state.new_account.draft(), field, edit) else {
        emit_status(state, view_data, internal_tx, edit_hint(field));
        return;
    };
    let today = runtime.today();
    if let Err(error) = state.new_account.edit(field, value, today) {
        emit_status(state, view_data, internal_tx, error.to_string());
    }
}

/// The whole new value for `field` after one keystroke.
fn cell_edit_value(
    draft: &AccountDraft,
    field: AccountField,
    edit: CellEdit,
) -> Option<FieldValue> {
    match field.kind() {
        FieldKind::Checkbox => match edit {
            CellEdit::Push(' ') | CellEdit::Push('x') => {
                Some(FieldValue::Flag(!draft.existing_user))
            }
            CellEdit::Clear => Some(FieldValue::Flag(false)),
            CellEdit::Push(_) | CellEdit::Pop => None,
        },
        FieldKind::Text => {
            let mut text = draft.text(field)?.to_owned();
            match edit {
                CellEdit::Push(ch) => text.push(ch),
                CellEdit::Pop => {
                    text.pop();
                }
                CellEdit::Clear => text.clear(),
            }
            Some(FieldValue::Text(text))
        }
    }
}

fn edit_hint(field: AccountField) -> String {
    match field.kind() {
        FieldKind::Checkbox => format!("space toggles {}", field.label()),
        FieldKind::Text => format!("{} is assigned by the server", field.label()),
    }
}

fn move_row(view_data: &mut ViewData, row_count: usize, delta: isize) {
    if row_count == 0 {
        view_data.selected_row = 0;
        return;
    }
    let max = row_count as isize - 1;
    view_data.selected_row = (view_data.selected_row as isize + delta).clamp(0, max) as usize;
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    let max = AccountField::ALL.len() as isize - 1;
    view_data.selected_col = (view_data.selected_col as isize + delta).clamp(0, max) as usize;
}

/// Like `move_col` but skips columns that cannot be edited.
fn move_editable_col(view_data: &mut ViewData, delta: isize) {
    let start = view_data.selected_col;
    move_col(view_data, delta);
    if !selected_field(view_data).is_editable() {
        view_data.selected_col = start;
    }
}

fn selected_field(view_data: &ViewData) -> AccountField {
    AccountField::ALL[view_data.selected_col.min(AccountField::ALL.len() - 1)]
}

fn selected_form_field(view_data: &ViewData) -> AccountField {
    AccountField::EDITABLE[view_data.form_field.min(AccountField::EDITABLE.len() - 1)]
}

fn selected_account_id(state: &AppState, view_data: &ViewData) -> Option<AccountId> {
    state
        .grid
        .accounts()
        .get(view_data.selected_row)
        .map(|account| account.id)
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let banner_height = if state.error_banner.is_some() { 1 } else { 0 };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(banner_height),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let summary = Paragraph::new(summary_text(state, view_data))
        .block(Block::default().title(APP_TITLE).borders(Borders::ALL));
    frame.render_widget(summary, layout[0]);

    if let Some(banner) = error_banner_text(state) {
        let widget = Paragraph::new(banner).style(
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(widget, layout[1]);
    }

    render_table(frame, layout[2], state, view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_widget, layout[3]);

    if state.mode == AppMode::Form {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);
        let form = Paragraph::new(render_form_text(state, view_data))
            .block(Block::default().title("new account").borders(Borders::ALL));
        frame.render_widget(form, area);
    }

    if let Some(id) = state.delete.pending() {
        let area = centered_rect(50, 24, frame.area());
        frame.render_widget(Clear, area);
        let confirm = Paragraph::new(render_delete_text(id)).block(
            Block::default()
                .title("delete")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(confirm, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let widths = AccountField::ALL.map(|field| match field {
        AccountField::Id => Constraint::Length(6),
        AccountField::Username => Constraint::Min(12),
        AccountField::Email => Constraint::Min(20),
        AccountField::ExistingUser => Constraint::Length(8),
        _ => Constraint::Length(12),
    });

    let header_cells = AccountField::ALL.iter().enumerate().map(|(index, field)| {
        let mut style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        if index == view_data.selected_col {
            style = style.fg(Color::Cyan);
        }
        Cell::from(header_label(*field, &state.grid)).style(style)
    });
    let header = Row::new(header_cells);

    let editing = state.mode == AppMode::Edit;
    let rows = state
        .grid
        .drafts()
        .iter()
        .enumerate()
        .map(|(row_index, draft)| {
            let selected_row = row_index == view_data.selected_row;
            let inactive = state
                .grid
                .accounts()
                .get(row_index)
                .is_some_and(Account::is_inactive);

            let cells = AccountField::ALL
                .iter()
                .enumerate()
                .map(|(col_index, field)| {
                    let mut style = Style::default();
                    if inactive {
                        style = style.fg(Color::DarkGray);
                    }
                    if state.grid.is_cell_dirty(row_index, *field) {
                        style = style.fg(Color::Yellow).add_modifier(Modifier::ITALIC);
                    }
                    if selected_row {
                        style = style.bg(Color::DarkGray);
                    }
                    if selected_row && col_index == view_data.selected_col {
                        let accent = if editing { Color::Magenta } else { Color::Cyan };
                        style = Style::default()
                            .fg(Color::Black)
                            .bg(accent)
                            .add_modifier(Modifier::BOLD);
                    }
                    Cell::from(cell_text(&state.grid, row_index, draft, *field)).style(style)
                })
                .collect::<Vec<_>>();
            Row::new(cells)
        });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(&state.grid))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

/// The ID cell carries a marker while the row has edits a refresh would drop.
fn cell_text(
    grid: &AccountGrid,
    row_index: usize,
    draft: &AccountDraft,
    field: AccountField,
) -> String {
    let text = draft.display(field);
    if field == AccountField::Id && grid.is_row_dirty(row_index) {
        format!("{text}{UNSAVED_MARK}")
    } else {
        text
    }
}

fn header_label(field: AccountField, grid: &AccountGrid) -> String {
    let sort = grid.sort();
    let arrow = if sort.key == field {
        match sort.direction {
            SortDirection::Asc => SORT_MARK_ASC,
            SortDirection::Desc => SORT_MARK_DESC,
        }
    } else {
        SORT_MARK_NONE
    };
    let mut label = format!("{} {arrow}", field.label());
    if field.is_blank_filterable() {
        label.push(' ');
        label.push_str(if grid.blank_filter() == Some(field) {
            FILTER_MARK_ACTIVE
        } else {
            FILTER_MARK_AVAILABLE
        });
    }
    label
}

fn table_title(grid: &AccountGrid) -> String {
    let sort = grid.sort();
    let mut title = format!(
        "accounts | sort {} {}",
        sort.key.label(),
        sort.direction.as_str()
    );
    if let Some(field) = grid.blank_filter() {
        title.push_str(&format!(" | blank {} only", field.label()));
    }
    title
}

fn summary_text(state: &AppState, view_data: &ViewData) -> String {
    let summary = state.grid.summary();
    let mut text = format!(
        "Total requests: {} | Wait Activation: {} | Active accounts: {}",
        summary.total, summary.awaiting_activation, summary.active
    );
    if view_data.loading {
        text.push_str(" | loading...");
    }
    text
}

fn error_banner_text(state: &AppState) -> Option<String> {
    state
        .error_banner
        .as_ref()
        .map(|message| format!(" error: {message} (esc dismiss)"))
}

fn render_form_text(state: &AppState, view_data: &ViewData) -> String {
    let draft = state.new_account.draft();
    let selected = selected_form_field(view_data);
    let mut lines = AccountField::EDITABLE
        .iter()
        .map(|field| {
            let marker = if *field == selected { ">" } else { " " };
            let required = if field.is_required() { "*" } else { "" };
            format!(
                "{marker} {:<10} {}",
                format!("{}{required}", field.label()),
                draft.display(*field)
            )
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("t in a date field = today | space toggles Exist?".to_owned());
    lines.push("tab/shift+tab field | enter add | esc hide".to_owned());
    lines.join("\n")
}

fn render_delete_text(id: AccountId) -> String {
    format!("Do you want to delete the record with ID {id}?\n\ny/enter delete | n/esc cancel")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | esc/x dismiss error | ? help\n\
nav: j/k/h/l g/G ^/$ | s sort column | f blank-date filter | r refresh\n\
nav: i edit row | enter save row | a add account | d delete row\n\
edit: type to change | t = today in date columns | space toggles Exist?\n\
edit: tab/shift+tab column | up/down row | backspace/del | enter save | esc nav\n\
edit: * after an ID marks unsaved edits, which a refresh discards\n\
form: tab/shift+tab field | enter add | esc hide (draft kept)\n\
delete: y/enter confirm | n/esc cancel"
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let (mode, hints) = match state.mode {
        AppMode::Nav => (
            "NAV",
            "j/k/h/l g/G ^/$ | s sort | f filter | i edit | enter save | a add | d del | r refresh | ? help | ctrl+q",
        ),
        AppMode::Edit => (
            "EDIT",
            "type | t today | space toggle | tab col | enter save | esc nav",
        ),
        AppMode::Form => ("FORM", "tab field | enter add | esc hide"),
        AppMode::ConfirmDelete => ("DELETE", "y confirm | n cancel"),
    };
    let mut default = hints.to_owned();
    if state.mode == AppMode::Form {
        default = format!(
            "{} {}/{} | {default}",
            selected_form_field(view_data).label(),
            view_data.form_field + 1,
            AccountField::EDITABLE.len()
        );
    }
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {default}"),
        None => format!("{mode} | {default}"),
    }
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

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, ViewData, cell_text, handle_key_event, header_label,
        process_internal_events, render_delete_text, render_form_text, status_text, summary_text,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ereg_app::{
        Account, AccountDraft, AccountField, AccountGrid, AccountId, AppMode, AppState,
        DeleteFlow, FetchQuery, SortDirection,
    };
    use std::sync::mpsc;
    use time::{Date, Month};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Fetch(FetchQuery),
        Create(AccountDraft),
        Update(AccountId, AccountDraft),
        Delete(AccountId),
    }

    #[derive(Debug, Default)]
    struct TestRuntime {
        rows: Vec<Account>,
        calls: Vec<Call>,
        fail_fetch: bool,
        fail_create: bool,
        fail_update: bool,
    }

    impl TestRuntime {
        fn with_rows(ids: &[i64]) -> Self {
            Self {
                rows: ids
                    .iter()
                    .map(|id| Account::new(AccountId::new(*id), &format!("user{id}"), "u@x.com"))
                    .collect(),
                ..Self::default()
            }
        }

        fn fetches(&self) -> Vec<FetchQuery> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Fetch(query) => Some(*query),
                    _ => None,
                })
                .collect()
        }
    }

    impl AppRuntime for TestRuntime {
        fn fetch_accounts(&mut self, query: &FetchQuery) -> Result<Vec<Account>> {
            self.calls.push(Call::Fetch(*query));
            if self.fail_fetch {
                bail!("cannot reach http://127.0.0.1:1");
            }
            Ok(self.rows.clone())
        }

        fn create_account(&mut self, draft: &AccountDraft) -> Result<()> {
            self.calls.push(Call::Create(draft.clone()));
            if self.fail_create {
                bail!("rejected by server (422): email: field required");
            }
            Ok(())
        }

        fn update_account(&mut self, id: AccountId, draft: &AccountDraft) -> Result<()> {
            self.calls.push(Call::Update(id, draft.clone()));
            if self.fail_update {
                bail!("not found: account {id} does not exist");
            }
            Ok(())
        }

        fn delete_account(&mut self, id: AccountId) -> Result<()> {
            self.calls.push(Call::Delete(id));
            Ok(())
        }

        fn today(&mut self) -> Date {
            Date::from_calendar_date(2024, Month::February, 29).expect("valid date")
        }
    }

    fn view_data_for_test() -> ViewData {
        ViewData::default()
    }

    fn internal_channel() -> (
        mpsc::Sender<InternalEvent>,
        mpsc::Receiver<InternalEvent>,
    ) {
        mpsc::channel()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: mpsc::Sender<InternalEvent>,
        rx: mpsc::Receiver<InternalEvent>,
    }

    impl Harness {
        fn loaded(runtime: TestRuntime) -> Self {
            let (tx, rx) = internal_channel();
            let mut harness = Self {
                state: AppState::default(),
                runtime,
                view_data: view_data_for_test(),
                tx,
                rx,
            };
            super::start_fetch(
                &mut harness.state,
                &mut harness.runtime,
                &mut harness.view_data,
                &harness.tx,
            );
            harness.pump();
            harness.runtime.calls.clear();
            harness
        }

        fn pump(&mut self) {
            process_internal_events(&mut self.state, &mut self.view_data, &self.rx);
        }

        fn press(&mut self, code: KeyCode) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                key(code),
            );
            self.pump();
            quit
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }
    }

    #[test]
    fn initial_fetch_fills_grid() {
        let harness = Harness::loaded(TestRuntime::with_rows(&[3, 1, 2]));
        let ids: Vec<i64> = harness
            .state
            .grid
            .accounts()
            .iter()
            .map(|account| account.id.get())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(!harness.view_data.loading);
    }

    #[test]
    fn ctrl_q_quits() {
        let mut harness = Harness::loaded(TestRuntime::default());
        let quit = handle_key_event(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
            &harness.tx,
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL),
        );
        assert!(quit);
    }

    #[test]
    fn sort_key_refetches_with_toggled_direction() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));

        harness.press(KeyCode::Char('s'));
        harness.press(KeyCode::Char('l'));
        harness.press(KeyCode::Char('s'));

        let fetches = harness.runtime.fetches();
        assert_eq!(fetches.len(), 2);
        assert_eq!(fetches[0].sort.key, AccountField::Id);
        assert_eq!(fetches[0].sort.direction, SortDirection::Desc);
        assert_eq!(fetches[1].sort.key, AccountField::Username);
        assert_eq!(fetches[1].sort.direction, SortDirection::Asc);
    }

    #[test]
    fn filter_key_on_unfilterable_column_does_not_fetch() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));

        harness.press(KeyCode::Char('f'));
        assert!(harness.runtime.fetches().is_empty());
        assert!(
            harness
                .state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("cannot be filtered"))
        );
    }

    #[test]
    fn filter_key_twice_returns_to_unfiltered() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));
        harness.view_data.selected_col = 6;

        harness.press(KeyCode::Char('f'));
        harness.press(KeyCode::Char('f'));

        let fetches = harness.runtime.fetches();
        assert_eq!(
            fetches[0].blank_filter,
            Some(AccountField::DateAccountCreated)
        );
        assert_eq!(fetches[1].blank_filter, None);
    }

    #[test]
    fn typing_t_in_date_column_stores_today() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1, 2]));
        harness.view_data.selected_col = 3;
        harness.view_data.selected_row = 1;

        harness.press(KeyCode::Char('i'));
        assert_eq!(harness.state.mode, AppMode::Edit);
        harness.press(KeyCode::Char('T'));

        assert_eq!(harness.state.grid.drafts()[1].date_requested, "02/29/2024");
        assert_eq!(harness.state.grid.drafts()[0].date_requested, "");
    }

    #[test]
    fn enter_in_edit_mode_updates_then_refetches() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[4]));
        harness.view_data.selected_col = 2;

        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Delete);
        harness.type_text("new@x.com");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(harness.runtime.calls.len(), 2);
        match &harness.runtime.calls[0] {
            Call::Update(id, draft) => {
                assert_eq!(*id, AccountId::new(4));
                assert_eq!(draft.email, "new@x.com");
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert!(matches!(harness.runtime.calls[1], Call::Fetch(_)));
    }

    #[test]
    fn failed_update_shows_banner_and_still_refetches() {
        let mut runtime = TestRuntime::with_rows(&[4]);
        runtime.fail_update = true;
        let mut harness = Harness::loaded(runtime);

        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.fetches().len(), 1);
        assert!(
            harness
                .state
                .error_banner
                .as_deref()
                .is_some_and(|banner| banner.contains("save failed"))
        );

        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.error_banner, None);
    }

    #[test]
    fn space_toggles_existing_user_checkbox() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));
        harness.view_data.selected_col = 9;

        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char(' '));
        assert!(harness.state.grid.drafts()[0].existing_user);
        harness.press(KeyCode::Char('q'));
        assert!(harness.state.grid.drafts()[0].existing_user);
        assert!(
            harness
                .state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("space toggles"))
        );
    }

    #[test]
    fn confirm_delete_issues_one_delete_then_one_fetch() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[3, 7]));
        harness.view_data.selected_row = 1;

        harness.press(KeyCode::Char('d'));
        assert_eq!(harness.state.mode, AppMode::ConfirmDelete);
        assert_eq!(harness.state.delete.pending(), Some(AccountId::new(7)));
        assert!(harness.runtime.calls.is_empty());

        harness.press(KeyCode::Char('y'));
        assert_eq!(harness.runtime.calls.len(), 2);
        assert_eq!(harness.runtime.calls[0], Call::Delete(AccountId::new(7)));
        assert!(matches!(harness.runtime.calls[1], Call::Fetch(_)));
        assert_eq!(harness.state.delete, DeleteFlow::Idle);
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn cancel_delete_has_no_side_effects() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[3]));

        harness.press(KeyCode::Char('d'));
        harness.press(KeyCode::Char('n'));
        assert!(harness.runtime.calls.is_empty());
        assert_eq!(harness.state.delete, DeleteFlow::Idle);
    }

    #[test]
    fn new_account_form_creates_resets_and_refetches() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));

        harness.press(KeyCode::Char('a'));
        assert_eq!(harness.state.mode, AppMode::Form);
        harness.type_text("alice");
        harness.press(KeyCode::Tab);
        harness.type_text("a@x.com");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.calls.len(), 2);
        match &harness.runtime.calls[0] {
            Call::Create(draft) => {
                assert_eq!(draft.username, "alice");
                assert_eq!(draft.email, "a@x.com");
                assert!(!draft.existing_user);
                assert_eq!(draft.id, None);
            }
            other => panic!("expected create, got {other:?}"),
        }
        assert!(matches!(harness.runtime.calls[1], Call::Fetch(_)));
        assert!(harness.state.new_account.is_pristine());
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn failed_create_still_resets_and_refetches() {
        let mut runtime = TestRuntime::with_rows(&[1]);
        runtime.fail_create = true;
        let mut harness = Harness::loaded(runtime);

        harness.press(KeyCode::Char('a'));
        harness.type_text("bob");
        harness.press(KeyCode::Tab);
        harness.type_text("b@x.com");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.fetches().len(), 1);
        assert!(harness.state.new_account.is_pristine());
        assert!(
            harness
                .state
                .error_banner
                .as_deref()
                .is_some_and(|banner| banner.contains("add failed"))
        );
    }

    #[test]
    fn invalid_form_keeps_draft_and_sends_nothing() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));

        harness.press(KeyCode::Char('a'));
        harness.type_text("carol");
        harness.press(KeyCode::Enter);

        assert!(harness.runtime.calls.is_empty());
        assert_eq!(harness.state.mode, AppMode::Form);
        assert_eq!(harness.state.new_account.draft().username, "carol");
        assert!(harness.state.error_banner.is_some());
    }

    #[test]
    fn form_today_macro_and_esc_keeps_draft() {
        let mut harness = Harness::loaded(TestRuntime::default());

        harness.press(KeyCode::Char('a'));
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Char('t'));
        harness.press(KeyCode::Esc);

        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(
            harness.state.new_account.draft().date_requested,
            "02/29/2024"
        );
    }

    #[test]
    fn failed_fetch_keeps_rows_and_shows_banner() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1, 2]));
        harness.runtime.fail_fetch = true;

        harness.press(KeyCode::Char('r'));

        assert_eq!(harness.state.grid.accounts().len(), 2);
        assert!(
            harness
                .state
                .error_banner
                .as_deref()
                .is_some_and(|banner| banner.starts_with("load failed"))
        );
        assert!(!harness.view_data.loading);
    }

    #[test]
    fn stale_fetch_event_is_ignored() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));
        let older = harness.state.grid.begin_fetch();
        let newer = harness.state.grid.begin_fetch();

        harness
            .tx
            .send(InternalEvent::Fetched {
                request_id: newer.request_id,
                result: Ok(vec![Account::new(AccountId::new(9), "new", "n@x.com")]),
            })
            .expect("send");
        harness
            .tx
            .send(InternalEvent::Fetched {
                request_id: older.request_id,
                result: Ok(Vec::new()),
            })
            .expect("send");
        harness.pump();

        assert_eq!(harness.state.grid.accounts().len(), 1);
        assert_eq!(harness.state.grid.accounts()[0].id, AccountId::new(9));
    }

    #[test]
    fn empty_refetch_leaves_edit_mode() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));
        harness.view_data.selected_col = 1;
        harness.press(KeyCode::Char('i'));
        assert_eq!(harness.state.mode, AppMode::Edit);

        harness.runtime.rows.clear();
        super::start_fetch(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
            &harness.tx,
        );
        harness.pump();

        assert!(harness.state.grid.drafts().is_empty());
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn nonempty_refetch_keeps_edit_mode() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[1]));
        harness.press(KeyCode::Char('i'));

        super::start_fetch(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
            &harness.tx,
        );
        harness.pump();

        assert_eq!(harness.state.mode, AppMode::Edit);
    }

    #[test]
    fn id_cell_marks_unsaved_rows() {
        let mut harness = Harness::loaded(TestRuntime::with_rows(&[5, 6]));
        harness.view_data.selected_col = 1;
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('z'));

        let grid = &harness.state.grid;
        assert_eq!(
            cell_text(grid, 0, &grid.drafts()[0], AccountField::Id),
            "5*"
        );
        assert_eq!(
            cell_text(grid, 1, &grid.drafts()[1], AccountField::Id),
            "6"
        );
        assert_eq!(
            cell_text(grid, 0, &grid.drafts()[0], AccountField::Username),
            "user5z"
        );
    }

    #[test]
    fn header_marks_sort_and_filter() -> Result<()> {
        let mut grid = AccountGrid::default();
        assert_eq!(header_label(AccountField::Id, &grid), "ID ↓");
        assert_eq!(header_label(AccountField::Username, &grid), "User Name ↕");
        assert_eq!(
            header_label(AccountField::DateAccountActivated, &grid),
            "Active ↕ ▽"
        );

        grid.toggle_sort(AccountField::Id);
        grid.toggle_blank_filter(AccountField::DateAccountActivated)?;
        assert_eq!(header_label(AccountField::Id, &grid), "ID ↑");
        assert_eq!(
            header_label(AccountField::DateAccountActivated, &grid),
            "Active ↕ ▼"
        );
        Ok(())
    }

    #[test]
    fn summary_and_overlays_render_text() {
        let mut runtime = TestRuntime::with_rows(&[1, 2]);
        runtime.rows[0].date_account_created = Some("01/01/2024".to_owned());
        runtime.rows[1].date_account_activated = Some("01/02/2024".to_owned());
        let harness = Harness::loaded(runtime);

        assert_eq!(
            summary_text(&harness.state, &harness.view_data),
            "Total requests: 2 | Wait Activation: 1 | Active accounts: 1"
        );
        assert_eq!(
            render_delete_text(AccountId::new(7)).lines().next(),
            Some("Do you want to delete the record with ID 7?")
        );
        let form = render_form_text(&harness.state, &harness.view_data);
        assert!(form.starts_with("> User Name*"));
        assert!(status_text(&harness.state, &harness.view_data).starts_with("NAV | "));
    }

    #[test]
    fn help_toggles_and_hides_status() {
        let mut harness = Harness::loaded(TestRuntime::default());

        harness.press(KeyCode::Char('?'));
        assert!(harness.view_data.help_visible);
        assert_eq!(status_text(&harness.state, &harness.view_data), "");

        harness.press(KeyCode::Esc);
        assert!(!harness.view_data.help_visible);
    }
}
