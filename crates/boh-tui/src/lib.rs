// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use boh_app::api::INGREDIENTS_PER_PAGE;
use boh_app::layout::{Gesture, LayoutStore, TableConfig};
use boh_app::money::{format_cents, format_dollars};
use boh_app::price_editor::{PriceEditor, PriceRow};
use boh_app::rows::{Column, DataTable, SelectionState, SortKey, SortOutcome, TableRow, paginate};
use boh_app::tag_editor::{SyncOutcome, SyncRequest, TagEditor};
use boh_app::{
    AppCommand, AppEvent, AppMode, AppState, Ingredient, IngredientId, Page, PriceChange,
    SortDirection, TabKind, Tag, TagColour,
};
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::io;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

/// Persisted widths are pixels; one terminal cell renders as this many.
const PX_PER_CELL: u32 = 8;
const SELECT_COLUMN_CELLS: u16 = 3;
const RESIZE_STEP_PX: i64 = 16;
const DASHBOARD_PER_PAGE: usize = 10;
const INGREDIENTS_STORAGE_KEY: &str = "ingredients.dg";
const DASHBOARD_STORAGE_KEY: &str = "dashboard.priceChanges";

pub trait AppRuntime {
    fn load_ingredients_page(&mut self, page: u32) -> Result<Page<Ingredient>>;
    fn load_ingredient(&mut self, ingredient_id: IngredientId) -> Result<Option<Ingredient>>;
    fn search_tags(&mut self, query: &str) -> Result<Vec<Tag>>;
    fn load_price_changes(&mut self) -> Result<Vec<PriceChange>>;
    fn run_tag_sync(&mut self, request: &SyncRequest) -> Result<Vec<Tag>>;
    /// Runs the sync and reports through `tx`. Runtimes backed by a slow
    /// transport override this to work off the UI thread.
    fn spawn_tag_sync(&mut self, request: SyncRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let event = TagSyncEvent::from_result(&request, self.run_tag_sync(&request));
        tx.send(InternalEvent::TagSync(event))
            .map_err(|_| anyhow!("tag sync channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSyncEvent {
    Completed {
        request_id: u64,
        row_id: i64,
        tags: Vec<Tag>,
    },
    Failed {
        request_id: u64,
        row_id: i64,
        error: String,
    },
}

impl TagSyncEvent {
    pub fn from_result(request: &SyncRequest, result: Result<Vec<Tag>>) -> Self {
        match result {
            Ok(tags) => Self::Completed {
                request_id: request.request_id,
                row_id: request.row_id,
                tags,
            },
            Err(error) => Self::Failed {
                request_id: request.request_id,
                row_id: request.row_id,
                error: format!("{error:#}"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    TagSync(TagSyncEvent),
}

type LayoutTable<R> = DataTable<R, Rc<dyn LayoutStore>>;

/// Cell rendering hooks on top of [`TableRow`].
trait ViewRow: TableRow {
    fn cell_line(&self, _column: &str, text: String) -> Line<'static> {
        Line::from(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct IngredientRow {
    id: i64,
    name: String,
    unit: String,
    tags: Vec<(String, Option<TagColour>)>,
    tags_pending: bool,
    price: Option<f64>,
    draft: Option<String>,
    percent_change: f64,
    last_updated: OffsetDateTime,
    age_days: i64,
}

impl IngredientRow {
    fn tag_label(&self) -> String {
        self.tags
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn price_label(&self) -> String {
        if let Some(draft) = &self.draft {
            return format!("{draft}▏");
        }
        match self.price {
            Some(price) if self.unit.is_empty() => format_dollars(price),
            Some(price) => format!("{} ({})", format_dollars(price), self.unit),
            None => "N/A".to_owned(),
        }
    }
}

impl TableRow for IngredientRow {
    fn row_id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ViewRow for IngredientRow {
    fn cell_line(&self, column: &str, text: String) -> Line<'static> {
        match column {
            "tags" => {
                let mut spans = Vec::new();
                for (index, (name, colour)) in self.tags.iter().enumerate() {
                    if index > 0 {
                        spans.push(Span::raw(", "));
                    }
                    spans.push(Span::styled(
                        name.clone(),
                        Style::default().fg(tag_colour(*colour)),
                    ));
                }
                if self.tags_pending {
                    spans.push(Span::styled(" …", Style::default().fg(Color::DarkGray)));
                }
                Line::from(spans)
            }
            "price_change" => Line::styled(text, change_style(self.percent_change)),
            "last_updated" => Line::styled(text, age_style(self.age_days)),
            _ => Line::from(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PriceChangeRow {
    id: i64,
    name: String,
    unit: String,
    old_cents: i64,
    new_cents: i64,
    percent: f64,
}

impl From<&PriceChange> for PriceChangeRow {
    fn from(change: &PriceChange) -> Self {
        Self {
            id: change.ingredient_id.get(),
            name: change.name.clone(),
            unit: change.unit.clone(),
            old_cents: change.old_cents,
            new_cents: change.new_cents,
            percent: change.percent(),
        }
    }
}

impl TableRow for PriceChangeRow {
    fn row_id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ViewRow for PriceChangeRow {
    fn cell_line(&self, column: &str, text: String) -> Line<'static> {
        match column {
            "change" => Line::styled(text, change_style(self.percent)),
            _ => Line::from(text),
        }
    }
}

fn ingredient_columns() -> Vec<Column<IngredientRow>> {
    vec![
        Column::new("name", "Name", |row: &IngredientRow| row.name.clone()).sortable(),
        Column::new("tags", "Tags", IngredientRow::tag_label)
            .sort_key(|row: &IngredientRow| SortKey::Text(row.tag_label())),
        Column::new("price", "Price", IngredientRow::price_label)
            .sort_key(|row: &IngredientRow| SortKey::Number(row.price.unwrap_or(0.0))),
        Column::new("price_change", "Price Change", |row: &IngredientRow| {
            format_change(row.percent_change)
        })
        .sort_key(|row: &IngredientRow| SortKey::Number(row.percent_change)),
        Column::new("last_updated", "Price Last Updated", |row: &IngredientRow| {
            relative_label(row.age_days)
        })
        .sort_key(|row: &IngredientRow| SortKey::Date(row.last_updated)),
        Column::new("actions", "Actions", |_: &IngredientRow| {
            "t tags · e price".to_owned()
        })
        .fixed(),
    ]
}

fn price_change_columns() -> Vec<Column<PriceChangeRow>> {
    vec![
        Column::new("name", "Ingredient", |row: &PriceChangeRow| {
            if row.unit.is_empty() {
                row.name.clone()
            } else {
                format!("{} ({})", row.name, row.unit)
            }
        })
        .sortable(),
        Column::new("old", "Old Price", |row: &PriceChangeRow| {
            format_cents(row.old_cents)
        })
        .sort_key(|row: &PriceChangeRow| SortKey::Number(row.old_cents as f64)),
        Column::new("new", "New Price", |row: &PriceChangeRow| {
            format_cents(row.new_cents)
        })
        .sort_key(|row: &PriceChangeRow| SortKey::Number(row.new_cents as f64)),
        Column::new("change", "Change", |row: &PriceChangeRow| format_change(row.percent))
            .sort_key(|row: &PriceChangeRow| SortKey::Number(row.percent)),
        Column::new("actions", "Actions", |_: &PriceChangeRow| "enter view".to_owned()).fixed(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct TableCursor {
    row: usize,
    col: usize,
}

impl TableCursor {
    fn clamp(&mut self, rows: usize, cols: usize) {
        self.row = self.row.min(rows.saturating_sub(1));
        self.col = self.col.min(cols.saturating_sub(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableCommand {
    MoveRow(isize),
    MoveCol(isize),
    Sort,
    ToggleRow,
    ToggleAll,
    HideColumn,
    ShowAll,
    ShiftColumn(isize),
    Resize(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagPopup {
    row_id: i64,
    query: String,
    matches: Vec<Tag>,
    match_cursor: usize,
    tag_cursor: usize,
    colour: Option<TagColour>,
}

impl TagPopup {
    fn new(row_id: i64) -> Self {
        Self {
            row_id,
            query: String::new(),
            matches: Vec::new(),
            match_cursor: 0,
            tag_cursor: 0,
            colour: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagAction {
    Close,
    Refresh,
    AddExisting(String),
    Create(String, Option<TagColour>),
    Remove(String),
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderSpan {
    id: &'static str,
    start: u16,
    end: u16,
}

impl HeaderSpan {
    fn contains(&self, x: u16) -> bool {
        (self.start..self.end).contains(&x)
    }
}

struct ViewData {
    ingredients: Page<Ingredient>,
    ingredients_table: LayoutTable<IngredientRow>,
    ingredients_cursor: TableCursor,
    price_changes: Vec<PriceChangeRow>,
    dashboard_table: LayoutTable<PriceChangeRow>,
    dashboard_cursor: TableCursor,
    dashboard_page: usize,
    tag_editor: TagEditor,
    price_editor: PriceEditor,
    tag_popup: Option<TagPopup>,
    detail: Option<Ingredient>,
    pressed_header: Option<&'static str>,
    help_visible: bool,
    status_token: u64,
}

impl ViewData {
    fn new(layout_store: Rc<dyn LayoutStore>) -> Self {
        let mut ingredients_table = DataTable::new(
            TableConfig::new(INGREDIENTS_STORAGE_KEY),
            Rc::clone(&layout_store),
            ingredient_columns(),
        );
        let mut dashboard_table = DataTable::new(
            TableConfig::new(DASHBOARD_STORAGE_KEY),
            layout_store,
            price_change_columns(),
        );
        measure_columns(&mut ingredients_table);
        measure_columns(&mut dashboard_table);
        Self {
            ingredients: Page::empty(INGREDIENTS_PER_PAGE),
            ingredients_table,
            ingredients_cursor: TableCursor::default(),
            price_changes: Vec::new(),
            dashboard_table,
            dashboard_cursor: TableCursor::default(),
            dashboard_page: 1,
            tag_editor: TagEditor::default(),
            price_editor: PriceEditor::default(),
            tag_popup: None,
            detail: None,
            pressed_header: None,
            help_visible: false,
            status_token: 0,
        }
    }

    fn cancel_gestures(&mut self) {
        self.ingredients_table.layout_mut().cancel_gesture();
        self.dashboard_table.layout_mut().cancel_gesture();
        self.pressed_header = None;
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    layout_store: Rc<dyn LayoutStore>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        terminal::EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )
    .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(layout_store);
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view_data(state, runtime, &mut view_data) {
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error:#}")));
    }

    let mut screen = Rect::default();
    let mut result: Result<()> = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| {
            screen = frame.area();
            render(frame, state, &view_data);
        }) {
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
        if !has_event {
            continue;
        }
        match event::read().context("read event") {
            Ok(Event::Key(key)) => {
                if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(Event::Mouse(mouse)) => {
                handle_mouse_event(state, &mut view_data, &internal_tx, mouse, screen);
            }
            Ok(Event::FocusLost) => view_data.cancel_gestures(),
            Ok(_) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    view_data.cancel_gestures();
    disable_raw_mode().context("disable raw mode")?;
    execute!(
        io::stdout(),
        DisableFocusChange,
        DisableMouseCapture,
        terminal::LeaveAlternateScreen
    )
    .context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::TagSync(event) => handle_tag_sync_event(state, view_data, tx, event),
        }
    }
}

fn handle_tag_sync_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: TagSyncEvent,
) {
    match event {
        TagSyncEvent::Completed {
            request_id,
            row_id,
            tags,
        } => {
            let outcome = view_data.tag_editor.apply_success(request_id, row_id, &tags);
            if outcome == SyncOutcome::Ignored {
                return;
            }
            if let Some(ingredient) = view_data
                .ingredients
                .items
                .iter_mut()
                .find(|ingredient| ingredient.id.get() == row_id)
            {
                ingredient.tags = tags;
            }
        }
        TagSyncEvent::Failed {
            request_id,
            row_id,
            error,
        } => {
            tracing::warn!(row = row_id, request = request_id, error = %error, "tag sync failed");
            let message = if view_data.tag_editor.apply_failure(request_id, row_id) {
                format!("tag sync failed: {error}; reverted")
            } else {
                format!("tag sync failed: {error}")
            };
            emit_status(state, view_data, tx, message);
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

/// Dispatches and schedules a clear for any status the command set.
fn dispatch(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) -> Vec<AppEvent> {
    let events = state.dispatch(command);
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
    events
}

fn refresh_view_data<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    match state.active_tab {
        TabKind::Ingredients => {
            let page = view_data.ingredients.current_page;
            load_ingredients(runtime, view_data, page)
        }
        TabKind::Dashboard => {
            let changes = runtime
                .load_price_changes()
                .context("load recent price changes")?;
            view_data.price_changes = changes.iter().map(PriceChangeRow::from).collect();
            view_data
                .dashboard_table
                .prune_selection(&view_data.price_changes);
            let last_page = view_data.price_changes.len().div_ceil(DASHBOARD_PER_PAGE).max(1);
            view_data.dashboard_page = view_data.dashboard_page.clamp(1, last_page);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn load_ingredients<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    page: u32,
) -> Result<()> {
    let page = runtime
        .load_ingredients_page(page.max(1))
        .with_context(|| format!("load ingredients page {page}"))?;
    for ingredient in &page.items {
        let row_id = ingredient.id.get();
        view_data.tag_editor.load_row(row_id, &ingredient.tags);
        view_data
            .price_editor
            .load_row(row_id, ingredient.price(), ingredient.last_updated());
    }
    view_data.ingredients = page;
    let rows = ingredient_rows(view_data, OffsetDateTime::now_utc());
    view_data.ingredients_table.prune_selection(&rows);
    tracing::debug!(
        page = view_data.ingredients.current_page,
        rows = rows.len(),
        "loaded ingredients"
    );
    Ok(())
}

fn ingredient_rows(view_data: &ViewData, now: OffsetDateTime) -> Vec<IngredientRow> {
    let editing = view_data.price_editor.editing_row();
    view_data
        .ingredients
        .items
        .iter()
        .map(|ingredient| {
            let id = ingredient.id.get();
            let (price, percent_change, last_updated) = match view_data.price_editor.row(id) {
                Some(row) => (row.price, row.percent_change, row.last_updated),
                None => (ingredient.price(), 0.0, ingredient.last_updated()),
            };
            IngredientRow {
                id,
                name: ingredient.name.clone(),
                unit: ingredient.unit.clone(),
                tags: view_data
                    .tag_editor
                    .tags(id)
                    .iter()
                    .map(|name| (name.clone(), view_data.tag_editor.colour_for(name)))
                    .collect(),
                tags_pending: view_data.tag_editor.is_pending(id),
                price,
                draft: (editing == Some(id))
                    .then(|| view_data.price_editor.draft().unwrap_or_default().to_owned()),
                percent_change,
                last_updated,
                age_days: (now - last_updated).whole_days(),
            }
        })
        .collect()
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
    {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::Search => handle_search_key(state, view_data, internal_tx, key),
        AppMode::TagEditor => handle_tag_popup_key(state, runtime, view_data, internal_tx, key),
        AppMode::PriceEdit => handle_price_key(state, view_data, internal_tx, key),
        AppMode::Detail => {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')
            ) {
                view_data.detail = None;
                dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
            }
        }
        AppMode::Nav => return handle_nav_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            return false;
        }
        KeyCode::Tab => {
            change_tab(state, runtime, view_data, internal_tx, AppCommand::NextTab);
            return false;
        }
        KeyCode::BackTab => {
            change_tab(state, runtime, view_data, internal_tx, AppCommand::PrevTab);
            return false;
        }
        KeyCode::Char('r') => {
            match refresh_view_data(state, runtime, view_data) {
                Ok(()) => emit_status(state, view_data, internal_tx, "reloaded"),
                Err(error) => {
                    emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
                }
            }
            return false;
        }
        KeyCode::Char('/') => {
            dispatch(state, view_data, internal_tx, AppCommand::EnterSearch);
            return false;
        }
        KeyCode::Char('t') => {
            open_tag_editor(state, runtime, view_data, internal_tx);
            return false;
        }
        KeyCode::Char('e') => {
            open_price_editor(state, view_data, internal_tx);
            return false;
        }
        KeyCode::Enter => {
            open_detail(state, runtime, view_data, internal_tx);
            return false;
        }
        KeyCode::Char('n') => {
            change_page(state, runtime, view_data, internal_tx, 1);
            return false;
        }
        KeyCode::Char('p') => {
            change_page(state, runtime, view_data, internal_tx, -1);
            return false;
        }
        _ => {}
    }

    if let Some(message) = table_command_for_key(key)
        .and_then(|command| apply_active_table_command(state, view_data, command))
    {
        emit_status(state, view_data, internal_tx, message);
    }
    false
}

fn change_tab<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = dispatch(state, view_data, internal_tx, command);
    if !events
        .iter()
        .any(|event| matches!(event, AppEvent::TabChanged(_)))
    {
        return;
    }
    view_data.tag_popup = None;
    view_data.detail = None;
    view_data.cancel_gestures();
    if let Err(error) = refresh_view_data(state, runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
    }
}

fn change_page<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: i32,
) {
    match state.active_tab {
        TabKind::Ingredients => {
            let page = &view_data.ingredients;
            let blocked = if delta > 0 {
                !page.has_next()
            } else {
                !page.has_prev()
            };
            if blocked {
                let edge = if delta > 0 { "last" } else { "first" };
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("already on the {edge} page"),
                );
                return;
            }
            let target = page.current_page.saturating_add_signed(delta);
            view_data.ingredients_cursor.row = 0;
            if let Err(error) = load_ingredients(runtime, view_data, target) {
                emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
            }
        }
        TabKind::Dashboard => {
            let view = view_data.dashboard_table.view(&view_data.price_changes);
            let current = paginate(&view, view_data.dashboard_page, DASHBOARD_PER_PAGE);
            let target = current.page.saturating_add_signed(delta as isize);
            let next = paginate(&view, target, DASHBOARD_PER_PAGE).page;
            if next == current.page {
                let edge = if delta > 0 { "last" } else { "first" };
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("already on the {edge} page"),
                );
                return;
            }
            view_data.dashboard_page = next;
            view_data.dashboard_cursor.row = 0;
        }
        _ => {}
    }
}

fn current_row_id(state: &AppState, view_data: &ViewData) -> Option<i64> {
    match state.active_tab {
        TabKind::Ingredients => {
            let rows = ingredient_rows(view_data, OffsetDateTime::now_utc());
            let view = view_data.ingredients_table.view(&rows);
            view.get(view_data.ingredients_cursor.row)
                .map(|row| row.id)
        }
        TabKind::Dashboard => visible_rows(
            &view_data.dashboard_table,
            &view_data.price_changes,
            Some(view_data.dashboard_page),
        )
        .get(view_data.dashboard_cursor.row)
        .map(|row| row.id),
        _ => None,
    }
}

fn ingredient_name(view_data: &ViewData, row_id: i64) -> String {
    view_data
        .ingredients
        .items
        .iter()
        .find(|ingredient| ingredient.id.get() == row_id)
        .map_or_else(|| format!("ingredient {row_id}"), |ingredient| ingredient.name.clone())
}

fn open_detail<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_tab.is_placeholder() {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("{} is coming soon", state.active_tab.label()),
        );
        return;
    }
    let Some(row_id) = current_row_id(state, view_data) else {
        emit_status(state, view_data, internal_tx, "no ingredient selected");
        return;
    };
    match runtime.load_ingredient(IngredientId::new(row_id)) {
        Ok(Some(ingredient)) => {
            view_data.detail = Some(ingredient);
            dispatch(state, view_data, internal_tx, AppCommand::OpenDetail);
        }
        Ok(None) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("ingredient {row_id} no longer exists"),
        ),
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("load failed: {error:#}"),
        ),
    }
}

fn handle_search_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let mut query = active_query(state, view_data);
    match key.code {
        KeyCode::Enter => {
            dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
            return;
        }
        KeyCode::Esc => {
            set_active_query(state, view_data, String::new());
            dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
            return;
        }
        KeyCode::Backspace => {
            query.pop();
        }
        KeyCode::Char(ch) => query.push(ch),
        _ => return,
    }
    set_active_query(state, view_data, query);
}

fn active_query(state: &AppState, view_data: &ViewData) -> String {
    match state.active_tab {
        TabKind::Ingredients => view_data.ingredients_table.query().to_owned(),
        TabKind::Dashboard => view_data.dashboard_table.query().to_owned(),
        _ => String::new(),
    }
}

fn set_active_query(state: &AppState, view_data: &mut ViewData, query: String) {
    match state.active_tab {
        TabKind::Ingredients => {
            view_data.ingredients_table.set_query(query);
            view_data.ingredients_cursor.row = 0;
        }
        TabKind::Dashboard => {
            view_data.dashboard_table.set_query(query);
            view_data.dashboard_cursor.row = 0;
            view_data.dashboard_page = 1;
        }
        _ => {}
    }
}

fn open_tag_editor<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    dispatch(state, view_data, internal_tx, AppCommand::OpenTagEditor);
    if state.mode != AppMode::TagEditor {
        return;
    }
    let Some(row_id) = current_row_id(state, view_data) else {
        state.dispatch(AppCommand::ExitToNav);
        emit_status(state, view_data, internal_tx, "no ingredient selected");
        return;
    };
    view_data.tag_popup = Some(TagPopup::new(row_id));
    if let Err(error) = refresh_tag_matches(runtime, view_data) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("tag search failed: {error:#}"),
        );
    }
}

/// Reloads popup matches for the current query, leaving out tags the row
/// already carries.
fn refresh_tag_matches<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    let Some((row_id, query)) = view_data
        .tag_popup
        .as_ref()
        .map(|popup| (popup.row_id, popup.query.clone()))
    else {
        return Ok(());
    };
    let found = runtime.search_tags(&query)?;
    view_data.tag_editor.remember(&found);
    let row_tags = view_data.tag_editor.tags(row_id);
    let matches = found
        .into_iter()
        .filter(|tag| !row_tags.contains(&tag.name))
        .collect();
    if let Some(popup) = view_data.tag_popup.as_mut() {
        popup.matches = matches;
        popup.match_cursor = 0;
    }
    Ok(())
}

fn handle_tag_popup_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(popup) = view_data.tag_popup.as_mut() else {
        dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    };
    let row_id = popup.row_id;
    let row_tags = view_data.tag_editor.tags(row_id);
    let action = match key.code {
        KeyCode::Esc => TagAction::Close,
        KeyCode::Tab => {
            popup.colour = next_colour(popup.colour);
            TagAction::Nothing
        }
        KeyCode::Up => {
            popup.match_cursor = popup.match_cursor.saturating_sub(1);
            TagAction::Nothing
        }
        KeyCode::Down => {
            if popup.match_cursor + 1 < popup.matches.len() {
                popup.match_cursor += 1;
            }
            TagAction::Nothing
        }
        KeyCode::Left => {
            popup.tag_cursor = popup.tag_cursor.saturating_sub(1);
            TagAction::Nothing
        }
        KeyCode::Right => {
            if popup.tag_cursor + 1 < row_tags.len() {
                popup.tag_cursor += 1;
            }
            TagAction::Nothing
        }
        KeyCode::Delete => row_tags
            .get(popup.tag_cursor)
            .map_or(TagAction::Nothing, |name| TagAction::Remove(name.clone())),
        KeyCode::Backspace => {
            popup.query.pop();
            TagAction::Refresh
        }
        KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            TagAction::Create(popup.query.clone(), popup.colour)
        }
        KeyCode::Enter => match popup.matches.get(popup.match_cursor) {
            Some(tag) => TagAction::AddExisting(tag.name.clone()),
            None => TagAction::Create(popup.query.clone(), popup.colour),
        },
        KeyCode::Char(ch) => {
            popup.query.push(ch);
            TagAction::Refresh
        }
        _ => TagAction::Nothing,
    };

    let request = match action {
        TagAction::Nothing => return,
        TagAction::Close => {
            close_tag_popup(state, view_data, internal_tx);
            return;
        }
        TagAction::Refresh => None,
        TagAction::AddExisting(name) => view_data.tag_editor.add_existing(row_id, &name),
        TagAction::Create(name, colour) => {
            match view_data.tag_editor.create_and_add(row_id, &name, colour) {
                Some(request) => Some(request),
                None => {
                    close_tag_popup(state, view_data, internal_tx);
                    return;
                }
            }
        }
        TagAction::Remove(name) => view_data.tag_editor.remove_tag(row_id, &name),
    };

    if let Some(request) = request {
        if let Some(popup) = view_data.tag_popup.as_mut() {
            popup.query.clear();
        }
        submit_tag_sync(state, runtime, view_data, internal_tx, request);
    }
    let tag_count = view_data.tag_editor.tags(row_id).len();
    if let Some(popup) = view_data.tag_popup.as_mut() {
        popup.tag_cursor = popup.tag_cursor.min(tag_count.saturating_sub(1));
    }
    if let Err(error) = refresh_tag_matches(runtime, view_data) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("tag search failed: {error:#}"),
        );
    }
}

fn close_tag_popup(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    view_data.tag_popup = None;
    dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
}

fn submit_tag_sync<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    request: SyncRequest,
) {
    let (request_id, row_id) = (request.request_id, request.row_id);
    tracing::debug!(row = row_id, request = request_id, tags = ?request.names, "syncing tags");
    if let Err(error) = runtime.spawn_tag_sync(request, internal_tx.clone()) {
        handle_tag_sync_event(
            state,
            view_data,
            internal_tx,
            TagSyncEvent::Failed {
                request_id,
                row_id,
                error: format!("{error:#}"),
            },
        );
    }
}

fn next_colour(colour: Option<TagColour>) -> Option<TagColour> {
    match colour {
        None => Some(TagColour::ALL[0]),
        Some(colour) if colour == TagColour::ALL[TagColour::ALL.len() - 1] => None,
        Some(colour) => Some(colour.cycle(1)),
    }
}

fn open_price_editor(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    dispatch(state, view_data, internal_tx, AppCommand::OpenPriceEditor);
    if state.mode != AppMode::PriceEdit {
        return;
    }
    let started = current_row_id(state, view_data).is_some_and(|row_id| {
        view_data
            .price_editor
            .begin_edit(row_id, OffsetDateTime::now_utc())
    });
    if !started {
        state.dispatch(AppCommand::ExitToNav);
        emit_status(state, view_data, internal_tx, "no ingredient selected");
    }
}

fn handle_price_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.price_editor.cancel();
            dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
        }
        KeyCode::Enter => commit_price_edit(state, view_data, internal_tx),
        KeyCode::Up | KeyCode::Down => {
            commit_price_edit(state, view_data, internal_tx);
            let delta = if key.code == KeyCode::Up { -1 } else { 1 };
            apply_active_table_command(state, view_data, TableCommand::MoveRow(delta));
        }
        KeyCode::Backspace => view_data.price_editor.backspace(),
        KeyCode::Char(ch) if ch.is_ascii_digit() || ch == '.' || ch == '-' => {
            view_data.price_editor.push_char(ch);
        }
        _ => {}
    }
}

fn commit_price_edit(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(row_id) = view_data.price_editor.editing_row() else {
        dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    };
    let name = ingredient_name(view_data, row_id);
    let message = view_data
        .price_editor
        .commit(OffsetDateTime::now_utc())
        .map(|row| price_status(&name, row));
    dispatch(state, view_data, internal_tx, AppCommand::ExitToNav);
    if let Some(message) = message {
        emit_status(state, view_data, internal_tx, message);
    }
}

fn price_status(name: &str, row: &PriceRow) -> String {
    match row.price {
        Some(price) => format!(
            "{name} price set to {} ({})",
            format_dollars(price),
            format_change(row.percent_change)
        ),
        None => format!("{name} price cleared"),
    }
}

fn table_command_for_key(key: KeyEvent) -> Option<TableCommand> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(TableCommand::MoveRow(1)),
        KeyCode::Char('k') | KeyCode::Up => Some(TableCommand::MoveRow(-1)),
        KeyCode::Char('h') | KeyCode::Left => Some(TableCommand::MoveCol(-1)),
        KeyCode::Char('l') | KeyCode::Right => Some(TableCommand::MoveCol(1)),
        KeyCode::Char('s') => Some(TableCommand::Sort),
        KeyCode::Char(' ') => Some(TableCommand::ToggleRow),
        KeyCode::Char('a') => Some(TableCommand::ToggleAll),
        KeyCode::Char('c') => Some(TableCommand::HideColumn),
        KeyCode::Char('C') => Some(TableCommand::ShowAll),
        KeyCode::Char('<') => Some(TableCommand::ShiftColumn(-1)),
        KeyCode::Char('>') => Some(TableCommand::ShiftColumn(1)),
        KeyCode::Char('+') => Some(TableCommand::Resize(RESIZE_STEP_PX)),
        KeyCode::Char('-') => Some(TableCommand::Resize(-RESIZE_STEP_PX)),
        _ => None,
    }
}

fn apply_active_table_command(
    state: &AppState,
    view_data: &mut ViewData,
    command: TableCommand,
) -> Option<String> {
    match state.active_tab {
        TabKind::Ingredients => {
            let rows = ingredient_rows(view_data, OffsetDateTime::now_utc());
            apply_table_command(
                &mut view_data.ingredients_table,
                &rows,
                &mut view_data.ingredients_cursor,
                None,
                command,
            )
        }
        TabKind::Dashboard => apply_table_command(
            &mut view_data.dashboard_table,
            &view_data.price_changes,
            &mut view_data.dashboard_cursor,
            Some(view_data.dashboard_page),
            command,
        ),
        tab => Some(format!("{} is coming soon", tab.label())),
    }
}

/// Rows on screen: filtered and sorted, then paged when `page` is set.
fn visible_rows<'a, R: TableRow>(
    table: &LayoutTable<R>,
    rows: &'a [R],
    page: Option<usize>,
) -> Vec<&'a R> {
    let view = table.view(rows);
    match page {
        Some(page) => paginate(&view, page, DASHBOARD_PER_PAGE).items.to_vec(),
        None => view,
    }
}

fn shift(index: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    index
        .saturating_add_signed(delta)
        .min(len - 1)
}

fn apply_table_command<R: TableRow>(
    table: &mut LayoutTable<R>,
    rows: &[R],
    cursor: &mut TableCursor,
    page: Option<usize>,
    command: TableCommand,
) -> Option<String> {
    let visible_ids = visible_rows(table, rows, page)
        .into_iter()
        .map(TableRow::row_id)
        .collect::<Vec<_>>();
    let columns = table
        .visible_columns()
        .iter()
        .map(|column| (column.id, column.label))
        .collect::<Vec<_>>();
    cursor.clamp(visible_ids.len(), columns.len());
    let current = columns.get(cursor.col).copied();

    match command {
        TableCommand::MoveRow(delta) => {
            cursor.row = shift(cursor.row, delta, visible_ids.len());
            None
        }
        TableCommand::MoveCol(delta) => {
            cursor.col = shift(cursor.col, delta, columns.len());
            None
        }
        TableCommand::Sort => current.map(|(id, _)| sort_message(table, id)),
        TableCommand::ToggleRow => {
            let id = *visible_ids.get(cursor.row)?;
            table.toggle_one(id);
            Some(format!("{} selected", table.selection().len()))
        }
        TableCommand::ToggleAll => {
            table.toggle_all(rows);
            Some(format!("{} selected", table.selection().len()))
        }
        TableCommand::HideColumn => {
            let (id, label) = current?;
            if table.layout_mut().set_visible(id, false) {
                cursor.col = cursor.col.min(columns.len().saturating_sub(2));
                Some(format!("hid {}", label.to_lowercase()))
            } else {
                Some(format!("{} cannot be hidden", label.to_lowercase()))
            }
        }
        TableCommand::ShowAll => {
            let hidden = table.layout().hidden_count();
            table.layout_mut().show_all();
            Some(if hidden == 0 {
                "all columns already shown".to_owned()
            } else {
                format!("showing {hidden} hidden column(s)")
            })
        }
        TableCommand::ShiftColumn(delta) => {
            let (id, label) = current?;
            let target_index = cursor.col.checked_add_signed(delta)?;
            let (target, _) = *columns.get(target_index)?;
            if table.layout_mut().move_column(id, target) {
                cursor.col = target_index;
                Some(format!("moved {}", label.to_lowercase()))
            } else {
                Some(format!("{} cannot move there", label.to_lowercase()))
            }
        }
        TableCommand::Resize(delta) => {
            let (id, label) = current?;
            let layout = table.layout_mut();
            if !layout.begin_resize(id, 0) {
                return Some(format!("{} cannot be resized", label.to_lowercase()));
            }
            let width = layout.resize_to(delta);
            layout.finish_gesture(None);
            width.map(|width| format!("{} width {width}px", label.to_lowercase()))
        }
    }
}

fn column_label<R: TableRow>(table: &LayoutTable<R>, id: &str) -> String {
    table
        .column(id)
        .map_or_else(|| id.to_owned(), |column| column.label.to_lowercase())
}

fn sort_message<R: TableRow>(table: &mut LayoutTable<R>, id: &str) -> String {
    let label = column_label(table, id);
    match table.cycle_sort(id) {
        SortOutcome::Sorted(direction) => format!("sorted by {label} {}", direction.label()),
        SortOutcome::Cleared => "sort cleared".to_owned(),
        SortOutcome::Unavailable => format!("{label} is not sortable"),
    }
}

fn measure_columns<R: TableRow>(table: &mut LayoutTable<R>) {
    let natural = table
        .columns()
        .iter()
        .map(|column| (column.id, natural_width(column.label)))
        .collect::<Vec<_>>();
    for (id, width) in natural {
        table.layout_mut().measure(id, Some(width));
    }
}

/// Header text plus room for the sort arrow, in pixels.
fn natural_width(label: &str) -> u32 {
    (label.chars().count() as u32 + 4) * PX_PER_CELL
}

fn cell_width(px: u32) -> u16 {
    u16::try_from((px / PX_PER_CELL).max(1)).unwrap_or(u16::MAX)
}

fn header_row(area: Rect) -> u16 {
    area.y + 1
}

/// Screen columns occupied by each visible header. Mirrors the widths
/// `render_data_table` lays out.
fn header_spans<R: TableRow>(table: &LayoutTable<R>, area: Rect) -> Vec<HeaderSpan> {
    let mut x = area.x + 1 + SELECT_COLUMN_CELLS + 1;
    table
        .visible_columns()
        .iter()
        .map(|column| {
            let width = cell_width(table.layout().width(column.id));
            let span = HeaderSpan {
                id: column.id,
                start: x,
                end: x.saturating_add(width),
            };
            x = span.end.saturating_add(1);
            span
        })
        .collect()
}

fn handle_mouse_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
    screen: Rect,
) {
    if state.mode != AppMode::Nav || view_data.help_visible {
        return;
    }
    let area = screen_layout(screen)[1];
    let message = match state.active_tab {
        TabKind::Ingredients => table_mouse(
            &mut view_data.ingredients_table,
            &mut view_data.pressed_header,
            area,
            mouse,
        ),
        TabKind::Dashboard => table_mouse(
            &mut view_data.dashboard_table,
            &mut view_data.pressed_header,
            area,
            mouse,
        ),
        _ => None,
    };
    if let Some(message) = message {
        emit_status(state, view_data, internal_tx, message);
    }
}

/// Header gestures: press on a right edge to resize, press and release on
/// the same header to sort, drag onto another header to reorder.
fn table_mouse<R: TableRow>(
    table: &mut LayoutTable<R>,
    pressed: &mut Option<&'static str>,
    area: Rect,
    mouse: MouseEvent,
) -> Option<String> {
    let spans = header_spans(table, area);
    let on_header = mouse.row == header_row(area);
    let x = i64::from(mouse.column) * i64::from(PX_PER_CELL);
    let under = spans
        .iter()
        .find(|span| on_header && span.contains(mouse.column))
        .map(|span| span.id);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if !on_header {
                return None;
            }
            if let Some(edge) = spans.iter().find(|span| span.end == mouse.column) {
                table.layout_mut().begin_resize(edge.id, x);
                return None;
            }
            *pressed = under;
            if let Some(id) = under {
                table.layout_mut().begin_reorder(id);
            }
            None
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            table.layout_mut().resize_to(x);
            None
        }
        MouseEventKind::Up(MouseButton::Left) => {
            let pressed = pressed.take();
            if let Some(Gesture::Resize { column, .. }) = table.layout().gesture() {
                let column = column.clone();
                table.layout_mut().finish_gesture(None);
                return Some(format!(
                    "{} width {}px",
                    column_label(table, &column),
                    table.layout().width(&column)
                ));
            }
            if let Some(id) = pressed.filter(|id| under == Some(*id)) {
                table.layout_mut().cancel_gesture();
                return Some(sort_message(table, id));
            }
            table
                .layout_mut()
                .finish_gesture(under)
                .then(|| "column moved".to_owned())
        }
        _ => None,
    }
}

fn screen_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(area)
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = screen_layout(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(TabKind::ALL.iter().map(|tab| tab.label()).collect::<Vec<_>>())
        .block(Block::default().title("boh").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.active_tab {
        TabKind::Ingredients => {
            let rows = ingredient_rows(view_data, OffsetDateTime::now_utc());
            let view = view_data.ingredients_table.view(&rows);
            render_data_table(
                frame,
                layout[1],
                &view_data.ingredients_table,
                &view,
                view_data.ingredients_cursor,
                ingredients_title(view_data),
            );
        }
        TabKind::Dashboard => {
            let view = view_data.dashboard_table.view(&view_data.price_changes);
            let page = paginate(&view, view_data.dashboard_page, DASHBOARD_PER_PAGE);
            let title = format!(
                "recent price changes  page {}/{}  {} total",
                page.page, page.last_page, page.total
            );
            render_data_table(
                frame,
                layout[1],
                &view_data.dashboard_table,
                page.items,
                view_data.dashboard_cursor,
                title,
            );
        }
        tab => {
            let body = Paragraph::new(format!("{} is coming soon", tab.label()))
                .block(Block::default().borders(Borders::ALL).title(tab.label()));
            frame.render_widget(body, layout[1]);
        }
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(popup) = &view_data.tag_popup {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_tag_popup_lines(popup, view_data))
            .block(Block::default().title("tags").borders(Borders::ALL));
        frame.render_widget(widget, area);
    }

    if let Some(ingredient) = &view_data.detail {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_detail_text(ingredient))
            .block(Block::default().title("ingredient").borders(Borders::ALL));
        frame.render_widget(widget, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_data_table<R: ViewRow>(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    table: &LayoutTable<R>,
    rows: &[&R],
    cursor: TableCursor,
    title: String,
) {
    let columns = table.visible_columns();
    let ids = rows.iter().map(|row| row.row_id()).collect::<Vec<_>>();

    let mut widths = vec![Constraint::Length(SELECT_COLUMN_CELLS)];
    widths.extend(
        columns
            .iter()
            .map(|column| Constraint::Length(cell_width(table.layout().width(column.id)))),
    );

    let bold = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let mut header_cells =
        vec![Cell::from(selection_marker(table.selection().state(&ids))).style(bold)];
    header_cells.extend(columns.iter().enumerate().map(|(index, column)| {
        let style = if index == cursor.col {
            bold.fg(Color::Cyan)
        } else {
            bold
        };
        Cell::from(header_label(table, column.id, column.label)).style(style)
    }));

    let body = rows.iter().copied().enumerate().map(|(index, row)| {
        let on_cursor = index == cursor.row;
        let marker = if table.selection().is_selected(row.row_id()) {
            "[x]"
        } else {
            "[ ]"
        };
        let mut cells = vec![Cell::from(marker)];
        cells.extend(columns.iter().enumerate().map(|(col, column)| {
            let cell = Cell::from(row.cell_line(column.id, column.render(row)));
            if on_cursor && col == cursor.col {
                cell.style(
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                cell
            }
        }));
        let row_widget = Row::new(cells);
        if on_cursor {
            row_widget.style(Style::default().bg(Color::DarkGray))
        } else {
            row_widget
        }
    });

    let widget = Table::new(body, widths)
        .header(Row::new(header_cells))
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn header_label<R: TableRow>(table: &LayoutTable<R>, id: &str, label: &str) -> String {
    match table.sort_state().direction_for(id) {
        Some(SortDirection::Asc) => format!("{label} ↑"),
        Some(SortDirection::Desc) => format!("{label} ↓"),
        None => label.to_owned(),
    }
}

fn selection_marker(state: SelectionState) -> &'static str {
    match state {
        SelectionState::All => "[x]",
        SelectionState::Some => "[-]",
        SelectionState::None => "[ ]",
    }
}

fn ingredients_title(view_data: &ViewData) -> String {
    let page = &view_data.ingredients;
    let table = &view_data.ingredients_table;
    let mut parts = vec![
        "ingredients".to_owned(),
        format!("page {}/{}", page.current_page, page.last_page),
        format!("{} total", page.total),
    ];
    if !table.query().is_empty() {
        parts.push(format!("filter \"{}\"", table.query()));
    }
    if !table.selection().is_empty() {
        parts.push(format!("{} selected", table.selection().len()));
    }
    let hidden = table.layout().hidden_count();
    if hidden > 0 {
        parts.push(format!("{hidden} hidden"));
    }
    parts.join("  ")
}

fn render_tag_popup_lines(popup: &TagPopup, view_data: &ViewData) -> Vec<Line<'static>> {
    let editor = &view_data.tag_editor;
    let mut current = vec![Span::raw("tags: ")];
    let tags = editor.tags(popup.row_id);
    if tags.is_empty() {
        current.push(Span::styled("none", Style::default().fg(Color::DarkGray)));
    }
    for (index, name) in tags.iter().enumerate() {
        let mut style = Style::default().fg(tag_colour(editor.colour_for(name)));
        if index == popup.tag_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        current.push(Span::styled(format!("[{name}]"), style));
        current.push(Span::raw(" "));
    }
    if editor.is_pending(popup.row_id) {
        current.push(Span::styled("saving…", Style::default().fg(Color::DarkGray)));
    }

    let colour_label = popup.colour.map_or("none", TagColour::as_str);
    let mut lines = vec![
        Line::from(ingredient_name(view_data, popup.row_id)),
        Line::from(current),
        Line::from(format!("search: {}▏", popup.query)),
        Line::from(vec![
            Span::raw("new tag colour: "),
            Span::styled(
                colour_label.to_owned(),
                Style::default().fg(tag_colour(popup.colour)),
            ),
        ]),
        Line::from(String::new()),
    ];
    if popup.matches.is_empty() {
        let hint = if popup.query.trim().is_empty() {
            "no more tags".to_owned()
        } else {
            format!("enter creates \"{}\"", popup.query.trim())
        };
        lines.push(Line::styled(hint, Style::default().fg(Color::DarkGray)));
    }
    for (index, tag) in popup.matches.iter().enumerate() {
        let prefix = if index == popup.match_cursor { "> " } else { "  " };
        lines.push(Line::from(vec![
            Span::raw(prefix),
            Span::styled(tag.name.clone(), Style::default().fg(tag_colour(tag.colour))),
        ]));
    }
    lines
}

fn render_detail_text(ingredient: &Ingredient) -> String {
    let cost = ingredient
        .cost_cents
        .map_or_else(|| "N/A".to_owned(), format_cents);
    let notes = if ingredient.notes.is_empty() {
        "-"
    } else {
        ingredient.notes.as_str()
    };
    [
        ingredient.name.clone(),
        String::new(),
        format!("unit: {}", ingredient.unit),
        format!("cost per unit: {cost}"),
        format!("notes: {notes}"),
        format!("created: {}", ingredient.created_at.date()),
        format!("updated: {}", ingredient.updated_at.date()),
    ]
    .join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    match state.mode {
        AppMode::Nav => {
            "tab switch | / search | s sort | t tags | e price | enter view | ? help | q quit"
                .to_owned()
        }
        AppMode::Search => format!(
            "search: {}▏  (enter keep, esc clear)",
            active_query(state, view_data)
        ),
        AppMode::TagEditor => {
            "type search | enter add | ctrl+n create | tab colour | left/right del remove | esc close"
                .to_owned()
        }
        AppMode::PriceEdit => "type price | enter save | esc cancel".to_owned(),
        AppMode::Detail => "esc close".to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help | tab/shift+tab switch tabs | r reload\n\
table: j/k rows | h/l columns | s sort | / search | space select | a select all\n\
columns: c hide | C show all | < > move | + - resize | mouse: drag header, drag edge, click sorts\n\
ingredients: t tags | e price | enter details | n/p page\n\
tags: type search | enter add | ctrl+n create | tab colour | left/right + del remove | esc close\n\
price: digits | enter save | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}

fn format_change(percent: f64) -> String {
    if percent > 0.0 {
        format!("▲ {percent:.1}%")
    } else if percent < 0.0 {
        format!("▼ {percent:.1}%")
    } else {
        "— 0.0%".to_owned()
    }
}

/// Increases are bad news for the kitchen.
fn change_style(percent: f64) -> Style {
    if percent > 0.0 {
        Style::default().fg(Color::Red)
    } else if percent < 0.0 {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn relative_label(age_days: i64) -> String {
    match age_days {
        days if days <= 0 => "today".to_owned(),
        1 => "yesterday".to_owned(),
        days if days < 7 => format!("{days} days ago"),
        days => {
            let weeks = days / 7;
            let plural = if weeks > 1 { "s" } else { "" };
            format!("{weeks} week{plural} ago")
        }
    }
}

fn age_style(age_days: i64) -> Style {
    if age_days > 14 {
        Style::default().fg(Color::Red)
    } else if age_days >= 7 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn tag_colour(colour: Option<TagColour>) -> Color {
    match colour {
        None | Some(TagColour::Default) => Color::Gray,
        Some(TagColour::Primary) => Color::Blue,
        Some(TagColour::Secondary) => Color::Magenta,
        Some(TagColour::Success | TagColour::Green) => Color::Green,
        Some(TagColour::Warning) => Color::Yellow,
        Some(TagColour::Info | TagColour::Cyan) => Color::Cyan,
        Some(TagColour::Neutral) => Color::DarkGray,
        Some(TagColour::Red) => Color::Red,
        Some(TagColour::Orange) => Color::Indexed(208),
        Some(TagColour::Amber) => Color::Indexed(214),
        Some(TagColour::Lime) => Color::LightGreen,
        Some(TagColour::Teal) => Color::Indexed(30),
        Some(TagColour::Blue) => Color::LightBlue,
        Some(TagColour::Indigo) => Color::Indexed(62),
        Some(TagColour::Violet) => Color::Indexed(135),
        Some(TagColour::Purple) => Color::Indexed(93),
        Some(TagColour::Pink) => Color::Indexed(205),
    }
}
