// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Column definitions, sorting, name filtering, selection and client-side
//! paging for tabular views.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use time::OffsetDateTime;

use crate::SortDirection;
use crate::layout::{ColumnLayout, LayoutColumn, LayoutStore, TableConfig};

pub trait TableRow {
    fn row_id(&self) -> i64;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Text(String),
    Number(f64),
    Date(OffsetDateTime),
}

impl SortKey {
    fn text(&self) -> String {
        match self {
            Self::Text(value) => value.to_lowercase(),
            Self::Number(value) => value.to_string(),
            Self::Date(value) => value.unix_timestamp_nanos().to_string(),
        }
    }
}

pub fn compare_keys(left: &SortKey, right: &SortKey) -> Ordering {
    match (left, right) {
        (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
        _ => left.text().cmp(&right.text()),
    }
}

pub enum ColumnSort<R> {
    Text,
    Key(fn(&R) -> SortKey),
    Comparator(fn(&R, &R) -> Ordering),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFlags {
    pub sortable: bool,
    pub draggable: bool,
    pub resizable: bool,
    pub hideable: bool,
}

impl Default for ColumnFlags {
    fn default() -> Self {
        Self {
            sortable: false,
            draggable: true,
            resizable: true,
            hideable: true,
        }
    }
}

pub struct Column<R> {
    pub id: &'static str,
    pub label: &'static str,
    pub cell: fn(&R) -> String,
    pub sort: ColumnSort<R>,
    pub flags: ColumnFlags,
}

impl<R> Column<R> {
    pub fn new(id: &'static str, label: &'static str, cell: fn(&R) -> String) -> Self {
        Self {
            id,
            label,
            cell,
            sort: ColumnSort::Text,
            flags: ColumnFlags::default(),
        }
    }

    pub fn sortable(mut self) -> Self {
        self.flags.sortable = true;
        self
    }

    pub fn sort_key(mut self, key: fn(&R) -> SortKey) -> Self {
        self.sort = ColumnSort::Key(key);
        self
    }

    pub fn comparator(mut self, compare: fn(&R, &R) -> Ordering) -> Self {
        self.sort = ColumnSort::Comparator(compare);
        self
    }

    /// Pinned in place: cannot be dragged, resized or hidden.
    pub fn fixed(mut self) -> Self {
        self.flags.draggable = false;
        self.flags.resizable = false;
        self.flags.hideable = false;
        self
    }

    pub fn is_sortable(&self) -> bool {
        self.flags.sortable || !matches!(self.sort, ColumnSort::Text)
    }

    pub fn render(&self, row: &R) -> String {
        (self.cell)(row)
    }

    /// Ascending comparison: comparator, then key extractor, then the
    /// lowercased cell text.
    pub fn compare(&self, left: &R, right: &R) -> Ordering {
        match &self.sort {
            ColumnSort::Comparator(compare) => compare(left, right),
            ColumnSort::Key(key) => compare_keys(&key(left), &key(right)),
            ColumnSort::Text => self
                .render(left)
                .to_lowercase()
                .cmp(&self.render(right).to_lowercase()),
        }
    }

    pub fn layout_column(&self) -> LayoutColumn {
        LayoutColumn {
            id: self.id.to_owned(),
            draggable: self.flags.draggable,
            resizable: self.flags.resizable,
            hideable: self.flags.hideable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortState {
    active: Option<(String, SortDirection)>,
}

impl SortState {
    pub fn active(&self) -> Option<(&str, SortDirection)> {
        self.active
            .as_ref()
            .map(|(column, direction)| (column.as_str(), *direction))
    }

    pub fn direction_for(&self, column: &str) -> Option<SortDirection> {
        match &self.active {
            Some((active, direction)) if active == column => Some(*direction),
            _ => None,
        }
    }

    /// none → asc → desc → none on one column; another column restarts at asc.
    pub fn cycle(&mut self, column: &str) -> Option<SortDirection> {
        let next = match self.direction_for(column) {
            None => Some(SortDirection::Asc),
            Some(SortDirection::Asc) => Some(SortDirection::Desc),
            Some(SortDirection::Desc) => None,
        };
        self.active = next.map(|direction| (column.to_owned(), direction));
        next
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Stable sort; without an active sort (or an unknown column) input order is
/// kept.
pub fn sort_rows<'a, R>(rows: Vec<&'a R>, sort: &SortState, columns: &[Column<R>]) -> Vec<&'a R> {
    let Some((column_id, direction)) = sort.active() else {
        return rows;
    };
    let Some(column) = columns.iter().find(|column| column.id == column_id) else {
        return rows;
    };
    let mut rows = rows;
    rows.sort_by(|left, right| {
        let ordering = column.compare(left, right);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    rows
}

pub fn filter_by_name<'a, R: TableRow>(rows: &'a [R], query: &str) -> Vec<&'a R> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.iter().collect();
    }
    rows.iter()
        .filter(|row| row.name().to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    None,
    Some,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSelection {
    selected: BTreeSet<i64>,
}

impl RowSelection {
    pub fn is_selected(&self, id: i64) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.selected.iter().copied()
    }

    pub fn toggle_one(&mut self, id: i64) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Removes every visible id when all are selected, otherwise adds the
    /// missing ones. Ids outside `visible` are untouched.
    pub fn toggle_all(&mut self, visible: &[i64]) {
        if visible.is_empty() {
            return;
        }
        if self.all_selected(visible) {
            for id in visible {
                self.selected.remove(id);
            }
        } else {
            self.selected.extend(visible.iter().copied());
        }
    }

    pub fn all_selected(&self, visible: &[i64]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.selected.contains(id))
    }

    pub fn some_selected(&self, visible: &[i64]) -> bool {
        visible.iter().any(|id| self.selected.contains(id)) && !self.all_selected(visible)
    }

    pub fn state(&self, visible: &[i64]) -> SelectionState {
        if self.all_selected(visible) {
            SelectionState::All
        } else if self.some_selected(visible) {
            SelectionState::Some
        } else {
            SelectionState::None
        }
    }

    pub fn retain(&mut self, known: &BTreeSet<i64>) {
        self.selected.retain(|id| known.contains(id));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSlice<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub last_page: usize,
    pub total: usize,
}

/// 1-based client-side paging; out-of-range pages clamp to the nearest valid
/// page.
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> PageSlice<'_, T> {
    let per_page = per_page.max(1);
    let last_page = items.len().div_ceil(per_page).max(1);
    let page = page.clamp(1, last_page);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(items.len());
    PageSlice {
        items: &items[start..end],
        page,
        last_page,
        total: items.len(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    Unavailable,
    Sorted(SortDirection),
    Cleared,
}

/// Columns plus the layout, sort, filter and selection state of one table.
pub struct DataTable<R, S: LayoutStore> {
    columns: Vec<Column<R>>,
    layout: ColumnLayout<S>,
    sort: SortState,
    selection: RowSelection,
    query: String,
}

impl<R: TableRow, S: LayoutStore> DataTable<R, S> {
    pub fn new(config: TableConfig, store: S, columns: Vec<Column<R>>) -> Self {
        let layout_columns = columns.iter().map(Column::layout_column).collect();
        Self {
            layout: ColumnLayout::new(config, store, layout_columns),
            columns,
            sort: SortState::default(),
            selection: RowSelection::default(),
            query: String::new(),
        }
    }

    pub fn columns(&self) -> &[Column<R>] {
        &self.columns
    }

    pub fn column(&self, id: &str) -> Option<&Column<R>> {
        self.columns.iter().find(|column| column.id == id)
    }

    /// Visible columns in display order.
    pub fn visible_columns(&self) -> Vec<&Column<R>> {
        self.layout
            .visible_order()
            .into_iter()
            .filter_map(|id| self.column(id))
            .collect()
    }

    pub fn layout(&self) -> &ColumnLayout<S> {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut ColumnLayout<S> {
        &mut self.layout
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn cycle_sort(&mut self, column_id: &str) -> SortOutcome {
        if !self.column(column_id).is_some_and(Column::is_sortable) {
            return SortOutcome::Unavailable;
        }
        match self.sort.cycle(column_id) {
            Some(direction) => SortOutcome::Sorted(direction),
            None => SortOutcome::Cleared,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Filtered by name, then sorted.
    pub fn view<'a>(&self, rows: &'a [R]) -> Vec<&'a R> {
        sort_rows(filter_by_name(rows, &self.query), &self.sort, &self.columns)
    }

    pub fn visible_ids(&self, rows: &[R]) -> Vec<i64> {
        self.view(rows).into_iter().map(TableRow::row_id).collect()
    }

    pub fn selection(&self) -> &RowSelection {
        &self.selection
    }

    pub fn toggle_one(&mut self, id: i64) -> bool {
        self.selection.toggle_one(id)
    }

    pub fn toggle_all(&mut self, rows: &[R]) {
        let visible = self.visible_ids(rows);
        self.selection.toggle_all(&visible);
    }

    pub fn selection_state(&self, rows: &[R]) -> SelectionState {
        self.selection.state(&self.visible_ids(rows))
    }

    /// Drops selected ids that are no longer loaded.
    pub fn prune_selection(&mut self, rows: &[R]) {
        let known = rows.iter().map(TableRow::row_id).collect();
        self.selection.retain(&known);
    }
}
