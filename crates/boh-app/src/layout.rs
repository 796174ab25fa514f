// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Per-table column order, visibility and width, persisted through a
//! [`LayoutStore`] under keys namespaced by the table's storage key.

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

pub const MIN_COLUMN_WIDTH: u32 = 120;
pub const FALLBACK_COLUMN_WIDTH: u32 = 160;

/// Durable key/value port for layout state.
pub trait LayoutStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: LayoutStore + ?Sized> LayoutStore for &T {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }
}

impl<T: LayoutStore + ?Sized> LayoutStore for Rc<T> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }
}

#[derive(Debug, Default)]
pub struct MemoryLayoutStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryLayoutStore {
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl LayoutStore for MemoryLayoutStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub storage_key: String,
}

impl TableConfig {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
        }
    }

    pub fn order_key(&self) -> String {
        format!("{}.columnOrder", self.storage_key)
    }

    pub fn visibility_key(&self) -> String {
        format!("{}.visibility", self.storage_key)
    }

    pub fn widths_key(&self) -> String {
        format!("{}.widths", self.storage_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutColumn {
    pub id: String,
    pub draggable: bool,
    pub resizable: bool,
    pub hideable: bool,
}

impl LayoutColumn {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            draggable: true,
            resizable: true,
            hideable: true,
        }
    }
}

/// Keeps exactly the ids in `current`: retained ids in their saved relative
/// order, new ids appended in definition order.
pub fn reconcile(saved: &[String], current: &[String]) -> Vec<String> {
    if saved.is_empty() {
        return current.to_vec();
    }
    let current_set = current.iter().collect::<BTreeSet<_>>();
    let mut seen = BTreeSet::new();
    let mut order = saved
        .iter()
        .filter(|id| current_set.contains(id) && seen.insert(*id))
        .cloned()
        .collect::<Vec<_>>();
    for id in current {
        if seen.insert(id) {
            order.push(id.clone());
        }
    }
    order
}

/// Moves `from` into the slot `to` occupied before the move.
pub fn move_column(order: &[String], from: &str, to: &str) -> Vec<String> {
    if from == to {
        return order.to_vec();
    }
    let (Some(from_index), Some(to_index)) = (
        order.iter().position(|id| id == from),
        order.iter().position(|id| id == to),
    ) else {
        return order.to_vec();
    };
    let mut next = order.to_vec();
    let moved = next.remove(from_index);
    next.insert(to_index, moved);
    next
}

pub fn reconcile_visibility(
    saved: &BTreeMap<String, bool>,
    current: &[String],
) -> BTreeMap<String, bool> {
    current
        .iter()
        .map(|id| (id.clone(), saved.get(id).copied().unwrap_or(true)))
        .collect()
}

pub fn reconcile_widths(saved: &BTreeMap<String, u32>, current: &[String]) -> BTreeMap<String, u32> {
    current
        .iter()
        .map(|id| (id.clone(), saved.get(id).copied().unwrap_or(0)))
        .collect()
}

/// Width for a column being measured for the first time. `None` or zero means
/// the natural width was unavailable.
pub fn measured_width(natural: Option<u32>) -> u32 {
    match natural {
        Some(width) if width > 0 => width.max(MIN_COLUMN_WIDTH),
        _ => FALLBACK_COLUMN_WIDTH,
    }
}

pub fn resized_width(start_width: u32, delta_x: i64) -> u32 {
    let next = i64::from(start_width) + delta_x;
    next.clamp(i64::from(MIN_COLUMN_WIDTH), i64::from(u32::MAX)) as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    Resize {
        column: String,
        start_x: i64,
        start_width: u32,
    },
    Reorder {
        column: String,
    },
}

pub struct ColumnLayout<S: LayoutStore> {
    config: TableConfig,
    store: S,
    columns: Vec<LayoutColumn>,
    order: Vec<String>,
    visibility: BTreeMap<String, bool>,
    widths: BTreeMap<String, u32>,
    gesture: Option<Gesture>,
}

impl<S: LayoutStore> ColumnLayout<S> {
    pub fn new(config: TableConfig, store: S, columns: Vec<LayoutColumn>) -> Self {
        let saved_order: Vec<String> = load_json(&store, &config.order_key()).unwrap_or_default();
        let saved_visibility: BTreeMap<String, bool> =
            load_json(&store, &config.visibility_key()).unwrap_or_default();
        let saved_widths: BTreeMap<String, u32> =
            load_json(&store, &config.widths_key()).unwrap_or_default();

        let mut layout = Self {
            config,
            store,
            columns: Vec::new(),
            order: saved_order,
            visibility: saved_visibility,
            widths: saved_widths,
            gesture: None,
        };
        layout.sync_columns(columns);
        layout
    }

    /// Reconciles persisted state against a new column set and writes back
    /// the result.
    pub fn sync_columns(&mut self, columns: Vec<LayoutColumn>) {
        let ids = columns
            .iter()
            .map(|column| column.id.clone())
            .collect::<Vec<_>>();
        self.columns = columns;
        self.order = reconcile(&self.order, &ids);
        self.visibility = reconcile_visibility(&self.visibility, &ids);
        self.widths = reconcile_widths(&self.widths, &ids);
        let stale_gesture = match &self.gesture {
            Some(Gesture::Resize { column, .. } | Gesture::Reorder { column }) => {
                !ids.contains(column)
            }
            None => false,
        };
        if stale_gesture {
            self.gesture = None;
        }
        self.persist_order();
        self.persist_visibility();
        self.persist_widths();
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn visible_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|id| self.is_visible(id))
            .map(String::as_str)
            .collect()
    }

    pub fn column(&self, id: &str) -> Option<&LayoutColumn> {
        self.columns.iter().find(|column| column.id == id)
    }

    pub fn is_visible(&self, id: &str) -> bool {
        match self.column(id) {
            Some(column) if !column.hideable => true,
            Some(_) => self.visibility.get(id).copied().unwrap_or(true),
            None => false,
        }
    }

    /// Returns whether anything changed. Columns that cannot be hidden stay
    /// visible.
    pub fn set_visible(&mut self, id: &str, visible: bool) -> bool {
        let Some(column) = self.column(id) else {
            return false;
        };
        if !column.hideable || self.is_visible(id) == visible {
            return false;
        }
        self.visibility.insert(id.to_owned(), visible);
        self.persist_visibility();
        true
    }

    pub fn show_all(&mut self) {
        for value in self.visibility.values_mut() {
            *value = true;
        }
        self.persist_visibility();
    }

    pub fn hidden_count(&self) -> usize {
        self.order.iter().filter(|id| !self.is_visible(id)).count()
    }

    pub fn move_column(&mut self, from: &str, to: &str) -> bool {
        let movable = |id: &str| self.column(id).is_some_and(|column| column.draggable);
        if !movable(from) || !movable(to) {
            return false;
        }
        let next = move_column(&self.order, from, to);
        if next == self.order {
            return false;
        }
        self.order = next;
        self.persist_order();
        true
    }

    /// Persisted width in pixels; 0 means not yet measured.
    pub fn width(&self, id: &str) -> u32 {
        self.widths.get(id).copied().unwrap_or(0)
    }

    /// Sets the width on first measurement and returns the effective width.
    pub fn measure(&mut self, id: &str, natural: Option<u32>) -> u32 {
        let current = self.width(id);
        if current > 0 || self.column(id).is_none() {
            return current;
        }
        let width = measured_width(natural);
        self.widths.insert(id.to_owned(), width);
        self.persist_widths();
        width
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    pub fn begin_resize(&mut self, id: &str, start_x: i64) -> bool {
        if !self.column(id).is_some_and(|column| column.resizable) {
            return false;
        }
        let start_width = match self.width(id) {
            0 => FALLBACK_COLUMN_WIDTH,
            width => width,
        };
        self.gesture = Some(Gesture::Resize {
            column: id.to_owned(),
            start_x,
            start_width,
        });
        true
    }

    /// Applies pointer movement to an active resize; every change persists.
    pub fn resize_to(&mut self, x: i64) -> Option<u32> {
        let Some(Gesture::Resize {
            column,
            start_x,
            start_width,
        }) = &self.gesture
        else {
            return None;
        };
        let column = column.clone();
        let width = resized_width(*start_width, x - *start_x);
        if self.width(&column) != width {
            self.widths.insert(column, width);
            self.persist_widths();
        }
        Some(width)
    }

    pub fn begin_reorder(&mut self, id: &str) -> bool {
        if !self.column(id).is_some_and(|column| column.draggable) {
            return false;
        }
        self.gesture = Some(Gesture::Reorder {
            column: id.to_owned(),
        });
        true
    }

    /// Ends whatever gesture is active. Dropping a reorder onto another
    /// column moves it there.
    pub fn finish_gesture(&mut self, drop_target: Option<&str>) -> bool {
        match self.gesture.take() {
            Some(Gesture::Reorder { column }) => match drop_target {
                Some(target) => self.move_column(&column, target),
                None => false,
            },
            Some(Gesture::Resize { .. }) | None => false,
        }
    }

    pub fn cancel_gesture(&mut self) {
        self.gesture = None;
    }

    fn persist_order(&self) {
        save_json(&self.store, &self.config.order_key(), &self.order);
    }

    fn persist_visibility(&self) {
        save_json(&self.store, &self.config.visibility_key(), &self.visibility);
    }

    fn persist_widths(&self) {
        save_json(&self.store, &self.config.widths_key(), &self.widths);
    }
}

fn load_json<T: DeserializeOwned>(store: &impl LayoutStore, key: &str) -> Option<T> {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(error) => {
            tracing::warn!(key, error = %error, "layout load failed; using defaults");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key, error = %error, "layout entry is malformed; using defaults");
            None
        }
    }
}

fn save_json<T: Serialize>(store: &impl LayoutStore, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(key, error = %error, "layout encode failed");
            return;
        }
    };
    if let Err(error) = store.save(key, &raw) {
        tracing::warn!(key, error = %error, "layout save failed");
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ColumnLayout, FALLBACK_COLUMN_WIDTH, Gesture, LayoutColumn, LayoutStore,
        MIN_COLUMN_WIDTH, MemoryLayoutStore, TableConfig, move_column, reconcile,
        reconcile_visibility, reconcile_widths,
    };
    use anyhow::{Result, bail};
    use std::collections::{BTreeMap, BTreeSet};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    fn columns(values: &[&str]) -> Vec<LayoutColumn> {
        values.iter().map(|id| LayoutColumn::new(*id)).collect()
    }

    struct FailingStore;

    impl LayoutStore for FailingStore {
        fn load(&self, _key: &str) -> Result<Option<String>> {
            bail!("storage unavailable")
        }

        fn save(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("storage full")
        }
    }

    #[test]
    fn reconcile_without_saved_order_returns_current() {
        let current = ids(&["name", "tags", "price"]);
        assert_eq!(reconcile(&[], &current), current);
    }

    #[test]
    fn reconcile_drops_stale_and_appends_new() {
        let saved = ids(&["price", "legacy", "name"]);
        let current = ids(&["name", "tags", "price", "actions"]);
        assert_eq!(
            reconcile(&saved, &current),
            ids(&["price", "name", "tags", "actions"])
        );
    }

    #[test]
    fn reconcile_is_idempotent_and_set_preserving() {
        let current = ids(&["a", "b", "c", "d"]);
        let cases = [
            ids(&[]),
            ids(&["x", "y"]),
            ids(&["d", "c", "b", "a", "e"]),
            ids(&["b", "b", "a"]),
            ids(&["c"]),
        ];
        let expected_set = current.iter().collect::<BTreeSet<_>>();
        for saved in cases {
            let once = reconcile(&saved, &current);
            let twice = reconcile(&once, &current);
            assert_eq!(once, twice, "saved {saved:?}");
            assert_eq!(once.len(), current.len(), "saved {saved:?}");
            assert_eq!(once.iter().collect::<BTreeSet<_>>(), expected_set);
        }
    }

    #[test]
    fn move_column_takes_target_slot() {
        let order = ids(&["name", "tags", "price", "actions"]);
        assert_eq!(
            move_column(&order, "price", "tags"),
            ids(&["name", "price", "tags", "actions"])
        );
        assert_eq!(
            move_column(&order, "name", "price"),
            ids(&["tags", "price", "name", "actions"])
        );
    }

    #[test]
    fn move_column_noops() {
        let order = ids(&["name", "tags"]);
        assert_eq!(move_column(&order, "name", "name"), order);
        assert_eq!(move_column(&order, "ghost", "name"), order);
        assert_eq!(move_column(&order, "name", "ghost"), order);
    }

    #[test]
    fn maps_reconcile_with_defaults() {
        let current = ids(&["name", "price"]);
        let visibility = BTreeMap::from([
            ("price".to_owned(), false),
            ("stale".to_owned(), false),
        ]);
        let widths = BTreeMap::from([("name".to_owned(), 240), ("stale".to_owned(), 90)]);

        assert_eq!(
            reconcile_visibility(&visibility, &current),
            BTreeMap::from([("name".to_owned(), true), ("price".to_owned(), false)])
        );
        assert_eq!(
            reconcile_widths(&widths, &current),
            BTreeMap::from([("name".to_owned(), 240), ("price".to_owned(), 0)])
        );
    }

    #[test]
    fn reorder_survives_reload() {
        let store = MemoryLayoutStore::default();
        let config = TableConfig::new("ingredients.dg");
        {
            let mut layout = ColumnLayout::new(
                config.clone(),
                &store,
                columns(&["name", "tags", "price"]),
            );
            assert!(layout.begin_reorder("price"));
            assert!(layout.finish_gesture(Some("tags")));
        }

        let reloaded = ColumnLayout::new(config, &store, columns(&["name", "tags", "price"]));
        assert_eq!(reloaded.order(), ids(&["name", "price", "tags"]).as_slice());
        assert_eq!(
            store.get("ingredients.dg.columnOrder").as_deref(),
            Some(r#"["name","price","tags"]"#)
        );
    }

    #[test]
    fn new_columns_append_after_reload() {
        let store = MemoryLayoutStore::default();
        let config = TableConfig::new("t");
        store
            .save(&config.order_key(), r#"["price","name","gone"]"#)
            .expect("seed order");

        let layout = ColumnLayout::new(config, &store, columns(&["name", "price", "notes"]));
        assert_eq!(layout.order(), ids(&["price", "name", "notes"]).as_slice());
    }

    #[test]
    fn hidden_columns_persist_and_fixed_columns_stay_visible() {
        let store = MemoryLayoutStore::default();
        let mut cols = columns(&["name", "price", "actions"]);
        cols[2].hideable = false;
        let mut layout = ColumnLayout::new(TableConfig::new("t"), &store, cols.clone());

        assert!(layout.set_visible("price", false));
        assert!(!layout.set_visible("price", false));
        assert!(!layout.set_visible("actions", false));
        assert_eq!(layout.visible_order(), vec!["name", "actions"]);
        assert_eq!(layout.hidden_count(), 1);

        let reloaded = ColumnLayout::new(TableConfig::new("t"), &store, cols);
        assert!(!reloaded.is_visible("price"));
        assert!(reloaded.is_visible("actions"));
    }

    #[test]
    fn measure_floors_and_falls_back() {
        let store = MemoryLayoutStore::default();
        let mut layout = ColumnLayout::new(
            TableConfig::new("t"),
            &store,
            columns(&["name", "price", "tags"]),
        );
        assert_eq!(layout.measure("name", Some(64)), MIN_COLUMN_WIDTH);
        assert_eq!(layout.measure("price", None), FALLBACK_COLUMN_WIDTH);
        assert_eq!(layout.measure("tags", Some(300)), 300);
        assert_eq!(layout.measure("tags", Some(500)), 300, "measured once");
    }

    #[test]
    fn resize_clamps_and_persists_every_change() {
        let store = MemoryLayoutStore::default();
        let mut layout = ColumnLayout::new(TableConfig::new("t"), &store, columns(&["name"]));
        layout.measure("name", Some(200));

        assert!(layout.begin_resize("name", 100));
        assert_eq!(layout.resize_to(140), Some(240));
        assert_eq!(store.get("t.widths").as_deref(), Some(r#"{"name":240}"#));
        assert_eq!(layout.resize_to(-500), Some(MIN_COLUMN_WIDTH));
        assert_eq!(store.get("t.widths").as_deref(), Some(r#"{"name":120}"#));
        assert!(!layout.finish_gesture(None));
        assert_eq!(layout.resize_to(400), None, "gesture ended");
    }

    #[test]
    fn fixed_columns_reject_gestures() {
        let store = MemoryLayoutStore::default();
        let mut cols = columns(&["name", "actions"]);
        cols[1].draggable = false;
        cols[1].resizable = false;
        let mut layout = ColumnLayout::new(TableConfig::new("t"), &store, cols);

        assert!(!layout.begin_resize("actions", 0));
        assert!(!layout.begin_reorder("actions"));
        assert!(layout.begin_reorder("name"));
        assert!(!layout.finish_gesture(Some("actions")));
        assert_eq!(layout.order(), ids(&["name", "actions"]).as_slice());
    }

    #[test]
    fn gesture_cleared_when_column_disappears() {
        let store = MemoryLayoutStore::default();
        let mut layout = ColumnLayout::new(TableConfig::new("t"), &store, columns(&["a", "b"]));
        assert!(layout.begin_resize("b", 0));
        assert!(matches!(layout.gesture(), Some(Gesture::Resize { .. })));
        layout.sync_columns(columns(&["a"]));
        assert!(layout.gesture().is_none());
    }

    #[test]
    fn storage_failures_fall_back_to_defaults() {
        let mut layout =
            ColumnLayout::new(TableConfig::new("t"), FailingStore, columns(&["a", "b"]));
        assert_eq!(layout.order(), ids(&["a", "b"]).as_slice());
        assert!(layout.move_column("b", "a"));
        assert_eq!(layout.order(), ids(&["b", "a"]).as_slice());
    }

    #[test]
    fn malformed_entries_are_ignored() {
        let store = MemoryLayoutStore::default();
        store.save("t.columnOrder", "{not json").expect("seed");
        store.save("t.widths", r#"{"a": -4}"#).expect("seed");
        let layout = ColumnLayout::new(TableConfig::new("t"), &store, columns(&["a", "b"]));
        assert_eq!(layout.order(), ids(&["a", "b"]).as_slice());
        assert_eq!(layout.width("a"), 0);
    }
}
