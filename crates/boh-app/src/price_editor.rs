// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Local, unpersisted price edits. Only one cell edits at a time; starting an
//! edit elsewhere commits the open one, the way a blur would.

use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    /// Baseline captured at load; later commits compare against it.
    pub original: Option<f64>,
    pub price: Option<f64>,
    pub percent_change: f64,
    pub last_updated: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceEditState {
    Idle,
    Editing { row_id: i64, draft: String },
}

#[derive(Debug, Clone)]
pub struct PriceEditor {
    rows: BTreeMap<i64, PriceRow>,
    state: PriceEditState,
}

impl Default for PriceEditor {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            state: PriceEditState::Idle,
        }
    }
}

/// The whole trimmed draft must be a number; trailing junk gives `None`.
pub fn parse_price(draft: &str) -> Option<f64> {
    draft
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn percent_change(original: Option<f64>, price: Option<f64>) -> f64 {
    match (original, price) {
        (Some(original), Some(price)) if original > 0.0 => (price - original) / original * 100.0,
        _ => 0.0,
    }
}

impl PriceEditor {
    /// Registers a row. The first load fixes the baseline; reloads refresh
    /// the shown price without moving it.
    pub fn load_row(&mut self, row_id: i64, price: Option<f64>, last_updated: OffsetDateTime) {
        self.rows
            .entry(row_id)
            .and_modify(|row| {
                row.price = price;
                row.percent_change = percent_change(row.original, price);
                row.last_updated = last_updated;
            })
            .or_insert(PriceRow {
                original: price,
                price,
                percent_change: 0.0,
                last_updated,
            });
    }

    pub fn row(&self, row_id: i64) -> Option<&PriceRow> {
        self.rows.get(&row_id)
    }

    pub fn state(&self) -> &PriceEditState {
        &self.state
    }

    pub fn editing_row(&self) -> Option<i64> {
        match self.state {
            PriceEditState::Editing { row_id, .. } => Some(row_id),
            PriceEditState::Idle => None,
        }
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.state {
            PriceEditState::Editing { draft, .. } => Some(draft),
            PriceEditState::Idle => None,
        }
    }

    /// Opens `row_id` for editing, seeding the draft with its current price.
    /// Returns false for unknown rows.
    pub fn begin_edit(&mut self, row_id: i64, now: OffsetDateTime) -> bool {
        let Some(row) = self.rows.get(&row_id) else {
            return false;
        };
        let draft = row.price.map(|price| format!("{price:.2}")).unwrap_or_default();
        if self.editing_row().is_some_and(|open| open != row_id) {
            self.commit(now);
        }
        self.state = PriceEditState::Editing { row_id, draft };
        true
    }

    pub fn push_char(&mut self, ch: char) {
        if let PriceEditState::Editing { draft, .. } = &mut self.state {
            draft.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let PriceEditState::Editing { draft, .. } = &mut self.state {
            draft.pop();
        }
    }

    /// Enter or blur. An unparsable draft clears the price instead of failing.
    pub fn commit(&mut self, now: OffsetDateTime) -> Option<&PriceRow> {
        let PriceEditState::Editing { row_id, draft } =
            std::mem::replace(&mut self.state, PriceEditState::Idle)
        else {
            return None;
        };
        let row = self.rows.get_mut(&row_id)?;
        row.price = parse_price(&draft);
        row.percent_change = percent_change(row.original, row.price);
        row.last_updated = now;
        Some(&*row)
    }

    /// Escape: drops the draft and leaves the row untouched.
    pub fn cancel(&mut self) {
        self.state = PriceEditState::Idle;
    }
}
