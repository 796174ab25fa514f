// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Optimistic per-row tag editing. Every mutation updates the local list at
//! once and yields a [`SyncRequest`] carrying the full desired set; the
//! runtime reports back through [`TagEditor::apply_success`] or
//! [`TagEditor::apply_failure`].

use std::collections::BTreeMap;

use crate::slug::TagSpec;
use crate::{Tag, TagColour};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub request_id: u64,
    pub row_id: i64,
    /// Tag to create (or recolour) before syncing.
    pub create: Option<TagSpec>,
    pub names: Vec<String>,
}

impl SyncRequest {
    /// Desired tag set for the store. The created tag carries its colour.
    pub fn specs(&self) -> Vec<TagSpec> {
        self.names
            .iter()
            .map(|name| match &self.create {
                Some(create) if create.name == *name => create.clone(),
                _ => TagSpec::named(name.as_str()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied,
    /// A newer request is in flight; only the confirmed shadow moved.
    Confirmed,
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RowTags {
    confirmed: Vec<String>,
    local: Vec<String>,
    latest_request: Option<u64>,
    confirmed_request: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TagEditor {
    rows: BTreeMap<i64, RowTags>,
    colours: BTreeMap<String, Option<TagColour>>,
    next_request: u64,
}

impl TagEditor {
    /// Replaces the server-confirmed list for a row. In-flight request ids
    /// are kept so their results still pass the staleness check.
    pub fn load_row(&mut self, row_id: i64, tags: &[Tag]) {
        self.remember(tags);
        let names: Vec<String> = tags.iter().map(|tag| tag.name.clone()).collect();
        let row = self.rows.entry(row_id).or_default();
        row.confirmed = names.clone();
        row.local = names;
    }

    pub fn remember(&mut self, tags: &[Tag]) {
        for tag in tags {
            self.colours.insert(tag.name.clone(), tag.colour);
        }
    }

    pub fn tags(&self, row_id: i64) -> &[String] {
        self.rows
            .get(&row_id)
            .map_or(&[][..], |row| row.local.as_slice())
    }

    pub fn confirmed(&self, row_id: i64) -> &[String] {
        self.rows
            .get(&row_id)
            .map_or(&[][..], |row| row.confirmed.as_slice())
    }

    pub fn colour_for(&self, name: &str) -> Option<TagColour> {
        self.colours.get(name).copied().flatten()
    }

    pub fn is_pending(&self, row_id: i64) -> bool {
        self.rows.get(&row_id).is_some_and(|row| {
            row.latest_request
                .is_some_and(|latest| latest > row.confirmed_request)
        })
    }

    pub fn add_existing(&mut self, row_id: i64, name: &str) -> Option<SyncRequest> {
        if self.tags(row_id).iter().any(|tag| tag == name) {
            return None;
        }
        self.row_mut(row_id).local.push(name.to_owned());
        Some(self.next_sync(row_id, None))
    }

    pub fn create_and_add(
        &mut self,
        row_id: i64,
        name: &str,
        colour: Option<TagColour>,
    ) -> Option<SyncRequest> {
        let name = name.trim();
        if name.is_empty() || self.tags(row_id).iter().any(|tag| tag == name) {
            return None;
        }
        self.colours.insert(name.to_owned(), colour);
        self.row_mut(row_id).local.push(name.to_owned());
        let create = TagSpec {
            name: name.to_owned(),
            colour,
        };
        Some(self.next_sync(row_id, Some(create)))
    }

    /// No-op when the row does not carry `name`.
    pub fn remove_tag(&mut self, row_id: i64, name: &str) -> Option<SyncRequest> {
        let row = self.rows.get_mut(&row_id)?;
        let before = row.local.len();
        row.local.retain(|tag| tag != name);
        if row.local.len() == before {
            return None;
        }
        Some(self.next_sync(row_id, None))
    }

    pub fn apply_success(&mut self, request_id: u64, row_id: i64, tags: &[Tag]) -> SyncOutcome {
        self.remember(tags);
        let Some(row) = self.rows.get_mut(&row_id) else {
            return SyncOutcome::Ignored;
        };
        if request_id <= row.confirmed_request {
            return SyncOutcome::Ignored;
        }
        let names: Vec<String> = tags.iter().map(|tag| tag.name.clone()).collect();
        row.confirmed_request = request_id;
        row.confirmed = names.clone();
        // A failed newer request clears `latest_request`, so an older success
        // still owns the row.
        if row.latest_request.is_none_or(|latest| latest <= request_id) {
            row.local = names;
            SyncOutcome::Applied
        } else {
            SyncOutcome::Confirmed
        }
    }

    /// Reverts the row to its confirmed shadow when `request_id` is the
    /// latest request for it. Returns whether anything was reverted.
    pub fn apply_failure(&mut self, request_id: u64, row_id: i64) -> bool {
        let Some(row) = self.rows.get_mut(&row_id) else {
            return false;
        };
        if row.latest_request != Some(request_id) {
            return false;
        }
        row.local = row.confirmed.clone();
        row.latest_request = None;
        true
    }

    fn row_mut(&mut self, row_id: i64) -> &mut RowTags {
        self.rows.entry(row_id).or_default()
    }

    fn next_sync(&mut self, row_id: i64, create: Option<TagSpec>) -> SyncRequest {
        self.next_request += 1;
        let request_id = self.next_request;
        let row = self.row_mut(row_id);
        row.latest_request = Some(request_id);
        SyncRequest {
            request_id,
            row_id,
            create,
            names: row.local.clone(),
        }
    }
}
