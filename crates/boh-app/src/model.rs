// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagColour {
    Default,
    Primary,
    Secondary,
    Success,
    Warning,
    Info,
    Neutral,
    Red,
    Orange,
    Amber,
    Lime,
    Green,
    Teal,
    Cyan,
    Blue,
    Indigo,
    Violet,
    Purple,
    Pink,
}

impl TagColour {
    pub const ALL: [Self; 19] = [
        Self::Default,
        Self::Primary,
        Self::Secondary,
        Self::Success,
        Self::Warning,
        Self::Info,
        Self::Neutral,
        Self::Red,
        Self::Orange,
        Self::Amber,
        Self::Lime,
        Self::Green,
        Self::Teal,
        Self::Cyan,
        Self::Blue,
        Self::Indigo,
        Self::Violet,
        Self::Purple,
        Self::Pink,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Neutral => "neutral",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Amber => "amber",
            Self::Lime => "lime",
            Self::Green => "green",
            Self::Teal => "teal",
            Self::Cyan => "cyan",
            Self::Blue => "blue",
            Self::Indigo => "indigo",
            Self::Violet => "violet",
            Self::Purple => "purple",
            Self::Pink => "pink",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|colour| colour.as_str().eq_ignore_ascii_case(value))
    }

    /// Next palette entry, wrapping. Used by colour pickers.
    pub fn cycle(self, delta: isize) -> Self {
        let len = Self::ALL.len() as isize;
        let current = Self::ALL
            .iter()
            .position(|colour| *colour == self)
            .unwrap_or(0) as isize;
        Self::ALL[(current + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub colour: Option<TagColour>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub unit: String,
    pub cost_cents: Option<i64>,
    pub notes: String,
    pub tags: Vec<Tag>,
    pub price_updated_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Ingredient {
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.name.clone()).collect()
    }

    pub fn price(&self) -> Option<f64> {
        self.cost_cents.map(|cents| cents as f64 / 100.0)
    }

    /// When the price last moved, falling back to the row's last update.
    pub fn last_updated(&self) -> OffsetDateTime {
        self.price_updated_at.unwrap_or(self.updated_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub unit: String,
    pub old_cents: i64,
    pub new_cents: i64,
    pub changed_at: OffsetDateTime,
}

impl PriceChange {
    pub fn percent(&self) -> f64 {
        if self.old_cents <= 0 {
            return 0.0;
        }
        (self.new_cents - self.old_cents) as f64 / self.old_cents as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty(per_page: u32) -> Self {
        Self {
            items: Vec::new(),
            current_page: 1,
            last_page: 1,
            per_page,
            total: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    /// 1-based index of the first item on this page, if any.
    pub fn from(&self) -> Option<u64> {
        if self.items.is_empty() {
            return None;
        }
        Some(u64::from(self.current_page - 1) * u64::from(self.per_page) + 1)
    }

    pub fn to(&self) -> Option<u64> {
        self.from()
            .map(|from| from + self.items.len() as u64 - 1)
    }
}

pub fn last_page_for(total: u64, per_page: u32) -> u32 {
    if per_page == 0 || total == 0 {
        return 1;
    }
    total.div_ceil(u64::from(per_page)).min(u64::from(u32::MAX)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Dashboard,
    Ingredients,
    Recipes,
    Menus,
    Suppliers,
    Stocktake,
}

impl TabKind {
    pub const ALL: [Self; 6] = [
        Self::Dashboard,
        Self::Ingredients,
        Self::Recipes,
        Self::Menus,
        Self::Suppliers,
        Self::Stocktake,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Ingredients => "ingredients",
            Self::Recipes => "recipes",
            Self::Menus => "menus",
            Self::Suppliers => "suppliers",
            Self::Stocktake => "stocktake",
        }
    }

    pub const fn is_placeholder(self) -> bool {
        matches!(
            self,
            Self::Recipes | Self::Menus | Self::Suppliers | Self::Stocktake
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Search,
    TagEditor,
    PriceEdit,
    Detail,
}
