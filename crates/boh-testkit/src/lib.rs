// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use boh_app::slug::TagSpec;
use boh_app::{IngredientFormInput, TagColour};
use std::path::PathBuf;

const PRODUCE: [&str; 12] = [
    "Tomatoes",
    "Shallots",
    "Garlic",
    "Basil",
    "Lemons",
    "Fennel",
    "Leeks",
    "Spinach",
    "Rocket",
    "Carrots",
    "Celeriac",
    "Chillies",
];

const PANTRY: [&str; 10] = [
    "Olive Oil",
    "Flour",
    "Sugar",
    "Salt",
    "Rice",
    "Lentils",
    "Vinegar",
    "Honey",
    "Polenta",
    "Capers",
];

const DAIRY: [&str; 6] = ["Butter", "Cream", "Parmesan", "Ricotta", "Milk", "Yoghurt"];

const QUALIFIERS: [&str; 8] = [
    "Organic", "Heritage", "Smoked", "Aged", "Wild", "Local", "Fine", "Coarse",
];

const UNITS: [&str; 6] = ["kg", "g", "L", "ml", "each", "bunch"];

const TAG_NAMES: [&str; 12] = [
    "Fresh",
    "Produce",
    "Pantry",
    "Dairy",
    "Baking",
    "Organic",
    "Local",
    "Frozen",
    "Allergen: Nuts",
    "Gluten Free",
    "Vegan",
    "Seasonal",
];

const NOTES: [&str; 6] = [
    "",
    "Order Tuesdays",
    "Keep chilled",
    "Check date on delivery",
    "Market price",
    "Bulk only",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for ingredient and tag fixtures.
#[derive(Debug, Clone)]
pub struct KitchenFaker {
    rng: DeterministicRng,
}

impl KitchenFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn ingredient(&mut self) -> IngredientFormInput {
        let base = match self.rng.int_n(3) {
            0 => self.pick(&PRODUCE),
            1 => self.pick(&PANTRY),
            _ => self.pick(&DAIRY),
        };
        let name = if self.rng.bool() {
            format!("{} {base}", self.pick(&QUALIFIERS))
        } else {
            base.to_owned()
        };
        let cost_cents = if self.rng.int_n(5) == 0 {
            None
        } else {
            Some(self.int_range(2, 4_500))
        };
        IngredientFormInput {
            name,
            unit: self.pick(&UNITS).to_owned(),
            cost_cents,
            notes: self.pick(&NOTES).to_owned(),
        }
    }

    pub fn tag_name(&mut self) -> &'static str {
        self.pick(&TAG_NAMES)
    }

    pub fn tag_spec(&mut self) -> TagSpec {
        let colour = if self.rng.bool() {
            Some(TagColour::ALL[self.rng.int_n(TagColour::ALL.len())])
        } else {
            None
        };
        TagSpec {
            name: self.tag_name().to_owned(),
            colour,
        }
    }

    /// `count` distinct tag names, in generation order.
    pub fn tag_names(&mut self, count: usize) -> Vec<String> {
        let count = count.min(TAG_NAMES.len());
        let mut names: Vec<String> = Vec::with_capacity(count);
        while names.len() < count {
            let candidate = self.tag_name();
            if !names.iter().any(|name| name == candidate) {
                names.push(candidate.to_owned());
            }
        }
        names
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as usize;
        min + self.rng.int_n(span) as i64
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("boh.db");
    Ok((dir, db_path))
}

pub fn tag_names() -> &'static [&'static str] {
    &TAG_NAMES
}
