// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::TagColour;
use crate::slug::{TagSpec, slugify};

pub const MAX_TAG_NAME_CHARS: usize = 50;
pub const MAX_TAG_COLOUR_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFormInput {
    pub name: String,
    pub colour: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientFormInput {
    pub name: String,
    pub unit: String,
    pub cost_cents: Option<i64>,
    pub notes: String,
}

impl TagFormInput {
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            bail!("tag name is required -- enter a name and retry");
        }
        if name.chars().count() > MAX_TAG_NAME_CHARS {
            bail!("tag name must be at most {MAX_TAG_NAME_CHARS} characters");
        }
        if slugify(name).is_empty() {
            bail!("tag name needs at least one letter or digit -- rename and retry");
        }
        if let Some(colour) = &self.colour {
            if colour.chars().count() > MAX_TAG_COLOUR_CHARS {
                bail!("tag colour must be at most {MAX_TAG_COLOUR_CHARS} characters");
            }
            if TagColour::parse(colour).is_none() {
                bail!("unknown tag colour {colour:?} -- pick a palette colour and retry");
            }
        }
        Ok(())
    }

    /// Validated, trimmed form of the input.
    pub fn to_spec(&self) -> Result<TagSpec> {
        self.validate()?;
        Ok(TagSpec {
            name: self.name.trim().to_owned(),
            colour: self.colour.as_deref().and_then(TagColour::parse),
        })
    }
}

impl IngredientFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("ingredient name is required -- enter a name and retry");
        }
        if self.unit.trim().is_empty() {
            bail!("ingredient unit is required -- enter a unit like kg and retry");
        }
        if let Some(cost) = self.cost_cents
            && cost < 0
        {
            bail!("ingredient cost cannot be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{IngredientFormInput, TagFormInput};
    use crate::TagColour;

    fn tag(name: &str, colour: Option<&str>) -> TagFormInput {
        TagFormInput {
            name: name.to_owned(),
            colour: colour.map(str::to_owned),
        }
    }

    #[test]
    fn tag_requires_name() {
        let error = tag("   ", None).validate().expect_err("blank name");
        assert!(error.to_string().contains("tag name is required"));
        assert!(tag("!!!", None).validate().is_err());
    }

    #[test]
    fn tag_name_length_counts_chars() {
        assert!(tag(&"é".repeat(50), None).validate().is_ok());
        assert!(tag(&"a".repeat(51), None).validate().is_err());
    }

    #[test]
    fn tag_colour_must_be_palette_token() {
        assert!(tag("Dairy", Some("Blue")).validate().is_ok());
        assert!(tag("Dairy", Some("chartreuse")).validate().is_err());
        assert!(tag("Dairy", Some(&"x".repeat(21))).validate().is_err());
    }

    #[test]
    fn spec_is_trimmed_and_parsed() {
        let spec = tag("  Dairy ", Some("blue")).to_spec().expect("valid tag");
        assert_eq!(spec.name, "Dairy");
        assert_eq!(spec.colour, Some(TagColour::Blue));
    }

    #[test]
    fn ingredient_rules() {
        let mut input = IngredientFormInput {
            name: "Flour".to_owned(),
            unit: "kg".to_owned(),
            cost_cents: Some(128),
            notes: String::new(),
        };
        assert!(input.validate().is_ok());
        input.cost_cents = Some(-1);
        assert!(input.validate().is_err());
        input.cost_cents = None;
        input.unit = " ".to_owned();
        assert!(input.validate().is_err());
    }
}
