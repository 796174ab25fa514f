// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! JSON shapes exchanged between `boh --serve` and the remote client.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::money::{cents_to_decimal, parse_cents};
use crate::{Ingredient, IngredientId, Page, Tag, TagColour, TagId};

pub const INGREDIENTS_PER_PAGE: u32 = 20;
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagJson {
    pub id: i64,
    pub name: String,
    pub colour: Option<TagColour>,
}

impl From<&Tag> for TagJson {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id.get(),
            name: tag.name.clone(),
            colour: tag.colour,
        }
    }
}

impl From<TagJson> for Tag {
    fn from(json: TagJson) -> Self {
        Self {
            id: TagId::new(json.id),
            name: json.name,
            colour: json.colour,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientJson {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub cost_per_unit: Option<String>,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagJson>>,
    #[serde(default)]
    pub price_updated_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl IngredientJson {
    pub fn from_ingredient(ingredient: &Ingredient, include_tags: bool) -> Result<Self> {
        Ok(Self {
            id: ingredient.id.get(),
            name: ingredient.name.clone(),
            unit: ingredient.unit.clone(),
            cost_per_unit: ingredient.cost_cents.map(cents_to_decimal),
            notes: ingredient.notes.clone(),
            tags: include_tags.then(|| ingredient.tags.iter().map(TagJson::from).collect()),
            price_updated_at: ingredient
                .price_updated_at
                .map(format_timestamp)
                .transpose()?,
            created_at: format_timestamp(ingredient.created_at)?,
            updated_at: format_timestamp(ingredient.updated_at)?,
        })
    }

    pub fn into_ingredient(self) -> Result<Ingredient> {
        let cost_cents = self
            .cost_per_unit
            .as_deref()
            .map(|raw| {
                parse_cents(raw).with_context(|| format!("ingredient {} cost {raw:?}", self.id))
            })
            .transpose()?;
        Ok(Ingredient {
            id: IngredientId::new(self.id),
            name: self.name,
            unit: self.unit,
            cost_cents,
            notes: self.notes,
            tags: self
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(Tag::from)
                .collect(),
            price_updated_at: self
                .price_updated_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub prev_page_url: Option<String>,
    pub next_page_url: Option<String>,
}

impl Paginated<IngredientJson> {
    pub fn into_page(self) -> Result<Page<Ingredient>> {
        let items = self
            .data
            .into_iter()
            .map(IngredientJson::into_ingredient)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            items,
            current_page: self.current_page,
            last_page: self.last_page,
            per_page: self.per_page,
            total: self.total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorJson {
    pub message: String,
}

/// `tags` stays a raw value: the server accepts strings and objects mixed and
/// rejects non-arrays itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncTagsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTagsResponse {
    pub ok: bool,
    pub tags: Vec<TagJson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateTagRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Outer `None`: key absent. `Some(None)`: explicit null, which clears.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub colour: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

pub fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    value.format(&Rfc3339).context("format timestamp")
}

pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).with_context(|| format!("parse timestamp {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::{CreateTagRequest, IngredientJson, SyncTagsRequest};
    use crate::{Ingredient, IngredientId, Tag, TagColour, TagId};
    use serde_json::json;
    use time::macros::datetime;

    fn ingredient() -> Ingredient {
        Ingredient {
            id: IngredientId::new(3),
            name: "Tomatoes".to_owned(),
            unit: "kg".to_owned(),
            cost_cents: Some(235),
            notes: "Roma".to_owned(),
            tags: vec![Tag {
                id: TagId::new(1),
                name: "Fresh".to_owned(),
                colour: Some(TagColour::Green),
            }],
            price_updated_at: None,
            created_at: datetime!(2026-01-02 03:04:05 UTC),
            updated_at: datetime!(2026-01-02 03:04:05 UTC),
        }
    }

    #[test]
    fn ingredient_wire_shape() {
        let json = IngredientJson::from_ingredient(&ingredient(), true).expect("to json");
        let value = serde_json::to_value(&json).expect("serialize");
        assert_eq!(value["cost_per_unit"], json!("2.35"));
        assert_eq!(
            value["tags"],
            json!([{"id": 1, "name": "Fresh", "colour": "green"}])
        );
        assert_eq!(value["created_at"], json!("2026-01-02T03:04:05Z"));

        let bare = IngredientJson::from_ingredient(&ingredient(), false).expect("to json");
        let value = serde_json::to_value(&bare).expect("serialize");
        assert!(value.get("tags").is_none());
    }

    #[test]
    fn ingredient_from_wire() {
        let json = IngredientJson::from_ingredient(&ingredient(), true).expect("to json");
        assert_eq!(json.into_ingredient().expect("from json"), ingredient());
    }

    #[test]
    fn create_tag_distinguishes_null_from_missing() {
        let missing: CreateTagRequest =
            serde_json::from_value(json!({"name": "Dairy"})).expect("parse");
        assert_eq!(missing.colour, None);

        let null: CreateTagRequest =
            serde_json::from_value(json!({"name": "Dairy", "colour": null})).expect("parse");
        assert_eq!(null.colour, Some(None));

        let set: CreateTagRequest =
            serde_json::from_value(json!({"name": "Dairy", "colour": "red"})).expect("parse");
        assert_eq!(set.colour, Some(Some("red".to_owned())));
    }

    #[test]
    fn sync_request_keeps_raw_tags() {
        let request: SyncTagsRequest =
            serde_json::from_value(json!({"tags": ["A", {"name": "B"}]})).expect("parse");
        assert_eq!(request.tags, Some(json!(["A", {"name": "B"}])));

        let empty: SyncTagsRequest = serde_json::from_value(json!({})).expect("parse");
        assert_eq!(empty.tags, None);
    }
}
