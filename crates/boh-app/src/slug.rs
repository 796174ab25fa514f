// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

use crate::TagColour;

/// Lowercase, hyphen-separated key for tag uniqueness. Accents fold to their
/// ASCII base letter; any other run of non-alphanumerics becomes one hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name
        .nfkd()
        .filter(|ch| !unicode_normalization::char::is_combining_mark(*ch))
    {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub name: String,
    pub colour: Option<TagColour>,
}

impl TagSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colour: None,
        }
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Trims names, drops blanks and names with no slug, and collapses entries
/// that share a slug. First occurrence wins.
pub fn dedupe_tag_specs<I>(specs: I) -> Vec<TagSpec>
where
    I: IntoIterator<Item = TagSpec>,
{
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for spec in specs {
        let name = spec.name.trim();
        if name.is_empty() {
            continue;
        }
        let slug = slugify(name);
        if slug.is_empty() || !seen.insert(slug) {
            continue;
        }
        out.push(TagSpec {
            name: name.to_owned(),
            colour: spec.colour,
        });
    }
    out
}

/// Accepts the loose `tags` array of a sync request: bare strings or
/// `{name, colour}` objects. Anything else is dropped.
pub fn tag_specs_from_json(values: &[Value]) -> Vec<TagSpec> {
    let specs = values.iter().filter_map(|value| match value {
        Value::String(name) => Some(TagSpec::named(name.as_str())),
        Value::Object(fields) => {
            let name = fields.get("name").and_then(Value::as_str)?;
            let colour = match fields.get("colour") {
                Some(Value::String(raw)) => {
                    let parsed = TagColour::parse(raw);
                    if parsed.is_none() {
                        tracing::debug!(colour = %raw, tag = %name, "ignoring unknown tag colour");
                    }
                    parsed
                }
                _ => None,
            };
            Some(TagSpec {
                name: name.to_owned(),
                colour,
            })
        }
        _ => None,
    });
    dedupe_tag_specs(specs)
}

#[cfg(test)]
mod tests {
    use super::{TagSpec, dedupe_tag_specs, slugify, tag_specs_from_json};
    use crate::TagColour;
    use serde_json::json;

    #[test]
    fn slug_strips_punctuation_and_whitespace() {
        assert_eq!(slugify("Extra Virgin!!"), "extra-virgin");
        assert_eq!(slugify("  Dairy "), "dairy");
        assert_eq!(slugify("00 Pizza"), "00-pizza");
        assert_eq!(slugify("--gluten__free--"), "gluten-free");
    }

    #[test]
    fn slug_folds_accents() {
        assert_eq!(slugify("Crème Fraîche"), "creme-fraiche");
        assert_eq!(slugify("JALAPEÑO"), "jalapeno");
    }

    #[test]
    fn slug_of_symbols_is_empty() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn dedupe_keeps_first_occurrence_per_slug() {
        let specs = dedupe_tag_specs(vec![
            TagSpec {
                name: " Dairy".to_owned(),
                colour: Some(TagColour::Blue),
            },
            TagSpec {
                name: "dairy!".to_owned(),
                colour: Some(TagColour::Red),
            },
            TagSpec::named("Local"),
            TagSpec::named("   "),
            TagSpec::named("??"),
        ]);
        assert_eq!(
            specs,
            vec![
                TagSpec {
                    name: "Dairy".to_owned(),
                    colour: Some(TagColour::Blue),
                },
                TagSpec::named("Local"),
            ]
        );
    }

    #[test]
    fn json_inputs_accept_strings_and_objects() {
        let values = vec![
            json!("Organic"),
            json!({"name": " Fresh ", "colour": "green"}),
            json!({"name": "Frozen", "colour": "chartreuse"}),
            json!(42),
            json!({"colour": "red"}),
            json!(null),
            json!(""),
        ];
        let specs = tag_specs_from_json(&values);
        assert_eq!(
            specs,
            vec![
                TagSpec::named("Organic"),
                TagSpec {
                    name: "Fresh".to_owned(),
                    colour: Some(TagColour::Green),
                },
                TagSpec::named("Frozen"),
            ]
        );
    }
}
