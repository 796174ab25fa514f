// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use boh_app::layout::{ColumnLayout, LayoutColumn, TableConfig};
use boh_app::slug::TagSpec;
use boh_app::{IngredientFormInput, IngredientId, TagColour};
use boh_db::{ColourUpdate, Store, validate_db_path};
use boh_testkit::{KitchenFaker, temp_db_path};

fn store() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

fn ingredient(store: &Store, name: &str, cost_cents: Option<i64>) -> Result<IngredientId> {
    store.create_ingredient(&IngredientFormInput {
        name: name.to_owned(),
        unit: "kg".to_owned(),
        cost_cents,
        notes: String::new(),
    })
}

fn names(tags: &[boh_app::Tag]) -> Vec<&str> {
    tags.iter().map(|tag| tag.name.as_str()).collect()
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("/tmp/boh.db").is_ok());
}

#[test]
fn bootstrap_is_idempotent_on_disk() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        ingredient(&store, "Flour", Some(128))?;
    }
    let store = Store::open(&path)?;
    store.bootstrap()?;
    assert_eq!(store.list_ingredients_page(1, 20)?.total, 1);
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = store()?;
    store.raw_connection().execute_batch(
        "
        DROP TABLE ingredient_tag;
        DROP TABLE tags;
        CREATE TABLE tags (
          id INTEGER PRIMARY KEY,
          name TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `tags` is missing required columns"));
    assert!(message.contains("slug"));
    Ok(())
}

#[test]
fn ingredients_page_orders_by_name_and_nests_tags() -> Result<()> {
    let store = store()?;
    let butter = ingredient(&store, "butter", Some(680))?;
    ingredient(&store, "Anchovies", None)?;
    store.sync_ingredient_tags(butter, &[TagSpec::named("Dairy"), TagSpec::named("Chilled")])?;

    let page = store.list_ingredients_page(1, 20)?;
    assert_eq!(page.total, 2);
    assert_eq!(page.last_page, 1);
    let listed = page
        .items
        .iter()
        .map(|item| item.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(listed, vec!["Anchovies", "butter"]);
    assert_eq!(names(&page.items[1].tags), vec!["Chilled", "Dairy"]);
    assert!(page.items[0].tags.is_empty());
    assert!(page.items[1].price_updated_at.is_some());
    assert!(page.items[0].price_updated_at.is_none());
    Ok(())
}

#[test]
fn ingredients_paginate_by_page_size() -> Result<()> {
    let store = store()?;
    let mut faker = KitchenFaker::new(11);
    for _ in 0..45 {
        store.create_ingredient(&faker.ingredient())?;
    }

    let third = store.list_ingredients_page(3, 20)?;
    assert_eq!(third.total, 45);
    assert_eq!(third.last_page, 3);
    assert_eq!(third.items.len(), 5);
    assert_eq!(third.from(), Some(41));

    let beyond = store.list_ingredients_page(9, 20)?;
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.current_page, 9);

    assert!(store.list_ingredients_page(1, 0).is_err());
    Ok(())
}

#[test]
fn get_ingredient_omits_tags() -> Result<()> {
    let store = store()?;
    let id = ingredient(&store, "Yeast", Some(2))?;
    store.sync_ingredient_tags(id, &[TagSpec::named("Baking")])?;

    let found = store.get_ingredient(id)?.expect("ingredient exists");
    assert_eq!(found.cost_cents, Some(2));
    assert!(found.tags.is_empty());
    assert!(store.get_ingredient(IngredientId::new(999))?.is_none());
    Ok(())
}

#[test]
fn sync_is_a_full_replace() -> Result<()> {
    let store = store()?;
    let id = ingredient(&store, "Flour", None)?;

    store.sync_ingredient_tags(id, &[TagSpec::named("A"), TagSpec::named("B")])?;
    let tags = store.sync_ingredient_tags(id, &[TagSpec::named("B"), TagSpec::named("C")])?;
    assert_eq!(names(&tags), vec!["B", "C"]);

    let listed = store.list_ingredients_page(1, 20)?;
    assert_eq!(names(&listed.items[0].tags), vec!["B", "C"]);
    assert_eq!(store.list_tags()?.len(), 3, "tags are never deleted");
    Ok(())
}

#[test]
fn sync_keeps_existing_link_timestamps() -> Result<()> {
    let store = store()?;
    let id = ingredient(&store, "Flour", None)?;
    store.sync_ingredient_tags(id, &[TagSpec::named("Pantry")])?;
    store.raw_connection().execute(
        "UPDATE ingredient_tag SET created_at = '2020-01-01T00:00:00Z'",
        [],
    )?;

    store.sync_ingredient_tags(id, &[TagSpec::named("Pantry"), TagSpec::named("Baking")])?;
    let kept: String = store.raw_connection().query_row(
        "
        SELECT it.created_at FROM ingredient_tag it
        JOIN tags t ON t.id = it.tag_id
        WHERE t.slug = 'pantry'
        ",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(kept, "2020-01-01T00:00:00Z");
    Ok(())
}

#[test]
fn names_with_same_slug_share_one_tag() -> Result<()> {
    let store = store()?;
    let first = ingredient(&store, "Oil", None)?;
    let second = ingredient(&store, "Olives", None)?;

    let a = store.sync_ingredient_tags(first, &[TagSpec::named("Extra Virgin!!")])?;
    let b = store.sync_ingredient_tags(second, &[TagSpec::named("extra virgin")])?;
    assert_eq!(a[0].id, b[0].id);
    assert_eq!(b[0].name, "Extra Virgin!!", "first spelling wins");
    assert_eq!(store.list_tags()?.len(), 1);
    Ok(())
}

#[test]
fn sync_dedupes_and_drops_blank_entries() -> Result<()> {
    let store = store()?;
    let id = ingredient(&store, "Milk", None)?;
    let tags = store.sync_ingredient_tags(
        id,
        &[
            TagSpec::named(" Dairy "),
            TagSpec::named("dairy"),
            TagSpec::named("  "),
            TagSpec::named("Chilled"),
        ],
    )?;
    assert_eq!(names(&tags), vec!["Dairy", "Chilled"]);
    Ok(())
}

#[test]
fn sync_updates_colour_only_when_supplied() -> Result<()> {
    let store = store()?;
    let id = ingredient(&store, "Cream", None)?;
    store.sync_ingredient_tags(
        id,
        &[TagSpec {
            name: "Dairy".to_owned(),
            colour: Some(TagColour::Blue),
        }],
    )?;

    let kept = store.sync_ingredient_tags(id, &[TagSpec::named("Dairy")])?;
    assert_eq!(kept[0].colour, Some(TagColour::Blue));

    let changed = store.sync_ingredient_tags(
        id,
        &[TagSpec {
            name: "dairy".to_owned(),
            colour: Some(TagColour::Cyan),
        }],
    )?;
    assert_eq!(changed[0].colour, Some(TagColour::Cyan));
    Ok(())
}

#[test]
fn sync_unknown_ingredient_fails_without_creating_tags() -> Result<()> {
    let store = store()?;
    let err = store
        .sync_ingredient_tags(IngredientId::new(404), &[TagSpec::named("Ghost")])
        .expect_err("missing ingredient");
    assert!(err.to_string().contains("not found"));
    assert!(store.list_tags()?.is_empty());
    Ok(())
}

#[test]
fn create_or_fetch_tag_handles_colour_updates() -> Result<()> {
    let store = store()?;
    let created = store.create_or_fetch_tag("  Local ", ColourUpdate::Set(Some(TagColour::Teal)))?;
    assert_eq!(created.name, "Local");

    let fetched = store.create_or_fetch_tag("LOCAL", ColourUpdate::Keep)?;
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.colour, Some(TagColour::Teal));

    let cleared = store.create_or_fetch_tag("local", ColourUpdate::Set(None))?;
    assert_eq!(cleared.colour, None);
    assert!(store.create_or_fetch_tag("???", ColourUpdate::Keep).is_err());
    Ok(())
}

#[test]
fn search_tags_is_case_insensitive_substring() -> Result<()> {
    let store = store()?;
    for name in ["Pantry", "Fresh", "Frozen", "100% Organic"] {
        store.create_or_fetch_tag(name, ColourUpdate::Keep)?;
    }

    assert_eq!(names(&store.search_tags(" fr ")?), vec!["Fresh", "Frozen"]);
    assert_eq!(names(&store.search_tags("%")?), vec!["100% Organic"]);
    assert_eq!(store.search_tags("")?.len(), 4);
    assert!(store.search_tags("xyz")?.is_empty());
    Ok(())
}

#[test]
fn recent_price_changes_compare_last_two_entries() -> Result<()> {
    let store = store()?;
    let flour = ingredient(&store, "Flour", Some(100))?;
    let salt = ingredient(&store, "Salt", Some(90))?;
    ingredient(&store, "Sugar", Some(106))?;

    store.update_ingredient_cost(flour, Some(120))?;
    store.update_ingredient_cost(flour, Some(150))?;
    store.update_ingredient_cost(salt, Some(80))?;
    store.update_ingredient_cost(salt, Some(80))?;

    let changes = store.recent_price_changes(10)?;
    assert_eq!(changes.len(), 2, "single-entry history is not a change");
    let flour_change = changes
        .iter()
        .find(|change| change.ingredient_id == flour)
        .expect("flour change");
    assert_eq!((flour_change.old_cents, flour_change.new_cents), (120, 150));
    let salt_change = changes
        .iter()
        .find(|change| change.ingredient_id == salt)
        .expect("salt change");
    assert_eq!((salt_change.old_cents, salt_change.new_cents), (90, 80));

    assert_eq!(store.recent_price_changes(1)?.len(), 1);
    Ok(())
}

#[test]
fn update_cost_rejects_unknown_and_negative() -> Result<()> {
    let store = store()?;
    let id = ingredient(&store, "Rice", None)?;
    assert!(store.update_ingredient_cost(id, Some(-5)).is_err());
    assert!(
        store
            .update_ingredient_cost(IngredientId::new(77), Some(5))
            .is_err()
    );
    Ok(())
}

#[test]
fn demo_seed_runs_once() -> Result<()> {
    let store = store()?;
    assert!(store.seed_demo_data()?);
    assert!(!store.seed_demo_data()?);

    let page = store.list_ingredients_page(1, 20)?;
    assert_eq!(page.total, 7);
    let tomatoes = page
        .items
        .iter()
        .find(|item| item.name == "Tomatoes")
        .expect("seeded tomatoes");
    assert_eq!(tomatoes.cost_cents, Some(235));
    assert_eq!(names(&tomatoes.tags), vec!["Fresh", "Produce"]);
    assert!(!store.recent_price_changes(10)?.is_empty());
    Ok(())
}

#[test]
fn column_layout_persists_through_store() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    let columns = || {
        ["name", "tags", "price"]
            .into_iter()
            .map(LayoutColumn::new)
            .collect::<Vec<_>>()
    };
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        let mut layout = ColumnLayout::new(TableConfig::new("ingredients.dg"), &store, columns());
        assert!(layout.move_column("price", "tags"));
    }

    let store = Store::open(&path)?;
    store.bootstrap()?;
    let layout = ColumnLayout::new(TableConfig::new("ingredients.dg"), &store, columns());
    assert_eq!(layout.order(), ["name", "price", "tags"]);
    Ok(())
}
