// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use boh_app::layout::LayoutStore;
use boh_app::slug::{TagSpec, dedupe_tag_specs, slugify};
use boh_app::{
    Ingredient, IngredientFormInput, IngredientId, Page, PriceChange, Tag, TagColour, TagId,
    last_page_for,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub const APP_NAME: &str = "boh";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "ingredients",
        &[
            "id",
            "name",
            "unit",
            "cost_cents",
            "notes",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "tags",
        &["id", "name", "slug", "colour", "created_at", "updated_at"],
    ),
    (
        "ingredient_tag",
        &["ingredient_id", "tag_id", "created_at", "updated_at"],
    ),
    (
        "price_history",
        &["id", "ingredient_id", "cost_cents", "recorded_at"],
    ),
    ("ui_state", &["key", "value", "updated_at"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_tags_slug",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_slug ON tags (slug);",
    },
    RequiredIndex {
        name: "idx_ingredients_name",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients (name COLLATE NOCASE);",
    },
    RequiredIndex {
        name: "idx_ingredient_tag_tag_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_ingredient_tag_tag_id ON ingredient_tag (tag_id);",
    },
    RequiredIndex {
        name: "idx_price_history_ingredient",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_price_history_ingredient ON price_history (ingredient_id, recorded_at);",
    },
];

const INGREDIENT_COLUMNS: &str = "
    i.id, i.name, i.unit, i.cost_cents, i.notes, i.created_at, i.updated_at,
    (SELECT MAX(ph.recorded_at) FROM price_history ph WHERE ph.ingredient_id = i.id)
";

/// Colour handling for create-or-fetch: `Keep` leaves an existing tag's
/// colour alone, `Set` overwrites it (including clearing it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourUpdate {
    Keep,
    Set(Option<TagColour>),
}

struct SeedIngredient {
    name: &'static str,
    unit: &'static str,
    notes: &'static str,
    tags: &'static [&'static str],
    /// (days ago, cents), oldest first; the last entry is the current cost.
    history: &'static [(i64, i64)],
}

const SEED_TAGS: &[(&str, TagColour)] = &[
    ("Fresh", TagColour::Green),
    ("Produce", TagColour::Lime),
    ("Pantry", TagColour::Amber),
    ("Baking", TagColour::Orange),
    ("Dairy", TagColour::Blue),
];

const SEED_INGREDIENTS: &[SeedIngredient] = &[
    SeedIngredient {
        name: "Tomatoes",
        unit: "kg",
        notes: "Roma",
        tags: &["Fresh", "Produce"],
        history: &[(20, 210), (2, 235)],
    },
    SeedIngredient {
        name: "Olive Oil",
        unit: "L",
        notes: "Extra virgin",
        tags: &["Pantry"],
        history: &[(30, 800), (9, 760)],
    },
    SeedIngredient {
        name: "Flour",
        unit: "kg",
        notes: "00 Pizza",
        tags: &["Pantry", "Baking"],
        history: &[(40, 120), (16, 128)],
    },
    SeedIngredient {
        name: "Sugar",
        unit: "kg",
        notes: "",
        tags: &["Pantry", "Baking"],
        history: &[(5, 106)],
    },
    SeedIngredient {
        name: "Butter",
        unit: "kg",
        notes: "",
        tags: &["Dairy"],
        history: &[(12, 620), (1, 680)],
    },
    SeedIngredient {
        name: "Yeast",
        unit: "g",
        notes: "",
        tags: &["Baking"],
        history: &[(60, 2)],
    },
    SeedIngredient {
        name: "Salt",
        unit: "kg",
        notes: "",
        tags: &["Pantry"],
        history: &[(25, 95), (0, 90)],
    },
];

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    /// Inserts the demo kitchen. Does nothing when ingredients already exist.
    pub fn seed_demo_data(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ingredients", [], |row| row.get(0))
            .context("count ingredients")?;
        if count > 0 {
            return Ok(false);
        }

        let now = OffsetDateTime::now_utc();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin demo seed")?;
        for (name, colour) in SEED_TAGS {
            upsert_tag(&tx, name, ColourUpdate::Set(Some(*colour)), now)?;
        }
        for seed in SEED_INGREDIENTS {
            let first_seen = seed
                .history
                .first()
                .map_or(now, |(days, _)| now - Duration::days(*days));
            let current = seed.history.last().map(|(_, cents)| *cents);
            let id = insert_ingredient(
                &tx,
                &IngredientFormInput {
                    name: seed.name.to_owned(),
                    unit: seed.unit.to_owned(),
                    cost_cents: current,
                    notes: seed.notes.to_owned(),
                },
                first_seen,
            )?;
            for (days, cents) in seed.history {
                record_price(&tx, id, *cents, now - Duration::days(*days))?;
            }
            let specs = seed
                .tags
                .iter()
                .map(|name| TagSpec::named(*name))
                .collect::<Vec<_>>();
            replace_ingredient_tags(&tx, id, &specs, now)?;
        }
        tx.commit().context("commit demo seed")?;
        tracing::info!(ingredients = SEED_INGREDIENTS.len(), "seeded demo data");
        Ok(true)
    }

    pub fn list_ingredients_page(&self, page: u32, per_page: u32) -> Result<Page<Ingredient>> {
        if per_page == 0 {
            bail!("page size must be positive");
        }
        let page = page.max(1);
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ingredients", [], |row| row.get(0))
            .context("count ingredients")?;
        let total = u64::try_from(total).unwrap_or(0);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let mut stmt = self
            .conn
            .prepare(&format!(
                "
                SELECT {INGREDIENT_COLUMNS}
                FROM ingredients i
                ORDER BY i.name COLLATE NOCASE ASC, i.id ASC
                LIMIT ? OFFSET ?
                "
            ))
            .context("prepare ingredients page query")?;
        let rows = stmt
            .query_map(params![i64::from(per_page), offset], ingredient_from_row)
            .context("query ingredients page")?;
        let mut items = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect ingredients page")?;

        for ingredient in &mut items {
            ingredient.tags = self.ingredient_tags(ingredient.id)?;
        }

        Ok(Page {
            items,
            current_page: page,
            last_page: last_page_for(total, per_page),
            per_page,
            total,
        })
    }

    /// Single ingredient without its tags.
    pub fn get_ingredient(&self, ingredient_id: IngredientId) -> Result<Option<Ingredient>> {
        self.conn
            .query_row(
                &format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients i WHERE i.id = ?"),
                params![ingredient_id.get()],
                ingredient_from_row,
            )
            .optional()
            .with_context(|| format!("load ingredient {}", ingredient_id.get()))
    }

    pub fn create_ingredient(&self, input: &IngredientFormInput) -> Result<IngredientId> {
        input.validate()?;
        let now = OffsetDateTime::now_utc();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin create ingredient")?;
        let id = insert_ingredient(&tx, input, now)?;
        if let Some(cents) = input.cost_cents {
            record_price(&tx, id, cents, now)?;
        }
        tx.commit().context("commit create ingredient")?;
        Ok(id)
    }

    /// Sets the cost and appends a history entry when it actually moved.
    pub fn update_ingredient_cost(
        &self,
        ingredient_id: IngredientId,
        cost_cents: Option<i64>,
    ) -> Result<()> {
        if let Some(cost) = cost_cents
            && cost < 0
        {
            bail!("ingredient cost cannot be negative");
        }
        let current = self
            .get_ingredient(ingredient_id)?
            .ok_or_else(|| not_found(ingredient_id))?;
        if current.cost_cents == cost_cents {
            return Ok(());
        }

        let now = OffsetDateTime::now_utc();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin cost update")?;
        tx.execute(
            "UPDATE ingredients SET cost_cents = ?, updated_at = ? WHERE id = ?",
            params![cost_cents, format_timestamp(now)?, ingredient_id.get()],
        )
        .context("update ingredient cost")?;
        if let Some(cents) = cost_cents {
            record_price(&tx, ingredient_id, cents, now)?;
        }
        tx.commit().context("commit cost update")
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.search_tags("")
    }

    /// Case-insensitive substring match on tag names, ordered by name.
    pub fn search_tags(&self, query: &str) -> Result<Vec<Tag>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, colour
                FROM tags
                WHERE name LIKE ? ESCAPE '\\'
                ORDER BY name COLLATE NOCASE ASC, id ASC
                ",
            )
            .context("prepare tag search")?;
        let rows = stmt
            .query_map(params![pattern], tag_from_row)
            .context("search tags")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect tags")
    }

    pub fn create_or_fetch_tag(&self, name: &str, colour: ColourUpdate) -> Result<Tag> {
        upsert_tag(&self.conn, name, colour, OffsetDateTime::now_utc())
    }

    /// Makes `specs` the complete tag set of an ingredient, in one
    /// transaction. Missing tags are created by slug; a supplied colour
    /// overwrites the stored one; existing links keep their timestamps.
    /// Returns the resulting tags in request order.
    pub fn sync_ingredient_tags(
        &self,
        ingredient_id: IngredientId,
        specs: &[TagSpec],
    ) -> Result<Vec<Tag>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin tag sync")?;
        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM ingredients WHERE id = ?)",
                params![ingredient_id.get()],
                |row| row.get(0),
            )
            .context("check ingredient existence")?;
        if !exists {
            return Err(not_found(ingredient_id));
        }

        let tags = replace_ingredient_tags(&tx, ingredient_id, specs, OffsetDateTime::now_utc())?;
        tx.commit().context("commit tag sync")?;
        tracing::debug!(
            ingredient = ingredient_id.get(),
            tags = tags.len(),
            "synced ingredient tags"
        );
        Ok(tags)
    }

    /// Latest move per ingredient, comparing its two most recent history
    /// entries. Newest first.
    pub fn recent_price_changes(&self, limit: usize) -> Result<Vec<PriceChange>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self
            .conn
            .prepare(
                "
                WITH ranked AS (
                  SELECT
                    ingredient_id, cost_cents, recorded_at,
                    ROW_NUMBER() OVER (
                      PARTITION BY ingredient_id
                      ORDER BY recorded_at DESC, id DESC
                    ) AS rn
                  FROM price_history
                )
                SELECT i.id, i.name, i.unit, prev.cost_cents, cur.cost_cents, cur.recorded_at
                FROM ranked cur
                JOIN ranked prev
                  ON prev.ingredient_id = cur.ingredient_id AND prev.rn = 2
                JOIN ingredients i ON i.id = cur.ingredient_id
                WHERE cur.rn = 1
                ORDER BY cur.recorded_at DESC, i.id ASC
                LIMIT ?
                ",
            )
            .context("prepare price changes query")?;
        let rows = stmt
            .query_map(params![limit], |row| {
                let changed_at_raw: String = row.get(5)?;
                Ok(PriceChange {
                    ingredient_id: IngredientId::new(row.get(0)?),
                    name: row.get(1)?,
                    unit: row.get(2)?,
                    old_cents: row.get(3)?,
                    new_cents: row.get(4)?,
                    changed_at: parse_datetime(&changed_at_raw).map_err(to_sql_error)?,
                })
            })
            .context("query price changes")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect price changes")
    }

    fn ingredient_tags(&self, ingredient_id: IngredientId) -> Result<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT t.id, t.name, t.colour
                FROM ingredient_tag it
                JOIN tags t ON t.id = it.tag_id
                WHERE it.ingredient_id = ?
                ORDER BY t.name COLLATE NOCASE ASC, t.id ASC
                ",
            )
            .context("prepare ingredient tags query")?;
        let rows = stmt
            .query_map(params![ingredient_id.get()], tag_from_row)
            .with_context(|| format!("query tags for ingredient {}", ingredient_id.get()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect ingredient tags")
    }

    fn get_ui_state_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM ui_state WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read ui state {key}"))
    }

    fn put_ui_state_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO ui_state (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert ui state {key}"))?;
        Ok(())
    }
}

impl LayoutStore for Store {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.get_ui_state_raw(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.put_ui_state_raw(key, value)
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("BOH_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set BOH_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("boh.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn not_found(ingredient_id: IngredientId) -> anyhow::Error {
    anyhow!(
        "ingredient {} not found -- reload the list and retry",
        ingredient_id.get()
    )
}

fn insert_ingredient(
    conn: &Connection,
    input: &IngredientFormInput,
    at: OffsetDateTime,
) -> Result<IngredientId> {
    let stamp = format_timestamp(at)?;
    conn.execute(
        "
        INSERT INTO ingredients (name, unit, cost_cents, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
        params![
            input.name.trim(),
            input.unit.trim(),
            input.cost_cents,
            input.notes,
            stamp,
            stamp,
        ],
    )
    .with_context(|| format!("insert ingredient {}", input.name))?;
    Ok(IngredientId::new(conn.last_insert_rowid()))
}

fn record_price(
    conn: &Connection,
    ingredient_id: IngredientId,
    cents: i64,
    at: OffsetDateTime,
) -> Result<()> {
    conn.execute(
        "INSERT INTO price_history (ingredient_id, cost_cents, recorded_at) VALUES (?, ?, ?)",
        params![ingredient_id.get(), cents, format_timestamp(at)?],
    )
    .with_context(|| format!("record price for ingredient {}", ingredient_id.get()))?;
    Ok(())
}

fn upsert_tag(
    conn: &Connection,
    name: &str,
    colour: ColourUpdate,
    at: OffsetDateTime,
) -> Result<Tag> {
    let name = name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        bail!("tag name {name:?} has no letters or digits -- rename it and retry");
    }
    let stamp = format_timestamp(at)?;

    let existing = conn
        .query_row(
            "SELECT id, name, colour FROM tags WHERE slug = ?",
            params![slug],
            tag_from_row,
        )
        .optional()
        .with_context(|| format!("look up tag {slug}"))?;

    match (existing, colour) {
        (Some(tag), ColourUpdate::Keep) => Ok(tag),
        (Some(tag), ColourUpdate::Set(colour)) => {
            if tag.colour != colour {
                conn.execute(
                    "UPDATE tags SET colour = ?, updated_at = ? WHERE id = ?",
                    params![colour.map(TagColour::as_str), stamp, tag.id.get()],
                )
                .with_context(|| format!("update colour of tag {slug}"))?;
            }
            Ok(Tag { colour, ..tag })
        }
        (None, colour) => {
            let colour = match colour {
                ColourUpdate::Keep => None,
                ColourUpdate::Set(colour) => colour,
            };
            conn.execute(
                "
                INSERT INTO tags (name, slug, colour, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![name, slug, colour.map(TagColour::as_str), stamp, stamp],
            )
            .with_context(|| format!("insert tag {slug}"))?;
            Ok(Tag {
                id: TagId::new(conn.last_insert_rowid()),
                name: name.to_owned(),
                colour,
            })
        }
    }
}

fn replace_ingredient_tags(
    conn: &Connection,
    ingredient_id: IngredientId,
    specs: &[TagSpec],
    at: OffsetDateTime,
) -> Result<Vec<Tag>> {
    let stamp = format_timestamp(at)?;
    let mut tags = Vec::new();
    for spec in dedupe_tag_specs(specs.iter().cloned()) {
        let colour = match spec.colour {
            Some(colour) => ColourUpdate::Set(Some(colour)),
            None => ColourUpdate::Keep,
        };
        tags.push(upsert_tag(conn, &spec.name, colour, at)?);
    }

    let keep = tags.iter().map(|tag| tag.id.get()).collect::<BTreeSet<_>>();
    let current = {
        let mut stmt = conn
            .prepare("SELECT tag_id FROM ingredient_tag WHERE ingredient_id = ?")
            .context("prepare current links query")?;
        let rows = stmt
            .query_map(params![ingredient_id.get()], |row| row.get::<_, i64>(0))
            .context("query current links")?;
        rows.collect::<rusqlite::Result<BTreeSet<_>>>()
            .context("collect current links")?
    };

    for stale in current.difference(&keep) {
        conn.execute(
            "DELETE FROM ingredient_tag WHERE ingredient_id = ? AND tag_id = ?",
            params![ingredient_id.get(), stale],
        )
        .context("detach tag")?;
    }
    for added in keep.difference(&current) {
        conn.execute(
            "
            INSERT INTO ingredient_tag (ingredient_id, tag_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ",
            params![ingredient_id.get(), added, stamp, stamp],
        )
        .context("attach tag")?;
    }
    Ok(tags)
}

fn ingredient_from_row(row: &Row<'_>) -> rusqlite::Result<Ingredient> {
    let created_at_raw: String = row.get(5)?;
    let updated_at_raw: String = row.get(6)?;
    let price_updated_raw: Option<String> = row.get(7)?;
    Ok(Ingredient {
        id: IngredientId::new(row.get(0)?),
        name: row.get(1)?,
        unit: row.get(2)?,
        cost_cents: row.get(3)?,
        notes: row.get(4)?,
        tags: Vec::new(),
        price_updated_at: price_updated_raw
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(to_sql_error)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    let colour_raw: Option<String> = row.get(2)?;
    let colour = colour_raw.as_deref().and_then(|raw| {
        let parsed = TagColour::parse(raw);
        if parsed.is_none() {
            tracing::debug!(colour = raw, "stored tag colour is not in the palette");
        }
        parsed
    });
    Ok(Tag {
        id: TagId::new(row.get(0)?),
        name: row.get(1)?,
        colour,
    })
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point --config at a boh database or start a fresh one"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

/// Whole seconds in UTC, so stored strings sort chronologically.
fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .context("truncate timestamp")?
        .format(&Rfc3339)
        .context("format timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
