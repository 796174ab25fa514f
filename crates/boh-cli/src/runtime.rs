// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use boh_app::api::INGREDIENTS_PER_PAGE;
use boh_app::tag_editor::SyncRequest;
use boh_app::{Ingredient, IngredientId, Page, PriceChange, Tag};
use boh_client::Client;
use boh_db::Store;
use boh_tui::{AppRuntime, InternalEvent, TagSyncEvent};
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::thread;

const PRICE_CHANGE_LIMIT: usize = 50;

/// Runs the TUI straight against the local database.
pub struct DbRuntime {
    store: Rc<Store>,
}

impl DbRuntime {
    pub fn new(store: Rc<Store>) -> Self {
        Self { store }
    }
}

impl AppRuntime for DbRuntime {
    fn load_ingredients_page(&mut self, page: u32) -> Result<Page<Ingredient>> {
        self.store.list_ingredients_page(page, INGREDIENTS_PER_PAGE)
    }

    fn load_ingredient(&mut self, ingredient_id: IngredientId) -> Result<Option<Ingredient>> {
        self.store.get_ingredient(ingredient_id)
    }

    fn search_tags(&mut self, query: &str) -> Result<Vec<Tag>> {
        self.store.search_tags(query)
    }

    fn load_price_changes(&mut self) -> Result<Vec<PriceChange>> {
        self.store.recent_price_changes(PRICE_CHANGE_LIMIT)
    }

    fn run_tag_sync(&mut self, request: &SyncRequest) -> Result<Vec<Tag>> {
        self.store
            .sync_ingredient_tags(IngredientId::new(request.row_id), &request.specs())
    }
}

/// Runs the TUI against a `boh --serve` instance. Tag syncs go out on their
/// own thread so the UI keeps drawing while the request is in flight.
pub struct HttpRuntime {
    client: Client,
}

impl HttpRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for HttpRuntime {
    fn load_ingredients_page(&mut self, page: u32) -> Result<Page<Ingredient>> {
        self.client.list_ingredients(page)
    }

    fn load_ingredient(&mut self, ingredient_id: IngredientId) -> Result<Option<Ingredient>> {
        self.client.get_ingredient(ingredient_id)
    }

    fn search_tags(&mut self, query: &str) -> Result<Vec<Tag>> {
        self.client.search_tags(query)
    }

    // The HTTP API exposes no price history.
    fn load_price_changes(&mut self) -> Result<Vec<PriceChange>> {
        Ok(Vec::new())
    }

    fn run_tag_sync(&mut self, request: &SyncRequest) -> Result<Vec<Tag>> {
        self.client
            .sync_ingredient_tags(IngredientId::new(request.row_id), &request.specs())
    }

    fn spawn_tag_sync(&mut self, request: SyncRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("boh-tag-sync".to_owned())
            .spawn(move || {
                let result = client
                    .sync_ingredient_tags(IngredientId::new(request.row_id), &request.specs());
                let event = TagSyncEvent::from_result(&request, result);
                let _ = tx.send(InternalEvent::TagSync(event));
            })
            .context("spawn tag sync thread")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DbRuntime, HttpRuntime};
    use anyhow::Result;
    use boh_app::slug::TagSpec;
    use boh_app::tag_editor::SyncRequest;
    use boh_app::{IngredientFormInput, TagColour};
    use boh_client::Client;
    use boh_db::Store;
    use boh_server::{ApiServer, ServerOptions};
    use boh_tui::{AppRuntime, InternalEvent, TagSyncEvent};
    use std::rc::Rc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn store_with(name: &str, cost_cents: Option<i64>) -> Result<(Store, i64)> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        let id = store.create_ingredient(&IngredientFormInput {
            name: name.to_owned(),
            unit: "kg".to_owned(),
            cost_cents,
            notes: String::new(),
        })?;
        Ok((store, id.get()))
    }

    fn request(row_id: i64) -> SyncRequest {
        SyncRequest {
            request_id: 1,
            row_id,
            create: Some(TagSpec {
                name: "Local".to_owned(),
                colour: Some(TagColour::Teal),
            }),
            names: vec!["Fresh".to_owned(), "Local".to_owned()],
        }
    }

    #[test]
    fn db_runtime_syncs_and_colours_created_tag() -> Result<()> {
        let (store, id) = store_with("Tomatoes", Some(235))?;
        let mut runtime = DbRuntime::new(Rc::new(store));

        let tags = runtime.run_tag_sync(&request(id))?;
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].colour, None);
        assert_eq!(tags[1].colour, Some(TagColour::Teal));

        let page = runtime.load_ingredients_page(1)?;
        assert_eq!(page.items[0].tags, tags);
        assert_eq!(runtime.search_tags("LO")?.len(), 1);
        Ok(())
    }

    #[test]
    fn db_runtime_reports_price_changes() -> Result<()> {
        let (store, id) = store_with("Butter", Some(600))?;
        store.update_ingredient_cost(boh_app::IngredientId::new(id), Some(680))?;
        let mut runtime = DbRuntime::new(Rc::new(store));

        let changes = runtime.load_price_changes()?;
        assert_eq!(changes.len(), 1);
        assert_eq!((changes[0].old_cents, changes[0].new_cents), (600, 680));
        Ok(())
    }

    #[test]
    fn http_runtime_syncs_off_thread() -> Result<()> {
        let (store, id) = store_with("Tomatoes", None)?;
        let api = ApiServer::new(
            store,
            ServerOptions {
                require_csrf: false,
                ..ServerOptions::default()
            },
        );
        let listener = ApiServer::bind("127.0.0.1:0")?;
        let addr = format!("http://{}", listener.server_addr());
        let handle = thread::spawn(move || {
            api.serve_one(&listener).expect("serve request");
        });

        let mut runtime = HttpRuntime::new(Client::new(&addr, Duration::from_secs(2))?);
        let (tx, rx) = mpsc::channel();
        runtime.spawn_tag_sync(request(id), tx)?;

        let event = rx.recv_timeout(Duration::from_secs(5))?;
        let (row_id, tags) = match event {
            InternalEvent::TagSync(TagSyncEvent::Completed { row_id, tags, .. }) => (row_id, tags),
            other => panic!("expected completed sync, got {other:?}"),
        };
        assert_eq!(row_id, id);
        assert_eq!(tags[1].colour, Some(TagColour::Teal));

        handle.join().expect("server thread should join");
        Ok(())
    }

    #[test]
    fn http_runtime_failure_becomes_event() -> Result<()> {
        let mut runtime =
            HttpRuntime::new(Client::new("http://127.0.0.1:1", Duration::from_millis(50))?);
        let (tx, rx) = mpsc::channel();
        runtime.spawn_tag_sync(request(4), tx)?;

        let event = rx.recv_timeout(Duration::from_secs(5))?;
        assert!(matches!(
            event,
            InternalEvent::TagSync(TagSyncEvent::Failed { row_id: 4, .. })
        ));
        assert!(runtime.load_price_changes()?.is_empty());
        Ok(())
    }
}
