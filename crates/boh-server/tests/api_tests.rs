// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use boh_app::IngredientFormInput;
use boh_db::Store;
use boh_server::{ApiRequest, ApiServer, Method, ServerOptions};
use boh_testkit::KitchenFaker;
use serde_json::{Value, json};

fn server(require_csrf: bool) -> Result<ApiServer> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(ApiServer::new(
        store,
        ServerOptions {
            require_csrf,
            ..ServerOptions::default()
        },
    ))
}

fn add(server: &ApiServer, name: &str, cost_cents: Option<i64>) -> Result<i64> {
    let id = server.store().create_ingredient(&IngredientFormInput {
        name: name.to_owned(),
        unit: "kg".to_owned(),
        cost_cents,
        notes: String::new(),
    })?;
    Ok(id.get())
}

fn patch_tags(server: &ApiServer, id: i64, body: Value) -> (u16, Value) {
    let request = ApiRequest::new(Method::Patch, &format!("/ingredients/{id}/tags"))
        .with_json(&body)
        .with_xsrf(server.xsrf_token());
    let response = server.handle(&request);
    (response.status, response.body)
}

#[test]
fn ingredient_listing_shape() -> Result<()> {
    let server = server(true)?;
    let id = add(&server, "Tomatoes", Some(235))?;
    add(&server, "Basil", None)?;
    patch_tags(&server, id, json!({"tags": ["Fresh"]}));

    let response = server.handle(&ApiRequest::new(Method::Get, "/ingredients"));
    assert_eq!(response.status, 200);
    let body = response.body;
    assert_eq!(body["total"], json!(2));
    assert_eq!(body["per_page"], json!(20));
    assert_eq!(body["current_page"], json!(1));
    assert_eq!(body["from"], json!(1));
    assert_eq!(body["to"], json!(2));
    assert_eq!(body["prev_page_url"], Value::Null);
    assert_eq!(body["next_page_url"], Value::Null);

    let data = body["data"].as_array().expect("data array");
    assert_eq!(data[0]["name"], json!("Basil"));
    assert_eq!(data[0]["cost_per_unit"], Value::Null);
    assert_eq!(data[1]["cost_per_unit"], json!("2.35"));
    assert_eq!(data[1]["tags"][0]["name"], json!("Fresh"));
    assert_eq!(data[1]["tags"][0]["colour"], Value::Null);
    Ok(())
}

#[test]
fn pagination_links_preserve_query() -> Result<()> {
    let server = server(true)?;
    let mut faker = KitchenFaker::new(5);
    for _ in 0..41 {
        server.store().create_ingredient(&faker.ingredient())?;
    }

    let mut request = ApiRequest::new(Method::Get, "/ingredients?page=2&view=compact");
    request.host = Some("kitchen.local:8080".to_owned());
    let body = server.handle(&request).body;
    assert_eq!(body["last_page"], json!(3));
    assert_eq!(body["from"], json!(21));
    assert_eq!(
        body["prev_page_url"],
        json!("http://kitchen.local:8080/ingredients?view=compact&page=1")
    );
    assert_eq!(
        body["next_page_url"],
        json!("http://kitchen.local:8080/ingredients?view=compact&page=3")
    );

    let junk = server.handle(&ApiRequest::new(Method::Get, "/ingredients?page=zero"));
    assert_eq!(junk.body["current_page"], json!(1));
    Ok(())
}

#[test]
fn show_ingredient_and_missing() -> Result<()> {
    let server = server(true)?;
    let id = add(&server, "Salt", Some(90))?;
    patch_tags(&server, id, json!({"tags": ["Pantry"]}));

    let found = server.handle(&ApiRequest::new(Method::Get, &format!("/ingredients/{id}")));
    assert_eq!(found.status, 200);
    assert_eq!(found.body["name"], json!("Salt"));
    assert!(found.body.get("tags").is_none());

    let missing = server.handle(&ApiRequest::new(Method::Get, "/ingredients/999"));
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body["message"], json!("not found"));
    Ok(())
}

#[test]
fn sync_accepts_mixed_entries_and_replaces() -> Result<()> {
    let server = server(true)?;
    let id = add(&server, "Cream", None)?;

    let (status, body) = patch_tags(
        &server,
        id,
        json!({"tags": [" Dairy ", {"name": "Chilled", "colour": "cyan"}, 7, "", "dairy", {"colour": "red"}]}),
    );
    assert_eq!(status, 200);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(
        body["tags"],
        json!([
            {"id": 1, "name": "Dairy", "colour": null},
            {"id": 2, "name": "Chilled", "colour": "cyan"},
        ])
    );

    let (_, body) = patch_tags(&server, id, json!({"tags": ["Chilled", "Local"]}));
    let names = body["tags"]
        .as_array()
        .expect("tags array")
        .iter()
        .map(|tag| tag["name"].clone())
        .collect::<Vec<_>>();
    assert_eq!(names, vec![json!("Chilled"), json!("Local")]);
    assert_eq!(body["tags"][0]["colour"], json!("cyan"), "colour kept");
    Ok(())
}

#[test]
fn sync_missing_key_detaches_everything() -> Result<()> {
    let server = server(true)?;
    let id = add(&server, "Leeks", None)?;
    patch_tags(&server, id, json!({"tags": ["Produce"]}));

    let (status, body) = patch_tags(&server, id, json!({}));
    assert_eq!(status, 200);
    assert_eq!(body["tags"], json!([]));
    Ok(())
}

#[test]
fn sync_rejects_non_array_and_unknown_ingredient() -> Result<()> {
    let server = server(true)?;
    let id = add(&server, "Leeks", None)?;

    let (status, _) = patch_tags(&server, id, json!({"tags": "Produce"}));
    assert_eq!(status, 422);

    let (status, _) = patch_tags(&server, 4040, json!({"tags": ["Produce"]}));
    assert_eq!(status, 404);
    Ok(())
}

#[test]
fn csrf_header_is_enforced_when_required() -> Result<()> {
    let server = server(true)?;
    let id = add(&server, "Honey", None)?;
    let path = format!("/ingredients/{id}/tags");
    let body = json!({"tags": ["Pantry"]});

    let missing = server.handle(&ApiRequest::new(Method::Patch, &path).with_json(&body));
    assert_eq!(missing.status, 419);

    let wrong = server.handle(
        &ApiRequest::new(Method::Patch, &path)
            .with_json(&body)
            .with_xsrf("forged"),
    );
    assert_eq!(wrong.status, 419);

    let reads = server.handle(&ApiRequest::new(Method::Get, "/tags"));
    assert_eq!(reads.status, 200, "reads never need the token");
    Ok(())
}

#[test]
fn csrf_can_be_disabled() -> Result<()> {
    let server = server(false)?;
    let response = server.handle(
        &ApiRequest::new(Method::Post, "/tags").with_json(&json!({"name": "Vegan"})),
    );
    assert_eq!(response.status, 200);
    Ok(())
}

#[test]
fn tag_search_trims_and_orders() -> Result<()> {
    let server = server(true)?;
    let token = server.xsrf_token().to_owned();
    for name in ["Frozen", "Fresh", "Pantry"] {
        server.handle(
            &ApiRequest::new(Method::Post, "/tags")
                .with_json(&json!({"name": name}))
                .with_xsrf(&token),
        );
    }

    let response = server.handle(&ApiRequest::new(Method::Get, "/tags?q=%20FR%20"));
    let names = response.body["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|tag| tag["name"].clone())
        .collect::<Vec<_>>();
    assert_eq!(names, vec![json!("Fresh"), json!("Frozen")]);
    Ok(())
}

#[test]
fn create_tag_colour_rules() -> Result<()> {
    let server = server(true)?;
    let token = server.xsrf_token().to_owned();
    let post = |body: Value| {
        server.handle(
            &ApiRequest::new(Method::Post, "/tags")
                .with_json(&body)
                .with_xsrf(&token),
        )
    };

    let created = post(json!({"name": "Local", "colour": "teal"}));
    assert_eq!(created.body["data"]["colour"], json!("teal"));

    let kept = post(json!({"name": "local"}));
    assert_eq!(kept.body["data"]["id"], created.body["data"]["id"]);
    assert_eq!(kept.body["data"]["colour"], json!("teal"));

    let cleared = post(json!({"name": "LOCAL", "colour": null}));
    assert_eq!(cleared.body["data"]["colour"], Value::Null);

    assert_eq!(post(json!({"name": ""})).status, 422);
    assert_eq!(post(json!({})).status, 422);
    assert_eq!(post(json!({"name": "x".repeat(51)})).status, 422);
    assert_eq!(post(json!({"name": "Dairy", "colour": "chartreuse"})).status, 422);
    assert_eq!(
        post(json!({"name": "Dairy", "colour": "y".repeat(21)})).status,
        422
    );
    Ok(())
}

#[test]
fn unknown_routes_and_methods() -> Result<()> {
    let server = server(true)?;
    assert_eq!(
        server
            .handle(&ApiRequest::new(Method::Get, "/recipes"))
            .status,
        404
    );
    assert_eq!(
        server
            .handle(&ApiRequest::new(Method::Other, "/ingredients"))
            .status,
        405
    );
    assert_eq!(
        server
            .handle(&ApiRequest::new(Method::Get, "/ingredients/abc"))
            .status,
        404
    );

    let mut malformed = ApiRequest::new(Method::Post, "/tags").with_xsrf(server.xsrf_token());
    malformed.body = b"{oops".to_vec();
    assert_eq!(server.handle(&malformed).status, 400);
    Ok(())
}
