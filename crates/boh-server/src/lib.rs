// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! JSON API over a [`Store`]. Routing and CSRF checks live in
//! [`ApiServer::handle`], which is independent of the socket layer.

use anyhow::{Context, Result, anyhow};
use boh_app::api::{
    CreateTagRequest, DataEnvelope, INGREDIENTS_PER_PAGE, IngredientJson, Paginated,
    SyncTagsRequest, SyncTagsResponse, TagJson, XSRF_COOKIE, XSRF_HEADER,
};
use boh_app::slug::tag_specs_from_json;
use boh_app::{IngredientId, TagColour, TagFormInput};
use boh_db::{ColourUpdate, Store};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::Read;
use tiny_http::{Header, Request, Response, Server};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Other,
}

impl Method {
    const fn changes_state(self) -> bool {
        matches!(self, Self::Post | Self::Patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub host: Option<String>,
    pub xsrf_header: Option<String>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Splits `url` into path and query.
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        Self {
            method,
            path: path.to_owned(),
            query: query.to_owned(),
            host: None,
            xsrf_header: None,
            body: Vec::new(),
        }
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = body.to_string().into_bytes();
        self
    }

    pub fn with_xsrf(mut self, token: &str) -> Self {
        self.xsrf_header = Some(token.to_owned());
        self
    }

    fn query_param(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status, body },
            Err(error) => Self::error(500, &format!("encode response: {error}")),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "message": message }),
        }
    }

    fn from_error(error: &ApiError) -> Self {
        Self::error(error.status, &error.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(404, "not found")
    }

    fn internal(error: &anyhow::Error) -> Self {
        tracing::error!(error = %format!("{error:#}"), "request failed");
        Self::new(500, "internal server error")
    }
}

type ApiResult = std::result::Result<ApiResponse, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    pub require_csrf: bool,
    pub per_page: u32,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            require_csrf: true,
            per_page: INGREDIENTS_PER_PAGE,
        }
    }
}

pub struct ApiServer {
    store: Store,
    options: ServerOptions,
    xsrf_token: String,
}

impl ApiServer {
    pub fn new(store: Store, options: ServerOptions) -> Self {
        Self {
            store,
            options,
            xsrf_token: generate_token(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn xsrf_token(&self) -> &str {
        &self.xsrf_token
    }

    pub fn bind(address: &str) -> Result<Server> {
        Server::http(address).map_err(|error| {
            anyhow!("cannot listen on {address} ({error}) -- pick another --serve address")
        })
    }

    /// Serves until the listener shuts down.
    pub fn run(&self, server: &Server) -> Result<()> {
        for request in server.incoming_requests() {
            if let Err(error) = self.respond(request) {
                tracing::warn!(error = %format!("{error:#}"), "dropped request");
            }
        }
        Ok(())
    }

    /// Serves exactly one request.
    pub fn serve_one(&self, server: &Server) -> Result<()> {
        let request = server.recv().context("receive request")?;
        self.respond(request)
    }

    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let response = self
            .route(request)
            .unwrap_or_else(|error| ApiResponse::from_error(&error));
        tracing::info!(
            method = ?request.method,
            path = %request.path,
            status = response.status,
            "handled request"
        );
        response
    }

    fn respond(&self, mut request: Request) -> Result<()> {
        let api_request = read_request(&mut request)?;
        let response = self.handle(&api_request);
        let body = response.body.to_string();
        let cookie = format!("{XSRF_COOKIE}={}; Path=/; SameSite=Lax", self.xsrf_token);
        let http_response = Response::from_string(body)
            .with_status_code(response.status)
            .with_header(header("Content-Type", "application/json")?)
            .with_header(header("Set-Cookie", &cookie)?);
        request
            .respond(http_response)
            .context("write response")
    }

    fn route(&self, request: &ApiRequest) -> ApiResult {
        let segments = request
            .path
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();

        if request.method.changes_state() && !self.csrf_ok(request) {
            return Err(ApiError::new(419, "CSRF token mismatch."));
        }

        match (request.method, segments.as_slice()) {
            (Method::Get, ["ingredients"]) => self.list_ingredients(request),
            (Method::Get, ["ingredients", id]) => self.show_ingredient(parse_id(id)?),
            (Method::Patch, ["ingredients", id, "tags"]) => {
                self.sync_tags(parse_id(id)?, &request.body)
            }
            (Method::Get, ["tags"]) => self.search_tags(request),
            (Method::Post, ["tags"]) => self.create_tag(&request.body),
            (_, ["ingredients"] | ["ingredients", _] | ["ingredients", _, "tags"] | ["tags"]) => {
                Err(ApiError::new(405, "method not allowed"))
            }
            _ => Err(ApiError::not_found()),
        }
    }

    fn csrf_ok(&self, request: &ApiRequest) -> bool {
        if !self.options.require_csrf {
            return true;
        }
        request
            .xsrf_header
            .as_deref()
            .is_some_and(|token| token == self.xsrf_token)
    }

    fn list_ingredients(&self, request: &ApiRequest) -> ApiResult {
        let page = request
            .query_param("page")
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1);
        let listed = self
            .store
            .list_ingredients_page(page, self.options.per_page)
            .map_err(|error| ApiError::internal(&error))?;

        let data = listed
            .items
            .iter()
            .map(|ingredient| IngredientJson::from_ingredient(ingredient, true))
            .collect::<Result<Vec<_>>>()
            .map_err(|error| ApiError::internal(&error))?;
        let link = |target: u32| page_url(request, target);
        let body = Paginated {
            from: listed.from(),
            to: listed.to(),
            prev_page_url: listed.has_prev().then(|| link(listed.current_page - 1)),
            next_page_url: listed.has_next().then(|| link(listed.current_page + 1)),
            data,
            current_page: listed.current_page,
            last_page: listed.last_page,
            per_page: listed.per_page,
            total: listed.total,
        };
        Ok(ApiResponse::json(200, &body))
    }

    fn show_ingredient(&self, ingredient_id: IngredientId) -> ApiResult {
        let ingredient = self
            .store
            .get_ingredient(ingredient_id)
            .map_err(|error| ApiError::internal(&error))?
            .ok_or_else(ApiError::not_found)?;
        let body = IngredientJson::from_ingredient(&ingredient, false)
            .map_err(|error| ApiError::internal(&error))?;
        Ok(ApiResponse::json(200, &body))
    }

    fn sync_tags(&self, ingredient_id: IngredientId, body: &[u8]) -> ApiResult {
        let request: SyncTagsRequest = parse_body(body)?;
        let specs = match request.tags {
            None => Vec::new(),
            Some(Value::Array(values)) => tag_specs_from_json(&values),
            Some(_) => return Err(ApiError::new(422, "tags must be an array")),
        };

        if self
            .store
            .get_ingredient(ingredient_id)
            .map_err(|error| ApiError::internal(&error))?
            .is_none()
        {
            return Err(ApiError::not_found());
        }

        let tags = self
            .store
            .sync_ingredient_tags(ingredient_id, &specs)
            .map_err(|error| ApiError::internal(&error))?;
        Ok(ApiResponse::json(
            200,
            &SyncTagsResponse {
                ok: true,
                tags: tags.iter().map(TagJson::from).collect(),
            },
        ))
    }

    fn search_tags(&self, request: &ApiRequest) -> ApiResult {
        let query = request.query_param("q").unwrap_or_default();
        let tags = self
            .store
            .search_tags(&query)
            .map_err(|error| ApiError::internal(&error))?;
        Ok(ApiResponse::json(
            200,
            &DataEnvelope {
                data: tags.iter().map(TagJson::from).collect::<Vec<_>>(),
            },
        ))
    }

    fn create_tag(&self, body: &[u8]) -> ApiResult {
        let request: CreateTagRequest = parse_body(body)?;
        let form = TagFormInput {
            name: request.name.unwrap_or_default(),
            colour: request.colour.clone().flatten(),
        };
        let spec = form
            .to_spec()
            .map_err(|error| ApiError::new(422, error.to_string()))?;
        let colour = match request.colour {
            None => ColourUpdate::Keep,
            Some(raw) => ColourUpdate::Set(raw.as_deref().and_then(TagColour::parse)),
        };
        let tag = self
            .store
            .create_or_fetch_tag(&spec.name, colour)
            .map_err(|error| ApiError::internal(&error))?;
        Ok(ApiResponse::json(
            200,
            &DataEnvelope {
                data: TagJson::from(&tag),
            },
        ))
    }
}

fn parse_id(raw: &str) -> std::result::Result<IngredientId, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(IngredientId::new)
        .ok_or_else(ApiError::not_found)
}

/// An empty body reads as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|error| {
        if error.is_data() {
            ApiError::new(422, format!("invalid request body: {error}"))
        } else {
            ApiError::new(400, "malformed JSON body")
        }
    })
}

/// Same path and query with `page` replaced.
fn page_url(request: &ApiRequest, page: u32) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(request.query.as_bytes()) {
        if key != "page" {
            serializer.append_pair(&key, &value);
        }
    }
    serializer.append_pair("page", &page.to_string());
    let query = serializer.finish();
    match &request.host {
        Some(host) => format!("http://{host}{}?{query}", request.path),
        None => format!("{}?{query}", request.path),
    }
}

fn read_request(request: &mut Request) -> Result<ApiRequest> {
    let method = match request.method() {
        tiny_http::Method::Get => Method::Get,
        tiny_http::Method::Post => Method::Post,
        tiny_http::Method::Patch => Method::Patch,
        _ => Method::Other,
    };
    let mut api_request = ApiRequest::new(method, request.url());
    for field in request.headers() {
        if field.field.equiv("Host") {
            api_request.host = Some(field.value.as_str().to_owned());
        } else if field.field.equiv(XSRF_HEADER) {
            api_request.xsrf_header = Some(field.value.as_str().to_owned());
        }
    }
    request
        .as_reader()
        .read_to_end(&mut api_request.body)
        .context("read request body")?;
    Ok(api_request)
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header {name}"))
}

fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}
