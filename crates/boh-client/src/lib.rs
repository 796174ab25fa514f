// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use boh_app::api::{
    CreateTagRequest, DataEnvelope, ErrorJson, IngredientJson, Paginated, SyncTagsResponse,
    TagJson, XSRF_COOKIE, XSRF_HEADER,
};
use boh_app::slug::TagSpec;
use boh_app::{Ingredient, IngredientId, Page, Tag, TagColour};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Blocking client for a `boh --serve` instance. Clones share the CSRF token.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: HttpClient,
    xsrf: Arc<Mutex<Option<String>>>,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("remote.base_url must not be empty");
        }
        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("remote.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "remote.base_url {trimmed:?} must use http or https -- fix the URL and retry"
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            http,
            xsrf: Arc::new(Mutex::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Last `XSRF-TOKEN` cookie value seen from the server.
    pub fn xsrf_token(&self) -> Option<String> {
        self.xsrf.lock().ok().and_then(|token| token.clone())
    }

    pub fn list_ingredients(&self, page: u32) -> Result<Page<Ingredient>> {
        let mut url = self.endpoint("ingredients")?;
        url.query_pairs_mut()
            .append_pair("page", &page.max(1).to_string());
        let response = self.send(self.http.get(url))?;
        let parsed: Paginated<IngredientJson> = decode(response, "ingredient page")?;
        parsed.into_page()
    }

    /// `None` when the server answers 404.
    pub fn get_ingredient(&self, ingredient_id: IngredientId) -> Result<Option<Ingredient>> {
        let url = self.endpoint(&format!("ingredients/{}", ingredient_id.get()))?;
        let response = self.send_raw(self.http.get(url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response)?;
        let parsed: IngredientJson = decode(response, "ingredient")?;
        parsed.into_ingredient().map(Some)
    }

    pub fn sync_ingredient_tags(
        &self,
        ingredient_id: IngredientId,
        specs: &[TagSpec],
    ) -> Result<Vec<Tag>> {
        let url = self.endpoint(&format!("ingredients/{}/tags", ingredient_id.get()))?;
        let tags = specs.iter().map(spec_to_json).collect::<Vec<_>>();
        let request = self.with_xsrf(self.http.patch(url).json(&json!({ "tags": tags })));
        let response = self.send(request)?;
        let parsed: SyncTagsResponse = decode(response, "tag sync response")?;
        if !parsed.ok {
            bail!("server rejected tag sync for ingredient {}", ingredient_id.get());
        }
        Ok(parsed.tags.into_iter().map(Tag::from).collect())
    }

    pub fn search_tags(&self, query: &str) -> Result<Vec<Tag>> {
        let mut url = self.endpoint("tags")?;
        if !query.trim().is_empty() {
            url.query_pairs_mut().append_pair("q", query.trim());
        }
        let response = self.send(self.http.get(url))?;
        let parsed: DataEnvelope<Vec<TagJson>> = decode(response, "tag list")?;
        Ok(parsed.data.into_iter().map(Tag::from).collect())
    }

    /// `colour`: `None` leaves an existing tag's colour alone, `Some(None)`
    /// clears it. The TUI never calls this; tags it creates travel inside the
    /// PATCH sync with their colour.
    pub fn create_tag(&self, name: &str, colour: Option<Option<TagColour>>) -> Result<Tag> {
        let url = self.endpoint("tags")?;
        let body = CreateTagRequest {
            name: Some(name.to_owned()),
            colour: colour.map(|colour| colour.map(|colour| colour.as_str().to_owned())),
        };
        let request = self.with_xsrf(self.http.post(url).json(&body));
        let response = self.send(request)?;
        let parsed: DataEnvelope<TagJson> = decode(response, "created tag")?;
        Ok(parsed.data.into())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("build URL for {path}"))
    }

    fn with_xsrf(&self, request: RequestBuilder) -> RequestBuilder {
        match self.xsrf_token() {
            Some(token) => request
                .header(XSRF_HEADER, token.as_str())
                .header(COOKIE, format!("{XSRF_COOKIE}={token}")),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        check_status(self.send_raw(request)?)
    }

    fn send_raw(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;
        self.capture_xsrf(&response);
        Ok(response)
    }

    fn capture_xsrf(&self, response: &Response) {
        let Some(token) = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(xsrf_from_set_cookie)
        else {
            return;
        };
        match self.xsrf.lock() {
            Ok(mut slot) => *slot = Some(token),
            Err(error) => tracing::warn!(error = %error, "csrf token lock poisoned"),
        }
    }
}

fn spec_to_json(spec: &TagSpec) -> Value {
    match spec.colour {
        Some(colour) => json!({ "name": spec.name, "colour": colour.as_str() }),
        None => Value::String(spec.name.clone()),
    }
}

/// Value of an `XSRF-TOKEN=...; Path=/` header, percent-decoded.
fn xsrf_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() != XSRF_COOKIE || value.is_empty() {
        return None;
    }
    let decoded = url::form_urlencoded::parse(format!("v={value}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())?;
    Some(decoded)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(clean_error_response(status, &body))
}

fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    response.json().with_context(|| format!("decode {what}"))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- start it with `boh --serve` or check remote.base_url ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorJson>(body)
        && !parsed.message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), parsed.message);
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{clean_error_response, spec_to_json, xsrf_from_set_cookie};
    use boh_app::TagColour;
    use boh_app::slug::TagSpec;
    use reqwest::StatusCode;
    use serde_json::json;

    #[test]
    fn xsrf_cookie_is_parsed_and_decoded() {
        assert_eq!(
            xsrf_from_set_cookie("XSRF-TOKEN=abc%3D%3D; Path=/; SameSite=Lax").as_deref(),
            Some("abc==")
        );
        assert_eq!(xsrf_from_set_cookie("session=1; Path=/"), None);
        assert_eq!(xsrf_from_set_cookie("XSRF-TOKEN=; Path=/"), None);
    }

    #[test]
    fn specs_serialize_as_strings_or_objects() {
        assert_eq!(spec_to_json(&TagSpec::named("Dairy")), json!("Dairy"));
        assert_eq!(
            spec_to_json(&TagSpec {
                name: "Fresh".to_owned(),
                colour: Some(TagColour::Green),
            }),
            json!({"name": "Fresh", "colour": "green"})
        );
    }

    #[test]
    fn error_bodies_are_summarized() {
        let error = clean_error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"tag name is required"}"#,
        );
        assert_eq!(error.to_string(), "server error (422): tag name is required");

        let error = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(error.to_string(), "server error (502): upstream down");

        let error = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "{\"oops\":1}");
        assert_eq!(error.to_string(), "server returned 500");
    }
}
