use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// An inbound request, fully formed by the transport layer.
///
/// Routing only looks at [`Request::method`] and [`Request::path`]; headers, body
/// and attributes are for middleware and handlers.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: String,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: String,
    attributes: HashMap<String, Value>,
}

impl Request {
    /// Create a request from a method and a request target (`/path?query`).
    pub fn new(method: impl AsRef<str>, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        let path = if path.is_empty() { "/" } else { path };

        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.to_string(),
            query,
            ..Self::default()
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new("POST", uri)
    }

    /// Build a request from an axum/http request, collecting at most `limit` body bytes.
    ///
    /// Bodies and header values must be UTF-8; anything else is an error.
    pub async fn from_http(
        request: axum::http::Request<axum::body::Body>,
        limit: usize,
    ) -> anyhow::Result<Self> {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, limit).await?;

        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let mut request = Self::new(parts.method.as_str(), target);
        for (name, value) in &parts.headers {
            let value = value
                .to_str()
                .with_context(|| format!("header `{name}` is not valid UTF-8"))?;
            request
                .headers
                .push((name.as_str().to_string(), value.to_string()));
        }
        request.body =
            String::from_utf8(bytes.to_vec()).context("request body is not valid UTF-8")?;
        Ok(request)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn is_method(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First value of a query parameter. A key without `=` yields an empty value.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|part| {
            let (k, v) = part.split_once('=').unwrap_or((part, ""));
            (k == key).then_some(v)
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Replace (or add) a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_json(&self) -> bool {
        self.header("Content-Type")
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(key, value);
        self
    }
}
