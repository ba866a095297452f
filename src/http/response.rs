use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::Value;

/// Response payload. Structured data is serialized by the boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Json(Value),
}

/// The normalized response handed back to the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("Content-Type", "text/plain")
            .with_body(Body::Text(content.into()))
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("Content-Type", "text/html")
            .with_body(Body::Text(content.into()))
    }

    pub fn json(data: Value) -> Self {
        Self::new(200)
            .with_header("Content-Type", "application/json")
            .with_body(Body::Json(data))
    }

    /// Serialize `data` into a JSON response.
    pub fn serialized<T: Serialize>(data: &T) -> serde_json::Result<Self> {
        Ok(Self::json(serde_json::to_value(data)?))
    }

    pub fn not_found() -> Self {
        Self::text("Not Found").with_status(404)
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302).with_header("Location", location)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace (or append) a header, keeping header order stable.
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

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The body as it goes over the wire.
    pub fn body_string(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Text(text) => text.clone(),
            Body::Json(value) => value.to_string(),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = axum::http::Response::builder().status(status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(axum::body::Body::from(self.body_string()))
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "Invalid response parts");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            })
    }
}
