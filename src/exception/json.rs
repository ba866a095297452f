use crate::error::TrellisError;
use crate::exception::ExceptionFilter;
use crate::http::Response;
use serde_json::json;

const INTERNAL_SERVER_ERROR: u16 = 500;

/// Renders every fault as a `500` JSON document.
///
/// With `debug` on, the body carries the error message, its kind and the
/// resolution chain; otherwise only a generic message.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExceptionFilter {
    debug: bool,
}

impl JsonExceptionFilter {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

impl ExceptionFilter for JsonExceptionFilter {
    fn catch(&self, error: &TrellisError) -> Response {
        tracing::error!(kind = error.kind(), error = %error, "Request failed");

        let timestamp = chrono::Utc::now().to_rfc3339();
        let body = if self.debug {
            json!({
                "error": {
                    "message": error.to_string(),
                    "kind": error.kind(),
                    "chain": error.chain().unwrap_or_default(),
                },
                "statusCode": INTERNAL_SERVER_ERROR,
                "timestamp": timestamp,
            })
        } else {
            json!({
                "error": "Internal Server Error",
                "statusCode": INTERNAL_SERVER_ERROR,
                "timestamp": timestamp,
            })
        };

        Response::json(body).with_status(INTERNAL_SERVER_ERROR)
    }
}
