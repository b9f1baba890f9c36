//! Request/response tracing for the GCM HTTP calls.

use anyhow::Result;
use async_trait::async_trait;
use fcmcore::net::{HttpClient, HttpRequest, HttpResponse};
use log::{Level, debug, log_enabled};
use std::sync::Arc;

const MAX_LOGGED_BODY: usize = 2000;
const MAX_LOGGED_HEADER: usize = 120;

/// Logs every exchange at debug level, then defers to the inner client.
/// When debug logging is off for the `Http` target it is a plain passthrough.
pub struct LoggingHttpClient {
    inner: Arc<dyn HttpClient>,
}

impl LoggingHttpClient {
    pub fn new(inner: Arc<dyn HttpClient>) -> Self {
        Self { inner }
    }
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Long header values (tokens, mostly) keep their first 60 and last 20 chars.
fn elide_header(value: &str) -> String {
    let count = value.chars().count();
    if count <= MAX_LOGGED_HEADER {
        return value.to_string();
    }
    let head: String = value.chars().take(60).collect();
    let tail: String = value.chars().skip(count - 20).collect();
    format!("{head}...{tail}")
}

#[async_trait]
impl HttpClient for LoggingHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if !log_enabled!(target: "Http", Level::Debug) {
            return self.inner.execute(request).await;
        }

        let method = request.method;
        let url = request.url.clone();
        debug!(target: "Http", ">>> {method} {url}");
        let mut headers: Vec<_> = request.headers.iter().collect();
        headers.sort();
        for (key, value) in headers {
            debug!(target: "Http", "  Request header {key}: {}", elide_header(value));
        }
        if let Some(body) = &request.body {
            let text = String::from_utf8_lossy(body);
            debug!(
                target: "Http",
                "  Request body ({} bytes): {}",
                body.len(),
                truncate(&text, MAX_LOGGED_BODY)
            );
        }

        match self.inner.execute(request).await {
            Ok(response) => {
                debug!(target: "Http", "<<< {} {url}", response.status_code);
                let text = response.body_string();
                debug!(
                    target: "Http",
                    "  Response body ({} bytes): {}",
                    response.body.len(),
                    truncate(&text, MAX_LOGGED_BODY)
                );
                Ok(response)
            }
            Err(e) => {
                debug!(target: "Http", "<<< Error {method} {url}: {e:#}");
                Err(e)
            }
        }
    }
}
