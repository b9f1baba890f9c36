use anyhow::Result;
use async_trait::async_trait;
use fcmcore::net::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use std::time::Duration;
use ureq::Agent;

/// Default bound on a whole checkin or register3 exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking `ureq` agent driven from `spawn_blocking`.
///
/// Non-2xx responses come back as ordinary [`HttpResponse`]s: register3
/// reports failures as `Error=...` bodies and callers need to see them.
#[derive(Debug, Clone)]
pub struct UreqHttpClient {
    agent: Agent,
}

impl UreqHttpClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }

    fn execute_blocking(agent: &Agent, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            url,
            method,
            headers,
            body,
        } = request;

        let mut response = match method {
            HttpMethod::Get => {
                let mut req = agent.get(&url);
                for (name, value) in &headers {
                    req = req.header(name, value);
                }
                req.call()?
            }
            HttpMethod::Post => {
                let mut req = agent.post(&url);
                for (name, value) in &headers {
                    req = req.header(name, value);
                }
                match body {
                    Some(body) => req.send(&body[..])?,
                    None => req.send_empty()?,
                }
            }
        };

        Ok(HttpResponse {
            status_code: response.status().as_u16(),
            body: response.body_mut().read_to_vec()?,
        })
    }
}

impl Default for UreqHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for UreqHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || Self::execute_blocking(&agent, request)).await?
    }
}
