//! Blocking `Transport` backed by ureq, for native hosts.

use ureq::{Agent, RequestBuilder};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Executes requests on a ureq `Agent` configured to hand 4xx/5xx back as
/// data, so status interpretation stays with the client.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-configured agent. It must not treat HTTP error statuses
    /// as transport errors.
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = request.url.as_str();
        let headers = &request.headers;
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Delete, None) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(body)) => {
                with_headers(self.agent.delete(url).force_send_body(), headers).send(body)
            }
            (HttpMethod::Post, Some(body)) => with_headers(self.agent.post(url), headers).send(body),
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(url), headers).send(body),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), headers).send_empty(),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
