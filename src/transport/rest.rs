use crate::config::ApplianceConfig;
use anyhow::{Context, Result, bail};
use converge::{Body, Method, Response, RestCall};
use log::debug;
use std::io::Read;
use std::time::Duration;
use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

const TOKEN_HEADER: &str = "X-DD-AUTH-TOKEN";
const AUTH_PATH: &str = "/rest/v1.0/auth";

/// Token-authenticated HTTPS session to the appliance REST API
pub struct RestTransport {
    agent: Agent,
    base: String,
    token: String,
}

fn build_agent(config: &ApplianceConfig) -> Agent {
    let tls = TlsConfig::builder()
        .disable_verification(!config.verify_tls)
        .build();
    let agent_config = Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
        .http_status_as_error(false)
        .tls_config(tls)
        .build();
    Agent::new_with_config(agent_config)
}

/// Login payloads, tried in order
fn login_bodies(username: &str, password: &str) -> [serde_json::Value; 2] {
    [
        serde_json::json!({"auth_info": {"username": username, "password": password}}),
        serde_json::json!({"username": username, "password": password}),
    ]
}

fn is_success(status: u16) -> bool {
    matches!(status, 200 | 201 | 204)
}

fn with_headers<B>(request: RequestBuilder<B>, token: &str, query: &[(String, String)]) -> RequestBuilder<B> {
    let mut request = request
        .header(TOKEN_HEADER, token)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json");
    for (key, value) in query {
        request = request.query(key, value);
    }
    request
}

/// Whole response body as text
fn read_body(mut reader: impl Read, url: &str) -> Result<String> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .with_context(|| format!("Could not read response body from {url}"))?;
    Ok(text)
}

/// Parse a response body: JSON when it parses, text otherwise
fn parse_body(status: u16, text: String) -> Response {
    let success = is_success(status);
    let body = if text.trim().is_empty() {
        Body::Text(if success { String::new() } else { format!("HTTP {status}") })
    } else if !success {
        Body::Text(format!("HTTP {status}: {}", text.trim()))
    } else {
        serde_json::from_str(&text)
            .map(Body::Json)
            .unwrap_or(Body::Text(text))
    };
    Response { success, body }
}

impl RestTransport {
    pub fn login(config: &ApplianceConfig) -> Result<Self> {
        let password = config
            .password
            .as_deref()
            .context("REST calls need a password; set DDCTL_PASSWORD or add it to the config")?;
        let agent = build_agent(config);
        let base = config.rest_base();
        let url = format!("{base}{AUTH_PATH}");

        for body in login_bodies(&config.username, password) {
            let response = agent
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .send_json(&body)
                .with_context(|| format!("Could not reach {url}"))?;
            let status = response.status().as_u16();
            let token = response
                .headers()
                .get(TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            match token {
                Some(token) if matches!(status, 200 | 201) => {
                    return Ok(Self { agent, base, token });
                }
                _ => debug!("Login attempt returned HTTP {status}"),
            }
        }
        bail!("REST login to {url} failed for user {}", config.username)
    }

    pub fn send(&mut self, call: &RestCall) -> Result<Response> {
        let url = format!("{}{}", self.base, call.path);
        let token = self.token.as_str();
        let query = call.query.as_slice();

        let mut response = match (call.method, &call.body) {
            (Method::Get, _) => with_headers(self.agent.get(&url), token, query).call()?,
            (Method::Delete, _) => with_headers(self.agent.delete(&url), token, query).call()?,
            (Method::Post, Some(body)) => {
                with_headers(self.agent.post(&url), token, query).send_json(body)?
            }
            (Method::Post, None) => with_headers(self.agent.post(&url), token, query).send_empty()?,
            (Method::Put, Some(body)) => {
                with_headers(self.agent.put(&url), token, query).send_json(body)?
            }
            (Method::Put, None) => with_headers(self.agent.put(&url), token, query).send_empty()?,
        };

        let status = response.status().as_u16();
        let text = read_body(response.body_mut().as_reader(), &url)?;
        debug!("{} {} -> HTTP {status}", call.method, call.path);
        Ok(parse_body(status, text))
    }
}
