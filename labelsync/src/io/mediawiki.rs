//! Blocking client for the MediaWiki action API.
//!
//! Shared by the wiki adapter (reads) and the item repository adapter (reads
//! and writes). Every request carries `maxlag`; requests refused for lag or
//! with a 5xx status are retried a bounded number of times. Writes are spaced
//! by a minimum interval and carry a CSRF token fetched after login.

use std::cell::{Cell, RefCell};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Error payload returned by the API (`{"error": {"code": ..., "info": ...}}`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API error {code}: {info}")]
pub struct ApiError {
    pub code: String,
    pub info: String,
}

/// Extract the API error from a response body, if it carries one.
pub fn api_error(body: &Value) -> Option<ApiError> {
    let error = body.get("error")?;
    Some(ApiError {
        code: error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        info: error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_agent: String,
    pub maxlag: u32,
    pub max_retries: u32,
    pub write_interval: Duration,
}

/// Client bound to a single `api.php` endpoint.
pub struct ApiClient {
    endpoint: String,
    http: Client,
    options: ClientOptions,
    csrf_token: RefCell<Option<String>>,
    last_write: Cell<Option<Instant>>,
}

impl ApiClient {
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let http = Client::builder()
            .user_agent(options.user_agent.clone())
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
            options,
            csrf_token: RefCell::new(None),
            last_write: Cell::new(None),
        })
    }

    /// Read request (`GET`).
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub fn get(&self, params: &[(&str, &str)]) -> Result<Value> {
        let params = self.with_common(params);
        self.send(|| self.http.get(&self.endpoint).query(&params))
    }

    /// Write request (`POST`) with CSRF token, spaced by `write_interval`.
    ///
    /// A rejected token is refreshed once.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub fn post_write(&self, params: &[(&str, &str)]) -> Result<Value> {
        self.throttle_write();
        let result = self.post_with_token(params);
        self.last_write.set(Some(Instant::now()));
        match result {
            Err(err) if is_code(&err, "badtoken") => {
                warn!("csrf token rejected, refreshing");
                self.csrf_token.replace(None);
                self.post_with_token(params)
            }
            other => other,
        }
    }

    /// Log in with a bot password (`Special:BotPasswords`).
    #[instrument(skip_all, fields(endpoint = %self.endpoint, username = %username))]
    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        let body = self.get(&[("action", "query"), ("meta", "tokens"), ("type", "login")])?;
        let login_token = token_from(&body, "logintoken")?;
        let params = self.with_common(&[
            ("action", "login"),
            ("lgname", username),
            ("lgpassword", password),
            ("lgtoken", login_token.as_str()),
        ]);
        let body = self.send(|| self.http.post(&self.endpoint).form(&params))?;
        let result = body
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("Failed");
        if result != "Success" {
            let reason = body
                .pointer("/login/reason")
                .and_then(Value::as_str)
                .unwrap_or("no reason given");
            return Err(anyhow!("login as {username} failed: {result} ({reason})"));
        }
        info!(username, "logged in");
        self.csrf_token.replace(None);
        Ok(())
    }

    fn post_with_token(&self, params: &[(&str, &str)]) -> Result<Value> {
        let token = self.csrf_token()?;
        let mut params = self.with_common(params);
        params.push(("token".to_string(), token));
        self.send(|| self.http.post(&self.endpoint).form(&params))
    }

    fn csrf_token(&self) -> Result<String> {
        if let Some(token) = self.csrf_token.borrow().as_ref() {
            return Ok(token.clone());
        }
        let body = self.get(&[("action", "query"), ("meta", "tokens"), ("type", "csrf")])?;
        let token = token_from(&body, "csrftoken")?;
        self.csrf_token.replace(Some(token.clone()));
        Ok(token)
    }

    fn throttle_write(&self) {
        if let Some(last) = self.last_write.get() {
            let elapsed = last.elapsed();
            if elapsed < self.options.write_interval {
                let wait = self.options.write_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "throttling write");
                thread::sleep(wait);
            }
        }
    }

    fn with_common(&self, params: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut all: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        all.push(("format".to_string(), "json".to_string()));
        all.push(("formatversion".to_string(), "2".to_string()));
        all.push(("maxlag".to_string(), self.options.maxlag.to_string()));
        all
    }

    fn send<F: Fn() -> RequestBuilder>(&self, build: F) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = build()
                .send()
                .with_context(|| format!("request {}", self.endpoint))?;
            let status = response.status();
            let wait = retry_after(&response);
            if status.is_server_error() && attempt <= self.options.max_retries {
                warn!(%status, attempt, "server error, retrying");
                thread::sleep(wait);
                continue;
            }
            let body = parse_body(response, status)
                .with_context(|| format!("response from {}", self.endpoint))?;
            match api_error(&body) {
                Some(err) if err.code == "maxlag" && attempt <= self.options.max_retries => {
                    warn!(info = %err.info, attempt, "replication lag, retrying");
                    thread::sleep(wait);
                }
                Some(err) => return Err(err.into()),
                None => return Ok(body),
            }
        }
    }
}

fn parse_body(response: Response, status: StatusCode) -> Result<Value> {
    if !status.is_success() {
        return Err(anyhow!("http status {status}"));
    }
    response.json::<Value>().context("decode json body")
}

fn retry_after(response: &Response) -> Duration {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn token_from(body: &Value, name: &str) -> Result<String> {
    body.pointer(&format!("/query/tokens/{name}"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("response carries no {name}"))
}

fn is_code(err: &anyhow::Error, code: &str) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(|api| api.code == code)
}
