// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use koperasi_app::{FetchError, FetchResult, Fetcher, MultipartForm, QueryParams};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use url::Url;

/// Shared bearer token. Clones observe the same slot, so a login elsewhere
/// takes effect on the next request.
#[derive(Debug, Clone, Default)]
pub struct CredentialHolder {
    token: Arc<RwLock<Option<String>>>,
}

impl CredentialHolder {
    pub fn new(token: Option<String>) -> Self {
        let holder = Self::default();
        if let Some(token) = token {
            holder.set(token);
        }
        holder
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = (!token.trim().is_empty()).then_some(token);
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: Url,
    timeout: Duration,
    credentials: CredentialHolder,
    http: HttpClient,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration, credentials: CredentialHolder) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let base_url =
            Url::parse(trimmed).with_context(|| format!("api.base_url {trimmed:?} is not a URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?} -- fix the scheme and retry",
                base_url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            credentials,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn credentials(&self) -> &CredentialHolder {
        &self.credentials
    }

    /// Appends `path` to the base URL, keeping any base prefix such as
    /// `/v1`, and encodes `query`.
    pub fn endpoint(&self, path: &str, query: &QueryParams) -> Result<Url, FetchError> {
        let joined = format!("{}/{}", self.base_url(), path.trim_start_matches('/'));
        let mut url = Url::parse(&joined).map_err(|error| FetchError::Transport {
            path: path.to_owned(),
            message: format!("invalid request URL {joined:?}: {error}"),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Reads every file part up front so a missing file fails before any
    /// bytes go out.
    async fn multipart_body(&self, path: &str, form: &MultipartForm) -> Result<Form, FetchError> {
        let mut body = Form::new();
        for (name, value) in &form.text {
            body = body.text(name.clone(), value.clone());
        }
        for (name, file) in &form.files {
            let bytes = tokio::fs::read(file)
                .await
                .map_err(|error| FetchError::Transport {
                    path: path.to_owned(),
                    message: format!(
                        "cannot read {} for field {name} -- check the file path ({error})",
                        file.display()
                    ),
                })?;
            let mut part = Part::bytes(bytes);
            if let Some(file_name) = file.file_name() {
                part = part.file_name(file_name.to_string_lossy().into_owned());
            }
            body = body.part(name.clone(), part);
        }
        Ok(body)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Body<'_>,
    ) -> FetchResult {
        let url = self.endpoint(path, query)?;
        tracing::debug!(target: "koperasi::api", method = %method, path, "request");

        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = self.credentials.get() {
            request = request.bearer_auth(token);
        }
        request = match body {
            Body::Empty => request,
            Body::Json(body) => request.json(body),
            Body::Multipart(form) => request.multipart(form),
        };

        let response = request
            .send()
            .await
            .map_err(|error| self.connection_error(path, &error))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| self.connection_error(path, &error))?;

        if !status.is_success() {
            let message = clean_error_message(status, &String::from_utf8_lossy(&bytes));
            tracing::warn!(
                target: "koperasi::api",
                method = %method,
                path,
                status = status.as_u16(),
                message = %message,
                "request failed"
            );
            return Err(FetchError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                message,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|error| FetchError::Decode {
            path: path.to_owned(),
            message: error.to_string(),
        })
    }

    fn connection_error(&self, path: &str, error: &reqwest::Error) -> FetchError {
        let message = if error.is_timeout() {
            format!(
                "timed out after {:?} -- raise api.timeout or check the server",
                self.timeout
            )
        } else {
            format!(
                "cannot reach {} -- check api.base_url and that the server is running ({error})",
                self.base_url()
            )
        };
        tracing::warn!(target: "koperasi::api", path, message = %message, "transport error");
        FetchError::Transport {
            path: path.to_owned(),
            message,
        }
    }
}

enum Body<'a> {
    Empty,
    Json(&'a Value),
    Multipart(Form),
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, path: &str, query: &QueryParams) -> FetchResult {
        self.send(Method::GET, path, query, Body::Empty).await
    }

    async fn post(&self, path: &str, body: &Value) -> FetchResult {
        self.send(Method::POST, path, &QueryParams::new(), Body::Json(body))
            .await
    }

    async fn put(&self, path: &str, body: &Value) -> FetchResult {
        self.send(Method::PUT, path, &QueryParams::new(), Body::Json(body))
            .await
    }

    async fn post_multipart(&self, path: &str, form: &MultipartForm) -> FetchResult {
        let body = self.multipart_body(path, form).await?;
        self.send(Method::POST, path, &QueryParams::new(), Body::Multipart(body))
            .await
    }

    async fn delete(&self, path: &str) -> FetchResult {
        self.send(Method::DELETE, path, &QueryParams::new(), Body::Empty)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<Value>,
}

/// Best human-readable message from an error body: `message`, then a string
/// `error`, then a short plain-text body.
fn clean_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(message) = parsed.message.filter(|message| !message.is_empty()) {
            return message;
        }
        if let Some(Value::String(error)) = parsed.error
            && !error.is_empty()
        {
            return error;
        }
    }

    let body = body.trim();
    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return body.to_owned();
    }
    format!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{CredentialHolder, HttpFetcher, clean_error_message};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn error_message_prefers_server_message() {
        assert_eq!(
            clean_error_message(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message":"nominal kosong"}"#),
            "nominal kosong"
        );
        assert_eq!(
            clean_error_message(StatusCode::UNAUTHORIZED, r#"{"error":"token expired"}"#),
            "token expired"
        );
        assert_eq!(
            clean_error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            clean_error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"trace":[1,2]}"#),
            "server returned 500"
        );
    }

    #[test]
    fn credential_holder_clones_share_the_token() {
        let holder = CredentialHolder::default();
        let shared = holder.clone();
        holder.set("abc");
        assert_eq!(shared.get().as_deref(), Some("abc"));
        shared.clear();
        assert!(!holder.is_set());
        holder.set("   ");
        assert!(!holder.is_set());
    }

    #[test]
    fn endpoint_keeps_base_prefix_and_encodes_query() -> anyhow::Result<()> {
        let fetcher = HttpFetcher::new(
            "http://127.0.0.1:8000/backend/",
            Duration::from_secs(1),
            CredentialHolder::default(),
        )?;
        let url = fetcher
            .endpoint(
                "/api/savings",
                &vec![
                    ("page".to_owned(), "1".to_owned()),
                    ("name".to_owned(), "Ani Santoso".to_owned()),
                ],
            )
            .map_err(anyhow::Error::from)?;
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/backend/api/savings?page=1&name=Ani+Santoso"
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_base_urls() {
        for base in ["", "   ", "not a url", "ftp://example.com"] {
            assert!(
                HttpFetcher::new(base, Duration::from_secs(1), CredentialHolder::default())
                    .is_err(),
                "base {base:?}"
            );
        }
    }
}
