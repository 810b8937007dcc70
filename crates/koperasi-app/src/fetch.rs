// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::QueryParams;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request to {path} failed: {message}")]
    Transport { path: String, message: String },
    #[error("{path} returned HTTP {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },
    #[error("decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl FetchError {
    pub fn path(&self) -> &str {
        match self {
            Self::Transport { path, .. } | Self::Status { path, .. } | Self::Decode { path, .. } => {
                path
            }
        }
    }
}

pub type FetchResult = Result<Value, FetchError>;

/// A `multipart/form-data` body. Files are named by local path; reading them
/// is the fetcher's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub text: Vec<(String, String)>,
    pub files: Vec<(String, PathBuf)>,
}

impl MultipartForm {
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn file(&self, name: &str) -> Option<&Path> {
        self.files
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, path)| path.as_path())
    }
}

/// Asynchronous data access supplied by the caller. Transport, credentials
/// and timeouts are the implementation's concern.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, path: &str, query: &QueryParams) -> FetchResult;
    async fn post(&self, path: &str, body: &Value) -> FetchResult;
    async fn put(&self, path: &str, body: &Value) -> FetchResult;
    async fn post_multipart(&self, path: &str, form: &MultipartForm) -> FetchResult;
    async fn delete(&self, path: &str) -> FetchResult;
}

/// Fire-and-forget user notifications (toasts).
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
    fn notify_success(&self, message: &str);
}

/// Paged list payload. Accepts both the snake_case keys the savings API
/// returns and the camelCase spellings some endpoints use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct ListResponse<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default, alias = "page")]
    pub current_page: Option<u32>,
    #[serde(default, alias = "pageSize", alias = "limit")]
    pub per_page: Option<u32>,
    #[serde(default, alias = "lastPage")]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub summary: Option<Value>,
}

impl<T: DeserializeOwned> ListResponse<T> {
    pub fn from_value(path: &str, value: Value) -> Result<Self, FetchError> {
        serde_json::from_value(value).map_err(|error| FetchError::Decode {
            path: path.to_owned(),
            message: error.to_string(),
        })
    }
}

/// Renders a JSON scalar the way a form input would show it.
pub fn display_json(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}
