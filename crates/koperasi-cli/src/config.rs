// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use koperasi_app::{
    DEFAULT_MONTH_END_PARAM, DEFAULT_MONTH_START_PARAM, DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZES,
    MonthRangeParams,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "koperasi";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_API_TIMEOUT: &str = "10s";
const CONFIG_PATH_ENV: &str = "KOPERASI_CONFIG_PATH";
const TOKEN_ENV: &str = "KOPERASI_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub list: List,
    #[serde(default)]
    pub filters: Filters,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            list: List::default(),
            filters: Filters::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub token: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_API_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_API_TIMEOUT.to_owned()),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct List {
    pub default_page_size: Option<u32>,
    pub page_sizes: Option<Vec<u32>>,
}

impl Default for List {
    fn default() -> Self {
        Self {
            default_page_size: Some(DEFAULT_PAGE_SIZE),
            page_sizes: Some(DEFAULT_PAGE_SIZES.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Filters {
    pub month_start_param: Option<String>,
    pub month_end_param: Option<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            month_start_param: Some(DEFAULT_MONTH_START_PARAM.to_owned()),
            month_end_param: Some(DEFAULT_MONTH_END_PARAM.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and keep values under [api], [list], and [filters]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Run `koperasi --print-example-config` for the current layout",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(base_url) = &self.api.base_url {
            let trimmed = base_url.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                bail!(
                    "api.base_url in {} must start with http:// or https://, got {:?}",
                    path.display(),
                    base_url
                );
            }
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        let page_sizes = self.page_sizes();
        if page_sizes.is_empty() {
            bail!(
                "list.page_sizes in {} must list at least one size",
                path.display()
            );
        }
        if let Some(zero) = page_sizes.iter().find(|size| **size == 0) {
            bail!(
                "list.page_sizes in {} must be positive, got {}",
                path.display(),
                zero
            );
        }
        let default_page_size = self.default_page_size();
        if !page_sizes.contains(&default_page_size) {
            bail!(
                "list.default_page_size {} in {} is not one of list.page_sizes {:?}",
                default_page_size,
                path.display(),
                page_sizes
            );
        }

        let months = self.month_params();
        if months.start.trim().is_empty() || months.end.trim().is_empty() {
            bail!(
                "filters.month_start_param and filters.month_end_param in {} must not be empty",
                path.display()
            );
        }
        if months.start == months.end {
            bail!(
                "filters.month_start_param and filters.month_end_param in {} must differ, both are {:?}",
                path.display(),
                months.start
            );
        }

        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim()
            .trim_end_matches('/')
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_API_TIMEOUT))
    }

    /// Bearer token: `KOPERASI_TOKEN` wins over `[api].token`. Blank values
    /// count as unset.
    pub fn api_token(&self) -> Option<String> {
        env::var(TOKEN_ENV)
            .ok()
            .or_else(|| self.api.token.clone())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn default_page_size(&self) -> u32 {
        self.list.default_page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn page_sizes(&self) -> Vec<u32> {
        self.list
            .page_sizes
            .clone()
            .unwrap_or_else(|| DEFAULT_PAGE_SIZES.to_vec())
    }

    pub fn month_params(&self) -> MonthRangeParams {
        MonthRangeParams::new(
            self.filters
                .month_start_param
                .as_deref()
                .unwrap_or(DEFAULT_MONTH_START_PARAM),
            self.filters
                .month_end_param
                .as_deref()
                .unwrap_or(DEFAULT_MONTH_END_PARAM),
        )
    }

    pub fn example_config(path: &Path) -> String {
        let sizes = DEFAULT_PAGE_SIZES
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "# koperasi config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# Optional. {} overrides it.\n# token = \"...\"\n\n[list]\ndefault_page_size = {}\npage_sizes = [{}]\n\n[filters]\n# Query parameters a YYYY-MM filter expands into.\nmonth_start_param = \"{}\"\nmonth_end_param = \"{}\"\n",
            path.display(),
            DEFAULT_API_BASE_URL,
            DEFAULT_API_TIMEOUT,
            TOKEN_ENV,
            DEFAULT_PAGE_SIZE,
            sizes,
            DEFAULT_MONTH_START_PARAM,
            DEFAULT_MONTH_END_PARAM,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let Some(secs) = mins.checked_mul(60) else {
            bail!("timeout duration {raw:?} is too large");
        };
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
