// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const APP_NAME: &str = "scraped";
pub const API_URL_ENV: &str = "SCRAPED_API_URL";
pub const CONFIG_PATH_ENV: &str = "SCRAPED_CONFIG_PATH";
pub const LOG_FILTER_ENV: &str = "SCRAPED_LOG";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: &str = "45s";
const DEFAULT_LOG_FILTER: &str = "scraped=info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub export: Export,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            export: Export::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Export {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub enabled: Option<bool>,
    pub path: Option<String>,
    pub filter: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            path: None,
            filter: None,
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
        Ok(config_root.join(APP_NAME).join("config.toml"))
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
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [export], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
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
        if let Some(base_url) = &self.api.base_url {
            validate_base_url(base_url)
                .with_context(|| format!("api.base_url in {}", path.display()))?;
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

        if let Some(dir) = &self.export.dir
            && dir.trim().is_empty()
        {
            bail!(
                "export.dir in {} must not be empty; remove it to use the download directory",
                path.display()
            );
        }

        Ok(())
    }

    /// `SCRAPED_API_URL`, then `[api].base_url`, then the local default.
    pub fn api_base_url(&self) -> String {
        let from_env = env::var(API_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        from_env
            .as_deref()
            .or(self.api.base_url.as_deref())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim()
            .trim_end_matches('/')
            .to_owned()
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn export_dir(&self) -> PathBuf {
        match &self.export.dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn log_enabled(&self) -> bool {
        self.log.enabled.unwrap_or(true)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log.path {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].path or disable [log]")
        })?;
        Ok(data_root.join(APP_NAME).join("scraped.log"))
    }

    pub fn log_filter(&self) -> String {
        env::var(LOG_FILTER_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.log.filter.clone())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned())
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# scraped config\n# Place this file at: {}\n\nversion = 1\n\n[api]\n# {API_URL_ENV} overrides this value when set\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[export]\n# Optional. Default is the platform download dir (for example ~/Downloads)\n# dir = \"/absolute/path/to/exports\"\n\n[log]\nenabled = true\n# path = \"/absolute/path/to/scraped.log\"\n# filter = \"{}\"\n",
            path.display(),
            DEFAULT_API_BASE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_FILTER,
        )
    }
}

fn validate_base_url(raw: &str) -> Result<()> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("invalid URL {raw:?}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "URL {raw:?} uses scheme {:?}; only http and https are supported",
            parsed.scheme()
        );
    }
    Ok(())
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
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 45s)")
}
