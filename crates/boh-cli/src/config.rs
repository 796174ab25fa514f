// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_REMOTE_TIMEOUT: &str = "5s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            server: Server::default(),
            remote: Remote::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub require_csrf: Option<bool>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND.to_owned()),
            require_csrf: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Remote {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Some(DEFAULT_REMOTE_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub show_dashboard: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            show_dashboard: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("BOH_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set BOH_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(boh_db::APP_NAME);
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
                    "config file {} has no version. Add `version = 1` at the top and keep values under [storage], [server], [remote], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with `boh --print-example-config`",
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
        if let Some(db_path) = &self.storage.db_path {
            boh_db::validate_db_path(db_path)?;
        }

        if let Some(bind) = &self.server.bind
            && bind.trim().is_empty()
        {
            bail!("server.bind in {} must not be empty", path.display());
        }

        if let Some(base_url) = &self.remote.base_url
            && base_url.trim().is_empty()
        {
            bail!(
                "remote.base_url in {} must not be empty; remove it to use the local database",
                path.display()
            );
        }

        if let Some(timeout) = &self.remote.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "remote.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).map_err(|error| {
                anyhow!(
                    "log.level {level:?} in {} is not a valid filter ({error}); use trace, debug, info, warn, or error",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => boh_db::default_db_path(),
        }
    }

    pub fn bind_address(&self) -> &str {
        self.server.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn require_csrf(&self) -> bool {
        self.server.require_csrf.unwrap_or(true)
    }

    pub fn remote_base_url(&self) -> Option<&str> {
        self.remote
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
    }

    pub fn remote_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.remote
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT),
        )
    }

    pub fn show_dashboard(&self) -> bool {
        self.ui.show_dashboard.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log.file {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to a writable path")
        })?;
        Ok(data_root.join(boh_db::APP_NAME).join("boh.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# boh config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is the platform data dir (for example ~/.local/share/boh/boh.db)\n# db_path = \"/absolute/path/to/boh.db\"\n\n[server]\nbind = \"{}\"\nrequire_csrf = true\n\n[remote]\n# Set to use a `boh --serve` instance instead of the local database\n# base_url = \"http://127.0.0.1:8080\"\ntimeout = \"{}\"\n\n[ui]\nshow_dashboard = true\n\n[log]\nlevel = \"{}\"\n# file = \"/absolute/path/to/boh.log\"\n",
            path.display(),
            DEFAULT_BIND,
            DEFAULT_REMOTE_TIMEOUT,
            DEFAULT_LOG_LEVEL,
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
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
