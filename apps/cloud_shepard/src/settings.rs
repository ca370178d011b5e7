use std::{
    env, fs,
    io::ErrorKind,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use droplet_api::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use shepard_core::{
    config::{DEFAULT_IMAGE, DEFAULT_POLL_INTERVAL, DEFAULT_REGION, DEFAULT_SIZE},
    DropletTemplate, PollSettings, ShepardConfig,
};

pub const DEFAULT_SETTINGS_FILE: &str = "cloud_shepard.toml";
pub const SETTINGS_PATH_ENV: &str = "CLOUD_SHEPARD_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    pub region: String,
    pub size: String,
    pub image: String,
    pub poll_interval_ms: u64,
    pub poll_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_key: None,
            page_size: DEFAULT_PAGE_SIZE,
            region: DEFAULT_REGION.into(),
            size: DEFAULT_SIZE.into(),
            image: DEFAULT_IMAGE.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            poll_timeout_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    api_base_url: Option<String>,
    api_key: Option<String>,
    page_size: Option<u32>,
    region: Option<String>,
    size: Option<String>,
    image: Option<String>,
    poll_interval_ms: Option<u64>,
    poll_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn client_config(&self, api_key: String) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            api_key,
            page_size: self.page_size,
        }
    }

    pub fn shepard_config(&self, group_name: String) -> ShepardConfig {
        ShepardConfig {
            group_name,
            template: DropletTemplate {
                region: self.region.clone(),
                size: self.size.clone(),
                image: self.image.clone(),
                ..DropletTemplate::default()
            },
            poll: PollSettings {
                interval: Duration::from_millis(self.poll_interval_ms),
                timeout: self.poll_timeout_secs.map(Duration::from_secs),
            },
        }
    }
}

/// Defaults, then the settings file, then `CLOUD_SHEPARD__*` variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let path = env::var(SETTINGS_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    resolve_settings(raw.as_deref(), |key| env::var(key).ok())
        .with_context(|| format!("invalid settings (file '{}')", path.display()))
}

pub fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings = toml::from_str(raw).context("malformed settings file")?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = file_cfg.api_key {
            settings.api_key = Some(v);
        }
        if let Some(v) = file_cfg.page_size {
            settings.page_size = v;
        }
        if let Some(v) = file_cfg.region {
            settings.region = v;
        }
        if let Some(v) = file_cfg.size {
            settings.size = v;
        }
        if let Some(v) = file_cfg.image {
            settings.image = v;
        }
        if let Some(v) = file_cfg.poll_interval_ms {
            settings.poll_interval_ms = v;
        }
        if let Some(v) = file_cfg.poll_timeout_secs {
            settings.poll_timeout_secs = Some(v);
        }
    }

    if let Some(v) = env("CLOUD_SHEPARD__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("CLOUD_SHEPARD__API_KEY") {
        settings.api_key = Some(v);
    }
    if let Some(v) = env("CLOUD_SHEPARD__REGION") {
        settings.region = v;
    }
    if let Some(v) = env("CLOUD_SHEPARD__SIZE") {
        settings.size = v;
    }
    if let Some(v) = env("CLOUD_SHEPARD__IMAGE") {
        settings.image = v;
    }
    if let Some(v) = parsed_env(&env, "CLOUD_SHEPARD__PAGE_SIZE")? {
        settings.page_size = v;
    }
    if let Some(v) = parsed_env(&env, "CLOUD_SHEPARD__POLL_INTERVAL_MS")? {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = parsed_env(&env, "CLOUD_SHEPARD__POLL_TIMEOUT_SECS")? {
        settings.poll_timeout_secs = Some(v);
    }

    Ok(settings)
}

fn parsed_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key}='{raw}' is not a valid number"))
        })
        .transpose()
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
