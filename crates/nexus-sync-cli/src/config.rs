use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nexus_sync::{DEFAULT_POOL_CAPACITY, Endpoint};
use serde::{Deserialize, Serialize};

/// Optional settings file. Every field can also be given as a flag.
///
/// ```toml
/// workers = 8
///
/// [from]
/// url = "http://nexus-a:8081"
/// repo = "maven-releases"
///
/// [to]
/// url = "http://nexus-b:8081"
/// user = "deployer"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub from: EndpointSection,
    #[serde(default)]
    pub to: EndpointSection,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub repo: Option<String>,
}

impl EndpointSection {
    /// Fill unset fields from `fallback`.
    fn or(self, fallback: EndpointSection) -> Self {
        Self {
            url: self.url.or(fallback.url),
            user: self.user.or(fallback.user),
            password: self.password.or(fallback.password),
            repo: self.repo.or(fallback.repo),
        }
    }

    fn into_endpoint(self) -> Endpoint {
        Endpoint::new(
            self.url.unwrap_or_else(|| DEFAULT_URL.into()),
            self.user.unwrap_or_else(|| DEFAULT_USER.into()),
            self.password.unwrap_or_else(|| DEFAULT_PASSWORD.into()),
            self.repo.unwrap_or_else(|| DEFAULT_REPO.into()),
        )
    }
}

const DEFAULT_URL: &str = "http://localhost:8081";
const DEFAULT_USER: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin123";
const DEFAULT_REPO: &str = "maven-releases";

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub from: Endpoint,
    pub to: Endpoint,
    pub workers: usize,
}

/// Combine flag values with the config file; flags win, then the file,
/// then built-in defaults.
pub fn resolve(flags: FileConfig, file: FileConfig) -> Settings {
    Settings {
        from: flags.from.or(file.from).into_endpoint(),
        to: flags.to.or(file.to).into_endpoint(),
        workers: flags
            .workers
            .or(file.workers)
            .unwrap_or(DEFAULT_POOL_CAPACITY),
    }
}

/// Config file path: `~/.config/nexus-sync/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nexus-sync").join("config.toml"))
}

/// Load the config file.
///
/// An explicit path must exist and parse. The default location is optional,
/// and a broken file there is skipped with a warning.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        return toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()));
    }

    if let Some(path) = config_path()
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        match toml::from_str::<FileConfig>(&contents) {
            Ok(config) => return Ok(config),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            ),
        }
    }

    Ok(FileConfig::default())
}
