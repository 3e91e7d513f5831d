//! Layered configuration for shelf.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults.
//! 2. `shelf.toml`, `shelf.yaml` or `shelf.json` in the platform config
//!    directory (e.g. `~/.config/shelf/` on Linux).
//! 3. An explicitly given file, format chosen by extension.
//! 4. `SHELF_`-prefixed environment variables, with `__` separating nested
//!    keys: `SHELF_SYNC__CONCURRENCY=8`.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::{ProjectDirs, UserDirs};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SHELF_";
const FILE_STEM: &str = "shelf";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "shelf", "shelf")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub sync: SyncConfig,
    pub links: LinksConfig,
}

/// How to reach the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path or name of the command-line tool. Searched for when unset.
    pub executable: Option<PathBuf>,
    /// Library directory, or content server URL.
    pub library: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Catalog database file. Defaults to `metadata.db` in a local library.
    pub database: Option<PathBuf>,
    /// Custom column holding subtitles (`#subtitle`); `None` to skip.
    pub subtitle_column: Option<String>,
    /// Custom column holding set/collection names (`#set`); `None` to skip.
    pub set_column: Option<String>,
    /// Log mutating commands instead of running them.
    pub dry_run: bool,
}
impl Default for CatalogConfig {
    fn default() -> Self {
        let library = UserDirs::new()
            .map(|dirs| dirs.home_dir().join("Calibre Library"))
            .unwrap_or_else(|| PathBuf::from("Calibre Library"));
        Self {
            executable: None,
            library: library.to_string_lossy().into_owned(),
            username: None,
            password: None,
            database: None,
            subtitle_column: Some("#subtitle".to_string()),
            set_column: Some("#set".to_string()),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How much newer a source file must be than the catalog's last-modified
    /// time before the latter is corrected.
    pub timestamp_tolerance_minutes: u32,
    /// Books processed at the same time.
    pub concurrency: usize,
    /// Checkpoint file recording the newest fully synced feed entry.
    pub sentinel: Option<PathBuf>,
    /// Remove downloaded files once they have been synced.
    pub delete_source: bool,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_minutes: 180,
            concurrency: 4,
            sentinel: project_dirs().map(|dirs| dirs.data_dir().join("sentinel")),
            delete_source: false,
        }
    }
}

/// Rewriting of links between books in descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Site the books (and their internal links) come from.
    pub base_url: String,
}
impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            base_url: "https://standardebooks.org".to_string(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration from every source.
    ///
    /// # Errors
    /// [`ErrorKind::NotFound`] if `explicit` does not exist,
    /// [`ErrorKind::Load`] if a source is malformed, and
    /// [`ErrorKind::Invalid`] if the merged values fail validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(explicit)?)
    }

    /// The merged sources, before extraction.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dirs) = project_dirs() {
            let dir = dirs.config_dir();
            tracing::trace!(dir = %dir.display(), "Looking for configuration files");
            figment = figment
                .merge(Toml::file(dir.join(format!("{FILE_STEM}.toml"))))
                .merge(Yaml::file(dir.join(format!("{FILE_STEM}.yaml"))))
                .merge(Json::file(dir.join(format!("{FILE_STEM}.json"))));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            figment = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => figment.merge(Toml::file_exact(path)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = match figment.extract() {
            Ok(config) => config,
            Err(err) => exn::bail!(ErrorKind::Load(err.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.library.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid {
                field: "catalog.library",
                reason: "must not be empty",
            });
        }
        if self.catalog.username.is_some() != self.catalog.password.is_some() {
            exn::bail!(ErrorKind::Invalid {
                field: "catalog.username",
                reason: "username and password must be set together",
            });
        }
        if self.sync.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid {
                field: "sync.concurrency",
                reason: "must be at least 1",
            });
        }
        let base = self.links.base_url.to_ascii_lowercase();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            exn::bail!(ErrorKind::Invalid {
                field: "links.base_url",
                reason: "must be an http(s) URL",
            });
        }
        Ok(())
    }
}
