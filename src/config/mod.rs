use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::snippet_types::SnippetTypeRegistry;
use crate::index::calendar::DEFAULT_WEEKS;
use crate::schedule::{OffsetList, DEFAULT_OFFSETS};

pub mod snippet_types;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "SnippetRecall";
const APP_NAME: &str = "snippet-recall";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        Self::with_overrides(None, None)
    }

    /// Explicit paths win over the environment, which wins over XDG defaults.
    pub fn with_overrides(config: Option<PathBuf>, data: Option<PathBuf>) -> Result<Self> {
        let paths = ConfigPaths::discover_with(config, data)?;
        Ok(Self { paths })
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        Self::discover_with(None, None)
    }

    pub fn discover_with(config: Option<PathBuf>, data: Option<PathBuf>) -> Result<Self> {
        let override_config = config.or_else(|| env::var("SNIPPET_RECALL_CONFIG").ok().map(PathBuf::from));
        let override_data = data.or_else(|| env::var("SNIPPET_RECALL_DATA").ok().map(PathBuf::from));

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("reviews.db");

        let cache_dir = project_dirs.cache_dir().to_path_buf();
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
            cache_dir,
            log_dir,
            state_dir,
        })
    }

    /// Every path rooted under `root`; used for throwaway workspaces.
    pub fn rooted(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        let state_dir = root.join("state");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            database_path: data_dir.join("reviews.db"),
            data_dir,
            cache_dir: root.join("cache"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.state_dir.join("drafts")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub schedule: ScheduleOptions,
    pub calendar: CalendarOptions,
    pub storage: StorageOptions,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        self.schedule.normalize();
        if self.calendar.weeks == 0 {
            tracing::warn!("calendar.weeks must be at least 1, using 1");
            self.calendar.weeks = 1;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOptions {
    /// Comma-separated day offsets applied to new snippets.
    pub offsets: String,
    pub snippet_types: Vec<String>,
    pub default_type: String,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        let registry = SnippetTypeRegistry::default();
        Self {
            offsets: DEFAULT_OFFSETS.to_string(),
            default_type: registry.first().to_string(),
            snippet_types: registry.all().map(str::to_string).collect(),
        }
    }
}

impl ScheduleOptions {
    pub fn registry(&self) -> SnippetTypeRegistry {
        SnippetTypeRegistry::from_names(&self.snippet_types)
    }

    pub fn offset_list(&self) -> OffsetList {
        OffsetList::parse(&self.offsets)
    }

    fn normalize(&mut self) {
        let registry = self.registry();
        if self.snippet_types.iter().all(|name| name.trim().is_empty()) {
            tracing::warn!("no snippet types configured, restoring the defaults");
        }
        self.snippet_types = registry.all().map(str::to_string).collect();
        match registry.resolve(&self.default_type) {
            Some(name) => self.default_type = name.to_string(),
            None => {
                tracing::warn!(
                    default_type = %self.default_type,
                    fallback = registry.first(),
                    "unknown default snippet type in config"
                );
                self.default_type = registry.first().to_string();
            }
        }
        if self.offset_list().is_empty() {
            tracing::warn!(offsets = %self.offsets, "configured offsets schedule no reviews");
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarOptions {
    pub weeks: u8,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            weeks: DEFAULT_WEEKS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub sheet_name: String,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            sheet_name: "Reviews".to_string(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        if self.sheet_name.trim().is_empty() {
            anyhow::bail!("storage.sheet_name must not be empty");
        }
        Ok(())
    }
}
