//! Configuration for promsel.
//!
//! Root directory resolution order:
//! 1. Explicit path passed to `Config::with_root()` / `Config::load_from()`
//! 2. PROMSEL_ROOT environment variable
//! 3. Platform config directory (e.g. ~/.config/promsel)
//! 4. Fallback: $HOME/.config/promsel

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::filters::AdhocFilter;
use crate::matcher::MatchOp;
use crate::template::TemplateVariables;
use crate::{Error, Result};

/// promsel configuration, stored as `config.toml` under the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `config.toml`.
    #[serde(skip)]
    pub root: PathBuf,

    /// Operator used when a command does not name one.
    #[serde(default)]
    pub default_operator: MatchOp,

    /// `tracing` filter directive used when PROMSEL_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Template variables for `render`.
    #[serde(default)]
    pub variables: TemplateVariables,

    /// Adhoc filters applied before any given on the command line.
    #[serde(default)]
    pub filters: Vec<AdhocFilter>,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Config {
    /// Create a default config rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_operator: MatchOp::default(),
            log_filter: default_log_filter(),
            variables: TemplateVariables::default(),
            filters: Vec::new(),
        }
    }

    /// Create a default config at the resolved root.
    pub fn default_location() -> Result<Self> {
        Ok(Self::with_root(resolve_root()?))
    }

    /// Load config from the resolved root, or defaults if there is none.
    pub fn load() -> Result<Self> {
        let root = resolve_root()?;
        Self::load_from(&root)
    }

    /// Load config from a specific root.
    pub fn load_from(root: &Path) -> Result<Self> {
        let config_path = root.join("config.toml");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let mut config: Config = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
            config.root = root.to_path_buf();
            Ok(config)
        } else {
            Ok(Self::with_root(root))
        }
    }

    /// Save config to ROOT/config.toml, creating the root if needed.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(self.config_path(), contents)?;
        Ok(())
    }

    /// Write this config unless one already exists.
    pub fn initialize(&self) -> Result<()> {
        if self.config_path().exists() {
            return Err(Error::AlreadyInitialized(self.root.clone()));
        }
        self.save()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}

/// Resolve the config root using the standard resolution order.
fn resolve_root() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PROMSEL_ROOT") {
        return Ok(PathBuf::from(path));
    }

    if let Some(proj_dirs) = ProjectDirs::from("", "", "promsel") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    let home = std::env::var("HOME")
        .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;
    Ok(PathBuf::from(home).join(".config/promsel"))
}
