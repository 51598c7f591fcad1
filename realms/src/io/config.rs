//! Runtime configuration stored as TOML (`realms.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Runtime configuration (TOML).
///
/// Missing fields fall back to the defaults below, so an empty file is a
/// valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Deepest path `resolve` accepts, in fragments.
    pub max_path_depth: usize,

    /// Initial bucket capacity of the path interner.
    pub interner_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_filter: "warn".to_string(),
            max_path_depth: 64,
            interner_capacity: 64,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.log_filter.trim().is_empty() {
            return Err(anyhow!("log_filter must be non-empty"));
        }
        if self.max_path_depth == 0 {
            return Err(anyhow!("max_path_depth must be > 0"));
        }
        Ok(())
    }
}

/// Read the runtime config at `path`, validated.
///
/// A missing file is not an error: the runtime then runs on
/// `RuntimeConfig::default()`.
pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let cfg = if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read runtime config {}", path.display()))?;
        toml::from_str::<RuntimeConfig>(&raw)
            .with_context(|| format!("parse runtime config {}", path.display()))?
    } else {
        debug!(path = %path.display(), "no runtime config, using defaults");
        RuntimeConfig::default()
    };
    cfg.validate()
        .with_context(|| format!("invalid runtime config {}", path.display()))?;
    Ok(cfg)
}

/// Write `cfg` to `path` as TOML. The file is replaced in one rename, so a
/// reader never sees a half-written config.
pub fn write_config(path: &Path, cfg: &RuntimeConfig) -> Result<()> {
    cfg.validate()?;
    let rendered = toml::to_string_pretty(cfg).context("render runtime config as toml")?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let staging = path.with_extension("toml.tmp");
    fs::write(&staging, format!("{rendered}\n"))
        .with_context(|| format!("write {}", staging.display()))?;
    fs::rename(&staging, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Write a default config to `path` for `realms config init`.
///
/// An existing file is kept unless `force` is set.
pub fn init_config(path: &Path, force: bool) -> Result<RuntimeConfig> {
    if path.exists() && !force {
        bail!(
            "runtime config {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let cfg = RuntimeConfig::default();
    write_config(path, &cfg)?;
    Ok(cfg)
}
