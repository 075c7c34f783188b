//! Configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--store-dir`, `--sandbox-dir`, `--log-level`, ...)
//! 2. `--config <file>`
//! 3. `$PGW_CONFIG` environment variable (path to config file)
//! 4. Project-local `.pgw.toml` in the current working directory
//! 5. Global `~/.config/pgw/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, Result};

// ── Section configs ──────────────────────────────────────────────────────────

/// Where workspaces are stored and what new ones start from.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding one JSON record per workspace.
    pub store_dir: Option<String>,
    /// Directory imported as the starter project for new workspaces.
    pub template_dir: Option<String>,
}

/// Sandbox mirror settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SandboxConfig {
    pub enabled: Option<bool>,
    /// Directory the project is mirrored into.
    pub root: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"debug"`.
    pub level: Option<String>,
    /// `"text"` or `"json"`.
    pub format: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub sandbox: SandboxConfig,
    pub logging: LoggingConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const APP_DIR_NAME: &str = "pgw";

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order, excluding `--config`.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("PGW_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".pgw.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_DIR_NAME).join("config.toml"));
    }

    paths
}

/// Read and parse a TOML config file.
pub fn parse_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str::<AppConfig>(&content)
        .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
}

/// Like [`parse_file`], but a missing or broken file yields `None` (broken
/// ones with a warning).
fn load_file(path: &Path) -> Option<AppConfig> {
    if !path.is_file() {
        return None;
    }
    match parse_file(path) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(error = %e, "ignoring config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            workspace: WorkspaceConfig {
                store_dir: other
                    .workspace
                    .store_dir
                    .clone()
                    .or(self.workspace.store_dir),
                template_dir: other
                    .workspace
                    .template_dir
                    .clone()
                    .or(self.workspace.template_dir),
            },
            sandbox: SandboxConfig {
                enabled: other.sandbox.enabled.or(self.sandbox.enabled),
                root: other.sandbox.root.clone().or(self.sandbox.root),
            },
            logging: LoggingConfig {
                level: other.logging.level.clone().or(self.logging.level),
                format: other.logging.format.clone().or(self.logging.format),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// An explicit `--config` file must exist and parse; the implicit
    /// candidates are skipped when missing or broken.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> Result<AppConfig> {
        let mut config = AppConfig::default();

        // Lowest priority first so higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            config = config.merge(&parse_file(cli_path)?);
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        Ok(config)
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Directory of stored workspace records.
    pub fn store_dir(&self) -> PathBuf {
        match &self.workspace.store_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR_NAME).join("playgrounds"))
                .unwrap_or_else(|| PathBuf::from(".pgw").join("playgrounds")),
        }
    }

    /// Starter template directory, if one is configured.
    pub fn template_dir(&self) -> Option<PathBuf> {
        self.workspace.template_dir.as_ref().map(PathBuf::from)
    }

    pub fn sandbox_enabled(&self) -> bool {
        self.sandbox.enabled.unwrap_or(true)
    }

    /// Sandbox mirror directory for the workspace `id`.
    pub fn sandbox_root(&self, id: &str) -> PathBuf {
        match &self.sandbox.root {
            Some(root) => PathBuf::from(root),
            None => std::env::temp_dir().join("pgw-sandbox").join(id),
        }
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Whether logs are written as JSON lines.
    pub fn json_logs(&self) -> bool {
        self.logging
            .format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
