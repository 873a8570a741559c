//! Configuration for the offline layer.
//!
//! The data-backend list is deliberately explicit configuration rather than
//! guessed from vendor substrings in request URLs: a request is only treated
//! as a data request if its origin is listed here.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Origin the client itself is served from, e.g. "https://finny.app".
  pub origin: String,

  /// Origins of hosted data backends (REST, edge functions). Requests to
  /// these get the network-first strategy and the offline placeholder.
  #[serde(default)]
  pub data_backends: Vec<String>,

  #[serde(default)]
  pub cache: CacheConfig,

  /// Path substrings identifying content-hashed build chunks that must
  /// never be served from a previous deployment's cache.
  #[serde(default = "default_chunk_patterns")]
  pub chunk_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Cache generation. Bumped on deploy; old generations are deleted at
  /// activation.
  #[serde(default = "default_version")]
  pub version: u32,

  /// App-shell documents pre-cached at install. Install is all-or-nothing
  /// over this list.
  #[serde(default = "default_shell_manifest")]
  pub shell_manifest: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      version: default_version(),
      shell_manifest: default_shell_manifest(),
    }
  }
}

fn default_version() -> u32 {
  1
}

fn default_shell_manifest() -> Vec<String> {
  vec![
    "/".to_string(),
    "/index.html".to_string(),
    "/manifest.json".to_string(),
  ]
}

fn default_chunk_patterns() -> Vec<String> {
  vec!["/assets/".to_string()]
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./finsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/finsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/finsync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("finsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("finsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The app origin as a parsed URL.
  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }

  /// Name of the current app-shell store, e.g. "app-shell-v4".
  pub fn shell_store(&self) -> String {
    format!("app-shell-v{}", self.cache.version)
  }

  /// Name of the current data store, e.g. "data-cache-v4".
  pub fn data_store(&self) -> String {
    format!("data-cache-v{}", self.cache.version)
  }

  /// Stores that survive activation. Everything else is deleted.
  pub fn allowed_stores(&self) -> Vec<String> {
    vec![self.shell_store(), self.data_store()]
  }

  /// Absolute URL of the shell entry document (first manifest entry).
  pub fn shell_entry_url(&self) -> Result<Url> {
    let entry = self
      .cache
      .shell_manifest
      .first()
      .ok_or_else(|| eyre!("Shell manifest is empty"))?;
    self.manifest_url(entry)
  }

  /// Resolve a shell-manifest path against the app origin.
  pub fn manifest_url(&self, path: &str) -> Result<Url> {
    self
      .origin_url()?
      .join(path)
      .map_err(|e| eyre!("Invalid shell manifest entry '{}': {}", path, e))
  }
}

#[cfg(test)]
pub fn test_config() -> Config {
  serde_yaml::from_str(
    r#"
origin: https://finny.app
data_backends:
  - https://backend.finny.app
cache:
  version: 4
"#,
  )
  .expect("test config parses")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_names_carry_the_version() {
    let config = test_config();
    assert_eq!(config.shell_store(), "app-shell-v4");
    assert_eq!(config.data_store(), "data-cache-v4");
    assert_eq!(
      config.allowed_stores(),
      vec!["app-shell-v4".to_string(), "data-cache-v4".to_string()]
    );
  }

  #[test]
  fn defaults_fill_in_manifest_and_chunks() {
    let config: Config = serde_yaml::from_str("origin: https://finny.app").unwrap();
    assert_eq!(config.cache.version, 1);
    assert_eq!(
      config.cache.shell_manifest,
      vec!["/", "/index.html", "/manifest.json"]
    );
    assert_eq!(config.chunk_patterns, vec!["/assets/"]);
    assert!(config.data_backends.is_empty());
  }

  #[test]
  fn manifest_paths_resolve_against_origin() {
    let config = test_config();
    assert_eq!(
      config.manifest_url("/manifest.json").unwrap().as_str(),
      "https://finny.app/manifest.json"
    );
    assert_eq!(
      config.shell_entry_url().unwrap().as_str(),
      "https://finny.app/"
    );
  }
}
