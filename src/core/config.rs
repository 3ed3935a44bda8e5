//! Configuration for release-pilot, stored in release.toml at the root of
//! the working copy named by `--code`.
//!
//! The file names the two services, the branch layout, and the
//! build-descriptor files whose version tokens get bumped. Tokens for both
//! services come from environment variables so no secret ever lands in the
//! repository.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{ConfigError, ReleaseResult};

/// Name of the configuration file, resolved against the working copy root
pub const CONFIG_FILE: &str = "release.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub tracker: TrackerConfig,
  pub forge: ForgeConfig,
  #[serde(default)]
  pub branches: BranchConfig,
  #[serde(default)]
  pub release: ReleaseSettings,
  #[serde(default)]
  pub version_files: Vec<VersionFile>,
  #[serde(default)]
  pub publish: PublishConfig,
}

/// Issue tracker coordinates and naming templates
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
  pub base_url: String,
  /// Project key issues are searched under
  pub project: String,
  /// Template for the fix-version label binding issues to this release;
  /// `{version}` is replaced with the release label
  #[serde(default = "default_fix_version")]
  pub fix_version: String,
  /// Template for the RC testing sub-task summary; `{version}` and `{rc}`
  /// are substituted
  #[serde(default = "default_rc_summary")]
  pub rc_summary: String,
  /// Component assigned to the created testing sub-task
  #[serde(default)]
  pub component: Option<String>,
  /// Environment variable holding the tracker API token
  #[serde(default = "default_tracker_token_env")]
  pub token_env: String,
}

impl TrackerConfig {
  pub fn fix_version_for(&self, label: &str) -> String {
    self.fix_version.replace("{version}", label)
  }

  pub fn rc_summary_for(&self, version: &str, rc_num: u32) -> String {
    self
      .rc_summary
      .replace("{version}", version)
      .replace("{rc}", &rc_num.to_string())
  }
}

/// Review/CI service coordinates
#[derive(Debug, Clone, Deserialize)]
pub struct ForgeConfig {
  pub base_url: String,
  /// Project path (e.g. "group/app") or numeric project id
  pub project: String,
  /// Environment variable holding the forge API token
  #[serde(default = "default_forge_token_env")]
  pub token_env: String,
}

/// Branch layout of the repository being released
#[derive(Debug, Clone, Deserialize)]
pub struct BranchConfig {
  #[serde(default = "default_devel")]
  pub devel: String,
  #[serde(default = "default_trunk")]
  pub trunk: String,
  #[serde(default = "default_remote")]
  pub remote: String,
}

impl Default for BranchConfig {
  fn default() -> Self {
    Self {
      devel: default_devel(),
      trunk: default_trunk(),
      remote: default_remote(),
    }
  }
}

/// Knobs of the stage driver itself
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSettings {
  /// Seconds between polls of external state
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,
  /// How many issues beyond the pre-testing baseline are acceptable at
  /// post-testing before a retest is forced (the RC testing sub-task
  /// itself accounts for one)
  #[serde(default = "default_accepted_new_issues")]
  pub accepted_new_issues: u32,
}

impl Default for ReleaseSettings {
  fn default() -> Self {
    Self {
      poll_interval_secs: default_poll_interval(),
      accepted_new_issues: default_accepted_new_issues(),
    }
  }
}

/// A build-descriptor file with a version token to patch
#[derive(Debug, Clone, Deserialize)]
pub struct VersionFile {
  /// Path relative to the working copy root
  pub path: PathBuf,
  /// Literal substring identifying the lines to patch
  pub marker: String,
  #[serde(default)]
  pub action: BumpAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BumpAction {
  /// Replace the token after the marker with the release label
  #[default]
  Set,
  /// Parse the token after the marker as an integer and add one
  Increment,
}

/// Where to announce the published artifacts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
  /// Link templates posted to the release issue after a successful publish;
  /// `{version}` is substituted
  #[serde(default)]
  pub announce: Vec<String>,
}

impl Config {
  /// Load release.toml from the working copy root
  pub fn load(dir: &Path) -> ReleaseResult<Self> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
      return Err(ConfigError::NotFound { dir: dir.to_path_buf() }.into());
    }
    let content = fs::read_to_string(&path)?;
    let config: Config = toml_edit::de::from_str(&content).map_err(|e| ConfigError::Invalid {
      path: path.clone(),
      message: e.to_string(),
    })?;
    Ok(config)
  }
}

fn default_fix_version() -> String {
  "{version}".to_string()
}

fn default_rc_summary() -> String {
  "{version} RC{rc}".to_string()
}

fn default_tracker_token_env() -> String {
  "TRACKER_TOKEN".to_string()
}

fn default_forge_token_env() -> String {
  "FORGE_TOKEN".to_string()
}

fn default_devel() -> String {
  "develop".to_string()
}

fn default_trunk() -> String {
  "master".to_string()
}

fn default_remote() -> String {
  "origin".to_string()
}

fn default_poll_interval() -> u64 {
  30
}

fn default_accepted_new_issues() -> u32 {
  1
}
