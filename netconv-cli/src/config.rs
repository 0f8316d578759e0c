//! Settings resolution.
//!
//! Precedence: command line, then environment (both through clap), then the
//! selected profile of the TOML config file, then built-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use netconv_rest::ManagerConfig;
use serde::Deserialize;

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_STATE: &str = "netconv.state.json";

/// One named table of the config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub manager: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub page_size: Option<u32>,
    pub parallelism: Option<usize>,
    pub state: Option<PathBuf>,
    pub audit_log: Option<PathBuf>,
}

pub type ConfigFile = BTreeMap<String, Profile>;

/// `~/.config/netconv/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("netconv").join("config.toml"))
}

/// Load `profile` from `path`, or from the default location when no path is
/// given. A missing default file is the same as an empty one; a missing
/// explicit file is an error.
pub fn load_profile(path: Option<&Path>, profile: &str) -> Result<Profile> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return parse_profile("", profile),
        },
    };

    if !path.exists() {
        if explicit {
            bail!("config file {} does not exist", path.display());
        }
        return parse_profile("", profile);
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_profile(&content, profile)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_profile(content: &str, profile: &str) -> Result<Profile> {
    let mut all: ConfigFile = toml::from_str(content)?;
    match all.remove(profile) {
        Some(found) => Ok(found),
        None if profile == DEFAULT_PROFILE => Ok(Profile::default()),
        None => bail!("profile '{}' not found", profile),
    }
}

/// Values taken from the command line or the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub manager: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub page_size: Option<u32>,
    pub parallelism: Option<usize>,
    pub state: Option<PathBuf>,
    pub audit_log: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub manager: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
    pub timeout: Duration,
    pub max_retries: u32,
    pub page_size: u32,
    pub parallelism: usize,
    pub state: PathBuf,
    pub audit_log: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(overrides: Overrides, profile: Profile) -> Self {
        Self {
            manager: overrides.manager.or(profile.manager),
            username: overrides.username.or(profile.username),
            password: overrides.password.or(profile.password),
            insecure: overrides.insecure || profile.insecure.unwrap_or(false),
            timeout: Duration::from_secs(
                overrides.timeout_secs.or(profile.timeout_secs).unwrap_or(30),
            ),
            max_retries: overrides.max_retries.or(profile.max_retries).unwrap_or(3),
            page_size: overrides.page_size.or(profile.page_size).unwrap_or(1000),
            parallelism: overrides
                .parallelism
                .or(profile.parallelism)
                .unwrap_or(4)
                .max(1),
            state: overrides
                .state
                .or(profile.state)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE)),
            audit_log: overrides.audit_log.or(profile.audit_log),
        }
    }

    pub fn manager_config(&self) -> Result<ManagerConfig> {
        let Some(manager) = &self.manager else {
            bail!("No manager configured. Use --manager, set NETCONV_MANAGER, or add it to the config file");
        };
        Ok(ManagerConfig {
            manager: manager.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            insecure: self.insecure,
            timeout: self.timeout,
            max_retries: self.max_retries,
            page_size: self.page_size,
            ..Default::default()
        })
    }
}
