use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("ddctl"))
}

/// Default location of the appliance config
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Expand `~` and environment references in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

// ============================================================================
// Appliance Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplianceConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_rest_port")]
    pub rest_port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub verify_tls: bool,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_rest_port() -> u16 {
    3009
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub appliance: ApplianceConfig,
}

/// Connection settings given on the command line or in the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Parse a config file, TOML or JSON by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let is_json = path.extension().is_some_and(|e| e == "json");
        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config format in {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Invalid config format in {}", path.display()))
        }
    }

    /// Load the config and apply overrides
    ///
    /// A missing default config file is fine when the overrides name a
    /// host and user; an explicit `--config` path must exist.
    pub fn load(explicit: Option<&str>, overrides: &Overrides) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(expand_path(p)),
            None => default_config_path().ok().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                let (Some(host), Some(username)) = (&overrides.host, &overrides.username) else {
                    bail!(
                        "No appliance configured: create ~/.config/ddctl/config.toml or set DDCTL_HOST and DDCTL_USER"
                    );
                };
                Self {
                    appliance: ApplianceConfig {
                        host: host.clone(),
                        ssh_port: default_ssh_port(),
                        rest_port: default_rest_port(),
                        username: username.clone(),
                        password: None,
                        private_key: None,
                        timeout_secs: default_timeout(),
                        verify_tls: false,
                    },
                }
            }
        };

        config.apply(overrides);
        Ok(config)
    }

    fn apply(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.appliance.host.clone_from(host);
        }
        if let Some(username) = &overrides.username {
            self.appliance.username.clone_from(username);
        }
        if let Some(password) = &overrides.password {
            self.appliance.password = Some(password.clone());
        }
    }
}

impl ApplianceConfig {
    /// Private key contents, when a key path is configured
    pub fn private_key_text(&self) -> Result<Option<String>> {
        let Some(path) = &self.private_key else {
            return Ok(None);
        };
        let path = expand_path(path);
        let key = fs::read_to_string(&path)
            .with_context(|| format!("Could not read private key {}", path.display()))?;
        Ok(Some(key))
    }

    pub fn rest_base(&self) -> String {
        format!("https://{}:{}", self.host, self.rest_port)
    }
}
