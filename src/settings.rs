use anyhow::{Context, Result, bail};
use materialize::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime settings, read from a TOML file.
///
/// ```toml
/// root = "/sysroot"
/// identities = "host"
///
/// [retry]
/// max_attempts = 5
/// base_delay_ms = 100
/// backoff_factor = 2.0
/// max_delay_ms = 5000
///
/// [firmware]
/// activate = true
/// module = "qemu_fw_cfg"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Managed root every declared path lands under
    pub root: PathBuf,
    /// Where user and group names are resolved
    pub identities: IdentitySource,
    pub retry: RetrySettings,
    pub firmware: FirmwareSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sysroot"),
            identities: IdentitySource::Host,
            retry: RetrySettings::default(),
            firmware: FirmwareSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// The running system's databases
    Host,
    /// `etc/passwd` and `etc/group` under the managed root
    Root,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            backoff_factor: 2.0,
            max_delay_ms: 5000,
        }
    }
}

impl RetrySettings {
    fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            bail!(
                "retry.backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            );
        }
        Ok(())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            backoff_factor: settings.backoff_factor,
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FirmwareSettings {
    /// Load the kernel module before reading fw_cfg entries
    pub activate: bool,
    pub module: String,
}

impl Default for FirmwareSettings {
    fn default() -> Self {
        Self {
            activate: true,
            module: provider::qemu::QEMU_FIRMWARE_MODULE.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::debug!("no settings file given, using defaults");
            return Ok(Self::default());
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("settings file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", path.display()));
            }
        };

        Self::parse(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.retry.validate()?;
        Ok(settings)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }
}
