//! Configuration management for the Samba client tools
//!
//! Settings are loaded from:
//! 1. Environment variables (highest priority)
//! 2. Configuration file (TOML format)
//! 3. Default values (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// System files that are read and written
    pub paths: PathsConfig,
    /// Service unit names
    pub services: ServicesConfig,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// System file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub smb_conf: PathBuf,
    /// PAM side of winbind (`cached_login`, `require_membership_of`)
    pub pam_winbind_conf: PathBuf,
    pub nsswitch_conf: PathBuf,
    pub ssh_config: PathBuf,
    pub sshd_config: PathBuf,
    pub pam_mount_conf: PathBuf,
    pub krb5_conf: PathBuf,
    /// File with DHCP-provided settings, as named in `include`
    pub dhcp_include: String,
    /// DHCP client sysconfig holding `DHCLIENT_SET_HOSTNAME`
    pub dhcp_sysconfig: PathBuf,
    /// Directory for user share definitions
    pub shares_dir: PathBuf,
}

/// Service names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub smb: String,
    pub nmb: String,
    pub winbind: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Enable file logging
    pub file_logging_enabled: bool,
    /// JSON lines in the log file
    pub json_format: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            smb_conf: PathBuf::from("/etc/samba/smb.conf"),
            pam_winbind_conf: PathBuf::from("/etc/security/pam_winbind.conf"),
            nsswitch_conf: PathBuf::from("/etc/nsswitch.conf"),
            ssh_config: PathBuf::from("/etc/ssh/ssh_config"),
            sshd_config: PathBuf::from("/etc/ssh/sshd_config"),
            pam_mount_conf: PathBuf::from("/etc/security/pam_mount.conf.xml"),
            krb5_conf: PathBuf::from("/etc/krb5.conf"),
            dhcp_include: "/etc/samba/dhcp.conf".to_string(),
            dhcp_sysconfig: PathBuf::from("/etc/sysconfig/network/dhcp"),
            shares_dir: PathBuf::from("/var/lib/samba/usershares"),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            smb: "smb".to_string(),
            nmb: "nmb".to_string(),
            winbind: "winbind".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("/var/log/samba-client"),
            file_logging_enabled: false,
            json_format: true,
        }
    }
}

impl PathsConfig {
    /// The default layout below `root`, for staged installations and tests
    pub fn under(root: &Path) -> Self {
        let rebase = |path: &Path| root.join(path.strip_prefix("/").unwrap_or(path));
        let defaults = Self::default();
        Self {
            smb_conf: rebase(&defaults.smb_conf),
            pam_winbind_conf: rebase(&defaults.pam_winbind_conf),
            nsswitch_conf: rebase(&defaults.nsswitch_conf),
            ssh_config: rebase(&defaults.ssh_config),
            sshd_config: rebase(&defaults.sshd_config),
            pam_mount_conf: rebase(&defaults.pam_mount_conf),
            krb5_conf: rebase(&defaults.krb5_conf),
            dhcp_include: defaults.dhcp_include,
            dhcp_sysconfig: rebase(&defaults.dhcp_sysconfig),
            shares_dir: rebase(&defaults.shares_dir),
        }
    }

    fn all(&self) -> [(&'static str, &Path); 9] {
        [
            ("smb_conf", self.smb_conf.as_path()),
            ("pam_winbind_conf", self.pam_winbind_conf.as_path()),
            ("nsswitch_conf", self.nsswitch_conf.as_path()),
            ("ssh_config", self.ssh_config.as_path()),
            ("sshd_config", self.sshd_config.as_path()),
            ("pam_mount_conf", self.pam_mount_conf.as_path()),
            ("krb5_conf", self.krb5_conf.as_path()),
            ("dhcp_sysconfig", self.dhcp_sysconfig.as_path()),
            ("shares_dir", self.shares_dir.as_path()),
        ]
    }
}

impl ClientConfig {
    /// Load configuration from environment variables and optional config file
    pub fn load() -> Self {
        let mut config = Self::default();

        // Try to load from config file first
        if let Some(config_path) = Self::find_config_file() {
            match Self::load_from_file(&config_path) {
                Ok(file_config) => config = file_config,
                Err(e) => tracing::warn!("{}, using defaults", e),
            }
        }

        // Override with environment variables
        config.apply_env_overrides();

        config
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Environment variable override
            std::env::var("SAMBA_CLIENT_CONFIG").ok().map(PathBuf::from),
            // Standard locations
            Some(PathBuf::from("/etc/samba-client/config.toml")),
            Some(PathBuf::from("./samba-client.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Paths
        let paths = &mut self.paths;
        for (key, target) in [
            ("SAMBA_CLIENT_SMB_CONF", &mut paths.smb_conf),
            ("SAMBA_CLIENT_PAM_WINBIND_CONF", &mut paths.pam_winbind_conf),
            ("SAMBA_CLIENT_NSSWITCH_CONF", &mut paths.nsswitch_conf),
            ("SAMBA_CLIENT_SSH_CONFIG", &mut paths.ssh_config),
            ("SAMBA_CLIENT_SSHD_CONFIG", &mut paths.sshd_config),
            ("SAMBA_CLIENT_PAM_MOUNT_CONF", &mut paths.pam_mount_conf),
            ("SAMBA_CLIENT_KRB5_CONF", &mut paths.krb5_conf),
            ("SAMBA_CLIENT_DHCP_SYSCONFIG", &mut paths.dhcp_sysconfig),
            ("SAMBA_CLIENT_SHARES_DIR", &mut paths.shares_dir),
        ] {
            if let Some(value) = var(key) {
                *target = PathBuf::from(value);
            }
        }
        if let Some(include) = var("SAMBA_CLIENT_DHCP_INCLUDE") {
            paths.dhcp_include = include;
        }

        // Services
        if let Some(name) = var("SAMBA_CLIENT_SMB_SERVICE") {
            self.services.smb = name;
        }
        if let Some(name) = var("SAMBA_CLIENT_NMB_SERVICE") {
            self.services.nmb = name;
        }
        if let Some(name) = var("SAMBA_CLIENT_WINBIND_SERVICE") {
            self.services.winbind = name;
        }

        // Logging
        if let Some(level) = var("SAMBA_CLIENT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(path) = var("SAMBA_CLIENT_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(path);
        }
        if let Some(enabled) = var("SAMBA_CLIENT_FILE_LOGGING") {
            self.logging.file_logging_enabled = enabled.parse().unwrap_or(true);
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in self.paths.all() {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!("Path {} cannot be empty", name)));
            }
        }
        if self.paths.dhcp_include.is_empty() {
            return Err(ConfigError::Validation("Path dhcp_include cannot be empty".to_string()));
        }

        for (name, service) in [
            ("smb", &self.services.smb),
            ("nmb", &self.services.nmb),
            ("winbind", &self.services.winbind),
        ] {
            if service.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Service name for {} cannot be empty",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read configuration file
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    Parse(String),
    /// Configuration validation failed
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::Validation(err) => write!(f, "Config validation failed: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for samba_client_common::Error {
    fn from(e: ConfigError) -> Self {
        samba_client_common::Error::InvalidConfig(e.to_string())
    }
}
