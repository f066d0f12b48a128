//! Service lifecycle control
//!
//! Enables, disables, starts and stops the Samba daemons (smb, nmb,
//! winbind) through systemd or OpenRC.

use async_trait::async_trait;
use samba_client_common::{Error, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Abstract service manager
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn enable(&self, name: &str) -> Result<()>;

    async fn disable(&self, name: &str) -> Result<()>;

    async fn start(&self, name: &str) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn restart(&self, name: &str) -> Result<()>;

    /// Whether the service is running; a failed probe reads as not running
    async fn is_active(&self, name: &str) -> bool;

    /// Whether the service starts at boot; a failed probe reads as disabled
    async fn is_enabled(&self, name: &str) -> bool;
}

/// Service action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Enable => "enable",
            ServiceAction::Disable => "disable",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Init system type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
    Systemd,
    OpenRC,
}

/// Detect the init system
pub fn detect_init_system() -> InitSystem {
    if std::path::Path::new("/run/systemd/system").exists() {
        InitSystem::Systemd
    } else {
        InitSystem::OpenRC
    }
}

/// Command line for an action under the given init system
fn command_for(init: InitSystem, action: ServiceAction, name: &str) -> (&'static str, Vec<String>) {
    match init {
        InitSystem::Systemd => ("systemctl", vec![action.as_str().to_string(), name.to_string()]),
        InitSystem::OpenRC => match action {
            ServiceAction::Enable => (
                "rc-update",
                vec!["add".to_string(), name.to_string(), "default".to_string()],
            ),
            ServiceAction::Disable => (
                "rc-update",
                vec!["del".to_string(), name.to_string(), "default".to_string()],
            ),
            _ => ("rc-service", vec![name.to_string(), action.as_str().to_string()]),
        },
    }
}

/// Service manager backed by the host's init system
pub struct SystemServiceManager {
    init_system: InitSystem,
}

impl SystemServiceManager {
    pub fn new() -> Self {
        Self {
            init_system: detect_init_system(),
        }
    }

    pub fn init_system(&self) -> InitSystem {
        self.init_system
    }

    async fn manage(&self, name: &str, action: ServiceAction) -> Result<()> {
        let (cmd, args) = command_for(self.init_system, action, name);
        debug!("Running {} {}", cmd, args.join(" "));

        let output = Command::new(cmd)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::System(format!("Failed to run {}: {}", cmd, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::write(
                format!("service {}", name),
                format!("{} {} failed: {}", cmd, args.join(" "), stderr.trim()),
            ));
        }

        info!("Service {}: {}", name, action);
        Ok(())
    }

    async fn probe(&self, args: &[&str]) -> bool {
        Command::new(args[0])
            .args(&args[1..])
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl Default for SystemServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceManager for SystemServiceManager {
    async fn enable(&self, name: &str) -> Result<()> {
        self.manage(name, ServiceAction::Enable).await
    }

    async fn disable(&self, name: &str) -> Result<()> {
        self.manage(name, ServiceAction::Disable).await
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.manage(name, ServiceAction::Start).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.manage(name, ServiceAction::Stop).await
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.manage(name, ServiceAction::Restart).await
    }

    async fn is_active(&self, name: &str) -> bool {
        match self.init_system {
            InitSystem::Systemd => self.probe(&["systemctl", "is-active", "--quiet", name]).await,
            InitSystem::OpenRC => self.probe(&["rc-service", name, "status"]).await,
        }
    }

    async fn is_enabled(&self, name: &str) -> bool {
        match self.init_system {
            InitSystem::Systemd => self.probe(&["systemctl", "is-enabled", "--quiet", name]).await,
            InitSystem::OpenRC => {
                let link = format!("/etc/runlevels/default/{}", name);
                tokio::fs::symlink_metadata(link).await.is_ok()
            }
        }
    }
}
