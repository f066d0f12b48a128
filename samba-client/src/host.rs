//! Local host integration
//!
//! The remaining operating system touch points of a domain setup: package
//! queries, the PAM stack (through `pam-config`), cluster file sync and the
//! DHCP client's hostname handling.

use async_trait::async_trait;
use samba_client_common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

#[async_trait]
pub trait Host: Send + Sync {
    async fn package_installed(&self, package: &str) -> bool;

    async fn pam_module_enabled(&self, module: &str) -> bool;

    async fn set_pam_module(&self, module: &str, enable: bool) -> Result<()>;

    /// Register pam_mount for one PAM service
    async fn enable_pam_mount(&self, service: &str) -> Result<()>;

    async fn synchronize_cluster(&self, smb_conf: &Path) -> Result<()>;

    fn hostname(&self) -> Option<String>;

    /// Operating system name and version, reported to the directory on join
    async fn os_release(&self) -> Option<(String, String)>;

    /// Allow or forbid the DHCP client to set the hostname
    async fn set_dhcp_hostname(&self, allowed: bool) -> Result<()>;
}

pub struct LocalHost {
    dhcp_sysconfig: PathBuf,
    os_release: PathBuf,
}

impl LocalHost {
    pub fn new(dhcp_sysconfig: impl Into<PathBuf>) -> Self {
        Self {
            dhcp_sysconfig: dhcp_sysconfig.into(),
            os_release: PathBuf::from("/etc/os-release"),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<std::process::Output> {
        debug!("Running {} {}", program, args.join(" "));
        Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::System(format!("Failed to run {}: {}", program, e)))
    }

    async fn pam_config(&self, args: &[&str]) -> Result<()> {
        let output = self.run("pam-config", args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::write(
                "PAM configuration",
                format!("pam-config {} failed: {}", args.join(" "), stderr.trim()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn package_installed(&self, package: &str) -> bool {
        if let Ok(out) = self.run("rpm", &["-q", package]).await {
            return out.status.success();
        }
        self.run("dpkg-query", &["-W", "-f=${Status}", package])
            .await
            .map(|out| String::from_utf8_lossy(&out.stdout).contains("install ok installed"))
            .unwrap_or(false)
    }

    async fn pam_module_enabled(&self, module: &str) -> bool {
        let flag = format!("--{}", module);
        match self.run("pam-config", &["-q", flag.as_str()]).await {
            Ok(out) => out.status.success() && !out.stdout.iter().all(u8::is_ascii_whitespace),
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    async fn set_pam_module(&self, module: &str, enable: bool) -> Result<()> {
        let flag = format!("--{}", module);
        let action = if enable { "-a" } else { "-d" };
        self.pam_config(&[action, flag.as_str()]).await?;
        info!("PAM module {} {}", module, if enable { "enabled" } else { "disabled" });
        Ok(())
    }

    async fn enable_pam_mount(&self, service: &str) -> Result<()> {
        let output = self
            .run("pam-config", &["--service", service, "-a", "--mount"])
            .await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(Error::write(
                format!("PAM service {}", service),
                stderr.trim().to_string(),
            ));
        }
        Ok(())
    }

    async fn synchronize_cluster(&self, smb_conf: &Path) -> Result<()> {
        let conf = smb_conf.to_string_lossy().to_string();
        let steps: [&[&str]; 3] = [&["-cr", "/"], &["-f", conf.as_str()], &["-xv"]];

        for args in steps {
            let output = self.run("csync2", args).await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::write(
                    "cluster synchronization",
                    format!("csync2 {} failed: {}", args.join(" "), stderr.trim()),
                ));
            }
        }

        info!("Synchronized {} across the cluster", conf);
        Ok(())
    }

    fn hostname(&self) -> Option<String> {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .map(|h| h.split('.').next().unwrap_or_default().to_string())
            .filter(|h| !h.is_empty())
    }

    async fn os_release(&self) -> Option<(String, String)> {
        let content = tokio::fs::read_to_string(&self.os_release).await.ok()?;
        parse_os_release(&content)
    }

    async fn set_dhcp_hostname(&self, allowed: bool) -> Result<()> {
        let content = match tokio::fs::read_to_string(&self.dhcp_sysconfig).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::Io(e)),
        };

        let value = if allowed { "yes" } else { "no" };
        let updated = set_sysconfig_var(&content, "DHCLIENT_SET_HOSTNAME", value);

        tokio::fs::write(&self.dhcp_sysconfig, updated)
            .await
            .map_err(|e| Error::write(self.dhcp_sysconfig.display().to_string(), e))?;

        info!("DHCLIENT_SET_HOSTNAME set to {}", value);
        Ok(())
    }
}

/// Set `KEY="value"` in a sysconfig file, appending it if absent
pub fn set_sysconfig_var(content: &str, key: &str, value: &str) -> String {
    let assignment = format!("{}=\"{}\"", key, value);
    let prefix = format!("{}=", key);
    let mut found = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if line.trim_start().starts_with(&prefix) {
                found = true;
                assignment.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !found {
        lines.push(assignment);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn parse_os_release(content: &str) -> Option<(String, String)> {
    let mut name = None;
    let mut version = None;

    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "NAME" => name = Some(value),
                "VERSION_ID" => version = Some(value),
                _ => {}
            }
        }
    }

    Some((name?, version.unwrap_or_default()))
}
