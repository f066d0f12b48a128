//! SSH single sign-on
//!
//! Kerberos (GSSAPI) logins through OpenSSH. The client side lives in a
//! `Host` block of `ssh_config`, the server side in the global part of
//! `sshd_config`. Each side keeps the state observed at read time so that a
//! side which never took part is left alone on write.

use crate::kerberos::default_keytab_method;
use crate::smb_conf::ConfigStore;
use samba_client_common::{Error, Result};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info, warn};

pub const CLIENT_KEYS: [&str; 2] = ["GSSAPIAuthentication", "GSSAPIDelegateCredentials"];

pub const SERVER_KEYS: [&str; 4] = [
    "GSSAPIAuthentication",
    "GSSAPICleanupCredentials",
    "ChallengeResponseAuthentication",
    "UsePAM",
];

/// Server keys switched off again on disable; the rest keep serving
/// password and PAM logins.
const SERVER_GSSAPI_KEYS: [&str; 2] = ["GSSAPIAuthentication", "GSSAPICleanupCredentials"];

const ALL_HOSTS: &str = "*";

/// Line-preserving OpenSSH configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SshConfigFile {
    lines: Vec<String>,
}

fn keyword(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let split = trimmed
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(trimmed.len());
    let (key, rest) = trimmed.split_at(split);
    let value = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '=');
    Some((key.to_string(), value.trim().to_string()))
}

impl SshConfigFile {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(|l| l.to_string()).collect(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&content))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| Error::write(path.display().to_string(), e))
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    fn is_block_start(line: &str) -> bool {
        keyword(line)
            .map(|(k, _)| k.eq_ignore_ascii_case("Host") || k.eq_ignore_ascii_case("Match"))
            .unwrap_or(false)
    }

    /// Lines before the first `Host` or `Match` block
    pub fn global_block(&self) -> Range<usize> {
        let end = self
            .lines
            .iter()
            .position(|l| Self::is_block_start(l))
            .unwrap_or(self.lines.len());
        0..end
    }

    /// Body of the first `Host` block listing one of `patterns`, with the
    /// pattern that matched
    pub fn host_block(&self, patterns: &[&str]) -> Option<(String, Range<usize>)> {
        for (index, line) in self.lines.iter().enumerate() {
            let Some((key, value)) = keyword(line) else {
                continue;
            };
            if !key.eq_ignore_ascii_case("Host") {
                continue;
            }
            let Some(pattern) = value
                .split_whitespace()
                .find(|p| patterns.iter().any(|wanted| wanted == p))
            else {
                continue;
            };
            let end = self.lines[index + 1..]
                .iter()
                .position(|l| Self::is_block_start(l))
                .map(|offset| index + 1 + offset)
                .unwrap_or(self.lines.len());
            return Some((pattern.to_string(), index + 1..end));
        }
        None
    }

    /// Append an empty `Host <pattern>` block
    pub fn add_host_block(&mut self, pattern: &str) -> Range<usize> {
        if self.lines.last().map(|l| !l.trim().is_empty()).unwrap_or(false) {
            self.lines.push(String::new());
        }
        self.lines.push(format!("Host {}", pattern));
        let start = self.lines.len();
        start..start
    }

    /// First value wins, as in OpenSSH
    pub fn value(&self, block: Range<usize>, key: &str) -> Option<String> {
        self.lines[block]
            .iter()
            .filter_map(|l| keyword(l))
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Returns whether the file changed
    pub fn set(&mut self, block: Range<usize>, key: &str, value: &str, indent: &str) -> bool {
        let existing = block.clone().find(|&i| {
            keyword(&self.lines[i])
                .map(|(k, _)| k.eq_ignore_ascii_case(key))
                .unwrap_or(false)
        });

        match existing {
            Some(i) => {
                if self.value(i..i + 1, key).as_deref() == Some(value) {
                    return false;
                }
                let current_indent: String = self.lines[i]
                    .chars()
                    .take_while(|c| c.is_whitespace())
                    .collect();
                self.lines[i] = format!("{}{} {}", current_indent, key, value);
            }
            None => {
                let at = block
                    .clone()
                    .rev()
                    .find(|&i| !self.lines[i].trim().is_empty())
                    .map(|i| i + 1)
                    .unwrap_or(block.start);
                self.lines.insert(at, format!("{}{} {}", indent, key, value));
            }
        }
        true
    }
}

fn all_yes(file: &SshConfigFile, block: Range<usize>, keys: &[&str]) -> bool {
    keys.iter().all(|key| {
        file.value(block.clone(), key)
            .map(|v| v.eq_ignore_ascii_case("yes"))
            .unwrap_or(false)
    })
}

/// Desired and observed SSH single sign-on state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshSingleSignOn {
    pub enabled: bool,
    was_enabled_client: bool,
    was_enabled_server: bool,
    /// `Host` pattern holding the client settings
    section: Option<String>,
    modified: bool,
}

impl SshSingleSignOn {
    /// Read both configuration files; missing files read as disabled
    pub async fn read(ssh_config: &Path, sshd_config: &Path, hostname: Option<&str>) -> Self {
        let (client, server) = match (
            SshConfigFile::load(ssh_config).await,
            SshConfigFile::load(sshd_config).await,
        ) {
            (Ok(client), Ok(server)) => (client, server),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Cannot read SSH configuration, single sign-on reads as off: {}", e);
                return Self::default();
            }
        };

        let mut patterns = vec![ALL_HOSTS];
        if let Some(name) = hostname {
            patterns.push(name);
        }

        let (section, was_enabled_client) = match client.host_block(&patterns) {
            Some((pattern, block)) => {
                let enabled = all_yes(&client, block, &CLIENT_KEYS);
                (Some(pattern), enabled)
            }
            None => (None, false),
        };
        let was_enabled_server = all_yes(&server, server.global_block(), &SERVER_KEYS);

        debug!(
            "SSH single sign-on: client {}, server {}",
            was_enabled_client, was_enabled_server
        );

        Self {
            enabled: was_enabled_client && was_enabled_server,
            was_enabled_client,
            was_enabled_server,
            section,
            modified: false,
        }
    }

    /// Enabling defaults the Kerberos method to "secrets and keytab" when none is set
    pub fn set(&mut self, enable: bool, store: &mut dyn ConfigStore) {
        self.enabled = enable;
        self.modified = enable != (self.was_enabled_client && self.was_enabled_server);
        if enable && default_keytab_method(store) {
            info!("Kerberos method defaulted to secrets and keytab for SSH single sign-on");
        }
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    pub fn was_enabled(&self) -> (bool, bool) {
        (self.was_enabled_client, self.was_enabled_server)
    }

    /// Only a side that is wanted now or was enabled before is touched
    pub async fn write(&mut self, ssh_config: &Path, sshd_config: &Path) -> Result<()> {
        let value = if self.enabled { "yes" } else { "no" };

        if self.enabled || self.was_enabled_client {
            let mut client = SshConfigFile::load(ssh_config)
                .await
                .map_err(|e| Error::write(ssh_config.display().to_string(), e))?;
            let pattern = self.section.clone().unwrap_or_else(|| ALL_HOSTS.to_string());

            let mut changed = false;
            if client.host_block(&[pattern.as_str()]).is_none() {
                client.add_host_block(&pattern);
                changed = true;
            }
            for key in CLIENT_KEYS {
                // Inserting a line shifts the block, so look it up per key
                if let Some((_, block)) = client.host_block(&[pattern.as_str()]) {
                    changed |= client.set(block, key, value, "    ");
                }
            }
            if changed {
                client.save(ssh_config).await?;
                info!("{} modified", ssh_config.display());
            }
            self.section = Some(pattern);
            self.was_enabled_client = self.enabled;
        }

        if self.enabled || self.was_enabled_server {
            let mut server = SshConfigFile::load(sshd_config)
                .await
                .map_err(|e| Error::write(sshd_config.display().to_string(), e))?;
            let keys: &[&str] = if self.enabled {
                &SERVER_KEYS
            } else {
                &SERVER_GSSAPI_KEYS
            };

            let mut changed = false;
            for key in keys {
                changed |= server.set(server.global_block(), key, value, "");
            }
            if changed {
                server.save(sshd_config).await?;
                info!("{} modified", sshd_config.display());
            }
            self.was_enabled_server = self.enabled;
        }

        self.modified = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kerberos::{kerberos_method, set_kerberos_method};
    use crate::smb_conf::SmbConf;
    use samba_client_common::KerberosMethod;

    const CLIENT: &str = "# ssh_config\n\
Host *\n\
    ForwardX11 no\n\
    GSSAPIAuthentication yes\n\
    GSSAPIDelegateCredentials yes\n";

    const SERVER: &str = "Port 22\n\
GSSAPIAuthentication yes\n\
GSSAPICleanupCredentials yes\n\
ChallengeResponseAuthentication yes\n\
UsePAM yes\n\
\n\
Match User backup\n\
    GSSAPIAuthentication no\n";

    fn files(client: &str, server: &str) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let ssh = dir.path().join("ssh_config");
        let sshd = dir.path().join("sshd_config");
        std::fs::write(&ssh, client).unwrap();
        std::fs::write(&sshd, server).unwrap();
        (dir, ssh, sshd)
    }

    #[test]
    fn test_keyword_forms() {
        assert_eq!(keyword("  UsePAM yes"), Some(("UsePAM".into(), "yes".into())));
        assert_eq!(keyword("UsePAM=yes"), Some(("UsePAM".into(), "yes".into())));
        assert_eq!(keyword("# UsePAM yes"), None);
    }

    #[test]
    fn test_server_global_block_stops_at_match() {
        let file = SshConfigFile::parse(SERVER);
        let block = file.global_block();
        assert_eq!(file.value(block.clone(), "gssapiauthentication").as_deref(), Some("yes"));
        assert!(all_yes(&file, block, &SERVER_KEYS));
    }

    #[tokio::test]
    async fn test_read_enabled() {
        let (_dir, ssh, sshd) = files(CLIENT, SERVER);
        let sso = SshSingleSignOn::read(&ssh, &sshd, Some("client")).await;
        assert!(sso.enabled);
        assert_eq!(sso.was_enabled(), (true, true));
        assert!(!sso.modified());
    }

    #[tokio::test]
    async fn test_read_uses_hostname_block() {
        let client = "Host other\n    GSSAPIAuthentication no\n\
Host client\n    GSSAPIAuthentication yes\n    GSSAPIDelegateCredentials yes\n";
        let (_dir, ssh, sshd) = files(client, SERVER);
        let sso = SshSingleSignOn::read(&ssh, &sshd, Some("client")).await;
        assert!(sso.enabled);
    }

    #[tokio::test]
    async fn test_read_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let sso = SshSingleSignOn::read(&dir.path().join("a"), &dir.path().join("b"), None).await;
        assert!(!sso.enabled);
        assert_eq!(sso.was_enabled(), (false, false));
    }

    #[tokio::test]
    async fn test_modified_against_baseline() {
        let (_dir, ssh, sshd) = files(CLIENT, SERVER);
        let mut store = SmbConf::new("/nonexistent", "/nonexistent");
        let mut sso = SshSingleSignOn::read(&ssh, &sshd, None).await;

        sso.set(true, &mut store);
        assert!(!sso.modified());
        sso.set(false, &mut store);
        assert!(sso.modified());
    }

    #[test]
    fn test_enable_defaults_kerberos_method_only_when_blank() {
        let mut store = SmbConf::new("/nonexistent", "/nonexistent");
        let mut sso = SshSingleSignOn::default();
        sso.set(true, &mut store);
        assert_eq!(kerberos_method(&store), KerberosMethod::SecretsAndKeytab);

        set_kerberos_method(&mut store, KerberosMethod::DedicatedKeytab);
        sso.set(true, &mut store);
        assert_eq!(kerberos_method(&store), KerberosMethod::DedicatedKeytab);
    }

    #[tokio::test]
    async fn test_enable_writes_both_sides() {
        let (_dir, ssh, sshd) = files("Host *\n    ForwardX11 no\n", "Port 22\nUsePAM no\n");
        let mut store = SmbConf::new("/nonexistent", "/nonexistent");
        let mut sso = SshSingleSignOn::read(&ssh, &sshd, None).await;
        assert!(!sso.enabled);

        sso.set(true, &mut store);
        sso.write(&ssh, &sshd).await.unwrap();

        let again = SshSingleSignOn::read(&ssh, &sshd, None).await;
        assert!(again.enabled);
        let server = std::fs::read_to_string(&sshd).unwrap();
        assert!(server.contains("UsePAM yes"));
        assert!(!server.contains("UsePAM no"));
    }

    #[tokio::test]
    async fn test_enable_adds_host_block_when_missing() {
        let (_dir, ssh, sshd) = files("# empty\n", "Port 22\n");
        let mut sso = SshSingleSignOn::default();
        sso.set(true, &mut SmbConf::new("/nonexistent", "/nonexistent"));
        sso.write(&ssh, &sshd).await.unwrap();

        let client = std::fs::read_to_string(&ssh).unwrap();
        assert!(client.contains("Host *\n    GSSAPIAuthentication yes\n    GSSAPIDelegateCredentials yes\n"));
    }

    #[tokio::test]
    async fn test_disable_leaves_uninvolved_side_alone() {
        // Client side was never enabled, server side was
        let client = "Host *\n    GSSAPIAuthentication no\n";
        let (_dir, ssh, sshd) = files(client, SERVER);
        let mut sso = SshSingleSignOn::read(&ssh, &sshd, None).await;
        assert_eq!(sso.was_enabled(), (false, true));

        sso.set(false, &mut SmbConf::new("/nonexistent", "/nonexistent"));
        sso.write(&ssh, &sshd).await.unwrap();

        assert_eq!(std::fs::read_to_string(&ssh).unwrap(), client);
        let server = std::fs::read_to_string(&sshd).unwrap();
        assert!(server.contains("GSSAPIAuthentication no\nGSSAPICleanupCredentials no\n"));
        assert!(server.contains("UsePAM yes"));
        assert!(server.contains("Match User backup\n    GSSAPIAuthentication no\n"));
    }
}
