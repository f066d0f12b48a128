//! Hostname resolution through WINS
//!
//! WINS lookups are the `wins` source on the `hosts` database of the name
//! service switch. The DHCP-provided WINS server reaches Samba through an
//! `include` of the file the DHCP client writes.

use crate::nsswitch::{with_source, Nsswitch};
use crate::smb_conf::ConfigStore;
use samba_client_common::Result;
use std::path::Path;
use tracing::info;

/// WINS host resolution, diffed against the value seen at read time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostsResolution {
    pub wins: bool,
    baseline: bool,
}

impl HostsResolution {
    pub async fn read(nsswitch: &Path) -> Result<Self> {
        let nss = Nsswitch::load(nsswitch).await?;
        let wins = nss.db("hosts").iter().any(|s| s == "wins");
        Ok(Self {
            wins,
            baseline: wins,
        })
    }

    pub fn set(&mut self, enable: bool) {
        self.wins = enable;
    }

    pub fn modified(&self) -> bool {
        self.wins != self.baseline
    }

    /// Returns whether the file was touched
    pub async fn write(&mut self, nsswitch: &Path) -> Result<bool> {
        if !self.modified() {
            return Ok(false);
        }

        let mut nss = Nsswitch::load(nsswitch).await?;
        let sources = with_source(&nss.db("hosts"), "wins", self.wins);
        nss.set_db("hosts", &sources);
        nss.save(nsswitch).await?;

        info!("WINS host resolution {}", if self.wins { "enabled" } else { "disabled" });
        self.baseline = self.wins;
        Ok(true)
    }
}

/// Whether `[global]` includes the DHCP-provided settings file
pub fn dhcp_include(store: &dyn ConfigStore, dhcp_path: &str) -> bool {
    store.global_list("include").iter().any(|p| p == dhcp_path)
}

pub fn set_dhcp_include(store: &mut dyn ConfigStore, dhcp_path: &str, enable: bool) {
    let mut includes: Vec<String> = store
        .global_list("include")
        .into_iter()
        .filter(|p| p != dhcp_path)
        .collect();
    if enable {
        includes.push(dhcp_path.to_string());
    }
    store.set_global_list("include", &includes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smb_conf::SmbConf;

    #[tokio::test]
    async fn test_write_only_when_changed_from_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsswitch.conf");
        std::fs::write(&path, "hosts:  files wins dns\n").unwrap();

        let mut hosts = HostsResolution::read(&path).await.unwrap();
        assert!(hosts.wins);

        hosts.set(true);
        assert!(!hosts.write(&path).await.unwrap());

        hosts.set(false);
        assert!(hosts.modified());
        assert!(hosts.write(&path).await.unwrap());
        assert!(!hosts.modified());

        let nss = Nsswitch::load(&path).await.unwrap();
        assert_eq!(nss.db("hosts"), vec!["files", "dns"]);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = HostsResolution::read(&dir.path().join("none")).await.unwrap();
        assert!(!hosts.wins);
        assert!(!hosts.modified());
    }

    #[test]
    fn test_dhcp_include() {
        let mut store = SmbConf::new("/nonexistent", "/nonexistent");
        store.set_global_str("include", Some("/etc/samba/local.conf"));

        assert!(!dhcp_include(&store, "/etc/samba/dhcp.conf"));
        set_dhcp_include(&mut store, "/etc/samba/dhcp.conf", true);
        assert!(dhcp_include(&store, "/etc/samba/dhcp.conf"));
        assert_eq!(
            store.global_str("include", ""),
            "/etc/samba/local.conf, /etc/samba/dhcp.conf"
        );

        set_dhcp_include(&mut store, "/etc/samba/dhcp.conf", false);
        assert_eq!(store.global_str("include", ""), "/etc/samba/local.conf");
    }
}
