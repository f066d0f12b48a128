//! Human-readable overview of the current settings

use crate::idmap::{idmap_ranges, IdmapRange};
use crate::kerberos::kerberos_method;
use crate::membership::workgroup;
use crate::settings::ClientSettings;
use crate::shares::{guest_access, max_shares};
use crate::smb_conf::ConfigStore;
use crate::winbind::{required_groups, winbind_caching};
use samba_client_common::{KerberosMethod, MembershipStatus};
use serde::Serialize;
use std::collections::BTreeMap;

pub const NOT_CONFIGURED: &str = "Not configured yet.";

#[derive(Debug, Clone, Serialize)]
pub struct SettingsSummary {
    pub configured: bool,
    pub workgroup: String,
    pub membership: MembershipStatus,
    pub ads_server: Option<String>,
    pub winbind: bool,
    pub offline_authentication: bool,
    pub required_groups: Vec<String>,
    pub kerberos_method: KerberosMethod,
    pub idmap: BTreeMap<String, IdmapRange>,
    pub mkhomedir: bool,
    pub ssh_single_sign_on: bool,
    pub wins_host_resolution: bool,
    pub pam_mount_volumes: usize,
    pub max_shares: i64,
    pub shares_group: String,
    pub guest_shares: bool,
}

impl SettingsSummary {
    pub fn collect(store: &dyn ConfigStore, settings: &ClientSettings) -> Self {
        Self {
            configured: settings.globals_configured,
            workgroup: workgroup(store),
            membership: settings.membership,
            ads_server: settings.ads_server.clone(),
            winbind: settings.winbind.enabled,
            offline_authentication: winbind_caching(store),
            required_groups: required_groups(store),
            kerberos_method: kerberos_method(store),
            idmap: idmap_ranges(store),
            mkhomedir: settings.homedir.enabled,
            ssh_single_sign_on: settings.ssh.enabled,
            wins_host_resolution: settings.hosts.wins,
            pam_mount_volumes: settings.pam_mount.volumes.len(),
            max_shares: max_shares(store),
            shares_group: settings.shares.group.clone(),
            guest_shares: guest_access(store),
        }
    }

    pub fn render(&self) -> String {
        if !self.configured {
            return format!("Global Configuration\n  {}\n", NOT_CONFIGURED);
        }

        let mut lines = vec![
            "Global Configuration".to_string(),
            format!("  Workgroup or Domain: {}", self.workgroup),
            format!("  Membership: {}", self.membership),
        ];
        if let Some(server) = &self.ads_server {
            lines.push(format!("  Active Directory server: {}", server));
        }
        lines.push(format!("  Authentication with SMB: {}", yes_no(self.winbind)));
        if self.offline_authentication {
            lines.push("  Offline Authentication Enabled".to_string());
        }
        if !self.required_groups.is_empty() {
            lines.push(format!("  Allowed groups: {}", self.required_groups.join(", ")));
        }
        if self.kerberos_method != KerberosMethod::SecretsOnly {
            lines.push(format!("  Kerberos method: {}", self.kerberos_method));
        }
        for (scope, range) in &self.idmap {
            lines.push(format!(
                "  ID map {}: {}-{} ({})",
                scope, range.min, range.max, range.backend
            ));
        }
        if self.mkhomedir {
            lines.push("  Create Home Directory on Login".to_string());
        }
        if self.ssh_single_sign_on {
            lines.push("  Single Sign-on for SSH".to_string());
        }
        if self.wins_host_resolution {
            lines.push("  Hostname Resolution via WINS".to_string());
        }
        if self.pam_mount_volumes > 0 {
            lines.push(format!("  Mounted server directories: {}", self.pam_mount_volumes));
        }
        if self.max_shares > 0 {
            lines.push(format!("  Maximum Number of Shares: {}", self.max_shares));
            lines.push(format!("  Shares group: {}", self.shares_group));
            if self.guest_shares {
                lines.push("  Guest access to user shares allowed".to_string());
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    pub fn short(&self) -> String {
        if !self.configured {
            return NOT_CONFIGURED.to_string();
        }
        format!(
            "Workgroup or Domain: {}\nAuthentication with SMB: {}",
            self.workgroup,
            yes_no(self.winbind)
        )
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
