//! The desired client settings as one typed record

use crate::homedir::HomeDirectories;
use crate::hosts::HostsResolution;
use crate::membership::JoinCredentials;
use crate::pam_mount::PamMountVolumes;
use crate::shares::SharePolicy;
use crate::ssh::SshSingleSignOn;
use crate::winbind::Winbind;
use samba_client_common::MembershipStatus;
use std::path::PathBuf;

/// Everything a session reads, changes and writes back.
///
/// Values kept in `smb.conf` (workgroup, ID maps, Kerberos method, share
/// limits) live in the configuration store instead; this record holds what
/// the store cannot express and the baselines used to decide what changed.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub winbind: Winbind,
    /// Last membership check; recomputed, never persisted
    pub membership: MembershipStatus,
    /// Domain controller of the AD domain, when there is one
    pub ads_server: Option<String>,
    pub homedir: HomeDirectories,
    pub ssh: SshSingleSignOn,
    pub hosts: HostsResolution,
    pub shares: SharePolicy,
    pub pam_mount: PamMountVolumes,
    /// Used only for an unattended join
    pub credentials: Option<JoinCredentials>,
    pub disable_dhcp_hostname: bool,
    /// Export stays empty until a Read, an Import with globals, or a wizard run
    pub globals_configured: bool,
    pub modified: bool,
}

impl ClientSettings {
    pub fn new(shares_dir: impl Into<PathBuf>) -> Self {
        Self {
            winbind: Winbind::default(),
            membership: MembershipStatus::Unknown,
            ads_server: None,
            homedir: HomeDirectories::default(),
            ssh: SshSingleSignOn::default(),
            hosts: HostsResolution::default(),
            shares: SharePolicy::new(shares_dir),
            pam_mount: PamMountVolumes::default(),
            credentials: None,
            disable_dhcp_hostname: false,
            globals_configured: false,
            modified: false,
        }
    }

    pub fn ads_configured(&self) -> bool {
        self.ads_server.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Changes that have not been written or exported yet
    pub fn modified(&self) -> bool {
        self.modified
            || self.winbind.modified()
            || self.homedir.modified()
            || self.ssh.modified()
            || self.hosts.modified()
            || self.shares.modified()
            || self.pam_mount.modified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unmodified() {
        let settings = ClientSettings::new("/var/lib/samba/usershares");
        assert!(!settings.modified());
        assert!(!settings.globals_configured);
        assert!(!settings.ads_configured());
        assert_eq!(settings.membership, MembershipStatus::Unknown);
    }

    #[test]
    fn test_feature_flags_count_as_modified() {
        let mut settings = ClientSettings::new("/srv/shares");
        settings.hosts.set(true);
        assert!(settings.modified());

        let mut settings = ClientSettings::new("/srv/shares");
        settings.shares.mark_modified();
        assert!(settings.modified());

        settings.ads_server = Some(String::new());
        assert!(!settings.ads_configured());
    }
}
