///! Single-setting changes
///!
///! Each setting is applied to the current state and written like any other
///! change, so `--dry-run` and `--apply` behave the same as for the other
///! commands.

use super::Context;
use crate::interactive::session_interaction;
use crate::output;
use anyhow::Result;
use samba_client::{IdmapBackend, KerberosMethod, RunMode, SambaClient};

#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    SshSingleSignOn(bool),
    Idmap {
        scope: String,
        range: Option<(u32, u32)>,
        backend: Option<IdmapBackend>,
    },
    KerberosMethod(KerberosMethod),
    OfflineLogon(bool),
    RequiredGroups(Vec<String>),
    GuestAccess(bool),
    DhcpWins(bool),
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

impl Setting {
    pub fn apply(&self, client: &mut SambaClient) -> samba_client::Result<()> {
        match self {
            Setting::SshSingleSignOn(enable) => client.set_ssh_support(*enable)?,
            Setting::Idmap {
                scope,
                range,
                backend,
            } => {
                if let Some((min, max)) = range {
                    client.set_idmap_range(scope, *min, *max)?;
                }
                if let Some(backend) = backend {
                    client.set_idmap_backend(scope, *backend)?;
                }
            }
            Setting::KerberosMethod(method) => client.set_kerberos_method(*method),
            Setting::OfflineLogon(enable) => client.set_winbind_caching(*enable),
            Setting::RequiredGroups(groups) => client.set_required_groups(groups),
            Setting::GuestAccess(allow) => client.set_guest_access(*allow),
            Setting::DhcpWins(enable) => client.set_dhcp_include(*enable),
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        match self {
            Setting::SshSingleSignOn(enable) => format!("SSH single sign-on {}", on_off(*enable)),
            Setting::Idmap {
                scope,
                range,
                backend,
            } => {
                let mut parts = Vec::new();
                if let Some((min, max)) = range {
                    parts.push(format!("range {}-{}", min, max));
                }
                if let Some(backend) = backend {
                    parts.push(format!("backend {}", backend));
                }
                format!("ID map {}: {}", scope, parts.join(", "))
            }
            Setting::KerberosMethod(method) => format!("Kerberos method {}", method),
            Setting::OfflineLogon(enable) => format!("Offline authentication {}", on_off(*enable)),
            Setting::RequiredGroups(groups) if groups.is_empty() => {
                "Login allowed for every domain user".to_string()
            }
            Setting::RequiredGroups(groups) => format!("Login restricted to {}", groups.join(", ")),
            Setting::GuestAccess(allow) => format!("Guest access to user shares {}", on_off(*allow)),
            Setting::DhcpWins(enable) => format!("WINS server from DHCP {}", on_off(*enable)),
        }
    }
}

pub async fn handle_set(setting: Setting, ctx: &Context) -> Result<bool> {
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;

    if let Err(e) = setting.apply(&mut client) {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    if !ctx.write(&mut client).await? {
        return Ok(false);
    }
    output::print_success(&setting.describe());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use samba_client::config::ClientConfig;
    use samba_client::memory::{RecordingHost, RecordingServiceManager, ScriptedDirectory};
    use samba_client::smb_conf::{ConfigStore, SmbConf};
    use std::sync::Arc;

    fn client() -> SambaClient {
        SambaClient::new(
            ClientConfig::default(),
            Box::new(SmbConf::new("/nonexistent/smb.conf", "/nonexistent/pam_winbind.conf")),
            Arc::new(ScriptedDirectory::offline()),
            Arc::new(RecordingServiceManager::new()),
            Arc::new(RecordingHost::new()),
            RunMode::Interactive,
        )
    }

    #[test]
    fn test_ssh_needs_workgroup() {
        let mut client = client();
        assert!(Setting::SshSingleSignOn(true).apply(&mut client).is_err());

        client.store_mut().set_global_str("workgroup", Some("WG"));
        Setting::SshSingleSignOn(true).apply(&mut client).unwrap();
        assert!(client.settings.ssh.enabled);
        assert_eq!(client.kerberos_method(), KerberosMethod::SecretsAndKeytab);
    }

    #[test]
    fn test_idmap_applies_range_and_backend() {
        let mut client = client();
        let setting = Setting::Idmap {
            scope: "EXAMPLE".to_string(),
            range: Some((100000, 200000)),
            backend: Some(IdmapBackend::Rid),
        };
        setting.apply(&mut client).unwrap();

        let range = client.idmap_ranges()["EXAMPLE"];
        assert_eq!((range.min, range.max, range.backend), (100000, 200000, IdmapBackend::Rid));
        assert_eq!(setting.describe(), "ID map EXAMPLE: range 100000-200000, backend rid");

        let reversed = Setting::Idmap {
            scope: "EXAMPLE".to_string(),
            range: Some((5, 1)),
            backend: None,
        };
        assert!(reversed.apply(&mut client).is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(Setting::GuestAccess(false).describe(), "Guest access to user shares off");
        assert_eq!(
            Setting::RequiredGroups(vec![]).describe(),
            "Login allowed for every domain user"
        );
        assert_eq!(
            Setting::KerberosMethod(KerberosMethod::SecretsAndKeytab).describe(),
            "Kerberos method secrets and keytab"
        );
    }
}
