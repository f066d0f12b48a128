//! Winbind authentication
//!
//! Enabling winbind lets domain users log in: the daemon runs, nsswitch
//! and PAM consult it, and `smb.conf` is normalized for the kind of domain
//! this host belongs to.

use crate::host::Host;
use crate::idmap::ensure_default_scope;
use crate::kerberos::default_keytab_method;
use crate::services::ServiceManager;
use crate::smb_conf::{ConfigStore, GLOBAL};
use samba_client_common::{Error, MembershipStatus, Result};
use tracing::{debug, info};

pub const WINBIND_PACKAGE: &str = "samba-winbind";

/// PAM module name as known to pam-config
pub const WINBIND_PAM_MODULE: &str = "winbind";

pub const CACHED_LOGIN: &str = "cached_login";
pub const OFFLINE_LOGON: &str = "winbind offline logon";
pub const REQUIRE_MEMBERSHIP: &str = "require_membership_of";

pub const TEMPLATE_SHELL: (&str, &str) = ("template shell", "/bin/bash");
pub const TEMPLATE_HOMEDIR: (&str, &str) = ("template homedir", "/home/%D/%U");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Winbind {
    pub enabled: bool,
    modified: bool,
}

impl Winbind {
    pub async fn read(services: &dyn ServiceManager, service: &str) -> Self {
        Self {
            enabled: services.is_enabled(service).await,
            modified: false,
        }
    }

    /// Returns whether the flag changed. The configuration is normalized on
    /// every call since a new workgroup alone needs it too.
    pub fn set(
        &mut self,
        store: &mut dyn ConfigStore,
        enable: bool,
        workgroup: &str,
        realm: Option<&str>,
    ) -> bool {
        let changed = self.enabled != enable;
        if changed {
            self.enabled = enable;
            self.modified = true;
        }
        adjust_ad_config(store, enable, realm);
        adjust_winbind_config(store, enable, workgroup);
        changed
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
    }
}

/// Winbind needs a domain to authenticate against
pub fn validate_winbind(enable: bool, status: MembershipStatus, workgroup: &str) -> Result<()> {
    if enable && status == MembershipStatus::Workgroup {
        return Err(Error::Validation(format!(
            "Cannot use the workgroup '{}' for Linux authentication.",
            workgroup
        )));
    }
    Ok(())
}

/// `smb.conf` settings that depend on the domain being Active Directory
pub fn adjust_ad_config(store: &mut dyn ConfigStore, enable: bool, realm: Option<&str>) {
    if !enable {
        return;
    }
    match realm.filter(|r| !r.is_empty()) {
        Some(realm) => {
            store.set_global_str("security", Some("ADS"));
            store.set_global_str("realm", Some(realm));
            for (key, value) in [TEMPLATE_SHELL, TEMPLATE_HOMEDIR] {
                if store.get(GLOBAL, key).is_none() {
                    store.set_global_str(key, Some(value));
                }
            }
            default_keytab_method(store);
            debug!("Configured for Active Directory realm {}", realm);
        }
        None => {
            store.set_global_str("security", Some("domain"));
            store.set_global_str("realm", None);
        }
    }
}

pub fn adjust_winbind_config(store: &mut dyn ConfigStore, enable: bool, workgroup: &str) {
    if !enable {
        return;
    }
    ensure_default_scope(store);
    debug!("Winbind configuration normalized for {}", workgroup);
}

/// Offline logins need both the PAM and the daemon side
pub fn winbind_caching(store: &dyn ConfigStore) -> bool {
    store.winbind_get(CACHED_LOGIN).as_deref() == Some("yes")
        && store.global_str(OFFLINE_LOGON, "") == "yes"
}

pub fn set_winbind_caching(store: &mut dyn ConfigStore, enable: bool) {
    let value = enable.then_some("yes");
    store.winbind_set(CACHED_LOGIN, value);
    store.set_global_str(OFFLINE_LOGON, value);
}

/// Groups (names or SIDs) allowed to log in
pub fn required_groups(store: &dyn ConfigStore) -> Vec<String> {
    store
        .winbind_get(REQUIRE_MEMBERSHIP)
        .map(|value| {
            value
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn set_required_groups(store: &mut dyn ConfigStore, groups: &[String]) {
    if groups.is_empty() {
        store.winbind_set(REQUIRE_MEMBERSHIP, None);
    } else {
        store.winbind_set(REQUIRE_MEMBERSHIP, Some(&groups.join(",")));
    }
}

/// Enable or disable the daemon; `write_only` leaves the running state alone
pub async fn adjust_service(
    services: &dyn ServiceManager,
    service: &str,
    enable: bool,
    write_only: bool,
) -> Result<()> {
    if enable {
        services.enable(service).await?;
        if !write_only {
            if services.is_active(service).await {
                services.restart(service).await?;
            } else {
                services.start(service).await?;
            }
        }
    } else {
        services.disable(service).await?;
        if !write_only && services.is_active(service).await {
            services.stop(service).await?;
        }
    }
    info!("Winbind service {}", if enable { "enabled" } else { "disabled" });
    Ok(())
}

pub async fn adjust_pam(host: &dyn Host, enable: bool) -> Result<()> {
    if host.pam_module_enabled(WINBIND_PAM_MODULE).await == enable {
        return Ok(());
    }
    host.set_pam_module(WINBIND_PAM_MODULE, enable).await
}
