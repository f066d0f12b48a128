//! Kerberos settings
//!
//! The `kerberos method` parameter and the system `krb5.conf` written when
//! winbind authenticates against an Active Directory realm.

use crate::smb_conf::{ConfigStore, GLOBAL};
use samba_client_common::{Error, KerberosMethod, Result};
use std::path::Path;
use tracing::{error, info, warn};

pub const KERBEROS_METHOD: &str = "kerberos method";

/// An absent parameter reads as "secrets only"
pub fn kerberos_method(store: &dyn ConfigStore) -> KerberosMethod {
    match store.get(GLOBAL, KERBEROS_METHOD) {
        None => KerberosMethod::SecretsOnly,
        Some(value) if value.trim().is_empty() => KerberosMethod::SecretsOnly,
        Some(value) => value.parse().unwrap_or_else(|e| {
            warn!("{}", e);
            KerberosMethod::SecretsOnly
        }),
    }
}

/// "secrets only" is written as the absence of the parameter
pub fn set_kerberos_method(store: &mut dyn ConfigStore, method: KerberosMethod) {
    match method {
        KerberosMethod::SecretsOnly => store.set_global_str(KERBEROS_METHOD, None),
        other => store.set_global_str(KERBEROS_METHOD, Some(other.as_str())),
    }
}

/// Default to "secrets and keytab" when no method is set at all
pub fn default_keytab_method(store: &mut dyn ConfigStore) -> bool {
    if store.global_str(KERBEROS_METHOD, "").trim().is_empty() {
        set_kerberos_method(store, KerberosMethod::SecretsAndKeytab);
        return true;
    }
    false
}

/// Realm description for krb5.conf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmConfig {
    pub realm: String,
    pub kdc: Option<String>,
}

impl RealmConfig {
    pub fn generate_config(&self) -> String {
        let realm = self.realm.to_uppercase();
        let domain = self.realm.to_lowercase();
        let mut config = String::new();

        // [libdefaults]
        config.push_str("[libdefaults]\n");
        config.push_str(&format!("    default_realm = {}\n", realm));
        config.push_str("    dns_lookup_kdc = true\n");
        config.push_str("    dns_lookup_realm = false\n");
        config.push_str("    ticket_lifetime = 24h\n");
        config.push_str("    renew_lifetime = 7d\n");
        config.push_str("    forwardable = true\n");
        config.push_str("    rdns = false\n");
        config.push('\n');

        // [realms]
        config.push_str("[realms]\n");
        config.push_str(&format!("    {} = {{\n", realm));
        if let Some(ref kdc) = self.kdc {
            config.push_str(&format!("        kdc = {}\n", kdc));
            config.push_str(&format!("        admin_server = {}\n", kdc));
        }
        config.push_str(&format!("        default_domain = {}\n", domain));
        config.push_str("    }\n");
        config.push('\n');

        // [domain_realm]
        config.push_str("[domain_realm]\n");
        config.push_str(&format!("    .{} = {}\n", domain, realm));
        config.push_str(&format!("    {} = {}\n", domain, realm));

        config
    }

    /// Write krb5.conf, keeping the previous file as `.bak`
    pub async fn write(&self, path: &Path) -> Result<()> {
        if tokio::fs::metadata(path).await.is_ok() {
            let mut backup = path.as_os_str().to_owned();
            backup.push(".bak");
            if let Err(e) = tokio::fs::copy(path, &backup).await {
                error!("Cannot back up {}: {}", path.display(), e);
                return Err(Error::write(
                    path.display().to_string(),
                    format!("cannot keep a backup: {}", e),
                ));
            }
        }

        tokio::fs::write(path, self.generate_config())
            .await
            .map_err(|e| Error::write(path.display().to_string(), e))?;

        info!("Wrote Kerberos configuration for {} to {}", self.realm, path.display());
        Ok(())
    }
}
