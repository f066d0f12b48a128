//! Client state orchestration
//!
//! `SambaClient` owns the collaborators and the desired settings, and runs
//! the four whole-state operations: Read, Write, Import and Export. Write is
//! best effort: every step is attempted, failures are collected and returned
//! together, and nothing already applied is rolled back.

use crate::config::ClientConfig;
use crate::directory::{AdsLookup, DirectoryServiceClient, NetDirectory};
use crate::document::{
    bool_value, section_from_value, section_to_value, ReservedKey, SettingsDocument,
};
use crate::homedir::HomeDirectories;
use crate::host::{Host, LocalHost};
use crate::hosts::{self, HostsResolution};
use crate::idmap::{self, IdmapRange};
use crate::interaction::Interaction;
use crate::kerberos::{self, RealmConfig};
use crate::membership::{self, JoinCredentials, JoinOutcome, MembershipReconciler};
use crate::nsswitch;
use crate::pam_mount::{register_pam_mount, PamMountVolumes};
use crate::services::{ServiceManager, SystemServiceManager};
use crate::settings::ClientSettings;
use crate::shares::{self, adjust_share_services, max_shares, MAX_SHARES};
use crate::smb_conf::{same_key, ConfigSection, ConfigStore, SmbConf, GLOBAL};
use crate::ssh::SshSingleSignOn;
use crate::summary::SettingsSummary;
use crate::validation::{validate_domain_name, validate_workgroup};
use crate::winbind::{self, validate_winbind, Winbind, WINBIND_PACKAGE};
use crate::log_subwrite;
use samba_client_common::{Error, IdmapBackend, KerberosMethod, MembershipStatus, Result, RunMode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Importer = fn(&mut ClientSettings, &Value) -> Result<()>;

/// Handlers for the reserved keys of a settings document
const IMPORTERS: [(ReservedKey, Importer); 6] = [
    (ReservedKey::SharesGroup, import_shares_group),
    (ReservedKey::ActiveDirectory, import_active_directory),
    (ReservedKey::Join, import_join),
    (ReservedKey::MkHomeDir, import_mkhomedir),
    (ReservedKey::DisableDhcpHostname, import_disable_dhcp_hostname),
    // applied once the sections are in the store
    (ReservedKey::Winbind, import_deferred),
];

fn importer(key: ReservedKey) -> Importer {
    IMPORTERS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, f)| *f)
        .unwrap_or(import_deferred)
}

fn expect_bool(key: ReservedKey, value: &Value) -> Result<bool> {
    bool_value(value)
        .ok_or_else(|| Error::Document(format!("'{}' must be a boolean", key.key())))
}

fn import_shares_group(settings: &mut ClientSettings, value: &Value) -> Result<()> {
    let Value::String(group) = value else {
        return Err(Error::Document("'shares_group' must be a string".to_string()));
    };
    settings.shares.group = group.clone();
    settings.shares.mark_modified();
    Ok(())
}

fn import_active_directory(settings: &mut ClientSettings, value: &Value) -> Result<()> {
    settings.ads_server = value
        .get("kdc")
        .and_then(Value::as_str)
        .filter(|kdc| !kdc.is_empty())
        .map(str::to_string);
    Ok(())
}

fn import_join(settings: &mut ClientSettings, value: &Value) -> Result<()> {
    let credentials: JoinCredentials = serde_json::from_value(value.clone())?;
    settings.credentials = (!credentials.is_empty()).then_some(credentials);
    Ok(())
}

fn import_mkhomedir(settings: &mut ClientSettings, value: &Value) -> Result<()> {
    settings.homedir.set(expect_bool(ReservedKey::MkHomeDir, value)?);
    Ok(())
}

fn import_disable_dhcp_hostname(settings: &mut ClientSettings, value: &Value) -> Result<()> {
    settings.disable_dhcp_hostname = expect_bool(ReservedKey::DisableDhcpHostname, value)?;
    Ok(())
}

fn import_deferred(_settings: &mut ClientSettings, _value: &Value) -> Result<()> {
    Ok(())
}

fn validate_idmap_scope(scope: &str) -> Result<()> {
    if scope == idmap::DEFAULT_SCOPE {
        return Ok(());
    }
    validate_domain_name(scope)
}

fn require_workgroup(enable: bool, workgroup: &str) -> Result<()> {
    if enable && workgroup.trim().is_empty() {
        return Err(Error::Validation(
            "Winbind needs a workgroup or domain name".to_string(),
        ));
    }
    Ok(())
}

/// Keep a step's outcome; failures go to `failures`
fn record<T>(failures: &mut Vec<Error>, step: &str, result: Result<T>) -> Option<T> {
    log_subwrite!(step, result);
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            failures.push(e);
            None
        }
    }
}

pub struct SambaClient {
    config: ClientConfig,
    store: Box<dyn ConfigStore>,
    directory: Arc<dyn DirectoryServiceClient>,
    services: Arc<dyn ServiceManager>,
    host: Arc<dyn Host>,
    membership: MembershipReconciler,
    pub settings: ClientSettings,
    mode: RunMode,
    netbios: Option<JoinHandle<Result<()>>>,
}

impl SambaClient {
    pub fn new(
        config: ClientConfig,
        store: Box<dyn ConfigStore>,
        directory: Arc<dyn DirectoryServiceClient>,
        services: Arc<dyn ServiceManager>,
        host: Arc<dyn Host>,
        mode: RunMode,
    ) -> Self {
        let settings = ClientSettings::new(config.paths.shares_dir.clone());
        Self {
            membership: MembershipReconciler::new(directory.clone(), mode),
            config,
            store,
            directory,
            services,
            host,
            settings,
            mode,
            netbios: None,
        }
    }

    /// Backed by the real system files, tools and services
    pub fn system(config: ClientConfig, mode: RunMode) -> Self {
        let store = SmbConf::new(&config.paths.smb_conf, &config.paths.pam_winbind_conf);
        let host = LocalHost::new(&config.paths.dhcp_sysconfig);
        Self::new(
            config,
            Box::new(store),
            Arc::new(NetDirectory::new()),
            Arc::new(SystemServiceManager::new()),
            Arc::new(host),
            mode,
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn store(&self) -> &dyn ConfigStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn ConfigStore {
        self.store.as_mut()
    }

    /// Load the current configuration and the state of every feature
    pub async fn read(&mut self, ui: &dyn Interaction) -> Result<()> {
        ui.busy("Reading global settings...");
        self.store.read().await?;

        // winbind status depends on the loaded configuration
        ui.busy("Reading winbind status...");
        self.settings.winbind =
            Winbind::read(self.services.as_ref(), &self.config.services.winbind).await;

        if self.mode == RunMode::Interactive {
            let directory = self.directory.clone();
            self.netbios = Some(tokio::spawn(async move { directory.refresh_netbios().await }));
        }

        self.settings.ads_server = if self.store.global_str("security", "").eq_ignore_ascii_case("ADS") {
            self.store.get(GLOBAL, "realm").filter(|r| !r.is_empty())
        } else {
            None
        };

        let paths = &self.config.paths;
        self.settings.homedir = HomeDirectories::read(self.host.as_ref()).await;
        self.settings.shares.read(self.store.as_ref());
        self.settings.hosts = HostsResolution::read(&paths.nsswitch_conf)
            .await
            .unwrap_or_else(|e| {
                warn!("Cannot read host resolution settings: {}", e);
                HostsResolution::default()
            });
        let hostname = self.host.hostname();
        self.settings.ssh =
            SshSingleSignOn::read(&paths.ssh_config, &paths.sshd_config, hostname.as_deref()).await;
        self.settings.pam_mount = PamMountVolumes::read(&paths.pam_mount_conf).await;

        self.finish_netbios().await;
        ui.idle();

        self.settings.globals_configured = true;
        self.settings.modified = false;
        info!("Samba client configuration read");
        Ok(())
    }

    /// Wait for the background NetBIOS scan, if one is running
    async fn finish_netbios(&mut self) {
        let Some(handle) = self.netbios.take() else {
            return;
        };
        match handle.await {
            Ok(Ok(())) => debug!("NetBIOS name scan finished"),
            Ok(Err(e)) => warn!("NetBIOS name scan failed: {}", e),
            Err(e) => warn!("NetBIOS name scan did not complete: {}", e),
        }
    }

    /// Apply the settings. With `write_only` no service is started, stopped
    /// or restarted.
    pub async fn write(&mut self, write_only: bool) -> Result<()> {
        let cluster = self.directory.cluster_present(false).await;
        let mut failures = Vec::new();
        let winbind_enabled = self.settings.winbind.enabled;

        if winbind_enabled && self.settings.disable_dhcp_hostname {
            let result = self.host.set_dhcp_hostname(false).await;
            record(&mut failures, "dhcp hostname", result);
        }

        if !self.get_modified() {
            info!("Nothing to write");
            return Self::outcome(failures);
        }

        if self.mode == RunMode::Unattended {
            let result = self.unattended_join().await;
            record(&mut failures, "join", result);
        }

        // the daemons read smb.conf when they start
        let result = self.store.write(write_only).await;
        record(&mut failures, "smb.conf", result);

        let winbind_blocked =
            winbind_enabled && !self.host.package_installed(WINBIND_PACKAGE).await;
        if winbind_blocked {
            record::<()>(
                &mut failures,
                "winbind",
                Err(Error::PackageMissing(WINBIND_PACKAGE.to_string())),
            );
        } else {
            if !(winbind_enabled && cluster) {
                let result = winbind::adjust_service(
                    self.services.as_ref(),
                    &self.config.services.winbind,
                    winbind_enabled,
                    write_only,
                )
                .await;
                record(&mut failures, "winbind service", result);
            }

            let result = nsswitch::adjust_winbind(&self.config.paths.nsswitch_conf, winbind_enabled).await;
            record(&mut failures, "nsswitch.conf", result);

            let result = winbind::adjust_pam(self.host.as_ref(), winbind_enabled).await;
            record(&mut failures, "pam", result);

            if winbind_enabled && self.settings.ads_configured() {
                let result = self.write_kerberos().await;
                record(&mut failures, "krb5.conf", result);
            }
        }

        let result = self.settings.homedir.write(self.host.as_ref()).await;
        record(&mut failures, "mkhomedir", result);

        let max = max_shares(self.store.as_ref());
        let shares = &mut self.settings.shares;
        if max > 0 || shares.modified() || shares.remove_existing {
            let result = shares.write().await;
            record(&mut failures, "usershares", result);
        }

        if !cluster {
            let names = [
                self.config.services.nmb.as_str(),
                self.config.services.smb.as_str(),
            ];
            let result = adjust_share_services(
                self.services.as_ref(),
                &names,
                max,
                self.settings.shares.stop_services,
                write_only,
            )
            .await;
            record(&mut failures, "share services", result);
        }

        if self.settings.ssh.modified() {
            let paths = &self.config.paths;
            let result = self.settings.ssh.write(&paths.ssh_config, &paths.sshd_config).await;
            record(&mut failures, "ssh", result);
        }

        let result = self.settings.hosts.write(&self.config.paths.nsswitch_conf).await;
        record(&mut failures, "hosts resolution", result);

        let result = self.settings.pam_mount.write(&self.config.paths.pam_mount_conf).await;
        if let Some(true) = record(&mut failures, "pam_mount.conf.xml", result) {
            if !self.settings.pam_mount.volumes.is_empty() {
                register_pam_mount(self.host.as_ref()).await;
            }
        }

        if cluster {
            let result = self.host.synchronize_cluster(&self.config.paths.smb_conf).await;
            record(&mut failures, "cluster sync", result);
            self.directory.cleanup_cluster().await;
        }

        self.settings.winbind.clear_modified();
        self.settings.modified = false;
        Self::outcome(failures)
    }

    fn outcome(failures: Vec<Error>) -> Result<()> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::PartialWrite(failures))
        }
    }

    async fn write_kerberos(&self) -> Result<()> {
        let realm = self
            .store
            .get(GLOBAL, "realm")
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::write(self.config.paths.krb5_conf.display().to_string(), "no realm configured"))?;
        RealmConfig {
            realm,
            kdc: self.settings.ads_server.clone(),
        }
        .write(&self.config.paths.krb5_conf)
        .await
    }

    /// Resolve the AD names and join with the imported credentials
    async fn unattended_join(&mut self) -> Result<()> {
        let mut domain = membership::workgroup(self.store.as_ref());

        if self.settings.ads_configured() {
            let workgroup = self.directory.get_workgroup(&domain).await;
            if !workgroup.is_empty() {
                membership::set_workgroup(self.store.as_mut(), &workgroup);
                domain = workgroup;
            }
            if let Some(realm) = self.directory.read_realm(&domain).await {
                winbind::adjust_ad_config(
                    self.store.as_mut(),
                    self.settings.winbind.enabled,
                    Some(&realm),
                );
            }
        }

        let Some(credentials) = self.settings.credentials.clone() else {
            return Ok(());
        };
        let os = self.host.os_release().await;
        self.membership
            .join(
                self.store.as_mut(),
                &mut self.settings.membership,
                &domain,
                &credentials,
                os.as_ref(),
            )
            .await
    }

    /// Take over a settings document. Live network checks are skipped.
    ///
    /// Everything is checked before anything is applied: a rejected
    /// document leaves the settings and the store as they were.
    pub async fn import(&mut self, document: &SettingsDocument) -> Result<()> {
        let mut staged = self.settings.clone();
        staged.globals_configured = false;
        let mut sections = Vec::new();

        for (key, value) in document {
            match ReservedKey::from_key(key) {
                Some(reserved) => importer(reserved)(&mut staged, value)?,
                None => sections.extend(section_from_value(key, value)),
            }
        }

        let mut has_global = false;
        let mut global_max_shares = false;
        if let Some(global) = sections
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(GLOBAL))
        {
            // not a Samba parameter, only a fallback for the reserved key
            global.parameters.remove("winbind");
            global_max_shares = global.parameters.keys().any(|k| same_key(k, MAX_SHARES));
            has_global = true;
        }

        // winbind last: it needs the workgroup and realm from the sections
        let winbind = document
            .get(ReservedKey::Winbind.key())
            .or_else(|| document.get(GLOBAL).and_then(|g| g.get("winbind")))
            .map(|v| expect_bool(ReservedKey::Winbind, v))
            .transpose()?
            .unwrap_or(false);
        let global = sections.iter().find(|s| s.name.eq_ignore_ascii_case(GLOBAL));
        require_workgroup(winbind, &self.imported_workgroup_or_realm(global))?;

        self.settings = staged;
        if !sections.is_empty() {
            self.store.import(sections);
        }
        let workgroup = self.workgroup_or_realm();
        self.set_winbind(winbind, &workgroup)?;

        if has_global {
            if global_max_shares || document.contains_key(ReservedKey::SharesGroup.key()) {
                let group = self.settings.shares.group.clone();
                let max = max_shares(self.store.as_ref());
                self.settings.shares.set(self.store.as_mut(), max, &group);
            }
            self.settings.globals_configured = true;
        }

        self.settings.modified = true;
        info!("Imported settings document ({} keys)", document.len());
        Ok(())
    }

    /// What `workgroup_or_realm` reports once `global` replaces the
    /// current global section
    fn imported_workgroup_or_realm(&self, global: Option<&ConfigSection>) -> String {
        let Some(global) = global else {
            return self.workgroup_or_realm();
        };
        let param = |key: &str| {
            global
                .parameters
                .iter()
                .find(|(k, _)| same_key(k, key))
                .map(|(_, v)| v.clone())
        };
        let workgroup = param("workgroup").unwrap_or_default();
        if param("security").is_some_and(|s| s.eq_ignore_ascii_case("ADS")) {
            return param("realm").unwrap_or(workgroup);
        }
        workgroup
    }

    /// Serialize the settings. Empty until globals are configured; clears
    /// the modified flag.
    pub fn export(&mut self) -> Result<SettingsDocument> {
        let mut document = SettingsDocument::new();
        if !self.settings.globals_configured {
            return Ok(document);
        }

        let settings = &self.settings;
        document.insert(
            ReservedKey::Winbind.key().to_string(),
            Value::Bool(settings.winbind.enabled),
        );
        if settings.homedir.modified() {
            document.insert(
                ReservedKey::MkHomeDir.key().to_string(),
                Value::Bool(settings.homedir.enabled),
            );
        }
        if settings.shares.modified() && !settings.shares.group.is_empty() {
            document.insert(
                ReservedKey::SharesGroup.key().to_string(),
                Value::String(settings.shares.group.clone()),
            );
        }
        if settings.disable_dhcp_hostname {
            document.insert(
                ReservedKey::DisableDhcpHostname.key().to_string(),
                Value::Bool(true),
            );
        }

        for section in self.store.export() {
            document.insert(section.name.clone(), section_to_value(&section));
        }

        if let Some(kdc) = settings.ads_server.as_ref().filter(|s| !s.is_empty()) {
            document.insert(
                ReservedKey::ActiveDirectory.key().to_string(),
                serde_json::json!({ "kdc": kdc }),
            );
        }
        if let Some(credentials) = settings.credentials.as_ref().filter(|c| !c.is_empty()) {
            document.insert(
                ReservedKey::Join.key().to_string(),
                serde_json::to_value(credentials)?,
            );
        }

        self.settings.modified = false;
        Ok(document)
    }

    pub async fn check_membership(&mut self, name: &str, ui: &dyn Interaction) -> MembershipStatus {
        let status = self
            .membership
            .check_membership(name, self.settings.ads_configured(), ui)
            .await;
        self.settings.membership = status;
        status
    }

    pub async fn join(&mut self, domain: &str, credentials: &JoinCredentials) -> Result<()> {
        let os = self.host.os_release().await;
        self.membership
            .join(
                self.store.as_mut(),
                &mut self.settings.membership,
                domain,
                credentials,
                os.as_ref(),
            )
            .await?;
        if let Some(lookup) = self.directory.lookup_ads(domain).await {
            self.settings.ads_server = Some(lookup.domain_controller);
        }
        self.settings.modified = true;
        Ok(())
    }

    pub async fn leave(
        &mut self,
        domain: &str,
        credentials: &JoinCredentials,
        ui: &dyn Interaction,
    ) -> Result<()> {
        self.membership
            .leave(
                self.store.as_mut(),
                &mut self.settings.membership,
                domain,
                credentials,
                ui,
            )
            .await?;
        self.settings.ads_server = None;
        self.settings.modified = true;
        Ok(())
    }

    /// Confirm and join when the current status calls for it
    pub async fn ask_join_domain(&mut self, domain: &str, ui: &dyn Interaction) -> JoinOutcome {
        let os = self.host.os_release().await;
        let outcome = self
            .membership
            .ask_join_domain(
                self.store.as_mut(),
                &mut self.settings.membership,
                domain,
                os.as_ref(),
                ui,
            )
            .await;
        if outcome == JoinOutcome::Joined {
            self.settings.modified = true;
        }
        outcome
    }

    /// Look for an AD controller serving `name` and adopt its names
    pub async fn resolve_domain(&mut self, name: &str) -> Option<AdsLookup> {
        let lookup = self.directory.lookup_ads(name).await;
        match &lookup {
            Some(found) => {
                info!("{} is served by AD controller {}", name, found.domain_controller);
                self.settings.ads_server = Some(found.domain_controller.clone());
                if let Some(workgroup) = found.workgroup.as_deref().filter(|w| !w.is_empty()) {
                    membership::set_workgroup(self.store.as_mut(), workgroup);
                }
                if let Some(realm) = found.realm.as_deref().filter(|r| !r.is_empty()) {
                    self.store.set_global_str("realm", Some(realm));
                }
            }
            None => {
                debug!("No AD controller found for {}", name);
                self.settings.ads_server = None;
            }
        }
        lookup
    }

    pub fn workgroup(&self) -> String {
        membership::workgroup(self.store.as_ref())
    }

    pub fn workgroup_or_realm(&self) -> String {
        membership::workgroup_or_realm(self.store.as_ref())
    }

    pub fn set_workgroup(&mut self, name: &str) -> Result<()> {
        validate_workgroup(name)?;
        membership::set_workgroup(self.store.as_mut(), name);
        self.settings.modified = true;
        Ok(())
    }

    /// Winbind is only usable against a domain
    pub fn validate_winbind(&self, enable: bool) -> Result<()> {
        validate_winbind(enable, self.settings.membership, &self.workgroup_or_realm())
    }

    /// Returns whether the flag changed. Enabling needs a workgroup or realm.
    pub fn set_winbind(&mut self, enable: bool, workgroup: &str) -> Result<bool> {
        require_workgroup(enable, workgroup)?;
        let realm = if self.settings.ads_configured() {
            self.store.get(GLOBAL, "realm").filter(|r| !r.is_empty())
        } else {
            None
        };
        Ok(self
            .settings
            .winbind
            .set(self.store.as_mut(), enable, workgroup, realm.as_deref()))
    }

    pub fn max_shares(&self) -> i64 {
        max_shares(self.store.as_ref())
    }

    pub fn set_shares(&mut self, max: i64, group: &str) {
        self.settings.shares.set(self.store.as_mut(), max, group);
    }

    /// Kerberos logins through OpenSSH; enabling defaults the Kerberos
    /// method when none is set
    pub fn set_ssh_support(&mut self, enable: bool) -> Result<()> {
        if enable && self.workgroup_or_realm().trim().is_empty() {
            return Err(Error::Validation(
                "SSH single sign-on needs a workgroup or domain name".to_string(),
            ));
        }
        self.settings.ssh.set(enable, self.store.as_mut());
        Ok(())
    }

    pub fn idmap_ranges(&self) -> BTreeMap<String, IdmapRange> {
        idmap::idmap_ranges(self.store.as_ref())
    }

    /// `scope` is `*` for the default range or a domain name
    pub fn set_idmap_range(&mut self, scope: &str, min: u32, max: u32) -> Result<()> {
        validate_idmap_scope(scope)?;
        idmap::set_idmap_range(self.store.as_mut(), scope, min, max)
    }

    pub fn set_idmap_backend(&mut self, scope: &str, backend: IdmapBackend) -> Result<()> {
        validate_idmap_scope(scope)?;
        idmap::set_idmap_backend(self.store.as_mut(), scope, backend);
        info!("ID map backend for {} set to {}", scope, backend);
        Ok(())
    }

    pub fn kerberos_method(&self) -> KerberosMethod {
        kerberos::kerberos_method(self.store.as_ref())
    }

    pub fn set_kerberos_method(&mut self, method: KerberosMethod) {
        kerberos::set_kerberos_method(self.store.as_mut(), method);
        info!("Kerberos method set to {}", method);
    }

    pub fn winbind_caching(&self) -> bool {
        winbind::winbind_caching(self.store.as_ref())
    }

    /// Offline logins with cached credentials
    pub fn set_winbind_caching(&mut self, enable: bool) {
        winbind::set_winbind_caching(self.store.as_mut(), enable);
    }

    pub fn required_groups(&self) -> Vec<String> {
        winbind::required_groups(self.store.as_ref())
    }

    /// Blank entries are dropped; an empty list allows every domain user
    pub fn set_required_groups(&mut self, groups: &[String]) {
        let groups: Vec<String> = groups
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        winbind::set_required_groups(self.store.as_mut(), &groups);
    }

    pub fn guest_access(&self) -> bool {
        shares::guest_access(self.store.as_ref())
    }

    pub fn set_guest_access(&mut self, allow: bool) {
        shares::set_guest_access(self.store.as_mut(), allow);
    }

    pub fn dhcp_include(&self) -> bool {
        hosts::dhcp_include(self.store.as_ref(), &self.config.paths.dhcp_include)
    }

    /// Take the WINS server handed out by DHCP
    pub fn set_dhcp_include(&mut self, enable: bool) {
        hosts::set_dhcp_include(self.store.as_mut(), &self.config.paths.dhcp_include, enable);
    }

    pub fn get_modified(&self) -> bool {
        self.settings.modified() || self.store.modified()
    }

    /// Packages the current settings rely on
    pub fn packages(&self) -> Vec<String> {
        let mut packages = vec!["samba-client", WINBIND_PACKAGE, "pam_mount"];
        if self.settings.ads_configured() {
            packages.extend(["krb5", "krb5-client"]);
        }
        packages.into_iter().map(str::to_string).collect()
    }

    /// Back to a freshly constructed state
    pub fn reset(&mut self) {
        if let Some(handle) = self.netbios.take() {
            handle.abort();
        }
        self.store.clear();
        self.settings = ClientSettings::new(self.config.paths.shares_dir.clone());
        info!("Samba client settings reset");
    }

    pub async fn list_machine_accounts(
        &self,
        domain: &str,
        user: &str,
        password: &str,
    ) -> Option<Vec<String>> {
        self.directory.list_machine_accounts(domain, user, password).await
    }

    pub fn summary(&self) -> SettingsSummary {
        SettingsSummary::collect(self.store.as_ref(), &self.settings)
    }
}

impl Drop for SambaClient {
    fn drop(&mut self) {
        if let Some(handle) = self.netbios.take() {
            handle.abort();
        }
    }
}
