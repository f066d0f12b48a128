//! In-memory collaborators
//!
//! Stand-ins for the system-backed collaborators. The CLI uses them for
//! `--offline` and `--dry-run` runs; tests use them to script a domain.

use crate::directory::{AdsLookup, DirectoryServiceClient, JoinRequest};
use crate::host::Host;
use crate::services::{ServiceAction, ServiceManager};
use async_trait::async_trait;
use samba_client_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Service manager that records actions instead of running them
#[derive(Default)]
pub struct RecordingServiceManager {
    calls: Mutex<Vec<(ServiceAction, String)>>,
    active: Mutex<HashSet<String>>,
    enabled: Mutex<HashSet<String>>,
}

impl RecordingServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a service as running before the session starts
    pub fn with_active(self, name: &str) -> Self {
        lock(&self.active).insert(name.to_string());
        self
    }

    pub fn with_enabled(self, name: &str) -> Self {
        lock(&self.enabled).insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(ServiceAction, String)> {
        lock(&self.calls).clone()
    }

    /// Whether any start, stop or restart was requested
    pub fn changed_runtime_state(&self) -> bool {
        lock(&self.calls).iter().any(|(action, _)| {
            matches!(
                action,
                ServiceAction::Start | ServiceAction::Stop | ServiceAction::Restart
            )
        })
    }

    fn record(&self, action: ServiceAction, name: &str) {
        info!("Recorded service action: {} {}", action, name);
        lock(&self.calls).push((action, name.to_string()));
        match action {
            ServiceAction::Start | ServiceAction::Restart => {
                lock(&self.active).insert(name.to_string());
            }
            ServiceAction::Stop => {
                lock(&self.active).remove(name);
            }
            ServiceAction::Enable => {
                lock(&self.enabled).insert(name.to_string());
            }
            ServiceAction::Disable => {
                lock(&self.enabled).remove(name);
            }
        }
    }
}

#[async_trait]
impl ServiceManager for RecordingServiceManager {
    async fn enable(&self, name: &str) -> Result<()> {
        self.record(ServiceAction::Enable, name);
        Ok(())
    }

    async fn disable(&self, name: &str) -> Result<()> {
        self.record(ServiceAction::Disable, name);
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.record(ServiceAction::Start, name);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.record(ServiceAction::Stop, name);
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.record(ServiceAction::Restart, name);
        Ok(())
    }

    async fn is_active(&self, name: &str) -> bool {
        lock(&self.active).contains(name)
    }

    async fn is_enabled(&self, name: &str) -> bool {
        lock(&self.enabled).contains(name)
    }
}

/// Scripted answers for one domain name
#[derive(Debug, Clone, Default)]
pub struct DomainScript {
    pub is_domain: bool,
    pub joined: Option<bool>,
    pub ads: Option<AdsLookup>,
    pub join_error: Option<String>,
    pub machine_accounts: Option<Vec<String>>,
}

/// Directory client answering from a script, without network I/O
#[derive(Default)]
pub struct ScriptedDirectory {
    domains: HashMap<String, DomainScript>,
    cluster: bool,
    joins: Mutex<Vec<JoinRequest>>,
    leaves: Mutex<Vec<String>>,
    netbios_refreshes: Mutex<u32>,
    cluster_cleanups: Mutex<u32>,
}

impl ScriptedDirectory {
    /// Knows no domains: every name is a plain workgroup
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, name: &str, script: DomainScript) -> Self {
        self.domains.insert(name.to_lowercase(), script);
        self
    }

    pub fn with_cluster(mut self, present: bool) -> Self {
        self.cluster = present;
        self
    }

    pub fn joins(&self) -> Vec<JoinRequest> {
        lock(&self.joins).clone()
    }

    pub fn leaves(&self) -> Vec<String> {
        lock(&self.leaves).clone()
    }

    pub fn netbios_refreshes(&self) -> u32 {
        *lock(&self.netbios_refreshes)
    }

    pub fn cluster_cleanups(&self) -> u32 {
        *lock(&self.cluster_cleanups)
    }

    fn script(&self, name: &str) -> Option<&DomainScript> {
        self.domains.get(&name.to_lowercase())
    }
}

#[async_trait]
impl DirectoryServiceClient for ScriptedDirectory {
    async fn refresh_netbios(&self) -> Result<()> {
        *lock(&self.netbios_refreshes) += 1;
        Ok(())
    }

    async fn is_domain(&self, name: &str) -> bool {
        self.script(name).map(|s| s.is_domain).unwrap_or(false)
    }

    async fn lookup_ads(&self, name: &str) -> Option<AdsLookup> {
        self.script(name).and_then(|s| s.ads.clone())
    }

    async fn test(&self, name: &str) -> Option<bool> {
        self.script(name).and_then(|s| s.joined)
    }

    async fn join(&self, request: &JoinRequest) -> Result<()> {
        lock(&self.joins).push(request.clone());
        match self.script(&request.domain).and_then(|s| s.join_error.clone()) {
            Some(message) => Err(Error::Join(message)),
            None => Ok(()),
        }
    }

    async fn leave(&self, domain: &str, _user: Option<&str>, _password: Option<&str>) -> Result<()> {
        lock(&self.leaves).push(domain.to_string());
        Ok(())
    }

    async fn read_realm(&self, name: &str) -> Option<String> {
        self.lookup_ads(name).await.and_then(|l| l.realm)
    }

    async fn get_workgroup(&self, name: &str) -> String {
        self.lookup_ads(name)
            .await
            .and_then(|l| l.workgroup)
            .unwrap_or_else(|| name.to_string())
    }

    async fn cluster_present(&self, _refresh: bool) -> bool {
        self.cluster
    }

    async fn cleanup_cluster(&self) {
        *lock(&self.cluster_cleanups) += 1;
    }

    async fn list_machine_accounts(
        &self,
        domain: &str,
        _user: &str,
        _password: &str,
    ) -> Option<Vec<String>> {
        self.script(domain).and_then(|s| s.machine_accounts.clone())
    }
}

/// Host that keeps PAM and package state in memory
pub struct RecordingHost {
    packages: HashSet<String>,
    all_packages: bool,
    pam_modules: Mutex<HashSet<String>>,
    pam_mount_services: Mutex<Vec<String>>,
    cluster_syncs: Mutex<u32>,
    dhcp_hostname: Mutex<Option<bool>>,
    hostname: Option<String>,
}

impl RecordingHost {
    /// Every package is reported as installed
    pub fn new() -> Self {
        Self {
            packages: HashSet::new(),
            all_packages: true,
            pam_modules: Mutex::new(HashSet::new()),
            pam_mount_services: Mutex::new(Vec::new()),
            cluster_syncs: Mutex::new(0),
            dhcp_hostname: Mutex::new(None),
            hostname: Some("client".to_string()),
        }
    }

    /// Only the listed packages are installed
    pub fn with_packages(mut self, packages: &[&str]) -> Self {
        self.all_packages = false;
        self.packages = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_pam_module(self, module: &str) -> Self {
        lock(&self.pam_modules).insert(module.to_string());
        self
    }

    pub fn pam_modules(&self) -> HashSet<String> {
        lock(&self.pam_modules).clone()
    }

    pub fn pam_mount_services(&self) -> Vec<String> {
        lock(&self.pam_mount_services).clone()
    }

    pub fn cluster_syncs(&self) -> u32 {
        *lock(&self.cluster_syncs)
    }

    pub fn dhcp_hostname(&self) -> Option<bool> {
        *lock(&self.dhcp_hostname)
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn package_installed(&self, package: &str) -> bool {
        self.all_packages || self.packages.contains(package)
    }

    async fn pam_module_enabled(&self, module: &str) -> bool {
        lock(&self.pam_modules).contains(module)
    }

    async fn set_pam_module(&self, module: &str, enable: bool) -> Result<()> {
        let mut modules = lock(&self.pam_modules);
        if enable {
            modules.insert(module.to_string());
        } else {
            modules.remove(module);
        }
        Ok(())
    }

    async fn enable_pam_mount(&self, service: &str) -> Result<()> {
        lock(&self.pam_mount_services).push(service.to_string());
        Ok(())
    }

    async fn synchronize_cluster(&self, _smb_conf: &Path) -> Result<()> {
        *lock(&self.cluster_syncs) += 1;
        Ok(())
    }

    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }

    async fn os_release(&self) -> Option<(String, String)> {
        Some(("Linux".to_string(), "1".to_string()))
    }

    async fn set_dhcp_hostname(&self, allowed: bool) -> Result<()> {
        *lock(&self.dhcp_hostname) = Some(allowed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_service_manager_tracks_state() {
        let services = RecordingServiceManager::new().with_active("smb");
        assert!(services.is_active("smb").await);

        services.stop("smb").await.unwrap();
        services.enable("winbind").await.unwrap();

        assert!(!services.is_active("smb").await);
        assert!(services.is_enabled("winbind").await);
        assert!(services.changed_runtime_state());
        assert_eq!(
            services.calls(),
            vec![
                (ServiceAction::Stop, "smb".to_string()),
                (ServiceAction::Enable, "winbind".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_directory_join_error() {
        let directory = ScriptedDirectory::offline().with_domain(
            "EXAMPLE",
            DomainScript {
                is_domain: true,
                join_error: Some("Failed to join domain: access denied".to_string()),
                ..Default::default()
            },
        );
        let request = JoinRequest {
            domain: "example".to_string(),
            ..Default::default()
        };
        let err = directory.join(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to join domain: access denied");
        assert_eq!(directory.joins().len(), 1);
        assert!(!directory.is_domain("OTHER").await);
    }
}
