//! Common test utilities and helpers

#![allow(dead_code)]

use samba_client::config::{ClientConfig, PathsConfig};
use samba_client::memory::{RecordingHost, RecordingServiceManager, ScriptedDirectory};
use samba_client::smb_conf::SmbConf;
use samba_client::{RunMode, SambaClient};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const SMB_CONF: &str = "[global]\n   workgroup = WORKGROUP\n   server string = test host\n";

pub const NSSWITCH_CONF: &str = "passwd: compat\ngroup: compat\nhosts: files dns\n";

pub const SSH_CONFIG: &str = "Host *\n    ForwardX11 no\n";

pub const SSHD_CONFIG: &str = "UsePAM yes\n";

pub const PAM_MOUNT_CONF: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<pam_mount>
    <volume user="*" fstype="nfs" server="nfs1" path="/export" mountpoint="/mnt/export" />
</pam_mount>
"#;

/// Test environment: system files below a temp root plus in-memory
/// collaborators
pub struct TestEnv {
    pub root: TempDir,
    pub config: ClientConfig,
    pub directory: Arc<ScriptedDirectory>,
    pub services: Arc<RecordingServiceManager>,
    pub host: Arc<RecordingHost>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::build(ScriptedDirectory::offline(), RecordingHost::new()).await
    }

    pub async fn with_directory(directory: ScriptedDirectory) -> Self {
        Self::build(directory, RecordingHost::new()).await
    }

    pub async fn build(directory: ScriptedDirectory, host: RecordingHost) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = ClientConfig::default();
        config.paths = PathsConfig::under(root.path());

        let paths = &config.paths;
        write(&paths.smb_conf, SMB_CONF).await;
        write(&paths.pam_winbind_conf, "[global]\n").await;
        write(&paths.nsswitch_conf, NSSWITCH_CONF).await;
        write(&paths.ssh_config, SSH_CONFIG).await;
        write(&paths.sshd_config, SSHD_CONFIG).await;
        write(&paths.pam_mount_conf, PAM_MOUNT_CONF).await;
        write(&paths.dhcp_sysconfig, "DHCLIENT_SET_HOSTNAME=\"yes\"\n").await;

        Self {
            root,
            config,
            directory: Arc::new(directory),
            services: Arc::new(RecordingServiceManager::new()),
            host: Arc::new(host),
        }
    }

    pub fn client(&self, mode: RunMode) -> SambaClient {
        let store = SmbConf::new(&self.config.paths.smb_conf, &self.config.paths.pam_winbind_conf);
        SambaClient::new(
            self.config.clone(),
            Box::new(store),
            self.directory.clone(),
            self.services.clone(),
            self.host.clone(),
            mode,
        )
    }

    pub async fn read_file(&self, path: &Path) -> String {
        tokio::fs::read_to_string(path).await.unwrap_or_default()
    }
}

async fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .expect("Failed to create directory");
    }
    tokio::fs::write(path, content)
        .await
        .expect("Failed to write file");
}

/// Name of the effective group of the test process
pub fn current_group() -> String {
    nix::unistd::Group::from_gid(nix::unistd::getegid())
        .ok()
        .flatten()
        .map(|g| g.name)
        .unwrap_or_else(|| "root".to_string())
}
