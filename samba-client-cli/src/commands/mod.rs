///! Command handlers
///!
///! Each handler reads the current state, runs one operation and reports
///! whether it succeeded.

pub mod document;
pub mod domain;
pub mod set;
pub mod settings;
pub mod winbind;
pub mod wizard;

use crate::output::{self, OutputFormat};
use anyhow::Result;
use samba_client::config::ClientConfig;
use samba_client::directory::{DirectoryServiceClient, NetDirectory};
use samba_client::host::LocalHost;
use samba_client::memory::{RecordingServiceManager, ScriptedDirectory};
use samba_client::services::{ServiceManager, SystemServiceManager};
use samba_client::smb_conf::SmbConf;
use samba_client::{Error, Interaction, RunMode, SambaClient};
use std::sync::Arc;

/// Shared state for one CLI invocation
pub struct Context {
    pub config: ClientConfig,
    pub format: OutputFormat,
    pub apply: bool,
    pub offline: bool,
    services: Arc<dyn ServiceManager>,
    recorder: Option<Arc<RecordingServiceManager>>,
}

impl Context {
    pub fn new(
        config: ClientConfig,
        format: OutputFormat,
        dry_run: bool,
        offline: bool,
        apply: bool,
    ) -> Self {
        let recorder = dry_run.then(|| Arc::new(RecordingServiceManager::new()));
        let services: Arc<dyn ServiceManager> = match &recorder {
            Some(recorder) => recorder.clone(),
            None => Arc::new(SystemServiceManager::new()),
        };

        Self {
            config,
            format,
            apply,
            offline,
            services,
            recorder,
        }
    }

    /// Configuration is written without touching running services unless
    /// `--apply` was given
    pub fn write_only(&self) -> bool {
        !self.apply
    }

    pub fn client(&self, mode: RunMode) -> SambaClient {
        let paths = &self.config.paths;
        let directory: Arc<dyn DirectoryServiceClient> = if self.offline {
            Arc::new(ScriptedDirectory::offline())
        } else {
            Arc::new(NetDirectory::new())
        };

        SambaClient::new(
            self.config.clone(),
            Box::new(SmbConf::new(&paths.smb_conf, &paths.pam_winbind_conf)),
            directory,
            self.services.clone(),
            Arc::new(LocalHost::new(&paths.dhcp_sysconfig)),
            mode,
        )
    }

    /// A client with the current system state loaded
    pub async fn read_client(&self, mode: RunMode, ui: &dyn Interaction) -> Result<SambaClient> {
        let mut client = self.client(mode);
        client.read(ui).await?;
        Ok(client)
    }

    /// Write and report every failed step; partial failure is not an error
    /// of the CLI itself
    pub async fn write(&self, client: &mut SambaClient) -> Result<bool> {
        match client.write(self.write_only()).await {
            Ok(()) => Ok(true),
            Err(Error::PartialWrite(failures)) => {
                for failure in &failures {
                    output::print_error(&failure.to_string());
                }
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn report_dry_run(&self) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        for (action, service) in recorder.calls() {
            output::print_info(&format!("Would {} {}", action, service));
        }
    }
}
