//! Home directory creation on first login (`pam_mkhomedir`)

use crate::host::Host;
use samba_client_common::Result;
use tracing::info;

pub const MKHOMEDIR: &str = "mkhomedir";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HomeDirectories {
    pub enabled: bool,
    modified: bool,
}

impl HomeDirectories {
    pub async fn read(host: &dyn Host) -> Self {
        Self {
            enabled: host.pam_module_enabled(MKHOMEDIR).await,
            modified: false,
        }
    }

    /// Returns the new value
    pub fn set(&mut self, enable: bool) -> bool {
        if self.enabled != enable {
            self.enabled = enable;
            self.modified = true;
        }
        self.enabled
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    pub async fn write(&mut self, host: &dyn Host) -> Result<()> {
        if !self.modified {
            return Ok(());
        }
        host.set_pam_module(MKHOMEDIR, self.enabled).await?;
        info!(
            "Home directory creation on login {}",
            if self.enabled { "enabled" } else { "disabled" }
        );
        self.modified = false;
        Ok(())
    }
}
