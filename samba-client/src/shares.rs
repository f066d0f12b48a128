//! User share policy
//!
//! Lets ordinary users publish their own directories with `net usershare`.
//! Samba keeps the share definitions in a sticky, group-writable directory;
//! members of the owning group may create shares.

use crate::services::ServiceManager;
use crate::smb_conf::{ConfigStore, GLOBAL};
use nix::unistd::{chown, Gid, Group};
use samba_client_common::{Error, Result};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MAX_SHARES: &str = "usershare max shares";
pub const ALLOW_GUESTS: &str = "usershare allow guests";
pub const SHARES_PATH: &str = "usershare path";
pub const WINBIND_SEPARATOR: &str = "winbind separator";

pub const DEFAULT_GROUP: &str = "users";

const SHARES_DIR_MODE: u32 = 0o1770;

/// Settings for the user share directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePolicy {
    pub group: String,
    pub dir: PathBuf,
    pub separator: String,
    /// Empty the shares directory on write
    pub remove_existing: bool,
    /// Stop the share daemons when shares are disabled
    pub stop_services: bool,
    modified: bool,
}

impl SharePolicy {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            dir: dir.into(),
            separator: "\\".to_string(),
            remove_existing: false,
            stop_services: false,
            modified: false,
        }
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Pick up the directory, its group and the winbind separator
    pub fn read(&mut self, store: &dyn ConfigStore) {
        if let Some(path) = store.get(GLOBAL, SHARES_PATH) {
            self.dir = PathBuf::from(path);
        }
        if let Some(group) = directory_group(&self.dir) {
            self.group = group;
        }
        self.separator = store.global_str(WINBIND_SEPARATOR, "\\");
        self.modified = false;
    }

    /// `max <= 0` disables user shares by removing the parameter
    pub fn set(&mut self, store: &mut dyn ConfigStore, max: i64, group: &str) {
        if max > 0 {
            store.set_global_str(MAX_SHARES, Some(&max.to_string()));
        } else {
            store.set_global_str(MAX_SHARES, None);
        }
        if self.group != group {
            self.modified = true;
        }
        self.group = group.to_string();
    }

    /// Create the directory (or empty it on request) and fix its mode and group
    pub async fn write(&mut self) -> Result<()> {
        let target = self.dir.display().to_string();

        if tokio::fs::metadata(&self.dir).await.is_err() {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| Error::write(&target, e))?;
            info!("Created user share directory {}", target);
        } else if self.remove_existing {
            let removed = remove_share_files(&self.dir).await?;
            info!("Removed {} existing user shares from {}", removed, target);
        }

        if self.group.is_empty() {
            self.group = DEFAULT_GROUP.to_string();
        }

        tokio::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(SHARES_DIR_MODE))
            .await
            .map_err(|e| Error::write(&target, e))?;

        let group = Group::from_name(&self.group)
            .map_err(|e| Error::write(&target, e))?
            .ok_or_else(|| Error::write(&target, format!("unknown group '{}'", self.group)))?;
        chown(&self.dir, None, Some(group.gid)).map_err(|e| Error::write(&target, e))?;

        self.modified = false;
        Ok(())
    }
}

pub fn max_shares(store: &dyn ConfigStore) -> i64 {
    store.global_int(MAX_SHARES, 0)
}

pub fn guest_access(store: &dyn ConfigStore) -> bool {
    store.global_bool(ALLOW_GUESTS, false)
}

pub fn set_guest_access(store: &mut dyn ConfigStore, allow: bool) {
    store.set_global_bool(ALLOW_GUESTS, Some(allow));
}

/// Name of the group owning `dir`
pub fn directory_group(dir: &Path) -> Option<String> {
    let metadata = std::fs::metadata(dir).ok()?;
    match Group::from_gid(Gid::from_raw(metadata.gid())) {
        Ok(Some(group)) => Some(group.name),
        Ok(None) => None,
        Err(e) => {
            warn!("Cannot look up the group of {}: {}", dir.display(), e);
            None
        }
    }
}

/// Number of share definitions present
pub async fn shares_exist(dir: &Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            count += 1;
        }
    }
    count
}

async fn remove_share_files(dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            tokio::fs::remove_file(entry.path())
                .await
                .map_err(|e| Error::write(entry.path().display().to_string(), e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Share daemons follow the share policy: running while shares are
/// enabled, stopped on request once disabled.
pub async fn adjust_share_services(
    services: &dyn ServiceManager,
    names: &[&str],
    max: i64,
    stop_services: bool,
    write_only: bool,
) -> Result<()> {
    if max > 0 {
        for name in names {
            services.enable(name).await?;
            if write_only {
                continue;
            }
            if services.is_active(name).await {
                services.restart(name).await?;
            } else {
                services.start(name).await?;
            }
        }
    } else if stop_services {
        for name in names {
            services.disable(name).await?;
        }
        if !write_only {
            for name in names {
                services.stop(name).await?;
            }
        }
    }
    Ok(())
}
