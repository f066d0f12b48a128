//! Network home directories mounted at login through `pam_mount`
//!
//! Only `<volume>` elements with `fstype="cifs"` are managed. Everything else
//! in `pam_mount.conf.xml`, other volumes included, is kept byte for byte.

use crate::host::Host;
use regex::Regex;
use samba_client_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

pub const CIFS: &str = "cifs";

/// PAM services that get pam_mount once a volume is configured
pub const PAM_MOUNT_SERVICES: [&str; 4] = ["gdm", "login", "xdm", "sshd"];

static VOLUME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<volume\b([^>]*?)(?:/>|>.*?</volume\s*>)").unwrap()
});

static ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static COMMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// One `<volume>` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MountVolume {
    pub user: String,
    pub fs_type: String,
    pub server: String,
    pub path: String,
    pub mount_point: String,
    pub options: String,
    /// Attributes without a dedicated field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl MountVolume {
    pub fn cifs(server: &str, path: &str, mount_point: &str) -> Self {
        Self {
            user: "*".to_string(),
            fs_type: CIFS.to_string(),
            server: server.to_string(),
            path: path.to_string(),
            mount_point: mount_point.to_string(),
            ..Default::default()
        }
    }

    fn from_attributes(attributes: &str) -> Self {
        let mut volume = Self::default();
        for caps in ATTR_REGEX.captures_iter(attributes) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| unescape(m.as_str()))
                .unwrap_or_default();
            match &caps[1] {
                "user" => volume.user = value,
                "fstype" => volume.fs_type = value,
                "server" => volume.server = value,
                "path" => volume.path = value,
                "mountpoint" => volume.mount_point = value,
                "options" => volume.options = value,
                other => {
                    volume.extra.insert(other.to_string(), value);
                }
            }
        }
        volume
    }

    /// Attributes in document order; empty values are left out
    fn attributes(&self) -> Vec<(&str, &str)> {
        let known = [
            ("user", self.user.as_str()),
            ("fstype", self.fs_type.as_str()),
            ("server", self.server.as_str()),
            ("path", self.path.as_str()),
            ("mountpoint", self.mount_point.as_str()),
            ("options", self.options.as_str()),
        ];
        known
            .into_iter()
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .filter(|(_, v)| !v.is_empty())
            .collect()
    }

    pub fn to_element(&self) -> String {
        let attributes: Vec<String> = self
            .attributes()
            .into_iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape(v)))
            .collect();
        format!("<volume {} />", attributes.join(" "))
    }

    pub fn is_cifs(&self) -> bool {
        self.fs_type == CIFS
    }
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Volume elements outside comments, with their byte range
fn volume_elements(content: &str) -> Vec<(Range<usize>, MountVolume)> {
    let comments: Vec<Range<usize>> = COMMENT_REGEX.find_iter(content).map(|m| m.range()).collect();
    VOLUME_REGEX
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if comments.iter().any(|c| c.contains(&whole.start())) {
                return None;
            }
            Some((whole.range(), MountVolume::from_attributes(&caps[1])))
        })
        .collect()
}

/// Managed volumes of a document
pub fn parse_volumes(content: &str) -> Vec<MountVolume> {
    volume_elements(content)
        .into_iter()
        .map(|(_, volume)| volume)
        .filter(MountVolume::is_cifs)
        .collect()
}

/// Replace every cifs volume of `content` with `volumes`
pub fn render_volumes(content: &str, volumes: &[MountVolume]) -> Result<String> {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;

    for (range, volume) in volume_elements(content) {
        if !volume.is_cifs() {
            continue;
        }
        // Drop the element together with its own line
        let line_start = content[..range.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let start = if content[line_start..range.start].trim().is_empty() {
            line_start
        } else {
            range.start
        };
        let end = if content[range.end..].starts_with('\n') {
            range.end + 1
        } else {
            range.end
        };
        out.push_str(&content[last..start]);
        last = end;
    }
    out.push_str(&content[last..]);

    let close = out
        .rfind("</pam_mount>")
        .ok_or_else(|| Error::Document("no </pam_mount> element".to_string()))?;
    let mut inserted = String::new();
    for volume in volumes.iter().filter(|v| v.is_cifs()) {
        inserted.push_str("    ");
        inserted.push_str(&volume.to_element());
        inserted.push('\n');
    }
    let at = out[..close].rfind('\n').map(|i| i + 1).unwrap_or(close);
    let at = if out[at..close].trim().is_empty() { at } else { close };
    out.insert_str(at, &inserted);
    Ok(out)
}

/// Managed volumes and the snapshot taken at read time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PamMountVolumes {
    pub volumes: Vec<MountVolume>,
    baseline: Option<Vec<MountVolume>>,
}

impl PamMountVolumes {
    /// A missing or unreadable file leaves the set empty and unread
    pub async fn read(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let volumes = parse_volumes(&content);
                Self {
                    baseline: Some(volumes.clone()),
                    volumes,
                }
            }
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn set(&mut self, volumes: Vec<MountVolume>) {
        self.volumes = volumes;
    }

    /// Order of the volumes does not count
    pub fn modified(&self) -> bool {
        match &self.baseline {
            None => !self.volumes.is_empty(),
            Some(baseline) => {
                let mut current = self.volumes.clone();
                let mut original = baseline.clone();
                current.sort();
                original.sort();
                current != original
            }
        }
    }

    /// Returns whether the file was rewritten
    pub async fn write(&mut self, path: &Path) -> Result<bool> {
        let target = path.display().to_string();
        if !self.modified() {
            return Ok(false);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::write(&target, e))?;

        let mut backup = path.as_os_str().to_owned();
        backup.push(".save");
        tokio::fs::copy(path, &backup)
            .await
            .map_err(|e| Error::write(&target, format!("backup failed: {}", e)))?;

        let rendered =
            render_volumes(&content, &self.volumes).map_err(|e| Error::write(&target, e))?;
        tokio::fs::write(path, rendered)
            .await
            .map_err(|e| Error::write(&target, e))?;

        info!("Wrote {} mount volumes to {}", self.volumes.len(), target);
        self.baseline = Some(self.volumes.clone());
        Ok(true)
    }
}

/// Enable pam_mount for the login services; failures are only logged
pub async fn register_pam_mount(host: &dyn Host) {
    for service in PAM_MOUNT_SERVICES {
        if let Err(e) = host.enable_pam_mount(service).await {
            warn!("pam-config failed for service {}: {}", service, e);
        }
    }
}
