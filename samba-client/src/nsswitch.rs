//! Name service switch configuration
//!
//! Line-preserving access to the databases in `/etc/nsswitch.conf`.

use samba_client_common::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nsswitch {
    lines: Vec<String>,
}

impl Nsswitch {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(|l| l.to_string()).collect(),
        }
    }

    /// Load the file; a missing file reads as empty
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} does not exist", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| Error::write(path.display().to_string(), e))
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    fn position(&self, db: &str) -> Option<usize> {
        self.lines.iter().position(|line| {
            line.trim_start()
                .split_once(':')
                .map(|(name, _)| name.trim() == db)
                .unwrap_or(false)
        })
    }

    /// Sources configured for a database, e.g. `["files", "dns"]` for hosts
    pub fn db(&self, db: &str) -> Vec<String> {
        self.position(db)
            .and_then(|i| self.lines[i].split_once(':'))
            .map(|(_, sources)| {
                let sources = sources.split('#').next().unwrap_or_default();
                sources.split_whitespace().map(|s| s.to_string()).collect()
            })
            .unwrap_or_default()
    }

    pub fn set_db(&mut self, db: &str, sources: &[String]) {
        let line = format!("{}:\t{}", db, sources.join(" "));
        match self.position(db) {
            Some(i) => self.lines[i] = line,
            None => self.lines.push(line),
        }
    }
}

/// Add `source` at the end of the list or remove it
pub fn with_source(sources: &[String], source: &str, enable: bool) -> Vec<String> {
    let mut out: Vec<String> = sources.iter().filter(|s| *s != source).cloned().collect();
    if enable {
        if out.is_empty() {
            out.push("files".to_string());
        }
        out.push(source.to_string());
    }
    out
}

/// Add or remove winbind on the passwd and group databases
pub async fn adjust_winbind(path: &Path, enable: bool) -> Result<bool> {
    let mut nss = Nsswitch::load(path).await?;
    let mut changed = false;

    for db in ["passwd", "group"] {
        let current = nss.db(db);
        let wanted = with_source(&current, "winbind", enable);
        if wanted != current {
            nss.set_db(db, &wanted);
            changed = true;
        }
    }

    if changed {
        nss.save(path).await?;
        info!(
            "{} winbind {} passwd and group in {}",
            if enable { "Added" } else { "Removed" },
            if enable { "to" } else { "from" },
            path.display()
        );
    }

    Ok(changed)
}
