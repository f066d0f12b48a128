//! Samba configuration store
//!
//! `ConfigStore` is the key/value view of the Samba configuration that every
//! reconciler works against. `SmbConf` backs it with `smb.conf` and the
//! `[global]` section of `pam_winbind.conf`.
//!
//! Parameter names are matched the way Samba matches them: case-insensitive,
//! ignoring whitespace and underscores.

use async_trait::async_trait;
use samba_client_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Name of the global section
pub const GLOBAL: &str = "global";

/// One named section as exchanged through Import/Export
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigSection {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
}

impl ConfigSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }
}

/// Key/value store for global and per-section Samba configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Raw lookup of a parameter in a section
    fn get(&self, section: &str, key: &str) -> Option<String>;

    /// Set a parameter, `None` removes it
    fn set(&mut self, section: &str, key: &str, value: Option<&str>);

    /// Parameter names present in a section
    fn keys(&self, section: &str) -> Vec<String>;

    /// Lookup in the winbind-side (PAM) global options
    fn winbind_get(&self, key: &str) -> Option<String>;

    fn winbind_set(&mut self, key: &str, value: Option<&str>);

    async fn read(&mut self) -> Result<()>;

    async fn write(&mut self, write_only: bool) -> Result<()>;

    /// Replace the named sections wholesale
    fn import(&mut self, sections: Vec<ConfigSection>);

    fn export(&self) -> Vec<ConfigSection>;

    fn modified(&self) -> bool;

    /// Forget everything read or set so far
    fn clear(&mut self);

    fn section_str(&self, section: &str, key: &str, default: &str) -> String {
        self.get(section, key).unwrap_or_else(|| default.to_string())
    }

    fn section_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get(section, key)
            .map(|v| split_list(&v))
            .unwrap_or_default()
    }

    fn section_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get(section, key)
            .and_then(|v| parse_bool(&v))
            .unwrap_or(default)
    }

    fn section_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.get(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn global_str(&self, key: &str, default: &str) -> String {
        self.section_str(GLOBAL, key, default)
    }

    fn set_global_str(&mut self, key: &str, value: Option<&str>) {
        self.set(GLOBAL, key, value)
    }

    fn global_list(&self, key: &str) -> Vec<String> {
        self.section_list(GLOBAL, key)
    }

    /// An empty list removes the parameter
    fn set_global_list(&mut self, key: &str, values: &[String]) {
        if values.is_empty() {
            self.set(GLOBAL, key, None);
        } else {
            self.set(GLOBAL, key, Some(&values.join(", ")));
        }
    }

    fn global_bool(&self, key: &str, default: bool) -> bool {
        self.section_bool(GLOBAL, key, default)
    }

    fn set_global_bool(&mut self, key: &str, value: Option<bool>) {
        self.set(GLOBAL, key, value.map(format_bool))
    }

    fn global_int(&self, key: &str, default: i64) -> i64 {
        self.section_int(GLOBAL, key, default)
    }

    fn winbind_bool(&self, key: &str, default: bool) -> bool {
        self.winbind_get(key)
            .and_then(|v| parse_bool(&v))
            .unwrap_or(default)
    }
}

/// Compare parameter names the way Samba does
pub fn same_key(a: &str, b: &str) -> bool {
    normalize_key(a) == normalize_key(b)
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Parse a Samba boolean
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Split a list parameter on commas and whitespace
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    /// Comment or blank line, kept in place
    Text(String),
    Param { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
struct Section {
    name: String,
    entries: Vec<Entry>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    fn params(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Param { key, value } => Some((key, value)),
            Entry::Text(_) => None,
        })
    }
}

/// Comment-preserving INI document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn parse(content: &str) -> Self {
        let mut doc = IniDocument::default();
        let mut pending = String::new();

        for raw in content.lines() {
            // Backslash continues a parameter on the next line
            if let Some(stripped) = raw.trim_end().strip_suffix('\\') {
                pending.push_str(stripped);
                continue;
            }
            let line = if pending.is_empty() {
                raw.to_string()
            } else {
                let joined = format!("{}{}", pending, raw.trim_start());
                pending.clear();
                joined
            };
            doc.parse_line(&line);
        }
        if !pending.is_empty() {
            doc.parse_line(&pending);
        }

        doc
    }

    fn parse_line(&mut self, line: &str) {
        let trimmed = line.trim();

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let name = trimmed[1..trimmed.len() - 1].trim();
            self.sections.push(Section::new(name));
            return;
        }

        let entry = if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            Entry::Text(line.to_string())
        } else if let Some((key, value)) = trimmed.split_once('=') {
            Entry::Param {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }
        } else {
            Entry::Text(line.to_string())
        };

        if let Some(section) = self.sections.last_mut() {
            section.entries.push(entry);
            return;
        }

        match entry {
            Entry::Text(text) => self.preamble.push(text),
            param => {
                // Parameters before any header belong to [global]
                let mut global = Section::new(GLOBAL);
                global.entries.push(param);
                self.sections.push(global);
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }

        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 && !out.ends_with("\n\n") {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section.name));
            for entry in &section.entries {
                match entry {
                    Entry::Text(text) => out.push_str(text),
                    Entry::Param { key, value } => {
                        out.push_str(&format!("   {} = {}", key, value));
                    }
                }
                out.push('\n');
            }
        }

        out
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        // Later definitions win, as in Samba
        self.section(section)?
            .params()
            .filter(|(k, _)| same_key(k, key))
            .last()
            .map(|(_, v)| v.clone())
    }

    pub fn keys(&self, section: &str) -> Vec<String> {
        self.section(section)
            .map(|s| s.params().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns whether the document changed
    pub fn set(&mut self, section: &str, key: &str, value: Option<&str>) -> bool {
        if self.get(section, key).as_deref() == value {
            return false;
        }

        match value {
            None => {
                if let Some(s) = self
                    .sections
                    .iter_mut()
                    .find(|s| s.name.eq_ignore_ascii_case(section))
                {
                    s.entries.retain(|e| {
                        !matches!(e, Entry::Param { key: k, .. } if same_key(k, key))
                    });
                }
            }
            Some(value) => {
                let index = match self
                    .sections
                    .iter()
                    .position(|s| s.name.eq_ignore_ascii_case(section))
                {
                    Some(index) => index,
                    None if section.eq_ignore_ascii_case(GLOBAL) => {
                        self.sections.insert(0, Section::new(GLOBAL));
                        0
                    }
                    None => {
                        self.sections.push(Section::new(section));
                        self.sections.len() - 1
                    }
                };
                let target = &mut self.sections[index];

                let mut replaced = false;
                target.entries.retain_mut(|e| match e {
                    Entry::Param { key: k, value: v } if same_key(k, key) => {
                        if replaced {
                            return false;
                        }
                        *v = value.to_string();
                        replaced = true;
                        true
                    }
                    _ => true,
                });

                if !replaced {
                    // Keep trailing blank lines after the new parameter
                    let at = target
                        .entries
                        .iter()
                        .rposition(|e| !matches!(e, Entry::Text(t) if t.trim().is_empty()))
                        .map(|i| i + 1)
                        .unwrap_or(0);
                    target.entries.insert(
                        at,
                        Entry::Param {
                            key: key.to_string(),
                            value: value.to_string(),
                        },
                    );
                }
            }
        }

        true
    }

    fn replace_section(&mut self, name: &str, parameters: &BTreeMap<String, String>) {
        let entries = parameters
            .iter()
            .map(|(k, v)| Entry::Param {
                key: k.clone(),
                value: v.clone(),
            })
            .collect();

        match self
            .sections
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
        {
            Some(section) => section.entries = entries,
            None => self.sections.push(Section {
                name: name.to_string(),
                entries,
            }),
        }
    }

    fn export(&self) -> Vec<ConfigSection> {
        self.sections
            .iter()
            .filter(|s| !s.name.starts_with('_'))
            .map(|s| ConfigSection {
                name: s.name.clone(),
                parameters: s
                    .params()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
            .filter(|s| !s.parameters.is_empty())
            .collect()
    }
}

/// File-backed Samba configuration
pub struct SmbConf {
    path: PathBuf,
    winbind_path: PathBuf,
    smb: IniDocument,
    winbind: IniDocument,
    modified: bool,
    winbind_modified: bool,
}

impl SmbConf {
    pub fn new(path: impl Into<PathBuf>, winbind_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            winbind_path: winbind_path.into(),
            smb: IniDocument::default(),
            winbind: IniDocument::default(),
            modified: false,
            winbind_modified: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> Result<IniDocument> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(IniDocument::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} does not exist, starting from an empty configuration", path.display());
                Ok(IniDocument::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Check the written file with testparm, when it is installed
    async fn test_config(&self) -> Result<bool> {
        let output = Command::new("testparm")
            .args(["-s", "--suppress-prompt"])
            .arg(&self.path)
            .output()
            .await;

        match output {
            Ok(out) => Ok(out.status.success()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("testparm not available, skipping configuration check");
                Ok(true)
            }
            Err(e) => Err(Error::System(format!("testparm failed: {}", e))),
        }
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }
}

#[async_trait]
impl ConfigStore for SmbConf {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.smb.get(section, key)
    }

    fn set(&mut self, section: &str, key: &str, value: Option<&str>) {
        if self.smb.set(section, key, value) {
            debug!("[{}] {} = {:?}", section, key, value);
            self.modified = true;
        }
    }

    fn keys(&self, section: &str) -> Vec<String> {
        self.smb.keys(section)
    }

    fn winbind_get(&self, key: &str) -> Option<String> {
        self.winbind.get(GLOBAL, key)
    }

    fn winbind_set(&mut self, key: &str, value: Option<&str>) {
        if self.winbind.set(GLOBAL, key, value) {
            debug!("pam_winbind {} = {:?}", key, value);
            self.modified = true;
            self.winbind_modified = true;
        }
    }

    async fn read(&mut self) -> Result<()> {
        self.smb = Self::load(&self.path).await?;
        self.winbind = Self::load(&self.winbind_path).await?;
        self.modified = false;
        self.winbind_modified = false;
        info!("Read Samba configuration from {}", self.path.display());
        Ok(())
    }

    async fn write(&mut self, write_only: bool) -> Result<()> {
        if !self.modified {
            debug!("Samba configuration unchanged, nothing to write");
            return Ok(());
        }

        // Backup existing config
        let backup_path = Self::backup_path(&self.path);
        if tokio::fs::metadata(&self.path).await.is_ok() {
            if let Err(e) = tokio::fs::copy(&self.path, &backup_path).await {
                error!("Cannot back up {}: {}", self.path.display(), e);
                return Err(Error::write(
                    self.path.display().to_string(),
                    format!("cannot keep a backup in {}: {}", backup_path.display(), e),
                ));
            }
        }

        tokio::fs::write(&self.path, self.smb.render())
            .await
            .map_err(|e| Error::write(self.path.display().to_string(), e))?;

        if !write_only && !self.test_config().await? {
            // Restore backup if test fails
            let mut reason = "testparm rejected the new configuration".to_string();
            if tokio::fs::metadata(&backup_path).await.is_ok() {
                if let Err(e) = tokio::fs::copy(&backup_path, &self.path).await {
                    error!("Cannot restore {} from backup: {}", self.path.display(), e);
                    reason.push_str(&format!(
                        "; restoring {} failed: {}",
                        backup_path.display(),
                        e
                    ));
                }
            }
            return Err(Error::write(self.path.display().to_string(), reason));
        }

        if self.winbind_modified {
            tokio::fs::write(&self.winbind_path, self.winbind.render())
                .await
                .map_err(|e| Error::write(self.winbind_path.display().to_string(), e))?;
        }

        self.modified = false;
        self.winbind_modified = false;
        info!("Wrote Samba configuration to {}", self.path.display());
        Ok(())
    }

    fn import(&mut self, sections: Vec<ConfigSection>) {
        for section in sections {
            if section.name.starts_with('_') {
                continue;
            }
            let parameters: BTreeMap<String, String> = section
                .parameters
                .into_iter()
                .filter(|(k, _)| !k.starts_with('_'))
                .collect();
            self.smb.replace_section(&section.name, &parameters);
            self.modified = true;
        }
    }

    fn export(&self) -> Vec<ConfigSection> {
        self.smb.export()
    }

    fn modified(&self) -> bool {
        self.modified
    }

    fn clear(&mut self) {
        self.smb = IniDocument::default();
        self.winbind = IniDocument::default();
        self.modified = false;
        self.winbind_modified = false;
    }
}
