//! Settings document used for unattended installation
//!
//! A flat map: a handful of reserved keys carry client settings, every other
//! key is a configuration section whose parameters go to the store verbatim.
//! Documents are JSON or YAML, chosen by file extension.

use crate::smb_conf::ConfigSection;
use samba_client_common::{Error, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

pub type SettingsDocument = Map<String, Value>;

/// Top-level keys that are not configuration sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedKey {
    SharesGroup,
    ActiveDirectory,
    Join,
    MkHomeDir,
    DisableDhcpHostname,
    /// Applied after the sections
    Winbind,
}

impl ReservedKey {
    pub const ALL: [ReservedKey; 6] = [
        ReservedKey::SharesGroup,
        ReservedKey::ActiveDirectory,
        ReservedKey::Join,
        ReservedKey::MkHomeDir,
        ReservedKey::DisableDhcpHostname,
        ReservedKey::Winbind,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ReservedKey::SharesGroup => "shares_group",
            ReservedKey::ActiveDirectory => "active_directory",
            ReservedKey::Join => "join",
            ReservedKey::MkHomeDir => "mkhomedir",
            ReservedKey::DisableDhcpHostname => "disable_dhcp_hostname",
            ReservedKey::Winbind => "winbind",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml`/`.yml` are YAML, anything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }

    pub fn parse(&self, content: &str) -> Result<SettingsDocument> {
        if content.trim().is_empty() {
            return Ok(SettingsDocument::new());
        }
        let value: Value = match self {
            DocumentFormat::Json => serde_json::from_str(content)?,
            DocumentFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| Error::Document(e.to_string()))?
            }
        };
        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(SettingsDocument::new()),
            other => Err(Error::Document(format!(
                "expected a map at the top level, found {}",
                type_name(&other)
            ))),
        }
    }

    pub fn render(&self, document: &SettingsDocument) -> Result<String> {
        match self {
            DocumentFormat::Json => Ok(serde_json::to_string_pretty(document)?),
            DocumentFormat::Yaml => {
                serde_yaml::to_string(document).map_err(|e| Error::Document(e.to_string()))
            }
        }
    }
}

pub async fn load(path: &Path) -> Result<SettingsDocument> {
    let content = tokio::fs::read_to_string(path).await?;
    let document = DocumentFormat::from_path(path).parse(&content)?;
    info!("Loaded settings document {} ({} keys)", path.display(), document.len());
    Ok(document)
}

pub async fn save(path: &Path, document: &SettingsDocument) -> Result<()> {
    let content = DocumentFormat::from_path(path).render(document)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::write(path.display().to_string(), e))?;
    info!("Saved settings document to {}", path.display());
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Parameter value as Samba spells it; `None` for null.
///
/// Samba has no nested parameters, so a map, or a list holding a map, is kept
/// as compact JSON text and turned back into structure by [`section_to_value`].
pub fn parameter_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Object(_) => Some(value.to_string()),
        Value::Array(items) if items.iter().any(Value::is_object) => Some(value.to_string()),
        Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(parameter_value)
                .collect::<Vec<_>>()
                .join(", "),
        ),
    }
}

/// Structure stored by [`parameter_value`], if `text` holds any
fn nested_value(text: &str) -> Option<Value> {
    if !text.starts_with('{') && !text.starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(text).ok()? {
        value @ Value::Object(_) => Some(value),
        Value::Array(items) if items.iter().any(Value::is_object) => Some(Value::Array(items)),
        _ => None,
    }
}

/// A non-map value is not a section
pub fn section_from_value(name: &str, value: &Value) -> Option<ConfigSection> {
    let Value::Object(parameters) = value else {
        warn!("Ignoring '{}': {} is not a configuration section", name, type_name(value));
        return None;
    };

    let mut section = ConfigSection::new(name);
    for (key, value) in parameters {
        if let Some(v) = parameter_value(value) {
            if value.is_object() {
                debug!("Keeping nested map [{}] {} as JSON text", name, key);
            }
            section.parameters.insert(key.clone(), v);
        }
    }
    Some(section)
}

pub fn section_to_value(section: &ConfigSection) -> Value {
    Value::Object(
        section
            .parameters
            .iter()
            .map(|(k, v)| {
                let value = nested_value(v).unwrap_or_else(|| Value::String(v.clone()));
                (k.clone(), value)
            })
            .collect(),
    )
}

/// Boolean that may be spelled as Samba spells it
pub fn bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => crate::smb_conf::parse_bool(s),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_keys() {
        assert_eq!(ReservedKey::from_key("join"), Some(ReservedKey::Join));
        assert_eq!(ReservedKey::from_key("global"), None);
        for key in ReservedKey::ALL {
            assert_eq!(ReservedKey::from_key(key.key()), Some(key));
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.YAML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("settings")), DocumentFormat::Json);
    }

    #[test]
    fn test_parse_yaml() {
        let doc = DocumentFormat::Yaml
            .parse("winbind: true\nglobal:\n  workgroup: WG\n  usershare_max_shares: 100\n")
            .unwrap();
        assert_eq!(doc["winbind"], json!(true));
        assert_eq!(doc["global"]["workgroup"], json!("WG"));
    }

    #[test]
    fn test_parse_rejects_non_map() {
        let err = DocumentFormat::Json.parse("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::Document(_)));
        assert!(DocumentFormat::Json.parse("{ broken").is_err());
        assert!(DocumentFormat::Yaml.parse("").unwrap().is_empty());
    }

    #[test]
    fn test_section_from_value() {
        let value = json!({
            "workgroup": "WG",
            "usershare max shares": 100,
            "winbind offline logon": true,
            "include": ["/etc/samba/dhcp.conf", "/etc/samba/extra.conf"],
            "unset": null
        });
        let section = section_from_value("global", &value).unwrap();
        assert_eq!(section.parameters["workgroup"], "WG");
        assert_eq!(section.parameters["usershare max shares"], "100");
        assert_eq!(section.parameters["winbind offline logon"], "yes");
        assert_eq!(
            section.parameters["include"],
            "/etc/samba/dhcp.conf, /etc/samba/extra.conf"
        );
        assert!(!section.parameters.contains_key("unset"));

        assert!(section_from_value("winbind", &json!(true)).is_none());
        assert_eq!(section_to_value(&section)["workgroup"], json!("WG"));
    }

    #[test]
    fn test_nested_values_round_trip() {
        let value = json!({
            "path": "/srv/data",
            "vfs options": { "fruit": { "metadata": "stream" }, "audit": ["open", "write"] },
            "hosts": [{ "name": "a", "allow": true }, { "name": "b" }]
        });
        let section = section_from_value("data", &value).unwrap();
        assert_eq!(
            section.parameters["vfs options"],
            r#"{"audit":["open","write"],"fruit":{"metadata":"stream"}}"#
        );
        assert_eq!(section_to_value(&section), value);

        // Plain values that merely look bracketed stay strings
        let mut plain = ConfigSection::new("data");
        plain.parameters.insert("comment".to_string(), "[draft]".to_string());
        plain.parameters.insert("list".to_string(), "[1, 2]".to_string());
        assert_eq!(
            section_to_value(&plain),
            json!({ "comment": "[draft]", "list": "[1, 2]" })
        );
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samba.yaml");
        let mut doc = SettingsDocument::new();
        doc.insert("winbind".to_string(), json!(false));
        doc.insert("global".to_string(), json!({ "workgroup": "WG" }));

        save(&path, &doc).await.unwrap();
        assert_eq!(load(&path).await.unwrap(), doc);
    }

    #[test]
    fn test_bool_value() {
        assert_eq!(bool_value(&json!("yes")), Some(true));
        assert_eq!(bool_value(&json!(0)), Some(false));
        assert_eq!(bool_value(&json!({})), None);
    }
}
