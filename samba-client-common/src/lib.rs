//! Common types shared between the samba-client library and its CLI

use serde::{Deserialize, Serialize};

/// Result of the last domain membership check
///
/// Never persisted; always recomputed from live probes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Unknown,
    /// Plain workgroup, no central authentication
    Workgroup,
    /// Domain that this host is a member of
    JoinedDomain,
    /// Domain that this host is not a member of
    NotJoinedDomain,
    /// Domain whose membership could not be determined
    UndeterminedDomain,
}

impl MembershipStatus {
    /// Whether the name resolved to a domain at all
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::JoinedDomain | Self::NotJoinedDomain | Self::UndeterminedDomain
        )
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Workgroup => write!(f, "workgroup"),
            Self::JoinedDomain => write!(f, "joined domain"),
            Self::NotJoinedDomain => write!(f, "domain (not joined)"),
            Self::UndeterminedDomain => write!(f, "domain (membership unknown)"),
        }
    }
}

/// Kerberos method used by winbind for machine credentials
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum KerberosMethod {
    /// Stored as the absence of the `kerberos method` parameter
    #[default]
    #[serde(rename = "secrets only")]
    SecretsOnly,
    #[serde(rename = "system keytab")]
    SystemKeytab,
    #[serde(rename = "dedicated keytab")]
    DedicatedKeytab,
    #[serde(rename = "secrets and keytab")]
    SecretsAndKeytab,
}

impl KerberosMethod {
    pub fn all() -> Vec<KerberosMethod> {
        vec![
            KerberosMethod::SecretsOnly,
            KerberosMethod::SystemKeytab,
            KerberosMethod::DedicatedKeytab,
            KerberosMethod::SecretsAndKeytab,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KerberosMethod::SecretsOnly => "secrets only",
            KerberosMethod::SystemKeytab => "system keytab",
            KerberosMethod::DedicatedKeytab => "dedicated keytab",
            KerberosMethod::SecretsAndKeytab => "secrets and keytab",
        }
    }
}

impl std::fmt::Display for KerberosMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for KerberosMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        KerberosMethod::all()
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::Validation(format!("Unknown kerberos method: {}", s)))
    }
}

/// Winbind ID-mapping backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdmapBackend {
    #[default]
    Tdb,
    Ad,
    Rid,
    Autorid,
}

impl IdmapBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdmapBackend::Tdb => "tdb",
            IdmapBackend::Ad => "ad",
            IdmapBackend::Rid => "rid",
            IdmapBackend::Autorid => "autorid",
        }
    }
}

impl std::fmt::Display for IdmapBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IdmapBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tdb" => Ok(IdmapBackend::Tdb),
            "ad" => Ok(IdmapBackend::Ad),
            "rid" => Ok(IdmapBackend::Rid),
            "autorid" => Ok(IdmapBackend::Autorid),
            other => Err(Error::Validation(format!("Unknown idmap backend: {}", other))),
        }
    }
}

/// Role requested from the directory when joining
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinRole {
    #[default]
    Member,
}

impl JoinRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinRole::Member => "member",
        }
    }
}

/// How the configuration session is driven
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// A person answers questions as the session runs
    #[default]
    Interactive,
    /// A settings document is applied without live probes or questions
    Unattended,
}

/// Error taxonomy for membership reconciliation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Message from the directory client, surfaced verbatim
    #[error("{0}")]
    Join(String),

    /// Message from the directory client, surfaced verbatim
    #[error("{0}")]
    Leave(String),

    #[error("Cannot write {target}: {reason}")]
    Write { target: String, reason: String },

    #[error("Required package is not installed: {0}")]
    PackageMissing(String),

    #[error("{} of the requested changes could not be applied", .0.len())]
    PartialWrite(Vec<Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid settings document: {0}")]
    Document(String),

    #[error("System error: {0}")]
    System(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a failed sub-write
    pub fn write(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Write {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Document(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
