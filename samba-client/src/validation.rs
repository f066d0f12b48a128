///! Input validation
///! Names entered on the command line or found in a settings document

use regex::Regex;
use samba_client_common::Error;
use std::sync::LazyLock;

/// NetBIOS names are at most 15 characters
pub const MAX_NETBIOS_LENGTH: usize = 15;
pub const MAX_DNS_NAME_LENGTH: usize = 253;
pub const MAX_OU_LENGTH: usize = 1024;
pub const MAX_USERNAME_LENGTH: usize = 256;

static NETBIOS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^\\/:*?"<>|.\s][^\\/:*?"<>|]*$"#).unwrap()
});

static DNS_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$").unwrap()
});

static OU_SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^,+"\\<>;=]+$"#).unwrap()
});

/// Validation result type
pub type ValidationResult<T> = Result<T, Error>;

/// Workgroup or NT domain name
pub fn validate_workgroup(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(Error::Validation("Workgroup name cannot be empty".to_string()));
    }

    if name.chars().count() > MAX_NETBIOS_LENGTH {
        return Err(Error::Validation(format!(
            "Workgroup name too long (max {} characters)",
            MAX_NETBIOS_LENGTH
        )));
    }

    if !NETBIOS_REGEX.is_match(name) {
        return Err(Error::Validation(
            "Workgroup name cannot start with '.' or whitespace or contain \\ / : * ? \" < > |"
                .to_string(),
        ));
    }

    Ok(())
}

/// DNS realm of an Active Directory domain
pub fn validate_realm(realm: &str) -> ValidationResult<()> {
    if realm.is_empty() {
        return Err(Error::Validation("Realm cannot be empty".to_string()));
    }

    if realm.len() > MAX_DNS_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "Realm too long (max {} characters)",
            MAX_DNS_NAME_LENGTH
        )));
    }

    if !DNS_NAME_REGEX.is_match(realm) {
        return Err(Error::Validation(format!("Invalid realm: {}", realm)));
    }

    Ok(())
}

/// Either form a user may type for "domain or workgroup"
pub fn validate_domain_name(name: &str) -> ValidationResult<()> {
    if name.contains('.') {
        validate_realm(name)
    } else {
        validate_workgroup(name)
    }
}

/// Machine account container, `Computers/Servers` style
pub fn validate_machine_ou(ou: &str) -> ValidationResult<()> {
    if ou.len() > MAX_OU_LENGTH {
        return Err(Error::Validation(format!(
            "Organizational unit too long (max {} characters)",
            MAX_OU_LENGTH
        )));
    }

    for segment in ou.split('/') {
        if segment.trim().is_empty() {
            return Err(Error::Validation(format!(
                "Organizational unit '{}' has an empty component",
                ou
            )));
        }
        if !OU_SEGMENT_REGEX.is_match(segment) {
            return Err(Error::Validation(format!(
                "Organizational unit component '{}' contains a reserved character",
                segment
            )));
        }
    }

    Ok(())
}

/// Account used for joining: `user`, `DOMAIN\user` or `user@REALM`
pub fn validate_join_user(user: &str) -> ValidationResult<()> {
    if user.trim().is_empty() {
        return Err(Error::Validation("User name cannot be empty".to_string()));
    }

    if user.len() > MAX_USERNAME_LENGTH {
        return Err(Error::Validation(format!(
            "User name too long (max {} characters)",
            MAX_USERNAME_LENGTH
        )));
    }

    // '%' separates user and password on the net command line
    if user.contains('%') || user.chars().any(|c| c.is_control()) {
        return Err(Error::Validation(
            "User name cannot contain '%' or control characters".to_string(),
        ));
    }

    Ok(())
}
