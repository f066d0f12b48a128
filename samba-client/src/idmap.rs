//! Winbind ID mapping
//!
//! Ranges and backends live in `[global]` as scoped parameters:
//! `idmap config * : range` for the default scope and
//! `idmap config <DOMAIN> : range` for a named domain.

use crate::smb_conf::{ConfigStore, GLOBAL};
use regex::Regex;
use samba_client_common::{Error, IdmapBackend, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{info, warn};

/// Scope of the default ID map
pub const DEFAULT_SCOPE: &str = "*";

pub const DEFAULT_RANGE: (u32, u32) = (10000, 20000);

static IDMAP_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^idmap\s+config\s+(\S+)\s*:\s*(\S+)$").unwrap()
});

/// Range and backend for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdmapRange {
    pub min: u32,
    pub max: u32,
    pub backend: IdmapBackend,
}

pub fn idmap_key(scope: &str, param: &str) -> String {
    format!("idmap config {} : {}", scope, param)
}

/// Parse `10000-20000`
pub fn parse_range(value: &str) -> Option<(u32, u32)> {
    let (min, max) = value.split_once('-')?;
    Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
}

pub fn idmap_backend(store: &dyn ConfigStore, scope: &str) -> IdmapBackend {
    match store.get(GLOBAL, &idmap_key(scope, "backend")) {
        None => IdmapBackend::default(),
        Some(value) => value.parse().unwrap_or_else(|e| {
            warn!("{}, treating scope {} as tdb", e, scope);
            IdmapBackend::default()
        }),
    }
}

pub fn idmap_range(store: &dyn ConfigStore, scope: &str) -> Option<IdmapRange> {
    let (min, max) = parse_range(&store.get(GLOBAL, &idmap_key(scope, "range"))?)?;
    Some(IdmapRange {
        min,
        max,
        backend: idmap_backend(store, scope),
    })
}

/// Every scope that has a range configured
pub fn idmap_ranges(store: &dyn ConfigStore) -> BTreeMap<String, IdmapRange> {
    let mut ranges = BTreeMap::new();
    for key in store.keys(GLOBAL) {
        let Some(caps) = IDMAP_KEY_REGEX.captures(key.trim()) else {
            continue;
        };
        if !caps[2].eq_ignore_ascii_case("range") {
            continue;
        }
        let scope = caps[1].to_string();
        if let Some(range) = idmap_range(store, &scope) {
            ranges.insert(scope, range);
        }
    }
    ranges
}

/// Store a range; `min` must be below `max`
pub fn set_idmap_range(store: &mut dyn ConfigStore, scope: &str, min: u32, max: u32) -> Result<()> {
    if min >= max {
        return Err(Error::Validation(format!(
            "Invalid ID map range for '{}': the minimum ({}) must be lower than the maximum ({})",
            scope, min, max
        )));
    }
    store.set_global_str(&idmap_key(scope, "range"), Some(&format!("{}-{}", min, max)));
    info!("ID map range for {} set to {}-{}", scope, min, max);
    Ok(())
}

/// Switching to `ad` also sets `schema_mode = rfc2307` and
/// `unix_nss_info = yes`; switching away leaves both in place.
pub fn set_idmap_backend(store: &mut dyn ConfigStore, scope: &str, backend: IdmapBackend) {
    store.set_global_str(&idmap_key(scope, "backend"), Some(backend.as_str()));
    if backend == IdmapBackend::Ad {
        store.set_global_str(&idmap_key(scope, "schema_mode"), Some("rfc2307"));
        store.set_global_str(&idmap_key(scope, "unix_nss_info"), Some("yes"));
    }
}

/// Give the default scope a backend and range when it has none
pub fn ensure_default_scope(store: &mut dyn ConfigStore) {
    if store.get(GLOBAL, &idmap_key(DEFAULT_SCOPE, "backend")).is_none() {
        store.set_global_str(
            &idmap_key(DEFAULT_SCOPE, "backend"),
            Some(IdmapBackend::Tdb.as_str()),
        );
    }
    if store.get(GLOBAL, &idmap_key(DEFAULT_SCOPE, "range")).is_none() {
        let (min, max) = DEFAULT_RANGE;
        store.set_global_str(
            &idmap_key(DEFAULT_SCOPE, "range"),
            Some(&format!("{}-{}", min, max)),
        );
    }
}
