//! Directory service client
//!
//! Domain probes and membership operations. `NetDirectory` drives Samba's
//! `net` and `nmblookup` tools; the network protocols themselves stay in
//! those tools.

use async_trait::async_trait;
use samba_client_common::{Error, JoinRole, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Parameters of a domain join
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinRequest {
    pub domain: String,
    pub role: JoinRole,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Organizational unit for the machine account, e.g. `Computers/Servers`
    pub machine_ou: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub update_dns: Option<bool>,
}

/// What a CLDAP lookup learned about an AD domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdsLookup {
    pub domain_controller: String,
    /// NetBIOS (pre-Windows 2000) domain name
    pub workgroup: Option<String>,
    /// DNS realm, upper case
    pub realm: Option<String>,
}

/// Abstract directory service client
#[async_trait]
pub trait DirectoryServiceClient: Send + Sync {
    /// Scan the network for NetBIOS names and cache which of them are domains
    async fn refresh_netbios(&self) -> Result<()>;

    async fn is_domain(&self, name: &str) -> bool;

    /// Find an Active Directory controller serving `name`
    async fn lookup_ads(&self, name: &str) -> Option<AdsLookup>;

    /// `Some(true)` joined, `Some(false)` not joined, `None` undetermined
    async fn test(&self, name: &str) -> Option<bool>;

    async fn join(&self, request: &JoinRequest) -> Result<()>;

    async fn leave(&self, domain: &str, user: Option<&str>, password: Option<&str>) -> Result<()>;

    async fn read_realm(&self, name: &str) -> Option<String>;

    /// NetBIOS workgroup for a domain or realm name
    async fn get_workgroup(&self, name: &str) -> String;

    async fn cluster_present(&self, refresh: bool) -> bool;

    async fn cleanup_cluster(&self);

    /// `None` when the listing itself failed
    async fn list_machine_accounts(
        &self,
        domain: &str,
        user: &str,
        password: &str,
    ) -> Option<Vec<String>>;
}

/// Directory client backed by Samba's command line tools
pub struct NetDirectory {
    netbios: Mutex<HashMap<String, bool>>,
    ads: Mutex<HashMap<String, Option<AdsLookup>>>,
    cluster: Mutex<Option<bool>>,
    ctdb_nodes: PathBuf,
}

impl NetDirectory {
    pub fn new() -> Self {
        Self {
            netbios: Mutex::new(HashMap::new()),
            ads: Mutex::new(HashMap::new()),
            cluster: Mutex::new(None),
            ctdb_nodes: PathBuf::from("/etc/ctdb/nodes"),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<std::process::Output> {
        debug!("Running {} {}", program, redact(args).join(" "));
        Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Probe(format!("Failed to run {}: {}", program, e)))
    }

    async fn cluster_probe(&self) -> bool {
        if tokio::fs::metadata(&self.ctdb_nodes).await.is_err() {
            return false;
        }
        Command::new("ctdb")
            .arg("status")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl Default for NetDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryServiceClient for NetDirectory {
    async fn refresh_netbios(&self) -> Result<()> {
        let masters = self
            .run("nmblookup", &["-M".to_string(), "--".to_string(), "-".to_string()])
            .await?;
        let mut found = HashMap::new();

        for address in parse_master_browsers(&String::from_utf8_lossy(&masters.stdout)) {
            let status = self.run("nmblookup", &["-A".to_string(), address]).await?;
            for (name, is_domain) in parse_name_status(&String::from_utf8_lossy(&status.stdout)) {
                let entry = found.entry(name).or_insert(false);
                *entry |= is_domain;
            }
        }

        info!("NetBIOS scan found {} group name(s)", found.len());
        *self.netbios.lock().await = found;
        Ok(())
    }

    async fn is_domain(&self, name: &str) -> bool {
        if let Some(cached) = self.netbios.lock().await.get(&name.to_uppercase()) {
            if *cached {
                return true;
            }
        }

        let query = format!("{}#1c", name);
        if let Ok(out) = self.run("nmblookup", &[query]).await {
            if out.status.success() && String::from_utf8_lossy(&out.stdout).contains("<1c>") {
                return true;
            }
        }

        self.lookup_ads(name).await.is_some()
    }

    async fn lookup_ads(&self, name: &str) -> Option<AdsLookup> {
        let key = name.to_lowercase();
        if let Some(cached) = self.ads.lock().await.get(&key) {
            return cached.clone();
        }

        let args = vec!["ads".to_string(), "lookup".to_string(), target_arg(name)];

        let lookup = match self.run("net", &args).await {
            Ok(out) if out.status.success() => {
                parse_ads_lookup(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        self.ads.lock().await.insert(key, lookup.clone());
        lookup
    }

    async fn test(&self, name: &str) -> Option<bool> {
        let out = self
            .run("net", &["ads".to_string(), "testjoin".to_string(), target_arg(name)])
            .await
            .ok()?;
        let mut text = String::from_utf8_lossy(&out.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&out.stderr));
        classify_testjoin(out.status.success(), &text)
    }

    async fn join(&self, request: &JoinRequest) -> Result<()> {
        let args = join_args(request);
        let output = self
            .run("net", &args)
            .await
            .map_err(|e| Error::Join(e.to_string()))?;

        if !output.status.success() {
            return Err(Error::Join(failure_message(&output)));
        }

        info!("Joined domain {} as {}", request.domain, request.role.as_str());
        self.ads.lock().await.remove(&request.domain.to_lowercase());
        Ok(())
    }

    async fn leave(&self, domain: &str, user: Option<&str>, password: Option<&str>) -> Result<()> {
        let mut args = vec!["ads".to_string(), "leave".to_string(), target_arg(domain)];
        if let Some(user) = user.filter(|u| !u.is_empty()) {
            args.push("-U".to_string());
            args.push(format!("{}%{}", user, password.unwrap_or_default()));
        }

        let output = self
            .run("net", &args)
            .await
            .map_err(|e| Error::Leave(e.to_string()))?;

        if !output.status.success() {
            return Err(Error::Leave(failure_message(&output)));
        }

        info!("Left domain {}", domain);
        self.ads.lock().await.remove(&domain.to_lowercase());
        Ok(())
    }

    async fn read_realm(&self, name: &str) -> Option<String> {
        self.lookup_ads(name).await.and_then(|l| l.realm)
    }

    async fn get_workgroup(&self, name: &str) -> String {
        self.lookup_ads(name)
            .await
            .and_then(|l| l.workgroup)
            .unwrap_or_else(|| name.to_string())
    }

    async fn cluster_present(&self, refresh: bool) -> bool {
        let mut cached = self.cluster.lock().await;
        if refresh || cached.is_none() {
            *cached = Some(self.cluster_probe().await);
        }
        (*cached).unwrap_or(false)
    }

    async fn cleanup_cluster(&self) {
        *self.cluster.lock().await = None;
        if let Err(e) = self
            .run("net", &["cache".to_string(), "flush".to_string()])
            .await
        {
            warn!("Could not flush the net cache: {}", e);
        }
    }

    async fn list_machine_accounts(
        &self,
        domain: &str,
        user: &str,
        password: &str,
    ) -> Option<Vec<String>> {
        let args = vec![
            "ads".to_string(),
            "search".to_string(),
            target_arg(domain),
            "-U".to_string(),
            format!("{}%{}", user, password),
            "(objectClass=organizationalUnit)".to_string(),
            "distinguishedName".to_string(),
        ];

        match self.run("net", &args).await {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout);
                Some(
                    text.lines()
                        .filter_map(|l| l.trim().strip_prefix("distinguishedName:"))
                        .map(|dn| dn_to_ou_path(dn.trim()))
                        .filter(|p| !p.is_empty())
                        .collect(),
                )
            }
            Ok(out) => {
                warn!("Listing machine accounts failed: {}", failure_message(&out));
                None
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}

/// `--realm=` for DNS names, `--workgroup=` for NetBIOS names
fn target_arg(name: &str) -> String {
    if name.contains('.') {
        format!("--realm={}", name)
    } else {
        format!("--workgroup={}", name)
    }
}

fn failure_message(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    }
}

/// Hide `user%password` arguments from logs
fn redact(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            let user = arg.split('%').next().unwrap_or_default();
            out.push(format!("{}%***", user));
            hide_next = false;
        } else {
            hide_next = arg == "-U";
            out.push(arg.clone());
        }
    }
    out
}

pub fn join_args(request: &JoinRequest) -> Vec<String> {
    let mut args = vec!["ads".to_string(), "join".to_string(), target_arg(&request.domain)];

    if let Some(ref user) = request.user {
        if !user.is_empty() {
            args.push("-U".to_string());
            args.push(format!(
                "{}%{}",
                user,
                request.password.as_deref().unwrap_or_default()
            ));
        }
    }

    if let Some(ref ou) = request.machine_ou {
        if !ou.is_empty() {
            args.push(format!("createcomputer={}", ou));
        }
    }

    if let Some(ref name) = request.os_name {
        args.push(format!("osName={}", name));
    }

    if let Some(ref version) = request.os_version {
        args.push(format!("osVer={}", version));
    }

    if request.update_dns == Some(false) {
        args.push("--no-dns-updates".to_string());
    }

    args
}

/// Map `net ads testjoin` output to a membership answer
pub fn classify_testjoin(success: bool, output: &str) -> Option<bool> {
    if success {
        return Some(true);
    }
    let lower = output.to_lowercase();
    if lower.contains("not valid") || lower.contains("not joined") || lower.contains("no machine account") {
        Some(false)
    } else {
        None
    }
}

pub fn parse_ads_lookup(output: &str) -> Option<AdsLookup> {
    let mut fields = HashMap::new();
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let domain_controller = fields.get("Domain Controller").filter(|v| !v.is_empty())?.clone();
    Some(AdsLookup {
        domain_controller,
        workgroup: fields.get("Pre-Win2k Domain").filter(|v| !v.is_empty()).cloned(),
        realm: fields
            .get("Domain")
            .filter(|v| !v.is_empty())
            .map(|v| v.to_uppercase()),
    })
}

/// Addresses answering a master browser query
pub fn parse_master_browsers(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|l| l.contains("__MSBROWSE__"))
        .filter_map(|l| l.split_whitespace().next())
        .filter(|s| s.parse::<std::net::IpAddr>().is_ok())
        .map(|s| s.to_string())
        .collect()
}

/// Group names from an `nmblookup -A` name table, flagged when they are domains
pub fn parse_name_status(output: &str) -> Vec<(String, bool)> {
    let mut names = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        let Some((name, rest)) = line.split_once('<') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name.starts_with("__") || name.contains(' ') {
            continue;
        }
        let suffix = rest.get(..2).unwrap_or_default().to_lowercase();
        if suffix == "1b" || suffix == "1c" {
            names.push((name.to_uppercase(), true));
        } else if suffix == "00" && rest.contains("<GROUP>") {
            names.push((name.to_uppercase(), false));
        }
    }
    names
}

/// `OU=Servers,OU=Computers,DC=example,DC=com` becomes `Computers/Servers`
pub fn dn_to_ou_path(dn: &str) -> String {
    let mut parts: Vec<&str> = dn
        .split(',')
        .filter_map(|rdn| {
            let (kind, value) = rdn.trim().split_once('=')?;
            kind.eq_ignore_ascii_case("OU").then_some(value)
        })
        .collect();
    parts.reverse();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOKUP: &str = "Information for Domain Controller: 10.0.0.1\n\
\n\
Response Type:\t\tLOGON_SAM_LOGON_RESPONSE_EX\n\
Forest:\t\t\texample.com\n\
Domain:\t\t\texample.com\n\
Domain Controller:\tdc1.example.com\n\
Pre-Win2k Domain:\tEXAMPLE\n\
Pre-Win2k Hostname:\tDC1\n";

    #[test]
    fn test_parse_ads_lookup() {
        let lookup = parse_ads_lookup(LOOKUP).unwrap();
        assert_eq!(lookup.domain_controller, "dc1.example.com");
        assert_eq!(lookup.workgroup.as_deref(), Some("EXAMPLE"));
        assert_eq!(lookup.realm.as_deref(), Some("EXAMPLE.COM"));
        assert!(parse_ads_lookup("Didn't find the cldap server!\n").is_none());
    }

    #[test]
    fn test_classify_testjoin() {
        assert_eq!(classify_testjoin(true, "Join is OK"), Some(true));
        assert_eq!(
            classify_testjoin(false, "Join to domain is not valid: NT_STATUS_ACCESS_DENIED"),
            Some(false)
        );
        assert_eq!(classify_testjoin(false, "Could not connect to server"), None);
    }

    #[test]
    fn test_join_args() {
        let request = JoinRequest {
            domain: "example.com".to_string(),
            user: Some("Administrator".to_string()),
            password: Some("secret".to_string()),
            machine_ou: Some("Computers/Servers".to_string()),
            os_name: Some("openSUSE Leap".to_string()),
            os_version: Some("15.6".to_string()),
            update_dns: Some(false),
            ..Default::default()
        };
        let args = join_args(&request);
        assert_eq!(
            args,
            vec![
                "ads",
                "join",
                "--realm=example.com",
                "-U",
                "Administrator%secret",
                "createcomputer=Computers/Servers",
                "osName=openSUSE Leap",
                "osVer=15.6",
                "--no-dns-updates",
            ]
        );
        assert!(redact(&args).contains(&"Administrator%***".to_string()));
    }

    #[test]
    fn test_join_args_minimal() {
        let request = JoinRequest {
            domain: "EXAMPLE".to_string(),
            ..Default::default()
        };
        assert_eq!(join_args(&request), vec!["ads", "join", "--workgroup=EXAMPLE"]);
    }

    #[test]
    fn test_parse_name_status() {
        let output = "Looking up status of 10.0.0.1\n\
\tDC1             <00> -         B <ACTIVE>\n\
\tEXAMPLE         <00> - <GROUP> B <ACTIVE>\n\
\tEXAMPLE         <1c> - <GROUP> B <ACTIVE>\n\
\tHOME            <00> - <GROUP> B <ACTIVE>\n\
\t..__MSBROWSE__. <01> - <GROUP> B <ACTIVE>\n";
        let names = parse_name_status(output);
        assert!(names.contains(&("EXAMPLE".to_string(), true)));
        assert!(names.contains(&("HOME".to_string(), false)));
        assert!(!names.iter().any(|(n, _)| n == "DC1"));
    }

    #[test]
    fn test_parse_master_browsers() {
        let output = "querying __MSBROWSE__ on 10.0.0.255\n10.0.0.1 __MSBROWSE__<01>\n";
        assert_eq!(parse_master_browsers(output), vec!["10.0.0.1"]);
    }

    #[test]
    fn test_dn_to_ou_path() {
        assert_eq!(
            dn_to_ou_path("OU=Servers,OU=Computers,DC=example,DC=com"),
            "Computers/Servers"
        );
        assert_eq!(dn_to_ou_path("DC=example,DC=com"), "");
    }
}
