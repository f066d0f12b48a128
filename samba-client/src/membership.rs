//! Domain membership
//!
//! Works out whether a name is a workgroup or a domain and whether this host
//! belongs to it, and joins or leaves on request. The status is always
//! recomputed from live probes; it is never persisted.

use crate::directory::{DirectoryServiceClient, JoinRequest};
use crate::interaction::Interaction;
use crate::smb_conf::{ConfigStore, GLOBAL};
use samba_client_common::{Error, JoinRole, MembershipStatus, Result, RunMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Account used to join or leave, as found in the `join` map of a settings
/// document. Empty values are never exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCredentials {
    #[serde(default, alias = "username", skip_serializing_if = "is_blank")]
    pub user: Option<String>,
    #[serde(default, alias = "passwd", skip_serializing_if = "is_blank")]
    pub password: Option<String>,
    /// Organizational unit for the machine account
    #[serde(default, rename = "machine", skip_serializing_if = "is_blank")]
    pub machine_ou: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_dns: Option<bool>,
}

impl JoinCredentials {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: Some(user.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    /// Nothing worth exporting
    pub fn is_empty(&self) -> bool {
        is_blank(&self.user)
            && is_blank(&self.password)
            && is_blank(&self.machine_ou)
            && self.update_dns.is_none()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref().filter(|u| !u.is_empty())
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Member join request, reporting `os` to the directory
    pub fn join_request(&self, domain: &str, os: Option<&(String, String)>) -> JoinRequest {
        JoinRequest {
            domain: domain.to_string(),
            role: JoinRole::Member,
            user: self.user().map(str::to_string),
            password: self.password.clone(),
            machine_ou: self.machine_ou.clone().filter(|ou| !ou.is_empty()),
            os_name: os.map(|(name, _)| name.clone()),
            os_version: os.map(|(_, version)| version.clone()),
            update_dns: self.update_dns,
        }
    }
}

/// What to do about a status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDecision {
    NotRequired,
    /// Join only if the user agrees to `question`
    Confirm(String),
}

/// Result of offering a join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Workgroup, or already a member
    NotRequired,
    Joined,
    /// The user declined; not an error
    NoJoin,
    Fail(String),
}

impl JoinOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, JoinOutcome::Fail(_))
    }
}

pub fn decide(status: MembershipStatus, mode: RunMode, domain: &str, cluster: bool) -> JoinDecision {
    if mode == RunMode::Unattended {
        return JoinDecision::NotRequired;
    }

    let subject = if cluster { "cluster" } else { "host" };
    let question = match status {
        MembershipStatus::UndeterminedDomain => format!(
            "Cannot automatically determine if this {} is a member of the domain {}.",
            subject, domain
        ),
        MembershipStatus::NotJoinedDomain => {
            format!("This {} is not a member of the domain {}.", subject, domain)
        }
        _ => return JoinDecision::NotRequired,
    };
    JoinDecision::Confirm(format!("{}\n\nJoin the domain {}?", question, domain))
}

pub fn workgroup(store: &dyn ConfigStore) -> String {
    store.global_str("workgroup", "")
}

pub fn set_workgroup(store: &mut dyn ConfigStore, name: &str) {
    store.set_global_str("workgroup", Some(name));
}

/// Effective domain name: the realm for AD members, else the workgroup
pub fn workgroup_or_realm(store: &dyn ConfigStore) -> String {
    let workgroup = workgroup(store);
    if store.global_str("security", "").eq_ignore_ascii_case("ADS") {
        return store.global_str("realm", &workgroup);
    }
    workgroup
}

/// Drives the directory client for membership checks, joins and leaves
pub struct MembershipReconciler {
    directory: Arc<dyn DirectoryServiceClient>,
    mode: RunMode,
}

impl MembershipReconciler {
    pub fn new(directory: Arc<dyn DirectoryServiceClient>, mode: RunMode) -> Self {
        Self { directory, mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Classify `name`. Touches no configuration but may hit the network.
    pub async fn check_membership(
        &self,
        name: &str,
        ads_configured: bool,
        ui: &dyn Interaction,
    ) -> MembershipStatus {
        if self.mode == RunMode::Unattended {
            return MembershipStatus::Workgroup;
        }

        ui.busy("Verifying workgroup membership...");
        let status = if ads_configured || self.directory.is_domain(name).await {
            match self.directory.test(name).await {
                Some(true) => MembershipStatus::JoinedDomain,
                Some(false) => MembershipStatus::NotJoinedDomain,
                None => MembershipStatus::UndeterminedDomain,
            }
        } else {
            MembershipStatus::Workgroup
        };
        ui.idle();

        debug!("Membership of {}: {}", name, status);
        status
    }

    /// Join as a member. On failure the directory's message is returned and
    /// nothing is changed.
    pub async fn join(
        &self,
        store: &mut dyn ConfigStore,
        status: &mut MembershipStatus,
        domain: &str,
        credentials: &JoinCredentials,
        os: Option<&(String, String)>,
    ) -> Result<()> {
        let request = credentials.join_request(domain, os);
        self.directory.join(&request).await.map_err(|e| match e {
            Error::Join(message) => Error::Join(message),
            other => Error::Join(other.to_string()),
        })?;

        *status = MembershipStatus::JoinedDomain;
        let resolved = self.directory.get_workgroup(domain).await;
        if !resolved.is_empty() {
            set_workgroup(store, &resolved);
        }
        if let Some(realm) = self.directory.read_realm(domain).await {
            store.set_global_str("security", Some("ADS"));
            store.set_global_str("realm", Some(&realm));
        }

        info!("Joined domain {}", domain);
        Ok(())
    }

    /// Leave and re-derive the status of `domain`
    pub async fn leave(
        &self,
        store: &mut dyn ConfigStore,
        status: &mut MembershipStatus,
        domain: &str,
        credentials: &JoinCredentials,
        ui: &dyn Interaction,
    ) -> Result<()> {
        self.directory
            .leave(domain, credentials.user(), credentials.password())
            .await
            .map_err(|e| match e {
                Error::Leave(message) => Error::Leave(message),
                other => Error::Leave(other.to_string()),
            })?;

        store.set(GLOBAL, "realm", None);
        if store.global_str("security", "").eq_ignore_ascii_case("ADS") {
            store.set(GLOBAL, "security", None);
        }
        info!("Left domain {}", domain);

        *status = self.check_membership(domain, false, ui).await;
        Ok(())
    }

    /// Offer a join when the status calls for one
    pub async fn ask_join_domain(
        &self,
        store: &mut dyn ConfigStore,
        status: &mut MembershipStatus,
        domain: &str,
        os: Option<&(String, String)>,
        ui: &dyn Interaction,
    ) -> JoinOutcome {
        let cluster = self.directory.cluster_present(false).await;
        let question = match decide(*status, self.mode, domain, cluster) {
            JoinDecision::NotRequired => return JoinOutcome::NotRequired,
            JoinDecision::Confirm(question) => question,
        };

        if !ui.confirm(&question) {
            info!("Not joining {}", domain);
            return JoinOutcome::NoJoin;
        }

        let Some(credentials) = ui.credentials(domain) else {
            return JoinOutcome::Fail(format!("Joining {} was cancelled", domain));
        };

        match self.join(store, status, domain, &credentials, os).await {
            Ok(()) => JoinOutcome::Joined,
            Err(e) => {
                warn!("Joining {} failed: {}", domain, e);
                ui.error(&e.to_string());
                JoinOutcome::Fail(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::AdsLookup;
    use crate::interaction::Unattended;
    use crate::memory::{DomainScript, ScriptedDirectory};
    use crate::smb_conf::SmbConf;
    use std::sync::Mutex;

    struct Answers {
        confirm: bool,
        credentials: Option<JoinCredentials>,
        questions: Mutex<Vec<String>>,
    }

    impl Answers {
        fn new(confirm: bool, credentials: Option<JoinCredentials>) -> Self {
            Self {
                confirm,
                credentials,
                questions: Mutex::new(Vec::new()),
            }
        }
    }

    impl Interaction for Answers {
        fn busy(&self, _message: &str) {}
        fn idle(&self) {}
        fn confirm(&self, question: &str) -> bool {
            self.questions.lock().unwrap().push(question.to_string());
            self.confirm
        }
        fn credentials(&self, _domain: &str) -> Option<JoinCredentials> {
            self.credentials.clone()
        }
        fn error(&self, _message: &str) {}
    }

    fn store() -> SmbConf {
        SmbConf::new("/nonexistent/smb.conf", "/nonexistent/pam_winbind.conf")
    }

    fn example(joined: Option<bool>) -> ScriptedDirectory {
        ScriptedDirectory::offline().with_domain(
            "EXAMPLE",
            DomainScript {
                is_domain: true,
                joined,
                ads: Some(AdsLookup {
                    domain_controller: "dc1.example.com".to_string(),
                    workgroup: Some("EXAMPLE".to_string()),
                    realm: Some("EXAMPLE.COM".to_string()),
                }),
                ..Default::default()
            },
        )
    }

    fn reconciler(directory: ScriptedDirectory) -> MembershipReconciler {
        MembershipReconciler::new(Arc::new(directory), RunMode::Interactive)
    }

    #[tokio::test]
    async fn test_check_membership() {
        let ui = Unattended;
        let cases = [
            (Some(true), MembershipStatus::JoinedDomain),
            (Some(false), MembershipStatus::NotJoinedDomain),
            (None, MembershipStatus::UndeterminedDomain),
        ];
        for (joined, expected) in cases {
            let status = reconciler(example(joined))
                .check_membership("EXAMPLE", false, &ui)
                .await;
            assert_eq!(status, expected);
        }

        let status = reconciler(ScriptedDirectory::offline())
            .check_membership("EXAMPLE", false, &ui)
            .await;
        assert_eq!(status, MembershipStatus::Workgroup);
    }

    #[tokio::test]
    async fn test_configured_realm_forces_test() {
        let directory = ScriptedDirectory::offline().with_domain(
            "EXAMPLE",
            DomainScript {
                is_domain: false,
                joined: Some(true),
                ..Default::default()
            },
        );
        let status = reconciler(directory)
            .check_membership("EXAMPLE", true, &Unattended)
            .await;
        assert_eq!(status, MembershipStatus::JoinedDomain);
    }

    #[tokio::test]
    async fn test_unattended_skips_network_checks() {
        let reconciler = MembershipReconciler::new(Arc::new(example(Some(true))), RunMode::Unattended);
        let status = reconciler.check_membership("EXAMPLE", true, &Unattended).await;
        assert_eq!(status, MembershipStatus::Workgroup);
    }

    #[test]
    fn test_decide() {
        let interactive = RunMode::Interactive;
        assert_eq!(
            decide(MembershipStatus::Workgroup, interactive, "WG", false),
            JoinDecision::NotRequired
        );
        assert_eq!(
            decide(MembershipStatus::JoinedDomain, interactive, "EXAMPLE", false),
            JoinDecision::NotRequired
        );
        assert_eq!(
            decide(MembershipStatus::NotJoinedDomain, RunMode::Unattended, "EXAMPLE", false),
            JoinDecision::NotRequired
        );

        match decide(MembershipStatus::UndeterminedDomain, interactive, "EXAMPLE", true) {
            JoinDecision::Confirm(question) => {
                assert!(question.contains("this cluster is a member"));
                assert!(question.ends_with("Join the domain EXAMPLE?"));
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_updates_status_and_names() {
        let directory = Arc::new(example(Some(false)));
        let reconciler = MembershipReconciler::new(directory.clone(), RunMode::Interactive);
        let mut store = store();
        let mut status = MembershipStatus::NotJoinedDomain;
        let os = ("Linux".to_string(), "6".to_string());

        reconciler
            .join(&mut store, &mut status, "EXAMPLE", &JoinCredentials::new("admin", "secret"), Some(&os))
            .await
            .unwrap();

        assert_eq!(status, MembershipStatus::JoinedDomain);
        assert_eq!(workgroup(&store), "EXAMPLE");
        assert_eq!(workgroup_or_realm(&store), "EXAMPLE.COM");

        let joins = directory.joins();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].role, JoinRole::Member);
        assert_eq!(joins[0].user.as_deref(), Some("admin"));
        assert_eq!(joins[0].os_name.as_deref(), Some("Linux"));
    }

    #[tokio::test]
    async fn test_join_failure_leaves_state_alone() {
        let directory = ScriptedDirectory::offline().with_domain(
            "EXAMPLE",
            DomainScript {
                is_domain: true,
                join_error: Some("Logon failure".to_string()),
                ..Default::default()
            },
        );
        let reconciler = reconciler(directory);
        let mut store = store();
        let mut status = MembershipStatus::NotJoinedDomain;

        let err = reconciler
            .join(&mut store, &mut status, "EXAMPLE", &JoinCredentials::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Logon failure");
        assert_eq!(status, MembershipStatus::NotJoinedDomain);
        assert!(!store.modified());
    }

    #[tokio::test]
    async fn test_leave_clears_realm_and_rechecks() {
        let directory = Arc::new(example(None));
        let reconciler = MembershipReconciler::new(directory.clone(), RunMode::Interactive);
        let mut store = store();
        store.set_global_str("security", Some("ADS"));
        store.set_global_str("realm", Some("EXAMPLE.COM"));
        let mut status = MembershipStatus::JoinedDomain;

        reconciler
            .leave(&mut store, &mut status, "EXAMPLE", &JoinCredentials::default(), &Unattended)
            .await
            .unwrap();

        assert_eq!(directory.leaves(), vec!["EXAMPLE".to_string()]);
        assert_eq!(store.get(GLOBAL, "realm"), None);
        assert_eq!(store.get(GLOBAL, "security"), None);
        assert_eq!(status, MembershipStatus::UndeterminedDomain);
    }

    #[tokio::test]
    async fn test_ask_join_domain() {
        let mut store = store();

        let mut status = MembershipStatus::JoinedDomain;
        let outcome = reconciler(example(Some(true)))
            .ask_join_domain(&mut store, &mut status, "EXAMPLE", None, &Answers::new(true, None))
            .await;
        assert_eq!(outcome, JoinOutcome::NotRequired);

        let mut status = MembershipStatus::NotJoinedDomain;
        let declined = Answers::new(false, None);
        let outcome = reconciler(example(Some(false)))
            .ask_join_domain(&mut store, &mut status, "EXAMPLE", None, &declined)
            .await;
        assert_eq!(outcome, JoinOutcome::NoJoin);
        assert!(outcome.is_success());
        assert!(declined.questions.lock().unwrap()[0].starts_with("This host is not a member"));

        let outcome = reconciler(example(Some(false)))
            .ask_join_domain(&mut store, &mut status, "EXAMPLE", None, &Answers::new(true, None))
            .await;
        assert!(matches!(outcome, JoinOutcome::Fail(_)));

        let answers = Answers::new(true, Some(JoinCredentials::new("admin", "secret")));
        let outcome = reconciler(example(Some(false)))
            .ask_join_domain(&mut store, &mut status, "EXAMPLE", None, &answers)
            .await;
        assert_eq!(outcome, JoinOutcome::Joined);
        assert_eq!(status, MembershipStatus::JoinedDomain);
    }

    #[test]
    fn test_credentials_document_form() {
        let credentials: JoinCredentials = serde_json::from_value(serde_json::json!({
            "username": "admin",
            "passwd": "secret",
            "machine": "Computers/Linux",
        }))
        .unwrap();
        assert_eq!(credentials.user(), Some("admin"));
        assert_eq!(credentials.password(), Some("secret"));
        assert_eq!(credentials.machine_ou.as_deref(), Some("Computers/Linux"));

        let exported = serde_json::to_value(JoinCredentials {
            user: Some("admin".to_string()),
            password: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(exported, serde_json::json!({ "user": "admin" }));
        assert!(JoinCredentials::default().is_empty());
    }
}
