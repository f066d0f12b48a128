//! Samba client state tests
//! Read, Write, Import and Export against temp files and in-memory
//! collaborators

mod common;

use common::{current_group, TestEnv};
use samba_client::directory::AdsLookup;
use samba_client::memory::{DomainScript, RecordingHost, ScriptedDirectory};
use samba_client::pam_mount::{MountVolume, PAM_MOUNT_SERVICES};
use samba_client::services::ServiceAction;
use samba_client::smb_conf::GLOBAL;
use samba_client::{
    Error, IdmapBackend, JoinCredentials, KerberosMethod, MembershipStatus, RunMode, Unattended,
};
use serde_json::json;

fn example_domain(joined: Option<bool>) -> ScriptedDirectory {
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

fn document(value: serde_json::Value) -> samba_client::document::SettingsDocument {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not a map: {}", other),
    }
}

#[tokio::test]
async fn test_set_shares_reads_back() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);

    for max in [-5, 0] {
        client.set_shares(max, "users");
        assert_eq!(client.max_shares(), 0);
    }
    for max in [1, 250] {
        client.set_shares(max, "staff");
        assert_eq!(client.max_shares(), max);
    }
}

#[tokio::test]
async fn test_set_winbind_twice_changes_once() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);

    assert!(client.set_winbind(true, "WG").unwrap());
    assert!(!client.set_winbind(true, "WG").unwrap());
    assert!(client.settings.winbind.modified());
    assert!(client.set_winbind(true, "").is_err());
}

#[tokio::test]
async fn test_read_loads_every_feature() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    assert!(client.settings.globals_configured);
    assert!(!client.get_modified());
    assert_eq!(client.workgroup(), "WORKGROUP");
    assert!(!client.settings.winbind.enabled);
    assert!(!client.settings.hosts.wins);
    assert!(!client.settings.ssh.enabled);
    // only cifs volumes are managed
    assert!(client.settings.pam_mount.volumes.is_empty());
    assert_eq!(env.directory.netbios_refreshes(), 1);
}

#[tokio::test]
async fn test_unattended_read_skips_netbios_scan() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);
    client.read(&Unattended).await.unwrap();
    assert_eq!(env.directory.netbios_refreshes(), 0);
}

#[tokio::test]
async fn test_write_without_changes_does_nothing() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    client.write(false).await.unwrap();
    assert!(env.services.calls().is_empty());
    assert_eq!(env.read_file(&env.config.paths.smb_conf).await, common::SMB_CONF);
}

#[tokio::test]
async fn test_import_custom_section() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);

    client
        .import(&document(json!({
            "global": { "workgroup": "WG" },
            "custom_section": { "k": "v" }
        })))
        .await
        .unwrap();

    assert_eq!(client.store().get("custom_section", "k").as_deref(), Some("v"));
    assert_eq!(client.workgroup(), "WG");
    assert!(client.settings.globals_configured);
}

#[tokio::test]
async fn test_import_export_round_trip() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);

    let original = document(json!({
        "global": {
            "workgroup": "EXAMPLE",
            "security": "ADS",
            "realm": "EXAMPLE.COM"
        },
        "winbind": true,
        "mkhomedir": true,
        "shares_group": "staff",
        "disable_dhcp_hostname": true,
        "active_directory": { "kdc": "dc1.example.com" },
        "join": { "user": "admin", "password": "secret" }
    }));
    client.import(&original).await.unwrap();
    let exported = client.export().unwrap();

    for key in [
        "winbind",
        "mkhomedir",
        "shares_group",
        "disable_dhcp_hostname",
        "active_directory",
        "join",
    ] {
        assert_eq!(exported.get(key), original.get(key), "{} differs", key);
    }
    assert_eq!(exported["global"]["workgroup"], json!("EXAMPLE"));
    assert_eq!(exported["global"]["template shell"], json!("/bin/bash"));
    assert!(!client.settings.modified);

    // what was exported imports back to the same document
    let mut second = env.client(RunMode::Unattended);
    second.import(&exported).await.unwrap();
    assert_eq!(second.export().unwrap(), exported);
}

#[tokio::test]
async fn test_import_winbind_from_global_section() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);

    client
        .import(&document(json!({
            "global": { "workgroup": "WG", "winbind": "yes" }
        })))
        .await
        .unwrap();

    assert!(client.settings.winbind.enabled);
    assert_eq!(client.store().get(GLOBAL, "winbind"), None);
}

#[tokio::test]
async fn test_import_rejects_malformed_reserved_key() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);

    let err = client
        .import(&document(json!({ "mkhomedir": "sometimes" })))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Document(_)));
}

#[tokio::test]
async fn test_export_empty_until_configured() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);

    assert!(client.export().unwrap().is_empty());

    client
        .import(&document(json!({ "winbind": false })))
        .await
        .unwrap();
    assert!(client.export().unwrap().is_empty());
}

#[tokio::test]
async fn test_write_only_touches_no_running_service() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);

    client
        .import(&document(json!({
            "global": { "workgroup": "WG" },
            "winbind": true
        })))
        .await
        .unwrap();
    client.write(true).await.unwrap();

    assert!(!env.services.changed_runtime_state());
    assert!(env
        .services
        .calls()
        .contains(&(ServiceAction::Enable, "winbind".to_string())));

    let smb_conf = env.read_file(&env.config.paths.smb_conf).await;
    assert!(smb_conf.contains("workgroup = WG"));
    assert!(smb_conf.contains("idmap config * : range = 10000-20000"));

    let nsswitch = env.read_file(&env.config.paths.nsswitch_conf).await;
    assert!(nsswitch.contains("passwd:\tcompat winbind"));
    assert!(env.host.pam_modules().contains("winbind"));
}

#[tokio::test]
async fn test_write_starts_winbind() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();
    client.set_winbind(true, "WG").unwrap();

    client.write(false).await.unwrap();
    assert_eq!(
        env.services.calls(),
        vec![
            (ServiceAction::Enable, "winbind".to_string()),
            (ServiceAction::Start, "winbind".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_missing_winbind_package_blocks_only_winbind() {
    let env = TestEnv::build(ScriptedDirectory::offline(), RecordingHost::new().with_packages(&[])).await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();
    client.set_winbind(true, "WG").unwrap();

    let err = client.write(true).await.unwrap_err();
    let Error::PartialWrite(failures) = err else {
        panic!("expected a partial write");
    };
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], Error::PackageMissing(_)));

    // smb.conf was still written, nsswitch was left alone
    let smb_conf = env.read_file(&env.config.paths.smb_conf).await;
    assert!(smb_conf.contains("idmap config * : backend = tdb"));
    assert_eq!(
        env.read_file(&env.config.paths.nsswitch_conf).await,
        common::NSSWITCH_CONF
    );
}

#[tokio::test]
async fn test_cluster_skips_services_and_synchronizes() {
    let env = TestEnv::with_directory(ScriptedDirectory::offline().with_cluster(true)).await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();
    client.set_winbind(true, "WG").unwrap();

    client.write(false).await.unwrap();
    assert!(env.services.calls().is_empty());
    assert_eq!(env.host.cluster_syncs(), 1);
    assert_eq!(env.directory.cluster_cleanups(), 1);
}

#[tokio::test]
async fn test_check_membership() {
    let env = TestEnv::with_directory(example_domain(Some(false))).await;
    let mut client = env.client(RunMode::Interactive);

    let status = client.check_membership("EXAMPLE", &Unattended).await;
    assert_eq!(status, MembershipStatus::NotJoinedDomain);
    assert_eq!(client.settings.membership, status);

    let status = client.check_membership("HOME", &Unattended).await;
    assert_eq!(status, MembershipStatus::Workgroup);

    let err = client.validate_winbind(true).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_join_and_leave() {
    let env = TestEnv::with_directory(example_domain(Some(true))).await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    client
        .join("EXAMPLE", &JoinCredentials::new("admin", "secret"))
        .await
        .unwrap();
    assert_eq!(client.settings.membership, MembershipStatus::JoinedDomain);
    assert_eq!(client.workgroup_or_realm(), "EXAMPLE.COM");
    assert_eq!(client.settings.ads_server.as_deref(), Some("dc1.example.com"));
    assert_eq!(env.directory.joins()[0].os_name.as_deref(), Some("Linux"));

    client
        .leave("EXAMPLE", &JoinCredentials::new("admin", "secret"), &Unattended)
        .await
        .unwrap();
    assert!(client.settings.ads_server.is_none());
    assert_eq!(client.workgroup_or_realm(), "EXAMPLE");
}

#[tokio::test]
async fn test_resolve_domain() {
    let env = TestEnv::with_directory(example_domain(None)).await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    assert!(client.resolve_domain("example.com").await.is_none());
    assert!(client.resolve_domain("EXAMPLE").await.is_some());
    assert_eq!(client.settings.ads_server.as_deref(), Some("dc1.example.com"));
    assert_eq!(client.store().get(GLOBAL, "realm").as_deref(), Some("EXAMPLE.COM"));
    assert!(client.packages().contains(&"krb5-client".to_string()));
}

#[tokio::test]
async fn test_unattended_join_and_kerberos() {
    let env = TestEnv::with_directory(example_domain(Some(false))).await;
    let mut client = env.client(RunMode::Unattended);

    client
        .import(&document(json!({
            "global": { "workgroup": "EXAMPLE" },
            "winbind": true,
            "disable_dhcp_hostname": true,
            "active_directory": { "kdc": "dc1.example.com" },
            "join": { "username": "admin", "passwd": "secret", "machine": "Computers/Linux" }
        })))
        .await
        .unwrap();
    client.write(true).await.unwrap();

    let joins = env.directory.joins();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].user.as_deref(), Some("admin"));
    assert_eq!(joins[0].machine_ou.as_deref(), Some("Computers/Linux"));
    assert_eq!(env.host.dhcp_hostname(), Some(false));

    let smb_conf = env.read_file(&env.config.paths.smb_conf).await;
    assert!(smb_conf.contains("security = ADS"));
    assert!(smb_conf.contains("realm = EXAMPLE.COM"));

    let krb5 = env.read_file(&env.config.paths.krb5_conf).await;
    assert!(krb5.contains("default_realm = EXAMPLE.COM"));
    assert!(krb5.contains("dc1.example.com"));
}

#[tokio::test]
async fn test_pam_mount_volumes_written_and_registered() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    client
        .settings
        .pam_mount
        .set(vec![MountVolume::cifs("fs1", "homes", "~/fs1")]);
    client.write(true).await.unwrap();

    let content = env.read_file(&env.config.paths.pam_mount_conf).await;
    assert!(content.contains(r#"fstype="nfs""#));
    assert!(content.contains(r#"server="fs1""#));
    assert_eq!(env.host.pam_mount_services(), PAM_MOUNT_SERVICES.to_vec());
}

#[tokio::test]
async fn test_shares_directory_and_services() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    client.set_shares(50, &current_group());
    client.write(true).await.unwrap();

    assert!(env.config.paths.shares_dir.is_dir());
    assert_eq!(
        env.services.calls(),
        vec![
            (ServiceAction::Disable, "winbind".to_string()),
            (ServiceAction::Enable, "nmb".to_string()),
            (ServiceAction::Enable, "smb".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_wins_resolution_written_once() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    client.settings.hosts.set(true);
    assert!(client.get_modified());
    client.write(true).await.unwrap();

    let nsswitch = env.read_file(&env.config.paths.nsswitch_conf).await;
    assert!(nsswitch.contains("hosts:\tfiles dns wins"));
    assert!(!client.settings.hosts.modified());
}

#[tokio::test]
async fn test_reset() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);
    client
        .import(&document(json!({ "global": { "workgroup": "WG" }, "winbind": true })))
        .await
        .unwrap();

    client.reset();
    assert_eq!(client.workgroup(), "");
    assert!(!client.settings.winbind.enabled);
    assert!(client.export().unwrap().is_empty());
    assert!(!client.get_modified());
}

#[tokio::test]
async fn test_rejected_import_changes_nothing() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);
    assert!(!client.get_modified());

    // nothing was read, so there is no workgroup for winbind
    let err = client
        .import(&document(json!({
            "custom": { "k": "v" },
            "mkhomedir": true,
            "winbind": true
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(client.store().get("custom", "k"), None);
    assert!(!client.settings.homedir.enabled);
    assert!(!client.settings.winbind.enabled);
    assert!(!client.get_modified());
}

#[tokio::test]
async fn test_import_takes_workgroup_from_document() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Unattended);

    client
        .import(&document(json!({
            "global": { "workgroup": "WG" },
            "custom": { "k": "v" },
            "winbind": true
        })))
        .await
        .unwrap();

    assert!(client.settings.winbind.enabled);
    assert_eq!(client.store().get("custom", "k").as_deref(), Some("v"));
}

#[tokio::test]
async fn test_ssh_support_written() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();
    assert!(!client.settings.ssh.enabled);

    client.set_ssh_support(true).unwrap();
    assert!(client.get_modified());
    client.write(true).await.unwrap();

    let ssh_config = env.read_file(&env.config.paths.ssh_config).await;
    assert!(ssh_config.contains("Host *\n"));
    assert!(ssh_config.contains("    ForwardX11 no\n"));
    assert!(ssh_config.contains("    GSSAPIAuthentication yes\n"));
    assert!(ssh_config.contains("    GSSAPIDelegateCredentials yes\n"));

    let sshd_config = env.read_file(&env.config.paths.sshd_config).await;
    for line in [
        "GSSAPIAuthentication yes",
        "GSSAPICleanupCredentials yes",
        "ChallengeResponseAuthentication yes",
        "UsePAM yes",
    ] {
        assert!(sshd_config.contains(line), "missing '{}'", line);
    }

    let smb_conf = env.read_file(&env.config.paths.smb_conf).await;
    assert!(smb_conf.contains("kerberos method = secrets and keytab"));

    let mut again = env.client(RunMode::Interactive);
    again.read(&Unattended).await.unwrap();
    assert!(again.settings.ssh.enabled);
    assert_eq!(again.kerberos_method(), KerberosMethod::SecretsAndKeytab);
}

#[tokio::test]
async fn test_ssh_support_needs_workgroup() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);

    let err = client.set_ssh_support(true).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!client.get_modified());
}

#[tokio::test]
async fn test_idmap_and_kerberos_written() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    client.set_idmap_range("EXAMPLE", 100000, 200000).unwrap();
    client.set_idmap_backend("EXAMPLE", IdmapBackend::Ad).unwrap();
    client.set_kerberos_method(KerberosMethod::DedicatedKeytab);
    assert!(client.set_idmap_range("EXAMPLE", 5, 5).is_err());
    assert!(client.set_idmap_range("bad:name", 1, 2).is_err());
    client.write(true).await.unwrap();

    let smb_conf = env.read_file(&env.config.paths.smb_conf).await;
    assert!(smb_conf.contains("idmap config EXAMPLE : range = 100000-200000"));
    assert!(smb_conf.contains("idmap config EXAMPLE : backend = ad"));
    assert!(smb_conf.contains("idmap config EXAMPLE : schema_mode = rfc2307"));
    assert!(smb_conf.contains("kerberos method = dedicated keytab"));

    let mut again = env.client(RunMode::Interactive);
    again.read(&Unattended).await.unwrap();
    let range = again.idmap_ranges()["EXAMPLE"];
    assert_eq!((range.min, range.max), (100000, 200000));
    assert_eq!(range.backend, IdmapBackend::Ad);
    assert_eq!(again.kerberos_method(), KerberosMethod::DedicatedKeytab);
}

#[tokio::test]
async fn test_login_policy_written() {
    let env = TestEnv::new().await;
    let mut client = env.client(RunMode::Interactive);
    client.read(&Unattended).await.unwrap();

    client.set_winbind_caching(true);
    client.set_required_groups(&["EXAMPLE\\admins".to_string(), " ".to_string(), "S-1-5-32-544".to_string()]);
    client.set_guest_access(true);
    client.set_dhcp_include(true);
    client.write(true).await.unwrap();

    let smb_conf = env.read_file(&env.config.paths.smb_conf).await;
    assert!(smb_conf.contains("winbind offline logon = yes"));
    assert!(smb_conf.contains("usershare allow guests = yes"));
    assert!(smb_conf.contains(&format!("include = {}", env.config.paths.dhcp_include)));

    let pam_winbind = env.read_file(&env.config.paths.pam_winbind_conf).await;
    assert!(pam_winbind.contains("cached_login = yes"));
    assert!(pam_winbind.contains("require_membership_of = EXAMPLE\\admins,S-1-5-32-544"));

    let mut again = env.client(RunMode::Interactive);
    again.read(&Unattended).await.unwrap();
    assert!(again.winbind_caching());
    assert!(again.guest_access());
    assert!(again.dhcp_include());
    assert_eq!(again.required_groups(), vec!["EXAMPLE\\admins", "S-1-5-32-544"]);

    again.set_winbind_caching(false);
    again.set_required_groups(&[]);
    again.set_guest_access(false);
    again.set_dhcp_include(false);
    again.write(true).await.unwrap();

    let smb_conf = env.read_file(&env.config.paths.smb_conf).await;
    assert!(!smb_conf.contains("winbind offline logon"));
    assert!(smb_conf.contains("usershare allow guests = no"));
    assert!(!smb_conf.contains("include ="));
    let pam_winbind = env.read_file(&env.config.paths.pam_winbind_conf).await;
    assert!(!pam_winbind.contains("require_membership_of"));
}
