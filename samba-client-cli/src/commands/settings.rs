///! Workgroup and settings overview commands

use super::Context;
use crate::interactive::session_interaction;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use samba_client::summary::SettingsSummary;
use samba_client::{RunMode, SambaClient};
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct SettingRow {
    setting: String,
    value: String,
}

impl SettingRow {
    fn new(setting: &str, value: impl Into<String>) -> Self {
        Self {
            setting: setting.to_string(),
            value: value.into(),
        }
    }
}

fn setting_rows(summary: &SettingsSummary) -> Vec<SettingRow> {
    let mut rows = vec![
        SettingRow::new("Workgroup or Domain", summary.workgroup.clone()),
        SettingRow::new("Membership", summary.membership.to_string()),
        SettingRow::new(
            "AD server",
            summary.ads_server.clone().unwrap_or_else(|| "-".to_string()),
        ),
        SettingRow::new("Authentication with SMB", output::yes_no(summary.winbind)),
        SettingRow::new("Offline authentication", output::yes_no(summary.offline_authentication)),
        SettingRow::new("Kerberos method", summary.kerberos_method.to_string()),
    ];
    for (scope, range) in &summary.idmap {
        rows.push(SettingRow::new(
            &format!("ID map {}", scope),
            format!("{}-{} ({})", range.min, range.max, range.backend),
        ));
    }
    rows.extend([
        SettingRow::new("Create home directory", output::yes_no(summary.mkhomedir)),
        SettingRow::new("SSH single sign-on", output::yes_no(summary.ssh_single_sign_on)),
        SettingRow::new("WINS host resolution", output::yes_no(summary.wins_host_resolution)),
        SettingRow::new("Mounted server directories", summary.pam_mount_volumes.to_string()),
        SettingRow::new("Maximum shares", summary.max_shares.to_string()),
        SettingRow::new("Shares group", summary.shares_group.clone()),
    ]);
    rows
}

/// Read the system and, when online, check membership of the configured name
async fn checked_client(ctx: &Context) -> Result<SambaClient> {
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;
    if !ctx.offline {
        let name = client.workgroup_or_realm();
        if !name.is_empty() {
            client.check_membership(&name, ui.as_ref()).await;
        }
    }
    Ok(client)
}

pub async fn handle_configure(workgroup: &str, ctx: &Context) -> Result<bool> {
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;

    if let Err(e) = client.set_workgroup(workgroup) {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    if !ctx.write(&mut client).await? {
        return Ok(false);
    }
    output::print_success(&format!("Workgroup set to {}", workgroup));
    Ok(true)
}

pub async fn handle_status(ctx: &Context) -> Result<bool> {
    let client = checked_client(ctx).await?;
    let summary = client.summary();

    if ctx.format == OutputFormat::Table {
        output::print_table(setting_rows(&summary));
    } else {
        output::print_single(&summary, "", ctx.format)?;
    }
    Ok(true)
}

pub async fn handle_summary(ctx: &Context) -> Result<bool> {
    let client = checked_client(ctx).await?;
    let summary = client.summary();
    output::print_single(&summary, &summary.render(), ctx.format)?;
    Ok(true)
}

pub async fn handle_packages(ctx: &Context) -> Result<bool> {
    let ui = session_interaction();
    let client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;
    let packages = client.packages();

    match ctx.format {
        OutputFormat::Table => {
            for package in &packages {
                println!("{}", package);
            }
        }
        format => output::print_single(&packages, "", format)?,
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use samba_client::settings::ClientSettings;
    use samba_client::smb_conf::{ConfigStore, SmbConf};

    #[test]
    fn test_setting_rows() {
        let mut store = SmbConf::new("/nonexistent/smb.conf", "/nonexistent/pam_winbind.conf");
        store.set_global_str("workgroup", Some("EXAMPLE"));
        let mut settings = ClientSettings::new("/srv/shares");
        settings.globals_configured = true;

        let rows = setting_rows(&SettingsSummary::collect(&store, &settings));
        assert_eq!(rows[0].setting, "Workgroup or Domain");
        assert_eq!(rows[0].value, "EXAMPLE");
        assert!(rows.iter().any(|r| r.setting == "Shares group" && r.value == "users"));
    }
}
