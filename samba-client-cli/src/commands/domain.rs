///! Domain membership commands

use super::Context;
use crate::interactive::session_interaction;
use crate::output;
use anyhow::Result;
use samba_client::validation::{validate_domain_name, validate_join_user, validate_machine_ou};
use samba_client::{JoinCredentials, MembershipStatus, RunMode, SambaClient};
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct MachineOuRow {
    #[tabled(rename = "Organizational Unit")]
    ou: String,
}

/// Credentials from the command line; the password is prompted when a user
/// is given without one
pub fn credentials(
    user: Option<String>,
    password: Option<String>,
    machine: Option<String>,
) -> Result<JoinCredentials> {
    let mut credentials = JoinCredentials::default();

    if let Some(user) = user.filter(|u| !u.is_empty()) {
        validate_join_user(&user)?;
        let password = match password {
            Some(pwd) => pwd,
            None => {
                use dialoguer::Password;
                Password::new()
                    .with_prompt(format!("Password for {}", user))
                    .interact()?
            }
        };
        credentials.user = Some(user);
        credentials.password = Some(password);
    } else if password.is_some() {
        credentials.password = password;
    }

    if let Some(ou) = machine.filter(|m| !m.is_empty()) {
        validate_machine_ou(&ou)?;
        credentials.machine_ou = Some(ou);
    }

    Ok(credentials)
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Joined,
    Left,
}

/// The membership changed either way; success also needs the configuration
/// to be written
fn outcome(change: Change, domain: &str, written: bool) -> Result<String, String> {
    match (change, written) {
        (Change::Joined, true) => Ok(format!("Domain {} joined successfully.", domain)),
        (Change::Left, true) => Ok(format!("Domain {} left.", domain)),
        (Change::Joined, false) => Err(format!(
            "Joined {} but writing the configuration failed",
            domain
        )),
        (Change::Left, false) => Err(format!(
            "Left {} but writing the configuration failed",
            domain
        )),
    }
}

fn report(change: Change, domain: &str, written: bool) -> bool {
    match outcome(change, domain, written) {
        Ok(message) => {
            output::print_success(&message);
            true
        }
        Err(message) => {
            output::print_error(&message);
            false
        }
    }
}

/// The NetBIOS name of `domain` when it turns out to be Active Directory
async fn resolved_name(client: &mut SambaClient, domain: &str) -> String {
    client
        .resolve_domain(domain)
        .await
        .and_then(|lookup| lookup.workgroup)
        .filter(|w| !w.is_empty())
        .unwrap_or_else(|| domain.to_string())
}

pub async fn handle_is_domain_member(domain: &str, ctx: &Context) -> Result<bool> {
    validate_domain_name(domain)?;
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;
    let domain = resolved_name(&mut client, domain).await;

    match client.check_membership(&domain, ui.as_ref()).await {
        MembershipStatus::JoinedDomain => {
            output::print_success(&format!("This machine is a member of {}.", domain));
            Ok(true)
        }
        MembershipStatus::NotJoinedDomain | MembershipStatus::Workgroup => {
            output::print_info(&format!("This machine is not a member of {}.", domain));
            Ok(true)
        }
        MembershipStatus::UndeterminedDomain | MembershipStatus::Unknown => {
            output::print_error("Cannot test domain membership.");
            Ok(false)
        }
    }
}

pub async fn handle_join_domain(
    domain: &str,
    credentials: JoinCredentials,
    ctx: &Context,
) -> Result<bool> {
    validate_domain_name(domain)?;
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;
    let domain = resolved_name(&mut client, domain).await;

    if let Err(e) = client.join(&domain, &credentials).await {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    let written = ctx.write(&mut client).await?;
    Ok(report(Change::Joined, &domain, written))
}

pub async fn handle_leave_domain(
    domain: &str,
    credentials: JoinCredentials,
    ctx: &Context,
) -> Result<bool> {
    validate_domain_name(domain)?;
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;
    let domain = resolved_name(&mut client, domain).await;

    if let Err(e) = client.leave(&domain, &credentials, ui.as_ref()).await {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    let written = ctx.write(&mut client).await?;
    Ok(report(Change::Left, &domain, written))
}

pub async fn handle_machines(
    domain: &str,
    user: &str,
    password: Option<String>,
    ctx: &Context,
) -> Result<bool> {
    validate_domain_name(domain)?;
    let credentials = credentials(Some(user.to_string()), password, None)?;
    let client = ctx.client(RunMode::Interactive);

    let accounts = client
        .list_machine_accounts(
            domain,
            credentials.user().unwrap_or_default(),
            credentials.password().unwrap_or_default(),
        )
        .await;

    match accounts {
        Some(accounts) => {
            let rows: Vec<MachineOuRow> = accounts.into_iter().map(|ou| MachineOuRow { ou }).collect();
            output::print_output(rows, ctx.format)?;
            Ok(true)
        }
        None => {
            output::print_error(&format!("Cannot list machine accounts of {}.", domain));
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_without_user() {
        let credentials = credentials(None, None, Some("Computers/Linux".to_string())).unwrap();
        assert!(credentials.user.is_none());
        assert!(credentials.password.is_none());
        assert_eq!(credentials.machine_ou.as_deref(), Some("Computers/Linux"));
    }

    #[test]
    fn test_credentials_with_password_given() {
        let credentials = credentials(
            Some("admin".to_string()),
            Some("secret".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(credentials.user(), Some("admin"));
        assert_eq!(credentials.password(), Some("secret"));
        assert!(credentials.machine_ou.is_none());
    }

    #[test]
    fn test_outcome_needs_written_configuration() {
        assert_eq!(
            outcome(Change::Joined, "EXAMPLE", true).unwrap(),
            "Domain EXAMPLE joined successfully."
        );
        assert_eq!(
            outcome(Change::Joined, "EXAMPLE", false).unwrap_err(),
            "Joined EXAMPLE but writing the configuration failed"
        );
        assert_eq!(outcome(Change::Left, "EXAMPLE", true).unwrap(), "Domain EXAMPLE left.");
        assert_eq!(
            outcome(Change::Left, "EXAMPLE", false).unwrap_err(),
            "Left EXAMPLE but writing the configuration failed"
        );
    }

    #[test]
    fn test_credentials_reject_bad_user() {
        assert!(credentials(Some("ad%min".to_string()), Some("x".to_string()), None).is_err());
    }
}
