///! Guided setup
///!
///! Asks for the workgroup or domain and whether to authenticate through
///! winbind, with home directories and SSH single sign-on on top. Joins the
///! domain when the membership check calls for it.

use super::Context;
use crate::interactive::DialoguerInteraction;
use crate::output;
use anyhow::Result;
use dialoguer::{Confirm, Input};
use samba_client::validation::validate_domain_name;
use samba_client::{JoinOutcome, RunMode};

pub async fn handle_wizard(ctx: &Context) -> Result<bool> {
    let ui = DialoguerInteraction::new();
    let mut client = ctx.read_client(RunMode::Interactive, &ui).await?;

    let name: String = Input::new()
        .with_prompt("Workgroup or domain name")
        .default(client.workgroup_or_realm())
        .interact_text()?;
    if let Err(e) = validate_domain_name(&name) {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    // An AD lookup also records the domain's NetBIOS name and realm
    match client.resolve_domain(&name).await {
        Some(lookup) => output::print_info(&format!(
            "{} is an Active Directory domain served by {}",
            name, lookup.domain_controller
        )),
        None if name.contains('.') => {
            output::print_error(&format!("No Active Directory controller found for {}", name));
            return Ok(false);
        }
        None => {
            if let Err(e) = client.set_workgroup(&name) {
                output::print_error(&e.to_string());
                return Ok(false);
            }
        }
    }

    let workgroup = client.workgroup();
    let status = client.check_membership(&workgroup, &ui).await;
    output::print_info(&format!("{}: {}", workgroup, status));

    let winbind = Confirm::new()
        .with_prompt("Use SMB information for Linux authentication?")
        .default(client.settings.winbind.enabled)
        .interact()?;
    if let Err(e) = client.validate_winbind(winbind) {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    if winbind {
        let mkhomedir = Confirm::new()
            .with_prompt("Create home directory on login?")
            .default(client.settings.homedir.enabled)
            .interact()?;
        client.settings.homedir.set(mkhomedir);

        let ssh = Confirm::new()
            .with_prompt("Single sign-on for SSH?")
            .default(client.settings.ssh.enabled)
            .interact()?;
        if let Err(e) = client.set_ssh_support(ssh) {
            output::print_error(&e.to_string());
            return Ok(false);
        }
    }

    let domain = client.workgroup_or_realm();
    if let Err(e) = client.set_winbind(winbind, &domain) {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    match client.ask_join_domain(&workgroup, &ui).await {
        JoinOutcome::Joined => {
            output::print_success(&format!("Domain {} joined successfully.", workgroup))
        }
        JoinOutcome::NoJoin => output::print_warning(&format!("Not joined to {}", workgroup)),
        JoinOutcome::NotRequired => {}
        JoinOutcome::Fail(message) => {
            output::print_error(&message);
            return Ok(false);
        }
    }

    client.settings.globals_configured = true;
    if !ctx.write(&mut client).await? {
        return Ok(false);
    }
    println!("{}", client.summary().short());
    Ok(true)
}
