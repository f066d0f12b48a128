///! Winbind enable/disable

use super::Context;
use crate::interactive::session_interaction;
use crate::output;
use anyhow::Result;
use samba_client::RunMode;

pub async fn handle_winbind_command(enable: bool, ctx: &Context) -> Result<bool> {
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;

    // Pick up AD names first so the write does not fall back to plain
    // domain security
    let name = client.workgroup_or_realm();
    if let Some(lookup) = client.resolve_domain(&name).await {
        tracing::debug!("Using AD controller {}", lookup.domain_controller);
    }

    if ctx.offline {
        output::print_warning("Offline: domain membership not verified");
    } else {
        let status = client.check_membership(&name, ui.as_ref()).await;
        tracing::debug!("Membership of {}: {}", name, status);
        if let Err(e) = client.validate_winbind(enable) {
            output::print_error(&e.to_string());
            return Ok(false);
        }
    }

    let workgroup = client.workgroup_or_realm();
    if let Err(e) = client.set_winbind(enable, &workgroup) {
        output::print_error(&e.to_string());
        return Ok(false);
    }

    if !ctx.write(&mut client).await? {
        return Ok(false);
    }
    output::print_success(&format!(
        "Winbind {}",
        if enable { "enabled" } else { "disabled" }
    ));
    Ok(true)
}
