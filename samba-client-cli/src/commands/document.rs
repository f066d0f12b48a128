///! Settings document export and import

use super::Context;
use crate::interactive::session_interaction;
use crate::output::{self, OutputFormat};
use anyhow::{Context as _, Result};
use samba_client::document::{self, DocumentFormat};
use samba_client::RunMode;
use std::path::{Path, PathBuf};

/// `--format` wins over the file name; JSON when neither says otherwise
fn document_format(format: Option<&str>, file: Option<&Path>) -> DocumentFormat {
    match format.map(str::to_lowercase).as_deref() {
        Some("yaml") | Some("yml") => DocumentFormat::Yaml,
        Some(_) => DocumentFormat::Json,
        None => file.map(DocumentFormat::from_path).unwrap_or_default(),
    }
}

pub async fn handle_export(
    file: Option<PathBuf>,
    format: Option<String>,
    ctx: &Context,
) -> Result<bool> {
    let ui = session_interaction();
    let mut client = ctx.read_client(RunMode::Interactive, ui.as_ref()).await?;
    let exported = client.export()?;

    let format = document_format(format.as_deref(), file.as_deref());
    let content = format.render(&exported)?;

    match file {
        Some(path) => {
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("Cannot write {}", path.display()))?;
            output::print_success(&format!("Settings exported to {}", path.display()));
        }
        None => print!("{}", content),
    }
    Ok(true)
}

pub async fn handle_import(file: &Path, write: bool, ctx: &Context) -> Result<bool> {
    let imported = document::load(file)
        .await
        .with_context(|| format!("Cannot load {}", file.display()))?;

    let mut client = ctx.client(RunMode::Unattended);
    client.import(&imported).await?;

    if !write {
        let summary = client.summary();
        output::print_single(&summary, &summary.render(), ctx.format)?;
        if ctx.format == OutputFormat::Table {
            output::print_info("Nothing written; pass --write to apply these settings");
        }
        return Ok(true);
    }

    if !ctx.write(&mut client).await? {
        return Ok(false);
    }
    output::print_success(&format!("Settings from {} written", file.display()));
    Ok(true)
}
