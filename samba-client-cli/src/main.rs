///! Samba client CLI
///!
///! Command-line interface for domain membership and the Samba client
///! features that depend on it

mod commands;
mod interactive;
mod output;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use commands::set::Setting;
use samba_client::config::ClientConfig;
use samba_client::logging::LoggingConfig;
use samba_client::{IdmapBackend, KerberosMethod};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: String,

    /// Record service actions instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Skip every directory lookup
    #[arg(long, global = true)]
    offline: bool,

    /// Start, stop and restart services after writing
    #[arg(long, global = true)]
    apply: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enable or disable authentication through winbind
    Winbind {
        #[command(subcommand)]
        command: WinbindCommands,
    },
    /// Check if this machine is a member of a domain
    Isdomainmember {
        /// Domain to test
        #[arg(long)]
        domain: String,
    },
    /// Join a domain
    Joindomain {
        /// Domain to join
        #[arg(long)]
        domain: String,
        /// User allowed to join (current Kerberos ticket if omitted)
        #[arg(long)]
        user: Option<String>,
        /// Password (will be prompted if a user is given without one)
        #[arg(long)]
        password: Option<String>,
        /// Organizational unit for the machine account
        #[arg(long)]
        machine: Option<String>,
    },
    /// Leave a domain
    Leavedomain {
        /// Domain to leave
        #[arg(long)]
        domain: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Change a single client setting
    Set {
        #[command(subcommand)]
        command: SetCommands,
    },
    /// Change the workgroup
    Configure {
        /// New workgroup or domain name
        #[arg(long)]
        workgroup: String,
    },
    /// List organizational units for machine accounts
    Machines {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Show the current settings
    Status,
    /// Show a summary of the current settings
    Summary,
    /// List the packages the current settings need
    Packages,
    /// Export the settings document
    Export {
        /// Target file (stdout if omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Document format (json, yaml); guessed from the file name otherwise
        #[arg(long)]
        format: Option<String>,
    },
    /// Import a settings document
    Import {
        /// Settings document (JSON or YAML)
        file: PathBuf,
        /// Write the imported settings to the system
        #[arg(long)]
        write: bool,
    },
    /// Guided setup of workgroup, membership and winbind
    Wizard,
    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum WinbindCommands {
    /// Authenticate domain users through winbind
    Enable,
    /// Stop authenticating through winbind
    Disable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Toggle::On
    }
}

#[derive(Subcommand)]
enum SetCommands {
    /// Kerberos single sign-on for OpenSSH
    Ssh {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// ID mapping range and backend for a domain
    Idmap {
        /// Domain name, or `*` for the default range
        #[arg(long, default_value = "*")]
        scope: String,
        /// Lowest ID of the range
        #[arg(long, requires = "max")]
        min: Option<u32>,
        /// Highest ID of the range
        #[arg(long, requires = "min")]
        max: Option<u32>,
        /// Backend (tdb, ad, rid, autorid)
        #[arg(long)]
        backend: Option<String>,
    },
    /// How winbind uses Kerberos keytabs
    KerberosMethod {
        /// secrets only, system keytab, dedicated keytab, secrets and keytab
        method: String,
    },
    /// Offline logins with cached credentials
    OfflineLogon {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Groups whose members may log in (none allows every domain user)
    RequiredGroups { groups: Vec<String> },
    /// Guest access to user shares
    GuestAccess {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Take the WINS server from DHCP
    DhcpWins {
        #[arg(value_enum)]
        state: Toggle,
    },
}

impl SetCommands {
    fn into_setting(self) -> Result<Setting> {
        Ok(match self {
            SetCommands::Ssh { state } => Setting::SshSingleSignOn(state.enabled()),
            SetCommands::Idmap {
                scope,
                min,
                max,
                backend,
            } => {
                let range = min.zip(max);
                let backend = backend.map(|b| b.parse::<IdmapBackend>()).transpose()?;
                if range.is_none() && backend.is_none() {
                    anyhow::bail!("Give --min and --max, --backend, or both");
                }
                Setting::Idmap {
                    scope,
                    range,
                    backend,
                }
            }
            SetCommands::KerberosMethod { method } => {
                Setting::KerberosMethod(method.parse::<KerberosMethod>()?)
            }
            SetCommands::OfflineLogon { state } => Setting::OfflineLogon(state.enabled()),
            SetCommands::RequiredGroups { groups } => Setting::RequiredGroups(groups),
            SetCommands::GuestAccess { state } => Setting::GuestAccess(state.enabled()),
            SetCommands::DhcpWins { state } => Setting::DhcpWins(state.enabled()),
        })
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a sample configuration file
    Sample,
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("Cannot load {}", path.display()))?,
        None => ClientConfig::load(),
    };
    config.validate()?;

    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Commands that need no configuration
    match &cli.command {
        Commands::Completions { shell } => {
            generate_completions(*shell);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Config {
            command: ConfigCommands::Sample,
        } => {
            print!("{}", ClientConfig::generate_sample());
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    let _guard = LoggingConfig::from(&config.logging)
        .init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("Samba client started");
    let ctx = commands::Context::new(
        config,
        output::OutputFormat::from_str(&cli.output),
        cli.dry_run,
        cli.offline,
        cli.apply,
    );

    let success = match cli.command {
        Commands::Winbind { command } => {
            let enable = matches!(command, WinbindCommands::Enable);
            commands::winbind::handle_winbind_command(enable, &ctx).await?
        }
        Commands::Isdomainmember { domain } => {
            commands::domain::handle_is_domain_member(&domain, &ctx).await?
        }
        Commands::Joindomain {
            domain,
            user,
            password,
            machine,
        } => {
            let credentials = commands::domain::credentials(user, password, machine)?;
            commands::domain::handle_join_domain(&domain, credentials, &ctx).await?
        }
        Commands::Leavedomain {
            domain,
            user,
            password,
        } => {
            let credentials = commands::domain::credentials(user, password, None)?;
            commands::domain::handle_leave_domain(&domain, credentials, &ctx).await?
        }
        Commands::Set { command } => {
            commands::set::handle_set(command.into_setting()?, &ctx).await?
        }
        Commands::Configure { workgroup } => {
            commands::settings::handle_configure(&workgroup, &ctx).await?
        }
        Commands::Machines {
            domain,
            user,
            password,
        } => {
            commands::domain::handle_machines(&domain, &user, password, &ctx).await?
        }
        Commands::Status => commands::settings::handle_status(&ctx).await?,
        Commands::Summary => commands::settings::handle_summary(&ctx).await?,
        Commands::Packages => commands::settings::handle_packages(&ctx).await?,
        Commands::Export { file, format } => {
            commands::document::handle_export(file, format, &ctx).await?
        }
        Commands::Import { file, write } => {
            commands::document::handle_import(&file, write, &ctx).await?
        }
        Commands::Wizard => commands::wizard::handle_wizard(&ctx).await?,
        Commands::Config { .. } | Commands::Completions { .. } => true,
    };

    ctx.report_dry_run();
    tracing::info!(success, "Samba client finished");

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Generate shell completions
fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut io::stdout());
}
