//! Samba client library
//!
//! Domain membership and the client features that depend on it (winbind,
//! Kerberos, PAM, SSH single sign-on, user shares, pam_mount volumes),
//! reconciled against the system configuration.

// Core modules
pub mod config;
pub mod logging;
pub mod validation;

// Collaborators
pub mod smb_conf;
pub mod directory;
pub mod services;
pub mod host;
pub mod memory;

// Membership
pub mod interaction;
pub mod membership;

// Features
pub mod winbind;
pub mod idmap;
pub mod kerberos;
pub mod nsswitch;
pub mod hosts;
pub mod homedir;
pub mod ssh;
pub mod shares;
pub mod pam_mount;

// Client state
pub mod settings;
pub mod document;
pub mod summary;
pub mod state;

pub use config::ClientConfig;
pub use interaction::{Interaction, Unattended};
pub use membership::{JoinCredentials, JoinOutcome};
pub use settings::ClientSettings;
pub use state::SambaClient;
pub use samba_client_common::{Error, IdmapBackend, KerberosMethod, MembershipStatus, Result, RunMode};
