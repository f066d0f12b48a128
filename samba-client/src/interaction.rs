//! Questions asked during a session
//!
//! The reconcilers never talk to a terminal; whoever drives them supplies an
//! `Interaction`. Unattended runs use [`Unattended`], which declines every
//! question.

use crate::membership::JoinCredentials;
use tracing::{error, info};

pub trait Interaction: Send + Sync {
    /// A slow probe is running
    fn busy(&self, message: &str);

    fn idle(&self);

    fn confirm(&self, question: &str) -> bool;

    /// Credentials of an account allowed to join `domain`, `None` to cancel
    fn credentials(&self, domain: &str) -> Option<JoinCredentials>;

    fn error(&self, message: &str);
}

/// Answers nothing and only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Interaction for Unattended {
    fn busy(&self, message: &str) {
        info!("{}", message);
    }

    fn idle(&self) {}

    fn confirm(&self, question: &str) -> bool {
        info!("Declining unattended question: {}", question);
        false
    }

    fn credentials(&self, _domain: &str) -> Option<JoinCredentials> {
        None
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}
