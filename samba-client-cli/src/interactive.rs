///! Terminal prompts for a session
///!
///! Implements `Interaction` with dialoguer prompts and an indicatif
///! spinner for slow lookups.

use crate::output;
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use samba_client::{Interaction, JoinCredentials, Unattended};
use std::io::IsTerminal;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct DialoguerInteraction {
    spinner: Mutex<Option<ProgressBar>>,
}

impl DialoguerInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_spinner(&self) -> Option<ProgressBar> {
        self.spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Interaction for DialoguerInteraction {
    fn busy(&self, message: &str) {
        if let Some(previous) = self.take_spinner() {
            previous.finish_and_clear();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        *self
            .spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(spinner);
    }

    fn idle(&self) {
        if let Some(spinner) = self.take_spinner() {
            spinner.finish_and_clear();
        }
    }

    fn confirm(&self, question: &str) -> bool {
        self.idle();
        Confirm::new()
            .with_prompt(question)
            .default(true)
            .interact()
            .unwrap_or(false)
    }

    fn credentials(&self, domain: &str) -> Option<JoinCredentials> {
        self.idle();
        println!("Enter the user name and the password for joining the domain {}.", domain);

        let user: String = Input::new()
            .with_prompt("Username")
            .interact_text()
            .ok()?;
        let password = Password::new().with_prompt("Password").interact().ok()?;
        let machine: String = Input::new()
            .with_prompt("Machine account OU (empty for the default)")
            .allow_empty(true)
            .interact_text()
            .ok()?;

        let mut credentials = JoinCredentials::new(&user, &password);
        if !machine.trim().is_empty() {
            credentials.machine_ou = Some(machine.trim().to_string());
        }
        Some(credentials)
    }

    fn error(&self, message: &str) {
        self.idle();
        output::print_error(message);
    }
}

/// Prompts when a person is at the terminal, silence otherwise
pub fn session_interaction() -> Box<dyn Interaction> {
    if std::io::stdin().is_terminal() {
        Box::new(DialoguerInteraction::new())
    } else {
        Box::new(Unattended)
    }
}
