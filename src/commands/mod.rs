mod account_cmd;
mod config_cmd;
mod pantry;
mod recipe;
mod session;

pub use account_cmd::AccountCommand;
pub use config_cmd::ConfigCommand;
pub use pantry::PantryCommand;
pub use recipe::RecipeCommand;
pub use session::{logout, restore, sync_to_cloud, whoami, LoginCommand, RegisterCommand};

use clap::ValueEnum;
use dialoguer::Password;
use std::io::{self, Write};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Prints `label` and reads one line from stdin, without the newline.
fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

/// Uses the value given on the command line, or asks for it without echo.
fn password_or_prompt(given: &Option<String>, label: &str) -> dialoguer::Result<String> {
    match given {
        Some(password) => Ok(password.clone()),
        None => Password::new().with_prompt(label).interact(),
    }
}

/// Like [`password_or_prompt`], asking twice when prompting.
fn new_password_or_prompt(given: &Option<String>, label: &str) -> dialoguer::Result<String> {
    match given {
        Some(password) => Ok(password.clone()),
        None => Password::new()
            .with_prompt(label)
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact(),
    }
}

/// Asks a yes/no question; anything but `y` is no.
fn confirm(question: &str) -> io::Result<bool> {
    let input = prompt(&format!("{} [y/N] ", question))?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
