use clap::{Args, Subcommand};

use super::{confirm, new_password_or_prompt, password_or_prompt};
use larder::app::App;

#[derive(Args)]
pub struct AccountCommand {
    #[command(subcommand)]
    pub command: AccountSubcommand,
}

#[derive(Subcommand)]
pub enum AccountSubcommand {
    /// Change the password
    Passwd {
        /// Current password (prompted for when omitted)
        #[arg(long)]
        old: Option<String>,

        /// New password (prompted for when omitted)
        #[arg(long)]
        new: Option<String>,
    },

    /// Update the profile
    Profile {
        /// New display name
        #[arg(long)]
        username: Option<String>,

        /// Profile image reference (empty to clear)
        #[arg(long)]
        image: Option<String>,
    },

    /// Delete the account here and in the cloud
    Delete {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl AccountCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let accounts = app.accounts();

        match &self.command {
            AccountSubcommand::Passwd { old, new } => {
                let old = password_or_prompt(old, "Current password")?;
                let new = new_password_or_prompt(new, "New password")?;
                if new.is_empty() {
                    return Err("New password cannot be empty".into());
                }

                accounts.change_password(&old, &new).await?;
                println!("Password changed. Run 'larder sync' to update the cloud copy.");
                Ok(())
            }
            AccountSubcommand::Profile { username, image } => {
                if username.is_none() && image.is_none() {
                    return Err("Nothing to update; pass --username or --image".into());
                }

                let identity = accounts
                    .update_profile(username.as_deref(), image.as_deref())
                    .await?;
                println!("Updated profile:");
                println!("{}", identity);
                Ok(())
            }
            AccountSubcommand::Delete { force } => {
                let identity = match accounts.current().await? {
                    Some(identity) => identity,
                    None => return Err("Not logged in. Run 'larder login' first.".into()),
                };

                // Confirm deletion unless --force is used
                if !force
                    && !confirm(&format!(
                        "Delete account '{}' and all its data?",
                        identity.email
                    ))?
                {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let deletion = accounts.delete_account().await?;
                println!("Deleted account: {}", identity.email);
                if app.cloud.is_some() && !deletion.cloud_cleared {
                    println!("The cloud copy could not be removed completely.");
                }
                Ok(())
            }
        }
    }
}
