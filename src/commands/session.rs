//! Login, registration and the two sync directions.

use clap::Args;

use super::{new_password_or_prompt, password_or_prompt};
use larder::app::App;
use larder::sync::{EntityState, LoginError, SyncReport};

#[derive(Args)]
pub struct RegisterCommand {
    /// Display name
    username: String,

    /// Email address, used to log in
    email: String,

    /// Password (prompted for when omitted)
    #[arg(long)]
    password: Option<String>,
}

impl RegisterCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let password = new_password_or_prompt(&self.password, "Password")?;

        let registration = app
            .accounts()
            .register(&self.username, &self.email, &password)
            .await?;

        println!("Registered and logged in:");
        println!("{}", registration.identity);
        if app.cloud.is_some() && !registration.cloud_synced {
            println!();
            println!("Could not reach the cloud; run 'larder sync' later to upload your account.");
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct LoginCommand {
    /// Email address
    email: String,

    /// Password (prompted for when omitted)
    #[arg(long)]
    password: Option<String>,
}

impl LoginCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let orchestrator = app.orchestrator()?;
        let password = password_or_prompt(&self.password, "Password")?;

        let report = match orchestrator.login(&self.email, &password).await {
            Ok(report) => report,
            Err(LoginError::NotFound { .. }) => {
                return Err(format!(
                    "No account found for {}. Run 'larder register' to create one.",
                    self.email
                )
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        println!("Logged in as {}", report.session.identity.username);
        if report.session.adopted {
            println!("(account copied to this device)");
        }
        println!();
        print_report(&report.restore);
        Ok(())
    }
}

pub async fn logout(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    app.accounts().logout().await?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    match app.accounts().current().await? {
        Some(identity) => println!("{}", identity),
        None => println!("Not logged in."),
    }
    Ok(())
}

pub async fn sync_to_cloud(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = app.orchestrator()?;

    println!("Syncing to cloud...");
    println!();

    let report = orchestrator.sync_to_cloud().await?;
    print_report(&report);
    finish(&report)
}

pub async fn restore(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = app.orchestrator()?;

    println!("Restoring from cloud...");
    println!();

    let report = orchestrator.restore().await?;
    print_report(&report);
    finish(&report)
}

fn print_report(report: &SyncReport) {
    for status in &report.statuses {
        let mark = match status.state {
            EntityState::Synced { .. } => "✓",
            EntityState::Empty => "-",
            EntityState::Failed { .. } => "✗",
        };
        println!("  {} {}", mark, status.line());
    }
}

fn finish(report: &SyncReport) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    if report.is_success() {
        println!("Sync complete.");
        Ok(())
    } else if report.statuses.iter().all(|s| s.is_empty()) {
        println!("Nothing to sync.");
        Ok(())
    } else {
        Err("sync did not complete".into())
    }
}
