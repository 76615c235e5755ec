use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    AccountCommand, ConfigCommand, LoginCommand, PantryCommand, RecipeCommand, RegisterCommand,
};
use larder::app::App;
use larder::config::Config;

#[derive(Parser)]
#[command(name = "larder")]
#[command(version)]
#[command(about = "Pantry and cookbook manager with cloud sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register(RegisterCommand),

    /// Log in, adopting a cloud account onto this device if needed
    Login(LoginCommand),

    /// End the session on this device
    Logout,

    /// Show the logged-in account
    Whoami,

    /// Push the profile, pantry and cookbook to the cloud
    Sync,

    /// Pull the pantry and cookbook from the cloud
    Restore,

    /// Manage the logged-in account
    Account(AccountCommand),

    /// Manage pantry ingredients
    Pantry(PantryCommand),

    /// Manage saved recipes
    Recipe(RecipeCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "larder=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let app = App::open(config).await?;

    match command {
        Commands::Register(cmd) => cmd.run(&app).await,
        Commands::Login(cmd) => cmd.run(&app).await,
        Commands::Logout => commands::logout(&app).await,
        Commands::Whoami => commands::whoami(&app).await,
        Commands::Sync => commands::sync_to_cloud(&app).await,
        Commands::Restore => commands::restore(&app).await,
        Commands::Account(cmd) => cmd.run(&app).await,
        Commands::Pantry(cmd) => cmd.run(&app).await,
        Commands::Recipe(cmd) => cmd.run(&app).await,
        Commands::Config(_) => Ok(()),
    }
}
