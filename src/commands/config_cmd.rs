use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::OutputFormat;
use larder::config::Config;

/// Starter config written by `config init`.
const CONFIG_TEMPLATE: &str = r#"# Larder configuration

# Directory for the local database and session file
# data_dir: ~/.local/share/larder

# Cloud store: http(s):// for a larder-cloud server, file:// for a directory
# cloud:
#   url: "http://localhost:8080"
#   api_key: "your-api-key"
#   timeout_secs: 30
"#;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a starter config file
    Init {
        /// Where to write it (defaults to the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!(
                            "database_path: {}",
                            config.database_path.value.display()
                        );
                        println!("  source: {}", config.database_path.source);
                        println!();

                        match &config.cloud.url {
                            Some(url) => println!("cloud.url: {}", url),
                            None => println!("cloud.url: (not configured)"),
                        }
                        println!(
                            "cloud.api_key: {}",
                            if config.cloud.api_key.is_some() {
                                "set"
                            } else {
                                "not set"
                            }
                        );
                        println!("cloud.timeout_secs: {}", config.cloud.timeout_secs);
                    }
                }
                Ok(())
            }
            ConfigSubcommand::Init { path, force } => {
                let path = path.clone().unwrap_or_else(Config::default_config_path);
                if path.exists() && !force {
                    return Err(format!(
                        "Config file already exists: {} (use --force to overwrite)",
                        path.display()
                    )
                    .into());
                }

                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, CONFIG_TEMPLATE)?;
                println!("Wrote {}", path.display());
                Ok(())
            }
        }
    }
}
