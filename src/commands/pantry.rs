use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Subcommand};

use super::{confirm, OutputFormat};
use larder::app::App;
use larder::models::PantryIngredient;
use larder::store::RecordStore;

#[derive(Args)]
pub struct PantryCommand {
    #[command(subcommand)]
    pub command: PantrySubcommand,
}

#[derive(Subcommand)]
pub enum PantrySubcommand {
    /// Add an ingredient
    Add {
        /// Ingredient name
        name: String,

        /// Quantity (amount)
        #[arg(long)]
        quantity: Option<f64>,

        /// Unit of measurement
        #[arg(long, default_value = "")]
        unit: String,

        /// Category, e.g. dairy
        #[arg(long)]
        category: Option<String>,

        /// Where it is kept, e.g. fridge
        #[arg(long)]
        location: Option<String>,

        /// Expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<NaiveDate>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List all ingredients
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only favorites
        #[arg(long)]
        favorites: bool,
    },

    /// Show an ingredient's details
    Show {
        /// Ingredient ID
        id: i64,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update an existing ingredient
    Update {
        /// Ingredient ID
        id: i64,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New quantity
        #[arg(long)]
        quantity: Option<f64>,

        /// New unit
        #[arg(long)]
        unit: Option<String>,

        /// New category
        #[arg(long)]
        category: Option<String>,

        /// New location
        #[arg(long)]
        location: Option<String>,

        /// New expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<NaiveDate>,

        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete an ingredient
    Delete {
        /// Ingredient ID
        id: i64,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Toggle an ingredient's favorite flag
    Favorite {
        /// Ingredient ID
        id: i64,
    },

    /// List ingredients expiring within the next days
    Expiring {
        /// Days from today
        #[arg(long, default_value = "7")]
        days: i64,
    },
}

impl PantryCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let owner_id = app.require_owner().await?;
        let repo = app.ingredients();

        match &self.command {
            PantrySubcommand::Add {
                name,
                quantity,
                unit,
                category,
                location,
                expires,
                notes,
            } => {
                if name.trim().is_empty() {
                    return Err("Ingredient name cannot be empty".into());
                }

                let mut item = PantryIngredient::new(name.trim(), &owner_id);
                if let Some(quantity) = quantity {
                    item = item.with_quantity(*quantity, unit);
                }
                if let Some(category) = category {
                    item = item.with_category(category);
                }
                if let Some(location) = location {
                    item = item.with_location(location);
                }
                if let Some(date) = expires {
                    item = item.with_expiration(*date);
                }
                if let Some(notes) = notes {
                    item = item.with_notes(notes);
                }

                let created = repo.insert_record(&item).await?;
                println!("Added: {}", created);
                Ok(())
            }
            PantrySubcommand::List { format, favorites } => {
                let mut items = repo.list_by_owner(&owner_id).await?;
                if *favorites {
                    items.retain(|i| i.favorite);
                }

                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
                    OutputFormat::Text => {
                        if items.is_empty() {
                            println!("Pantry is empty.");
                        }
                        for item in &items {
                            println!("{}", item);
                        }
                    }
                }
                Ok(())
            }
            PantrySubcommand::Show { id, format } => {
                let item = find(&repo, &owner_id, *id).await?;

                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
                    OutputFormat::Text => {
                        println!("{}", item);
                        if !item.category.is_empty() {
                            println!("Category: {}", item.category);
                        }
                        if !item.location.is_empty() {
                            println!("Location: {}", item.location);
                        }
                        if !item.notes.is_empty() {
                            println!("Notes:    {}", item.notes);
                        }
                    }
                }
                Ok(())
            }
            PantrySubcommand::Update {
                id,
                name,
                quantity,
                unit,
                category,
                location,
                expires,
                notes,
            } => {
                let mut item = find(&repo, &owner_id, *id).await?;

                // Apply updates
                if let Some(name) = name {
                    item.name = name.clone();
                }
                if let Some(quantity) = quantity {
                    item.quantity = *quantity;
                }
                if let Some(unit) = unit {
                    item.unit = unit.clone();
                }
                if let Some(category) = category {
                    item.category = category.clone();
                }
                if let Some(location) = location {
                    item.location = location.clone();
                }
                if expires.is_some() {
                    item.expiration_date = *expires;
                }
                if let Some(notes) = notes {
                    item.notes = notes.clone();
                }

                repo.update_record(&item).await?;
                println!("Updated: {}", item);
                Ok(())
            }
            PantrySubcommand::Delete { id, force } => {
                let item = find(&repo, &owner_id, *id).await?;

                if !force && !confirm(&format!("Delete '{}'?", item.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                repo.delete_record(&owner_id, item.id).await?;
                println!("Deleted: {}", item.name);
                Ok(())
            }
            PantrySubcommand::Favorite { id } => {
                match repo.toggle_favorite(&owner_id, *id).await? {
                    Some(true) => println!("Marked {} as favorite.", id),
                    Some(false) => println!("Removed {} from favorites.", id),
                    None => return Err(format!("Ingredient not found: {}", id).into()),
                }
                Ok(())
            }
            PantrySubcommand::Expiring { days } => {
                let cutoff = Utc::now().date_naive() + Duration::days(*days);
                let items = repo.expiring_before(&owner_id, cutoff).await?;

                if items.is_empty() {
                    println!("Nothing expires in the next {} days.", days);
                }
                for item in &items {
                    println!("{}", item);
                }
                Ok(())
            }
        }
    }
}

async fn find(
    repo: &impl RecordStore<PantryIngredient>,
    owner_id: &str,
    id: i64,
) -> Result<PantryIngredient, Box<dyn std::error::Error>> {
    repo.get_record(owner_id, id)
        .await?
        .ok_or_else(|| format!("Ingredient not found: {}", id).into())
}
