use clap::{Args, Subcommand};

use super::{confirm, OutputFormat};
use larder::app::App;
use larder::models::SavedRecipe;
use larder::store::RecordStore;

#[derive(Args)]
pub struct RecipeCommand {
    #[command(subcommand)]
    pub command: RecipeSubcommand,
}

#[derive(Subcommand)]
pub enum RecipeSubcommand {
    /// Save a recipe into a cookbook
    Save {
        /// Recipe title
        label: String,

        /// Recipe source URL
        url: String,

        /// Cookbook to save into
        #[arg(long, default_value = "")]
        cookbook: String,

        /// Calories per recipe
        #[arg(long)]
        calories: Option<f64>,

        /// Ingredient line (can be repeated)
        #[arg(long = "ingredient", value_name = "LINE")]
        ingredients: Vec<String>,

        /// Image URL
        #[arg(long)]
        image: Option<String>,
    },

    /// List saved recipes
    List {
        /// Only this cookbook
        #[arg(long)]
        cookbook: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a saved recipe
    Delete {
        /// Recipe ID
        id: i64,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Toggle a recipe's favorite flag
    Favorite {
        /// Recipe ID
        id: i64,
    },

    /// List cookbook names
    Cookbooks,

    /// Check whether a URL is already saved
    Check {
        /// Recipe source URL
        url: String,

        /// Cookbook to look in
        #[arg(long, default_value = "")]
        cookbook: String,
    },
}

impl RecipeCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let owner_id = app.require_owner().await?;
        let repo = app.recipes();

        match &self.command {
            RecipeSubcommand::Save {
                label,
                url,
                cookbook,
                calories,
                ingredients,
                image,
            } => {
                if label.trim().is_empty() {
                    return Err("Recipe label cannot be empty".into());
                }
                if repo.is_saved(&owner_id, url, cookbook).await? {
                    return Err(format!("Already saved: {}", url).into());
                }

                let mut recipe = SavedRecipe::new(label.trim(), url, &owner_id)
                    .with_cookbook(cookbook)
                    .with_ingredient_lines(ingredients.clone());
                if let Some(calories) = calories {
                    recipe = recipe.with_calories(*calories);
                }
                if let Some(image) = image {
                    recipe = recipe.with_image(image);
                }

                let created = repo.insert_record(&recipe).await?;
                println!("Saved recipe:");
                println!("{}", created);
                Ok(())
            }
            RecipeSubcommand::List { cookbook, format } => {
                let recipes = match cookbook {
                    Some(name) => repo.list_by_cookbook(&owner_id, name).await?,
                    None => repo.list_by_owner(&owner_id).await?,
                };

                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&recipes)?),
                    OutputFormat::Text => {
                        if recipes.is_empty() {
                            println!("No recipes found.");
                        }
                        for recipe in &recipes {
                            println!("{}\n", recipe);
                        }
                    }
                }
                Ok(())
            }
            RecipeSubcommand::Delete { id, force } => {
                let recipe = match repo.get_record(&owner_id, *id).await? {
                    Some(r) => r,
                    None => return Err(format!("Recipe not found: {}", id).into()),
                };

                if !force && !confirm(&format!("Delete recipe '{}'?", recipe.label))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                repo.delete_record(&owner_id, recipe.id).await?;
                println!("Deleted recipe: {}", recipe.label);
                Ok(())
            }
            RecipeSubcommand::Favorite { id } => {
                match repo.toggle_favorite(&owner_id, *id).await? {
                    Some(true) => println!("Marked {} as favorite.", id),
                    Some(false) => println!("Removed {} from favorites.", id),
                    None => return Err(format!("Recipe not found: {}", id).into()),
                }
                Ok(())
            }
            RecipeSubcommand::Cookbooks => {
                let names = repo.cookbooks(&owner_id).await?;
                if names.is_empty() {
                    println!("No cookbooks yet.");
                }
                for name in names {
                    if name.is_empty() {
                        println!("(uncategorized)");
                    } else {
                        println!("{}", name);
                    }
                }
                Ok(())
            }
            RecipeSubcommand::Check { url, cookbook } => {
                if repo.is_saved(&owner_id, url, cookbook).await? {
                    println!("Saved.");
                } else {
                    println!("Not saved.");
                }
                Ok(())
            }
        }
    }
}
