mod identity;
mod pantry_ingredient;
mod saved_recipe;

pub use identity::{normalize_email, Identity};
pub use pantry_ingredient::PantryIngredient;
pub use saved_recipe::SavedRecipe;
