use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A recipe saved into one of the owner's cookbooks.
///
/// `url` is the natural key used for "already saved" checks; the numeric id
/// is assigned by the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecipe {
    pub id: i64,
    pub label: String,
    #[serde(rename = "image", default)]
    pub image_ref: Option<String>,
    pub url: String,
    #[serde(default)]
    pub ingredient_lines: Vec<String>,
    #[serde(default)]
    pub calories: f64,
    #[serde(rename = "isFavorite", default)]
    pub favorite: bool,
    #[serde(default)]
    pub cookbook_name: String,
    #[serde(default)]
    pub owner_id: String,
    pub date_added: DateTime<Utc>,
}

impl SavedRecipe {
    pub fn new(
        label: impl Into<String>,
        url: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            label: label.into(),
            image_ref: None,
            url: url.into(),
            ingredient_lines: Vec::new(),
            calories: 0.0,
            favorite: false,
            cookbook_name: String::new(),
            owner_id: owner_id.into(),
            date_added: Utc::now(),
        }
    }

    pub fn with_cookbook(mut self, cookbook_name: impl Into<String>) -> Self {
        self.cookbook_name = cookbook_name.into();
        self
    }

    pub fn with_ingredient_lines(mut self, lines: Vec<String>) -> Self {
        self.ingredient_lines = lines;
        self
    }

    pub fn with_calories(mut self, calories: f64) -> Self {
        self.calories = calories;
        self
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

impl fmt::Display for SavedRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}{}", self.id, self.label, if self.favorite { " *" } else { "" })?;
        if !self.cookbook_name.is_empty() {
            writeln!(f, "Cookbook: {}", self.cookbook_name)?;
        }
        writeln!(f, "Calories: {:.0}", self.calories)?;
        write!(f, "URL:      {}", self.url)?;

        if !self.ingredient_lines.is_empty() {
            write!(f, "\nIngredients:")?;
            for line in &self.ingredient_lines {
                write!(f, "\n  - {}", line)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_field_names() {
        let recipe = SavedRecipe::new("Soup", "https://example.com/soup", "u1")
            .with_id(4)
            .with_image("https://example.com/soup.jpg")
            .with_cookbook("Winter");

        let json = serde_json::to_value(&recipe).unwrap();
        for key in [
            "id",
            "label",
            "image",
            "url",
            "ingredientLines",
            "calories",
            "isFavorite",
            "dateAdded",
            "ownerId",
            "cookbookName",
        ] {
            assert!(json.get(key).is_some(), "missing field {}", key);
        }
        assert_eq!(json["image"], "https://example.com/soup.jpg");
    }

    #[test]
    fn test_recipe_json_roundtrip() {
        let recipe = SavedRecipe::new("Stew", "https://example.com/stew", "u1")
            .with_ingredient_lines(vec!["1 onion".into(), "2 carrots".into()])
            .with_calories(512.5);

        let json = serde_json::to_string(&recipe).unwrap();
        let parsed: SavedRecipe = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, recipe);
    }

    #[test]
    fn test_recipe_display() {
        let recipe = SavedRecipe::new("Pie", "https://example.com/pie", "u1")
            .with_cookbook("Desserts")
            .with_ingredient_lines(vec!["apples".into()]);

        let output = format!("{}", recipe);
        assert!(output.contains("Pie"));
        assert!(output.contains("Cookbook: Desserts"));
        assert!(output.contains("  - apples"));
    }
}
