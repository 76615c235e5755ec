use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An item in someone's pantry.
///
/// The id is assigned by the local store; `0` means "not yet inserted".
/// An empty `owner_id` is the shared, unauthenticated scope and is never
/// synchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryIngredient {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
    #[serde(rename = "isFavorite", default)]
    pub favorite: bool,
    #[serde(default)]
    pub owner_id: String,
}

impl PantryIngredient {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            quantity: 0.0,
            unit: String::new(),
            category: String::new(),
            image_ref: None,
            expiration_date: None,
            location: String::new(),
            notes: String::new(),
            favorite: false,
            owner_id: owner_id.into(),
        }
    }

    pub fn with_quantity(mut self, quantity: f64, unit: impl Into<String>) -> Self {
        self.quantity = quantity;
        self.unit = unit.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|exp| exp < date)
    }
}

impl fmt::Display for PantryIngredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)?;
        if self.quantity > 0.0 {
            write!(f, " ({} {})", self.quantity, self.unit)?;
        }
        if self.favorite {
            write!(f, " *")?;
        }
        if let Some(date) = self.expiration_date {
            write!(f, " - expires {}", date)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_field_names() {
        let item = PantryIngredient::new("Rice", "u1")
            .with_id(7)
            .with_quantity(2.0, "kg")
            .with_expiration(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["isFavorite"], false);
        assert_eq!(json["expirationDate"], "2026-03-01");
        assert!(json.get("imageRef").is_some());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let item: PantryIngredient =
            serde_json::from_str(r#"{"id": 3, "name": "Salt", "ownerId": "u1"}"#).unwrap();

        assert_eq!(item.id, 3);
        assert_eq!(item.quantity, 0.0);
        assert!(!item.favorite);
        assert!(item.expiration_date.is_none());
    }

    #[test]
    fn test_is_expired_on() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let old = PantryIngredient::new("Milk", "u1")
            .with_expiration(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());
        let fresh = PantryIngredient::new("Flour", "u1");

        assert!(old.is_expired_on(today));
        assert!(!fresh.is_expired_on(today));
    }
}
