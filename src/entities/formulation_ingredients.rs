use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::prelude::FromRow;

use crate::entities::{Entity, Id};

/// Display name substituted for a link whose ingredient row is missing.
pub const UNKNOWN_INGREDIENT: &str = "Unknown Ingredient";

/// Link row associating a formulation with an ingredient, plus the
/// quantity in which it is used. Persisted in `recipe_ingredients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FormulationIngredient {
    pub id: Id,
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub quantity: f64,
    pub unit: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a link row (schema vocabulary)
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFormulationIngredient {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub quantity: f64,
    pub unit: String,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Attach request in domain vocabulary, accepted by
/// `FormulationRepository::add_ingredient`.
#[derive(Debug, Clone)]
pub struct NewFormulationIngredient {
    pub formulation_id: Id,
    pub ingredient_id: Id,
    pub quantity: f64,
    pub unit: String,
    pub notes: Option<String>,
}

/// Partial-update payload for a link row. Domain field names serialize to
/// their schema column names.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFormulationIngredient {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
    #[serde(rename = "recipe_id")]
    pub formulation_id: Option<Id>,
    pub ingredient_id: Option<Id>,
}

impl Entity for FormulationIngredient {
    const TABLE: &'static str = "recipe_ingredients";
    type Create = CreateFormulationIngredient;
    type Update = UpdateFormulationIngredient;

    fn id(&self) -> &Id {
        &self.id
    }
}

/// Denormalized link + ingredient view for display. `name` falls back to
/// [`UNKNOWN_INGREDIENT`] when the referenced ingredient row is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedIngredient {
    /// The ingredient's own id
    pub id: Id,
    pub quantity: f64,
    pub unit: String,
    pub notes: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// Id of the underlying link row
    pub link_id: Id,
}
