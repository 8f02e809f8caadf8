use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::prelude::FromRow;

use crate::entities::{Entity, Id};

/// An ingredient. Independent lifecycle; referenced (not owned) by
/// formulation ingredient links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for an ingredient
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateIngredient {
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial-update payload for an ingredient
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateIngredient {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Entity for Ingredient {
    const TABLE: &'static str = "ingredients";
    type Create = CreateIngredient;
    type Update = UpdateIngredient;

    fn id(&self) -> &Id {
        &self.id
    }
}
