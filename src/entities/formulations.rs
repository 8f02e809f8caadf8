use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::prelude::FromRow;

use crate::entities::formulation_ingredients::TransformedIngredient;
use crate::entities::formulation_versions::FormulationVersion;
use crate::entities::{Entity, Id};

/// A formulation. Persisted in the `recipes` table: the schema keeps the
/// recipe vocabulary while the domain layer speaks of formulations, and
/// the repository is the translation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Formulation {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a formulation
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateFormulation {
    pub title: String,
    pub description: Option<String>,
    /// Owner; the schema defaults this to `system` when absent
    pub user_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial-update payload for a formulation
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFormulation {
    pub title: Option<String>,
    pub description: Option<String>,
    pub user_id: Option<String>,
}

impl Entity for Formulation {
    const TABLE: &'static str = "recipes";
    type Create = CreateFormulation;
    type Update = UpdateFormulation;

    fn id(&self) -> &Id {
        &self.id
    }
}

/// A formulation together with its denormalized ingredients and version
/// history, as assembled by `FormulationRepository::get_with_ingredients`.
#[derive(Debug, Clone, Serialize)]
pub struct FormulationDetail {
    #[serde(flatten)]
    pub formulation: Formulation,
    pub ingredients: Vec<TransformedIngredient>,
    /// Versions, newest first
    pub iterations: Vec<FormulationVersion>,
}
