use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::prelude::FromRow;
use sqlx::types::Json;

use crate::entities::{Entity, Id};

/// A versioned snapshot of a formulation. Persisted in the `iterations`
/// table; `version_number` is monotonic per formulation, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormulationVersion {
    pub id: Id,
    pub recipe_id: Id,
    pub version_number: i64,
    pub title: String,
    pub description: String,
    pub notes: String,
    /// Measured properties, e.g. viscosity, pH, cost
    pub metrics: Json<HashMap<String, f64>>,
    /// Process steps for producing the formulation
    pub instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a version row (schema vocabulary, fully defaulted)
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct CreateFormulationVersion {
    pub recipe_id: Id,
    pub version_number: i64,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub metrics: Json<HashMap<String, f64>>,
    pub instructions: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Draft accepted by `FormulationRepository::create_version`; missing
/// fields default to empty strings and an empty metrics map.
#[derive(Debug, Clone, Default)]
pub struct NewFormulationVersion {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub metrics: Option<HashMap<String, f64>>,
    pub instructions: Option<String>,
}

/// Partial-update payload for a version row
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateFormulationVersion {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub metrics: Option<HashMap<String, f64>>,
    pub instructions: Option<String>,
}

impl Entity for FormulationVersion {
    const TABLE: &'static str = "iterations";
    type Create = CreateFormulationVersion;
    type Update = UpdateFormulationVersion;

    fn id(&self) -> &Id {
        &self.id
    }
}
