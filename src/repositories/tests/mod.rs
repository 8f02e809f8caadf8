//! Test utilities for repositories: an in-memory database bootstrap,
//! test data generation, and verification helpers.

use crate::storage::db::DatabaseManager;

mod base_repository_test;
mod changefeed_test;

/// Initialize an in-memory database for testing
pub async fn setup_test_db() -> DatabaseManager {
    DatabaseManager::setup_test_db().await
}

/// Test data generators for repositories
pub mod generators {
    use chrono::Utc;

    use crate::entities::{
        CreateFormulation, CreateFormulationIngredient, CreateIngredient, Formulation, Id,
        NewFormulationIngredient, NewFormulationVersion,
    };

    /// Generate a formulation create payload
    pub fn formulation(title: &str) -> CreateFormulation {
        CreateFormulation {
            title: title.to_owned(),
            description: Some(format!("Description for {title}")),
            user_id: None,
            created_at: None,
        }
    }

    /// Generate an ingredient create payload
    pub fn ingredient(name: &str) -> CreateIngredient {
        CreateIngredient {
            name: name.to_owned(),
            description: Some(format!("Description for {name}")),
            created_at: None,
        }
    }

    /// Generate an attach request in domain vocabulary
    pub fn link(formulation_id: &Id, ingredient_id: &Id) -> NewFormulationIngredient {
        NewFormulationIngredient {
            formulation_id: formulation_id.clone(),
            ingredient_id: ingredient_id.clone(),
            quantity: 100.0,
            unit: "g".to_owned(),
            notes: None,
        }
    }

    /// Generate a raw link-row create payload for the generic repository
    pub fn link_row(
        formulation_id: &Id,
        ingredient_id: &Id,
        quantity: f64,
        unit: &str,
    ) -> CreateFormulationIngredient {
        CreateFormulationIngredient {
            recipe_id: formulation_id.clone(),
            ingredient_id: ingredient_id.clone(),
            quantity,
            unit: unit.to_owned(),
            notes: None,
            created_at: None,
        }
    }

    /// Generate a version draft
    pub fn version(title: &str) -> NewFormulationVersion {
        NewFormulationVersion {
            title: Some(title.to_owned()),
            notes: Some("bench notes".to_owned()),
            ..Default::default()
        }
    }

    /// Generate a formulation row without touching the database, for
    /// seeding fallback caches
    pub fn offline_formulation(title: &str) -> Formulation {
        Formulation {
            id: Id::generate(),
            title: title.to_owned(),
            description: None,
            user_id: "system".to_owned(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Test assertions for repositories
pub mod assertions {
    use crate::entities::Id;
    use crate::storage::db::DatabaseManager;

    /// Assert how many rows in `table` reference the given formulation
    pub async fn assert_related_rows(
        db: &DatabaseManager,
        table: &str,
        formulation_id: &Id,
        expected: i64,
    ) {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE recipe_id = ?"))
                .bind(formulation_id.clone())
                .fetch_one(db.pool())
                .await
                .expect("count query");
        assert_eq!(
            count, expected,
            "{table} should hold {expected} rows for formulation {formulation_id}"
        );
    }
}
