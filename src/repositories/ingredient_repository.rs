//! Ingredient repository.
//!
//! Bound to the `ingredients` table, with name search through the filter
//! DSL and usage-based reads through the formulation link table.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::instrument;

use crate::entities::{CreateIngredient, Id, Ingredient, UpdateIngredient};
use crate::error::Result;
use crate::repositories::base::{EntityStore, Repository, RepositoryOptions};
use crate::repositories::filter::{FilterMap, QueryOptions};
use crate::repositories::validation::IngredientValidator;
use crate::storage::changefeed::{ChangeEvent, Subscription};
use crate::storage::db::DatabaseManager;

/// Default number of link rows examined by [`IngredientRepository::get_recent`]
const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Repository for ingredients
pub struct IngredientRepository {
    base: Repository<Ingredient>,
    db: DatabaseManager,
}

impl IngredientRepository {
    pub fn new(db: DatabaseManager, options: RepositoryOptions) -> Self {
        Self {
            base: Repository::new(db.clone(), options),
            db,
        }
    }

    /// Replace the fallback cache served on failed ingredient reads
    pub async fn set_fallback_data(&self, data: Vec<Ingredient>) {
        self.base.set_fallback_data(data).await;
    }

    /// Subscribe to change events for all ingredients
    pub fn subscribe_to_changes<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent<Ingredient>) + Send + 'static,
    {
        self.base.subscribe_to_changes(callback)
    }

    /// Subscribe to change events for one ingredient
    pub fn subscribe_to_record<F>(&self, id: &Id, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent<Ingredient>) + Send + 'static,
    {
        self.base.subscribe_to_record(id, callback)
    }

    /// Case-insensitive substring search on the ingredient name
    pub async fn search_by_name(&self, query: &str) -> Result<Vec<Ingredient>> {
        let mut filters = FilterMap::new();
        filters.insert("name:ilike".to_owned(), query.into());
        self.base
            .get_all(&QueryOptions {
                filters,
                ..Default::default()
            })
            .await
    }

    /// Ingredients used in a formulation, one row per link; dangling
    /// links drop out of the join
    #[instrument(skip(self), fields(formulation_id = %formulation_id))]
    pub async fn get_by_formulation_id(&self, formulation_id: &Id) -> Result<Vec<Ingredient>> {
        Ok(sqlx::query_as::<_, Ingredient>(
            "SELECT i.* FROM recipe_ingredients ri \
             INNER JOIN ingredients i ON i.id = ri.ingredient_id \
             WHERE ri.recipe_id = ?",
        )
        .bind(formulation_id.clone())
        .fetch_all(self.db.pool())
        .await?)
    }

    /// Most recently used ingredients, derived from the newest link rows.
    ///
    /// The limit bounds the link rows examined, so at most that many
    /// distinct ingredients come back, most-recent-first, no duplicates.
    #[instrument(skip(self))]
    pub async fn get_recent(&self, limit: Option<i64>) -> Result<Vec<Ingredient>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);

        let recent_ids: Vec<Id> = sqlx::query_scalar(
            "SELECT ingredient_id FROM recipe_ingredients ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        if recent_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Distinct ids, preserving most-recent-first order
        let mut seen = HashSet::new();
        let unique: Vec<Id> = recent_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let rows = self.base.get_by_ids(&unique).await?;
        let mut by_id: HashMap<Id, Ingredient> = rows
            .into_iter()
            .map(|ingredient| (ingredient.id.clone(), ingredient))
            .collect();

        Ok(unique
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }
}

#[async_trait]
impl EntityStore<Ingredient> for IngredientRepository {
    async fn get_by_id(&self, id: &Id) -> Result<Option<Ingredient>> {
        self.base.get_by_id(id).await
    }

    async fn get_all(&self, options: &QueryOptions) -> Result<Vec<Ingredient>> {
        self.base.get_all(options).await
    }

    async fn create(&self, input: &CreateIngredient) -> Result<Ingredient> {
        IngredientValidator::validate(input)?;
        self.base.create(input).await
    }

    async fn update(&self, id: &Id, patch: &UpdateIngredient) -> Result<Ingredient> {
        self.base.update(id, patch).await
    }

    async fn delete(&self, id: &Id) -> Result<bool> {
        self.base.delete(id).await
    }

    async fn count(&self, filters: &FilterMap) -> Result<i64> {
        self.base.count(filters).await
    }

    async fn get_by_ids(&self, ids: &[Id]) -> Result<Vec<Ingredient>> {
        self.base.get_by_ids(ids).await
    }
}
