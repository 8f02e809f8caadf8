//! Formulation repository.
//!
//! Bound to the `recipes` table, with relation-aware reads over the
//! ingredient link table, version management over `iterations`, and a
//! best-effort cascading delete. Link and version writes go through
//! internal base repositories so timestamp stamping and change events
//! behave uniformly.

use async_trait::async_trait;
use sqlx::Row;
use tracing::{debug, error, instrument, warn};

use crate::entities::{
    CreateFormulation, CreateFormulationIngredient, CreateFormulationVersion, Formulation,
    FormulationDetail, FormulationIngredient, FormulationVersion, Id, Ingredient,
    NewFormulationIngredient, NewFormulationVersion, TransformedIngredient,
    UNKNOWN_INGREDIENT, UpdateFormulation, UpdateFormulationIngredient,
    UpdateFormulationVersion,
};
use crate::error::{AppError, Result};
use crate::repositories::base::{EntityStore, Repository, RepositoryOptions};
use crate::repositories::filter::{FilterMap, FilterValue, QueryOptions};
use crate::repositories::validation::FormulationValidator;
use crate::storage::changefeed::{ChangeEvent, Subscription};
use crate::storage::db::DatabaseManager;

/// Repository for formulations and their related rows
pub struct FormulationRepository {
    base: Repository<Formulation>,
    links: Repository<FormulationIngredient>,
    versions: Repository<FormulationVersion>,
    db: DatabaseManager,
}

impl FormulationRepository {
    pub fn new(db: DatabaseManager, options: RepositoryOptions) -> Self {
        Self {
            base: Repository::new(db.clone(), options),
            links: Repository::new(db.clone(), options),
            versions: Repository::new(db.clone(), options),
            db,
        }
    }

    /// Replace the fallback cache served on failed formulation reads
    pub async fn set_fallback_data(&self, data: Vec<Formulation>) {
        self.base.set_fallback_data(data).await;
    }

    /// Subscribe to change events for all formulations
    pub fn subscribe_to_changes<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent<Formulation>) + Send + 'static,
    {
        self.base.subscribe_to_changes(callback)
    }

    /// Subscribe to change events for one formulation
    pub fn subscribe_to_record<F>(&self, id: &Id, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent<Formulation>) + Send + 'static,
    {
        self.base.subscribe_to_record(id, callback)
    }

    /// Get a formulation with its denormalized ingredients and versions.
    ///
    /// Ingredient data prefers a single join query; any join failure
    /// degrades to two sequential queries merged client-side rather than
    /// failing the whole read.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn get_with_ingredients(&self, id: &Id) -> Result<Option<FormulationDetail>> {
        let Some(formulation) = self.base.get_by_id(id).await? else {
            return Ok(None);
        };

        let ingredients = self.formulation_ingredients(id).await;
        let iterations = self.formulation_versions(id).await;

        Ok(Some(FormulationDetail {
            formulation,
            ingredients,
            iterations,
        }))
    }

    /// Attach an ingredient to a formulation
    #[instrument(skip(self, request), fields(formulation_id = %request.formulation_id))]
    pub async fn add_ingredient(
        &self,
        request: NewFormulationIngredient,
    ) -> Result<FormulationIngredient> {
        self.links
            .create(&CreateFormulationIngredient {
                recipe_id: request.formulation_id,
                ingredient_id: request.ingredient_id,
                quantity: request.quantity,
                unit: request.unit,
                notes: request.notes,
                created_at: None,
            })
            .await
    }

    /// Update a link row; always stamps `updated_at`
    pub async fn update_ingredient(
        &self,
        link_id: &Id,
        patch: &UpdateFormulationIngredient,
    ) -> Result<FormulationIngredient> {
        self.links.update(link_id, patch).await
    }

    /// Detach an ingredient link from its formulation
    pub async fn remove_ingredient(&self, link_id: &Id) -> Result<bool> {
        self.links.delete(link_id).await
    }

    /// Create the next version of a formulation.
    ///
    /// The version number continues from the highest existing one,
    /// starting at 1; missing draft fields default to empty values.
    #[instrument(skip(self, draft), fields(formulation_id = %formulation_id))]
    pub async fn create_version(
        &self,
        formulation_id: &Id,
        draft: &NewFormulationVersion,
    ) -> Result<FormulationVersion> {
        let version_number = self.next_version_number(formulation_id).await;
        debug!(version_number, "creating formulation version");

        self.versions
            .create(&CreateFormulationVersion {
                recipe_id: formulation_id.clone(),
                version_number,
                title: draft.title.clone().unwrap_or_default(),
                description: draft.description.clone().unwrap_or_default(),
                notes: draft.notes.clone().unwrap_or_default(),
                metrics: sqlx::types::Json(draft.metrics.clone().unwrap_or_default()),
                instructions: draft.instructions.clone().unwrap_or_default(),
                created_at: None,
            })
            .await
    }

    /// Update a version row
    pub async fn update_version(
        &self,
        version_id: &Id,
        patch: &UpdateFormulationVersion,
    ) -> Result<FormulationVersion> {
        self.versions.update(version_id, patch).await
    }

    /// Delete a version row
    pub async fn delete_version(&self, version_id: &Id) -> Result<bool> {
        self.versions.delete(version_id).await
    }

    async fn next_version_number(&self, formulation_id: &Id) -> i64 {
        let latest = sqlx::query_scalar::<_, i64>(
            "SELECT version_number FROM iterations WHERE recipe_id = ? \
             ORDER BY version_number DESC LIMIT 1",
        )
        .bind(formulation_id.clone())
        .fetch_optional(self.db.pool())
        .await;

        match latest {
            Ok(Some(number)) => number + 1,
            Ok(None) => 1,
            Err(err) => {
                warn!(error = %err, "could not determine latest version number, starting at 1");
                1
            }
        }
    }

    async fn formulation_ingredients(&self, formulation_id: &Id) -> Vec<TransformedIngredient> {
        match self.joined_ingredients(formulation_id).await {
            Ok(rows) if !rows.is_empty() => return rows,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "ingredient join query failed, falling back to separate queries");
            }
        }
        self.merged_ingredients(formulation_id).await
    }

    /// One-round-trip join of link rows with their ingredients
    async fn joined_ingredients(&self, formulation_id: &Id) -> Result<Vec<TransformedIngredient>> {
        let rows = sqlx::query(
            "SELECT ri.id AS link_id, ri.ingredient_id, ri.quantity, ri.unit, ri.notes, \
                    i.name, i.description \
             FROM recipe_ingredients ri \
             LEFT JOIN ingredients i ON i.id = ri.ingredient_id \
             WHERE ri.recipe_id = ?",
        )
        .bind(formulation_id.clone())
        .fetch_all(self.db.pool())
        .await?;

        let mut ingredients = Vec::with_capacity(rows.len());
        for row in rows {
            ingredients.push(TransformedIngredient {
                id: row.try_get("ingredient_id")?,
                quantity: row.try_get("quantity")?,
                unit: row.try_get("unit")?,
                notes: row.try_get("notes")?,
                name: row
                    .try_get::<Option<String>, _>("name")?
                    .unwrap_or_else(|| UNKNOWN_INGREDIENT.to_owned()),
                description: row.try_get("description")?,
                link_id: row.try_get("link_id")?,
            });
        }
        Ok(ingredients)
    }

    /// Two-query fallback: fetch link rows, then ingredient rows, and
    /// merge client-side with a placeholder name for dangling references
    async fn merged_ingredients(&self, formulation_id: &Id) -> Vec<TransformedIngredient> {
        let mut filters = FilterMap::new();
        filters.insert("recipe_id".to_owned(), FilterValue::from(formulation_id));
        let options = QueryOptions {
            filters,
            ..Default::default()
        };

        let links = match self.links.get_all(&options).await {
            Ok(links) if !links.is_empty() => links,
            Ok(_) => {
                debug!("no ingredient links found");
                return Vec::new();
            }
            Err(err) => {
                error!(error = %err, "failed to fetch ingredient links");
                return Vec::new();
            }
        };

        let ingredient_ids: Vec<Id> = links.iter().map(|link| link.ingredient_id.clone()).collect();

        match self.ingredient_details(&ingredient_ids).await {
            Ok(details) => links
                .into_iter()
                .map(|link| {
                    let detail = details.iter().find(|item| item.id == link.ingredient_id);
                    TransformedIngredient {
                        id: link.ingredient_id,
                        quantity: link.quantity,
                        unit: link.unit,
                        notes: link.notes,
                        name: detail
                            .map(|item| item.name.clone())
                            .unwrap_or_else(|| UNKNOWN_INGREDIENT.to_owned()),
                        description: detail.and_then(|item| item.description.clone()),
                        link_id: link.id,
                    }
                })
                .collect(),
            Err(err) => {
                error!(error = %err, "failed to fetch ingredient details, returning limited information");
                links
                    .into_iter()
                    .map(|link| TransformedIngredient {
                        id: link.ingredient_id,
                        quantity: link.quantity,
                        unit: link.unit,
                        notes: link.notes,
                        name: UNKNOWN_INGREDIENT.to_owned(),
                        description: None,
                        link_id: link.id,
                    })
                    .collect()
            }
        }
    }

    async fn ingredient_details(&self, ids: &[Id]) -> Result<Vec<Ingredient>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = sqlx::QueryBuilder::new("SELECT * FROM ingredients WHERE id IN (");
        for (index, id) in ids.iter().enumerate() {
            if index > 0 {
                query.push(", ");
            }
            query.push_bind(id.clone());
        }
        query.push(")");
        Ok(query
            .build_query_as::<Ingredient>()
            .fetch_all(self.db.pool())
            .await?)
    }

    /// Versions newest-first; failures (including a missing table) are
    /// tolerated as an empty history
    async fn formulation_versions(&self, formulation_id: &Id) -> Vec<FormulationVersion> {
        let result = sqlx::query_as::<_, FormulationVersion>(
            "SELECT * FROM iterations WHERE recipe_id = ? ORDER BY version_number DESC",
        )
        .bind(formulation_id.clone())
        .fetch_all(self.db.pool())
        .await;

        match result {
            Ok(versions) => versions,
            Err(err) => {
                warn!(error = %err, "failed to fetch formulation versions");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl EntityStore<Formulation> for FormulationRepository {
    async fn get_by_id(&self, id: &Id) -> Result<Option<Formulation>> {
        self.base.get_by_id(id).await
    }

    async fn get_all(&self, options: &QueryOptions) -> Result<Vec<Formulation>> {
        self.base.get_all(options).await
    }

    async fn create(&self, input: &CreateFormulation) -> Result<Formulation> {
        FormulationValidator::validate(input)?;
        self.base.create(input).await
    }

    async fn update(&self, id: &Id, patch: &UpdateFormulation) -> Result<Formulation> {
        self.base.update(id, patch).await
    }

    /// Cascading delete: ingredient links, then versions, then the
    /// formulation itself.
    ///
    /// This is a best-effort saga, not a transaction. Each step commits
    /// independently and a failed step is logged without aborting the
    /// rest. A missing versions table is tolerated outright.
    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &Id) -> Result<bool> {
        if let Err(err) = sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
            .bind(id.clone())
            .execute(self.db.pool())
            .await
        {
            error!(error = %err, "failed to delete ingredient links");
        }

        if let Err(err) = sqlx::query("DELETE FROM iterations WHERE recipe_id = ?")
            .bind(id.clone())
            .execute(self.db.pool())
            .await
        {
            let err = AppError::from(err);
            if err.is_missing_table() {
                debug!("iterations table not present, skipping version cleanup");
            } else {
                error!(error = %err, "failed to delete formulation versions");
            }
        }

        self.base.delete(id).await
    }

    async fn count(&self, filters: &FilterMap) -> Result<i64> {
        self.base.count(filters).await
    }

    async fn get_by_ids(&self, ids: &[Id]) -> Result<Vec<Formulation>> {
        self.base.get_by_ids(ids).await
    }
}
