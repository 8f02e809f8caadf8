//! Repository registry.
//!
//! An explicitly constructed context object, built once at startup and
//! passed to callers, that guarantees at most one instance per logical
//! repository. Sharing instances means fallback caches and subscription
//! state are shared across all callers instead of duplicated.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::entities::Entity;
use crate::repositories::base::{Repository, RepositoryOptions};
use crate::repositories::formulation_repository::FormulationRepository;
use crate::repositories::ingredient_repository::IngredientRepository;
use crate::storage::db::DatabaseManager;

const FORMULATION_KEY: &str = "formulation";
const INGREDIENT_KEY: &str = "ingredient";

/// Keyed registry of repository instances
pub struct RepositoryRegistry {
    db: DatabaseManager,
    options: RepositoryOptions,
    repositories: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl RepositoryRegistry {
    /// Create a registry with default repository options
    pub fn new(db: DatabaseManager) -> Self {
        Self::with_options(db, RepositoryOptions::default())
    }

    /// Create a registry whose vended repositories share the given options
    pub fn with_options(db: DatabaseManager, options: RepositoryOptions) -> Self {
        Self {
            db,
            options,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    /// The database this registry's repositories are bound to
    pub fn db(&self) -> &DatabaseManager {
        &self.db
    }

    /// Get the generic repository for an entity type, creating it on
    /// first access
    pub fn repository<T: Entity>(&self) -> Arc<Repository<T>> {
        self.entry(format!("generic:{}", T::TABLE), || {
            Repository::new(self.db.clone(), self.options)
        })
    }

    /// Get the formulation repository
    pub fn formulations(&self) -> Arc<FormulationRepository> {
        self.entry(FORMULATION_KEY.to_owned(), || {
            FormulationRepository::new(self.db.clone(), self.options)
        })
    }

    /// Get the ingredient repository
    pub fn ingredients(&self) -> Arc<IngredientRepository> {
        self.entry(INGREDIENT_KEY.to_owned(), || {
            IngredientRepository::new(self.db.clone(), self.options)
        })
    }

    /// Drop all cached instances. Primarily useful for testing; live
    /// `Arc` handles keep working but no longer share state with newly
    /// vended instances.
    pub fn clear_repositories(&self) {
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn entry<R, F>(&self, key: String, make: F) -> Arc<R>
    where
        R: Send + Sync + 'static,
        F: FnOnce() -> R,
    {
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = repositories.get(&key) {
            if let Ok(repository) = Arc::clone(existing).downcast::<R>() {
                return repository;
            }
        }

        let repository = Arc::new(make());
        repositories.insert(key, repository.clone() as Arc<dyn Any + Send + Sync>);
        repository
    }
}
