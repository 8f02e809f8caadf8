//! Formulary: a data backend for formulation management.
//!
//! The crate layers typed repositories over a SQLite backend. A generic
//! `Repository<T>` provides CRUD with a filter DSL, fallback-data policy,
//! and change subscriptions; domain repositories for formulations and
//! ingredients extend it, and a registry vends one shared instance per
//! logical repository.

pub mod config;
pub mod entities;
pub mod error;
pub mod repositories;
pub mod storage;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use repositories::{
    EntityStore, FormulationRepository, IngredientRepository, Repository, RepositoryOptions,
    RepositoryRegistry,
};
pub use storage::db::DatabaseManager;
