//! Generic repository over one backend table.
//!
//! `Repository<T>` translates typed CRUD calls into SQL against the
//! entity's table, stamps timestamps on writes, publishes change events,
//! and can substitute caller-supplied fallback data when a read fails.
//! The `EntityStore` trait is the seam domain repositories implement to
//! refine individual operations (validated creates, cascading deletes).

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite};
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument, warn};

use crate::entities::{Entity, Id};
use crate::error::{AppError, Result};
use crate::repositories::filter::{FilterMap, QueryOptions, apply_filters};
use crate::repositories::validation::ensure_identifier;
use crate::storage::changefeed::{ChangeEvent, ChangeKind, RowChange, Subscription};
use crate::storage::db::DatabaseManager;

/// Per-repository behavior switches
#[derive(Debug, Clone, Copy)]
pub struct RepositoryOptions {
    /// Whether subscriptions open live change feeds
    pub enable_realtime: bool,
    /// Whether failed reads are served from the fallback cache
    pub use_fallback_data: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            enable_realtime: false,
            use_fallback_data: true,
        }
    }
}

/// Common operations every repository exposes for its entity type
#[async_trait]
pub trait EntityStore<T: Entity>: Send + Sync {
    /// Get the entity by ID
    async fn get_by_id(&self, id: &Id) -> Result<Option<T>>;

    /// List entities with filtering, ordering, and pagination
    async fn get_all(&self, options: &QueryOptions) -> Result<Vec<T>>;

    /// Create a new entity
    async fn create(&self, input: &T::Create) -> Result<T>;

    /// Apply a partial update to an existing entity
    async fn update(&self, id: &Id, patch: &T::Update) -> Result<T>;

    /// Delete an entity by ID; `Ok(false)` when no row matched
    async fn delete(&self, id: &Id) -> Result<bool>;

    /// Check if an entity exists by ID
    async fn exists(&self, id: &Id) -> Result<bool> {
        Ok(self.get_by_id(id).await?.is_some())
    }

    /// Count entities matching the filter set
    async fn count(&self, filters: &FilterMap) -> Result<i64>;

    /// Get multiple entities by ID in a single query
    async fn get_by_ids(&self, ids: &[Id]) -> Result<Vec<T>>;
}

/// Generic repository bound to `T::TABLE`
pub struct Repository<T: Entity> {
    db: DatabaseManager,
    options: RepositoryOptions,
    /// Degraded-mode substitute served when enabled and a read fails.
    /// Caller-populated; never filled from successful reads.
    fallback: RwLock<Vec<T>>,
}

impl<T: Entity> Repository<T> {
    pub fn new(db: DatabaseManager, options: RepositoryOptions) -> Self {
        Self {
            db,
            options,
            fallback: RwLock::new(Vec::new()),
        }
    }

    /// The database this repository reads and writes
    pub fn db(&self) -> &DatabaseManager {
        &self.db
    }

    /// Replace the fallback cache for this repository
    pub async fn set_fallback_data(&self, data: Vec<T>) {
        *self.fallback.write().await = data;
    }

    /// Subscribe to change events for the whole table.
    ///
    /// Every call opens its own feed; overlapping subscriptions are not
    /// deduplicated. When realtime is disabled an inert subscription is
    /// returned.
    pub fn subscribe_to_changes<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent<T>) + Send + 'static,
    {
        self.subscribe_filtered(callback, None)
    }

    /// Subscribe to change events for a single record
    pub fn subscribe_to_record<F>(&self, id: &Id, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent<T>) + Send + 'static,
    {
        self.subscribe_filtered(callback, Some(id.clone()))
    }

    fn subscribe_filtered<F>(&self, callback: F, record: Option<Id>) -> Subscription
    where
        F: Fn(ChangeEvent<T>) + Send + 'static,
    {
        if !self.options.enable_realtime {
            warn!(table = T::TABLE, "realtime not enabled, returning inert subscription");
            return Subscription::disabled();
        }

        let mut receiver = self.db.changes().subscribe(T::TABLE);
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => {
                        if record.as_ref().is_some_and(|id| change.row_id != *id) {
                            continue;
                        }
                        callback(ChangeEvent::decode(&change));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(table = T::TABLE, skipped, "change feed lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription::active(handle)
    }

    fn publish(&self, kind: ChangeKind, new: Option<&T>, old: Option<&T>) {
        let Some(row_id) = new.or(old).map(|row| row.id().clone()) else {
            return;
        };
        let encode = |row: Option<&T>| row.and_then(|row| serde_json::to_value(row).ok());
        self.db.changes().publish(
            T::TABLE,
            RowChange {
                kind,
                row_id,
                new: encode(new),
                old: encode(old),
            },
        );
    }

    async fn query_all(&self, options: &QueryOptions) -> Result<Vec<T>> {
        let mut query = QueryBuilder::new("SELECT * FROM ");
        query.push(T::TABLE);

        apply_filters(&mut query, &options.filters)?;

        if let Some(order_by) = &options.order_by {
            ensure_identifier(order_by)?;
            query.push(" ORDER BY ");
            query.push(order_by.as_str());
            query.push(if options.ascending { " ASC" } else { " DESC" });
        }

        if let Some(limit) = options.limit {
            query.push(" LIMIT ");
            query.push_bind(limit);
            if let Some(page) = options.page {
                if page > 1 {
                    query.push(" OFFSET ");
                    query.push_bind((page - 1) * limit);
                }
            }
        }

        Ok(query.build_query_as::<T>().fetch_all(self.db.pool()).await?)
    }

    async fn insert_row(&self, row: Map<String, Value>) -> Result<T> {
        let mut query = QueryBuilder::new("INSERT INTO ");
        query.push(T::TABLE);
        query.push(" (");
        for (index, column) in row.keys().enumerate() {
            ensure_identifier(column)?;
            if index > 0 {
                query.push(", ");
            }
            query.push(column.as_str());
        }
        query.push(") VALUES (");
        for (index, value) in row.values().enumerate() {
            if index > 0 {
                query.push(", ");
            }
            push_bind_value(&mut query, value.clone());
        }
        query.push(") RETURNING *");

        Ok(query.build_query_as::<T>().fetch_one(self.db.pool()).await?)
    }
}

#[async_trait]
impl<T: Entity> EntityStore<T> for Repository<T> {
    #[instrument(skip_all, fields(table = T::TABLE, id = %id))]
    async fn get_by_id(&self, id: &Id) -> Result<Option<T>> {
        let mut query = QueryBuilder::new("SELECT * FROM ");
        query.push(T::TABLE);
        query.push(" WHERE id = ");
        query.push_bind(id.clone());

        match query.build_query_as::<T>().fetch_optional(self.db.pool()).await {
            Ok(row) => Ok(row),
            Err(err) => {
                if self.options.use_fallback_data {
                    let fallback = self.fallback.read().await;
                    if let Some(item) = fallback.iter().find(|item| item.id() == id) {
                        warn!(table = T::TABLE, error = %err, "read failed, serving fallback record");
                        return Ok(Some(item.clone()));
                    }
                }
                Err(err.into())
            }
        }
    }

    #[instrument(skip_all, fields(table = T::TABLE))]
    async fn get_all(&self, options: &QueryOptions) -> Result<Vec<T>> {
        match self.query_all(options).await {
            Ok(rows) => Ok(rows),
            Err(err) => {
                // Availability over consistency: a populated fallback cache
                // masks the failure entirely, so callers cannot distinguish
                // an empty table from degraded mode except via this log.
                if self.options.use_fallback_data {
                    let fallback = self.fallback.read().await;
                    if !fallback.is_empty() {
                        warn!(table = T::TABLE, error = %err, "query failed, serving fallback data");
                        return Ok(fallback.clone());
                    }
                }
                Err(err)
            }
        }
    }

    #[instrument(skip_all, fields(table = T::TABLE))]
    async fn create(&self, input: &T::Create) -> Result<T> {
        let mut row = to_column_map(input)?;
        let id = Id::generate();
        debug!(%id, "creating row");
        row.insert("id".to_owned(), Value::String(id.to_string()));

        let now = timestamp_value();
        if row.get("created_at").is_none_or(Value::is_null) {
            row.insert("created_at".to_owned(), now.clone());
        }
        row.insert("updated_at".to_owned(), now);

        let created = self.insert_row(row).await?;
        self.publish(ChangeKind::Insert, Some(&created), None);
        Ok(created)
    }

    #[instrument(skip_all, fields(table = T::TABLE, id = %id))]
    async fn update(&self, id: &Id, patch: &T::Update) -> Result<T> {
        let mut row = to_column_map(patch)?;
        row.remove("id");
        row.insert("updated_at".to_owned(), timestamp_value());

        let mut query = QueryBuilder::new("UPDATE ");
        query.push(T::TABLE);
        query.push(" SET ");
        for (index, (column, value)) in row.iter().enumerate() {
            ensure_identifier(column)?;
            if index > 0 {
                query.push(", ");
            }
            query.push(column.as_str());
            query.push(" = ");
            push_bind_value(&mut query, value.clone());
        }
        query.push(" WHERE id = ");
        query.push_bind(id.clone());
        query.push(" RETURNING *");

        match query.build_query_as::<T>().fetch_optional(self.db.pool()).await? {
            Some(updated) => {
                self.publish(ChangeKind::Update, Some(&updated), None);
                Ok(updated)
            }
            None => Err(AppError::not_found(T::TABLE, id)),
        }
    }

    #[instrument(skip_all, fields(table = T::TABLE, id = %id))]
    async fn delete(&self, id: &Id) -> Result<bool> {
        let mut query = QueryBuilder::new("DELETE FROM ");
        query.push(T::TABLE);
        query.push(" WHERE id = ");
        query.push_bind(id.clone());
        query.push(" RETURNING *");

        match query.build_query_as::<T>().fetch_optional(self.db.pool()).await? {
            Some(old) => {
                self.publish(ChangeKind::Delete, None, Some(&old));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip_all, fields(table = T::TABLE))]
    async fn count(&self, filters: &FilterMap) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM ");
        query.push(T::TABLE);
        apply_filters(&mut query, filters)?;
        Ok(query
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?)
    }

    #[instrument(skip_all, fields(table = T::TABLE))]
    async fn get_by_ids(&self, ids: &[Id]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::new("SELECT * FROM ");
        query.push(T::TABLE);
        query.push(" WHERE id IN (");
        for (index, id) in ids.iter().enumerate() {
            if index > 0 {
                query.push(", ");
            }
            query.push_bind(id.clone());
        }
        query.push(")");

        Ok(query.build_query_as::<T>().fetch_all(self.db.pool()).await?)
    }
}

/// Serialize a payload into a column/value map
fn to_column_map(payload: &impl Serialize) -> Result<Map<String, Value>> {
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::internal(format!(
            "payload must serialize to an object, got {other}"
        ))),
    }
}

/// Current timestamp as a fixed-width RFC 3339 string. Nanosecond
/// precision keeps lexicographic and chronological order aligned.
fn timestamp_value() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Bind a JSON value as the matching SQL parameter type
fn push_bind_value(query: &mut QueryBuilder<'_, Sqlite>, value: Value) {
    match value {
        Value::Null => {
            query.push_bind(Option::<String>::None);
        }
        Value::Bool(value) => {
            query.push_bind(value);
        }
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                query.push_bind(int);
            } else {
                query.push_bind(number.as_f64().unwrap_or(0.0));
            }
        }
        Value::String(value) => {
            query.push_bind(value);
        }
        // Arrays and objects are stored as JSON text
        other => {
            query.push_bind(other);
        }
    }
}
