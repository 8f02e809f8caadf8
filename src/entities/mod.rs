//! Persisted entity types and their create/update payloads.
//!
//! Each entity maps one-to-one onto a backend table. Create and update
//! payloads are explicit structs enumerating exactly the mutable fields;
//! update fields are optional and skipped when unset, so an update writes
//! only what the caller touched.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

pub mod formulation_ingredients;
pub mod formulation_versions;
pub mod formulations;
pub mod ingredients;

pub use formulation_ingredients::*;
pub use formulation_versions::*;
pub use formulations::*;
pub use ingredients::*;

/// Opaque entity identifier, assigned by the data layer on insert.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct Id(String);

impl Id {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Trait tying an entity type to its backend table and payload types.
///
/// Implementors are plain row structs; the generic repository uses the
/// associated types to drive inserts and partial updates.
pub trait Entity:
    Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + for<'r> sqlx::FromRow<'r, SqliteRow>
    + Send
    + Sync
    + Unpin
    + 'static
{
    /// Backend table name (fixed by the external schema)
    const TABLE: &'static str;

    /// Insert payload
    type Create: Serialize + fmt::Debug + Send + Sync;

    /// Partial-update payload
    type Update: Serialize + fmt::Debug + Send + Sync;

    /// The entity's identifier
    fn id(&self) -> &Id;
}
