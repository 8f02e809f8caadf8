//! Storage backend: connection pooling, migrations, and the change-feed
//! hub that stands in for the hosted backend's realtime subsystem.

pub mod changefeed;
pub mod db;

pub use changefeed::{ChangeEvent, ChangeFeedHub, ChangeKind, Subscription};
pub use db::DatabaseManager;
