//! tabwrite Routing
//!
//! Everything needed to decide where a row goes and how it is keyed:
//! table references, schemas, destination and schema resolvers, insert ids
//! and shard keys.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tabwrite_routing::{DestinationResolver, DestinationRouter};
//!
//! let router = DestinationRouter::new(
//!     DestinationResolver::by_field("table"),
//!     Some("acme".to_string()),
//! );
//! let table = router.route(&json!({"table": "analytics.clicks"})).unwrap();
//! assert_eq!(table.canonical(), "acme:analytics.clicks");
//! ```

mod error;
mod insert_id;
mod resolver;
mod schema;
mod shard;
mod table;


pub use error::{Result, RoutingError};
pub use insert_id::{InsertId, InsertIdGenerator, TaggedRow};
pub use resolver::{
    DestinationResolver, DestinationRouter, RecordFn, SchemaFn, SchemaResolver, SideInputFn,
    SideInputs,
};
pub use schema::{TableField, TableSchema};
pub use shard::{FixedSharder, ShardedKey};
pub use table::TableRef;

/// A record to be written: a JSON object mapping column names to values
pub type Row = serde_json::Value;
