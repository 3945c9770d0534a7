/// Database module for crud-demo
///
/// Maps record shapes onto SQLite tables and runs CRUD statements through
/// sqlx. Implements connection pooling for performance.

pub mod connection;
pub mod crud;
pub mod entity;
pub mod mapping;
pub mod models;
pub mod schema;
pub mod selector;
pub mod value;

pub use connection::{Database, DatabaseStats};
pub use entity::{Entity, Patch};
pub use mapping::{FieldDef, FieldRole, ModelShape, NameMapper, SqlType, TableMapping};
pub use models::*;
pub use schema::SyncReport;
pub use selector::{AllRows, Filter, Selector};
pub use value::{Field, Value};
