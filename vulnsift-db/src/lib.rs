//! Read-optimized query surface over the local vulnerability database.
//!
//! The database is a single SQLite file opened once per scan. Read-only
//! opens validate the schema model and create the query indices on first
//! use; writable opens (database builders) drop the non-essential indices
//! again on close to keep the distributed artifact small.

mod error;
mod filter;
mod schema;
mod store;

pub use error::DbError;
pub use filter::{only_qualified_packages, only_vulnerable_versions};
pub use schema::MODEL_VERSION;
pub use store::VulnStore;
