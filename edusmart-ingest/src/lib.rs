//! Catalog loading for the EduSmart assistant: creates the Postgres schema and
//! seeds `education_products` with embedded product documents.

pub mod catalog;
pub mod schema;
pub mod seed;

pub use catalog::{load_catalog, parse_catalog};
pub use schema::init_schema;
pub use seed::{seed_products, SeedReport};
