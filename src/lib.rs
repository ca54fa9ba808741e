//! Better Contacts API Library
//!
//! Contact storage plus the enrichment scoring layer: per-contact completeness
//! scores, priority ranking, human-readable reasons, missing-field suggestions
//! and the per-user enrichment queue.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `auth`: Account extraction from request headers.
//! - `cache_validator`: Cache validation utilities.
//! - `clock`: Injectable time source.
//! - `config`: Configuration management.
//! - `db`: Database connection, pool management and migrations.
//! - `db_storage`: Contact and tag persistence.
//! - `enrichment`: Score, priority, reason and suggestion calculations.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `import`: Import-merge rules.
//! - `models`: Core data models.
//! - `openapi`: Generated OpenAPI document and Swagger UI.
//! - `queue`: Enrichment queue ordering and stats.
//! - `queue_cache`: Per-user memo of queue candidates.
//! - `routes`: Router assembly.
//! - `validation`: Input normalization (email, phone, URLs, tags).

pub mod api;
pub mod core;
pub mod data;

// Re-export primary modules for shared use in tests and other binaries
pub mod auth;
pub mod cache_validator;
pub mod clock;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod import;
pub mod models;
pub mod openapi;
pub mod queue;
pub mod queue_cache;
pub mod routes;
pub mod validation;
