//! Persistence layer for the Ferriqa webhook delivery pipeline.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations (subscription registry, delivery history store)

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
