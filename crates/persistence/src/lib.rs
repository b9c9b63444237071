//! Persistence layer for the prospecting export service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits
//! - SQL migrations

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
