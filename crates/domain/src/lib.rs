//! Domain layer for the prospecting export backend.
//!
//! This crate contains:
//! - Domain models (Company, ExportJob, IntegrationLogEntry, SavedFilter)
//! - The typed company predicate and its compiler
//! - Store and destination client traits, with in-memory and mock implementations
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;
pub mod store;
