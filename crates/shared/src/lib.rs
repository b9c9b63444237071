//! Shared utilities and common types for the prospecting export backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Bearer token verification (tokens are issued by the external auth layer)
//! - Page/offset pagination math
//! - Field validators for registry identifiers

pub mod jwt;
pub mod pagination;
pub mod validation;
