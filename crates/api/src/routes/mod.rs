//! HTTP route handlers.

pub mod cnaes;
pub mod companies;
pub mod exports;
pub mod filters;
pub mod health;
