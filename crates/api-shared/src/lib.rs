//! # API Shared
//!
//! Shared definitions for the roster's outer surfaces.
//!
//! Contains:
//! - Wire DTOs (`dto` module) with OpenAPI schemas
//! - The shared `HealthService`
//! - API-key header handling (usable by both the REST server and the CLI)
//!
//! Used by `roster-core`, `api-rest` and `roster-cli`.

pub mod auth;
pub mod dto;
pub mod health;

pub use health::HealthService;
