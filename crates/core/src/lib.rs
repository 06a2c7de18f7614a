//! # Roster Core
//!
//! Core logic for the organisation-scoped patient roster.
//!
//! This crate contains the data layer and the list semantics:
//! - SQLite store and schema (`store`), seed helpers (`seed`)
//! - Permission gate and request users (`auth`)
//! - Filters, query planning, tables, pagination and export
//! - The list, compact list and stats views (`views`, `stats`)
//!
//! **No transport concerns**: HTTP routing, header parsing and response encoding belong in
//! `api-rest`; wire types live in `api-shared`.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod filter;
pub mod models;
pub mod pagination;
pub mod query;
pub mod seed;
pub mod stats;
pub mod store;
pub mod table;
pub mod tags;
pub mod views;

pub use api_shared::dto;
pub use rusqlite::Connection;

pub use auth::{authorize, user_by_api_key, Access, User};
pub use config::CoreConfig;
pub use error::{RosterError, RosterResult};
pub use export::{ExportFile, ExportFormat};
pub use filter::PatientFilterParams;
pub use models::PatientRecord;
pub use stats::{compute_stats, patient_stats};
pub use store::Store;
pub use tags::user_in_care_team;
pub use views::{compact_patient_list, patient_list, ListRequest, ListResponse};
