//! Wire types for the patient roster.
//!
//! These are the JSON bodies returned by the REST API and printed by the CLI. They carry the same
//! context a rendered list page would: column headers, rendered rows, pagination state, the filter
//! form (echoed values and per-field errors) and the available export formats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// One table column as presented to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnHeader {
    /// Column key, also the value accepted by `sort`.
    pub name: String,
    /// Verbose header.
    pub header: String,
    pub orderable: bool,
    /// Presentation template for template-delegated cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// `asc` or `desc` when the current ordering uses this column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorted: Option<String>,
}

/// A rendered table row. `cells` follows the order of the column headers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientRow {
    pub id: i64,
    pub cells: Vec<String>,
    pub latest_referral_note: Option<String>,
    /// Whether the requesting user is on this patient's care team.
    pub in_care_team: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageInfo {
    /// 1-based.
    pub number: usize,
    pub per_page: usize,
    pub num_pages: usize,
    pub total_count: usize,
    pub has_next: bool,
    pub has_previous: bool,
    /// Page sizes a client may request via `per_page`.
    pub per_page_choices: Vec<usize>,
}

/// Filter form state: the non-blank values supplied and, when the form is invalid, the error
/// message for each offending field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FilterState {
    pub values: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientListRes {
    pub title: String,
    pub columns: Vec<ColumnHeader>,
    pub patients: Vec<PatientRow>,
    pub page: PageInfo,
    pub filter: FilterState,
    /// Values accepted by `_export`; empty when the view does not export.
    pub export_formats: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub with_care_team: u64,
    /// Count per declared gender code, zero counts included.
    pub by_gender: BTreeMap<String, u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PatientStatsRes {
    pub stats: PatientStats,
}
