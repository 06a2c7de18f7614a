//! List views: the permission gate, organisation scoping, filtering, sorting, pagination and
//! export, composed into one call per endpoint.
//!
//! The views take a borrowed connection and the already-resolved request user. They do no I/O
//! beyond reading the database and never write.

use crate::auth::{authorize, Access, User};
use crate::constants::{PATIENT_LIST_TITLE, PER_PAGE_CHOICES, VIEW_PATIENT_LIST_PERMISSION};
use crate::export::{export_table, ExportFile, ExportFormat};
use crate::filter::{CompactPatientFilter, FilterErrors, FilterSet, PatientFilter, PatientFilterParams};
use crate::pagination::{per_page_from_param, Page};
use crate::query::PatientQuery;
use crate::table::{CellContext, Table};
use crate::RosterResult;
use api_shared::dto;
use rusqlite::Connection;
use serde::Deserialize;

/// Query-string parameters of a list request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListRequest {
    #[serde(flatten)]
    pub filter: PatientFilterParams,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
    #[serde(rename = "_export")]
    pub export: Option<String>,
}

#[derive(Debug)]
pub enum ListResponse {
    Page(dto::PatientListRes),
    Export(ExportFile),
}

/// Main patient list.
///
/// Shows active, intake-complete patients of the user's organisation. With a recognised
/// `_export` value the whole filtered and sorted collection is returned as a file instead of a
/// page.
pub fn patient_list(
    conn: &Connection,
    user: Option<&User>,
    request: &ListRequest,
) -> RosterResult<Access<ListResponse>> {
    let Access::Granted(user) = authorize(user, VIEW_PATIENT_LIST_PERMISSION) else {
        return Ok(Access::Denied);
    };

    let mut query = PatientQuery::for_organization(user.organization_id)
        .active_intake_complete()
        .annotate_latest()
        .prefetch_care_team()
        .prefetch_primary_insurance();

    let bound = PatientFilter::bind(&request.filter, conn)?;
    let table = Table::patient_table();
    let ctx = CellContext { user: Some(user) };

    let export = ExportFormat::from_param(request.export.as_deref());

    let filter = match bound {
        Ok(filter) => filter,
        Err(errors) => {
            tracing::debug!(fields = ?errors.0.keys().collect::<Vec<_>>(), "invalid patient filter");
            let response = match export {
                Some(format) => ListResponse::Export(export_table(&table, &[], &ctx, format)?),
                None => ListResponse::Page(invalid_filter_page(
                    &table,
                    request,
                    per_page_from_param(request.per_page.as_deref()),
                    errors,
                    true,
                )),
            };
            return Ok(Access::Granted(response));
        }
    };
    filter.apply(&mut query);

    let sort = table.parse_sort(request.sort.as_deref());
    query.order_by(table.order_terms(&sort));

    if let Some(format) = export {
        let records = query.fetch(conn, None)?;
        tracing::info!(user = %user.username, format = format.extension(), rows = records.len(), "patient list export");
        return Ok(Access::Granted(ListResponse::Export(export_table(
            &table, &records, &ctx, format,
        )?)));
    }

    let per_page = per_page_from_param(request.per_page.as_deref());
    let total = query.count(conn)?;
    let page = Page::resolve(total, per_page, request.page.as_deref());
    let records = query.fetch(conn, Some(page.window()))?;

    Ok(Access::Granted(ListResponse::Page(dto::PatientListRes {
        title: PATIENT_LIST_TITLE.to_string(),
        columns: table.headers(&sort),
        patients: records.iter().map(|r| table.render_row(r, &ctx)).collect(),
        page: page_info(&page),
        filter: dto::FilterState {
            values: request.filter.supplied(),
            errors: Default::default(),
        },
        export_formats: export_formats(),
    })))
}

/// Condensed list: organisation scope only, name and active filters, fixed page size, no export.
pub fn compact_patient_list(
    conn: &Connection,
    user: Option<&User>,
    request: &ListRequest,
) -> RosterResult<Access<dto::PatientListRes>> {
    let Access::Granted(user) = authorize(user, VIEW_PATIENT_LIST_PERMISSION) else {
        return Ok(Access::Denied);
    };

    let table = Table::compact_patient_table();
    let per_page = table
        .fixed_per_page()
        .unwrap_or_else(|| per_page_from_param(request.per_page.as_deref()));

    let filter = match CompactPatientFilter::bind(&request.filter) {
        Ok(filter) => filter,
        Err(errors) => {
            return Ok(Access::Granted(invalid_filter_page(
                &table, request, per_page, errors, false,
            )))
        }
    };

    let mut query = PatientQuery::for_organization(user.organization_id);
    filter.apply(&mut query);
    let sort = table.parse_sort(request.sort.as_deref());
    query.order_by(table.order_terms(&sort));

    let total = query.count(conn)?;
    let page = Page::resolve(total, per_page, request.page.as_deref());
    let records = query.fetch(conn, Some(page.window()))?;
    let ctx = CellContext { user: Some(user) };

    Ok(Access::Granted(dto::PatientListRes {
        title: PATIENT_LIST_TITLE.to_string(),
        columns: table.headers(&sort),
        patients: records.iter().map(|r| table.render_row(r, &ctx)).collect(),
        page: page_info(&page),
        filter: dto::FilterState {
            values: compact_values(&request.filter),
            errors: Default::default(),
        },
        export_formats: Vec::new(),
    }))
}

/// Empty page carrying the filter errors.
fn invalid_filter_page(
    table: &Table,
    request: &ListRequest,
    per_page: usize,
    errors: FilterErrors,
    exports: bool,
) -> dto::PatientListRes {
    let sort = table.parse_sort(request.sort.as_deref());
    let page = Page::resolve(0, per_page, None);
    let values = if exports {
        request.filter.supplied()
    } else {
        compact_values(&request.filter)
    };
    dto::PatientListRes {
        title: PATIENT_LIST_TITLE.to_string(),
        columns: table.headers(&sort),
        patients: Vec::new(),
        page: page_info(&page),
        filter: dto::FilterState {
            values,
            errors: errors.0,
        },
        export_formats: if exports { export_formats() } else { Vec::new() },
    }
}

fn compact_values(params: &PatientFilterParams) -> std::collections::BTreeMap<String, String> {
    params
        .supplied()
        .into_iter()
        .filter(|(k, _)| k == "name" || k == "is_active")
        .collect()
}

fn page_info(page: &Page) -> dto::PageInfo {
    dto::PageInfo {
        number: page.number,
        per_page: page.per_page,
        num_pages: page.num_pages,
        total_count: page.total_count,
        has_next: page.has_next(),
        has_previous: page.has_previous(),
        per_page_choices: PER_PAGE_CHOICES.to_vec(),
    }
}

fn export_formats() -> Vec<String> {
    ExportFormat::ALL
        .iter()
        .map(|f| f.extension().to_string())
        .collect()
}
