//! Table definitions: column descriptors, sorting and row rendering.
//!
//! A [`Table`] is a list of [`Column`]s. Each column knows how to read its display value from a
//! [`PatientRecord`], which SQL expressions order it (none means not orderable) and whether it
//! takes part in exports. The same descriptors drive the paginated list, the `sort` parameter
//! and the export schema.

use crate::auth::User;
use crate::constants::{COMPACT_PER_PAGE, EMPTY_PLACEHOLDER, TABLE_DATE_FORMAT};
use crate::models::PatientRecord;
use crate::query::{OrderTerm, PRIMARY_PROVIDER_SQL};
use crate::tags::user_in_care_team;
use api_shared::dto;
use chrono::NaiveDate;

/// Per-request values available to template cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct CellContext<'a> {
    pub user: Option<&'a User>,
}

pub enum ColumnKind {
    /// Field read or accessor chain; `None` renders the placeholder.
    Value(fn(&PatientRecord) -> Option<String>),
    /// Date rendered as `m/d/Y`; `None` renders the placeholder.
    Date(fn(&PatientRecord) -> Option<NaiveDate>),
    Boolean {
        read: fn(&PatientRecord) -> bool,
        yes: &'static str,
        no: &'static str,
    },
    /// Cell delegated to a presentation template. `render` produces the plain-text value.
    Template {
        template: &'static str,
        render: fn(&PatientRecord, &CellContext<'_>) -> String,
    },
}

pub struct Column {
    pub name: &'static str,
    pub header: &'static str,
    pub kind: ColumnKind,
    pub order_by: &'static [&'static str],
    pub exportable: bool,
}

impl Column {
    pub fn orderable(&self) -> bool {
        !self.order_by.is_empty()
    }

    pub fn template(&self) -> Option<&'static str> {
        match self.kind {
            ColumnKind::Template { template, .. } => Some(template),
            _ => None,
        }
    }

    pub fn render(&self, record: &PatientRecord, ctx: &CellContext<'_>) -> String {
        match &self.kind {
            ColumnKind::Value(read) => or_placeholder(read(record)),
            ColumnKind::Date(read) => or_placeholder(
                read(record).map(|d| d.format(TABLE_DATE_FORMAT).to_string()),
            ),
            ColumnKind::Boolean { read, yes, no } => {
                let shown = if read(record) { yes } else { no };
                shown.to_string()
            }
            ColumnKind::Template { render, .. } => render(record, ctx),
        }
    }
}

fn or_placeholder(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| EMPTY_PLACEHOLDER.to_string())
}

/// One resolved `sort` token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

pub struct Table {
    pub name: &'static str,
    pub columns: Vec<Column>,
    default_order: &'static [&'static str],
    fixed_per_page: Option<usize>,
}

impl Table {
    /// Main patient table.
    pub fn patient_table() -> Self {
        Self {
            name: "patients",
            columns: vec![
                Column {
                    name: "actions",
                    header: "Actions",
                    kind: ColumnKind::Template {
                        template: "patient_plugin/columns/actions_column_enhanced.html",
                        render: render_actions,
                    },
                    order_by: &[],
                    exportable: false,
                },
                Column {
                    name: "mrn",
                    header: "MRN",
                    kind: ColumnKind::Value(|p| p.mrn.clone()),
                    order_by: &["p.mrn"],
                    exportable: true,
                },
                Column {
                    name: "first_name",
                    header: "First Name",
                    kind: ColumnKind::Template {
                        template: "patient_plugin/columns/first_name_column.html",
                        render: |p, _| or_placeholder(Some(p.first_name.clone())),
                    },
                    order_by: &["p.first_name"],
                    exportable: true,
                },
                Column {
                    name: "middle_name",
                    header: "Middle Name",
                    kind: ColumnKind::Template {
                        template: "patient_plugin/columns/middle_name_column.html",
                        render: |p, _| or_placeholder(p.middle_name.clone()),
                    },
                    order_by: &["p.middle_name"],
                    exportable: true,
                },
                Column {
                    name: "last_name",
                    header: "Last Name",
                    kind: ColumnKind::Template {
                        template: "patient_plugin/columns/name_column.html",
                        render: |p, _| or_placeholder(Some(p.last_name.clone())),
                    },
                    order_by: &["p.last_name"],
                    exportable: true,
                },
                Column {
                    name: "gender",
                    header: "Gender",
                    kind: ColumnKind::Value(|p| p.gender_display()),
                    order_by: &["p.gender"],
                    exportable: true,
                },
                Column {
                    name: "eligible_insurance",
                    header: "Eligible Insurance",
                    kind: ColumnKind::Value(|p| p.primary_insurance().map(|i| i.provider.clone())),
                    order_by: &[PRIMARY_PROVIDER_SQL],
                    exportable: true,
                },
                Column {
                    name: "evv_ready",
                    header: "EVV Ready",
                    kind: ColumnKind::Template {
                        template: "patient_plugin/columns/evv_ready_column.html",
                        render: |p, _| {
                            let shown = if p.is_evv_ready { "Ready" } else { "Not Ready" };
                            shown.to_string()
                        },
                    },
                    order_by: &["p.is_evv_ready"],
                    exportable: true,
                },
                Column {
                    name: "patient_category",
                    header: "Category",
                    kind: ColumnKind::Value(|p| p.category.as_ref().map(|c| c.name.clone())),
                    order_by: &["c.name"],
                    exportable: true,
                },
                Column {
                    name: "program",
                    header: "Program",
                    kind: ColumnKind::Template {
                        template: "patient_plugin/columns/program_column.html",
                        render: |p, _| or_placeholder(p.program_display()),
                    },
                    order_by: &["p.program"],
                    exportable: true,
                },
                Column {
                    name: "admission_date",
                    header: "Admission Date",
                    kind: ColumnKind::Date(|p| p.latest_date_of_admission),
                    order_by: &["latest_date_of_admission"],
                    exportable: true,
                },
            ],
            default_order: &["p.last_name", "p.first_name"],
            fixed_per_page: None,
        }
    }

    /// Four-column table for condensed displays, fixed at [`COMPACT_PER_PAGE`] rows.
    pub fn compact_patient_table() -> Self {
        Self {
            name: "compact_patients",
            columns: vec![
                Column {
                    name: "name",
                    header: "Name",
                    kind: ColumnKind::Value(|p| Some(p.full_name())),
                    order_by: &["p.first_name", "p.last_name"],
                    exportable: true,
                },
                Column {
                    name: "mrn",
                    header: "MRN",
                    kind: ColumnKind::Value(|p| p.mrn.clone()),
                    order_by: &["p.mrn"],
                    exportable: true,
                },
                Column {
                    name: "birth_date",
                    header: "DOB",
                    kind: ColumnKind::Date(|p| p.birth_date),
                    order_by: &["p.birth_date"],
                    exportable: true,
                },
                Column {
                    name: "is_active",
                    header: "Active",
                    kind: ColumnKind::Boolean {
                        read: |p| p.is_active,
                        yes: "✓",
                        no: "✗",
                    },
                    order_by: &["p.is_active"],
                    exportable: true,
                },
            ],
            default_order: &["p.last_name", "p.first_name"],
            fixed_per_page: Some(COMPACT_PER_PAGE),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Page size fixed by the table definition, if any.
    pub fn fixed_per_page(&self) -> Option<usize> {
        self.fixed_per_page
    }

    /// Parses `sort` (`col`, `-col`, comma-separated). Unknown, non-orderable and repeated
    /// columns are ignored.
    pub fn parse_sort(&self, raw: Option<&str>) -> Vec<SortKey> {
        let mut keys: Vec<SortKey> = Vec::new();
        for token in raw.unwrap_or_default().split(',') {
            let token = token.trim();
            let (name, descending) = match token.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (token, false),
            };
            let Some(column) = self.column(name).filter(|c| c.orderable()) else {
                continue;
            };
            if keys.iter().any(|k| k.column == column.name) {
                continue;
            }
            keys.push(SortKey {
                column: column.name,
                descending,
            });
        }
        keys
    }

    /// `ORDER BY` terms for `sort`, or the table's default ordering when `sort` is empty.
    pub fn order_terms(&self, sort: &[SortKey]) -> Vec<OrderTerm> {
        if sort.is_empty() {
            return self
                .default_order
                .iter()
                .map(|expr| OrderTerm {
                    expr: *expr,
                    descending: false,
                })
                .collect();
        }

        sort.iter()
            .filter_map(|key| self.column(key.column).map(|c| (c, key.descending)))
            .flat_map(|(column, descending)| {
                column
                    .order_by
                    .iter()
                    .map(move |expr| OrderTerm {
                        expr: *expr,
                        descending,
                    })
            })
            .collect()
    }

    pub fn headers(&self, sort: &[SortKey]) -> Vec<dto::ColumnHeader> {
        self.columns
            .iter()
            .map(|c| dto::ColumnHeader {
                name: c.name.to_string(),
                header: c.header.to_string(),
                orderable: c.orderable(),
                template: c.template().map(str::to_string),
                sorted: sort
                    .iter()
                    .find(|k| k.column == c.name)
                    .map(|k| if k.descending { "desc" } else { "asc" }.to_string()),
            })
            .collect()
    }

    pub fn render_row(&self, record: &PatientRecord, ctx: &CellContext<'_>) -> dto::PatientRow {
        dto::PatientRow {
            id: record.id,
            cells: self.columns.iter().map(|c| c.render(record, ctx)).collect(),
            latest_referral_note: record.latest_referral_note.clone(),
            in_care_team: user_in_care_team(record, ctx.user),
        }
    }

    pub fn export_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.exportable)
    }
}

/// Row actions: every viewer may open the record; care-team members may also edit it.
fn render_actions(record: &PatientRecord, ctx: &CellContext<'_>) -> String {
    if user_in_care_team(record, ctx.user) {
        "view,edit".to_string()
    } else {
        "view".to_string()
    }
}
