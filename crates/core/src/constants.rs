//! Constants used throughout the roster core crate.

/// Permission codename required by every patient-list endpoint.
pub const VIEW_PATIENT_LIST_PERMISSION: &str = "patient_plugin.can_view_patient_list";

/// Allowed values for the `per_page` request parameter.
pub const PER_PAGE_CHOICES: [usize; 6] = [5, 10, 20, 50, 100, 200];

/// Page size used when `per_page` is missing, unparseable or not in [`PER_PAGE_CHOICES`].
pub const DEFAULT_PER_PAGE: usize = 20;

/// Fixed page size of the compact patient table.
pub const COMPACT_PER_PAGE: usize = 50;

/// Display value for cells whose underlying relation or value is absent.
pub const EMPTY_PLACEHOLDER: &str = "-";

/// Date format for table date columns (`m/d/Y`).
pub const TABLE_DATE_FORMAT: &str = "%m/%d/%Y";

/// Default database file when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "roster.db";

/// Default mount prefix of the plugin routes inside the host application.
pub const DEFAULT_PLUGIN_PREFIX: &str = "/plugins/patient_plugin";

/// Base filename of exported tables (`table.csv`, `table.xlsx`, `table.json`).
pub const EXPORT_NAME: &str = "table";

/// Title of the main patient list.
pub const PATIENT_LIST_TITLE: &str = "Patients List";
