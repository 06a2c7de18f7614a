#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not a valid roster database: {0}")]
    InvalidDatabase(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("database connection lock was poisoned")]
    StoreLockPoisoned,
    #[error("failed to write CSV export: {0}")]
    CsvExport(csv::Error),
    #[error("failed to finish CSV export: {0}")]
    CsvFlush(String),
    #[error("failed to write spreadsheet export: {0}")]
    XlsxExport(rust_xlsxwriter::XlsxError),
    #[error("failed to serialize JSON export: {0}")]
    JsonExport(serde_json::Error),
}

pub type RosterResult<T> = std::result::Result<T, RosterError>;
