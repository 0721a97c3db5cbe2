use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontdeskError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Export blocked: {0} validation failure(s); no output written")]
    ExportBlocked(usize),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FrontdeskError>;
