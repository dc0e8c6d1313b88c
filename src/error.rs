use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AtlasError {
    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to open spreadsheet {path}: {message}")]
    SheetOpen { path: Utf8PathBuf, message: String },

    #[error("spreadsheet {0} has no worksheet")]
    EmptyWorkbook(Utf8PathBuf),

    #[error("unsupported table format: {0}")]
    UnsupportedFormat(Utf8PathBuf),

    #[error("missing required column `{column}` in {table}")]
    #[diagnostic(help("the input table must carry every required column in its header row"))]
    MissingColumn { table: String, column: String },

    #[error("row {row}, column `{column}`: cannot read {value:?} as a number")]
    CellType {
        row: usize,
        column: String,
        value: String,
    },

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    #[error("boundary request failed: {0}")]
    BoundaryHttp(String),

    #[error("boundary server returned status {status}: {message}")]
    BoundaryStatus { status: u16, message: String },

    #[error("boundary document is not valid JSON: {0}")]
    BoundaryParse(String),

    #[error("boundary document for {0} has no `features` list")]
    MissingFeatures(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to serialize {0}")]
    Serialize(String),
}
