use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("backend request failed ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{}", sqlite_error_string(.0))]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<printpdf::Error> for Error {
    fn from(err: printpdf::Error) -> Self {
        Error::Pdf(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

fn sqlite_error_string(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(code, msg) => {
            let message = msg.clone().unwrap_or_default();
            format!(
                "sqlite(code={:?}, extended_code={}, msg={})",
                code.code, code.extended_code, message
            )
        }
        other => other.to_string(),
    }
}

/// Unique-constraint violations surface as [`Error::Conflict`] so callers can
/// retry number generation the same way for every backend.
pub(crate) fn classify_sqlite(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(sqlite_error_string(&err))
        }
        _ => Error::Sqlite(err),
    }
}

impl From<Error> for String {
    fn from(err: Error) -> String {
        err.to_string()
    }
}
