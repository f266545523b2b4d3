use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuickKeysError {
    #[error("target text is empty")]
    EmptyText,

    #[error("text must be at least {min} characters long (got {actual})")]
    TextTooShort { min: usize, actual: usize },

    #[error("text must be less than {max} characters (got {actual})")]
    TextTooLong { max: usize, actual: usize },

    #[error("timer must be between {min} and {max} seconds (got {seconds})")]
    DurationOutOfRange { seconds: u32, min: u32, max: u32 },

    #[error("invalid setting {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("session has already been started")]
    AlreadyStarted,

    #[error("no active session")]
    NoActiveSession,

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database Error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
}

pub type QkResult<T> = Result<T, QuickKeysError>;
