use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} '{name}' is still being created")]
    NotYetCreated { kind: &'static str, name: String },

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Lane not found: {0}")]
    LaneNotFound(String),

    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Backend task panicked: {0}")]
    TaskPanicked(String),

    #[error("No async runtime: {0}")]
    NoRuntime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
