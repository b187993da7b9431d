use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("database handle missing")]
    MissingDatabase,

    #[error("invalid source configuration: {0}")]
    InvalidConfiguration(String),

    #[error("migration unit not found: {0}")]
    UnitNotFound(String),

    #[error("field not found on tracking model: {0}")]
    FieldNotFound(String),

    #[error("at least one field is required to create the tracking table")]
    FieldsRequired,

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the "unit not found" kind, regardless of the identifier.
    pub fn is_unit_not_found(&self) -> bool {
        matches!(self, Error::UnitNotFound(_))
    }
}
