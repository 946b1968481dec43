use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonryError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Precondition violated for {field}: {message}")]
    PreconditionViolation { field: String, message: String },

    #[error("Already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },
}

pub type Result<T> = std::result::Result<T, CanonryError>;
pub type CanonryResult<T> = std::result::Result<T, CanonryError>;
