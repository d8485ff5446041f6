use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateForgeError {
    #[error("Invalid persistence type: {0}")]
    InvalidPersistenceKind(String),

    #[error("Method {method} not found in store {store}")]
    MethodNotFound { store: String, method: String },

    #[error("Invalid store class: {0}")]
    StoreClassInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, StateForgeError>;
