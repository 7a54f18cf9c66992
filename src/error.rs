use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid dimensions '{0}', expected WxH with non-zero integers")]
    InvalidDimensions(String),

    #[error("invalid piece '{0}', expected WxH:qty")]
    InvalidPiece(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
