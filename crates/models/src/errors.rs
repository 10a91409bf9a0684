use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown photo slot: {0}")]
    UnknownSlot(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
}
