use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Event `type` is missing or is not a string")]
    MissingType,

    #[error("Unknown event type `{0}`")]
    UnknownType(String),

    #[error("Event `data` is missing or is not an object")]
    MissingData,

    #[error("Event property `{0}` is missing or malformed")]
    InvalidProperty(&'static str),
}
