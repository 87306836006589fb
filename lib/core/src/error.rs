use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

const OBJECT_ARRAY_HINT: &str =
    " Hint: field inside an array of objects must be an array type as well.";

fn hint_suffix(object_array_hint: &bool) -> &'static str {
    if *object_array_hint {
        OBJECT_ARRAY_HINT
    } else {
        ""
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed field declaration or schema change
    #[error("{0}")]
    InvalidDeclaration(String),

    /// Raised by the embedding model validator, passed through untouched
    #[error("{message}")]
    InvalidEmbeddingConfig { code: u16, message: String },

    #[error("Field `{0}` not found.")]
    FieldNotFound(String),

    #[error("Field `{field}` has an incorrect type.{}", hint_suffix(.object_array_hint))]
    TypeMismatch {
        field: String,
        object_array_hint: bool,
    },

    #[error("{0}")]
    InvalidDocument(String),

    #[error("Field `{field}` exceeds the maximum nesting depth of {max_depth}.")]
    NestingTooDeep { field: String, max_depth: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidDeclaration(msg.into())
    }

    /// HTTP-style status code the caller should surface for this error.
    pub fn code(&self) -> u16 {
        match self {
            Error::InvalidDeclaration(_) => 400,
            Error::InvalidEmbeddingConfig { code, .. } => *code,
            Error::FieldNotFound(_) => 404,
            Error::TypeMismatch { .. } => 400,
            Error::InvalidDocument(_) => 400,
            Error::NestingTooDeep { .. } => 400,
            Error::Io(_) => 500,
            Error::Json(_) => 400,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FieldNotFound(_))
    }
}
