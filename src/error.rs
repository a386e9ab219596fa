use thiserror::Error;

#[derive(Error, Debug)]
/// Mapping error
pub enum XmlError {
    /// The schema of a type cannot be turned into a serializer.
    #[error("Configuration of {type_name}: {message}")]
    Configuration { type_name: String, message: String },

    /// A value met at write (or read) time has no registered mapping.
    #[error("Runtime type mismatch: {0}")]
    RuntimeTypeMismatch(String),

    /// A serializer plugin or a host object could not be constructed.
    #[error("Construction of {type_name}: {message}")]
    Construction { type_name: String, message: String },

    /// A text node could not be converted into the expected type.
    #[error("Cannot convert `{text}` into {type_name}: {message}")]
    Conversion {
        text: String,
        type_name: String,
        message: String,
    },

    #[error("XmlReader from: {0}")]
    Read(String),

    #[error("XmlWriter from: {0}")]
    Write(String),

    #[error("Options from: {0}")]
    Options(#[from] serde_json::Error),

    #[error("I/O from: {0}")]
    Io(#[from] std::io::Error),
}

impl XmlError {
    pub fn configuration<T: Into<String>, M: Into<String>>(type_name: T, message: M) -> Self {
        XmlError::Configuration {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn construction<T: Into<String>, M: Into<String>>(type_name: T, message: M) -> Self {
        XmlError::Construction {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn conversion<S, T, M>(text: S, type_name: T, message: M) -> Self
    where
        S: Into<String>,
        T: Into<String>,
        M: Into<String>,
    {
        XmlError::Conversion {
            text: text.into(),
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Error raised when a type-erased value is not of the type a serializer supports.
    pub fn unexpected_value(expected: &str) -> Self {
        XmlError::RuntimeTypeMismatch(format!("expected a value of type {}", expected))
    }
}

/// Result type used throughout the crate.
pub type XmlResult<T> = Result<T, XmlError>;
