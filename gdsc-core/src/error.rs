use thiserror::Error;

/// Failure taxonomy for the whole codec.
///
/// Every compile/decompile call is fail-fast: the first error aborts the
/// call and nothing is retried (the transforms are deterministic, a retry
/// would reproduce the same failure).
#[derive(Debug, Error)]
pub enum GdscError {
    /// Bad magic, truncated input, or a bytecode version mismatch.
    #[error("format error: {0}")]
    Format(String),

    /// No descriptor is registered for the given commit hash.
    #[error("there is no bytecode version associated with the given commit hash: {0}")]
    UnknownVersion(String),

    /// The symbol exists in the codec but not in the active bytecode version.
    #[error("not defined in current bytecode version: {0}")]
    UnsupportedInVersion(String),

    /// A wire token id that the active descriptor cannot resolve.
    #[error("token id not defined in current bytecode version: {0}")]
    UnknownToken(u32),

    /// The tokenizer could not match anything at the cursor.
    #[error("unexpected token on line {line}")]
    UnexpectedToken { line: usize },

    /// Source indented with spaces; the compiler requires tabs.
    #[error("line {line} uses spaces for indentation (tabs are required)")]
    PolicyViolation { line: usize },

    /// Value kinds whose wire layout is not fully known.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
}

impl From<std::io::Error> for GdscError {
    fn from(e: std::io::Error) -> Self {
        // All reads happen over in-memory buffers, so an io error here
        // means the input ended early.
        GdscError::Format(format!("truncated input: {e}"))
    }
}

pub type Result<T, E = GdscError> = std::result::Result<T, E>;
