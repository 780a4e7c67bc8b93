use std::fmt;
use std::io;

/// Result alias for every fallible operation in the crate.
pub type GxfResult<T> = Result<T, GxfError>;

/// An error raised while reading, assembling, mapping or writing annotations.
///
/// Classification outcomes such as a deleted transcript or a gene conflict are
/// never reported through this type; they are carried as
/// [`RemapStatus`](crate::status::RemapStatus) values instead.
#[derive(Debug)]
pub enum GxfError {
    /// An I/O error.
    Io(io::Error),
    /// A value handed to a constructor violates its contract.
    InvalidArgument(String),
    /// A required attribute or identifier was not present.
    NotFound(String),
    /// The input does not follow the GFF3/GTF/chain structure the crate relies on.
    MalformedInput {
        /// The 1-based line number where the problem was detected (0 when unknown).
        line: usize,
        /// The error message.
        message: String,
    },
    /// A reader or writer was configured in a way that cannot be honoured.
    Builder(String),
}

impl fmt::Display for GxfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GxfError::Io(err) => write!(f, "I/O error: {err}"),
            GxfError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            GxfError::NotFound(msg) => write!(f, "not found: {msg}"),
            GxfError::MalformedInput { line: 0, message } => {
                write!(f, "malformed input: {message}")
            }
            GxfError::MalformedInput { line, message } => {
                write!(f, "malformed input at line {line}: {message}")
            }
            GxfError::Builder(msg) => write!(f, "builder error: {msg}"),
        }
    }
}

impl std::error::Error for GxfError {
    /// Returns the source error, if any.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GxfError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GxfError {
    fn from(err: io::Error) -> Self {
        GxfError::Io(err)
    }
}

impl GxfError {
    /// Creates a new `GxfError` for structurally broken input.
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> GxfError {
        GxfError::MalformedInput {
            line,
            message: message.into(),
        }
    }

    /// Creates a new `GxfError` for a rejected constructor argument.
    pub(crate) fn invalid(message: impl Into<String>) -> GxfError {
        GxfError::InvalidArgument(message.into())
    }

    /// Returns `true` for errors caused by the shape of the input.
    pub fn is_malformed(&self) -> bool {
        matches!(self, GxfError::MalformedInput { .. })
    }
}
