//! Error types for dense HLL operations

use std::fmt;

/// ErrorKind is all kinds of Error surfaced by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The argument provided is invalid.
    InvalidArgument,
    /// Internal state was found in an unexpectedly inconsistent condition.
    InvariantViolated,
    /// The serialized data being deserialized is malformed.
    MalformedDeserializeData,
    /// Deserialized state disagrees with its own declared metadata.
    StateCorruption,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvariantViolated => "InvariantViolated",
            ErrorKind::MalformedDeserializeData => "MalformedDeserializeData",
            ErrorKind::StateCorruption => "StateCorruption",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error is the error struct returned by all fallible functions in this crate.
///
/// Errors out of this crate describe register and table state, so the
/// attached context is a list of named numbers (slot numbers, values, sizes,
/// counts) rather than free-form strings.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, u64)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),
            source: None,
        }
    }

    /// Attach a named numeric detail (a slot number, value, size or count).
    pub fn with_context(mut self, key: &'static str, value: impl Into<u64>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set source for error.
    ///
    /// # Panics
    ///
    /// Panics if the source has been set.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::error::Error as _;
    ///
    /// use hll4_dense::Error;
    /// use hll4_dense::ErrorKind;
    ///
    /// let mut error = Error::new(
    ///     ErrorKind::MalformedDeserializeData,
    ///     "failed to deserialize register array",
    /// );
    /// assert!(error.source().is_none());
    /// error = error.set_source(std::io::Error::new(std::io::ErrorKind::Other, "IO error"));
    /// assert!(error.source().is_some());
    /// ```
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

// Convenience constructors
impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, msg)
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolated, msg)
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::StateCorruption, msg)
    }

    pub(crate) fn deserial(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedDeserializeData, msg)
    }

    pub(crate) fn insufficient_data(msg: impl fmt::Display) -> Self {
        Self::deserial(format!("insufficient data: {msg}"))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if !self.context.is_empty() {
            write!(f, " [")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}
