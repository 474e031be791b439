use std::fmt;

/// Error kind for store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Contract violation by the caller (closed store, malformed key,
    /// negative window start). Fatal, never retried.
    Usage,
    /// Failure inside a backing store. Relayed unchanged by decorators.
    Store,
    /// The change-log record could not be handed off.
    Logging,
    /// Invalid configuration.
    Config,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Usage => f.write_str("usage"),
            ErrorKind::Store => f.write_str("store"),
            ErrorKind::Logging => f.write_str("logging"),
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
        }
    }
}

/// Error returned by every window store and store context method.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
}

impl StoreError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Usage, message: msg.into() }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Store, message: msg.into() }
    }

    pub fn logging(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logging, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Usage errors signal a broken caller and must not be retried.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Usage
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_kind_when_adding_context() {
        // given
        let err = StoreError::logging("channel closed");

        // when
        let err = err.with_context("store 'counts'");

        // then
        assert_eq!(err.kind(), ErrorKind::Logging);
        assert_eq!(err.message(), "store 'counts': channel closed");
        assert!(!err.is_fatal());
    }

    #[test]
    fn should_treat_only_usage_errors_as_fatal() {
        assert!(StoreError::usage("closed").is_fatal());
        assert!(!StoreError::store("disk").is_fatal());
        assert!(!StoreError::config("bad").is_fatal());
    }
}
