use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CairnError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("key does not match collection schema: {0}")]
    SchemaViolation(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key already present: {0}")]
    AlreadyPresent(String),

    #[error("value cannot be used as a key: {0}")]
    UnsupportedKeyPassStyle(String),

    #[error("value patterns other than `any` are reserved")]
    UnsupportedValuePattern,

    #[error("corrupt encoded key: {0}")]
    DecodeCorruption(String),

    #[error("remotable has no ordinal in this collection: {0}")]
    OrdinalMissing(String),

    #[error("collection was modified during iteration")]
    ConcurrentModification,

    #[error("ordinal space exhausted (next ordinal would exceed 10^10-1)")]
    OrdinalOverflow,

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("marshal error: {0}")]
    Marshal(String),

    #[error("malformed external collection identifier: {0}")]
    InvalidExternalId(String),

    #[error("unknown collection kind: {0}")]
    UnknownKind(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CairnError>;

impl CairnError {
    /// Wrap this error with additional context.
    ///
    /// The context string is prepended to the error message, producing a
    /// chain like `"while disposing collection 3: store error: ..."`.
    pub fn context(self, msg: impl Into<String>) -> Self {
        let ctx = msg.into();
        CairnError::Internal(format!("{}: {}", ctx, self))
    }
}

/// Extension trait to add `.context()` on `Result<T, CairnError>`.
///
/// Mirrors the ergonomics of `anyhow::Context`.
pub trait ResultExt<T> {
    /// If the result is `Err`, wrap the error with additional context.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// If the result is `Err`, wrap the error with a lazily-evaluated context.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.context(f()))
    }
}
