/// Result alias that carries the custom [`SearchspaceError`] type.
pub type Result<T> = std::result::Result<T, SearchspaceError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SearchspaceError {
    /// Free-form message, mostly raised by hooks supplied by the host.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or script files that fail to parse.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Encoding a captured frame failed.
    #[error("{0}")]
    Image(#[from] image::ImageError),
    /// The host could not provide the rendering surface or one of its
    /// containers.
    #[error("unable to acquire rendering surface: {0}")]
    SurfaceUnavailable(String),
    /// Compiling or linking the backend program failed.
    #[error("unable to initialize the backend program:\n{0}")]
    ProgramLink(String),
    /// A required lifecycle phase has no setup hook, or a hook left the loop
    /// in an inconsistent state.
    #[error("lifecycle violation: {0}")]
    Lifecycle(String),
    /// Caller supplied input that cannot be interpreted.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SearchspaceError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for SearchspaceError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SearchspaceError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
