//! Error types for the overleaf-fs library.

use thiserror::Error;

/// Main error type for overleaf-fs operations.
#[derive(Error, Debug)]
pub enum OverleafError {
    /// A remote call was attempted before any `login_*` call.
    #[error("Session not initialized: call one of the Session::login_* methods first")]
    SessionNotInitialized,

    /// The server rejected the session (HTTP 401/403 or a socket error frame).
    #[error("Unauthorized: {0}")]
    RemoteUnauthorized(String),

    /// A path component does not exist.
    #[error("No such file or directory: {0}")]
    NotFound(String),

    /// The target of a create operation already exists.
    #[error("File exists: {0}")]
    AlreadyExists(String),

    /// A path component that must be a folder is a file.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// The server reported a file type tag this library does not know.
    #[error("Unknown entity kind: {0}")]
    UnknownEntityKind(String),

    /// HTTP request returned a non-success status code.
    #[error("HTTP error {status} for {url}")]
    RemoteRequestFailed { status: u16, url: String },

    /// The real-time service answered an operation with an error payload.
    #[error("Remote operation failed: {0}")]
    RemoteOperationFailed(String),

    /// Network request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Websocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Content opened in text mode is not valid UTF-8.
    #[error("Invalid UTF-8 content: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Malformed frame or unexpected message on the event socket.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A network operation did not complete within the configured timeout.
    #[error("Timed out while {0}")]
    Timeout(&'static str),

    /// An expected `<meta>` tag was absent from a scraped page.
    #[error("Missing page metadata: {0}")]
    MissingMetadata(String),

    /// No project with the given name is visible to the session.
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    /// The path cannot be used for this operation.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Unsupported `open` mode string.
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// Only UTF-8 text handles are supported.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Client configuration could not be applied.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OverleafError {
    /// Check whether the error means the session needs (re)authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            OverleafError::SessionNotInitialized | OverleafError::RemoteUnauthorized(_)
        )
    }
}

/// Result type alias for overleaf-fs operations.
pub type Result<T> = std::result::Result<T, OverleafError>;
