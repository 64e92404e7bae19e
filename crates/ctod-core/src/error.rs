use thiserror::Error;

/// Library-level error type for the terrain factory and everything it
/// orchestrates. The HTTP layer (`tools/ctod-server`) wraps this in its own
/// `AppError` the way the teacher's `tileserver` wraps `tiler::Error`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("No such dataset: {0}")]
    NoSuchDataset(String),
    #[error("Unsafe request: {0}")]
    UnsafeRequest(String),
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Tile out of bounds")]
    OutOfBounds,
    #[error("Meshing failed: {0}")]
    MeshingFailed(String),
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Server overloaded")]
    Overloaded,
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Geo(#[from] ctod_geo::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid dataset configuration: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The stable error kind used in user-visible JSON bodies (`{"error": kind,
/// "message": str}`) and by the HTTP layer's status-code mapping, kept
/// separate from the `Error` enum so that wrapped upstream error types
/// (`ctod_geo::Error`, io errors, ...) still report one of this fixed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NoSuchDataset,
    UnsafeRequest,
    SourceUnavailable,
    OutOfBounds,
    MeshingFailed,
    EncodingFailed,
    Timeout,
    Overloaded,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NoSuchDataset => "NoSuchDataset",
            ErrorKind::UnsafeRequest => "UnsafeRequest",
            ErrorKind::SourceUnavailable => "SourceUnavailable",
            ErrorKind::OutOfBounds => "OutOfBounds",
            ErrorKind::MeshingFailed => "MeshingFailed",
            ErrorKind::EncodingFailed => "EncodingFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Overloaded => "Overloaded",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::NoSuchDataset(_) => ErrorKind::NoSuchDataset,
            Error::UnsafeRequest(_) => ErrorKind::UnsafeRequest,
            Error::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Error::OutOfBounds => ErrorKind::OutOfBounds,
            Error::MeshingFailed(_) => ErrorKind::MeshingFailed,
            Error::EncodingFailed(_) => ErrorKind::EncodingFailed,
            Error::Timeout => ErrorKind::Timeout,
            Error::Overloaded => ErrorKind::Overloaded,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Io(_) | Error::Json(_) => ErrorKind::Internal,
            Error::Geo(inner) => match inner {
                ctod_geo::Error::NoSuchTms(_) | ctod_geo::Error::TileOutOfRange { .. } => ErrorKind::BadRequest,
                ctod_geo::Error::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
                ctod_geo::Error::InvalidArgument(_) => ErrorKind::BadRequest,
                ctod_geo::Error::Runtime(_) | ctod_geo::Error::GdalError(_) | ctod_geo::Error::IOError(_) => ErrorKind::Internal,
            },
        }
    }

    /// Whether a failure of this kind, occurring on a *neighbor* window
    /// fetch, should be treated as soft (absent neighbor) rather than
    /// failing the whole request. Per spec.md 4.E only `SourceUnavailable`
    /// on a neighbor is soft.
    pub fn is_soft_neighbor_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::SourceUnavailable)
    }

    /// A `Clone`-able projection used to fan a single failure out to every
    /// waiter on a coalesced fetch (`Error` itself isn't `Clone`: it wraps
    /// `std::io::Error` and `gdal`'s error type). Waiters reconstruct an
    /// `Error` of the same kind via `from_shared`, losing only the original
    /// variant's exact payload structure, never its kind or message.
    pub fn to_shared(&self) -> (ErrorKind, String) {
        (self.kind(), self.to_string())
    }

    pub fn from_shared(kind: ErrorKind, message: String) -> Error {
        match kind {
            ErrorKind::BadRequest => Error::BadRequest(message),
            ErrorKind::NoSuchDataset => Error::NoSuchDataset(message),
            ErrorKind::UnsafeRequest => Error::UnsafeRequest(message),
            ErrorKind::SourceUnavailable => Error::SourceUnavailable(message),
            ErrorKind::OutOfBounds => Error::OutOfBounds,
            ErrorKind::MeshingFailed => Error::MeshingFailed(message),
            ErrorKind::EncodingFailed => Error::EncodingFailed(message),
            ErrorKind::Timeout => Error::Timeout,
            ErrorKind::Overloaded => Error::Overloaded,
            ErrorKind::Internal => Error::Internal(message),
        }
    }
}
