//! Error type shared by every fallible operation in this crate.

use std::fmt;
use std::io;

/// Errors surfaced at the call boundary. Data-dependent conditions (invalid
/// depth pixels, missed rays, unobserved voxels) are never represented here;
/// they are handled silently as documented on each operation.
#[derive(Debug)]
pub enum Error {
    /// A caller passed inconsistent dimensions, a non-positive grid size, a
    /// non-positive truncation distance, or a malformed camera.
    InvalidArgument(String),

    /// A read/write failure, bad magic, or unexpected EOF while
    /// (de)serialising a grid or mesh.
    Io(io::Error),

    /// A debug-mode-only guard was violated (e.g. a depth image whose
    /// dimensions disagree with the camera passed to `integrate`).
    PreconditionViolation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::PreconditionViolation(msg) => write!(f, "precondition violation: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
