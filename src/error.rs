use thiserror::Error;

use crate::compare::Axis;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("malformed dcd header at field '{field}': {reason}")]
    MalformedHeader { field: &'static str, reason: String },

    #[error("number of frames is 0, try regenerating the dcd file (e.g., through catdcd)")]
    EmptyTrajectory,

    #[error("frame {frame} is truncated while reading its {axis} block")]
    TruncatedFrame { frame: usize, axis: Axis },

    #[error("actual trajectory has no value for frame {frame}, atom {atom}")]
    OutOfRange { frame: usize, atom: usize },

    #[error("invalid test parameter on line {line}: {message}")]
    Config { line: usize, message: String },
}

impl Error {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            field,
            reason: reason.into(),
        }
    }

    /// Maps an error that occurred while reading the header, where running out of bytes means
    /// the header is malformed.
    pub(crate) fn in_header(field: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                Self::malformed(field, "stream ended before the header was complete")
            }
            _ => Self::Io { source: err },
        }
    }

    /// Maps an error that occurred while reading a frame, where running out of bytes means the
    /// frame is truncated.
    pub(crate) fn in_frame(frame: usize, axis: Axis) -> impl FnOnce(std::io::Error) -> Self {
        move |err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::TruncatedFrame { frame, axis },
            _ => Self::Io { source: err },
        }
    }
}
