use crate::frame;
use crate::names::BinaryName;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Error from the frame layer (merging, decoding, ...)
    Frame(frame::Error),

    /// Malformed line in a text listing
    Syntax { line: usize, message: String },

    /// Stack map table which does not fit the method it describes
    InvalidTable { bci: u32, message: String },

    /// Class mentioned but never declared
    UnknownClass(BinaryName),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Frame(err) => fmt::Display::fmt(err, f),
            Error::Syntax { line, message } => write!(f, "Line {}: {}", line, message),
            Error::InvalidTable { bci, message } => {
                write!(f, "Invalid stack map frame at {}: {}", bci, message)
            }
            Error::UnknownClass(name) => write!(f, "Unknown class {}", name.external_name()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Frame(err) => Some(err),
            _ => None,
        }
    }
}

impl From<frame::Error> for Error {
    fn from(err: frame::Error) -> Error {
        Error::Frame(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Frame(frame::Error::IoError(err))
    }
}
