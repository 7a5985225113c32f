use super::SlotType;
use crate::names::BinaryName;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// A snapshot or activation does not have the size of the frame descriptor
    ///
    /// This is always a bug in the caller.
    LayoutMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A slot of the snapshot holds data of the wrong kind (a reference in a primitive slot, or a
    /// primitive word in a reference slot)
    InvalidSnapshotShape { slot: usize, expected: SlotType },

    /// A reference in the snapshot is not an instance of the declared slot class
    IllegalResumeType {
        slot: usize,
        expected: BinaryName,
        actual: BinaryName,
    },

    /// A declared slot class could not be resolved from the accessing class
    UnresolvedType(BinaryName),

    /// Unknown tag while decoding a persisted frame
    BadTag(u8),

    /// Malformed field or method descriptor
    BadDescriptor(String),

    IoError(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LayoutMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "Invalid {} length: {} (frame has {} slots)",
                what, found, expected
            ),
            Error::InvalidSnapshotShape { slot, expected } if expected.is_reference() => write!(
                f,
                "Non-zero primitive in primitives array at slot: {}, but expected a {}",
                slot, expected
            ),
            Error::InvalidSnapshotShape { slot, expected } => write!(
                f,
                "Non-null object in pointers array at slot: {}, but expected a {}",
                slot, expected
            ),
            Error::IllegalResumeType {
                slot,
                expected,
                actual,
            } => write!(
                f,
                "Attempting to resume with invalid object class at slot {}.\nExpected: {}\nBut got: {}",
                slot,
                expected.external_name(),
                actual.external_name()
            ),
            Error::UnresolvedType(name) => {
                write!(f, "Cannot resolve class {}", name.external_name())
            }
            Error::BadTag(tag) => write!(f, "Unknown slot type tag {}", tag),
            Error::BadDescriptor(msg) => write!(f, "Bad descriptor: {}", msg),
            Error::IoError(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
