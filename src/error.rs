use std::fmt;

/// Errors raised by index-based access and by builder cursors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// An index fell outside the valid range of a list.
    IndexOutOfBounds { index: usize, len: usize },
    /// A cursor was used after its builder was modified by someone else.
    ConcurrentModification,
    /// A cursor was asked to touch its current element before `next` was
    /// called, or twice for the same element.
    IllegalState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds for length {}", index, len)
            }
            Error::ConcurrentModification => {
                write!(f, "builder was modified while a cursor was open")
            }
            Error::IllegalState => write!(f, "cursor has no current element"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
