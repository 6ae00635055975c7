//! Filesystem operation errors.

use thiserror::Error;

/// An error from a filesystem operation.
///
/// Every public operation reports its own variant; [`Error::code`] returns
/// the operation's legacy negative code for callers that speak the numeric
/// convention. Success is simply `Ok`.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// A failure outside any specific operation.
    #[error("operation failed")]
    Generic,
    /// The filesystem could not be created.
    #[error("cannot create filesystem")]
    Mkfs,
    /// The filesystem could not be mounted.
    #[error("cannot mount filesystem")]
    Mount,
    /// No filesystem to unmount.
    #[error("cannot unmount filesystem")]
    Unmount,
    /// The file could not be opened.
    #[error("cannot open file")]
    Open,
    /// The descriptor could not be closed.
    #[error("cannot close file")]
    Close,
    /// The file could not be written.
    #[error("cannot write file")]
    Write,
    /// The file could not be read.
    #[error("cannot read file")]
    Read,
    /// The requested offset is out of range.
    #[error("seek out of range")]
    Seek,
    /// The file could not be deleted.
    #[error("cannot delete file")]
    Delete,
    /// The file's metadata could not be read.
    #[error("cannot read file info")]
    ReadInfo,
    /// The file could not be write-protected.
    #[error("cannot make file read-only")]
    MakeRo,
    /// The write protection could not be lifted.
    #[error("cannot make file read-write")]
    MakeRw,
    /// The file could not be renamed.
    #[error("cannot rename file")]
    Rename,
    /// The directory could not be listed.
    #[error("cannot list directory")]
    Readdir,
}

impl Error {
    /// Returns the legacy numeric code of the error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Generic => -1,
            Self::Mkfs => -2,
            Self::Mount => -3,
            Self::Unmount => -4,
            Self::Open => -5,
            Self::Close => -6,
            Self::Write => -7,
            Self::Read => -8,
            Self::Seek => -9,
            Self::Delete => -10,
            Self::ReadInfo => -11,
            Self::MakeRo => -12,
            Self::MakeRw => -13,
            Self::Rename => -14,
            Self::Readdir => -15,
        }
    }
}
