// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use derive_more::Display;

/// The raw host representation of an open handle.
///
/// On Unix this is a file descriptor. On Windows it is the integer value of a `HANDLE`.
#[cfg(unix)]
pub type RawFd = std::os::fd::RawFd;

/// The raw host representation of an open handle.
///
/// On Unix this is a file descriptor. On Windows it is the integer value of a `HANDLE`.
#[cfg(windows)]
pub type RawFd = isize;

/// An opaque host handle identifier.
///
/// An `Fd` carries no ownership. Ownership is expressed by [`File`][crate::File], while
/// [`FileView`][crate::FileView] borrows. The distinguished [`NULL_FD`] value never
/// refers to an open handle.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[display("{_0}")]
pub struct Fd(RawFd);

/// The invalid handle value.
///
/// This is `-1` on Unix and `INVALID_HANDLE_VALUE` on Windows, which share the same bit pattern.
pub const NULL_FD: Fd = Fd(-1);

impl Fd {
    /// Wraps a raw host handle value without taking ownership of it.
    #[must_use]
    pub const fn from_raw(raw: RawFd) -> Self {
        Self(raw)
    }

    /// Returns the raw host handle value.
    #[must_use]
    pub const fn as_raw(self) -> RawFd {
        self.0
    }

    /// Whether this is the invalid handle value.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == NULL_FD.0
    }
}

impl Default for Fd {
    fn default() -> Self {
        NULL_FD
    }
}
