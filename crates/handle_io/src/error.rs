// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};
use std::io;

use thiserror::Error;

use crate::Fd;

/// A POSIX `errno` code.
///
/// This is the single error vocabulary of the crate. Host-specific error codes (such as Win32
/// error codes) are translated into this domain at the platform boundary.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Errno(i32);

macro_rules! errno_constants {
    ($($name:ident),+ $(,)?) => {
        impl Errno {
            $(
                #[doc = concat!("The `", stringify!($name), "` error code.")]
                pub const $name: Self = Self(libc::$name);
            )+

            /// The symbolic name of the code, if it is one this crate knows about.
            #[must_use]
            pub const fn name(self) -> Option<&'static str> {
                $(
                    if self.0 == libc::$name {
                        return Some(stringify!($name));
                    }
                )+
                None
            }
        }
    };
}

errno_constants!(
    EPERM, ENOENT, EINTR, EIO, ENXIO, EBADF, EAGAIN, ENOMEM, EACCES, EFAULT, EBUSY, EEXIST, ENOTDIR,
    EISDIR, EINVAL, EMFILE, ETXTBSY, ENOSPC, ESPIPE, EROFS, EPIPE, ENAMETOOLONG, EOVERFLOW,
);

impl Errno {
    /// The "no error" value.
    pub const NONE: Self = Self(0);

    /// Wraps a raw `errno` value.
    #[must_use]
    pub const fn from_raw(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw `errno` value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether this is the "no error" value.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The closest matching standard library error kind.
    #[must_use]
    pub fn kind(self) -> io::ErrorKind {
        match self {
            Self::ENOENT => io::ErrorKind::NotFound,
            Self::EPERM | Self::EACCES => io::ErrorKind::PermissionDenied,
            Self::EEXIST => io::ErrorKind::AlreadyExists,
            Self::EINVAL => io::ErrorKind::InvalidInput,
            Self::EINTR => io::ErrorKind::Interrupted,
            Self::EAGAIN => io::ErrorKind::WouldBlock,
            Self::EPIPE => io::ErrorKind::BrokenPipe,
            Self::ENOMEM => io::ErrorKind::OutOfMemory,
            Self::ENOTDIR => io::ErrorKind::NotADirectory,
            Self::EISDIR => io::ErrorKind::IsADirectory,
            Self::EBUSY => io::ErrorKind::ResourceBusy,
            Self::ENOSPC => io::ErrorKind::StorageFull,
            Self::ESPIPE => io::ErrorKind::NotSeekable,
            Self::EROFS => io::ErrorKind::ReadOnlyFilesystem,
            Self::ENAMETOOLONG => io::ErrorKind::InvalidFilename,
            Self::ETXTBSY => io::ErrorKind::ExecutableFileBusy,
            _ => io::ErrorKind::Other,
        }
    }

    /// Captures the calling thread's most recent host error.
    #[cfg(unix)]
    pub(crate) fn last_os_error() -> Self {
        Self(io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO))
    }
}

impl Display for Errno {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.name() {
            _ if self.is_none() => write!(f, "none"),
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "unknown errno ({})", self.0),
        }
    }
}

impl std::error::Error for Errno {}

impl From<Errno> for io::Error {
    fn from(errno: Errno) -> Self {
        #[cfg(unix)]
        {
            Self::from_raw_os_error(errno.raw())
        }

        #[cfg(windows)]
        {
            Self::new(errno.kind(), errno)
        }
    }
}

/// A failed operation on a specific handle.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("operation on handle {fd} failed: {errno}")]
pub struct FileError {
    fd: Fd,
    errno: Errno,
}

impl FileError {
    /// Creates an error for an operation on `fd` that failed with `errno`.
    #[must_use]
    pub const fn new(fd: Fd, errno: Errno) -> Self {
        Self { fd, errno }
    }

    /// The handle the failed operation targeted. This is [`NULL_FD`][crate::NULL_FD] when the
    /// operation had no handle yet, such as a failed open.
    #[must_use]
    pub const fn fd(&self) -> Fd {
        self.fd
    }

    /// The error code.
    #[must_use]
    pub const fn errno(&self) -> Errno {
        self.errno
    }
}

impl From<FileError> for io::Error {
    fn from(error: FileError) -> Self {
        Self::new(error.errno.kind(), error)
    }
}

/// A multi-step transfer that failed after moving `transferred` bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Interrupted {
    pub(crate) transferred: usize,
    pub(crate) errno: Errno,
}

impl Interrupted {
    pub(crate) const fn new(transferred: usize, errno: Errno) -> Self {
        Self { transferred, errno }
    }
}
