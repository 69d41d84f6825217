// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::pal::{Bindings, BindingsFacade};
use crate::{Errno, Fd, FileError, Whence};

/// The `Result`-returning core shared by owning and borrowing handles.
///
/// Error policies are applied on top of this by the public types; everything below the public
/// surface (including the buffered streams) works with these methods directly.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Host<'a> {
    fd: Fd,
    bindings: &'a BindingsFacade,
}

impl<'a> Host<'a> {
    pub(crate) const fn new(fd: Fd, bindings: &'a BindingsFacade) -> Self {
        Self { fd, bindings }
    }

    pub(crate) const fn fd(self) -> Fd {
        self.fd
    }

    pub(crate) const fn bindings(self) -> &'a BindingsFacade {
        self.bindings
    }

    pub(crate) const fn error(self, errno: Errno) -> FileError {
        FileError::new(self.fd, errno)
    }

    // A null handle is rejected before it reaches the host.
    fn live(self) -> Result<Fd, Errno> {
        if self.fd.is_null() { Err(Errno::EBADF) } else { Ok(self.fd) }
    }

    pub(crate) fn read(self, buf: &mut [u8]) -> Result<usize, Errno> {
        let fd = self.live()?;
        self.bindings.read(fd, buf)
    }

    pub(crate) fn write(self, buf: &[u8]) -> Result<usize, Errno> {
        let fd = self.live()?;
        self.bindings.write(fd, buf)
    }

    pub(crate) fn lseek(self, offset: i64, whence: Whence) -> Result<u64, Errno> {
        let fd = self.live()?;
        self.bindings.lseek(fd, offset, whence)
    }

    pub(crate) fn ftruncate(self, len: u64) -> Result<(), Errno> {
        let fd = self.live()?;
        self.bindings.ftruncate(fd, len)
    }

    pub(crate) fn fsync(self) -> Result<(), Errno> {
        let fd = self.live()?;
        self.bindings.fsync(fd)
    }

    pub(crate) fn fdatasync(self) -> Result<(), Errno> {
        let fd = self.live()?;
        self.bindings.fdatasync(fd)
    }

    pub(crate) fn dup(self) -> Result<Fd, Errno> {
        let fd = self.live()?;
        self.bindings.dup(fd)
    }

    pub(crate) fn dup2(self, target: Fd) -> Result<Fd, Errno> {
        let fd = self.live()?;
        if target.is_null() {
            return Err(Errno::EBADF);
        }
        self.bindings.dup2(fd, target)
    }
}
