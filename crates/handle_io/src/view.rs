// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;
use std::marker::PhantomData;
use std::ptr::NonNull;

use tracing::{Level, event};

use crate::file::File;
use crate::host::Host;
use crate::mapping::MemMapping;
use crate::pal::{BUILD_TARGET_BINDINGS, Bindings};
use crate::policy::{DefaultPolicy, ErrorPolicy, Sentinel};
use crate::{Errno, Fd, MemMapFlags, MemProt, NULL_FD, Whence};

/// A non-owning view of an open handle.
///
/// A view offers every I/O operation of [`File`] but never closes the handle: dropping it or
/// calling [`close()`][Self::close] only detaches the view. Views are `Copy`, so any number of
/// them can refer to the same handle, and they borrow the `File` they were created from so they
/// cannot outlive it.
#[derive(Clone, Copy, Debug)]
pub struct FileView<'a, P: ErrorPolicy = DefaultPolicy> {
    host: Host<'a>,
    _policy: PhantomData<P>,
}

impl<'a, P: ErrorPolicy> FileView<'a, P> {
    /// Creates a view of a raw handle that something else owns.
    ///
    /// # Safety
    ///
    /// The handle must stay open for as long as the view (or any copy of it) is in use, and it
    /// must not be closed through the view's operations in the meantime.
    #[must_use]
    pub unsafe fn borrow_raw(fd: Fd) -> FileView<'static, P> {
        FileView::from_host(Host::new(fd, &BUILD_TARGET_BINDINGS))
    }

    pub(crate) const fn from_host(host: Host<'a>) -> Self {
        Self {
            host,
            _policy: PhantomData,
        }
    }

    pub(crate) const fn host(&self) -> Host<'a> {
        self.host
    }

    fn deliver<T: Sentinel>(&self, result: Result<T, Errno>) -> P::Output<T> {
        P::deliver(result.map_err(|errno| self.host.error(errno)))
    }

    /// The viewed handle.
    #[must_use]
    pub const fn fd(&self) -> Fd {
        self.host.fd()
    }

    /// Whether the view refers to a handle at all.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !self.host.fd().is_null()
    }

    /// Detaches the view from its handle without closing the handle. Always succeeds.
    pub fn close(&mut self) -> P::Output<()> {
        self.host = Host::new(NULL_FD, self.host.bindings());
        P::deliver(Ok(()))
    }

    /// Reads up to `buf.len()` bytes, returning how many were read. Zero means end of data.
    pub fn read(&self, buf: &mut [u8]) -> P::Output<usize> {
        self.deliver(self.host.read(buf))
    }

    /// Writes up to `buf.len()` bytes, returning how many were accepted.
    pub fn write(&self, buf: &[u8]) -> P::Output<usize> {
        self.deliver(self.host.write(buf))
    }

    /// Moves the file position and returns the new position.
    pub fn lseek(&self, offset: i64, whence: Whence) -> P::Output<u64> {
        self.deliver(self.host.lseek(offset, whence))
    }

    /// Sets the file length without moving the file position.
    pub fn ftruncate(&self, len: u64) -> P::Output<()> {
        self.deliver(self.host.ftruncate(len))
    }

    /// Flushes data and metadata to durable storage.
    pub fn fsync(&self) -> P::Output<()> {
        self.deliver(self.host.fsync())
    }

    /// Flushes data to durable storage.
    pub fn fdatasync(&self) -> P::Output<()> {
        self.deliver(self.host.fdatasync())
    }

    /// Duplicates the handle into a new owning [`File`] that shares the file position.
    pub fn dup(&self) -> P::Output<File<P>> {
        let bindings = self.host.bindings();
        self.deliver(self.host.dup().map(|fd| File::from_parts(fd, bindings.clone())))
    }

    /// Duplicates the handle onto `target`, closing whatever `target` referred to before.
    ///
    /// The returned [`File`] owns `target`. Hosts that cannot choose handle values (Windows)
    /// fail with [`Errno::EINVAL`].
    pub fn dup2(&self, target: Fd) -> P::Output<File<P>> {
        let bindings = self.host.bindings();
        self.deliver(self.host.dup2(target).map(|fd| File::from_parts(fd, bindings.clone())))
    }

    /// Maps `len` bytes of the file, starting at offset zero, anywhere in the address space.
    pub fn mmap(&self, len: usize, prot: MemProt, flags: MemMapFlags) -> P::Output<MemMapping<P>> {
        self.mmap_at(None, len, prot, flags, 0)
    }

    /// Maps `len` bytes of the file starting at `offset`.
    ///
    /// `addr_hint` is advisory unless [`MemMapFlags::FIXED`] is set, which Windows does not
    /// support. A zero `len` produces an empty mapping without calling the host.
    pub fn mmap_at(
        &self,
        addr_hint: Option<NonNull<u8>>,
        len: usize,
        prot: MemProt,
        flags: MemMapFlags,
        offset: u64,
    ) -> P::Output<MemMapping<P>> {
        self.deliver(self.map(addr_hint, len, prot, flags, offset))
    }

    fn map(
        &self,
        addr_hint: Option<NonNull<u8>>,
        len: usize,
        prot: MemProt,
        flags: MemMapFlags,
        offset: u64,
    ) -> Result<MemMapping<P>, Errno> {
        let bindings = self.host.bindings();

        if len == 0 {
            return Ok(MemMapping::empty(bindings.clone()));
        }

        if self.host.fd().is_null() {
            return Err(Errno::EBADF);
        }

        let hint = addr_hint.map_or(0, |addr| addr.as_ptr().expose_provenance());
        let region = bindings.mmap(self.host.fd(), hint, len, prot, flags, offset)?;
        event!(Level::TRACE, message = "mapped", fd = %self.host.fd(), addr = region.addr, len, offset);

        Ok(MemMapping::from_parts(region, bindings.clone()))
    }
}

impl<'a, P: ErrorPolicy> From<&'a File<P>> for FileView<'a, P> {
    fn from(file: &'a File<P>) -> Self {
        file.view()
    }
}

impl<P: ErrorPolicy> io::Read for FileView<'_, P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.host.read(buf).map_err(|errno| self.host.error(errno).into())
    }
}

impl<P: ErrorPolicy> io::Write for FileView<'_, P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.host.write(buf).map_err(|errno| self.host.error(errno).into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
impl<P: ErrorPolicy> std::os::fd::AsRawFd for FileView<'_, P> {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.fd().as_raw()
    }
}

#[cfg(windows)]
impl<P: ErrorPolicy> std::os::windows::io::AsRawHandle for FileView<'_, P> {
    fn as_raw_handle(&self) -> std::os::windows::io::RawHandle {
        std::ptr::with_exposed_provenance_mut(self.fd().as_raw().cast_unsigned())
    }
}
