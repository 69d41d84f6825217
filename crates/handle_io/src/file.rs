// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::CString;
use std::io;
use std::marker::PhantomData;
use std::path::Path;
use std::ptr::NonNull;

use tracing::{Level, event};

use crate::host::Host;
use crate::mapping::MemMapping;
use crate::pal::{Bindings, BindingsFacade};
use crate::policy::{DefaultPolicy, ErrorPolicy, Sentinel, record_error};
use crate::view::FileView;
use crate::{Errno, Fd, FileError, MemMapFlags, MemProt, Mode, NULL_FD, OpenFlags, Whence};

/// An owned handle to an open file, pipe end or other host I/O object.
///
/// Exactly one `File` owns a given handle at a time. Dropping the `File` closes the handle;
/// [`disown()`][Self::disown] gives ownership away instead. Cloning duplicates the handle, so
/// the clone has its own handle that shares the file position with the original.
///
/// A `File` may be *invalid* (hold [`NULL_FD`]), which is what the [`ByValue`] policy returns
/// from failed constructors. Operations on an invalid `File` fail with [`Errno::EBADF`].
///
/// [`ByValue`]: crate::policy::ByValue
#[derive(Debug)]
pub struct File<P: ErrorPolicy = DefaultPolicy> {
    fd: Fd,
    bindings: BindingsFacade,
    _policy: PhantomData<P>,
}

impl<P: ErrorPolicy> File<P> {
    /// Opens the file at `path`.
    ///
    /// `mode` is only consulted when `flags` contains [`OpenFlags::CREATE`] or
    /// [`OpenFlags::TEMPORARY`].
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags, mode: Mode) -> P::Output<Self> {
        P::deliver(Self::open_with(BindingsFacade::real(), path.as_ref(), flags, mode))
    }

    /// Creates (or truncates) the file at `path` for writing.
    pub fn creat(path: impl AsRef<Path>, mode: Mode) -> P::Output<Self> {
        let bindings = BindingsFacade::real();

        let result = native_path(path.as_ref())
            .and_then(|native| bindings.creat(&native, mode))
            .map(|fd| Self::from_parts(fd, bindings.clone()))
            .map_err(|errno| FileError::new(NULL_FD, errno));

        if let Ok(file) = &result {
            event!(Level::TRACE, message = "created", path = %path.as_ref().display(), fd = %file.fd);
        }

        P::deliver(result)
    }

    /// Opens `path` relative to the directory `dir`. Absolute paths ignore `dir`.
    pub fn openat<Q: ErrorPolicy>(dir: FileView<'_, Q>, path: impl AsRef<Path>, flags: OpenFlags, mode: Mode) -> P::Output<Self> {
        let host = dir.host();
        let bindings = host.bindings();

        let result = native_path(path.as_ref())
            .and_then(|native| bindings.openat(host.fd(), &native, flags, mode))
            .map(|fd| Self::from_parts(fd, bindings.clone()))
            .map_err(|errno| host.error(errno));

        P::deliver(result)
    }

    pub(crate) fn open_with(bindings: BindingsFacade, path: &Path, flags: OpenFlags, mode: Mode) -> Result<Self, FileError> {
        let fd = native_path(path)
            .and_then(|native| bindings.open(&native, flags, mode))
            .map_err(|errno| FileError::new(NULL_FD, errno))?;

        event!(Level::TRACE, message = "opened", path = %path.display(), fd = %fd, flags = ?flags);

        Ok(Self::from_parts(fd, bindings))
    }

    /// Takes ownership of a raw handle.
    ///
    /// # Safety
    ///
    /// The handle must be open (or [`NULL_FD`]) and nothing else may close it.
    #[must_use]
    pub unsafe fn from_raw(fd: Fd) -> Self {
        Self::from_parts(fd, BindingsFacade::real())
    }

    pub(crate) const fn from_parts(fd: Fd, bindings: BindingsFacade) -> Self {
        Self {
            fd,
            bindings,
            _policy: PhantomData,
        }
    }

    /// An invalid `File` that owns nothing.
    #[must_use]
    pub const fn null() -> Self {
        Self::from_parts(NULL_FD, BindingsFacade::real())
    }

    /// The owned handle, or [`NULL_FD`].
    #[must_use]
    pub const fn fd(&self) -> Fd {
        self.fd
    }

    /// Whether this `File` owns a handle.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !self.fd.is_null()
    }

    /// A non-owning view of the handle, valid for as long as this `File` is borrowed.
    #[must_use]
    pub const fn view(&self) -> FileView<'_, P> {
        FileView::from_host(self.host())
    }

    const fn host(&self) -> Host<'_> {
        Host::new(self.fd, &self.bindings)
    }

    /// Gives up ownership of the handle without closing it. The `File` becomes invalid.
    #[must_use = "the returned handle is no longer closed by anyone"]
    pub fn disown(&mut self) -> Fd {
        std::mem::replace(&mut self.fd, NULL_FD)
    }

    /// Closes the handle. Closing an invalid `File` succeeds without doing anything.
    ///
    /// The `File` is invalid afterwards even if the host reports an error, because the host may
    /// already have released the handle and reusing its value would be unsound.
    pub fn close(&mut self) -> P::Output<()> {
        let fd = self.disown();
        if fd.is_null() {
            return P::deliver(Ok(()));
        }

        event!(Level::TRACE, message = "closing", fd = %fd);

        P::deliver(self.bindings.close(fd).map_err(|errno| FileError::new(fd, errno)))
    }

    /// Duplicates the handle into a new `File` that shares the file position.
    pub fn dup(&self) -> P::Output<Self> {
        self.view().dup()
    }

    /// Duplicates the handle onto `target`. See [`FileView::dup2`].
    pub fn dup2(&self, target: Fd) -> P::Output<Self> {
        self.view().dup2(target)
    }

    /// Reads up to `buf.len()` bytes, returning how many were read. Zero means end of data.
    pub fn read(&self, buf: &mut [u8]) -> P::Output<usize> {
        self.view().read(buf)
    }

    /// Writes up to `buf.len()` bytes, returning how many were accepted.
    pub fn write(&self, buf: &[u8]) -> P::Output<usize> {
        self.view().write(buf)
    }

    /// Moves the file position and returns the new position.
    pub fn lseek(&self, offset: i64, whence: Whence) -> P::Output<u64> {
        self.view().lseek(offset, whence)
    }

    /// Sets the file length without moving the file position.
    pub fn ftruncate(&self, len: u64) -> P::Output<()> {
        self.view().ftruncate(len)
    }

    /// Flushes data and metadata to durable storage.
    pub fn fsync(&self) -> P::Output<()> {
        self.view().fsync()
    }

    /// Flushes data to durable storage.
    pub fn fdatasync(&self) -> P::Output<()> {
        self.view().fdatasync()
    }

    /// Maps `len` bytes of the file. See [`FileView::mmap`].
    pub fn mmap(&self, len: usize, prot: MemProt, flags: MemMapFlags) -> P::Output<MemMapping<P>> {
        self.view().mmap(len, prot, flags)
    }

    /// Maps `len` bytes of the file starting at `offset`. See [`FileView::mmap_at`].
    pub fn mmap_at(
        &self,
        addr_hint: Option<NonNull<u8>>,
        len: usize,
        prot: MemProt,
        flags: MemMapFlags,
        offset: u64,
    ) -> P::Output<MemMapping<P>> {
        self.view().mmap_at(addr_hint, len, prot, flags, offset)
    }
}

impl<P: ErrorPolicy> Default for File<P> {
    fn default() -> Self {
        Self::null()
    }
}

impl<P: ErrorPolicy> Clone for File<P> {
    /// Duplicates the handle.
    ///
    /// # Errors
    ///
    /// `Clone` cannot fail, so if the host refuses the clone is invalid under either policy and
    /// the error code is available from [`last_error()`][crate::last_error]. Use
    /// [`File::dup`] to have the failure delivered through the policy.
    fn clone(&self) -> Self {
        if self.fd.is_null() {
            return Self::from_parts(NULL_FD, self.bindings.clone());
        }

        match self.host().dup() {
            Ok(fd) => Self::from_parts(fd, self.bindings.clone()),
            Err(errno) => {
                event!(Level::WARN, message = "failed to duplicate handle", fd = %self.fd, errno = %errno);
                record_error(errno);
                Self::from_parts(NULL_FD, self.bindings.clone())
            }
        }
    }
}

impl<P: ErrorPolicy> Drop for File<P> {
    fn drop(&mut self) {
        if self.fd.is_null() {
            return;
        }

        if let Err(errno) = self.bindings.close(self.fd) {
            event!(Level::WARN, message = "failed to close handle", fd = %self.fd, errno = %errno);
        }
    }
}

impl<Q: ErrorPolicy> Sentinel for File<Q> {
    type Value = Self;

    fn success(self) -> Self {
        self
    }

    fn failure() -> Self {
        Self::null()
    }
}

impl<P: ErrorPolicy> io::Read for File<P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.host().read(buf).map_err(|errno| self.host().error(errno).into())
    }
}

impl<P: ErrorPolicy> io::Write for File<P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.host().write(buf).map_err(|errno| self.host().error(errno).into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<P: ErrorPolicy> io::Seek for File<P> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(offset) => {
                let Ok(offset) = i64::try_from(offset) else {
                    return Err(Errno::EINVAL.into());
                };
                (offset, Whence::Set)
            }
            io::SeekFrom::Current(offset) => (offset, Whence::Cur),
            io::SeekFrom::End(offset) => (offset, Whence::End),
        };

        self.host()
            .lseek(offset, whence)
            .map_err(|errno| self.host().error(errno).into())
    }
}

#[cfg(unix)]
mod unix_interop {
    use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

    use super::File;
    use crate::Fd;
    use crate::policy::ErrorPolicy;

    impl<P: ErrorPolicy> AsRawFd for File<P> {
        fn as_raw_fd(&self) -> RawFd {
            self.fd().as_raw()
        }
    }

    impl<P: ErrorPolicy> IntoRawFd for File<P> {
        fn into_raw_fd(mut self) -> RawFd {
            self.disown().as_raw()
        }
    }

    impl<P: ErrorPolicy> FromRawFd for File<P> {
        unsafe fn from_raw_fd(fd: RawFd) -> Self {
            // SAFETY: Forwarding the caller's ownership guarantee.
            unsafe { Self::from_raw(Fd::from_raw(fd)) }
        }
    }

    impl<P: ErrorPolicy> From<OwnedFd> for File<P> {
        fn from(owned: OwnedFd) -> Self {
            // SAFETY: `OwnedFd` guarantees exclusive ownership of an open descriptor.
            unsafe { Self::from_raw(Fd::from_raw(owned.into_raw_fd())) }
        }
    }
}

#[cfg(windows)]
mod windows_interop {
    use std::os::windows::io::{AsRawHandle, FromRawHandle, IntoRawHandle, OwnedHandle, RawHandle};
    use std::ptr;

    use super::File;
    use crate::Fd;
    use crate::policy::ErrorPolicy;

    fn fd_from_handle(handle: RawHandle) -> Fd {
        Fd::from_raw(handle.expose_provenance().cast_signed())
    }

    impl<P: ErrorPolicy> AsRawHandle for File<P> {
        fn as_raw_handle(&self) -> RawHandle {
            ptr::with_exposed_provenance_mut(self.fd().as_raw().cast_unsigned())
        }
    }

    impl<P: ErrorPolicy> IntoRawHandle for File<P> {
        fn into_raw_handle(mut self) -> RawHandle {
            ptr::with_exposed_provenance_mut(self.disown().as_raw().cast_unsigned())
        }
    }

    impl<P: ErrorPolicy> FromRawHandle for File<P> {
        unsafe fn from_raw_handle(handle: RawHandle) -> Self {
            // SAFETY: Forwarding the caller's ownership guarantee.
            unsafe { Self::from_raw(fd_from_handle(handle)) }
        }
    }

    impl<P: ErrorPolicy> From<OwnedHandle> for File<P> {
        fn from(owned: OwnedHandle) -> Self {
            // SAFETY: `OwnedHandle` guarantees exclusive ownership of an open handle.
            unsafe { Self::from_raw(fd_from_handle(owned.into_raw_handle())) }
        }
    }
}

/// Converts a path into the NUL-terminated form the host expects.
fn native_path(path: &Path) -> Result<CString, Errno> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes()
    };

    // The ANSI entry points cannot represent arbitrary UTF-16 paths.
    #[cfg(windows)]
    let bytes = path.to_str().ok_or(Errno::EINVAL)?.as_bytes();

    CString::new(bytes).or(Err(Errno::EINVAL))
}
