// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::CStr;
use std::fmt::Debug;

use crate::{Errno, Fd, MemMapFlags, MemProt, MemSync, Mode, OpenFlags, Whence};

/// The address range and host objects behind a live memory mapping.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MappedRegion {
    /// Start address of the mapped view.
    pub addr: usize,
    /// Length of the mapped view in bytes.
    pub len: usize,
    /// Host mapping object that must be released with the view. Only Windows has one; it is
    /// [`NULL_FD`][crate::NULL_FD] elsewhere.
    pub object: Fd,
}

/// Bindings for the host file, pipe and memory mapping primitives.
///
/// All host calls must go through this trait, enabling them to be mocked. Implementations
/// report failures as [`Errno`] values, translating host error codes where necessary.
#[cfg_attr(test, mockall::automock)]
pub trait Bindings: Debug + Send + Sync + 'static {
    fn open(&self, path: &CStr, flags: OpenFlags, mode: Mode) -> Result<Fd, Errno>;
    fn creat(&self, path: &CStr, mode: Mode) -> Result<Fd, Errno>;
    fn openat(&self, dir: Fd, path: &CStr, flags: OpenFlags, mode: Mode) -> Result<Fd, Errno>;

    /// Returns 0 at end of data.
    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno>;
    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize, Errno>;
    fn lseek(&self, fd: Fd, offset: i64, whence: Whence) -> Result<u64, Errno>;
    fn ftruncate(&self, fd: Fd, len: u64) -> Result<(), Errno>;
    fn fsync(&self, fd: Fd) -> Result<(), Errno>;
    fn fdatasync(&self, fd: Fd) -> Result<(), Errno>;

    fn dup(&self, fd: Fd) -> Result<Fd, Errno>;
    fn dup2(&self, fd: Fd, target: Fd) -> Result<Fd, Errno>;
    fn close(&self, fd: Fd) -> Result<(), Errno>;

    /// Returns the read end followed by the write end.
    fn pipe(&self) -> Result<(Fd, Fd), Errno>;

    /// `len` is never zero.
    fn mmap(
        &self,
        fd: Fd,
        addr_hint: usize,
        len: usize,
        prot: MemProt,
        flags: MemMapFlags,
        offset: u64,
    ) -> Result<MappedRegion, Errno>;
    fn munmap(&self, region: MappedRegion) -> Result<(), Errno>;
    fn mlock(&self, region: MappedRegion) -> Result<(), Errno>;
    fn munlock(&self, region: MappedRegion) -> Result<(), Errno>;
    fn msync(&self, region: MappedRegion, flags: MemSync) -> Result<(), Errno>;
}
