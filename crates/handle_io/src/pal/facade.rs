// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::CStr;
use std::fmt::Debug;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockBindings;
use crate::pal::{Bindings, BuildTargetBindings, MappedRegion};
use crate::{Errno, Fd, MemMapFlags, MemProt, MemSync, Mode, OpenFlags, Whence};

// Hides the difference between mock and real bindings behind a common facade.
#[derive(Clone, Debug)]
pub enum BindingsFacade {
    Real(&'static BuildTargetBindings),

    #[cfg(test)]
    Mock(Arc<MockBindings>),
}

impl BindingsFacade {
    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    pub const fn real() -> Self {
        Self::Real(&BuildTargetBindings)
    }

    #[cfg(test)]
    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    pub fn from_mock(bindings: MockBindings) -> Self {
        Self::Mock(Arc::new(bindings))
    }
}

impl Default for BindingsFacade {
    fn default() -> Self {
        Self::real()
    }
}

macro_rules! forward {
    ($self:ident.$method:ident($($arg:expr),*)) => {
        match $self {
            Self::Real(real) => real.$method($($arg),*),
            #[cfg(test)]
            Self::Mock(mock) => mock.$method($($arg),*),
        }
    };
}

impl Bindings for BindingsFacade {
    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn open(&self, path: &CStr, flags: OpenFlags, mode: Mode) -> Result<Fd, Errno> {
        forward!(self.open(path, flags, mode))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn creat(&self, path: &CStr, mode: Mode) -> Result<Fd, Errno> {
        forward!(self.creat(path, mode))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn openat(&self, dir: Fd, path: &CStr, flags: OpenFlags, mode: Mode) -> Result<Fd, Errno> {
        forward!(self.openat(dir, path, flags, mode))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno> {
        forward!(self.read(fd, buf))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize, Errno> {
        forward!(self.write(fd, buf))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn lseek(&self, fd: Fd, offset: i64, whence: Whence) -> Result<u64, Errno> {
        forward!(self.lseek(fd, offset, whence))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn ftruncate(&self, fd: Fd, len: u64) -> Result<(), Errno> {
        forward!(self.ftruncate(fd, len))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn fsync(&self, fd: Fd) -> Result<(), Errno> {
        forward!(self.fsync(fd))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn fdatasync(&self, fd: Fd) -> Result<(), Errno> {
        forward!(self.fdatasync(fd))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn dup(&self, fd: Fd) -> Result<Fd, Errno> {
        forward!(self.dup(fd))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn dup2(&self, fd: Fd, target: Fd) -> Result<Fd, Errno> {
        forward!(self.dup2(fd, target))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn close(&self, fd: Fd) -> Result<(), Errno> {
        forward!(self.close(fd))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn pipe(&self) -> Result<(Fd, Fd), Errno> {
        forward!(self.pipe())
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn mmap(
        &self,
        fd: Fd,
        addr_hint: usize,
        len: usize,
        prot: MemProt,
        flags: MemMapFlags,
        offset: u64,
    ) -> Result<MappedRegion, Errno> {
        forward!(self.mmap(fd, addr_hint, len, prot, flags, offset))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn munmap(&self, region: MappedRegion) -> Result<(), Errno> {
        forward!(self.munmap(region))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn mlock(&self, region: MappedRegion) -> Result<(), Errno> {
        forward!(self.mlock(region))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn munlock(&self, region: MappedRegion) -> Result<(), Errno> {
        forward!(self.munlock(region))
    }

    #[cfg_attr(test, mutants::skip)] // Low-impact layer, waste of time to mutate.
    fn msync(&self, region: MappedRegion, flags: MemSync) -> Result<(), Errno> {
        forward!(self.msync(region, flags))
    }
}
