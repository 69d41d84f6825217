// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::{ptr, slice};

use tracing::{Level, event};

use crate::pal::{Bindings, BindingsFacade, MappedRegion};
use crate::policy::{DefaultPolicy, ErrorPolicy, Sentinel};
use crate::{Errno, FileError, MemSync, NULL_FD};

const EMPTY: MappedRegion = MappedRegion {
    addr: 0,
    len: 0,
    object: NULL_FD,
};

/// An owned mapping of a file range into memory.
///
/// Created by [`File::mmap`][crate::file::File::mmap]. The mapping is released exactly once,
/// either explicitly through [`munmap()`][Self::munmap] or when dropped. It does not keep the
/// file open; the mapping stays valid after the file is closed.
///
/// An empty mapping (zero length) never touches the host.
#[derive(Debug)]
pub struct MemMapping<P: ErrorPolicy = DefaultPolicy> {
    region: MappedRegion,
    bindings: BindingsFacade,
    _policy: PhantomData<P>,
}

impl<P: ErrorPolicy> MemMapping<P> {
    pub(crate) const fn from_parts(region: MappedRegion, bindings: BindingsFacade) -> Self {
        Self {
            region,
            bindings,
            _policy: PhantomData,
        }
    }

    pub(crate) const fn empty(bindings: BindingsFacade) -> Self {
        Self::from_parts(EMPTY, bindings)
    }

    /// Length of the mapping in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.region.len
    }

    /// Whether the mapping is empty, either because it was created with zero length or because
    /// it has been unmapped.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.region.len == 0
    }

    /// Gives up ownership of the mapped range without unmapping it, returning its start.
    ///
    /// The mapping is empty afterwards. The range stays mapped until the process exits or someone
    /// unmaps it through other means.
    pub fn disown(&mut self) -> *mut u8 {
        let region = std::mem::replace(&mut self.region, EMPTY);
        ptr::with_exposed_provenance_mut(region.addr)
    }

    /// The start of the mapping as a pointer to `T`. Null for an empty mapping.
    ///
    /// Dereferencing the pointer is subject to the protection the mapping was created with, and
    /// to the usual aliasing rules for memory that other mappings of the same file can change.
    #[must_use]
    pub fn get<T>(&self) -> *mut T {
        ptr::with_exposed_provenance_mut(self.region.addr)
    }

    /// The mapped bytes.
    ///
    /// # Safety
    ///
    /// The mapping must be readable, and no one may write to the mapped range (through this
    /// process or through the file) while the returned slice is alive.
    #[must_use]
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.is_empty() {
            return &[];
        }

        // SAFETY: The region is a live mapping of `len` bytes and the caller rules out writers.
        unsafe { slice::from_raw_parts(self.get::<u8>(), self.region.len) }
    }

    /// The mapped bytes, mutably.
    ///
    /// # Safety
    ///
    /// The mapping must be readable and writable, and no one else may access the mapped range
    /// (through this process or through the file) while the returned slice is alive.
    #[must_use]
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.is_empty() {
            return &mut [];
        }

        // SAFETY: The region is a live mapping of `len` bytes and the caller rules out other access.
        unsafe { slice::from_raw_parts_mut(self.get::<u8>(), self.region.len) }
    }

    fn deliver(&self, result: Result<(), Errno>) -> P::Output<()> {
        P::deliver(result.map_err(|errno| FileError::new(self.region.object, errno)))
    }

    /// Releases the mapping. The mapping is empty afterwards, even if the host reports an error.
    pub fn munmap(&mut self) -> P::Output<()> {
        let region = std::mem::replace(&mut self.region, EMPTY);
        if region.len == 0 {
            return P::deliver(Ok(()));
        }

        event!(Level::TRACE, message = "unmapping", addr = region.addr, len = region.len);

        P::deliver(self.bindings.munmap(region).map_err(|errno| FileError::new(region.object, errno)))
    }

    /// Locks the mapped pages into physical memory.
    pub fn mlock(&self) -> P::Output<()> {
        if self.is_empty() {
            return P::deliver(Ok(()));
        }

        self.deliver(self.bindings.mlock(self.region))
    }

    /// Allows the mapped pages to be paged out again.
    pub fn munlock(&self) -> P::Output<()> {
        if self.is_empty() {
            return P::deliver(Ok(()));
        }

        self.deliver(self.bindings.munlock(self.region))
    }

    /// Writes modified pages back to the file.
    pub fn msync(&self, flags: MemSync) -> P::Output<()> {
        if self.is_empty() {
            return P::deliver(Ok(()));
        }

        self.deliver(self.bindings.msync(self.region, flags))
    }
}

impl<P: ErrorPolicy> Drop for MemMapping<P> {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }

        if let Err(errno) = self.bindings.munmap(self.region) {
            event!(
                Level::WARN,
                message = "failed to release memory mapping",
                addr = self.region.addr,
                len = self.region.len,
                errno = %errno
            );
        }
    }
}

impl<Q: ErrorPolicy> Sentinel for MemMapping<Q> {
    type Value = Self;

    fn success(self) -> Self {
        self
    }

    fn failure() -> Self {
        Self::empty(BindingsFacade::real())
    }
}
