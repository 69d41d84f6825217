// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::{CStr, c_int};
use std::ptr;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
use libc::{ftruncate64 as ftruncate, lseek64 as lseek, mmap64 as mmap};
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
use libc::{ftruncate, lseek, mmap};

use crate::pal::{Bindings, MappedRegion};
use crate::{Errno, Fd, MemMapFlags, MemProt, MemSync, Mode, NULL_FD, OpenFlags, Whence};

/// FFI bindings that target the real operating system that the build is targeting.
///
/// You would only use different bindings in unit tests that need to use mock bindings.
/// Even then, whenever possible, unit tests should use real bindings for maximum realism.
#[derive(Debug, Default)]
pub struct BuildTargetBindings;

impl Bindings for BuildTargetBindings {
    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn open(&self, path: &CStr, flags: OpenFlags, mode: Mode) -> Result<Fd, Errno> {
        let native = native_open_flags(flags)?;

        // SAFETY: The path is a valid NUL-terminated string for the duration of the call.
        let fd = unsafe { libc::open(path.as_ptr(), native, mode.bits()) };
        check(fd).map(Fd::from_raw)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn creat(&self, path: &CStr, mode: Mode) -> Result<Fd, Errno> {
        let native = libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC;

        // SAFETY: The path is a valid NUL-terminated string for the duration of the call.
        let fd = unsafe { libc::open(path.as_ptr(), native, mode.bits()) };
        check(fd).map(Fd::from_raw)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn openat(&self, dir: Fd, path: &CStr, flags: OpenFlags, mode: Mode) -> Result<Fd, Errno> {
        let native = native_open_flags(flags)?;

        // SAFETY: The path is a valid NUL-terminated string for the duration of the call.
        // An invalid directory descriptor is reported by the host as EBADF.
        let fd = unsafe { libc::openat(dir.as_raw(), path.as_ptr(), native, mode.bits()) };
        check(fd).map(Fd::from_raw)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno> {
        // SAFETY: The buffer is valid for writes of its full length for the duration of the call.
        let count = unsafe { libc::read(fd.as_raw(), buf.as_mut_ptr().cast(), buf.len()) };
        check_count(count)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize, Errno> {
        // SAFETY: The buffer is valid for reads of its full length for the duration of the call.
        let count = unsafe { libc::write(fd.as_raw(), buf.as_ptr().cast(), buf.len()) };
        check_count(count)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn lseek(&self, fd: Fd, offset: i64, whence: Whence) -> Result<u64, Errno> {
        let whence = match whence {
            Whence::Set => libc::SEEK_SET,
            Whence::Cur => libc::SEEK_CUR,
            Whence::End => libc::SEEK_END,
        };

        // SAFETY: No safety requirements.
        let position = unsafe { lseek(fd.as_raw(), offset, whence) };

        if position < 0 {
            Err(Errno::last_os_error())
        } else {
            Ok(position.cast_unsigned())
        }
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn ftruncate(&self, fd: Fd, len: u64) -> Result<(), Errno> {
        let Ok(len) = i64::try_from(len) else {
            return Err(Errno::EINVAL);
        };

        // SAFETY: No safety requirements.
        check(unsafe { ftruncate(fd.as_raw(), len) }).map(drop)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn fsync(&self, fd: Fd) -> Result<(), Errno> {
        // SAFETY: No safety requirements.
        check(unsafe { libc::fsync(fd.as_raw()) }).map(drop)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn fdatasync(&self, fd: Fd) -> Result<(), Errno> {
        // Apple platforms have no fdatasync(); a full sync is a superset.
        #[cfg(target_vendor = "apple")]
        let result = {
            // SAFETY: No safety requirements.
            unsafe { libc::fsync(fd.as_raw()) }
        };

        #[cfg(not(target_vendor = "apple"))]
        let result = {
            // SAFETY: No safety requirements.
            unsafe { libc::fdatasync(fd.as_raw()) }
        };

        check(result).map(drop)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn dup(&self, fd: Fd) -> Result<Fd, Errno> {
        // SAFETY: No safety requirements.
        check(unsafe { libc::dup(fd.as_raw()) }).map(Fd::from_raw)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn dup2(&self, fd: Fd, target: Fd) -> Result<Fd, Errno> {
        // SAFETY: No safety requirements. Replacing a descriptor owned by someone else is a
        // logic error but does not violate Rust language rules.
        check(unsafe { libc::dup2(fd.as_raw(), target.as_raw()) }).map(Fd::from_raw)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn close(&self, fd: Fd) -> Result<(), Errno> {
        // SAFETY: No safety requirements. Closing a descriptor twice is logically
        // invalid but does not violate Rust language rules, so not a safety concern.
        check(unsafe { libc::close(fd.as_raw()) }).map(drop)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn pipe(&self) -> Result<(Fd, Fd), Errno> {
        let mut fds: [c_int; 2] = [-1; 2];

        // SAFETY: The array has room for the two descriptors the call writes.
        check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;

        Ok((Fd::from_raw(fds[0]), Fd::from_raw(fds[1])))
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn mmap(
        &self,
        fd: Fd,
        addr_hint: usize,
        len: usize,
        prot: MemProt,
        flags: MemMapFlags,
        offset: u64,
    ) -> Result<MappedRegion, Errno> {
        let Ok(offset) = i64::try_from(offset) else {
            return Err(Errno::EINVAL);
        };

        let native_flags = native_map_flags(flags)?;

        // SAFETY: The hint is only advisory unless FIXED is requested, in which case the caller
        // of the public API has asserted that the range may be replaced.
        let addr = unsafe {
            mmap(
                ptr::with_exposed_provenance_mut(addr_hint),
                len,
                native_prot(prot),
                native_flags,
                fd.as_raw(),
                offset,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(Errno::last_os_error());
        }

        Ok(MappedRegion {
            addr: addr.expose_provenance(),
            len,
            object: NULL_FD,
        })
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn munmap(&self, region: MappedRegion) -> Result<(), Errno> {
        // SAFETY: The region was returned by mmap() and its owner releases it exactly once.
        check(unsafe { libc::munmap(ptr::with_exposed_provenance_mut(region.addr), region.len) }).map(drop)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn mlock(&self, region: MappedRegion) -> Result<(), Errno> {
        // SAFETY: Locking pages does not change their contents or validity.
        check(unsafe { libc::mlock(ptr::with_exposed_provenance(region.addr), region.len) }).map(drop)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn munlock(&self, region: MappedRegion) -> Result<(), Errno> {
        // SAFETY: Unlocking pages does not change their contents or validity.
        check(unsafe { libc::munlock(ptr::with_exposed_provenance(region.addr), region.len) }).map(drop)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn msync(&self, region: MappedRegion, flags: MemSync) -> Result<(), Errno> {
        // SAFETY: Writing back pages does not change their contents or validity.
        check(unsafe {
            libc::msync(
                ptr::with_exposed_provenance_mut(region.addr),
                region.len,
                native_sync_flags(flags),
            )
        })
        .map(drop)
    }
}

fn check(result: c_int) -> Result<c_int, Errno> {
    if result == -1 {
        Err(Errno::last_os_error())
    } else {
        Ok(result)
    }
}

fn check_count(count: isize) -> Result<usize, Errno> {
    if count < 0 {
        Err(Errno::last_os_error())
    } else {
        Ok(count.cast_unsigned())
    }
}

/// Translates portable open flags, rejecting what this host cannot express.
fn native_open_flags(flags: OpenFlags) -> Result<c_int, Errno> {
    let mut native = if flags.contains(OpenFlags::READ_WRITE) {
        libc::O_RDWR
    } else if flags.contains(OpenFlags::WRITE_ONLY) {
        libc::O_WRONLY
    } else if flags.contains(OpenFlags::READ_ONLY) {
        libc::O_RDONLY
    } else {
        return Err(Errno::EINVAL);
    };

    let simple = [
        (OpenFlags::CREATE, libc::O_CREAT),
        (OpenFlags::TRUNCATE, libc::O_TRUNC),
        (OpenFlags::APPEND, libc::O_APPEND),
        (OpenFlags::EXCLUSIVE, libc::O_EXCL),
        (OpenFlags::SYNC, libc::O_SYNC),
        (OpenFlags::DSYNC, libc::O_DSYNC),
    ];

    for (portable, host) in simple {
        if flags.contains(portable) {
            native |= host;
        }
    }

    if flags.contains(OpenFlags::TEMPORARY) {
        native |= temporary_flag()?;
    }

    if flags.contains(OpenFlags::DIRECT) {
        native |= direct_flag()?;
    }

    Ok(native)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const fn temporary_flag() -> Result<c_int, Errno> {
    Ok(libc::O_TMPFILE)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const fn temporary_flag() -> Result<c_int, Errno> {
    Err(Errno::EINVAL)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const fn direct_flag() -> Result<c_int, Errno> {
    Ok(libc::O_DIRECT)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const fn direct_flag() -> Result<c_int, Errno> {
    Err(Errno::EINVAL)
}

fn native_prot(prot: MemProt) -> c_int {
    let mut native = libc::PROT_NONE;

    if prot.contains(MemProt::READ) {
        native |= libc::PROT_READ;
    }
    if prot.contains(MemProt::WRITE) {
        native |= libc::PROT_WRITE;
    }
    if prot.contains(MemProt::EXEC) {
        native |= libc::PROT_EXEC;
    }

    native
}

fn native_map_flags(flags: MemMapFlags) -> Result<c_int, Errno> {
    let mut native = match (flags.contains(MemMapFlags::SHARED), flags.contains(MemMapFlags::PRIVATE)) {
        (true, false) => libc::MAP_SHARED,
        (false, true) => libc::MAP_PRIVATE,
        _ => return Err(Errno::EINVAL),
    };

    if flags.contains(MemMapFlags::FIXED) {
        native |= libc::MAP_FIXED;
    }

    Ok(native)
}

fn native_sync_flags(flags: MemSync) -> c_int {
    let mut native = 0;

    if flags.contains(MemSync::ASYNC) {
        native |= libc::MS_ASYNC;
    }
    if flags.contains(MemSync::SYNC) {
        native |= libc::MS_SYNC;
    }
    if flags.contains(MemSync::INVALIDATE) {
        native |= libc::MS_INVALIDATE;
    }

    native
}
