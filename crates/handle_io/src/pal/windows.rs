// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::{CStr, CString, c_void};
use std::ptr;

use windows_sys::Win32::Foundation::{
    CloseHandle, DUPLICATE_SAME_ACCESS, DuplicateHandle, GetLastError, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CREATE_ALWAYS, CREATE_NEW, CreateFileA, FILE_ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_TEMPORARY, FILE_BEGIN,
    FILE_CURRENT, FILE_END, FILE_FLAG_DELETE_ON_CLOSE, FILE_FLAG_NO_BUFFERING, FILE_FLAG_POSIX_SEMANTICS,
    FILE_FLAG_WRITE_THROUGH, FILE_GENERIC_READ, FILE_GENERIC_WRITE, FILE_NAME_NORMALIZED, FILE_SHARE_DELETE,
    FILE_SHARE_READ, FILE_SHARE_WRITE, FlushFileBuffers, GetFinalPathNameByHandleA, OPEN_ALWAYS, OPEN_EXISTING,
    ReadFile, SetEndOfFile, SetFilePointerEx, TRUNCATE_EXISTING, WriteFile,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingA, FILE_MAP_READ, FILE_MAP_WRITE, FlushViewOfFile, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
    PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_NOACCESS, PAGE_READONLY, PAGE_READWRITE,
    UnmapViewOfFile, VirtualLock, VirtualUnlock,
};
use windows_sys::Win32::System::Pipes::CreatePipe;
use windows_sys::Win32::System::Threading::GetCurrentProcess;

use crate::pal::truncate::{PositionedTruncate, truncate_preserving_position};
use crate::pal::win32_tables::{PageProtection, ViewAccess, errno_from_win32, is_end_of_data, split_u64, win32_protection};
use crate::pal::{Bindings, MappedRegion};
use crate::{Errno, Fd, MemMapFlags, MemProt, MemSync, Mode, OpenFlags, Whence};

/// FFI bindings that target the real operating system that the build is targeting.
///
/// You would only use different bindings in unit tests that need to use mock bindings.
/// Even then, whenever possible, unit tests should use real bindings for maximum realism.
#[derive(Debug, Default)]
pub struct BuildTargetBindings;

impl Bindings for BuildTargetBindings {
    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn open(&self, path: &CStr, flags: OpenFlags, _mode: Mode) -> Result<Fd, Errno> {
        if !flags.intersects(OpenFlags::READ_WRITE) {
            return Err(Errno::EINVAL);
        }

        // SAFETY: The path is a valid NUL-terminated string for the duration of the call.
        let handle = unsafe {
            CreateFileA(
                path.as_ptr().cast(),
                desired_access(flags),
                share_mode(flags),
                ptr::null(),
                creation_disposition(flags),
                flags_and_attributes(flags),
                ptr::null_mut(),
            )
        };

        if handle == INVALID_HANDLE_VALUE {
            return Err(last_errno());
        }

        if flags.contains(OpenFlags::APPEND) {
            if let Err(errno) = seek(handle, 0, Whence::End) {
                // SAFETY: We own the handle we just created and nobody else has seen it.
                unsafe { CloseHandle(handle) };
                return Err(errno);
            }
        }

        Ok(fd_from_handle(handle))
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn creat(&self, path: &CStr, mode: Mode) -> Result<Fd, Errno> {
        self.open(path, OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE, mode)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn openat(&self, dir: Fd, path: &CStr, flags: OpenFlags, mode: Mode) -> Result<Fd, Errno> {
        if is_absolute(path.to_bytes()) {
            return self.open(path, flags, mode);
        }

        let mut full = final_path(handle_from_fd(dir))?;
        full.push(b'\\');
        full.extend_from_slice(path.to_bytes());

        // Both halves came from NUL-free strings.
        let full = CString::new(full).or(Err(Errno::EINVAL))?;
        self.open(&full, flags, mode)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno> {
        let mut read: u32 = 0;

        // SAFETY: The buffer is valid for writes of the clamped length for the duration of the call.
        let ok = unsafe {
            ReadFile(
                handle_from_fd(fd),
                buf.as_mut_ptr(),
                clamp_count(buf.len()),
                &raw mut read,
                ptr::null_mut(),
            )
        };

        if ok == 0 {
            // SAFETY: No safety requirements.
            let code = unsafe { GetLastError() };
            return if is_end_of_data(code) { Ok(0) } else { Err(errno_from_win32(code)) };
        }

        Ok(widen(read))
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize, Errno> {
        let mut written: u32 = 0;

        // SAFETY: The buffer is valid for reads of the clamped length for the duration of the call.
        let ok = unsafe {
            WriteFile(
                handle_from_fd(fd),
                buf.as_ptr(),
                clamp_count(buf.len()),
                &raw mut written,
                ptr::null_mut(),
            )
        };

        if ok == 0 {
            return Err(last_errno());
        }

        Ok(widen(written))
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn lseek(&self, fd: Fd, offset: i64, whence: Whence) -> Result<u64, Errno> {
        seek(handle_from_fd(fd), offset, whence)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn ftruncate(&self, fd: Fd, len: u64) -> Result<(), Errno> {
        truncate_preserving_position(&Win32File(handle_from_fd(fd)), len)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn fsync(&self, fd: Fd) -> Result<(), Errno> {
        // SAFETY: No safety requirements.
        check(unsafe { FlushFileBuffers(handle_from_fd(fd)) })
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn fdatasync(&self, fd: Fd) -> Result<(), Errno> {
        self.fsync(fd)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn dup(&self, fd: Fd) -> Result<Fd, Errno> {
        let mut duplicate: HANDLE = ptr::null_mut();

        // SAFETY: No safety requirements. The pseudo-handle of the current process needs no closing.
        let process = unsafe { GetCurrentProcess() };

        // SAFETY: The out-pointer is valid for the duration of the call.
        check(unsafe {
            DuplicateHandle(
                process,
                handle_from_fd(fd),
                process,
                &raw mut duplicate,
                0,
                0,
                DUPLICATE_SAME_ACCESS,
            )
        })?;

        Ok(fd_from_handle(duplicate))
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn dup2(&self, _fd: Fd, _target: Fd) -> Result<Fd, Errno> {
        // Handle values are chosen by the kernel; there is no way to request a specific one.
        Err(Errno::EINVAL)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn close(&self, fd: Fd) -> Result<(), Errno> {
        // SAFETY: No safety requirements. Closing a handle twice is logically
        // invalid but does not violate Rust language rules, so not a safety concern.
        check(unsafe { CloseHandle(handle_from_fd(fd)) })
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn pipe(&self) -> Result<(Fd, Fd), Errno> {
        let mut read: HANDLE = ptr::null_mut();
        let mut write: HANDLE = ptr::null_mut();

        // SAFETY: The out-pointers are valid for the duration of the call.
        check(unsafe { CreatePipe(&raw mut read, &raw mut write, ptr::null(), 0) })?;

        Ok((fd_from_handle(read), fd_from_handle(write)))
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn mmap(
        &self,
        fd: Fd,
        _addr_hint: usize,
        len: usize,
        prot: MemProt,
        flags: MemMapFlags,
        offset: u64,
    ) -> Result<MappedRegion, Errno> {
        if flags.contains(MemMapFlags::FIXED) {
            return Err(Errno::EINVAL);
        }

        let (page, access) = win32_protection(prot);
        let page = match page {
            PageProtection::NoAccess => PAGE_NOACCESS,
            PageProtection::ReadOnly => PAGE_READONLY,
            PageProtection::Execute => PAGE_EXECUTE,
            PageProtection::ReadWrite => PAGE_READWRITE,
            PageProtection::ExecuteRead => PAGE_EXECUTE_READ,
            PageProtection::ExecuteReadWrite => PAGE_EXECUTE_READWRITE,
        };
        let access = match access {
            ViewAccess::None => 0,
            ViewAccess::Read => FILE_MAP_READ,
            ViewAccess::Write => FILE_MAP_WRITE,
        };

        // The mapping object must cover the whole view, including the leading offset.
        let Some(object_size) = u64::try_from(len).ok().and_then(|len| len.checked_add(offset)) else {
            return Err(Errno::EINVAL);
        };
        let (size_high, size_low) = split_u64(object_size);
        let (offset_high, offset_low) = split_u64(offset);

        // SAFETY: No safety requirements.
        let object = unsafe {
            CreateFileMappingA(
                handle_from_fd(fd),
                ptr::null(),
                page,
                size_high,
                size_low,
                ptr::null(),
            )
        };

        // Unlike most handle-returning calls, this one signals failure with a null handle.
        if object.is_null() {
            return Err(last_errno());
        }

        // SAFETY: The mapping object is valid and covers the requested range.
        let view = unsafe { MapViewOfFile(object, access, offset_high, offset_low, len) };

        if view.Value.is_null() {
            let errno = last_errno();
            // SAFETY: We own the mapping object and nothing else refers to it.
            unsafe { CloseHandle(object) };
            return Err(errno);
        }

        Ok(MappedRegion {
            addr: view.Value.expose_provenance(),
            len,
            object: fd_from_handle(object),
        })
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn munmap(&self, region: MappedRegion) -> Result<(), Errno> {
        let view = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: ptr::with_exposed_provenance_mut(region.addr),
        };

        // SAFETY: The view was returned by MapViewOfFile() and its owner releases it exactly once.
        let unmapped = check(unsafe { UnmapViewOfFile(view) });

        // SAFETY: The mapping object belongs to this region and is released exactly once.
        let closed = check(unsafe { CloseHandle(handle_from_fd(region.object)) });

        unmapped.and(closed)
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn mlock(&self, region: MappedRegion) -> Result<(), Errno> {
        // SAFETY: Locking pages does not change their contents or validity.
        check(unsafe { VirtualLock(view_ptr(region), region.len) })
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn munlock(&self, region: MappedRegion) -> Result<(), Errno> {
        // SAFETY: Unlocking pages does not change their contents or validity.
        check(unsafe { VirtualUnlock(view_ptr(region), region.len) })
    }

    #[cfg_attr(test, mutants::skip)] // Real PAL behavior is not meaningful to mutate, we try mutations manually via mock PAL.
    fn msync(&self, region: MappedRegion, _flags: MemSync) -> Result<(), Errno> {
        // SAFETY: Writing back pages does not change their contents or validity.
        check(unsafe { FlushViewOfFile(view_ptr(region), region.len) })
    }
}

/// Adapts a raw handle to the truncation emulation.
struct Win32File(HANDLE);

impl PositionedTruncate for Win32File {
    fn seek(&self, offset: i64, whence: Whence) -> Result<u64, Errno> {
        seek(self.0, offset, whence)
    }

    fn set_end_of_file(&self) -> Result<(), Errno> {
        // SAFETY: No safety requirements.
        check(unsafe { SetEndOfFile(self.0) })
    }
}

fn seek(handle: HANDLE, offset: i64, whence: Whence) -> Result<u64, Errno> {
    let method = match whence {
        Whence::Set => FILE_BEGIN,
        Whence::Cur => FILE_CURRENT,
        Whence::End => FILE_END,
    };
    let mut position: i64 = 0;

    // SAFETY: The out-pointer is valid for the duration of the call.
    check(unsafe { SetFilePointerEx(handle, offset, &raw mut position, method) })?;

    u64::try_from(position).or(Err(Errno::EINVAL))
}

fn final_path(handle: HANDLE) -> Result<Vec<u8>, Errno> {
    let mut buf = vec![0_u8; 260];

    loop {
        // SAFETY: The buffer is valid for writes of its full length for the duration of the call.
        let needed = unsafe { GetFinalPathNameByHandleA(handle, buf.as_mut_ptr(), clamp_count(buf.len()), FILE_NAME_NORMALIZED) };

        match widen(needed) {
            0 => return Err(last_errno()),
            // On success the length excludes the terminator; on a short buffer it includes it.
            n if n < buf.len() => {
                buf.truncate(n);
                return Ok(buf);
            }
            n => buf.resize(n, 0),
        }
    }
}

fn is_absolute(path: &[u8]) -> bool {
    matches!(path, [b'\\' | b'/', ..] | [_, b':', ..])
}

fn desired_access(flags: OpenFlags) -> u32 {
    let mut access = 0;
    if flags.contains(OpenFlags::READ_ONLY) {
        access |= FILE_GENERIC_READ;
    }
    if flags.contains(OpenFlags::WRITE_ONLY) {
        access |= FILE_GENERIC_WRITE;
    }
    access
}

fn share_mode(flags: OpenFlags) -> u32 {
    let mut share = 0;
    if flags.contains(OpenFlags::TRUNCATE) {
        share |= FILE_SHARE_DELETE;
    }
    if flags.contains(OpenFlags::READ_ONLY) {
        share |= FILE_SHARE_READ;
    }
    if flags.contains(OpenFlags::WRITE_ONLY) {
        share |= FILE_SHARE_WRITE;
    }
    share
}

fn creation_disposition(flags: OpenFlags) -> u32 {
    let create = flags.contains(OpenFlags::CREATE);

    match (create, flags.contains(OpenFlags::EXCLUSIVE), flags.contains(OpenFlags::TRUNCATE)) {
        (true, true, _) => CREATE_NEW,
        (true, false, true) => CREATE_ALWAYS,
        (true, false, false) => OPEN_ALWAYS,
        (false, _, true) => TRUNCATE_EXISTING,
        (false, _, false) => OPEN_EXISTING,
    }
}

fn flags_and_attributes(flags: OpenFlags) -> u32 {
    let mut attributes = FILE_FLAG_POSIX_SEMANTICS;

    if flags.contains(OpenFlags::TEMPORARY) {
        attributes |= FILE_ATTRIBUTE_TEMPORARY | FILE_FLAG_DELETE_ON_CLOSE;
    } else {
        attributes |= FILE_ATTRIBUTE_NORMAL;
    }
    if flags.contains(OpenFlags::DIRECT) {
        attributes |= FILE_FLAG_NO_BUFFERING;
    }
    if flags.intersects(OpenFlags::SYNC | OpenFlags::DSYNC) {
        attributes |= FILE_FLAG_WRITE_THROUGH;
    }

    attributes
}

fn last_errno() -> Errno {
    // SAFETY: No safety requirements.
    errno_from_win32(unsafe { GetLastError() })
}

fn check(ok: i32) -> Result<(), Errno> {
    if ok == 0 { Err(last_errno()) } else { Ok(()) }
}

// Win32 transfers are limited to 32-bit counts; longer requests become short transfers.
fn clamp_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn widen(count: u32) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}

fn handle_from_fd(fd: Fd) -> HANDLE {
    ptr::with_exposed_provenance_mut(fd.as_raw().cast_unsigned())
}

fn fd_from_handle(handle: HANDLE) -> Fd {
    Fd::from_raw(handle.expose_provenance().cast_signed())
}

fn view_ptr(region: MappedRegion) -> *const c_void {
    ptr::with_exposed_provenance(region.addr)
}
