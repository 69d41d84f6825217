// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Translation tables for the Win32 host. They are kept free of Win32 types so the mapping
// logic is tested on every build target.

use crate::{Errno, MemProt};

// Win32 system error codes, as documented in winerror.h.
pub mod win32_error {
    pub const NO_ERROR: u32 = 0;
    pub const FILE_NOT_FOUND: u32 = 2;
    pub const PATH_NOT_FOUND: u32 = 3;
    pub const TOO_MANY_OPEN_FILES: u32 = 4;
    pub const ACCESS_DENIED: u32 = 5;
    pub const INVALID_HANDLE: u32 = 6;
    pub const NOT_ENOUGH_MEMORY: u32 = 8;
    pub const OUTOFMEMORY: u32 = 14;
    pub const WRITE_PROTECT: u32 = 19;
    pub const SEEK: u32 = 25;
    pub const SHARING_VIOLATION: u32 = 32;
    pub const HANDLE_EOF: u32 = 38;
    pub const INVALID_PARAMETER: u32 = 87;
    pub const BROKEN_PIPE: u32 = 109;
    pub const NEGATIVE_SEEK: u32 = 131;
}

/// Maps a Win32 error code onto the errno domain. Anything unrecognized becomes `EIO`.
pub fn errno_from_win32(code: u32) -> Errno {
    match code {
        win32_error::NO_ERROR => Errno::NONE,
        win32_error::FILE_NOT_FOUND | win32_error::PATH_NOT_FOUND => Errno::ENOENT,
        win32_error::TOO_MANY_OPEN_FILES => Errno::EMFILE,
        win32_error::ACCESS_DENIED | win32_error::WRITE_PROTECT => Errno::EACCES,
        win32_error::INVALID_HANDLE => Errno::EBADF,
        win32_error::OUTOFMEMORY | win32_error::NOT_ENOUGH_MEMORY => Errno::ENOMEM,
        win32_error::SHARING_VIOLATION => Errno::EBUSY,
        win32_error::SEEK => Errno::ENXIO,
        win32_error::INVALID_PARAMETER | win32_error::NEGATIVE_SEEK => Errno::EINVAL,
        _ => Errno::EIO,
    }
}

/// Whether a failed read with this error code actually means "end of data".
pub fn is_end_of_data(code: u32) -> bool {
    matches!(code, win32_error::HANDLE_EOF | win32_error::BROKEN_PIPE)
}

/// Page protection of the mapping object created for a view.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageProtection {
    NoAccess,
    ReadOnly,
    Execute,
    ReadWrite,
    ExecuteRead,
    ExecuteReadWrite,
}

/// Access requested when mapping a view of a mapping object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ViewAccess {
    None,
    Read,
    Write,
}

/// Chooses the mapping object protection and view access for a portable protection set.
///
/// Write access implies read access on Win32, so write-only requests are widened.
pub fn win32_protection(prot: MemProt) -> (PageProtection, ViewAccess) {
    let read = prot.contains(MemProt::READ);
    let write = prot.contains(MemProt::WRITE);
    let exec = prot.contains(MemProt::EXEC);

    match (read, write, exec) {
        (false, false, false) => (PageProtection::NoAccess, ViewAccess::None),
        (true, false, false) => (PageProtection::ReadOnly, ViewAccess::Read),
        (false, false, true) => (PageProtection::Execute, ViewAccess::None),
        (_, true, false) => (PageProtection::ReadWrite, ViewAccess::Write),
        (true, false, true) => (PageProtection::ExecuteRead, ViewAccess::Read),
        (_, true, true) => (PageProtection::ExecuteReadWrite, ViewAccess::Write),
    }
}

/// Splits a 64-bit quantity into the (high, low) halves Win32 APIs expect.
pub const fn split_u64(value: u64) -> (u32, u32) {
    #[expect(clippy::cast_possible_truncation, reason = "intentional split into halves")]
    let halves = ((value >> 32) as u32, value as u32);
    halves
}
