// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retrying transfers that keep calling the host until a byte goal is met.
//!
//! When the host fails after some bytes have already moved, these helpers report the bytes that
//! moved and leave the error code in [`last_error()`][crate::last_error]. An error is only
//! returned when nothing was transferred at all, so no byte the caller handed over is ever
//! unaccounted for.

use tracing::{Level, event};

use crate::error::Interrupted;
use crate::host::Host;
use crate::policy::{ErrorPolicy, record_error};
use crate::view::FileView;
use crate::{Errno, FileError};

/// Reads until `buf` is full or the end of data is reached.
pub fn read_all<P: ErrorPolicy>(file: FileView<'_, P>, buf: &mut [u8]) -> P::Output<usize> {
    let least = buf.len();
    read_least(file, buf, least)
}

/// Reads until at least `least` bytes (capped at `buf.len()`) have arrived or the end of data is
/// reached. Each host read asks for all of the remaining space in `buf`.
pub fn read_least<P: ErrorPolicy>(file: FileView<'_, P>, buf: &mut [u8], least: usize) -> P::Output<usize> {
    let host = file.host();
    P::deliver(settle(host, host_read_least(host, buf, least)))
}

/// Writes the whole of `buf`.
pub fn write_all<P: ErrorPolicy>(file: FileView<'_, P>, buf: &[u8]) -> P::Output<usize> {
    write_least(file, buf, buf.len())
}

/// Writes until at least `least` bytes (capped at `buf.len()`) have been accepted. Each host
/// write offers all of the remaining bytes in `buf`.
pub fn write_least<P: ErrorPolicy>(file: FileView<'_, P>, buf: &[u8], least: usize) -> P::Output<usize> {
    let host = file.host();
    P::deliver(settle(host, host_write_least(host, buf, least)))
}

pub(crate) fn host_read_least(host: Host<'_>, buf: &mut [u8], least: usize) -> Result<usize, Interrupted> {
    let least = least.min(buf.len());
    let mut total = 0;

    while total < least {
        match host.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(read) => total += read,
            Err(errno) => return Err(Interrupted::new(total, errno)),
        }
    }

    Ok(total)
}

pub(crate) fn host_write_least(host: Host<'_>, buf: &[u8], least: usize) -> Result<usize, Interrupted> {
    let least = least.min(buf.len());
    let mut total = 0;

    while total < least {
        match host.write(&buf[total..]) {
            // A host that accepts nothing would otherwise be retried forever.
            Ok(0) => return Err(Interrupted::new(total, Errno::EIO)),
            Ok(written) => total += written,
            Err(errno) => return Err(Interrupted::new(total, errno)),
        }
    }

    Ok(total)
}

/// Turns an interrupted transfer into a short count if anything moved.
pub(crate) fn settle(host: Host<'_>, result: Result<usize, Interrupted>) -> Result<usize, FileError> {
    match result {
        Ok(total) => Ok(total),
        Err(Interrupted { transferred: 0, errno }) => Err(host.error(errno)),
        Err(Interrupted { transferred, errno }) => {
            event!(
                Level::DEBUG,
                message = "transfer interrupted after partial progress",
                fd = %host.fd(),
                transferred,
                errno = %errno
            );
            record_error(errno);
            Ok(transferred)
        }
    }
}
