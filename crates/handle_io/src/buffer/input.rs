// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;
use std::num::NonZeroUsize;

use tracing::{Level, event};

use crate::buffer::{DEFAULT_CAPACITY, Storage, heap_storage, inline_storage};
use crate::error::Interrupted;
use crate::policy::{DefaultPolicy, ErrorPolicy, Sentinel};
use crate::transfer::settle;
use crate::view::FileView;
use crate::{Errno, nz};

/// A read buffer in front of a [`FileView`].
///
/// [`read()`][Self::read] serves requests from buffered bytes when it can and otherwise goes
/// straight to the host; it never refills the buffer. Bytes enter the buffer only through
/// [`fill()`][Self::fill] and [`fwd()`][Self::fwd], which makes byte-at-a-time scanning cheap:
///
/// ```no_run
/// # fn main() -> Result<(), handle_io::FileError> {
/// use handle_io::{File, InputBuffer, Mode, OpenFlags};
///
/// let file = File::open("data.bin", OpenFlags::READ_ONLY, Mode::DEFAULT)?;
/// let mut input = InputBuffer::new(file.view());
///
/// let mut zeros = 0;
/// while input.fwd()? == 1 {
///     if input.data()[0] == 0 {
///         zeros += 1;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InputBuffer<'a, S: Storage, P: ErrorPolicy = DefaultPolicy> {
    file: FileView<'a, P>,
    storage: S,
    begin: usize,
    end: usize,
}

impl<'a, P: ErrorPolicy, const N: usize> InputBuffer<'a, [u8; N], P> {
    /// Creates a buffer of `N` bytes stored inline.
    #[must_use]
    pub fn new(file: FileView<'a, P>) -> Self {
        Self::from_storage(file, inline_storage())
    }
}

impl<'a, P: ErrorPolicy> InputBuffer<'a, Box<[u8]>, P> {
    /// Creates a heap buffer of [`DEFAULT_CAPACITY`] bytes.
    #[must_use]
    pub fn new(file: FileView<'a, P>) -> Self {
        Self::with_capacity(file, nz!(DEFAULT_CAPACITY))
    }

    /// Creates a heap buffer of `capacity` bytes.
    #[must_use]
    pub fn with_capacity(file: FileView<'a, P>, capacity: NonZeroUsize) -> Self {
        Self::from_storage(file, heap_storage(capacity))
    }
}

impl<'a, S: Storage, P: ErrorPolicy> InputBuffer<'a, S, P> {
    fn from_storage(file: FileView<'a, P>, storage: S) -> Self {
        Self {
            file,
            storage,
            begin: 0,
            end: 0,
        }
    }

    /// The view this buffer reads from.
    #[must_use]
    pub const fn file(&self) -> FileView<'a, P> {
        self.file
    }

    /// Size of the store in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.bytes().len()
    }

    /// The buffered bytes not yet consumed. After [`fwd()`][Self::fwd] the first byte is the
    /// current one.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.storage.bytes()[self.begin..self.end]
    }

    /// Number of buffered bytes not yet consumed.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.end - self.begin
    }

    /// Drops all buffered bytes.
    pub const fn discard(&mut self) {
        self.begin = 0;
        self.end = 0;
    }

    fn deliver<T: Sentinel>(&self, result: Result<T, Errno>) -> P::Output<T> {
        P::deliver(result.map_err(|errno| self.file.host().error(errno)))
    }

    /// Reads up to `dst.len()` bytes with at most one host read.
    ///
    /// If the buffered bytes outnumber the request, it is served from the buffer. Otherwise all
    /// buffered bytes are copied out, the rest is read directly from the host into `dst` and the
    /// buffer ends up empty. If that host read fails, the buffer is left untouched.
    pub fn read(&mut self, dst: &mut [u8]) -> P::Output<usize> {
        let result = self.read_once(dst);
        self.deliver(result)
    }

    fn read_once(&mut self, dst: &mut [u8]) -> Result<usize, Errno> {
        let window = self.end - self.begin;

        if dst.len() < window {
            let count = dst.len();
            dst.copy_from_slice(&self.storage.bytes()[self.begin..self.begin + count]);
            self.begin += count;
            return Ok(count);
        }

        let (buffered, rest) = dst.split_at_mut(window);
        buffered.copy_from_slice(self.data());

        let direct = if rest.is_empty() {
            0
        } else {
            event!(Level::TRACE, message = "direct read", fd = %self.file.fd(), buffered = window, requested = rest.len());
            self.file.host().read(rest)?
        };

        self.discard();
        Ok(window + direct)
    }

    /// Reads until `dst` is full or the end of data is reached.
    pub fn read_all(&mut self, dst: &mut [u8]) -> P::Output<usize> {
        let least = dst.len();
        self.read_least(dst, least)
    }

    /// Reads until at least `least` bytes (capped at `dst.len()`) have arrived or the end of
    /// data is reached.
    ///
    /// If an error interrupts the loop after some bytes arrived, those bytes are reported and
    /// the error is left in [`last_error()`][crate::last_error].
    pub fn read_least(&mut self, dst: &mut [u8], least: usize) -> P::Output<usize> {
        let result = self.read_least_inner(dst, least);
        P::deliver(settle(self.file.host(), result))
    }

    fn read_least_inner(&mut self, dst: &mut [u8], least: usize) -> Result<usize, Interrupted> {
        let least = least.min(dst.len());
        let mut total = 0;

        while total < least {
            match self.read_once(&mut dst[total..]) {
                Ok(0) => break,
                Ok(read) => total += read,
                Err(errno) => return Err(Interrupted::new(total, errno)),
            }
        }

        Ok(total)
    }

    /// Issues one host read into the free tail of the buffer and returns its result. Returns 0
    /// without calling the host when the buffer is full.
    pub fn fill(&mut self) -> P::Output<usize> {
        let result = self.fill_once();
        self.deliver(result)
    }

    fn fill_once(&mut self) -> Result<usize, Errno> {
        let end = self.end;
        let tail = &mut self.storage.bytes_mut()[end..];
        if tail.is_empty() {
            return Ok(0);
        }

        let read = self.file.host().read(tail)?;
        self.end += read;
        Ok(read)
    }

    /// Advances to the next byte, refilling as needed. Returns 1 when a byte is available at
    /// `data()[0]` and 0 at the end of data.
    ///
    /// The first call on an empty buffer makes the first byte of the stream current; every
    /// later call consumes the current byte.
    pub fn fwd(&mut self) -> P::Output<usize> {
        let result = self.fwd_once();
        self.deliver(result)
    }

    fn fwd_once(&mut self) -> Result<usize, Errno> {
        if self.begin + 1 < self.end {
            self.begin += 1;
            return Ok(1);
        }

        // At most the current byte is left; drop it and make room for more.
        if self.end >= self.capacity() {
            self.discard();
        } else {
            self.begin = self.end;
        }

        match self.fill_once()? {
            0 => Ok(0),
            _ => Ok(1),
        }
    }
}

impl<S: Storage, P: ErrorPolicy> io::Read for InputBuffer<'_, S, P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_once(buf).map_err(|errno| self.file.host().error(errno).into())
    }
}

impl<S: Storage, P: ErrorPolicy> io::BufRead for InputBuffer<'_, S, P> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.begin == self.end {
            self.discard();
            self.fill_once().map_err(|errno| io::Error::from(self.file.host().error(errno)))?;
        }

        Ok(self.data())
    }

    fn consume(&mut self, amount: usize) {
        self.begin = (self.begin + amount).min(self.end);
    }
}
