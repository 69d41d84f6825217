// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;
use std::num::NonZeroUsize;

use tracing::{Level, event};

use crate::buffer::{DEFAULT_CAPACITY, Storage, heap_storage, inline_storage};
use crate::error::Interrupted;
use crate::policy::{DefaultPolicy, ErrorPolicy, Sentinel, record_error};
use crate::transfer::{host_write_least, settle};
use crate::view::FileView;
use crate::{Errno, nz};

/// A write buffer in front of a [`FileView`].
///
/// Small writes accumulate in the buffer. A write that does not fit tops up the buffer, flushes
/// it and sends the remainder straight to the host, so each call issues at most one flush and
/// one direct write. Whatever is still buffered is flushed when the buffer is dropped, as long
/// as the view is valid; flush explicitly to observe errors.
///
/// ```no_run
/// # fn main() -> Result<(), handle_io::FileError> {
/// use handle_io::{ArrayOutputBuffer, File, Mode};
///
/// let file = File::creat("log.txt", Mode::DEFAULT)?;
/// let mut output = ArrayOutputBuffer::<512>::new(file.view());
///
/// for line in ["first\n", "second\n"] {
///     output.write_all(line.as_bytes())?;
/// }
/// output.flush()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OutputBuffer<'a, S: Storage, P: ErrorPolicy = DefaultPolicy> {
    file: FileView<'a, P>,
    storage: S,
    begin: usize,
    end: usize,
}

impl<'a, P: ErrorPolicy, const N: usize> OutputBuffer<'a, [u8; N], P> {
    /// Creates a buffer of `N` bytes stored inline.
    #[must_use]
    pub fn new(file: FileView<'a, P>) -> Self {
        Self::from_storage(file, inline_storage())
    }
}

impl<'a, P: ErrorPolicy> OutputBuffer<'a, Box<[u8]>, P> {
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

impl<'a, S: Storage, P: ErrorPolicy> OutputBuffer<'a, S, P> {
    fn from_storage(file: FileView<'a, P>, storage: S) -> Self {
        Self {
            file,
            storage,
            begin: 0,
            end: 0,
        }
    }

    /// The view this buffer writes to.
    #[must_use]
    pub const fn file(&self) -> FileView<'a, P> {
        self.file
    }

    /// Size of the store in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.bytes().len()
    }

    /// Number of buffered bytes not yet handed to the host.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.end - self.begin
    }

    fn deliver<T: Sentinel>(&self, result: Result<T, Errno>) -> P::Output<T> {
        P::deliver(result.map_err(|errno| self.file.host().error(errno)))
    }

    /// Accepts up to `src.len()` bytes and returns how many were taken from `src`.
    ///
    /// Bytes counted in the return value are either with the host or buffered; none are written
    /// twice or lost. The count can be zero for a non-empty `src` when the buffer was full and
    /// the host took only part of it, in which case space has been freed for the next call.
    pub fn write(&mut self, src: &[u8]) -> P::Output<usize> {
        let result = self.write_once(src);
        self.deliver(result)
    }

    fn write_once(&mut self, src: &[u8]) -> Result<usize, Errno> {
        let capacity = self.capacity();
        let (begin, end) = (self.begin, self.end);
        let avail = capacity - end;

        if src.len() <= avail {
            self.storage.bytes_mut()[end..end + src.len()].copy_from_slice(src);
            self.end += src.len();
            return Ok(src.len());
        }

        event!(Level::TRACE, message = "flushing full buffer", fd = %self.file.fd(), pending = end - begin, incoming = src.len());

        // Top up the free tail so the flush below moves as much as possible.
        self.storage.bytes_mut()[end..].copy_from_slice(&src[..avail]);
        let buffered = capacity - begin;

        let flushed = match host_write_least(self.file.host(), &self.storage.bytes()[begin..], 1) {
            Ok(flushed) => flushed,
            Err(Interrupted { transferred: 0, errno }) => {
                // The topped-up bytes were not accepted, so they must not count as buffered.
                return Err(errno);
            }
            Err(Interrupted { transferred, errno }) => {
                record_error(errno);
                transferred
            }
        };

        if flushed < buffered {
            let remaining = buffered - flushed;
            self.storage.bytes_mut().copy_within(begin + flushed..capacity, 0);
            self.begin = 0;
            self.end = remaining;
            return Ok(avail);
        }

        self.begin = 0;
        self.end = 0;

        match self.file.host().write(&src[avail..]) {
            Ok(direct) => Ok(avail + direct),
            Err(errno) if avail == 0 => Err(errno),
            Err(errno) => {
                record_error(errno);
                Ok(avail)
            }
        }
    }

    /// Accepts the whole of `src`.
    pub fn write_all(&mut self, src: &[u8]) -> P::Output<usize> {
        let least = src.len();
        self.write_least(src, least)
    }

    /// Accepts at least `least` bytes (capped at `src.len()`) of `src`.
    ///
    /// If an error interrupts the loop after some bytes were accepted, those bytes are reported
    /// and the error is left in [`last_error()`][crate::last_error].
    pub fn write_least(&mut self, src: &[u8], least: usize) -> P::Output<usize> {
        let result = self.write_least_inner(src, least);
        P::deliver(settle(self.file.host(), result))
    }

    fn write_least_inner(&mut self, src: &[u8], least: usize) -> Result<usize, Interrupted> {
        let least = least.min(src.len());
        let mut total = 0;

        // A zero count only happens after a partial flush freed space, so the loop progresses.
        while total < least {
            match self.write_once(&src[total..]) {
                Ok(written) => total += written,
                Err(errno) => return Err(Interrupted::new(total, errno)),
            }
        }

        Ok(total)
    }

    /// Hands every buffered byte to the host.
    ///
    /// On failure, the bytes the host did accept are dropped from the buffer and the rest stay
    /// pending.
    pub fn flush(&mut self) -> P::Output<()> {
        let result = self.flush_pending();
        self.deliver(result)
    }

    fn flush_pending(&mut self) -> Result<(), Errno> {
        if self.begin == self.end {
            return Ok(());
        }

        let window = &self.storage.bytes()[self.begin..self.end];

        match host_write_least(self.file.host(), window, window.len()) {
            Ok(_) => {
                self.begin = 0;
                self.end = 0;
                Ok(())
            }
            Err(Interrupted { transferred, errno }) => {
                self.begin += transferred;
                Err(errno)
            }
        }
    }
}

impl<S: Storage, P: ErrorPolicy> Drop for OutputBuffer<'_, S, P> {
    fn drop(&mut self) {
        if !self.file.is_valid() || self.begin == self.end {
            return;
        }

        if let Err(errno) = self.flush_pending() {
            event!(
                Level::WARN,
                message = "dropping unflushed buffered output",
                fd = %self.file.fd(),
                pending = self.end - self.begin,
                errno = %errno
            );
        }
    }
}

impl<S: Storage, P: ErrorPolicy> io::Write for OutputBuffer<'_, S, P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // `Ok(0)` means a closed sink to `std::io`, so a partial flush that freed space is retried.
        let result = self.write_least_inner(buf, 1);
        settle(self.file.host(), result).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending().map_err(|errno| self.file.host().error(errno).into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::Fd;
    use crate::file::File;
    use crate::pal::{BindingsFacade, MockBindings};
    use crate::policy::{ByValue, Typed, clear_last_error, last_error};

    /// A sink that accepts at most `limit` bytes per host write, recording every request.
    fn sink(limit: usize) -> (MockBindings, Arc<Mutex<Vec<u8>>>, Arc<Mutex<Vec<usize>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (written_clone, requests_clone) = (Arc::clone(&written), Arc::clone(&requests));

        let mut mock = MockBindings::new();
        mock.expect_write().returning(move |_, buf| {
            requests_clone.lock().unwrap().push(buf.len());
            let n = buf.len().min(limit);
            written_clone.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        });
        mock.expect_close().returning(|_| Ok(()));

        (mock, written, requests)
    }

    fn file<P: ErrorPolicy>(mock: MockBindings) -> File<P> {
        File::from_parts(Fd::from_raw(4), BindingsFacade::from_mock(mock))
    }

    #[test]
    fn small_writes_stay_buffered() {
        let (mock, written, requests) = sink(usize::MAX);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 16], _>::new(file.view());

        assert_eq!(output.write(b"abc").unwrap(), 3);
        assert_eq!(output.write(b"defg").unwrap(), 4);
        assert_eq!(output.pending(), 7);
        assert!(requests.lock().unwrap().is_empty());

        output.flush().unwrap();
        assert_eq!(written.lock().unwrap().as_slice(), b"abcdefg");
        assert_eq!(output.pending(), 0);
    }

    #[test]
    fn exact_fit_does_not_flush() {
        let (mock, _, requests) = sink(usize::MAX);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 4], _>::new(file.view());

        assert_eq!(output.write(b"wxyz").unwrap(), 4);
        assert_eq!(output.pending(), 4);
        assert!(requests.lock().unwrap().is_empty());

        drop(output);
        assert_eq!(*requests.lock().unwrap(), [4]);
    }

    #[test]
    fn overflow_flushes_once_then_writes_directly_once() {
        let (mock, written, requests) = sink(usize::MAX);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 8], _>::new(file.view());

        output.write(b"abc").unwrap();
        assert_eq!(output.write(b"defghijklmnop").unwrap(), 13);

        assert_eq!(*requests.lock().unwrap(), [8, 8]);
        assert_eq!(written.lock().unwrap().as_slice(), b"abcdefghijklmnop");
        assert_eq!(output.pending(), 0);
    }

    #[test]
    fn partial_flush_keeps_unwritten_tail() {
        let (mock, written, requests) = sink(5);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 8], _>::new(file.view());

        output.write(b"abc").unwrap();

        // Five free bytes get topped up, the host takes five of the eight buffered bytes.
        assert_eq!(output.write(b"defghijk").unwrap(), 5);
        assert_eq!(*requests.lock().unwrap(), [8]);
        assert_eq!(written.lock().unwrap().as_slice(), b"abcde");
        assert_eq!(output.pending(), 3);

        output.flush().unwrap();
        assert_eq!(written.lock().unwrap().as_slice(), b"abcdefgh");
    }

    #[test]
    fn saturated_buffer_with_partial_flush_returns_zero() {
        let (mock, written, _) = sink(3);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 4], _>::new(file.view());

        output.write(b"abcd").unwrap();
        assert_eq!(output.write(b"ef").unwrap(), 0);
        assert_eq!(output.pending(), 1);
        assert_eq!(written.lock().unwrap().as_slice(), b"abc");
    }

    #[test]
    fn write_all_survives_short_host_writes() {
        let (mock, written, _) = sink(3);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<Box<[u8]>, _>::with_capacity(file.view(), nz!(5));

        let payload: Vec<u8> = (0..100).collect();
        for chunk in payload.chunks(7) {
            assert_eq!(output.write_all(chunk).unwrap(), chunk.len());
        }
        output.flush().unwrap();

        assert_eq!(*written.lock().unwrap(), payload);
    }

    #[test]
    fn failed_flush_does_not_consume_top_up() {
        let mut mock = MockBindings::new();
        mock.expect_write().returning(|_, _| Err(Errno::ENOSPC));
        mock.expect_close().returning(|_| Ok(()));

        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 4], _>::new(file.view());

        output.write(b"ab").unwrap();
        assert_eq!(output.write(b"cdef").unwrap_err().errno(), Errno::ENOSPC);
        assert_eq!(output.pending(), 2);

        // The invalid write target stays pending; forget it so drop does not retry.
        let mut view = output.file;
        view.close().unwrap();
        output.file = view;
    }

    #[test]
    fn failed_direct_write_reports_top_up() {
        clear_last_error();

        let mut calls = 0;
        let mut mock = MockBindings::new();
        mock.expect_write().returning(move |_, buf| {
            calls += 1;
            if calls == 1 { Ok(buf.len()) } else { Err(Errno::EIO) }
        });
        mock.expect_close().returning(|_| Ok(()));

        let file = file::<ByValue>(mock);
        let mut output = OutputBuffer::<[u8; 4], _>::new(file.view());

        output.write(b"a");
        assert_eq!(output.write(b"bcdefg"), 3);
        assert_eq!(last_error(), Errno::EIO);
        assert_eq!(output.pending(), 0);
    }

    #[test]
    fn drop_flushes_pending_bytes() {
        let (mock, written, _) = sink(usize::MAX);
        let file = file::<Typed>(mock);

        {
            let mut output = OutputBuffer::<Box<[u8]>, _>::new(file.view());
            output.write(b"tail").unwrap();
        }

        assert_eq!(written.lock().unwrap().as_slice(), b"tail");
    }

    #[test]
    fn partial_flush_then_error_is_reported_as_progress() {
        clear_last_error();

        let mut calls = 0;
        let mut mock = MockBindings::new();
        mock.expect_write().returning(move |_, _| {
            calls += 1;
            if calls == 1 { Ok(2) } else { Err(Errno::EIO) }
        });
        mock.expect_close().returning(|_| Ok(()));

        let (healthy, written, _) = sink(usize::MAX);
        let retry = file::<Typed>(healthy);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 4], _>::new(file.view());

        output.write(b"abcd").unwrap();
        assert_eq!(output.flush().unwrap_err().errno(), Errno::EIO);
        assert_eq!(output.pending(), 2);

        // Retarget the remaining bytes at a healthy sink.
        output.file = retry.view();

        output.flush().unwrap();
        assert_eq!(written.lock().unwrap().as_slice(), b"cd");
        assert_eq!(output.pending(), 0);

        output.flush().unwrap();
        assert_eq!(written.lock().unwrap().as_slice(), b"cd");
    }

    #[test]
    fn std_write_all_survives_saturated_partial_flush() {
        let (mock, written, _) = sink(3);
        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 4], _>::new(file.view());

        io::Write::write_all(&mut output, b"abcd").unwrap();
        io::Write::write_all(&mut output, b"ef").unwrap();
        io::Write::flush(&mut output).unwrap();

        assert_eq!(written.lock().unwrap().as_slice(), b"abcdef");
        assert_eq!(output.pending(), 0);
    }

    #[test]
    fn std_write_reports_error_when_nothing_moved() {
        let mut mock = MockBindings::new();
        mock.expect_write().returning(|_, _| Err(Errno::EPIPE));
        mock.expect_close().returning(|_| Ok(()));

        let file = file::<Typed>(mock);
        let mut output = OutputBuffer::<[u8; 2], _>::new(file.view());

        let error = io::Write::write(&mut output, b"abc").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(output.pending(), 0);
    }

    #[test]
    fn failed_flush_on_drop_is_logged() {
        let capture = testing_aids::LogCapture::new();

        let mut mock = MockBindings::new();
        mock.expect_write().returning(|_, _| Err(Errno::ENOSPC));
        mock.expect_close().returning(|_| Ok(()));
        let file = file::<Typed>(mock);

        {
            let _guard = capture.enable();
            let mut output = OutputBuffer::<[u8; 8], _>::new(file.view());
            output.write(b"lost").unwrap();
        }

        capture.assert_contains("dropping unflushed buffered output");
        capture.assert_contains("pending=4");
        capture.assert_contains("errno=ENOSPC");
    }
}
