// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::subscriber::DefaultGuard;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log output of the current thread for inspection by a test.
///
/// ```
/// use testing_aids::LogCapture;
///
/// let capture = LogCapture::new();
/// {
///     let _guard = capture.enable();
///     tracing::warn!(fd = 3, "failed to close handle");
/// }
///
/// capture.assert_contains("failed to close handle");
/// capture.assert_contains("fd=3");
/// ```
#[derive(Clone, Debug, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber that records events of every level into this capture.
    #[must_use]
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + use<> {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .without_time()
            .finish()
    }

    /// Routes the current thread's events into this capture until the guard is dropped.
    #[must_use = "capturing stops when the guard is dropped"]
    pub fn enable(&self) -> DefaultGuard {
        tracing::subscriber::set_default(self.subscriber())
    }

    /// Everything captured so far.
    #[must_use]
    pub fn output(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// # Panics
    ///
    /// Panics if the captured output does not contain `expected`.
    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// # Panics
    ///
    /// Panics if the captured output contains `unexpected`.
    pub fn assert_not_contains(&self, unexpected: &str) {
        let output = self.output();
        assert!(
            !output.contains(unexpected),
            "log output unexpectedly contains '{unexpected}', got:\n{output}"
        );
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Appends to the buffer of the [`LogCapture`] that created it.
#[derive(Debug)]
pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_is_scoped_to_guard() {
        let capture = LogCapture::new();

        {
            let _guard = capture.enable();
            tracing::trace!(len = 7, "inside");
        }
        tracing::error!("outside");

        capture.assert_contains("inside");
        capture.assert_contains("len=7");
        capture.assert_not_contains("outside");
    }

    #[test]
    fn clones_share_output() {
        let capture = LogCapture::new();
        let clone = capture.clone();

        {
            let _guard = clone.enable();
            tracing::info!("shared");
        }

        capture.assert_contains("shared");
    }
}
