// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tracing::{Level, event};

use crate::file::File;
use crate::pal::{Bindings, BindingsFacade};
use crate::policy::{DefaultPolicy, ErrorPolicy, Sentinel};
use crate::{FileError, NULL_FD};

/// An anonymous unidirectional pipe: bytes written to [`wr`][Self::wr] come out of
/// [`rd`][Self::rd].
///
/// Both ends are independent owned handles and can be moved apart, for example to hand the
/// write end to another thread. Reading from `rd` returns end of data once every handle to the
/// write end is closed.
#[derive(Clone, Debug, Default)]
pub struct Pipe<P: ErrorPolicy = DefaultPolicy> {
    /// The read end.
    pub rd: File<P>,
    /// The write end.
    pub wr: File<P>,
}

impl<P: ErrorPolicy> Pipe<P> {
    /// Creates a new pipe.
    pub fn create() -> P::Output<Self> {
        P::deliver(Self::create_with(BindingsFacade::real()))
    }

    pub(crate) fn create_with(bindings: BindingsFacade) -> Result<Self, FileError> {
        let (rd, wr) = bindings.pipe().map_err(|errno| FileError::new(NULL_FD, errno))?;

        event!(Level::TRACE, message = "pipe created", rd = %rd, wr = %wr);

        Ok(Self {
            rd: File::from_parts(rd, bindings.clone()),
            wr: File::from_parts(wr, bindings),
        })
    }

    /// Whether both ends are open.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.rd.is_valid() && self.wr.is_valid()
    }

    /// Reads from the read end. See [`File::read`].
    pub fn read(&self, buf: &mut [u8]) -> P::Output<usize> {
        self.rd.read(buf)
    }

    /// Writes to the write end. See [`File::write`].
    pub fn write(&self, buf: &[u8]) -> P::Output<usize> {
        self.wr.write(buf)
    }
}

impl<Q: ErrorPolicy> Sentinel for Pipe<Q> {
    type Value = Self;

    fn success(self) -> Self {
        self
    }

    fn failure() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::MockBindings;
    use crate::policy::{ByValue, Typed, last_error};
    use crate::{Errno, Fd};

    #[test]
    fn ends_are_owned_separately() {
        let mut mock = MockBindings::new();
        mock.expect_pipe().times(1).returning(|| Ok((Fd::from_raw(3), Fd::from_raw(4))));
        mock.expect_close().times(2).returning(|_| Ok(()));

        let pipe = Pipe::<Typed>::create_with(BindingsFacade::from_mock(mock)).unwrap();

        assert!(pipe.is_valid());
        assert_eq!(pipe.rd.fd(), Fd::from_raw(3));
        assert_eq!(pipe.wr.fd(), Fd::from_raw(4));

        let Pipe { rd, wr } = pipe;
        drop(wr);
        drop(rd);
    }

    #[test]
    fn failure_yields_invalid_pipe() {
        let mut mock = MockBindings::new();
        mock.expect_pipe().returning(|| Err(Errno::EMFILE));

        let pipe = ByValue::deliver(Pipe::<ByValue>::create_with(BindingsFacade::from_mock(mock)));

        assert!(!pipe.is_valid());
        assert_eq!(last_error(), Errno::EMFILE);
    }
}
