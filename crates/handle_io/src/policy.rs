// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error delivery policies.
//!
//! Every public fallible operation in this crate is generic over an [`ErrorPolicy`], which
//! decides how the result reaches the caller:
//!
//! * [`Typed`] returns `Result<T, FileError>`.
//! * [`ByValue`] returns a plain value in which failure is encoded as a sentinel (`-1`,
//!   `false` or an invalid object, see [`Sentinel`]).
//!
//! Both policies record the error code of every failure in a thread-local slot that can be
//! inspected with [`last_error()`]. Internally, all operations produce a `Result` and only the
//! outermost layer applies the policy, so the two policies share a single implementation.
//!
//! [`DefaultPolicy`] is selected at build time: it is [`Typed`] unless the `value-errors`
//! feature is enabled. The crate root re-exports the aliases of whichever policy is the
//! default, while [`typed`][crate::typed] and [`by_value`][crate::by_value] name them explicitly.

use std::cell::Cell;
use std::fmt::Debug;

use crate::{Errno, FileError};

thread_local! {
    static LAST_ERROR: Cell<Errno> = const { Cell::new(Errno::NONE) };
}

/// The error code of the most recent failed operation on the calling thread.
///
/// Returns [`Errno::NONE`] if no operation has failed since the thread started or since the
/// last call to [`clear_last_error()`].
#[must_use]
pub fn last_error() -> Errno {
    LAST_ERROR.with(Cell::get)
}

/// Resets the calling thread's last error to [`Errno::NONE`].
pub fn clear_last_error() {
    record_error(Errno::NONE);
}

pub(crate) fn record_error(errno: Errno) {
    LAST_ERROR.with(|slot| slot.set(errno));
}

/// A value that has a distinguished failure representation for the [`ByValue`] policy.
pub trait Sentinel: Sized {
    /// What [`ByValue`] returns in place of `Self`.
    type Value;

    /// Converts a successful result.
    fn success(self) -> Self::Value;

    /// The value that signals failure.
    fn failure() -> Self::Value;
}

impl Sentinel for usize {
    type Value = isize;

    fn success(self) -> isize {
        // Byte counts are bounded by slice lengths, which never exceed `isize::MAX`.
        isize::try_from(self).unwrap_or(isize::MAX)
    }

    fn failure() -> isize {
        -1
    }
}

impl Sentinel for u64 {
    type Value = i64;

    fn success(self) -> i64 {
        i64::try_from(self).unwrap_or(i64::MAX)
    }

    fn failure() -> i64 {
        -1
    }
}

impl Sentinel for () {
    type Value = bool;

    fn success(self) -> bool {
        true
    }

    fn failure() -> bool {
        false
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Typed {}
    impl Sealed for super::ByValue {}
}

/// Decides how fallible operations report their outcome.
///
/// This trait is sealed. The only policies are [`Typed`] and [`ByValue`].
pub trait ErrorPolicy: sealed::Sealed + Clone + Copy + Debug + Default + Send + Sync + 'static {
    /// The return type of an operation that produces `T` on success.
    type Output<T: Sentinel>;

    /// Converts an internal result into the policy's return type, recording any error code in
    /// the thread-local last-error slot.
    fn deliver<T: Sentinel>(result: Result<T, FileError>) -> Self::Output<T>;
}

/// Reports failures as `Err(FileError)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Typed;

impl ErrorPolicy for Typed {
    type Output<T: Sentinel> = Result<T, FileError>;

    fn deliver<T: Sentinel>(result: Result<T, FileError>) -> Result<T, FileError> {
        if let Err(error) = &result {
            record_error(error.errno());
        }

        result
    }
}

/// Reports failures through sentinel values and the thread-local last-error slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByValue;

impl ErrorPolicy for ByValue {
    type Output<T: Sentinel> = T::Value;

    fn deliver<T: Sentinel>(result: Result<T, FileError>) -> T::Value {
        match result {
            Ok(value) => value.success(),
            Err(error) => {
                record_error(error.errno());
                T::failure()
            }
        }
    }
}

/// The policy used by the types re-exported at the crate root.
#[cfg(not(feature = "value-errors"))]
pub type DefaultPolicy = Typed;

/// The policy used by the types re-exported at the crate root.
#[cfg(feature = "value-errors")]
pub type DefaultPolicy = ByValue;
