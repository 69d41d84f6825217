// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Portable synchronous file I/O over raw operating system handles.
//!
//! The crate offers one API on Unix and Windows for:
//!
//! * owned and borrowed handles ([`File`], [`FileView`]) with read, write, seek, truncate, sync
//!   and duplicate operations;
//! * anonymous pipes ([`Pipe`]);
//! * memory mappings ([`MemMapping`]);
//! * buffered streams ([`InputBuffer`], [`OutputBuffer`]) that bound the number of host calls
//!   made per operation.
//!
//! # Error policies
//!
//! Every fallible operation reports failure in one of two ways, picked by a type parameter:
//!
//! * [`Typed`] returns `Result<T, FileError>`.
//! * [`ByValue`] returns a sentinel value in place of the result: `-1` for counts and offsets,
//!   `false` for operations without a result and an invalid object for constructors.
//!
//! Under both policies the error code of the latest failure on the current thread can be read
//! with [`last_error()`]. Transfers that fail after moving some bytes report the bytes moved and
//! leave the error code there.
//!
//! The types at the crate root are bound to [`DefaultPolicy`], which is [`Typed`] unless the
//! `value-errors` feature is enabled. The [`typed`] and [`by_value`] modules bind the same
//! types to a fixed policy.
//!
//! ```no_run
//! use handle_io::by_value;
//! use handle_io::{Errno, Mode, OpenFlags, last_error};
//!
//! let file = by_value::File::open("missing.txt", OpenFlags::READ_ONLY, Mode::DEFAULT);
//! if !file.is_valid() {
//!     assert_eq!(last_error(), Errno::ENOENT);
//! }
//! ```

mod error;
mod fd;
mod flags;
mod host;
mod internal_macros;
mod pal;

pub mod buffer;
pub mod file;
pub mod mapping;
pub mod pipe;
pub mod policy;
pub mod transfer;
pub mod view;

pub use error::*;
pub use fd::*;
pub use flags::*;
pub(crate) use internal_macros::nz;
use internal_macros::policy_aliases;
pub use policy::{ByValue, DefaultPolicy, ErrorPolicy, Sentinel, Typed, clear_last_error, last_error};

/// Types bound to the [`Typed`] error policy.
pub mod typed {
    super::policy_aliases!(crate::policy::Typed);
}

/// Types bound to the [`ByValue`] error policy.
pub mod by_value {
    super::policy_aliases!(crate::policy::ByValue);
}

#[cfg(not(feature = "value-errors"))]
pub use typed::*;

#[cfg(feature = "value-errors")]
pub use by_value::*;
