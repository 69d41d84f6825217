// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Platform abstraction layer.
//!
//! Every host call made by this crate goes through the [`Bindings`] trait, so the portable
//! logic above it can be exercised against mock bindings in unit tests.

mod abstractions;
mod facade;
#[cfg_attr(
    all(not(windows), not(test)),
    expect(dead_code, reason = "only the Windows bindings emulate truncation")
)]
mod truncate;
#[cfg_attr(
    all(not(windows), not(test)),
    expect(dead_code, reason = "only the Windows bindings translate through these tables")
)]
mod win32_tables;

pub use abstractions::*;
pub use facade::*;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::*;

/// Facade over the real host bindings, used by handles that are not bound to anything else.
pub static BUILD_TARGET_BINDINGS: BindingsFacade = BindingsFacade::real();
