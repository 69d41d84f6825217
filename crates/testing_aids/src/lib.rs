// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.

use std::sync::mpsc;
use std::time::Duration;
use std::{env, thread};

mod log;
mod payload;

pub use log::*;
pub use payload::*;

/// If something (whatever) does not happen in a test within this time, the test will fail.
///
/// This only exists to break out of a test that blocks on the host forever, such as a pipe read
/// with no writer. It is not meant to bound any expected wait.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the tests are running under cargo-mutants.
#[must_use]
pub fn is_mutation_testing() -> bool {
    env::var("MUTATION_TESTING").as_deref() == Ok("1")
}

/// Executes a thread-safe function on a background thread and abandons it if
/// it does not complete before [`TEST_TIMEOUT`].
///
/// Returns `None` if the function panicked or timed out.
#[cfg_attr(test, mutants::skip)] // This is test logic - pointless to mutate.
#[must_use]
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if is_mutation_testing() {
        // A mutation that hangs must surface as a cargo-mutants timeout, not as a test failure.
        return Some(f());
    }

    let (sender, receiver) = mpsc::channel();

    // A panic or a hang both leave the channel without a value.
    thread::spawn(move || {
        // The receiver is gone only if the wait already timed out.
        _ = sender.send(f());
    });

    receiver.recv_timeout(TEST_TIMEOUT).ok()
}
