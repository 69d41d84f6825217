// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Errno, Whence};

/// The primitives needed to emulate `ftruncate()` on hosts that only offer "set end of file at
/// the current position".
pub trait PositionedTruncate {
    fn seek(&self, offset: i64, whence: Whence) -> Result<u64, Errno>;

    /// Makes the current position the end of the file.
    fn set_end_of_file(&self) -> Result<(), Errno>;
}

/// Sets the length of a file to `len` without moving its file position.
///
/// If moving to `len` fails, the position is restored before the error is returned. If the
/// truncation itself fails, the position is still restored and the truncation error wins.
pub fn truncate_preserving_position(file: &impl PositionedTruncate, len: u64) -> Result<(), Errno> {
    let Ok(target) = i64::try_from(len) else {
        return Err(Errno::EINVAL);
    };
    let current = file.seek(0, Whence::Cur)?;

    if current == len {
        return file.set_end_of_file();
    }

    let restore = || {
        // Best effort. The error being reported takes precedence.
        #[expect(clippy::cast_possible_wrap, reason = "positions reported by the host fit in i64")]
        let _ = file.seek(current as i64, Whence::Set);
    };

    if let Err(errno) = file.seek(target, Whence::Set) {
        restore();
        return Err(errno);
    }

    let truncated = file.set_end_of_file();
    restore();
    truncated
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Default)]
    struct FakeFile {
        position: RefCell<u64>,
        len: RefCell<u64>,
        calls: RefCell<Vec<String>>,
        fail_seek_to: Option<i64>,
        fail_set_end: bool,
    }

    impl PositionedTruncate for FakeFile {
        fn seek(&self, offset: i64, whence: Whence) -> Result<u64, Errno> {
            self.calls.borrow_mut().push(format!("seek({offset}, {whence:?})"));

            if whence == Whence::Set && self.fail_seek_to == Some(offset) {
                return Err(Errno::EINVAL);
            }

            if whence == Whence::Set {
                *self.position.borrow_mut() = u64::try_from(offset).unwrap();
            }

            Ok(*self.position.borrow())
        }

        fn set_end_of_file(&self) -> Result<(), Errno> {
            self.calls.borrow_mut().push("set_end_of_file".to_string());

            if self.fail_set_end {
                return Err(Errno::EACCES);
            }

            *self.len.borrow_mut() = *self.position.borrow();
            Ok(())
        }
    }

    fn file_at(position: u64, len: u64) -> FakeFile {
        FakeFile {
            position: RefCell::new(position),
            len: RefCell::new(len),
            ..FakeFile::default()
        }
    }

    #[test]
    fn truncates_and_restores_position() {
        let file = file_at(10, 100);

        truncate_preserving_position(&file, 40).unwrap();

        assert_eq!(*file.len.borrow(), 40);
        assert_eq!(*file.position.borrow(), 10);
        assert_eq!(
            *file.calls.borrow(),
            ["seek(0, Cur)", "seek(40, Set)", "set_end_of_file", "seek(10, Set)"]
        );
    }

    #[test]
    fn truncating_at_position_does_not_seek() {
        let file = file_at(25, 100);

        truncate_preserving_position(&file, 25).unwrap();

        assert_eq!(*file.len.borrow(), 25);
        assert_eq!(*file.calls.borrow(), ["seek(0, Cur)", "set_end_of_file"]);
    }

    #[test]
    fn failed_seek_restores_position() {
        let file = FakeFile {
            fail_seek_to: Some(40),
            ..file_at(10, 100)
        };

        assert_eq!(truncate_preserving_position(&file, 40), Err(Errno::EINVAL));

        assert_eq!(*file.len.borrow(), 100);
        assert_eq!(*file.position.borrow(), 10);
        assert_eq!(file.calls.borrow().last().unwrap(), "seek(10, Set)");
    }

    #[test]
    fn failed_truncation_restores_position() {
        let file = FakeFile {
            fail_set_end: true,
            ..file_at(10, 100)
        };

        assert_eq!(truncate_preserving_position(&file, 40), Err(Errno::EACCES));

        assert_eq!(*file.len.borrow(), 100);
        assert_eq!(*file.position.borrow(), 10);
    }

    #[test]
    fn oversized_length_is_rejected() {
        let file = file_at(0, 0);

        assert_eq!(truncate_preserving_position(&file, u64::MAX), Err(Errno::EINVAL));
        assert!(file.calls.borrow().is_empty());
    }
}
