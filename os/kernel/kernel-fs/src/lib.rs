//! # Raw File Access
//!
//! The narrow file interface the memory manager consumes: open a named file,
//! position within it, and move bytes. There is no buffering and no
//! permission model; short reads and writes are reported to the caller,
//! which decides whether they are fatal.
//!
//! ## Backends
//!
//! * [`MemoryFileSystem`]: files live in RAM. Optionally caps the total
//!   size of every file so tests can provoke short writes.
//! * [`HostFileSystem`] (feature `host`): files live in one directory of
//!   the host file system.
//!
//! ```rust
//! use kernel_fs::{FileSystem, MemoryFileSystem};
//!
//! let fs = MemoryFileSystem::new();
//! let mut file = fs.open("swap", true).unwrap();
//! assert_eq!(file.write(b"page"), 4);
//! file.seek(0);
//! let mut buf = [0u8; 4];
//! assert_eq!(file.read(&mut buf), 4);
//! assert_eq!(&buf, b"page");
//! ```

#![cfg_attr(not(any(test, doctest, feature = "host")), no_std)]

extern crate alloc;

#[cfg(feature = "host")]
mod host;
mod memory;

use alloc::boxed::Box;

#[cfg(feature = "host")]
pub use host::HostFileSystem;
pub use memory::MemoryFileSystem;

/// An open file with a current position.
pub trait OpenFile: Send {
    fn name(&self) -> &str;

    /// Move the position to `pos` bytes from the start.
    fn seek(&mut self, pos: u64);

    fn tell(&self) -> u64;

    /// Read up to `buf.len()` bytes at the current position and advance it.
    ///
    /// Returns the number of bytes read; fewer than requested at end of file
    /// or on error.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write `data` at the current position and advance it.
    ///
    /// Returns the number of bytes written; fewer than `data.len()` means the
    /// backing store refused the rest.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Current length of the file in bytes.
    fn length(&self) -> u64;

    /// Flush and release the handle.
    fn close(&mut self);

    /// Read exactly `buf.len()` bytes at `pos`. Returns the count read.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> usize {
        self.seek(pos);
        self.read(buf)
    }

    /// Write all of `data` at `pos`. Returns the count written.
    fn write_at(&mut self, pos: u64, data: &[u8]) -> usize {
        self.seek(pos);
        self.write(data)
    }
}

/// Named files, shared between kernel threads.
pub trait FileSystem: Send + Sync {
    /// Open `name`, creating an empty file first when `create` is set.
    ///
    /// Returns `None` if the file does not exist and `create` is unset, or
    /// if it cannot be opened.
    fn open(&self, name: &str, create: bool) -> Option<Box<dyn OpenFile>>;

    /// Delete `name`. Returns `true` if it existed and is now gone.
    fn remove(&self, name: &str) -> bool;
}
