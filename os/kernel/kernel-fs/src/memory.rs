use crate::{FileSystem, OpenFile};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_sync::SpinLock;
use log::trace;

type FileData = Arc<SpinLock<Vec<u8>>>;

/// In-memory file system.
///
/// Open handles share the file's bytes with the directory, so data written
/// through one handle is visible to later opens. Removing a file unlinks it
/// from the directory; open handles keep working on the detached bytes.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: SpinLock<BTreeMap<String, FileData>>,
    capacity: Option<usize>,
    reads_failing: Arc<AtomicBool>,
}

impl MemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files cannot grow past `bytes`; writes beyond it are cut short.
    #[must_use]
    pub fn with_capacity_limit(bytes: usize) -> Self {
        Self {
            capacity: Some(bytes),
            ..Self::default()
        }
    }

    /// While set, reads through every handle of this file system return 0
    /// bytes, including handles opened earlier.
    pub fn fail_reads(&self, fail: bool) {
        self.reads_failing.store(fail, Ordering::Release);
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    /// Length of `name`, if it exists.
    #[must_use]
    pub fn file_len(&self, name: &str) -> Option<usize> {
        let data = self.files.lock().get(name).cloned()?;
        let len = data.lock().len();
        Some(len)
    }
}

impl FileSystem for MemoryFileSystem {
    fn open(&self, name: &str, create: bool) -> Option<Box<dyn OpenFile>> {
        let mut files = self.files.lock();
        let data = match files.get(name) {
            Some(data) => Arc::clone(data),
            None if create => {
                trace!("creating {name}");
                let data = FileData::default();
                files.insert(name.to_string(), Arc::clone(&data));
                data
            }
            None => return None,
        };
        Some(Box::new(MemoryFile {
            name: name.to_string(),
            data,
            pos: 0,
            capacity: self.capacity,
            reads_failing: Arc::clone(&self.reads_failing),
            open: true,
        }))
    }

    fn remove(&self, name: &str) -> bool {
        self.files.lock().remove(name).is_some()
    }
}

struct MemoryFile {
    name: String,
    data: FileData,
    pos: u64,
    capacity: Option<usize>,
    reads_failing: Arc<AtomicBool>,
    open: bool,
}

impl MemoryFile {
    #[allow(clippy::cast_possible_truncation)]
    const fn position(&self) -> usize {
        self.pos as usize
    }
}

impl OpenFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.open || self.reads_failing.load(Ordering::Acquire) {
            return 0;
        }
        let data = self.data.lock();
        let start = self.position().min(data.len());
        let len = buf.len().min(data.len() - start);
        buf[..len].copy_from_slice(&data[start..start + len]);
        drop(data);
        self.pos += len as u64;
        len
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        if !self.open {
            return 0;
        }
        let start = self.position();
        let limit = self.capacity.unwrap_or(usize::MAX);
        let len = bytes.len().min(limit.saturating_sub(start));
        if len == 0 {
            return 0;
        }

        let mut data = self.data.lock();
        if data.len() < start + len {
            data.resize(start + len, 0);
        }
        data[start..start + len].copy_from_slice(&bytes[..len]);
        drop(data);
        self.pos += len as u64;
        len
    }

    fn length(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_without_create_fails_for_missing_file() {
        let fs = MemoryFileSystem::new();
        assert!(fs.open("nope", false).is_none());
        assert!(!fs.exists("nope"));
    }

    #[test]
    fn writes_past_end_zero_fill_the_gap() {
        let fs = MemoryFileSystem::new();
        let mut f = fs.open("f", true).unwrap();
        assert_eq!(f.write_at(4, &[9, 9]), 2);
        assert_eq!(f.length(), 6);

        let mut buf = [0xFFu8; 6];
        assert_eq!(f.read_at(0, &mut buf), 6);
        assert_eq!(buf, [0, 0, 0, 0, 9, 9]);
    }

    #[test]
    fn capacity_limit_cuts_writes_short() {
        let fs = MemoryFileSystem::with_capacity_limit(5);
        let mut f = fs.open("f", true).unwrap();
        assert_eq!(f.write(&[1, 2, 3]), 3);
        assert_eq!(f.write(&[4, 5, 6]), 2);
        assert_eq!(f.write(&[7]), 0);
        assert_eq!(fs.file_len("f"), Some(5));
    }

    #[test]
    fn data_survives_reopen_but_not_remove() {
        let fs = MemoryFileSystem::new();
        let mut f = fs.open("f", true).unwrap();
        f.write(b"abc");
        f.close();
        assert_eq!(f.write(b"x"), 0);

        let mut g = fs.open("f", false).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(g.read(&mut buf), 3);
        assert_eq!(&buf, b"abc");

        assert!(fs.remove("f"));
        assert!(!fs.remove("f"));
        assert!(fs.open("f", false).is_none());
    }

    #[test]
    fn failing_reads_reach_open_handles() {
        let fs = MemoryFileSystem::new();
        let mut f = fs.open("f", true).unwrap();
        f.write(b"abc");

        fs.fail_reads(true);
        let mut buf = [0u8; 3];
        assert_eq!(f.read_at(0, &mut buf), 0);
        assert_eq!(fs.open("f", false).unwrap().read(&mut buf), 0);
        // writes are unaffected
        assert_eq!(f.write_at(3, b"d"), 1);

        fs.fail_reads(false);
        assert_eq!(f.read_at(1, &mut buf), 3);
        assert_eq!(&buf, b"bcd");
    }

    #[test]
    fn short_read_at_end_of_file() {
        let fs = MemoryFileSystem::new();
        let mut f = fs.open("f", true).unwrap();
        f.write(b"ab");
        let mut buf = [0u8; 4];
        assert_eq!(f.read_at(1, &mut buf), 1);
        assert_eq!(f.read_at(10, &mut buf), 0);
    }
}
