use crate::{FileSystem, OpenFile};
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Files stored flat in one directory of the host.
///
/// Names containing path separators are rejected so the kernel cannot
/// escape the root.
pub struct HostFileSystem {
    root: PathBuf,
}

impl HostFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return None;
        }
        Some(self.root.join(name))
    }
}

impl FileSystem for HostFileSystem {
    fn open(&self, name: &str, create: bool) -> Option<Box<dyn OpenFile>> {
        let path = self.path_of(name)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(create)
            .open(&path);
        match file {
            Ok(file) => Some(Box::new(HostFile {
                name: name.to_string(),
                file: Some(file),
                pos: 0,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("cannot open {}: {e}", path.display());
                None
            }
        }
    }

    fn remove(&self, name: &str) -> bool {
        self.path_of(name).is_some_and(|p| fs::remove_file(p).is_ok())
    }
}

struct HostFile {
    name: String,
    file: Option<File>,
    pos: u64,
}

impl OpenFile for HostFile {
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
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        if file.seek(SeekFrom::Start(self.pos)).is_err() {
            return 0;
        }

        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("read from {} failed: {e}", self.name);
                    break;
                }
            }
        }
        self.pos += total as u64;
        total
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        if file.seek(SeekFrom::Start(self.pos)).is_err() {
            return 0;
        }

        let mut total = 0;
        while total < data.len() {
            match file.write(&data[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("write to {} failed: {e}", self.name);
                    break;
                }
            }
        }
        self.pos += total as u64;
        total
    }

    fn length(&self) -> u64 {
        self.file
            .as_ref()
            .and_then(|f| f.metadata().ok())
            .map_or(0, |m| m.len())
    }

    fn close(&mut self) {
        if let Some(file) = self.file.take()
            && let Err(e) = file.sync_all()
        {
            warn!("sync of {} failed: {e}", self.name);
        }
    }
}
