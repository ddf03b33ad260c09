//! Process registry: resolves the process ids stored in the inverted page
//! table back to processes.

use crate::process::Process;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_sync::SpinLock;

/// Kernel-wide process identifier. Never reused within one kernel.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

pub struct ProcessRegistry {
    next_pid: AtomicU32,
    processes: SpinLock<BTreeMap<ProcessId, Arc<Process>>>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(0),
            processes: SpinLock::new(BTreeMap::new()),
        }
    }

    pub fn allocate_pid(&self) -> ProcessId {
        ProcessId(self.next_pid.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert(&self, process: Arc<Process>) {
        let previous = self.processes.lock().insert(process.pid(), process);
        debug_assert!(previous.is_none(), "process id registered twice");
    }

    pub fn get(&self, pid: ProcessId) -> Option<Arc<Process>> {
        self.processes.lock().get(&pid).cloned()
    }

    pub fn remove(&self, pid: ProcessId) -> Option<Arc<Process>> {
        self.processes.lock().remove(&pid)
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.processes.lock().contains_key(&pid)
    }

    /// Registered processes in pid order.
    pub fn all(&self) -> Vec<Arc<Process>> {
        self.processes.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.lock().is_empty()
    }
}
