//! Error types of the memory manager.

use crate::registry::ProcessId;
use crate::swap::SwapSlot;
use alloc::string::String;
use kernel_info::config::ConfigError;
use kernel_memory_addresses::{FrameNumber, VirtualAddress, VirtualPageNumber};

/// Value a failed transfer reports to user code through the syscall layer.
pub const SYSCALL_FAILURE: i32 = -1;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SwapError {
    #[error("short write to swap slot {slot}: {written} of {expected} bytes")]
    ShortWrite {
        slot: SwapSlot,
        written: usize,
        expected: usize,
    },
    #[error("short read from swap slot {slot}: {read} of {expected} bytes")]
    ShortRead {
        slot: SwapSlot,
        read: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FaultError {
    #[error("no process with id {0}")]
    NoSuchProcess(ProcessId),
    #[error("{0} has exited")]
    ProcessExited(ProcessId),
    #[error("{vpn} is outside the address space of {pid}")]
    OutOfRange { pid: ProcessId, vpn: VirtualPageNumber },
    #[error("{vpn} of {pid} is not resident and its pager does not fault pages in")]
    NotResident { pid: ProcessId, vpn: VirtualPageNumber },
    #[error("paging through swap failed")]
    Swap(#[from] SwapError),
}

/// Failure of [`read_virtual`](crate::VmKernel::read_virtual) or
/// [`write_virtual`](crate::VmKernel::write_virtual).
///
/// Transfers that stop early because a page could not be faulted in are not
/// errors; they report the bytes moved so far.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TransferError {
    #[error("no process with id {0}")]
    NoSuchProcess(ProcessId),
    #[error("write to read-only page at {vaddr} after {transferred} bytes")]
    ReadOnly {
        vaddr: VirtualAddress,
        transferred: usize,
    },
    #[error("{vaddr} is past the end of the address space after {transferred} bytes")]
    OutOfRange {
        vaddr: VirtualAddress,
        transferred: usize,
    },
}

impl TransferError {
    /// The syscall return value for this failure.
    #[must_use]
    pub const fn syscall_code(&self) -> i32 {
        SYSCALL_FAILURE
    }

    /// Bytes moved before the transfer failed.
    #[must_use]
    pub const fn transferred(&self) -> usize {
        match self {
            Self::NoSuchProcess(_) => 0,
            Self::ReadOnly { transferred, .. } | Self::OutOfRange { transferred, .. } => {
                *transferred
            }
        }
    }
}

/// Convert a transfer result into the value returned to user code.
///
/// Counts past `i32::MAX` saturate instead of wrapping negative.
#[must_use]
pub fn transfer_status(result: &Result<usize, TransferError>) -> i32 {
    match result {
        Ok(n) => i32::try_from(*n).unwrap_or(i32::MAX),
        Err(e) => e.syscall_code(),
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("section {section} starts at {found}, expected {expected}")]
    FragmentedExecutable {
        section: String,
        expected: VirtualPageNumber,
        found: VirtualPageNumber,
    },
    #[error("image needs {pages} pages, more than a 32-bit address space holds")]
    ImageTooLarge { pages: u64 },
    #[error("arguments need {bytes} bytes, more than one page")]
    ArgumentsTooLong { bytes: usize },
    #[error("process needs {needed} frames, only {available} available")]
    InsufficientMemory { needed: u32, available: u32 },
    #[error("only {written} of {expected} argument bytes could be written")]
    ArgumentsNotWritten { written: usize, expected: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum VmInitError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("cannot create swap file {0:?}")]
    SwapFile(String),
}

/// A broken link between the inverted page table and an address space.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{frame} is owned by {pid}, which is not registered")]
    UnknownOwner { frame: FrameNumber, pid: ProcessId },
    #[error("{frame} claims {vpn} of {pid}, whose entry does not map it")]
    BackPointerMismatch {
        frame: FrameNumber,
        pid: ProcessId,
        vpn: VirtualPageNumber,
    },
    #[error("{vpn} of {pid} maps {frame}, which does not point back")]
    UntrackedMapping {
        pid: ProcessId,
        vpn: VirtualPageNumber,
        frame: FrameNumber,
    },
    #[error("swap slot {0} is held by more than one page")]
    SwapSlotShared(SwapSlot),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_status_saturates_large_counts() {
        assert_eq!(transfer_status(&Ok(5)), 5);
        assert_eq!(transfer_status(&Ok(i32::MAX as usize)), i32::MAX);
        assert_eq!(transfer_status(&Ok(usize::MAX)), i32::MAX);
    }
}
