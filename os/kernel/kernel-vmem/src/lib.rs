//! # Demand-Paged Virtual Memory
//!
//! The memory manager of a simulated 32-bit machine. User processes get a
//! linear virtual address space that is backed by a small pool of physical
//! frames and a swap file.
//!
//! ## Address Space Layout
//!
//! ```text
//! page 0                                              num_pages - 1
//! | section 0 | section 1 | ... |  stack (N pages)  | arguments |
//!                                ^ SP starts here    ^ argv
//! ```
//!
//! Sections are laid out from page 0 without gaps. The stack follows the
//! last section, and the last page holds the argument pointer table.
//!
//! ## Translation
//!
//! Each process has a flat table of [`PageEntryBits`], one per virtual page:
//!
//! | Bit | Meaning |
//! |:----|:--------|
//! | `valid` | The page is resident in the recorded frame. |
//! | `read_only` | User writes fail. Survives eviction. |
//! | `used` | Touched since the clock hand last passed. |
//! | `dirty` | Differs from its backing copy and must be swapped out. |
//!
//! The [`FrameTable`] is the inverted page table: for every frame it records
//! the owning `(pid, vpn)`, a used bit for the clock, and a pin count.
//! Pinned frames are never chosen as victims.
//!
//! ## Faults
//!
//! ```text
//! fault(pid, vpn)
//!   ├─ free frame in the pool? ─────────────► take it
//!   └─ clock sweep ─┬─ victim ─► dirty? ─► swap out ─► invalidate owner
//!                   └─ all pinned ─► release VM lock, wait for an unpin, retry
//!   then fill the frame from swap │ executable section │ zeros
//! ```
//!
//! ## Locking
//!
//! One VM lock serializes faults, transfers, loads and teardown, see
//! [`VmContext`]. The frame table and each address space have their own
//! short-lived locks underneath it. The VM lock is only given up while a
//! fault waits for a frame to be unpinned.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use std::sync::Arc;
//! # use kernel_fs::MemoryFileSystem;
//! # use kernel_vmem::*;
//! let config = VmConfig::default().with_phys_pages(4);
//! let vm = VmKernel::new(config, Arc::new(MemoryFileSystem::new())).unwrap();
//!
//! let image = ProgramImage::new(VirtualAddress::new(0))
//!     .with_next_section(".text", true, vec![0x90; 100])
//!     .into_arc();
//! let process = vm.spawn(image, &["prog"]).unwrap();
//!
//! let sp = process.initial_sp().as_u32() - 16;
//! vm.write_virtual(process.pid(), VirtualAddress::new(sp), b"hello").unwrap();
//! let mut buf = [0; 5];
//! vm.read_virtual(process.pid(), VirtualAddress::new(sp), &mut buf).unwrap();
//! assert_eq!(&buf, b"hello");
//!
//! let arg0 = VirtualAddress::new(process.argv().as_u32() + 4);
//! assert_eq!(vm.read_virtual_str(process.pid(), arg0, 16).as_deref(), Some("prog"));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

extern crate alloc;

pub mod address_space;
pub mod clock;
pub mod error;
pub mod frame_table;
pub mod image;
mod kernel;
mod page_entry_bits;
pub mod pager;
mod process;
pub mod registry;
mod stats;
pub mod swap;
mod transfer;

pub use crate::address_space::AddressSpace;
pub use crate::clock::{ClockOutcome, ClockPolicy};
pub use crate::error::{
    FaultError, InvariantViolation, LoadError, SYSCALL_FAILURE, SwapError, TransferError,
    VmInitError, transfer_status,
};
pub use crate::frame_table::{FrameDescriptor, FrameOwner, FrameTable};
pub use crate::image::{
    Executable, ExecutableSection, ImageSection, ProcessLayout, ProgramImage, SectionPage,
};
pub use crate::kernel::{VmContext, VmKernel};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::pager::{DemandPager, EagerPager, Pager};
pub use crate::process::Process;
pub use crate::registry::{ProcessId, ProcessRegistry};
pub use crate::stats::{VmStats, VmStatsSnapshot};
pub use crate::swap::{SwapSlot, SwapStore};
pub use kernel_info::config::{ConfigError, PagingMode, VmConfig};
pub use kernel_memory_addresses::{
    FrameNumber, PAGE_SIZE, PageOffset, PhysicalAddress, VirtualAddress, VirtualPageNumber,
};
