//! # Simulated Physical Memory and Frame Provisioning
//!
//! The two lowest layers of the memory manager:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Frame Allocator ([`frame_alloc`])      │
//! │    • Pool of free frame numbers                     │
//! │    • All-or-nothing bulk allocation                 │
//! │    • Frames returned on eviction and teardown       │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ FrameNumber
//! ┌─────────────────▼───────────────────────────────────┐
//! │          Physical Memory ([`phys_mem`])             │
//! │    • Flat array of PAGE_SIZE frames                 │
//! │    • Byte `frame * PAGE_SIZE + offset`              │
//! │    • Per-frame locking for concurrent copies        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The allocator only hands out numbers; it never touches frame contents.
//! Who owns an allocated frame is tracked one level up, in the inverted page
//! table of `kernel-vmem`.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::frame_alloc::{FrameAlloc, FreeListFrameAlloc};
//! use kernel_alloc::phys_mem::PhysicalMemory;
//!
//! let memory = PhysicalMemory::new(4);
//! let pool = FreeListFrameAlloc::new(memory.frame_count());
//!
//! let frame = pool.allocate_frame().unwrap();
//! memory.with_frame_mut(frame, |bytes| bytes[0] = 0xAB);
//! assert_eq!(memory.with_frame(frame, |bytes| bytes[0]), 0xAB);
//! pool.recycle_frame(frame);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod frame_alloc;
pub mod phys_mem;
