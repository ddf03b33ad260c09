//! # Kernel Configuration
//!
//! System-wide constants and the runtime configuration of the virtual memory
//! manager.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! Compile-time sizes: the page size, the default number of physical frames,
//! and the stack and argument pages appended to every process image.
//!
//! ```text
//! Process address space (virtual pages):
//!
//! 0                  ┌─────────────────────────────────┐
//!                    │  Executable sections            │
//!                    │  (contiguous, code may be RO)   │
//! sections           ├─────────────────────────────────┤
//!                    │  Stack (stack_pages)            │
//!                    │  grows down from here ↑         │
//! sections + stack   ├─────────────────────────────────┤
//!                    │  Argument page (argv)           │
//! num_pages          └─────────────────────────────────┘
//! ```
//!
//! ### Configuration ([`config`])
//! [`VmConfig`](config::VmConfig) selects the number of frames, the stack
//! size, the default [`PagingMode`](config::PagingMode) and the swap file
//! name. It can be built in code or parsed from a configuration file:
//!
//! ```rust
//! use kernel_info::config::{PagingMode, VmConfig};
//!
//! let config = VmConfig::parse("Processor.numPhysPages = 8").unwrap();
//! assert_eq!(config.phys_pages(), 8);
//! assert_eq!(config.paging(), PagingMode::Demand);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod memory;
