//! # Memory Layout
//!
//! Sizes that shape every process's address space on the simulated machine.

pub use kernel_memory_addresses::{PAGE_SHIFT, PAGE_SIZE};

/// Number of physical frames when no configuration overrides it.
pub const DEFAULT_PHYS_PAGES: u32 = 32;

/// Pages reserved for the user stack, directly after the executable sections.
pub const STACK_PAGES: u32 = 8;

/// Pages reserved for program arguments, directly after the stack.
pub const ARGUMENT_PAGES: u32 = 1;

/// Largest frame count a page table entry can encode.
pub const MAX_PHYS_PAGES: u32 = 1 << 24;

/// Default name of the swap file created by the kernel at start.
pub const DEFAULT_SWAP_FILE: &str = "swapFile";

/// Size of a pointer in the argument page, in bytes.
pub const ARGUMENT_POINTER_SIZE: usize = 4;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(DEFAULT_PHYS_PAGES > 0 && DEFAULT_PHYS_PAGES <= MAX_PHYS_PAGES);
    assert!(ARGUMENT_PAGES == 1);
};
