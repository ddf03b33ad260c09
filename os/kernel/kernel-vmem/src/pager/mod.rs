//! Paging strategies.
//!
//! A [`Pager`] decides how a process's pages get frames. It is picked once,
//! when the process is spawned, and every fault, translation and teardown of
//! that process goes through it:
//!
//! | Pager | Load | Fault | Teardown |
//! |-------|------|-------|----------|
//! | [`EagerPager`] | Takes a frame for every page and pins it. | Never expected; reports the page as not resident. | Frees every frame. |
//! | [`DemandPager`] | Records read-only pages only. | Free frame or clock victim, then swap, image or zero fill. | Frees resident frames and swap slots. |

mod demand;
mod eager;

pub use demand::DemandPager;
pub use eager::EagerPager;

use crate::error::{FaultError, LoadError};
use crate::kernel::VmContext;
use crate::process::Process;
use alloc::boxed::Box;
use kernel_info::config::PagingMode;
use kernel_memory_addresses::{FrameNumber, VirtualPageNumber};

pub trait Pager: Send + Sync {
    fn mode(&self) -> PagingMode;

    /// Prepare a freshly registered process.
    ///
    /// # Errors
    /// [`LoadError::InsufficientMemory`] if the pager cannot back the process.
    fn load(&self, ctx: &mut VmContext<'_>, process: &Process) -> Result<(), LoadError>;

    /// The frame backing `vpn`, if resident.
    fn translate(&self, process: &Process, vpn: VirtualPageNumber) -> Option<FrameNumber> {
        process.space().translate(vpn)
    }

    /// Make `vpn` resident. Faulting a resident page does nothing.
    ///
    /// # Errors
    /// See [`FaultError`].
    fn handle_fault(
        &self,
        ctx: &mut VmContext<'_>,
        process: &Process,
        vpn: VirtualPageNumber,
    ) -> Result<(), FaultError>;

    /// Release every frame and swap slot the process holds.
    fn teardown(&self, ctx: &mut VmContext<'_>, process: &Process);
}

pub(crate) fn for_mode(mode: PagingMode) -> Box<dyn Pager> {
    match mode {
        PagingMode::Eager => Box::new(EagerPager),
        PagingMode::Demand => Box::new(DemandPager),
    }
}

/// Invalidate every valid page and return its frame to the pool.
fn release_resident(ctx: &VmContext<'_>, process: &Process) -> usize {
    let kernel = ctx.kernel();
    let space = process.space();
    let resident = space.resident();
    for &(vpn, frame) in &resident {
        space.invalidate(vpn);
        kernel.frames().release(frame);
    }
    resident.len()
}
