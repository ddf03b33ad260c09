use super::{Pager, release_resident};
use crate::clock::ClockOutcome;
use crate::error::{FaultError, LoadError, SwapError};
use crate::frame_table::FrameOwner;
use crate::page_entry_bits::PageEntryBits;
use crate::kernel::{VmContext, VmKernel};
use crate::process::Process;
use kernel_info::config::PagingMode;
use kernel_memory_addresses::{FrameNumber, VirtualPageNumber};
use log::{debug, trace};

/// Gives pages frames only when they are first touched.
///
/// A fault takes a frame from the free pool or, once the pool is empty,
/// from the clock. A dirty victim is written to swap before its frame is
/// reused. The faulting page is then filled from swap if it was swapped out,
/// from its executable section if it has one, or with zeros.
#[derive(Debug, Default, Copy, Clone)]
pub struct DemandPager;

/// Where a freshly faulted page got its contents.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Fill {
    Swap,
    Image,
    Zero,
}

impl Pager for DemandPager {
    fn mode(&self) -> PagingMode {
        PagingMode::Demand
    }

    fn load(&self, _ctx: &mut VmContext<'_>, process: &Process) -> Result<(), LoadError> {
        let space = process.space();
        let mut read_only = 0u32;
        for vpn in process.layout().read_only_pages() {
            space.set_read_only(vpn, true);
            read_only += 1;
        }
        debug!(
            "{}: {} pages reserved, {read_only} read-only",
            process.pid(),
            space.num_pages()
        );
        Ok(())
    }

    fn handle_fault(
        &self,
        ctx: &mut VmContext<'_>,
        process: &Process,
        vpn: VirtualPageNumber,
    ) -> Result<(), FaultError> {
        let kernel = ctx.kernel();
        let pid = process.pid();
        let space = process.space();
        let mut counted = false;

        loop {
            // The VM lock is released while waiting for an unpin, so the
            // process may have been torn down or the page faulted in since.
            if !process.is_alive() {
                return Err(FaultError::ProcessExited(pid));
            }
            if !space.contains(vpn) {
                return Err(FaultError::OutOfRange { pid, vpn });
            }
            if space.translate(vpn).is_some() {
                trace!("{pid}: {vpn} already resident");
                return Ok(());
            }
            if !counted {
                kernel.counters().count_fault();
                counted = true;
            }

            let frame = if let Some(frame) = kernel.frames().allocate_free_frame() {
                kernel.frames().pin(frame);
                kernel.counters().count_free_frame_hit();
                frame
            } else {
                match kernel.clock().select_victim(kernel.frames()) {
                    ClockOutcome::Victim {
                        frame,
                        owner,
                        demoted,
                    } => {
                        clear_used_bits(kernel, &demoted);
                        if let Some(owner) = owner {
                            evict(kernel, frame, owner)?;
                        }
                        frame
                    }
                    ClockOutcome::AllPinned { epoch, demoted } => {
                        clear_used_bits(kernel, &demoted);
                        kernel.counters().count_pin_wait();
                        debug!("{pid}: every frame is pinned, waiting to fault {vpn}");
                        ctx.wait_for_unpin(epoch);
                        continue;
                    }
                }
            };

            let fill = match fill_frame(kernel, process, vpn, frame) {
                Ok(fill) => fill,
                Err(e) => {
                    kernel.frames().release(frame);
                    return Err(e.into());
                }
            };

            let read_only = process
                .layout()
                .section_page(vpn)
                .is_some_and(|p| p.read_only);
            space.set_mapping(vpn, frame, true, read_only);
            if fill == Fill::Swap {
                space.mark_dirty(vpn);
            }
            kernel.frames().assign(frame, pid, vpn);
            kernel.frames().unpin(frame);
            debug!("{pid}: {vpn} -> {frame} ({fill:?})");
            return Ok(());
        }
    }

    fn teardown(&self, ctx: &mut VmContext<'_>, process: &Process) {
        let released = release_resident(ctx, process);
        let slots = process.space().drain_swap();
        for &slot in &slots {
            ctx.kernel().swap().recycle_slot(slot);
        }
        debug!(
            "{}: released {released} frames and {} swap slots",
            process.pid(),
            slots.len()
        );
    }
}

/// Mirror the clock's second-chance demotions into the owners' entries.
fn clear_used_bits(kernel: &VmKernel, demoted: &[FrameOwner]) {
    for owner in demoted {
        if let Some(process) = kernel.processes().get(owner.pid) {
            process.space().clear_used(owner.vpn);
        }
    }
}

/// Take `frame` away from `owner`, writing it to swap first if dirty.
///
/// `frame` is pinned by the clock. If the swap write fails the pin is
/// dropped and the owner keeps the page.
fn evict(kernel: &VmKernel, frame: FrameNumber, owner: FrameOwner) -> Result<(), FaultError> {
    let Some(victim) = kernel.processes().get(owner.pid) else {
        kernel.frames().clear(frame);
        return Ok(());
    };
    let space = victim.space();
    let entry = space.entry(owner.vpn);
    let mapped_here = entry.and_then(PageEntryBits::resident_frame) == Some(frame);

    if mapped_here && entry.is_some_and(|e| e.dirty()) {
        match kernel.swap().page_out(frame, kernel.memory()) {
            Ok(slot) => {
                space.record_swap(owner.vpn, slot);
                kernel.counters().count_swap_out();
                debug!("{}: {} swapped out to slot {slot}", owner.pid, owner.vpn);
            }
            Err(e) => {
                kernel.frames().unpin(frame);
                return Err(e.into());
            }
        }
    }

    if mapped_here {
        space.invalidate(owner.vpn);
    }
    kernel.frames().clear(frame);
    kernel.counters().count_eviction();
    trace!("{frame} taken from {} {}", owner.pid, owner.vpn);
    Ok(())
}

fn fill_frame(
    kernel: &VmKernel,
    process: &Process,
    vpn: VirtualPageNumber,
    frame: FrameNumber,
) -> Result<Fill, SwapError> {
    let space = process.space();
    if let Some(slot) = space.swap_slot(vpn) {
        kernel.swap().page_in(slot, frame, kernel.memory())?;
        space.take_swap(vpn);
        kernel.counters().count_swap_in();
        return Ok(Fill::Swap);
    }

    let section = process
        .layout()
        .section_page(vpn)
        .and_then(|p| Some((p.page, process.image().section(p.section)?)));
    if let Some((page, section)) = section {
        section.load_page(page, frame, kernel.memory());
        kernel.counters().count_image_load();
        return Ok(Fill::Image);
    }

    kernel.memory().zero_frame(frame);
    kernel.counters().count_zero_fill();
    Ok(Fill::Zero)
}
