use super::{Pager, release_resident};
use crate::error::{FaultError, LoadError};
use crate::kernel::VmContext;
use crate::process::Process;
use kernel_info::config::PagingMode;
use kernel_memory_addresses::VirtualPageNumber;
use log::debug;

/// Backs every page with a frame at load time.
///
/// The frames are registered in the inverted page table like any other and
/// stay pinned until teardown, so the clock never takes them from the
/// process.
#[derive(Debug, Default, Copy, Clone)]
pub struct EagerPager;

impl Pager for EagerPager {
    fn mode(&self) -> PagingMode {
        PagingMode::Eager
    }

    fn load(&self, ctx: &mut VmContext<'_>, process: &Process) -> Result<(), LoadError> {
        let kernel = ctx.kernel();
        let frames = kernel.frames();
        let needed = process.space().num_pages();

        if needed > frames.frame_count() {
            return Err(LoadError::InsufficientMemory {
                needed,
                available: frames.frame_count(),
            });
        }
        let Some(allocated) = frames.allocate_frames(needed as usize) else {
            #[allow(clippy::cast_possible_truncation)]
            let available = frames.free_count() as u32;
            return Err(LoadError::InsufficientMemory { needed, available });
        };

        let pid = process.pid();
        let layout = process.layout();
        for (i, frame) in allocated.into_iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let vpn = VirtualPageNumber::new(i as u32);
            let section = layout
                .section_page(vpn)
                .and_then(|p| Some((p, process.image().section(p.section)?)));

            let read_only = if let Some((page, section)) = section {
                section.load_page(page.page, frame, kernel.memory());
                kernel.counters().count_image_load();
                page.read_only
            } else {
                kernel.memory().zero_frame(frame);
                kernel.counters().count_zero_fill();
                false
            };

            process.space().set_mapping(vpn, frame, true, read_only);
            frames.assign(frame, pid, vpn);
            frames.pin(frame);
        }

        debug!("{pid}: {needed} pages loaded eagerly");
        Ok(())
    }

    fn handle_fault(
        &self,
        _ctx: &mut VmContext<'_>,
        process: &Process,
        vpn: VirtualPageNumber,
    ) -> Result<(), FaultError> {
        let pid = process.pid();
        if !process.is_alive() {
            return Err(FaultError::ProcessExited(pid));
        }
        if !process.space().contains(vpn) {
            return Err(FaultError::OutOfRange { pid, vpn });
        }
        if process.space().translate(vpn).is_some() {
            return Ok(());
        }
        Err(FaultError::NotResident { pid, vpn })
    }

    fn teardown(&self, ctx: &mut VmContext<'_>, process: &Process) {
        let released = release_resident(ctx, process);
        debug!("{}: released {released} frames", process.pid());
    }
}
