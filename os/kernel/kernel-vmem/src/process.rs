use crate::address_space::AddressSpace;
use crate::image::{Executable, ProcessLayout};
use crate::pager::{self, Pager};
use crate::registry::ProcessId;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_info::config::PagingMode;
use kernel_memory_addresses::VirtualAddress;

/// A user process as seen by the memory manager.
///
/// Holds the image the process was loaded from, its address space, and the
/// pager chosen when it was spawned.
pub struct Process {
    pid: ProcessId,
    image: Arc<dyn Executable>,
    layout: ProcessLayout,
    space: AddressSpace,
    pager: Box<dyn Pager>,
    alive: AtomicBool,
    argc: u32,
}

impl Process {
    pub(crate) fn new(
        pid: ProcessId,
        image: Arc<dyn Executable>,
        layout: ProcessLayout,
        mode: PagingMode,
        argc: u32,
    ) -> Self {
        Self {
            pid,
            space: AddressSpace::new(layout.num_pages()),
            pager: pager::for_mode(mode),
            image,
            layout,
            alive: AtomicBool::new(true),
            argc,
        }
    }

    #[inline]
    #[must_use]
    pub const fn pid(&self) -> ProcessId {
        self.pid
    }

    #[must_use]
    pub fn image(&self) -> &dyn Executable {
        self.image.as_ref()
    }

    #[must_use]
    pub const fn layout(&self) -> &ProcessLayout {
        &self.layout
    }

    #[must_use]
    pub const fn space(&self) -> &AddressSpace {
        &self.space
    }

    #[must_use]
    pub fn pager(&self) -> &dyn Pager {
        self.pager.as_ref()
    }

    #[must_use]
    pub fn mode(&self) -> PagingMode {
        self.pager.mode()
    }

    #[must_use]
    pub const fn argc(&self) -> u32 {
        self.argc
    }

    /// Address of the argument pointer table.
    #[must_use]
    pub const fn argv(&self) -> VirtualAddress {
        self.layout.argument_page().base()
    }

    #[must_use]
    pub const fn initial_pc(&self) -> VirtualAddress {
        self.layout.initial_pc()
    }

    #[must_use]
    pub const fn initial_sp(&self) -> VirtualAddress {
        self.layout.initial_sp()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns `true` for the call that actually ended the process.
    pub(crate) fn mark_exited(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }
}
