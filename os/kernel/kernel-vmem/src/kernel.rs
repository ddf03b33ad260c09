//! The memory manager facade.

use crate::clock::ClockPolicy;
use crate::error::{FaultError, InvariantViolation, LoadError, TransferError, VmInitError};
use crate::frame_table::{FrameOwner, FrameTable};
use crate::image::{Executable, ProcessLayout};
use crate::process::Process;
use crate::registry::{ProcessId, ProcessRegistry};
use crate::stats::{VmStats, VmStatsSnapshot};
use crate::swap::SwapStore;
use crate::transfer::{Access, transfer};
use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_alloc::frame_alloc::{FrameAlloc, FreeListFrameAlloc};
use kernel_alloc::phys_mem::PhysicalMemory;
use kernel_fs::FileSystem;
use kernel_info::config::{PagingMode, VmConfig};
use kernel_info::memory::{ARGUMENT_POINTER_SIZE, PAGE_SIZE};
use kernel_memory_addresses::{FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_sync::{TicketMutex, TicketMutexGuard};
use log::{debug, info, warn};

/// Holder of the VM lock for one operation.
///
/// Every fault, transfer, load and teardown runs with the lock held. The
/// only place it is given up is [`wait_for_unpin`](Self::wait_for_unpin),
/// so other processes can finish the transfers whose pins the caller is
/// waiting on.
pub struct VmContext<'k> {
    kernel: &'k VmKernel,
    guard: Option<TicketMutexGuard<'k, ()>>,
}

impl<'k> VmContext<'k> {
    #[must_use]
    pub const fn kernel(&self) -> &'k VmKernel {
        self.kernel
    }

    /// Release the VM lock until some frame is unpinned after `epoch`.
    pub(crate) fn wait_for_unpin(&mut self, epoch: u32) {
        if let Some(guard) = self.guard.take() {
            self.guard = Some(self.kernel.frames.unpinned().wait_epoch(guard, epoch));
        }
    }
}

/// Demand-paged virtual memory for a set of user processes.
///
/// Owns physical memory, the inverted page table with its clock, the swap
/// store and the process registry. All public operations are safe to call
/// from any number of threads.
pub struct VmKernel {
    config: VmConfig,
    memory: PhysicalMemory,
    frames: FrameTable,
    clock: ClockPolicy,
    swap: SwapStore,
    processes: ProcessRegistry,
    vm_lock: TicketMutex<()>,
    stats: VmStats,
    fs: Arc<dyn FileSystem>,
    shut_down: AtomicBool,
}

impl VmKernel {
    /// Build a memory manager and create its swap file on `fs`.
    ///
    /// # Errors
    /// [`VmInitError`] if the configuration is invalid or the swap file
    /// cannot be created.
    pub fn new(config: VmConfig, fs: Arc<dyn FileSystem>) -> Result<Self, VmInitError> {
        config.validate()?;
        let pool = Box::new(FreeListFrameAlloc::new(config.phys_pages()));
        Self::with_frame_alloc(config, fs, pool)
    }

    /// Like [`new`](Self::new), with a caller-supplied free frame pool.
    ///
    /// # Errors
    /// See [`new`](Self::new).
    pub fn with_frame_alloc(
        config: VmConfig,
        fs: Arc<dyn FileSystem>,
        pool: Box<dyn FrameAlloc>,
    ) -> Result<Self, VmInitError> {
        config.validate()?;
        let file = fs
            .open(config.swap_file(), true)
            .ok_or_else(|| VmInitError::SwapFile(config.swap_file().to_string()))?;

        info!(
            "vm: {} frames of {PAGE_SIZE} bytes, {} paging, swap file {:?}",
            config.phys_pages(),
            config.paging(),
            config.swap_file()
        );

        Ok(Self {
            memory: PhysicalMemory::new(config.phys_pages()),
            frames: FrameTable::new(config.phys_pages(), pool),
            clock: ClockPolicy::new(),
            swap: SwapStore::new(file),
            processes: ProcessRegistry::new(),
            vm_lock: TicketMutex::new(()),
            stats: VmStats::default(),
            fs,
            config,
            shut_down: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &VmConfig {
        &self.config
    }

    #[must_use]
    pub const fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    #[must_use]
    pub const fn frames(&self) -> &FrameTable {
        &self.frames
    }

    #[must_use]
    pub const fn clock(&self) -> &ClockPolicy {
        &self.clock
    }

    #[must_use]
    pub const fn swap(&self) -> &SwapStore {
        &self.swap
    }

    #[must_use]
    pub const fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn process(&self, pid: ProcessId) -> Option<Arc<Process>> {
        self.processes.get(pid)
    }

    #[must_use]
    pub(crate) const fn counters(&self) -> &VmStats {
        &self.stats
    }

    pub fn stats(&self) -> VmStatsSnapshot {
        self.stats.snapshot()
    }

    /// Acquire the VM lock.
    pub fn context(&self) -> VmContext<'_> {
        VmContext {
            kernel: self,
            guard: Some(self.vm_lock.lock()),
        }
    }

    /// Spawn a process with the configured paging mode.
    ///
    /// # Errors
    /// See [`spawn_with`](Self::spawn_with).
    pub fn spawn(
        &self,
        image: Arc<dyn Executable>,
        args: &[&str],
    ) -> Result<Arc<Process>, LoadError> {
        self.spawn_with(image, args, self.config.paging())
    }

    /// Lay out `image`, load it with the pager for `mode`, and write `args`
    /// into the argument page.
    ///
    /// The argument page holds one little-endian 32-bit pointer per
    /// argument, followed by the NUL-terminated argument strings.
    ///
    /// # Errors
    /// Any [`LoadError`]. A process that fails to load is torn down again
    /// before this returns.
    pub fn spawn_with(
        &self,
        image: Arc<dyn Executable>,
        args: &[&str],
        mode: PagingMode,
    ) -> Result<Arc<Process>, LoadError> {
        let layout = ProcessLayout::from_image(image.as_ref(), self.config.stack_pages())?;

        let bytes: usize = args
            .iter()
            .map(|a| ARGUMENT_POINTER_SIZE + a.len() + 1)
            .sum();
        if bytes > PAGE_SIZE {
            return Err(LoadError::ArgumentsTooLong { bytes });
        }

        let pid = self.processes.allocate_pid();
        #[allow(clippy::cast_possible_truncation)]
        let argc = args.len() as u32;
        let process = Arc::new(Process::new(pid, image, layout, mode, argc));
        self.processes.insert(Arc::clone(&process));

        let mut ctx = self.context();
        if let Err(e) = process.pager().load(&mut ctx, &process) {
            warn!("{pid}: load failed: {e}");
            self.discard(&mut ctx, &process);
            return Err(e);
        }
        if let Err(e) = write_arguments(&mut ctx, &process, args) {
            warn!("{pid}: {e}");
            self.discard(&mut ctx, &process);
            return Err(e);
        }
        drop(ctx);

        info!(
            "{pid}: spawned, {} pages, {mode} paging, {argc} arguments",
            process.space().num_pages()
        );
        Ok(process)
    }

    fn discard(&self, ctx: &mut VmContext<'_>, process: &Process) {
        if process.mark_exited() {
            process.pager().teardown(ctx, process);
        }
        self.processes.remove(process.pid());
    }

    /// Make the page containing `vaddr` resident.
    ///
    /// # Errors
    /// See [`FaultError`].
    pub fn handle_page_fault(&self, pid: ProcessId, vaddr: VirtualAddress) -> Result<(), FaultError> {
        let process = self
            .processes
            .get(pid)
            .ok_or(FaultError::NoSuchProcess(pid))?;
        let mut ctx = self.context();
        process.pager().handle_fault(&mut ctx, &process, vaddr.page())
    }

    /// Copy from the process's memory at `vaddr` into `buf`.
    ///
    /// Returns the number of bytes copied, which is short if a page could not
    /// be faulted in.
    ///
    /// # Errors
    /// [`TransferError::OutOfRange`] if the range runs past the address space.
    pub fn read_virtual(
        &self,
        pid: ProcessId,
        vaddr: VirtualAddress,
        buf: &mut [u8],
    ) -> Result<usize, TransferError> {
        let process = self
            .processes
            .get(pid)
            .ok_or(TransferError::NoSuchProcess(pid))?;
        let mut ctx = self.context();
        transfer(&mut ctx, &process, vaddr, Access::Read(buf))
    }

    /// Copy `data` into the process's memory at `vaddr`.
    ///
    /// # Errors
    /// [`TransferError::ReadOnly`] on a read-only page, or
    /// [`TransferError::OutOfRange`] past the address space.
    pub fn write_virtual(
        &self,
        pid: ProcessId,
        vaddr: VirtualAddress,
        data: &[u8],
    ) -> Result<usize, TransferError> {
        let process = self
            .processes
            .get(pid)
            .ok_or(TransferError::NoSuchProcess(pid))?;
        let mut ctx = self.context();
        transfer(&mut ctx, &process, vaddr, Access::Write(data))
    }

    /// Read a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Returns `None` if no terminator is found within `max_len + 1` bytes or
    /// before the end of the address space, or the bytes are not UTF-8.
    pub fn read_virtual_str(
        &self,
        pid: ProcessId,
        vaddr: VirtualAddress,
        max_len: usize,
    ) -> Option<String> {
        let end = self.processes.get(pid)?.space().num_pages() as usize * PAGE_SIZE;
        let left = end.checked_sub(vaddr.as_usize()).filter(|&n| n > 0)?;
        let mut buf = vec![0u8; max_len.saturating_add(1).min(left)];
        let read = self.read_virtual(pid, vaddr, &mut buf).ok()?;
        let end = buf[..read].iter().position(|&b| b == 0)?;
        buf.truncate(end);
        String::from_utf8(buf).ok()
    }

    /// Physical address backing `vaddr`, if its page is resident.
    pub fn translate(&self, pid: ProcessId, vaddr: VirtualAddress) -> Option<PhysicalAddress> {
        let process = self.processes.get(pid)?;
        let (vpn, offset) = vaddr.split();
        let frame = process.pager().translate(&process, vpn)?;
        Some(frame.join(offset))
    }

    /// End a process and free its frames and swap slots.
    ///
    /// Returns `false` if `pid` is unknown or already gone.
    pub fn teardown(&self, pid: ProcessId) -> bool {
        let Some(process) = self.processes.get(pid) else {
            return false;
        };
        let mut ctx = self.context();
        if !process.mark_exited() {
            return false;
        }
        process.pager().teardown(&mut ctx, &process);
        self.processes.remove(pid);
        drop(ctx);
        info!("{pid}: torn down");
        true
    }

    /// Tear down every process, close the swap file and delete it.
    ///
    /// Only the first call has an effect.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut ctx = self.context();
        for process in self.processes.all() {
            if process.mark_exited() {
                process.pager().teardown(&mut ctx, &process);
            }
            self.processes.remove(process.pid());
        }
        self.swap.close();
        if !self.fs.remove(self.config.swap_file()) {
            warn!("could not remove swap file {:?}", self.config.swap_file());
        }
        drop(ctx);

        let stats = self.stats.snapshot();
        info!(
            "vm: shut down after {} faults, {} swap outs, {} swap ins",
            stats.page_faults, stats.swap_outs, stats.swap_ins
        );
    }

    /// Check that the inverted page table and the page tables agree and that
    /// no swap slot is held twice.
    ///
    /// # Errors
    /// The first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let ctx = self.context();
        for (index, descriptor) in self.frames.snapshot().iter().enumerate() {
            let Some(FrameOwner { pid, vpn }) = descriptor.owner else {
                continue;
            };
            #[allow(clippy::cast_possible_truncation)]
            let frame = FrameNumber::new(index as u32);
            let process = self
                .processes
                .get(pid)
                .ok_or(InvariantViolation::UnknownOwner { frame, pid })?;
            let entry = process.space().entry(vpn);
            if !entry.is_some_and(|e| e.valid() && e.frame() == Some(frame)) {
                return Err(InvariantViolation::BackPointerMismatch { frame, pid, vpn });
            }
        }

        let mut slots = BTreeSet::new();
        for process in self.processes.all() {
            let pid = process.pid();
            for (vpn, frame) in process.space().resident() {
                if self.frames.owner_of(frame) != Some(FrameOwner { pid, vpn }) {
                    return Err(InvariantViolation::UntrackedMapping { pid, vpn, frame });
                }
            }
            for (_, slot) in process.space().swapped() {
                if !slots.insert(slot) {
                    return Err(InvariantViolation::SwapSlotShared(slot));
                }
            }
        }
        drop(ctx);
        debug!("vm: invariants hold");
        Ok(())
    }
}

impl Drop for VmKernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fill the argument page: pointer table first, then the strings.
fn write_arguments(
    ctx: &mut VmContext<'_>,
    process: &Process,
    args: &[&str],
) -> Result<(), LoadError> {
    if args.is_empty() {
        return Ok(());
    }
    let base = process.argv();
    let mut table = Vec::with_capacity(PAGE_SIZE);
    let mut strings = Vec::new();
    #[allow(clippy::cast_possible_truncation)]
    let mut next = base.as_u32() + (args.len() * ARGUMENT_POINTER_SIZE) as u32;
    for arg in args {
        table.extend_from_slice(&next.to_le_bytes());
        strings.extend_from_slice(arg.as_bytes());
        strings.push(0);
        #[allow(clippy::cast_possible_truncation)]
        let len = arg.len() as u32 + 1;
        next += len;
    }
    table.extend_from_slice(&strings);

    let expected = table.len();
    let written = match transfer(ctx, process, base, Access::Write(&table)) {
        Ok(n) => n,
        Err(e) => e.transferred(),
    };
    if written == expected {
        Ok(())
    } else {
        Err(LoadError::ArgumentsNotWritten { written, expected })
    }
}
