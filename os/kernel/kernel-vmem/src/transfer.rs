//! Byte copies between caller buffers and a process's virtual memory.

use crate::error::{FaultError, TransferError};
use crate::kernel::VmContext;
use crate::process::Process;
use kernel_memory_addresses::{FrameNumber, VirtualAddress, VirtualPageNumber};
use log::warn;

pub(crate) enum Access<'b> {
    Read(&'b mut [u8]),
    Write(&'b [u8]),
}

impl Access<'_> {
    const fn len(&self) -> usize {
        match self {
            Self::Read(buf) => buf.len(),
            Self::Write(data) => data.len(),
        }
    }

    const fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// Copy page by page, faulting pages in as needed.
///
/// An empty buffer or a start address outside the address space moves
/// nothing and succeeds. Running off the end of the address space, or
/// writing a read-only page, fails with the bytes moved so far. A page that
/// cannot be faulted in ends the transfer early without an error.
pub(crate) fn transfer(
    ctx: &mut VmContext<'_>,
    process: &Process,
    vaddr: VirtualAddress,
    mut access: Access<'_>,
) -> Result<usize, TransferError> {
    let kernel = ctx.kernel();
    let space = process.space();
    let pid = process.pid();
    let len = access.len();
    if len == 0 || !space.contains(vaddr.page()) {
        return Ok(0);
    }

    let mut done = 0usize;
    while done < len {
        #[allow(clippy::cast_possible_truncation)]
        let Some(va) = vaddr.checked_add(done as u32) else {
            return Err(TransferError::OutOfRange {
                vaddr: VirtualAddress::new(u32::MAX),
                transferred: done,
            });
        };
        let (vpn, offset) = va.split();
        if !space.contains(vpn) {
            warn!("{pid}: transfer ran past the address space at {va} after {done} bytes");
            return Err(TransferError::OutOfRange {
                vaddr: va,
                transferred: done,
            });
        }
        if access.is_write() && space.is_read_only(vpn) {
            warn!("{pid}: write to read-only {vpn} at {va}");
            return Err(TransferError::ReadOnly {
                vaddr: va,
                transferred: done,
            });
        }

        let frame = match pinned_frame(ctx, process, vpn) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{pid}: transfer stopped at {va} after {done} bytes: {e}");
                return Ok(done);
            }
        };

        let chunk = (len - done).min(offset.remaining());
        let pa = frame.join(offset);
        match &mut access {
            Access::Read(buf) => kernel.memory().read(pa, &mut buf[done..done + chunk]),
            Access::Write(data) => kernel.memory().write(pa, &data[done..done + chunk]),
        };

        kernel.frames().mark_used(frame);
        space.mark_used(vpn);
        if access.is_write() {
            space.mark_dirty(vpn);
        }
        kernel.frames().unpin(frame);
        done += chunk;
    }
    Ok(done)
}

/// Resident frame of `vpn`, pinned for the caller.
fn pinned_frame(
    ctx: &mut VmContext<'_>,
    process: &Process,
    vpn: VirtualPageNumber,
) -> Result<FrameNumber, FaultError> {
    let pager = process.pager();
    let frame = match pager.translate(process, vpn) {
        Some(frame) => frame,
        None => {
            pager.handle_fault(ctx, process, vpn)?;
            pager
                .translate(process, vpn)
                .ok_or(FaultError::NotResident {
                    pid: process.pid(),
                    vpn,
                })?
        }
    };
    ctx.kernel().frames().pin(frame);
    Ok(frame)
}
