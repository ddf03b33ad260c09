//! Executable images and the address space layout derived from them.
//!
//! Images are parsed elsewhere; the memory manager only needs to know which
//! pages a section covers, whether they are read-only, and how to copy one
//! page of the section into a frame.

use crate::error::LoadError;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use kernel_alloc::phys_mem::PhysicalMemory;
use kernel_info::memory::ARGUMENT_PAGES;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, VirtualAddress, VirtualPageNumber};

/// One loadable section of an executable.
pub trait ExecutableSection: Send + Sync {
    fn name(&self) -> &str;

    fn first_vpn(&self) -> VirtualPageNumber;

    fn page_count(&self) -> u32;

    fn is_read_only(&self) -> bool;

    /// Copy page `index` of the section into `frame`, zero-filling whatever
    /// the section does not cover.
    fn load_page(&self, index: u32, frame: FrameNumber, memory: &PhysicalMemory);
}

/// A parsed program.
pub trait Executable: Send + Sync {
    fn section_count(&self) -> usize;

    fn section(&self, index: usize) -> Option<&dyn ExecutableSection>;

    fn entry_point(&self) -> VirtualAddress;
}

/// A section held in memory.
#[derive(Debug, Clone)]
pub struct ImageSection {
    name: String,
    first_vpn: VirtualPageNumber,
    page_count: u32,
    read_only: bool,
    data: Vec<u8>,
}

impl ImageSection {
    /// A section spanning just enough pages for `data`.
    pub fn new(
        name: impl Into<String>,
        first_vpn: VirtualPageNumber,
        read_only: bool,
        data: Vec<u8>,
    ) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let page_count = data.len().div_ceil(PAGE_SIZE) as u32;
        Self {
            name: name.into(),
            first_vpn,
            page_count,
            read_only,
            data,
        }
    }

    /// Extend the section to `pages` pages; the tail reads as zeros.
    #[must_use]
    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = self.page_count.max(pages);
        self
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl ExecutableSection for ImageSection {
    fn name(&self) -> &str {
        &self.name
    }

    fn first_vpn(&self) -> VirtualPageNumber {
        self.first_vpn
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn load_page(&self, index: u32, frame: FrameNumber, memory: &PhysicalMemory) {
        let start = (index as usize * PAGE_SIZE).min(self.data.len());
        let end = (start + PAGE_SIZE).min(self.data.len());
        let src = &self.data[start..end];
        memory.with_frame_mut(frame, |bytes| {
            bytes[..src.len()].copy_from_slice(src);
            bytes[src.len()..].fill(0);
        });
    }
}

/// A program held in memory.
#[derive(Debug, Clone, Default)]
pub struct ProgramImage {
    sections: Vec<ImageSection>,
    entry_point: VirtualAddress,
}

impl ProgramImage {
    #[must_use]
    pub const fn new(entry_point: VirtualAddress) -> Self {
        Self {
            sections: Vec::new(),
            entry_point,
        }
    }

    #[must_use]
    pub fn with_section(mut self, section: ImageSection) -> Self {
        self.sections.push(section);
        self
    }

    /// Append a section starting right after the previous one.
    #[must_use]
    pub fn with_next_section(self, name: &str, read_only: bool, data: Vec<u8>) -> Self {
        let next = self
            .sections
            .last()
            .map_or(0, |s| s.first_vpn.as_u32() + s.page_count);
        self.with_section(ImageSection::new(
            name,
            VirtualPageNumber::new(next),
            read_only,
            data,
        ))
    }

    #[must_use]
    pub fn into_arc(self) -> Arc<dyn Executable> {
        Arc::new(self)
    }
}

impl Executable for ProgramImage {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section(&self, index: usize) -> Option<&dyn ExecutableSection> {
        self.sections
            .get(index)
            .map(|s| s as &dyn ExecutableSection)
    }

    fn entry_point(&self) -> VirtualAddress {
        self.entry_point
    }
}

/// Where a section lives in the address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct SectionSpan {
    index: usize,
    first_vpn: u32,
    page_count: u32,
    read_only: bool,
}

/// Page of a section that backs some virtual page.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SectionPage {
    pub section: usize,
    pub page: u32,
    pub read_only: bool,
}

/// Address space layout of one process:
///
/// ```text
/// [0, section_pages)                       executable sections
/// [section_pages, +stack_pages)            stack, SP starts at the top
/// [section_pages + stack_pages, num_pages) argument page
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProcessLayout {
    spans: Vec<SectionSpan>,
    section_pages: u32,
    stack_pages: u32,
    num_pages: u32,
    initial_pc: VirtualAddress,
}

impl ProcessLayout {
    /// Lay out `image`.
    ///
    /// # Errors
    /// - [`LoadError::FragmentedExecutable`] unless sections are contiguous
    ///   from page 0.
    /// - [`LoadError::ImageTooLarge`] if the result exceeds 32-bit addresses.
    pub fn from_image(image: &dyn Executable, stack_pages: u32) -> Result<Self, LoadError> {
        let mut spans = Vec::with_capacity(image.section_count());
        let mut next: u64 = 0;
        for index in 0..image.section_count() {
            let Some(section) = image.section(index) else {
                continue;
            };
            let first = section.first_vpn().as_u32();
            if u64::from(first) != next {
                #[allow(clippy::cast_possible_truncation)]
                let expected = VirtualPageNumber::new(next as u32);
                return Err(LoadError::FragmentedExecutable {
                    section: section.name().to_string(),
                    expected,
                    found: section.first_vpn(),
                });
            }
            spans.push(SectionSpan {
                index,
                first_vpn: first,
                page_count: section.page_count(),
                read_only: section.is_read_only(),
            });
            next += u64::from(section.page_count());
        }

        let pages = next + u64::from(stack_pages) + u64::from(ARGUMENT_PAGES);
        let limit = (u64::from(u32::MAX) + 1) / PAGE_SIZE as u64;
        if pages > limit {
            return Err(LoadError::ImageTooLarge { pages });
        }

        #[allow(clippy::cast_possible_truncation)]
        let (section_pages, num_pages) = (next as u32, pages as u32);
        Ok(Self {
            spans,
            section_pages,
            stack_pages,
            num_pages,
            initial_pc: image.entry_point(),
        })
    }

    #[must_use]
    pub const fn num_pages(&self) -> u32 {
        self.num_pages
    }

    #[must_use]
    pub const fn section_pages(&self) -> u32 {
        self.section_pages
    }

    #[must_use]
    pub const fn stack_pages(&self) -> u32 {
        self.stack_pages
    }

    #[must_use]
    pub const fn initial_pc(&self) -> VirtualAddress {
        self.initial_pc
    }

    /// Top of the stack, just below the argument page.
    #[must_use]
    pub const fn initial_sp(&self) -> VirtualAddress {
        VirtualPageNumber::new(self.section_pages + self.stack_pages).base()
    }

    #[must_use]
    pub const fn argument_page(&self) -> VirtualPageNumber {
        VirtualPageNumber::new(self.num_pages - ARGUMENT_PAGES)
    }

    /// The section page backing `vpn`, if any.
    #[must_use]
    pub fn section_page(&self, vpn: VirtualPageNumber) -> Option<SectionPage> {
        let v = vpn.as_u32();
        self.spans
            .iter()
            .find(|s| v >= s.first_vpn && v - s.first_vpn < s.page_count)
            .map(|s| SectionPage {
                section: s.index,
                page: v - s.first_vpn,
                read_only: s.read_only,
            })
    }

    /// Read-only pages, in page order.
    pub fn read_only_pages(&self) -> impl Iterator<Item = VirtualPageNumber> + '_ {
        self.spans
            .iter()
            .filter(|s| s.read_only)
            .flat_map(|s| (s.first_vpn..s.first_vpn + s.page_count).map(VirtualPageNumber::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn image() -> ProgramImage {
        ProgramImage::new(VirtualAddress::new(0x10))
            .with_next_section(".text", true, vec![0xC3; PAGE_SIZE + 1])
            .with_next_section(".data", false, vec![1, 2, 3])
    }

    #[test]
    fn layout_appends_stack_and_argument_page() {
        let layout = ProcessLayout::from_image(&image(), 8).unwrap();
        assert_eq!(layout.section_pages(), 3);
        assert_eq!(layout.num_pages(), 3 + 8 + 1);
        assert_eq!(layout.initial_sp().as_usize(), 11 * PAGE_SIZE);
        assert_eq!(layout.argument_page(), VirtualPageNumber::new(11));
        assert_eq!(layout.initial_pc(), VirtualAddress::new(0x10));
    }

    #[test]
    fn section_page_lookup() {
        let layout = ProcessLayout::from_image(&image(), 2).unwrap();
        assert_eq!(
            layout.section_page(VirtualPageNumber::new(1)),
            Some(SectionPage {
                section: 0,
                page: 1,
                read_only: true
            })
        );
        assert_eq!(
            layout.section_page(VirtualPageNumber::new(2)).map(|p| p.section),
            Some(1)
        );
        assert_eq!(layout.section_page(VirtualPageNumber::new(3)), None);
        let ro: Vec<_> = layout.read_only_pages().collect();
        assert_eq!(ro, vec![VirtualPageNumber::new(0), VirtualPageNumber::new(1)]);
    }

    #[test]
    fn gaps_between_sections_are_rejected() {
        let img = ProgramImage::default().with_section(ImageSection::new(
            ".text",
            VirtualPageNumber::new(1),
            true,
            vec![0; 4],
        ));
        assert!(matches!(
            ProcessLayout::from_image(&img, 8),
            Err(LoadError::FragmentedExecutable { .. })
        ));
    }

    #[test]
    fn oversized_images_are_rejected() {
        let img = ProgramImage::default().with_section(
            ImageSection::new(".bss", VirtualPageNumber::new(0), false, Vec::new())
                .with_page_count(u32::MAX / 1024),
        );
        assert!(matches!(
            ProcessLayout::from_image(&img, 8),
            Err(LoadError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn load_page_zero_fills_the_tail() {
        let mem = PhysicalMemory::new(1);
        let f = FrameNumber::new(0);
        mem.with_frame_mut(f, |b| b.fill(0xFF));
        let section = ImageSection::new(".data", VirtualPageNumber::new(0), false, vec![7; 10]);
        section.load_page(0, f, &mem);
        mem.with_frame(f, |b| {
            assert!(b[..10].iter().all(|&x| x == 7));
            assert!(b[10..].iter().all(|&x| x == 0));
        });
    }
}
