//! Address-space emulator.
//!
//! A [`PageTable`] maps each of `npages` virtual pages to one of `nframes`
//! physical frames plus protection bits. [`VirtualMemory`] is the access trap:
//! every load or store is checked against the current bits and, when
//! forbidden, the registered [`FaultHandler`] runs to completion before the
//! access is retried.

use std::io::{self, Write};

use bitflags::bitflags;

use crate::constants::*;
use crate::error::{VmError, VmResult};
use crate::memory::PhysicalMemory;
use crate::translation::{translate, Access, TranslationResult, VirtualAddress};

bitflags! {
    /// Page protection bits. Empty means non-resident.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ  = 1;
        const WRITE = 2;
        const EXEC  = 4;
    }
}

impl Default for Protection {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for Protection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = if self.contains(Self::READ) { 'r' } else { '-' };
        let w = if self.contains(Self::WRITE) { 'w' } else { '-' };
        let x = if self.contains(Self::EXEC) { 'x' } else { '-' };
        write!(f, "{r}{w}{x}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageTableEntry {
    pub frame: usize,
    pub bits: Protection,
}

impl PageTableEntry {
    #[inline]
    pub fn is_resident(&self) -> bool {
        !self.bits.is_empty()
    }
}

/// Called whenever an access is forbidden by the faulting page's bits.
pub trait FaultHandler {
    fn page_fault(&mut self, pt: &mut PageTable, page: usize);
}

pub struct PageTable {
    entries: Vec<PageTableEntry>,
    physmem: PhysicalMemory,
}

impl PageTable {
    /// Create a table of `npages` non-resident pages over `nframes` frames
    pub fn new(npages: usize, nframes: usize) -> VmResult<Self> {
        if npages == 0 || nframes == 0 {
            return Err(VmError::InvalidGeometry { npages, nframes });
        }

        Ok(PageTable {
            entries: vec![PageTableEntry::default(); npages],
            physmem: PhysicalMemory::new(nframes)?,
        })
    }

    pub fn npages(&self) -> usize {
        self.entries.len()
    }

    pub fn nframes(&self) -> usize {
        self.physmem.nframes()
    }

    /// Length of the virtual range in bytes
    pub fn len(&self) -> usize {
        self.npages() * PAGE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the frame and bits associated with a page
    pub fn get_entry(&self, page: usize) -> PageTableEntry {
        if page >= self.npages() {
            panic!("page_table_get_entry: illegal page #{}", page);
        }
        self.entries[page]
    }

    /// Set the frame and bits associated with a page.
    ///
    /// Empty `bits` invalidates the page: any access traps again.
    pub fn set_entry(&mut self, page: usize, frame: usize, bits: Protection) {
        if page >= self.npages() {
            panic!("page_table_set_entry: illegal page #{}", page);
        }
        if frame >= self.nframes() {
            panic!("page_table_set_entry: illegal frame #{}", frame);
        }
        self.entries[page] = PageTableEntry { frame, bits };
    }

    pub fn physmem(&self) -> &PhysicalMemory {
        &self.physmem
    }

    pub fn physmem_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.physmem
    }

    /// Iterate over `(page, entry)` for every resident page
    pub fn resident(&self) -> impl Iterator<Item = (usize, PageTableEntry)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, entry)| entry.is_resident())
    }

    pub fn print_entry<W: Write>(&self, out: &mut W, page: usize) -> io::Result<()> {
        let entry = self.get_entry(page);
        writeln!(out, "page {:06}: frame {:06} bits {}", page, entry.frame, entry.bits)
    }

    /// Print the state of every page
    pub fn print<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for page in 0..self.npages() {
            self.print_entry(out, page)?;
        }
        Ok(())
    }
}

/// Simulated virtual range with a registered fault handler.
pub struct VirtualMemory<H> {
    pt: PageTable,
    handler: H,
}

impl<H: FaultHandler> VirtualMemory<H> {
    pub fn new(npages: usize, nframes: usize, handler: H) -> VmResult<Self> {
        let pt = PageTable::new(npages, nframes)?;
        log::debug!("created virtual memory: {} pages over {} frames", npages, nframes);
        Ok(VirtualMemory { pt, handler })
    }

    pub fn page_table(&self) -> &PageTable {
        &self.pt
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn len(&self) -> usize {
        self.pt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pt.is_empty()
    }

    /// Tear down the mappings, handing back the handler
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Read the byte at virtual address `addr`
    pub fn load(&mut self, addr: usize) -> u8 {
        let pa = self.trap(addr, Access::Read);
        self.pt.physmem().read(pa)
    }

    /// Write the byte at virtual address `addr`
    pub fn store(&mut self, addr: usize, value: u8) {
        let pa = self.trap(addr, Access::Write);
        self.pt.physmem_mut().write(pa, value);
    }

    /// Resolve `addr` to a physical address, delivering faults until the
    /// access is permitted.
    fn trap(&mut self, addr: usize, access: Access) -> usize {
        let va = VirtualAddress::from_raw(addr);
        let mut faults = 0;

        loop {
            match translate(&va, &self.pt, access) {
                TranslationResult::Success(pa) => return pa,
                TranslationResult::SegmentationFault => {
                    panic!("segmentation fault at address {:#x}", addr);
                }
                TranslationResult::PageFault(page) => {
                    if faults == MAX_FAULT_RETRIES {
                        panic!("page fault on page #{} unresolved after {} attempts", page, faults);
                    }
                    faults += 1;
                    self.handler.page_fault(&mut self.pt, page);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps page N to frame N read-write, like a memory with no replacement
    struct IdentityHandler {
        faults: Vec<usize>,
    }

    impl FaultHandler for IdentityHandler {
        fn page_fault(&mut self, pt: &mut PageTable, page: usize) {
            self.faults.push(page);
            pt.set_entry(page, page, Protection::READ | Protection::WRITE);
        }
    }

    struct NoopHandler;

    impl FaultHandler for NoopHandler {
        fn page_fault(&mut self, _pt: &mut PageTable, _page: usize) {}
    }

    #[test]
    fn test_new_table_is_non_resident() {
        let pt = PageTable::new(3, 2).unwrap();
        assert_eq!(pt.npages(), 3);
        assert_eq!(pt.nframes(), 2);
        assert_eq!(pt.len(), 3 * PAGE_SIZE);
        assert!(pt.resident().next().is_none());
        assert!(!pt.get_entry(2).is_resident());
    }

    #[test]
    fn test_zero_geometry_rejected() {
        assert!(matches!(
            PageTable::new(0, 2),
            Err(VmError::InvalidGeometry { npages: 0, nframes: 2 })
        ));
        assert!(PageTable::new(2, 0).is_err());
    }

    #[test]
    fn test_set_entry_then_get_entry() {
        let mut pt = PageTable::new(4, 2).unwrap();
        pt.set_entry(3, 1, Protection::READ);

        let entry = pt.get_entry(3);
        assert_eq!(entry.frame, 1);
        assert_eq!(entry.bits, Protection::READ);
        assert!(entry.is_resident());
    }

    #[test]
    fn test_set_entry_zero_bits_invalidates() {
        let mut pt = PageTable::new(4, 2).unwrap();
        pt.set_entry(1, 1, Protection::READ | Protection::WRITE);
        pt.set_entry(1, 0, Protection::empty());

        assert!(!pt.get_entry(1).is_resident());
        assert_eq!(pt.resident().count(), 0);
    }

    #[test]
    #[should_panic(expected = "page_table_get_entry: illegal page #4")]
    fn test_get_entry_out_of_range_panics() {
        let pt = PageTable::new(4, 2).unwrap();
        pt.get_entry(4);
    }

    #[test]
    #[should_panic(expected = "page_table_set_entry: illegal page #9")]
    fn test_set_entry_page_out_of_range_panics() {
        let mut pt = PageTable::new(4, 2).unwrap();
        pt.set_entry(9, 0, Protection::READ);
    }

    #[test]
    #[should_panic(expected = "page_table_set_entry: illegal frame #2")]
    fn test_set_entry_frame_out_of_range_panics() {
        let mut pt = PageTable::new(4, 2).unwrap();
        pt.set_entry(0, 2, Protection::READ);
    }

    #[test]
    fn test_print_format() {
        let mut pt = PageTable::new(2, 2).unwrap();
        pt.set_entry(1, 1, Protection::READ | Protection::WRITE);

        let mut out = Vec::new();
        pt.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "page 000000: frame 000000 bits ---\npage 000001: frame 000001 bits rw-\n"
        );
    }

    #[test]
    fn test_protection_display() {
        assert_eq!(Protection::empty().to_string(), "---");
        assert_eq!((Protection::READ | Protection::EXEC).to_string(), "r-x");
    }

    #[test]
    fn test_access_delivers_fault_then_retries() {
        let handler = IdentityHandler { faults: Vec::new() };
        let mut vm = VirtualMemory::new(2, 2, handler).unwrap();

        vm.store(PAGE_SIZE + 5, 42);
        assert_eq!(vm.load(PAGE_SIZE + 5), 42);
        assert_eq!(vm.handler().faults, vec![1]);

        // Frame 1 backs page 1
        assert_eq!(vm.page_table().physmem().frame(1)[5], 42);
    }

    #[test]
    #[should_panic(expected = "segmentation fault at address 0x2000")]
    fn test_access_outside_range_is_segfault() {
        let mut vm = VirtualMemory::new(2, 2, NoopHandler).unwrap();
        vm.load(2 * PAGE_SIZE);
    }

    #[test]
    #[should_panic(expected = "unresolved after 3 attempts")]
    fn test_unresolved_fault_aborts() {
        let mut vm = VirtualMemory::new(2, 2, NoopHandler).unwrap();
        vm.load(0);
    }
}
