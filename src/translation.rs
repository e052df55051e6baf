use crate::constants::*;
use crate::page_table::{PageTable, Protection};

/// A virtual address split into page number and offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: usize,
    pub page: usize,
    pub offset: usize,
}

impl VirtualAddress {
    /// Decompose a raw VA (relative to the start of the virtual range)
    pub fn from_raw(va: usize) -> Self {
        VirtualAddress {
            va,
            page: va >> PAGE_SHIFT,
            offset: va & OFFSET_MASK,
        }
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VA({:#x}) = (page={}, offset={})", self.va, self.page, self.offset)
    }
}

/// Kind of memory access performed by a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Protection bit an entry must carry for this access to proceed
    pub fn required(self) -> Protection {
        match self {
            Access::Read => Protection::READ,
            Access::Write => Protection::WRITE,
        }
    }
}

/// Result of an address translation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationResult {
    /// Physical address the access lands on
    Success(usize),
    /// Current protection forbids the access; the fault handler must run
    PageFault(usize),
    /// Address lies outside the virtual range
    SegmentationFault,
}

/// Translate a virtual address for the given access
pub fn translate(va: &VirtualAddress, pt: &PageTable, access: Access) -> TranslationResult {
    if va.page >= pt.npages() {
        return TranslationResult::SegmentationFault;
    }

    let entry = pt.get_entry(va.page);
    if !entry.bits.contains(access.required()) {
        return TranslationResult::PageFault(va.page);
    }

    TranslationResult::Success(entry.frame * PAGE_SIZE + va.offset)
}
