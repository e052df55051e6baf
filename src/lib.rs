pub mod constants;
pub mod disk;
pub mod error;
pub mod memory;
pub mod page_table;
pub mod policy;
pub mod program;
pub mod translation;
pub mod vm_manager;

// Re-export commonly used items for convenience
pub use constants::*;
pub use disk::{BlockStore, FileDisk, RamDisk};
pub use error::{VmError, VmResult};
pub use page_table::{FaultHandler, PageTable, PageTableEntry, Protection, VirtualMemory};
pub use policy::{PolicyKind, ReplacementPolicy};
pub use program::{Memory, ProgramKind};
pub use translation::{Access, TranslationResult, VirtualAddress};
pub use vm_manager::{Stats, VmManager};
