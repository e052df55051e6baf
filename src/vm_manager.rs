//! Fault engine.
//!
//! [`VmManager`] is the per-run session: it owns the frame table, the
//! replacement policy, the paging disk and the statistics, and is registered
//! with [`VirtualMemory`](crate::page_table::VirtualMemory) as its fault
//! handler.

use crate::disk::BlockStore;
use crate::memory::FrameTable;
use crate::page_table::{FaultHandler, PageTable, Protection};
use crate::policy::{PolicyKind, ReplacementPolicy};

/// Counters reported at the end of a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub page_faults: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Disk Reads: {}", self.disk_reads)?;
        writeln!(f, "Disk Writes: {}", self.disk_writes)?;
        write!(f, "Page Faults: {}", self.page_faults)
    }
}

pub struct VmManager<D> {
    frames: FrameTable,
    policy: Box<dyn ReplacementPolicy>,
    disk: D,
    stats: Stats,
}

impl<D: BlockStore> VmManager<D> {
    pub fn new(nframes: usize, kind: PolicyKind, seed: u64, disk: D) -> Self {
        Self::with_policy(nframes, kind.build(nframes, seed), disk)
    }

    /// Use a caller-supplied replacement algorithm
    pub fn with_policy(nframes: usize, policy: Box<dyn ReplacementPolicy>, disk: D) -> Self {
        VmManager {
            frames: FrameTable::new(nframes),
            policy,
            disk,
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn disk(&self) -> &D {
        &self.disk
    }

    pub fn into_disk(self) -> D {
        self.disk
    }

    /// Bring a non-resident page into a frame, evicting if none is free
    fn page_in(&mut self, pt: &mut PageTable, page: usize) {
        let frame = match self.frames.find_and_reserve_free() {
            Some(frame) => frame,
            None => self.evict(pt),
        };

        pt.set_entry(page, frame, Protection::READ);

        self.disk.read_block(page, pt.physmem_mut().frame_mut(frame));
        self.stats.disk_reads += 1;

        self.frames.occupy(frame, page);
        self.policy.frame_loaded(frame);
        log::debug!("page #{} loaded into frame #{}", page, frame);
    }

    /// Free a frame chosen by the policy, writing its page back if dirty.
    /// Returns the freed frame.
    fn evict(&mut self, pt: &mut PageTable) -> usize {
        let frame = self.policy.select_victim(&self.frames);
        if frame >= self.frames.nframes() {
            panic!("{} policy selected illegal frame #{}", self.policy.name(), frame);
        }

        let Some(victim) = self.frames.page_in(frame) else {
            panic!("frame #{} selected for eviction holds no page", frame);
        };

        let entry = pt.get_entry(victim);
        debug_assert_eq!(entry.frame, frame, "page table and frame table disagree");

        if entry.bits.contains(Protection::WRITE) {
            self.disk.write_block(victim, pt.physmem().frame(frame));
            self.stats.disk_writes += 1;
            log::debug!("page #{} written back from frame #{}", victim, frame);
        }

        pt.set_entry(victim, 0, Protection::empty());
        log::debug!("{}: evicted page #{} from frame #{}", self.policy.name(), victim, frame);
        frame
    }

    fn dump(pt: &PageTable) {
        let mut out = Vec::new();
        if pt.print(&mut out).is_ok() {
            for line in String::from_utf8_lossy(&out).lines() {
                log::trace!("{}", line);
            }
        }
    }
}

impl<D: BlockStore> FaultHandler for VmManager<D> {
    fn page_fault(&mut self, pt: &mut PageTable, page: usize) {
        log::debug!("page fault on page #{}", page);
        self.stats.page_faults += 1;

        let entry = pt.get_entry(page);
        let rw = Protection::READ | Protection::WRITE;

        if !entry.bits.intersects(rw | Protection::EXEC) {
            self.page_in(pt, page);
        } else if entry.bits & rw == Protection::READ {
            pt.set_entry(page, entry.frame, entry.bits | Protection::WRITE);
        } else {
            pt.set_entry(page, entry.frame, entry.bits | Protection::READ);
        }

        if log::log_enabled!(log::Level::Trace) {
            Self::dump(pt);
        }
    }
}
