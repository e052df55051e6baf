use memmap2::MmapMut;

use crate::constants::*;
use crate::error::{VmError, VmResult};

/// The simulated physical frame pool, backed by an anonymous mapping.
pub struct PhysicalMemory {
    data: MmapMut,
    nframes: usize,
}

impl PhysicalMemory {
    /// Map `nframes` zeroed frames with full access
    pub fn new(nframes: usize) -> VmResult<Self> {
        let data = MmapMut::map_anon(nframes * PAGE_SIZE).map_err(VmError::PhysicalMemory)?;
        Ok(PhysicalMemory { data, nframes })
    }

    pub fn nframes(&self) -> usize {
        self.nframes
    }

    /// Read a byte at a physical address
    #[inline]
    pub fn read(&self, address: usize) -> u8 {
        self.data[address]
    }

    /// Write a byte at a physical address
    #[inline]
    pub fn write(&mut self, address: usize, value: u8) {
        self.data[address] = value;
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(frame: usize) -> usize {
        frame * PAGE_SIZE
    }

    /// Borrow the contents of a whole frame
    pub fn frame(&self, frame: usize) -> &[u8] {
        let start = Self::frame_to_address(frame);
        &self.data[start..start + PAGE_SIZE]
    }

    /// Mutably borrow the contents of a whole frame (for block reads)
    pub fn frame_mut(&mut self, frame: usize) -> &mut [u8] {
        let start = Self::frame_to_address(frame);
        &mut self.data[start..start + PAGE_SIZE]
    }
}

/// Occupancy of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Free,
    /// Claimed by a page-in that has not recorded its page yet
    Reserved,
    Holds(usize),
}

/// Tracks which frames are occupied and which page each one holds.
///
/// This is the inverse of the page table restricted to resident pages.
#[derive(Debug, Clone)]
pub struct FrameTable {
    frames: Vec<FrameState>,
}

impl FrameTable {
    pub fn new(nframes: usize) -> Self {
        FrameTable {
            frames: vec![FrameState::Free; nframes],
        }
    }

    pub fn nframes(&self) -> usize {
        self.frames.len()
    }

    /// Find the lowest free frame and mark it occupied.
    ///
    /// The caller follows up with [`FrameTable::occupy`] once the page is loaded.
    pub fn find_and_reserve_free(&mut self) -> Option<usize> {
        let frame = self.frames.iter().position(|&f| f == FrameState::Free)?;
        self.frames[frame] = FrameState::Reserved;
        Some(frame)
    }

    /// Record that `frame` now holds `page`
    pub fn occupy(&mut self, frame: usize, page: usize) {
        self.check(frame);
        self.frames[frame] = FrameState::Holds(page);
    }

    pub fn release(&mut self, frame: usize) {
        self.check(frame);
        self.frames[frame] = FrameState::Free;
    }

    pub fn state(&self, frame: usize) -> FrameState {
        self.check(frame);
        self.frames[frame]
    }

    /// The page resident in `frame`, if any
    pub fn page_in(&self, frame: usize) -> Option<usize> {
        match self.state(frame) {
            FrameState::Holds(page) => Some(page),
            _ => None,
        }
    }

    pub fn is_occupied(&self, frame: usize) -> bool {
        self.state(frame) != FrameState::Free
    }

    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|&&f| f == FrameState::Free).count()
    }

    pub fn is_full(&self) -> bool {
        self.free_count() == 0
    }

    /// Iterate over `(frame, page)` for every frame holding a page
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.frames.iter().enumerate().filter_map(|(frame, state)| match *state {
            FrameState::Holds(page) => Some((frame, page)),
            _ => None,
        })
    }

    fn check(&self, frame: usize) {
        if frame >= self.frames.len() {
            panic!("frame table: illegal frame #{} (nframes = {})", frame, self.frames.len());
        }
    }
}
