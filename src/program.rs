//! Workload generators.
//!
//! Each program runs a deterministic, page-granular access pattern over the
//! whole virtual range and returns a checksum of what it read back.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::*;
use crate::error::VmError;
use crate::page_table::{FaultHandler, VirtualMemory};

/// Byte-addressed memory a workload runs against
pub trait Memory {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&mut self, addr: usize) -> u8;

    fn store(&mut self, addr: usize, value: u8);
}

impl<H: FaultHandler> Memory for VirtualMemory<H> {
    fn len(&self) -> usize {
        VirtualMemory::len(self)
    }

    fn load(&mut self, addr: usize) -> u8 {
        VirtualMemory::load(self, addr)
    }

    fn store(&mut self, addr: usize, value: u8) {
        VirtualMemory::store(self, addr, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    Sort,
    Scan,
    Focus,
}

impl ProgramKind {
    pub fn name(self) -> &'static str {
        match self {
            ProgramKind::Sort => "sort",
            ProgramKind::Scan => "scan",
            ProgramKind::Focus => "focus",
        }
    }

    pub fn run<M: Memory>(self, mem: &mut M) -> u64 {
        let total = match self {
            ProgramKind::Sort => sort_program(mem),
            ProgramKind::Scan => scan_program(mem),
            ProgramKind::Focus => focus_program(mem),
        };
        println!("{} result is {}", self.name(), total);
        total
    }
}

impl FromStr for ProgramKind {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sort" => Ok(ProgramKind::Sort),
            "scan" => Ok(ProgramKind::Scan),
            "focus" => Ok(ProgramKind::Focus),
            _ => Err(VmError::UnknownProgram(s.to_string())),
        }
    }
}

#[inline]
fn touched(addr: usize) {
    log::trace!("page accessed: {}", addr / PAGE_SIZE);
}

fn read<M: Memory>(mem: &mut M, addr: usize) -> u8 {
    touched(addr);
    mem.load(addr)
}

fn write<M: Memory>(mem: &mut M, addr: usize, value: u8) {
    touched(addr);
    mem.store(addr, value);
}

fn checksum<M: Memory>(mem: &mut M) -> u64 {
    (0..mem.len()).map(|i| read(mem, i) as u64).sum()
}

/// Fill with random bytes, heapsort in place, then sum
pub fn sort_program<M: Memory>(mem: &mut M) -> u64 {
    let len = mem.len();
    let mut rng = StdRng::seed_from_u64(SORT_SEED);

    for i in 0..len {
        let value = rng.r#gen::<u8>();
        write(mem, i, value);
    }

    for start in (0..len / 2).rev() {
        sift_down(mem, start, len);
    }
    for end in (1..len).rev() {
        let a = read(mem, 0);
        let b = read(mem, end);
        write(mem, 0, b);
        write(mem, end, a);
        sift_down(mem, 0, end);
    }

    checksum(mem)
}

fn sift_down<M: Memory>(mem: &mut M, mut root: usize, end: usize) {
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            return;
        }
        if child + 1 < end && read(mem, child) < read(mem, child + 1) {
            child += 1;
        }

        let parent = read(mem, root);
        let larger = read(mem, child);
        if parent >= larger {
            return;
        }
        write(mem, root, larger);
        write(mem, child, parent);
        root = child;
    }
}

/// Write one byte per page, then sweep the pages repeatedly
pub fn scan_program<M: Memory>(mem: &mut M) -> u64 {
    let len = mem.len();

    for addr in (0..len).step_by(PAGE_SIZE) {
        write(mem, addr, (addr / PAGE_SIZE % 256) as u8);
    }

    let mut total = 0u64;
    for _ in 0..SCAN_PASSES {
        for addr in (0..len).step_by(PAGE_SIZE) {
            total += read(mem, addr) as u64;
        }
    }
    total
}

/// Zero everything, then hammer small random windows
pub fn focus_program<M: Memory>(mem: &mut M) -> u64 {
    let len = mem.len();
    let mut rng = StdRng::seed_from_u64(FOCUS_SEED);

    for i in 0..len {
        write(mem, i, 0);
    }

    for _ in 0..FOCUS_BURSTS {
        let start = rng.gen_range(0..len);
        for _ in 0..FOCUS_BURST_LEN {
            let addr = (start + rng.gen_range(0..FOCUS_WINDOW)) % len;
            let value = rng.r#gen::<u8>();
            write(mem, addr, value);
        }
    }

    checksum(mem)
}
