//! Page replacement policies.
//!
//! A policy only chooses the victim frame. Write-back, invalidation and
//! reload are applied by the fault engine in one place for every policy.

use std::collections::VecDeque;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::VmError;
use crate::memory::FrameTable;

pub trait ReplacementPolicy {
    fn name(&self) -> &'static str;

    /// A page was just loaded into `frame`
    fn frame_loaded(&mut self, _frame: usize) {}

    /// Choose the frame to evict. Only called when every frame is occupied.
    fn select_victim(&mut self, frames: &FrameTable) -> usize;
}

/// Evicts a uniformly random frame.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        RandomPolicy {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "rand"
    }

    fn select_victim(&mut self, frames: &FrameTable) -> usize {
        self.rng.gen_range(0..frames.nframes())
    }
}

/// Evicts frames in the order their pages arrived.
pub struct FifoPolicy {
    queue: VecDeque<usize>,
}

impl FifoPolicy {
    pub fn new(nframes: usize) -> Self {
        FifoPolicy {
            queue: VecDeque::with_capacity(nframes),
        }
    }

    /// Frames oldest-first
    pub fn queue(&self) -> impl Iterator<Item = usize> + '_ {
        self.queue.iter().copied()
    }
}

impl ReplacementPolicy for FifoPolicy {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn frame_loaded(&mut self, frame: usize) {
        self.queue.push_back(frame);
    }

    fn select_victim(&mut self, frames: &FrameTable) -> usize {
        assert_eq!(
            self.queue.len(),
            frames.nframes(),
            "fifo: eviction requested before all frames were occupied"
        );
        match self.queue.pop_front() {
            Some(frame) => frame,
            None => panic!("fifo: eviction requested with an empty arrival queue"),
        }
    }
}

/// Slot for a user-supplied algorithm. No algorithm is chosen here, so
/// eviction under this policy aborts; plug a real one in through
/// [`crate::vm_manager::VmManager::with_policy`].
pub struct UnimplementedPolicy;

impl ReplacementPolicy for UnimplementedPolicy {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn select_victim(&mut self, _frames: &FrameTable) -> usize {
        panic!("custom replacement policy is not implemented");
    }
}

/// Policy named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Random,
    Fifo,
    Custom,
}

impl PolicyKind {
    pub fn build(self, nframes: usize, seed: u64) -> Box<dyn ReplacementPolicy> {
        match self {
            PolicyKind::Random => Box::new(RandomPolicy::new(seed)),
            PolicyKind::Fifo => Box::new(FifoPolicy::new(nframes)),
            PolicyKind::Custom => Box::new(UnimplementedPolicy),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rand" => Ok(PolicyKind::Random),
            "fifo" => Ok(PolicyKind::Fifo),
            "custom" => Ok(PolicyKind::Custom),
            _ => Err(VmError::UnknownPolicy(s.to_string())),
        }
    }
}
