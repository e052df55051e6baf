pub const PAGE_SHIFT: u32 = 12;

pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
pub const OFFSET_MASK: usize = PAGE_SIZE - 1;
pub const BLOCK_SIZE: usize = PAGE_SIZE;

/// Upper bound on handler invocations for a single access: page-in, then write upgrade.
pub const MAX_FAULT_RETRIES: usize = 3;

pub const DEFAULT_DISK_NAME: &str = "myvirtualdisk";
pub const DEFAULT_SEED: u64 = 0;

pub const USAGE: &str = "use: virtmem <npages> <nframes> <rand|fifo|custom> <sort|scan|focus>";

pub const SORT_SEED: u64 = 4856;
pub const FOCUS_SEED: u64 = 38290;
pub const SCAN_PASSES: usize = 10;
pub const FOCUS_BURSTS: usize = 100;
pub const FOCUS_BURST_LEN: usize = 100;
pub const FOCUS_WINDOW: usize = 25;
