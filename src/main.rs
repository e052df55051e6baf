//! virtmem - Demand-Paged Virtual Memory Simulator
//!
//! Usage: virtmem [OPTIONS] <npages> <nframes> <rand|fifo|custom> <sort|scan|focus>
//!
//! Arguments:
//!   npages   - Number of pages in the virtual range
//!   nframes  - Number of frames in physical memory
//!   policy   - Page replacement policy
//!   program  - Workload to run against the virtual range
//!
//! Options:
//!   -s, --seed <n>     Seed for the random policy
//!   -d, --disk <path>  Backing file for the paging disk
//!   -v, --verbose      Log every fault and eviction
//!   -h, --help         Print help information

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use virtmem::constants::{DEFAULT_DISK_NAME, DEFAULT_SEED, USAGE};
use virtmem::disk::FileDisk;
use virtmem::error::{VmError, VmResult};
use virtmem::page_table::VirtualMemory;
use virtmem::policy::PolicyKind;
use virtmem::program::ProgramKind;
use virtmem::vm_manager::VmManager;

/// Command-line configuration
struct Config {
    npages: usize,
    nframes: usize,
    policy: PolicyKind,
    program: ProgramKind,
    seed: u64,
    disk: PathBuf,
    verbose: bool,
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    let level = if config.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn print_help(program: &str) {
    eprintln!("Virtual Memory Simulator - Demand paging over a simulated disk");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <npages> <nframes> <rand|fifo|custom> <sort|scan|focus>", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --seed <n>     Seed for the random policy (default {})", DEFAULT_SEED);
    eprintln!("  -d, --disk <path>  Backing file for the paging disk (default {})", DEFAULT_DISK_NAME);
    eprintln!("  -v, --verbose      Log every fault and eviction");
    eprintln!("  -h, --help         Print this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} 100 10 fifo scan", program);
    eprintln!("  {} -v --seed 7 100 10 rand sort", program);
}

fn parse_count(arg: &str) -> Result<usize, VmError> {
    arg.parse().map_err(|_| VmError::InvalidCount(arg.to_string()))
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("virtmem");

    let mut verbose = false;
    let mut seed = DEFAULT_SEED;
    let mut disk = PathBuf::from(DEFAULT_DISK_NAME);
    let mut positional: Vec<&String> = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help(program);
                process::exit(0);
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-s" | "--seed" => {
                let value = iter.next().ok_or_else(|| format!("{} needs a value", arg))?;
                seed = value.parse().map_err(|_| format!("Invalid seed: {}", value))?;
            }
            "-d" | "--disk" => {
                let value = iter.next().ok_or_else(|| format!("{} needs a value", arg))?;
                disk = PathBuf::from(value);
            }
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                positional.push(arg);
            }
        }
    }

    if positional.len() != 4 {
        return Err(format!("Expected 4 arguments, got {}", positional.len()));
    }

    let err = |e: VmError| e.to_string();
    Ok(Config {
        npages: parse_count(positional[0]).map_err(err)?,
        nframes: parse_count(positional[1]).map_err(err)?,
        policy: positional[2].parse().map_err(err)?,
        program: positional[3].parse().map_err(err)?,
        seed,
        disk,
        verbose,
    })
}

/// Main logic separated from main() for cleaner error handling
fn run(config: &Config) -> VmResult<()> {
    let disk = FileDisk::open(&config.disk, config.npages)?;
    let manager = VmManager::new(config.nframes, config.policy, config.seed, disk);
    let mut vm = VirtualMemory::new(config.npages, config.nframes, manager)?;

    log::info!(
        "running {} with {} pages, {} frames, policy {}",
        config.program.name(),
        config.npages,
        config.nframes,
        vm.handler().policy_name()
    );

    config.program.run(&mut vm);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    vm.page_table().print(&mut out)?;
    writeln!(out, "{}", vm.handler().stats())?;

    // Release the mappings before closing the disk
    let disk = vm.into_handler().into_disk();
    log::debug!("closing disk {}", disk.path().display());
    Ok(())
}
