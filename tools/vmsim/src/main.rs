use clap::Parser;
use kernel_console::ConsoleLogger;
use kernel_fs::{FileSystem, HostFileSystem};
use kernel_vmem::{
    ConfigError, InvariantViolation, LoadError, PAGE_SIZE, PagingMode, ProcessId, ProgramImage,
    TransferError, VirtualAddress, VirtualPageNumber, VmConfig, VmInitError, VmKernel,
    VmStatsSnapshot,
};
use log::{LevelFilter, info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Barrier};
use std::{fs, thread};

#[derive(Debug, Parser)]
#[command(name = "vmsim", about = "Run concurrent paging workloads against the memory manager")]
struct Args {
    /// Kernel configuration file with `key = value` lines.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Physical frames. Overrides the configuration file.
    #[arg(long)]
    frames: Option<u32>,

    #[arg(long, default_value_t = 4)]
    processes: u32,

    /// Stack pages every process writes and verifies.
    #[arg(long, default_value_t = 16)]
    pages: u32,

    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Load every process eagerly instead of on demand.
    #[arg(long)]
    eager: bool,

    /// Directory holding the swap file. A temporary directory if omitted.
    #[arg(long)]
    swap_dir: Option<PathBuf>,

    /// More output; repeat for trace level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, thiserror::Error)]
enum SimError {
    #[error("cannot read {path:?}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("cannot prepare the swap directory")]
    SwapDir(#[from] std::io::Error),
    #[error("kernel did not start")]
    Init(#[from] VmInitError),
    #[error("spawning worker {index} failed")]
    Spawn {
        index: u32,
        #[source]
        source: LoadError,
    },
    #[error("transfer failed")]
    Transfer(#[from] TransferError),
    #[error("{pid} moved {moved} of {page} bytes at {vpn}", page = PAGE_SIZE)]
    ShortTransfer {
        pid: ProcessId,
        vpn: VirtualPageNumber,
        moved: usize,
    },
    #[error("{pid} read back {found:#04X} from {vpn}, expected {expected:#04X}")]
    Mismatch {
        pid: ProcessId,
        vpn: VirtualPageNumber,
        expected: u8,
        found: u8,
    },
    #[error("worker thread panicked")]
    Panicked,
    #[error("page tables disagree with the frame table")]
    Invariant(#[from] InvariantViolation),
}

/// One simulated user program: its pid and the stack pages it exercises.
struct Worker {
    pid: ProcessId,
    first_page: u32,
    seed: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if ConsoleLogger::new(level).init().is_err() {
        eprintln!("a logger was already installed");
    }

    match run(&args) {
        Ok(stats) => {
            print_stats(&stats);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<VmConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| SimError::ReadConfig {
                path: path.clone(),
                source,
            })?;
            VmConfig::parse(&text)?
        }
        None => VmConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.set_phys_pages(frames);
    }
    if args.eager {
        config.set_paging(PagingMode::Eager);
    }
    config.set_stack_pages(config.stack_pages().max(args.pages));
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<VmStatsSnapshot, SimError> {
    let config = load_config(args)?;

    // dropped after the kernel, which removes its swap file first
    let temp_dir = tempfile::tempdir()?;
    let swap_dir = match &args.swap_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => temp_dir.path().to_path_buf(),
    };
    let fs: Arc<dyn FileSystem> = Arc::new(HostFileSystem::new(&swap_dir));
    info!("swap directory {}", swap_dir.display());

    let vm = VmKernel::new(config, fs)?;
    let image = program_image();

    let mut workers = Vec::new();
    for index in 0..args.processes {
        let name = format!("worker-{index}");
        let process = vm
            .spawn(Arc::clone(&image), &[&name])
            .map_err(|source| SimError::Spawn { index, source })?;
        #[allow(clippy::cast_possible_truncation)]
        let seed = index as u8;
        workers.push(Worker {
            pid: process.pid(),
            first_page: process.layout().section_pages(),
            seed,
        });
    }

    let barrier = Barrier::new(workers.len());
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = workers
            .iter()
            .map(|worker| {
                let (vm, barrier) = (&vm, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    exercise(vm, worker, args.pages, args.rounds)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(SimError::Panicked)))
            .collect()
    });
    for result in results {
        result?;
    }

    vm.check_invariants()?;
    for worker in &workers {
        if !vm.teardown(worker.pid) {
            warn!("{} was already gone", worker.pid);
        }
    }
    vm.shutdown();
    Ok(vm.stats())
}

/// Write a distinct byte pattern over every page, read it all back, repeat.
fn exercise(vm: &VmKernel, worker: &Worker, pages: u32, rounds: u32) -> Result<(), SimError> {
    let pid = worker.pid;
    for round in 0..rounds {
        for n in 0..pages {
            let vpn = VirtualPageNumber::new(worker.first_page + n);
            let data = [pattern(worker.seed, n, round); PAGE_SIZE];
            let moved = vm.write_virtual(pid, vpn.base(), &data)?;
            if moved != PAGE_SIZE {
                return Err(SimError::ShortTransfer { pid, vpn, moved });
            }
        }

        for n in 0..pages {
            let vpn = VirtualPageNumber::new(worker.first_page + n);
            let expected = pattern(worker.seed, n, round);
            let mut buf = [0u8; PAGE_SIZE];
            let moved = vm.read_virtual(pid, vpn.base(), &mut buf)?;
            if moved != PAGE_SIZE {
                return Err(SimError::ShortTransfer { pid, vpn, moved });
            }
            if let Some(&found) = buf.iter().find(|&&b| b != expected) {
                return Err(SimError::Mismatch {
                    pid,
                    vpn,
                    expected,
                    found,
                });
            }
        }
        info!("{pid}: round {round} verified");
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
const fn pattern(seed: u8, page: u32, round: u32) -> u8 {
    seed.wrapping_mul(31)
        .wrapping_add(page as u8)
        .wrapping_add((round as u8).wrapping_mul(7))
}

/// A small program: read-only code followed by initialized data.
fn program_image() -> Arc<dyn kernel_vmem::Executable> {
    let text: Vec<u8> = (0..=255u8).cycle().take(2 * PAGE_SIZE).collect();
    ProgramImage::new(VirtualAddress::new(0))
        .with_next_section(".text", true, text)
        .with_next_section(".data", false, b"vmsim".to_vec())
        .into_arc()
}

fn print_stats(stats: &VmStatsSnapshot) {
    println!("page faults      {:>8}", stats.page_faults);
    println!("free frame hits  {:>8}", stats.free_frame_hits);
    println!("evictions        {:>8}", stats.evictions);
    println!("swap outs        {:>8}", stats.swap_outs);
    println!("swap ins         {:>8}", stats.swap_ins);
    println!("image loads      {:>8}", stats.image_loads);
    println!("zero fills       {:>8}", stats.zero_fills);
    println!("pin waits        {:>8}", stats.pin_waits);
}
