//! DRAM channel simulator CLI.
//!
//! This binary drives the simulator without a host model attached. It
//! performs:
//! 1. **Run:** Feed a seeded synthetic transaction stream into a
//!    `MemorySystem` for a number of cycles and report statistics.
//! 2. **Ideal:** The same stream against the fixed-latency baseline, for
//!    comparing a memory standard against a perfect one.

use std::cell::Cell;
use std::rc::Rc;
use std::{fs, process};

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dram_core::common::Transaction;
use dram_core::system::IdealMemorySystem;
use dram_core::{Config, MemorySystem};

#[derive(Parser, Debug)]
#[command(
    name = "dramsim",
    author,
    version,
    about = "Cycle-accurate DRAM channel simulator",
    long_about = "Drive a synthetic transaction stream against the DRAM model.\n\nConfiguration is JSON; missing fields take built-in DDR4-like defaults.\n\nExamples:\n  dramsim run --cycles 1000000\n  dramsim run -c configs/ddr4.json --write-percent 50\n  dramsim ideal --latency 60 --cycles 100000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a synthetic stream against the full DRAM model.
    Run {
        /// JSON configuration file; defaults apply to missing fields.
        #[arg(short, long)]
        config: Option<String>,

        /// Cycles to simulate.
        #[arg(long, default_value_t = 100_000)]
        cycles: u64,

        /// Percentage of transactions that are writes.
        #[arg(long, default_value_t = 30)]
        write_percent: u32,

        /// Percentage chance of a new transaction per cycle.
        #[arg(long, default_value_t = 50)]
        request_percent: u32,

        /// Stream seed.
        #[arg(long, default_value_t = 0xdead_beef)]
        seed: u64,
    },

    /// Run the same stream against the ideal fixed-latency baseline.
    Ideal {
        /// Completion latency in cycles.
        #[arg(long, default_value_t = 60)]
        latency: u64,

        /// Cycles to simulate.
        #[arg(long, default_value_t = 100_000)]
        cycles: u64,

        /// Percentage of transactions that are writes.
        #[arg(long, default_value_t = 30)]
        write_percent: u32,

        /// Percentage chance of a new transaction per cycle.
        #[arg(long, default_value_t = 50)]
        request_percent: u32,

        /// Stream seed.
        #[arg(long, default_value_t = 0xdead_beef)]
        seed: u64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            cycles,
            write_percent,
            request_percent,
            seed,
        } => cmd_run(config, cycles, write_percent, request_percent, seed),
        Commands::Ideal {
            latency,
            cycles,
            write_percent,
            request_percent,
            seed,
        } => cmd_ideal(latency, cycles, write_percent, request_percent, seed),
    }
}

/// Loads a JSON config, or the defaults when no path is given.
fn load_config(path: Option<String>) -> Config {
    match path {
        Some(path) => {
            let text = fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Error reading config {}: {}", path, e);
                process::exit(1);
            });
            serde_json::from_str(&text).unwrap_or_else(|e| {
                eprintln!("Error parsing config {}: {}", path, e);
                process::exit(1);
            })
        }
        None => Config::default(),
    }
}

/// One request of the synthetic stream, or None for an idle cycle.
fn next_request(
    rng: &mut StdRng,
    write_percent: u32,
    request_percent: u32,
) -> Option<(u64, bool)> {
    if rng.gen_range(0..100) >= request_percent {
        return None;
    }
    // Cache-line aligned addresses within a 1 GiB footprint.
    let addr = rng.gen::<u64>() & 0x3FFF_FFC0;
    let is_write = rng.gen_range(0..100) < write_percent;
    Some((addr, is_write))
}

/// Runs the DRAM model: admits the stream when buffers permit, ticks the
/// system, and prints epoch and final statistics.
fn cmd_run(
    config: Option<String>,
    cycles: u64,
    write_percent: u32,
    request_percent: u32,
    seed: u64,
) {
    let config = load_config(config);
    let epoch_period = config.general.epoch_period;
    let mut system = MemorySystem::new(&config);

    println!(
        "Configuration: {} channel(s), {} rank(s), {} cycles, seed {:#x}",
        config.general.channels, config.dram.ranks, cycles, seed
    );

    let reads_done = Rc::new(Cell::new(0u64));
    let writes_done = Rc::new(Cell::new(0u64));
    {
        let reads_done = Rc::clone(&reads_done);
        let writes_done = Rc::clone(&writes_done);
        system.register_callbacks(
            Box::new(move |_addr| reads_done.set(reads_done.get() + 1)),
            Box::new(move |_addr| writes_done.set(writes_done.get() + 1)),
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rejected = 0u64;
    for cycle in 0..cycles {
        if let Some((addr, is_write)) = next_request(&mut rng, write_percent, request_percent) {
            if system.will_accept_transaction(addr, is_write, false) {
                let trans = if is_write {
                    Transaction::write(addr, vec![0u8; 64])
                } else {
                    Transaction::read(addr)
                };
                system.add_transaction(trans);
            } else {
                rejected += 1;
            }
        }
        system.clock_tick();
        if epoch_period > 0 && cycle > 0 && cycle % epoch_period == 0 {
            system.print_epoch_stats();
        }
    }

    system.print_final_stats();
    println!(
        "\n[*] {} reads and {} writes completed, {} requests rejected at full buffers",
        reads_done.get(),
        writes_done.get(),
        rejected
    );
}

/// Runs the fixed-latency baseline over the same stream.
fn cmd_ideal(latency: u64, cycles: u64, write_percent: u32, request_percent: u32, seed: u64) {
    let mut system = IdealMemorySystem::new(latency);
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..cycles {
        if let Some((addr, is_write)) = next_request(&mut rng, write_percent, request_percent) {
            let trans = if is_write {
                Transaction::write(addr, vec![0u8; 64])
            } else {
                Transaction::read(addr)
            };
            system.add_transaction(trans);
        }
        system.clock_tick();
    }
    println!(
        "[*] ideal memory: {} reads and {} writes completed in {} cycles, {} in flight",
        system.num_reads_done, system.num_writes_done, cycles,
        system.queue_usage()
    );
}
