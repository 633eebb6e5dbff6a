//! The `xcsim` front-end: load an XE image, wire up tracers and run it to
//! completion, propagating the guest's exit code.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use xcsim_core::{DelegatingTracer, LoggingTracer, RunResult, StatsTracer, Tracer};
use xcsim_loader::Simulation;
use xcsim_support::CYCLES_PER_TICK;

#[derive(Parser)]
#[command(name = "xcsim", about = "XCore XS1/XS2 simulator", version)]
struct Options {
    /// XE image to simulate.
    file: PathBuf,

    /// Trace executed instructions.
    #[arg(short = 't', long)]
    trace: bool,

    /// Include thread cycle counts in the instruction trace.
    #[arg(long, requires = "trace")]
    trace_cycles: bool,

    /// Dump per-opcode execution counts at exit.
    #[arg(long)]
    stats: bool,

    /// Write a VCD waveform of every port to this file.
    #[arg(long, value_name = "FILE")]
    vcd: Option<PathBuf>,

    /// Stop after this many simulated cycles.
    #[arg(long, value_name = "CYCLES")]
    max_cycles: Option<u64>,

    /// Report simulated versus host time.
    #[arg(long)]
    time: bool,

    /// Command line made visible to the guest program.
    #[arg(long, num_args = 1.., value_name = "ARG", allow_hyphen_values = true)]
    args: Vec<String>,
}

fn tracer_from_options(options: &Options) -> Option<Box<dyn Tracer>> {
    let mut tracers: Vec<Box<dyn Tracer>> = Vec::new();
    if options.trace {
        tracers.push(Box::new(LoggingTracer::new(options.trace_cycles)));
    }
    if options.stats {
        tracers.push(Box::new(StatsTracer::new()));
    }
    match tracers.len() {
        0 => None,
        1 => tracers.pop(),
        _ => {
            let mut delegating = DelegatingTracer::new();
            for tracer in tracers {
                delegating.add_delegate(tracer);
            }
            Some(Box::new(delegating))
        }
    }
}

fn run(options: &Options) -> anyhow::Result<i32> {
    let mut simulation = Simulation::load(&options.file)
        .with_context(|| format!("loading {}", options.file.display()))?;

    if let Some(tracer) = tracer_from_options(options) {
        simulation.sys.set_tracer(tracer);
    }
    if let Some(path) = &options.vcd {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        simulation.sys.attach_waveform(Box::new(BufWriter::new(file)));
    }
    if let Some(max_cycles) = options.max_cycles {
        simulation.sys.set_timeout(max_cycles);
    }
    simulation.sys.syscalls.set_cmdline(options.args.clone());

    let started = Instant::now();
    let result = simulation.run()?;
    if options.time {
        let sim_seconds =
            simulation.sys.latest_time as f64 / (CYCLES_PER_TICK as f64 * 100_000_000.0);
        let real_seconds = started.elapsed().as_secs_f64();
        println!("Elapsed simulated time: {sim_seconds:.6}s");
        println!("Elapsed real time: {real_seconds:.6}s");
        println!("Relative simulator speed: {:.3}", sim_seconds / real_seconds);
    }

    Ok(match result {
        RunResult::Exit(code) => code,
        RunResult::Timeout => {
            tracing::error!("simulation timed out");
            1
        }
        RunResult::NoRunnableThreads => {
            tracing::error!("no runnable threads and no pending events");
            1
        }
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let options = Options::parse();
    match run(&options) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
