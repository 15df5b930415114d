//! `mips-sim`: load a program, run it to completion and report the result.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use log as _;
use serde as _;
use serde_json as _;
use sim_core::{disassemble, run, CoreConfig, NoTrace, RunOutcome, StepOutcome};
use sim_loader::{prepare, RunReport, RunRequest, TextTrace};
#[cfg(test)]
use tempfile as _;
use thiserror as _;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "mips-sim", version, about = "Run a MIPS-style program against a word store and an optional write-back cache")]
struct Cli {
    /// Instruction file, one instruction per line.
    #[arg(short, long)]
    instructions: PathBuf,

    /// Data file of `binary-address,value` lines.
    #[arg(short, long)]
    memory: Option<PathBuf>,

    /// Words per cache line.
    #[arg(long, default_value_t = sim_core::DEFAULT_BLOCK_SIZE)]
    block_size: u32,

    /// Cache capacity in bytes.
    #[arg(long, default_value_t = sim_core::DEFAULT_CACHE_SIZE)]
    cache_size: u32,

    /// Word-store size in bytes.
    #[arg(long, default_value_t = sim_core::DEFAULT_MEMORY_SIZE)]
    memory_size: u32,

    /// Invalidate every line when the cache is flushed.
    #[arg(long)]
    flush_invalidates: bool,

    /// Start with the cache enabled.
    #[arg(long)]
    cache: bool,

    /// Fault after this many instructions (0 disables the limit).
    #[arg(long, default_value_t = 1_000_000)]
    max_steps: u64,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print PC, instruction and registers for every step.
    #[arg(long)]
    trace: bool,

    /// Print the decoded program before running.
    #[arg(long)]
    listing: bool,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn request(&self) -> RunRequest {
        RunRequest {
            instructions: self.instructions.clone(),
            memory: self.memory.clone(),
            config: CoreConfig {
                block_size: self.block_size,
                cache_size: self.cache_size,
                memory_size: self.memory_size,
                flush_invalidates: self.flush_invalidates,
                step_limit: (self.max_steps != 0).then_some(self.max_steps),
                ..CoreConfig::default()
            },
            start_with_cache: self.cache,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_listing(core: &sim_core::CoreState, out: &mut dyn Write) -> io::Result<()> {
    for row in disassemble(core.program(), core.config().word_size) {
        let text = if row.operands.is_empty() {
            row.mnemonic
        } else {
            format!("{} {}", row.mnemonic, row.operands)
        };
        match &row.fault {
            Some(fault) => writeln!(out, "{:08X}: {text:<24} ; illegal: {fault}", row.address)?,
            None => writeln!(out, "{:08X}: {text}", row.address)?,
        }
    }
    Ok(())
}

fn execute(cli: &Cli) -> Result<RunOutcome, u8> {
    let mut prepared = prepare(&cli.request()).map_err(|err| {
        eprintln!("error: {err}");
        1
    })?;
    let core = &mut prepared.core;

    // JSON owns stdout, so listings and traces move to stderr.
    let mut side: Box<dyn Write> = match cli.format {
        OutputFormat::Text => Box::new(io::stdout().lock()),
        OutputFormat::Json => Box::new(io::stderr().lock()),
    };

    if cli.listing {
        print_listing(core, &mut side).map_err(|err| {
            eprintln!("error: {err}");
            1
        })?;
    }

    let outcome = if cli.trace {
        let mut sink = TextTrace::new(side);
        let outcome = run(core, &mut sink);
        if let Err(err) = sink.finish() {
            eprintln!("warning: trace output incomplete: {err}");
        }
        outcome
    } else {
        drop(side);
        run(core, &mut NoTrace)
    };

    let report = RunReport::from_core(core);
    match cli.format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("error: {err}");
                return Err(1);
            }
        },
    }
    Ok(outcome)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(RunOutcome {
            final_step: StepOutcome::Fault(_),
            ..
        }) => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}
