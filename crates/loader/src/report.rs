//! Read-only summaries of a finished core, rendered as text or JSON.

use core::fmt;

use serde::Serialize;
use sim_core::{CacheStats, CoreState, FaultClass, Register, RunState, REGISTER_COUNT};

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The core never reached a terminal state.
    Running,
    /// `HALT` retired.
    Halted,
    /// PC left the program.
    EndOfProgram,
    /// An instruction faulted.
    Faulted,
}

impl RunStatus {
    const fn of(state: &RunState) -> Self {
        match state {
            RunState::Running => Self::Running,
            RunState::Halted => Self::Halted,
            RunState::EndOfProgram => Self::EndOfProgram,
            RunState::Faulted(_) => Self::Faulted,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Halted => "halted",
            Self::EndOfProgram => "end of program",
            Self::Faulted => "faulted",
        }
    }
}

/// The fault that stopped the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultReport {
    /// Stable fault code.
    pub code: u8,
    /// Reporting class.
    pub class: FaultClass,
    /// Human-readable description.
    pub message: String,
}

/// Cache shape and counters at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    /// Number of lines.
    pub lines: u32,
    /// Words per line.
    pub block_size: u32,
    /// Lines currently holding a block.
    pub valid_lines: usize,
    /// Lines holding unwritten data.
    pub dirty_lines: usize,
    /// Access counters.
    pub stats: CacheStats,
}

/// One non-zero word of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryWord {
    /// Byte address.
    pub address: u32,
    /// Stored value, read as signed.
    pub value: i32,
}

/// Everything a caller may want to know after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Whether the core reached a terminal state.
    pub halted: bool,
    /// Which terminal state it reached.
    pub status: RunStatus,
    /// Final program counter.
    pub pc: u32,
    /// Instructions executed.
    pub steps: u64,
    /// Fault details when the run faulted.
    pub fault: Option<FaultReport>,
    /// Final register values, `R0` first.
    pub registers: [i32; REGISTER_COUNT],
    /// Cache summary when a cache is attached.
    pub cache: Option<CacheReport>,
    /// Non-zero words of the store in address order.
    pub memory: Vec<MemoryWord>,
}

impl RunReport {
    /// Snapshots `core`.
    ///
    /// Memory is read from the word store directly, so words still dirty in
    /// an attached cache show their previous value.
    #[must_use]
    pub fn from_core(core: &CoreState) -> Self {
        let fault = core.fault().map(|fault| FaultReport {
            code: fault.code().as_u8(),
            class: fault.class(),
            message: fault.to_string(),
        });
        let cache = core.cache().map(|cache| CacheReport {
            lines: cache.geometry().lines(),
            block_size: cache.geometry().block_size(),
            valid_lines: cache.lines().iter().filter(|line| line.is_valid()).count(),
            dirty_lines: cache.lines().iter().filter(|line| line.is_dirty()).count(),
            stats: *cache.stats(),
        });
        let memory = core
            .store()
            .iter()
            .filter(|&(_, value)| value != 0)
            .map(|(address, value)| MemoryWord {
                address,
                value: i32::from_ne_bytes(value.to_ne_bytes()),
            })
            .collect();

        Self {
            halted: core.is_halted(),
            status: RunStatus::of(core.run_state()),
            pc: core.pc(),
            steps: core.steps(),
            fault,
            registers: core.register_values(),
            cache,
            memory,
        }
    }

    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; none is expected for this type.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "status: {}", self.status.label())?;
        writeln!(f, "pc: {}", self.pc)?;
        writeln!(f, "steps: {}", self.steps)?;
        if let Some(fault) = &self.fault {
            writeln!(f, "fault: [0x{:02X}] {}", fault.code, fault.message)?;
        }

        writeln!(f, "registers:")?;
        for (row_start, row) in (0_u8..).step_by(4).zip(self.registers.chunks(4)) {
            let cells: Vec<String> = (row_start..)
                .zip(row)
                .filter_map(|(index, value)| {
                    Register::new(index).map(|reg| format!("{:>4} = {value:<11}", reg.to_string()))
                })
                .collect();
            writeln!(f, "  {}", cells.join(" ").trim_end())?;
        }

        match &self.cache {
            Some(cache) => writeln!(
                f,
                "cache: enabled, {} lines of {} words, {} hits, {} misses, {} write-backs, {} dirty",
                cache.lines,
                cache.block_size,
                cache.stats.hits(),
                cache.stats.misses(),
                cache.stats.write_backs,
                cache.dirty_lines
            )?,
            None => writeln!(f, "cache: disabled")?,
        }

        if self.memory.is_empty() {
            writeln!(f, "memory: all zero")
        } else {
            writeln!(f, "memory:")?;
            for word in &self.memory {
                writeln!(f, "  0x{:08X}: {}", word.address, word.value)?;
            }
            Ok(())
        }
    }
}
