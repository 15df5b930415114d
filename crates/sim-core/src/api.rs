//! Public host-facing API for configuring, loading and observing a core.

use thiserror::Error;

use crate::decoder::{CacheOp, Instruction, ProgramSlot};
use crate::memory::{
    Cache, CacheGeometry, WordStore, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_SIZE, DEFAULT_MEMORY_SIZE,
    WORD_SIZE,
};
use crate::state::{RegisterFile, RunState, REGISTER_COUNT};
use crate::Fault;

/// Top-level configuration for a core instance, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Bytes per word; only 4 is supported.
    pub word_size: u32,
    /// Words per cache line.
    pub block_size: u32,
    /// Cache capacity in bytes.
    pub cache_size: u32,
    /// Word-store size in bytes.
    pub memory_size: u32,
    /// Whether a flush also invalidates and zeroes every line.
    pub flush_invalidates: bool,
    /// Maximum instructions executed before the core faults, if any.
    pub step_limit: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            word_size: WORD_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            memory_size: DEFAULT_MEMORY_SIZE,
            flush_invalidates: false,
            step_limit: None,
        }
    }
}

impl CoreConfig {
    /// Checks every size constraint and returns the derived cache geometry.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first violated constraint.
    pub fn validate(&self) -> Result<CacheGeometry, ConfigError> {
        if self.word_size != WORD_SIZE {
            return Err(ConfigError::UnsupportedWordSize(self.word_size));
        }
        let geometry = CacheGeometry::new(self.word_size, self.block_size, self.cache_size)?;

        let block_bytes = geometry.block_bytes();
        if self.memory_size == 0 || u64::from(self.memory_size) % block_bytes != 0 {
            return Err(ConfigError::MemoryNotBlockAligned {
                memory_size: self.memory_size,
                block_bytes,
            });
        }
        Ok(geometry)
    }
}

/// Invalid [`CoreConfig`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Word size other than 4 bytes.
    #[error("word size must be {WORD_SIZE} bytes, got {0}")]
    UnsupportedWordSize(u32),
    /// A size that must be a non-zero power of two.
    #[error("{field} must be a non-zero power of two, got {value}")]
    NotPowerOfTwo {
        /// Name of the offending setting.
        field: &'static str,
        /// Rejected value.
        value: u64,
    },
    /// Cache too small to hold a single line.
    #[error("cache of {cache_size} bytes cannot hold one {block_bytes}-byte block")]
    CacheSmallerThanBlock {
        /// Configured cache size in bytes.
        cache_size: u32,
        /// Size of one line in bytes.
        block_bytes: u64,
    },
    /// Memory size that is zero or not a whole number of blocks.
    #[error("memory size {memory_size} is not a non-zero multiple of the {block_bytes}-byte block")]
    MemoryNotBlockAligned {
        /// Configured memory size in bytes.
        memory_size: u32,
        /// Size of one line in bytes.
        block_bytes: u64,
    },
}

/// Complete state of one simulated machine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreState {
    config: CoreConfig,
    geometry: CacheGeometry,
    pub(crate) registers: RegisterFile,
    pub(crate) pc: u32,
    pub(crate) run_state: RunState,
    program: Vec<ProgramSlot>,
    store: WordStore,
    cache: Option<Cache>,
    pub(crate) steps: u64,
}

impl CoreState {
    /// Creates a running core with zeroed registers, an empty program, an
    /// all-zero word store and no cache.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn new(config: CoreConfig) -> Result<Self, ConfigError> {
        let geometry = config.validate()?;
        Ok(Self {
            config,
            geometry,
            registers: RegisterFile::new(),
            pc: 0,
            run_state: RunState::Running,
            program: Vec::new(),
            store: WordStore::new(config.memory_size),
            cache: None,
            steps: 0,
        })
    }

    /// Replaces the program, decoding every token list once.
    ///
    /// Resets PC, run state and step count; registers and memory are kept.
    pub fn load_program<S: AsRef<str>>(&mut self, program: &[Vec<S>]) {
        let len = program.len();
        self.program = program
            .iter()
            .map(|tokens| ProgramSlot::new(tokens, len))
            .collect();
        let faulty = self
            .program
            .iter()
            .filter(|slot| slot.decoded.fault().is_some())
            .count();
        log::info!("loaded {len} instructions ({faulty} fail to decode)");

        self.pc = 0;
        self.run_state = RunState::Running;
        self.steps = 0;
    }

    /// Writes initial `(address, value)` pairs straight into the word store.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] for the first address outside
    /// the store; earlier pairs stay written.
    pub fn load_memory(&mut self, entries: &[(i64, i64)]) -> Result<(), Fault> {
        for &(address, value) in entries {
            self.store.store_word(address, value)?;
        }
        log::info!("loaded {} memory initialization values", entries.len());
        Ok(())
    }

    /// Reads a word through the cache when one is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when `address` or a block it
    /// drags in lies outside the store.
    pub fn read_word(&mut self, address: i64) -> Result<u32, Fault> {
        let addr = self.store.check_address(address)?;
        match &mut self.cache {
            Some(cache) => cache.read(addr, &mut self.store),
            None => self.store.load_word(address),
        }
    }

    /// Writes a word through the cache when one is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when `address` or a block it
    /// drags in lies outside the store.
    pub fn write_word(&mut self, address: i64, value: i32) -> Result<(), Fault> {
        let addr = self.store.check_address(address)?;
        match &mut self.cache {
            Some(cache) => cache.write(addr, u32::from_ne_bytes(value.to_ne_bytes()), &mut self.store),
            None => self.store.store_word(address, i64::from(value)),
        }
    }

    /// Applies a `CACHE` operation.
    ///
    /// # Errors
    ///
    /// Propagates write-back faults from the flush that precedes a disable
    /// or that a flush performs.
    pub fn apply_cache_op(&mut self, op: CacheOp) -> Result<(), Fault> {
        match op {
            CacheOp::Disable => {
                if self.cache.is_some() {
                    self.flush_cache()?;
                    self.cache = None;
                    log::info!("cache disabled");
                } else {
                    log::debug!("cache already disabled");
                }
            }
            CacheOp::Enable => {
                self.enable_cache();
            }
            CacheOp::Flush => self.flush_cache()?,
        }
        Ok(())
    }

    /// Attaches a cold cache unless one is attached.
    ///
    /// Returns false, leaving the attached cache and its dirty lines alone,
    /// when a cache was already attached.
    pub fn enable_cache(&mut self) -> bool {
        if self.cache.is_some() {
            log::debug!("cache already enabled");
            return false;
        }
        self.cache = Some(Cache::new(self.geometry, self.config.flush_invalidates));
        log::info!("cache enabled");
        true
    }

    /// Flushes the attached cache; no-op without one.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when a dirty block cannot be
    /// written back.
    pub fn flush_cache(&mut self) -> Result<(), Fault> {
        match &mut self.cache {
            Some(cache) => cache.flush(&mut self.store),
            None => {
                log::debug!("cache is disabled, nothing to flush");
                Ok(())
            }
        }
    }

    /// Configuration this core was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Cache geometry derived from the configuration.
    #[must_use]
    pub const fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable register file, for seeding inputs before a run.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Snapshot of all registers in index order.
    #[must_use]
    pub const fn register_values(&self) -> [i32; REGISTER_COUNT] {
        *self.registers.as_array()
    }

    /// Current program counter in bytes.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Moves the program counter.
    ///
    /// Bits below the word size are cleared so PC stays word-aligned.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc & !(self.config.word_size - 1);
    }

    /// Current execution state.
    #[must_use]
    pub const fn run_state(&self) -> &RunState {
        &self.run_state
    }

    /// Returns true once the core reached any terminal state.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.run_state.is_halted()
    }

    /// Fault that stopped the core, if any.
    #[must_use]
    pub const fn fault(&self) -> Option<&Fault> {
        self.run_state.fault()
    }

    /// Instructions executed since the program was loaded.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Loaded program slots in address order.
    #[must_use]
    pub fn program(&self) -> &[ProgramSlot] {
        &self.program
    }

    /// Backing word store. Contents may lag behind dirty cache lines.
    #[must_use]
    pub const fn store(&self) -> &WordStore {
        &self.store
    }

    /// Mutable backing word store, bypassing the cache.
    pub fn store_mut(&mut self) -> &mut WordStore {
        &mut self.store
    }

    /// Attached cache, if enabled.
    #[must_use]
    pub const fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }
}

/// Step-level execution status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepOutcome {
    /// Instruction retired and the core keeps running.
    Retired,
    /// `HALT` retired, or the core had already halted.
    Halted,
    /// PC is outside the program; nothing executed.
    EndOfProgram,
    /// The core stopped on this fault.
    Fault(Fault),
}

impl StepOutcome {
    /// Returns true for every outcome after which the core stays stopped.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Retired)
    }
}

/// Aggregated outcome from running until a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Instructions executed during this run call.
    pub steps: u64,
    /// Terminal step status observed before returning.
    pub final_step: StepOutcome,
}

/// Direction of a data memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessKind {
    /// `LW`.
    Read,
    /// `SW`.
    Write,
}

/// Deterministic trace event emitted by the execution loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TraceEvent {
    /// Emitted before an instruction executes.
    InstructionStart {
        /// Program counter of the instruction.
        pc: u32,
        /// Decoded instruction, `None` when the slot failed to decode.
        instruction: Option<Instruction>,
        /// Register values before execution.
        registers: [i32; REGISTER_COUNT],
    },
    /// Emitted after an instruction retires.
    InstructionRetired {
        /// Program counter of the retired instruction.
        pc: u32,
        /// Program counter of the next instruction.
        next_pc: u32,
        /// Register values after execution, `R0` already cleared.
        registers: [i32; REGISTER_COUNT],
    },
    /// Emitted for every completed `LW`/`SW`.
    MemoryAccess {
        /// Direction of the access.
        kind: AccessKind,
        /// Effective byte address.
        address: u32,
        /// Word loaded or stored.
        value: u32,
        /// Whether the access went through the cache.
        cached: bool,
    },
    /// Emitted after a `CACHE` instruction.
    CacheControl {
        /// Requested operation.
        op: CacheOp,
        /// Whether a cache is attached afterwards.
        attached: bool,
    },
    /// Emitted when an instruction faults.
    FaultRaised {
        /// Program counter of the faulting instruction.
        pc: u32,
        /// Raised fault.
        fault: Fault,
    },
}

/// Host-provided sink receiving trace events.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn on_event(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
