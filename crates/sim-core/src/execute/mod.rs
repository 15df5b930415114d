//! Instruction execution and the fetch/execute loop.
//!
//! Each step runs in this order:
//! 1. Refuse to run once the core reached a terminal state
//! 2. Stop at end of program, then enforce the step limit
//! 3. Fetch the pre-decoded slot at `PC / word_size`
//! 4. Execute it, raising a latched decode fault if the slot has one
//! 5. Reset `R0`
//! 6. Advance PC one word, unless the handler redirected control flow
//!
//! Faults are fail-halt: effects already applied by the faulting
//! instruction stay, PC keeps pointing at it, and nothing runs afterwards.

#![allow(clippy::similar_names)]

mod helpers;

pub use helpers::{
    branch_target, branch_words, effective_address, instruction_address, next_pc, register_bits,
    word_bits,
};

use crate::api::{AccessKind, TraceEvent, TraceSink};
use crate::decoder::{DecodedOrFault, Instruction};
use crate::state::{RunState, LINK_REGISTER};
use crate::{CoreState, Fault, RunOutcome, StepOutcome};

/// How control flow continues after a handler succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecuteOutcome {
    /// Fall through to the next instruction.
    Continue,
    /// Continue at this byte address, even if it is the current PC.
    Redirect(u32),
    /// Stop after this instruction.
    Halt,
}

/// Executes one decoded instruction against `state`.
///
/// # Errors
///
/// Returns the [`Fault`] raised by the handler. Effects applied before the
/// fault are not rolled back.
pub fn execute_instruction(
    instruction: &Instruction,
    state: &mut CoreState,
    trace: &mut dyn TraceSink,
) -> Result<ExecuteOutcome, Fault> {
    let regs = &mut state.registers;
    match *instruction {
        Instruction::Add(ops) => {
            regs.set(ops.rd, regs.get(ops.rs).wrapping_add(regs.get(ops.rt)));
        }
        Instruction::Sub(ops) => {
            regs.set(ops.rd, regs.get(ops.rs).wrapping_sub(regs.get(ops.rt)));
        }
        Instruction::Addi(ops) => regs.set(ops.rd, regs.get(ops.rs).wrapping_add(ops.imm)),
        Instruction::Subi(ops) => regs.set(ops.rd, regs.get(ops.rs).wrapping_sub(ops.imm)),
        Instruction::Slt(ops) => {
            regs.set(ops.rd, i32::from(regs.get(ops.rs) < regs.get(ops.rt)));
        }
        Instruction::Bne(ops) => {
            if regs.get(ops.rs) != regs.get(ops.rt) {
                let target = branch_target(state.pc, ops.offset)
                    .ok_or_else(|| Fault::InvalidOffset(branch_words(ops.offset).to_string()))?;
                log::debug!("BNE taken: PC -> {target}");
                return Ok(ExecuteOutcome::Redirect(target));
            }
        }
        Instruction::J { target } => return jump(target, state.program().len()),
        Instruction::Jal { target } => {
            let outcome = jump(target, state.program().len())?;
            let return_address = register_bits(next_pc(state.pc));
            state.registers.set(LINK_REGISTER, return_address);
            log::debug!("JAL saved return address {return_address} in {LINK_REGISTER}");
            return Ok(outcome);
        }
        Instruction::Lw(ops) => {
            let address = effective_address(regs.get(ops.base), ops.offset);
            let value = state.read_word(address)?;
            state.registers.set(ops.rt, register_bits(value));
            trace_access(state, trace, AccessKind::Read, address, value);
        }
        Instruction::Sw(ops) => {
            let address = effective_address(regs.get(ops.base), ops.offset);
            let value = regs.get(ops.rt);
            state.write_word(address, value)?;
            trace_access(state, trace, AccessKind::Write, address, word_bits(value));
        }
        Instruction::Cache(op) => {
            state.apply_cache_op(op)?;
            trace.on_event(TraceEvent::CacheControl {
                op,
                attached: state.cache().is_some(),
            });
        }
        Instruction::Halt => {
            state.flush_cache()?;
            return Ok(ExecuteOutcome::Halt);
        }
        Instruction::Nop => {}
    }
    Ok(ExecuteOutcome::Continue)
}

fn jump(target: u32, program_len: usize) -> Result<ExecuteOutcome, Fault> {
    let invalid = || Fault::InvalidJumpTarget {
        target: target.to_string(),
        program_len,
    };
    if !usize::try_from(target).is_ok_and(|index| index < program_len) {
        return Err(invalid());
    }
    instruction_address(target)
        .map(ExecuteOutcome::Redirect)
        .ok_or_else(invalid)
}

fn trace_access(
    state: &CoreState,
    trace: &mut dyn TraceSink,
    kind: AccessKind,
    address: i64,
    value: u32,
) {
    // Completed accesses always have in-range addresses.
    if let Ok(address) = u32::try_from(address) {
        trace.on_event(TraceEvent::MemoryAccess {
            kind,
            address,
            value,
            cached: state.cache().is_some(),
        });
    }
}

/// Executes exactly one instruction and reports what happened.
///
/// Once a terminal outcome was reported, further calls report it again
/// without executing anything.
pub fn step_one(state: &mut CoreState, trace: &mut dyn TraceSink) -> StepOutcome {
    match &state.run_state {
        RunState::Running => {}
        RunState::Halted => return StepOutcome::Halted,
        RunState::EndOfProgram => return StepOutcome::EndOfProgram,
        RunState::Faulted(fault) => return StepOutcome::Fault(fault.clone()),
    }

    let pc = state.pc;
    let slot = usize::try_from(pc / state.config().word_size)
        .ok()
        .and_then(|index| state.program().get(index))
        .map(|slot| slot.decoded.clone());
    let Some(decoded) = slot else {
        log::info!("PC {pc} is past the end of the program; stopping");
        state.run_state = RunState::EndOfProgram;
        return StepOutcome::EndOfProgram;
    };

    if let Some(limit) = state.config().step_limit {
        if state.steps >= limit {
            return raise(state, trace, pc, Fault::StepLimitExceeded(limit));
        }
    }

    trace.on_event(TraceEvent::InstructionStart {
        pc,
        instruction: decoded.instruction().copied(),
        registers: state.register_values(),
    });

    let result = match decoded {
        DecodedOrFault::Instruction(instruction) => {
            log::debug!("PC {pc}: {instruction}");
            execute_instruction(&instruction, state, trace)
        }
        DecodedOrFault::Fault(fault) => Err(fault),
    };
    state.registers.clear_zero();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(fault) => return raise(state, trace, pc, fault),
    };

    state.steps += 1;
    state.pc = match outcome {
        ExecuteOutcome::Redirect(target) => target,
        ExecuteOutcome::Continue | ExecuteOutcome::Halt => next_pc(pc),
    };
    trace.on_event(TraceEvent::InstructionRetired {
        pc,
        next_pc: state.pc,
        registers: state.register_values(),
    });

    if outcome == ExecuteOutcome::Halt {
        log::info!("HALT at PC {pc} after {} instructions", state.steps);
        state.run_state = RunState::Halted;
        return StepOutcome::Halted;
    }
    StepOutcome::Retired
}

fn raise(state: &mut CoreState, trace: &mut dyn TraceSink, pc: u32, fault: Fault) -> StepOutcome {
    log::warn!("fault at PC {pc}: {fault}; halting");
    trace.on_event(TraceEvent::FaultRaised {
        pc,
        fault: fault.clone(),
    });
    state.run_state = RunState::Faulted(fault.clone());
    StepOutcome::Fault(fault)
}

/// Steps until the core reaches a terminal state.
///
/// Without a configured step limit a program that loops forever never
/// returns.
pub fn run(state: &mut CoreState, trace: &mut dyn TraceSink) -> RunOutcome {
    let start = state.steps;
    loop {
        let step = step_one(state, trace);
        if step.is_terminal() {
            return RunOutcome {
                steps: state.steps - start,
                final_step: step,
            };
        }
    }
}
