//! End-to-end execution scenarios, fail-halt behaviour and the R0 invariant.

use log as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use proptest::prelude::*;
use rstest::rstest;
use sim_core::{
    run, step_one, CoreConfig, CoreState, Fault, NoTrace, Register, RunState, StepOutcome,
    TraceEvent, TraceSink,
};

fn core_with(program: &[&str]) -> CoreState {
    let mut core = CoreState::new(CoreConfig::default()).expect("default config is valid");
    let program: Vec<Vec<String>> = program
        .iter()
        .map(|line| {
            line.replace(',', " ")
                .split_whitespace()
                .map(str::to_string)
                .collect()
        })
        .collect();
    core.load_program(&program);
    core
}

fn reg(index: u8) -> Register {
    Register::new(index).expect("valid register")
}

#[test]
fn scenario_add_then_halt() {
    let mut core = core_with(&["ADD R1, R2, R3", "HALT"]);
    core.registers_mut().set(reg(2), 5);
    core.registers_mut().set(reg(3), 10);

    let outcome = run(&mut core, &mut NoTrace);

    assert_eq!(outcome.final_step, StepOutcome::Halted);
    assert_eq!(outcome.steps, 2);
    assert_eq!(core.registers().get(reg(1)), 15);
    assert!(core.is_halted());
    assert!(core.fault().is_none());
    assert_eq!(core.pc(), 8);
}

#[test]
fn scenario_taken_branch_skips_past_program() {
    let mut core = core_with(&["BNE R1, R2, 2", "HALT"]);
    core.registers_mut().set(reg(1), 5);
    core.registers_mut().set(reg(2), 10);

    assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::Retired);
    assert_eq!(core.pc(), 4 + 8);

    assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::EndOfProgram);
    assert!(core.is_halted());
    assert!(core.fault().is_none());
}

#[test]
fn scenario_cache_enable_disable_then_flush_is_noop() {
    let mut core = core_with(&["CACHE 1", "CACHE 0", "CACHE 2", "HALT"]);

    assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::Retired);
    assert!(core.cache().is_some());
    assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::Retired);
    assert!(core.cache().is_none());
    assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::Retired);
    assert!(core.cache().is_none());
    assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::Halted);
}

#[test]
fn scenario_jump_to_program_length_faults_at_jump() {
    let mut core = core_with(&["NOP", "NOP", "NOP", "NOP", "J 5"]);
    core.set_pc(16);

    let outcome = run(&mut core, &mut NoTrace);

    let expected = Fault::InvalidJumpTarget {
        target: "5".to_string(),
        program_len: 5,
    };
    assert_eq!(outcome.final_step, StepOutcome::Fault(expected.clone()));
    assert_eq!(core.pc(), 16);
    assert_eq!(core.run_state(), &RunState::Faulted(expected));
}

#[test]
fn halt_flushes_dirty_lines_to_the_store() {
    let mut core = core_with(&["CACHE 1", "ADDI R1, R0, 99", "SW R1, 64(R0)", "HALT"]);

    let _ = run(&mut core, &mut NoTrace);

    assert_eq!(core.store().load_word(64), Ok(99));
    let cache = core.cache().expect("cache still attached");
    assert!(cache.lines().iter().all(|line| !line.is_dirty()));
}

#[test]
fn cached_store_is_invisible_until_flush() {
    let mut core = core_with(&["CACHE 1", "ADDI R1, R0, 7", "SW R1, 0(R0)", "NOP", "CACHE 2"]);

    for _ in 0..4 {
        assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::Retired);
    }
    assert_eq!(core.store().load_word(0), Ok(0));

    assert_eq!(step_one(&mut core, &mut NoTrace), StepOutcome::Retired);
    assert_eq!(core.store().load_word(0), Ok(7));
}

#[test]
fn partial_effects_of_earlier_instructions_survive_a_fault() {
    let mut core = core_with(&["ADDI R1, R0, 3", "LW R2, 0(R9)", "ADDI R3, R0, 1"]);
    core.registers_mut().set(reg(9), -8);

    let outcome = run(&mut core, &mut NoTrace);

    assert!(matches!(
        outcome.final_step,
        StepOutcome::Fault(Fault::AddressOutOfRange { address: -8, .. })
    ));
    assert_eq!(core.registers().get(reg(1)), 3);
    assert_eq!(core.registers().get(reg(3)), 0);
    assert_eq!(core.pc(), 4);
    assert_eq!(core.steps(), 1);
}

#[test]
fn loop_counts_down_with_branch() {
    let mut core = core_with(&[
        "ADDI R1, R0, 5",
        "ADDI R2, R2, 3",
        "SUBI R1, R1, 1",
        "BNE R1, R0, -3",
        "HALT",
    ]);

    let outcome = run(&mut core, &mut NoTrace);

    assert_eq!(outcome.final_step, StepOutcome::Halted);
    assert_eq!(core.registers().get(reg(2)), 15);
    assert_eq!(core.pc(), 20);
}

#[rstest]
#[case::unknown_opcode("MUL R1, R2, R3", Fault::UnknownOpcode("MUL".to_string()))]
#[case::r0_destination("ADD R0, R1, R2", Fault::InvalidRegister("R0".to_string()))]
#[case::register_out_of_range("SUB R1, R32, R2", Fault::InvalidRegister("R32".to_string()))]
#[case::immediate_out_of_range("ADDI R1, R2, 4294967296", Fault::InvalidImmediate("4294967296".to_string()))]
#[case::misaligned_offset("LW R1, 2(R0)", Fault::InvalidOffset("2(R0)".to_string()))]
#[case::branch_offset_out_of_range("BNE R1, R2, 9000", Fault::InvalidOffset("9000".to_string()))]
#[case::cache_code("CACHE 3", Fault::InvalidCacheCode("3".to_string()))]
#[case::non_numeric_jump("J start", Fault::InvalidJumpTarget { target: "start".to_string(), program_len: 2 })]
#[case::missing_operand("LW R1", Fault::MissingOperand { opcode: "LW".to_string(), expected: 2, found: 1 })]
fn bad_instruction_halts_with_fault_at_its_pc(#[case] source: &str, #[case] expected: Fault) {
    let mut core = core_with(&["NOP", source]);

    let outcome = run(&mut core, &mut NoTrace);

    assert_eq!(outcome.final_step, StepOutcome::Fault(expected.clone()));
    assert_eq!(outcome.steps, 1);
    assert_eq!(core.pc(), 4);
    assert_eq!(core.fault(), Some(&expected));
}

#[rstest]
#[case::disabled(false)]
#[case::enabled(true)]
fn load_and_store_agree_with_and_without_cache(#[case] cached: bool) {
    let mut program = vec!["LW R1, 4(R2)", "ADDI R1, R1, 1", "SW R1, 8(R2)", "LW R3, 8(R2)", "HALT"];
    if cached {
        program.insert(0, "CACHE 1");
    }
    let mut core = core_with(&program);
    core.registers_mut().set(reg(2), 1024);
    core.load_memory(&[(1028, 41)]).expect("in range");

    let _ = run(&mut core, &mut NoTrace);

    assert_eq!(core.registers().get(reg(3)), 42);
    assert_eq!(core.store().load_word(1032), Ok(42));
}

#[test]
fn enabling_an_attached_cache_keeps_its_dirty_lines() {
    let mut core = core_with(&["CACHE 1", "ADDI R1, R0, 7", "SW R1, 0(R0)", "CACHE 1", "HALT"]);

    let outcome = run(&mut core, &mut NoTrace);

    assert_eq!(outcome.final_step, StepOutcome::Halted);
    assert_eq!(core.store().load_word(0), Ok(7));
}

#[rstest]
#[case::disabled(false)]
#[case::enabled(true)]
fn unaligned_base_addresses_the_containing_word(#[case] cached: bool) {
    let mut program = vec!["ADDI R2, R0, 2", "LW R3, 0(R2)", "ADDI R4, R0, 9", "SW R4, 4(R2)", "HALT"];
    if cached {
        program.insert(0, "CACHE 1");
    }
    let mut core = core_with(&program);
    core.load_memory(&[(2, 55)]).expect("in range");

    let _ = run(&mut core, &mut NoTrace);

    assert_eq!(core.registers().get(reg(3)), 55);
    assert_eq!(core.store().load_word(4), Ok(9));
    assert_eq!(core.store().load_word(6), Ok(9));
}

#[derive(Default)]
struct ZeroWatcher {
    violations: usize,
    retired: usize,
}

impl TraceSink for ZeroWatcher {
    fn on_event(&mut self, event: TraceEvent) {
        if let TraceEvent::InstructionRetired { registers, .. } = event {
            self.retired += 1;
            if registers[0] != 0 {
                self.violations += 1;
            }
        }
    }
}

fn arbitrary_instruction() -> impl Strategy<Value = String> {
    let reg = || 0_u8..32;
    prop_oneof![
        (reg(), reg(), reg()).prop_map(|(d, s, t)| format!("ADD R{d} R{s} R{t}")),
        (reg(), reg(), any::<i16>()).prop_map(|(d, s, i)| format!("ADDI R{d} R{s} {i}")),
        (reg(), reg(), reg()).prop_map(|(d, s, t)| format!("SUB R{d} R{s} R{t}")),
        (reg(), reg(), any::<i16>()).prop_map(|(d, s, i)| format!("SUBI R{d} R{s} {i}")),
        (reg(), reg(), reg()).prop_map(|(d, s, t)| format!("SLT R{d} R{s} R{t}")),
        (reg(), -16_i32..16).prop_map(|(t, o)| format!("LW R{t} {}(R0)", o * 4 + 64)),
        (reg(), -16_i32..16).prop_map(|(t, o)| format!("SW R{t} {}(R0)", o * 4 + 64)),
        (reg(), reg(), 0_i32..3).prop_map(|(s, t, o)| format!("BNE R{s} R{t} {o}")),
        (0_u8..3).prop_map(|c| format!("CACHE {c}")),
        Just("NOP".to_string()),
    ]
}

proptest! {
    #[test]
    fn property_r0_reads_zero_after_every_instruction(
        program in prop::collection::vec(arbitrary_instruction(), 1..40),
    ) {
        let lines: Vec<&str> = program.iter().map(String::as_str).collect();
        let mut core = core_with(&lines);
        let mut watcher = ZeroWatcher::default();

        let outcome = run(&mut core, &mut watcher);

        prop_assert_eq!(watcher.violations, 0);
        prop_assert_eq!(u64::try_from(watcher.retired).expect("fits"), outcome.steps);
        prop_assert_eq!(core.register_values()[0], 0);
        prop_assert!(core.is_halted());
    }
}
