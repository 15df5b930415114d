//! Console trace sink printing each step as it executes.

use std::io::{self, Write};

use sim_core::{AccessKind, TraceEvent, TraceSink};

/// Writes a line-per-event trace to `W`.
///
/// Trace output is best effort: the first write error stops further output
/// and is kept for [`TextTrace::finish`].
#[derive(Debug)]
pub struct TextTrace<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> TextTrace<W> {
    /// Creates a sink writing to `out`.
    pub const fn new(out: W) -> Self {
        Self { out, error: None }
    }

    /// Flushes the writer and returns it.
    ///
    /// # Errors
    ///
    /// Returns the first write error seen while tracing, or the flush error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_event(&mut self, event: &TraceEvent) -> io::Result<()> {
        match event {
            TraceEvent::InstructionStart {
                pc,
                instruction,
                registers,
            } => {
                match instruction {
                    Some(instruction) => writeln!(self.out, "PC: {pc} | Instruction: {instruction}")?,
                    None => writeln!(self.out, "PC: {pc} | Instruction: <undecodable>")?,
                }
                writeln!(self.out, "Registers before: {registers:?}")
            }
            TraceEvent::InstructionRetired { registers, .. } => {
                writeln!(self.out, "Registers after: {registers:?}")
            }
            TraceEvent::MemoryAccess {
                kind,
                address,
                value,
                cached,
            } => {
                let (verb, path) = match (kind, cached) {
                    (AccessKind::Read, true) => ("read", "cache"),
                    (AccessKind::Read, false) => ("read", "memory"),
                    (AccessKind::Write, true) => ("write", "cache"),
                    (AccessKind::Write, false) => ("write", "memory"),
                };
                writeln!(self.out, "  {verb} 0x{address:08X} = {value} via {path}")
            }
            TraceEvent::CacheControl { op, attached } => {
                let state = if *attached { "enabled" } else { "disabled" };
                writeln!(self.out, "  cache {op:?}: cache {state}")
            }
            TraceEvent::FaultRaised { pc, fault } => {
                writeln!(self.out, "Fault at PC {pc}: {fault}")
            }
        }
    }
}

impl<W: Write> TraceSink for TextTrace<W> {
    fn on_event(&mut self, event: TraceEvent) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.write_event(&event) {
            log::warn!("trace output stopped: {err}");
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use sim_core::{run, CoreConfig, CoreState};

    use super::TextTrace;

    #[test]
    fn prints_pc_instruction_and_registers() {
        let mut core = CoreState::new(CoreConfig::default()).expect("default config");
        core.load_program(&[vec!["ADDI", "R1", "R0", "2"], vec!["SW", "R1", "4(R0)"], vec!["HALT"]]);

        let mut trace = TextTrace::new(Vec::new());
        let _ = run(&mut core, &mut trace);
        let text = String::from_utf8(trace.finish().expect("no write errors")).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "PC: 0 | Instruction: ADDI R1, R0, 2");
        assert!(lines[1].starts_with("Registers before: [0, 0, 0,"));
        assert!(lines[2].starts_with("Registers after: [0, 2, 0,"));
        assert_eq!(lines[3], "PC: 4 | Instruction: SW R1, 4(R0)");
        assert!(text.contains("  write 0x00000004 = 2 via memory"));
        assert!(text.contains("PC: 8 | Instruction: HALT"));
    }

    #[test]
    fn fault_is_printed_after_the_instruction_line() {
        let mut core = CoreState::new(CoreConfig::default()).expect("default config");
        core.load_program(&[vec!["FOO"]]);

        let mut trace = TextTrace::new(Vec::new());
        let _ = run(&mut core, &mut trace);
        let text = String::from_utf8(trace.finish().expect("no write errors")).expect("utf-8");

        assert!(text.starts_with("PC: 0 | Instruction: <undecodable>\n"));
        assert!(text.contains("Fault at PC 0: unknown opcode `FOO`"));
    }
}
