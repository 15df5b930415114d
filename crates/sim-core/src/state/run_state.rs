use crate::Fault;

/// Execution state of the core as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Ready to execute the instruction at PC.
    #[default]
    Running,
    /// Stopped by `HALT`.
    Halted,
    /// Stopped because PC left the loaded program.
    EndOfProgram,
    /// Stopped by a fault; PC still addresses the faulting instruction.
    Faulted(Fault),
}

impl RunState {
    /// Returns true for every terminal state.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns the recorded fault, if the core stopped on one.
    #[must_use]
    pub const fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            Self::Running | Self::Halted | Self::EndOfProgram => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunState;
    use crate::Fault;

    #[test]
    fn run_state_default_is_running() {
        assert_eq!(RunState::default(), RunState::Running);
        assert!(!RunState::Running.is_halted());
    }

    #[test]
    fn fault_accessor_reports_only_faulted_variant() {
        assert_eq!(RunState::Halted.fault(), None);
        assert_eq!(RunState::EndOfProgram.fault(), None);
        let state = RunState::Faulted(Fault::InvalidCacheCode("7".to_string()));
        assert!(state.is_halted());
        assert_eq!(
            state.fault(),
            Some(&Fault::InvalidCacheCode("7".to_string()))
        );
    }
}
