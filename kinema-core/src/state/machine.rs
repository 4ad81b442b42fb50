//! Cycle state machine
//!
//! A cycle slot is `Free`, `Idle` (allocated, not advancing) or `Running`.
//! Every cycle operation is validated against this table before it touches
//! any servo or group.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cycle slot phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CyclePhase {
    /// Slot not allocated
    #[default]
    Free,
    /// Allocated, not advancing (created, paused or finished)
    Idle,
    /// Advancing pose by pose
    Running,
}

/// Commands and internal triggers driving a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleCommand {
    /// Allocate the slot
    Create,
    /// Begin from pose 0 (idle only)
    Start,
    /// Begin again from pose 0 (idle or running)
    Restart,
    /// Freeze the current pose
    Pause,
    /// Loop limit reached
    Finish,
    /// A pose could not be played
    Abort,
    /// Free the slot
    Release,
}

impl CyclePhase {
    /// Check if the slot is allocated
    pub fn is_active(&self) -> bool {
        !matches!(self, CyclePhase::Free)
    }

    /// Check if the cycle is advancing
    pub fn is_running(&self) -> bool {
        matches!(self, CyclePhase::Running)
    }

    /// Process a command and return the next phase
    ///
    /// Returns `None` when the command is not valid in this phase.
    pub fn transition(self, command: CycleCommand) -> Option<Self> {
        use CycleCommand::*;
        use CyclePhase::*;

        match (self, command) {
            (Free, Create) => Some(Idle),

            (Idle, Start) => Some(Running),
            (Idle | Running, Restart) => Some(Running),

            (Running, Pause) => Some(Idle),
            (Running, Finish) => Some(Idle),
            (Running, Abort) => Some(Idle),

            (Idle | Running, Release) => Some(Free),

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let phase = CyclePhase::Free;
        let phase = phase.transition(CycleCommand::Create).unwrap();
        assert_eq!(phase, CyclePhase::Idle);
        assert!(phase.is_active());
        assert!(!phase.is_running());

        let phase = phase.transition(CycleCommand::Start).unwrap();
        assert!(phase.is_running());

        let phase = phase.transition(CycleCommand::Pause).unwrap();
        assert_eq!(phase, CyclePhase::Idle);

        let phase = phase.transition(CycleCommand::Restart).unwrap();
        assert!(phase.is_running());

        let phase = phase.transition(CycleCommand::Release).unwrap();
        assert_eq!(phase, CyclePhase::Free);
    }

    #[test]
    fn test_start_only_from_idle() {
        assert_eq!(CyclePhase::Running.transition(CycleCommand::Start), None);
        assert_eq!(CyclePhase::Free.transition(CycleCommand::Start), None);
    }

    #[test]
    fn test_pause_requires_running() {
        assert_eq!(CyclePhase::Idle.transition(CycleCommand::Pause), None);
        assert_eq!(CyclePhase::Free.transition(CycleCommand::Pause), None);
    }

    #[test]
    fn test_free_slot_rejects_everything_but_create() {
        for cmd in [
            CycleCommand::Start,
            CycleCommand::Restart,
            CycleCommand::Pause,
            CycleCommand::Finish,
            CycleCommand::Abort,
            CycleCommand::Release,
        ] {
            assert_eq!(CyclePhase::Free.transition(cmd), None);
        }
        assert_eq!(CyclePhase::Idle.transition(CycleCommand::Create), None);
    }

    #[test]
    fn test_finish_and_abort_stop_running() {
        assert_eq!(
            CyclePhase::Running.transition(CycleCommand::Finish),
            Some(CyclePhase::Idle)
        );
        assert_eq!(
            CyclePhase::Running.transition(CycleCommand::Abort),
            Some(CyclePhase::Idle)
        );
        assert_eq!(CyclePhase::Idle.transition(CycleCommand::Finish), None);
    }
}
