//! Pipeline state machine.
//!
//! [`next_state`] is pure: given the current state and what the stage
//! reported, it names the next state. No IO, no async. The runner in
//! [`super`] performs the work and feeds results back in.

use crate::types::audit::PipelineState;

/// What a stage reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageReport {
    /// The stage passed; move to the next stage.
    Proceed,
    /// The content was refused.
    Reject,
    /// The gate accepted the candidates.
    Accept,
    /// The gate accepted with issues attached.
    Warn,
    /// Cancellation or an internal failure.
    Fail,
}

/// Decide the state that follows `current` given `report`.
///
/// Returns `None` for combinations that cannot happen in a well-formed
/// run: terminal states never move, and only the quality gate may accept
/// or warn.
pub fn next_state(current: PipelineState, report: StageReport) -> Option<PipelineState> {
    use PipelineState::*;

    if current.is_terminal() {
        return None;
    }

    match (current, report) {
        (_, StageReport::Fail) => Some(Failed),
        (Init, StageReport::Proceed) => Some(UrlCheck),
        (Init, _) => None,
        (_, StageReport::Reject) => Some(Rejected),
        (UrlCheck, StageReport::Proceed) => Some(Classify),
        (Classify, StageReport::Proceed) => Some(Extract),
        (Extract, StageReport::Proceed) => Some(QualityGate),
        (QualityGate, StageReport::Accept) => Some(Accepted),
        (QualityGate, StageReport::Warn) => Some(Warned),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineState::*;

    #[test]
    fn test_happy_path() {
        let mut state = Init;
        for report in [
            StageReport::Proceed,
            StageReport::Proceed,
            StageReport::Proceed,
            StageReport::Proceed,
            StageReport::Accept,
        ] {
            state = next_state(state, report).unwrap();
        }
        assert_eq!(state, Accepted);
    }

    #[test]
    fn test_reject_from_any_stage() {
        for stage in [UrlCheck, Classify, Extract, QualityGate] {
            assert_eq!(next_state(stage, StageReport::Reject), Some(Rejected));
            assert_eq!(next_state(stage, StageReport::Fail), Some(Failed));
        }
    }

    #[test]
    fn test_only_gate_accepts() {
        assert_eq!(next_state(Classify, StageReport::Accept), None);
        assert_eq!(next_state(Extract, StageReport::Warn), None);
        assert_eq!(next_state(QualityGate, StageReport::Proceed), None);
        assert_eq!(next_state(QualityGate, StageReport::Warn), Some(Warned));
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        for terminal in [Accepted, Warned, Rejected, Failed] {
            assert_eq!(next_state(terminal, StageReport::Proceed), None);
            assert_eq!(next_state(terminal, StageReport::Fail), None);
        }
    }
}
