//! Client-requested agent state changes
//!
//! A client may ask for `paused`, `running` or `stopped`. Each request is
//! checked against the controller's current state: some origins make the
//! change valid, some are tolerated without complaint, everything else is
//! rejected. Valid and tolerated requests are both forwarded to the
//! controller.

use crate::error::StateMachineError;
use devloop_schema::AgentState;

/// What to do with a requested state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Emit the change
    Apply,
    /// Forward the request without treating it as a transition
    Ignore,
}

/// States a client may request
pub const REQUESTABLE: [AgentState; 3] = [AgentState::Paused, AgentState::Running, AgentState::Stopped];

/// Current states from which `requested` is a valid change
#[must_use]
pub fn valid_from(requested: AgentState) -> &'static [AgentState] {
    use AgentState::*;
    match requested {
        Paused => &[Running],
        Running => &[Paused],
        Stopped => &[Running, Paused, AwaitingUserInput],
        Loading | Init | AwaitingUserInput | Finished | Error => &[],
    }
}

/// Current states from which `requested` is silently ignored
#[must_use]
pub fn ignored_from(requested: AgentState) -> &'static [AgentState] {
    use AgentState::*;
    match requested {
        Paused => &[Init, Paused, Stopped, Finished, AwaitingUserInput],
        Running => &[Init, Running, Stopped, Finished, AwaitingUserInput],
        Stopped => &[Init, Stopped, Finished],
        Loading | Init | AwaitingUserInput | Finished | Error => &[],
    }
}

/// Decide how to handle a request to move from `current` to `requested`
///
/// # Errors
/// `StateMachineError::Unrecognized` when `current` is in neither table.
pub fn evaluate(
    current: AgentState,
    requested: AgentState,
) -> Result<TransitionOutcome, StateMachineError> {
    if valid_from(requested).contains(&current) {
        Ok(TransitionOutcome::Apply)
    } else if ignored_from(requested).contains(&current) {
        Ok(TransitionOutcome::Ignore)
    } else {
        Err(StateMachineError::Unrecognized { current, requested })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AgentState::*;

    #[test]
    fn pause_and_resume() {
        assert_eq!(evaluate(Running, Paused), Ok(TransitionOutcome::Apply));
        assert_eq!(evaluate(Paused, Running), Ok(TransitionOutcome::Apply));
    }

    #[test]
    fn stop_from_waiting() {
        assert_eq!(evaluate(AwaitingUserInput, Stopped), Ok(TransitionOutcome::Apply));
    }

    #[test]
    fn redundant_requests_are_ignored() {
        assert_eq!(evaluate(Paused, Paused), Ok(TransitionOutcome::Ignore));
        assert_eq!(evaluate(Finished, Running), Ok(TransitionOutcome::Ignore));
        assert_eq!(evaluate(Init, Stopped), Ok(TransitionOutcome::Ignore));
    }

    #[test]
    fn unrecognized_requests() {
        assert!(evaluate(Error, Running).is_err());
        assert!(evaluate(Loading, Paused).is_err());
        assert!(evaluate(Running, Finished).is_err());
    }

    #[test]
    fn tables_never_overlap() {
        for requested in REQUESTABLE {
            for state in valid_from(requested) {
                assert!(!ignored_from(requested).contains(state));
            }
        }
    }
}
