use devloop_schema::AgentState;
use devloop_server::state_machine::{evaluate, ignored_from, valid_from, REQUESTABLE};
use devloop_server::{StateMachineError, TransitionOutcome};
use proptest::prelude::*;

fn any_state() -> impl Strategy<Value = AgentState> {
    (0..AgentState::ALL.len()).prop_map(|i| AgentState::ALL[i])
}

#[test]
fn stop_is_valid_from_every_active_state() {
    for current in [AgentState::Running, AgentState::Paused, AgentState::AwaitingUserInput] {
        assert_eq!(evaluate(current, AgentState::Stopped), Ok(TransitionOutcome::Apply));
    }
}

#[test]
fn non_requestable_targets_are_always_rejected() {
    let targets = AgentState::ALL.iter().filter(|s| !REQUESTABLE.contains(s));
    for requested in targets.copied() {
        for current in AgentState::ALL {
            assert!(evaluate(*current, requested).is_err());
        }
    }
}

proptest! {
    #[test]
    fn prop_outcome_matches_tables(current in any_state(), requested in any_state()) {
        match evaluate(current, requested) {
            Ok(TransitionOutcome::Apply) => prop_assert!(valid_from(requested).contains(&current)),
            Ok(TransitionOutcome::Ignore) => prop_assert!(ignored_from(requested).contains(&current)),
            Err(StateMachineError::Unrecognized { current: c, requested: r }) => {
                prop_assert_eq!((c, r), (current, requested));
                prop_assert!(!valid_from(requested).contains(&current));
                prop_assert!(!ignored_from(requested).contains(&current));
            }
        }
    }

    #[test]
    fn prop_error_state_accepts_no_request(requested in any_state()) {
        prop_assert!(evaluate(AgentState::Error, requested).is_err());
    }
}
