//! Failure and retry controller
//!
//! Re-runs actions on request. When every action has passed the whole
//! set is re-run; otherwise only not-run and failed actions are. The
//! same path approves a version that is waiting for approval, since
//! every cell is not-run until something is dispatched.

use crate::orchestrator::{dispatch, updated_version, DispatchReport};
use crate::service::Service;
use std::sync::Arc;
use verwatch_status::{ActionKey, Fails};

/// Whether a full re-run is due (every action passed)
#[must_use]
pub fn should_retry_all(fails: &Fails) -> bool {
    fails.all_passed()
}

/// Actions a retry should dispatch, Commands first
#[must_use]
pub fn retry_candidates(fails: &Fails) -> Vec<ActionKey> {
    if should_retry_all(fails) {
        fails.keys()
    } else {
        fails.pending()
    }
}

/// Retry failed (or all) actions and re-attempt the version gate
///
/// Blocks until every started action reported back. Actions whose floor
/// has not passed are skipped and not waited on.
pub async fn handle_failed_actions(service: &Arc<Service>) -> DispatchReport {
    let keys = retry_candidates(&service.status().fails());
    if keys.is_empty() {
        return DispatchReport::default();
    }

    tracing::info!(
        service = service.id(),
        count = keys.len(),
        "retrying actions"
    );
    let report = dispatch(service, &keys, false).await;
    if report.all_passed() {
        updated_version(service);
    } else {
        tracing::warn!(
            service = service.id(),
            attempted = report.attempted,
            failed = report.failed,
            "retry left failures"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use verwatch_status::FailState;

    fn table(states: &[FailState]) -> Fails {
        let mut fails = Fails::new(states.len(), Vec::<String>::new());
        for (i, state) in states.iter().enumerate() {
            fails.set(&ActionKey::Command(i), *state).unwrap();
        }
        fails
    }

    #[test]
    fn selective_when_any_unpassed() {
        let fails = table(&[FailState::Passed, FailState::Failed, FailState::NotRun]);
        assert!(!should_retry_all(&fails));
        assert_eq!(
            retry_candidates(&fails),
            vec![ActionKey::Command(1), ActionKey::Command(2)]
        );
    }

    #[test]
    fn everything_when_all_passed() {
        let fails = table(&[FailState::Passed, FailState::Passed]);
        assert!(should_retry_all(&fails));
        assert_eq!(
            retry_candidates(&fails),
            vec![ActionKey::Command(0), ActionKey::Command(1)]
        );
    }

    #[test]
    fn webhooks_count_too() {
        let mut fails = Fails::new(1, ["deploy"]);
        fails.set(&ActionKey::Command(0), FailState::Passed).unwrap();
        assert!(!should_retry_all(&fails));
        assert_eq!(retry_candidates(&fails), vec![ActionKey::webhook("deploy")]);
    }
}
