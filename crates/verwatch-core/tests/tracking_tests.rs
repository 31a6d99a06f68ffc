//! Tracking Loop Tests
//!
//! Query handling, semantic ordering, bootstrap and loop independence.
//! Time is paused so intervals elapse instantly.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use verwatch_core::{check_once, spawn_tracker, CheckOutcome, Options, Service, WatchError};
use verwatch_filter::FilterError;
use verwatch_status::SubType;
use verwatch_test_utils::{
    count_version_announces, test_context, wait_for, wire, RecordingAction, ScriptedSource,
    StaticDeployed,
};

fn every_second() -> Options {
    Options::default().with_interval(Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn test_older_semantic_version_rejected() {
    let source = Arc::new(ScriptedSource::new(["1.2.9"]));
    let (service, mut rx) = wire(Service::new("svc", test_context()).with_latest_version(source));
    service.status().set_latest_version("1.2.10", false);

    let err = check_once(&service).await.unwrap_err();

    assert!(matches!(
        err,
        WatchError::Filter(FilterError::OlderVersion { .. })
    ));
    assert_eq!(service.status().latest_version(), "1.2.10");
    assert!(service.status().last_queried().is_some());
    assert!(rx.drain_persist().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unparsable_first_version_rejected() {
    let (service, _rx) = wire(
        Service::new("svc", test_context())
            .with_latest_version(Arc::new(ScriptedSource::new(["nightly", "1.0.0", "1.1.0"]))),
    );

    let err = check_once(&service).await.unwrap_err();
    assert!(matches!(
        err,
        WatchError::Filter(FilterError::InvalidSemver(ref v)) if v == "nightly"
    ));
    assert_eq!(service.status().latest_version(), "");

    assert_eq!(
        check_once(&service).await.unwrap(),
        CheckOutcome::FirstVersion("1.0.0".to_string())
    );
    assert_eq!(
        check_once(&service).await.unwrap(),
        CheckOutcome::NewVersion("1.1.0".to_string())
    );
    assert_eq!(service.status().latest_version(), "1.1.0");
}

#[tokio::test(start_paused = true)]
async fn test_opaque_versions_any_change_counts() {
    let source = Arc::new(ScriptedSource::new(["1.2.9"]));
    let (service, _rx) = wire(
        Service::new("svc", test_context())
            .with_options(Options::default().with_semantic_versioning(false))
            .with_latest_version(source),
    );
    service.status().set_latest_version("1.2.10", false);

    let outcome = check_once(&service).await.unwrap();
    assert_eq!(outcome, CheckOutcome::NewVersion("1.2.9".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_first_version_seeds_deployed_without_actions() {
    let command = Arc::new(RecordingAction::command(0));
    let (service, mut rx) = wire(
        Service::new("svc", test_context())
            .with_options(Options::default().with_auto_approve(true))
            .with_latest_version(Arc::new(ScriptedSource::new(["1.0.0"])))
            .with_command(command.clone()),
    );

    let outcome = check_once(&service).await.unwrap();

    assert_eq!(outcome, CheckOutcome::FirstVersion("1.0.0".to_string()));
    assert_eq!(service.status().latest_version(), "1.0.0");
    assert_eq!(service.status().deployed_version(), "1.0.0");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(command.runs(), 0);
    assert_eq!(count_version_announces(&rx.drain_announce(), SubType::Init), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_version_with_lookup_leaves_deployed() {
    let (service, _rx) = wire(
        Service::new("svc", test_context())
            .with_latest_version(Arc::new(ScriptedSource::new(["1.0.0"])))
            .with_deployed_version(Arc::new(StaticDeployed::new("0.9.0"))),
    );

    check_once(&service).await.unwrap();

    assert_eq!(service.status().latest_version(), "1.0.0");
    assert_eq!(service.status().deployed_version(), "");
}

#[tokio::test(start_paused = true)]
async fn test_new_version_hands_off_to_orchestrator() {
    let command = Arc::new(RecordingAction::command(0));
    let (service, _rx) = wire(
        Service::new("svc", test_context())
            .with_options(Options::default().with_auto_approve(true))
            .with_latest_version(Arc::new(ScriptedSource::new(["1.1.0"])))
            .with_command(command.clone()),
    );
    service.status().set_deployed_version("1.0.0", false);
    service.status().set_latest_version("1.0.0", false);

    let outcome = check_once(&service).await.unwrap();
    assert_eq!(outcome, CheckOutcome::NewVersion("1.1.0".to_string()));

    assert!(wait_for(|| command.runs() == 1, Duration::from_secs(1)).await);
    assert!(
        wait_for(
            || service.status().deployed_version() == "1.1.0",
            Duration::from_secs(1)
        )
        .await
    );
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_version_announces_query() {
    let (service, mut rx) = wire(
        Service::new("svc", test_context())
            .with_latest_version(Arc::new(ScriptedSource::new(["1.0.0"]))),
    );
    service.status().set_latest_version("1.0.0", false);

    assert_eq!(check_once(&service).await.unwrap(), CheckOutcome::Unchanged);
    let announces = rx.drain_announce();
    assert_eq!(announces.len(), 1);
    assert_eq!(announces[0].sub_type, SubType::Query);
}

#[tokio::test(start_paused = true)]
async fn test_query_failure_only_advances_last_queried() {
    let (service, mut rx) = wire(
        Service::new("svc", test_context())
            .with_latest_version(Arc::new(ScriptedSource::failing())),
    );
    service.status().set_latest_version("1.0.0", false);

    assert!(check_once(&service).await.is_err());
    assert!(service.status().last_queried().is_some());
    assert_eq!(service.status().latest_version(), "1.0.0");
    assert!(rx.drain_announce().is_empty());
    assert!(rx.drain_persist().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failing_service_does_not_stall_healthy_one() {
    let failing_source = Arc::new(ScriptedSource::failing());
    let healthy_source = Arc::new(ScriptedSource::new(["1.0.0", "1.1.0", "1.2.0"]));
    let (failing, _frx) = wire(
        Service::new("failing", test_context())
            .with_options(every_second())
            .with_latest_version(failing_source.clone()),
    );
    let (healthy, _hrx) = wire(
        Service::new("healthy", test_context())
            .with_options(every_second())
            .with_latest_version(healthy_source.clone()),
    );

    let handles = [
        spawn_tracker(Arc::clone(&failing)),
        spawn_tracker(Arc::clone(&healthy)),
    ];
    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert!(failing_source.calls() >= 3);
    assert!(healthy_source.calls() >= 3);
    assert_eq!(failing.status().latest_version(), "");
    assert_eq!(healthy.status().latest_version(), "1.2.0");
    assert_eq!(healthy.status().deployed_version(), "1.2.0");

    failing.status().set_deleting();
    healthy.status().set_deleting();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_deleting_service_never_queries() {
    let source = Arc::new(ScriptedSource::new(["1.0.0"]));
    let (service, _rx) = wire(
        Service::new("svc", test_context()).with_latest_version(source.clone()),
    );
    service.status().set_deleting();

    spawn_tracker(Arc::clone(&service)).await.unwrap();
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_inactive_or_sourceless_service_returns() {
    let (sourceless, _rx) = wire(Service::new("a", test_context()));
    spawn_tracker(sourceless).await.unwrap();

    let source = Arc::new(ScriptedSource::new(["1.0.0"]));
    let (inactive, _rx) = wire(
        Service::new("b", test_context())
            .with_options(Options::default().with_active(false))
            .with_latest_version(source.clone()),
    );
    spawn_tracker(inactive).await.unwrap();
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deployed_lookup_polled_alongside() {
    let lookup = Arc::new(StaticDeployed::new("1.0.0"));
    let (service, _rx) = wire(
        Service::new("svc", test_context())
            .with_options(every_second())
            .with_latest_version(Arc::new(ScriptedSource::new(["1.0.0"])))
            .with_deployed_version(lookup.clone()),
    );

    let handle = spawn_tracker(Arc::clone(&service));
    assert!(
        wait_for(
            || service.status().deployed_version() == "1.0.0",
            Duration::from_secs(3)
        )
        .await
    );

    lookup.set_version("1.1.0");
    assert!(
        wait_for(
            || service.status().deployed_version() == "1.1.0",
            Duration::from_secs(3)
        )
        .await
    );
    // A deployed version newer than latest becomes latest
    assert_eq!(service.status().latest_version(), "1.1.0");

    service.status().set_deleting();
    handle.await.unwrap();
}
