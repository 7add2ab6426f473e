//! Contract Test: One-Shot Connection Check
//!
//! Constraints verified:
//! - Link is a fast-fail gate: when it fails, HTTP and ping never run
//! - Selected network probes are AND-combined, never OR-combined
//! - Unselected probes are never invoked
//! - State and events follow the result of the check
//! - Cancellation surfaces as `Cancelled` and forces the state to disconnected
//! - Dropping an in-flight check aborts its validator tasks

mod common;

use common::*;
use netwatch_core::{ConnectionOutcome, ConnectivityEvent, Error, ProbeKind, ValidationType};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[tokio::test]
async fn link_failure_short_circuits_network_probes() {
    let probes = Probes::fixed(false, true, true);
    let service = service_with(&probes);
    let mut rx = service.subscribe();

    let outcome = service.check_connection(ValidationType::ALL).await.unwrap();

    assert_eq!(outcome, ConnectionOutcome::Disconnected);
    assert_eq!(probes.link.calls(), 1);
    assert_eq!(probes.http.calls(), 0, "HTTP probe ran after link failure");
    assert_eq!(probes.ping.calls(), 0, "ping probe ran after link failure");
    assert!(!service.is_connected());
    assert_eq!(drain(&mut rx), vec![ConnectivityEvent::ConnectionFailed]);
}

#[tokio::test]
async fn all_requires_every_selected_probe() {
    for link in [false, true] {
        for http in [false, true] {
            for ping in [false, true] {
                let probes = Probes::fixed(link, http, ping);
                let service = service_with(&probes);

                let outcome = service.check_connection(ValidationType::ALL).await.unwrap();

                assert_eq!(
                    outcome.is_connected(),
                    link && http && ping,
                    "link={} http={} ping={}",
                    link,
                    http,
                    ping
                );
                assert_eq!(service.is_connected(), outcome.is_connected());
            }
        }
    }
}

#[tokio::test]
async fn unselected_probes_are_not_invoked() {
    let probes = Probes::fixed(true, true, false);
    let service = service_with(&probes);

    let outcome = service.check_connection(ValidationType::WEB_CHECK).await.unwrap();

    assert_eq!(outcome, ConnectionOutcome::Connected);
    assert_eq!(probes.http.calls(), 1);
    assert_eq!(probes.ping.calls(), 0);
}

#[tokio::test]
async fn network_probes_run_without_link_gate() {
    let probes = Probes::fixed(false, true, true);
    let service = service_with(&probes);

    let validation = ValidationType::from_kinds(&[ProbeKind::Http, ProbeKind::Ping]);
    let outcome = service.check_connection(validation).await.unwrap();

    assert_eq!(outcome, ConnectionOutcome::Connected);
    assert_eq!(probes.link.calls(), 0);
}

#[tokio::test]
async fn default_check_reports_transition_once() {
    let probes = Probes::fixed(true, false, false);
    let service = service_with(&probes);
    let mut rx = service.subscribe();
    assert!(!service.is_connected());

    let outcome = service.check_connection(ValidationType::DEFAULT).await.unwrap();

    assert_eq!(outcome, ConnectionOutcome::Connected);
    assert!(service.is_connected());
    assert!(service.last_transition().is_some());
    assert_eq!(
        drain(&mut rx),
        vec![
            ConnectivityEvent::StatusChanged { connected: true },
            ConnectivityEvent::ConnectionSucceeded,
        ]
    );

    // A second success does not flip the status again
    service.check_connection(ValidationType::DEFAULT).await.unwrap();
    assert_eq!(drain(&mut rx), vec![ConnectivityEvent::ConnectionSucceeded]);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_probes_surfaces_as_cancelled() {
    let probes = Probes {
        http: ScriptedValidator::fixed(ProbeKind::Http, true).with_delay(Duration::from_secs(5)),
        ..Probes::fixed(true, true, true)
    };
    let service = service_with(&probes);

    // Become connected first so the forced disconnect is observable
    service.check_connection(ValidationType::DEFAULT).await.unwrap();
    assert!(service.is_connected());

    let checker = service.clone();
    let check = tokio::spawn(async move { checker.check_connection(ValidationType::WEB_CHECK).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    service.stop_tracking();

    let outcome = check.await.unwrap().unwrap();
    assert_eq!(outcome, ConnectionOutcome::Cancelled);
    assert!(!service.is_connected());
}

#[tokio::test(start_paused = true)]
async fn dropped_check_aborts_running_validators() {
    let probes = Probes {
        http: ScriptedValidator::fixed(ProbeKind::Http, true).with_delay(Duration::from_secs(5)),
        ping: ScriptedValidator::fixed(ProbeKind::Ping, true).with_delay(Duration::from_secs(5)),
        ..Probes::fixed(true, true, true)
    };
    let service = service_with(&probes);

    let result = tokio::time::timeout(
        Duration::from_millis(100),
        service.check_connection(ValidationType::ALL),
    )
    .await;
    assert!(result.is_err(), "check should still be running at the deadline");
    assert_eq!(probes.http.calls(), 1);
    assert_eq!(probes.ping.calls(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probes.http.finished(), 0, "HTTP task outlived the dropped check");
    assert_eq!(probes.ping.finished(), 0, "ping task outlived the dropped check");
}

#[tokio::test]
async fn probe_panic_is_reported_as_error() {
    let probes = Probes {
        http: ScriptedValidator::scripted(ProbeKind::Http, &[], Fallback::Panic),
        ..Probes::fixed(true, true, true)
    };
    let service = service_with(&probes);

    let result = service.check_connection(ValidationType::ALL).await;

    assert!(matches!(
        result,
        Err(Error::Probe {
            probe: ProbeKind::Http,
            ..
        })
    ));
    assert!(!service.is_connected());
}

#[tokio::test]
async fn callback_variant_invokes_matching_callback() {
    let probes = Probes::fixed(true, false, true);
    let service = service_with(&probes);

    let succeeded = Arc::new(AtomicBool::new(false));
    let failed = Arc::new(AtomicBool::new(false));

    let (s, f) = (Arc::clone(&succeeded), Arc::clone(&failed));
    let outcome = service
        .check_connection_with(
            ValidationType::PING_CHECK,
            move || s.store(true, Ordering::SeqCst),
            move || f.store(true, Ordering::SeqCst),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ConnectionOutcome::Connected);
    assert!(succeeded.load(Ordering::SeqCst));
    assert!(!failed.load(Ordering::SeqCst));

    let (s, f) = (Arc::clone(&succeeded), Arc::clone(&failed));
    succeeded.store(false, Ordering::SeqCst);
    let outcome = service
        .check_connection_with(
            ValidationType::WEB_CHECK,
            move || s.store(true, Ordering::SeqCst),
            move || f.store(true, Ordering::SeqCst),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ConnectionOutcome::Disconnected);
    assert!(!succeeded.load(Ordering::SeqCst));
    assert!(failed.load(Ordering::SeqCst));
}
