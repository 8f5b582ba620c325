//! End-to-end exchanges between a Consumer and a Provider over a shared store.

mod common;

use common::{app_request, Pair, CONSUMER, PROXY_HOST};
use reverseproxy_relation::driver::{DriverError, RecordingSink};
use reverseproxy_relation::proxy::{validate, ConfigSetError, ValidationError};
use reverseproxy_relation::relation::{Hook, HookKind, ProtocolState};
use reverseproxy_relation::status::{Outcome, StatusEncoding};
use reverseproxy_relation::{
    ConfigSet, ConsumerDriver, ProxyEvent, ProxyRequest, RelationEndpoint, UnitId,
};

#[test]
fn test_accepted_flow() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    let events = pair.events();
    assert!(matches!(events[0], ProxyEvent::PeerConnected { .. }));
    assert_eq!(
        events[1],
        ProxyEvent::ProxyReady {
            relation: pair.relation.clone(),
            hostname: PROXY_HOST.to_string(),
            ports: "80,443".to_string(),
        }
    );

    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump().is_empty());

    let events = pair.events();
    assert!(
        events.iter().any(|e| matches!(e, ProxyEvent::ConfigAccepted { .. })),
        "{:?}",
        events
    );
    assert!(!events.iter().any(|e| matches!(e, ProxyEvent::ProxyConfigError { .. })));
    assert_eq!(pair.renderer.calls(), 1);
    assert_eq!(
        pair.provider.config(&pair.relation, &UnitId::from(CONSUMER)),
        pair.consumer.config(&pair.relation)
    );
    assert_eq!(
        pair.consumer.state(&pair.relation),
        ProtocolState {
            triggered: true,
            ready: true,
            configured: true,
            departed: false,
        }
    );
    assert_eq!(pair.consumer.status(&pair.relation).map(|s| s.outcome), Some(Outcome::Passed));
}

#[test]
fn test_accepted_flow_with_fields_status() {
    let mut pair = Pair::connected(StatusEncoding::Fields);
    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump().is_empty());

    let bag = pair.store.bag(&pair.relation, &"haproxy/0".into());
    assert_eq!(bag.get("cfg_good").map(String::as_str), Some("true"));
    assert!(pair
        .events()
        .iter()
        .any(|e| matches!(e, ProxyEvent::ConfigAccepted { .. })));
}

#[test]
fn test_missing_http_identifier_writes_nothing() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    let writes = pair.store.write_count();

    let err = pair
        .consumer
        .configure(&pair.relation, &[ProxyRequest::new(80, "10.0.0.5", 8080)])
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::Config(ConfigSetError::InvalidEntry {
            index: 0,
            source: ValidationError::MissingHttpIdentifier,
        })
    ));
    assert_eq!(pair.store.write_count(), writes);
    assert!(pair.queued_for_provider().is_empty());
    assert!(!pair.consumer.state(&pair.relation).configured);
}

#[test]
fn test_configure_twice_is_one_effective_write() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    let writes = pair.store.write_count();

    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert_eq!(pair.store.write_count(), writes + 1);

    let hooks = pair.queued_for_provider();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].kind, HookKind::Changed);
}

#[test]
fn test_repeated_notifications_render_once() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump().is_empty());

    // Notifications with nothing new, on both sides.
    pair.provider
        .handle(&Hook::changed(pair.relation.clone(), UnitId::from(CONSUMER)))
        .unwrap();
    pair.provider
        .advertise(&pair.relation, "80,443", None)
        .unwrap();
    assert!(pair.pump().is_empty());
    assert_eq!(pair.renderer.calls(), 1);
    assert_eq!(
        pair.events()
            .iter()
            .filter(|e| matches!(e, ProxyEvent::ConfigAccepted { .. }))
            .count(),
        1
    );
}

#[test]
fn test_config_set_round_trips_through_the_wire() {
    let requests = vec![
        app_request().with_httpchk("GET /health"),
        ProxyRequest::new(443, "10.0.0.5", 8443)
            .with_mode("tcp+tls")
            .with_check(false),
        ProxyRequest::new(8080, "api.internal", 9000).with_urlbase("/api"),
    ];
    let sent = ConfigSet::from_requests(&requests).unwrap();
    let received = ConfigSet::from_json(&sent.to_json().unwrap()).unwrap();

    assert_eq!(received, sent);
    for record in &received {
        assert_eq!(validate(&record.to_request()).as_ref(), Ok(record));
    }
}

#[test]
fn test_invalid_wire_payload_becomes_failed_status() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    pair.events();
    pair.write_raw_config(
        r#"[{"external_port": 80, "internal_host": "10.0.0.5", "internal_port": 8080, "mode": "udp", "subdomain": "app"}]"#,
    );
    assert!(pair.pump().is_empty());

    assert_eq!(pair.renderer.calls(), 0);
    let events = pair.events();
    match events.as_slice() {
        [ProxyEvent::ProxyConfigError { message, .. }] => {
            assert_eq!(
                message,
                "config entry 0: \"mode\" setting must be http, tcp or tcp+tls if provided (got \"udp\")"
            );
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[test]
fn test_render_failure_becomes_failed_status() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    pair.events();
    pair.renderer.fail_with("frontend port 80 already bound");

    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump().is_empty());

    let events = pair.events();
    assert_eq!(
        events,
        vec![ProxyEvent::ProxyConfigError {
            relation: pair.relation.clone(),
            message: "frontend port 80 already bound".to_string(),
        }]
    );
    assert_eq!(pair.provider.config(&pair.relation, &UnitId::from(CONSUMER)), None);
}

#[test]
fn test_departure_then_fresh_exchange() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump().is_empty());
    assert!(pair.consumer.state(&pair.relation).ready);

    pair.break_relation();
    let state = pair.consumer.state(&pair.relation);
    assert!(state.departed && !state.ready && !state.configured);
    assert_eq!(pair.consumer.config(&pair.relation), None);
    assert_eq!(pair.provider.config(&pair.relation, &UnitId::from(CONSUMER)), None);
    pair.events();

    pair.join();
    assert_eq!(pair.consumer.state(&pair.relation), ProtocolState {
        triggered: true,
        ..ProtocolState::default()
    });
    pair.provider
        .advertise(&pair.relation, "80,443", None)
        .unwrap();
    let fresh = ProxyRequest::new(8080, "10.0.0.9", 9090).with_urlbase("/v2");
    pair.consumer.configure(&pair.relation, &[fresh.clone()]).unwrap();
    assert!(pair.pump().is_empty());

    let state = pair.consumer.state(&pair.relation);
    assert!(state.ready && state.configured && !state.departed);
    assert_eq!(pair.renderer.calls(), 2);
    assert_eq!(
        pair.renderer.last(),
        Some(ConfigSet::from_requests(&[fresh]).unwrap())
    );
    let events = pair.events();
    assert!(events.iter().any(|e| matches!(e, ProxyEvent::ProxyReady { .. })));
    assert!(events.iter().any(|e| matches!(e, ProxyEvent::ConfigAccepted { .. })));
}

#[test]
fn test_writes_after_departure_fail() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    pair.break_relation();
    assert!(matches!(
        pair.consumer.configure(&pair.relation, &[app_request()]),
        Err(DriverError::Store(_))
    ));
}

fn accepted(events: &[ProxyEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ProxyEvent::ConfigAccepted { .. }))
        .count()
}

#[test]
fn test_reconfigure_with_same_service_count_is_accepted_again() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    pair.events();

    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump().is_empty());
    assert_eq!(accepted(&pair.events()), 1);

    // One service again, so the Provider's message reads the same.
    let moved = ProxyRequest::new(81, "10.0.0.6", 9090).with_urlbase("/v2");
    pair.consumer.configure(&pair.relation, &[moved.clone()]).unwrap();
    assert!(pair.pump().is_empty());

    let events = pair.events();
    assert_eq!(accepted(&events), 1, "{:?}", events);
    assert_eq!(pair.renderer.calls(), 2);
    assert_eq!(pair.renderer.last(), Some(ConfigSet::from_requests(&[moved]).unwrap()));
}

#[test]
fn test_switching_back_to_an_earlier_config_is_accepted_again() {
    let mut pair = Pair::connected(StatusEncoding::Fields);
    pair.events();
    let other = ProxyRequest::new(81, "10.0.0.6", 9090).with_urlbase("/v2");

    for requests in [vec![app_request()], vec![other], vec![app_request()]] {
        pair.consumer.configure(&pair.relation, &requests).unwrap();
        assert!(pair.pump().is_empty());
        assert_eq!(accepted(&pair.events()), 1);
    }
    assert_eq!(pair.renderer.calls(), 3);
}

#[test]
fn test_rewrite_before_status_arrives_reports_latest_verdict() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    pair.events();

    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump_provider().is_empty());

    // The status for the first payload is still queued for the Consumer.
    let latest = ProxyRequest::new(81, "10.0.0.6", 9090).with_urlbase("/v2");
    pair.consumer.configure(&pair.relation, &[latest.clone()]).unwrap();
    assert!(pair.pump_consumer().is_empty());
    assert_eq!(pair.events(), vec![]);
    assert_eq!(pair.consumer.status(&pair.relation), None);

    assert!(pair.pump().is_empty());
    let events = pair.events();
    assert_eq!(accepted(&events), 1, "{:?}", events);
    assert_eq!(pair.renderer.last(), Some(ConfigSet::from_requests(&[latest]).unwrap()));
    assert_eq!(pair.consumer.status(&pair.relation).map(|s| s.outcome), Some(Outcome::Passed));
}

#[test]
fn test_rewrite_before_status_arrives_reports_latest_rejection() {
    let mut pair = Pair::connected(StatusEncoding::Fields);
    pair.events();

    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    assert!(pair.pump_provider().is_empty());

    pair.renderer.fail_with("frontend port 81 already bound");
    let latest = ProxyRequest::new(81, "10.0.0.6", 9090).with_urlbase("/v2");
    pair.consumer.configure(&pair.relation, &[latest]).unwrap();
    assert!(pair.pump_consumer().is_empty());
    assert!(pair.pump().is_empty());

    assert_eq!(
        pair.events(),
        vec![ProxyEvent::ProxyConfigError {
            relation: pair.relation.clone(),
            message: "frontend port 81 already bound".to_string(),
        }]
    );
    assert_eq!(pair.consumer.status(&pair.relation).map(|s| s.outcome), Some(Outcome::Failed));
}

#[test]
fn test_sibling_consumer_leaving_keeps_the_other_served() {
    let mut pair = Pair::connected(StatusEncoding::Line);
    let sibling_unit = UnitId::from("myapp/1");
    let _sibling_hooks = pair.store.watch(sibling_unit.clone());
    let mut sibling = ConsumerDriver::new(
        pair.store.view(sibling_unit.clone()),
        RecordingSink::new(),
        StatusEncoding::Line,
    );
    pair.store.join(&pair.relation, &sibling_unit);

    pair.consumer.configure(&pair.relation, &[app_request()]).unwrap();
    sibling
        .configure(
            &pair.relation,
            &[ProxyRequest::new(81, "10.0.0.6", 9090).with_urlbase("/v2")],
        )
        .unwrap();
    assert!(pair.pump().is_empty());
    assert!(pair.provider.config(&pair.relation, &sibling_unit).is_some());
    pair.events();

    pair.store.leave(&pair.relation, &sibling_unit);
    assert!(pair.pump().is_empty());
    assert!(!pair.provider.state(&pair.relation).departed);
    assert!(!pair.consumer.state(&pair.relation).departed);
    assert_eq!(pair.provider.config(&pair.relation, &sibling_unit), None);
    assert_eq!(
        pair.provider.config(&pair.relation, &UnitId::from(CONSUMER)),
        pair.consumer.config(&pair.relation)
    );

    let moved = ProxyRequest::new(8080, "10.0.0.5", 8080).with_subdomain("app");
    pair.consumer.configure(&pair.relation, &[moved]).unwrap();
    assert!(pair.pump().is_empty());
    assert_eq!(accepted(&pair.events()), 1);
    assert_eq!(
        pair.provider.config(&pair.relation, &UnitId::from(CONSUMER)),
        pair.consumer.config(&pair.relation)
    );
}
