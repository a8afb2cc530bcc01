#![allow(clippy::unwrap_used)]
// Integration tests for `Session` against a wiremock HMI service.
//
// All sessions here use the polling transport so no WebSocket server is
// needed; the initial `item.state` load is shared by both transports.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio::sync::broadcast;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ehmi_core::{
    ConnectionState, ControlId, CoreError, Session, SessionConfig, SessionEvent, StateTransport,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

fn rpc(method_name: &str) -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/jrpc"))
        .and(body_partial_json(json!({ "method": method_name })))
}

fn session(server: &MockServer, poll: Duration) -> Session {
    let mut config = SessionConfig::new(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("panel-7".to_string()),
    );
    config.transport = StateTransport::Poll { interval: poll };
    Session::new(config).unwrap()
}

async fn mount_config(server: &MockServer) {
    rpc("ehmi.get_config")
        .and(body_partial_json(json!({ "params": { "ck": "panel-7" } })))
        .respond_with(ok(json!({
            "config": {
                "button": [
                    { "oid": "unit:pumps/p1", "label": "Main_pump", "busy": "sensor:env/door" },
                    { "oid": "lmacro:ops/flush" },
                    { "oid": "unit:valves/v1", "kind": "value" }
                ]
            },
            "token": "tok-config"
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer) {
    rpc("login")
        .and(body_partial_json(json!({ "params": { "a": "tok-config" } })))
        .respond_with(ok(json!({ "token": "tok-session" })))
        .expect(1)
        .mount(server)
        .await;
}

/// Next `State` event, skipping connection changes.
async fn next_state(rx: &mut broadcast::Receiver<SessionEvent>) -> ehmi_core::RemoteState {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if let SessionEvent::State(state) = event {
            return (*state).clone();
        }
    }
}

// ── Connect ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_builds_dashboard_and_loads_states() {
    let server = MockServer::start().await;
    mount_config(&server).await;
    mount_login(&server).await;
    rpc("item.state")
        .and(body_partial_json(json!({
            "params": {
                "i": ["unit:pumps/p1", "sensor:env/door", "unit:valves/v1"],
                "k": "tok-session"
            }
        })))
        .respond_with(ok(json!([
            { "oid": "unit:pumps/p1", "status": 1, "value": 1, "act": 0, "ieid": [1, 10] },
            { "oid": "sensor:env/door", "status": 1, "value": 0, "ieid": [1, 11] },
            { "oid": "unit:valves/v1", "status": 1, "value": 42, "act": 0, "ieid": [1, 12] }
        ])))
        .mount(&server)
        .await;

    let session = session(&server, Duration::from_secs(3600));
    let mut events = session.events();
    let mut dashboard = session.connect().await.unwrap();

    assert_eq!(dashboard.len(), 3);
    assert_eq!(dashboard.controls()[0].label(), "Main pump");
    assert_eq!(dashboard.visible().count(), 1);
    assert_eq!(*session.connection_state().borrow(), ConnectionState::Connected);
    assert_eq!(session.watch_set().await.len(), 3);

    for _ in 0..3 {
        let state = next_state(&mut events).await;
        dashboard.notify(&state);
    }

    assert_eq!(dashboard.visible().count(), 3);
    let pump = dashboard.control(ControlId(0)).unwrap();
    assert!(pump.is_checked());
    assert!(!pump.is_disabled());
    assert_eq!(dashboard.control(ControlId(2)).unwrap().field(), "42");

    session.disconnect().await;
    assert_eq!(*session.connection_state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_login_rejection_is_fatal_and_announced() {
    let server = MockServer::start().await;
    mount_config(&server).await;
    rpc("login")
        .respond_with(rpc_error(-32002, "access denied"))
        .mount(&server)
        .await;

    let session = session(&server, Duration::from_secs(3600));
    let mut events = session.events();
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    assert!(err.is_fatal());
    assert_eq!(*session.connection_state().borrow(), ConnectionState::Failed);

    let mut saw_login_failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::LoginFailed(_)) {
            saw_login_failed = true;
        }
    }
    assert!(saw_login_failed);
}

#[tokio::test]
async fn test_config_access_denied_is_fatal() {
    let server = MockServer::start().await;
    rpc("ehmi.get_config")
        .respond_with(rpc_error(-32002, "access denied"))
        .mount(&server)
        .await;

    let session = session(&server, Duration::from_secs(3600));
    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
}

#[tokio::test]
async fn test_missing_oid_aborts_before_login() {
    let server = MockServer::start().await;
    rpc("ehmi.get_config")
        .respond_with(ok(json!({
            "config": { "button": [{ "oid": "unit:a/1" }, { "label": "x" }] },
            "token": "tok-config"
        })))
        .mount(&server)
        .await;
    rpc("login")
        .respond_with(ok(json!({ "token": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let session = session(&server, Duration::from_secs(3600));
    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::MissingOid { index: 1 }));
    assert!(session.watch_set().await.is_empty());
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_polling_delivers_only_newer_states() {
    let server = MockServer::start().await;
    rpc("ehmi.get_config")
        .respond_with(ok(json!({
            "config": { "button": { "oid": "unit:pumps/p1" } },
            "token": "tok-config"
        })))
        .mount(&server)
        .await;
    mount_login(&server).await;
    // First answer (initial load), then a newer one forever after.
    rpc("item.state")
        .respond_with(ok(json!([
            { "oid": "unit:pumps/p1", "status": 1, "value": 0, "ieid": [1, 1] }
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    rpc("item.state")
        .respond_with(ok(json!([
            { "oid": "unit:pumps/p1", "status": 1, "value": 1, "ieid": [1, 2] }
        ])))
        .mount(&server)
        .await;

    let session = session(&server, Duration::from_millis(50));
    let mut events = session.events();
    let _dashboard = session.connect().await.unwrap();

    let first = next_state(&mut events).await;
    assert_eq!(first.value, json!(0));
    let second = next_state(&mut events).await;
    assert_eq!(second.value, json!(1));

    // Repeated polls keep returning ieid [1, 2]; none of them get through.
    tokio::time::sleep(Duration::from_millis(250)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, SessionEvent::State(_)), "stale state delivered");
    }

    session.disconnect().await;
}
