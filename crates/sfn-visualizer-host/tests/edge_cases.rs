//! Edge case integration tests for sfn-visualizer-host.
//!
//! Drives the protocol handler with JSON messages and inspects both responses
//! and the notifications queued for the client.

use serde_json::{json, Value};

use sfn_visualizer_host::config::HostConfig;
use sfn_visualizer_host::protocol::handler::RENDER_FAILURE_MESSAGE;
use sfn_visualizer_host::protocol::ProtocolHandler;
use sfn_visualizer_host::transport::framing;
use sfn_visualizer_host::types::*;

// ─────────────────────── helpers ───────────────────────

const DEFINITION: &str = r#"{"StartAt":"Hello","States":{"Hello":{"Type":"Pass","End":true}}}"#;

fn handler_in(dir: &tempfile::TempDir) -> ProtocolHandler {
    ProtocolHandler::open(HostConfig::in_dir(dir.path())).unwrap()
}

fn request(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

fn notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
}

fn visualize_request(id: i64, uri: &str) -> Value {
    request(
        id,
        "visualize",
        json!({ "document": { "uri": uri, "text": DEFINITION } }),
    )
}

async fn send(handler: &ProtocolHandler, msg: Value) -> Option<Value> {
    let parsed: IncomingMessage = serde_json::from_value(msg).unwrap();
    handler.handle_message(parsed).await
}

async fn send_unwrap(handler: &ProtocolHandler, msg: Value) -> Value {
    send(handler, msg).await.expect("expected response")
}

fn methods(notifications: &[Notification]) -> Vec<&str> {
    notifications.iter().map(|n| n.method.as_str()).collect()
}

/// Surface notifications only; log lines are checked separately.
fn surface_events(handler: &ProtocolHandler) -> Vec<Notification> {
    handler
        .drain_notifications()
        .into_iter()
        .filter(|n| n.method.starts_with("surface/"))
        .collect()
}

// ═══════════════════════════════════════════════════════
// PROTOCOL
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_malformed_json() {
    let err = framing::parse_message(r#"{"broken":"#).unwrap_err();
    assert_eq!(err.code(), -32700);
    assert!(framing::parse_message("").is_err());
    assert!(framing::parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"#).is_err());
}

#[tokio::test]
async fn test_initialize_and_unknown_method() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let resp = send_unwrap(
        &handler,
        request(
            0,
            "initialize",
            json!({ "protocolVersion": PROTOCOL_VERSION, "clientInfo": { "name": "test", "version": "1.0" } }),
        ),
    )
    .await;
    assert_eq!(resp["result"]["serverInfo"]["name"], SERVER_NAME);
    assert!(resp["result"]["capabilities"]["methods"]
        .as_array()
        .unwrap()
        .contains(&json!("visualize")));

    assert!(send(&handler, notification("initialized", json!({}))).await.is_none());
    assert!(handler.is_initialized());

    let resp = send_unwrap(&handler, request(1, "tools/list", json!({}))).await;
    assert_eq!(resp["error"]["code"], -32601);

    let resp = send_unwrap(
        &handler,
        json!({ "jsonrpc": "1.0", "id": 2, "method": "ping" }),
    )
    .await;
    assert_eq!(resp["error"]["code"], -32600);

    let resp = send_unwrap(&handler, request(3, "ping", Value::Null)).await;
    assert_eq!(resp["result"], json!({}));
}

// ═══════════════════════════════════════════════════════
// SESSION REUSE
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_second_visualize_reveals_existing_surface() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let first = send_unwrap(&handler, visualize_request(1, "/work/doc1.asl.json")).await;
    let opened = surface_events(&handler);
    assert_eq!(methods(&opened), vec![SURFACE_OPENED]);
    assert_eq!(
        opened[0].params.as_ref().unwrap()["surface"],
        first["result"]["surface"]
    );

    let second = send_unwrap(&handler, visualize_request(2, "file:///work/doc1.asl.json")).await;
    assert_eq!(second["result"]["sessionId"], first["result"]["sessionId"]);
    assert_eq!(second["result"]["surface"], first["result"]["surface"]);
    assert_eq!(methods(&surface_events(&handler)), vec![SURFACE_REVEALED]);

    let status = send_unwrap(&handler, request(3, "cache/status", json!({}))).await;
    assert_eq!(status["result"]["refreshCount"], 1);
    assert_eq!(status["result"]["fresh"], true);
}

#[tokio::test]
async fn test_concurrent_visualize_opens_one_surface() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let (a, b) = tokio::join!(
        send_unwrap(&handler, visualize_request(1, "/work/race.json")),
        send_unwrap(&handler, visualize_request(2, "/work/race.json"))
    );
    assert_eq!(a["result"]["sessionId"], b["result"]["sessionId"]);

    let opened = surface_events(&handler)
        .into_iter()
        .filter(|n| n.method == SURFACE_OPENED)
        .count();
    assert_eq!(opened, 1);
}

#[tokio::test]
async fn test_different_documents_get_different_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let a = send_unwrap(&handler, visualize_request(1, "/work/a.json")).await;
    let b = send_unwrap(&handler, visualize_request(2, "/work/b.json")).await;
    assert_ne!(a["result"]["surface"], b["result"]["surface"]);

    let list = send_unwrap(&handler, request(3, "sessions/list", json!({}))).await;
    let identities: Vec<&str> = list["result"]["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["identity"].as_str().unwrap())
        .collect();
    assert_eq!(identities, vec!["/work/a.json", "/work/b.json"]);
}

// ═══════════════════════════════════════════════════════
// DISPOSAL
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_close_then_visualize_creates_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let first = send_unwrap(&handler, visualize_request(1, "/work/doc1.json")).await;
    let closed = send_unwrap(
        &handler,
        request(2, "surface/close", json!({ "uri": "/work/doc1.json" })),
    )
    .await;
    assert_eq!(closed["result"]["closed"], true);

    let events = surface_events(&handler);
    let last = events.last().unwrap();
    assert_eq!(last.method, SURFACE_CLOSED);
    assert_eq!(last.params.as_ref().unwrap()["origin"], "user");

    let list = send_unwrap(&handler, request(3, "sessions/list", json!({}))).await;
    assert!(list["result"]["sessions"].as_array().unwrap().is_empty());

    let again = send_unwrap(&handler, visualize_request(4, "/work/doc1.json")).await;
    assert_ne!(again["result"]["sessionId"], first["result"]["sessionId"]);
    assert_ne!(again["result"]["surface"], first["result"]["surface"]);

    // Warm cache: the second creation did not refresh.
    let status = send_unwrap(&handler, request(5, "cache/status", json!({}))).await;
    assert_eq!(status["result"]["refreshCount"], 1);

    let closed = send_unwrap(
        &handler,
        request(6, "surface/close", json!({ "uri": "/work/missing.json" })),
    )
    .await;
    assert_eq!(closed["result"]["closed"], false);
}

#[tokio::test]
async fn test_document_close_disposes_session() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    send_unwrap(&handler, visualize_request(1, "/work/doc1.json")).await;
    surface_events(&handler);

    let reply = send(
        &handler,
        notification(DID_CLOSE, json!({ "uri": "file:///work/doc1.json" })),
    )
    .await;
    assert!(reply.is_none());

    let events = surface_events(&handler);
    assert_eq!(methods(&events), vec![SURFACE_CLOSED]);
    assert_eq!(events[0].params.as_ref().unwrap()["origin"], "session");

    let list = send_unwrap(&handler, request(2, "sessions/list", json!({}))).await;
    assert!(list["result"]["sessions"].as_array().unwrap().is_empty());

    // Closing an unrelated or malformed document is ignored.
    assert!(send(&handler, notification(DID_CLOSE, json!({ "uri": "/work/other.json" })))
        .await
        .is_none());
    assert!(send(&handler, notification(DID_CLOSE, json!({}))).await.is_none());
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    send_unwrap(&handler, visualize_request(1, "/work/a.json")).await;
    send_unwrap(&handler, visualize_request(2, "/work/b.json")).await;
    surface_events(&handler);

    let resp = send_unwrap(&handler, request(3, "shutdown", json!({}))).await;
    assert_eq!(resp["result"], json!({}));
    assert_eq!(methods(&surface_events(&handler)), vec![SURFACE_CLOSED, SURFACE_CLOSED]);

    let resp = send_unwrap(&handler, visualize_request(4, "/work/a.json")).await;
    assert_eq!(resp["error"]["code"], -32855);
}

// ═══════════════════════════════════════════════════════
// FAILURES
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_no_active_document() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let resp = send_unwrap(&handler, request(1, "visualize", json!({}))).await;
    assert_eq!(resp["error"]["code"], -32850);

    let sent = handler.drain_notifications();
    let shown: Vec<_> = sent.iter().filter(|n| n.method == SHOW_MESSAGE).collect();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].params.as_ref().unwrap()["type"], "error");
    assert_eq!(shown[0].params.as_ref().unwrap()["message"], RENDER_FAILURE_MESSAGE);

    let logged = sent
        .iter()
        .filter(|n| n.method == LOG_MESSAGE)
        .any(|n| {
            let line = n.params.as_ref().unwrap()["message"].as_str().unwrap();
            line.contains("[ERROR]") && line.contains("Could not get active document")
        });
    assert!(logged);
}

#[tokio::test]
async fn test_relative_uri_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let resp = send_unwrap(&handler, visualize_request(1, "relative/doc.json")).await;
    assert_eq!(resp["error"]["code"], -32851);

    let resp = send_unwrap(&handler, request(2, "surface/close", json!({}))).await;
    assert_eq!(resp["error"]["code"], -32602);
}

#[tokio::test]
async fn test_missing_asset_directory_fails_without_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HostConfig::in_dir(dir.path().join("storage"));
    config.assets_dir = Some(dir.path().join("no-such-assets"));
    let handler = ProtocolHandler::open(config).unwrap();

    let resp = send_unwrap(&handler, visualize_request(1, "/work/doc1.json")).await;
    assert_eq!(resp["error"]["code"], -32852);

    let sent = handler.drain_notifications();
    assert!(sent.iter().any(|n| n.method == SHOW_MESSAGE));
    assert!(!sent.iter().any(|n| n.method == SURFACE_OPENED));

    let status = send_unwrap(&handler, request(2, "cache/status", json!({}))).await;
    assert_eq!(status["result"]["fresh"], false);
    assert_eq!(status["result"]["refreshCount"], 0);
}

#[tokio::test]
async fn test_asset_directory_source() {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("graph.js"), "// custom script").unwrap();
    std::fs::write(assets.join("graph.css"), "/* custom style */").unwrap();

    let mut config = HostConfig::in_dir(dir.path().join("storage"));
    config.assets_dir = Some(assets);
    let handler = ProtocolHandler::open(config).unwrap();

    send_unwrap(&handler, visualize_request(1, "/work/doc1.json")).await;
    let script = std::fs::read_to_string(dir.path().join("storage/graph.js")).unwrap();
    assert_eq!(script, "// custom script");
}

// ═══════════════════════════════════════════════════════
// CACHE & LOGGING
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_cache_reset_forces_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let status = send_unwrap(&handler, request(1, "cache/status", json!({}))).await;
    assert_eq!(status["result"]["fresh"], false);
    assert_eq!(status["result"]["assets"][0]["present"], false);

    send_unwrap(&handler, visualize_request(2, "/work/a.json")).await;
    let status = send_unwrap(&handler, request(3, "cache/status", json!({}))).await;
    for asset in status["result"]["assets"].as_array().unwrap() {
        assert_eq!(asset["present"], true);
        assert_eq!(asset["recordedRevision"], asset["revision"]);
    }

    let reset = send_unwrap(&handler, request(4, "cache/reset", json!({}))).await;
    assert_eq!(reset["result"]["fresh"], false);

    // Existing session is reused without touching the cache.
    send_unwrap(&handler, visualize_request(5, "/work/a.json")).await;
    let status = send_unwrap(&handler, request(6, "cache/status", json!({}))).await;
    assert_eq!(status["result"]["refreshCount"], 1);

    // A new session refreshes again.
    send_unwrap(&handler, visualize_request(7, "/work/b.json")).await;
    let status = send_unwrap(&handler, request(8, "cache/status", json!({}))).await;
    assert_eq!(status["result"]["refreshCount"], 2);
    assert_eq!(status["result"]["fresh"], true);
}

#[tokio::test]
async fn test_cache_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let handler = handler_in(&dir);
        send_unwrap(&handler, visualize_request(1, "/work/a.json")).await;
        tokio_test::assert_ok!(handler.service().finish());
    }

    let handler = handler_in(&dir);
    let status = send_unwrap(&handler, request(1, "cache/status", json!({}))).await;
    assert_eq!(status["result"]["fresh"], false);
    for asset in status["result"]["assets"].as_array().unwrap() {
        assert_eq!(asset["present"], true);
        assert_eq!(asset["recordedRevision"], asset["revision"]);
    }
}

#[tokio::test]
async fn test_set_log_level() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler_in(&dir);

    let resp = send_unwrap(&handler, request(1, "log/setLevel", json!({ "level": "loud" }))).await;
    assert_eq!(resp["error"]["code"], -32602);

    let resp = send_unwrap(&handler, request(2, "log/setLevel", json!({ "level": "debug" }))).await;
    assert_eq!(resp["result"]["level"], "debug");

    let lines: Vec<String> = handler
        .drain_notifications()
        .into_iter()
        .filter(|n| n.method == LOG_MESSAGE)
        .map(|n| n.params.unwrap()["message"].as_str().unwrap().to_string())
        .collect();
    assert!(lines[0].ends_with("Setting log level to: debug"));
    assert!(lines[1].ends_with("Log level is now: debug"));

    // Debug lines now reach the client.
    send_unwrap(&handler, visualize_request(3, "/work/a.json")).await;
    send_unwrap(&handler, visualize_request(4, "/work/a.json")).await;
    let reused = handler
        .drain_notifications()
        .into_iter()
        .filter(|n| n.method == LOG_MESSAGE)
        .any(|n| {
            n.params.unwrap()["message"]
                .as_str()
                .unwrap()
                .contains("[DEBUG]: Reusing existing visualization")
        });
    assert!(reused);
}

#[tokio::test]
async fn test_log_file_receives_lines() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("logs/visualizer.log");
    let mut config = HostConfig::in_dir(dir.path().join("storage"));
    config.log_file = Some(log_path.clone());
    let handler = ProtocolHandler::open(config).unwrap();

    send_unwrap(&handler, request(1, "visualize", json!({}))).await;
    tokio_test::assert_ok!(handler.service().finish());

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("[ERROR]: Could not get active document"));

    let resp = send_unwrap(&handler, request(2, "log/setLevel", json!({ "level": "info" }))).await;
    assert_eq!(resp["error"]["code"], -32856);
}
