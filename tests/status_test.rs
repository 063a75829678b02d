//! 状态端点集成测试

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::sync::{mpsc, watch};
use tower::ServiceExt;

use nomad::core::state::StatusSnapshot;
use nomad::core::supervisor::Directive;
use nomad::status::{create_router, StatusState};

fn make_app() -> (
    axum::Router,
    mpsc::UnboundedReceiver<Directive>,
    watch::Sender<StatusSnapshot>,
) {
    let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(StatusState {
        status_rx,
        supervisor: tx,
        started_at: Instant::now(),
    });
    (create_router(state), rx, status_tx)
}

#[tokio::test]
async fn test_root_keepalive_banner() {
    let (app, _rx, _status_tx) = make_app();
    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Nomad Bot Online");
}

#[tokio::test]
async fn test_status_reports_connection_and_mode() {
    let (app, _rx, status_tx) = make_app();

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["connected"], false);
    assert_eq!(v["mode"], "autonomous");
    assert!(v["uptime_seconds"].is_u64());

    // 上线后快照跟着变
    let mut snap = StatusSnapshot::default();
    snap.connected = true;
    snap.phase = nomad::core::state::LinkPhase::Active;
    snap.mode = "passive".into();
    status_tx.send(snap).unwrap();

    let resp = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["connected"], true);
    assert_eq!(v["phase"], "active");
    assert_eq!(v["mode"], "passive");
}

#[tokio::test]
async fn test_force_reconnect_returns_202_and_enqueues() {
    let (app, mut rx, _status_tx) = make_app();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reconnect")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert!(matches!(rx.try_recv().unwrap(), Directive::ForceReconnect));
}
