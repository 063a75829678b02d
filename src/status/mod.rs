//! HTTP 状态上报与保活端点
//!
//! `GET /` 保活横幅（托管平台的健康检查打这里）；`GET /status` 返回连接
//! 状态 / 模式 / 运行时长；`POST /reconnect` 投递强制重连指令并立即 202。

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::core::state::StatusSnapshot;
use crate::core::supervisor::Directive;

/// 状态端点共享状态
pub struct StatusState {
    pub status_rx: watch::Receiver<StatusSnapshot>,
    pub supervisor: mpsc::UnboundedSender<Directive>,
    pub started_at: Instant,
}

/// GET /status 的响应体
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub mode: String,
    pub uptime_seconds: u64,
    pub phase: crate::core::state::LinkPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<String>,
}

pub fn create_router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(get_status))
        .route("/reconnect", post(force_reconnect))
        .with_state(state)
}

async fn root() -> &'static str {
    "Nomad Bot Online"
}

async fn get_status(State(state): State<Arc<StatusState>>) -> Json<StatusResponse> {
    let snap = state.status_rx.borrow().clone();
    Json(StatusResponse {
        connected: snap.connected,
        mode: snap.mode,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        phase: snap.phase,
        connected_since: snap.connected_since,
        last_disconnect: snap.last_disconnect,
    })
}

async fn force_reconnect(State(state): State<Arc<StatusState>>) -> StatusCode {
    if state.supervisor.send(Directive::ForceReconnect).is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

/// 绑定并一直服务；随任务取消退出
pub async fn serve(bind: &str, state: Arc<StatusState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "status endpoint listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
