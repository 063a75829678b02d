//! Nomad - Rust 自主世界机器人
//!
//! 入口：初始化日志、加载配置、装配世界连接器与会话监管，
//! 旁挂 HTTP 状态端点，直到收到关闭信号。

use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nomad::config::{load_config, AppConfig};
use nomad::core::policy::{PolicyHandle, PolicyState};
use nomad::core::shutdown::ShutdownManager;
use nomad::core::supervisor::Supervisor;
use nomad::status::StatusState;
use nomad::world::sim::SimConnector;
use nomad::world::WorldConnector;

/// 按配置选择世界后端；未知后端直接报错
fn create_connector(cfg: &AppConfig) -> anyhow::Result<Arc<dyn WorldConnector>> {
    match cfg.server.backend.as_str() {
        "sim" => {
            tracing::info!("using built-in simulated world backend");
            Ok(Arc::new(SimConnector::default()))
        }
        other => anyhow::bail!("unknown world backend: {other}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let connector = create_connector(&cfg)?;
    let policy = PolicyHandle::new(PolicyState::from_config(&cfg.policy));
    let status_bind = cfg.status.bind.clone();

    let (supervisor, directive_tx, status_rx) = Supervisor::new(connector, cfg, policy);

    // 状态 / 保活端点
    let status_state = Arc::new(StatusState {
        status_rx,
        supervisor: directive_tx,
        started_at: Instant::now(),
    });
    tokio::spawn(async move {
        if let Err(e) = nomad::status::serve(&status_bind, status_state).await {
            tracing::error!(error = %e, "status endpoint failed");
        }
    });

    // 关闭信号：Ctrl+C / SIGTERM
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    supervisor.run(shutdown.token()).await;

    tracing::info!("nomad exited");
    Ok(())
}
