//! 状态投影：连接阶段与对外状态快照
//!
//! 状态端点只拿轻量的 StatusSnapshot；完整内部状态由 Supervisor 维护并在
//! 阶段变化时投影到 watch 通道。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::policy::PolicyState;

/// 连接生命周期阶段：Idle -> Starting -> Active -> Backoff -> Starting -> ...
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPhase {
    Idle,
    Starting,
    Active,
    Backoff,
}

impl LinkPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Backoff => "backoff",
        }
    }
}

/// 对外投影的状态快照
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub phase: LinkPhase,
    pub connected: bool,
    pub mode: String,
    /// 本次会话就绪的时刻；未连接时为空
    pub connected_since: Option<DateTime<Utc>>,
    /// 最近一次断线原因
    pub last_disconnect: Option<String>,
    /// 当前会话标识
    pub session_id: Option<String>,
}

impl StatusSnapshot {
    pub fn project(
        phase: LinkPhase,
        policy: &PolicyState,
        connected_since: Option<DateTime<Utc>>,
        last_disconnect: Option<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            phase,
            connected: phase == LinkPhase::Active,
            mode: policy.mode.as_str().to_string(),
            connected_since,
            last_disconnect,
            session_id,
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            phase: LinkPhase::Idle,
            connected: false,
            mode: "autonomous".to_string(),
            connected_since: None,
            last_disconnect: None,
            session_id: None,
        }
    }
}
